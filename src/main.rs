fn main() -> anyhow::Result<()> {
    momentr_lib::run()
}
