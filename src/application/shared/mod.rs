pub mod fan_out;
pub(crate) mod mappers;

#[cfg(test)]
pub(crate) mod tests;

pub use fan_out::resolve_many_by_id;
