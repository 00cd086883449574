pub mod static_oracle;

pub use static_oracle::StaticAuthOracle;
