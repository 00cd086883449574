pub mod config;
pub mod error;

pub use config::{AppConfig, OptimisticPolicy, SavedPostOrder};
pub use error::{AppError, Result};
