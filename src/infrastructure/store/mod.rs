pub mod error;
pub mod memory_store;
mod queries;
pub mod sqlite_store;

pub use error::StoreError;
pub use memory_store::InMemoryDocumentStore;
pub use sqlite_store::{CollectionNames, SqliteDocumentStore};
