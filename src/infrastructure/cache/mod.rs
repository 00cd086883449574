pub mod query_cache;
pub mod query_key;

pub use query_cache::{
    CacheEvent, CacheEventKind, CacheSubscription, EntryStatus, MutationOptions, QueryCache,
};
pub use query_key::{QueryKey, QueryScope};
