pub mod auth;
pub mod document_store;

pub use auth::{AuthIdentity, AuthOracle};
pub use document_store::{
    Collection, Document, DocumentQuery, DocumentStore, OrderBy, OrderField, QueryFilter,
};
