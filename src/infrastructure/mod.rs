pub mod auth;
pub mod cache;
pub mod database;
pub mod store;
