
pub(crate) use fixtures::*;
pub(crate) use logging::init_tracing;
pub(crate) use store::{ScriptedStore, StoreCall};
