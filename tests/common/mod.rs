#![allow(dead_code)]

use momentr_lib::application::ports::{AuthIdentity, Collection};
use momentr_lib::infrastructure::auth::StaticAuthOracle;
use momentr_lib::infrastructure::store::InMemoryDocumentStore;
use momentr_lib::shared::config::AppConfig;
use momentr_lib::state::AppState;
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub fn identity(id: &str) -> AuthIdentity {
    AuthIdentity {
        id: id.to_string(),
        name: format!("User {id}"),
        username: id.to_string(),
        image_url: None,
    }
}

pub fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

pub async fn seed_user(store: &InMemoryDocumentStore, id: &str) {
    store
        .insert_with_id(
            Collection::Users,
            id,
            fields(json!({ "name": format!("User {id}"), "username": id })),
        )
        .await
        .expect("seed user");
}

pub async fn seed_post(store: &InMemoryDocumentStore, id: &str, creator: &str, caption: &str) {
    store
        .insert_with_id(
            Collection::Posts,
            id,
            fields(json!({ "creator": creator, "caption": caption, "likes": [] })),
        )
        .await
        .expect("seed post");
}

pub async fn seed_save(store: &InMemoryDocumentStore, id: &str, user_id: &str, post_id: &str) {
    store
        .insert_with_id(
            Collection::Saves,
            id,
            fields(json!({ "user": user_id, "post": post_id })),
        )
        .await
        .expect("seed save");
}

pub struct SessionContext {
    pub state: AppState,
    pub store: Arc<InMemoryDocumentStore>,
    pub oracle: Arc<StaticAuthOracle>,
}

/// u1 と u2、u2 が投稿した p1/p2 を登録したセッション（未サインイン）
pub async fn setup_session() -> SessionContext {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_user(&store, "u1").await;
    seed_user(&store, "u2").await;
    seed_post(&store, "p1", "u2", "morning coffee").await;
    seed_post(&store, "p2", "u2", "evening walk").await;

    let oracle = Arc::new(StaticAuthOracle::new());
    let state = AppState::new(AppConfig::default(), store.clone(), oracle.clone());

    SessionContext {
        state,
        store,
        oracle,
    }
}
