mod common;

use common::{fields, identity};
use momentr_lib::application::ports::{Collection, DocumentQuery, DocumentStore};
use momentr_lib::application::services::{LoadOutcome, SaveToggle};
use momentr_lib::infrastructure::auth::StaticAuthOracle;
use momentr_lib::infrastructure::database::ConnectionPool;
use momentr_lib::infrastructure::store::{CollectionNames, SqliteDocumentStore};
use momentr_lib::shared::config::AppConfig;
use momentr_lib::state::AppState;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

async fn open_store(dir: &Path) -> SqliteDocumentStore {
    let url = format!("sqlite:{}/momentr.db?mode=rwc", dir.display());
    let pool = ConnectionPool::new(&url).await.expect("open sqlite");
    pool.migrate().await.expect("migrate");
    SqliteDocumentStore::new(pool, CollectionNames::default())
}

#[tokio::test]
async fn session_over_on_disk_store_persists_interactions() {
    let dir = tempdir().expect("tempdir");

    let store = Arc::new(open_store(dir.path()).await);
    let viewer = store
        .create_document(
            Collection::Users,
            fields(json!({ "name": "Viewer", "username": "viewer" })),
        )
        .await
        .unwrap();
    let mut post_ids = Vec::new();
    for caption in ["first light", "harbour", "night market"] {
        let post = store
            .create_document(
                Collection::Posts,
                fields(json!({ "creator": "someone", "caption": caption, "likes": [] })),
            )
            .await
            .unwrap();
        post_ids.push(post.id);
    }

    let mut config = AppConfig::default();
    config.feed.page_size = 2;
    let oracle = Arc::new(StaticAuthOracle::signed_in(identity(&viewer.id)));
    let state = AppState::new(config, store.clone(), oracle);

    assert_eq!(
        state.load_more(true).await.unwrap(),
        LoadOutcome::Appended { page_len: 2 }
    );
    assert_eq!(
        state.load_more(true).await.unwrap(),
        LoadOutcome::Appended { page_len: 1 }
    );
    assert_eq!(state.load_more(true).await.unwrap(), LoadOutcome::ReachedEnd);
    assert_eq!(state.explore_feed.posts().await.len(), 3);

    let liked = &post_ids[0];
    let saved = &post_ids[2];
    state.like_post(liked).await.unwrap();
    assert_eq!(state.save_post(saved).await.unwrap(), SaveToggle::Saved);

    let saved_posts = state.saved_posts().await.unwrap();
    assert_eq!(saved_posts.len(), 1);
    assert_eq!(&saved_posts[0].id, saved);

    drop(state);
    drop(store);

    let reopened = open_store(dir.path()).await;
    let post = reopened
        .get_document(Collection::Posts, liked)
        .await
        .unwrap()
        .expect("post persisted");
    assert_eq!(post.data["likes"], json!([viewer.id]));

    let saves = reopened
        .list_documents(
            Collection::Saves,
            &DocumentQuery::new().equal("user", viewer.id.as_str()),
        )
        .await
        .unwrap();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].str_field("post"), Some(saved.as_str()));
}

#[tokio::test]
async fn with_sqlite_runs_migrations_on_a_fresh_file() {
    let dir = tempdir().expect("tempdir");
    let mut config = AppConfig::default();
    config.database.data_dir = dir.path().display().to_string();
    config.database.url = format!("sqlite:{}/fresh.db?mode=rwc", dir.path().display());

    let oracle = Arc::new(StaticAuthOracle::signed_in(identity("nobody")));
    let state = AppState::with_sqlite(config, oracle).await.unwrap();

    assert_eq!(state.load_more(true).await.unwrap(), LoadOutcome::ReachedEnd);
    assert!(state.explore_feed.posts().await.is_empty());
    assert!(dir.path().join("fresh.db").exists());
}
