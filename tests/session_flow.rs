mod common;

use common::{identity, seed_save, setup_session};
use momentr_lib::application::ports::{Collection, DocumentQuery, DocumentStore};
use momentr_lib::application::services::{LoadOutcome, SaveToggle};
use momentr_lib::shared::error::AppError;

#[tokio::test]
async fn guarded_entry_points_require_sign_in() {
    let ctx = setup_session().await;

    assert!(matches!(
        ctx.state.like_post("p1").await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        ctx.state.save_post("p1").await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        ctx.state.saved_posts().await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        ctx.state.load_more(true).await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(!ctx.state.interaction_service.is_tracked("p1").await);
}

#[tokio::test]
async fn like_save_and_list_saved_posts() {
    let ctx = setup_session().await;
    ctx.oracle.sign_in(identity("u1")).await;

    let outcome = ctx.state.load_more(true).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Appended { page_len: 2 });
    assert!(ctx.state.interaction_service.is_tracked("p1").await);

    let likes = ctx.state.like_post("p1").await.unwrap();
    assert!(likes.contains("u1"));
    let stored = ctx
        .store
        .get_document(Collection::Posts, "p1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.data["likes"], serde_json::json!(["u1"]));
    let refreshed = ctx.state.post_service.post_by_id("p1").await.unwrap().unwrap();
    assert!(refreshed.is_liked_by("u1"));

    assert_eq!(ctx.state.save_post("p2").await.unwrap(), SaveToggle::Saved);
    let saved: Vec<_> = ctx
        .state
        .saved_posts()
        .await
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect();
    assert_eq!(saved, vec!["p2".to_string()]);

    assert_eq!(ctx.state.save_post("p2").await.unwrap(), SaveToggle::Unsaved);
    assert!(ctx.state.saved_posts().await.unwrap().is_empty());
    assert_eq!(ctx.store.count(Collection::Saves).await, 0);
}

#[tokio::test]
async fn like_on_unknown_post_is_not_found() {
    let ctx = setup_session().await;
    ctx.oracle.sign_in(identity("u1")).await;

    assert!(matches!(
        ctx.state.like_post("missing").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn active_search_suppresses_feed_loading() {
    let ctx = setup_session().await;
    ctx.oracle.sign_in(identity("u1")).await;

    ctx.state.search.set_query("coffee").await;
    assert_eq!(
        ctx.state.load_more(true).await.unwrap(),
        LoadOutcome::Skipped
    );

    ctx.state.search.clear().await;
    assert_eq!(
        ctx.state.load_more(true).await.unwrap(),
        LoadOutcome::Appended { page_len: 2 }
    );
}

#[tokio::test]
async fn sign_out_discards_session_state() {
    let ctx = setup_session().await;
    ctx.oracle.sign_in(identity("u1")).await;
    ctx.state.load_more(true).await.unwrap();
    ctx.state.like_post("p2").await.unwrap();
    assert!(!ctx.state.cache.is_empty().await);

    ctx.oracle.sign_out().await;
    ctx.state.sign_out().await;

    assert!(ctx.state.cache.is_empty().await);
    assert!(ctx.state.explore_feed.posts().await.is_empty());
    assert!(!ctx.state.interaction_service.is_tracked("p2").await);
    assert!(!ctx.state.search.is_active().await);
    assert!(ctx.state.user_service.current_user().await.unwrap().is_none());
}

#[tokio::test]
async fn previously_saved_post_can_be_saved_again() {
    let ctx = setup_session().await;
    seed_save(&ctx.store, "s1", "u1", "p1").await;
    ctx.oracle.sign_in(identity("u1")).await;
    ctx.state.load_more(true).await.unwrap();
    assert!(ctx.state.interaction_service.is_saved("p1").await);

    let query = DocumentQuery::new().equal("user", "u1").equal("post", "p1");
    let expected = [
        (SaveToggle::Unsaved, 0, 0),
        (SaveToggle::Saved, 1, 1),
        (SaveToggle::Unsaved, 0, 0),
    ];
    for (outcome, records, listed) in expected {
        assert_eq!(ctx.state.save_post("p1").await.unwrap(), outcome);
        assert_eq!(
            ctx.store
                .count_matching(Collection::Saves, &query.filters)
                .await,
            records
        );
        assert_eq!(ctx.state.saved_posts().await.unwrap().len(), listed);
    }
}
