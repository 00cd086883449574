use crate::application::ports::{Collection, DocumentQuery, DocumentStore};
use crate::application::shared::mappers::{likes_patch, map_save_document, save_fields};
use crate::domain::entities::{Post, SaveRecord, User};
use crate::domain::value_objects::LikeSet;
use crate::infrastructure::cache::{MutationOptions, QueryCache, QueryKey, QueryScope};
use crate::shared::config::OptimisticPolicy;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
struct OverlayEntry {
    likes: LikeSet,
    is_saved: bool,
    /// 保存状態の根拠となるレコード。作成レスポンスで更新される。
    save_known: Option<SaveRecord>,
    save_pending: bool,
    /// 完了していないいいね書き込みの数
    like_writes: usize,
}

/// 描画中の投稿 1 件分の表示状態
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionSnapshot {
    pub post_id: String,
    pub likes: LikeSet,
    pub is_saved: bool,
    pub save_pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Like,
    Save,
    Unsave,
}

/// リモート書き込みの失敗通知（UI のトースト表示用）
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionNotice {
    pub post_id: String,
    pub kind: InteractionKind,
    pub error: AppError,
    pub rolled_back: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveToggle {
    Saved,
    Unsaved,
    /// 保存・解除の書き込み中なので無視した
    Busy,
}

struct SavePlan {
    post_id: String,
    user_id: String,
    existing: Option<SaveRecord>,
    was_saved: bool,
    previous_known: Option<SaveRecord>,
}

impl SavePlan {
    fn outcome(&self) -> SaveToggle {
        if self.existing.is_some() {
            SaveToggle::Unsaved
        } else {
            SaveToggle::Saved
        }
    }
}

/// いいね・保存の楽観的更新エンジン。
///
/// 表示状態はリモート I/O より先に更新し、書き込み結果に応じてキャッシュを無効化する。
#[derive(Clone)]
pub struct InteractionService {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
    overlay: Arc<RwLock<HashMap<String, OverlayEntry>>>,
    policy: OptimisticPolicy,
    notices: broadcast::Sender<InteractionNotice>,
}

impl InteractionService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache, policy: OptimisticPolicy) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            store,
            cache,
            overlay: Arc::new(RwLock::new(HashMap::new())),
            policy,
            notices,
        }
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<InteractionNotice> {
        self.notices.subscribe()
    }

    /// サーバー上のドキュメントから表示状態を (再) 設定する。
    /// 書き込み中の項目は上書きしない。
    pub async fn track_post(&self, post: &Post, current_user: Option<&User>) {
        let record = current_user
            .and_then(|user| user.save_record_for(&post.id))
            .cloned();

        let mut overlay = self.overlay.write().await;
        let entry = overlay.entry(post.id.clone()).or_default();
        if entry.like_writes == 0 {
            entry.likes = post.likes.clone();
        }
        if !entry.save_pending {
            entry.is_saved = record.is_some();
            entry.save_known = record;
        }
    }

    pub async fn reconcile(&self, posts: &[Post], current_user: Option<&User>) {
        for post in posts {
            self.track_post(post, current_user).await;
        }
        debug!(count = posts.len(), "reconciled interaction overlay");
    }

    pub async fn is_tracked(&self, post_id: &str) -> bool {
        self.overlay.read().await.contains_key(post_id)
    }

    pub async fn clear(&self) {
        self.overlay.write().await.clear();
    }

    pub async fn snapshot(&self, post_id: &str) -> Option<InteractionSnapshot> {
        let overlay = self.overlay.read().await;
        overlay.get(post_id).map(|entry| InteractionSnapshot {
            post_id: post_id.to_string(),
            likes: entry.likes.clone(),
            is_saved: entry.is_saved,
            save_pending: entry.save_pending,
        })
    }

    pub async fn is_liked(&self, post_id: &str, user_id: &str) -> bool {
        let overlay = self.overlay.read().await;
        overlay
            .get(post_id)
            .map(|entry| entry.likes.contains(user_id))
            .unwrap_or(false)
    }

    pub async fn is_saved(&self, post_id: &str) -> bool {
        let overlay = self.overlay.read().await;
        overlay.get(post_id).map(|entry| entry.is_saved).unwrap_or(false)
    }

    /// いいねを切り替え、書き込み完了まで待つ
    pub async fn toggle_like(&self, post_id: &str, user_id: &str) -> Result<LikeSet, AppError> {
        let (previous, next) = self.apply_like(post_id, user_id).await?;
        self.write_likes(post_id.to_string(), previous, next).await
    }

    /// いいねを切り替えてすぐに返す。書き込みはバックグラウンドで行う。
    pub async fn toggle_like_detached(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<LikeSet, AppError> {
        let (previous, next) = self.apply_like(post_id, user_id).await?;
        let service = self.clone();
        let post_id = post_id.to_string();
        let optimistic = next.clone();
        tokio::spawn(async move {
            let _ = service.write_likes(post_id, previous, optimistic).await;
        });
        Ok(next)
    }

    pub async fn toggle_save(&self, post_id: &str, user_id: &str) -> Result<SaveToggle, AppError> {
        match self.begin_save(post_id, user_id).await? {
            Some(plan) => self.finish_save(plan).await,
            None => Ok(SaveToggle::Busy),
        }
    }

    pub async fn toggle_save_detached(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<SaveToggle, AppError> {
        let Some(plan) = self.begin_save(post_id, user_id).await? else {
            return Ok(SaveToggle::Busy);
        };
        let outcome = plan.outcome();
        let service = self.clone();
        tokio::spawn(async move {
            let _ = service.finish_save(plan).await;
        });
        Ok(outcome)
    }

    async fn apply_like(&self, post_id: &str, user_id: &str) -> Result<(LikeSet, LikeSet), AppError> {
        let mut overlay = self.overlay.write().await;
        let entry = overlay
            .get_mut(post_id)
            .ok_or_else(|| untracked(post_id))?;
        let previous = entry.likes.clone();
        let next = previous.toggled(user_id);
        entry.likes = next.clone();
        entry.like_writes += 1;
        debug!(post_id, user_id, liked = next.contains(user_id), "optimistic like applied");
        Ok((previous, next))
    }

    async fn write_likes(
        &self,
        post_id: String,
        previous: LikeSet,
        next: LikeSet,
    ) -> Result<LikeSet, AppError> {
        let result = match likes_patch(&next) {
            Ok(patch) => {
                let store = Arc::clone(&self.store);
                let id = post_id.clone();
                self.cache
                    .mutate(
                        || async move {
                            store
                                .update_document(Collection::Posts, &id, patch)
                                .await
                                .map(|_| ())
                        },
                        MutationOptions::new()
                            .invalidate(QueryKey::post_by_id(&post_id))
                            .invalidate(QueryKey::recent_posts())
                            .invalidate(QueryKey::current_user())
                            .invalidate_scope(QueryScope::FeedPage)
                            .invalidate_scope(QueryScope::UserPosts),
                    )
                    .await
            }
            Err(err) => Err(err),
        };
        self.finish_like_write(&post_id).await;

        match result {
            Ok(()) => Ok(next),
            Err(err) => {
                let rolled_back = self.rollback_like(&post_id, &previous, &next).await;
                self.notify(&post_id, InteractionKind::Like, err.clone(), rolled_back);
                Err(err)
            }
        }
    }

    async fn finish_like_write(&self, post_id: &str) {
        if let Some(entry) = self.overlay.write().await.get_mut(post_id) {
            entry.like_writes = entry.like_writes.saturating_sub(1);
        }
    }

    async fn rollback_like(&self, post_id: &str, previous: &LikeSet, optimistic: &LikeSet) -> bool {
        if self.policy != OptimisticPolicy::RollbackOnFailure {
            return false;
        }
        let mut overlay = self.overlay.write().await;
        match overlay.get_mut(post_id) {
            // 後続の切り替えで値が変わっていればそちらを優先する
            Some(entry) if &entry.likes == optimistic => {
                entry.likes = previous.clone();
                warn!(post_id, "rolled back optimistic like");
                true
            }
            _ => false,
        }
    }

    /// 書き込み中フラグを立ててから既存レコードを探し、楽観的に保存状態を反転する
    async fn begin_save(&self, post_id: &str, user_id: &str) -> Result<Option<SavePlan>, AppError> {
        let (was_saved, previous_known) = {
            let mut overlay = self.overlay.write().await;
            let entry = overlay
                .get_mut(post_id)
                .ok_or_else(|| untracked(post_id))?;
            if entry.save_pending {
                debug!(post_id, "save toggle ignored while a write is pending");
                return Ok(None);
            }
            entry.save_pending = true;
            (entry.is_saved, entry.save_known.clone())
        };

        let existing = match self
            .lookup_save_record(post_id, user_id, was_saved, previous_known.as_ref())
            .await
        {
            Ok(existing) => existing,
            Err(err) => {
                self.release_pending(post_id).await;
                return Err(err);
            }
        };

        {
            let mut overlay = self.overlay.write().await;
            let Some(entry) = overlay.get_mut(post_id) else {
                return Err(untracked(post_id));
            };
            entry.is_saved = existing.is_none();
        }
        debug!(post_id, user_id, saved = existing.is_none(), "optimistic save applied");

        Ok(Some(SavePlan {
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            existing,
            was_saved,
            previous_known,
        }))
    }

    /// 表示状態の既知レコード、無効化されていない現在ユーザーの順で探す。
    /// 保存済み表示なのに見つからない場合だけストアに問い合わせる。
    async fn lookup_save_record(
        &self,
        post_id: &str,
        user_id: &str,
        was_saved: bool,
        known: Option<&SaveRecord>,
    ) -> Result<Option<SaveRecord>, AppError> {
        if let Some(record) = known.filter(|record| record.matches(user_id, post_id)) {
            return Ok(Some(record.clone()));
        }

        let cached = self
            .cache
            .get_fresh_query_data::<Option<User>>(&QueryKey::current_user())
            .await?
            .flatten()
            .filter(|user| user.id == user_id)
            .and_then(|user| user.save_record_for(post_id).cloned());
        if cached.is_some() || !was_saved {
            return Ok(cached);
        }

        let query = DocumentQuery::new()
            .equal("user", user_id)
            .equal("post", post_id)
            .limit(1);
        let documents = self.store.list_documents(Collection::Saves, &query).await?;
        documents.first().map(map_save_document).transpose()
    }

    async fn finish_save(&self, plan: SavePlan) -> Result<SaveToggle, AppError> {
        let store = Arc::clone(&self.store);
        let options = MutationOptions::new()
            .invalidate(QueryKey::current_user())
            .invalidate(QueryKey::recent_posts())
            .invalidate(QueryKey::saved_posts(&plan.user_id))
            .invalidate_scope(QueryScope::FeedPage);

        let result = match plan.existing.clone() {
            Some(record) => {
                self.cache
                    .mutate(
                        || async move {
                            match store.delete_document(Collection::Saves, record.id()).await {
                                Err(err) if err.is_not_found() => {
                                    warn!(save_id = record.id(), "save record already deleted");
                                    Ok::<Option<SaveRecord>, AppError>(None)
                                }
                                other => other.map(|_| None),
                            }
                        },
                        options,
                    )
                    .await
            }
            None => {
                let fields = save_fields(&plan.user_id, &plan.post_id);
                self.cache
                    .mutate(
                        || async move {
                            let document = store.create_document(Collection::Saves, fields).await?;
                            map_save_document(&document).map(Some)
                        },
                        options,
                    )
                    .await
            }
        };

        match result {
            Ok(record) => {
                let mut overlay = self.overlay.write().await;
                if let Some(entry) = overlay.get_mut(&plan.post_id) {
                    entry.is_saved = record.is_some();
                    entry.save_known = record;
                    entry.save_pending = false;
                }
                Ok(plan.outcome())
            }
            Err(err) => {
                let rolled_back = self.rollback_save(&plan).await;
                let kind = match plan.outcome() {
                    SaveToggle::Unsaved => InteractionKind::Unsave,
                    _ => InteractionKind::Save,
                };
                self.notify(&plan.post_id, kind, err.clone(), rolled_back);
                Err(err)
            }
        }
    }

    async fn rollback_save(&self, plan: &SavePlan) -> bool {
        let mut overlay = self.overlay.write().await;
        let Some(entry) = overlay.get_mut(&plan.post_id) else {
            return false;
        };
        entry.save_pending = false;

        let optimistic = plan.existing.is_none();
        if self.policy != OptimisticPolicy::RollbackOnFailure || entry.is_saved != optimistic {
            return false;
        }
        entry.is_saved = plan.was_saved;
        entry.save_known = plan.previous_known.clone();
        warn!(post_id = %plan.post_id, "rolled back optimistic save");
        true
    }

    async fn release_pending(&self, post_id: &str) {
        if let Some(entry) = self.overlay.write().await.get_mut(post_id) {
            entry.save_pending = false;
        }
    }

    fn notify(&self, post_id: &str, kind: InteractionKind, error: AppError, rolled_back: bool) {
        warn!(post_id, ?kind, error = %error, rolled_back, "interaction write failed");
        let _ = self.notices.send(InteractionNotice {
            post_id: post_id.to_string(),
            kind,
            error,
            rolled_back,
        });
    }
}

fn untracked(post_id: &str) -> AppError {
    AppError::InvalidInput(format!("Post {post_id} is not tracked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::Document;
    use crate::application::shared::tests::{
        init_tracing, post, seed_post, seed_save, user, ScriptedStore, StoreCall,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;
    use serde_json::{Map, Value};
    use std::time::Duration;

    mock! {
        pub Store {}

        #[async_trait]
        impl DocumentStore for Store {
            async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError>;
            async fn list_documents(&self, collection: Collection, query: &DocumentQuery) -> Result<Vec<Document>, AppError>;
            async fn create_document(&self, collection: Collection, data: Map<String, Value>) -> Result<Document, AppError>;
            async fn update_document(&self, collection: Collection, id: &str, patch: Map<String, Value>) -> Result<Document, AppError>;
            async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError>;
        }
    }

    fn failing_store() -> MockStore {
        let mut store = MockStore::new();
        store
            .expect_update_document()
            .returning(|_, _, _| Err(AppError::Network("offline".into())));
        store
            .expect_create_document()
            .returning(|_, _| Err(AppError::Network("offline".into())));
        store
    }

    fn engine(store: Arc<dyn DocumentStore>, policy: OptimisticPolicy) -> InteractionService {
        InteractionService::new(store, QueryCache::new(32), policy)
    }

    async fn stored_likes(store: &ScriptedStore, post_id: &str) -> Value {
        store
            .inner
            .get_document(Collection::Posts, post_id)
            .await
            .unwrap()
            .and_then(|doc| doc.data.get("likes").cloned())
            .unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn toggling_like_twice_restores_original_set() {
        init_tracing();
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &["u3"]), None).await;

        let liked = engine.toggle_like("p1", "u1").await.unwrap();
        assert_eq!(liked.as_slice(), &["u3".to_string(), "u1".to_string()]);
        assert!(engine.is_liked("p1", "u1").await);
        assert_eq!(stored_likes(&store, "p1").await, serde_json::json!(["u3", "u1"]));

        let unliked = engine.toggle_like("p1", "u1").await.unwrap();
        assert_eq!(unliked.as_slice(), &["u3".to_string()]);
        assert!(!engine.is_liked("p1", "u1").await);
        assert_eq!(stored_likes(&store, "p1").await, serde_json::json!(["u3"]));
    }

    #[tokio::test]
    async fn detached_like_is_visible_before_the_write_completes() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        store.delay_writes(Duration::from_secs(5)).await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        let likes = engine.toggle_like_detached("p1", "u1").await.unwrap();

        assert!(likes.contains("u1"));
        assert!(engine.is_liked("p1", "u1").await);
        assert_eq!(stored_likes(&store, "p1").await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn failed_like_rolls_back_and_notifies() {
        let engine = engine(Arc::new(failing_store()), OptimisticPolicy::RollbackOnFailure);
        let mut notices = engine.subscribe_notices();
        engine.track_post(&post("p1", "u2", &[]), None).await;

        let err = engine.toggle_like("p1", "u1").await.unwrap_err();
        assert_eq!(err, AppError::Network("offline".into()));
        assert!(!engine.is_liked("p1", "u1").await);

        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, InteractionKind::Like);
        assert!(notice.rolled_back);
    }

    #[tokio::test]
    async fn keep_policy_leaves_optimistic_like() {
        let engine = engine(Arc::new(failing_store()), OptimisticPolicy::KeepOnFailure);
        let mut notices = engine.subscribe_notices();
        engine.track_post(&post("p1", "u2", &[]), None).await;

        assert!(engine.toggle_like("p1", "u1").await.is_err());
        assert!(engine.is_liked("p1", "u1").await);
        assert!(!notices.recv().await.unwrap().rolled_back);
    }

    #[tokio::test]
    async fn failed_save_rolls_back_and_clears_pending() {
        let engine = engine(Arc::new(failing_store()), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        assert!(engine.toggle_save("p1", "u1").await.is_err());

        let snapshot = engine.snapshot("p1").await.unwrap();
        assert!(!snapshot.is_saved);
        assert!(!snapshot.save_pending);
    }

    #[tokio::test]
    async fn untracked_post_is_rejected() {
        let engine = engine(Arc::new(MockStore::new()), OptimisticPolicy::RollbackOnFailure);
        assert!(matches!(
            engine.toggle_like("missing", "u1").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn repeated_save_toggles_never_duplicate_records() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        for round in 0..5 {
            let outcome = engine.toggle_save("p1", "u1").await.unwrap();
            let saves = store.inner.count(Collection::Saves).await;
            if round % 2 == 0 {
                assert_eq!(outcome, SaveToggle::Saved);
                assert_eq!(saves, 1);
            } else {
                assert_eq!(outcome, SaveToggle::Unsaved);
                assert_eq!(saves, 0);
            }
        }
        assert!(engine.is_saved("p1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn save_toggle_is_busy_while_pending() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        store.delay_writes(Duration::from_millis(100)).await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        assert_eq!(
            engine.toggle_save_detached("p1", "u1").await.unwrap(),
            SaveToggle::Saved
        );
        assert!(engine.snapshot("p1").await.unwrap().save_pending);
        assert_eq!(
            engine.toggle_save("p1", "u1").await.unwrap(),
            SaveToggle::Busy
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = engine.snapshot("p1").await.unwrap();
        assert!(snapshot.is_saved);
        assert!(!snapshot.save_pending);
        assert_eq!(
            store
                .count_calls(|call| matches!(call, StoreCall::Create(Collection::Saves)))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn unsave_uses_record_from_cached_current_user() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        seed_save(&store.inner, "s1", "u1", "p1").await;
        let cache = QueryCache::new(32);
        let engine = InteractionService::new(
            store.clone(),
            cache.clone(),
            OptimisticPolicy::RollbackOnFailure,
        );

        let mut current = user("u1");
        current.saves = vec![SaveRecord::from_parts("s1".into(), "u1".into(), "p1".into(), Utc::now())];
        cache
            .set_query_data(QueryKey::current_user(), Some(current))
            .await;
        engine.track_post(&post("p1", "u2", &[]), None).await;

        assert_eq!(
            engine.toggle_save("p1", "u1").await.unwrap(),
            SaveToggle::Unsaved
        );
        assert_eq!(store.inner.count(Collection::Saves).await, 0);
        assert!(!engine.is_saved("p1").await);
    }

    #[tokio::test]
    async fn deleting_an_already_removed_record_counts_as_unsaved() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        let mut current = user("u1");
        current.saves = vec![SaveRecord::from_parts("gone".into(), "u1".into(), "p1".into(), Utc::now())];
        engine
            .track_post(&post("p1", "u2", &[]), Some(&current))
            .await;

        assert_eq!(
            engine.toggle_save("p1", "u1").await.unwrap(),
            SaveToggle::Unsaved
        );
        assert!(!engine.is_saved("p1").await);
    }

    #[tokio::test]
    async fn reconcile_keeps_pending_save_state() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        store.delay_writes(Duration::from_secs(1)).await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        engine.toggle_save_detached("p1", "u1").await.unwrap();
        engine
            .reconcile(&[post("p1", "u2", &["u9"])], Some(&user("u1")))
            .await;

        let snapshot = engine.snapshot("p1").await.unwrap();
        assert!(snapshot.is_saved);
        assert!(snapshot.likes.contains("u9"));
    }

    async fn saves_for(store: &ScriptedStore, user_id: &str, post_id: &str) -> usize {
        let query = DocumentQuery::new()
            .equal("user", user_id)
            .equal("post", post_id);
        store
            .inner
            .count_matching(Collection::Saves, &query.filters)
            .await
    }

    #[tokio::test]
    async fn initially_saved_post_toggles_through_cached_current_user() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        seed_save(&store.inner, "s1", "u1", "p1").await;
        let cache = QueryCache::new(32);
        let engine = InteractionService::new(
            store.clone(),
            cache.clone(),
            OptimisticPolicy::RollbackOnFailure,
        );

        let mut current = user("u1");
        current.saves = vec![SaveRecord::from_parts("s1".into(), "u1".into(), "p1".into(), Utc::now())];
        cache
            .set_query_data(QueryKey::current_user(), Some(current.clone()))
            .await;
        engine
            .track_post(&post("p1", "u2", &[]), Some(&current))
            .await;
        assert!(engine.is_saved("p1").await);

        let expected = [
            (SaveToggle::Unsaved, 0),
            (SaveToggle::Saved, 1),
            (SaveToggle::Unsaved, 0),
            (SaveToggle::Saved, 1),
        ];
        for (outcome, records) in expected {
            assert_eq!(engine.toggle_save("p1", "u1").await.unwrap(), outcome);
            assert_eq!(saves_for(&store, "u1", "p1").await, records);
            assert_eq!(engine.is_saved("p1").await, outcome == SaveToggle::Saved);
        }
        assert_eq!(
            store
                .count_calls(|call| matches!(call, StoreCall::Delete(Collection::Saves, id) if id == "s1"))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn saved_state_without_known_record_is_looked_up_remotely() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        seed_save(&store.inner, "s1", "u1", "p1").await;
        let cache = QueryCache::new(32);
        let engine = InteractionService::new(
            store.clone(),
            cache.clone(),
            OptimisticPolicy::RollbackOnFailure,
        );

        let mut outdated = user("u1");
        outdated.saves = vec![SaveRecord::from_parts("old".into(), "u1".into(), "p1".into(), Utc::now())];
        cache
            .set_query_data(QueryKey::current_user(), Some(outdated.clone()))
            .await;
        cache.invalidate(&QueryKey::current_user()).await;
        engine
            .track_post(&post("p1", "u2", &[]), Some(&outdated))
            .await;
        {
            let mut overlay = engine.overlay.write().await;
            if let Some(entry) = overlay.get_mut("p1") {
                entry.save_known = None;
            }
        }

        assert_eq!(
            engine.toggle_save("p1", "u1").await.unwrap(),
            SaveToggle::Unsaved
        );
        assert_eq!(saves_for(&store, "u1", "p1").await, 0);
        assert_eq!(
            store
                .count_calls(|call| matches!(call, StoreCall::List(Collection::Saves, _)))
                .await,
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_during_like_write_keeps_written_set() {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u2", "hello").await;
        store.delay_writes(Duration::from_millis(100)).await;
        let engine = engine(store.clone(), OptimisticPolicy::RollbackOnFailure);
        engine.track_post(&post("p1", "u2", &[]), None).await;

        engine.toggle_like_detached("p1", "u1").await.unwrap();
        engine.reconcile(&[post("p1", "u2", &[])], None).await;
        assert!(engine.is_liked("p1", "u1").await);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(engine.is_liked("p1", "u1").await);
        assert_eq!(stored_likes(&store, "p1").await, serde_json::json!(["u1"]));

        engine.reconcile(&[post("p1", "u2", &["u7"])], None).await;
        assert!(engine.is_liked("p1", "u7").await);
        assert!(!engine.is_liked("p1", "u1").await);
    }
}
