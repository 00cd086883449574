use crate::application::ports::{AuthIdentity, AuthOracle, DocumentStore};
use crate::application::services::{
    FeedPaginator, InteractionService, LoadOutcome, PostSearchCoordinator, PostService,
    SaveToggle, SavedPostService, UserService,
};
use crate::domain::entities::Post;
use crate::domain::value_objects::LikeSet;
use crate::infrastructure::cache::QueryCache;
use crate::infrastructure::database::ConnectionPool;
use crate::infrastructure::store::{CollectionNames, SqliteDocumentStore};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// サインイン中のセッションが持つ状態一式
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: QueryCache,
    pub auth: Arc<dyn AuthOracle>,
    pub post_service: Arc<PostService>,
    pub user_service: Arc<UserService>,
    pub interaction_service: InteractionService,
    pub saved_post_service: Arc<SavedPostService>,
    pub explore_feed: Arc<FeedPaginator>,
    pub search: PostSearchCoordinator,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthOracle>,
    ) -> Self {
        let cache = QueryCache::from_config(&config.cache);

        let post_service = Arc::new(PostService::new(
            Arc::clone(&store),
            cache.clone(),
            config.feed.clone(),
        ));
        let user_service = Arc::new(UserService::new(
            Arc::clone(&store),
            cache.clone(),
            Arc::clone(&auth),
            config.feed.users_limit,
        ));
        let interaction_service = InteractionService::new(
            Arc::clone(&store),
            cache.clone(),
            config.interaction.optimistic_policy,
        );
        let saved_post_service = Arc::new(SavedPostService::new(
            Arc::clone(&store),
            cache.clone(),
            config.interaction.saved_post_order,
        ));
        let explore_feed = Arc::new(FeedPaginator::new(Arc::clone(&post_service)));
        let search = PostSearchCoordinator::new(
            Arc::clone(&post_service),
            Duration::from_millis(config.search.debounce_ms),
        );

        Self {
            config,
            cache,
            auth,
            post_service,
            user_service,
            interaction_service,
            saved_post_service,
            explore_feed,
            search,
        }
    }

    /// ローカル sqlite をドキュメントストアとして使うセッションを作る
    pub async fn with_sqlite(
        config: AppConfig,
        auth: Arc<dyn AuthOracle>,
    ) -> Result<Self, AppError> {
        let pool = ConnectionPool::with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.connection_timeout),
        )
        .await?;
        pool.migrate().await?;
        info!(url = %config.database.url, "document store ready");

        let store = SqliteDocumentStore::new(pool, CollectionNames::from_config(&config.store));
        Ok(Self::new(config, Arc::new(store), auth))
    }

    async fn require_identity(&self) -> Result<AuthIdentity, AppError> {
        self.user_service.require_identity().await
    }

    /// 表示状態に未登録の投稿をサーバー上の状態で登録する
    async fn ensure_tracked(&self, post_id: &str) -> Result<(), AppError> {
        if self.interaction_service.is_tracked(post_id).await {
            return Ok(());
        }
        let post = self
            .post_service
            .post_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {post_id}")))?;
        let current_user = self.user_service.current_user().await?;
        self.interaction_service
            .track_post(&post, current_user.as_ref())
            .await;
        Ok(())
    }

    async fn track_new(&self, posts: &[Post]) -> Result<(), AppError> {
        let current_user = self.user_service.current_user().await?;
        for post in posts {
            if !self.interaction_service.is_tracked(&post.id).await {
                self.interaction_service
                    .track_post(post, current_user.as_ref())
                    .await;
            }
        }
        Ok(())
    }

    pub async fn like_post(&self, post_id: &str) -> Result<LikeSet, AppError> {
        let identity = self.require_identity().await?;
        self.ensure_tracked(post_id).await?;
        self.interaction_service
            .toggle_like(post_id, &identity.id)
            .await
    }

    pub async fn save_post(&self, post_id: &str) -> Result<SaveToggle, AppError> {
        let identity = self.require_identity().await?;
        self.ensure_tracked(post_id).await?;
        self.interaction_service
            .toggle_save(post_id, &identity.id)
            .await
    }

    pub async fn saved_posts(&self) -> Result<Vec<Post>, AppError> {
        let identity = self.require_identity().await?;
        let user = self
            .user_service
            .current_user()
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", identity.id)))?;
        self.saved_post_service.saved_posts(&user).await
    }

    /// 番兵要素の表示通知。検索中は通常フィードを読み込まない。
    pub async fn load_more(&self, visible: bool) -> Result<LoadOutcome, AppError> {
        self.require_identity().await?;
        let search_active = self.search.is_active().await;
        let outcome = self.explore_feed.on_sentinel(visible, search_active).await?;

        if let LoadOutcome::Appended { .. } = outcome {
            let pages = self.explore_feed.pages().await;
            if let Some(page) = pages.last() {
                self.track_new(&page.posts).await?;
            }
        }
        Ok(outcome)
    }

    /// サインアウト時にセッション内の状態をすべて捨てる
    pub async fn sign_out(&self) {
        self.search.clear().await;
        self.explore_feed.reset().await;
        self.interaction_service.clear().await;
        self.cache.clear().await;
        info!("session state cleared");
    }
}
