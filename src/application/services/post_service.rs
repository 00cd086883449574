use crate::application::ports::{
    Collection, DocumentQuery, DocumentStore, OrderBy, OrderField,
};
use crate::application::shared::mappers::{map_post_document, new_post_fields, post_update_fields};
use crate::domain::entities::{NewPost, Post, PostUpdate};
use crate::infrastructure::cache::{MutationOptions, QueryCache, QueryKey, QueryScope};
use crate::shared::config::FeedConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{debug, info};

/// フィードの 1 ページ。`next_cursor` は最後の投稿 ID（空ページなら `None`）。
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<String>,
}

impl FeedPage {
    pub fn new(posts: Vec<Post>) -> Self {
        let next_cursor = posts.last().map(|post| post.id.clone());
        Self { posts, next_cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

pub struct PostService {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
    feed: FeedConfig,
}

impl PostService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache, feed: FeedConfig) -> Self {
        Self { store, cache, feed }
    }

    pub fn page_size(&self) -> usize {
        self.feed.page_size
    }

    /// 新着投稿（作成日時の新しい順）
    pub async fn recent_posts(&self) -> Result<Vec<Post>, AppError> {
        let query = DocumentQuery::new()
            .order(OrderBy::desc(OrderField::CreatedAt))
            .limit(self.feed.recent_limit);
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(QueryKey::recent_posts(), move || list_posts(store, query))
            .await
    }

    pub async fn post_by_id(&self, post_id: &str) -> Result<Option<Post>, AppError> {
        if post_id.trim().is_empty() {
            return Err(AppError::InvalidInput("Post id must not be empty".to_string()));
        }

        let store = Arc::clone(&self.store);
        let id = post_id.to_string();
        self.cache
            .fetch(QueryKey::post_by_id(post_id), move || async move {
                match store.get_document(Collection::Posts, &id).await? {
                    Some(document) => map_post_document(&document).map(Some),
                    None => Ok(None),
                }
            })
            .await
    }

    pub async fn user_posts(&self, user_id: &str) -> Result<Vec<Post>, AppError> {
        let query = DocumentQuery::new()
            .equal("creator", user_id)
            .order(OrderBy::desc(OrderField::CreatedAt));
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(QueryKey::user_posts(user_id), move || list_posts(store, query))
            .await
    }

    /// 無限スクロールの 1 ページ。ページ単位でキャッシュされる。
    pub async fn feed_page(&self, cursor: Option<&str>) -> Result<FeedPage, AppError> {
        let query = DocumentQuery::new()
            .order(OrderBy::desc(OrderField::CreatedAt))
            .limit(self.feed.page_size)
            .cursor_after(cursor.map(str::to_string));
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(QueryKey::feed_page(cursor), move || async move {
                let posts = list_posts(store, query).await?;
                Ok(FeedPage::new(posts))
            })
            .await
    }

    /// キャプションの部分一致検索。空の検索語はリモートを呼ばずに空結果を返す。
    pub async fn search_posts(&self, term: &str) -> Result<Vec<Post>, AppError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let query = DocumentQuery::new()
            .search("caption", term)
            .order(OrderBy::desc(OrderField::CreatedAt));
        let store = Arc::clone(&self.store);
        debug!(term, "searching posts");
        self.cache
            .fetch(QueryKey::search_posts(term), move || list_posts(store, query))
            .await
    }

    pub async fn create_post(&self, new_post: NewPost) -> Result<Post, AppError> {
        let fields = new_post_fields(&new_post)?;
        let store = Arc::clone(&self.store);

        let post = self
            .cache
            .mutate(
                || async move {
                    let document = store.create_document(Collection::Posts, fields).await?;
                    map_post_document(&document)
                },
                MutationOptions::new()
                    .invalidate(QueryKey::recent_posts())
                    .invalidate(QueryKey::user_posts(&new_post.creator_id))
                    .invalidate_scope(QueryScope::FeedPage),
            )
            .await?;

        info!(post_id = %post.id, creator = %post.creator_id, "post created");
        Ok(post)
    }

    pub async fn update_post(&self, post_id: &str, update: PostUpdate) -> Result<Post, AppError> {
        if update.is_empty() {
            return Err(AppError::InvalidInput("Post update is empty".to_string()));
        }

        let patch = post_update_fields(&update)?;
        let store = Arc::clone(&self.store);
        let id = post_id.to_string();

        self.cache
            .mutate(
                || async move {
                    let document = store.update_document(Collection::Posts, &id, patch).await?;
                    map_post_document(&document)
                },
                MutationOptions::new()
                    .invalidate(QueryKey::post_by_id(post_id))
                    .invalidate(QueryKey::recent_posts())
                    .invalidate_scope(QueryScope::UserPosts)
                    .invalidate_scope(QueryScope::FeedPage),
            )
            .await
    }
}

async fn list_posts(
    store: Arc<dyn DocumentStore>,
    query: DocumentQuery,
) -> Result<Vec<Post>, AppError> {
    let documents = store.list_documents(Collection::Posts, &query).await?;
    documents.iter().map(map_post_document).collect()
}
