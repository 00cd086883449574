use crate::application::ports::{Collection, DocumentStore};
use crate::application::shared::fan_out::resolve_many_by_id;
use crate::application::shared::mappers::map_post_document;
use crate::domain::entities::{Post, SaveRecord, User};
use crate::infrastructure::cache::{QueryCache, QueryKey};
use crate::shared::config::SavedPostOrder;
use crate::shared::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 保存レコードから投稿本体を解決する
pub struct SavedPostService {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
    order: SavedPostOrder,
}

impl SavedPostService {
    pub fn new(store: Arc<dyn DocumentStore>, cache: QueryCache, order: SavedPostOrder) -> Self {
        Self {
            store,
            cache,
            order,
        }
    }

    /// 投稿ごとに 1 回ずつ並行に取得する。取得できなかった投稿は結果から落とす。
    pub async fn resolve(&self, saves: &[SaveRecord]) -> Vec<Post> {
        resolve_saved(Arc::clone(&self.store), saves.to_vec(), self.order).await
    }

    /// 現在のユーザーの保存済み投稿。ユーザー単位でキャッシュされる。
    pub async fn saved_posts(&self, user: &User) -> Result<Vec<Post>, AppError> {
        let saves: Vec<SaveRecord> = user
            .saves
            .iter()
            .filter(|record| record.user_id() == user.id)
            .cloned()
            .collect();
        let store = Arc::clone(&self.store);
        let order = self.order;

        self.cache
            .fetch(QueryKey::saved_posts(&user.id), move || async move {
                Ok(resolve_saved(store, saves, order).await)
            })
            .await
    }
}

async fn resolve_saved(
    store: Arc<dyn DocumentStore>,
    mut saves: Vec<SaveRecord>,
    order: SavedPostOrder,
) -> Vec<Post> {
    if saves.is_empty() {
        return Vec::new();
    }

    if order == SavedPostOrder::SaveRecency {
        saves.sort_by_key(|record| std::cmp::Reverse(record.created_at()));
    }
    let ids: Vec<String> = saves
        .iter()
        .map(|record| record.post_id().to_string())
        .collect();

    let mut posts = resolve_many_by_id(ids.clone(), |id| {
        let store = Arc::clone(&store);
        async move {
            match store.get_document(Collection::Posts, &id).await? {
                Some(document) => map_post_document(&document).map(Some),
                None => Ok(None),
            }
        }
    })
    .await;

    if order == SavedPostOrder::SaveRecency {
        let mut rank: HashMap<&str, usize> = HashMap::new();
        for (index, id) in ids.iter().enumerate() {
            rank.entry(id.as_str()).or_insert(index);
        }
        posts.sort_by_key(|post| rank.get(post.id.as_str()).copied().unwrap_or(usize::MAX));
    }

    debug!(requested = ids.len(), resolved = posts.len(), "resolved saved posts");
    posts
}
