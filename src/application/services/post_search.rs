use super::post_service::PostService;
use crate::domain::entities::Post;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 適用済みの検索結果。`generation` は発行時の世代番号。
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub generation: u64,
    pub posts: Vec<Post>,
}

#[derive(Default)]
struct SearchState {
    query: String,
    /// 入力のたびに進む。デバウンス待ちの発火可否に使う。
    revision: u64,
    /// 検索発行と検索解除のたびに進む。応答の採否に使う。
    generation: u64,
    results: Option<SearchResults>,
    fetching: bool,
    last_error: Option<AppError>,
}

/// デバウンス付きの投稿検索
#[derive(Clone)]
pub struct PostSearchCoordinator {
    posts: Arc<PostService>,
    debounce: Duration,
    state: Arc<Mutex<SearchState>>,
}

impl PostSearchCoordinator {
    pub fn new(posts: Arc<PostService>, debounce: Duration) -> Self {
        Self {
            posts,
            debounce,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    /// 入力値はすぐに反映し、検索は入力が止まってから末尾の値でだけ発行する。
    /// 空白のみの入力は検索を解除し、発行済みの応答も無効にする。
    pub async fn set_query(&self, text: &str) {
        let term = text.trim().to_string();
        let revision = {
            let mut state = self.state.lock().await;
            state.query = text.to_string();
            state.revision += 1;
            if term.is_empty() {
                state.generation += 1;
                state.results = None;
                state.fetching = false;
                state.last_error = None;
                debug!("search cleared");
                return;
            }
            state.revision
        };

        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(coordinator.debounce).await;
            coordinator.fire(revision, term).await;
        });
    }

    async fn fire(&self, revision: u64, term: String) {
        let generation = {
            let mut state = self.state.lock().await;
            if state.revision != revision {
                return;
            }
            state.generation += 1;
            state.fetching = true;
            state.generation
        };
        debug!(term = %term, generation, "search issued");

        let result = self.posts.search_posts(&term).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(term = %term, generation, current = state.generation, "discarding stale search response");
            return;
        }
        state.fetching = false;
        match result {
            Ok(posts) => {
                state.results = Some(SearchResults {
                    query: term,
                    generation,
                    posts,
                });
                state.last_error = None;
            }
            Err(err) => {
                warn!(term = %term, error = %err, "search failed");
                state.last_error = Some(err);
            }
        }
    }

    pub async fn query(&self) -> String {
        self.state.lock().await.query.clone()
    }

    /// 検索が有効か。無効なときは通常のフィードを表示する。
    pub async fn is_active(&self) -> bool {
        !self.state.lock().await.query.trim().is_empty()
    }

    pub async fn results(&self) -> Option<SearchResults> {
        self.state.lock().await.results.clone()
    }

    pub async fn is_fetching(&self) -> bool {
        self.state.lock().await.fetching
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    pub async fn last_error(&self) -> Option<AppError> {
        self.state.lock().await.last_error.clone()
    }

    pub async fn clear(&self) {
        self.set_query("").await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{Collection, DocumentStore, QueryFilter};
    use crate::application::shared::tests::{seed_post, ScriptedStore, StoreCall};
    use crate::infrastructure::cache::QueryCache;
    use crate::shared::config::AppConfig;

    async fn coordinator() -> (PostSearchCoordinator, Arc<ScriptedStore>) {
        let store = Arc::new(ScriptedStore::new());
        seed_post(&store.inner, "p1", "u1", "sunset over the sea").await;
        seed_post(&store.inner, "p2", "u1", "sunrise hike").await;
        seed_post(&store.inner, "p3", "u1", "city lights").await;
        let posts = PostService::new(
            store.clone() as Arc<dyn DocumentStore>,
            QueryCache::new(32),
            AppConfig::default().feed,
        );
        (
            PostSearchCoordinator::new(Arc::new(posts), Duration::from_millis(500)),
            store,
        )
    }

    async fn searched_terms(store: &ScriptedStore) -> Vec<String> {
        store
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::List(Collection::Posts, query) => {
                    query.filters.into_iter().find_map(|filter| match filter {
                        QueryFilter::Search { term, .. } => Some(term),
                        _ => None,
                    })
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn only_trailing_input_is_searched() {
        let (search, store) = coordinator().await;

        for text in ["s", "su", "sun"] {
            search.set_query(text).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(search.query().await, "sun");
        assert!(searched_terms(&store).await.is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(searched_terms(&store).await, vec!["sun".to_string()]);
        let results = search.results().await.unwrap();
        assert_eq!(results.query, "sun");
        assert_eq!(results.generation, 1);
        assert_eq!(results.posts.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded() {
        let (search, store) = coordinator().await;
        store.delay("sunset", Duration::from_millis(1_000)).await;

        search.set_query("sunset").await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(search.is_fetching().await);

        search.set_query("city").await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        let latest = search.results().await.unwrap();
        assert_eq!(latest.query, "city");
        assert_eq!(latest.generation, 2);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        let still_latest = search.results().await.unwrap();
        assert_eq!(still_latest.query, "city");
        assert_eq!(still_latest.generation, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_disables_search() {
        let (search, store) = coordinator().await;

        search.set_query("   ").await;
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(!search.is_active().await);
        assert!(search.results().await.is_none());
        assert!(store.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_drops_in_flight_response() {
        let (search, store) = coordinator().await;
        store.delay("city", Duration::from_millis(1_000)).await;

        search.set_query("city").await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        search.clear().await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        assert!(!search.is_active().await);
        assert!(search.results().await.is_none());
        assert!(!search.is_fetching().await);
    }
}
