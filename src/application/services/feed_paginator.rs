use super::post_service::{FeedPage, PostService};
use crate::domain::entities::Post;
use crate::shared::error::AppError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStatus {
    Idle,
    Fetching,
    /// 空ページを受け取った。これ以上は読み込まない。
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Appended { page_len: usize },
    ReachedEnd,
    /// 読み込み中・終端・条件不一致のため何もしなかった
    Skipped,
}

struct PaginationState {
    pages: Vec<FeedPage>,
    status: PaginationStatus,
    /// `reset` のたびに進む。古い世代の応答は捨てる。
    epoch: u64,
}

/// 無限スクロールのカーソル管理
pub struct FeedPaginator {
    posts: Arc<PostService>,
    state: Mutex<PaginationState>,
}

impl FeedPaginator {
    pub fn new(posts: Arc<PostService>) -> Self {
        Self {
            posts,
            state: Mutex::new(PaginationState {
                pages: Vec::new(),
                status: PaginationStatus::Idle,
                epoch: 0,
            }),
        }
    }

    /// 次のページを読み込む。失敗時は Idle に戻り、カーソルは進めない。
    pub async fn load_next_page(&self) -> Result<LoadOutcome, AppError> {
        let (cursor, epoch) = {
            let mut state = self.state.lock().await;
            if state.status != PaginationStatus::Idle {
                debug!(status = ?state.status, "load_next_page skipped");
                return Ok(LoadOutcome::Skipped);
            }
            state.status = PaginationStatus::Fetching;
            let cursor = state.pages.last().and_then(|page| page.next_cursor.clone());
            (cursor, state.epoch)
        };

        let result = self.posts.feed_page(cursor.as_deref()).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!("discarding feed page fetched before reset");
            return Ok(LoadOutcome::Skipped);
        }

        match result {
            Ok(page) if page.is_empty() => {
                state.status = PaginationStatus::Terminal;
                info!(pages = state.pages.len(), "feed reached its end");
                Ok(LoadOutcome::ReachedEnd)
            }
            Ok(page) => {
                let page_len = page.posts.len();
                state.pages.push(page);
                state.status = PaginationStatus::Idle;
                debug!(page_len, pages = state.pages.len(), "feed page appended");
                Ok(LoadOutcome::Appended { page_len })
            }
            Err(err) => {
                state.status = PaginationStatus::Idle;
                warn!(error = %err, retryable = err.is_transient(), "feed page failed");
                Err(err)
            }
        }
    }

    /// 読み込み用の番兵要素が見えていて、検索中でないときだけ読み込む
    pub async fn on_sentinel(
        &self,
        visible: bool,
        search_active: bool,
    ) -> Result<LoadOutcome, AppError> {
        if !visible || search_active {
            return Ok(LoadOutcome::Skipped);
        }
        self.load_next_page().await
    }

    pub async fn posts(&self) -> Vec<Post> {
        let state = self.state.lock().await;
        state
            .pages
            .iter()
            .flat_map(|page| page.posts.iter().cloned())
            .collect()
    }

    pub async fn pages(&self) -> Vec<FeedPage> {
        self.state.lock().await.pages.clone()
    }

    pub async fn status(&self) -> PaginationStatus {
        self.state.lock().await.status
    }

    pub async fn has_next_page(&self) -> bool {
        self.status().await != PaginationStatus::Terminal
    }

    /// 画面破棄時に全ページを捨てる
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.pages.clear();
        state.status = PaginationStatus::Idle;
        state.epoch += 1;
    }
}
