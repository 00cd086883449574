use super::query_key::{QueryKey, QueryScope};
use crate::shared::config::CacheConfig;
use crate::shared::error::AppError;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

type AnyValue = Arc<dyn Any + Send + Sync>;
type LoadResult = Result<AnyValue, AppError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

const EVENT_CAPACITY: usize = 256;

enum EntryState {
    Loading {
        load_id: u64,
        load: SharedLoad,
        invalidated: bool,
    },
    Ready {
        value: AnyValue,
        stale: bool,
    },
}

struct CacheState {
    entries: LruCache<QueryKey, EntryState>,
    next_load_id: u64,
}

enum Lookup {
    Hit(AnyValue),
    Join(SharedLoad),
    AwaitInvalidated(SharedLoad),
    Miss,
}

/// エントリの状態（テストと UI のローディング表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Loading,
    Fresh,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    Updated,
    Invalidated,
    Removed,
    Cleared,
}

/// キャッシュの変更通知。`Cleared` のみ `key` が `None`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: Option<QueryKey>,
    pub kind: CacheEventKind,
}

/// 変更通知の購読。キー指定の購読は該当キーと `Cleared` だけを受け取る。
pub struct CacheSubscription {
    receiver: broadcast::Receiver<CacheEvent>,
    key: Option<QueryKey>,
}

impl CacheSubscription {
    /// 次の通知を待つ。キャッシュが破棄されると `None`。
    pub async fn recv(&mut self) -> Option<CacheEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    let matches = match (&self.key, &event.key) {
                        (None, _) | (_, None) => true,
                        (Some(wanted), Some(key)) => wanted == key,
                    };
                    if matches {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "cache subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// `mutate` の後処理。成功時に無効化するキーとコールバックを持つ。
pub struct MutationOptions<T> {
    pub invalidates: Vec<QueryKey>,
    pub invalidate_scopes: Vec<QueryScope>,
    pub on_success: Option<Box<dyn FnOnce(&T) + Send>>,
    pub on_error: Option<Box<dyn FnOnce(&AppError) + Send>>,
}

impl<T> Default for MutationOptions<T> {
    fn default() -> Self {
        Self {
            invalidates: Vec::new(),
            invalidate_scopes: Vec::new(),
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> MutationOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn invalidate_scope(mut self, scope: QueryScope) -> Self {
        self.invalidate_scopes.push(scope);
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl FnOnce(&AppError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

/// セッション単位のクエリキャッシュ兼ミューテーション調停役。
///
/// 同じキーへの同時 `fetch` は一つのロードを共有する。ロックは await をまたいで保持しない。
#[derive(Clone)]
pub struct QueryCache {
    state: Arc<Mutex<CacheState>>,
    events: broadcast::Sender<CacheEvent>,
    max_entries: usize,
}

impl QueryCache {
    pub fn new(max_entries: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                next_load_id: 0,
            })),
            events,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries)
    }

    /// キャッシュ済みで新鮮ならその値を返し、そうでなければ `loader` を一度だけ走らせる
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, loader: F) -> Result<T, AppError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let mut loader = Some(loader);
        loop {
            let mut state = self.state.lock().await;
            let lookup = match state.entries.get(&key) {
                Some(EntryState::Ready {
                    value,
                    stale: false,
                }) => Lookup::Hit(Arc::clone(value)),
                Some(EntryState::Loading {
                    load,
                    invalidated: false,
                    ..
                }) => Lookup::Join(load.clone()),
                Some(EntryState::Loading {
                    load,
                    invalidated: true,
                    ..
                }) => Lookup::AwaitInvalidated(load.clone()),
                Some(EntryState::Ready { stale: true, .. }) | None => Lookup::Miss,
            };

            match lookup {
                Lookup::Hit(value) => {
                    drop(state);
                    debug!(key = %key, "query cache hit");
                    return downcast_value(&key, value);
                }
                Lookup::Join(load) => {
                    drop(state);
                    debug!(key = %key, "joining in-flight load");
                    return downcast_value(&key, load.await?);
                }
                Lookup::AwaitInvalidated(load) => {
                    drop(state);
                    debug!(key = %key, "waiting for invalidated load to settle");
                    let _ = load.await;
                    continue;
                }
                Lookup::Miss => {}
            }

            let Some(loader) = loader.take() else {
                return Err(AppError::Internal(format!(
                    "loader for {key} was consumed before a load started"
                )));
            };
            let load_id = state.next_load_id;
            state.next_load_id += 1;
            let load = self.start_load(key.clone(), load_id, loader());
            state.entries.put(
                key.clone(),
                EntryState::Loading {
                    load_id,
                    load: load.clone(),
                    invalidated: false,
                },
            );
            drop(state);

            debug!(key = %key, load_id, "query cache miss, loading");
            return downcast_value(&key, load.await?);
        }
    }

    fn start_load<T, Fut>(&self, key: QueryKey, load_id: u64, loader: Fut) -> SharedLoad
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let state = Arc::downgrade(&self.state);
        let events = self.events.clone();
        let max_entries = self.max_entries;

        let load = async move {
            let result = loader.await.map(|value| Arc::new(value) as AnyValue);
            settle(&state, &events, &key, load_id, &result, max_entries).await;
            result
        }
        .boxed()
        .shared();

        // 呼び出し元がドロップされてもロードは完了させる
        tokio::spawn(load.clone());
        load
    }

    /// 次の `fetch` で再取得させる。ロード中なら結果は stale として格納される。
    pub async fn invalidate(&self, key: &QueryKey) {
        let marked = {
            let mut state = self.state.lock().await;
            match state.entries.peek_mut(key) {
                Some(EntryState::Ready { stale, .. }) => {
                    *stale = true;
                    true
                }
                Some(EntryState::Loading { invalidated, .. }) => {
                    *invalidated = true;
                    true
                }
                None => false,
            }
        };

        if marked {
            debug!(key = %key, "query invalidated");
            self.emit(Some(key.clone()), CacheEventKind::Invalidated);
        }
    }

    pub async fn invalidate_scope(&self, scope: QueryScope) {
        let keys: Vec<QueryKey> = {
            let mut state = self.state.lock().await;
            state
                .entries
                .iter_mut()
                .filter(|(key, _)| key.scope == scope)
                .map(|(key, entry)| {
                    match entry {
                        EntryState::Ready { stale, .. } => *stale = true,
                        EntryState::Loading { invalidated, .. } => *invalidated = true,
                    }
                    key.clone()
                })
                .collect()
        };

        debug!(scope = %scope, count = keys.len(), "query scope invalidated");
        for key in keys {
            self.emit(Some(key), CacheEventKind::Invalidated);
        }
    }

    /// エントリを破棄する。ロード中の結果は格納されずに捨てられる。
    pub async fn remove(&self, key: &QueryKey) {
        let removed = self.state.lock().await.entries.pop(key).is_some();
        if removed {
            self.emit(Some(key.clone()), CacheEventKind::Removed);
        }
    }

    /// セッション終了時に全エントリを破棄する
    pub async fn clear(&self) {
        let count = {
            let mut state = self.state.lock().await;
            let count = state.entries.len();
            state.entries.clear();
            count
        };
        debug!(count, "query cache cleared");
        self.emit(None, CacheEventKind::Cleared);
    }

    pub async fn set_query_data<T>(&self, key: QueryKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let evicted = {
            let mut state = self.state.lock().await;
            state.entries.put(
                key.clone(),
                EntryState::Ready {
                    value: Arc::new(value),
                    stale: false,
                },
            );
            evict_overflow(&mut state.entries, self.max_entries)
        };

        self.emit(Some(key), CacheEventKind::Updated);
        for key in evicted {
            self.emit(Some(key), CacheEventKind::Removed);
        }
    }

    /// 格納済みの値を返す（stale でも返す）。ロード中や未格納なら `None`。
    pub async fn get_query_data<T>(&self, key: &QueryKey) -> Result<Option<T>, AppError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = {
            let mut state = self.state.lock().await;
            match state.entries.get(key) {
                Some(EntryState::Ready { value, .. }) => Some(Arc::clone(value)),
                _ => None,
            }
        };

        value.map(|value| downcast_value(key, value)).transpose()
    }

    /// 無効化されていない格納済みの値だけを返す
    pub async fn get_fresh_query_data<T>(&self, key: &QueryKey) -> Result<Option<T>, AppError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let value = {
            let mut state = self.state.lock().await;
            match state.entries.get(key) {
                Some(EntryState::Ready {
                    value,
                    stale: false,
                }) => Some(Arc::clone(value)),
                _ => None,
            }
        };

        value.map(|value| downcast_value(key, value)).transpose()
    }

    pub async fn status(&self, key: &QueryKey) -> Option<EntryStatus> {
        let state = self.state.lock().await;
        state.entries.peek(key).map(|entry| match entry {
            EntryState::Loading { .. } => EntryStatus::Loading,
            EntryState::Ready { stale: false, .. } => EntryStatus::Fresh,
            EntryState::Ready { stale: true, .. } => EntryStatus::Stale,
        })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// ミューテーションを実行し、成功時は無効化してから `on_success` を呼ぶ。
    /// 失敗時は `on_error` を呼んでエラーを返し、何も無効化しない。
    pub async fn mutate<T, F, Fut>(
        &self,
        mutation: F,
        options: MutationOptions<T>,
    ) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let MutationOptions {
            invalidates,
            invalidate_scopes,
            on_success,
            on_error,
        } = options;

        match mutation().await {
            Ok(value) => {
                for key in &invalidates {
                    self.invalidate(key).await;
                }
                for scope in invalidate_scopes {
                    self.invalidate_scope(scope).await;
                }
                if let Some(callback) = on_success {
                    callback(&value);
                }
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "mutation failed");
                if let Some(callback) = on_error {
                    callback(&err);
                }
                Err(err)
            }
        }
    }

    pub fn subscribe(&self, key: QueryKey) -> CacheSubscription {
        CacheSubscription {
            receiver: self.events.subscribe(),
            key: Some(key),
        }
    }

    pub fn subscribe_all(&self) -> CacheSubscription {
        CacheSubscription {
            receiver: self.events.subscribe(),
            key: None,
        }
    }

    fn emit(&self, key: Option<QueryKey>, kind: CacheEventKind) {
        // 購読者がいなければ送信エラーになるが問題ない
        let _ = self.events.send(CacheEvent { key, kind });
    }
}

async fn settle(
    state: &Weak<Mutex<CacheState>>,
    events: &broadcast::Sender<CacheEvent>,
    key: &QueryKey,
    load_id: u64,
    result: &LoadResult,
    max_entries: usize,
) {
    let Some(state) = state.upgrade() else {
        return;
    };

    let (kind, evicted) = {
        let mut state = state.lock().await;
        let invalidated = match state.entries.peek(key) {
            Some(EntryState::Loading {
                load_id: current,
                invalidated,
                ..
            }) if *current == load_id => *invalidated,
            _ => {
                debug!(key = %key, load_id, "dropping result of superseded load");
                return;
            }
        };

        match result {
            Ok(value) => {
                state.entries.put(
                    key.clone(),
                    EntryState::Ready {
                        value: Arc::clone(value),
                        stale: invalidated,
                    },
                );
                let evicted = evict_overflow(&mut state.entries, max_entries);
                (CacheEventKind::Updated, evicted)
            }
            Err(err) => {
                state.entries.pop(key);
                warn!(key = %key, error = %err, "query load failed");
                (CacheEventKind::Removed, Vec::new())
            }
        }
    };

    let _ = events.send(CacheEvent {
        key: Some(key.clone()),
        kind,
    });
    for key in evicted {
        let _ = events.send(CacheEvent {
            key: Some(key),
            kind: CacheEventKind::Removed,
        });
    }
}

/// 上限を超えた分を古い順に追い出す。ロード中のエントリは対象外。
fn evict_overflow(entries: &mut LruCache<QueryKey, EntryState>, max_entries: usize) -> Vec<QueryKey> {
    if entries.len() <= max_entries {
        return Vec::new();
    }
    let overflow = entries.len() - max_entries;
    let victims: Vec<QueryKey> = entries
        .iter()
        .rev()
        .filter(|(_, entry)| matches!(entry, EntryState::Ready { .. }))
        .map(|(key, _)| key.clone())
        .take(overflow)
        .collect();

    for key in &victims {
        entries.pop(key);
        debug!(key = %key, "evicted query cache entry");
    }
    victims
}

fn downcast_value<T>(key: &QueryKey, value: AnyValue) -> Result<T, AppError>
where
    T: Clone + Send + Sync + 'static,
{
    value
        .downcast::<T>()
        .map(|value| value.as_ref().clone())
        .map_err(|_| {
            AppError::Internal(format!(
                "cached value for {key} is not a {}",
                std::any::type_name::<T>()
            ))
        })
}
