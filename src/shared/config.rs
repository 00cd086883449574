use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 楽観的更新が失敗したときの扱い
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimisticPolicy {
    /// 失敗時に操作前のスナップショットへ戻す
    #[default]
    RollbackOnFailure,
    /// 失敗してもローカル状態を維持する（次回の再取得まで乖離を許容）
    KeepOnFailure,
}

/// 保存済み投稿一覧の並び順
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SavedPostOrder {
    /// fan-out の完了順
    Settled,
    /// 保存日時の新しい順
    #[default]
    SaveRecency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub feed: FeedConfig,
    pub search: SearchConfig,
    pub interaction: InteractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub storage_id: String,
    pub user_collection_id: String,
    pub post_collection_id: String,
    pub saves_collection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub data_dir: String,
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: usize,
    pub recent_limit: usize,
    pub users_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionConfig {
    #[serde(default)]
    pub optimistic_policy: OptimisticPolicy,
    #[serde(default)]
    pub saved_post_order: SavedPostOrder,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        let url = format!("sqlite:{}/momentr.db?mode=rwc", data_dir.display());

        Self {
            store: StoreConfig {
                endpoint: "https://cloud.appwrite.io/v1".to_string(),
                project_id: "momentr".to_string(),
                database_id: "momentr-db".to_string(),
                storage_id: "momentr-storage".to_string(),
                user_collection_id: "users".to_string(),
                post_collection_id: "posts".to_string(),
                saves_collection_id: "saves".to_string(),
            },
            database: DatabaseConfig {
                data_dir: data_dir.display().to_string(),
                url,
                max_connections: 5,
                connection_timeout: 30,
            },
            cache: CacheConfig { max_entries: 512 },
            feed: FeedConfig {
                page_size: 9,
                recent_limit: 20,
                users_limit: 10,
            },
            search: SearchConfig { debounce_ms: 500 },
            interaction: InteractionConfig {
                optimistic_policy: OptimisticPolicy::default(),
                saved_post_order: SavedPostOrder::default(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        // 既定値
        let mut cfg = Self::default();

        // リモートストア識別子
        if let Ok(v) = std::env::var("MOMENTR_STORE_ENDPOINT") {
            cfg.store.endpoint = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_PROJECT_ID") {
            cfg.store.project_id = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_DATABASE_ID") {
            cfg.store.database_id = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_STORAGE_ID") {
            cfg.store.storage_id = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_USER_COLLECTION_ID") {
            cfg.store.user_collection_id = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_POST_COLLECTION_ID") {
            cfg.store.post_collection_id = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_SAVES_COLLECTION_ID") {
            cfg.store.saves_collection_id = v;
        }

        // ローカル DB
        if let Ok(v) = std::env::var("MOMENTR_DATA_DIR") {
            cfg.database.url = format!("sqlite:{}/momentr.db?mode=rwc", v.trim_end_matches('/'));
            cfg.database.data_dir = v;
        }
        if let Ok(v) = std::env::var("MOMENTR_DATABASE_URL") {
            cfg.database.url = v;
        }
        if let Some(value) = env_parsed("MOMENTR_DATABASE_MAX_CONNECTIONS", parse_u32) {
            cfg.database.max_connections = value;
        }

        if let Some(value) = env_parsed("MOMENTR_CACHE_MAX_ENTRIES", parse_usize) {
            cfg.cache.max_entries = value.max(1);
        }

        if let Some(value) = env_parsed("MOMENTR_FEED_PAGE_SIZE", parse_usize) {
            cfg.feed.page_size = value.max(1);
        }
        if let Some(value) = env_parsed("MOMENTR_RECENT_LIMIT", parse_usize) {
            cfg.feed.recent_limit = value.max(1);
        }
        if let Some(value) = env_parsed("MOMENTR_USERS_LIMIT", parse_usize) {
            cfg.feed.users_limit = value.max(1);
        }

        if let Some(value) = env_parsed("MOMENTR_SEARCH_DEBOUNCE_MS", parse_u64) {
            cfg.search.debounce_ms = value;
        }

        if let Ok(v) = std::env::var("MOMENTR_ROLLBACK_OPTIMISTIC") {
            let rollback = parse_bool(
                &v,
                cfg.interaction.optimistic_policy == OptimisticPolicy::RollbackOnFailure,
            );
            cfg.interaction.optimistic_policy = if rollback {
                OptimisticPolicy::RollbackOnFailure
            } else {
                OptimisticPolicy::KeepOnFailure
            };
        }
        if let Ok(v) = std::env::var("MOMENTR_SAVED_POST_ORDER") {
            match v.trim().to_ascii_lowercase().as_str() {
                "settled" => cfg.interaction.saved_post_order = SavedPostOrder::Settled,
                "save_recency" | "recency" => {
                    cfg.interaction.saved_post_order = SavedPostOrder::SaveRecency
                }
                other => tracing::warn!("Ignoring unknown MOMENTR_SAVED_POST_ORDER: {other}"),
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.store.project_id.trim().is_empty() {
            return Err("Store project_id must not be empty".to_string());
        }
        if self.store.database_id.trim().is_empty() {
            return Err("Store database_id must not be empty".to_string());
        }
        let collections = [
            &self.store.user_collection_id,
            &self.store.post_collection_id,
            &self.store.saves_collection_id,
        ];
        if collections.iter().any(|id| id.trim().is_empty()) {
            return Err("Store collection ids must not be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.cache.max_entries == 0 {
            return Err("Cache max_entries must be greater than 0".to_string());
        }
        if self.feed.page_size == 0 {
            return Err("Feed page_size must be greater than 0".to_string());
        }
        if self.feed.recent_limit == 0 {
            return Err("Feed recent_limit must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("momentr"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn env_parsed<T>(key: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    std::env::var(key).ok().and_then(|v| parse(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok()
}
