use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ユーザーが投稿を保存したことを表す関係レコード。
///
/// (user, post) の組につき高々 1 件であることが前提。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRecord {
    id: String,
    user_id: String,
    post_id: String,
    created_at: DateTime<Utc>,
}

impl SaveRecord {
    /// 既存レコードから復元する。
    pub fn from_parts(
        id: String,
        user_id: String,
        post_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            post_id,
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn matches(&self, user_id: &str, post_id: &str) -> bool {
        self.user_id == user_id && self.post_id == post_id
    }
}
