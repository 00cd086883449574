use super::save_record::SaveRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    /// 保存関係の一覧（作成順）
    pub saves: Vec<SaveRecord>,
}

impl User {
    /// 指定した投稿に対する保存レコードを返す
    pub fn save_record_for(&self, post_id: &str) -> Option<&SaveRecord> {
        self.saves
            .iter()
            .find(|record| record.matches(&self.id, post_id))
    }

    pub fn has_saved(&self, post_id: &str) -> bool {
        self.save_record_for(post_id).is_some()
    }

    pub fn saved_post_ids(&self) -> Vec<String> {
        self.saves
            .iter()
            .filter(|record| record.user_id() == self.id)
            .map(|record| record.post_id().to_string())
            .collect()
    }
}

/// プロフィール編集の差分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
