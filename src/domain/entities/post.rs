use crate::domain::value_objects::LikeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub creator_id: String,
    pub caption: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub image_id: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: LikeSet,
}

impl Post {
    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.contains(user_id)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }
}

/// 新規投稿の入力
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub creator_id: String,
    pub caption: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub image_id: Option<String>,
    pub location: Option<String>,
}

impl NewPost {
    pub fn new(creator_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            creator_id: creator_id.into(),
            caption: caption.into(),
            tags: Vec::new(),
            image_url: None,
            image_id: None,
            location: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_image(mut self, image_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// 投稿編集の差分。`None` のフィールドは変更しない。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl PostUpdate {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.tags.is_none()
            && self.location.is_none()
            && self.image_url.is_none()
            && self.image_id.is_none()
    }
}

/// "travel, food ,sea" のようなカンマ区切り入力をタグ一覧へ変換する。
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.split_whitespace().collect::<String>())
        .filter(|tag| !tag.is_empty())
        .collect()
}
