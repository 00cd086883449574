use super::{fields_from, fields_of};
use crate::application::ports::{Collection, Document};
use crate::domain::entities::{NewPost, Post, PostUpdate};
use crate::domain::value_objects::LikeSet;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize)]
struct PostFields {
    creator: String,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    likes: LikeSet,
}

pub(crate) fn map_post_document(document: &Document) -> Result<Post, AppError> {
    let fields: PostFields = fields_of(document, Collection::Posts)?;

    Ok(Post {
        id: document.id.clone(),
        creator_id: fields.creator,
        caption: fields.caption,
        tags: fields.tags,
        image_url: fields.image_url,
        image_id: fields.image_id,
        location: fields.location,
        created_at: document.created_at,
        updated_at: document.updated_at,
        likes: fields.likes,
    })
}

pub(crate) fn new_post_fields(post: &NewPost) -> Result<Map<String, Value>, AppError> {
    if post.creator_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Post creator must not be empty".to_string(),
        ));
    }

    fields_from(&PostFields {
        creator: post.creator_id.clone(),
        caption: post.caption.clone(),
        tags: post.tags.clone(),
        image_url: post.image_url.clone(),
        image_id: post.image_id.clone(),
        location: post.location.clone(),
        likes: LikeSet::default(),
    })
}

pub(crate) fn post_update_fields(update: &PostUpdate) -> Result<Map<String, Value>, AppError> {
    fields_from(update)
}

/// いいね集合を丸ごと上書きするためのパッチ
pub(crate) fn likes_patch(likes: &LikeSet) -> Result<Map<String, Value>, AppError> {
    let mut patch = Map::new();
    patch.insert("likes".to_string(), serde_json::to_value(likes)?);
    Ok(patch)
}
