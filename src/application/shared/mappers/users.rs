use super::{fields_from, fields_of};
use crate::application::ports::{Collection, Document};
use crate::domain::entities::{ProfileUpdate, SaveRecord, User};
use crate::shared::error::AppError;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct UserFields {
    #[serde(default)]
    name: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    bio: String,
}

#[derive(Debug, Deserialize)]
struct SaveFields {
    user: String,
    post: String,
}

/// ユーザードキュメントと、別途取得した保存レコードから `User` を組み立てる
pub(crate) fn map_user_document(
    document: &Document,
    saves: Vec<SaveRecord>,
) -> Result<User, AppError> {
    let fields: UserFields = fields_of(document, Collection::Users)?;

    Ok(User {
        id: document.id.clone(),
        name: fields.name,
        username: fields.username,
        email: fields.email,
        image_url: fields.image_url,
        bio: fields.bio,
        created_at: document.created_at,
        saves,
    })
}

pub(crate) fn map_save_document(document: &Document) -> Result<SaveRecord, AppError> {
    let fields: SaveFields = fields_of(document, Collection::Saves)?;

    Ok(SaveRecord::from_parts(
        document.id.clone(),
        fields.user,
        fields.post,
        document.created_at,
    ))
}

pub(crate) fn save_fields(user_id: &str, post_id: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("user".to_string(), Value::String(user_id.to_string()));
    fields.insert("post".to_string(), Value::String(post_id.to_string()));
    fields
}

pub(crate) fn profile_update_fields(update: &ProfileUpdate) -> Result<Map<String, Value>, AppError> {
    fields_from(update)
}
