pub(crate) mod posts;
pub(crate) mod users;

use crate::application::ports::{Collection, Document};
use crate::shared::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

pub(crate) use posts::{likes_patch, map_post_document, new_post_fields, post_update_fields};
pub(crate) use users::{map_save_document, map_user_document, profile_update_fields, save_fields};

/// ドキュメントの `data` を型付きのフィールド構造体へ変換する
fn fields_of<T: DeserializeOwned>(
    document: &Document,
    expected: Collection,
) -> Result<T, AppError> {
    if document.collection != expected {
        return Err(AppError::DeserializationError(format!(
            "Document {} belongs to {}, expected {}",
            document.id, document.collection, expected
        )));
    }

    serde_json::from_value(Value::Object(document.data.clone())).map_err(|err| {
        AppError::DeserializationError(format!(
            "Malformed {} document {}: {err}",
            expected, document.id
        ))
    })
}

fn fields_from<T: Serialize>(value: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::SerializationError(format!(
            "Expected an object, got {other}"
        ))),
    }
}
