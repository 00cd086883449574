use super::error::StoreError;
use super::queries::{
    DELETE_DOCUMENT, INSERT_DOCUMENT, SELECT_DOCUMENT, SELECT_DOCUMENTS_BASE, UPDATE_DOCUMENT,
};
use crate::application::ports::{
    Collection, Document, DocumentQuery, DocumentStore, OrderField, QueryFilter,
};
use crate::infrastructure::database::ConnectionPool;
use crate::shared::config::StoreConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::FromRow;

/// 論理コレクションと永続化上のコレクション ID の対応
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub users: String,
    pub posts: String,
    pub saves: String,
}

impl CollectionNames {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            users: config.user_collection_id.clone(),
            posts: config.post_collection_id.clone(),
            saves: config.saves_collection_id.clone(),
        }
    }

    pub fn name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Users => &self.users,
            Collection::Posts => &self.posts,
            Collection::Saves => &self.saves,
        }
    }
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            users: Collection::Users.as_str().to_string(),
            posts: Collection::Posts.as_str().to_string(),
            saves: Collection::Saves.as_str().to_string(),
        }
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    seq: i64,
    id: String,
    data: String,
    created_at: i64,
    updated_at: i64,
}

impl DocumentRow {
    fn into_document(self, collection: Collection) -> Result<Document, StoreError> {
        let data = match serde_json::from_str::<Value>(&self.data) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(StoreError::Malformed {
                    id: self.id,
                    reason: format!("expected a JSON object, got {other}"),
                })
            }
            Err(err) => {
                return Err(StoreError::Malformed {
                    id: self.id,
                    reason: err.to_string(),
                })
            }
        };
        let created_at = millis_to_datetime(self.created_at)
            .ok_or_else(|| StoreError::InvalidTimestamp(self.id.clone()))?;
        let updated_at = millis_to_datetime(self.updated_at)
            .ok_or_else(|| StoreError::InvalidTimestamp(self.id.clone()))?;

        Ok(Document {
            id: self.id,
            collection,
            created_at,
            updated_at,
            data,
        })
    }

    fn order_value(&self, field: OrderField) -> i64 {
        match field {
            OrderField::CreatedAt => self.created_at,
            OrderField::UpdatedAt => self.updated_at,
        }
    }
}

enum SqlArg {
    Text(String),
    Integer(i64),
    Real(f64),
}

fn millis_to_datetime(value: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
}

fn json_path(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::UnsupportedFilter(field.to_string()));
    }
    Ok(format!("$.{field}"))
}

fn filter_arg(field: &str, value: &Value) -> Result<SqlArg, StoreError> {
    match value {
        Value::String(text) => Ok(SqlArg::Text(text.clone())),
        Value::Bool(flag) => Ok(SqlArg::Integer(i64::from(*flag))),
        Value::Number(number) => number
            .as_i64()
            .map(SqlArg::Integer)
            .or_else(|| number.as_f64().map(SqlArg::Real))
            .ok_or_else(|| StoreError::UnsupportedFilter(field.to_string())),
        _ => Err(StoreError::UnsupportedFilter(field.to_string())),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn order_column(field: OrderField) -> &'static str {
    match field {
        OrderField::CreatedAt => "created_at",
        OrderField::UpdatedAt => "updated_at",
    }
}

/// SQLite 上に JSON ドキュメントを保持するローカルドキュメントストア
pub struct SqliteDocumentStore {
    pool: ConnectionPool,
    collections: CollectionNames,
}

impl SqliteDocumentStore {
    pub fn new(pool: ConnectionPool, collections: CollectionNames) -> Self {
        Self { pool, collections }
    }

    async fn fetch_row(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<DocumentRow>, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(SELECT_DOCUMENT)
            .bind(self.collections.name(collection))
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        match self.fetch_row(collection, id).await? {
            Some(row) => Ok(Some(row.into_document(collection)?)),
            None => Ok(None),
        }
    }

    async fn list_documents(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError> {
        let mut sql = String::from(SELECT_DOCUMENTS_BASE);
        let mut args: Vec<SqlArg> = Vec::new();

        for filter in &query.filters {
            match filter {
                QueryFilter::Equal { field, value } => {
                    sql.push_str(" AND json_extract(data, ?) = ?");
                    args.push(SqlArg::Text(json_path(field)?));
                    args.push(filter_arg(field, value)?);
                }
                QueryFilter::Search { field, term } => {
                    sql.push_str(" AND json_extract(data, ?) LIKE ? ESCAPE '\\'");
                    args.push(SqlArg::Text(json_path(field)?));
                    args.push(SqlArg::Text(format!("%{}%", escape_like(term))));
                }
            }
        }

        let order = query.order;
        let descending = order.map(|o| o.descending).unwrap_or(false);
        let comparison = if descending { "<" } else { ">" };

        if let Some(cursor) = &query.cursor_after {
            let row = self
                .fetch_row(collection, cursor)
                .await?
                .ok_or_else(|| StoreError::CursorNotFound(cursor.clone()))?;
            match order {
                Some(order) => {
                    let column = order_column(order.field);
                    let value = row.order_value(order.field);
                    sql.push_str(&format!(
                        " AND ({column} {comparison} ? OR ({column} = ? AND seq {comparison} ?))"
                    ));
                    args.push(SqlArg::Integer(value));
                    args.push(SqlArg::Integer(value));
                    args.push(SqlArg::Integer(row.seq));
                }
                None => {
                    sql.push_str(&format!(" AND seq {comparison} ?"));
                    args.push(SqlArg::Integer(row.seq));
                }
            }
        }

        let direction = if descending { "DESC" } else { "ASC" };
        match order {
            Some(order) => sql.push_str(&format!(
                " ORDER BY {} {direction}, seq {direction}",
                order_column(order.field)
            )),
            None => sql.push_str(" ORDER BY seq ASC"),
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            args.push(SqlArg::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut statement =
            sqlx::query_as::<_, DocumentRow>(&sql).bind(self.collections.name(collection));
        for arg in args {
            statement = match arg {
                SqlArg::Text(value) => statement.bind(value),
                SqlArg::Integer(value) => statement.bind(value),
                SqlArg::Real(value) => statement.bind(value),
            };
        }

        let rows = statement.fetch_all(self.pool.get_pool()).await?;
        rows.into_iter()
            .map(|row| row.into_document(collection).map_err(AppError::from))
            .collect()
    }

    async fn create_document(
        &self,
        collection: Collection,
        data: Map<String, Value>,
    ) -> Result<Document, AppError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::to_string(&data)?;

        sqlx::query(INSERT_DOCUMENT)
            .bind(self.collections.name(collection))
            .bind(&id)
            .bind(&payload)
            .bind(now)
            .bind(now)
            .execute(self.pool.get_pool())
            .await?;

        let timestamp = millis_to_datetime(now).ok_or_else(|| StoreError::InvalidTimestamp(id.clone()))?;
        Ok(Document {
            id,
            collection,
            created_at: timestamp,
            updated_at: timestamp,
            data,
        })
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document, AppError> {
        let name = self.collections.name(collection);
        let mut tx = self.pool.get_pool().begin().await?;

        let row = sqlx::query_as::<_, DocumentRow>(SELECT_DOCUMENT)
            .bind(name)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let mut document = row.into_document(collection)?;
        for (key, value) in patch {
            document.data.insert(key, value);
        }
        let now = Utc::now().timestamp_millis();
        let payload = serde_json::to_string(&document.data)?;

        sqlx::query(UPDATE_DOCUMENT)
            .bind(&payload)
            .bind(now)
            .bind(name)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        document.updated_at = millis_to_datetime(now).unwrap_or(document.updated_at);
        Ok(document)
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let result = sqlx::query(DELETE_DOCUMENT)
            .bind(self.collections.name(collection))
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
