use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// リモートストアの論理コレクション
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Posts,
    Saves,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Saves => "saves",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ストアから返るドキュメント。タイムスタンプはサーバー側で付与される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: Collection,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Equal { field: String, value: Value },
    /// 大文字小文字を区別しない部分一致
    Search { field: String, term: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: OrderField,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(field: OrderField) -> Self {
        Self {
            field,
            descending: true,
        }
    }

    pub fn asc(field: OrderField) -> Self {
        Self {
            field,
            descending: false,
        }
    }
}

/// `list_documents` の条件。フィルタは AND で結合される。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<QueryFilter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    /// このドキュメント ID の直後から返す
    pub cursor_after: Option<String>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equal(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(QueryFilter::Equal {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn search(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.filters.push(QueryFilter::Search {
            field: field.into(),
            term: term.into(),
        });
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn cursor_after(mut self, cursor: Option<String>) -> Self {
        self.cursor_after = cursor;
        self
    }
}

/// リモートドキュメントストアのポート。
///
/// 複数 ID の一括取得やコレクションをまたぐ結合は提供されない。また書き込み直後の
/// `list_documents` に自分の書き込みが反映されている保証もない。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, AppError>;

    async fn list_documents(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError>;

    async fn create_document(
        &self,
        collection: Collection,
        data: Map<String, Value>,
    ) -> Result<Document, AppError>;

    /// `patch` のキーだけを上書きする。配列フィールドは要素単位ではなく丸ごと置き換わる。
    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document, AppError>;

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError>;
}
