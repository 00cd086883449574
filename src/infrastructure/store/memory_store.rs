use super::error::StoreError;
use crate::application::ports::{
    Collection, Document, DocumentQuery, DocumentStore, OrderBy, OrderField, QueryFilter,
};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    document: Document,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_seq: u64,
    collections: HashMap<Collection, Vec<StoredDocument>>,
}

impl MemoryState {
    fn documents(&self, collection: Collection) -> &[StoredDocument] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find_mut(&mut self, collection: Collection, id: &str) -> Option<&mut StoredDocument> {
        self.collections
            .get_mut(&collection)?
            .iter_mut()
            .find(|stored| stored.document.id == id)
    }

    fn insert(
        &mut self,
        collection: Collection,
        id: String,
        data: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        if self.documents(collection).iter().any(|s| s.document.id == id) {
            return Err(StoreError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }

        self.next_seq += 1;
        let now = Utc::now();
        let document = Document {
            id,
            collection,
            created_at: now,
            updated_at: now,
            data,
        };
        self.collections
            .entry(collection)
            .or_default()
            .push(StoredDocument {
                seq: self.next_seq,
                document: document.clone(),
            });
        Ok(document)
    }
}

/// プロセス内で完結するドキュメントストア。テストと開発用。
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    state: RwLock<MemoryState>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// ID を指定してドキュメントを登録する（シード用）
    pub async fn insert_with_id(
        &self,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) -> Result<Document, AppError> {
        let mut state = self.state.write().await;
        Ok(state.insert(collection, id.to_string(), data)?)
    }

    pub async fn count(&self, collection: Collection) -> usize {
        let state = self.state.read().await;
        state.documents(collection).len()
    }

    /// 条件に一致するドキュメント数（順序やページングは無視）
    pub async fn count_matching(&self, collection: Collection, filters: &[QueryFilter]) -> usize {
        let state = self.state.read().await;
        state
            .documents(collection)
            .iter()
            .filter(|stored| matches_filters(&stored.document, filters))
            .count()
    }
}

fn matches_filters(document: &Document, filters: &[QueryFilter]) -> bool {
    filters.iter().all(|filter| match filter {
        QueryFilter::Equal { field, value } => document.data.get(field) == Some(value),
        QueryFilter::Search { field, term } => document
            .data
            .get(field)
            .and_then(Value::as_str)
            .map(|text| text.to_lowercase().contains(&term.to_lowercase()))
            .unwrap_or(false),
    })
}

fn order_key(stored: &StoredDocument, field: OrderField) -> (DateTime<Utc>, u64) {
    let timestamp = match field {
        OrderField::CreatedAt => stored.document.created_at,
        OrderField::UpdatedAt => stored.document.updated_at,
    };
    (timestamp, stored.seq)
}

fn compare(a: &StoredDocument, b: &StoredDocument, order: Option<OrderBy>) -> Ordering {
    match order {
        Some(order) => {
            let ordering = order_key(a, order.field).cmp(&order_key(b, order.field));
            if order.descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        None => a.seq.cmp(&b.seq),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .documents(collection)
            .iter()
            .find(|stored| stored.document.id == id)
            .map(|stored| stored.document.clone()))
    }

    async fn list_documents(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, AppError> {
        let state = self.state.read().await;
        let mut matching: Vec<&StoredDocument> = state
            .documents(collection)
            .iter()
            .filter(|stored| matches_filters(&stored.document, &query.filters))
            .collect();
        matching.sort_by(|a, b| compare(a, b, query.order));

        let start = match &query.cursor_after {
            Some(cursor) => {
                let position = matching
                    .iter()
                    .position(|stored| &stored.document.id == cursor)
                    .ok_or_else(|| StoreError::CursorNotFound(cursor.clone()))?;
                position + 1
            }
            None => 0,
        };
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(matching
            .into_iter()
            .skip(start)
            .take(limit)
            .map(|stored| stored.document.clone())
            .collect())
    }

    async fn create_document(
        &self,
        collection: Collection,
        data: Map<String, Value>,
    ) -> Result<Document, AppError> {
        let mut state = self.state.write().await;
        Ok(state.insert(collection, uuid::Uuid::new_v4().simple().to_string(), data)?)
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document, AppError> {
        let mut state = self.state.write().await;
        let stored = state
            .find_mut(collection, id)
            .ok_or_else(|| StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in patch {
            stored.document.data.insert(key, value);
        }
        stored.document.updated_at = Utc::now();
        Ok(stored.document.clone())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let documents = state.collections.entry(collection).or_default();
        let before = documents.len();
        documents.retain(|stored| stored.document.id != id);

        if documents.len() == before {
            return Err(StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
