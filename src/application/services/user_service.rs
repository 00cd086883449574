use crate::application::ports::{
    AuthIdentity, AuthOracle, Collection, DocumentQuery, DocumentStore, OrderBy, OrderField,
};
use crate::application::shared::mappers::{
    map_save_document, map_user_document, profile_update_fields,
};
use crate::domain::entities::{ProfileUpdate, SaveRecord, User};
use crate::infrastructure::cache::{MutationOptions, QueryCache, QueryKey};
use crate::shared::error::AppError;
use std::sync::Arc;

pub struct UserService {
    store: Arc<dyn DocumentStore>,
    cache: QueryCache,
    auth: Arc<dyn AuthOracle>,
    users_limit: usize,
}

impl UserService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: QueryCache,
        auth: Arc<dyn AuthOracle>,
        users_limit: usize,
    ) -> Self {
        Self {
            store,
            cache,
            auth,
            users_limit,
        }
    }

    pub async fn current_identity(&self) -> Result<Option<AuthIdentity>, AppError> {
        self.auth.current_identity().await
    }

    /// サインイン中のユーザーを要求する操作の入口
    pub async fn require_identity(&self) -> Result<AuthIdentity, AppError> {
        self.auth
            .current_identity()
            .await?
            .ok_or_else(|| AppError::Unauthorized("No signed-in user".to_string()))
    }

    /// サインイン中のユーザー（保存レコード込み）。未サインインなら `None`。
    pub async fn current_user(&self) -> Result<Option<User>, AppError> {
        let Some(identity) = self.auth.current_identity().await? else {
            return Ok(None);
        };

        let store = Arc::clone(&self.store);
        self.cache
            .fetch(QueryKey::current_user(), move || {
                load_user(store, identity.id)
            })
            .await
    }

    pub async fn user_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        let store = Arc::clone(&self.store);
        let id = user_id.to_string();
        self.cache
            .fetch(QueryKey::user_by_id(user_id), move || load_user(store, id))
            .await
    }

    /// ユーザー一覧（新しい順）。保存レコードは読み込まない。
    pub async fn users(&self, limit: Option<usize>) -> Result<Vec<User>, AppError> {
        let limit = limit.unwrap_or(self.users_limit);
        let store = Arc::clone(&self.store);
        self.cache
            .fetch(QueryKey::users(limit), move || async move {
                let query = DocumentQuery::new()
                    .order(OrderBy::desc(OrderField::CreatedAt))
                    .limit(limit);
                let documents = store.list_documents(Collection::Users, &query).await?;
                documents
                    .iter()
                    .map(|document| map_user_document(document, Vec::new()))
                    .collect()
            })
            .await
    }

    /// 自分のプロフィールだけを編集できる
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let identity = self.require_identity().await?;
        if identity.id != user_id {
            return Err(AppError::Unauthorized(format!(
                "Cannot edit the profile of {user_id}"
            )));
        }

        let patch = profile_update_fields(&update)?;
        if patch.is_empty() {
            return Err(AppError::InvalidInput("Profile update is empty".to_string()));
        }

        let store = Arc::clone(&self.store);
        let id = user_id.to_string();
        self.cache
            .mutate(
                || async move {
                    let document = store.update_document(Collection::Users, &id, patch).await?;
                    let saves = load_saves(store.as_ref(), &id).await?;
                    map_user_document(&document, saves)
                },
                MutationOptions::new()
                    .invalidate(QueryKey::current_user())
                    .invalidate(QueryKey::user_by_id(user_id)),
            )
            .await
    }
}

async fn load_user(store: Arc<dyn DocumentStore>, user_id: String) -> Result<Option<User>, AppError> {
    let Some(document) = store.get_document(Collection::Users, &user_id).await? else {
        return Ok(None);
    };
    let saves = load_saves(store.as_ref(), &user_id).await?;
    map_user_document(&document, saves).map(Some)
}

/// 保存レコードを作成順で取得する
async fn load_saves(store: &dyn DocumentStore, user_id: &str) -> Result<Vec<SaveRecord>, AppError> {
    let query = DocumentQuery::new()
        .equal("user", user_id)
        .order(OrderBy::asc(OrderField::CreatedAt));
    let documents = store.list_documents(Collection::Saves, &query).await?;
    documents.iter().map(map_save_document).collect()
}
