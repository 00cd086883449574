use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 認証済みユーザーの識別情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    pub name: String,
    pub username: String,
    pub image_url: Option<String>,
}

/// 現在のユーザーを返す認証オラクル。ログイン処理そのものは扱わない。
#[async_trait]
pub trait AuthOracle: Send + Sync {
    async fn current_identity(&self) -> Result<Option<AuthIdentity>, AppError>;
}
