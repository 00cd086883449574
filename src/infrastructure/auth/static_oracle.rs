use crate::application::ports::{AuthIdentity, AuthOracle};
use crate::shared::error::AppError;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// プロセス内で保持するセッション。ヘッドレス実行とテストで使う。
#[derive(Default)]
pub struct StaticAuthOracle {
    identity: RwLock<Option<AuthIdentity>>,
}

impl StaticAuthOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: AuthIdentity) -> Self {
        Self {
            identity: RwLock::new(Some(identity)),
        }
    }

    pub async fn sign_in(&self, identity: AuthIdentity) {
        tracing::info!(user_id = %identity.id, "session signed in");
        *self.identity.write().await = Some(identity);
    }

    pub async fn sign_out(&self) {
        if let Some(previous) = self.identity.write().await.take() {
            tracing::info!(user_id = %previous.id, "session signed out");
        }
    }
}

#[async_trait]
impl AuthOracle for StaticAuthOracle {
    async fn current_identity(&self) -> Result<Option<AuthIdentity>, AppError> {
        Ok(self.identity.read().await.clone())
    }
}
