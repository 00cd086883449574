use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

use application::ports::AuthIdentity;
use infrastructure::auth::StaticAuthOracle;
use shared::config::AppConfig;
use state::AppState;

/// ヘッドレスでセッションを起動し、最初のフィードページを読み込む
pub fn run() -> anyhow::Result<()> {
    // ログ設定の初期化
    init_logging();

    info!("momentr client starting...");

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    std::fs::create_dir_all(&config.database.data_dir)
        .with_context(|| format!("failed to create {}", config.database.data_dir))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let oracle = Arc::new(StaticAuthOracle::new());
        if let Ok(user_id) = std::env::var("MOMENTR_USER_ID") {
            oracle
                .sign_in(AuthIdentity {
                    id: user_id.clone(),
                    name: user_id.clone(),
                    username: user_id,
                    image_url: None,
                })
                .await;
        }

        let state = AppState::with_sqlite(config, oracle).await?;

        match state.load_more(true).await {
            Ok(outcome) => {
                let posts = state.explore_feed.posts().await;
                info!(?outcome, posts = posts.len(), "first feed page loaded");
            }
            Err(err) => warn!(error = %err, "feed not loaded"),
        }

        state.sign_out().await;
        info!("session closed");
        Ok::<(), anyhow::Error>(())
    })
}

pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "momentr_lib=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
