use crate::shared::error::AppError;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

/// ID ごとの単一取得を並行に発行し、取得できたものだけを完了順に返す。
///
/// ストアに "IN" クエリが無いことの代替。重複 ID は 1 回だけ取得する。
/// 取得に失敗した ID と存在しない ID は結果から落とし、全体は失敗させない。
pub async fn resolve_many_by_id<T, I, F, Fut>(ids: I, fetch: F) -> Vec<T>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Option<T>, AppError>>,
{
    let mut seen = HashSet::new();
    let mut pending: FuturesUnordered<_> = ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .map(|id| {
            let request = fetch(id.clone());
            async move { (id, request.await) }
        })
        .collect();

    if pending.is_empty() {
        return Vec::new();
    }

    let mut resolved = Vec::with_capacity(pending.len());
    while let Some((id, result)) = pending.next().await {
        match result {
            Ok(Some(item)) => resolved.push(item),
            Ok(None) => debug!("fan-out: {id} no longer exists, skipping"),
            Err(err) => warn!("fan-out: failed to fetch {id}: {err}"),
        }
    }

    resolved
}
