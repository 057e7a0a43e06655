use std::future::Future;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs `call` under `limit`, retrying once when the first attempt expires.
/// Returns `None` when both attempts time out.
pub async fn retry_once_on_timeout<T, F, Fut>(limit: Duration, what: &str, mut call: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
{
    for attempt in 1..=2u8 {
        match tokio::time::timeout(limit, call()).await {
            Ok(result) => return Some(result),
            Err(_) => tracing::warn!(attempt, call = what, ?limit, "call timed out"),
        }
    }
    None
}
