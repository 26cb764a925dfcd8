//! 检查步骤的超时和取消控制
//!
//! 每个带网络 I/O 的步骤都在固定超时与取消令牌下执行

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// 默认单步超时
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// 超时错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation timed out after {}ms", .0.as_millis())]
pub struct TimeoutError(pub Duration);

/// 中断原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("{0}")]
    TimedOut(#[from] TimeoutError),
    #[error("Operation cancelled")]
    Cancelled,
}

/// 带超时执行异步操作
pub async fn with_timeout<T, F>(future: F, limit: Duration) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(limit, future).await.map_err(|_| TimeoutError(limit))
}

/// 带超时和取消执行异步操作
///
/// 已取消的令牌优先于超时，被取消时不会轮询 `future`。
pub async fn with_deadline<T, F>(
    future: F,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    if cancel.is_cancelled() {
        return Err(Interrupted::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        result = timeout(limit, future) => {
            result.map_err(|_| Interrupted::TimedOut(TimeoutError(limit)))
        }
    }
}
