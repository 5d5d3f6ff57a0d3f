//! リトライユーティリティ（Exponential Backoff + ジッター）

use crate::model::RetryPolicy;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// 失敗した試行の情報（次の待機に入る直前に通知される）
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    /// 失敗した試行番号（1始まり）
    pub attempt: u32,
    pub max_attempts: u32,
    /// 次の試行までの待機時間
    pub delay: Duration,
    pub error: &'a E,
}

/// 成功するか試行回数を使い切るまで操作を繰り返す
///
/// 成功した時点で即座に返り、それ以上待機しない。最後の試行が失敗した場合は
/// 待機せずにそのエラーを返す。
pub async fn retry_with_backoff<T, E, F, Fut, N>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    N: FnMut(&RetryAttempt<'_, E>),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= max_attempts => return Err(error),
            Err(error) => {
                let delay = policy.jittered_delay(attempt, &mut rand::thread_rng());
                on_retry(&RetryAttempt {
                    attempt,
                    max_attempts,
                    delay,
                    error: &error,
                });
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
