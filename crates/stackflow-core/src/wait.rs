//! 汎用の「条件を満たすかタイムアウトまで待つ」ヘルパー
//!
//! ヘルスチェックやレディネスプローブで共通に使う。タイムアウトは
//! 壁時計時間で判定し、最後の待機はタイムアウトまでの残り時間に切り詰める。
//! プローブ自体も「残り時間 + 1間隔」で打ち切るため、プローブが応答しなくても
//! 「タイムアウト + 1間隔」を超えて待つことはない。

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// プローブ1回分の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T, S> {
    /// 条件成立
    Ready(T),
    /// 未成立（観測した状態を保持）
    Pending(S),
}

/// タイムアウト時に返る情報
#[derive(Debug, Clone)]
pub struct WaitTimeout<S> {
    pub elapsed: Duration,
    pub attempts: u32,
    /// 最後に観測した状態（一度も応答がなければ None）
    pub last: Option<S>,
}

pub async fn wait_until<T, S, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, WaitTimeout<S>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T, S>>,
{
    let interval = interval.max(Duration::from_millis(1));
    let started = Instant::now();
    let mut attempts = 0;
    let mut last = None;

    loop {
        attempts += 1;
        let limit = timeout.saturating_sub(started.elapsed()) + interval;
        match tokio::time::timeout(limit, probe()).await {
            Ok(Probe::Ready(value)) => return Ok(value),
            Ok(Probe::Pending(state)) => last = Some(state),
            Err(_) => {
                tracing::debug!("Probe did not respond within {:?}", limit);
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(WaitTimeout {
                elapsed,
                attempts,
                last,
            });
        }
        sleep(interval.min(timeout - elapsed)).await;
    }
}
