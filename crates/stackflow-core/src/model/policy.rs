use crate::error::{Result, StackError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// リトライ設定（Exponential Backoff）
///
/// 試行 n 回目（1始まり）の失敗後の待機時間:
/// `min(max_delay, initial_delay × multiplier^(n-1) + jitter)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 最大試行回数（1以上）
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 初期待機時間（ミリ秒）
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// 最大待機時間（ミリ秒）
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Exponential倍率
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// ジッターの上限（ミリ秒）
    #[serde(default = "default_jitter")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay() -> u64 {
    2000 // 2秒
}
fn default_max_delay() -> u64 {
    10000 // 10秒
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> u64 {
    500
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            jitter_ms: default_jitter(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(StackError::InvalidRetryPolicy(
                "max_attempts は1以上にしてください".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(StackError::InvalidRetryPolicy(format!(
                "multiplier は1.0以上にしてください（{}）",
                self.multiplier
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(StackError::InvalidRetryPolicy(format!(
                "initial_delay_ms ({}) が max_delay_ms ({}) を超えています",
                self.initial_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ms = 0;
        self
    }

    /// ジッターを含まない待機時間（ミリ秒）
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let base = self.uncapped_delay(attempt);
        base.min(self.max_delay_ms as f64) as u64
    }

    /// ジッターを加えた待機時間
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.jitter_ms)
        };
        let delay = (self.uncapped_delay(attempt) + jitter as f64).min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }

    /// 失敗した各試行の後に入る待機時間の列（最後の試行の後は待たない）
    pub fn delays(&self) -> impl Iterator<Item = u64> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_for_attempt(attempt))
    }

    fn uncapped_delay(&self, attempt: u32) -> f64 {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        self.initial_delay_ms as f64 * self.multiplier.powi(exponent)
    }
}

/// ヘルスチェック設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPolicy {
    /// 全サービスの起動を待つ最大時間（秒）
    #[serde(default = "default_health_timeout")]
    pub timeout_secs: u64,
    /// ポーリング間隔（秒）
    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
    /// 全サービス起動後の猶予時間（秒）
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
}

fn default_health_timeout() -> u64 {
    120
}
fn default_health_interval() -> u64 {
    2
}
fn default_grace() -> u64 {
    5
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: default_health_timeout(),
            interval_secs: default_health_interval(),
            grace_secs: default_grace(),
        }
    }
}

impl HealthPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}
