//! ヘルスゲート付き起動の待機モジュール
//!
//! 一定間隔で running 状態のサービスを問い合わせ、宣言した全サービスが
//! running になるか、壁時計のタイムアウトに達するまで待つ。

use crate::error::{ContainerError, Result};
use crate::runtime::ComposeRuntime;
use stackflow_core::{HealthPolicy, Probe, wait_until};
use std::collections::BTreeSet;
use std::fmt;

/// サービスごとの running 判定
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthReport {
    entries: Vec<(String, bool)>,
}

impl HealthReport {
    /// 期待するサービス一覧と running のサービス集合から作る
    pub fn observe(expected: &[String], running: &BTreeSet<String>) -> Self {
        Self {
            entries: expected
                .iter()
                .map(|name| (name.clone(), running.contains(name)))
                .collect(),
        }
    }

    /// 問い合わせ自体が失敗した場合は全て未起動扱い
    pub fn unknown(expected: &[String]) -> Self {
        Self::observe(expected, &BTreeSet::new())
    }

    pub fn all_running(&self) -> bool {
        self.entries.iter().all(|(_, running)| *running)
    }

    pub fn is_running(&self, service: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|(name, _)| name == service)
            .map(|(_, running)| *running)
    }

    pub fn not_running(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, running)| !running)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        for (name, running) in &self.entries {
            let state = if *running { "running" } else { "not running" };
            writeln!(f, "  {:<width$}  {}", name, state, width = width)?;
        }
        Ok(())
    }
}

/// 全サービスが running になるまで待つ
///
/// タイムアウト時は最後に観測した状態表を持つ `HealthTimeout` を返す。
/// 問い合わせが応答しなくても「タイムアウト + 1間隔」で打ち切る。
pub async fn poll_until_healthy<R>(
    runtime: &R,
    services: &[String],
    policy: &HealthPolicy,
) -> Result<HealthReport>
where
    R: ComposeRuntime + ?Sized,
{
    let outcome = wait_until(policy.timeout(), policy.interval(), || async move {
        let report = match runtime.list_running_services().await {
            Ok(running) => HealthReport::observe(services, &running),
            Err(e) => {
                tracing::debug!("Failed to query running services: {}", e);
                HealthReport::unknown(services)
            }
        };

        if report.all_running() {
            Probe::Ready(report)
        } else {
            tracing::debug!("Waiting for services: {:?}", report.not_running());
            Probe::Pending(report)
        }
    })
    .await;

    outcome.map_err(|timeout| ContainerError::HealthTimeout {
        elapsed: timeout.elapsed,
        report: timeout
            .last
            .unwrap_or_else(|| HealthReport::unknown(services)),
    })
}
