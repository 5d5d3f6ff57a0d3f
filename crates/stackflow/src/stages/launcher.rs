//! スタック起動（ステートマシン）
//!
//! `NotStarted → Starting → WaitingHealthy → Healthy`、失敗時は `Failed`。
//! 起動コマンドを発行する時点で「スタック停止」を補償アクションとして登録する。
//! 起動コマンド自体が失敗・中断しても、途中まで作られたコンテナは片付けられる。

use crate::error::Result;
use stackflow_container::{ComposeRuntime, HealthReport, poll_until_healthy};
use stackflow_core::{DeploymentContext, HealthPolicy};
use std::sync::Arc;
use std::time::Duration;

pub const TEAR_DOWN_LABEL: &str = "スタック停止";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    NotStarted,
    Starting,
    WaitingHealthy,
    Healthy,
    Failed,
}

pub struct StackLauncher {
    runtime: Arc<dyn ComposeRuntime>,
    policy: HealthPolicy,
    history: Vec<LaunchState>,
}

impl StackLauncher {
    pub fn new(runtime: Arc<dyn ComposeRuntime>, policy: HealthPolicy) -> Self {
        Self {
            runtime,
            policy,
            history: vec![LaunchState::NotStarted],
        }
    }

    pub fn state(&self) -> LaunchState {
        self.history
            .last()
            .copied()
            .unwrap_or(LaunchState::NotStarted)
    }

    /// これまでの状態遷移
    pub fn history(&self) -> &[LaunchState] {
        &self.history
    }

    fn transition(&mut self, next: LaunchState) {
        tracing::debug!("Launch state: {:?} -> {:?}", self.state(), next);
        self.history.push(next);
    }

    pub async fn launch(&mut self, ctx: &mut DeploymentContext) -> Result<HealthReport> {
        let services = ctx.services.names();
        self.transition(LaunchState::Starting);

        // 再実行時は前回のスタックを止めてから起動する
        let previous =
            tokio::time::timeout(self.policy.timeout(), self.runtime.list_running_services()).await;
        match previous {
            Ok(Ok(running)) if !running.is_empty() => {
                ctx.log.info(format!(
                    "既存のスタックを停止しています（{} サービス稼働中）",
                    running.len()
                ));
                if let Err(e) = self.runtime.tear_down().await {
                    self.transition(LaunchState::Failed);
                    return Err(e.into());
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("Could not query running services: {}", e);
                ctx.log.warn(format!(
                    "稼働中のサービスを確認できませんでした（既存スタックの停止を省略）: {}",
                    e
                ));
            }
            Err(_) => {
                tracing::warn!("Running services query timed out");
                ctx.log.warn(
                    "稼働中のサービス確認が応答しませんでした（既存スタックの停止を省略）",
                );
            }
        }

        ctx.log
            .info(format!("サービスをビルドして起動: {}", services.join(", ")));
        let runtime = Arc::clone(&self.runtime);
        ctx.cleanup.register(TEAR_DOWN_LABEL, move || async move {
            runtime.tear_down().await?;
            Ok(())
        });

        if let Err(e) = self.runtime.bring_up(&services).await {
            self.transition(LaunchState::Failed);
            return Err(e.into());
        }

        self.transition(LaunchState::WaitingHealthy);
        ctx.log.info(format!(
            "全サービスの起動を待機中（最大 {}秒、{}秒間隔）",
            self.policy.timeout().as_secs(),
            self.policy.interval().as_secs()
        ));

        match poll_until_healthy(self.runtime.as_ref(), &services, &self.policy).await {
            Ok(report) => {
                self.transition(LaunchState::Healthy);
                ctx.log.success(format!("{} サービスが起動しました", services.len()));
                let grace = self.policy.grace();
                if grace > Duration::ZERO {
                    tokio::time::sleep(grace).await;
                }
                Ok(report)
            }
            Err(e) => {
                self.transition(LaunchState::Failed);
                if let stackflow_container::ContainerError::HealthTimeout { ref report, .. } = e {
                    ctx.log.error("起動しなかったサービスがあります:");
                    for (name, running) in report.entries() {
                        let state = if *running { "running" } else { "not running" };
                        ctx.log.detail(format!("{}: {}", name, state));
                    }
                }
                Err(e.into())
            }
        }
    }
}
