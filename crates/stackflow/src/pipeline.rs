//! デプロイパイプライン
//!
//! 前提条件の検証 → ロック取得 → 依存ツール → ディレクトリ → 起動 → 初期設定 → ダッシュボード
//! の順に実行する。変更を加えるステージのどこかで失敗（または中断）したら、
//! 登録済みの補償アクションを逆順に実行してからエラーを返す。

use crate::error::{DeployError, Result};
use crate::host::HostSystem;
use crate::setup::{DeployStep, StepTracker};
use crate::stages::{
    DirectoryLayout, DirectoryReport, InstalledTool, PostStartReport, PrerequisiteCheck,
    PublishedDashboard, StackLauncher, configure_services, default_dependencies,
    install_dependencies, plan_post_start, prepare_directories, publish_dashboards,
    validate_prerequisites,
};
use stackflow_config::StackSettings;
use stackflow_container::{ComposeRuntime, HealthReport};
use stackflow_core::{DeployLock, DeploymentContext, RollbackReport, StackError};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// 管理者権限を要求するか（--no-root-check で無効化）
    pub require_privilege: bool,
    /// スキップするステップ
    pub skip: Vec<DeployStep>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            require_privilege: true,
            skip: Vec::new(),
        }
    }
}

/// 成功したデプロイの結果
#[derive(Debug, Default)]
pub struct DeployOutcome {
    pub tools: Vec<InstalledTool>,
    pub directories: DirectoryReport,
    pub health: HealthReport,
    pub post_start: PostStartReport,
    pub dashboards: Vec<PublishedDashboard>,
}

/// 失敗したデプロイ（実行したロールバックの結果付き）
#[derive(Debug)]
pub struct DeployFailure {
    pub error: DeployError,
    pub rollback: RollbackReport,
}

impl DeployFailure {
    fn without_rollback(error: DeployError) -> Self {
        Self {
            error,
            rollback: RollbackReport::default(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }
}

impl std::fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for DeployFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct Pipeline {
    settings: StackSettings,
    runtime: Arc<dyn ComposeRuntime>,
    host: Arc<dyn HostSystem>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        settings: StackSettings,
        runtime: Arc<dyn ComposeRuntime>,
        host: Arc<dyn HostSystem>,
    ) -> Self {
        Self {
            settings,
            runtime,
            host,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    fn prerequisite_check(&self) -> PrerequisiteCheck {
        PrerequisiteCheck {
            require_privilege: self.options.require_privilege,
            required_files: self.settings.required_files.clone(),
            required_keys: self.settings.required_keys.clone(),
        }
    }

    fn skips(&self, step: DeployStep) -> bool {
        self.options.skip.contains(&step)
    }

    /// 前提条件の検証のみ行う（何も変更しない）
    pub fn validate(&self, ctx: &DeploymentContext) -> std::result::Result<(), StackError> {
        validate_prerequisites(
            self.host.as_ref(),
            ctx.project_dir(),
            &ctx.configuration,
            &self.prerequisite_check(),
        )
    }

    /// デプロイを実行する
    ///
    /// `shutdown` が完了した時点で実行中のステージを打ち切り、ロールバックして
    /// [`DeployError::Interrupted`] を返す。
    pub async fn execute(
        &self,
        ctx: &mut DeploymentContext,
        tracker: &mut StepTracker,
        shutdown: impl Future<Output = ()>,
    ) -> std::result::Result<DeployOutcome, DeployFailure> {
        tracker.start_step(&mut ctx.log, DeployStep::Prerequisites);
        if let Err(e) = self.validate(ctx) {
            let error = DeployError::from(e);
            tracker.step_failed(&mut ctx.log, &error.to_string());
            return Err(DeployFailure::without_rollback(error));
        }
        tracker.step_success(&mut ctx.log, None);

        tracker.start_step(&mut ctx.log, DeployStep::AcquireLock);
        let lock = match DeployLock::acquire(&ctx.state_dir()).await {
            Ok(lock) => lock,
            Err(e) => {
                let error = DeployError::from(e);
                tracker.step_failed(&mut ctx.log, &error.to_string());
                return Err(DeployFailure::without_rollback(error));
            }
        };
        tracker.step_success(&mut ctx.log, None);

        let result = {
            let mut shutdown = std::pin::pin!(shutdown);
            tokio::select! {
                result = self.run_stages(ctx, tracker) => result,
                _ = &mut shutdown => Err(DeployError::Interrupted),
            }
        };

        let outcome = match result {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                if tracker.current().is_some() {
                    tracker.step_failed(&mut ctx.log, &error.to_string());
                } else {
                    ctx.log.error(error.to_string());
                }
                let rollback = ctx.rollback().await;
                Err(DeployFailure { error, rollback })
            }
        };

        if let Err(e) = lock.release().await {
            tracing::warn!("Failed to release deploy lock: {}", e);
            ctx.log.warn(format!("ロックを解放できませんでした: {}", e));
        }

        outcome
    }

    async fn run_stages(
        &self,
        ctx: &mut DeploymentContext,
        tracker: &mut StepTracker,
    ) -> Result<DeployOutcome> {
        let mut outcome = DeployOutcome::default();

        if self.skips(DeployStep::Dependencies) {
            tracker.skip_step(&mut ctx.log, DeployStep::Dependencies, "--skip");
        } else {
            tracker.start_step(&mut ctx.log, DeployStep::Dependencies);
            let dependencies = default_dependencies(self.settings.compose_floor()?);
            outcome.tools =
                install_dependencies(self.host.as_ref(), &dependencies, &mut ctx.log).await?;
            tracker.step_success(&mut ctx.log, None);
        }

        tracker.start_step(&mut ctx.log, DeployStep::Directories);
        let layout = DirectoryLayout::under(ctx.project_dir());
        outcome.directories = prepare_directories(ctx, &layout)?;
        tracker.step_success(&mut ctx.log, None);

        tracker.start_step(&mut ctx.log, DeployStep::Launch);
        let mut launcher = StackLauncher::new(Arc::clone(&self.runtime), self.settings.health.clone());
        outcome.health = launcher.launch(ctx).await?;
        tracker.step_success(&mut ctx.log, None);

        tracker.start_step(&mut ctx.log, DeployStep::Configure);
        let commands = plan_post_start(&ctx.configuration, &ctx.services)?;
        outcome.post_start = configure_services(
            self.runtime.as_ref(),
            ctx,
            tracker,
            &commands,
            &self.settings.retry,
            self.settings.settle(),
        )
        .await?;
        tracker.step_success(&mut ctx.log, None);

        if self.skips(DeployStep::Dashboard) {
            tracker.skip_step(&mut ctx.log, DeployStep::Dashboard, "--skip");
        } else if !self.settings.dashboard.enabled {
            tracker.skip_step(&mut ctx.log, DeployStep::Dashboard, "無効");
        } else {
            tracker.start_step(&mut ctx.log, DeployStep::Dashboard);
            outcome.dashboards = publish_dashboards(
                &ctx.project_dir,
                &self.settings.dashboard,
                &ctx.configuration,
                &mut ctx.log,
            )
            .await;
            let message = format!("{} 件のダッシュボードを公開", outcome.dashboards.len());
            tracker.step_success(&mut ctx.log, Some(&message));
        }

        Ok(outcome)
    }
}
