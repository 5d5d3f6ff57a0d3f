//! 起動後の初期設定
//!
//! 起動中のサービス内で一度きりのコマンドを実行する。各コマンドはバックオフ付きで
//! リトライし、必須（Required）なら失敗でデプロイ全体を失敗させ、任意（Optional）なら
//! 警告だけ残して続行する。

use crate::error::{DeployError, Result};
use crate::setup::StepTracker;
use crate::stages::directories::CONTAINER_PASSWORD_FILE;
use stackflow_container::{ComposeRuntime, ContainerError};
use stackflow_core::{
    BROKER_CREDENTIAL_KEYS, Configuration, DeploymentContext, RetryPolicy, ServiceRole, ServiceSet,
    retry_with_backoff,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional,
}

/// サービス内で実行するコマンド
#[derive(Clone)]
pub struct PostStartCommand {
    /// ログに出す説明（コマンド引数には秘密情報が含まれるため代わりにこれを出す）
    pub description: String,
    pub service: String,
    pub command: Vec<String>,
    pub requirement: Requirement,
}

impl std::fmt::Debug for PostStartCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostStartCommand")
            .field("description", &self.description)
            .field("service", &self.service)
            .field("requirement", &self.requirement)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostStartReport {
    pub succeeded: Vec<String>,
    /// 失敗した任意コマンド（説明, エラー）
    pub warnings: Vec<(String, String)>,
    pub restarted: Option<String>,
}

/// 認証情報を設定するコマンド一覧
///
/// 主認証情報（MQTT_USER / MQTT_PASS）が無ければエラー。デバイス用の認証情報は
/// MQTT_DEVICE_USER / MQTT_DEVICE_PASS の両方がある場合のみ。
pub fn plan_post_start(
    configuration: &Configuration,
    services: &ServiceSet,
) -> Result<Vec<PostStartCommand>> {
    let broker = services
        .name_of(ServiceRole::Broker)
        .unwrap_or(ServiceRole::Broker.default_name())
        .to_string();

    let passwd = |user: &str, pass: &str| -> Vec<String> {
        vec![
            "mosquitto_passwd".to_string(),
            "-b".to_string(),
            CONTAINER_PASSWORD_FILE.to_string(),
            user.to_string(),
            pass.to_string(),
        ]
    };

    let [user_key, pass_key] = BROKER_CREDENTIAL_KEYS;
    let user = configuration.require(user_key)?;
    let pass = configuration.require(pass_key)?;
    let mut commands = vec![PostStartCommand {
        description: format!("ブローカー認証情報の設定（{}）", user),
        service: broker.clone(),
        command: passwd(user, pass),
        requirement: Requirement::Required,
    }];

    if let (Some(user), Some(pass)) = (
        configuration.non_empty("MQTT_DEVICE_USER"),
        configuration.non_empty("MQTT_DEVICE_PASS"),
    ) {
        commands.push(PostStartCommand {
            description: format!("デバイス認証情報の設定（{}）", user),
            service: broker,
            command: passwd(user, pass),
            requirement: Requirement::Optional,
        });
    }

    Ok(commands)
}

/// コマンドを1回実行し、非ゼロ終了をエラーにする
async fn exec_once(runtime: &dyn ComposeRuntime, command: &PostStartCommand) -> stackflow_container::Result<()> {
    let output = runtime
        .exec_in_service(&command.service, &command.command)
        .await?;
    if output.success() {
        Ok(())
    } else {
        Err(ContainerError::ExecFailed {
            service: command.service.clone(),
            status: output.status,
            output: output.output,
        })
    }
}

/// コマンドを順に実行し、必須コマンドが成功したサービスを一度だけ再起動する
pub async fn configure_services(
    runtime: &dyn ComposeRuntime,
    ctx: &mut DeploymentContext,
    tracker: &mut StepTracker,
    commands: &[PostStartCommand],
    policy: &RetryPolicy,
    settle: Duration,
) -> Result<PostStartReport> {
    let mut report = PostStartReport::default();
    let mut restart_target: Option<String> = None;

    for command in commands {
        ctx.log.info(command.description.clone());

        let log = &mut ctx.log;
        let outcome = retry_with_backoff(
            policy,
            |_| exec_once(runtime, command),
            |retry| {
                tracker.log_retry(
                    log,
                    retry.attempt,
                    retry.max_attempts,
                    &format!("{}（{}ms 後に再試行）", retry.error, retry.delay.as_millis()),
                )
            },
        )
        .await;

        match (outcome, command.requirement) {
            (Ok(()), requirement) => {
                ctx.log.success(command.description.clone());
                report.succeeded.push(command.description.clone());
                if requirement == Requirement::Required && restart_target.is_none() {
                    restart_target = Some(command.service.clone());
                }
            }
            (Err(e), Requirement::Optional) => {
                tracing::warn!("Optional post-start command failed: {}", e);
                ctx.log
                    .warn(format!("{} に失敗しました（続行します）: {}", command.description, e));
                report
                    .warnings
                    .push((command.description.clone(), e.to_string()));
            }
            (Err(e), Requirement::Required) => {
                return Err(DeployError::PostStartFailed {
                    description: command.description.clone(),
                    source: e,
                });
            }
        }
    }

    if let Some(service) = restart_target {
        ctx.log.info(format!("{} を再起動して設定を反映", service));
        runtime.restart_service(&service).await?;
        if settle > Duration::ZERO {
            tokio::time::sleep(settle).await;
        }
        report.restarted = Some(service);
    }

    Ok(report)
}
