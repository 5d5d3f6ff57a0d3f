use crate::waiter::HealthReport;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "docker compose を実行できません: {0}\n\nヒント:\n  • Docker が起動しているか確認してください\n  • docker compose プラグインがインストールされているか確認してください"
    )]
    ComposeNotFound(String),

    #[error("コマンドが失敗しました: {command}（終了コード {status}）\n{stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("サービス '{service}' 内のコマンドが失敗しました（終了コード {status}）\n{output}")]
    ExecFailed {
        service: String,
        status: i32,
        output: String,
    },

    #[error(
        "{}秒以内に全サービスが起動しませんでした\n\n{report}\nヒント:\n  • docker compose logs で起動に失敗したサービスを確認してください\n  • stackflow.yaml の health.timeout_secs を増やしてみてください",
        .elapsed.as_secs()
    )]
    HealthTimeout {
        elapsed: Duration,
        report: HealthReport,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// プロセス終了コードとして伝搬すべきステータス
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { status, .. } | Self::ExecFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
