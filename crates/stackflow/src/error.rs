use stackflow_config::ConfigError;
use stackflow_container::ContainerError;
use stackflow_core::StackError;
use stackflow_visualizer::VisualizerError;
use thiserror::Error;

/// 割り込み（SIGINT）で終了したときの終了コード
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Visualizer(#[from] VisualizerError),

    #[error("'{name}' のインストールに失敗しました（終了コード {status}）\n{output}")]
    InstallFailed {
        name: String,
        status: i32,
        output: String,
    },

    #[error("必須の初期設定に失敗しました: {description}\n{source}")]
    PostStartFailed {
        description: String,
        #[source]
        source: ContainerError,
    },

    #[error(
        "環境変数ファイルは既に存在します: {}\n\nヒント:\n  • 不足しているキーを追記するには --force を指定してください（既存の値は保持されます）",
        .path.display()
    )]
    EnvFileExists { path: std::path::PathBuf },

    #[error("中断されました（SIGINT）")]
    Interrupted,
}

impl DeployError {
    /// 変更前に検出されたエラーか（ロールバック対象がない）
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Stack(e) if e.is_validation())
    }

    /// プロセスの終了コード
    ///
    /// 失敗したコマンドの終了コードを引き継ぎ、割り込みは 130、それ以外は 1。
    pub fn exit_code(&self) -> i32 {
        let status = match self {
            Self::Interrupted => Some(INTERRUPTED_EXIT_CODE),
            Self::Container(e) | Self::PostStartFailed { source: e, .. } => e.status(),
            Self::InstallFailed { status, .. } => Some(*status),
            _ => None,
        };
        match status {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(DeployError::Interrupted.exit_code(), 130);

        let exec = ContainerError::ExecFailed {
            service: "mosquitto".to_string(),
            status: 3,
            output: "error".to_string(),
        };
        let err = DeployError::PostStartFailed {
            description: "ブローカー認証情報の設定".to_string(),
            source: exec,
        };
        assert_eq!(err.exit_code(), 3);

        let err = DeployError::from(StackError::MissingConfigKey {
            key: "API_TOKEN".to_string(),
        });
        assert_eq!(err.exit_code(), 1);
        assert!(err.is_validation());

        let zero = DeployError::InstallFailed {
            name: "git".to_string(),
            status: 0,
            output: String::new(),
        };
        assert_eq!(zero.exit_code(), 1);
    }
}
