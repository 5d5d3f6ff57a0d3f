use super::{Configuration, ServiceSet};
use crate::log::LogSink;
use crate::rollback::{CleanupRegistry, RollbackReport};
use std::path::{Path, PathBuf};

/// 状態ディレクトリ名（ログ・ロック・バックアップを置く）
pub const STATE_DIR: &str = ".stackflow";

/// デプロイ1回分の状態
///
/// 全ステージに明示的に渡される唯一の可変状態。プロセス終了とともに破棄され、
/// 再実行時は毎回ゼロから組み立て直す。
pub struct DeploymentContext {
    /// プロジェクトディレクトリ（compose ファイルと .env がある場所）
    pub project_dir: PathBuf,
    pub configuration: Configuration,
    pub services: ServiceSet,
    pub cleanup: CleanupRegistry,
    pub log: LogSink,
}

impl DeploymentContext {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        configuration: Configuration,
        services: ServiceSet,
        log: LogSink,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            configuration,
            services,
            cleanup: CleanupRegistry::new(),
            log,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn state_dir(&self) -> PathBuf {
        self.project_dir.join(STATE_DIR)
    }

    /// 登録済みの補償アクションを逆順に実行する
    pub async fn rollback(&mut self) -> RollbackReport {
        self.cleanup.unwind(&mut self.log).await
    }
}

impl std::fmt::Debug for DeploymentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentContext")
            .field("project_dir", &self.project_dir)
            .field("configuration_keys", &self.configuration.len())
            .field("services", &self.services.names())
            .field("cleanup", &self.cleanup)
            .field("log", &self.log.path())
            .finish()
    }
}
