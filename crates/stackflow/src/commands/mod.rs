pub mod deploy;
pub mod down;
pub mod init_env;
pub mod ps;
pub mod validate;

use anyhow::Context;
use chrono::Local;
use clap::Args;
use colored::Colorize;
use stackflow_config::{StackSettings, find_env_file, find_settings_file, load_env_file, overlay_process_env};
use stackflow_container::DockerCompose;
use stackflow_core::{Configuration, DeploymentContext, LogSink, STATE_DIR};
use std::path::{Path, PathBuf};

/// 全コマンド共通のオプション
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// プロジェクトディレクトリ（compose ファイルと .env がある場所）
    #[arg(long, global = true, env = "STACKFLOW_PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// 環境変数ファイル（未指定なら .env → .stackflow/.env の順に探す）
    #[arg(long, global = true, env = "STACKFLOW_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// 設定ファイル（未指定なら stackflow.yaml を探す）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn resolve_dir(&self) -> anyhow::Result<PathBuf> {
        std::fs::canonicalize(&self.project_dir).with_context(|| {
            format!(
                "プロジェクトディレクトリが見つかりません: {}",
                self.project_dir.display()
            )
        })
    }
}

/// 読み込んだプロジェクト
pub struct Project {
    pub dir: PathBuf,
    pub env_file: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub settings: StackSettings,
    pub configuration: Configuration,
}

impl Project {
    /// 設定ファイルと環境変数ファイルを読み込む
    ///
    /// 環境変数ファイルが見つからなくてもエラーにしない（前提条件の検証で報告する）。
    pub fn load(args: &ProjectArgs) -> anyhow::Result<Self> {
        let dir = args.resolve_dir()?;

        let settings_file = args
            .config
            .clone()
            .or_else(|| find_settings_file(&dir));
        let mut settings = StackSettings::load_for_project(&dir, settings_file.as_deref())?;

        let env_file = match args.env_file {
            Some(ref path) => Some(path.clone()),
            None => find_env_file(&dir).ok(),
        };

        let mut configuration = match env_file {
            Some(ref path) if path.is_file() => load_env_file(path)?,
            _ => Configuration::new(),
        };
        overlay_process_env(&mut configuration, &settings.env_keys());

        // 必須ファイルの .env は実際に使うファイルに読み替える
        if let Some(ref path) = env_file {
            for file in settings.required_files.iter_mut() {
                if file.as_path() == Path::new(".env") {
                    *file = path.clone();
                }
            }
        }

        Ok(Self {
            dir,
            env_file,
            settings_file,
            settings,
            configuration,
        })
    }

    pub fn name(&self) -> String {
        self.settings
            .project_name_for(&self.dir)
            .unwrap_or_else(|| "stackflow".to_string())
    }

    pub fn context(&self, log: LogSink) -> DeploymentContext {
        DeploymentContext::new(
            &self.dir,
            self.configuration.clone(),
            self.settings.service_set(),
            log,
        )
    }

    pub fn runtime(&self) -> DockerCompose {
        DockerCompose::new(&self.dir, &self.settings.compose_file)
            .with_project_name(self.name())
            .with_env(self.configuration.iter())
    }

    /// `.stackflow/logs/deploy-<timestamp>.log`
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(STATE_DIR).join("logs").join(format!(
            "deploy-{}.log",
            Local::now().format("%Y%m%d-%H%M%S")
        ))
    }

    /// 読み込んだ設定ファイル情報を表示
    pub fn print_loaded_files(&self) {
        println!("📄 読み込んだ設定ファイル:");
        match self.env_file {
            Some(ref path) if path.is_file() => {
                println!("  • {}", path.display().to_string().cyan())
            }
            _ => println!("  • {}", "(環境変数ファイルなし)".dimmed()),
        }
        if let Some(ref path) = self.settings_file {
            println!("  • {}", path.display().to_string().cyan());
        }
    }
}
