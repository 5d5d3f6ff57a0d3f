//! `stackflow.yaml` 設定ファイル
//!
//! 全項目にデフォルト値があり、ファイルが無くても動作する。

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use stackflow_core::{
    BROKER_CREDENTIAL_KEYS, HealthPolicy, OPTIONAL_KEYS, REQUIRED_KEYS, RetryPolicy, ServiceRole,
    ServiceSet,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "stackflow.yaml";

/// デプロイ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackSettings {
    /// compose のプロジェクト名（未指定ならディレクトリ名）
    pub project_name: Option<String>,
    pub compose_file: PathBuf,
    /// プロジェクトディレクトリからの相対パス
    pub required_files: Vec<PathBuf>,
    pub required_keys: Vec<String>,
    /// ロールごとの compose サービス名の上書き
    pub services: BTreeMap<ServiceRole, String>,
    pub health: HealthPolicy,
    pub retry: RetryPolicy,
    /// ブローカー再起動後の待機（秒）
    pub settle_secs: u64,
    pub compose_min_version: String,
    pub dashboard: DashboardSettings,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            project_name: None,
            compose_file: PathBuf::from("docker-compose.yml"),
            required_files: vec![PathBuf::from(".env"), PathBuf::from("docker-compose.yml")],
            required_keys: REQUIRED_KEYS.iter().map(|k| k.to_string()).collect(),
            services: BTreeMap::new(),
            health: HealthPolicy::default(),
            retry: RetryPolicy::default(),
            settle_secs: 3,
            compose_min_version: "2.0.0".to_string(),
            dashboard: DashboardSettings::default(),
        }
    }
}

/// ダッシュボード公開設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    pub enabled: bool,
    /// 可視化サーバーの URL（ホストから見た場所）
    pub url: String,
    /// 公開 URL のベース（未指定なら http://{PUBLIC_HOST}:3000）
    pub public_base: Option<String>,
    /// ダッシュボード JSON を置くディレクトリ
    pub dir: PathBuf,
    /// 起動待ちのリトライ設定
    pub ready: RetryPolicy,
    /// 1リクエストあたりのタイムアウト（秒）
    pub request_timeout_secs: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "http://localhost:3000".to_string(),
            public_base: None,
            dir: PathBuf::from("grafana/dashboards"),
            ready: RetryPolicy {
                max_attempts: 30,
                initial_delay_ms: 2000,
                max_delay_ms: 5000,
                multiplier: 1.5,
                jitter_ms: 0,
            },
            request_timeout_secs: 10,
        }
    }
}

impl DashboardSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn public_base_for(&self, public_host: &str) -> String {
        match self.public_base {
            Some(ref base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{}:3000", public_host),
        }
    }
}

impl StackSettings {
    /// 設定ファイルを読み込む
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Self =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::SettingsParse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// 明示指定 → 検索 → デフォルトの順で設定を決める
    pub fn load_for_project(project_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match find_settings_file(project_dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.retry
            .validate()
            .and_then(|_| self.dashboard.ready.validate())
            .map_err(|e| ConfigError::InvalidSetting(e.to_string()))?;
        self.compose_floor()?;
        if self.health.timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "health.timeout_secs は1以上にしてください".to_string(),
            ));
        }
        if let Some(key) = BROKER_CREDENTIAL_KEYS
            .iter()
            .find(|key| !self.required_keys.iter().any(|k| k == *key))
        {
            return Err(ConfigError::InvalidSetting(format!(
                "required_keys から {} を外すことはできません（ブローカー認証情報の設定に必須）",
                key
            )));
        }
        Ok(())
    }

    pub fn compose_floor(&self) -> Result<semver::Version> {
        semver::Version::parse(&self.compose_min_version).map_err(|e| {
            ConfigError::InvalidSetting(format!(
                "compose_min_version '{}': {}",
                self.compose_min_version, e
            ))
        })
    }

    /// プロセス環境変数から補ってよいキー（必須キー + 任意キー）
    pub fn env_keys(&self) -> Vec<String> {
        let mut keys = self.required_keys.clone();
        for key in OPTIONAL_KEYS {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }
        keys
    }

    pub fn service_set(&self) -> ServiceSet {
        ServiceSet::default().with_overrides(&self.services)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// compose のプロジェクト名
    pub fn project_name_for(&self, project_dir: &Path) -> Option<String> {
        self.project_name.clone().or_else(|| {
            project_dir
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
        })
    }
}

/// 設定ファイルを探す
///
/// 1. プロジェクトディレクトリの stackflow.yaml
/// 2. プロジェクトディレクトリの .stackflow/stackflow.yaml
/// 3. ~/.config/stackflow/stackflow.yaml (グローバル設定)
pub fn find_settings_file(project_dir: &Path) -> Option<PathBuf> {
    let local = [
        project_dir.join(SETTINGS_FILE),
        project_dir
            .join(stackflow_core::STATE_DIR)
            .join(SETTINGS_FILE),
    ];
    if let Some(path) = local.into_iter().find(|p| p.is_file()) {
        return Some(path);
    }

    dirs::config_dir()
        .map(|dir| dir.join("stackflow").join(SETTINGS_FILE))
        .filter(|p| p.is_file())
}
