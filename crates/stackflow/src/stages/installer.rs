//! 依存ツールのインストール
//!
//! 各ツールの存在を確認し、無ければインストールスクリプトを実行してから再確認する。
//! 既にインストール済みなら何もしないため、何度実行しても同じ結果になる。

use crate::error::{DeployError, Result};
use crate::host::HostSystem;
use crate::scripts;
use semver::Version;
use stackflow_core::{LogSink, StackError, version};

/// インストール対象のツール
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    /// 存在確認に使うコマンド（成功時の stdout にバージョンが含まれる）
    pub probe: Vec<String>,
    pub install_script: String,
    /// 最低バージョン
    pub floor: Option<Version>,
}

impl Dependency {
    pub fn new(name: &str, probe: &[&str], install_script: &str) -> Self {
        Self {
            name: name.to_string(),
            probe: probe.iter().map(|s| s.to_string()).collect(),
            install_script: install_script.to_string(),
            floor: None,
        }
    }

    pub fn with_floor(mut self, floor: Version) -> Self {
        self.floor = Some(floor);
        self
    }
}

/// 確認できたツール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    pub name: String,
    pub version: Option<Version>,
    /// 今回インストールしたか
    pub installed_now: bool,
}

/// git・Docker・docker compose プラグイン
pub fn default_dependencies(compose_floor: Version) -> Vec<Dependency> {
    vec![
        Dependency::new("git", &["git", "--version"], scripts::GIT_SETUP),
        Dependency::new("docker", &["docker", "--version"], scripts::DOCKER_SETUP),
        Dependency::new(
            "docker compose",
            &["docker", "compose", "version", "--short"],
            scripts::COMPOSE_SETUP,
        )
        .with_floor(compose_floor),
    ]
}

async fn probe(host: &dyn HostSystem, dependency: &Dependency) -> Option<String> {
    let (program, args) = dependency.probe.split_first()?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    host.probe(program, &args).await
}

pub async fn install_dependencies(
    host: &dyn HostSystem,
    dependencies: &[Dependency],
    log: &mut LogSink,
) -> Result<Vec<InstalledTool>> {
    let mut tools = Vec::with_capacity(dependencies.len());

    for dependency in dependencies {
        let (output, installed_now) = match probe(host, dependency).await {
            Some(output) => {
                log.detail(format!("{}: インストール済み", dependency.name));
                (output, false)
            }
            None => {
                log.info(format!("{} をインストールしています...", dependency.name));
                let result = host
                    .run_script(&dependency.name, &dependency.install_script)
                    .await
                    .map_err(StackError::from)?;
                if !result.success() {
                    return Err(DeployError::InstallFailed {
                        name: dependency.name.clone(),
                        status: result.status,
                        output: result.output,
                    });
                }

                let output = probe(host, dependency).await.ok_or_else(|| {
                    StackError::DependencyMissing {
                        name: dependency.name.clone(),
                    }
                })?;
                log.success(format!("{} をインストールしました", dependency.name));
                (output, true)
            }
        };

        let version = match dependency.floor {
            Some(ref floor) => {
                let version = version::check_floor(&dependency.name, &output, floor)?;
                log.detail(format!("{} {} (>= {})", dependency.name, version, floor));
                Some(version)
            }
            None => version::parse_lenient(&output).ok(),
        };

        tools.push(InstalledTool {
            name: dependency.name.clone(),
            version,
            installed_now,
        });
    }

    Ok(tools)
}
