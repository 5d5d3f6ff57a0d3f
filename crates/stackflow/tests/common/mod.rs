use async_trait::async_trait;
use stackflow::HostSystem;
use stackflow_config::{DashboardSettings, StackSettings, load_env_file};
use stackflow_container::{ComposeRuntime, ContainerError, ExecOutput};
use stackflow_core::{DeploymentContext, HealthPolicy, LogSink, REQUIRED_KEYS, RetryPolicy};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    /// 必須キーが全て揃った .env と compose ファイルを持つプロジェクト
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let project = Self { root };
        let env: String = REQUIRED_KEYS
            .iter()
            .map(|key| format!("{}=test-{}\n", key, key.to_lowercase()))
            .collect();
        project.write_env(&env);
        fs::write(
            project.root.path().join("docker-compose.yml"),
            "services:\n  mosquitto:\n    image: eclipse-mosquitto:2\n",
        )
        .unwrap();
        project
    }

    pub fn write_env(&self, content: &str) {
        fs::write(self.root.path().join(".env"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn append_env(&self, content: &str) {
        let path = self.root.path().join(".env");
        let mut current = fs::read_to_string(&path).unwrap();
        current.push_str(content);
        fs::write(path, current).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    #[allow(dead_code)]
    pub fn context(&self) -> DeploymentContext {
        let configuration = load_env_file(&self.path().join(".env")).unwrap();
        let settings = settings();
        DeploymentContext::new(
            self.path(),
            configuration,
            settings.service_set(),
            LogSink::memory(),
        )
    }

    #[allow(dead_code)]
    pub fn exists(&self, relative: &str) -> bool {
        self.root.path().join(relative).exists()
    }
}

/// テスト用の設定（ジッターなし、ダッシュボード無効）
#[allow(dead_code)]
pub fn settings() -> StackSettings {
    StackSettings {
        health: HealthPolicy {
            timeout_secs: 120,
            interval_secs: 2,
            grace_secs: 0,
        },
        retry: RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 2000,
            max_delay_ms: 10000,
            multiplier: 2.0,
            jitter_ms: 0,
        },
        settle_secs: 0,
        dashboard: DashboardSettings {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// docker compose の代わりに状態をメモリで持つランタイム
#[derive(Default)]
pub struct FakeCompose {
    pub running: Mutex<BTreeSet<String>>,
    pub calls: Mutex<Vec<String>>,
    /// ユーザー名ごとの exec 終了コード（足りなければ 0）
    pub exec_statuses: Mutex<HashMap<String, Vec<i32>>>,
    /// bring_up で起動するサービス（None なら全て）
    pub starts: Option<Vec<String>>,
}

#[allow(dead_code)]
impl FakeCompose {
    pub fn failing_exec(self, user: &str, statuses: &[i32]) -> Self {
        self.exec_statuses
            .lock()
            .unwrap()
            .insert(user.to_string(), statuses.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.running.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ComposeRuntime for FakeCompose {
    async fn bring_up(&self, services: &[String]) -> stackflow_container::Result<()> {
        self.calls.lock().unwrap().push("up".to_string());
        let started = self.starts.clone().unwrap_or_else(|| services.to_vec());
        self.running.lock().unwrap().extend(started);
        Ok(())
    }

    async fn list_running_services(&self) -> stackflow_container::Result<BTreeSet<String>> {
        Ok(self.running.lock().unwrap().clone())
    }

    async fn tear_down(&self) -> stackflow_container::Result<()> {
        self.calls.lock().unwrap().push("down".to_string());
        self.running.lock().unwrap().clear();
        Ok(())
    }

    async fn exec_in_service(
        &self,
        service: &str,
        command: &[String],
    ) -> stackflow_container::Result<ExecOutput> {
        if !self.running.lock().unwrap().contains(service) {
            return Err(ContainerError::ExecFailed {
                service: service.to_string(),
                status: 1,
                output: "service is not running".to_string(),
            });
        }
        let user = command.get(3).cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(format!("exec {}", user));

        let mut statuses = self.exec_statuses.lock().unwrap();
        let status = match statuses.get_mut(&user) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => 0,
        };
        Ok(ExecOutput {
            status,
            output: String::new(),
        })
    }

    async fn restart_service(&self, service: &str) -> stackflow_container::Result<()> {
        self.calls.lock().unwrap().push(format!("restart {}", service));
        Ok(())
    }
}

/// 全ツールがインストール済みのホスト
pub struct FakeHost {
    pub privileged: bool,
    pub probes: Mutex<Vec<String>>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            privileged: true,
            probes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HostSystem for FakeHost {
    fn is_privileged(&self) -> bool {
        self.privileged
    }

    async fn probe(&self, program: &str, args: &[&str]) -> Option<String> {
        let command = format!("{} {}", program, args.join(" "));
        self.probes.lock().unwrap().push(command.clone());
        let output = match command.as_str() {
            "git --version" => "git version 2.43.0",
            "docker --version" => "Docker version 24.0.7, build afdd53b",
            "docker compose version --short" => "2.24.5",
            _ => return None,
        };
        Some(output.to_string())
    }

    async fn run_script(&self, name: &str, _script: &str) -> std::io::Result<ExecOutput> {
        panic!("unexpected install of {}", name)
    }
}

#[allow(dead_code)]
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}
