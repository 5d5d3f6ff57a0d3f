//! docker compose CLI ラッパー
//!
//! `docker compose -f <file> --project-directory <dir> [-p <name>] ...` を実行する。
//! 設定値は子プロセスの環境変数として渡し、compose ファイル側の `${KEY}` 展開に使わせる。

use crate::error::{ContainerError, Result};
use crate::runtime::{ComposeRuntime, ExecOutput};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// `docker compose` を使う本番用ランタイム
#[derive(Debug, Clone)]
pub struct DockerCompose {
    program: PathBuf,
    project_dir: PathBuf,
    compose_file: PathBuf,
    project_name: Option<String>,
    env: Vec<(String, String)>,
}

impl DockerCompose {
    pub fn new(project_dir: impl Into<PathBuf>, compose_file: impl AsRef<Path>) -> Self {
        let project_dir = project_dir.into();
        let compose_file = if compose_file.as_ref().is_absolute() {
            compose_file.as_ref().to_path_buf()
        } else {
            project_dir.join(compose_file)
        };
        Self {
            program: PathBuf::from("docker"),
            project_dir,
            compose_file,
            project_name: None,
            env: Vec::new(),
        }
    }

    /// `docker` 以外の実行ファイルを使う
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// 子プロセスに渡す環境変数を追加する
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn compose_file(&self) -> &Path {
        &self.compose_file
    }

    /// `docker` に渡す引数列
    pub fn command_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.compose_file.display().to_string(),
            "--project-directory".to_string(),
            self.project_dir.display().to_string(),
        ];
        if let Some(ref name) = self.project_name {
            full.push("-p".to_string());
            full.push(name.clone());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    fn command(&self, args: &[&str]) -> (Command, String) {
        let full = self.command_args(args);
        let shown = format!("{} {}", self.program.display(), full.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&full);
        cmd.current_dir(&self.project_dir);
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // 中断時に子プロセスを残さない
        cmd.kill_on_drop(true);
        (cmd, shown)
    }

    async fn output(&self, args: &[&str]) -> Result<(std::process::Output, String)> {
        let (mut cmd, shown) = self.command(args);
        tracing::debug!("Running: {}", shown);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ContainerError::ComposeNotFound(e.to_string())
            } else {
                ContainerError::Io(e)
            }
        })?;
        Ok((output, shown))
    }

    /// コマンドを実行して stdout を返す
    async fn run(&self, args: &[&str]) -> Result<String> {
        let (output, shown) = self.output(args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainerError::CommandFailed {
                command: shown,
                status: output.status.code().unwrap_or(1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `ps --services` の出力をサービス名の集合にする
pub fn parse_service_list(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ComposeRuntime for DockerCompose {
    async fn bring_up(&self, services: &[String]) -> Result<()> {
        let mut args = vec!["up", "-d", "--build"];
        args.extend(services.iter().map(String::as_str));
        self.run(&args).await?;
        Ok(())
    }

    async fn list_running_services(&self) -> Result<BTreeSet<String>> {
        let output = self
            .run(&["ps", "--services", "--filter", "status=running"])
            .await?;
        Ok(parse_service_list(&output))
    }

    async fn tear_down(&self) -> Result<()> {
        self.run(&["down", "--remove-orphans"]).await?;
        Ok(())
    }

    async fn exec_in_service(&self, service: &str, command: &[String]) -> Result<ExecOutput> {
        let mut args = vec!["exec", "-T", service];
        args.extend(command.iter().map(String::as_str));
        let (output, _) = self.output(&args).await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        Ok(ExecOutput {
            status: output.status.code().unwrap_or(1),
            output: combined.trim_end().to_string(),
        })
    }

    async fn restart_service(&self, service: &str) -> Result<()> {
        self.run(&["restart", service]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args_with_project_name() {
        let compose = DockerCompose::new("/srv/iot", "docker-compose.yml").with_project_name("iot");
        assert_eq!(
            compose.command_args(&["ps", "--services"]),
            vec![
                "compose",
                "-f",
                "/srv/iot/docker-compose.yml",
                "--project-directory",
                "/srv/iot",
                "-p",
                "iot",
                "ps",
                "--services",
            ]
        );
    }

    #[test]
    fn test_absolute_compose_file_is_kept() {
        let compose = DockerCompose::new("/srv/iot", "/etc/stack/compose.yml");
        assert_eq!(compose.compose_file(), Path::new("/etc/stack/compose.yml"));
        assert!(!compose.command_args(&[]).contains(&"-p".to_string()));
    }

    /// 2秒後に印を残す偽の docker を作る
    fn slow_docker(dir: &Path, marker: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("docker");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 2\ntouch '{}'\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[tokio::test]
    async fn test_dropped_bring_up_kills_child() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("up-finished");
        let compose = DockerCompose::new(temp_dir.path(), "docker-compose.yml")
            .with_program(slow_docker(temp_dir.path(), &marker));

        let services = vec!["mosquitto".to_string()];
        let interrupted = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            compose.bring_up(&services),
        )
        .await;
        assert!(interrupted.is_err());

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!marker.exists(), "compose child outlived its future");
    }

    #[tokio::test]
    async fn test_missing_program_is_compose_not_found() {
        let compose = DockerCompose::new("/tmp", "docker-compose.yml")
            .with_program("/nonexistent/stackflow-docker");
        let err = compose.tear_down().await.unwrap_err();
        assert!(matches!(err, ContainerError::ComposeNotFound(_)));
    }

    #[test]
    fn test_parse_service_list() {
        let services = parse_service_list("mosquitto\ninfluxdb\n\n  grafana  \n");
        let expected: BTreeSet<String> = ["grafana", "influxdb", "mosquitto"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(services, expected);
        assert!(parse_service_list("").is_empty());
    }
}
