//! ホスト OS への操作
//!
//! 権限確認・ツールの存在確認・インストールスクリプト実行をトレイトで抽象化する。

use async_trait::async_trait;
use stackflow_container::ExecOutput;
use std::process::Stdio;
use tokio::process::Command;

#[async_trait]
pub trait HostSystem: Send + Sync {
    /// 管理者権限で実行されているか
    fn is_privileged(&self) -> bool;

    /// コマンドを実行し、成功すれば stdout を返す（存在しなければ None）
    async fn probe(&self, program: &str, args: &[&str]) -> Option<String>;

    /// シェルスクリプトを実行する
    async fn run_script(&self, name: &str, script: &str) -> std::io::Result<ExecOutput>;
}

/// 実行中のホスト
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

#[async_trait]
impl HostSystem for LocalHost {
    fn is_privileged(&self) -> bool {
        // SAFETY: geteuid は副作用がなく常に成功する
        unsafe { libc::geteuid() == 0 }
    }

    async fn probe(&self, program: &str, args: &[&str]) -> Option<String> {
        tracing::debug!("Probing: {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_script(&self, name: &str, script: &str) -> std::io::Result<ExecOutput> {
        tracing::debug!("Running install script: {}", name);
        let output = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ExecOutput {
            status: output.status.code().unwrap_or(1),
            output: combined.trim_end().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_missing_program() {
        let host = LocalHost;
        assert!(
            host.probe("stackflow-definitely-missing-tool", &["--version"])
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_run_script_captures_status() {
        let host = LocalHost;
        let output = host
            .run_script("test", "echo installed; exit 4")
            .await
            .unwrap();
        assert_eq!(output.status, 4);
        assert!(output.output.contains("installed"));
    }

    #[tokio::test]
    async fn test_dropped_script_is_killed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("installed");
        let script = format!("sleep 2; touch '{}'", marker.display());

        let host = LocalHost;
        let interrupted = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            host.run_script("slow", &script),
        )
        .await;
        assert!(interrupted.is_err());

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }
}
