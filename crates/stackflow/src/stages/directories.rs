//! 永続ストレージのディレクトリ構成
//!
//! 既存のブローカー設定があれば先にバックアップし、ディレクトリと
//! パスワードファイル（0600）を用意する。既存の状態があっても失敗しない。

use crate::error::Result;
use chrono::Local;
use stackflow_core::{DeploymentContext, StackError};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// コンテナ内から見たパスワードファイル
pub const CONTAINER_PASSWORD_FILE: &str = "/mosquitto/config/passwd";

const DEFAULT_BROKER_CONFIG: &str = "\
# stackflow が生成したデフォルト設定
listener 1883
allow_anonymous false
password_file /mosquitto/config/passwd

persistence true
persistence_location /mosquitto/data/

log_dest file /mosquitto/log/mosquitto.log
log_dest stdout
";

/// ホスト側のディレクトリ構成
#[derive(Debug, Clone)]
pub struct DirectoryLayout {
    pub broker_config: PathBuf,
    pub broker_data: PathBuf,
    pub broker_log: PathBuf,
    pub visualizer_data: PathBuf,
    pub provisioning: Vec<PathBuf>,
    pub password_file: PathBuf,
    pub broker_config_file: PathBuf,
    /// バックアップの保存先
    pub backup_root: PathBuf,
}

impl DirectoryLayout {
    pub fn under(project_dir: &Path) -> Self {
        let broker_config = project_dir.join("mosquitto/config");
        Self {
            password_file: broker_config.join("passwd"),
            broker_config_file: broker_config.join("mosquitto.conf"),
            broker_config,
            broker_data: project_dir.join("mosquitto/data"),
            broker_log: project_dir.join("mosquitto/log"),
            visualizer_data: project_dir.join("grafana/data"),
            provisioning: vec![
                project_dir.join("grafana/provisioning/datasources"),
                project_dir.join("grafana/provisioning/dashboards"),
            ],
            backup_root: project_dir
                .join(stackflow_core::STATE_DIR)
                .join("backups"),
        }
    }

    /// 作成するディレクトリとパーミッション
    ///
    /// ログと可視化サーバーのデータはコンテナ内の非 root ユーザーが書き込む。
    fn directories(&self) -> Vec<(&Path, u32)> {
        let mut dirs = vec![
            (self.broker_config.as_path(), 0o755),
            (self.broker_data.as_path(), 0o755),
            (self.broker_log.as_path(), 0o777),
            (self.visualizer_data.as_path(), 0o777),
        ];
        dirs.extend(self.provisioning.iter().map(|p| (p.as_path(), 0o755)));
        dirs
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryReport {
    pub created: Vec<PathBuf>,
    pub backup: Option<PathBuf>,
    pub wrote_default_config: bool,
}

pub fn prepare_directories(
    ctx: &mut DeploymentContext,
    layout: &DirectoryLayout,
) -> Result<DirectoryReport> {
    let mut report = DirectoryReport::default();

    if has_entries(&layout.broker_config) {
        match backup_tree(&layout.broker_config, &layout.backup_root) {
            Ok(backup) => {
                ctx.log
                    .detail(format!("ブローカー設定をバックアップ: {}", backup.display()));
                register_restore(ctx, layout.broker_config.clone(), backup.clone());
                report.backup = Some(backup);
            }
            Err(e) => {
                tracing::warn!("Broker config backup failed: {}", e);
                ctx.log
                    .warn(format!("ブローカー設定のバックアップに失敗しました: {}", e));
            }
        }
    }

    for (dir, mode) in layout.directories() {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| StackError::io(dir, &e))?;
            report.created.push(dir.to_path_buf());
        }
        fs::set_permissions(dir, fs::Permissions::from_mode(mode))
            .map_err(|e| StackError::io(dir, &e))?;
    }
    if !report.created.is_empty() {
        ctx.log
            .detail(format!("{} 個のディレクトリを作成", report.created.len()));
    }

    if !layout.broker_config_file.exists() {
        fs::write(&layout.broker_config_file, DEFAULT_BROKER_CONFIG)
            .map_err(|e| StackError::io(&layout.broker_config_file, &e))?;
        ctx.log.detail(format!(
            "デフォルトのブローカー設定を作成: {}",
            layout.broker_config_file.display()
        ));
        report.wrote_default_config = true;
    }

    // ブローカー起動前に必ず存在している必要がある
    let password_file = &layout.password_file;
    if !password_file.exists() {
        fs::write(password_file, "").map_err(|e| StackError::io(password_file, &e))?;
    }
    fs::set_permissions(password_file, fs::Permissions::from_mode(0o600))
        .map_err(|e| StackError::io(password_file, &e))?;

    Ok(report)
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// `<backup_root>/mosquitto-config-<timestamp>` にコピーする
fn backup_tree(source: &Path, backup_root: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(backup_root)?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

    let mut target = backup_root.join(format!("mosquitto-config-{}", stamp));
    let mut suffix = 1;
    while target.exists() {
        target = backup_root.join(format!("mosquitto-config-{}-{}", stamp, suffix));
        suffix += 1;
    }

    copy_tree(source, &target)?;
    Ok(target)
}

fn copy_tree(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &destination)?;
        } else {
            // fs::copy はパーミッションも引き継ぐ
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

fn register_restore(ctx: &mut DeploymentContext, config_dir: PathBuf, backup: PathBuf) {
    ctx.cleanup.register("ブローカー設定をバックアップから復元", move || async move {
        if config_dir.exists() {
            fs::remove_dir_all(&config_dir)?;
        }
        copy_tree(&backup, &config_dir)?;
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{Configuration, LogSink, ServiceSet};

    fn context(dir: &Path) -> DeploymentContext {
        DeploymentContext::new(
            dir,
            Configuration::new(),
            ServiceSet::default(),
            LogSink::memory(),
        )
    }

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn test_fresh_layout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path());
        let mut ctx = context(temp_dir.path());

        let report = prepare_directories(&mut ctx, &layout).unwrap();

        assert!(report.backup.is_none());
        assert!(report.wrote_default_config);
        assert_eq!(report.created.len(), 6);
        assert!(layout.broker_data.is_dir());
        assert!(layout.provisioning.iter().all(|p| p.is_dir()));
        assert_eq!(fs::read_to_string(&layout.password_file).unwrap(), "");
        assert_eq!(mode(&layout.password_file), 0o600);
        assert_eq!(mode(&layout.broker_log), 0o777);
        let conf = fs::read_to_string(&layout.broker_config_file).unwrap();
        assert!(conf.contains("allow_anonymous false"));
        assert!(conf.contains(CONTAINER_PASSWORD_FILE));
        assert!(ctx.cleanup.is_empty());
    }

    #[test]
    fn test_rerun_backs_up_and_keeps_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path());

        let mut ctx = context(temp_dir.path());
        prepare_directories(&mut ctx, &layout).unwrap();
        fs::write(&layout.password_file, "admin:$7$hash\n").unwrap();
        fs::write(&layout.broker_config_file, "listener 8883\n").unwrap();

        let mut ctx = context(temp_dir.path());
        let report = prepare_directories(&mut ctx, &layout).unwrap();

        assert!(report.created.is_empty());
        assert!(!report.wrote_default_config);
        assert_eq!(
            fs::read_to_string(&layout.password_file).unwrap(),
            "admin:$7$hash\n"
        );
        assert_eq!(mode(&layout.password_file), 0o600);
        assert_eq!(
            fs::read_to_string(&layout.broker_config_file).unwrap(),
            "listener 8883\n"
        );

        let backup = report.backup.unwrap();
        assert!(backup.starts_with(&layout.backup_root));
        assert_eq!(
            fs::read_to_string(backup.join("passwd")).unwrap(),
            "admin:$7$hash\n"
        );
        assert_eq!(ctx.cleanup.labels(), vec!["ブローカー設定をバックアップから復元"]);
    }

    #[test]
    fn test_backups_in_same_second_do_not_collide() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("src");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("passwd"), "x").unwrap();
        let root = temp_dir.path().join("backups");

        let first = backup_tree(&source, &root).unwrap();
        let second = backup_tree(&source, &root).unwrap();
        assert_ne!(first, second);
        assert!(second.join("passwd").exists());
    }

    #[tokio::test]
    async fn test_restore_compensation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = DirectoryLayout::under(temp_dir.path());

        let mut ctx = context(temp_dir.path());
        prepare_directories(&mut ctx, &layout).unwrap();
        fs::write(&layout.password_file, "before\n").unwrap();

        let mut ctx = context(temp_dir.path());
        prepare_directories(&mut ctx, &layout).unwrap();
        fs::write(&layout.password_file, "after\n").unwrap();

        let report = ctx.rollback().await;
        assert!(report.is_clean());
        assert_eq!(
            fs::read_to_string(&layout.password_file).unwrap(),
            "before\n"
        );
    }
}
