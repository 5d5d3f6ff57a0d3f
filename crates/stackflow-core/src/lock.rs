//! デプロイロック
//!
//! 同一ホストでデプロイが同時に走らないよう `.stackflow/deploy.lock` で排他する。
//! 1時間以上前のロックは異常終了の残骸とみなして置き換える。

use crate::error::{Result, StackError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const LOCK_FILE: &str = "deploy.lock";
const STALE_AFTER_HOURS: i64 = 1;

/// ロック情報
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// ロックの RAII ガード
#[derive(Debug)]
pub struct DeployLock {
    lock_path: PathBuf,
    released: bool,
}

impl DeployLock {
    /// ロックを取得する
    pub async fn acquire(state_dir: &Path) -> Result<Self> {
        fs::create_dir_all(state_dir)
            .await
            .map_err(|e| StackError::io(state_dir, &e))?;

        let lock_path = state_dir.join(LOCK_FILE);

        match Self::create_exclusive(&lock_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Self::check_existing(&lock_path).await?;
                fs::remove_file(&lock_path).await?;
                Self::create_exclusive(&lock_path)
                    .await
                    .map_err(|e| StackError::io(&lock_path, &e))?;
            }
            Err(e) => return Err(StackError::io(&lock_path, &e)),
        }

        tracing::debug!("Acquired deploy lock: {}", lock_path.display());
        Ok(Self {
            lock_path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// ロックを解放する
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if fs::try_exists(&self.lock_path).await.unwrap_or(false) {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released deploy lock");
            }
            self.released = true;
        }
        Ok(())
    }

    async fn create_exclusive(lock_path: &Path) -> std::io::Result<()> {
        let info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&info)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await
    }

    /// 既存ロックが有効ならエラー、古い（または壊れた）ロックなら Ok
    async fn check_existing(lock_path: &Path) -> Result<()> {
        let content = fs::read_to_string(lock_path).await?;
        let info: LockInfo = match serde_json::from_str(&content) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!("Removing unreadable lock file: {}", e);
                return Ok(());
            }
        };

        let age = Utc::now().signed_duration_since(info.acquired_at);
        if age.num_hours() < STALE_AFTER_HOURS {
            return Err(StackError::LockHeld {
                holder: format!("{} (pid {})", info.holder, info.pid),
                since: info.acquired_at.to_rfc3339(),
                path: lock_path.to_path_buf(),
            });
        }

        tracing::warn!("Removing stale lock from {}", info.holder);
        Ok(())
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
