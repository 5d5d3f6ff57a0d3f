//! stackflow のコア
//!
//! デプロイ1回分の状態（[`DeploymentContext`]）と、各ステージが共有する
//! 基本部品（リトライ、ロールバック、待機、ログ、バージョン比較、ロック）を提供します。

pub mod error;
pub mod lock;
pub mod log;
pub mod model;
pub mod retry;
pub mod rollback;
pub mod version;
pub mod wait;

pub use error::{Result, StackError};
pub use lock::DeployLock;
pub use log::{LogEntry, LogLevel, LogSink};
pub use model::*;
pub use retry::{RetryAttempt, retry_with_backoff};
pub use rollback::{CleanupRegistry, RollbackReport, RollbackStep};
pub use wait::{Probe, WaitTimeout, wait_until};
