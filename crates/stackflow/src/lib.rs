//! stackflow
//!
//! IoT スタック（MQTT ブローカー・時系列 DB・コレクター・クエリ API・可視化サーバー）を
//! 1台のホストにデプロイする。各ステージは失敗時に元に戻す手段を登録し、
//! どこかで失敗したら逆順にロールバックする。

pub mod error;
pub mod host;
pub mod pipeline;
pub mod scripts;
pub mod secrets;
pub mod setup;
pub mod stages;

pub use error::{DeployError, INTERRUPTED_EXIT_CODE, Result};
pub use host::{HostSystem, LocalHost};
pub use pipeline::{DeployFailure, DeployOutcome, Pipeline, PipelineOptions};
pub use secrets::{InitEnvReport, generate_secret, init_env};
pub use setup::{DeployStep, StepTracker, parse_skip_steps};
