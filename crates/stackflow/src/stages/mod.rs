//! デプロイの各ステージ
//!
//! 依存順に実行する。副作用を起こすステージは元に戻す手段を
//! `DeploymentContext::cleanup` に登録する。

pub mod configurator;
pub mod dashboard;
pub mod directories;
pub mod installer;
pub mod launcher;
pub mod prerequisites;

pub use configurator::{PostStartCommand, PostStartReport, Requirement, configure_services, plan_post_start};
pub use dashboard::{PublishedDashboard, publish_dashboards};
pub use directories::{DirectoryLayout, DirectoryReport, prepare_directories};
pub use installer::{Dependency, InstalledTool, default_dependencies, install_dependencies};
pub use launcher::{LaunchState, StackLauncher};
pub use prerequisites::{PrerequisiteCheck, validate_prerequisites};
