//! モデル定義
//!
//! デプロイで使用されるデータモデルを定義します。

mod configuration;
mod context;
mod policy;
mod service;

// Re-exports
pub use configuration::*;
pub use context::*;
pub use policy::*;
pub use service::*;
