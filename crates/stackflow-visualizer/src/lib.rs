//! 可視化サーバー（Grafana 互換 HTTP API）クライアント
//!
//! ヘルスチェック、ダッシュボードのアップロード、公開共有の管理を行う。

pub mod client;
pub mod error;

pub use client::*;
pub use error::*;
