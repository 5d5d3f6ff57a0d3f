use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// サービス内で実行したコマンドの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub status: i32,
    /// stdout と stderr を連結したもの
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// コンテナオーケストレーターのトレイト
///
/// スタック全体の起動・停止と、起動中サービスへの操作を抽象化する。
#[async_trait]
pub trait ComposeRuntime: Send + Sync {
    /// 指定サービスをビルドして起動する（デタッチ）
    async fn bring_up(&self, services: &[String]) -> Result<()>;

    /// 現在 running 状態のサービス名
    async fn list_running_services(&self) -> Result<BTreeSet<String>>;

    /// スタック全体を停止・削除する
    async fn tear_down(&self) -> Result<()>;

    /// 起動中サービス内でコマンドを実行する
    ///
    /// 非ゼロ終了は `Err` ではなく `ExecOutput::status` で返す。
    async fn exec_in_service(&self, service: &str, command: &[String]) -> Result<ExecOutput>;

    async fn restart_service(&self, service: &str) -> Result<()>;
}
