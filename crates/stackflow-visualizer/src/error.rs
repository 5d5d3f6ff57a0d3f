use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualizerError {
    #[error("可視化サーバーへのリクエストに失敗しました: {0}")]
    Http(#[from] reqwest::Error),

    #[error("可視化サーバーがエラーを返しました: {method} {path}（HTTP {status}）\n{body}")]
    Api {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error(
        "可視化サーバーが {attempts} 回の確認で応答しませんでした\n\nヒント:\n  • docker compose logs で可視化サーバーの起動状況を確認してください"
    )]
    NotReady { attempts: u32 },

    #[error("ダッシュボード定義が不正です: {0}")]
    InvalidDashboard(String),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VisualizerError>;
