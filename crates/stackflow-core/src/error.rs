use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error(
        "管理者権限がありません\n\nヒント:\n  • sudo を付けて実行してください\n  • rootless Docker を使う場合は --no-root-check を指定してください"
    )]
    MissingPrivilege,

    #[error("必須ファイルが見つかりません: {}", .path.display())]
    MissingFile { path: PathBuf },

    #[error("必須の設定キーがありません: {key}\n\nヒント:\n  • .env に {key}=<値> を追加してください")]
    MissingConfigKey { key: String },

    #[error("設定キー '{key}' の値が空です")]
    EmptyConfigKey { key: String },

    #[error("依存ツール '{name}' が見つかりません（インストール後も検出できませんでした）")]
    DependencyMissing { name: String },

    #[error("'{name}' のバージョン {installed} は古すぎます（{required} 以上が必要です）")]
    VersionTooOld {
        name: String,
        installed: String,
        required: String,
    },

    #[error("バージョン文字列を解釈できません: {0}")]
    InvalidVersion(String),

    #[error("リトライ設定が不正です: {0}")]
    InvalidRetryPolicy(String),

    #[error(
        "デプロイは既に実行中です（{holder}、{since} から）\n\nヒント:\n  • 実行中のデプロイが終わるまで待ってください\n  • 異常終了した場合はロックファイルを削除してください: {}",
        .path.display()
    )]
    LockHeld {
        holder: String,
        since: String,
        path: PathBuf,
    },

    #[error("IO エラー: {}\n理由: {message}", .path.display())]
    IoError { path: PathBuf, message: String },

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON エラー: {0}")]
    Json(#[from] serde_json::Error),
}

impl StackError {
    /// 変更を加える前に検出されるエラーか（ロールバック不要）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingPrivilege
                | Self::MissingFile { .. }
                | Self::MissingConfigKey { .. }
                | Self::EmptyConfigKey { .. }
                | Self::LockHeld { .. }
        )
    }

    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
