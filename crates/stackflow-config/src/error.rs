use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "環境変数ファイルが見つかりません。以下の場所を確認してください:\n\
        - プロジェクトディレクトリ: .env\n\
        - ./.stackflow/.env\n\
        または STACKFLOW_ENV_FILE 環境変数で直接指定できます\n\n\
        ヒント:\n  • stackflow init-env で雛形を生成できます"
    )]
    EnvFileNotFound,

    #[error("{}:{line}: KEY=VALUE 形式ではありません: {content}", .path.display())]
    InvalidEnvLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("設定ファイルの解析に失敗しました: {}\n理由: {message}", .path.display())]
    SettingsParse { path: PathBuf, message: String },

    #[error("設定値が不正です: {0}")]
    InvalidSetting(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
