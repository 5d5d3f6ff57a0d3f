pub mod env;
pub mod error;
pub mod settings;

pub use env::*;
pub use error::*;
pub use settings::*;

use std::path::PathBuf;

/// stackflow のグローバル設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}
