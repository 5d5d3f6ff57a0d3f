//! `.env` 形式の環境変数ファイル
//!
//! 1行1つの `KEY=VALUE`。`#` で始まる行と空行は無視し、`export ` 接頭辞と
//! シングル／ダブルクォートを受け付ける。

use crate::error::{ConfigError, Result};
use stackflow_core::Configuration;
use std::path::{Path, PathBuf};

/// 環境変数ファイルの場所を直接指定する環境変数
pub const ENV_FILE_VAR: &str = "STACKFLOW_ENV_FILE";

/// `.env` の内容を解析する（出現順）
///
/// 同じキーが複数回現れた場合は後の値が優先される（`Configuration` 化した時点で）。
pub fn parse_env(content: &str, origin: &Path) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let invalid = || ConfigError::InvalidEnvLine {
            path: origin.to_path_buf(),
            line: index + 1,
            content: raw.to_string(),
        };

        let (key, value) = line.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if !is_valid_key(key) {
            return Err(invalid());
        }

        pairs.push((key.to_string(), unquote(value.trim())));
    }

    Ok(pairs)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }

    // クォートなしの値は " #" 以降をコメントとして扱う
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// 値を `.env` に書き戻せる形にする
pub fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\'));
    if !needs_quotes {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

/// 環境変数ファイルを読み込む
pub fn load_env_file(path: &Path) -> Result<Configuration> {
    let content = std::fs::read_to_string(path)?;
    Ok(Configuration::from_pairs(parse_env(&content, path)?))
}

/// プロジェクトの環境変数ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 STACKFLOW_ENV_FILE (直接パス指定)
/// 2. プロジェクトディレクトリの .env
/// 3. プロジェクトディレクトリの .stackflow/.env
pub fn find_env_file(project_dir: &Path) -> Result<PathBuf> {
    if let Ok(env_path) = std::env::var(ENV_FILE_VAR) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let candidates = [
        project_dir.join(".env"),
        project_dir.join(stackflow_core::STATE_DIR).join(".env"),
    ];
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or(ConfigError::EnvFileNotFound)
}

/// ファイルに無いキーをプロセス環境変数から補う
pub fn overlay_process_env<S: AsRef<str>>(configuration: &mut Configuration, keys: &[S]) {
    configuration.fill_missing(keys.iter().filter_map(|key| {
        let key = key.as_ref();
        std::env::var(key).ok().map(|value| (key.to_string(), value))
    }));
}
