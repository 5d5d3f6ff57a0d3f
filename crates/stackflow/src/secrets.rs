//! 認証情報の生成と `.env` テンプレート
//!
//! 秘密情報のキーにはランダムな英数字を、それ以外にはデフォルト値を入れる。
//! 既存の値は上書きしない。

use crate::error::{DeployError, Result};
use rand::Rng;
use rand::distributions::Alphanumeric;
use stackflow_config::{parse_env, quote_value};
use stackflow_core::{REQUIRED_KEYS, StackError, is_secret_key};
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// 生成する秘密情報の長さ
pub const SECRET_LENGTH: usize = 32;

/// ランダムな英数字の文字列を生成する
pub fn generate_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn default_value(key: &str) -> &'static str {
    match key {
        "PUBLIC_HOST" => "localhost",
        "MQTT_PORT" => "1883",
        "MQTT_USER" => "admin",
        "INFLUX_ORG" => "iot",
        "GRAFANA_USER" => "admin",
        _ => "",
    }
}

#[derive(Debug, Clone, Default)]
pub struct InitEnvReport {
    pub path: PathBuf,
    /// 追加したキー
    pub added: Vec<String>,
    /// そのうち値を生成したキー
    pub generated: Vec<String>,
    /// 既にあったキー
    pub preserved: Vec<String>,
}

/// `.env` を作成する（`force` なら既存ファイルに不足キーを追記する）
pub fn init_env(path: &Path, force: bool) -> Result<InitEnvReport> {
    let exists = path.exists();
    if exists && !force {
        return Err(DeployError::EnvFileExists {
            path: path.to_path_buf(),
        });
    }

    let mut content = if exists {
        fs::read_to_string(path).map_err(|e| StackError::io(path, &e))?
    } else {
        String::from("# stackflow init-env で生成\n")
    };
    let existing: BTreeSet<String> = parse_env(&content, path)?
        .into_iter()
        .map(|(key, _)| key)
        .collect();

    let mut report = InitEnvReport {
        path: path.to_path_buf(),
        ..Default::default()
    };

    let mut appended = String::new();
    for key in REQUIRED_KEYS {
        if existing.contains(key) {
            report.preserved.push(key.to_string());
            continue;
        }
        let value = if is_secret_key(key) {
            report.generated.push(key.to_string());
            generate_secret(SECRET_LENGTH)
        } else {
            default_value(key).to_string()
        };
        appended.push_str(&format!("{}={}\n", key, quote_value(&value)));
        report.added.push(key.to_string());
    }

    if !appended.is_empty() {
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        if exists {
            content.push_str("\n# stackflow init-env で追加\n");
        }
        content.push_str(&appended);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StackError::io(parent, &e))?;
    }
    fs::write(path, content).map_err(|e| StackError::io(path, &e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| StackError::io(path, &e))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_config::load_env_file;

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret(SECRET_LENGTH);
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_secret(SECRET_LENGTH));
    }

    #[test]
    fn test_new_file_has_every_required_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".env");

        let report = init_env(&path, false).unwrap();

        assert_eq!(report.added.len(), REQUIRED_KEYS.len());
        assert_eq!(
            report.generated,
            vec!["MQTT_PASS", "INFLUX_TOKEN", "API_TOKEN", "GRAFANA_PASSWORD"]
        );
        let configuration = load_env_file(&path).unwrap();
        assert!(configuration.missing_or_empty(&REQUIRED_KEYS).is_none());
        assert_eq!(configuration.get("MQTT_PORT"), Some("1883"));
        assert_eq!(configuration.get("API_TOKEN").map(str::len), Some(32));

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_refuses_to_overwrite_without_force() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "MQTT_PASS=keep\n").unwrap();

        let err = init_env(&path, false).unwrap_err();
        assert!(matches!(err, DeployError::EnvFileExists { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "MQTT_PASS=keep\n");
    }

    #[test]
    fn test_force_preserves_existing_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".env");
        fs::write(&path, "# my stack\nMQTT_PASS=keep\nPUBLIC_HOST=iot.example.com").unwrap();

        let report = init_env(&path, true).unwrap();

        assert_eq!(report.preserved, vec!["PUBLIC_HOST", "MQTT_PASS"]);
        assert!(!report.generated.contains(&"MQTT_PASS".to_string()));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# my stack\n"));
        let configuration = load_env_file(&path).unwrap();
        assert_eq!(configuration.get("MQTT_PASS"), Some("keep"));
        assert_eq!(configuration.get("PUBLIC_HOST"), Some("iot.example.com"));
        assert!(configuration.missing_or_empty(&REQUIRED_KEYS).is_none());

        // 2回目は何も追加しない
        let report = init_env(&path, true).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }
}
