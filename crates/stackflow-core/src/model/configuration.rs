use crate::error::StackError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// デプロイ開始前に必ず設定されていなければならないキー
pub const REQUIRED_KEYS: [&str; 9] = [
    "PUBLIC_HOST",
    "MQTT_PORT",
    "MQTT_USER",
    "MQTT_PASS",
    "INFLUX_ORG",
    "INFLUX_TOKEN",
    "API_TOKEN",
    "GRAFANA_USER",
    "GRAFANA_PASSWORD",
];

/// ブローカーの主認証情報（起動後設定で必須）
pub const BROKER_CREDENTIAL_KEYS: [&str; 2] = ["MQTT_USER", "MQTT_PASS"];

/// 無くても動くが、あれば起動後設定で使うキー
pub const OPTIONAL_KEYS: [&str; 2] = ["MQTT_DEVICE_USER", "MQTT_DEVICE_PASS"];

/// 値が秘密情報として扱われるキー（ログには出さない）
pub const SECRET_KEYS: [&str; 5] = [
    "MQTT_PASS",
    "MQTT_DEVICE_PASS",
    "INFLUX_TOKEN",
    "API_TOKEN",
    "GRAFANA_PASSWORD",
];

/// 環境変数ファイルから読み込んだ設定値
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 空でない値を取得（空白のみの値は未設定とみなす）
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// 必須キーを取得
    pub fn require(&self, key: &str) -> Result<&str, StackError> {
        match self.get(key) {
            None => Err(StackError::MissingConfigKey {
                key: key.to_string(),
            }),
            Some(v) if v.trim().is_empty() => Err(StackError::EmptyConfigKey {
                key: key.to_string(),
            }),
            Some(v) => Ok(v),
        }
    }

    /// 必須キーを先頭から検査し、最初に見つかった欠落を返す
    pub fn missing_or_empty<S: AsRef<str>>(&self, keys: &[S]) -> Option<StackError> {
        keys.iter()
            .find_map(|key| self.require(key.as_ref()).err())
    }

    /// まだ存在しないキーだけを追加する
    pub fn fill_missing<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in pairs {
            self.values.entry(key).or_insert(value);
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEYS.contains(&key) || key.ends_with("_PASS") || key.ends_with("_TOKEN")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> Configuration {
        Configuration::from_pairs(REQUIRED_KEYS.iter().map(|k| (*k, "value")))
    }

    #[test]
    fn test_all_required_keys_present() {
        let config = full_config();
        assert_eq!(config.len(), 9);
        assert!(config.missing_or_empty(&REQUIRED_KEYS).is_none());
    }

    #[test]
    fn test_empty_value_is_reported_by_name() {
        let mut config = full_config();
        config.insert("INFLUX_TOKEN", "");

        match config.missing_or_empty(&REQUIRED_KEYS) {
            Some(StackError::EmptyConfigKey { key }) => assert_eq!(key, "INFLUX_TOKEN"),
            other => panic!("Expected EmptyConfigKey, got {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_value_counts_as_empty() {
        let config = Configuration::from_pairs([("MQTT_USER", "   ")]);
        assert!(matches!(
            config.require("MQTT_USER"),
            Err(StackError::EmptyConfigKey { .. })
        ));
        assert_eq!(config.non_empty("MQTT_USER"), None);
    }

    #[test]
    fn test_first_missing_key_wins() {
        // PUBLIC_HOST と MQTT_PORT が欠落 → 先頭の PUBLIC_HOST を報告
        let config = Configuration::from_pairs([("MQTT_USER", "u")]);
        match config.missing_or_empty(&REQUIRED_KEYS) {
            Some(StackError::MissingConfigKey { key }) => assert_eq!(key, "PUBLIC_HOST"),
            other => panic!("Expected MissingConfigKey, got {:?}", other),
        }
    }

    #[test]
    fn test_fill_missing_keeps_existing_values() {
        let mut config = Configuration::from_pairs([("MQTT_USER", "from_file")]);
        config.fill_missing([
            ("MQTT_USER".to_string(), "from_env".to_string()),
            ("MQTT_PASS".to_string(), "secret".to_string()),
        ]);

        assert_eq!(config.get("MQTT_USER"), Some("from_file"));
        assert_eq!(config.get("MQTT_PASS"), Some("secret"));
    }

    #[test]
    fn test_secret_keys() {
        assert!(is_secret_key("GRAFANA_PASSWORD"));
        assert!(is_secret_key("SOME_TOKEN"));
        assert!(!is_secret_key("PUBLIC_HOST"));
    }
}
