use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// スタック内でのサービスの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceRole {
    /// MQTTブローカー
    Broker,
    /// 時系列データベース
    Database,
    /// メトリクスコレクター
    Collector,
    /// クエリAPI
    Api,
    /// 可視化サーバー
    Visualizer,
}

impl ServiceRole {
    /// 起動順に並べた全ロール
    pub fn all() -> [Self; 5] {
        [
            Self::Broker,
            Self::Database,
            Self::Collector,
            Self::Api,
            Self::Visualizer,
        ]
    }

    /// compose ファイル上のデフォルトのサービス名
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Broker => "mosquitto",
            Self::Database => "influxdb",
            Self::Collector => "telegraf",
            Self::Api => "api",
            Self::Visualizer => "grafana",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Broker => "MQTTブローカー",
            Self::Database => "時系列DB",
            Self::Collector => "コレクター",
            Self::Api => "クエリAPI",
            Self::Visualizer => "可視化サーバー",
        }
    }
}

/// 1つのサービス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub role: ServiceRole,
    pub name: String,
}

/// 起動を待つサービスの固定リスト（順序付き）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSet {
    services: Vec<ServiceSpec>,
}

impl Default for ServiceSet {
    fn default() -> Self {
        Self {
            services: ServiceRole::all()
                .into_iter()
                .map(|role| ServiceSpec {
                    role,
                    name: role.default_name().to_string(),
                })
                .collect(),
        }
    }
}

impl ServiceSet {
    pub fn new(services: Vec<ServiceSpec>) -> Self {
        Self { services }
    }

    /// サービス名を上書きしたセットを返す
    pub fn with_overrides(mut self, overrides: &BTreeMap<ServiceRole, String>) -> Self {
        for spec in &mut self.services {
            if let Some(name) = overrides.get(&spec.role) {
                spec.name = name.clone();
            }
        }
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }

    pub fn name_of(&self, role: ServiceRole) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.role == role)
            .map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceSpec> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
