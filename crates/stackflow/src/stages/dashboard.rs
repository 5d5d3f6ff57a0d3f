//! ダッシュボードの公開
//!
//! 可視化サーバーの起動を待ってダッシュボード JSON をアップロードし、公開共有を作り直す。
//! ここでの失敗はすべて警告にとどめ、デプロイ自体は成功させる。

use serde_json::Value;
use stackflow_config::DashboardSettings;
use stackflow_core::{Configuration, LogSink};
use stackflow_visualizer::{VisualizerClient, VisualizerError};
use std::fs;
use std::path::{Path, PathBuf};

/// 公開できたダッシュボード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDashboard {
    pub file: PathBuf,
    pub uid: String,
    pub public_url: String,
}

/// ディレクトリ内の `*.json` をファイル名順に返す
fn dashboard_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

async fn publish_one(
    client: &VisualizerClient,
    file: &Path,
    public_base: &str,
) -> Result<PublishedDashboard, VisualizerError> {
    let content = fs::read_to_string(file)
        .map_err(|e| VisualizerError::InvalidDashboard(format!("{}: {}", file.display(), e)))?;
    let definition: Value = serde_json::from_str(&content)?;

    let uploaded = client.upload_dashboard(&definition).await?;
    let share = client.replace_public_share(&uploaded.uid).await?;

    Ok(PublishedDashboard {
        file: file.to_path_buf(),
        uid: uploaded.uid,
        public_url: share.public_url(public_base),
    })
}

/// ダッシュボードを公開する（失敗しても警告のみ）
pub async fn publish_dashboards(
    project_dir: &Path,
    settings: &DashboardSettings,
    configuration: &Configuration,
    log: &mut LogSink,
) -> Vec<PublishedDashboard> {
    let mut published = Vec::new();

    let dir = project_dir.join(&settings.dir);
    let files = match dashboard_files(&dir) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) => {
            log.detail(format!("ダッシュボードがありません: {}", dir.display()));
            return published;
        }
        Err(e) => {
            tracing::debug!("Dashboard directory unavailable: {}", e);
            log.detail(format!("ダッシュボードがありません: {}", dir.display()));
            return published;
        }
    };

    let client = match VisualizerClient::new(
        settings.url.clone(),
        configuration.get("GRAFANA_USER").unwrap_or("admin"),
        configuration.get("GRAFANA_PASSWORD").unwrap_or_default(),
        settings.request_timeout(),
    ) {
        Ok(client) => client,
        Err(e) => {
            log.warn(format!("可視化サーバーのクライアントを作成できません: {}", e));
            return published;
        }
    };

    log.info(format!("可視化サーバーの起動を待機中: {}", client.base_url()));
    if let Err(e) = client.wait_ready(&settings.ready).await {
        log.warn(format!("ダッシュボードを公開できませんでした: {}", e));
        return published;
    }

    let public_base =
        settings.public_base_for(configuration.non_empty("PUBLIC_HOST").unwrap_or("localhost"));

    for file in files {
        match publish_one(&client, &file, &public_base).await {
            Ok(dashboard) => {
                log.success(format!("ダッシュボード公開: {}", dashboard.uid));
                log.detail(dashboard.public_url.clone());
                published.push(dashboard);
            }
            Err(e) => {
                tracing::warn!("Dashboard publishing failed for {}: {}", file.display(), e);
                log.warn(format!(
                    "ダッシュボードの公開に失敗しました（{}）: {}",
                    file.display(),
                    e
                ));
            }
        }
    }

    published
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use stackflow_core::RetryPolicy;

    fn settings(server: &MockServer) -> DashboardSettings {
        DashboardSettings {
            url: server.base_url(),
            ready: RetryPolicy {
                max_attempts: 2,
                initial_delay_ms: 10,
                max_delay_ms: 10,
                multiplier: 1.0,
                jitter_ms: 0,
            },
            request_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn configuration() -> Configuration {
        Configuration::from_pairs([
            ("PUBLIC_HOST", "iot.example.com"),
            ("GRAFANA_USER", "admin"),
            ("GRAFANA_PASSWORD", "secret"),
        ])
    }

    fn project_with_dashboard() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let dashboards = dir.path().join("grafana/dashboards");
        fs::create_dir_all(&dashboards).unwrap();
        fs::write(
            dashboards.join("sensors.json"),
            json!({ "uid": "sensors", "title": "Sensors" }).to_string(),
        )
        .unwrap();
        fs::write(dashboards.join("README.md"), "not a dashboard").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_publish_logs_public_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/health");
                then.status(200);
            })
            .await;
        let upload = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/dashboards/db");
                then.status(200)
                    .json_body(json!({ "uid": "sensors", "url": "/d/sensors" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/dashboards/uid/sensors/public-dashboards");
                then.status(404);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/dashboards/uid/sensors/public-dashboards");
                then.status(200).json_body(json!({
                    "uid": "share",
                    "accessToken": "tok123",
                    "isEnabled": true
                }));
            })
            .await;

        let dir = project_with_dashboard();
        let mut log = LogSink::memory();
        let published =
            publish_dashboards(dir.path(), &settings(&server), &configuration(), &mut log).await;

        upload.assert_async().await;
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].public_url,
            "http://iot.example.com:3000/public-dashboards/tok123"
        );
        assert!(log.contains("public-dashboards/tok123"));
        assert!(!log.contains("secret"));
    }

    #[tokio::test]
    async fn test_unready_visualizer_is_only_a_warning() {
        let server = MockServer::start_async().await;
        let health = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/health");
                then.status(503);
            })
            .await;

        let dir = project_with_dashboard();
        let mut log = LogSink::memory();
        let published =
            publish_dashboards(dir.path(), &settings(&server), &configuration(), &mut log).await;

        assert!(published.is_empty());
        assert_eq!(health.hits_async().await, 2);
        assert!(log.contains("ダッシュボードを公開できませんでした"));
    }

    #[tokio::test]
    async fn test_missing_directory_skips_network() {
        let server = MockServer::start_async().await;
        let health = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/health");
                then.status(200);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut log = LogSink::memory();
        let published =
            publish_dashboards(dir.path(), &settings(&server), &configuration(), &mut log).await;

        assert!(published.is_empty());
        assert_eq!(health.hits_async().await, 0);
    }
}
