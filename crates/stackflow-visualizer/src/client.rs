use crate::error::{Result, VisualizerError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stackflow_core::{RetryPolicy, retry_with_backoff};
use std::time::Duration;

/// アップロード済みダッシュボード
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardRef {
    pub uid: String,
    #[serde(default)]
    pub url: String,
}

/// ダッシュボードの公開共有
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicShare {
    pub uid: String,
    pub access_token: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl PublicShare {
    /// 認証なしで閲覧できる URL
    pub fn public_url(&self, public_base: &str) -> String {
        format!(
            "{}/public-dashboards/{}",
            public_base.trim_end_matches('/'),
            self.access_token
        )
    }
}

/// 可視化サーバーの管理 API クライアント（Basic 認証）
pub struct VisualizerClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl VisualizerClient {
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user: user.into(),
            password: password.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        tracing::debug!("{} {}", method, path);
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn check(
        method: &reqwest::Method,
        path: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(VisualizerError::Api {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// `GET /api/health` が成功するか
    pub async fn health(&self) -> Result<()> {
        let path = "/api/health";
        let response = self.client.get(self.url(path)).send().await?;
        Self::check(&reqwest::Method::GET, path, response).await?;
        Ok(())
    }

    /// ヘルスチェックが通るまでリトライする
    pub async fn wait_ready(&self, policy: &RetryPolicy) -> Result<()> {
        retry_with_backoff(
            policy,
            move |_| self.health(),
            |retry| {
                tracing::debug!(
                    "Visualizer not ready ({}/{}): {}",
                    retry.attempt,
                    retry.max_attempts,
                    retry.error
                )
            },
        )
        .await
        .map_err(|e| {
            tracing::debug!("Visualizer health check failed: {}", e);
            VisualizerError::NotReady {
                attempts: policy.max_attempts,
            }
        })
    }

    /// ダッシュボードを上書きアップロードする
    ///
    /// `{"dashboard": {...}}` 形式でも、ダッシュボード本体だけでも受け付ける。
    pub async fn upload_dashboard(&self, definition: &Value) -> Result<DashboardRef> {
        let mut dashboard = match definition.get("dashboard") {
            Some(inner) => inner.clone(),
            None => definition.clone(),
        };
        let object = dashboard.as_object_mut().ok_or_else(|| {
            VisualizerError::InvalidDashboard("JSON オブジェクトではありません".to_string())
        })?;
        // 別インスタンスからエクスポートした id は使わない
        object.insert("id".to_string(), Value::Null);

        let path = "/api/dashboards/db";
        let method = reqwest::Method::POST;
        let response = self
            .request(method.clone(), path)
            .json(&json!({ "dashboard": dashboard, "overwrite": true }))
            .send()
            .await?;
        let response = Self::check(&method, path, response).await?;
        Ok(response.json().await?)
    }

    /// 既存の公開共有（無ければ None）
    pub async fn public_share(&self, dashboard_uid: &str) -> Result<Option<PublicShare>> {
        let path = format!("/api/dashboards/uid/{}/public-dashboards", dashboard_uid);
        let method = reqwest::Method::GET;
        let response = self.request(method.clone(), &path).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(&method, &path, response).await?;
        let body: Value = response.json().await?;
        // 未作成時に空オブジェクトを返すバージョンがある
        if body.get("uid").and_then(Value::as_str).unwrap_or("").is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(body)?))
    }

    pub async fn delete_public_share(&self, dashboard_uid: &str, share_uid: &str) -> Result<()> {
        let path = format!(
            "/api/dashboards/uid/{}/public-dashboards/{}",
            dashboard_uid, share_uid
        );
        let method = reqwest::Method::DELETE;
        let response = self.request(method.clone(), &path).send().await?;
        Self::check(&method, &path, response).await?;
        Ok(())
    }

    /// 有効化・時間範囲選択可能な公開共有を作成する
    pub async fn create_public_share(&self, dashboard_uid: &str) -> Result<PublicShare> {
        let path = format!("/api/dashboards/uid/{}/public-dashboards", dashboard_uid);
        let method = reqwest::Method::POST;
        let response = self
            .request(method.clone(), &path)
            .json(&json!({
                "isEnabled": true,
                "timeSelectionEnabled": true,
                "share": "public",
            }))
            .send()
            .await?;
        let response = Self::check(&method, &path, response).await?;
        Ok(response.json().await?)
    }

    /// 既存の公開共有を削除してから作り直す
    pub async fn replace_public_share(&self, dashboard_uid: &str) -> Result<PublicShare> {
        if let Some(existing) = self.public_share(dashboard_uid).await? {
            self.delete_public_share(dashboard_uid, &existing.uid)
                .await?;
        }
        self.create_public_share(dashboard_uid).await
    }
}
