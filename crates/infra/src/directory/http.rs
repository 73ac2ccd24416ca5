//! HTTP client for the directory service.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::LoaderConfig;

use super::{
    DepartmentRecord, DirectoryError, DirectorySource, FieldSecurityRecord, RoleDetail,
    RoleRecord, VisibilitySettingRecord,
};

/// Reads role, membership and settings data over REST.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

/// Some backends wrap list responses in `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Body<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Body<T> {
    fn into_inner(self) -> T {
        match self {
            Body::Wrapped { data } => data,
            Body::Bare(inner) => inner,
        }
    }
}

impl HttpDirectory {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, DirectoryError> {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn from_config(config: &LoaderConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| DirectoryError::Network(e.to_string()))?;
        Self::with_client(client, &config.directory_url, config.bearer_token.clone())
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        token: Option<String>,
    ) -> Result<Self, DirectoryError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            DirectoryError::Network(format!("invalid directory url '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DirectoryError::Network(format!(
                "directory url '{base_url}' cannot carry a path"
            )));
        }
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Join path segments onto the base URL, escaping each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, DirectoryError> {
        let url = self.endpoint(segments);
        let mut req = self.client.get(url.clone());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                DirectoryError::Timeout
            } else {
                DirectoryError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "directory request failed");
            return Err(DirectoryError::Api(status.as_u16(), body));
        }

        let body: Body<T> = resp
            .json()
            .await
            .map_err(|e| DirectoryError::Parse(format!("{url}: {e}")))?;
        Ok(body.into_inner())
    }
}

#[async_trait]
impl DirectorySource for HttpDirectory {
    async fn list_roles(&self) -> Result<Vec<RoleRecord>, DirectoryError> {
        self.get_json(&["user-roles"]).await
    }

    async fn get_role(&self, id: &str) -> Result<RoleDetail, DirectoryError> {
        self.get_json(&["user-roles", id]).await
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, DirectoryError> {
        self.get_json(&["departments"]).await
    }

    async fn field_security(&self) -> Result<Vec<FieldSecurityRecord>, DirectoryError> {
        self.get_json(&["settings", "field-security"]).await
    }

    async fn visibility_settings(&self) -> Result<Vec<VisibilitySettingRecord>, DirectoryError> {
        self.get_json(&["settings", "visibility-rules"]).await
    }
}
