//! Repository host collaborator: metadata lookup and push-hook registration.
//!
//! The engine never talks to a hosting service directly; callers inject a
//! [`RepositoryHost`]. [`GithubClient`] is the production implementation.

use std::fmt;

use async_trait::async_trait;
use repocheck_state::{Language, RepositoryRecord};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::GithubConfig;
use crate::domain::{CheckError, CheckResult};

/// How a caller names a repository: numeric external id or `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryRef {
    ExternalId(i64),
    FullName(String),
}

impl RepositoryRef {
    /// All-digit input is an external id; anything else is a full name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse() {
                return RepositoryRef::ExternalId(id);
            }
        }
        RepositoryRef::FullName(raw.to_string())
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryRef::ExternalId(id) => write!(f, "{id}"),
            RepositoryRef::FullName(name) => f.write_str(name),
        }
    }
}

/// Repository metadata as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub ssh_url: Option<String>,
}

impl RemoteRepository {
    pub fn language(&self) -> Language {
        Language::from(self.language.as_deref().unwrap_or(""))
    }

    pub fn into_record(self) -> RepositoryRecord {
        let language = self.language();
        let mut record = RepositoryRecord::new(self.id, self.name, self.full_name, language);
        record.clone_url = self.clone_url;
        record.ssh_url = self.ssh_url;
        record
    }
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    async fn lookup_repository(&self, repo: &RepositoryRef) -> CheckResult<RemoteRepository>;

    /// Register a push webhook on `full_name` delivering to `callback_url`.
    async fn create_hook(&self, full_name: &str, callback_url: &str) -> CheckResult<()>;
}

/// GitHub REST API client.
pub struct GithubClient {
    api_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> CheckResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("repocheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CheckError::Host(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http_client
            .request(method, format!("{}{}", self.api_url, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }
}

fn host_error(e: reqwest::Error) -> CheckError {
    CheckError::Host(e.to_string())
}

#[async_trait]
impl RepositoryHost for GithubClient {
    async fn lookup_repository(&self, repo: &RepositoryRef) -> CheckResult<RemoteRepository> {
        let path = match repo {
            RepositoryRef::ExternalId(id) => format!("/repositories/{id}"),
            RepositoryRef::FullName(name) => format!("/repos/{name}"),
        };
        debug!(%path, "looking up repository");

        let response = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(host_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CheckError::RepositoryNotFound(repo.to_string())),
            status if status.is_success() => response.json().await.map_err(host_error),
            status => Err(CheckError::Host(format!(
                "GET {path} returned {status}"
            ))),
        }
    }

    async fn create_hook(&self, full_name: &str, callback_url: &str) -> CheckResult<()> {
        let path = format!("/repos/{full_name}/hooks");
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": {
                "url": callback_url,
                "content_type": "json",
            },
        });

        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(host_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(CheckError::RepositoryNotFound(full_name.to_string())),
            status if status.is_success() => {
                info!(repository = %full_name, url = %callback_url, "push hook registered");
                Ok(())
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(CheckError::Host(format!(
                    "POST {path} returned {status}: {text}"
                )))
            }
        }
    }
}
