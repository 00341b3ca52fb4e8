pub mod sync;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::GithubConfig;
use crate::error::AppError;

/// Repositories fetched in the single listing call.
pub const PAGE_SIZE: u32 = 100;

/// Repository as returned by `GET /user/repos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRepo {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: i32,
    #[serde(default)]
    pub forks_count: i32,
    #[serde(default)]
    pub open_issues_count: i32,
    #[serde(default)]
    pub private: bool,
    pub default_branch: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum GithubError {
    NotConfigured,
    Request(String),
    Status(u16, String),
    Decode(String),
}

impl std::fmt::Display for GithubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GithubError::NotConfigured => write!(f, "GitHub token is not configured"),
            GithubError::Request(msg) => write!(f, "GitHub request failed: {msg}"),
            GithubError::Status(code, body) => write!(f, "GitHub returned {code}: {body}"),
            GithubError::Decode(msg) => write!(f, "Invalid GitHub response: {msg}"),
        }
    }
}

impl From<GithubError> for AppError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::NotConfigured => {
                AppError::Validation("GitHub integration is not configured".to_string())
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

pub struct GithubClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("wishdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| format!("Failed to build GitHub client: {e}"))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// The authenticated user's most recently updated repositories (one page).
    pub async fn list_repos(&self) -> Result<Vec<RemoteRepo>, GithubError> {
        let token = self.token.as_deref().ok_or(GithubError::NotConfigured)?;

        let resp = self
            .client
            .get(format!(
                "{}/user/repos?sort=updated&per_page={PAGE_SIZE}",
                self.api_url
            ))
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| GithubError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect::<String>();
            return Err(GithubError::Status(status.as_u16(), body));
        }

        resp.json::<Vec<RemoteRepo>>()
            .await
            .map_err(|e| GithubError::Decode(e.to_string()))
    }
}
