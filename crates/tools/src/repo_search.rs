//! Repository lookup — `search_repositories`.
//!
//! Lists public repositories from a code-hosting API, normalized to
//! `{name, description, url}` and optionally filtered by keyword.

use async_trait::async_trait;
use careerchat_core::error::ToolError;
use careerchat_core::tool::{ToolCall, ToolKind, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A repository as the responder sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
}

/// Source of repository listings.
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ToolError>;
}

/// GitHub REST: `GET /users/{user}/repos`.
pub struct GitHubRepoSource {
    username: String,
    api_url: String,
    client: reqwest::Client,
}

impl GitHubRepoSource {
    pub fn new(username: impl Into<String>, api_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("careerchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            username: username.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    fork: bool,
}

#[async_trait]
impl RepoSource for GitHubRepoSource {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: ToolKind::RepoSearch.name().into(),
            reason,
        };

        let url = format!("{}/users/{}/repos", self.api_url, self.username);
        debug!(url = %url, "Listing repositories");

        let response = self
            .client
            .get(&url)
            .query(&[("per_page", "100"), ("sort", "updated")])
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(failed(format!("code host returned {}", response.status())));
        }

        let repos: Vec<GitHubRepo> = response
            .json()
            .await
            .map_err(|e| failed(format!("unexpected response: {e}")))?;

        Ok(repos
            .into_iter()
            .filter(|r| !r.fork)
            .map(|r| Repository {
                name: r.name,
                description: r.description.unwrap_or_default(),
                url: r.html_url,
            })
            .collect())
    }
}

/// A fixed listing. Used by tests and dry runs.
pub struct StaticRepoSource {
    repos: Vec<Repository>,
}

impl StaticRepoSource {
    pub fn new(repos: Vec<Repository>) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl RepoSource for StaticRepoSource {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ToolError> {
        Ok(self.repos.clone())
    }
}

pub struct RepoSearchTool {
    source: Arc<dyn RepoSource>,
}

impl RepoSearchTool {
    pub fn new(source: Arc<dyn RepoSource>) -> Self {
        Self { source }
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let query = call
            .arguments
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let repos = filter_repositories(self.source.list_repositories().await?, query);

        let output = if repos.is_empty() {
            match query {
                Some(q) => format!("No public repositories match '{q}'."),
                None => "No public repositories found.".to_string(),
            }
        } else {
            repos
                .iter()
                .map(|r| {
                    if r.description.is_empty() {
                        format!("- {} ({})", r.name, r.url)
                    } else {
                        format!("- {}: {} ({})", r.name, r.description, r.url)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let data = serde_json::to_value(&repos).map_err(|e| ToolError::ExecutionFailed {
            tool_name: ToolKind::RepoSearch.name().into(),
            reason: e.to_string(),
        })?;

        Ok(ToolResult::success(call, output, Some(data)))
    }
}

/// Case-insensitive keyword match against name and description.
fn filter_repositories(repos: Vec<Repository>, query: Option<&str>) -> Vec<Repository> {
    let Some(query) = query else {
        return repos;
    };
    let needle = query.to_lowercase();
    repos
        .into_iter()
        .filter(|r| {
            r.name.to_lowercase().contains(&needle) || r.description.to_lowercase().contains(&needle)
        })
        .collect()
}
