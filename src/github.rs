//! GitHub API client for the repository sync.

use fleetdeck_core::models::SyncedRepo;
use serde::Deserialize;

use crate::api::ApiError;

const USER_REPOS_URL: &str = "https://api.github.com/user/repos?per_page=100";

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RemoteRepo {
    id: i64,
    name: String,
    description: Option<String>,
    full_name: String,
}

impl GithubClient {
    pub fn new(token: String) -> Self {
        Self { http: reqwest::Client::new(), token }
    }

    /// Repositories visible to the configured token, first page of 100.
    pub async fn list_repos(&self) -> Result<Vec<SyncedRepo>, ApiError> {
        let resp = self
            .http
            .get(USER_REPOS_URL)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "fleetdeck")
            .send()
            .await
            .map_err(|err| ApiError::internal(format!("GitHub API request failed: {err}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::internal(format!("GitHub API returned {status}: {body}")));
        }

        let repos: Vec<RemoteRepo> = resp
            .json()
            .await
            .map_err(|err| ApiError::internal(format!("failed to parse GitHub response: {err}")))?;

        Ok(repos
            .into_iter()
            .map(|repo| SyncedRepo {
                remote_id: repo.id,
                name: repo.name,
                description: repo.description,
                full_name: repo.full_name,
            })
            .collect())
    }
}
