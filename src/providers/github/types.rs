use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pull request as returned by `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequest {
    /// Unique identifier across the server
    pub id: u64,
    /// Number within the repository
    pub number: u64,
    /// `open` or `closed`
    pub state: String,
    pub user: Option<GitHubUser>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub html_url: String,
    pub commits_url: String,
    pub comments_url: String,
    pub base: GitHubBranchRef,
}

/// Base or head branch of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubBranchRef {
    #[serde(rename = "ref")]
    pub ref_: String,
    pub repo: Option<GitHubRepo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

/// Commit listed on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub sha: String,
    pub commit: GitHubCommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommitDetail {
    pub author: Option<GitHubSignature>,
    pub committer: Option<GitHubSignature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubSignature {
    pub date: DateTime<Utc>,
}

impl GitHubCommit {
    /// Committer date, falling back to the author date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.commit
            .committer
            .as_ref()
            .or(self.commit.author.as_ref())
            .map(|sig| sig.date)
    }
}

/// Issue comment on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubComment {
    pub id: u64,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user: Option<GitHubUser>,
}
