use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};

use super::client::GitHubClient;
use super::types::{GitHubComment, GitHubCommit, GitHubPullRequest};
use crate::auth::Token;
use crate::changes::{Change, ChangeStatus, Message, Revision, Source};
use crate::error::Result;

/// Pull requests whose commits and comments are fetched at once.
const DETAIL_CONCURRENCY: usize = 8;

/// Result of gathering pull requests across repositories.
#[derive(Debug, Default)]
pub struct GitHubGathered {
    pub changes: Vec<Change>,
    /// Repositories that returned 404
    pub not_found: Vec<String>,
}

/// Gathers pull requests from a GitHub Enterprise server.
pub struct GitHubProvider {
    client: GitHubClient,
    branches: Vec<String>,
}

impl GitHubProvider {
    pub fn new(
        base_url: &str,
        token: Option<Token>,
        verify_tls: bool,
        branches: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: GitHubClient::new(base_url, token, verify_tls)?,
            branches,
        })
    }

    /// Gathers pull requests updated after `start` for every repository.
    ///
    /// Repositories that cannot be seen are collected in `not_found` and
    /// do not fail the run.
    pub async fn gather(&self, projects: &[String], start: DateTime<Utc>) -> Result<GitHubGathered> {
        let mut gathered = GitHubGathered::default();

        for project in projects {
            match self.gather_project(project, start).await? {
                Some(changes) => {
                    info!("Gathered {} pull requests from {project}", changes.len());
                    gathered.changes.extend(changes);
                }
                None => {
                    if self.client.is_authenticated() {
                        warn!("{project} not found");
                    } else {
                        warn!("{project} not found, private repositories need --github-token");
                    }
                    gathered.not_found.push(project.clone());
                }
            }
        }

        Ok(gathered)
    }

    async fn gather_project(
        &self,
        project: &str,
        start: DateTime<Utc>,
    ) -> Result<Option<Vec<Change>>> {
        let mut pulls = Vec::new();
        let mut next = Some(self.client.pulls_url(project)?);

        'pages: while let Some(url) = next {
            let Some(page) = self.client.fetch_pulls_page(&url).await? else {
                return Ok(None);
            };
            next = page.next;

            for pr in page.items {
                if pr.updated_at < start {
                    debug!(
                        "{project}|{} updated {} is older than {start}, not reading any more",
                        pr.number, pr.updated_at
                    );
                    break 'pages;
                }
                if !self.branches.is_empty() && !self.branches.contains(&pr.base.ref_) {
                    continue;
                }
                pulls.push(pr);
            }
        }

        let changes = stream::iter(pulls)
            .map(|pr| self.fetch_change(project, pr))
            .buffered(DETAIL_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(Some(changes))
    }

    async fn fetch_change(&self, project: &str, pr: GitHubPullRequest) -> Result<Change> {
        let commits: Vec<GitHubCommit> = self.client.fetch_all(&pr.commits_url).await?;
        let comments: Vec<GitHubComment> = self.client.fetch_all(&pr.comments_url).await?;
        debug!(
            "{project}|{}: {} commits, {} comments",
            pr.number,
            commits.len(),
            comments.len()
        );

        Ok(to_change(project, pr, &commits, comments))
    }
}

/// Builds a change with one revision per commit. Each comment lands on the
/// latest revision created at or before it.
fn to_change(
    project: &str,
    pr: GitHubPullRequest,
    commits: &[GitHubCommit],
    comments: Vec<GitHubComment>,
) -> Change {
    let mut dates: Vec<DateTime<Utc>> = commits
        .iter()
        .map(|c| c.date().unwrap_or(pr.created_at))
        .collect();
    dates.sort();
    if dates.is_empty() {
        dates.push(pr.created_at);
    }

    let mut revisions: Vec<Revision> = dates
        .into_iter()
        .zip(1..)
        .map(|(created, number)| Revision {
            number,
            created,
            messages: Vec::new(),
        })
        .collect();

    for comment in comments {
        let idx = revisions
            .iter()
            .rposition(|rev| rev.created <= comment.created_at)
            .unwrap_or(0);
        revisions[idx].messages.push(Message {
            id: comment.id.to_string(),
            date: comment.created_at,
            text: comment.body.unwrap_or_default(),
        });
    }

    for revision in &mut revisions {
        revision.messages.sort_by_key(|m| m.date);
    }

    let status = if pr.merged_at.is_some() {
        ChangeStatus::Merged
    } else if pr.state == "closed" {
        ChangeStatus::Abandoned
    } else {
        ChangeStatus::Open
    };

    Change {
        source: Source::Github,
        id: pr.id.to_string(),
        number: pr.number,
        project: project.to_string(),
        branch: pr.base.ref_,
        owner: pr.user.map(|u| u.login).unwrap_or_default(),
        status,
        created: pr.created_at,
        updated: pr.updated_at,
        merged: pr.merged_at,
        url: pr.html_url,
        revisions,
    }
}
