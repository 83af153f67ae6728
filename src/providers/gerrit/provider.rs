use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info, warn};

use super::client::GerritClient;
use crate::auth::Token;
use crate::changes::Change;
use crate::error::Result;

pub const DEFAULT_QUERY_SIZE: usize = 100;

/// Gathers Gerrit changes for a set of projects, newest update first.
pub struct GerritProvider {
    client: GerritClient,
    projects: Vec<String>,
    branches: Vec<String>,
    query_size: usize,
    max_changes: Option<usize>,
}

impl GerritProvider {
    /// # Errors
    ///
    /// Returns an error if the Gerrit URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(
        base_url: &str,
        user: Option<&str>,
        token: Option<Token>,
        verify_tls: bool,
        projects: Vec<String>,
        branches: Vec<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: GerritClient::new(base_url, user, token, verify_tls)?,
            projects,
            branches,
            query_size: DEFAULT_QUERY_SIZE,
            max_changes: None,
        })
    }

    pub fn with_query_size(mut self, query_size: usize) -> Self {
        self.query_size = query_size.max(1);
        self
    }

    pub fn with_max_changes(mut self, max_changes: Option<usize>) -> Self {
        self.max_changes = max_changes;
        self
    }

    /// Gerrit search expression for the configured projects and branches.
    pub fn query(&self) -> String {
        let mut query = String::from("(status:open OR status:closed)");
        if let Some(clause) = any_of("project", &self.projects) {
            query.push_str(&format!(" AND {clause}"));
        }
        if let Some(clause) = any_of("branch", &self.branches) {
            query.push_str(&format!(" AND {clause}"));
        }
        query
    }

    /// Pages through matching changes until Gerrit has no more, the
    /// configured maximum is reached, or changes become older than `start`.
    pub async fn gather(&self, start: DateTime<Utc>) -> Result<Vec<Change>> {
        info!("Gathering changes from {}", self.client.base_url);

        let query = self.query();
        let mut changes: IndexMap<String, Change> = IndexMap::new();
        let mut offset = 0;

        'pages: loop {
            let page = self
                .client
                .query_changes(&query, offset, self.query_size)
                .await?;
            let more_changes = page.last().is_some_and(|c| c.more_changes);
            debug!(
                "{} changes (start: {offset}, count: {})",
                page.len(),
                self.query_size
            );

            for info in page {
                let change = info.into_change(&self.client.base_url)?;

                if changes.contains_key(&change.id) {
                    warn!(
                        "Change id {} already stored, not storing again",
                        change.id
                    );
                    continue;
                }

                if let Some(max) = self.max_changes {
                    if changes.len() >= max {
                        warn!("Max changes set to {max}, not storing more changes");
                        break 'pages;
                    }
                }

                if change.updated < start {
                    debug!(
                        "{} updated {} is older than {start}, not reading any more",
                        change.log_key(),
                        change.updated
                    );
                    break 'pages;
                }

                changes.insert(change.id.clone(), change);
            }

            if !more_changes {
                break;
            }
            offset += self.query_size;
        }

        info!("Gathered {} changes from Gerrit", changes.len());
        Ok(changes.into_values().collect())
    }
}

fn any_of(field: &str, values: &[String]) -> Option<String> {
    match values {
        [] => None,
        [single] => Some(format!("{field}:{single}")),
        many => Some(format!(
            "({})",
            many.iter()
                .map(|v| format!("{field}:{v}"))
                .collect::<Vec<_>>()
                .join(" OR ")
        )),
    }
}
