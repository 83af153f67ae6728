use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZingStatsError};
use crate::parser::{self, CiJob, RunStatus};

/// Gerrit reports nanosecond precision, always in UTC.
pub const GERRIT_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Review system a change was gathered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gerrit,
    Github,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gerrit => "gerrit",
            Self::Github => "github",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Open,
    Merged,
    Abandoned,
}

impl ChangeStatus {
    pub fn from_gerrit(status: &str) -> Self {
        match status {
            "MERGED" => Self::Merged,
            "ABANDONED" => Self::Abandoned,
            _ => Self::Open,
        }
    }
}

/// A review comment left on a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub date: DateTime<Utc>,
    pub text: String,
}

/// One patch set of a Gerrit change, or one commit of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// 1-based patch set number
    pub number: u32,
    pub created: DateTime<Utc>,
    pub messages: Vec<Message>,
}

/// A CI run reconstructed from a CI comment on a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiRun {
    pub revision: u32,
    /// When the CI system reported back
    pub at: DateTime<Utc>,
    pub message_id: String,
    pub verified: Option<String>,
    pub status_text: String,
    pub status: RunStatus,
    pub jobs: Vec<CiJob>,
}

/// A Gerrit change or GitHub pull request with its revisions and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub source: Source,
    /// Gerrit long id (`project~branch~Change-Id`) or GitHub PR id
    pub id: String,
    pub number: u64,
    pub project: String,
    pub branch: String,
    pub owner: String,
    pub status: ChangeStatus,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub merged: Option<DateTime<Utc>>,
    /// Web page for humans
    pub url: String,
    /// Ordered by revision number
    pub revisions: Vec<Revision>,
}

impl Change {
    pub fn rev_count(&self) -> usize {
        self.revisions.len()
    }

    /// Merge time, only for changes that actually merged.
    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            ChangeStatus::Merged => self.merged,
            _ => None,
        }
    }

    pub fn messages(&self) -> impl Iterator<Item = (&Revision, &Message)> {
        self.revisions
            .iter()
            .flat_map(|revision| revision.messages.iter().map(move |m| (revision, m)))
    }

    /// Parses every message as a CI comment for this change's source.
    ///
    /// Messages with malformed job lines are logged and left out.
    pub fn ci_runs(&self) -> Vec<CiRun> {
        self.messages()
            .filter_map(|(revision, message)| {
                let parsed = match self.source {
                    Source::Gerrit => parser::parse_gerrit_ci_comment(&message.text),
                    Source::Github => parser::parse_pr_ci_comment(&message.text),
                };

                match parsed {
                    Ok(comment) => comment.map(|comment| CiRun {
                        revision: comment.patch_set.unwrap_or(revision.number),
                        at: message.date,
                        message_id: message.id.clone(),
                        verified: comment.verified,
                        status_text: comment.status_text,
                        status: comment.status,
                        jobs: comment.jobs,
                    }),
                    Err(e) => {
                        warn!(
                            "Skipping CI comment {} on {} {}: {e}",
                            message.id, self.project, self.number
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Short identifier used in log lines, e.g. `openstack/cinder|604103`.
    pub fn log_key(&self) -> String {
        format!("{}|{}", self.project, self.number)
    }
}

pub fn parse_gerrit_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, GERRIT_TIMESTAMP)
        .map(|dt| dt.and_utc())
        .map_err(|e| ZingStatsError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_gerrit_timestamp() {
        let ts = parse_gerrit_timestamp("2017-04-20 17:15:44.000000000").unwrap();
        assert_eq!(ts, at(2017, 4, 20, 17, 15) + chrono::Duration::seconds(44));
    }

    #[test]
    fn test_parse_gerrit_timestamp_rejects_garbage() {
        assert!(matches!(
            parse_gerrit_timestamp("yesterday"),
            Err(ZingStatsError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_ci_runs_are_derived_from_messages() {
        let created = at(2018, 9, 20, 14, 0);
        let change = change(
            "openstack/cinder",
            604_103,
            created,
            None,
            vec![
                message("1", created, "Uploaded patch set 1."),
                message(
                    "2",
                    at(2018, 9, 20, 15, 0),
                    "Patch Set 1: Verified+1\n\nBuild succeeded\n\n- https://ci.example.net/jenkins/job/unit/6/ : SUCCESS in 7s",
                ),
                message(
                    "3",
                    at(2018, 9, 20, 16, 0),
                    "Patch Set 1: Verified-1\n\nBuild failed\n\n- https://ci.example.net/jenkins/job/unit/7/ : FAILURE in 7s trailing",
                ),
            ],
        );

        let runs = change.ci_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].revision, 1);
        assert_eq!(runs[0].message_id, "2");
        assert_eq!(runs[0].status, RunStatus::Success);
        assert_eq!(runs[0].at, at(2018, 9, 20, 15, 0));
    }

    #[test]
    fn test_merged_at_requires_merged_status() {
        let mut change = change("foo/bar", 1, at(2018, 1, 1, 0, 0), Some(at(2018, 1, 2, 0, 0)), vec![]);
        assert!(change.merged_at().is_some());

        change.status = ChangeStatus::Abandoned;
        assert!(change.merged_at().is_none());
    }
}
