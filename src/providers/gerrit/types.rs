use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

use crate::changes::{parse_gerrit_timestamp, Change, ChangeStatus, Message, Revision, Source};
use crate::error::Result;

/// `ChangeInfo` entity from the Gerrit REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct GerritChangeInfo {
    /// Long id, e.g. `openstack%2Fcinder~stable%2Fpike~Id5dd71a7...`
    pub id: String,
    pub project: String,
    pub branch: String,
    pub change_id: String,
    pub status: String,
    pub created: String,
    pub updated: String,
    pub submitted: Option<String>,
    #[serde(rename = "_number")]
    pub number: u64,
    pub owner: GerritAccount,
    #[serde(default)]
    pub revisions: HashMap<String, GerritRevisionInfo>,
    #[serde(default)]
    pub messages: Vec<GerritMessageInfo>,
    /// Only set on the last change of a page
    #[serde(rename = "_more_changes", default)]
    pub more_changes: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GerritAccount {
    #[serde(rename = "_account_id")]
    pub account_id: u64,
    pub name: Option<String>,
    pub username: Option<String>,
}

impl GerritAccount {
    fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| self.account_id.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GerritRevisionInfo {
    #[serde(rename = "_number")]
    pub number: u32,
    pub created: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GerritMessageInfo {
    pub id: String,
    pub date: String,
    pub message: String,
    #[serde(rename = "_revision_number")]
    pub revision_number: Option<u32>,
}

impl GerritChangeInfo {
    /// Converts to the source-neutral model. `review_base` is the public
    /// Gerrit URL used to build links to the change.
    pub fn into_change(self, review_base: &str) -> Result<Change> {
        let mut revisions = self
            .revisions
            .values()
            .map(|rev| {
                Ok(Revision {
                    number: rev.number,
                    created: parse_gerrit_timestamp(&rev.created)?,
                    messages: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        revisions.sort_by_key(|rev| rev.number);

        for message in self.messages {
            let date = parse_gerrit_timestamp(&message.date)?;
            let target = message
                .revision_number
                .and_then(|num| revisions.iter().position(|rev| rev.number == num))
                .or_else(|| revisions.len().checked_sub(1));

            if let Some(idx) = target {
                revisions[idx].messages.push(Message {
                    id: message.id,
                    date,
                    text: message.message,
                });
            }
        }

        for revision in &mut revisions {
            revision.messages.sort_by_key(|m| m.date);
        }

        let status = ChangeStatus::from_gerrit(&self.status);
        let updated = parse_gerrit_timestamp(&self.updated)?;
        let mut merged = self
            .submitted
            .as_deref()
            .map(parse_gerrit_timestamp)
            .transpose()?;
        // Gerrit drops `submitted` on changes of renamed projects
        if status == ChangeStatus::Merged && merged.is_none() {
            warn!(
                "{}|{}: merged without a submitted time, using updated {updated}",
                self.project, self.number
            );
            merged = Some(updated);
        }

        Ok(Change {
            source: Source::Gerrit,
            number: self.number,
            project: self.project,
            branch: self.branch,
            owner: self.owner.display_name(),
            status,
            created: parse_gerrit_timestamp(&self.created)?,
            updated,
            merged,
            url: format!("{}/{}", review_base.trim_end_matches('/'), self.number),
            id: self.id,
            revisions,
        })
    }
}
