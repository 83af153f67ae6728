//! Project to team mapping and the report groups derived from it.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::changes::Source;
use crate::error::{Result, ZingStatsError};

/// Group holding every configured project; rendered as `index.html`.
pub const ALL_GROUP: &str = "All";

static NON_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("non-word pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    pub team: String,
}

/// Contents of `projects.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsFile {
    #[serde(default)]
    pub gerrit: Vec<ProjectEntry>,
    #[serde(default)]
    pub github: Vec<ProjectEntry>,
}

impl ProjectsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ZingStatsError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        let projects: Self = serde_json::from_str(&contents).map_err(|e| {
            ZingStatsError::Config(format!("{} is not well-formed json: {e}", path.display()))
        })?;
        projects.check_duplicates()?;

        debug!(
            "{} gerrit and {} github projects in {}",
            projects.gerrit.len(),
            projects.github.len(),
            path.display()
        );
        Ok(projects)
    }

    pub fn gerrit_names(&self) -> Vec<String> {
        names(&self.gerrit)
    }

    pub fn github_names(&self) -> Vec<String> {
        names(&self.github)
    }

    /// A project can only be gathered from one review system.
    pub fn check_duplicates(&self) -> Result<()> {
        match self
            .gerrit
            .iter()
            .find(|g| self.github.iter().any(|h| h.name == g.name))
        {
            Some(dup) => Err(ZingStatsError::DuplicateProject(dup.name.clone())),
            None => Ok(()),
        }
    }

    /// Report groups in navigation order: `All`, `gerrit`, `github`, then
    /// every team sorted by name.
    pub fn groups(&self) -> IndexMap<String, Vec<String>> {
        let mut teams: IndexMap<String, Vec<String>> = IndexMap::new();
        for entry in self.gerrit.iter().chain(&self.github) {
            let members = teams.entry(entry.team.clone()).or_default();
            if !members.contains(&entry.name) {
                members.push(entry.name.clone());
            }
        }

        let mut groups = IndexMap::new();
        groups.insert(ALL_GROUP.to_string(), self.all_names());
        groups.insert(Source::Gerrit.as_str().to_string(), self.gerrit_names());
        groups.insert(Source::Github.as_str().to_string(), self.github_names());

        teams.sort_keys();
        for (team, members) in teams {
            groups.entry(team).or_insert(members);
        }
        groups
    }

    fn all_names(&self) -> Vec<String> {
        let mut all = self.gerrit_names();
        for name in self.github_names() {
            if !all.contains(&name) {
                all.push(name);
            }
        }
        all
    }
}

fn names(entries: &[ProjectEntry]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !names.contains(&entry.name) {
            names.push(entry.name.clone());
        }
    }
    names
}

/// `index.html` for the `All` group, otherwise e.g. `team_a.html`.
pub fn group_file_name(group: &str) -> String {
    if group == ALL_GROUP {
        return "index.html".to_string();
    }
    format!("{}.html", NON_WORD_RE.replace_all(&group.to_lowercase(), "_"))
}

/// Directory name for a report window, e.g. `last_24h` or `last_7d`.
pub fn window_prefix(range_hours: u32) -> String {
    if range_hours <= 24 {
        format!("last_{range_hours}h")
    } else {
        let days = (f64::from(range_hours) / 24.0 * 10.0).round() / 10.0;
        format!("last_{}d", format_decimal(days, 1))
    }
}

/// Human readable window length for report titles, e.g. `7 days`.
pub fn window_label(range_hours: u32) -> String {
    if range_hours <= 24 {
        format!("{range_hours} hours")
    } else {
        format!("{} days", format_decimal(f64::from(range_hours) / 24.0, 5))
    }
}

/// Fixed-point formatting without trailing zeros: `7.0` is `7`, `1.50` is `1.5`.
fn format_decimal(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}
