use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::changes::Change;
use crate::error::Result;

/// Gathered changes saved to disk, so reports can be re-rendered without
/// querying the review servers again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub gathered_at: DateTime<Utc>,
    pub changes: Vec<Change>,
    /// GitHub repositories that returned 404
    #[serde(default)]
    pub not_found: Vec<String>,
}

impl Snapshot {
    pub fn new(changes: Vec<Change>, not_found: Vec<String>) -> Self {
        Self {
            gathered_at: Utc::now(),
            changes,
            not_found,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Wrote {} changes to {}", self.changes.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(
            "Loaded {} changes gathered at {} from {}",
            snapshot.changes.len(),
            snapshot.gathered_at,
            path.display()
        );
        Ok(snapshot)
    }
}
