use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::providers::DEFAULT_QUERY_SIZE;
use crate::report::ReportSettings;

const CONFIG_CANDIDATES: [&str; 4] = [
    "zing-stats.toml",
    "zing-stats.json",
    "zing-stats.yaml",
    "zing-stats.yml",
];

/// Configuration file structure for zing-stats.
///
/// Holds the settings of a scheduled run so the command line only needs the
/// secrets. Every value can still be overridden by a flag or environment
/// variable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Project to team mapping (`projects.json`)
    pub projects: Option<PathBuf>,

    /// Only gather changes targeting these branches
    #[serde(default)]
    pub branches: Vec<String>,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub gerrit: GerritConfig,

    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GerritConfig {
    /// Gerrit server URL
    pub url: Option<String>,

    /// Gerrit user for authenticated queries
    pub user: Option<String>,

    /// Gerrit HTTP password
    pub token: Option<String>,

    /// Changes requested per query page
    #[serde(default = "default_query_size")]
    pub query_size: usize,

    /// Stop gathering after this many changes
    pub max_changes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub Enterprise server URL
    pub url: Option<String>,

    /// GitHub personal access token
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_issue_link")]
    pub issue_link: String,

    #[serde(default = "default_contact_email")]
    pub contact_email: String,

    /// Hours covered by the report, ending now
    #[serde(default = "default_range_hours")]
    pub range_hours: u32,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub format: ReportFormat,

    /// CI system capacity in hours per day
    #[serde(default = "default_daily_ci_hours")]
    pub daily_ci_hours: u32,

    /// Recommended maximum duration of a CI job
    #[serde(default = "default_job_max_minutes")]
    pub job_max_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Html,
    Json,
}

impl Default for GerritConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            token: None,
            query_size: default_query_size(),
            max_changes: None,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            issue_link: default_issue_link(),
            contact_email: default_contact_email(),
            range_hours: default_range_hours(),
            output_dir: default_output_dir(),
            format: ReportFormat::default(),
            daily_ci_hours: default_daily_ci_hours(),
            job_max_minutes: default_job_max_minutes(),
        }
    }
}

impl ReportConfig {
    pub fn settings(&self) -> ReportSettings {
        ReportSettings {
            title: self.title.clone(),
            issue_link: self.issue_link.clone(),
            contact_email: self.contact_email.clone(),
            range_hours: self.range_hours,
            daily_ci_hours: self.daily_ci_hours,
            job_max_minutes: self.job_max_minutes,
        }
    }
}

fn default_query_size() -> usize {
    DEFAULT_QUERY_SIZE
}

fn default_title() -> String {
    ReportSettings::default().title
}

fn default_issue_link() -> String {
    ReportSettings::default().issue_link
}

fn default_contact_email() -> String {
    ReportSettings::default().contact_email
}

fn default_range_hours() -> u32 {
    ReportSettings::default().range_hours
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/var/www/html/zing/stats/")
}

fn default_daily_ci_hours() -> u32 {
    ReportSettings::default().daily_ci_hours
}

fn default_job_max_minutes() -> u32 {
    ReportSettings::default().job_max_minutes
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./zing-stats.toml, .json, .yaml or .yml
    /// 3. zing-stats/config.toml in the user configuration directory
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_config = dirs::config_dir().map(|dir| dir.join("zing-stats").join("config.toml"));
        let found = CONFIG_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .chain(user_config)
            .find(|candidate| candidate.exists());

        match found {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
