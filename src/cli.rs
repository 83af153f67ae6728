use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, ReportFormat};
use crate::metrics::{Dataset, Resolution, Window, MAX_RANGE_HOURS};
use crate::output::{print_summary, PhaseProgress, RunSummary};
use crate::projects::{window_label, ProjectsFile, ALL_GROUP};
use crate::providers::{GerritProvider, GitHubProvider};
use crate::report::{self, ReportSettings};
use crate::snapshot::Snapshot;

const DEFAULT_GERRIT_URL: &str = "https://gerrit.example.net";
const DEFAULT_GITHUB_URL: &str = "https://github.example.net";

#[derive(Parser, Debug)]
#[command(name = "zing-stats")]
#[command(
    author,
    version,
    about = "Summary statistics and HTML reports for Gerrit changes, GitHub pull requests and their CI runs",
    long_about = None
)]
pub struct Cli {
    /// URL to the Gerrit server
    #[arg(long, env = "GERRIT_URL")]
    gerrit_url: Option<String>,

    /// Gerrit username
    #[arg(long, env = "GERRIT_USER")]
    gerrit_user: Option<String>,

    /// Gerrit HTTP password or token
    #[arg(long, env = "GERRIT_TOKEN", hide_env_values = true)]
    gerrit_token: Option<String>,

    /// URL to the GitHub Enterprise server
    #[arg(long, env = "GITHUB_URL")]
    github_url: Option<String>,

    /// GitHub Enterprise token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// JSON file listing the projects to analyse and their teams
    #[arg(long, env = "ZING_PROJECTS")]
    projects: Option<PathBuf>,

    /// Restrict reporting to a branch (repeatable, default all branches)
    #[arg(short = 'b', long = "branch")]
    branches: Vec<String>,

    /// Changes per Gerrit request [default: 100]
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
    gerrit_query_size: Option<u64>,

    /// Total maximum of Gerrit changes to gather
    #[arg(short = 'm', long)]
    gerrit_max_changes: Option<usize>,

    /// Hours covered by the report, ending now [default: 168]
    #[arg(
        short = 'r',
        long,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_RANGE_HOURS))
    )]
    report_range_hours: Option<u32>,

    /// Directory to write reports to [default: /var/www/html/zing/stats/]
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Report format [default: html]
    #[arg(short = 'f', long, value_enum)]
    format: Option<ReportFormat>,

    /// Title of the HTML report
    #[arg(long)]
    report_title: Option<String>,

    /// Link to the defect tracker shown in the report footer
    #[arg(long)]
    report_issue_link: Option<String>,

    /// Contact e-mail shown in the report footer
    #[arg(long)]
    contact_email: Option<String>,

    /// CI system capacity in total CI hours per day [default: 504]
    #[arg(long)]
    system_capacity_daily_ci_hours: Option<u32>,

    /// Recommended maximum duration of a CI job in minutes [default: 15]
    #[arg(long)]
    ci_job_recommended_max_minutes: Option<u32>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Analyse changes previously written with --dump-changes instead of querying
    #[arg(long)]
    changes_json: Option<PathBuf>,

    /// Write the gathered changes to this file
    #[arg(long)]
    dump_changes: Option<PathBuf>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show DEBUG level log output on stderr
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Show only ERROR log messages on stderr
    #[arg(short, long)]
    quiet: bool,

    /// File to append log messages to
    #[arg(short, long)]
    logfile: Option<PathBuf>,

    /// Show DEBUG level log output in the logfile
    #[arg(short, long)]
    trace: bool,
}

/// Flags, environment, config file and defaults merged into one set of
/// values for the run.
#[derive(Debug, Clone)]
struct Settings {
    projects: PathBuf,
    branches: Vec<String>,
    gerrit_url: String,
    gerrit_user: Option<String>,
    gerrit_token: Option<Token>,
    gerrit_query_size: usize,
    gerrit_max_changes: Option<usize>,
    github_url: String,
    github_token: Option<Token>,
    verify_tls: bool,
    output_dir: PathBuf,
    format: ReportFormat,
    report: ReportSettings,
    changes_json: Option<PathBuf>,
    dump_changes: Option<PathBuf>,
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn logfile(&self) -> Option<&std::path::Path> {
        self.logfile.as_deref()
    }

    pub fn trace(&self) -> bool {
        self.trace
    }

    fn resolve(&self, config: Config) -> Result<Settings> {
        let Config {
            projects,
            branches,
            insecure,
            gerrit,
            github,
            report,
        } = config;

        let projects = self
            .projects
            .clone()
            .or(projects)
            .context("No projects file given, use --projects or ZING_PROJECTS")?;

        let mut settings = report.settings();
        if let Some(title) = &self.report_title {
            settings.title.clone_from(title);
        }
        if let Some(link) = &self.report_issue_link {
            settings.issue_link.clone_from(link);
        }
        if let Some(email) = &self.contact_email {
            settings.contact_email.clone_from(email);
        }
        if let Some(hours) = self.report_range_hours {
            settings.range_hours = hours;
        }
        if !(1..=MAX_RANGE_HOURS).contains(&settings.range_hours) {
            bail!(
                "Report range of {} hours is outside 1..={MAX_RANGE_HOURS}",
                settings.range_hours
            );
        }
        if let Some(hours) = self.system_capacity_daily_ci_hours {
            settings.daily_ci_hours = hours;
        }
        if let Some(minutes) = self.ci_job_recommended_max_minutes {
            settings.job_max_minutes = minutes;
        }

        let query_size = match self.gerrit_query_size {
            Some(size) => usize::try_from(size).context("--gerrit-query-size is too large")?,
            None => gerrit.query_size,
        };

        Ok(Settings {
            projects,
            branches: if self.branches.is_empty() {
                branches
            } else {
                self.branches.clone()
            },
            gerrit_url: self
                .gerrit_url
                .clone()
                .or(gerrit.url)
                .unwrap_or_else(|| DEFAULT_GERRIT_URL.to_string()),
            gerrit_user: self.gerrit_user.clone().or(gerrit.user),
            gerrit_token: self.gerrit_token.clone().or(gerrit.token).map(Token::from),
            gerrit_query_size: query_size,
            gerrit_max_changes: self.gerrit_max_changes.or(gerrit.max_changes),
            github_url: self
                .github_url
                .clone()
                .or(github.url)
                .unwrap_or_else(|| DEFAULT_GITHUB_URL.to_string()),
            github_token: self.github_token.clone().or(github.token).map(Token::from),
            verify_tls: !(self.insecure || insecure),
            output_dir: self.output_dir.clone().unwrap_or(report.output_dir),
            format: self.format.unwrap_or(report.format),
            report: settings,
            changes_json: self.changes_json.clone(),
            dump_changes: self.dump_changes.clone(),
        })
    }

    async fn gather(
        settings: &Settings,
        projects: &ProjectsFile,
        start: DateTime<Utc>,
    ) -> Result<Snapshot> {
        let mut changes = Vec::new();
        let mut not_found = Vec::new();

        let gerrit_projects = projects.gerrit_names();
        if !gerrit_projects.is_empty() {
            info!(
                "Gathering changes for {} projects from {}",
                gerrit_projects.len(),
                settings.gerrit_url
            );
            let provider = GerritProvider::new(
                &settings.gerrit_url,
                settings.gerrit_user.as_deref(),
                settings.gerrit_token.clone(),
                settings.verify_tls,
                gerrit_projects,
                settings.branches.clone(),
            )?
            .with_query_size(settings.gerrit_query_size)
            .with_max_changes(settings.gerrit_max_changes);

            changes.extend(provider.gather(start).await?);
        }

        let github_projects = projects.github_names();
        if !github_projects.is_empty() {
            info!(
                "Gathering pull requests for {} projects from {}",
                github_projects.len(),
                settings.github_url
            );
            let provider = GitHubProvider::new(
                &settings.github_url,
                settings.github_token.clone(),
                settings.verify_tls,
                settings.branches.clone(),
            )?;

            let gathered = provider.gather(&github_projects, start).await?;
            changes.extend(gathered.changes);
            not_found = gathered.not_found;
        }

        Ok(Snapshot::new(changes, not_found))
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let settings = self.resolve(config)?;
        debug!("Resolved settings: {settings:?}");

        let projects = ProjectsFile::load(&settings.projects)?;
        let range_hours = settings.report.range_hours;

        let progress = PhaseProgress::start_phase_1(!self.quiet);
        let (snapshot, window) = match &settings.changes_json {
            Some(path) => {
                let snapshot = Snapshot::load(path)?;
                let window = Window::ending_at(snapshot.gathered_at, range_hours);
                (snapshot, window)
            }
            None => {
                let window = Window::ending_at(Utc::now(), range_hours);
                (Self::gather(&settings, &projects, window.start).await?, window)
            }
        };
        info!(
            "Reporting on the last {} ({} to {})",
            window_label(range_hours),
            window.start,
            window.finish
        );

        if let Some(path) = &settings.dump_changes {
            snapshot.save(path)?;
        }

        let progress = progress.finish_phase_1_start_phase_2(snapshot.changes.len());
        let Snapshot {
            changes, not_found, ..
        } = snapshot;
        let dataset = Dataset::build(changes, window, Resolution::for_range(range_hours))?;
        let groups = projects.groups();
        let configured = groups.get(ALL_GROUP).cloned().unwrap_or_default();
        for project in dataset.projects().filter(|p| !configured.contains(&p.name)) {
            warn!(
                "{} has {} changes but is not listed in {}, leaving it out of the reports",
                project.name,
                project.changes.len(),
                settings.projects.display()
            );
        }
        let all = dataset.group(ALL_GROUP, &configured);

        let progress = progress.finish_phase_2_start_phase_3();
        let written = report::write_reports(
            &dataset,
            &groups,
            &not_found,
            &settings.report,
            &settings.output_dir,
            settings.format,
        )?;
        progress.finish_phase_3();

        if !self.quiet {
            print_summary(&RunSummary {
                window: &dataset.window,
                change_count: dataset.change_count,
                all: all.as_ref(),
                not_found: &not_found,
                settings: &settings.report,
                written: &written,
            });
        }

        Ok(())
    }
}
