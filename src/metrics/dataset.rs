use indexmap::IndexMap;
use log::debug;

use super::collect;
use super::series::{resample, Bucket, Observation, Resolution, Window};
use super::summary::{job_stats, JobStats, ProjectSummary};
use crate::changes::{Change, CiRun, Source};
use crate::error::{Result, ZingStatsError};

/// Changes of one project with everything derived from them.
#[derive(Debug, Clone)]
pub struct ProjectData {
    pub name: String,
    pub source: Source,
    pub changes: Vec<Change>,
    /// CI runs parsed from the comments of `changes`
    pub runs: Vec<CiRun>,
    pub observations: Vec<Observation>,
    pub summary: ProjectSummary,
}

/// Aggregated view of a report group.
#[derive(Debug, Clone)]
pub struct GroupStats<'a> {
    pub name: String,
    /// Group members that have data, in configuration order
    pub projects: Vec<&'a ProjectData>,
    pub buckets: Vec<Bucket>,
    pub total: ProjectSummary,
    pub jobs: Vec<JobStats>,
}

/// All gathered changes split per project, ready for reporting.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub window: Window,
    pub resolution: Resolution,
    /// Changes gathered, including those with no activity in the window
    pub change_count: usize,
    projects: IndexMap<String, ProjectData>,
}

impl Dataset {
    /// # Errors
    ///
    /// Returns `DuplicateProject` when the same project name comes from
    /// both Gerrit and GitHub.
    pub fn build(changes: Vec<Change>, window: Window, resolution: Resolution) -> Result<Self> {
        let change_count = changes.len();
        let mut by_project: IndexMap<String, (Source, Vec<Change>)> = IndexMap::new();

        for change in changes {
            let (source, project_changes) = by_project
                .entry(change.project.clone())
                .or_insert_with(|| (change.source, Vec::new()));
            if *source != change.source {
                return Err(ZingStatsError::DuplicateProject(change.project));
            }
            project_changes.push(change);
        }
        by_project.sort_keys();

        let projects = by_project
            .into_iter()
            .map(|(name, (source, changes))| {
                let mut runs = Vec::new();
                let mut observations = Vec::new();
                for change in &changes {
                    let change_runs = change.ci_runs();
                    observations.extend(collect::observations(change, &change_runs, window.start));
                    runs.extend(change_runs);
                }
                let summary =
                    ProjectSummary::from_observations(&name, Some(source), &observations, &window);
                debug!(
                    "{name}: {} changes, {} CI runs, {} observations",
                    changes.len(),
                    runs.len(),
                    observations.len()
                );
                if !summary.has_activity() {
                    debug!("{name}: no activity between {} and {}", window.start, window.finish);
                }

                let data = ProjectData {
                    name: name.clone(),
                    source,
                    changes,
                    runs,
                    observations,
                    summary,
                };
                (name, data)
            })
            .collect();

        Ok(Self {
            window,
            resolution,
            change_count,
            projects,
        })
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectData> {
        self.projects.values()
    }

    /// Statistics for the members of a group. `None` when none of them has
    /// any gathered changes.
    pub fn group(&self, name: &str, members: &[String]) -> Option<GroupStats<'_>> {
        let projects: Vec<&ProjectData> = members
            .iter()
            .filter_map(|member| self.projects.get(member))
            .collect();
        if projects.is_empty() {
            return None;
        }

        let buckets = resample(
            projects.iter().flat_map(|p| &p.observations),
            &self.window,
            self.resolution,
        );
        let total = ProjectSummary::total(name, projects.iter().map(|p| &p.summary));
        let jobs = job_stats(projects.iter().flat_map(|p| &p.runs), &self.window);

        Some(GroupStats {
            name: name.to_string(),
            projects,
            buckets,
            total,
            jobs,
        })
    }

    /// Hourly series across every project.
    pub fn hourly(&self) -> Vec<Bucket> {
        resample(
            self.projects.values().flat_map(|p| &p.observations),
            &self.window,
            Resolution::Hour,
        )
    }
}
