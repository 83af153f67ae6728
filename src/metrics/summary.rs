use std::collections::BTreeMap;

use serde::Serialize;

use super::series::{Metric, Observation, Window};
use crate::changes::{CiRun, Source};
use crate::parser::JobResult;

/// Totals for one project (or a whole group) over the report window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub source: Option<Source>,
    pub created: u64,
    pub updated: u64,
    pub merged: u64,
    pub ci_success: u64,
    pub ci_failure: u64,
    pub ci_total_time_sec: u64,
    pub ci_longest_time_sec: u64,
    pub revisions_total: u64,
    pub lifespan_total_sec: u64,
    pub lifespan_min_sec: Option<u64>,
    pub lifespan_max_sec: Option<u64>,
    pub recheck: u64,
    pub reverify: u64,
    pub promotion_success: u64,
    pub promotion_failure: u64,
}

impl ProjectSummary {
    pub fn from_observations<'a>(
        project: &str,
        source: Option<Source>,
        observations: impl IntoIterator<Item = &'a Observation>,
        window: &Window,
    ) -> Self {
        let mut summary = Self {
            project: project.to_string(),
            source,
            ..Self::default()
        };

        for obs in observations.into_iter().filter(|o| window.contains(o.at)) {
            let value = obs.value.max(0.0) as u64;
            match obs.metric {
                Metric::Created => summary.created += value,
                Metric::Updated => summary.updated += value,
                Metric::Merged => summary.merged += value,
                Metric::Revisions => summary.revisions_total += value,
                Metric::LifespanSec => {
                    summary.lifespan_total_sec += value;
                    summary.lifespan_min_sec = min_option(summary.lifespan_min_sec, Some(value));
                    summary.lifespan_max_sec = summary.lifespan_max_sec.max(Some(value));
                }
                Metric::Recheck => summary.recheck += value,
                Metric::Reverify => summary.reverify += value,
                Metric::CiTotalTimeSec => summary.ci_total_time_sec += value,
                Metric::CiLongestTimeSec => {
                    summary.ci_longest_time_sec = summary.ci_longest_time_sec.max(value);
                }
                Metric::CiSuccess => summary.ci_success += value,
                Metric::CiFailure => summary.ci_failure += value,
                Metric::PromotionSuccess => summary.promotion_success += value,
                Metric::PromotionFailure => summary.promotion_failure += value,
            }
        }

        summary
    }

    /// Combines per-project summaries into a group total.
    pub fn total<'a>(name: &str, summaries: impl IntoIterator<Item = &'a ProjectSummary>) -> Self {
        summaries.into_iter().fold(
            Self {
                project: name.to_string(),
                ..Self::default()
            },
            |mut acc, s| {
                acc.created += s.created;
                acc.updated += s.updated;
                acc.merged += s.merged;
                acc.ci_success += s.ci_success;
                acc.ci_failure += s.ci_failure;
                acc.ci_total_time_sec += s.ci_total_time_sec;
                acc.ci_longest_time_sec = acc.ci_longest_time_sec.max(s.ci_longest_time_sec);
                acc.revisions_total += s.revisions_total;
                acc.lifespan_total_sec += s.lifespan_total_sec;
                acc.lifespan_min_sec = min_option(acc.lifespan_min_sec, s.lifespan_min_sec);
                acc.lifespan_max_sec = acc.lifespan_max_sec.max(s.lifespan_max_sec);
                acc.recheck += s.recheck;
                acc.reverify += s.reverify;
                acc.promotion_success += s.promotion_success;
                acc.promotion_failure += s.promotion_failure;
                acc
            },
        )
    }

    pub fn ci_runs(&self) -> u64 {
        self.ci_success + self.ci_failure
    }

    /// Percentage of CI runs that failed, `None` without runs.
    pub fn failure_rate(&self) -> Option<f64> {
        rate(self.ci_failure, self.ci_runs())
    }

    pub fn mean_revisions(&self) -> Option<f64> {
        (self.merged > 0).then(|| self.revisions_total as f64 / self.merged as f64)
    }

    pub fn lifespan_avg_sec(&self) -> Option<f64> {
        (self.merged > 0).then(|| self.lifespan_total_sec as f64 / self.merged as f64)
    }

    pub fn has_activity(&self) -> bool {
        self.created + self.updated + self.merged + self.ci_runs() > 0
    }
}

fn min_option(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn rate(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

/// Results of one named CI job across all runs in a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub name: String,
    pub runs: u64,
    pub passes: u64,
    pub failures: u64,
    pub other: u64,
    /// Reported as non-voting at least once
    pub non_voting: bool,
    pub min_duration_sec: Option<u64>,
    pub max_duration_sec: Option<u64>,
    total_duration_sec: u64,
    timed_runs: u64,
}

impl JobStats {
    pub fn failure_rate(&self) -> Option<f64> {
        rate(self.failures, self.passes + self.failures)
    }

    pub fn avg_duration_sec(&self) -> Option<f64> {
        (self.timed_runs > 0).then(|| self.total_duration_sec as f64 / self.timed_runs as f64)
    }
}

/// Per-job statistics for CI runs inside the window, sorted by job name.
pub fn job_stats<'a>(runs: impl IntoIterator<Item = &'a CiRun>, window: &Window) -> Vec<JobStats> {
    let mut jobs: BTreeMap<String, JobStats> = BTreeMap::new();

    for run in runs.into_iter().filter(|r| window.contains(r.at)) {
        for job in &run.jobs {
            let stats = jobs.entry(job.name.clone()).or_insert_with(|| JobStats {
                name: job.name.clone(),
                ..JobStats::default()
            });

            stats.runs += 1;
            match job.result {
                JobResult::Pass => stats.passes += 1,
                JobResult::Fail => stats.failures += 1,
                JobResult::Other(_) => stats.other += 1,
            }
            stats.non_voting |= job.non_voting;

            if let Some(secs) = job.duration_secs {
                stats.total_duration_sec += secs;
                stats.timed_runs += 1;
                stats.min_duration_sec = min_option(stats.min_duration_sec, Some(secs));
                stats.max_duration_sec = stats.max_duration_sec.max(Some(secs));
            }
        }
    }

    jobs.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::fixtures::{at, change, message};
    use crate::changes::Change;

    fn window() -> Window {
        Window::ending_at(at(2018, 9, 25, 0, 0), 168)
    }

    #[test]
    fn test_summary_from_observations() {
        let observations = vec![
            Observation::new(at(2018, 9, 20, 10, 0), Metric::Created, 1.0),
            Observation::new(at(2018, 9, 21, 10, 0), Metric::Merged, 1.0),
            Observation::new(at(2018, 9, 21, 10, 0), Metric::Revisions, 3.0),
            Observation::new(at(2018, 9, 21, 10, 0), Metric::LifespanSec, 600.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::Merged, 1.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::Revisions, 1.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::LifespanSec, 200.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::CiSuccess, 1.0),
            Observation::new(at(2018, 9, 22, 11, 0), Metric::CiFailure, 1.0),
            Observation::new(at(2018, 9, 22, 11, 0), Metric::CiFailure, 1.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::CiLongestTimeSec, 90.0),
            Observation::new(at(2018, 9, 22, 10, 0), Metric::CiLongestTimeSec, 30.0),
            // before the window
            Observation::new(at(2018, 9, 1, 10, 0), Metric::Created, 1.0),
        ];

        let summary = ProjectSummary::from_observations(
            "foo/bar",
            Some(Source::Gerrit),
            &observations,
            &window(),
        );

        assert_eq!(summary.created, 1);
        assert_eq!(summary.merged, 2);
        assert_eq!(summary.mean_revisions(), Some(2.0));
        assert_eq!(summary.lifespan_min_sec, Some(200));
        assert_eq!(summary.lifespan_max_sec, Some(600));
        assert_eq!(summary.lifespan_avg_sec(), Some(400.0));
        assert_eq!(summary.ci_runs(), 3);
        assert!((summary.failure_rate().unwrap() - 66.666).abs() < 0.01);
        assert_eq!(summary.ci_longest_time_sec, 90);
        assert!(summary.has_activity());
    }

    #[test]
    fn test_empty_summary() {
        let summary = ProjectSummary::from_observations("foo/bar", None, &Vec::new(), &window());
        assert_eq!(summary.failure_rate(), None);
        assert_eq!(summary.mean_revisions(), None);
        assert!(!summary.has_activity());
    }

    #[test]
    fn test_total() {
        let a = ProjectSummary {
            project: "a".to_string(),
            merged: 1,
            lifespan_total_sec: 100,
            lifespan_min_sec: Some(100),
            lifespan_max_sec: Some(100),
            ci_longest_time_sec: 50,
            ..ProjectSummary::default()
        };
        let b = ProjectSummary {
            project: "b".to_string(),
            created: 2,
            ..ProjectSummary::default()
        };
        let c = ProjectSummary {
            project: "c".to_string(),
            merged: 1,
            lifespan_total_sec: 300,
            lifespan_min_sec: Some(300),
            lifespan_max_sec: Some(300),
            ci_longest_time_sec: 20,
            ..ProjectSummary::default()
        };

        let total = ProjectSummary::total("All", [&a, &b, &c]);
        assert_eq!(total.project, "All");
        assert_eq!(total.created, 2);
        assert_eq!(total.merged, 2);
        assert_eq!(total.lifespan_min_sec, Some(100));
        assert_eq!(total.lifespan_max_sec, Some(300));
        assert_eq!(total.lifespan_avg_sec(), Some(200.0));
        assert_eq!(total.ci_longest_time_sec, 50);
    }

    #[test]
    fn test_job_stats() {
        let created = at(2018, 9, 20, 10, 0);
        let changes = vec![
            change(
                "foo/bar",
                1,
                created,
                None,
                vec![
                    message(
                        "1",
                        at(2018, 9, 20, 11, 0),
                        "Patch Set 1: Verified-1\n\nBuild failed\n\n\
                         - http://logs.example.net/check/foo/1/2/foo-unit : FAILURE in 1m 0s\n\
                         - http://logs.example.net/check/foo/1/2/foo-lint : SUCCESS in 10s (non-voting)\n",
                    ),
                    message(
                        "2",
                        at(2018, 9, 20, 12, 0),
                        "Patch Set 1: Verified+1\n\nBuild succeeded\n\n\
                         - http://logs.example.net/check/foo/1/3/foo-unit : SUCCESS in 2m 0s\n\
                         - http://logs.example.net/check/foo/1/3/foo-lint : SKIPPED\n",
                    ),
                ],
            ),
            change(
                "foo/baz",
                2,
                created,
                None,
                vec![message(
                    "3",
                    at(2018, 9, 1, 12, 0),
                    "Patch Set 1: Verified+1\n\nBuild succeeded\n\n\
                     - http://logs.example.net/check/foo/1/4/foo-unit : SUCCESS in 9m 0s\n",
                )],
            ),
        ];

        let runs: Vec<_> = changes.iter().flat_map(Change::ci_runs).collect();
        let jobs = job_stats(&runs, &window());

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "foo-lint");
        assert_eq!(jobs[0].runs, 2);
        assert_eq!(jobs[0].other, 1);
        assert!(jobs[0].non_voting);
        assert_eq!(jobs[0].avg_duration_sec(), Some(10.0));

        let unit = &jobs[1];
        assert_eq!(unit.name, "foo-unit");
        assert_eq!(unit.runs, 2);
        assert_eq!(unit.passes, 1);
        assert_eq!(unit.failures, 1);
        assert_eq!(unit.failure_rate(), Some(50.0));
        assert_eq!(unit.min_duration_sec, Some(60));
        assert_eq!(unit.max_duration_sec, Some(120));
        assert_eq!(unit.avg_duration_sec(), Some(90.0));
        assert!(!unit.non_voting);
    }
}
