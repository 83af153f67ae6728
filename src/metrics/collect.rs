use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::series::{Metric, Observation};
use crate::changes::{Change, CiRun};
use crate::parser::{self, RunStatus};

/// Activity of a change: creation, last update and, once merged, the
/// revision count, lifespan and recheck/reverify requests at merge time.
pub fn change_observations(change: &Change, start: DateTime<Utc>) -> Vec<Observation> {
    let mut observations = Vec::new();
    let key = change.log_key();

    if change.created >= start {
        observations.push(Observation::new(change.created, Metric::Created, 1.0));
    }
    if change.updated >= start {
        observations.push(Observation::new(change.updated, Metric::Updated, 1.0));
    }

    let Some(merged) = change.merged_at().filter(|m| *m >= start) else {
        return observations;
    };

    let lifespan = (merged - change.created).num_seconds();
    debug!("{key}: merged at {merged} after {lifespan}s");
    observations.push(Observation::new(merged, Metric::Merged, 1.0));
    observations.push(Observation::new(
        merged,
        Metric::Revisions,
        change.rev_count() as f64,
    ));
    observations.push(Observation::new(merged, Metric::LifespanSec, lifespan as f64));

    for (_, message) in change.messages() {
        if parser::is_recheck(&message.text) {
            observations.push(Observation::new(merged, Metric::Recheck, 1.0));
        } else if parser::is_reverify(&message.text) {
            observations.push(Observation::new(merged, Metric::Reverify, 1.0));
        }
    }

    observations
}

/// CI outcomes of a change from its already parsed `runs`: promotions when
/// the CI system commented, run results at the change's last update and job
/// time at merge time for merged changes.
pub fn ci_observations(change: &Change, runs: &[CiRun], start: DateTime<Utc>) -> Vec<Observation> {
    let mut observations = Vec::new();
    let key = change.log_key();

    for (_, message) in change.messages().filter(|(_, m)| m.date >= start) {
        if parser::is_promotion_success(&message.text) {
            debug!("{key} ({}): promotion succeeded", message.date);
            observations.push(Observation::new(message.date, Metric::PromotionSuccess, 1.0));
        }
        if parser::is_promotion_failure(&message.text) {
            debug!("{key} ({}): promotion failed", message.date);
            observations.push(Observation::new(message.date, Metric::PromotionFailure, 1.0));
        }
    }

    let merged = change.merged_at();
    // filtered by comment time, counted at the change's update time
    for run in runs.iter().filter(|run| run.at >= start) {
        let metric = match run.status {
            RunStatus::Success => Metric::CiSuccess,
            RunStatus::Failure => Metric::CiFailure,
            RunStatus::Other => {
                warn!(
                    "Unexpected status {} for run on revision {} of {key}, skipping",
                    run.status_text, run.revision
                );
                continue;
            }
        };
        debug!("{key} ({}): {metric:?} on revision {}", run.at, run.revision);
        observations.push(Observation::new(change.updated, metric, 1.0));

        let Some(merged) = merged else { continue };
        for job in &run.jobs {
            let Some(secs) = job.duration_secs else {
                continue;
            };
            debug!("{key}|{}|{}: {secs}s", run.revision, job.name);
            observations.push(Observation::new(merged, Metric::CiTotalTimeSec, secs as f64));
            observations.push(Observation::new(merged, Metric::CiLongestTimeSec, secs as f64));
        }
    }

    observations
}

pub fn observations(change: &Change, runs: &[CiRun], start: DateTime<Utc>) -> Vec<Observation> {
    let mut all = change_observations(change, start);
    all.extend(ci_observations(change, runs, start));
    all
}
