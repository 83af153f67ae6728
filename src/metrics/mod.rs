//! Turns changes into timestamped observations and aggregates them per
//! project, per report group and per CI job.

mod collect;
mod dataset;
mod series;
mod summary;

pub use dataset::{Dataset, GroupStats, ProjectData};
pub use series::{
    resample, Aggregation, Bucket, Metric, Observation, Resolution, Window, MAX_RANGE_HOURS,
};
pub use summary::{job_stats, JobStats, ProjectSummary};
