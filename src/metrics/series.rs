use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Serialize;

/// A quantity recorded against a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Created,
    Updated,
    Merged,
    Revisions,
    LifespanSec,
    Recheck,
    Reverify,
    CiTotalTimeSec,
    CiLongestTimeSec,
    CiSuccess,
    CiFailure,
    PromotionSuccess,
    PromotionFailure,
}

/// How observations falling in the same bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Max,
    Mean,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::Created,
        Metric::Updated,
        Metric::Merged,
        Metric::Revisions,
        Metric::LifespanSec,
        Metric::Recheck,
        Metric::Reverify,
        Metric::CiTotalTimeSec,
        Metric::CiLongestTimeSec,
        Metric::CiSuccess,
        Metric::CiFailure,
        Metric::PromotionSuccess,
        Metric::PromotionFailure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Merged => "merged",
            Self::Revisions => "revisions",
            Self::LifespanSec => "lifespan_sec",
            Self::Recheck => "recheck",
            Self::Reverify => "reverify",
            Self::CiTotalTimeSec => "ci_total_time_sec",
            Self::CiLongestTimeSec => "ci_longest_time_sec",
            Self::CiSuccess => "ci_success",
            Self::CiFailure => "ci_failure",
            Self::PromotionSuccess => "promotion_success",
            Self::PromotionFailure => "promotion_failure",
        }
    }

    pub fn aggregation(self) -> Aggregation {
        match self {
            Self::LifespanSec | Self::CiLongestTimeSec => Aggregation::Max,
            Self::Revisions => Aggregation::Mean,
            _ => Aggregation::Sum,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub metric: Metric,
    pub value: f64,
}

impl Observation {
    pub fn new(at: DateTime<Utc>, metric: Metric, value: f64) -> Self {
        Self { at, metric, value }
    }
}

/// Reporting window, exclusive of `start` and inclusive of `finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
}

/// Longest report range accepted, roughly a century.
pub const MAX_RANGE_HOURS: u32 = 876_000;

impl Window {
    pub fn new(start: DateTime<Utc>, finish: DateTime<Utc>) -> Self {
        Self { start, finish }
    }

    /// The `range_hours` leading up to `finish`, clamped to the earliest
    /// representable time.
    pub fn ending_at(finish: DateTime<Utc>, range_hours: u32) -> Self {
        let start = finish
            .checked_sub_signed(TimeDelta::hours(i64::from(range_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, finish)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start && at <= self.finish
    }
}

/// Bucket width used when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hour,
    Day,
}

impl Resolution {
    /// Hourly for windows up to a day long, daily beyond that.
    pub fn for_range(range_hours: u32) -> Self {
        if range_hours <= 24 {
            Self::Hour
        } else {
            Self::Day
        }
    }

    pub fn step(self) -> TimeDelta {
        match self {
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
        }
    }

    pub fn truncate(self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.duration_trunc(self.step()).unwrap_or(at)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    max: f64,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.sum += value;
        self.count += 1;
    }

    fn finish(self, aggregation: Aggregation) -> f64 {
        match (aggregation, self.count) {
            (_, 0) => 0.0,
            (Aggregation::Sum, _) => self.sum,
            (Aggregation::Max, _) => self.max,
            (Aggregation::Mean, n) => self.sum / f64::from(n),
        }
    }
}

/// Aggregated metric values for one hour or day.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub start: DateTime<Utc>,
    values: [f64; Metric::ALL.len()],
}

impl Bucket {
    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    pub fn ci_runs(&self) -> f64 {
        self.get(Metric::CiSuccess) + self.get(Metric::CiFailure)
    }

    pub fn pct_success(&self) -> f64 {
        percentage(self.get(Metric::CiSuccess), self.ci_runs())
    }

    pub fn pct_failure(&self) -> f64 {
        percentage(self.get(Metric::CiFailure), self.ci_runs())
    }

    pub fn ci_total_time_min(&self) -> f64 {
        self.get(Metric::CiTotalTimeSec) / 60.0
    }

    pub fn ci_longest_time_min(&self) -> f64 {
        self.get(Metric::CiLongestTimeSec) / 60.0
    }
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Resamples observations inside `window` into contiguous buckets from the
/// bucket holding the window start to the one holding its finish. Buckets
/// without observations hold zeros.
pub fn resample<'a>(
    observations: impl IntoIterator<Item = &'a Observation>,
    window: &Window,
    resolution: Resolution,
) -> Vec<Bucket> {
    let first = resolution.truncate(window.start);
    let last = resolution.truncate(window.finish);
    let step = resolution.step();
    let step_secs = step.num_seconds();
    let len = usize::try_from((last - first).num_seconds() / step_secs + 1).unwrap_or(0);

    let mut accumulators = vec![[Accumulator::default(); Metric::ALL.len()]; len];
    for obs in observations.into_iter().filter(|o| window.contains(o.at)) {
        let Ok(idx) = usize::try_from((obs.at - first).num_seconds() / step_secs) else {
            continue;
        };
        if let Some(bucket) = accumulators.get_mut(idx) {
            bucket[obs.metric.index()].add(obs.value);
        }
    }

    accumulators
        .into_iter()
        .zip(0..)
        .map(|(accs, i)| {
            let mut values = [0.0; Metric::ALL.len()];
            for metric in Metric::ALL {
                values[metric.index()] = accs[metric.index()].finish(metric.aggregation());
            }
            Bucket {
                start: first + step * i,
                values,
            }
        })
        .collect()
}
