//! Plotly figures for the HTML report.
//!
//! Each figure is a `{"data": [...], "layout": {...}}` object handed to
//! `Plotly.newPlot` on the page.

use serde_json::{json, Value};

use super::ReportSettings;
use crate::metrics::{Bucket, Metric, Resolution};

const PLOT_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Share of the daily CI capacity the capacity line marks.
const CAPACITY_SHARE: f64 = 0.75;

fn x_values(buckets: &[Bucket]) -> Vec<String> {
    buckets
        .iter()
        .map(|b| b.start.format(PLOT_TIME).to_string())
        .collect()
}

fn series(buckets: &[Bucket], value: impl Fn(&Bucket) -> f64) -> Vec<f64> {
    buckets.iter().map(value).collect()
}

fn percent_labels(values: &[f64]) -> Vec<String> {
    values.iter().map(|v| format!("{v:.1}%")).collect()
}

/// Dotted horizontal line across the whole plot, with a label just above it.
fn threshold(buckets: &[Bucket], y: f64, color: &str, label: String) -> (Value, Value) {
    let x = x_values(buckets);
    let first = x.first().cloned().unwrap_or_default();
    let last = x.last().cloned().unwrap_or_default();

    let shape = json!({
        "type": "line",
        "x0": first,
        "y0": y,
        "x1": last,
        "y1": y,
        "line": {"color": color, "width": 2, "dash": "dot"}
    });
    let text = json!({
        "x": [first],
        "y": [y * 1.05],
        "mode": "text",
        "text": [label],
        "textposition": "top right",
        "textfont": {"color": color},
        "hoverinfo": "skip"
    });
    (shape, text)
}

pub fn changes(buckets: &[Bucket], group: &str) -> Value {
    let x = x_values(buckets);
    json!({
        "data": [
            {"name": "Created", "type": "scatter", "x": x, "y": series(buckets, |b| b.get(Metric::Created))},
            {"name": "Merged", "type": "scatter", "x": x, "y": series(buckets, |b| b.get(Metric::Merged))},
            {"name": "Updated", "type": "scatter", "x": x, "y": series(buckets, |b| b.get(Metric::Updated)), "visible": "legendonly"}
        ],
        "layout": {"title": format!("Changes/PRs ({group} projects)")}
    })
}

/// Capacity available per bucket: 75% of the daily CI hours, in minutes.
pub fn capacity_minutes(daily_ci_hours: u32, resolution: Resolution) -> f64 {
    let per_day = f64::from(daily_ci_hours) * 60.0 * CAPACITY_SHARE;
    match resolution {
        Resolution::Day => per_day,
        Resolution::Hour => per_day / 24.0,
    }
}

pub fn ci_capacity(
    buckets: &[Bucket],
    group: &str,
    settings: &ReportSettings,
    resolution: Resolution,
) -> Value {
    let capacity = capacity_minutes(settings.daily_ci_hours, resolution);
    let (shape, label) = threshold(
        buckets,
        capacity,
        "rgb(231, 76, 60)",
        "75% of CI Capacity".to_string(),
    );

    json!({
        "data": [
            {
                "name": "Total CI time",
                "type": "bar",
                "marker": {"color": "rgb(55, 83, 109)"},
                "x": x_values(buckets),
                "y": series(buckets, Bucket::ci_total_time_min)
            },
            label
        ],
        "layout": {
            "title": format!("CI system capacity ({group} projects)"),
            "shapes": [shape],
            "yaxis": {"title": "CI time (min)"},
            "showlegend": false
        }
    })
}

pub fn ci_job_time(buckets: &[Bucket], group: &str, settings: &ReportSettings) -> Value {
    let max = f64::from(settings.job_max_minutes);
    let (shape, label) = threshold(
        buckets,
        max,
        "rgb(230, 126, 34)",
        format!("Recommended maximum ({} min)", settings.job_max_minutes),
    );

    json!({
        "data": [
            {
                "name": "Longest CI job",
                "type": "scatter",
                "marker": {"color": "rgb(142, 68, 173)"},
                "x": x_values(buckets),
                "y": series(buckets, Bucket::ci_longest_time_min)
            },
            label
        ],
        "layout": {
            "title": format!("CI Longest Job Duration ({group} projects)"),
            "shapes": [shape],
            "yaxis": {"title": "Duration (min)"},
            "showlegend": false
        }
    })
}

/// Stacked area of success and failure percentages.
pub fn ci_success_failure(buckets: &[Bucket], group: &str) -> Value {
    let x = x_values(buckets);
    let success = series(buckets, Bucket::pct_success);
    let failure = series(buckets, Bucket::pct_failure);
    let stacked: Vec<f64> = success.iter().zip(&failure).map(|(s, f)| s + f).collect();

    json!({
        "data": [
            {
                "name": "Success",
                "type": "scatter",
                "mode": "lines",
                "x": x,
                "y": success,
                "text": percent_labels(&success),
                "hoverinfo": "x+text",
                "line": {"width": 0.5, "color": "rgb(170, 255, 217)"},
                "fill": "tonexty"
            },
            {
                "name": "Failure",
                "type": "scatter",
                "mode": "lines",
                "x": x,
                "y": stacked,
                "text": percent_labels(&failure),
                "hoverinfo": "x+text",
                "line": {"width": 0.5, "color": "rgb(255, 174, 170)"},
                "fill": "tonexty"
            }
        ],
        "layout": {
            "title": format!("CI Success/Fail Rates ({group} projects)"),
            "showlegend": true,
            "yaxis": {"type": "linear", "range": [0, 100], "dtick": 10, "ticksuffix": "%"}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::fixtures::at;
    use crate::metrics::{resample, Observation, Window};

    fn buckets() -> Vec<Bucket> {
        let window = Window::ending_at(at(2018, 9, 25, 0, 0), 48);
        let observations = [
            Observation::new(at(2018, 9, 24, 10, 0), Metric::CiSuccess, 3.0),
            Observation::new(at(2018, 9, 24, 11, 0), Metric::CiFailure, 1.0),
            Observation::new(at(2018, 9, 24, 11, 0), Metric::CiTotalTimeSec, 600.0),
        ];
        resample(&observations, &window, Resolution::Day)
    }

    fn settings() -> ReportSettings {
        ReportSettings {
            daily_ci_hours: 24,
            job_max_minutes: 15,
            ..ReportSettings::default()
        }
    }

    #[test]
    fn test_capacity_minutes() {
        assert_eq!(capacity_minutes(504, Resolution::Day), 22_680.0);
        assert_eq!(capacity_minutes(24, Resolution::Hour), 45.0);
    }

    #[test]
    fn test_ci_capacity_figure() {
        let figure = ci_capacity(&buckets(), "All", &settings(), Resolution::Day);

        assert_eq!(figure["layout"]["title"], "CI system capacity (All projects)");
        assert_eq!(figure["layout"]["shapes"][0]["y0"], 1080.0);
        assert_eq!(figure["layout"]["shapes"][0]["x0"], "2018-09-23 00:00:00");
        assert_eq!(figure["layout"]["shapes"][0]["x1"], "2018-09-25 00:00:00");
        assert_eq!(figure["data"][0]["y"][1], 10.0);
    }

    #[test]
    fn test_success_failure_is_stacked() {
        let figure = ci_success_failure(&buckets(), "All");

        assert_eq!(figure["data"][0]["y"][1], 75.0);
        assert_eq!(figure["data"][1]["y"][1], 100.0);
        assert_eq!(figure["data"][1]["text"][1], "25.0%");
        assert_eq!(figure["data"][1]["y"][0], 0.0);
    }

    #[test]
    fn test_job_time_threshold_label() {
        let figure = ci_job_time(&buckets(), "Storage", &settings());
        assert_eq!(figure["data"][1]["text"][0], "Recommended maximum (15 min)");
        assert_eq!(figure["layout"]["shapes"][0]["y1"], 15.0);
    }
}
