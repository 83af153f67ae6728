//! HTML pages per report group and the JSON series export.

mod html;
mod json;
mod plots;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, info};

use crate::config::ReportFormat;
use crate::error::Result;
use crate::metrics::Dataset;
use crate::projects::{group_file_name, window_prefix};

/// Presentation settings shared by every page of a report run.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub title: String,
    pub issue_link: String,
    pub contact_email: String,
    pub range_hours: u32,
    /// CI system capacity in hours per day
    pub daily_ci_hours: u32,
    /// Recommended maximum duration of a single CI job
    pub job_max_minutes: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: "Zing stats".to_string(),
            issue_link: "https://github.com/HewlettPackard/zing-stats/issues".to_string(),
            contact_email: "zing-stats@hpe.com".to_string(),
            range_hours: 168,
            daily_ci_hours: 504,
            job_max_minutes: 15,
        }
    }
}

/// Writes the report for every group under `{output_dir}/{window prefix}/`
/// and returns the paths written.
pub fn write_reports(
    dataset: &Dataset,
    groups: &IndexMap<String, Vec<String>>,
    not_found: &[String],
    settings: &ReportSettings,
    output_dir: &Path,
    format: ReportFormat,
) -> Result<Vec<PathBuf>> {
    let dir = output_dir.join(window_prefix(settings.range_hours));
    fs::create_dir_all(&dir)?;
    debug!("Writing {format:?} report to {}", dir.display());

    match format {
        ReportFormat::Html => write_html(dataset, groups, not_found, settings, &dir),
        ReportFormat::Json => write_json(dataset, &dir).map(|path| vec![path]),
    }
}

fn write_html(
    dataset: &Dataset,
    groups: &IndexMap<String, Vec<String>>,
    not_found: &[String],
    settings: &ReportSettings,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let nav: Vec<String> = groups.keys().cloned().collect();
    let mut written = Vec::with_capacity(groups.len());

    for (group, members) in groups {
        let stats = dataset.group(group, members);
        let missing: Vec<String> = not_found
            .iter()
            .filter(|p| members.contains(p))
            .cloned()
            .collect();

        let path = dir.join(group_file_name(group));
        let mut out = BufWriter::new(File::create(&path)?);
        html::render(
            &mut out,
            &html::Page {
                settings,
                groups: &nav,
                group,
                stats: stats.as_ref(),
                window: &dataset.window,
                resolution: dataset.resolution,
                change_count: dataset.change_count,
                not_found: &missing,
            },
        )?;
        out.flush()?;

        info!("Wrote {} for group \"{group}\"", path.display());
        written.push(path);
    }

    Ok(written)
}

fn write_json(dataset: &Dataset, dir: &Path) -> Result<PathBuf> {
    let path = dir.join("stats.json");
    let stats = json::stats_json(&dataset.hourly());
    let mut out = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut out, &stats)?;
    out.flush()?;

    info!("Wrote {}", path.display());
    Ok(path)
}

/// Compact duration, e.g. `45s`, `2m 05s`, `3h 20m` or `2d 04h`.
pub fn format_duration(secs: Option<f64>) -> String {
    let Some(secs) = secs else {
        return "-".to_string();
    };
    let secs = secs.max(0.0).round() as u64;

    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m {:02}s", secs / 60, secs % 60),
        3600..=86_399 => format!("{}h {:02}m", secs / 3600, secs % 3600 / 60),
        _ => format!("{}d {:02}h", secs / 86_400, secs % 86_400 / 3600),
    }
}

pub fn format_rate(rate: Option<f64>) -> String {
    rate.map_or_else(|| "-".to_string(), |r| format!("{r:.1}%"))
}

pub fn format_count(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::fixtures::{at, change};
    use crate::metrics::{Resolution, Window};

    fn dataset() -> Dataset {
        let window = Window::ending_at(at(2018, 9, 25, 0, 0), 24);
        let changes = vec![change(
            "openstack/nova",
            1,
            at(2018, 9, 24, 10, 0),
            None,
            vec![],
        )];
        Dataset::build(changes, window, Resolution::Hour).unwrap()
    }

    fn groups() -> IndexMap<String, Vec<String>> {
        let mut groups = IndexMap::new();
        groups.insert("All".to_string(), vec!["openstack/nova".to_string()]);
        groups.insert("Compute Team".to_string(), vec!["openstack/nova".to_string()]);
        groups.insert("github".to_string(), vec!["foo/private".to_string()]);
        groups
    }

    fn settings() -> ReportSettings {
        ReportSettings {
            range_hours: 24,
            ..ReportSettings::default()
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "-");
        assert_eq!(format_duration(Some(45.0)), "45s");
        assert_eq!(format_duration(Some(125.0)), "2m 05s");
        assert_eq!(format_duration(Some(12_000.0)), "3h 20m");
        assert_eq!(format_duration(Some(187_200.0)), "2d 04h");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(None), "-");
        assert_eq!(format_rate(Some(12.345)), "12.3%");
        assert_eq!(format_count(Some(1.5)), "1.50");
    }

    #[test]
    fn test_write_html_reports() {
        let dir = tempfile::tempdir().unwrap();
        let not_found = vec!["foo/private".to_string()];

        let written = write_reports(
            &dataset(),
            &groups(),
            &not_found,
            &settings(),
            dir.path(),
            ReportFormat::Html,
        )
        .unwrap();

        let report_dir = dir.path().join("last_24h");
        assert_eq!(
            written,
            vec![
                report_dir.join("index.html"),
                report_dir.join("compute_team.html"),
                report_dir.join("github.html"),
            ]
        );

        let index = fs::read_to_string(report_dir.join("index.html")).unwrap();
        assert!(index.contains("<td>openstack/nova</td>"));
        assert!(!index.contains("<li>foo/private</li>"));

        let github = fs::read_to_string(report_dir.join("github.html")).unwrap();
        assert!(github.contains("No projects in this group"));
        assert!(github.contains("<li>foo/private</li>"));
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_reports(
            &dataset(),
            &groups(),
            &[],
            &settings(),
            dir.path(),
            ReportFormat::Json,
        )
        .unwrap();

        let path = dir.path().join("last_24h").join("stats.json");
        assert_eq!(written, vec![path.clone()]);

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(stats["2018-09-24T10:00:00.000Z"]["created"], 1.0);
        assert_eq!(stats.as_object().unwrap().len(), 25);
    }
}
