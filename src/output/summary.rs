use std::fmt::Write;
use std::path::PathBuf;

use comfy_table::{Cell, Color as TableColor};

use super::styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim};
use super::tables::{color_coded_duration_cell, color_coded_failure_cell, create_table};
use crate::metrics::{GroupStats, JobStats, Window};
use crate::report::{format_count, format_duration, ReportSettings};

/// What a run gathered and wrote, for the terminal summary.
pub struct RunSummary<'a> {
    pub window: &'a Window,
    pub change_count: usize,
    /// The `All` group, `None` when nothing was gathered
    pub all: Option<&'a GroupStats<'a>>,
    pub not_found: &'a [String],
    pub settings: &'a ReportSettings,
    pub written: &'a [PathBuf],
}

/// Prints a human-readable summary of the run to stdout.
///
/// Displays color-coded tables showing:
/// - Overview: window, changes gathered, CI runs and overall failure rate
/// - Projects: per-project activity and CI time
/// - Top 10 Failing Jobs and Top 10 Slowest Jobs
/// - Reports: files written
///
/// Color coding:
/// - Green: failures <25%, longest job within two thirds of the recommended maximum
/// - Yellow: failures 25-50%, longest job up to the recommended maximum
/// - Red: failures ≥50%, longest job above the recommended maximum
pub fn print_summary(summary: &RunSummary<'_>) {
    println!("{}", render_summary(summary));
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn sort_jobs_by<'a, F>(jobs: &'a [JobStats], compare: F) -> Vec<&'a JobStats>
where
    F: Fn(&JobStats, &JobStats) -> std::cmp::Ordering,
{
    let mut sorted: Vec<&JobStats> = jobs.iter().collect();
    sorted.sort_by(|a, b| compare(a, b));
    sorted
}

fn rate_cell(rate: Option<f64>) -> Cell {
    rate.map_or_else(|| Cell::new("-"), color_coded_failure_cell)
}

#[allow(clippy::too_many_lines, clippy::format_push_string)]
fn render_summary(summary: &RunSummary<'_>) -> String {
    let mut output = String::new();
    let max_minutes = summary.settings.job_max_minutes;

    add_section_header(&mut output, "📊", "Overview");

    let failure_display = match summary.all.and_then(|all| all.total.failure_rate()) {
        Some(rate) if rate >= 50.0 => bright_red(format!("{rate:.1}%")),
        Some(rate) if rate >= 25.0 => bright_yellow(format!("{rate:.1}%")),
        Some(rate) => bright_green(format!("{rate:.1}%")),
        None => dim("-".to_string()),
    };
    let (projects, ci_runs, merged) = summary.all.map_or((0, 0, 0), |all| {
        (all.projects.len(), all.total.ci_runs(), all.total.merged)
    });

    output.push_str(&format!(
        "  {} {} to {} UTC\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Window:"),
        cyan(summary.window.start.format("%Y-%m-%d %H:%M")),
        cyan(summary.window.finish.format("%Y-%m-%d %H:%M")),
        dim("Changes/PRs gathered:"),
        bright_yellow(summary.change_count),
        dim("Projects with changes:"),
        bright_yellow(projects),
        dim("Merged:"),
        bright_yellow(merged),
        dim("CI runs:"),
        bright_yellow(ci_runs),
        dim("CI failure rate:"),
        failure_display
    ));

    if !summary.not_found.is_empty() {
        add_section_header(&mut output, "⚠️", "GitHub Projects Not Found");
        for project in summary.not_found {
            let _ = writeln!(output, "  {} {}", cyan("•"), project);
        }
        output.push('\n');
    }

    let Some(all) = summary.all else {
        output.push_str(&format!("{}\n", bright_yellow("No changes found in the report window.")));
        return output;
    };

    add_section_header(&mut output, "📋", "Projects");

    let mut projects_table = create_table();
    projects_table.set_header(create_cyan_header(&[
        "Project",
        "Source",
        "Created",
        "Merged",
        "CI Runs",
        "CI Fail",
        "CI Time",
        "Longest Job",
        "Mean Revisions",
    ]));

    for project in &all.projects {
        let s = &project.summary;
        projects_table.add_row(vec![
            Cell::new(&s.project),
            Cell::new(project.source.as_str()),
            Cell::new(s.created),
            Cell::new(s.merged),
            Cell::new(s.ci_runs()),
            rate_cell(s.failure_rate()),
            Cell::new(format_duration(Some(s.ci_total_time_sec as f64))),
            color_coded_duration_cell(s.ci_longest_time_sec as f64, max_minutes),
            Cell::new(format_count(s.mean_revisions())),
        ]);
    }

    output.push_str(&format!("{projects_table}\n\n"));

    if !all.jobs.is_empty() {
        add_section_header(&mut output, "❌", "Top 10 Failing Jobs");

        let sorted_by_failure = sort_jobs_by(&all.jobs, |a, b| {
            b.failure_rate()
                .unwrap_or(0.0)
                .partial_cmp(&a.failure_rate().unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.runs.cmp(&a.runs))
        });

        let mut failing_table = create_table();
        failing_table.set_header(create_cyan_header(&["#", "Job Name", "Runs", "Fail", "Non-voting"]));

        for (idx, job) in sorted_by_failure.iter().take(10).enumerate() {
            failing_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&job.name),
                Cell::new(job.runs),
                rate_cell(job.failure_rate()),
                Cell::new(if job.non_voting { "yes" } else { "" }),
            ]);
        }

        output.push_str(&format!("{failing_table}\n\n"));

        add_section_header(&mut output, "🐌", "Top 10 Slowest Jobs");

        let sorted_by_time = sort_jobs_by(&all.jobs, |a, b| b.max_duration_sec.cmp(&a.max_duration_sec));

        let mut slowest_table = create_table();
        slowest_table.set_header(create_cyan_header(&["#", "Job Name", "Max", "Avg", "Min"]));

        for (idx, job) in sorted_by_time
            .iter()
            .filter(|job| job.max_duration_sec.is_some())
            .take(10)
            .enumerate()
        {
            slowest_table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(&job.name),
                job.max_duration_sec.map_or_else(
                    || Cell::new("-"),
                    |secs| color_coded_duration_cell(secs as f64, max_minutes),
                ),
                Cell::new(format_duration(job.avg_duration_sec())),
                Cell::new(format_duration(job.min_duration_sec.map(|s| s as f64))),
            ]);
        }

        output.push_str(&format!("{slowest_table}\n\n"));
    }

    if !summary.written.is_empty() {
        add_section_header(&mut output, "💡", "Reports");
        for path in summary.written {
            let _ = writeln!(output, "  {} {}", cyan("•"), path.display());
        }
    }

    output
}
