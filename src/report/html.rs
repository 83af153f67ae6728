use std::borrow::Cow;
use std::io::{self, Write};

use serde_json::Value;

use super::{format_count, format_duration, format_rate, plots, ReportSettings};
use crate::metrics::{GroupStats, Resolution, Window};
use crate::projects::{group_file_name, window_label};

const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const REPORT_TIME: &str = "%H:%M:%S %d-%b-%Y";

/// Everything needed to render one group's page.
pub struct Page<'a> {
    pub settings: &'a ReportSettings,
    /// Navigation entries, in display order
    pub groups: &'a [String],
    pub group: &'a str,
    pub stats: Option<&'a GroupStats<'a>>,
    pub window: &'a Window,
    pub resolution: Resolution,
    pub change_count: usize,
    /// GitHub repositories of this group that returned 404
    pub not_found: &'a [String],
}

pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

pub fn render(out: &mut dyn Write, page: &Page<'_>) -> io::Result<()> {
    let title = format!(
        "{} for last {}",
        page.settings.title,
        window_label(page.settings.range_hours)
    );

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "    <meta charset=\"UTF-8\">")?;
    writeln!(out, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(out, "    <title>{} ({})</title>", escape_html(&title), escape_html(page.group))?;
    writeln!(out, "    <script src=\"{PLOTLY_JS}\"></script>")?;
    writeln!(out, "    <style>")?;
    writeln!(out, "        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}")?;
    writeln!(out, "        .container {{ max-width: 1400px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}")?;
    writeln!(out, "        h1 {{ color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }}")?;
    writeln!(out, "        h2 {{ color: #34495e; margin-top: 30px; }}")?;
    writeln!(out, "        nav a {{ margin-right: 12px; color: #3498db; text-decoration: none; }}")?;
    writeln!(out, "        nav a.current {{ font-weight: bold; color: #2c3e50; }}")?;
    writeln!(out, "        .summary {{ background: #ecf0f1; padding: 20px; border-radius: 5px; margin: 20px 0; }}")?;
    writeln!(out, "        .plots {{ display: grid; grid-template-columns: 1fr 1fr; gap: 20px; }}")?;
    writeln!(out, "        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}")?;
    writeln!(out, "        th, td {{ padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }}")?;
    writeln!(out, "        th {{ background: #3498db; color: white; }}")?;
    writeln!(out, "        tr:nth-child(even) {{ background: #f8f9fa; }}")?;
    writeln!(out, "        tr.total {{ font-weight: bold; }}")?;
    writeln!(out, "        .good {{ color: #27ae60; }}")?;
    writeln!(out, "        .warning {{ color: #f39c12; }}")?;
    writeln!(out, "        .bad {{ color: #e74c3c; }}")?;
    writeln!(out, "    </style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "    <div class=\"container\">")?;
    writeln!(out, "        <h1>{}</h1>", escape_html(&title))?;

    render_nav(out, page)?;

    writeln!(out, "        <div class=\"summary\">")?;
    writeln!(
        out,
        "            <p><strong>Window:</strong> {} to {} UTC</p>",
        page.window.start.format(REPORT_TIME),
        page.window.finish.format(REPORT_TIME)
    )?;
    writeln!(
        out,
        "            <p><strong>Changes/PRs gathered:</strong> {}</p>",
        page.change_count
    )?;
    writeln!(out, "        </div>")?;

    match page.stats {
        Some(stats) => {
            render_plots(out, page, stats)?;
            render_projects(out, stats)?;
            render_jobs(out, stats)?;
        }
        None => writeln!(out, "        <p>No projects in this group</p>")?,
    }

    if !page.not_found.is_empty() {
        writeln!(out, "        <h2>GitHub projects not found</h2>")?;
        writeln!(out, "        <ul>")?;
        for project in page.not_found {
            writeln!(out, "            <li>{}</li>", escape_html(project))?;
        }
        writeln!(out, "        </ul>")?;
    }

    render_footer(out, page)?;

    writeln!(out, "    </div>")?;
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;

    Ok(())
}

fn render_nav(out: &mut dyn Write, page: &Page<'_>) -> io::Result<()> {
    writeln!(out, "        <nav>")?;
    for group in page.groups {
        let class = if group == page.group { " class=\"current\"" } else { "" };
        writeln!(
            out,
            "            <a href=\"{}\"{class}>{}</a>",
            escape_html(&group_file_name(group)),
            escape_html(group)
        )?;
    }
    writeln!(out, "        </nav>")
}

fn render_plots(out: &mut dyn Write, page: &Page<'_>, stats: &GroupStats<'_>) -> io::Result<()> {
    let group = page.group;
    let figures = [
        ("plot-changes", plots::changes(&stats.buckets, group)),
        (
            "plot-ci-capacity",
            plots::ci_capacity(&stats.buckets, group, page.settings, page.resolution),
        ),
        (
            "plot-ci-job-time",
            plots::ci_job_time(&stats.buckets, group, page.settings),
        ),
        (
            "plot-ci-status",
            plots::ci_success_failure(&stats.buckets, group),
        ),
    ];

    writeln!(out, "        <div class=\"plots\">")?;
    for (id, _) in &figures {
        writeln!(out, "            <div id=\"{id}\"></div>")?;
    }
    writeln!(out, "        </div>")?;

    writeln!(out, "        <script>")?;
    for (id, figure) in &figures {
        writeln!(
            out,
            "            Plotly.newPlot('{id}', {}, {}, {{displaylogo: false}});",
            script_json(&figure["data"]),
            script_json(&figure["layout"])
        )?;
    }
    writeln!(out, "        </script>")
}

/// JSON that is safe to embed inside a `<script>` element.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn failure_class(rate: Option<f64>) -> &'static str {
    match rate {
        Some(rate) if rate >= 50.0 => "bad",
        Some(rate) if rate >= 25.0 => "warning",
        Some(_) => "good",
        None => "",
    }
}

fn render_projects(out: &mut dyn Write, stats: &GroupStats<'_>) -> io::Result<()> {
    writeln!(out, "        <h2>Projects</h2>")?;
    writeln!(out, "        <table>")?;
    writeln!(out, "            <thead>")?;
    writeln!(out, "                <tr>")?;
    for header in [
        "Project",
        "Source",
        "Created",
        "Updated",
        "Merged",
        "CI runs",
        "CI failures",
        "Total CI time",
        "Longest job",
        "Mean revisions",
        "Lifespan (min / avg / max)",
        "Rechecks",
        "Reverifies",
        "Promotions (ok / failed)",
    ] {
        writeln!(out, "                    <th>{header}</th>")?;
    }
    writeln!(out, "                </tr>")?;
    writeln!(out, "            </thead>")?;
    writeln!(out, "            <tbody>")?;

    let rows = stats
        .projects
        .iter()
        .map(|p| (&p.summary, ""))
        .chain(std::iter::once((&stats.total, " class=\"total\"")));

    for (summary, row_class) in rows {
        let source = summary.source.map_or("", |s| s.as_str());
        let lifespan = format!(
            "{} / {} / {}",
            format_duration(summary.lifespan_min_sec.map(|s| s as f64)),
            format_duration(summary.lifespan_avg_sec()),
            format_duration(summary.lifespan_max_sec.map(|s| s as f64))
        );

        writeln!(out, "                <tr{row_class}>")?;
        writeln!(out, "                    <td>{}</td>", escape_html(&summary.project))?;
        writeln!(out, "                    <td>{source}</td>")?;
        writeln!(out, "                    <td>{}</td>", summary.created)?;
        writeln!(out, "                    <td>{}</td>", summary.updated)?;
        writeln!(out, "                    <td>{}</td>", summary.merged)?;
        writeln!(out, "                    <td>{}</td>", summary.ci_runs())?;
        writeln!(
            out,
            "                    <td class=\"{}\">{} ({})</td>",
            failure_class(summary.failure_rate()),
            summary.ci_failure,
            format_rate(summary.failure_rate())
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_duration(Some(summary.ci_total_time_sec as f64))
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_duration(Some(summary.ci_longest_time_sec as f64))
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_count(summary.mean_revisions())
        )?;
        writeln!(out, "                    <td>{lifespan}</td>")?;
        writeln!(out, "                    <td>{}</td>", summary.recheck)?;
        writeln!(out, "                    <td>{}</td>", summary.reverify)?;
        writeln!(
            out,
            "                    <td>{} / {}</td>",
            summary.promotion_success, summary.promotion_failure
        )?;
        writeln!(out, "                </tr>")?;
    }

    writeln!(out, "            </tbody>")?;
    writeln!(out, "        </table>")
}

fn render_jobs(out: &mut dyn Write, stats: &GroupStats<'_>) -> io::Result<()> {
    writeln!(out, "        <h2>CI jobs</h2>")?;
    if stats.jobs.is_empty() {
        return writeln!(out, "        <p>No CI jobs reported</p>");
    }

    writeln!(out, "        <table>")?;
    writeln!(out, "            <thead>")?;
    writeln!(out, "                <tr>")?;
    for header in [
        "Job",
        "Runs",
        "Passed",
        "Failed",
        "Other",
        "Failure rate",
        "Min duration",
        "Avg duration",
        "Max duration",
        "Non-voting",
    ] {
        writeln!(out, "                    <th>{header}</th>")?;
    }
    writeln!(out, "                </tr>")?;
    writeln!(out, "            </thead>")?;
    writeln!(out, "            <tbody>")?;

    for job in &stats.jobs {
        writeln!(out, "                <tr>")?;
        writeln!(out, "                    <td>{}</td>", escape_html(&job.name))?;
        writeln!(out, "                    <td>{}</td>", job.runs)?;
        writeln!(out, "                    <td>{}</td>", job.passes)?;
        writeln!(out, "                    <td>{}</td>", job.failures)?;
        writeln!(out, "                    <td>{}</td>", job.other)?;
        writeln!(
            out,
            "                    <td class=\"{}\">{}</td>",
            failure_class(job.failure_rate()),
            format_rate(job.failure_rate())
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_duration(job.min_duration_sec.map(|s| s as f64))
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_duration(job.avg_duration_sec())
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            format_duration(job.max_duration_sec.map(|s| s as f64))
        )?;
        writeln!(
            out,
            "                    <td>{}</td>",
            if job.non_voting { "yes" } else { "" }
        )?;
        writeln!(out, "                </tr>")?;
    }

    writeln!(out, "            </tbody>")?;
    writeln!(out, "        </table>")
}

fn render_footer(out: &mut dyn Write, page: &Page<'_>) -> io::Result<()> {
    let settings = page.settings;
    writeln!(out, "        <footer style=\"margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; color: #666; text-align: center;\">")?;
    writeln!(
        out,
        "            <p>Generated by zing-stats v{} at {} UTC</p>",
        env!("CARGO_PKG_VERSION"),
        page.window.finish.format(REPORT_TIME)
    )?;
    writeln!(
        out,
        "            <p>Report issues at <a href=\"{0}\">{0}</a> or contact <a href=\"mailto:{1}\">{1}</a></p>",
        escape_html(&settings.issue_link),
        escape_html(&settings.contact_email)
    )?;
    writeln!(out, "        </footer>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::fixtures::{at, change, message};
    use crate::metrics::Dataset;

    fn settings() -> ReportSettings {
        ReportSettings {
            range_hours: 168,
            ..ReportSettings::default()
        }
    }

    fn render_to_string(page: &Page<'_>) -> String {
        let mut out = Vec::new();
        render(&mut out, page).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(
            escape_html("<a href=\"x\">Tom & Jerry's</a>"),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let value = serde_json::json!({"title": "</script><b>"});
        assert_eq!(script_json(&value), r#"{"title":"<\/script><b>"}"#);
    }

    #[test]
    fn test_render_group_page() {
        let window = Window::ending_at(at(2018, 9, 25, 0, 0), 168);
        let created = at(2018, 9, 20, 10, 0);
        let changes = vec![change(
            "foo/bar",
            1,
            created,
            Some(at(2018, 9, 21, 10, 0)),
            vec![message(
                "m1",
                at(2018, 9, 20, 11, 0),
                "Patch Set 1: Verified+1\n\nBuild succeeded\n\n- http://logs.example.net/check/foo/1/2/bar-unit : SUCCESS in 1m 30s",
            )],
        )];
        let dataset = Dataset::build(changes, window, Resolution::Day).unwrap();
        let stats = dataset.group("Team <A>", &["foo/bar".to_string()]).unwrap();
        let groups = vec!["All".to_string(), "Team <A>".to_string()];
        let settings = settings();
        let not_found = vec!["foo/private".to_string()];

        let html = render_to_string(&Page {
            settings: &settings,
            groups: &groups,
            group: "Team <A>",
            stats: Some(&stats),
            window: &window,
            resolution: Resolution::Day,
            change_count: dataset.change_count,
            not_found: &not_found,
        });

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Zing stats for last 7 days</h1>"));
        assert!(html.contains("<a href=\"index.html\">All</a>"));
        assert!(html.contains("<a href=\"team_a_.html\" class=\"current\">Team &lt;A&gt;</a>"));
        assert!(html.contains("Plotly.newPlot('plot-ci-capacity'"));
        assert!(html.contains("<td>foo/bar</td>"));
        assert!(html.contains("<td>bar-unit</td>"));
        assert!(html.contains("<li>foo/private</li>"));
        assert!(html.contains("mailto:zing-stats@hpe.com"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_render_empty_group() {
        let window = Window::ending_at(at(2018, 9, 25, 0, 0), 24);
        let settings = ReportSettings {
            range_hours: 24,
            ..ReportSettings::default()
        };
        let groups = vec!["All".to_string()];

        let html = render_to_string(&Page {
            settings: &settings,
            groups: &groups,
            group: "All",
            stats: None,
            window: &window,
            resolution: Resolution::Hour,
            change_count: 0,
            not_found: &[],
        });

        assert!(html.contains("Zing stats for last 24 hours"));
        assert!(html.contains("No projects in this group"));
        assert!(!html.contains("Plotly.newPlot"));
    }
}
