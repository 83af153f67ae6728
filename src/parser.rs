//! Extraction of CI run data from review comments.
//!
//! The patterns match the comment format Zuul posts back to Gerrit changes
//! and GitHub pull requests:
//!
//! ```text
//! Patch Set 1: Verified+1
//!
//! Build succeeded
//!
//! - https://ci.example.net/jenkins/job/test-check/6/ : SUCCESS in 7s
//! - http://logs.example.net/check/foo/1/2/foo-lint : FAILURE in 2m 38s (non-voting)
//! ```
//!
//! Any other CI system needs its own patterns.

use std::sync::LazyLock;

use log::debug;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZingStatsError};

static GERRIT_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\APatch Set (?P<num>\d+): Verified(?P<v_score>\S+)\s+Build (?P<status>\S+)\s+(?P<jobs>.+)",
    )
    .expect("gerrit CI run pattern is valid")
});

static PR_RUN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\ABuild (?P<status>\S+)\s+(?P<jobs>.+)").expect("PR CI run pattern is valid")
});

// Jenkins style: - https://host/jenkins/job/<name>/<build>/ : SUCCESS in 1h 2m 3s
static JOB_V1_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?mR)^- (?P<proto>.+)?://(?P<path>.+)?/job/(?P<name>\S+)/\d+/ : (?P<result>\S+)",
        r"(?: in (?P<time_h>\d+h )?(?P<time_m>\d+m )?(?P<time_s>\d+s))?",
        r"(?P<non_voting> \(non-voting\))?(?P<rest>.*)$",
    ))
    .expect("v1 CI job pattern is valid")
});

// Log server style: - http://logs/<pipeline>/<project>/<change>/<run>/<name> : SUCCESS in 4s
static JOB_V2_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?mR)^- (?P<proto>.+)?://(?P<path>.+)?/(?P<name>\D+) : (?P<result>\S+)",
        r"(?: in (?P<time_h>\d+h )?(?P<time_m>\d+m )?(?P<time_s>\d+s))?",
        r"(?P<non_voting> \(non-voting\))?(?P<rest>.*)$",
    ))
    .expect("v2 CI job pattern is valid")
});

static PROMOTION_SUCCESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:Patch Set \d+:\n\n)?Promotion review .+ has brought into alpha channel")
        .expect("promotion success pattern is valid")
});

static PROMOTION_FAILURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\A(?:Patch Set \d+:\n\n)?PROMOTION FAILURE\n\n",
        r"Promotion of artifacts from this change into Alpha channel has failed",
    ))
    .expect("promotion failure pattern is valid")
});

/// Overall outcome reported on the `Build ...` line of a CI comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Other,
}

impl RunStatus {
    /// Normalises e.g. `succeeded`, `Successful.` or `OK!` before matching.
    pub fn from_status(raw: &str) -> Self {
        let normalised: String = raw
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();

        match normalised.as_str() {
            "succeeded" | "successful" | "ok" => Self::Success,
            "failed" => Self::Failure,
            _ => Self::Other,
        }
    }
}

/// Result of a single CI job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobResult {
    Pass,
    Fail,
    Other(String),
}

impl JobResult {
    pub fn from_result(raw: &str) -> Self {
        match raw {
            "SUCCESS" => Self::Pass,
            "FAILURE" | "ERROR" | "TIMED_OUT" | "POST_FAILURE" | "RETRY_LIMIT"
            | "NODE_FAILURE" => Self::Fail,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One named check reported in a CI comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiJob {
    pub name: String,
    pub result: JobResult,
    /// Total job time in seconds, when the comment carries it
    pub duration_secs: Option<u64>,
    pub non_voting: bool,
}

/// The parsed body of a CI comment, not yet tied to a revision or timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiComment {
    /// Patch set number from a Gerrit comment header
    pub patch_set: Option<u32>,
    /// Verified vote from a Gerrit comment header, e.g. `+1` or `-2`
    pub verified: Option<String>,
    /// Status word as written, e.g. `succeeded`
    pub status_text: String,
    pub status: RunStatus,
    pub jobs: Vec<CiJob>,
}

/// Parses a Gerrit change message. `Ok(None)` when it is not a CI comment.
pub fn parse_gerrit_ci_comment(text: &str) -> Result<Option<CiComment>> {
    parse_ci_comment(text, &GERRIT_RUN_RE)
}

/// Parses a GitHub pull request comment body. `Ok(None)` when it is not a CI comment.
pub fn parse_pr_ci_comment(text: &str) -> Result<Option<CiComment>> {
    parse_ci_comment(text, &PR_RUN_RE)
}

fn parse_ci_comment(text: &str, run_re: &Regex) -> Result<Option<CiComment>> {
    let Some(run) = run_re.captures(text) else {
        return Ok(None);
    };
    debug!("Parsing CI comment: {text}");

    let jobs_text = run.name("jobs").map_or("", |m| m.as_str());
    let jobs = JOB_V1_RE
        .captures_iter(jobs_text)
        .chain(JOB_V2_RE.captures_iter(jobs_text))
        .map(|caps| parse_job(&caps))
        .collect::<Result<Vec<_>>>()?;

    let status_text = run
        .name("status")
        .map_or_else(String::new, |m| m.as_str().to_string());

    Ok(Some(CiComment {
        patch_set: run.name("num").and_then(|m| m.as_str().parse().ok()),
        verified: run.name("v_score").map(|m| m.as_str().to_string()),
        status: RunStatus::from_status(&status_text),
        status_text,
        jobs,
    }))
}

fn parse_job(caps: &Captures<'_>) -> Result<CiJob> {
    let rest = caps.name("rest").map_or("", |m| m.as_str());
    if !rest.is_empty() {
        return Err(ZingStatsError::UnexpectedJobContent(rest.to_string()));
    }

    let duration_secs = caps.name("time_s").map(|_| {
        [("time_h", 'h', 3600), ("time_m", 'm', 60), ("time_s", 's', 1)]
            .iter()
            .filter_map(|(group, unit, factor)| {
                caps.name(group)
                    .and_then(|m| m.as_str().trim().trim_end_matches(*unit).parse::<u64>().ok())
                    .map(|value| value * factor)
            })
            .sum()
    });

    Ok(CiJob {
        name: caps["name"].to_string(),
        result: JobResult::from_result(&caps["result"]),
        duration_secs,
        non_voting: caps.name("non_voting").is_some(),
    })
}

/// Artifacts from the change were promoted into the alpha channel.
pub fn is_promotion_success(text: &str) -> bool {
    PROMOTION_SUCCESS_RE.is_match(text)
}

/// Promotion of the change's artifacts into the alpha channel failed.
pub fn is_promotion_failure(text: &str) -> bool {
    PROMOTION_FAILURE_RE.is_match(text)
}

pub fn is_recheck(text: &str) -> bool {
    text.to_lowercase().contains("recheck")
}

/// Only true when the text is not already a recheck.
pub fn is_reverify(text: &str) -> bool {
    let lower = text.to_lowercase();
    !lower.contains("recheck") && lower.contains("reverify")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gerrit_non_ci_messages() {
        assert_eq!(parse_gerrit_ci_comment("Uploaded patch set 1.").unwrap(), None);
        assert_eq!(
            parse_gerrit_ci_comment("Patch Set 1:\n\nStarting check jobs.").unwrap(),
            None
        );
    }

    #[test]
    fn test_gerrit_ci_comment() {
        let text = "Patch Set 1: Verified+1\n\nBuild succeeded\n\n- https://zing.example.net/jenkins/job/test-check/6/ : SUCCESS in 7s";
        let run = parse_gerrit_ci_comment(text).unwrap().unwrap();

        assert_eq!(run.patch_set, Some(1));
        assert_eq!(run.status_text, "succeeded");
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.verified.as_deref(), Some("+1"));
        assert_eq!(run.jobs.len(), 1);
        assert_eq!(run.jobs[0].name, "test-check");
        assert_eq!(run.jobs[0].result, JobResult::Pass);
        assert_eq!(run.jobs[0].duration_secs, Some(7));
        assert!(!run.jobs[0].non_voting);
    }

    #[test]
    fn test_gerrit_failed_run_with_hours() {
        let text = "Patch Set 3: Verified-1\n\nBuild failed.\n\n\
            - https://ci.example.net/jenkins/job/unit/12/ : FAILURE in 1h 2m 3s\n\
            - https://ci.example.net/jenkins/job/lint/13/ : SUCCESS in 45s (non-voting)\n";
        let run = parse_gerrit_ci_comment(text).unwrap().unwrap();

        assert_eq!(run.patch_set, Some(3));
        assert_eq!(run.verified.as_deref(), Some("-1"));
        assert_eq!(run.status, RunStatus::Failure);
        assert_eq!(run.jobs.len(), 2);
        assert_eq!(run.jobs[0].result, JobResult::Fail);
        assert_eq!(run.jobs[0].duration_secs, Some(3723));
        assert_eq!(run.jobs[1].name, "lint");
        assert!(run.jobs[1].non_voting);
    }

    #[test]
    fn test_pr_non_ci_comment() {
        assert_eq!(
            parse_pr_ci_comment("@aaaa @bbbb @ccccc xxxxxxxx").unwrap(),
            None
        );
    }

    #[test]
    fn test_pr_ci_comment() {
        let body = "Build succeeded\n\n\
            - http://logs.example.net/check-github/foo/api/111153/151255557209.72/foo-example-check : SUCCESS in 2m 38s\n\
            - http://logs.example.net/check-github/foo/api/111153/151112557209.72/foo-sec-scan : SUCCESS in 4s (non-voting)\n\
            - http://logs.example.net/check-github/foo/api/122153/151332557209.72/another-scan : SUCCESS in 4s (non-voting)\n";
        let run = parse_pr_ci_comment(body).unwrap().unwrap();

        assert_eq!(run.patch_set, None);
        assert_eq!(run.verified, None);
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.jobs.len(), 3);
        assert_eq!(run.jobs[0].name, "foo-example-check");
        assert_eq!(run.jobs[0].duration_secs, Some(158));
        assert!(!run.jobs[0].non_voting);
        assert_eq!(run.jobs[1].name, "foo-sec-scan");
        assert!(run.jobs[1].non_voting);
        assert_eq!(run.jobs[2].name, "another-scan");
        assert!(run.jobs[2].non_voting);
    }

    #[test]
    fn test_job_without_duration() {
        let body = "Build failed\n\n- http://logs.example.net/check/foo/1/2/foo-unit : TIMED_OUT\n";
        let run = parse_pr_ci_comment(body).unwrap().unwrap();

        assert_eq!(run.jobs.len(), 1);
        assert_eq!(run.jobs[0].result, JobResult::Fail);
        assert_eq!(run.jobs[0].duration_secs, None);
    }

    #[test]
    fn test_unexpected_job_content_is_an_error() {
        let body = "Build succeeded\n\n- http://logs.example.net/check/foo/1/2/foo-unit : SUCCESS in 4s and then some\n";
        let err = parse_pr_ci_comment(body).unwrap_err();
        assert!(matches!(err, ZingStatsError::UnexpectedJobContent(ref rest) if rest == " and then some"));
    }

    #[test]
    fn test_crlf_job_lines() {
        let body = "Build succeeded\r\n\r\n- http://logs.example.net/check/foo/1/2/foo-unit : SUCCESS in 4s\r\n";
        let run = parse_pr_ci_comment(body).unwrap().unwrap();
        assert_eq!(run.jobs.len(), 1);
        assert_eq!(run.jobs[0].duration_secs, Some(4));
    }

    #[test]
    fn test_run_status_normalisation() {
        assert_eq!(RunStatus::from_status("succeeded"), RunStatus::Success);
        assert_eq!(RunStatus::from_status("Successful."), RunStatus::Success);
        assert_eq!(RunStatus::from_status("OK"), RunStatus::Success);
        assert_eq!(RunStatus::from_status("failed."), RunStatus::Failure);
        assert_eq!(RunStatus::from_status("aborted"), RunStatus::Other);
    }

    #[test]
    fn test_job_result_mapping() {
        assert_eq!(JobResult::from_result("SUCCESS"), JobResult::Pass);
        assert_eq!(JobResult::from_result("POST_FAILURE"), JobResult::Fail);
        assert_eq!(
            JobResult::from_result("SKIPPED"),
            JobResult::Other("SKIPPED".to_string())
        );
    }

    #[test]
    fn test_promotion_success() {
        let pass = "Patch Set 1:\n\nPromotion review https://review.example.net/1234 has brought into alpha channel following artifacts that contain code from this change:\n - Docker image foo/blah";
        assert!(is_promotion_success(pass));
        assert!(!is_promotion_success("test test test"));
    }

    #[test]
    fn test_promotion_failure() {
        let fail = "Patch Set 1:\n\nPROMOTION FAILURE\n\nPromotion of artifacts from this change into Alpha channel has failed and will require action to resolve.\n\nPromotion Review: https://review.example.net/1234";
        assert!(is_promotion_failure(fail));
        assert!(!is_promotion_failure("test test test"));
    }

    #[test]
    fn test_recheck_wins_over_reverify() {
        assert!(is_recheck("Patch Set 2:\n\nRECHECK"));
        assert!(!is_reverify("recheck, reverify"));
        assert!(is_reverify("Patch Set 2:\n\nreverify"));
    }
}
