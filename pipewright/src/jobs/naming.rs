//! Job-name derivation and validation.

use crate::context::RunToken;
use crate::errors::{PipelineError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Longest job name the backend accepts.
pub const MAX_JOB_NAME_LEN: usize = 63;

static JOB_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,62}$").expect("valid job name regex"));

/// Builds the job name for the `seq`-th job of a run.
#[must_use]
pub fn job_name(prefix: &str, token: &RunToken, seq: u32) -> String {
    format!("{prefix}-{token}-{seq}")
}

/// Checks a job name against the backend naming rules.
///
/// # Errors
///
/// Returns `InvalidConfig` if the name is empty, longer than
/// [`MAX_JOB_NAME_LEN`] or contains anything but ASCII alphanumerics and
/// inner hyphens.
pub fn validate_job_name(name: &str) -> Result<()> {
    if JOB_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(PipelineError::invalid_config(
            "job_name",
            format!("'{name}' must be 1-{MAX_JOB_NAME_LEN} alphanumerics or inner hyphens"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_format() {
        let token = RunToken::from_existing("17-19-35-02-3fa85f64");
        assert_eq!(job_name("XGBoost-training", &token, 2), "XGBoost-training-17-19-35-02-3fa85f64-2");
    }

    #[test]
    fn test_generated_names_are_valid() {
        let token = RunToken::generate();
        validate_job_name(&job_name("data-wrangler-flow-processing", &token, 1)).unwrap();
    }

    #[test]
    fn test_rejections() {
        assert!(validate_job_name("").is_err());
        assert!(validate_job_name("-leading").is_err());
        assert!(validate_job_name("trailing-").is_err());
        assert!(validate_job_name("under_score").is_err());
        assert!(validate_job_name(&"a".repeat(64)).is_err());
        assert!(validate_job_name(&"a".repeat(63)).is_ok());
    }
}
