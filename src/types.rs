use std::str::FromStr;
use serde::Deserialize;

/// What a steady-state pass does when one repository fails unrecoverably.
///
/// - `Isolate`: report the error and keep checking the remaining repositories
///   (default behaviour).
/// - `FailFast`: report the error and skip the rest of the pass; the skipped
///   repositories are checked again on the next tick.
///
/// The initial pass always fails fast regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Isolate,
    FailFast,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "isolate" => Ok(FailurePolicy::Isolate),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"isolate\" or \"fail_fast\")"
            )),
        }
    }
}

/// What to do with a local copy that can no longer be pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Delete the local copy and clone it again (default).
    #[default]
    Reclone,
    /// Leave the local copy alone and surface the pull error.
    None,
}

impl FromStr for RecoveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reclone" => Ok(RecoveryPolicy::Reclone),
            "none" => Ok(RecoveryPolicy::None),
            other => Err(format!(
                "invalid recovery: {other} (expected \"reclone\" or \"none\")"
            )),
        }
    }
}
