use std::str::FromStr;
use serde::Deserialize;

/// What the scheduler does when a task fails.
///
/// - `Continue`: record the failure and keep going, including later levels
///   (default behaviour).
/// - `Abort`: stop at the first failure. Tasks not yet started are never
///   dispatched and later levels never start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Continue,
    Abort,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Continue
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!(
                "invalid policy: {other} (expected \"continue\" or \"abort\")"
            )),
        }
    }
}

/// What happens to tasks that are already running when a run aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Let them finish and record their real outcome.
    Wait,
    /// Kill them; they are recorded as failed (`TaskFailure::Terminated`).
    Kill,
}

impl Default for InFlightPolicy {
    fn default() -> Self {
        InFlightPolicy::Wait
    }
}

impl FromStr for InFlightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wait" => Ok(InFlightPolicy::Wait),
            "kill" => Ok(InFlightPolicy::Kill),
            other => Err(format!(
                "invalid in_flight behaviour: {other} (expected \"wait\" or \"kill\")"
            )),
        }
    }
}
