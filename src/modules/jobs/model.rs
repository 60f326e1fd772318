use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_PERCENT: u8 = 100;

/// Highest percent a running job can report. 100 is reserved for `completed`.
pub const MAX_RUNNING_PERCENT: u8 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    /// Anything else found in the store, passed through untouched.
    Other(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Other(raw) => raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl From<&str> for JobState {
    fn from(value: &str) -> Self {
        match value {
            "queued" => JobState::Queued,
            "running" => JobState::Running,
            "completed" => JobState::Completed,
            "failed" => JobState::Failed,
            other => JobState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status record, stored as `state` or `state:percent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub state: JobState,
    pub percent: Option<u8>,
}

impl JobStatus {
    /// Builds a status with `percent` clamped to `[0, 100]`.
    pub fn new(state: JobState, percent: i64) -> Self {
        Self {
            state,
            percent: Some(clamp_percent(percent, MAX_PERCENT)),
        }
    }

    pub fn queued() -> Self {
        Self::new(JobState::Queued, 0)
    }

    pub fn running(percent: i64) -> Self {
        Self::new(JobState::Running, percent)
    }

    pub fn completed() -> Self {
        Self::new(JobState::Completed, i64::from(MAX_PERCENT))
    }

    pub fn failed(percent: i64) -> Self {
        Self::new(JobState::Failed, percent)
    }

    pub fn encode(&self) -> String {
        match self.percent {
            Some(percent) => format!("{}:{}", self.state, percent),
            None => self.state.to_string(),
        }
    }

    /// Never fails. Only a canonical percent in `[0, 100]` is split off; any
    /// other suffix makes the whole value an opaque state without a percent,
    /// so decoding then encoding gives back the stored bytes.
    pub fn decode(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((state, suffix)) => match parse_percent(suffix) {
                Some(percent) => Self {
                    state: JobState::from(state),
                    percent: Some(percent),
                },
                None => Self {
                    state: JobState::Other(raw.to_string()),
                    percent: None,
                },
            },
            None => Self {
                state: JobState::from(raw),
                percent: None,
            },
        }
    }
}

/// `"7"` but not `"007"`, `"+7"` or `"150"`.
fn parse_percent(suffix: &str) -> Option<u8> {
    let percent: u8 = suffix.parse().ok()?;
    (percent <= MAX_PERCENT && percent.to_string() == suffix).then_some(percent)
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

pub fn clamp_percent(percent: i64, upper: u8) -> u8 {
    percent.clamp(0, i64::from(upper)) as u8
}

/// What travels through the queue. Field names are part of the wire format
/// shared with workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_by: Option<String>,
}
