use serde::{Deserialize, Serialize};

/// Lifecycle state of an import job.
///
/// The only legal transitions are `Pending -> Running`, `Running -> Completed`
/// and `Running -> Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<JobState> {
        match value {
            "pending" => Some(JobState::Pending),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "error" => Some(JobState::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Error)
        )
    }
}

/// Status surface returned by every job endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    pub total_rows: u64,
    pub rows_loaded: u64,
    /// Source rows consumed so far; the offset the next chunk must start at.
    pub next_offset: u64,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of one `process chunk` step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkOutcome {
    pub next_offset: u64,
    pub processed_in_chunk: u64,
    pub rejected_in_chunk: u64,
    pub done: bool,
    pub job: JobStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionSample {
    /// 1-based data row number in the source (header excluded).
    pub source_row: u64,
    pub reason: String,
}

/// Aggregate view of the rows a job dropped during normalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub job_id: String,
    pub rejected_rows: u64,
    pub sample: Vec<RejectionSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_are_legal() {
        assert!(JobState::Pending.can_transition_to(JobState::Running));
        assert!(JobState::Running.can_transition_to(JobState::Completed));
        assert!(JobState::Running.can_transition_to(JobState::Error));
        assert!(!JobState::Pending.can_transition_to(JobState::Completed));
        assert!(!JobState::Completed.can_transition_to(JobState::Error));
        assert!(!JobState::Error.can_transition_to(JobState::Running));
    }

    #[test]
    fn status_serializes_with_wire_names() {
        let status = JobStatus {
            job_id: "j1".to_string(),
            status: JobState::Running,
            total_rows: 5000,
            rows_loaded: 10,
            next_offset: 12,
            done: false,
            error_message: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["status"], "running");
        assert_eq!(json["totalRows"], 5000);
        assert_eq!(json["nextOffset"], 12);
        assert!(json.get("errorMessage").is_none());
    }
}
