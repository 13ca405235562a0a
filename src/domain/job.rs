//! Job domain types and the lifecycle state machine (spec §3 Job, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Import,
    Sampling,
    SqlTransform,
    Exploration,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Import => "import",
            RunType::Sampling => "sampling",
            RunType::SqlTransform => "sql_transform",
            RunType::Exploration => "exploration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Validates a transition against spec §3/§4.7's state machine:
    /// `pending -> running -> {completed|failed}` or
    /// `{pending|running} -> cancelled`. No other transitions are legal.
    pub fn validate_transition(self, next: JobStatus) -> CoreResult<()> {
        use JobStatus::*;
        let allowed = matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Cancelled)
                | (Running, Cancelled)
        );
        if allowed {
            Ok(())
        } else {
            Err(CoreError::business_rule(
                "job_status_transition",
                format!("cannot transition job from {self:?} to {next:?}"),
            ))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub run_type: RunType,
    pub status: JobStatus,
    pub dataset_id: i64,
    pub user_id: i64,
    pub source_commit_id: Option<String>,
    pub run_parameters: Value,
    pub output_summary: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One round of a sampling job (spec §4.10 `RoundSpec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SamplingMethod {
    Random {
        sample_size: usize,
        random_seed: Option<u64>,
    },
    Stratified {
        strata_columns: Vec<String>,
        sample_size: Option<usize>,
        samples_per_stratum: Option<usize>,
        random_seed: Option<u64>,
    },
    Systematic {
        interval: u64,
        start: Option<u64>,
    },
    Cluster {
        cluster_column: String,
        num_clusters: usize,
        random_seed: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RowFilter {
    /// Column equality filters applied before sampling, e.g. `{"grp": "X"}`.
    #[serde(default)]
    pub equals: std::collections::BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSpec {
    #[serde(flatten)]
    pub method: SamplingMethod,
    #[serde(default)]
    pub filters: Option<RowFilter>,
}

impl SamplingMethod {
    /// Validates the mutual-exclusion / required-field rules from spec
    /// §4.10 independent of row data (e.g. stratified's `sample_size` xor
    /// `samples_per_stratum`).
    pub fn validate(&self) -> CoreResult<()> {
        match self {
            SamplingMethod::Random { sample_size, .. } => {
                if *sample_size == 0 {
                    return Err(CoreError::validation("sample_size", "must be > 0"));
                }
            }
            SamplingMethod::Stratified {
                strata_columns,
                sample_size,
                samples_per_stratum,
                ..
            } => {
                if strata_columns.is_empty() {
                    return Err(CoreError::validation("strata_columns", "must not be empty"));
                }
                match (sample_size, samples_per_stratum) {
                    (Some(_), Some(_)) => {
                        return Err(CoreError::validation(
                            "stratified_sampling",
                            "sample_size and samples_per_stratum are mutually exclusive",
                        ));
                    }
                    (None, None) => {
                        return Err(CoreError::validation(
                            "stratified_sampling",
                            "one of sample_size or samples_per_stratum is required",
                        ));
                    }
                    _ => {}
                }
            }
            SamplingMethod::Systematic { interval, .. } => {
                if *interval == 0 {
                    return Err(CoreError::validation("interval", "must be a positive integer"));
                }
            }
            SamplingMethod::Cluster { num_clusters, .. } => {
                if *num_clusters == 0 {
                    return Err(CoreError::validation("num_clusters", "must be > 0"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_running_is_legal() {
        assert!(JobStatus::Pending.validate_transition(JobStatus::Running).is_ok());
    }

    #[test]
    fn completed_to_anything_is_illegal() {
        assert!(JobStatus::Completed.validate_transition(JobStatus::Running).is_err());
        assert!(JobStatus::Completed.validate_transition(JobStatus::Cancelled).is_err());
    }

    #[test]
    fn pending_can_cancel_directly() {
        assert!(JobStatus::Pending.validate_transition(JobStatus::Cancelled).is_ok());
    }

    #[test]
    fn running_cannot_return_to_pending() {
        assert!(JobStatus::Running.validate_transition(JobStatus::Pending).is_err());
    }

    #[test]
    fn stratified_rejects_both_size_fields() {
        let m = SamplingMethod::Stratified {
            strata_columns: vec!["grp".into()],
            sample_size: Some(10),
            samples_per_stratum: Some(1),
            random_seed: None,
        };
        assert!(m.validate().is_err());
    }

    #[test]
    fn stratified_rejects_neither_size_field() {
        let m = SamplingMethod::Stratified {
            strata_columns: vec!["grp".into()],
            sample_size: None,
            samples_per_stratum: None,
            random_seed: None,
        };
        assert!(m.validate().is_err());
    }
}
