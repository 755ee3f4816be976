// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Job ledger entities.
//!
//! A job records exactly one processing attempt on a discussion. Retries
//! create a *new* job row; the `attempts` counter is per-job and stays at 0,
//! so the full attempt history survives and "attempt N of M" is
//! reconstructed by counting jobs grouped by `discussion_id`.
//!
//! Once `completed_at` is set the job is terminal and further updates are
//! rejected by the store layer.

use super::serde_utils::{deserialize_opt_thing_id, deserialize_thing_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Retrying => write!(f, "retrying"),
        }
    }
}

impl JobStatus {
    /// Terminal statuses reject further updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pipeline stage a job last reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Ingestion,
    ThreadBuilding,
    AiAnalysis,
    TaskCreation,
    Notification,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingestion => write!(f, "ingestion"),
            Self::ThreadBuilding => write!(f, "thread_building"),
            Self::AiAnalysis => write!(f, "ai_analysis"),
            Self::TaskCreation => write!(f, "task_creation"),
            Self::Notification => write!(f, "notification"),
        }
    }
}

/// Default maximum attempts recorded on every job. Informational: the
/// counter itself never increments (retries are new rows).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Ledger row for one processing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub tenant_id: String,
    pub discussion_id: String,

    /// Matched flow input id, or the legacy config id
    pub input_id: String,

    #[serde(default, deserialize_with = "deserialize_opt_thing_id")]
    pub flow_id: Option<String>,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(default)]
    pub stage: JobStage,

    /// Always 0 for a stored row; retries create new rows instead of
    /// incrementing
    #[serde(default)]
    pub attempts: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub error_stack: Option<String>,

    #[serde(default = "Utc::now")]
    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub processing_time_ms: Option<u64>,

    /// TaskRecord row ids created by this attempt, in creation order
    #[serde(default)]
    pub task_ids: Vec<String>,

    /// Free-form attempt metadata (`is_retry`, per-output errors, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Job creation payload.
///
/// `started_at` and audit timestamps are handled by database defaults.
#[derive(Debug, Clone, Serialize)]
pub struct JobCreate {
    pub tenant_id: String,
    pub discussion_id: String,
    pub input_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    pub status: String,
    pub stage: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub task_ids: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_by: String,
    pub updated_by: String,
}

impl JobCreate {
    /// Starts a fresh attempt ledger row in `processing`/`ingestion`.
    pub fn begin(
        tenant_id: String,
        discussion_id: String,
        input_id: String,
        flow_id: Option<String>,
        is_retry: bool,
    ) -> Self {
        Self {
            tenant_id,
            discussion_id,
            input_id,
            flow_id,
            status: JobStatus::Processing.to_string(),
            stage: JobStage::Ingestion.to_string(),
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            task_ids: Vec::new(),
            metadata: serde_json::json!({ "is_retry": is_retry }),
            created_by: crate::models::SYSTEM_IDENTITY.to_string(),
            updated_by: crate::models::SYSTEM_IDENTITY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_job_stage_display() {
        assert_eq!(JobStage::Ingestion.to_string(), "ingestion");
        assert_eq!(JobStage::ThreadBuilding.to_string(), "thread_building");
        assert_eq!(JobStage::AiAnalysis.to_string(), "ai_analysis");
        assert_eq!(JobStage::TaskCreation.to_string(), "task_creation");
        assert_eq!(JobStage::Notification.to_string(), "notification");
    }

    #[test]
    fn test_job_create_begin_fresh() {
        let create = JobCreate::begin(
            "t-1".to_string(),
            "d-1".to_string(),
            "in-1".to_string(),
            Some("f-1".to_string()),
            false,
        );
        assert_eq!(create.attempts, 0);
        assert_eq!(create.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(create.status, "processing");
        assert_eq!(create.stage, "ingestion");
        assert_eq!(create.metadata["is_retry"], false);
        assert_eq!(create.created_by, "system");
    }

    #[test]
    fn test_job_create_begin_retry_flag() {
        let create = JobCreate::begin(
            "t-1".to_string(),
            "d-1".to_string(),
            "in-1".to_string(),
            None,
            true,
        );
        // Retries still start at attempt 0: new row, full history preserved
        assert_eq!(create.attempts, 0);
        assert_eq!(create.metadata["is_retry"], true);
    }

    #[test]
    fn test_job_deserialize_defaults() {
        let json = serde_json::json!({
            "id": "job:j-1",
            "tenant_id": "t-1",
            "discussion_id": "d-1",
            "input_id": "in-1",
            "started_at": Utc::now(),
        });
        let job: Job = serde_json::from_value(json).unwrap();
        assert_eq!(job.id, "j-1");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.stage, JobStage::Ingestion);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.completed_at.is_none());
        assert!(job.task_ids.is_empty());
    }
}
