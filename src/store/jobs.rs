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

//! Job ledger store.
//!
//! Two invariants are enforced here rather than in the orchestrator:
//! - every attempt is a brand-new row (`create` is the only way in; there
//!   is no attempts increment anywhere);
//! - a job with `completed_at` set is terminal, and any further update is
//!   rejected with an error.

use crate::db::{queries, DBClient};
use crate::models::{Job, JobCreate, JobStage, SYSTEM_IDENTITY};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Store for job ledger rows.
pub struct JobStore {
    db: Arc<DBClient>,
}

impl JobStore {
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Creates a fresh attempt row; returns the generated id.
    #[instrument(name = "job_create", skip(self, create), fields(discussion_id = %create.discussion_id))]
    pub async fn create(&self, create: JobCreate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create("job", &id, create).await
    }

    /// Loads a job by id.
    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        let query = format!("{} WHERE meta::id(id) = $id", queries::job::SELECT_BASE);
        let params = vec![("id".to_string(), serde_json::Value::String(id.to_string()))];
        let rows: Vec<Job> = self.db.query_with_params(&query, params).await?;
        Ok(rows.into_iter().next())
    }

    /// All attempts for a discussion, oldest first. "Attempt N of M" is
    /// reconstructed from this list.
    pub async fn list_for_discussion(&self, discussion_id: &str) -> Result<Vec<Job>> {
        let query = format!(
            "{} WHERE discussion_id = $discussion_id ORDER BY started_at ASC",
            queries::job::SELECT_BASE
        );
        let params = vec![(
            "discussion_id".to_string(),
            serde_json::Value::String(discussion_id.to_string()),
        )];
        self.db.query_with_params(&query, params).await
    }

    /// Number of attempts recorded for a discussion.
    pub async fn count_for_discussion(&self, discussion_id: &str) -> Result<usize> {
        Ok(self.list_for_discussion(discussion_id).await?.len())
    }

    /// Rejects updates to terminal jobs.
    async fn guard_not_terminal(&self, id: &str) -> Result<()> {
        match self.get(id).await? {
            None => bail!("Job {} not found", id),
            Some(job) if job.completed_at.is_some() => {
                bail!("Job {} is terminal ({}); updates rejected", id, job.status)
            }
            Some(_) => Ok(()),
        }
    }

    /// Advances the recorded stage of a running job.
    #[instrument(name = "job_set_stage", skip(self), fields(stage = %stage))]
    pub async fn set_stage(&self, id: &str, stage: JobStage) -> Result<()> {
        self.guard_not_terminal(id).await?;
        let query = format!(
            "UPDATE job:`{}` SET stage = $stage, status = 'processing', \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "stage".to_string(),
                        serde_json::Value::String(stage.to_string()),
                    ),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Merges per-output write errors into `metadata.errors`.
    pub async fn record_output_errors(&self, id: &str, errors: &[String]) -> Result<()> {
        self.guard_not_terminal(id).await?;
        let query = format!(
            "UPDATE job:`{}` SET metadata.errors = $errors, \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    ("errors".to_string(), serde_json::to_value(errors)?),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Finalizes the job as completed.
    #[instrument(name = "job_complete", skip(self, task_ids))]
    pub async fn complete(
        &self,
        id: &str,
        processing_time_ms: u64,
        task_ids: &[String],
    ) -> Result<()> {
        self.guard_not_terminal(id).await?;
        let query = format!(
            "UPDATE job:`{}` SET status = 'completed', completed_at = time::now(), \
             processing_time_ms = $elapsed, task_ids = $task_ids, \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "elapsed".to_string(),
                        serde_json::Value::Number(processing_time_ms.into()),
                    ),
                    ("task_ids".to_string(), serde_json::to_value(task_ids)?),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Finalizes the job as failed, capturing the error string and stack.
    #[instrument(name = "job_fail", skip(self, error, error_stack))]
    pub async fn fail(&self, id: &str, error: &str, error_stack: Option<&str>) -> Result<()> {
        self.guard_not_terminal(id).await?;
        let query = format!(
            "UPDATE job:`{}` SET status = 'failed', completed_at = time::now(), \
             error = $error, error_stack = $stack, \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "error".to_string(),
                        serde_json::Value::String(error.to_string()),
                    ),
                    (
                        "stack".to_string(),
                        match error_stack {
                            Some(s) => serde_json::Value::String(s.to_string()),
                            None => serde_json::Value::Null,
                        },
                    ),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }
}
