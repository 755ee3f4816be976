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

//! Discussion store: single-row mutations for each pipeline stage.
//!
//! Every mutation stamps `updated_at`/`updated_by`; all writes are single
//! row upserts, no multi-row transactions.

use crate::db::{queries, scrub_payload, DBClient};
use crate::models::{
    Discussion, DiscussionCreate, DiscussionStatus, TaskDetection, Thread, ThreadSummary,
    SYSTEM_IDENTITY,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Store for discussion rows.
pub struct DiscussionStore {
    db: Arc<DBClient>,
}

impl DiscussionStore {
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Creates the discussion row (stage 2); returns the generated id.
    /// The raw webhook payload travels inside the row, so the client's
    /// insert-time scrub covers it.
    #[instrument(name = "discussion_create", skip(self, create), fields(tenant_id = %create.tenant_id))]
    pub async fn create(&self, create: DiscussionCreate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create("discussion", &id, create).await
    }

    /// Finds discussions by upstream thread identity, newest first.
    /// Identical webhooks produce multiple rows; no dedup at this layer.
    pub async fn find_by_thread(
        &self,
        source_type: crate::models::SourceType,
        source_thread_id: &str,
    ) -> Result<Vec<Discussion>> {
        let query = format!(
            "{} WHERE source_type = $source_type AND source_thread_id = $thread_id \
             ORDER BY created_at DESC",
            queries::discussion::SELECT_BASE
        );
        let params = vec![
            (
                "source_type".to_string(),
                serde_json::Value::String(source_type.to_string()),
            ),
            (
                "thread_id".to_string(),
                serde_json::Value::String(source_thread_id.to_string()),
            ),
        ];
        self.db.query_with_params(&query, params).await
    }

    /// Loads a discussion by id.
    pub async fn get(&self, id: &str) -> Result<Option<Discussion>> {
        let query = format!(
            "{} WHERE meta::id(id) = $id",
            queries::discussion::SELECT_BASE
        );
        let params = vec![("id".to_string(), serde_json::Value::String(id.to_string()))];
        let rows: Vec<Discussion> = self.db.query_with_params(&query, params).await?;
        Ok(rows.into_iter().next())
    }

    /// Sets the lifecycle status.
    #[instrument(name = "discussion_set_status", skip(self), fields(status = %status))]
    pub async fn set_status(&self, id: &str, status: DiscussionStatus) -> Result<()> {
        let query = format!(
            "UPDATE discussion:`{}` SET status = $status, updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "status".to_string(),
                        serde_json::Value::String(status.to_string()),
                    ),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Links the discussion to its most recent processing job.
    pub async fn link_job(&self, id: &str, job_id: &str) -> Result<()> {
        let query = format!(
            "UPDATE discussion:`{}` SET sync_job_id = $job_id, updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "job_id".to_string(),
                        serde_json::Value::String(job_id.to_string()),
                    ),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Applies the built thread (stage 3): canonical identifiers, author,
    /// participants, and the raw thread snapshot for later retries.
    #[instrument(name = "discussion_apply_thread", skip(self, thread))]
    pub async fn apply_thread(&self, id: &str, thread: &Thread) -> Result<()> {
        let author = thread
            .root
            .author_handle
            .clone()
            .unwrap_or_else(|| thread.root.author_id.clone());
        // Fetched thread content goes through an UPDATE bind, which does
        // not pass the insert-time scrub
        let snapshot = scrub_payload(serde_json::to_value(thread)?);

        let query = format!(
            "UPDATE discussion:`{}` SET \
             source_thread_id = $thread_id, \
             source_url = $source_url, \
             author_handle = $author, \
             participants = $participants, \
             thread_data = $thread_data, \
             status = 'processing', \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "thread_id".to_string(),
                        serde_json::Value::String(thread.source_thread_id.clone()),
                    ),
                    (
                        "source_url".to_string(),
                        serde_json::Value::String(thread.source_url.clone()),
                    ),
                    ("author".to_string(), serde_json::Value::String(author)),
                    (
                        "participants".to_string(),
                        serde_json::to_value(&thread.participants)?,
                    ),
                    ("thread_data".to_string(), snapshot),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Persists the analysis output (stage 4) and flips status to
    /// `analyzed`.
    #[instrument(name = "discussion_set_analysis", skip(self, summary, detection))]
    pub async fn set_analysis(
        &self,
        id: &str,
        summary: &ThreadSummary,
        detection: &TaskDetection,
    ) -> Result<()> {
        let query = format!(
            "UPDATE discussion:`{}` SET \
             ai_summary = $summary, \
             ai_key_points = $key_points, \
             ai_tasks = $tasks, \
             status = 'analyzed', \
             updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    (
                        "summary".to_string(),
                        serde_json::Value::String(summary.text.clone()),
                    ),
                    (
                        "key_points".to_string(),
                        serde_json::to_value(&summary.key_points)?,
                    ),
                    (
                        "tasks".to_string(),
                        scrub_payload(serde_json::to_value(detection)?),
                    ),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Stores the collected TaskRecord row ids (stage 5, single update).
    pub async fn set_task_record_ids(&self, id: &str, record_ids: &[String]) -> Result<()> {
        let query = format!(
            "UPDATE discussion:`{}` SET notion_task_ids = $ids, updated_at = time::now(), updated_by = $by",
            id
        );
        self.db
            .execute_with_params(
                &query,
                vec![
                    ("ids".to_string(), serde_json::to_value(record_ids)?),
                    (
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }

    /// Terminal failure: status + error recorded under `metadata.error`.
    #[instrument(name = "discussion_mark_failed", skip(self, error))]
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        let query = format!(
            "UPDATE discussion:`{}` SET status = 'failed', metadata.error = $error, \
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
                        "by".to_string(),
                        serde_json::Value::String(SYSTEM_IDENTITY.to_string()),
                    ),
                ],
            )
            .await
    }
}
