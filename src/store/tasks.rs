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

//! Task record store: the created-task index.
//!
//! `dest_page_id` carries a unique index, which is what makes the
//! completion-callback reverse lookup ("page X marked Done" → which thread
//! to notify) a single query.

use crate::db::{queries, DBClient};
use crate::models::{Discussion, SourceType, TaskRecord, TaskRecordCreate};
use anyhow::Result;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Origin of an externally created task page, for completion callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOrigin {
    pub discussion_id: String,
    pub source_type: SourceType,
    pub source_thread_id: String,
}

/// Store for task record rows.
pub struct TaskRecordStore {
    db: Arc<DBClient>,
}

impl TaskRecordStore {
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Inserts all records of one stage-5 pass; returns row ids in input
    /// order.
    #[instrument(name = "task_record_insert_many", skip(self, creates), fields(count = creates.len()))]
    pub async fn insert_many(&self, creates: Vec<TaskRecordCreate>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(creates.len());
        for create in creates {
            let id = Uuid::new_v4().to_string();
            self.db.create("task_record", &id, create).await?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// All records for a discussion, oldest first.
    pub async fn list_for_discussion(&self, discussion_id: &str) -> Result<Vec<TaskRecord>> {
        let query = format!(
            "{} WHERE discussion_id = $discussion_id ORDER BY created_at ASC",
            queries::task_record::SELECT_BASE
        );
        let params = vec![(
            "discussion_id".to_string(),
            serde_json::Value::String(discussion_id.to_string()),
        )];
        self.db.query_with_params(&query, params).await
    }

    /// Reverse lookup for completion callbacks: maps an external page id
    /// back to the originating thread.
    #[instrument(name = "task_record_find_origin", skip(self))]
    pub async fn find_origin_by_dest_page(&self, dest_page_id: &str) -> Result<Option<TaskOrigin>> {
        let query = format!(
            "{} WHERE dest_page_id = $page_id",
            queries::task_record::SELECT_BASE
        );
        let params = vec![(
            "page_id".to_string(),
            serde_json::Value::String(dest_page_id.to_string()),
        )];
        let records: Vec<TaskRecord> = self.db.query_with_params(&query, params).await?;

        let Some(record) = records.into_iter().next() else {
            return Ok(None);
        };

        let query = format!(
            "{} WHERE meta::id(id) = $id",
            queries::discussion::SELECT_BASE
        );
        let params = vec![(
            "id".to_string(),
            serde_json::Value::String(record.discussion_id.clone()),
        )];
        let discussions: Vec<Discussion> = self.db.query_with_params(&query, params).await?;

        Ok(discussions.into_iter().next().map(|d| TaskOrigin {
            discussion_id: d.id,
            source_type: d.source_type,
            source_thread_id: d.source_thread_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SYSTEM_IDENTITY;
    use tempfile::tempdir;

    async fn test_store() -> (tempfile::TempDir, Arc<DBClient>, TaskRecordStore) {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("task_store_db");
        let db = Arc::new(DBClient::new(path.to_str().unwrap()).await.unwrap());
        db.initialize_schema().await.unwrap();
        (temp, db.clone(), TaskRecordStore::new(db))
    }

    fn record(discussion_id: &str, page_id: &str, index: Option<u32>) -> TaskRecordCreate {
        TaskRecordCreate {
            tenant_id: "t-1".to_string(),
            discussion_id: discussion_id.to_string(),
            job_id: "j-1".to_string(),
            dest_page_id: page_id.to_string(),
            dest_page_url: format!("https://kb.example.com/{}", page_id),
            title: "Fix export".to_string(),
            description: None,
            priority: Some("high".to_string()),
            assignee: None,
            source_url: "https://chat.example.com/archives/C01/p1".to_string(),
            is_multi_task_child: index.is_some(),
            task_index: index,
            metadata: serde_json::json!({}),
            created_by: SYSTEM_IDENTITY.to_string(),
            updated_by: SYSTEM_IDENTITY.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_many_preserves_order() {
        let (_temp, _db, store) = test_store().await;
        let ids = store
            .insert_many(vec![
                record("d-1", "page-1", Some(0)),
                record("d-1", "page-2", Some(1)),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let records = store.list_for_discussion("d-1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].task_index, Some(0));
        assert_eq!(records[1].task_index, Some(1));
    }

    #[tokio::test]
    async fn test_duplicate_dest_page_rejected() {
        let (_temp, _db, store) = test_store().await;
        store
            .insert_many(vec![record("d-1", "page-1", None)])
            .await
            .unwrap();

        // dest_page_id uniquely identifies the external artifact
        let result = store.insert_many(vec![record("d-2", "page-1", None)]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_find_origin_by_dest_page() {
        let (_temp, db, store) = test_store().await;

        let discussion = serde_json::json!({
            "tenant_id": "t-1",
            "source_type": "chat",
            "source_thread_id": "C01:1700000000.000100",
            "source_url": "https://chat.example.com/archives/C01/p1",
            "input_id": "in-1",
            "title": "Broken export",
            "content": "The export button is broken",
            "author_handle": "U1",
            "status": "completed",
            "metadata": {},
            "created_by": "system",
            "updated_by": "system",
        });
        db.create("discussion", "d-orig", discussion).await.unwrap();

        store
            .insert_many(vec![record("d-orig", "page-9", None)])
            .await
            .unwrap();

        let origin = store
            .find_origin_by_dest_page("page-9")
            .await
            .unwrap()
            .expect("origin should resolve");
        assert_eq!(origin.discussion_id, "d-orig");
        assert_eq!(origin.source_type, SourceType::Chat);
        assert_eq!(origin.source_thread_id, "C01:1700000000.000100");

        assert!(store
            .find_origin_by_dest_page("page-unknown")
            .await
            .unwrap()
            .is_none());
    }
}
