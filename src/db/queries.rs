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

//! # Centralized Query Constants
//!
//! SQL query templates for SurrealDB to eliminate duplication and ensure
//! consistent field selection across store modules.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::db::queries::discussion;
//!
//! let query = format!("{} WHERE meta::id(id) = $id", discussion::SELECT_BASE);
//! ```

/// Discussion query constants.
pub mod discussion {
    /// Base SELECT fields for discussion lookups.
    /// Use with `format!("{} WHERE meta::id(id) = $id", SELECT_BASE)`.
    pub const SELECT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        tenant_id,
        source_type,
        source_thread_id,
        source_url,
        flow_id,
        input_id,
        title,
        content,
        author_handle,
        participants,
        status,
        thread_data,
        ai_summary,
        ai_key_points,
        ai_tasks,
        notion_task_ids,
        sync_job_id,
        raw_payload,
        metadata,
        created_at,
        updated_at
    FROM discussion"#;
}

/// Job ledger query constants.
pub mod job {
    /// Base SELECT fields for job lookups.
    pub const SELECT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        tenant_id,
        discussion_id,
        input_id,
        flow_id,
        status,
        stage,
        attempts,
        max_attempts,
        error,
        error_stack,
        started_at,
        completed_at,
        processing_time_ms,
        task_ids,
        metadata
    FROM job"#;
}

/// Flow configuration query constants.
pub mod flow {
    /// Base SELECT fields for flow lookups.
    pub const SELECT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        tenant_id,
        name,
        description,
        available_domains,
        ai_enabled,
        summary_prompt_template,
        task_prompt_template,
        active,
        created_at,
        updated_at
    FROM flow"#;

    /// Base SELECT fields for flow input lookups.
    pub const SELECT_INPUT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        flow_id,
        tenant_id,
        source_type,
        api_token,
        source_metadata,
        email_slug,
        active,
        created_at,
        updated_at
    FROM flow_input"#;

    /// Base SELECT fields for flow output lookups.
    pub const SELECT_OUTPUT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        flow_id,
        tenant_id,
        output_type,
        name,
        domain_filter,
        is_default,
        output_config,
        active,
        created_at,
        updated_at
    FROM flow_output"#;

    /// Tables that have a flow_id foreign key and need cascade delete.
    pub const CASCADE_DELETE_TABLES: &[&str] = &["flow_input", "flow_output"];
}

/// Task record query constants.
pub mod task_record {
    /// Base SELECT fields for task record lookups.
    pub const SELECT_BASE: &str = r#"SELECT
        meta::id(id) AS id,
        tenant_id,
        discussion_id,
        job_id,
        dest_page_id,
        dest_page_url,
        title,
        description,
        priority,
        assignee,
        source_url,
        is_multi_task_child,
        task_index,
        metadata,
        created_at
    FROM task_record"#;
}

/// Cascade delete helpers for flow removal.
pub mod cascade {
    use crate::db::DBClient;
    use std::sync::Arc;
    use tracing::{info, warn};

    /// Deletes all records from a table that reference the given flow_id.
    ///
    /// Logs success or failure but does not propagate errors (best-effort
    /// cleanup).
    pub async fn delete_by_flow_id(db: &Arc<DBClient>, table: &str, flow_id: &str) {
        let query = format!("DELETE {} WHERE flow_id = $flow_id", table);
        let params = vec![(
            "flow_id".to_string(),
            serde_json::Value::String(flow_id.to_string()),
        )];
        match db.execute_with_params(&query, params).await {
            Ok(_) => info!(table = %table, flow_id = %flow_id, "Cascade deleted records"),
            Err(e) => warn!(error = %e, table = %table, "Cascade delete failed (may not exist)"),
        }
    }

    /// Performs cascade delete on all related tables for a flow.
    ///
    /// Uses `join_all` to execute the per-table deletes in parallel.
    pub async fn delete_flow_related(db: &Arc<DBClient>, flow_id: &str) {
        use super::flow::CASCADE_DELETE_TABLES;

        let futures: Vec<_> = CASCADE_DELETE_TABLES
            .iter()
            .map(|table| {
                let db = Arc::clone(db);
                let table = *table;
                let id = flow_id.to_string();
                async move {
                    delete_by_flow_id(&db, table, &id).await;
                }
            })
            .collect();

        futures::future::join_all(futures).await;

        info!(flow_id = %flow_id, "Cascade delete completed for all related tables");
    }
}
