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

//! Knowledge-base task writer.
//!
//! Creates one page per detected task: structured block body, typed
//! properties through the output's field mapping, inline user mentions
//! through the discussion's mapping snapshot. Writes within one batch are
//! serial with ≥200 ms spacing; the first non-retryable error aborts the
//! batch (already-written pages stay, visible through the job ledger).

pub mod blocks;
pub mod field_mapping;
pub mod pacer;
pub mod writer;

use crate::models::{
    DetectedTask, LegacyConfig, MappingSnapshot, SourceType, TaskRef, Thread, ThreadSummary,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use field_mapping::{FieldMapping, FieldTarget, PropertyType};
pub use pacer::WritePacer;
pub use writer::NotionWriter;

/// Pinned knowledge-base API version header.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Per-write timeout.
pub const WRITE_TIMEOUT_SECS: u64 = 15;

/// Connection-test timeout.
pub const CONNECTION_TEST_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between successive writes of one batch.
pub const MIN_WRITE_SPACING_MS: u64 = 200;

/// Default name of the database's title property.
pub const DEFAULT_TITLE_PROPERTY: &str = "Name";

/// Task writer error types.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Output config blob is missing required fields
    #[error("invalid output config: {0}")]
    InvalidConfig(String),

    /// Credentials rejected (401/403)
    #[error("knowledge-base authentication rejected: {0}")]
    Auth(String),

    /// 429; retry the failed call only
    #[error("knowledge-base rate limited")]
    RateLimited,

    /// 5xx or connection failure
    #[error("transient knowledge-base error: {0}")]
    Transient(String),

    /// Per-call timeout elapsed
    #[error("knowledge-base write timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-retryable API rejection
    #[error("knowledge-base request failed: {0}")]
    Api(String),
}

impl WriteError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WriteError::RateLimited | WriteError::Transient(_) | WriteError::Timeout { .. }
        )
    }
}

/// Typed view of a flow output's `output_config` blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionOutputConfig {
    /// Target database id
    pub database_id: String,

    /// Access token for the destination workspace
    pub api_token: String,

    /// Canonical-field → destination-property mapping
    #[serde(default)]
    pub field_mapping: Option<FieldMapping>,

    /// Title property name of the destination database
    #[serde(default)]
    pub title_property: Option<String>,
}

impl NotionOutputConfig {
    /// Parses the stored JSON blob into the typed config.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, WriteError> {
        serde_json::from_value(value.clone())
            .map_err(|e| WriteError::InvalidConfig(e.to_string()))
    }

    /// Builds the config for a legacy single-destination row.
    pub fn from_legacy(config: &LegacyConfig) -> Self {
        Self {
            database_id: config.notion_database_id.clone(),
            api_token: config.notion_token.clone(),
            field_mapping: None,
            title_property: None,
        }
    }

    pub fn title_property(&self) -> &str {
        self.title_property.as_deref().unwrap_or(DEFAULT_TITLE_PROPERTY)
    }
}

/// Everything one page write needs, borrowed from the pipeline context.
pub struct TaskWriteRequest<'a> {
    pub task: &'a DetectedTask,
    /// Position in the analyzer's task list
    pub task_index: usize,
    pub is_multi_task_child: bool,
    pub thread: &'a Thread,
    pub summary: &'a ThreadSummary,
    pub mentions: &'a MappingSnapshot,
    pub config: &'a NotionOutputConfig,
    pub source_type: SourceType,
    pub source_url: &'a str,
    pub author_handle: &'a str,
    pub detection_confidence: Option<f64>,
}

/// Task destination seam.
#[async_trait]
pub trait TaskSink: Send + Sync {
    /// Creates one task page; returns its external reference.
    async fn create_task(&self, request: &TaskWriteRequest<'_>) -> Result<TaskRef, WriteError>;

    /// Verifies the destination database is reachable with the configured
    /// token.
    async fn test_connection(&self, config: &NotionOutputConfig) -> Result<(), WriteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_config_parse() {
        let value = serde_json::json!({
            "database_id": "db-1",
            "api_token": "secret",
            "title_property": "Task",
            "field_mapping": {
                "priority": {
                    "dest_property": "Priority",
                    "property_type": "select",
                    "value_map": {"high": "High 🔥"},
                }
            }
        });
        let config = NotionOutputConfig::from_value(&value).unwrap();
        assert_eq!(config.database_id, "db-1");
        assert_eq!(config.title_property(), "Task");
        let mapping = config.field_mapping.unwrap();
        let target = mapping.get("priority").unwrap();
        assert_eq!(target.dest_property, "Priority");
    }

    #[test]
    fn test_output_config_missing_fields() {
        let err = NotionOutputConfig::from_value(&serde_json::json!({"database_id": "x"}))
            .unwrap_err();
        assert!(matches!(err, WriteError::InvalidConfig(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_output_config_defaults() {
        let config = NotionOutputConfig::from_value(&serde_json::json!({
            "database_id": "db-1",
            "api_token": "secret",
        }))
        .unwrap();
        assert_eq!(config.title_property(), DEFAULT_TITLE_PROPERTY);
        assert!(config.field_mapping.is_none());
    }

    #[test]
    fn test_write_error_retryability() {
        assert!(WriteError::RateLimited.is_retryable());
        assert!(WriteError::Transient("502".to_string()).is_retryable());
        assert!(WriteError::Timeout { timeout_ms: 15_000 }.is_retryable());
        assert!(!WriteError::Auth("401".to_string()).is_retryable());
        assert!(!WriteError::Api("400".to_string()).is_retryable());
        assert!(!WriteError::InvalidConfig("missing".to_string()).is_retryable());
    }
}
