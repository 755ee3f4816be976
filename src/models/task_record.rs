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

//! Local index rows referencing externally created task pages.
//!
//! `dest_page_id` uniquely identifies the external artifact; its absence
//! means the external write failed. Discussions link these rows by *row id*
//! (the page id stays inside the record), which is what makes the
//! completion-callback reverse lookup possible.

use super::serde_utils::deserialize_thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to one successfully created knowledge-base page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRef {
    /// External page id
    pub id: String,
    /// External page URL (used in the notification reply)
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Index row for one created downstream task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub tenant_id: String,
    pub discussion_id: String,
    pub job_id: String,

    /// External page id; uniquely identifies the artifact
    pub dest_page_id: String,

    pub dest_page_url: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub assignee: Option<String>,

    pub source_url: String,

    /// True when this task is one of several detected in the same thread
    #[serde(default)]
    pub is_multi_task_child: bool,

    /// Position in the analyzer's task list (multi-task threads)
    #[serde(default)]
    pub task_index: Option<u32>,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// TaskRecord creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecordCreate {
    pub tenant_id: String,
    pub discussion_id: String,
    pub job_id: String,
    pub dest_page_id: String,
    pub dest_page_url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    pub source_url: String,
    pub is_multi_task_child: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_index: Option<u32>,
    pub metadata: serde_json::Value,
    pub created_by: String,
    pub updated_by: String,
}
