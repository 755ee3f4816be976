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

//! User identity mappings: upstream user ↔ knowledge-base user.
//!
//! The tuple `(tenant_id, source_type, source_workspace_id, source_user_id)`
//! is unique among active mappings; the workspace id prevents collisions
//! across tenants' workspaces that reuse identifier spaces.
//!
//! The full active table for one `(tenant, source_type, workspace)` tuple is
//! loaded once per discussion into a [`MappingSnapshot`], which both the
//! mention-rewrite pass and the assignee field use. A secondary handle map
//! serves sources whose inline mentions use display names rather than
//! opaque ids (design-tool `@Name`).

use super::flow::SourceType;
use super::serde_utils::deserialize_thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored identity mapping row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMapping {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub tenant_id: String,
    pub source_type: SourceType,
    pub source_workspace_id: String,
    pub source_user_id: String,

    #[serde(default)]
    pub source_user_name: Option<String>,

    pub dest_user_id: String,

    #[serde(default)]
    pub dest_user_name: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// UserMapping creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct UserMappingCreate {
    pub tenant_id: String,
    pub source_type: String,
    pub source_workspace_id: String,
    pub source_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_user_name: Option<String>,
    pub dest_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_user_name: Option<String>,
    pub active: bool,
    pub created_by: String,
    pub updated_by: String,
}

/// Resolved downstream identity for one upstream user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedUser {
    pub dest_user_id: String,
    /// Display name shown in rewritten mentions; falls back to the
    /// upstream name, then the upstream id
    pub display_name: String,
}

/// Immutable in-memory view of the active mappings for one workspace.
///
/// Built once per discussion (stage 2.5) and shared by stages 3–5.
#[derive(Debug, Clone, Default)]
pub struct MappingSnapshot {
    /// Keyed by upstream user id
    by_id: HashMap<String, MappedUser>,
    /// Keyed by upstream display name, for handle-based mention sources
    by_handle: HashMap<String, MappedUser>,
}

impl MappingSnapshot {
    /// Builds the snapshot from active mapping rows.
    ///
    /// Rows are expected pre-filtered to one `(tenant, source_type,
    /// workspace)` tuple; inactive rows are skipped defensively.
    pub fn from_mappings(mappings: &[UserMapping]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_handle = HashMap::new();

        for m in mappings.iter().filter(|m| m.active) {
            let display_name = m
                .dest_user_name
                .clone()
                .or_else(|| m.source_user_name.clone())
                .unwrap_or_else(|| m.source_user_id.clone());

            let mapped = MappedUser {
                dest_user_id: m.dest_user_id.clone(),
                display_name,
            };

            by_id.insert(m.source_user_id.clone(), mapped.clone());
            if let Some(name) = &m.source_user_name {
                by_handle.insert(name.clone(), mapped);
            }
        }

        Self { by_id, by_handle }
    }

    /// Looks up by upstream user id.
    pub fn by_id(&self, source_user_id: &str) -> Option<&MappedUser> {
        self.by_id.get(source_user_id)
    }

    /// Looks up by upstream display name.
    pub fn by_handle(&self, source_user_name: &str) -> Option<&MappedUser> {
        self.by_handle.get(source_user_name)
    }

    /// All known upstream display names.
    pub fn handles(&self) -> Vec<String> {
        self.by_handle.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}
