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

//! Flow configuration entities.
//!
//! A *flow* is a tenant-configured pipeline with N upstream inputs and M
//! downstream outputs. Inputs carry the routing key that maps an incoming
//! webhook to the flow (chat workspace id, or email slug); outputs carry the
//! knowledge-base destination plus an optional domain filter.
//!
//! `source_metadata` and `output_config` are stored as free-form JSON blobs
//! but are parsed into typed structs ([`ChatWorkspaceMetadata`],
//! [`EmailSourceMetadata`], [`NotionOutputConfig`]) at the module boundary.
//! The pipeline itself only ever works with the typed forms.

use super::serde_utils::deserialize_thing_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Upstream source kind for a flow input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Chat platform thread (workspace-scoped event callback)
    Chat,
    /// Design-tool comment stream delivered via email events
    DesignEmail,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::DesignEmail => write!(f, "design_email"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "design_email" => Ok(Self::DesignEmail),
            _ => Err(format!("Invalid source type: {}", s)),
        }
    }
}

/// Downstream destination kind for a flow output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    /// Knowledge-base database page destination
    #[default]
    Kb,
}

impl std::fmt::Display for OutputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kb => write!(f, "kb"),
        }
    }
}

/// Flow entity: a named pipeline owned by a tenant.
///
/// An inactive flow is never a routing target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique identifier (deserialized from SurrealDB Thing type)
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    /// Owning tenant
    pub tenant_id: String,

    /// Display name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Tenant-defined free-text domain labels, in priority order
    /// (e.g. `design`, `frontend`). Injected into the LLM prompt and
    /// matched against output domain filters.
    #[serde(default)]
    pub available_domains: Vec<String>,

    /// Whether LLM analysis runs for this flow
    #[serde(default = "default_true")]
    pub ai_enabled: bool,

    /// Optional override for the summary prompt template
    #[serde(default)]
    pub summary_prompt_template: Option<String>,

    /// Optional override for the task-detection prompt template
    #[serde(default)]
    pub task_prompt_template: Option<String>,

    /// Inactive flows are never resolved
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

/// One upstream endpoint bound to a flow.
///
/// For a given `source_type`, the routing key (chat workspace id or email
/// slug) is unique across active inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowInput {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub flow_id: String,
    pub tenant_id: String,
    pub source_type: SourceType,

    /// Upstream API token used for thread fetches, replies, and reactions
    pub api_token: String,

    /// Source-specific metadata blob. Holds the workspace/team identifier
    /// and the bot identity used for self-mention stripping. Parse via
    /// [`FlowInput::chat_metadata`] / [`FlowInput::email_metadata`].
    #[serde(default)]
    pub source_metadata: serde_json::Value,

    /// Email routing slug; required for `design_email` inputs and unique
    /// across active inputs of that type
    #[serde(default)]
    pub email_slug: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Typed view of `source_metadata` for chat inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatWorkspaceMetadata {
    /// Upstream workspace/team identifier (the routing key)
    pub workspace_id: String,

    /// Bot user id, used for self-mention stripping
    #[serde(default)]
    pub bot_user_id: Option<String>,

    /// Bot display handle (fallback for self-mention stripping)
    #[serde(default)]
    pub bot_handle: Option<String>,
}

/// Typed view of `source_metadata` for design-email inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSourceMetadata {
    /// Token for the email provider's `GET /emails/{id}` body fetch.
    /// Falls back to the input's `api_token` when absent.
    #[serde(default)]
    pub email_provider_token: Option<String>,

    /// Bot display handle in the design tool, used for self-mention stripping
    #[serde(default)]
    pub bot_handle: Option<String>,
}

impl FlowInput {
    /// Parses `source_metadata` as chat workspace metadata.
    pub fn chat_metadata(&self) -> Result<ChatWorkspaceMetadata, String> {
        serde_json::from_value(self.source_metadata.clone())
            .map_err(|e| format!("Invalid chat source_metadata for input {}: {}", self.id, e))
    }

    /// Parses `source_metadata` as email source metadata.
    ///
    /// Email metadata is fully optional, so a missing or empty blob parses
    /// to defaults.
    pub fn email_metadata(&self) -> EmailSourceMetadata {
        serde_json::from_value(self.source_metadata.clone()).unwrap_or_default()
    }
}

/// One downstream task destination bound to a flow.
///
/// Exactly one active output per flow has `is_default = true` (the
/// non-routable safety net).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowOutput {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub flow_id: String,
    pub tenant_id: String,

    #[serde(default)]
    pub output_type: OutputType,

    pub name: String,

    /// Domain labels this output accepts. Empty set means "accept any"
    /// (matching still falls through to the default for unmatched domains).
    #[serde(default)]
    pub domain_filter: Vec<String>,

    /// Receives any task not matched by another output's domain filter
    #[serde(default)]
    pub is_default: bool,

    /// Destination config blob (target database id, access token, field
    /// mapping). Parse via [`crate::notion::NotionOutputConfig::from_value`].
    #[serde(default)]
    pub output_config: serde_json::Value,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Legacy single-destination configuration record.
///
/// Pre-flow installations stored one `config` row per workspace. The
/// resolver falls through to this table when no flow input matches; the
/// pipeline consumes it through [`ResolvedRoute::Legacy`] without forking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyConfig {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub tenant_id: String,
    pub source_type: SourceType,
    pub api_token: String,

    #[serde(default)]
    pub source_metadata: serde_json::Value,

    /// Knowledge-base database id for the single destination
    pub notion_database_id: String,

    /// Knowledge-base access token
    pub notion_token: String,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl LegacyConfig {
    /// Typed chat metadata view (legacy rows use the same blob shape).
    pub fn chat_metadata(&self) -> Result<ChatWorkspaceMetadata, String> {
        serde_json::from_value(self.source_metadata.clone())
            .map_err(|e| format!("Invalid source_metadata for config {}: {}", self.id, e))
    }
}

/// A resolved flow with all of its active relations.
#[derive(Debug, Clone)]
pub struct FlowWithRelations {
    pub flow: Flow,
    pub inputs: Vec<FlowInput>,
    pub outputs: Vec<FlowOutput>,
    /// The input whose routing key matched the webhook
    pub matched_input: FlowInput,
}

/// Discriminated routing result: flow mode or legacy single-config mode.
///
/// Callers handle both shapes through this one enum; the pipeline never
/// forks on it beyond output selection.
#[derive(Debug, Clone)]
pub enum ResolvedRoute {
    Flow(Box<FlowWithRelations>),
    Legacy(LegacyConfig),
}

impl ResolvedRoute {
    /// Tenant that owns the matched flow or config.
    pub fn tenant_id(&self) -> &str {
        match self {
            Self::Flow(f) => &f.flow.tenant_id,
            Self::Legacy(c) => &c.tenant_id,
        }
    }

    /// Upstream API token of the matched input.
    pub fn api_token(&self) -> &str {
        match self {
            Self::Flow(f) => &f.matched_input.api_token,
            Self::Legacy(c) => &c.api_token,
        }
    }

    /// Source metadata blob of the matched input.
    pub fn source_metadata(&self) -> &serde_json::Value {
        match self {
            Self::Flow(f) => &f.matched_input.source_metadata,
            Self::Legacy(c) => &c.source_metadata,
        }
    }
}

/// Flow creation payload - only fields needed for creation.
///
/// ID is passed separately to db.create() using table:id format.
/// Timestamps and audit columns are handled by database defaults.
#[derive(Debug, Clone, Serialize)]
pub struct FlowCreate {
    pub tenant_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub available_domains: Vec<String>,
    pub ai_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_prompt_template: Option<String>,
    pub active: bool,
    pub created_by: String,
    pub updated_by: String,
}

/// Flow input creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct FlowInputCreate {
    pub flow_id: String,
    pub tenant_id: String,
    pub source_type: String,
    pub api_token: String,
    pub source_metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_slug: Option<String>,
    pub active: bool,
    pub created_by: String,
    pub updated_by: String,
}

/// Flow output creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct FlowOutputCreate {
    pub flow_id: String,
    pub tenant_id: String,
    pub output_type: String,
    pub name: String,
    pub domain_filter: Vec<String>,
    pub is_default: bool,
    pub output_config: serde_json::Value,
    pub active: bool,
    pub created_by: String,
    pub updated_by: String,
}

/// Builds a `source_metadata` blob for a chat input.
pub fn chat_metadata_value(
    workspace_id: &str,
    bot_user_id: Option<&str>,
    bot_handle: Option<&str>,
) -> serde_json::Value {
    let mut map = HashMap::new();
    map.insert(
        "workspace_id".to_string(),
        serde_json::Value::String(workspace_id.to_string()),
    );
    if let Some(bot) = bot_user_id {
        map.insert(
            "bot_user_id".to_string(),
            serde_json::Value::String(bot.to_string()),
        );
    }
    if let Some(handle) = bot_handle {
        map.insert(
            "bot_handle".to_string(),
            serde_json::Value::String(handle.to_string()),
        );
    }
    serde_json::to_value(map).unwrap_or_default()
}
