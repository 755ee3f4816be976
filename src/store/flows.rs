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

//! Flow configuration store: resolution by routing key and flow CRUD.
//!
//! Resolution order:
//! 1. Active `flow_input` whose routing key matches (chat:
//!    `source_metadata.workspace_id`; email: `email_slug`), parent flow
//!    active → [`ResolvedRoute::Flow`].
//! 2. Active legacy `config` row matching the key →
//!    [`ResolvedRoute::Legacy`].
//! 3. Nothing → `None` (callers map this to their FlowNotFound error).
//!
//! Multiple matches are a data-integrity violation: the store logs a
//! warning and picks deterministically by `created_at asc`.

use crate::db::{queries, DBClient};
use crate::models::{
    Flow, FlowCreate, FlowInput, FlowInputCreate, FlowOutput, FlowOutputCreate, FlowWithRelations,
    LegacyConfig, ResolvedRoute, SourceType,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Store for flows, their inputs/outputs, and the legacy config fallback.
pub struct FlowStore {
    db: Arc<DBClient>,
}

impl FlowStore {
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Resolves the route for an incoming webhook.
    ///
    /// Returns `None` when neither a flow input nor a legacy config matches
    /// the routing key, or when the matched flow is inactive.
    #[instrument(name = "flow_resolve_route", skip(self), fields(source_type = %source_type, routing_key = %routing_key))]
    pub async fn resolve_route(
        &self,
        source_type: SourceType,
        routing_key: &str,
    ) -> Result<Option<ResolvedRoute>> {
        let query = format!(
            "{} WHERE active = true AND source_type = $source_type \
             AND (source_metadata.workspace_id = $key OR email_slug = $key) \
             ORDER BY created_at ASC",
            queries::flow::SELECT_INPUT_BASE
        );
        let params = vec![
            (
                "source_type".to_string(),
                serde_json::Value::String(source_type.to_string()),
            ),
            (
                "key".to_string(),
                serde_json::Value::String(routing_key.to_string()),
            ),
        ];

        let inputs: Vec<FlowInput> = self.db.query_with_params(&query, params).await?;

        if inputs.len() > 1 {
            warn!(
                matches = inputs.len(),
                routing_key = %routing_key,
                "Multiple active inputs match one routing key; picking oldest"
            );
        }

        if let Some(matched) = inputs.into_iter().next() {
            match self.load_relations(matched).await? {
                Some(flow) => return Ok(Some(ResolvedRoute::Flow(Box::new(flow)))),
                // Matched input but inactive parent flow: not a routing target
                None => return Ok(None),
            }
        }

        // Legacy fallback: single-destination config rows
        Ok(self
            .resolve_legacy(source_type, routing_key)
            .await?
            .map(ResolvedRoute::Legacy))
    }

    /// Resolves the route for a stored discussion by its input id.
    ///
    /// Used by the retry path, where the routing key is no longer at hand
    /// but the matched input (or legacy config) id is.
    #[instrument(name = "flow_resolve_by_input", skip(self))]
    pub async fn resolve_by_input(&self, input_id: &str) -> Result<Option<ResolvedRoute>> {
        let query = format!(
            "{} WHERE active = true AND meta::id(id) = $id",
            queries::flow::SELECT_INPUT_BASE
        );
        let params = vec![(
            "id".to_string(),
            serde_json::Value::String(input_id.to_string()),
        )];
        let inputs: Vec<FlowInput> = self.db.query_with_params(&query, params).await?;

        if let Some(matched) = inputs.into_iter().next() {
            return Ok(self
                .load_relations(matched)
                .await?
                .map(|f| ResolvedRoute::Flow(Box::new(f))));
        }

        // The id may name a legacy config row instead
        let query = "SELECT meta::id(id) AS id, tenant_id, source_type, api_token, \
             source_metadata, notion_database_id, notion_token, active, created_at \
             FROM config WHERE active = true AND meta::id(id) = $id";
        let params = vec![(
            "id".to_string(),
            serde_json::Value::String(input_id.to_string()),
        )];
        let configs: Vec<LegacyConfig> = self.db.query_with_params(query, params).await?;
        Ok(configs.into_iter().next().map(ResolvedRoute::Legacy))
    }

    /// Loads the active parent flow plus all active inputs/outputs for a
    /// matched input. Returns `None` when the flow is missing or inactive.
    async fn load_relations(&self, matched: FlowInput) -> Result<Option<FlowWithRelations>> {
        let query = format!(
            "{} WHERE active = true AND meta::id(id) = $id",
            queries::flow::SELECT_BASE
        );
        let params = vec![(
            "id".to_string(),
            serde_json::Value::String(matched.flow_id.clone()),
        )];
        let flows: Vec<Flow> = self.db.query_with_params(&query, params).await?;

        let Some(flow) = flows.into_iter().next() else {
            debug!(flow_id = %matched.flow_id, "Matched input points at missing or inactive flow");
            return Ok(None);
        };

        let inputs_query = format!(
            "{} WHERE active = true AND flow_id = $flow_id ORDER BY created_at ASC",
            queries::flow::SELECT_INPUT_BASE
        );
        let outputs_query = format!(
            "{} WHERE active = true AND flow_id = $flow_id ORDER BY created_at ASC",
            queries::flow::SELECT_OUTPUT_BASE
        );
        let flow_param = vec![(
            "flow_id".to_string(),
            serde_json::Value::String(flow.id.clone()),
        )];

        let inputs: Vec<FlowInput> = self
            .db
            .query_with_params(&inputs_query, flow_param.clone())
            .await?;
        let outputs: Vec<FlowOutput> = self
            .db
            .query_with_params(&outputs_query, flow_param)
            .await?;

        Ok(Some(FlowWithRelations {
            flow,
            inputs,
            outputs,
            matched_input: matched,
        }))
    }

    async fn resolve_legacy(
        &self,
        source_type: SourceType,
        routing_key: &str,
    ) -> Result<Option<LegacyConfig>> {
        let query = "SELECT meta::id(id) AS id, tenant_id, source_type, api_token, \
             source_metadata, notion_database_id, notion_token, active, created_at \
             FROM config WHERE active = true AND source_type = $source_type \
             AND source_metadata.workspace_id = $key ORDER BY created_at ASC";
        let params = vec![
            (
                "source_type".to_string(),
                serde_json::Value::String(source_type.to_string()),
            ),
            (
                "key".to_string(),
                serde_json::Value::String(routing_key.to_string()),
            ),
        ];
        let configs: Vec<LegacyConfig> = self.db.query_with_params(query, params).await?;
        Ok(configs.into_iter().next())
    }

    /// Creates a flow row; returns the generated id.
    pub async fn create_flow(&self, create: FlowCreate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create("flow", &id, create).await
    }

    /// Creates a flow input row; returns the generated id.
    pub async fn create_input(&self, create: FlowInputCreate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create("flow_input", &id, create).await
    }

    /// Creates a flow output row; returns the generated id.
    pub async fn create_output(&self, create: FlowOutputCreate) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.db.create("flow_output", &id, create).await
    }

    /// Deletes a flow and cascades to its inputs and outputs.
    pub async fn delete_flow(&self, flow_id: &str) -> Result<()> {
        queries::cascade::delete_flow_related(&self.db, flow_id).await;
        let query = format!("DELETE flow:`{}`", flow_id);
        self.db.execute(&query).await
    }
}
