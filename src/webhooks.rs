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

//! Inbound webhook endpoints.
//!
//! Two endpoints, one per source. Contracts are pre-validated upstream
//! (signature verification and rate limiting live in front of this
//! service). Each handler parses the payload, resolves the flow
//! synchronously (so an unroutable webhook answers 404), then spawns the
//! pipeline as a detached task and answers 202. Processing runs in
//! parallel across discussions.

use crate::models::SourceType;
use crate::sources::SourceAdapter;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Builds the webhook router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks/chat", post(chat_webhook))
        .route("/webhooks/email", post(email_webhook))
        .route("/discussions/{id}/retry", post(retry_discussion))
        .with_state(state)
}

/// Operator-initiated retry: spawns a fresh processing attempt (a new job
/// row) for a stored discussion.
async fn retry_discussion(
    State(state): State<Arc<AppState>>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Response {
    match state.discussions.get(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "discussion not found" })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Discussion lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "discussion lookup failed" })),
            )
                .into_response();
        }
    }

    let processor = state.processor.clone();
    let discussion_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = processor.retry(&discussion_id).await {
            error!(discussion_id = %discussion_id, error = %e, "Discussion retry failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted", "discussion_id": id })),
    )
        .into_response()
}

async fn chat_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    // Endpoint ownership handshake from the chat platform
    if payload["type"] == "url_verification" {
        let challenge = payload["challenge"].as_str().unwrap_or_default();
        return (
            StatusCode::OK,
            Json(serde_json::json!({ "challenge": challenge })),
        )
            .into_response();
    }

    handle_event(state, SourceType::Chat, payload).await
}

async fn email_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    handle_event(state, SourceType::DesignEmail, payload).await
}

async fn handle_event(
    state: Arc<AppState>,
    source_type: SourceType,
    payload: serde_json::Value,
) -> Response {
    let adapter: &Arc<dyn SourceAdapter> = match source_type {
        SourceType::Chat => &state.chat_adapter,
        SourceType::DesignEmail => &state.email_adapter,
    };

    let parsed = match adapter.parse_incoming(&payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(source_type = %source_type, error = %e, "Webhook payload rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    // Resolve before accepting so unroutable webhooks get a 404
    match state
        .flows
        .resolve_route(source_type, &parsed.routing_key)
        .await
    {
        Ok(Some(_)) => {}
        Ok(None) => {
            info!(
                source_type = %source_type,
                routing_key = %parsed.routing_key,
                "No flow for webhook routing key"
            );
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": "no active flow for routing key" })),
            )
                .into_response();
        }
        Err(e) => {
            error!(error = %e, "Flow resolution failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "flow resolution failed" })),
            )
                .into_response();
        }
    }

    // Each webhook is a fresh pipeline instance; failures are recorded in
    // the job ledger, not surfaced to the caller
    let processor = state.processor.clone();
    let thread_id = parsed.source_thread_id.clone();
    tokio::spawn(async move {
        if let Err(e) = processor.process(parsed).await {
            error!(thread_id = %thread_id, error = %e, "Discussion processing failed");
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
        .into_response()
}
