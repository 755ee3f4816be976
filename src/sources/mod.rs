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

//! Source adapters: one capability set per upstream protocol.
//!
//! Every adapter exposes the same operations (parse webhook, fetch thread,
//! post reply, set/remove status marker), polymorphic over
//! `{chat, design_email}`. The orchestrator never switches on source type
//! beyond picking the adapter.
//!
//! Failure semantics: transient 5xx/timeouts and 429 are retryable; other
//! 4xx are not; 401/403 are auth failures. "Marker already applied" is
//! success, not an error.

pub mod chat;
pub mod design_email;

use crate::models::{ChatWorkspaceMetadata, EmailSourceMetadata, ParsedDiscussion, SourceType, Thread};
use async_trait::async_trait;
use thiserror::Error;

pub use chat::ChatAdapter;
pub use design_email::DesignEmailAdapter;

/// Default timeout for upstream thread fetches and replies.
pub const SOURCE_CALL_TIMEOUT_SECS: u64 = 15;

/// Source adapter error types.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Payload lacks mandatory fields
    #[error("payload parse error: {0}")]
    Parse(String),

    /// Non-retryable upstream rejection (4xx other than 401/403/429)
    #[error("{api} request failed: {message}")]
    Api { api: String, message: String },

    /// Credentials rejected (401/403)
    #[error("authentication rejected by {api}: {message}")]
    Auth { api: String, message: String },

    /// 429 from upstream; retry with backoff
    #[error("rate limited by {api}")]
    RateLimited { api: String },

    /// 5xx or connection failure; retryable
    #[error("transient error calling {api}: {message}")]
    Transient { api: String, message: String },

    /// Per-call timeout elapsed; retryable
    #[error("operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The referenced thread could not be located upstream
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
}

impl SourceError {
    /// True for errors worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. }
                | SourceError::Transient { .. }
                | SourceError::Timeout { .. }
        )
    }

    /// Classifies an HTTP status + body into the error taxonomy.
    pub fn from_status(api: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = body.chars().take(300).collect::<String>();
        if status.as_u16() == 429 {
            SourceError::RateLimited {
                api: api.to_string(),
            }
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            SourceError::Auth {
                api: api.to_string(),
                message,
            }
        } else if status.is_server_error() {
            SourceError::Transient {
                api: api.to_string(),
                message,
            }
        } else {
            SourceError::Api {
                api: api.to_string(),
                message: format!("{}: {}", status, message),
            }
        }
    }

    /// Wraps a reqwest transport failure.
    pub fn from_transport(api: &str, err: reqwest::Error) -> Self {
        SourceError::Transient {
            api: api.to_string(),
            message: err.to_string(),
        }
    }
}

/// Visible status marker on the source thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Upstream credentials plus the input's source metadata blob.
#[derive(Debug, Clone)]
pub struct SourceAuth {
    pub token: String,
    pub metadata: serde_json::Value,
}

impl SourceAuth {
    pub fn new(token: impl Into<String>, metadata: serde_json::Value) -> Self {
        Self {
            token: token.into(),
            metadata,
        }
    }

    /// Typed chat metadata view.
    pub fn chat_metadata(&self) -> Option<ChatWorkspaceMetadata> {
        serde_json::from_value(self.metadata.clone()).ok()
    }

    /// Typed email metadata view (defaults on empty blob).
    pub fn email_metadata(&self) -> EmailSourceMetadata {
        serde_json::from_value(self.metadata.clone()).unwrap_or_default()
    }
}

/// Parse-time leftovers an adapter may need to finish building the thread
/// (email sources: the email id and the provisional body for fuzzy
/// correlation with the design-tool comment list).
#[derive(Debug, Clone, Default)]
pub struct ThreadHint {
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

impl ThreadHint {
    /// Builds the hint from a parsed discussion.
    pub fn from_parsed(parsed: &ParsedDiscussion) -> Self {
        Self {
            title: parsed.title.clone(),
            content: parsed.content.clone(),
            metadata: parsed.metadata.clone(),
        }
    }
}

/// Common capability set for all upstream sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns the source type this adapter serves.
    fn source_type(&self) -> SourceType;

    /// Extracts the normalized discussion from a raw webhook payload.
    ///
    /// Pure: no network access. Fails with [`SourceError::Parse`] when the
    /// payload lacks mandatory fields.
    fn parse_incoming(&self, payload: &serde_json::Value) -> Result<ParsedDiscussion, SourceError>;

    /// Returns the root message, ordered replies, and deduped participant
    /// set for a thread.
    ///
    /// For email sources this resolves the canonical
    /// `{file_key}:{comment_id}` identity by correlating the parsed content
    /// with the design tool's comment list.
    async fn fetch_thread(
        &self,
        thread_id: &str,
        auth: &SourceAuth,
        hint: &ThreadHint,
    ) -> Result<Thread, SourceError>;

    /// Posts a reply to the thread. Best-effort; idempotency is the
    /// caller's concern.
    async fn post_reply(
        &self,
        thread_id: &str,
        text: &str,
        auth: &SourceAuth,
    ) -> Result<(), SourceError>;

    /// Sets a visible status marker on the thread. An already-applied
    /// marker is success.
    async fn update_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError>;

    /// Removes a status marker. Best-effort.
    async fn remove_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError>;
}
