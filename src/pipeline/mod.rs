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

//! Processing pipeline: flow resolution, the six-stage orchestrator, and
//! its supporting passes (retry, domain routing, mention rewrite).

pub mod mentions;
pub mod processor;
pub mod retry;
pub mod router;

use crate::analyzer::AnalysisError;
use crate::models::SourceType;
use crate::notion::WriteError;
use crate::sources::SourceError;
use thiserror::Error;

pub use mentions::BotIdentity;
pub use processor::{AdapterSet, DiscussionProcessor, NotificationReport, PipelineOutcome};
pub use retry::{with_retry, with_retry_timeout, RetryConfig};
pub use router::{route, RoutingError};

/// Top-level pipeline error: everything stages 1–5 can fail with.
///
/// Stage 6 (notification) never produces one of these; its failures are
/// logged and counted, not propagated.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage 1: a required field of the parsed discussion is empty
    #[error("validation failed: {0}")]
    Validation(String),

    /// Stage 2: no active flow input or legacy config matches
    #[error("no active flow matches {source_type} routing key '{routing_key}'")]
    FlowNotFound {
        source_type: SourceType,
        routing_key: String,
    },

    /// Retry entry point: unknown discussion id
    #[error("discussion not found: {0}")]
    DiscussionNotFound(String),

    /// Source adapter failure (parse, fetch, auth, ...)
    #[error(transparent)]
    Source(#[from] SourceError),

    /// LLM analysis failure
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Knowledge-base write failure that aborted stage 5
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Domain routing fault (default-output invariant)
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Store layer failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_not_found_message() {
        let err = PipelineError::FlowNotFound {
            source_type: SourceType::Chat,
            routing_key: "T404".to_string(),
        };
        assert!(err.to_string().contains("chat"));
        assert!(err.to_string().contains("T404"));
    }

    #[test]
    fn test_storage_from_anyhow() {
        let err: PipelineError = anyhow::anyhow!("row rejected").into();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(err.to_string().contains("row rejected"));
    }

    #[test]
    fn test_source_error_transparent() {
        let err: PipelineError = SourceError::Parse("missing field".to_string()).into();
        assert_eq!(err.to_string(), "payload parse error: missing field");
    }
}
