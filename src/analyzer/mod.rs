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

//! LLM analyzer: structured summary + task detection for a thread.
//!
//! Two prompts per thread (summary, tasks), each optionally overridden by
//! the flow's template. The model must answer with a single JSON object;
//! the analyzer extracts the first `{...}` span and parses it. Results are
//! cached by content hash for an hour; the cache is advisory and its
//! failures never escape.

pub mod cache;
pub mod client;
pub mod parse;
pub mod prompts;

use crate::models::{AnalysisResult, Thread};
use async_trait::async_trait;
use thiserror::Error;

pub use cache::AnalysisCache;
pub use client::{LlmAnalyzer, LlmClient};

/// Per-call timeout for the LLM API.
pub const ANALYZER_TIMEOUT_SECS: u64 = 30;

/// Output token cap for the summary prompt.
pub const SUMMARY_MAX_TOKENS: u32 = 1024;

/// Output token cap for the task-detection prompt.
pub const TASK_MAX_TOKENS: u32 = 2048;

/// Analyzer error types.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Credentials rejected (401/403)
    #[error("LLM authentication rejected: {0}")]
    Auth(String),

    /// 429 from the LLM API
    #[error("LLM rate limited")]
    RateLimited,

    /// 5xx or connection failure
    #[error("transient LLM error: {0}")]
    Transient(String),

    /// Per-call timeout elapsed
    #[error("LLM call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Non-retryable API rejection
    #[error("LLM request failed: {0}")]
    Api(String),

    /// The response carried no parseable JSON object (retried once)
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Transport-level retryability (the malformed-response retry is a
    /// separate, single-shot policy).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited | AnalysisError::Transient(_) | AnalysisError::Timeout { .. }
        )
    }
}

/// Per-flow analysis options.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Tenant-defined domain labels the model may attach to tasks
    pub available_domains: Vec<String>,
    /// Flow override for the summary prompt
    pub summary_template: Option<String>,
    /// Flow override for the task-detection prompt
    pub task_template: Option<String>,
}

/// Analyzer seam: structured analysis of one thread.
#[async_trait]
pub trait ThreadAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        thread: &Thread,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult, AnalysisError>;
}
