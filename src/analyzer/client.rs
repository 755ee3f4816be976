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

//! LLM messages-endpoint client and the analyzer built on it.
//!
//! The client speaks a messages-style JSON API: one user message in, a
//! list of content blocks out. Transport failures go through the shared
//! retry helper (three attempts, exponential backoff); a malformed JSON
//! answer is retried exactly once before failing the analysis.

use super::parse::{parse_detection, parse_summary};
use super::{
    AnalysisCache, AnalysisError, AnalyzeOptions, ThreadAnalyzer, ANALYZER_TIMEOUT_SECS,
    SUMMARY_MAX_TOKENS, TASK_MAX_TOKENS,
};
use crate::models::{AnalysisResult, Thread};
use crate::pipeline::retry::{with_retry_timeout, RetryConfig};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Pinned API version header value.
pub const LLM_API_VERSION: &str = "2024-06-01";

/// Messages-endpoint client.
pub struct LlmClient {
    http: Arc<reqwest::Client>,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

impl LlmClient {
    pub fn new(http: Arc<reqwest::Client>, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Sends one prompt and returns the concatenated text blocks.
    #[instrument(name = "llm_complete", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len(), max_tokens = max_tokens))]
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, AnalysisError> {
        let url = format!("{}/messages", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Api-Version", LLM_API_VERSION)
            .json(&body)
            .timeout(Duration::from_secs(ANALYZER_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Timeout {
                        timeout_ms: ANALYZER_TIMEOUT_SECS * 1000,
                    }
                } else {
                    AnalysisError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transient(e.to_string()))?;

        if !status.is_success() {
            let message: String = text.chars().take(300).collect();
            return Err(match status.as_u16() {
                429 => AnalysisError::RateLimited,
                401 | 403 => AnalysisError::Auth(message),
                s if s >= 500 => AnalysisError::Transient(message),
                _ => AnalysisError::Api(format!("{}: {}", status, message)),
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| AnalysisError::Api(format!("Unparseable LLM envelope: {}", e)))?;

        let content: String = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text" || b.block_type.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        debug!(response_len = content.len(), "LLM completion received");
        Ok(content)
    }
}

/// Thread analyzer backed by the messages endpoint plus the content-hash
/// cache.
pub struct LlmAnalyzer {
    client: LlmClient,
    cache: AnalysisCache,
    retry: RetryConfig,
}

impl LlmAnalyzer {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client,
            cache: AnalysisCache::default(),
            // Three attempts total: 1s, 2s backoff (capped at 10s)
            retry: RetryConfig::default(),
        }
    }

    /// Runs one prompt with transport retries, re-prompting once on a
    /// malformed answer.
    async fn run_prompt<T>(
        &self,
        prompt: &str,
        max_tokens: u32,
        parse: fn(&str) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError> {
        let mut reparse_attempted = false;
        loop {
            let text = with_retry_timeout(
                || self.client.complete(prompt, max_tokens),
                &self.retry,
                AnalysisError::is_retryable,
                Duration::from_secs(ANALYZER_TIMEOUT_SECS),
                || AnalysisError::Timeout {
                    timeout_ms: ANALYZER_TIMEOUT_SECS * 1000,
                },
            )
            .await?;

            match parse(&text) {
                Ok(value) => return Ok(value),
                Err(e) if !reparse_attempted => {
                    warn!(error = %e, "Malformed LLM response; re-prompting once");
                    reparse_attempted = true;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ThreadAnalyzer for LlmAnalyzer {
    #[instrument(name = "analyze_thread", skip_all, fields(thread_id = %thread.source_thread_id))]
    async fn analyze(
        &self,
        thread: &Thread,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult, AnalysisError> {
        let started = Instant::now();
        let key = AnalysisCache::key_for(thread);

        if let Some((summary, task_detection)) = self.cache.get(&key).await {
            return Ok(AnalysisResult {
                summary,
                task_detection,
                processing_time_ms: started.elapsed().as_millis() as u64,
                cached: true,
            });
        }

        let summary_prompt = super::prompts::build_summary_prompt(
            thread,
            &options.available_domains,
            options.summary_template.as_deref(),
        );
        let summary = self
            .run_prompt(&summary_prompt, SUMMARY_MAX_TOKENS, parse_summary)
            .await?;

        let task_prompt = super::prompts::build_task_prompt(
            thread,
            &options.available_domains,
            options.task_template.as_deref(),
        );
        let task_detection = self
            .run_prompt(&task_prompt, TASK_MAX_TOKENS, parse_detection)
            .await?;

        self.cache
            .insert(key, summary.clone(), task_detection.clone())
            .await;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            tasks = task_detection.tasks.len(),
            processing_time_ms = processing_time_ms,
            "Thread analysis completed"
        );

        Ok(AnalysisResult {
            summary,
            task_detection,
            processing_time_ms,
            cached: false,
        })
    }
}
