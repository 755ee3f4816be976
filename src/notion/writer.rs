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

//! HTTP task writer against the knowledge-base pages API.

use super::blocks::{build_page_children, title_property_value};
use super::{
    NotionOutputConfig, TaskSink, TaskWriteRequest, WriteError, CONNECTION_TEST_TIMEOUT_SECS,
    NOTION_VERSION, WRITE_TIMEOUT_SECS,
};
use crate::models::TaskRef;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default knowledge-base API root.
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";

/// Knowledge-base writer.
pub struct NotionWriter {
    http: Arc<reqwest::Client>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

impl NotionWriter {
    /// Creates a writer with the production API root.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self {
            http,
            base_url: DEFAULT_NOTION_API_URL.to_string(),
        }
    }

    /// Creates a writer against a custom API root (tests, proxies).
    pub fn with_base_url(http: Arc<reqwest::Client>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn classify(status: reqwest::StatusCode, body: &str) -> WriteError {
        let message: String = body.chars().take(300).collect();
        match status.as_u16() {
            429 => WriteError::RateLimited,
            401 | 403 => WriteError::Auth(message),
            s if s >= 500 => WriteError::Transient(message),
            _ => WriteError::Api(format!("{}: {}", status, message)),
        }
    }

    fn transport(err: reqwest::Error, timeout_ms: u64) -> WriteError {
        if err.is_timeout() {
            WriteError::Timeout { timeout_ms }
        } else {
            WriteError::Transient(err.to_string())
        }
    }
}

#[async_trait]
impl TaskSink for NotionWriter {
    #[instrument(name = "notion_create_task", skip_all, fields(title = %request.task.title, database_id = %request.config.database_id))]
    async fn create_task(&self, request: &TaskWriteRequest<'_>) -> Result<TaskRef, WriteError> {
        let mut properties = match &request.config.field_mapping {
            Some(mapping) => mapping.build_properties(request.task),
            None => serde_json::Map::new(),
        };
        properties.insert(
            request.config.title_property().to_string(),
            title_property_value(&request.task.title),
        );

        let body = serde_json::json!({
            "parent": { "database_id": request.config.database_id },
            "properties": properties,
            "children": build_page_children(request),
        });

        let timeout_ms = WRITE_TIMEOUT_SECS * 1000;
        let response = self
            .http
            .post(format!("{}/pages", self.base_url))
            .bearer_auth(&request.config.api_token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .timeout(Duration::from_secs(WRITE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Self::transport(e, timeout_ms))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::transport(e, timeout_ms))?;

        if !status.is_success() {
            return Err(Self::classify(status, &text));
        }

        let page: PageResponse = serde_json::from_str(&text)
            .map_err(|e| WriteError::Api(format!("Unparseable page response: {}", e)))?;

        let url = page
            .url
            .unwrap_or_else(|| format!("https://www.notion.so/{}", page.id.replace('-', "")));

        info!(page_id = %page.id, "Task page created");
        Ok(TaskRef {
            id: page.id,
            url,
            created_at: Utc::now(),
        })
    }

    #[instrument(name = "notion_test_connection", skip(self, config), fields(database_id = %config.database_id))]
    async fn test_connection(&self, config: &NotionOutputConfig) -> Result<(), WriteError> {
        let timeout_ms = CONNECTION_TEST_TIMEOUT_SECS * 1000;
        let response = self
            .http
            .get(format!("{}/databases/{}", self.base_url, config.database_id))
            .bearer_auth(&config.api_token)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(Duration::from_secs(CONNECTION_TEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| Self::transport(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::classify(status, &text));
        }

        debug!("Knowledge-base connection verified");
        Ok(())
    }
}
