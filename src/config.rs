// Copyright 2025 Discusync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment-driven process configuration.
//!
//! Flow-, input-, and output-level settings live in the database; this
//! covers only what the process needs before it can reach the database.

use anyhow::{Context, Result};

/// Default LLM messages-endpoint root.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Default analysis model.
pub const DEFAULT_LLM_MODEL: &str = "claude-3-5-haiku-latest";

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Embedded database directory
    pub db_path: String,
    /// Webhook listener address
    pub bind_addr: String,
    /// LLM messages-endpoint root
    pub llm_base_url: String,
    /// LLM API key
    pub llm_api_key: String,
    /// Analysis model id
    pub llm_model: String,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// `DISCUSYNC_LLM_API_KEY` is required; everything else has a
    /// default.
    pub fn from_env() -> Result<Self> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());

        let db_path = std::env::var("DISCUSYNC_DB_PATH")
            .unwrap_or_else(|_| format!("{}/.discusync/db", home));
        let bind_addr =
            std::env::var("DISCUSYNC_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8085".to_string());
        let llm_base_url = std::env::var("DISCUSYNC_LLM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());
        let llm_api_key = std::env::var("DISCUSYNC_LLM_API_KEY")
            .context("DISCUSYNC_LLM_API_KEY must be set")?;
        let llm_model =
            std::env::var("DISCUSYNC_LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());

        Ok(Self {
            db_path,
            bind_addr,
            llm_base_url,
            llm_api_key,
            llm_model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_in() {
        let config = Config {
            db_path: "/tmp/db".to_string(),
            bind_addr: "127.0.0.1:8085".to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_api_key: "key".to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
        };
        assert!(config.llm_base_url.starts_with("https://"));
        assert!(!config.llm_model.is_empty());
    }
}
