// Copyright 2025 Discusync Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::analyzer::{LlmAnalyzer, LlmClient};
use crate::config::Config;
use crate::db::DBClient;
use crate::notion::NotionWriter;
use crate::pipeline::{AdapterSet, DiscussionProcessor};
use crate::sources::{ChatAdapter, DesignEmailAdapter, SourceAdapter};
use crate::store::{DiscussionStore, FlowStore, JobStore, TaskRecordStore, UserMappingStore};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across webhook handlers
pub struct AppState {
    /// Database client
    pub db: Arc<DBClient>,
    /// Flow/config resolution store
    pub flows: Arc<FlowStore>,
    /// Discussion store
    pub discussions: Arc<DiscussionStore>,
    /// Job ledger store
    pub jobs: Arc<JobStore>,
    /// Created-task index store
    pub tasks: Arc<TaskRecordStore>,
    /// User identity mapping store
    pub mappings: Arc<UserMappingStore>,
    /// Chat source adapter (webhook parsing)
    pub chat_adapter: Arc<dyn SourceAdapter>,
    /// Design-email source adapter (webhook parsing)
    pub email_adapter: Arc<dyn SourceAdapter>,
    /// The six-stage processor
    pub processor: Arc<DiscussionProcessor>,
}

impl AppState {
    /// Creates new application state: database, stores, shared HTTP
    /// client, adapters, analyzer, writer, and the processor wiring them
    /// together.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Initialize database
        let db = Arc::new(DBClient::new(&config.db_path).await?);
        db.initialize_schema().await?;

        // Stores, one per table
        let flows = Arc::new(FlowStore::new(db.clone()));
        let discussions = Arc::new(DiscussionStore::new(db.clone()));
        let jobs = Arc::new(JobStore::new(db.clone()));
        let tasks = Arc::new(TaskRecordStore::new(db.clone()));
        let mappings = Arc::new(UserMappingStore::new(db.clone()));

        // One HTTP client for every outbound integration (connection
        // pooling); per-call timeouts are set at the call sites
        let http = Arc::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .connect_timeout(Duration::from_secs(3))
                .redirect(reqwest::redirect::Policy::limited(3))
                .build()?,
        );

        let chat_adapter: Arc<dyn SourceAdapter> = Arc::new(ChatAdapter::new(http.clone()));
        let email_adapter: Arc<dyn SourceAdapter> = Arc::new(DesignEmailAdapter::new(http.clone()));

        let analyzer = Arc::new(LlmAnalyzer::new(LlmClient::new(
            http.clone(),
            &config.llm_base_url,
            &config.llm_api_key,
            &config.llm_model,
        )));
        let writer = Arc::new(NotionWriter::new(http));

        let processor = Arc::new(DiscussionProcessor::new(
            flows.clone(),
            discussions.clone(),
            jobs.clone(),
            tasks.clone(),
            mappings.clone(),
            AdapterSet::new(chat_adapter.clone(), email_adapter.clone()),
            analyzer,
            writer,
        ));

        Ok(Self {
            db,
            flows,
            discussions,
            jobs,
            tasks,
            mappings,
            chat_adapter,
            email_adapter,
            processor,
        })
    }
}
