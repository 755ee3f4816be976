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

//! The six-stage discussion processor.
//!
//! ```text
//! 1 ingestion/validation -> 2 flow loading + job row (+ 2.5 mapping
//! prefetch) -> 3 thread building -> 4 AI analysis -> 5 task fan-out ->
//! 6 notification
//! ```
//!
//! One pipeline instance per webhook; stages run strictly in order and
//! every piece of per-discussion state travels in an explicit
//! [`StageContext`]; there is no hidden module state. Failures in stages
//! 1–5 bubble to the top-level boundary, which finalizes the job and the
//! discussion as failed. Stage 6 is best-effort and can never fail the
//! job.
//!
//! A retry is a fresh `process` pass over the stored discussion: a new
//! job row (attempts stay 0, `metadata.is_retry` set), the original rows
//! untouched, and the upstream fetch skipped when a thread snapshot is
//! already stored.

use crate::analyzer::{AnalyzeOptions, ThreadAnalyzer};
use crate::models::{
    AnalysisResult, Discussion, DiscussionCreate, DiscussionStatus, JobCreate, JobStage,
    MappingSnapshot, ParsedDiscussion, ResolvedRoute, SourceType, TaskDetection, TaskRecordCreate,
    TaskRef, Thread, ThreadSummary, SYSTEM_IDENTITY,
};
use crate::notion::{NotionOutputConfig, TaskSink, TaskWriteRequest, WritePacer, WriteError};
use crate::pipeline::mentions::{self, BotIdentity};
use crate::pipeline::retry::{with_retry, RetryConfig};
use crate::pipeline::{router, PipelineError};
use crate::sources::{SourceAdapter, SourceAuth, SourceError, StatusMarker, ThreadHint};
use crate::store::{DiscussionStore, FlowStore, JobStore, TaskRecordStore, UserMappingStore};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Adapters keyed by source type; the orchestrator never switches on the
/// discriminator beyond this lookup.
pub struct AdapterSet {
    chat: Arc<dyn SourceAdapter>,
    design_email: Arc<dyn SourceAdapter>,
}

impl AdapterSet {
    pub fn new(chat: Arc<dyn SourceAdapter>, design_email: Arc<dyn SourceAdapter>) -> Self {
        Self { chat, design_email }
    }

    pub fn for_source(&self, source_type: SourceType) -> Arc<dyn SourceAdapter> {
        match source_type {
            SourceType::Chat => Arc::clone(&self.chat),
            SourceType::DesignEmail => Arc::clone(&self.design_email),
        }
    }
}

/// Outcome of the best-effort notification stage: attempted calls and how
/// many of them failed. Logged and surfaced, never propagated as an
/// error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub attempted: u32,
    pub failed: u32,
}

impl NotificationReport {
    fn record(&mut self, ok: bool) {
        self.attempted += 1;
        if !ok {
            self.failed += 1;
        }
    }
}

/// Result of one completed pipeline pass.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub job_id: String,
    pub discussion_id: String,
    /// TaskRecord row ids in persisted order
    pub task_record_ids: Vec<String>,
    /// External page urls, for callers that surface them
    pub task_urls: Vec<String>,
    pub analysis_cached: bool,
    pub processing_time_ms: u64,
    pub notification: NotificationReport,
}

/// Everything the stages share for one discussion, threaded explicitly.
struct StageContext<'a> {
    tenant_id: String,
    discussion_id: String,
    job_id: String,
    route: &'a ResolvedRoute,
    auth: SourceAuth,
    adapter: &'a dyn SourceAdapter,
    parsed: &'a ParsedDiscussion,
    existing: Option<&'a Discussion>,
    started: Instant,
}

/// One successful page write, pending TaskRecord persistence.
struct WrittenTask {
    task_index: usize,
    output_id: Option<String>,
    task_ref: TaskRef,
}

/// The six-stage orchestrator. All collaborators are injected.
pub struct DiscussionProcessor {
    flows: Arc<FlowStore>,
    discussions: Arc<DiscussionStore>,
    jobs: Arc<JobStore>,
    tasks: Arc<TaskRecordStore>,
    mappings: Arc<UserMappingStore>,
    adapters: AdapterSet,
    analyzer: Arc<dyn ThreadAnalyzer>,
    sink: Arc<dyn TaskSink>,
    source_retry: RetryConfig,
    write_retry: RetryConfig,
}

impl DiscussionProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flows: Arc<FlowStore>,
        discussions: Arc<DiscussionStore>,
        jobs: Arc<JobStore>,
        tasks: Arc<TaskRecordStore>,
        mappings: Arc<UserMappingStore>,
        adapters: AdapterSet,
        analyzer: Arc<dyn ThreadAnalyzer>,
        sink: Arc<dyn TaskSink>,
    ) -> Self {
        Self {
            flows,
            discussions,
            jobs,
            tasks,
            mappings,
            adapters,
            analyzer,
            sink,
            source_retry: RetryConfig::default(),
            write_retry: RetryConfig::default(),
        }
    }

    /// Processes one parsed webhook end to end.
    #[instrument(name = "process_discussion", skip_all, fields(source_type = %parsed.source_type, thread_id = %parsed.source_thread_id))]
    pub async fn process(&self, parsed: ParsedDiscussion) -> Result<PipelineOutcome, PipelineError> {
        self.run(parsed, None, false).await
    }

    /// Re-processes a stored discussion: fresh job row, original rows
    /// untouched, thread fetch skipped when a snapshot is stored.
    #[instrument(name = "retry_discussion", skip(self))]
    pub async fn retry(&self, discussion_id: &str) -> Result<PipelineOutcome, PipelineError> {
        let discussion = self
            .discussions
            .get(discussion_id)
            .await?
            .ok_or_else(|| PipelineError::DiscussionNotFound(discussion_id.to_string()))?;

        let parsed = ParsedDiscussion {
            source_type: discussion.source_type,
            source_thread_id: discussion.source_thread_id.clone(),
            source_url: discussion.source_url.clone(),
            routing_key: String::new(),
            author_handle: discussion.author_handle.clone(),
            title: discussion.title.clone(),
            content: discussion.content.clone(),
            participants: discussion.participants.clone(),
            metadata: discussion.metadata.clone(),
        };
        self.run(parsed, Some(discussion), true).await
    }

    async fn run(
        &self,
        parsed: ParsedDiscussion,
        existing: Option<Discussion>,
        is_retry: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();

        // Stage 1: validation
        validate(&parsed, is_retry)?;

        // Stage 2: flow/config loading
        let route = if is_retry {
            let input_id = existing
                .as_ref()
                .map(|d| d.input_id.clone())
                .unwrap_or_default();
            self.flows
                .resolve_by_input(&input_id)
                .await?
                .ok_or_else(|| PipelineError::FlowNotFound {
                    source_type: parsed.source_type,
                    routing_key: input_id,
                })?
        } else {
            self.flows
                .resolve_route(parsed.source_type, &parsed.routing_key)
                .await?
                .ok_or_else(|| PipelineError::FlowNotFound {
                    source_type: parsed.source_type,
                    routing_key: parsed.routing_key.clone(),
                })?
        };

        // The routing key identified the flow; from here on the tenant is
        // the flow's owner
        let tenant_id = route.tenant_id().to_string();
        let auth = SourceAuth::new(route.api_token(), route.source_metadata().clone());
        let adapter = self.adapters.for_source(parsed.source_type);

        // Stage 1's "seen" marker, deferred until credentials are known.
        // Best-effort; email placeholders are not markable yet.
        self.best_effort_status(
            adapter.as_ref(),
            &parsed.source_thread_id,
            StatusMarker::Pending,
            &auth,
        )
        .await;

        let (flow_id, input_id) = match &route {
            ResolvedRoute::Flow(f) => (Some(f.flow.id.clone()), f.matched_input.id.clone()),
            ResolvedRoute::Legacy(c) => (None, c.id.clone()),
        };

        let discussion_id = match &existing {
            Some(d) => d.id.clone(),
            None => {
                self.discussions
                    .create(DiscussionCreate {
                        tenant_id: tenant_id.clone(),
                        source_type: parsed.source_type.to_string(),
                        source_thread_id: parsed.source_thread_id.clone(),
                        source_url: parsed.source_url.clone(),
                        flow_id: flow_id.clone(),
                        input_id: input_id.clone(),
                        title: parsed.title.clone(),
                        content: parsed.content.clone(),
                        author_handle: parsed.author_handle.clone(),
                        participants: parsed.participants.clone(),
                        status: DiscussionStatus::Pending.to_string(),
                        raw_payload: Some(serde_json::to_value(&parsed).unwrap_or_default()),
                        metadata: parsed.metadata.clone(),
                        created_by: SYSTEM_IDENTITY.to_string(),
                        updated_by: SYSTEM_IDENTITY.to_string(),
                    })
                    .await?
            }
        };

        // A new job row per attempt; the chain lives under discussion_id
        let job_id = self
            .jobs
            .create(JobCreate::begin(
                tenant_id.clone(),
                discussion_id.clone(),
                input_id,
                flow_id,
                is_retry,
            ))
            .await?;
        self.discussions.link_job(&discussion_id, &job_id).await?;
        if is_retry {
            self.discussions
                .set_status(&discussion_id, DiscussionStatus::Processing)
                .await?;
        }

        let context = StageContext {
            tenant_id,
            discussion_id: discussion_id.clone(),
            job_id: job_id.clone(),
            route: &route,
            auth,
            adapter: adapter.as_ref(),
            parsed: &parsed,
            existing: existing.as_ref(),
            started,
        };

        // From here every failure finalizes the ledger
        match self.run_stages(&context).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let stack = format!("{:?}", e);
                if let Err(store_err) = self.jobs.fail(&job_id, &e.to_string(), Some(&stack)).await
                {
                    error!(error = %store_err, "Failed to finalize job as failed");
                }
                if let Err(store_err) = self
                    .discussions
                    .mark_failed(&discussion_id, &e.to_string())
                    .await
                {
                    error!(error = %store_err, "Failed to finalize discussion as failed");
                }
                self.best_effort_status(
                    context.adapter,
                    &parsed.source_thread_id,
                    StatusMarker::Failed,
                    &context.auth,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, ctx: &StageContext<'_>) -> Result<PipelineOutcome, PipelineError> {
        // Stage 2.5: mapping prefetch, held for stages 3-5
        let workspace = mapping_workspace(ctx.route, ctx.parsed);
        let mapping = self
            .mappings
            .snapshot(&ctx.tenant_id, ctx.parsed.source_type, &workspace)
            .await?;
        let bot = bot_identity(ctx.route, ctx.parsed.source_type);
        if bot.is_empty() {
            warn!("No bot identity in source metadata; skipping self-mention stripping");
        }

        // Stage 3: thread building
        self.jobs
            .set_stage(&ctx.job_id, JobStage::ThreadBuilding)
            .await?;
        let thread = match ctx.existing.and_then(|d| d.stored_thread()) {
            Some(stored) => {
                debug!("Reusing stored thread snapshot");
                stored
            }
            None => {
                let hint = ThreadHint::from_parsed(ctx.parsed);
                with_retry(
                    || {
                        ctx.adapter
                            .fetch_thread(&ctx.parsed.source_thread_id, &ctx.auth, &hint)
                    },
                    &self.source_retry,
                    SourceError::is_retryable,
                )
                .await?
            }
        };
        self.discussions
            .apply_thread(&ctx.discussion_id, &thread)
            .await?;
        let rewritten = mentions::rewrite_thread(&thread, &mapping, &bot);
        // Re-emit the marker now that the thread id is canonical
        self.best_effort_status(
            ctx.adapter,
            &thread.source_thread_id,
            StatusMarker::Pending,
            &ctx.auth,
        )
        .await;

        // Stage 4: AI analysis
        self.jobs
            .set_stage(&ctx.job_id, JobStage::AiAnalysis)
            .await?;
        let (options, ai_enabled) = analysis_options(ctx.route);
        let analysis = if ai_enabled {
            self.analyzer.analyze(&rewritten, &options).await?
        } else {
            debug!("AI disabled for this flow; skipping analysis");
            AnalysisResult {
                summary: ThreadSummary::default(),
                task_detection: TaskDetection::default(),
                processing_time_ms: 0,
                cached: false,
            }
        };
        self.discussions
            .set_analysis(&ctx.discussion_id, &analysis.summary, &analysis.task_detection)
            .await?;

        // Stage 5: task fan-out
        self.jobs
            .set_stage(&ctx.job_id, JobStage::TaskCreation)
            .await?;
        let (record_ids, task_urls) = self
            .write_tasks(ctx, &analysis, &rewritten, &mapping)
            .await?;

        // Stage 6: best-effort notification
        self.jobs
            .set_stage(&ctx.job_id, JobStage::Notification)
            .await?;
        let notification = self
            .notify(ctx.adapter, &thread.source_thread_id, &task_urls, &ctx.auth)
            .await;

        // Finalization
        let processing_time_ms = ctx.started.elapsed().as_millis() as u64;
        self.jobs
            .complete(&ctx.job_id, processing_time_ms, &record_ids)
            .await?;
        self.discussions
            .set_status(&ctx.discussion_id, DiscussionStatus::Completed)
            .await?;

        info!(
            job_id = %ctx.job_id,
            tasks = record_ids.len(),
            processing_time_ms = processing_time_ms,
            cached = analysis.cached,
            "Discussion processing completed"
        );

        Ok(PipelineOutcome {
            job_id: ctx.job_id.clone(),
            discussion_id: ctx.discussion_id.clone(),
            task_record_ids: record_ids,
            task_urls,
            analysis_cached: analysis.cached,
            processing_time_ms,
            notification,
        })
    }

    /// Stage 5 body: route every task, write per-output batches, persist
    /// TaskRecord rows, then update the discussion once with the
    /// collected ids (in that order).
    async fn write_tasks(
        &self,
        ctx: &StageContext<'_>,
        analysis: &AnalysisResult,
        thread: &Thread,
        mapping: &MappingSnapshot,
    ) -> Result<(Vec<String>, Vec<String>), PipelineError> {
        let tasks = &analysis.task_detection.tasks;
        if tasks.is_empty() {
            debug!("No tasks detected; skipping task creation");
            return Ok((Vec::new(), Vec::new()));
        }

        // Group task indices per output, preserving output order within
        // the flow. Routing faults (default invariant) fail the job here.
        let mut batches: Vec<(Option<String>, NotionOutputConfig, Vec<usize>)> = Vec::new();
        let mut config_errors: Vec<String> = Vec::new();

        match ctx.route {
            ResolvedRoute::Flow(f) => {
                let mut per_output: HashMap<String, Vec<usize>> = HashMap::new();
                for (index, task) in tasks.iter().enumerate() {
                    let routed = router::route(task.domain.as_deref(), &f.outputs)?;
                    for output in routed {
                        per_output.entry(output.id.clone()).or_default().push(index);
                    }
                }
                for output in &f.outputs {
                    let Some(indices) = per_output.remove(&output.id) else {
                        continue;
                    };
                    match NotionOutputConfig::from_value(&output.output_config) {
                        Ok(config) => batches.push((Some(output.id.clone()), config, indices)),
                        Err(e) => {
                            warn!(output = %output.name, error = %e, "Skipping output with invalid config");
                            config_errors.push(format!("output {}: {}", output.name, e));
                        }
                    }
                }
            }
            ResolvedRoute::Legacy(config) => {
                batches.push((
                    None,
                    NotionOutputConfig::from_legacy(config),
                    (0..tasks.len()).collect(),
                ));
            }
        }

        let is_multi = analysis.task_detection.is_multi_task || tasks.len() > 1;

        // Batches run concurrently; writes within one batch are serial,
        // paced, and ordered as the analyzer returned the tasks
        let batch_futures = batches.iter().map(|(output_id, config, indices)| async move {
            let pacer = WritePacer::new();
            let mut written: Vec<WrittenTask> = Vec::new();
            let mut failures: Vec<(usize, WriteError)> = Vec::new();

            for &index in indices {
                pacer.wait_if_needed().await;
                let request = TaskWriteRequest {
                    task: &tasks[index],
                    task_index: index,
                    is_multi_task_child: is_multi,
                    thread,
                    summary: &analysis.summary,
                    mentions: mapping,
                    config,
                    source_type: ctx.parsed.source_type,
                    source_url: &thread.source_url,
                    author_handle: &ctx.parsed.author_handle,
                    detection_confidence: analysis.task_detection.confidence,
                };

                let result = with_retry(
                    || self.sink.create_task(&request),
                    &self.write_retry,
                    WriteError::is_retryable,
                )
                .await;

                match result {
                    Ok(task_ref) => written.push(WrittenTask {
                        task_index: index,
                        output_id: output_id.clone(),
                        task_ref,
                    }),
                    Err(e) => {
                        // First definitive failure aborts this batch;
                        // sibling outputs keep going
                        warn!(task_index = index, error = %e, "Task write failed; aborting batch");
                        failures.push((index, e));
                        break;
                    }
                }
            }

            (written, failures)
        });

        let results = join_all(batch_futures).await;

        let mut written: Vec<WrittenTask> = Vec::new();
        let mut error_strings = config_errors;
        let mut first_error: Option<WriteError> = None;
        for (batch_written, batch_failures) in results {
            written.extend(batch_written);
            for (index, e) in batch_failures {
                error_strings.push(format!("task {}: {}", index, e));
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if !error_strings.is_empty() {
            self.jobs
                .record_output_errors(&ctx.job_id, &error_strings)
                .await?;
        }

        // Nothing landed anywhere: the stage failed outright
        if written.is_empty() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
            if !error_strings.is_empty() {
                return Err(PipelineError::Storage(error_strings.join("; ")));
            }
            return Ok((Vec::new(), Vec::new()));
        }

        // Deterministic persistence order: analyzer order, then output
        written.sort_by_key(|w| w.task_index);

        let creates: Vec<TaskRecordCreate> = written
            .iter()
            .map(|w| {
                let task = &tasks[w.task_index];
                TaskRecordCreate {
                    tenant_id: ctx.tenant_id.clone(),
                    discussion_id: ctx.discussion_id.clone(),
                    job_id: ctx.job_id.clone(),
                    dest_page_id: w.task_ref.id.clone(),
                    dest_page_url: w.task_ref.url.clone(),
                    title: task.title.clone(),
                    description: task.description.clone(),
                    priority: task.priority.map(|p| p.to_string()),
                    assignee: task.assignee.clone(),
                    source_url: thread.source_url.clone(),
                    is_multi_task_child: is_multi,
                    task_index: is_multi.then_some(w.task_index as u32),
                    metadata: serde_json::json!({
                        "output_id": w.output_id,
                        "domain": task.domain,
                    }),
                    created_by: SYSTEM_IDENTITY.to_string(),
                    updated_by: SYSTEM_IDENTITY.to_string(),
                }
            })
            .collect();

        let task_urls: Vec<String> = written.iter().map(|w| w.task_ref.url.clone()).collect();

        // (a) external writes happened above, (b) all TaskRecord rows,
        // (c) one discussion update with the collected ids
        let record_ids = self.tasks.insert_many(creates).await?;
        self.discussions
            .set_task_record_ids(&ctx.discussion_id, &record_ids)
            .await?;

        Ok((record_ids, task_urls))
    }

    /// Stage 6: remove the pending marker, post the task-link reply, set
    /// the completed marker. Every call is attempted; outcomes are
    /// counted and logged only.
    async fn notify(
        &self,
        adapter: &dyn SourceAdapter,
        thread_id: &str,
        task_urls: &[String],
        auth: &SourceAuth,
    ) -> NotificationReport {
        let mut report = NotificationReport::default();

        let removed = match adapter
            .remove_status(thread_id, StatusMarker::Pending, auth)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to remove pending marker");
                false
            }
        };
        report.record(removed);

        let text = reply_text(task_urls);
        let replied = match adapter.post_reply(thread_id, &text, auth).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to post completion reply");
                false
            }
        };
        report.record(replied);

        let marked = self
            .best_effort_status(adapter, thread_id, StatusMarker::Completed, auth)
            .await;
        report.record(marked);

        info!(
            attempted = report.attempted,
            failed = report.failed,
            "Notification stage finished"
        );
        report
    }

    async fn best_effort_status(
        &self,
        adapter: &dyn SourceAdapter,
        thread_id: &str,
        marker: StatusMarker,
        auth: &SourceAuth,
    ) -> bool {
        match adapter.update_status(thread_id, marker, auth).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, marker = %marker, "Best-effort status update failed");
                false
            }
        }
    }
}

/// Stage 1: every required string field must be non-empty.
fn validate(parsed: &ParsedDiscussion, is_retry: bool) -> Result<(), PipelineError> {
    let mut missing = Vec::new();
    if parsed.source_thread_id.trim().is_empty() {
        missing.push("source_thread_id");
    }
    if !is_retry && parsed.routing_key.trim().is_empty() {
        missing.push("routing_key");
    }
    if parsed.author_handle.trim().is_empty() {
        missing.push("author_handle");
    }
    if parsed.title.trim().is_empty() {
        missing.push("title");
    }
    // Email bodies may arrive later (stage 3); chat content never does
    if parsed.source_type == SourceType::Chat && parsed.content.trim().is_empty() {
        missing.push("content");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation(format!(
            "missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// The workspace scope for user mappings: chat workspace id, or the email
/// slug for design sources.
fn mapping_workspace(route: &ResolvedRoute, parsed: &ParsedDiscussion) -> String {
    match route {
        ResolvedRoute::Flow(f) => match f.matched_input.source_type {
            SourceType::Chat => f
                .matched_input
                .chat_metadata()
                .map(|m| m.workspace_id)
                .unwrap_or_else(|_| parsed.routing_key.clone()),
            SourceType::DesignEmail => f
                .matched_input
                .email_slug
                .clone()
                .unwrap_or_else(|| parsed.routing_key.clone()),
        },
        ResolvedRoute::Legacy(c) => c
            .chat_metadata()
            .map(|m| m.workspace_id)
            .unwrap_or_else(|_| parsed.routing_key.clone()),
    }
}

fn bot_identity(route: &ResolvedRoute, source_type: SourceType) -> BotIdentity {
    match source_type {
        SourceType::Chat => {
            let meta: Option<crate::models::ChatWorkspaceMetadata> =
                serde_json::from_value(route.source_metadata().clone()).ok();
            match meta {
                Some(m) => BotIdentity::new(m.bot_user_id, m.bot_handle),
                None => BotIdentity::default(),
            }
        }
        SourceType::DesignEmail => {
            let meta: crate::models::EmailSourceMetadata =
                serde_json::from_value(route.source_metadata().clone()).unwrap_or_default();
            BotIdentity::new(None, meta.bot_handle)
        }
    }
}

fn analysis_options(route: &ResolvedRoute) -> (AnalyzeOptions, bool) {
    match route {
        ResolvedRoute::Flow(f) => (
            AnalyzeOptions {
                available_domains: f.flow.available_domains.clone(),
                summary_template: f.flow.summary_prompt_template.clone(),
                task_template: f.flow.task_prompt_template.clone(),
            },
            f.flow.ai_enabled,
        ),
        ResolvedRoute::Legacy(_) => (AnalyzeOptions::default(), true),
    }
}

/// The completion reply: one line per task, or the empty-result note.
fn reply_text(task_urls: &[String]) -> String {
    if task_urls.is_empty() {
        return "Processed this thread. (no tasks created)".to_string();
    }
    let mut text = format!("Created {} task(s):", task_urls.len());
    for url in task_urls {
        text.push_str("\n• ");
        text.push_str(url);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(source_type: SourceType) -> ParsedDiscussion {
        ParsedDiscussion {
            source_type,
            source_thread_id: "C01:1700000000.000100".to_string(),
            source_url: "https://chat.example.com/archives/C01/p1".to_string(),
            routing_key: "T01".to_string(),
            author_handle: "U1".to_string(),
            title: "Broken export".to_string(),
            content: "The export button is broken".to_string(),
            participants: vec!["U1".to_string()],
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_validate_accepts_complete_parse() {
        assert!(validate(&parsed(SourceType::Chat), false).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut p = parsed(SourceType::Chat);
        p.title = "   ".to_string();
        let err = validate(&p, false).unwrap_err();
        assert!(err.to_string().contains("title"));

        let mut p = parsed(SourceType::Chat);
        p.content = String::new();
        assert!(validate(&p, false).is_err());
    }

    #[test]
    fn test_validate_email_content_may_be_empty() {
        let mut p = parsed(SourceType::DesignEmail);
        p.content = String::new();
        assert!(validate(&p, false).is_ok());
    }

    #[test]
    fn test_validate_retry_skips_routing_key() {
        let mut p = parsed(SourceType::Chat);
        p.routing_key = String::new();
        assert!(validate(&p, false).is_err());
        assert!(validate(&p, true).is_ok());
    }

    #[test]
    fn test_reply_text_lists_urls_one_per_line() {
        let urls = vec![
            "https://kb.example.com/p1".to_string(),
            "https://kb.example.com/p2".to_string(),
        ];
        let text = reply_text(&urls);
        assert!(text.starts_with("Created 2 task(s):"));
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("• https://kb.example.com/p1"));
    }

    #[test]
    fn test_reply_text_empty() {
        assert_eq!(
            reply_text(&[]),
            "Processed this thread. (no tasks created)"
        );
    }

    #[test]
    fn test_notification_report_counts() {
        let mut report = NotificationReport::default();
        report.record(true);
        report.record(false);
        report.record(true);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 1);
    }
}
