// Copyright 2025 Discusync Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod analysis;
pub mod discussion;
pub mod flow;
pub mod job;
pub mod serde_utils;
pub mod task_record;
pub mod user_mapping;

/// Reserved literal identity stamped into `created_by`/`updated_by` for
/// automated writes.
pub const SYSTEM_IDENTITY: &str = "system";

pub use flow::{
    chat_metadata_value, ChatWorkspaceMetadata, EmailSourceMetadata, Flow, FlowCreate, FlowInput,
    FlowInputCreate, FlowOutput, FlowOutputCreate, FlowWithRelations, LegacyConfig, OutputType,
    ResolvedRoute, SourceType,
};

pub use discussion::{
    Discussion, DiscussionCreate, DiscussionStatus, ParsedDiscussion, Thread, ThreadMessage,
};

pub use job::{Job, JobCreate, JobStage, JobStatus, DEFAULT_MAX_ATTEMPTS};

pub use task_record::{TaskRecord, TaskRecordCreate, TaskRef};

pub use user_mapping::{MappedUser, MappingSnapshot, UserMapping, UserMappingCreate};

pub use analysis::{
    AnalysisResult, DetectedTask, TaskDetection, TaskKind, TaskPriority, ThreadSummary,
};
