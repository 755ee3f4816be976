// Copyright 2025 Discusync Contributors
// SPDX-License-Identifier: Apache-2.0

//! Store layer: one module per table, owning all SurrealQL.
//!
//! The orchestrator receives these stores at construction (dependency
//! injection); no store is ever reached through hidden module state or
//! deferred lookups.

pub mod discussions;
pub mod flows;
pub mod jobs;
pub mod mappings;
pub mod tasks;

pub use discussions::DiscussionStore;
pub use flows::FlowStore;
pub use jobs::JobStore;
pub use mappings::UserMappingStore;
pub use tasks::{TaskOrigin, TaskRecordStore};
