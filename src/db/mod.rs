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

//! # Database Module
//!
//! Provides SurrealDB embedded database functionality for Discusync.
//!
//! ## Overview
//!
//! This module contains:
//! - [`DBClient`] - Database client for CRUD operations
//! - [`schema`] - Database schema definitions (8 tables)
//! - [`utils`] - Payload scrubbing for webhook- and email-derived text
//!
//! ## Tables
//!
//! - `flow` - Tenant pipelines
//! - `flow_input` - Upstream endpoints (routing keys)
//! - `flow_output` - Downstream destinations (domain filters)
//! - `user_mapping` - Upstream/downstream identity mappings
//! - `discussion` - Thread snapshots being processed
//! - `job` - Per-attempt processing ledger
//! - `task_record` - Created-task index
//! - `config` - Legacy single-destination fallback

pub mod client;
pub mod queries;
pub mod schema;
pub mod utils;

pub use client::DBClient;
pub use utils::scrub_payload;
