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

//! # Discusync Backend Library
//!
//! Flow-based ingestion-to-task pipeline: discussion events from a chat
//! platform and a design-tool comment stream (via email events) are
//! analyzed with an LLM and turned into structured task pages in an
//! external knowledge base, with a durable per-attempt job ledger and
//! completion surfaced back to the originating thread.
//!
//! ## Modules
//!
//! - [`webhooks`] - Inbound webhook endpoints (routing + 404 on unknown keys)
//! - [`pipeline`] - The six-stage processor, domain router, mention
//!   rewrite, and retry helper
//! - [`sources`] - Source adapters (chat, design-email) behind one
//!   capability set
//! - [`analyzer`] - LLM analysis with content-hash caching
//! - [`notion`] - Knowledge-base task writer with field mapping and
//!   write pacing
//! - [`store`] - One store per table; all SurrealQL lives here
//! - [`db`] - SurrealDB embedded client and schema
//! - [`models`] - Data model shared across the pipeline
//! - [`state`] - Application state wiring
//!
//! ## Architecture
//!
//! A webhook resolves to a *flow* (N inputs, M outputs) through its
//! routing key, then runs the six stages in order: validation, flow
//! loading + job creation, thread building, AI analysis, task fan-out
//! through the domain router, and best-effort notification. Every
//! attempt is a fresh job row; retries never mutate history.
//!
//! ## Example
//!
//! ```rust,ignore
//! use discusync::{config::Config, state::AppState, webhooks};
//!
//! let config = Config::from_env()?;
//! let state = Arc::new(AppState::new(&config).await?);
//! let app = webhooks::router(state);
//! ```

pub mod analyzer;
pub mod config;
pub mod db;
pub mod models;
pub mod notion;
pub mod pipeline;
pub mod sources;
pub mod state;
pub mod store;
pub mod webhooks;

pub use config::Config;
pub use pipeline::{DiscussionProcessor, PipelineError};
pub use state::AppState;
