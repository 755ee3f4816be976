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

//! Discussion entities: the normalized webhook form and the stored thread
//! snapshot mutated by the pipeline.
//!
//! A [`ParsedDiscussion`] is what a source adapter extracts from a raw
//! webhook payload, independent of source type. A [`Discussion`] is the
//! durable row created in stage 2 and updated at each stage transition,
//! terminal at `completed` or `failed`.

use super::flow::SourceType;
use super::serde_utils::{deserialize_opt_thing_id, deserialize_thing_id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discussion lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    /// Row created, thread not yet built
    #[default]
    Pending,
    /// Pipeline is running
    Processing,
    /// LLM analysis persisted, tasks not yet written
    Analyzed,
    /// Terminal success
    Completed,
    /// Terminal failure
    Failed,
}

impl std::fmt::Display for DiscussionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Analyzed => write!(f, "analyzed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DiscussionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "analyzed" => Ok(Self::Analyzed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid discussion status: {}", s)),
        }
    }
}

/// Normalized form of an incoming webhook, independent of source type.
///
/// Produced by `SourceAdapter::parse_incoming`; purely derived from the
/// payload, no network access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDiscussion {
    pub source_type: SourceType,

    /// Canonical-or-provisional thread identifier. Chat:
    /// `{channel_id}:{thread_ts}` immediately; email sources carry an
    /// `email:{id}` placeholder until the design comment id is known.
    pub source_thread_id: String,

    /// Deep link to the upstream thread
    pub source_url: String,

    /// Workspace id (chat) or email slug (design-email); resolves the flow
    pub routing_key: String,

    /// Author handle or user id as reported upstream
    pub author_handle: String,

    /// Thread title (chat: first line of the root message; email: subject)
    pub title: String,

    /// Root message content
    pub content: String,

    /// Upstream user ids/handles, deduped preserving first-seen order
    pub participants: Vec<String>,

    /// Source-specific extraction leftovers (email id, design file key, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One message inside a fetched thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadMessage {
    /// Upstream user id (chat) or handle (design tool)
    pub author_id: String,

    /// Display handle when the upstream API provides one
    #[serde(default)]
    pub author_handle: Option<String>,

    pub content: String,

    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Ordered root message plus replies plus deduped participant list.
///
/// Replies are in upstream chronological order; participants preserve
/// first-seen order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    /// Canonical thread id (`{channel_id}:{thread_ts}` or
    /// `{file_key}:{comment_id}`)
    pub source_thread_id: String,

    pub source_url: String,

    pub root: ThreadMessage,

    pub replies: Vec<ThreadMessage>,

    /// Deduped upstream user ids, first-seen order
    pub participants: Vec<String>,
}

impl Thread {
    /// Total number of messages (root + replies).
    pub fn message_count(&self) -> usize {
        1 + self.replies.len()
    }

    /// Iterates over all messages, root first.
    pub fn messages(&self) -> impl Iterator<Item = &ThreadMessage> {
        std::iter::once(&self.root).chain(self.replies.iter())
    }

    /// Mutable iteration over all messages, root first.
    pub fn messages_mut(&mut self) -> impl Iterator<Item = &mut ThreadMessage> {
        std::iter::once(&mut self.root).chain(self.replies.iter_mut())
    }
}

/// Durable snapshot of a thread being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    #[serde(deserialize_with = "deserialize_thing_id")]
    pub id: String,

    pub tenant_id: String,
    pub source_type: SourceType,
    pub source_thread_id: String,
    pub source_url: String,

    /// Null in legacy-config mode
    #[serde(default, deserialize_with = "deserialize_opt_thing_id")]
    pub flow_id: Option<String>,

    /// Matched flow input id, or the legacy config id
    pub input_id: String,

    pub title: String,
    pub content: String,

    pub author_handle: String,

    #[serde(default)]
    pub participants: Vec<String>,

    #[serde(default)]
    pub status: DiscussionStatus,

    /// Opaque fetched-thread snapshot (serialized [`Thread`]); lets a retry
    /// skip the upstream fetch
    #[serde(default)]
    pub thread_data: Option<serde_json::Value>,

    #[serde(default)]
    pub ai_summary: Option<String>,

    #[serde(default)]
    pub ai_key_points: Vec<String>,

    /// Raw detected-task list as returned by the analyzer
    #[serde(default)]
    pub ai_tasks: Option<serde_json::Value>,

    /// TaskRecord row ids (never external page ids) in creation order
    #[serde(default)]
    pub notion_task_ids: Vec<String>,

    /// Ledger link to the most recent processing job
    #[serde(default)]
    pub sync_job_id: Option<String>,

    #[serde(default)]
    pub raw_payload: Option<serde_json::Value>,

    #[serde(default)]
    pub metadata: serde_json::Value,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    /// Deserializes the stored thread snapshot, if any.
    pub fn stored_thread(&self) -> Option<Thread> {
        self.thread_data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Discussion creation payload - only fields known at stage 2.
///
/// Author and participants hold placeholders until the thread is built
/// (email sources carry email-address placeholders).
#[derive(Debug, Clone, Serialize)]
pub struct DiscussionCreate {
    pub tenant_id: String,
    pub source_type: String,
    pub source_thread_id: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    pub input_id: String,
    pub title: String,
    pub content: String,
    pub author_handle: String,
    pub participants: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<serde_json::Value>,
    pub metadata: serde_json::Value,
    pub created_by: String,
    pub updated_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_thread() -> Thread {
        Thread {
            source_thread_id: "C01:1700000000.000100".to_string(),
            source_url: "https://chat.example.com/archives/C01/p1700000000000100".to_string(),
            root: ThreadMessage {
                author_id: "U1".to_string(),
                author_handle: Some("ana".to_string()),
                content: "The export button is broken".to_string(),
                timestamp: None,
            },
            replies: vec![
                ThreadMessage {
                    author_id: "U2".to_string(),
                    author_handle: Some("ben".to_string()),
                    content: "Confirmed, reproduces on staging".to_string(),
                    timestamp: None,
                },
            ],
            participants: vec!["U1".to_string(), "U2".to_string()],
        }
    }

    #[test]
    fn test_discussion_status_roundtrip() {
        for status in [
            DiscussionStatus::Pending,
            DiscussionStatus::Processing,
            DiscussionStatus::Analyzed,
            DiscussionStatus::Completed,
            DiscussionStatus::Failed,
        ] {
            let parsed: DiscussionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("done".parse::<DiscussionStatus>().is_err());
    }

    #[test]
    fn test_thread_message_iteration_root_first() {
        let thread = sample_thread();
        let contents: Vec<&str> = thread.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents[0], "The export button is broken");
        assert_eq!(thread.message_count(), 2);
    }

    #[test]
    fn test_thread_snapshot_roundtrip() {
        let thread = sample_thread();
        let value = serde_json::to_value(&thread).unwrap();

        let discussion_json = serde_json::json!({
            "id": "discussion:d-1",
            "tenant_id": "t-1",
            "source_type": "chat",
            "source_thread_id": thread.source_thread_id,
            "source_url": thread.source_url,
            "input_id": "in-1",
            "title": "The export button is broken",
            "content": "The export button is broken",
            "author_handle": "U1",
            "thread_data": value,
            "metadata": {},
        });

        let discussion: Discussion = serde_json::from_value(discussion_json).unwrap();
        assert_eq!(discussion.id, "d-1");
        assert_eq!(discussion.status, DiscussionStatus::Pending);
        let restored = discussion.stored_thread().expect("snapshot should parse");
        assert_eq!(restored, thread);
    }

    #[test]
    fn test_stored_thread_none_when_absent() {
        let discussion_json = serde_json::json!({
            "id": "d-2",
            "tenant_id": "t-1",
            "source_type": "design_email",
            "source_thread_id": "email:em-9",
            "source_url": "https://mail.example.com/em-9",
            "input_id": "in-2",
            "title": "Re: homepage mock",
            "content": "Please fix spacing",
            "author_handle": "reviewer@acme.test",
            "metadata": {},
        });

        let discussion: Discussion = serde_json::from_value(discussion_json).unwrap();
        assert!(discussion.stored_thread().is_none());
        assert!(discussion.flow_id.is_none());
    }
}
