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

//! Page-body block builders.
//!
//! The page body for one task, in order: summary callout, action-item
//! checklist, collapsible discussion context (key points), participant
//! paragraph with inline mentions, divider, collapsible full transcript,
//! metadata list, source deep-link.
//!
//! Mention encoding: a participant resolvable through the mapping
//! snapshot becomes a `mention.user` object referencing the destination
//! user id; unresolved participants fall back to literal `@id` text.

use super::TaskWriteRequest;
use crate::models::MappingSnapshot;
use chrono::Utc;
use serde_json::{json, Value};

/// Transcript messages are capped to keep page payloads inside the
/// vendor's block limits.
const TRANSCRIPT_MESSAGE_CAP: usize = 50;

fn text_rich(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

fn mention_rich(dest_user_id: &str) -> Value {
    json!({
        "type": "mention",
        "mention": { "type": "user", "user": { "object": "user", "id": dest_user_id } }
    })
}

fn paragraph(rich_text: Vec<Value>) -> Value {
    json!({ "object": "block", "type": "paragraph", "paragraph": { "rich_text": rich_text } })
}

fn callout(content: &str, emoji: &str) -> Value {
    json!({
        "object": "block",
        "type": "callout",
        "callout": {
            "rich_text": [text_rich(content)],
            "icon": { "type": "emoji", "emoji": emoji }
        }
    })
}

fn to_do(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "to_do",
        "to_do": { "rich_text": [text_rich(content)], "checked": false }
    })
}

fn bulleted(content: &str) -> Value {
    json!({
        "object": "block",
        "type": "bulleted_list_item",
        "bulleted_list_item": { "rich_text": [text_rich(content)] }
    })
}

fn toggle(title: &str, children: Vec<Value>) -> Value {
    json!({
        "object": "block",
        "type": "toggle",
        "toggle": { "rich_text": [text_rich(title)], "children": children }
    })
}

fn divider() -> Value {
    json!({ "object": "block", "type": "divider", "divider": {} })
}

fn bookmark(url: &str) -> Value {
    json!({ "object": "block", "type": "bookmark", "bookmark": { "url": url } })
}

/// Rich-text run for one participant: mention when resolvable, literal
/// `@id` text otherwise.
fn participant_rich(participant: &str, mentions: &MappingSnapshot) -> Value {
    let mapped = mentions
        .by_id(participant)
        .or_else(|| mentions.by_handle(participant));
    match mapped {
        Some(user) => mention_rich(&user.dest_user_id),
        None => text_rich(&format!("@{}", participant)),
    }
}

/// Builds the full ordered block body for one task page.
pub fn build_page_children(request: &TaskWriteRequest<'_>) -> Vec<Value> {
    let mut children = Vec::new();

    // (i) Summary callout
    children.push(callout(&request.summary.text, "💬"));

    // (ii) Action-item checklist
    if let Some(items) = &request.task.action_items {
        for item in items {
            children.push(to_do(item));
        }
    }

    // (iii) Collapsible discussion context: global key points
    if !request.summary.key_points.is_empty() {
        let points: Vec<Value> = request
            .summary
            .key_points
            .iter()
            .map(|p| bulleted(p))
            .collect();
        children.push(toggle("Discussion context", points));
    }

    // (iv) Participant paragraph with inline mentions
    let mut participant_runs = vec![text_rich("Participants: ")];
    for (i, participant) in request.thread.participants.iter().enumerate() {
        if i > 0 {
            participant_runs.push(text_rich(", "));
        }
        participant_runs.push(participant_rich(participant, request.mentions));
    }
    children.push(paragraph(participant_runs));

    // (v) Divider
    children.push(divider());

    // (vi) Full transcript, collapsed
    let transcript: Vec<Value> = request
        .thread
        .messages()
        .take(TRANSCRIPT_MESSAGE_CAP)
        .map(|m| {
            let author = m
                .author_handle
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(&m.author_id);
            paragraph(vec![text_rich(&format!("{}: {}", author, m.content))])
        })
        .collect();
    children.push(toggle("Full thread", transcript));

    // (vii) Metadata list
    children.push(bulleted(&format!("Source: {}", request.source_type)));
    children.push(bulleted(&format!(
        "Thread: {}",
        request.thread.source_thread_id
    )));
    children.push(bulleted(&format!(
        "Replies: {}",
        request.thread.replies.len()
    )));
    let created_by = vec![
        text_rich("Created from a report by "),
        participant_rich(request.author_handle, request.mentions),
    ];
    children.push(paragraph(created_by));
    if let Some(priority) = &request.task.priority {
        children.push(bulleted(&format!("Priority: {}", priority)));
    }
    if let Some(sentiment) = &request.summary.sentiment {
        children.push(bulleted(&format!("Sentiment: {}", sentiment)));
    }
    if let Some(confidence) = request.detection_confidence {
        children.push(bulleted(&format!("Confidence: {:.2}", confidence)));
    }
    children.push(bulleted(&format!(
        "Captured: {}",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    )));

    // (viii) Source deep-link
    children.push(bookmark(request.source_url));

    children
}

/// Builds the title property value.
pub fn title_property_value(title: &str) -> Value {
    json!({ "title": [text_rich(title)] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DetectedTask, SourceType, TaskPriority, Thread, ThreadMessage, ThreadSummary, UserMapping,
    };
    use crate::notion::NotionOutputConfig;

    fn snapshot() -> MappingSnapshot {
        MappingSnapshot::from_mappings(&[UserMapping {
            id: "um-1".to_string(),
            tenant_id: "t-1".to_string(),
            source_type: SourceType::Chat,
            source_workspace_id: "T01".to_string(),
            source_user_id: "U1".to_string(),
            source_user_name: Some("ana".to_string()),
            dest_user_id: "kb-ana".to_string(),
            dest_user_name: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }])
    }

    fn thread() -> Thread {
        Thread {
            source_thread_id: "C01:1700000000.000100".to_string(),
            source_url: "https://chat.example.com/archives/C01/p1".to_string(),
            root: ThreadMessage {
                author_id: "U1".to_string(),
                author_handle: Some("ana".to_string()),
                content: "The export button is broken".to_string(),
                timestamp: None,
            },
            replies: vec![ThreadMessage {
                author_id: "U2".to_string(),
                author_handle: None,
                content: "Confirmed".to_string(),
                timestamp: None,
            }],
            participants: vec!["U1".to_string(), "U2".to_string()],
        }
    }

    fn task() -> DetectedTask {
        DetectedTask {
            title: "Fix export".to_string(),
            description: Some("500 on large datasets".to_string()),
            priority: Some(TaskPriority::High),
            task_type: None,
            assignee: None,
            due_date: None,
            tags: None,
            domain: Some("dev".to_string()),
            action_items: Some(vec!["Reproduce locally".to_string(), "Add test".to_string()]),
        }
    }

    fn summary() -> ThreadSummary {
        ThreadSummary {
            text: "Export is broken on large datasets".to_string(),
            key_points: vec!["500 error".to_string(), "staging affected".to_string()],
            sentiment: Some("negative".to_string()),
            confidence: Some(0.9),
            domain: Some("dev".to_string()),
        }
    }

    #[test]
    fn test_page_children_order_and_contents() {
        let config = NotionOutputConfig {
            database_id: "db-1".to_string(),
            api_token: "secret".to_string(),
            field_mapping: None,
            title_property: None,
        };
        let thread = thread();
        let task = task();
        let summary = summary();
        let mentions = snapshot();
        let request = TaskWriteRequest {
            task: &task,
            task_index: 0,
            is_multi_task_child: false,
            thread: &thread,
            summary: &summary,
            mentions: &mentions,
            config: &config,
            source_type: SourceType::Chat,
            source_url: "https://chat.example.com/archives/C01/p1",
            author_handle: "U1",
            detection_confidence: Some(0.8),
        };

        let children = build_page_children(&request);

        // (i) callout first
        assert_eq!(children[0]["type"], "callout");
        assert_eq!(
            children[0]["callout"]["rich_text"][0]["text"]["content"],
            "Export is broken on large datasets"
        );
        // (ii) two unchecked to_dos
        assert_eq!(children[1]["type"], "to_do");
        assert_eq!(children[2]["type"], "to_do");
        assert_eq!(children[1]["to_do"]["checked"], false);
        // (iii) context toggle with key points
        assert_eq!(children[3]["type"], "toggle");
        assert_eq!(
            children[3]["toggle"]["children"].as_array().unwrap().len(),
            2
        );
        // (iv) participant paragraph: U1 resolves to a mention, U2 to text
        let runs = children[4]["paragraph"]["rich_text"].as_array().unwrap();
        assert_eq!(runs[1]["type"], "mention");
        assert_eq!(runs[1]["mention"]["user"]["id"], "kb-ana");
        assert_eq!(runs[3]["type"], "text");
        assert_eq!(runs[3]["text"]["content"], "@U2");
        // (v) divider
        assert_eq!(children[5]["type"], "divider");
        // (vi) transcript toggle with both messages
        assert_eq!(children[6]["type"], "toggle");
        assert_eq!(
            children[6]["toggle"]["children"].as_array().unwrap().len(),
            2
        );
        // (viii) bookmark last
        let last = children.last().unwrap();
        assert_eq!(last["type"], "bookmark");
        assert_eq!(
            last["bookmark"]["url"],
            "https://chat.example.com/archives/C01/p1"
        );
    }

    #[test]
    fn test_metadata_includes_reply_count_and_priority() {
        let config = NotionOutputConfig {
            database_id: "db-1".to_string(),
            api_token: "secret".to_string(),
            field_mapping: None,
            title_property: None,
        };
        let thread = thread();
        let task = task();
        let summary = summary();
        let mentions = snapshot();
        let request = TaskWriteRequest {
            task: &task,
            task_index: 0,
            is_multi_task_child: false,
            thread: &thread,
            summary: &summary,
            mentions: &mentions,
            config: &config,
            source_type: SourceType::Chat,
            source_url: "https://chat.example.com/archives/C01/p1",
            author_handle: "U1",
            detection_confidence: None,
        };

        let children = build_page_children(&request);
        let rendered = serde_json::to_string(&children).unwrap();
        assert!(rendered.contains("Source: chat"));
        assert!(rendered.contains("Replies: 1"));
        assert!(rendered.contains("Priority: high"));
        assert!(rendered.contains("Sentiment: negative"));
        // No confidence bullet when the analyzer returned null
        assert!(!rendered.contains("Confidence:"));
    }

    #[test]
    fn test_title_property_shape() {
        let value = title_property_value("Fix export");
        assert_eq!(value["title"][0]["text"]["content"], "Fix export");
    }
}
