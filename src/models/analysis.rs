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

//! Structured LLM analysis results.
//!
//! The analyzer runs two prompts per thread (summary, task detection) and
//! parses each response into the types below. All optional fields follow
//! the confidence rule: the model returns `null` for anything it is not
//! confident about, and unknown response fields are ignored.
//!
//! `confidence` is display-only. It is persisted and surfaced in the task
//! page metadata but never drives routing.

use serde::{Deserialize, Serialize};

/// Task priority as emitted by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

/// Task category as emitted by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Bug,
    Feature,
    Question,
    Improvement,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bug => write!(f, "bug"),
            Self::Feature => write!(f, "feature"),
            Self::Question => write!(f, "question"),
            Self::Improvement => write!(f, "improvement"),
        }
    }
}

/// One task detected in a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedTask {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: Option<TaskPriority>,

    #[serde(rename = "type", default)]
    pub task_type: Option<TaskKind>,

    /// Downstream user id; the mention-rewrite pass exposes these ids to
    /// the model so it can emit them directly
    #[serde(default)]
    pub assignee: Option<String>,

    /// ISO date (`YYYY-MM-DD`)
    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    /// One of the flow's `available_domains`, or null when uncertain or
    /// multi-domain
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub action_items: Option<Vec<String>>,
}

/// Thread summary block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThreadSummary {
    pub text: String,

    #[serde(default)]
    pub key_points: Vec<String>,

    #[serde(default)]
    pub sentiment: Option<String>,

    #[serde(default)]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub domain: Option<String>,
}

/// Task detection block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskDetection {
    #[serde(default)]
    pub is_multi_task: bool,

    #[serde(default)]
    pub tasks: Vec<DetectedTask>,

    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Full analyzer output for one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: ThreadSummary,
    pub task_detection: TaskDetection,
    pub processing_time_ms: u64,
    /// True when served from the content-hash cache
    pub cached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_task_parses_model_output() {
        // Shape as emitted by the model, including the renamed `type` field
        // and nulls for unconfident values
        let json = serde_json::json!({
            "title": "Fix broken CSV export",
            "description": "Export returns a 500 on large datasets",
            "priority": "high",
            "type": "bug",
            "assignee": "kb-ana",
            "due_date": null,
            "tags": ["export", "backend"],
            "domain": "dev",
        });

        let task: DetectedTask = serde_json::from_value(json).unwrap();
        assert_eq!(task.priority, Some(TaskPriority::High));
        assert_eq!(task.task_type, Some(TaskKind::Bug));
        assert_eq!(task.domain.as_deref(), Some("dev"));
        assert!(task.due_date.is_none());
        assert!(task.action_items.is_none());
    }

    #[test]
    fn test_detected_task_ignores_unknown_fields() {
        let json = serde_json::json!({
            "title": "Review hero spacing",
            "severity": "who knows",
            "extra": {"nested": true},
        });
        let task: DetectedTask = serde_json::from_value(json).unwrap();
        assert_eq!(task.title, "Review hero spacing");
        assert!(task.priority.is_none());
    }

    #[test]
    fn test_priority_serialization_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskPriority::Urgent).unwrap(),
            "\"urgent\""
        );
        assert_eq!(
            serde_json::to_string(&TaskKind::Improvement).unwrap(),
            "\"improvement\""
        );
    }

    #[test]
    fn test_task_detection_defaults() {
        let detection: TaskDetection = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!detection.is_multi_task);
        assert!(detection.tasks.is_empty());
        assert!(detection.confidence.is_none());
    }
}
