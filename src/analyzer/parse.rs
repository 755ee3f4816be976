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

//! Response parsing: extract the first JSON object from model output.
//!
//! Models wrap JSON in prose or code fences despite instructions. The
//! extractor scans for the first balanced `{...}` span (string-aware, so
//! braces inside string values don't terminate early) and parses that.

use super::AnalysisError;
use crate::models::{TaskDetection, ThreadSummary};

/// Extracts the first balanced `{...}` span from the text.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses a summary response.
pub fn parse_summary(text: &str) -> Result<ThreadSummary, AnalysisError> {
    let span = extract_json_object(text).ok_or_else(|| {
        AnalysisError::MalformedResponse("no JSON object in summary response".to_string())
    })?;
    serde_json::from_str(span)
        .map_err(|e| AnalysisError::MalformedResponse(format!("summary schema: {}", e)))
}

/// Parses a task-detection response.
pub fn parse_detection(text: &str) -> Result<TaskDetection, AnalysisError> {
    let span = extract_json_object(text).ok_or_else(|| {
        AnalysisError::MalformedResponse("no JSON object in task response".to_string())
    })?;
    serde_json::from_str(span)
        .map_err(|e| AnalysisError::MalformedResponse(format!("task schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        let text = r#"{"a": 1}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_extract_object_wrapped_in_prose() {
        let text = "Sure! Here is the analysis:\n```json\n{\"a\": {\"b\": 2}}\n```\nHope it helps.";
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 2}}"#));
    }

    #[test]
    fn test_extract_ignores_braces_inside_strings() {
        let text = r#"{"text": "use {curly} braces"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_extract_handles_escaped_quotes() {
        let text = r#"{"text": "she said \"hi\" {ok}"} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"text": "she said \"hi\" {ok}"}"#)
        );
    }

    #[test]
    fn test_extract_none_without_object() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{unclosed").is_none());
    }

    #[test]
    fn test_parse_summary_happy_path() {
        let text = r#"Analysis complete: {"text": "Export is broken", "key_points": ["500 error"], "sentiment": "negative", "confidence": 0.92, "domain": "dev"}"#;
        let summary = parse_summary(text).unwrap();
        assert_eq!(summary.text, "Export is broken");
        assert_eq!(summary.key_points, vec!["500 error"]);
        assert_eq!(summary.domain.as_deref(), Some("dev"));
    }

    #[test]
    fn test_parse_summary_missing_optionals_default() {
        let summary = parse_summary(r#"{"text": "short"}"#).unwrap();
        assert!(summary.key_points.is_empty());
        assert!(summary.sentiment.is_none());
        assert!(summary.confidence.is_none());
    }

    #[test]
    fn test_parse_detection_happy_path() {
        let text = r#"{"is_multi_task": true, "tasks": [
            {"title": "Fix export", "type": "bug", "priority": "high", "domain": "dev"},
            {"title": "Review spacing", "domain": null}
        ], "confidence": 0.8}"#;
        let detection = parse_detection(text).unwrap();
        assert!(detection.is_multi_task);
        assert_eq!(detection.tasks.len(), 2);
        assert_eq!(detection.tasks[0].title, "Fix export");
        assert!(detection.tasks[1].domain.is_none());
    }

    #[test]
    fn test_parse_malformed_is_analysis_error() {
        let err = parse_detection("the model rambled with no json").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));

        // Schema mismatch: tasks must be an array
        let err = parse_detection(r#"{"tasks": "not-a-list"}"#).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }
}
