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

//! # Payload scrubbing
//!
//! Two kinds of untrusted text reach the store: raw webhook payloads
//! (chat events, forwarded verbatim) and fetched email/comment bodies.
//! Both need cleanup before a row insert:
//!
//! - NUL bytes (`\0`) panic inside SurrealDB's Strand type, and chat
//!   clients have been observed smuggling them through copy-paste.
//! - Email bodies arrive with CRLF (and occasionally bare CR) line
//!   endings; stored thread snapshots are re-serialized into prompts on
//!   retry, so line endings are normalized to `\n` on the way in.
//!
//! [`DBClient::create`](super::DBClient::create) applies this to every
//! row payload; UPDATE paths that bind fetched content call it
//! explicitly.

use serde_json::Value;

/// Cleans one string value: drops NUL bytes and normalizes CRLF / bare
/// CR to `\n`.
fn scrub_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\0' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            }
            other => out.push(other),
        }
    }
    out
}

/// Recursively scrubs every string in a JSON payload for storage.
///
/// Non-string leaves (numbers, booleans, nulls) pass through untouched;
/// arrays and objects are rebuilt with their string values cleaned.
pub fn scrub_payload(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(scrub_string(&s)),
        Value::Array(arr) => Value::Array(arr.into_iter().map(scrub_payload).collect()),
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (k, scrub_payload(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scrub_removes_nul_bytes() {
        assert_eq!(scrub_payload(json!("hello\0world")), json!("helloworld"));
        assert_eq!(scrub_payload(json!("\0\0\0")), json!(""));
    }

    #[test]
    fn test_scrub_normalizes_crlf() {
        assert_eq!(
            scrub_payload(json!("line one\r\nline two\rline three\n")),
            json!("line one\nline two\nline three\n")
        );
    }

    #[test]
    fn test_scrub_clean_string_unchanged() {
        assert_eq!(
            scrub_payload(json!("already clean\ntext")),
            json!("already clean\ntext")
        );
    }

    #[test]
    fn test_scrub_webhook_payload_shape() {
        let value = json!({
            "event": {
                "text": "broken\0text",
                "user": "U1"
            },
            "team_id": "T01"
        });
        let result = scrub_payload(value);
        assert_eq!(result["event"]["text"], "brokentext");
        assert_eq!(result["event"]["user"], "U1");
        assert_eq!(result["team_id"], "T01");
    }

    #[test]
    fn test_scrub_email_body_shape() {
        let value = json!({
            "subject": "Re: homepage",
            "text": "First line\r\nSecond\0 line\r\n",
            "participants": ["a@x.test\r\n", "b@x.test"]
        });
        let result = scrub_payload(value);
        assert_eq!(result["text"], "First line\nSecond line\n");
        assert_eq!(result["participants"][0], "a@x.test\n");
        assert_eq!(result["participants"][1], "b@x.test");
    }

    #[test]
    fn test_scrub_leaves_non_strings_alone() {
        let value = json!({
            "count": 42,
            "flag": true,
            "nothing": null,
            "mixed": ["one\0", 2, false]
        });
        let result = scrub_payload(value);
        assert_eq!(result["count"], 42);
        assert_eq!(result["flag"], true);
        assert!(result["nothing"].is_null());
        assert_eq!(result["mixed"][0], "one");
        assert_eq!(result["mixed"][1], 2);
        assert_eq!(result["mixed"][2], false);
    }
}
