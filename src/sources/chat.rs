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

//! Chat platform adapter (Slack-shaped Web API).
//!
//! Thread identity is `{channel_id}:{thread_ts}`. The API answers HTTP 200
//! with `{"ok": false, "error": "..."}` on most failures, so classification
//! reads both the HTTP status and the `error` string.

use super::{SourceAdapter, SourceAuth, SourceError, StatusMarker, ThreadHint, SOURCE_CALL_TIMEOUT_SECS};
use crate::models::{ParsedDiscussion, SourceType, Thread, ThreadMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default chat Web API root.
pub const DEFAULT_CHAT_API_URL: &str = "https://slack.com/api";

const API_NAME: &str = "chat";

/// Maximum title length derived from the root message.
const TITLE_MAX_CHARS: usize = 80;

/// Chat platform adapter.
pub struct ChatAdapter {
    http: Arc<reqwest::Client>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Option<Vec<ApiMessage>>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: Option<String>,
}

impl ChatAdapter {
    /// Creates an adapter with the production API root.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self {
            http,
            base_url: DEFAULT_CHAT_API_URL.to_string(),
        }
    }

    /// Creates an adapter against a custom API root (tests, proxies).
    pub fn with_base_url(http: Arc<reqwest::Client>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn split_thread_id(thread_id: &str) -> Result<(&str, &str), SourceError> {
        thread_id.split_once(':').ok_or_else(|| {
            SourceError::Parse(format!(
                "Invalid chat thread id '{}', expected 'channel:ts'",
                thread_id
            ))
        })
    }

    /// Status marker emoji per pipeline state.
    fn marker_emoji(status: StatusMarker) -> &'static str {
        match status {
            StatusMarker::Pending => "hourglass_flowing_sand",
            StatusMarker::Completed => "white_check_mark",
            StatusMarker::Failed => "x",
        }
    }

    fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
        let seconds: f64 = ts.parse().ok()?;
        DateTime::from_timestamp(seconds as i64, 0)
    }

    fn permalink(channel: &str, ts: &str) -> String {
        format!(
            "https://app.slack.com/archives/{}/p{}",
            channel,
            ts.replace('.', "")
        )
    }

    /// POSTs a Web API method and unwraps the `{ok, error}` envelope.
    ///
    /// `tolerated` lists error strings that count as success (e.g.
    /// `already_reacted`).
    async fn call_api(
        &self,
        method: &str,
        token: &str,
        body: serde_json::Value,
        tolerated: &[&str],
    ) -> Result<ApiEnvelope, SourceError> {
        let url = format!("{}/{}", self.base_url, method);
        let timeout = Duration::from_secs(SOURCE_CALL_TIMEOUT_SECS);

        let request = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .timeout(timeout)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| SourceError::Timeout {
                operation: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| SourceError::from_transport(API_NAME, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::from_transport(API_NAME, e))?;

        if !status.is_success() {
            return Err(SourceError::from_status(API_NAME, status, &text));
        }

        let envelope: ApiEnvelope = serde_json::from_str(&text).map_err(|e| SourceError::Api {
            api: API_NAME.to_string(),
            message: format!("Unparseable {} response: {}", method, e),
        })?;

        if !envelope.ok {
            let code = envelope.error.clone().unwrap_or_default();
            if tolerated.contains(&code.as_str()) {
                debug!(method = method, code = %code, "Tolerated API error");
                return Ok(envelope);
            }
            return Err(Self::classify_api_error(method, &code));
        }

        Ok(envelope)
    }

    fn classify_api_error(method: &str, code: &str) -> SourceError {
        match code {
            "ratelimited" | "rate_limited" => SourceError::RateLimited {
                api: API_NAME.to_string(),
            },
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
            | "missing_scope" => SourceError::Auth {
                api: API_NAME.to_string(),
                message: format!("{}: {}", method, code),
            },
            "thread_not_found" | "channel_not_found" | "message_not_found" => {
                SourceError::ThreadNotFound(format!("{}: {}", method, code))
            }
            "internal_error" | "service_unavailable" => SourceError::Transient {
                api: API_NAME.to_string(),
                message: format!("{}: {}", method, code),
            },
            other => SourceError::Api {
                api: API_NAME.to_string(),
                message: format!("{}: {}", method, other),
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for ChatAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Chat
    }

    #[instrument(name = "chat_parse_incoming", skip_all)]
    fn parse_incoming(&self, payload: &serde_json::Value) -> Result<ParsedDiscussion, SourceError> {
        let team_id = payload["team_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing team_id".to_string()))?;
        let event = &payload["event"];

        let channel = event["channel"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing event.channel".to_string()))?;
        let user = event["user"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing event.user".to_string()))?;
        let text = event["text"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing event.text".to_string()))?;
        let ts = event["ts"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing event.ts".to_string()))?;

        // Replies carry thread_ts pointing at the root; root messages don't
        let thread_ts = event["thread_ts"].as_str().unwrap_or(ts);

        let title: String = text
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(TITLE_MAX_CHARS)
            .collect();

        Ok(ParsedDiscussion {
            source_type: SourceType::Chat,
            source_thread_id: format!("{}:{}", channel, thread_ts),
            source_url: Self::permalink(channel, thread_ts),
            routing_key: team_id.to_string(),
            author_handle: user.to_string(),
            title,
            content: text.to_string(),
            participants: vec![user.to_string()],
            metadata: serde_json::json!({ "channel": channel, "event_ts": ts }),
        })
    }

    #[instrument(name = "chat_fetch_thread", skip(self, auth, _hint))]
    async fn fetch_thread(
        &self,
        thread_id: &str,
        auth: &SourceAuth,
        _hint: &ThreadHint,
    ) -> Result<Thread, SourceError> {
        let (channel, thread_ts) = Self::split_thread_id(thread_id)?;

        let envelope = self
            .call_api(
                "conversations.replies",
                &auth.token,
                serde_json::json!({ "channel": channel, "ts": thread_ts }),
                &[],
            )
            .await?;

        let messages = envelope
            .messages
            .filter(|m| !m.is_empty())
            .ok_or_else(|| SourceError::ThreadNotFound(thread_id.to_string()))?;

        let mut iter = messages.into_iter();
        let Some(root_msg) = iter.next() else {
            return Err(SourceError::ThreadNotFound(thread_id.to_string()));
        };

        let to_thread_message = |m: ApiMessage| ThreadMessage {
            author_id: m.user.unwrap_or_default(),
            author_handle: None,
            content: m.text,
            timestamp: m.ts.as_deref().and_then(Self::parse_ts),
        };

        let root = to_thread_message(root_msg);
        let replies: Vec<ThreadMessage> = iter.map(to_thread_message).collect();

        // Dedup participants preserving first-seen order
        let mut participants: Vec<String> = Vec::new();
        for author in std::iter::once(&root.author_id).chain(replies.iter().map(|r| &r.author_id))
        {
            if !author.is_empty() && !participants.contains(author) {
                participants.push(author.clone());
            }
        }

        Ok(Thread {
            source_thread_id: thread_id.to_string(),
            source_url: Self::permalink(channel, thread_ts),
            root,
            replies,
            participants,
        })
    }

    #[instrument(name = "chat_post_reply", skip(self, text, auth))]
    async fn post_reply(
        &self,
        thread_id: &str,
        text: &str,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (channel, thread_ts) = Self::split_thread_id(thread_id)?;
        self.call_api(
            "chat.postMessage",
            &auth.token,
            serde_json::json!({ "channel": channel, "thread_ts": thread_ts, "text": text }),
            &[],
        )
        .await?;
        Ok(())
    }

    #[instrument(name = "chat_update_status", skip(self, auth), fields(status = %status))]
    async fn update_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (channel, thread_ts) = Self::split_thread_id(thread_id)?;
        self.call_api(
            "reactions.add",
            &auth.token,
            serde_json::json!({
                "channel": channel,
                "timestamp": thread_ts,
                "name": Self::marker_emoji(status),
            }),
            &["already_reacted"],
        )
        .await?;
        Ok(())
    }

    #[instrument(name = "chat_remove_status", skip(self, auth), fields(status = %status))]
    async fn remove_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (channel, thread_ts) = Self::split_thread_id(thread_id)?;
        let result = self
            .call_api(
                "reactions.remove",
                &auth.token,
                serde_json::json!({
                    "channel": channel,
                    "timestamp": thread_ts,
                    "name": Self::marker_emoji(status),
                }),
                &["no_reaction"],
            )
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "Failed to remove status marker");
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ChatAdapter {
        ChatAdapter::new(Arc::new(reqwest::Client::new()))
    }

    fn event_payload() -> serde_json::Value {
        serde_json::json!({
            "team_id": "T01",
            "event": {
                "type": "app_mention",
                "user": "U1",
                "text": "<@UBOT> the export button is broken\nit 500s every time",
                "channel": "C01",
                "ts": "1700000000.000100",
            }
        })
    }

    #[test]
    fn test_parse_incoming_root_message() {
        let parsed = adapter().parse_incoming(&event_payload()).unwrap();
        assert_eq!(parsed.source_type, SourceType::Chat);
        assert_eq!(parsed.source_thread_id, "C01:1700000000.000100");
        assert_eq!(parsed.routing_key, "T01");
        assert_eq!(parsed.author_handle, "U1");
        assert_eq!(parsed.title, "<@UBOT> the export button is broken");
        assert!(parsed.source_url.contains("/archives/C01/p1700000000000100"));
        assert_eq!(parsed.participants, vec!["U1"]);
    }

    #[test]
    fn test_parse_incoming_reply_uses_thread_ts() {
        let mut payload = event_payload();
        payload["event"]["thread_ts"] = serde_json::json!("1699999999.000001");
        let parsed = adapter().parse_incoming(&payload).unwrap();
        assert_eq!(parsed.source_thread_id, "C01:1699999999.000001");
        // event_ts keeps the triggering message
        assert_eq!(parsed.metadata["event_ts"], "1700000000.000100");
    }

    #[test]
    fn test_parse_incoming_missing_fields() {
        let mut payload = event_payload();
        payload["event"]["text"] = serde_json::json!("");
        let err = adapter().parse_incoming(&payload).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));

        let mut payload = event_payload();
        payload["event"].as_object_mut().unwrap().remove("channel");
        assert!(adapter().parse_incoming(&payload).is_err());

        let mut payload = event_payload();
        payload.as_object_mut().unwrap().remove("team_id");
        assert!(adapter().parse_incoming(&payload).is_err());
    }

    #[test]
    fn test_parse_is_pure_and_deterministic() {
        let a = adapter().parse_incoming(&event_payload()).unwrap();
        let b = adapter().parse_incoming(&event_payload()).unwrap();
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }

    #[test]
    fn test_split_thread_id() {
        assert_eq!(
            ChatAdapter::split_thread_id("C01:170.1").unwrap(),
            ("C01", "170.1")
        );
        assert!(ChatAdapter::split_thread_id("no-colon").is_err());
    }

    #[test]
    fn test_marker_emoji_mapping() {
        assert_eq!(
            ChatAdapter::marker_emoji(StatusMarker::Pending),
            "hourglass_flowing_sand"
        );
        assert_eq!(
            ChatAdapter::marker_emoji(StatusMarker::Completed),
            "white_check_mark"
        );
        assert_eq!(ChatAdapter::marker_emoji(StatusMarker::Failed), "x");
    }

    #[test]
    fn test_classify_api_error() {
        assert!(matches!(
            ChatAdapter::classify_api_error("x", "ratelimited"),
            SourceError::RateLimited { .. }
        ));
        assert!(matches!(
            ChatAdapter::classify_api_error("x", "invalid_auth"),
            SourceError::Auth { .. }
        ));
        assert!(matches!(
            ChatAdapter::classify_api_error("x", "thread_not_found"),
            SourceError::ThreadNotFound(_)
        ));
        assert!(matches!(
            ChatAdapter::classify_api_error("x", "internal_error"),
            SourceError::Transient { .. }
        ));
        assert!(matches!(
            ChatAdapter::classify_api_error("x", "some_other"),
            SourceError::Api { .. }
        ));
    }

    #[test]
    fn test_ts_parse() {
        let dt = ChatAdapter::parse_ts("1700000000.000100").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert!(ChatAdapter::parse_ts("garbage").is_none());
    }
}
