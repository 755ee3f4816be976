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

//! Design-tool comment adapter, fed by email notification events.
//!
//! The webhook delivers an email event (comment notification). Parsing is
//! pure: routing slug from the recipient address, title from the subject,
//! body from the inline text/html when present. The canonical thread
//! identity `{file_key}:{comment_id}` only exists after `fetch_thread`
//! correlates the parsed body with the design tool's comment list; until
//! then the discussion carries an `email:{id}` placeholder.
//!
//! Correlation is fuzzy by necessity: the notification body quotes the
//! comment with markup and truncation, so matching scores normalized
//! containment and prefix overlap instead of equality.

use super::{
    SourceAdapter, SourceAuth, SourceError, StatusMarker, ThreadHint, SOURCE_CALL_TIMEOUT_SECS,
};
use crate::models::{ParsedDiscussion, SourceType, Thread, ThreadMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default design-tool API root.
pub const DEFAULT_DESIGN_API_URL: &str = "https://api.figma.com/v1";

/// Default email provider API root (body fetches).
pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com";

const DESIGN_API: &str = "design";
const EMAIL_API: &str = "email";

/// File key inside a design-tool deep link quoted in the email body.
static FILE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"figma\.com/(?:file|design)/([A-Za-z0-9]+)").expect("static regex"));

static HTML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("static regex"));

/// Prefix length used for the weakest correlation tier.
const PREFIX_MATCH_CHARS: usize = 40;

/// Design-email adapter.
pub struct DesignEmailAdapter {
    http: Arc<reqwest::Client>,
    design_base_url: String,
    email_base_url: String,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<ApiComment>,
}

#[derive(Debug, Deserialize, Clone)]
struct ApiComment {
    id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    user: Option<ApiCommentUser>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Clone)]
struct ApiCommentUser {
    #[serde(default)]
    handle: String,
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

impl DesignEmailAdapter {
    /// Creates an adapter with production API roots.
    pub fn new(http: Arc<reqwest::Client>) -> Self {
        Self {
            http,
            design_base_url: DEFAULT_DESIGN_API_URL.to_string(),
            email_base_url: DEFAULT_EMAIL_API_URL.to_string(),
        }
    }

    /// Creates an adapter against custom API roots (tests, proxies).
    pub fn with_base_urls(
        http: Arc<reqwest::Client>,
        design_base_url: &str,
        email_base_url: &str,
    ) -> Self {
        Self {
            http,
            design_base_url: design_base_url.trim_end_matches('/').to_string(),
            email_base_url: email_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Status marker emoji posted as a comment reaction.
    fn marker_emoji(status: StatusMarker) -> &'static str {
        match status {
            StatusMarker::Pending => ":hourglass:",
            StatusMarker::Completed => ":white_check_mark:",
            StatusMarker::Failed => ":x:",
        }
    }

    fn split_thread_id(thread_id: &str) -> Result<(&str, &str), SourceError> {
        thread_id.split_once(':').ok_or_else(|| {
            SourceError::Parse(format!(
                "Invalid design thread id '{}', expected 'file_key:comment_id'",
                thread_id
            ))
        })
    }

    fn comment_url(file_key: &str, comment_id: &str) -> String {
        format!(
            "https://www.figma.com/file/{}?comment={}",
            file_key, comment_id
        )
    }

    /// Strips markup and decodes the handful of entities notification
    /// emails actually contain.
    fn strip_html(html: &str) -> String {
        let no_tags = HTML_TAG_RE.replace_all(html, " ");
        no_tags
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Scores how well an email body matches a comment. Tiers: exact
    /// normalized equality, containment either way, then prefix overlap.
    fn correlation_score(body: &str, comment: &str) -> u8 {
        let body_n = Self::normalize(body);
        let comment_n = Self::normalize(comment);
        if body_n.is_empty() || comment_n.is_empty() {
            return 0;
        }
        if body_n == comment_n {
            return 3;
        }
        if body_n.contains(&comment_n) || comment_n.contains(&body_n) {
            return 2;
        }
        let prefix: String = comment_n.chars().take(PREFIX_MATCH_CHARS).collect();
        if prefix.len() >= 10 && body_n.contains(&prefix) {
            return 1;
        }
        0
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        api: &str,
        url: &str,
        headers: Vec<(&str, String)>,
        operation: &str,
    ) -> Result<T, SourceError> {
        let timeout = Duration::from_secs(SOURCE_CALL_TIMEOUT_SECS);
        let mut request = self.http.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| SourceError::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| SourceError::from_transport(api, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SourceError::from_transport(api, e))?;

        if !status.is_success() {
            return Err(SourceError::from_status(api, status, &text));
        }

        serde_json::from_str(&text).map_err(|e| SourceError::Api {
            api: api.to_string(),
            message: format!("Unparseable {} response: {}", operation, e),
        })
    }

    async fn post_json(
        &self,
        url: &str,
        token: &str,
        body: serde_json::Value,
        operation: &str,
        tolerate_conflict: bool,
    ) -> Result<(), SourceError> {
        let timeout = Duration::from_secs(SOURCE_CALL_TIMEOUT_SECS);
        let request = self
            .http
            .post(url)
            .header("X-Figma-Token", token)
            .json(&body)
            .timeout(timeout)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| SourceError::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| SourceError::from_transport(DESIGN_API, e))?;

        let status = response.status();
        if tolerate_conflict && status.as_u16() == 409 {
            // Marker already applied: success
            debug!(operation = operation, "Marker already applied");
            return Ok(());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SourceError::from_status(DESIGN_API, status, &text));
        }
        Ok(())
    }

    /// Fetches the notification email body when the event payload did not
    /// inline it.
    async fn fetch_email_body(
        &self,
        email_id: &str,
        auth: &SourceAuth,
    ) -> Result<String, SourceError> {
        let token = auth
            .email_metadata()
            .email_provider_token
            .unwrap_or_else(|| auth.token.clone());
        let url = format!("{}/emails/{}", self.email_base_url, email_id);
        let body: EmailBody = self
            .get_json(
                EMAIL_API,
                &url,
                vec![("Authorization", format!("Bearer {}", token))],
                "fetch_email",
            )
            .await?;

        Ok(body
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| Self::strip_html(&body.html.unwrap_or_default())))
    }

    async fn list_comments(
        &self,
        file_key: &str,
        token: &str,
    ) -> Result<Vec<ApiComment>, SourceError> {
        let url = format!("{}/files/{}/comments", self.design_base_url, file_key);
        let response: CommentsResponse = self
            .get_json(
                DESIGN_API,
                &url,
                vec![("X-Figma-Token", token.to_string())],
                "list_comments",
            )
            .await?;
        Ok(response.comments)
    }
}

#[async_trait]
impl SourceAdapter for DesignEmailAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::DesignEmail
    }

    #[instrument(name = "design_email_parse_incoming", skip_all)]
    fn parse_incoming(&self, payload: &serde_json::Value) -> Result<ParsedDiscussion, SourceError> {
        let email_id = payload["email_id"]
            .as_str()
            .or_else(|| payload["id"].as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing email id".to_string()))?;

        // Recipient may be a single address or a list
        let to_addr = match &payload["to"] {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
            _ => None,
        }
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SourceError::Parse("Missing recipient address".to_string()))?;

        let slug = to_addr
            .split('@')
            .next()
            .map(|local| local.split('+').next().unwrap_or(local))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse(format!("Unusable recipient '{}'", to_addr)))?;

        let subject = payload["subject"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SourceError::Parse("Missing subject".to_string()))?;

        let from = payload["from"].as_str().unwrap_or("unknown@sender");

        let content = payload["text"]
            .as_str()
            .map(|t| t.to_string())
            .or_else(|| payload["html"].as_str().map(Self::strip_html))
            .unwrap_or_default();

        let file_key = FILE_KEY_RE
            .captures(&content)
            .or_else(|| {
                payload["html"]
                    .as_str()
                    .and_then(|h| FILE_KEY_RE.captures(h))
            })
            .map(|c| c[1].to_string());

        Ok(ParsedDiscussion {
            source_type: SourceType::DesignEmail,
            source_thread_id: format!("email:{}", email_id),
            source_url: format!("{}/emails/{}", self.email_base_url, email_id),
            routing_key: slug.to_string(),
            author_handle: from.to_string(),
            title: subject.to_string(),
            content,
            participants: vec![from.to_string()],
            metadata: serde_json::json!({ "email_id": email_id, "file_key": file_key }),
        })
    }

    /// Resolves the canonical `{file_key}:{comment_id}` thread.
    ///
    /// When `thread_id` is still the `email:{id}` placeholder, the body is
    /// fetched if missing and fuzzy-matched against the file's root
    /// comments. A canonical id skips correlation and loads directly.
    #[instrument(name = "design_email_fetch_thread", skip(self, auth, hint))]
    async fn fetch_thread(
        &self,
        thread_id: &str,
        auth: &SourceAuth,
        hint: &ThreadHint,
    ) -> Result<Thread, SourceError> {
        let file_key = hint.metadata["file_key"]
            .as_str()
            .map(|s| s.to_string())
            .or_else(|| {
                thread_id
                    .strip_prefix("email:")
                    .is_none()
                    .then(|| thread_id.split(':').next().unwrap_or_default().to_string())
            })
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SourceError::Parse("No design file key in email body or thread id".to_string())
            })?;

        let comments = self.list_comments(&file_key, &auth.token).await?;
        let roots: Vec<&ApiComment> = comments
            .iter()
            .filter(|c| c.parent_id.as_deref().unwrap_or("").is_empty())
            .collect();

        let root = if let Some(email_id) = thread_id.strip_prefix("email:") {
            // Correlate the notification body with the comment list
            let mut body = hint.content.clone();
            if body.trim().is_empty() {
                body = self.fetch_email_body(email_id, auth).await?;
            }

            let best = roots
                .iter()
                .map(|c| (Self::correlation_score(&body, &c.message), *c))
                .filter(|(score, _)| *score > 0)
                .max_by_key(|(score, c)| (*score, c.created_at));

            match best {
                Some((score, comment)) => {
                    debug!(score = score, comment_id = %comment.id, "Correlated email to comment");
                    comment.clone()
                }
                None => {
                    return Err(SourceError::ThreadNotFound(format!(
                        "No comment in file {} matches email {}",
                        file_key, email_id
                    )))
                }
            }
        } else {
            // Already canonical: load the referenced comment directly
            let (_, comment_id) = Self::split_thread_id(thread_id)?;
            roots
                .iter()
                .find(|c| c.id == comment_id)
                .map(|c| (*c).clone())
                .ok_or_else(|| SourceError::ThreadNotFound(thread_id.to_string()))?
        };

        let mut replies: Vec<&ApiComment> = comments
            .iter()
            .filter(|c| c.parent_id.as_deref() == Some(root.id.as_str()))
            .collect();
        replies.sort_by_key(|c| c.created_at);

        let to_message = |c: &ApiComment| ThreadMessage {
            author_id: c.user.as_ref().map(|u| u.handle.clone()).unwrap_or_default(),
            author_handle: c.user.as_ref().map(|u| u.handle.clone()),
            content: c.message.clone(),
            timestamp: c.created_at,
        };

        let root_message = to_message(&root);
        let reply_messages: Vec<ThreadMessage> = replies.iter().map(|c| to_message(c)).collect();

        let mut participants: Vec<String> = Vec::new();
        for author in std::iter::once(&root_message.author_id)
            .chain(reply_messages.iter().map(|m| &m.author_id))
        {
            if !author.is_empty() && !participants.contains(author) {
                participants.push(author.clone());
            }
        }

        Ok(Thread {
            source_thread_id: format!("{}:{}", file_key, root.id),
            source_url: Self::comment_url(&file_key, &root.id),
            root: root_message,
            replies: reply_messages,
            participants,
        })
    }

    #[instrument(name = "design_email_post_reply", skip(self, text, auth))]
    async fn post_reply(
        &self,
        thread_id: &str,
        text: &str,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (file_key, comment_id) = Self::split_thread_id(thread_id)?;
        let url = format!("{}/files/{}/comments", self.design_base_url, file_key);
        self.post_json(
            &url,
            &auth.token,
            serde_json::json!({ "message": text, "comment_id": comment_id }),
            "post_reply",
            false,
        )
        .await
    }

    #[instrument(name = "design_email_update_status", skip(self, auth), fields(status = %status))]
    async fn update_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (file_key, comment_id) = Self::split_thread_id(thread_id)?;
        let url = format!(
            "{}/files/{}/comments/{}/reactions",
            self.design_base_url, file_key, comment_id
        );
        self.post_json(
            &url,
            &auth.token,
            serde_json::json!({ "emoji": Self::marker_emoji(status) }),
            "update_status",
            true,
        )
        .await
    }

    #[instrument(name = "design_email_remove_status", skip(self, auth), fields(status = %status))]
    async fn remove_status(
        &self,
        thread_id: &str,
        status: StatusMarker,
        auth: &SourceAuth,
    ) -> Result<(), SourceError> {
        let (file_key, comment_id) = Self::split_thread_id(thread_id)?;
        let url = format!(
            "{}/files/{}/comments/{}/reactions?emoji={}",
            self.design_base_url,
            file_key,
            comment_id,
            urlencode(Self::marker_emoji(status))
        );
        let timeout = Duration::from_secs(SOURCE_CALL_TIMEOUT_SECS);
        let request = self
            .http
            .delete(&url)
            .header("X-Figma-Token", &auth.token)
            .timeout(timeout)
            .send();

        let response = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| SourceError::Timeout {
                operation: "remove_status".to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| SourceError::from_transport(DESIGN_API, e))?;

        let status_code = response.status();
        // Removing a marker that is not there is success
        if status_code.as_u16() == 404 {
            return Ok(());
        }
        if !status_code.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status_code, "Failed to remove status marker");
            return Err(SourceError::from_status(DESIGN_API, status_code, &text));
        }
        Ok(())
    }
}

/// Percent-encodes the non-alphanumeric characters in a reaction emoji.
fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> DesignEmailAdapter {
        DesignEmailAdapter::new(Arc::new(reqwest::Client::new()))
    }

    fn email_payload() -> serde_json::Value {
        serde_json::json!({
            "email_id": "em-123",
            "to": ["acme-reviews@inbound.example.com"],
            "from": "Design Tool <comments@figma.com>",
            "subject": "New comment on Homepage mock",
            "html": "<p>Reviewer wrote:</p><p>The hero spacing looks off &amp; cramped</p>\
                     <a href=\"https://www.figma.com/file/AbC123xyz/Homepage\">Open in tool</a>",
        })
    }

    #[test]
    fn test_parse_incoming_email() {
        let parsed = adapter().parse_incoming(&email_payload()).unwrap();
        assert_eq!(parsed.source_type, SourceType::DesignEmail);
        assert_eq!(parsed.source_thread_id, "email:em-123");
        assert_eq!(parsed.routing_key, "acme-reviews");
        assert_eq!(parsed.title, "New comment on Homepage mock");
        assert!(parsed.content.contains("hero spacing looks off & cramped"));
        assert_eq!(parsed.metadata["file_key"], "AbC123xyz");
    }

    #[test]
    fn test_parse_incoming_plus_suffix_slug() {
        let mut payload = email_payload();
        payload["to"] = serde_json::json!("acme-reviews+design@inbound.example.com");
        let parsed = adapter().parse_incoming(&payload).unwrap();
        assert_eq!(parsed.routing_key, "acme-reviews");
    }

    #[test]
    fn test_parse_incoming_missing_fields() {
        for field in ["email_id", "to", "subject"] {
            let mut payload = email_payload();
            payload.as_object_mut().unwrap().remove(field);
            let err = adapter().parse_incoming(&payload).unwrap_err();
            assert!(matches!(err, SourceError::Parse(_)), "field: {}", field);
        }
    }

    #[test]
    fn test_parse_prefers_text_over_html() {
        let mut payload = email_payload();
        payload["text"] = serde_json::json!("plain body wins");
        let parsed = adapter().parse_incoming(&payload).unwrap();
        assert_eq!(parsed.content, "plain body wins");
    }

    #[test]
    fn test_strip_html() {
        let html = "<div>Hello  <b>world</b>&nbsp;&amp; friends</div>";
        assert_eq!(DesignEmailAdapter::strip_html(html), "Hello world & friends");
    }

    #[test]
    fn test_correlation_scores() {
        // Exact normalized match
        assert_eq!(
            DesignEmailAdapter::correlation_score(
                "The hero spacing   looks off",
                "the hero spacing looks off"
            ),
            3
        );
        // Containment: email quotes the comment with extra context
        assert_eq!(
            DesignEmailAdapter::correlation_score(
                "Reviewer wrote: the hero spacing looks off Open in tool",
                "The hero spacing looks off"
            ),
            2
        );
        // Prefix overlap for truncated notifications
        let comment = "The hero spacing looks off and we should tighten the grid on mobile too";
        let email = "Reviewer wrote: the hero spacing looks off and we should tighten ...";
        assert_eq!(DesignEmailAdapter::correlation_score(email, comment), 1);
        // No relation
        assert_eq!(
            DesignEmailAdapter::correlation_score("unrelated body", "different comment"),
            0
        );
        // Empty inputs never match
        assert_eq!(DesignEmailAdapter::correlation_score("", "anything"), 0);
    }

    #[test]
    fn test_marker_emoji_mapping() {
        assert_eq!(
            DesignEmailAdapter::marker_emoji(StatusMarker::Pending),
            ":hourglass:"
        );
        assert_eq!(
            DesignEmailAdapter::marker_emoji(StatusMarker::Completed),
            ":white_check_mark:"
        );
        assert_eq!(DesignEmailAdapter::marker_emoji(StatusMarker::Failed), ":x:");
    }

    #[test]
    fn test_split_thread_id() {
        assert_eq!(
            DesignEmailAdapter::split_thread_id("AbC123:987").unwrap(),
            ("AbC123", "987")
        );
        assert!(DesignEmailAdapter::split_thread_id("nodots").is_err());
    }

    #[test]
    fn test_urlencode_emoji() {
        assert_eq!(urlencode(":x:"), "%3Ax%3A");
    }
}
