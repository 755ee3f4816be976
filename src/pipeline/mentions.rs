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

//! Mention rewrite pass.
//!
//! For every message in a thread, before LLM analysis:
//! 1. strip the bot's own mentions (chat `<@BOT>` form and `@handle` form);
//! 2. replace each resolvable upstream mention with the literal
//!    `@{display_name} ({dest_user_id})`; this is what the model sees, so
//!    it can emit the destination id directly in `assignee`;
//! 3. collapse whitespace runs.
//!
//! The pass is idempotent: rewritten id-form mentions no longer match the
//! mention pattern, and handle-form replacements are skipped when the
//! handle is already followed by its `({dest_user_id})` suffix.

use crate::models::{MappingSnapshot, Thread};
use once_cell::sync::Lazy;
use regex::Regex;

/// Chat-style mention: `<@U12345>` or `<@U12345|handle>`.
static CHAT_MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<@([A-Za-z0-9]+)(?:\|[^>]*)?>").expect("static regex"));

/// Whitespace runs within a line.
static SPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("static regex"));

/// Bot identity used for self-mention stripping.
#[derive(Debug, Clone, Default)]
pub struct BotIdentity {
    pub user_id: Option<String>,
    pub handle: Option<String>,
}

impl BotIdentity {
    pub fn new(user_id: Option<String>, handle: Option<String>) -> Self {
        Self { user_id, handle }
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.handle.is_none()
    }
}

/// Rewrites one message content. See the module docs for the three passes.
pub fn rewrite_content(content: &str, snapshot: &MappingSnapshot, bot: &BotIdentity) -> String {
    let stripped = strip_bot_mentions(content, bot);
    let resolved = replace_id_mentions(&stripped, snapshot, bot);
    let resolved = replace_handle_mentions(&resolved, snapshot);
    collapse_whitespace(&resolved)
}

/// Rewrites every message of a thread, returning a new thread.
pub fn rewrite_thread(thread: &Thread, snapshot: &MappingSnapshot, bot: &BotIdentity) -> Thread {
    let mut rewritten = thread.clone();
    for message in rewritten.messages_mut() {
        message.content = rewrite_content(&message.content, snapshot, bot);
    }
    rewritten
}

fn strip_bot_mentions(content: &str, bot: &BotIdentity) -> String {
    let mut out = content.to_string();
    if let Some(bot_id) = &bot.user_id {
        let id_form = format!("<@{}>", bot_id);
        out = out.replace(&id_form, "");
        // Piped display form
        let piped = Regex::new(&format!(r"<@{}\|[^>]*>", regex::escape(bot_id)))
            .expect("escaped bot id regex");
        out = piped.replace_all(&out, "").into_owned();
    }
    if let Some(handle) = &bot.handle {
        out = out.replace(&format!("@{}", handle), "");
    }
    out
}

fn replace_id_mentions(content: &str, snapshot: &MappingSnapshot, bot: &BotIdentity) -> String {
    CHAT_MENTION_RE
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let user_id = &caps[1];
            if bot.user_id.as_deref() == Some(user_id) {
                return String::new();
            }
            match snapshot.by_id(user_id) {
                Some(mapped) => format!("@{} ({})", mapped.display_name, mapped.dest_user_id),
                // Unresolved mentions stay as-is
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn replace_handle_mentions(content: &str, snapshot: &MappingSnapshot) -> String {
    let mut handles = snapshot.handles();
    // Longest first so "ana maria" wins over "ana"
    handles.sort_by_key(|h| std::cmp::Reverse(h.len()));

    let mut out = content.to_string();
    for handle in handles {
        let Some(mapped) = snapshot.by_handle(&handle) else {
            continue;
        };
        let needle = format!("@{}", handle);
        let replacement = format!("@{} ({})", mapped.display_name, mapped.dest_user_id);
        let suffix = format!(" ({})", mapped.dest_user_id);

        let mut rebuilt = String::with_capacity(out.len());
        let mut rest = out.as_str();
        while let Some(pos) = rest.find(&needle) {
            let after = &rest[pos + needle.len()..];
            rebuilt.push_str(&rest[..pos]);
            // Word boundary: don't rewrite "@anastasia" for handle "ana"
            let boundary_ok = after
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric() && c != '_')
                .unwrap_or(true);
            if after.starts_with(&suffix) || !boundary_ok {
                // Already rewritten (idempotence) or partial-word match
                rebuilt.push_str(&needle);
            } else {
                rebuilt.push_str(&replacement);
            }
            rest = after;
        }
        rebuilt.push_str(rest);
        out = rebuilt;
    }
    out
}

fn collapse_whitespace(content: &str) -> String {
    let collapsed = SPACE_RUN_RE.replace_all(content, " ");
    collapsed
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceType, UserMapping};
    use chrono::Utc;

    fn mapping(source_id: &str, source_name: Option<&str>, dest: &str) -> UserMapping {
        UserMapping {
            id: format!("um-{}", source_id),
            tenant_id: "t-1".to_string(),
            source_type: SourceType::Chat,
            source_workspace_id: "T01".to_string(),
            source_user_id: source_id.to_string(),
            source_user_name: source_name.map(|s| s.to_string()),
            dest_user_id: dest.to_string(),
            dest_user_name: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn snapshot() -> MappingSnapshot {
        MappingSnapshot::from_mappings(&[
            mapping("U1", Some("ana"), "kb-ana"),
            mapping("U2", Some("ben"), "kb-ben"),
        ])
    }

    #[test]
    fn test_id_mention_resolved() {
        let bot = BotIdentity::default();
        let out = rewrite_content("<@U1> can you look at this?", &snapshot(), &bot);
        assert_eq!(out, "@ana (kb-ana) can you look at this?");
    }

    #[test]
    fn test_piped_id_mention_resolved() {
        let bot = BotIdentity::default();
        let out = rewrite_content("cc <@U2|ben>", &snapshot(), &bot);
        assert_eq!(out, "cc @ben (kb-ben)");
    }

    #[test]
    fn test_unresolved_mention_left_alone() {
        let bot = BotIdentity::default();
        let out = rewrite_content("ping <@U99>", &snapshot(), &bot);
        assert_eq!(out, "ping <@U99>");
    }

    #[test]
    fn test_bot_mention_stripped() {
        let bot = BotIdentity::new(Some("UBOT".to_string()), Some("taskbot".to_string()));
        let out = rewrite_content("<@UBOT> please file this, @taskbot thanks", &snapshot(), &bot);
        assert_eq!(out, "please file this, thanks");
    }

    #[test]
    fn test_handle_mention_resolved() {
        let bot = BotIdentity::default();
        let out = rewrite_content("@ana please review the hero", &snapshot(), &bot);
        assert_eq!(out, "@ana (kb-ana) please review the hero");
    }

    #[test]
    fn test_handle_partial_word_not_rewritten() {
        let bot = BotIdentity::default();
        let out = rewrite_content("@anastasia is not @ana", &snapshot(), &bot);
        assert_eq!(out, "@anastasia is not @ana (kb-ana)");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let bot = BotIdentity::new(Some("UBOT".to_string()), None);
        let input = "<@UBOT> <@U1> and @ben should sync   on this";
        let once = rewrite_content(input, &snapshot(), &bot);
        let twice = rewrite_content(&once, &snapshot(), &bot);
        assert_eq!(once, twice);
        assert_eq!(once, "@ana (kb-ana) and @ben (kb-ben) should sync on this");
    }

    #[test]
    fn test_no_orphan_tokens_for_mapped_users() {
        // Stripping the bot then resolving must leave no bare <@id> for any
        // mapped user
        let bot = BotIdentity::new(Some("UBOT".to_string()), Some("taskbot".to_string()));
        let out = rewrite_content("<@UBOT> <@U1> <@U2> @ana @ben", &snapshot(), &bot);
        assert!(!out.contains("<@U1>"));
        assert!(!out.contains("<@U2>"));
        assert!(!out.contains("<@UBOT>"));
        assert!(!out.contains("@taskbot"));
    }

    #[test]
    fn test_whitespace_collapsed() {
        let bot = BotIdentity::default();
        let out = rewrite_content("fix   the\tbutton  \nplease   now", &snapshot(), &bot);
        assert_eq!(out, "fix the button\nplease now");
    }

    #[test]
    fn test_rewrite_thread_touches_all_messages() {
        let bot = BotIdentity::default();
        let thread = Thread {
            source_thread_id: "C01:1".to_string(),
            source_url: "https://chat.example.com/1".to_string(),
            root: crate::models::ThreadMessage {
                author_id: "U1".to_string(),
                author_handle: Some("ana".to_string()),
                content: "<@U2> see this".to_string(),
                timestamp: None,
            },
            replies: vec![crate::models::ThreadMessage {
                author_id: "U2".to_string(),
                author_handle: Some("ben".to_string()),
                content: "on it, @ana".to_string(),
                timestamp: None,
            }],
            participants: vec!["U1".to_string(), "U2".to_string()],
        };

        let rewritten = rewrite_thread(&thread, &snapshot(), &bot);
        assert_eq!(rewritten.root.content, "@ben (kb-ben) see this");
        assert_eq!(rewritten.replies[0].content, "on it, @ana (kb-ana)");
        // Untouched structure
        assert_eq!(rewritten.participants, thread.participants);
    }
}
