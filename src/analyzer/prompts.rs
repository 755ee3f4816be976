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

//! Prompt builders for the two analysis passes.
//!
//! Flow templates may override either prompt; templates support the
//! `{thread}` and `{domains}` placeholders. Both built-in prompts carry
//! the confidence rule (return null over guessing) and the domain rule
//! (null when uncertain or multi-domain).

use crate::models::Thread;

/// Per-message content cap when serializing a thread for the model.
/// Long pasted logs otherwise blow past the model's input window.
pub const MESSAGE_CONTENT_CAP: usize = 4000;

/// Serializes a thread for prompt injection: root first, then replies,
/// each prefixed by its author.
pub fn serialize_thread(thread: &Thread) -> String {
    let mut out = String::new();
    for message in thread.messages() {
        let author = message
            .author_handle
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&message.author_id);
        let content: String = message.content.chars().take(MESSAGE_CONTENT_CAP).collect();
        out.push_str(&format!("[{}]: {}\n", author, content));
    }
    out
}

fn domains_clause(available_domains: &[String]) -> String {
    if available_domains.is_empty() {
        "No domain labels are configured; always return \"domain\": null.".to_string()
    } else {
        format!(
            "Valid domain labels: [{}]. Pick exactly one label per task, matching case \
             exactly. Return \"domain\": null when you are uncertain or the task spans \
             multiple domains.",
            available_domains.join(", ")
        )
    }
}

fn apply_template(template: &str, thread_text: &str, domains: &str) -> String {
    let mut out = template.replace("{thread}", thread_text);
    out = out.replace("{domains}", domains);
    if !template.contains("{thread}") {
        out.push_str("\n\nThread:\n");
        out.push_str(thread_text);
    }
    out
}

/// Builds the summary prompt.
pub fn build_summary_prompt(
    thread: &Thread,
    available_domains: &[String],
    template: Option<&str>,
) -> String {
    let thread_text = serialize_thread(thread);
    let domains = domains_clause(available_domains);

    if let Some(template) = template {
        return apply_template(template, &thread_text, &domains);
    }

    format!(
        "Summarize the following discussion thread.\n\
         \n\
         Respond with a single JSON object and nothing else:\n\
         {{\n\
         \x20 \"text\": string,           // 2-4 sentence summary\n\
         \x20 \"key_points\": string[],   // the decisions and open issues\n\
         \x20 \"sentiment\": \"positive\" | \"neutral\" | \"negative\" | null,\n\
         \x20 \"confidence\": number | null,  // 0..1\n\
         \x20 \"domain\": string | null\n\
         }}\n\
         \n\
         {}\n\
         For every field: if you are not confident, return null instead of guessing.\n\
         \n\
         Thread:\n\
         {}",
        domains, thread_text
    )
}

/// Builds the task-detection prompt.
pub fn build_task_prompt(
    thread: &Thread,
    available_domains: &[String],
    template: Option<&str>,
) -> String {
    let thread_text = serialize_thread(thread);
    let domains = domains_clause(available_domains);

    if let Some(template) = template {
        return apply_template(template, &thread_text, &domains);
    }

    format!(
        "Detect actionable tasks in the following discussion thread.\n\
         \n\
         Mentions were rewritten as @Name (user-id); when a task is clearly owned by a \
         mentioned person, put that user-id in \"assignee\".\n\
         \n\
         Respond with a single JSON object and nothing else:\n\
         {{\n\
         \x20 \"is_multi_task\": boolean,\n\
         \x20 \"confidence\": number | null,\n\
         \x20 \"tasks\": [{{\n\
         \x20   \"title\": string,\n\
         \x20   \"description\": string | null,\n\
         \x20   \"priority\": \"low\" | \"medium\" | \"high\" | \"urgent\" | null,\n\
         \x20   \"type\": \"bug\" | \"feature\" | \"question\" | \"improvement\" | null,\n\
         \x20   \"assignee\": string | null,   // user-id from a rewritten mention\n\
         \x20   \"due_date\": string | null,   // YYYY-MM-DD\n\
         \x20   \"tags\": string[] | null,\n\
         \x20   \"domain\": string | null,\n\
         \x20   \"action_items\": string[] | null\n\
         \x20 }}]\n\
         }}\n\
         \n\
         {}\n\
         For every field: if you are not confident, return null instead of guessing.\n\
         An empty \"tasks\" array is a valid answer when nothing is actionable.\n\
         \n\
         Thread:\n\
         {}",
        domains, thread_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Thread, ThreadMessage};

    fn thread() -> Thread {
        Thread {
            source_thread_id: "C01:1".to_string(),
            source_url: "https://chat.example.com/1".to_string(),
            root: ThreadMessage {
                author_id: "U1".to_string(),
                author_handle: Some("ana".to_string()),
                content: "The export button is broken".to_string(),
                timestamp: None,
            },
            replies: vec![ThreadMessage {
                author_id: "U2".to_string(),
                author_handle: None,
                content: "Confirmed on staging".to_string(),
                timestamp: None,
            }],
            participants: vec!["U1".to_string(), "U2".to_string()],
        }
    }

    #[test]
    fn test_serialize_thread_root_first_with_authors() {
        let text = serialize_thread(&thread());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[ana]: The export button is broken");
        // No handle: falls back to the author id
        assert_eq!(lines[1], "[U2]: Confirmed on staging");
    }

    #[test]
    fn test_serialize_thread_caps_message_length() {
        let mut t = thread();
        t.root.content = "x".repeat(MESSAGE_CONTENT_CAP + 500);
        let text = serialize_thread(&t);
        let first_line = text.lines().next().unwrap();
        assert!(first_line.len() <= MESSAGE_CONTENT_CAP + 10);
    }

    #[test]
    fn test_summary_prompt_includes_domains_and_confidence_rule() {
        let domains = vec!["design".to_string(), "dev".to_string()];
        let prompt = build_summary_prompt(&thread(), &domains, None);
        assert!(prompt.contains("[design, dev]"));
        assert!(prompt.contains("return null instead of guessing"));
        assert!(prompt.contains("[ana]: The export button is broken"));
    }

    #[test]
    fn test_task_prompt_mentions_assignee_convention() {
        let prompt = build_task_prompt(&thread(), &[], None);
        assert!(prompt.contains("@Name (user-id)"));
        assert!(prompt.contains("\"is_multi_task\""));
        assert!(prompt.contains("always return \"domain\": null"));
    }

    #[test]
    fn test_template_override_with_placeholders() {
        let template = "Custom instructions.\n{domains}\nHere:\n{thread}";
        let prompt = build_summary_prompt(&thread(), &["dev".to_string()], Some(template));
        assert!(prompt.starts_with("Custom instructions."));
        assert!(prompt.contains("Valid domain labels: [dev]"));
        assert!(prompt.contains("[ana]: The export button is broken"));
        // The thread is not appended twice
        assert_eq!(prompt.matches("The export button is broken").count(), 1);
    }

    #[test]
    fn test_template_without_placeholder_gets_thread_appended() {
        let template = "Just do your best.";
        let prompt = build_task_prompt(&thread(), &[], Some(template));
        assert!(prompt.starts_with("Just do your best."));
        assert!(prompt.contains("Thread:"));
        assert!(prompt.contains("The export button is broken"));
    }
}
