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

//! Domain router: selects the outputs a detected task is written to.
//!
//! Pure and deterministic. Matching is case-sensitive on the task's domain
//! label; a task with no domain (or no matching output) falls back to the
//! flow's unique default output. Zero or multiple active defaults violate
//! the flow invariant and fail the task being routed, not the whole
//! discussion.

use crate::models::FlowOutput;
use thiserror::Error;

/// Routing failure for one task.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The single-default flow invariant is violated
    #[error("flow default-output invariant violated: {count} active default outputs")]
    DefaultInvariant { count: usize },
}

/// Routes one task to the subset of outputs that should receive it.
///
/// - `Some(domain)` matches outputs whose `domain_filter` contains the
///   label (case-sensitive); an empty filter accepts any labeled domain.
/// - `None` (or no match) falls back to the unique default output.
pub fn route<'a>(
    task_domain: Option<&str>,
    outputs: &'a [FlowOutput],
) -> Result<Vec<&'a FlowOutput>, RoutingError> {
    let active: Vec<&FlowOutput> = outputs.iter().filter(|o| o.active).collect();

    if let Some(domain) = task_domain {
        let matched: Vec<&FlowOutput> = active
            .iter()
            .filter(|o| {
                o.domain_filter.is_empty() || o.domain_filter.iter().any(|d| d == domain)
            })
            .copied()
            .collect();
        if !matched.is_empty() {
            return Ok(matched);
        }
    }

    // Null or unmatched domain: the default output is the safety net
    let defaults: Vec<&FlowOutput> = active.iter().filter(|o| o.is_default).copied().collect();
    match defaults.len() {
        1 => Ok(defaults),
        count => Err(RoutingError::DefaultInvariant { count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn output(id: &str, filter: &[&str], is_default: bool, active: bool) -> FlowOutput {
        FlowOutput {
            id: id.to_string(),
            flow_id: "f-1".to_string(),
            tenant_id: "t-1".to_string(),
            output_type: Default::default(),
            name: id.to_string(),
            domain_filter: filter.iter().map(|s| s.to_string()).collect(),
            is_default,
            output_config: serde_json::json!({}),
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_domain_match() {
        let outputs = vec![
            output("design-out", &["design"], false, true),
            output("dev-out", &["dev"], true, true),
        ];

        let routed = route(Some("design"), &outputs).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].id, "design-out");
    }

    #[test]
    fn test_null_domain_routes_to_default() {
        let outputs = vec![
            output("design-out", &["design"], false, true),
            output("dev-out", &["dev"], true, true),
        ];

        let routed = route(None, &outputs).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].id, "dev-out");
    }

    #[test]
    fn test_unknown_domain_routes_only_to_default() {
        let outputs = vec![
            output("design-out", &["design"], false, true),
            output("dev-out", &["dev"], true, true),
        ];

        let routed = route(Some("marketing"), &outputs).unwrap();
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].id, "dev-out");
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let outputs = vec![
            output("design-out", &["design"], false, true),
            output("fallback", &[], true, true),
        ];

        let routed = route(Some("Design"), &outputs).unwrap();
        // "Design" != "design"; empty-filter default accepts it instead
        assert_eq!(routed[0].id, "fallback");
    }

    #[test]
    fn test_empty_filter_default_accepts_everything() {
        let outputs = vec![output("only", &[], true, true)];

        for domain in [Some("design"), Some("anything"), None] {
            let routed = route(domain, &outputs).unwrap();
            assert_eq!(routed.len(), 1);
            assert_eq!(routed[0].id, "only");
        }
    }

    #[test]
    fn test_multiple_matches_fan_out() {
        let outputs = vec![
            output("a", &["dev", "infra"], false, true),
            output("b", &["dev"], false, true),
            output("fallback", &["misc"], true, true),
        ];

        let routed = route(Some("dev"), &outputs).unwrap();
        let ids: Vec<&str> = routed.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_inactive_outputs_ignored() {
        let outputs = vec![
            output("inactive", &["dev"], false, false),
            output("fallback", &[], true, true),
        ];

        let routed = route(Some("dev"), &outputs).unwrap();
        // The empty-filter active default matches; the inactive output never does
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].id, "fallback");
    }

    #[test]
    fn test_two_defaults_is_a_fault() {
        let outputs = vec![
            output("a", &["design"], true, true),
            output("b", &["dev"], true, true),
        ];

        let err = route(None, &outputs).unwrap_err();
        assert!(matches!(err, RoutingError::DefaultInvariant { count: 2 }));
    }

    #[test]
    fn test_zero_defaults_is_a_fault() {
        let outputs = vec![output("a", &["design"], false, true)];

        let err = route(Some("unknown"), &outputs).unwrap_err();
        assert!(matches!(err, RoutingError::DefaultInvariant { count: 0 }));
    }

    #[test]
    fn test_route_is_deterministic() {
        let outputs = vec![
            output("a", &["dev"], false, true),
            output("b", &["dev"], true, true),
        ];

        let first: Vec<String> = route(Some("dev"), &outputs)
            .unwrap()
            .iter()
            .map(|o| o.id.clone())
            .collect();
        let second: Vec<String> = route(Some("dev"), &outputs)
            .unwrap()
            .iter()
            .map(|o| o.id.clone())
            .collect();
        assert_eq!(first, second);
    }
}
