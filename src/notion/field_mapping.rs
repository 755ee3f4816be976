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

//! Field mapping: canonical analyzer fields → typed destination
//! properties.
//!
//! Canonical names are `priority`, `type`, `assignee`, `due_date`, `tags`.
//! Each maps to a destination property name, a property type, and (for the
//! closed-enum select-likes) an optional value map translating canonical
//! values to the database's option names. Fields the analyzer left null
//! are simply omitted.

use crate::models::DetectedTask;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Destination property kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Select,
    MultiSelect,
    Status,
    People,
    Date,
    RichText,
}

impl PropertyType {
    /// Select-likes carry a closed option set, so value maps apply.
    fn is_select_like(&self) -> bool {
        matches!(
            self,
            PropertyType::Select | PropertyType::MultiSelect | PropertyType::Status
        )
    }
}

/// One canonical-field target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTarget {
    /// Destination property name
    pub dest_property: String,

    pub property_type: PropertyType,

    /// Canonical value → destination option name (select-likes only)
    #[serde(default)]
    pub value_map: Option<HashMap<String, String>>,
}

impl FieldTarget {
    fn translate<'a>(&'a self, value: &'a str) -> &'a str {
        if self.property_type.is_select_like() {
            if let Some(map) = &self.value_map {
                if let Some(mapped) = map.get(value) {
                    return mapped;
                }
            }
        }
        value
    }

    /// Builds the typed property value for one canonical value (or a tag
    /// list). Returns `None` when the value cannot be expressed in the
    /// target type.
    fn property_value(&self, values: &[&str]) -> Option<Value> {
        let first = values.first()?;
        match self.property_type {
            PropertyType::Select => Some(json!({ "select": { "name": self.translate(first) } })),
            PropertyType::Status => Some(json!({ "status": { "name": self.translate(first) } })),
            PropertyType::MultiSelect => {
                let options: Vec<Value> = values
                    .iter()
                    .map(|v| json!({ "name": self.translate(v) }))
                    .collect();
                Some(json!({ "multi_select": options }))
            }
            PropertyType::People => Some(json!({
                "people": [{ "object": "user", "id": first }]
            })),
            PropertyType::Date => Some(json!({ "date": { "start": first } })),
            PropertyType::RichText => Some(json!({
                "rich_text": [{ "type": "text", "text": { "content": first } }]
            })),
        }
    }
}

/// Canonical-field → destination mapping for one output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(pub HashMap<String, FieldTarget>);

impl FieldMapping {
    pub fn get(&self, canonical: &str) -> Option<&FieldTarget> {
        self.0.get(canonical)
    }

    /// Builds the destination property map for one task's AI-populated
    /// fields. Null fields are omitted; unmapped fields are omitted.
    ///
    /// The `assignee` value is already a destination user id (the mention
    /// rewrite exposes them to the model), so a `people` target consumes
    /// it directly.
    pub fn build_properties(&self, task: &DetectedTask) -> Map<String, Value> {
        let mut properties = Map::new();

        let mut apply = |canonical: &str, values: Vec<String>| {
            if values.is_empty() {
                return;
            }
            if let Some(target) = self.get(canonical) {
                let refs: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
                if let Some(value) = target.property_value(&refs) {
                    properties.insert(target.dest_property.clone(), value);
                }
            }
        };

        if let Some(priority) = &task.priority {
            apply("priority", vec![priority.to_string()]);
        }
        if let Some(task_type) = &task.task_type {
            apply("type", vec![task_type.to_string()]);
        }
        if let Some(assignee) = &task.assignee {
            apply("assignee", vec![assignee.clone()]);
        }
        if let Some(due_date) = &task.due_date {
            apply("due_date", vec![due_date.clone()]);
        }
        if let Some(tags) = &task.tags {
            apply("tags", tags.clone());
        }

        properties
    }
}
