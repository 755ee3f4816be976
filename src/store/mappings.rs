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

//! User mapping store.
//!
//! `snapshot` loads the full active-mapping table for one
//! `(tenant, source_type, workspace)` tuple, once per discussion, then
//! holds it in memory for the mention-rewrite pass and the assignee field.
//! Mappings from other workspaces of the same tenant are excluded.

use crate::db::DBClient;
use crate::models::{MappingSnapshot, SourceType, UserMapping, UserMappingCreate};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

const SELECT_BASE: &str = r#"SELECT
    meta::id(id) AS id,
    tenant_id,
    source_type,
    source_workspace_id,
    source_user_id,
    source_user_name,
    dest_user_id,
    dest_user_name,
    active,
    created_at,
    updated_at
FROM user_mapping"#;

/// Store for user identity mappings.
pub struct UserMappingStore {
    db: Arc<DBClient>,
}

impl UserMappingStore {
    pub fn new(db: Arc<DBClient>) -> Self {
        Self { db }
    }

    /// Creates a mapping row, enforcing uniqueness of
    /// `(tenant, source_type, workspace, source_user)` among active rows.
    #[instrument(name = "user_mapping_create", skip(self, create), fields(tenant_id = %create.tenant_id, source_user_id = %create.source_user_id))]
    pub async fn create(&self, create: UserMappingCreate) -> Result<String> {
        if create.active {
            let query = format!(
                "{} WHERE active = true AND tenant_id = $tenant \
                 AND source_type = $source_type \
                 AND source_workspace_id = $workspace \
                 AND source_user_id = $user",
                SELECT_BASE
            );
            let params = vec![
                (
                    "tenant".to_string(),
                    serde_json::Value::String(create.tenant_id.clone()),
                ),
                (
                    "source_type".to_string(),
                    serde_json::Value::String(create.source_type.clone()),
                ),
                (
                    "workspace".to_string(),
                    serde_json::Value::String(create.source_workspace_id.clone()),
                ),
                (
                    "user".to_string(),
                    serde_json::Value::String(create.source_user_id.clone()),
                ),
            ];
            let existing: Vec<UserMapping> = self.db.query_with_params(&query, params).await?;
            if !existing.is_empty() {
                bail!(
                    "Active mapping already exists for {}/{}/{}/{}",
                    create.tenant_id,
                    create.source_type,
                    create.source_workspace_id,
                    create.source_user_id
                );
            }
        }

        let id = Uuid::new_v4().to_string();
        self.db.create("user_mapping", &id, create).await
    }

    /// Loads the immutable in-memory snapshot for one workspace tuple.
    #[instrument(name = "user_mapping_snapshot", skip(self), fields(tenant_id = %tenant_id, workspace_id = %workspace_id))]
    pub async fn snapshot(
        &self,
        tenant_id: &str,
        source_type: SourceType,
        workspace_id: &str,
    ) -> Result<MappingSnapshot> {
        let query = format!(
            "{} WHERE active = true AND tenant_id = $tenant \
             AND source_type = $source_type \
             AND source_workspace_id = $workspace",
            SELECT_BASE
        );
        let params = vec![
            (
                "tenant".to_string(),
                serde_json::Value::String(tenant_id.to_string()),
            ),
            (
                "source_type".to_string(),
                serde_json::Value::String(source_type.to_string()),
            ),
            (
                "workspace".to_string(),
                serde_json::Value::String(workspace_id.to_string()),
            ),
        ];
        let mappings: Vec<UserMapping> = self.db.query_with_params(&query, params).await?;
        debug!(count = mappings.len(), "Loaded mapping snapshot");
        Ok(MappingSnapshot::from_mappings(&mappings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SYSTEM_IDENTITY;
    use tempfile::tempdir;

    async fn test_store() -> (tempfile::TempDir, UserMappingStore) {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("mapping_store_db");
        let db = Arc::new(DBClient::new(path.to_str().unwrap()).await.unwrap());
        db.initialize_schema().await.unwrap();
        (temp, UserMappingStore::new(db))
    }

    fn mapping(workspace: &str, user: &str, dest: &str) -> UserMappingCreate {
        UserMappingCreate {
            tenant_id: "t-1".to_string(),
            source_type: "chat".to_string(),
            source_workspace_id: workspace.to_string(),
            source_user_id: user.to_string(),
            source_user_name: Some(format!("name-{}", user)),
            dest_user_id: dest.to_string(),
            dest_user_name: None,
            active: true,
            created_by: SYSTEM_IDENTITY.to_string(),
            updated_by: SYSTEM_IDENTITY.to_string(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_scoped_to_workspace() {
        let (_temp, store) = test_store().await;

        store.create(mapping("T01", "U1", "kb-1")).await.unwrap();
        store.create(mapping("T01", "U2", "kb-2")).await.unwrap();
        // Same tenant, different workspace: must be excluded
        store.create(mapping("T02", "U1", "kb-other")).await.unwrap();

        let snapshot = store
            .snapshot("t-1", SourceType::Chat, "T01")
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.by_id("U1").unwrap().dest_user_id, "kb-1");
        assert_eq!(snapshot.by_handle("name-U2").unwrap().dest_user_id, "kb-2");
    }

    #[tokio::test]
    async fn test_duplicate_active_tuple_rejected() {
        let (_temp, store) = test_store().await;

        store.create(mapping("T01", "U1", "kb-1")).await.unwrap();
        let dup = store.create(mapping("T01", "U1", "kb-other")).await;
        assert!(dup.is_err(), "U-1 uniqueness must be enforced");
    }

    #[tokio::test]
    async fn test_inactive_duplicate_allowed() {
        let (_temp, store) = test_store().await;

        store.create(mapping("T01", "U1", "kb-1")).await.unwrap();
        let mut inactive = mapping("T01", "U1", "kb-old");
        inactive.active = false;
        assert!(store.create(inactive).await.is_ok());

        // Snapshot only sees the active row
        let snapshot = store
            .snapshot("t-1", SourceType::Chat, "T01")
            .await
            .unwrap();
        assert_eq!(snapshot.by_id("U1").unwrap().dest_user_id, "kb-1");
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let (_temp, store) = test_store().await;
        let snapshot = store
            .snapshot("t-1", SourceType::DesignEmail, "none")
            .await
            .unwrap();
        assert!(snapshot.is_empty());
    }
}
