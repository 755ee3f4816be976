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

//! Embedded SurrealDB client for the pipeline tables.
//!
//! All writes are single-row: the ledger model (one job row per attempt,
//! one discussion row per webhook) never needs multi-row transactions.
//! Record ids are always bound as parameters and inserted via
//! `type::thing`, never spliced into query text, because every id that
//! reaches this layer originally came out of a webhook.
//!
//! [`DBClient::create`] additionally scrubs the row payload
//! ([`scrub_payload`]) so NUL bytes or CRLF line endings from upstream
//! text can never reach a Strand field.

use super::utils::scrub_payload;
use anyhow::Result;
use surrealdb::{
    engine::local::{Db, RocksDb},
    Surreal,
};
use tracing::{debug, error, info, instrument};

/// Handle to the embedded pipeline database.
pub struct DBClient {
    pub db: Surreal<Db>,
}

impl DBClient {
    /// Opens (or creates) the RocksDB-backed database at `path` and
    /// selects the pipeline namespace.
    #[instrument(name = "store_open", skip_all, fields(db_path = %path))]
    pub async fn new(path: &str) -> Result<Self> {
        let db = Surreal::new::<RocksDb>(path).await.map_err(|e| {
            error!(error = %e, "Could not open pipeline database");
            e
        })?;

        db.use_ns("discusync").use_db("pipeline").await.map_err(|e| {
            error!(error = %e, "Could not select pipeline namespace");
            e
        })?;

        info!("Pipeline database opened");
        Ok(Self { db })
    }

    /// Applies the table definitions (flows, discussions, jobs, task
    /// records, mappings, legacy configs). Idempotent: every definition
    /// uses OVERWRITE.
    #[instrument(name = "store_define_schema", skip(self))]
    pub async fn initialize_schema(&self) -> Result<()> {
        use super::schema::SCHEMA_SQL;

        self.db.query(SCHEMA_SQL).await.map_err(|e| {
            error!(error = %e, "Schema definition failed");
            e
        })?;

        info!("Pipeline tables defined");
        Ok(())
    }

    /// Runs a SELECT and deserializes the rows into `T`.
    ///
    /// Row models carry `deserialize_thing_id` on their id fields, so
    /// queries are expected to project `meta::id(id) AS id`.
    #[instrument(name = "store_select", skip(self), fields(query_len = query.len()))]
    pub async fn query<T>(&self, query: &str) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut result = self.db.query(query).await.map_err(|e| {
            error!(error = %e, "Row select failed");
            e
        })?;

        let rows: Vec<T> = result.take(0).map_err(|e| {
            error!(error = %e, "Selected rows did not match the model shape");
            e
        })?;

        debug!(rows = rows.len(), "Select done");
        Ok(rows)
    }

    /// Runs a SELECT and returns raw JSON rows.
    ///
    /// For shapes with no model struct (INFO queries, ad-hoc checks).
    #[instrument(name = "store_select_json", skip(self), fields(query_len = query.len()))]
    pub async fn query_json(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let mut result = self.db.query(query).await.map_err(|e| {
            error!(error = %e, "Row select failed");
            e
        })?;

        let rows: Vec<serde_json::Value> = result.take(0).map_err(|e| {
            error!(error = %e, "Could not read selected rows");
            e
        })?;

        debug!(rows = rows.len(), "Select done");
        Ok(rows)
    }

    /// Runs a statement for its side effect only (DELETE, schema tweaks).
    #[instrument(name = "store_execute", skip(self), fields(query_len = query.len()))]
    pub async fn execute(&self, query: &str) -> Result<()> {
        self.db.query(query).await.map_err(|e| {
            error!(error = %e, "Statement failed");
            e
        })?;
        Ok(())
    }

    /// Inserts one row with an explicit record id.
    ///
    /// The payload is serialized, scrubbed ([`scrub_payload`]), and
    /// attached via CONTENT; the id goes through `type::thing` as a bound
    /// parameter. The payload must not carry an `id` field of its own.
    ///
    /// SCHEMAFULL tables can reject an ASSERT violation without raising
    /// an error, so the insert is verified by reading the created id
    /// back.
    #[instrument(name = "store_insert", skip(self, row), fields(table = %table, row_id = %id))]
    pub async fn create<T>(&self, table: &str, id: &str, row: T) -> Result<String>
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        let payload = scrub_payload(serde_json::to_value(&row).map_err(|e| {
            error!(error = %e, "Row payload is not serializable");
            anyhow::anyhow!("Row serialization failed: {}", e)
        })?);

        let mut result = self
            .db
            .query("CREATE type::thing($tb, $row_id) CONTENT $row RETURN meta::id(id) AS id")
            .bind(("tb", table.to_string()))
            .bind(("row_id", id.to_string()))
            .bind(("row", payload.clone()))
            .await
            .map_err(|e| {
                error!(error = %e, "Row insert failed");
                e
            })?;

        let inserted: Option<serde_json::Value> = result.take(0).map_err(|e| {
            error!(error = %e, "Could not read insert result");
            anyhow::anyhow!("Could not read insert result: {}", e)
        })?;

        match inserted {
            Some(_) => {
                debug!("Row inserted");
                Ok(id.to_string())
            }
            None => {
                error!(row = %payload, "Row rejected by a field constraint");
                Err(anyhow::anyhow!(
                    "{} row {} violates a field constraint and was not inserted",
                    table,
                    id
                ))
            }
        }
    }

    /// Runs a parameterized SELECT and deserializes the rows into `T`.
    ///
    /// Values that came out of webhooks (routing keys, thread ids, user
    /// ids) must always arrive here as parameters, never inside the query
    /// text.
    #[instrument(name = "store_select_bound", skip(self, params), fields(query_len = query.len(), params = params.len()))]
    pub async fn query_with_params<T>(
        &self,
        query: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut pending = self.db.query(query);
        for (name, value) in params {
            pending = pending.bind((name, value));
        }

        let mut result = pending.await.map_err(|e| {
            error!(error = %e, "Bound select failed");
            e
        })?;

        let rows: Vec<T> = result.take(0).map_err(|e| {
            error!(error = %e, "Selected rows did not match the model shape");
            e
        })?;

        debug!(rows = rows.len(), "Bound select done");
        Ok(rows)
    }

    /// Runs a parameterized SELECT and returns raw JSON rows.
    #[instrument(name = "store_select_json_bound", skip(self, params), fields(query_len = query.len(), params = params.len()))]
    pub async fn query_json_with_params(
        &self,
        query: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> Result<Vec<serde_json::Value>> {
        let mut pending = self.db.query(query);
        for (name, value) in params {
            pending = pending.bind((name, value));
        }

        let mut result = pending.await.map_err(|e| {
            error!(error = %e, "Bound select failed");
            e
        })?;

        let rows: Vec<serde_json::Value> = result.take(0).map_err(|e| {
            error!(error = %e, "Could not read selected rows");
            e
        })?;

        debug!(rows = rows.len(), "Bound select done");
        Ok(rows)
    }

    /// Runs a parameterized single-row mutation (the stage-transition
    /// UPDATEs) for its side effect.
    #[instrument(name = "store_mutate_bound", skip(self, params), fields(query_len = query.len(), params = params.len()))]
    pub async fn execute_with_params(
        &self,
        query: &str,
        params: Vec<(String, serde_json::Value)>,
    ) -> Result<()> {
        let mut pending = self.db.query(query);
        for (name, value) in params {
            pending = pending.bind((name, value));
        }

        pending.await.map_err(|e| {
            error!(error = %e, "Bound mutation failed");
            e
        })?;

        debug!("Bound mutation done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_database() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_db");

        let result = DBClient::new(db_path.to_str().unwrap()).await;
        assert!(result.is_ok(), "Opening a fresh database should succeed");
    }

    #[tokio::test]
    async fn test_open_invalid_path() {
        let result = DBClient::new("/nonexistent/path/that/cannot/be/created/db").await;
        assert!(result.is_err(), "Should fail with an unwritable path");
    }

    #[tokio::test]
    async fn test_define_schema() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("schema_test_db");

        let db = DBClient::new(db_path.to_str().unwrap())
            .await
            .expect("DB open failed");
        assert!(db.initialize_schema().await.is_ok());
        // Idempotent: OVERWRITE definitions can be re-applied
        assert!(db.initialize_schema().await.is_ok());
    }

    #[tokio::test]
    async fn test_select_empty_table() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("query_test_db");

        let db = DBClient::new(db_path.to_str().unwrap())
            .await
            .expect("DB open failed");
        db.initialize_schema().await.expect("Schema init failed");

        let rows: Vec<serde_json::Value> = db
            .query("SELECT * FROM discussion")
            .await
            .expect("Select failed");
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_select_back() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("create_test_db");

        let db = DBClient::new(db_path.to_str().unwrap())
            .await
            .expect("DB open failed");
        db.initialize_schema().await.expect("Schema init failed");

        let row = serde_json::json!({
            "tenant_id": "t-1",
            "source_type": "chat",
            "source_workspace_id": "T01",
            "source_user_id": "U1",
            "dest_user_id": "kb-1",
            "active": true,
            "created_by": "system",
            "updated_by": "system",
        });

        let id = db
            .create("user_mapping", "um-1", row)
            .await
            .expect("Insert failed");
        assert_eq!(id, "um-1");

        let rows = db
            .query_json("SELECT meta::id(id) AS id, source_user_id FROM user_mapping")
            .await
            .expect("Select failed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["source_user_id"], "U1");
    }

    #[tokio::test]
    async fn test_insert_scrubs_payload() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("scrub_test_db");

        let db = DBClient::new(db_path.to_str().unwrap())
            .await
            .expect("DB open failed");
        db.initialize_schema().await.expect("Schema init failed");

        // NUL bytes and CRLF endings in webhook-derived strings are
        // cleaned before they reach a Strand field
        let row = serde_json::json!({
            "tenant_id": "t-1",
            "source_type": "chat",
            "source_workspace_id": "T01",
            "source_user_id": "U\01",
            "source_user_name": "ana\r\nmaria",
            "dest_user_id": "kb-1",
            "active": true,
            "created_by": "system",
            "updated_by": "system",
        });

        db.create("user_mapping", "um-scrub", row)
            .await
            .expect("Insert failed");

        let rows = db
            .query_json(
                "SELECT source_user_id, source_user_name FROM user_mapping \
                 WHERE meta::id(id) = 'um-scrub'",
            )
            .await
            .expect("Select failed");
        assert_eq!(rows[0]["source_user_id"], "U1");
        assert_eq!(rows[0]["source_user_name"], "ana\nmaria");
    }

    #[tokio::test]
    async fn test_constraint_violation_is_an_error() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("assert_test_db");

        let db = DBClient::new(db_path.to_str().unwrap())
            .await
            .expect("DB open failed");
        db.initialize_schema().await.expect("Schema init failed");

        // source_type is constrained to the two known sources
        let row = serde_json::json!({
            "tenant_id": "t-1",
            "source_type": "carrier_pigeon",
            "source_workspace_id": "T01",
            "source_user_id": "U1",
            "dest_user_id": "kb-1",
            "active": true,
            "created_by": "system",
            "updated_by": "system",
        });

        let result = db.create("user_mapping", "um-bad", row).await;
        assert!(result.is_err(), "Constraint violations must surface");
    }
}
