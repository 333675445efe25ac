//! Single-table insert, update, and delete.
//!
//! Statement text is assembled by the builder from validated identifiers;
//! every value travels as a bound parameter.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::StatementOutcome;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{Gateway, TargetRuntime};
use crate::models::RowMap;
use crate::ops::Response;
use crate::sql::builder::{self, BoundStatement, TableRef};

fn default_true() -> bool {
    true
}

/// Input for the `insert` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertInput {
    pub target: String,
    /// Schema name. Defaults to `dbo`.
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Column name to value map for the new row.
    pub data: RowMap,
    /// Return the identity value generated for the row, when the table has
    /// an identity column.
    #[serde(default = "default_true")]
    pub return_identity: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Input for the `update` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    pub target: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Column name to new value map.
    pub data: RowMap,
    /// WHERE clause without the leading keyword, e.g. `Id = @Id`.
    pub where_clause: String,
    /// Values for the named parameters referenced by the WHERE clause.
    #[serde(default)]
    pub where_params: RowMap,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Input for the `delete` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteInput {
    pub target: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// WHERE clause without the leading keyword.
    pub where_clause: String,
    #[serde(default)]
    pub where_params: RowMap,
    /// Must be `true` for the delete to run.
    #[serde(default)]
    pub confirm_delete: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Output shared by the write operations.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WriteOutput {
    pub rows_affected: u64,
    /// Identity value of the inserted row, when requested and available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<i64>,
    pub execution_time_ms: u64,
}

pub struct CrudOps {
    gateway: Arc<Gateway>,
}

impl CrudOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn insert(&self, input: InsertInput) -> Response<WriteOutput> {
        Response::from_result(self.try_insert(input).await)
    }

    pub async fn update(&self, input: UpdateInput) -> Response<WriteOutput> {
        Response::from_result(self.try_update(input).await)
    }

    pub async fn delete(&self, input: DeleteInput) -> Response<WriteOutput> {
        Response::from_result(self.try_delete(input).await)
    }

    async fn try_insert(&self, input: InsertInput) -> GatewayResult<WriteOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let table = TableRef::new(input.schema.as_deref(), &input.table)?;
        let statement = builder::insert(&table, &input.data, input.return_identity)?;

        let started = Instant::now();
        let outcome = run(
            runtime,
            &statement,
            input.return_identity,
            input.transaction_id.as_deref(),
        )
        .await?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        // With identity return the batch yields one probe row; the insert
        // itself wrote exactly one.
        let (rows_affected, inserted_id) = match outcome {
            StatementOutcome::Rows(set) => (
                1,
                set.rows
                    .first()
                    .and_then(|row| row.get("inserted_id"))
                    .and_then(|value| value.as_i64()),
            ),
            StatementOutcome::Affected(n) => (n, None),
        };

        info!(
            target = %input.target,
            table = %table.dotted(),
            rows_affected,
            execution_time_ms,
            "insert completed"
        );
        Ok(WriteOutput {
            rows_affected,
            inserted_id,
            execution_time_ms,
        })
    }

    async fn try_update(&self, input: UpdateInput) -> GatewayResult<WriteOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let table = TableRef::new(input.schema.as_deref(), &input.table)?;
        let statement = builder::update(
            &table,
            &input.data,
            &input.where_clause,
            &input.where_params,
        )?;

        let started = Instant::now();
        let outcome = run(runtime, &statement, false, input.transaction_id.as_deref()).await?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        info!(
            target = %input.target,
            table = %table.dotted(),
            rows_affected = outcome.row_count(),
            execution_time_ms,
            "update completed"
        );
        Ok(WriteOutput {
            rows_affected: outcome.row_count(),
            inserted_id: None,
            execution_time_ms,
        })
    }

    async fn try_delete(&self, input: DeleteInput) -> GatewayResult<WriteOutput> {
        // The confirmation gate comes before anything else, including
        // identifier validation.
        if !input.confirm_delete {
            return Err(GatewayError::usage(
                "Delete operations require confirmation. Set 'confirm_delete' to true.",
            ));
        }

        let runtime = self.gateway.target(&input.target)?;
        let table = TableRef::new(input.schema.as_deref(), &input.table)?;
        let statement = builder::delete(
            &table,
            &input.where_clause,
            &input.where_params,
            input.confirm_delete,
        )?;

        let started = Instant::now();
        let outcome = run(runtime, &statement, false, input.transaction_id.as_deref()).await?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        info!(
            target = %input.target,
            table = %table.dotted(),
            rows_affected = outcome.row_count(),
            execution_time_ms,
            "delete completed"
        );
        Ok(WriteOutput {
            rows_affected: outcome.row_count(),
            inserted_id: None,
            execution_time_ms,
        })
    }
}

async fn run(
    runtime: &Arc<TargetRuntime>,
    statement: &BoundStatement,
    fetch: bool,
    transaction_id: Option<&str>,
) -> GatewayResult<StatementOutcome> {
    match transaction_id {
        Some(transaction_id) => {
            runtime
                .transactions()
                .execute_in(transaction_id, &statement.sql, &statement.params, fetch)
                .await
        }
        None => {
            runtime
                .executor()
                .execute(&statement.sql, &statement.params, fetch, None)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn ops() -> CrudOps {
        let mut config = Config::default_config();
        config.targets =
            vec!["test=mssql://u:p@127.0.0.1:1/TestDb?connect_timeout=1".to_string()];
        CrudOps::new(Arc::new(Gateway::new(&config).expect("gateway builds")))
    }

    fn row(entries: &[(&str, serde_json::Value)]) -> RowMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn unconfirmed_delete_is_rejected_before_anything_else() {
        let ops = ops();
        let response = ops
            .delete(DeleteInput {
                target: "nonexistent".to_string(),
                schema: None,
                // Invalid identifier on purpose; the confirmation gate must
                // fire first.
                table: "bad name".to_string(),
                where_clause: String::new(),
                where_params: RowMap::new(),
                confirm_delete: false,
                transaction_id: None,
            })
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("confirm_delete"));
    }

    #[tokio::test]
    async fn update_without_where_is_rejected() {
        let ops = ops();
        let response = ops
            .update(UpdateInput {
                target: "test".to_string(),
                schema: None,
                table: "Users".to_string(),
                data: row(&[("Name", json!("a"))]),
                where_clause: "  ".to_string(),
                where_params: RowMap::new(),
                transaction_id: None,
            })
            .await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("WHERE"));
    }

    #[tokio::test]
    async fn insert_with_bad_column_is_rejected() {
        let ops = ops();
        let response = ops
            .insert(InsertInput {
                target: "test".to_string(),
                schema: None,
                table: "Users".to_string(),
                data: row(&[("Name]; DROP TABLE x", json!("a"))]),
                return_identity: true,
                transaction_id: None,
            })
            .await;
        assert!(!response.success);
    }

    #[tokio::test]
    async fn tautological_where_is_rejected() {
        let ops = ops();
        let response = ops
            .delete(DeleteInput {
                target: "test".to_string(),
                schema: None,
                table: "Users".to_string(),
                where_clause: "1=1 OR 1=1".to_string(),
                where_params: RowMap::new(),
                confirm_delete: true,
                transaction_id: None,
            })
            .await;
        assert!(!response.success);
    }
}
