//! Table DDL: the `alter_table` operation.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::ops::Response;
use crate::sql::builder::{self, AlterTableOp, TableRef};

/// Input for the `alter_table` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AlterTableInput {
    pub target: String,
    /// Schema name. Defaults to `dbo`.
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// The change to apply, tagged by `operation`.
    #[serde(flatten)]
    pub operation: AlterTableOp,
}

/// Output of the `alter_table` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct AlterTableOutput {
    /// The statements that ran, in order.
    pub statements: Vec<String>,
    /// Best-effort statements that failed and were skipped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    pub execution_time_ms: u64,
}

pub struct AlterOps {
    gateway: Arc<Gateway>,
}

impl AlterOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn alter_table(&self, input: AlterTableInput) -> Response<AlterTableOutput> {
        Response::from_result(self.try_alter(input).await)
    }

    async fn try_alter(&self, input: AlterTableInput) -> GatewayResult<AlterTableOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let table = TableRef::new(input.schema.as_deref(), &input.table)?;

        // A nullability-only change has to restate the column's current
        // type; T-SQL makes the type mandatory in ALTER COLUMN.
        let current_type = match &input.operation {
            AlterTableOp::AlterColumn {
                column,
                data_type: None,
                nullable: Some(_),
                ..
            } => Some(
                runtime
                    .introspector()
                    .column_sql_type(input.schema.as_deref(), &input.table, column)
                    .await?,
            ),
            _ => None,
        };

        let steps = builder::alter_table(&table, &input.operation, current_type.as_deref())?;

        let started = Instant::now();
        let mut statements = Vec::with_capacity(steps.len());
        let mut skipped = Vec::new();
        for step in steps {
            let result = runtime.executor().execute(&step.sql, &[], false, None).await;
            match result {
                Ok(_) => statements.push(step.sql),
                Err(error) if step.best_effort => {
                    warn!(
                        target = %input.target,
                        table = %table.dotted(),
                        sql = %step.sql,
                        error = %error,
                        "best-effort DDL step skipped"
                    );
                    skipped.push(step.sql);
                }
                Err(error) => return Err(error),
            }
        }
        let execution_time_ms = started.elapsed().as_millis() as u64;

        info!(
            target = %input.target,
            table = %table.dotted(),
            statements = statements.len(),
            skipped = skipped.len(),
            execution_time_ms,
            "alter_table completed"
        );
        Ok(AlterTableOutput {
            statements,
            skipped,
            execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operation_tag_deserializes() {
        let input: AlterTableInput = serde_json::from_value(json!({
            "target": "test",
            "table": "Orders",
            "operation": "add_column",
            "column": "Notes",
            "data_type": "nvarchar(500)"
        }))
        .expect("input deserializes");
        assert!(matches!(
            input.operation,
            AlterTableOp::AddColumn { ref column, .. } if column == "Notes"
        ));
    }

    #[test]
    fn rename_table_deserializes() {
        let input: AlterTableInput = serde_json::from_value(json!({
            "target": "test",
            "schema": "sales",
            "table": "Orders",
            "operation": "rename_table",
            "new_name": "OrderHistory"
        }))
        .expect("input deserializes");
        assert!(matches!(
            input.operation,
            AlterTableOp::RenameTable { ref new_name } if new_name == "OrderHistory"
        ));
    }

    #[tokio::test]
    async fn bad_identifier_is_rejected_without_touching_the_target() {
        let mut config = crate::config::Config::default_config();
        config.targets =
            vec!["test=mssql://u:p@127.0.0.1:1/TestDb?connect_timeout=1".to_string()];
        let ops = AlterOps::new(Arc::new(Gateway::new(&config).expect("gateway builds")));

        let response = ops
            .alter_table(AlterTableInput {
                target: "test".to_string(),
                schema: None,
                table: "Orders; DROP TABLE x".to_string(),
                operation: AlterTableOp::DropColumn {
                    column: "Notes".to_string(),
                },
            })
            .await;
        assert!(!response.success);
    }
}
