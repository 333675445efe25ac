//! Raw statement execution.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::StatementOutcome;
use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::models::{
    DEFAULT_ROW_LIMIT, RowMap, SqlParam, effective_row_limit, effective_timeout,
};
use crate::ops::Response;
use crate::sql::validator;

/// Input for the `query` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Name of the configured target to run against.
    pub target: String,
    /// Statement text. Uses @P1..@Pn positional placeholders.
    pub sql: String,
    /// Values bound to the placeholders, in order.
    #[serde(default)]
    pub params: Vec<SqlParam>,
    /// Row cap for SELECT statements. Default 1000, max 10000.
    #[serde(default)]
    pub row_limit: Option<usize>,
    /// Statement timeout in seconds. Default 30, max 300.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Run inside an open transaction instead of auto-commit.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Output of the `query` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryOutput {
    /// Result column names, in select order. Empty for non-SELECT statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Result rows. Empty for non-SELECT statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RowMap>,
    /// Rows returned for a SELECT, rows affected otherwise.
    pub row_count: u64,
    pub execution_time_ms: u64,
}

pub struct QueryOps {
    gateway: Arc<Gateway>,
}

impl QueryOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Screen, cap, and run one statement.
    pub async fn run_query(&self, input: QueryInput) -> Response<QueryOutput> {
        Response::from_result(self.try_run(input).await)
    }

    async fn try_run(&self, input: QueryInput) -> GatewayResult<QueryOutput> {
        validator::validate_statement(&input.sql)?;
        let runtime = self.gateway.target(&input.target)?;

        let fetch = validator::is_select(&input.sql);
        let sql = if fetch {
            let limit = effective_row_limit(input.row_limit, DEFAULT_ROW_LIMIT);
            validator::apply_row_limit(&input.sql, limit)
        } else {
            input.sql.clone()
        };
        let timeout =
            effective_timeout(input.timeout_secs, runtime.executor().default_timeout());

        let started = Instant::now();
        let outcome = match &input.transaction_id {
            Some(transaction_id) => {
                runtime
                    .transactions()
                    .execute_in(transaction_id, &sql, &input.params, fetch)
                    .await?
            }
            None => {
                runtime
                    .executor()
                    .execute(&sql, &input.params, fetch, Some(timeout))
                    .await?
            }
        };
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let row_count = outcome.row_count();
        let (columns, rows) = match outcome {
            StatementOutcome::Rows(set) => (set.columns, set.rows),
            StatementOutcome::Affected(_) => (Vec::new(), Vec::new()),
        };

        info!(
            target = %input.target,
            fetch,
            row_count,
            execution_time_ms,
            in_transaction = input.transaction_id.is_some(),
            "query completed"
        );
        Ok(QueryOutput {
            columns,
            rows,
            row_count,
            execution_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::GatewayError;

    fn ops() -> QueryOps {
        let mut config = Config::default_config();
        config.targets =
            vec!["test=mssql://u:p@127.0.0.1:1/TestDb?connect_timeout=1".to_string()];
        QueryOps::new(Arc::new(Gateway::new(&config).expect("gateway builds")))
    }

    fn input(sql: &str) -> QueryInput {
        QueryInput {
            target: "test".to_string(),
            sql: sql.to_string(),
            params: Vec::new(),
            row_limit: None,
            timeout_secs: None,
            transaction_id: None,
        }
    }

    #[tokio::test]
    async fn blocked_statement_never_reaches_the_target() {
        let ops = ops();
        let response = ops.run_query(input("DROP TABLE Users")).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("rejected"));
    }

    #[tokio::test]
    async fn unknown_target_is_reported() {
        let ops = ops();
        let mut bad = input("SELECT 1");
        bad.target = "missing".to_string();
        let response = ops.run_query(bad).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn unknown_transaction_is_reported_before_connecting() {
        let ops = ops();
        let mut in_tx = input("SELECT 1");
        in_tx.transaction_id = Some("tx_nope".to_string());
        let response = ops.run_query(in_tx).await;
        assert!(!response.success);
        assert!(response.error.unwrap().contains("tx_nope"));
    }

    #[test]
    fn screen_runs_before_target_lookup() {
        // Validation failures must win over target lookup failures.
        let result = validator::validate_statement("TRUNCATE TABLE x");
        assert!(matches!(result, Err(GatewayError::Validation { .. })));
    }
}
