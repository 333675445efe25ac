//! Statement execution against a pooled target.
//!
//! Every execution path checks a connection out of the pool and hands it
//! back before returning: released for reuse on success and on server-side
//! errors, destroyed on timeout (a timed-out stream leaves the session
//! desynchronized, so the handle must not be reused).

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::db::pool::{ConnectionHandle, ConnectionPool};
use crate::db::types::{bind_params, row_to_map, rows_to_result_set};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ProcedureResult, ResultSet, RowMap, SqlParam};
use crate::sql::builder::{self, BoundStatement};

/// What one statement produced.
#[derive(Debug, Clone)]
pub enum StatementOutcome {
    /// First result set, in fetch mode.
    Rows(ResultSet),
    /// Total rows affected, in non-fetch mode.
    Affected(u64),
}

impl StatementOutcome {
    pub fn row_count(&self) -> u64 {
        match self {
            Self::Rows(set) => set.row_count() as u64,
            Self::Affected(n) => *n,
        }
    }
}

/// Executes statements against one target's pool.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: Arc<ConnectionPool>,
    default_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: Arc<ConnectionPool>, default_timeout: Duration) -> Self {
        Self {
            pool,
            default_timeout,
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run one statement. `fetch` selects between reading the first result
    /// set and reporting affected rows.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[SqlParam],
        fetch: bool,
        timeout: Option<Duration>,
    ) -> GatewayResult<StatementOutcome> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();
        let mut handle = self.pool.acquire().await?;

        // Bind before matching so the borrow of `handle` ends here.
        let outcome =
            tokio::time::timeout(timeout, Self::run_on(&mut handle, sql, params, fetch)).await;
        match outcome {
            Ok(result) => {
                self.pool.release(handle).await;
                if result.is_ok() {
                    debug!(
                        target = %self.pool.target().name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        fetch,
                        "statement executed"
                    );
                }
                result
            }
            Err(_) => {
                handle.close().await;
                Err(GatewayError::timeout("query execution", timeout.as_secs()))
            }
        }
    }

    /// Run one statement on an already-held connection. Used directly by the
    /// transaction registry, which owns its handle for the transaction's
    /// lifetime.
    pub(crate) async fn run_on(
        handle: &mut ConnectionHandle,
        sql: &str,
        params: &[SqlParam],
        fetch: bool,
    ) -> GatewayResult<StatementOutcome> {
        if fetch {
            let stream = handle.client.query(sql, &bind_params(params)).await?;
            let rows = stream.into_first_result().await?;
            Ok(StatementOutcome::Rows(rows_to_result_set(&rows)))
        } else {
            let result = handle.client.execute(sql, &bind_params(params)).await?;
            Ok(StatementOutcome::Affected(result.total()))
        }
    }

    /// Run a procedure call and collect every result set, then probe the
    /// requested output parameters on the same connection.
    ///
    /// The probes are best-effort: `SELECT @name` after the batch cannot see
    /// values the procedure assigned to T-SQL OUTPUT parameters, so they
    /// usually come back null, and a probe that errors is logged and
    /// skipped.
    pub async fn execute_procedure(
        &self,
        call: &BoundStatement,
        output_names: &[String],
        timeout: Option<Duration>,
    ) -> GatewayResult<ProcedureResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let mut handle = self.pool.acquire().await?;

        let collect = async {
            let stream = handle
                .client
                .query(&call.sql, &bind_params(&call.params))
                .await?;
            let results = stream.into_results().await?;
            Ok::<_, GatewayError>(results)
        };

        let outcome = tokio::time::timeout(timeout, collect).await;
        let results = match outcome {
            Ok(Ok(results)) => results,
            Ok(Err(err)) => {
                self.pool.release(handle).await;
                return Err(err);
            }
            Err(_) => {
                handle.close().await;
                return Err(GatewayError::timeout(
                    "procedure execution",
                    timeout.as_secs(),
                ));
            }
        };

        let output_parameters = Self::probe_outputs(&mut handle, output_names).await;
        self.pool.release(handle).await;

        Ok(ProcedureResult {
            result_sets: results
                .iter()
                .map(|rows| rows.iter().map(row_to_map).collect())
                .collect(),
            output_parameters,
        })
    }

    async fn probe_outputs(handle: &mut ConnectionHandle, output_names: &[String]) -> RowMap {
        let mut outputs = RowMap::new();
        for name in output_names {
            let probe = match builder::output_probe(name) {
                Ok(sql) => sql,
                Err(err) => {
                    warn!(parameter = %name, error = %err, "skipping invalid output parameter");
                    continue;
                }
            };
            let value = match handle.client.query(&probe, &[]).await {
                Ok(stream) => match stream.into_row().await {
                    Ok(Some(row)) => row_to_map(&row)
                        .into_iter()
                        .next()
                        .map(|(_, v)| v)
                        .unwrap_or(serde_json::Value::Null),
                    Ok(None) => serde_json::Value::Null,
                    Err(err) => {
                        warn!(parameter = %name, error = %err, "output parameter probe failed");
                        continue;
                    }
                },
                Err(err) => {
                    warn!(parameter = %name, error = %err, "output parameter probe failed");
                    continue;
                }
            };
            outputs.insert(name.clone(), value);
        }
        outputs
    }
}
