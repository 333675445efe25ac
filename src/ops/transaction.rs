//! Explicit transaction control.
//!
//! `begin` returns a token; statements join the transaction by passing that
//! token to the query and write operations. `commit` and `rollback` end it
//! and return its connection to the pool.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::TransactionMetadata;
use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::ops::Response;

/// Input for the `begin_transaction` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BeginTransactionInput {
    pub target: String,
    /// Seconds before the transaction is rolled back automatically.
    /// Default 60, max 300.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Output of the `begin_transaction` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BeginTransactionOutput {
    pub transaction_id: String,
}

/// Input for `commit_transaction` and `rollback_transaction`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TransactionTokenInput {
    pub target: String,
    pub transaction_id: String,
}

/// Output of `commit_transaction` and `rollback_transaction`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TransactionTokenOutput {
    pub transaction_id: String,
    /// `committed` or `rolled_back`.
    pub status: &'static str,
}

/// Output of the `list_transactions` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TransactionListOutput {
    pub transactions: Vec<TransactionMetadata>,
    pub transaction_count: usize,
}

pub struct TransactionOps {
    gateway: Arc<Gateway>,
}

impl TransactionOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn begin(&self, input: BeginTransactionInput) -> Response<BeginTransactionOutput> {
        Response::from_result(self.try_begin(input).await)
    }

    pub async fn commit(&self, input: TransactionTokenInput) -> Response<TransactionTokenOutput> {
        Response::from_result(self.try_finish(input, true).await)
    }

    pub async fn rollback(&self, input: TransactionTokenInput) -> Response<TransactionTokenOutput> {
        Response::from_result(self.try_finish(input, false).await)
    }

    pub async fn list(&self, target: &str) -> Response<TransactionListOutput> {
        Response::from_result(self.try_list(target).await)
    }

    async fn try_begin(
        &self,
        input: BeginTransactionInput,
    ) -> GatewayResult<BeginTransactionOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let transaction_id = runtime.transactions().begin(input.timeout_secs).await?;
        Ok(BeginTransactionOutput { transaction_id })
    }

    async fn try_finish(
        &self,
        input: TransactionTokenInput,
        commit: bool,
    ) -> GatewayResult<TransactionTokenOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let status = if commit {
            runtime.transactions().commit(&input.transaction_id).await?;
            "committed"
        } else {
            runtime
                .transactions()
                .rollback(&input.transaction_id)
                .await?;
            "rolled_back"
        };
        info!(
            target = %input.target,
            transaction_id = %input.transaction_id,
            status,
            "transaction finished"
        );
        Ok(TransactionTokenOutput {
            transaction_id: input.transaction_id,
            status,
        })
    }

    async fn try_list(&self, target: &str) -> GatewayResult<TransactionListOutput> {
        let runtime = self.gateway.target(target)?;
        let transactions = runtime.transactions().list_all().await;
        Ok(TransactionListOutput {
            transaction_count: transactions.len(),
            transactions,
        })
    }
}
