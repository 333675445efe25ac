//! Target administration: connectivity checks and target listing.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::Gateway;
use crate::ops::Response;

/// Input for the `test_connection` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TestConnectionInput {
    pub target: String,
}

/// Output of the `test_connection` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TestConnectionOutput {
    pub target: String,
    pub latency_ms: u64,
}

/// Output of the `list_targets` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TargetListOutput {
    pub targets: Vec<String>,
    pub target_count: usize,
}

pub struct AdminOps {
    gateway: Arc<Gateway>,
}

impl AdminOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Open (or reuse) a connection, round-trip a probe, and hand it back.
    pub async fn test_connection(&self, input: TestConnectionInput) -> Response<TestConnectionOutput> {
        Response::from_result(self.try_test(input).await)
    }

    pub fn list_targets(&self) -> Response<TargetListOutput> {
        let targets = self.gateway.target_names();
        Response::ok(TargetListOutput {
            target_count: targets.len(),
            targets,
        })
    }

    async fn try_test(&self, input: TestConnectionInput) -> GatewayResult<TestConnectionOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let started = Instant::now();
        let mut handle = runtime.pool().acquire().await?;
        let alive = handle.probe().await;
        let latency_ms = started.elapsed().as_millis() as u64;
        if alive {
            runtime.pool().release(handle).await;
        } else {
            handle.close().await;
            return Err(GatewayError::connection(format!(
                "Probe of target '{}' failed",
                input.target
            )));
        }

        info!(target = %input.target, latency_ms, "connection test succeeded");
        Ok(TestConnectionOutput {
            target: input.target,
            latency_ms,
        })
    }
}
