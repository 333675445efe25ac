//! Stored procedure execution and inspection.

use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::models::{
    ParameterSummary, ProcedureInfo, RowMap, effective_timeout,
};
use crate::ops::Response;
use crate::sql::builder::{self, TableRef};

/// Input for the `execute_procedure` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteProcedureInput {
    pub target: String,
    /// Schema name. Defaults to `dbo`.
    #[serde(default)]
    pub schema: Option<String>,
    pub procedure: String,
    /// Named parameter values, passed as `@name = value`.
    #[serde(default)]
    pub parameters: RowMap,
    /// Output parameter names to read back after the call. Best effort:
    /// values the procedure assigned through OUTPUT parameters are not
    /// visible to the probe and come back null.
    #[serde(default)]
    pub output_parameters: Vec<String>,
    /// Timeout in seconds. Default 30, max 300.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Output of the `execute_procedure` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteProcedureOutput {
    /// Every result set the procedure produced, in order.
    pub result_sets: Vec<Vec<RowMap>>,
    /// Probed output parameter values.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub output_parameters: RowMap,
    /// Parameter names that were passed to the call.
    pub parameters_used: Vec<String>,
    pub execution_time_ms: u64,
}

/// Input for the `procedure_info` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProcedureInfoInput {
    pub target: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub procedure: String,
    /// Include the procedure body in the response. Defaults to true.
    #[serde(default = "default_true")]
    pub include_definition: bool,
}

fn default_true() -> bool {
    true
}

/// Output of the `procedure_info` operation.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProcedureInfoOutput {
    pub procedure: ProcedureInfo,
    pub parameter_summary: ParameterSummary,
}

pub struct ProcedureOps {
    gateway: Arc<Gateway>,
}

impl ProcedureOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn execute_procedure(
        &self,
        input: ExecuteProcedureInput,
    ) -> Response<ExecuteProcedureOutput> {
        Response::from_result(self.try_execute(input).await)
    }

    pub async fn procedure_info(&self, input: ProcedureInfoInput) -> Response<ProcedureInfoOutput> {
        Response::from_result(self.try_info(input).await)
    }

    async fn try_execute(
        &self,
        input: ExecuteProcedureInput,
    ) -> GatewayResult<ExecuteProcedureOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let procedure = TableRef::new(input.schema.as_deref(), &input.procedure)?;
        let call = builder::procedure_call(&procedure, &input.parameters)?;
        let timeout =
            effective_timeout(input.timeout_secs, runtime.executor().default_timeout());

        let started = Instant::now();
        let result = runtime
            .executor()
            .execute_procedure(&call, &input.output_parameters, Some(timeout))
            .await?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        info!(
            target = %input.target,
            procedure = %procedure.dotted(),
            result_sets = result.result_sets.len(),
            execution_time_ms,
            "procedure executed"
        );
        Ok(ExecuteProcedureOutput {
            result_sets: result.result_sets,
            output_parameters: result.output_parameters,
            parameters_used: input.parameters.keys().cloned().collect(),
            execution_time_ms,
        })
    }

    async fn try_info(&self, input: ProcedureInfoInput) -> GatewayResult<ProcedureInfoOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let procedure = runtime
            .introspector()
            .procedure_info(
                input.schema.as_deref(),
                &input.procedure,
                input.include_definition,
            )
            .await?;
        let parameter_summary = ParameterSummary::from_parameters(&procedure.parameters);
        Ok(ProcedureInfoOutput {
            procedure,
            parameter_summary,
        })
    }
}
