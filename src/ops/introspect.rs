//! Catalog read operations.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::gateway::Gateway;
use crate::models::{
    DEFAULT_ROW_LIMIT, DatabaseInfo, ProcedureInfo, RowMap, TableInfo, TableSchema, TriggerInfo,
    ViewInfo, effective_row_limit,
};
use crate::ops::Response;

/// Input naming only a target.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TargetInput {
    pub target: String,
}

/// Input naming a target and a table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableInput {
    pub target: String,
    /// Schema name. Defaults to `dbo`.
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
}

/// Input for the `table_data` operation.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableDataInput {
    pub target: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Rows to skip.
    #[serde(default)]
    pub offset: u64,
    /// Rows to return. Default 1000, max 10000.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Input for the `triggers` operation. With a name, the trigger body is
/// included.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TriggersInput {
    pub target: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Input for the `views` operation. With a name, the view body is included.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewsInput {
    pub target: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableListOutput {
    pub tables: Vec<TableInfo>,
    pub table_count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchemaOutput {
    #[serde(flatten)]
    pub schema: TableSchema,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableDataOutput {
    pub columns: Vec<String>,
    pub rows: Vec<RowMap>,
    pub row_count: usize,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProcedureListOutput {
    pub procedures: Vec<ProcedureInfo>,
    pub procedure_count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TriggerListOutput {
    pub triggers: Vec<TriggerInfo>,
    pub trigger_count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ViewListOutput {
    pub views: Vec<ViewInfo>,
    pub view_count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseInfoOutput {
    #[serde(flatten)]
    pub info: DatabaseInfo,
}

pub struct IntrospectOps {
    gateway: Arc<Gateway>,
}

impl IntrospectOps {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn list_tables(&self, input: TargetInput) -> Response<TableListOutput> {
        Response::from_result(self.try_list_tables(input).await)
    }

    pub async fn table_schema(&self, input: TableInput) -> Response<TableSchemaOutput> {
        Response::from_result(self.try_table_schema(input).await)
    }

    pub async fn table_data(&self, input: TableDataInput) -> Response<TableDataOutput> {
        Response::from_result(self.try_table_data(input).await)
    }

    pub async fn list_procedures(&self, input: TargetInput) -> Response<ProcedureListOutput> {
        Response::from_result(self.try_list_procedures(input).await)
    }

    pub async fn triggers(&self, input: TriggersInput) -> Response<TriggerListOutput> {
        Response::from_result(self.try_triggers(input).await)
    }

    pub async fn views(&self, input: ViewsInput) -> Response<ViewListOutput> {
        Response::from_result(self.try_views(input).await)
    }

    pub async fn database_info(&self, input: TargetInput) -> Response<DatabaseInfoOutput> {
        Response::from_result(self.try_database_info(input).await)
    }

    async fn try_list_tables(&self, input: TargetInput) -> GatewayResult<TableListOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let tables = runtime.introspector().list_tables().await?;
        Ok(TableListOutput {
            table_count: tables.len(),
            tables,
        })
    }

    async fn try_table_schema(&self, input: TableInput) -> GatewayResult<TableSchemaOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let schema = runtime
            .introspector()
            .table_schema(input.schema.as_deref(), &input.table)
            .await?;
        Ok(TableSchemaOutput { schema })
    }

    async fn try_table_data(&self, input: TableDataInput) -> GatewayResult<TableDataOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let limit = effective_row_limit(input.limit, DEFAULT_ROW_LIMIT);
        let set = runtime
            .introspector()
            .table_data(input.schema.as_deref(), &input.table, input.offset, limit)
            .await?;
        Ok(TableDataOutput {
            row_count: set.row_count(),
            columns: set.columns,
            rows: set.rows,
            offset: input.offset,
        })
    }

    async fn try_list_procedures(&self, input: TargetInput) -> GatewayResult<ProcedureListOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let procedures = runtime.introspector().list_procedures().await?;
        Ok(ProcedureListOutput {
            procedure_count: procedures.len(),
            procedures,
        })
    }

    async fn try_triggers(&self, input: TriggersInput) -> GatewayResult<TriggerListOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let triggers = match input.name.as_deref() {
            Some(name) => vec![runtime.introspector().trigger_info(name).await?],
            None => runtime.introspector().list_triggers().await?,
        };
        Ok(TriggerListOutput {
            trigger_count: triggers.len(),
            triggers,
        })
    }

    async fn try_views(&self, input: ViewsInput) -> GatewayResult<ViewListOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let views = match input.name.as_deref() {
            Some(name) => vec![
                runtime
                    .introspector()
                    .view_info(input.schema.as_deref(), name)
                    .await?,
            ],
            None => runtime.introspector().list_views().await?,
        };
        Ok(ViewListOutput {
            view_count: views.len(),
            views,
        })
    }

    async fn try_database_info(&self, input: TargetInput) -> GatewayResult<DatabaseInfoOutput> {
        let runtime = self.gateway.target(&input.target)?;
        let info = runtime.introspector().database_info().await?;
        Ok(DatabaseInfoOutput { info })
    }
}
