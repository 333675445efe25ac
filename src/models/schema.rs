//! Schema introspection models.
//!
//! Shapes mirror what the SQL Server catalog views report; fields that a
//! catalog row may omit stay optional and are skipped in serialized output.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
}

impl TableInfo {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Qualified `schema.name` form.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnInfo {
    pub name: String,
    /// Base type name as reported by the catalog (e.g. `nvarchar`).
    pub data_type: String,
    /// Character length; -1 means `max`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u8>,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub position: i32,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            nullable: true,
            default: None,
            position: 0,
        }
    }

    pub fn with_max_length(mut self, max_length: i64) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_precision_scale(mut self, precision: u8, scale: u8) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }

    /// Reconstruct the declared SQL type, including length or precision.
    ///
    /// `varchar` with max_length -1 renders as `varchar(max)`; decimal and
    /// numeric render with `(precision,scale)`; fixed-size types render bare.
    pub fn render_sql_type(&self) -> String {
        let base = self.data_type.to_lowercase();
        match base.as_str() {
            "char" | "varchar" | "nchar" | "nvarchar" | "binary" | "varbinary" => {
                match self.max_length {
                    Some(-1) => format!("{base}(max)"),
                    Some(len) if len > 0 => format!("{base}({len})"),
                    _ => base,
                }
            }
            "decimal" | "numeric" => match (self.numeric_precision, self.numeric_scale) {
                (Some(p), Some(s)) => format!("{base}({p},{s})"),
                (Some(p), None) => format!("{base}({p})"),
                _ => base,
            },
            _ => base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyInfo {
    pub constraint_name: String,
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    pub index_type: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub columns: Vec<String>,
}

/// Full description of one table: columns, keys, indexes, and row count.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchema {
    pub table: TableInfo,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
    pub indexes: Vec<IndexInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<i64>,
}

/// Direction of a stored procedure parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterMode {
    In,
    Out,
    Inout,
}

impl ParameterMode {
    /// Parse the catalog's PARAMETER_MODE string.
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "OUT" => Self::Out,
            "INOUT" => Self::Inout,
            _ => Self::In,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcedureParameter {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
    pub mode: ParameterMode,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcedureInfo {
    pub schema: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<ProcedureParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// Counts of procedure parameters by direction.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ParameterSummary {
    pub total: usize,
    pub input: usize,
    pub output: usize,
}

impl ParameterSummary {
    pub fn from_parameters(params: &[ProcedureParameter]) -> Self {
        let output = params
            .iter()
            .filter(|p| matches!(p.mode, ParameterMode::Out | ParameterMode::Inout))
            .count();
        Self {
            total: params.len(),
            input: params.len() - output,
            output,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriggerInfo {
    pub name: String,
    pub table: String,
    pub is_disabled: bool,
    pub is_not_for_replication: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewInfo {
    pub schema: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

/// Server-side identity of a target database.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseInfo {
    pub database: String,
    pub version: String,
    pub server_time: String,
}
