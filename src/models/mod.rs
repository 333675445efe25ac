//! Data models for the SQL Server gateway.
//!
//! This module re-exports all model types used throughout the crate.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{
    DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, MAX_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT,
    ProcedureResult, ResultSet, RowMap, SqlParam, effective_row_limit, effective_timeout,
};
pub use schema::{
    ColumnInfo, DatabaseInfo, ForeignKeyInfo, IndexInfo, ParameterMode, ParameterSummary,
    ProcedureInfo, ProcedureParameter, TableInfo, TableSchema, TriggerInfo, ViewInfo,
};
