//! Schema introspection against the SQL Server catalogs.
//!
//! Catalog queries are fixed strings in the `queries` submodule and run
//! through the executor like any other statement. Object names supplied by
//! the caller never reach the statement text unvalidated; they go through
//! [`TableRef`] or are bound as parameters.

use crate::db::executor::{QueryExecutor, StatementOutcome};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{
    ColumnInfo, DatabaseInfo, ForeignKeyInfo, IndexInfo, ParameterMode, ProcedureInfo,
    ProcedureParameter, ResultSet, RowMap, SqlParam, TableInfo, TableSchema, TriggerInfo, ViewInfo,
};
use crate::sql::builder::TableRef;
use tracing::debug;

mod queries {
    pub const LIST_TABLES: &str = "\
        SELECT TABLE_SCHEMA, TABLE_NAME \
        FROM INFORMATION_SCHEMA.TABLES \
        WHERE TABLE_TYPE = 'BASE TABLE' \
        ORDER BY TABLE_SCHEMA, TABLE_NAME";

    pub const TABLE_COLUMNS: &str = "\
        SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
               NUMERIC_PRECISION, NUMERIC_SCALE, IS_NULLABLE, COLUMN_DEFAULT, \
               ORDINAL_POSITION \
        FROM INFORMATION_SCHEMA.COLUMNS \
        WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
        ORDER BY ORDINAL_POSITION";

    pub const PRIMARY_KEY_COLUMNS: &str = "\
        SELECT kcu.COLUMN_NAME \
        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
          ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
         AND kcu.TABLE_SCHEMA = tc.TABLE_SCHEMA \
        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
          AND tc.TABLE_SCHEMA = @P1 AND tc.TABLE_NAME = @P2 \
        ORDER BY kcu.ORDINAL_POSITION";

    pub const FOREIGN_KEYS: &str = "\
        SELECT fk.name AS constraint_name, \
               pc.name AS column_name, \
               rs.name AS referenced_schema, \
               rt.name AS referenced_table, \
               rc.name AS referenced_column \
        FROM sys.foreign_keys fk \
        JOIN sys.foreign_key_columns fkc \
          ON fkc.constraint_object_id = fk.object_id \
        JOIN sys.columns pc \
          ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
        JOIN sys.columns rc \
          ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
        JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
        JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
        WHERE fk.parent_object_id = OBJECT_ID(@P1) \
        ORDER BY fk.name, fkc.constraint_column_id";

    pub const INDEXES: &str = "\
        SELECT i.name AS index_name, i.type_desc AS index_type, \
               i.is_unique, i.is_primary_key, c.name AS column_name \
        FROM sys.indexes i \
        JOIN sys.index_columns ic \
          ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
        JOIN sys.columns c \
          ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
        WHERE i.object_id = OBJECT_ID(@P1) AND i.name IS NOT NULL \
        ORDER BY i.name, ic.key_ordinal";

    pub const LIST_PROCEDURES: &str = "\
        SELECT ROUTINE_SCHEMA, ROUTINE_NAME, CREATED, LAST_ALTERED \
        FROM INFORMATION_SCHEMA.ROUTINES \
        WHERE ROUTINE_TYPE = 'PROCEDURE' \
        ORDER BY ROUTINE_SCHEMA, ROUTINE_NAME";

    pub const PROCEDURE_PARAMETERS: &str = "\
        SELECT PARAMETER_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
               PARAMETER_MODE, ORDINAL_POSITION \
        FROM INFORMATION_SCHEMA.PARAMETERS \
        WHERE SPECIFIC_SCHEMA = @P1 AND SPECIFIC_NAME = @P2 \
          AND PARAMETER_NAME IS NOT NULL AND PARAMETER_NAME <> '' \
        ORDER BY ORDINAL_POSITION";

    pub const OBJECT_DEFINITION: &str =
        "SELECT OBJECT_DEFINITION(OBJECT_ID(@P1)) AS definition";

    pub const LIST_TRIGGERS: &str = "\
        SELECT t.name AS trigger_name, \
               OBJECT_NAME(t.parent_id) AS table_name, \
               t.is_disabled, \
               t.is_not_for_replication \
        FROM sys.triggers t \
        WHERE t.is_ms_shipped = 0 AND t.parent_class = 1 \
        ORDER BY t.name";

    pub const LIST_VIEWS: &str = "\
        SELECT TABLE_SCHEMA, TABLE_NAME \
        FROM INFORMATION_SCHEMA.VIEWS \
        ORDER BY TABLE_SCHEMA, TABLE_NAME";

    pub const DATABASE_INFO: &str = "\
        SELECT DB_NAME() AS database_name, \
               @@VERSION AS version, \
               GETDATE() AS server_time";
}

/// Read-only catalog access for one target.
#[derive(Clone)]
pub struct SchemaIntrospector {
    executor: QueryExecutor,
}

impl SchemaIntrospector {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    async fn fetch(&self, sql: &str, params: &[SqlParam]) -> GatewayResult<ResultSet> {
        match self.executor.execute(sql, params, true, None).await? {
            StatementOutcome::Rows(set) => Ok(set),
            StatementOutcome::Affected(_) => {
                Err(GatewayError::internal("catalog query returned no rows"))
            }
        }
    }

    /// List the base tables of the target database.
    pub async fn list_tables(&self) -> GatewayResult<Vec<TableInfo>> {
        let set = self.fetch(queries::LIST_TABLES, &[]).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                Some(TableInfo::new(
                    text(row, "TABLE_SCHEMA")?,
                    text(row, "TABLE_NAME")?,
                ))
            })
            .collect())
    }

    /// Full description of one table: columns, primary key, foreign keys,
    /// indexes, and the current row count.
    pub async fn table_schema(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> GatewayResult<TableSchema> {
        let table_ref = TableRef::new(schema, table)?;
        let columns = self.table_columns(&table_ref).await?;
        if columns.is_empty() {
            return Err(GatewayError::query(format!(
                "Table '{}' was not found",
                table_ref.dotted()
            )));
        }
        let primary_key = self.primary_key_columns(&table_ref).await?;
        let foreign_keys = self.foreign_keys(&table_ref).await?;
        let indexes = self.indexes(&table_ref).await?;
        let row_count = self.row_count(&table_ref).await.ok();

        debug!(
            table = %table_ref.dotted(),
            columns = columns.len(),
            "table schema described"
        );
        Ok(TableSchema {
            table: TableInfo::new(table_ref.schema.clone(), table_ref.table.clone()),
            columns,
            primary_key,
            foreign_keys,
            indexes,
            row_count,
        })
    }

    /// The rendered SQL type of one column, for DDL that has to restate it.
    pub async fn column_sql_type(
        &self,
        schema: Option<&str>,
        table: &str,
        column: &str,
    ) -> GatewayResult<String> {
        let table_ref = TableRef::new(schema, table)?;
        let columns = self.table_columns(&table_ref).await?;
        columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(ColumnInfo::render_sql_type)
            .ok_or_else(|| {
                GatewayError::query(format!(
                    "Column '{column}' was not found on '{}'",
                    table_ref.dotted()
                ))
            })
    }

    async fn table_columns(&self, table: &TableRef) -> GatewayResult<Vec<ColumnInfo>> {
        let params = [
            SqlParam::Text(table.schema.clone()),
            SqlParam::Text(table.table.clone()),
        ];
        let set = self.fetch(queries::TABLE_COLUMNS, &params).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                let mut column = ColumnInfo::new(text(row, "COLUMN_NAME")?, text(row, "DATA_TYPE")?)
                    .with_nullable(text(row, "IS_NULLABLE").as_deref() == Some("YES"))
                    .with_position(integer(row, "ORDINAL_POSITION").unwrap_or(0) as i32);
                if let Some(len) = integer(row, "CHARACTER_MAXIMUM_LENGTH") {
                    column = column.with_max_length(len);
                }
                if let (Some(precision), Some(scale)) = (
                    integer(row, "NUMERIC_PRECISION"),
                    integer(row, "NUMERIC_SCALE"),
                ) {
                    column = column.with_precision_scale(precision as u8, scale as u8);
                }
                if let Some(default) = text(row, "COLUMN_DEFAULT") {
                    column = column.with_default(default);
                }
                Some(column)
            })
            .collect())
    }

    async fn primary_key_columns(&self, table: &TableRef) -> GatewayResult<Vec<String>> {
        let params = [
            SqlParam::Text(table.schema.clone()),
            SqlParam::Text(table.table.clone()),
        ];
        let set = self.fetch(queries::PRIMARY_KEY_COLUMNS, &params).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| text(row, "COLUMN_NAME"))
            .collect())
    }

    async fn foreign_keys(&self, table: &TableRef) -> GatewayResult<Vec<ForeignKeyInfo>> {
        let params = [SqlParam::Text(table.dotted())];
        let set = self.fetch(queries::FOREIGN_KEYS, &params).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                Some(ForeignKeyInfo {
                    constraint_name: text(row, "constraint_name")?,
                    column: text(row, "column_name")?,
                    referenced_schema: text(row, "referenced_schema")?,
                    referenced_table: text(row, "referenced_table")?,
                    referenced_column: text(row, "referenced_column")?,
                })
            })
            .collect())
    }

    async fn indexes(&self, table: &TableRef) -> GatewayResult<Vec<IndexInfo>> {
        let params = [SqlParam::Text(table.dotted())];
        let set = self.fetch(queries::INDEXES, &params).await?;

        // One row per index column, ordered by index then key ordinal.
        let mut indexes: Vec<IndexInfo> = Vec::new();
        for row in &set.rows {
            let Some(name) = text(row, "index_name") else {
                continue;
            };
            let Some(column) = text(row, "column_name") else {
                continue;
            };
            match indexes.last_mut() {
                Some(last) if last.name == name => last.columns.push(column),
                _ => indexes.push(IndexInfo {
                    name,
                    index_type: text(row, "index_type").unwrap_or_default(),
                    is_unique: flag(row, "is_unique"),
                    is_primary_key: flag(row, "is_primary_key"),
                    columns: vec![column],
                }),
            }
        }
        Ok(indexes)
    }

    async fn row_count(&self, table: &TableRef) -> GatewayResult<i64> {
        let sql = format!(
            "SELECT COUNT_BIG(*) AS row_count FROM {}",
            table.bracketed()
        );
        let set = self.fetch(&sql, &[]).await?;
        set.rows
            .first()
            .and_then(|row| integer(row, "row_count"))
            .ok_or_else(|| GatewayError::internal("row count query returned no rows"))
    }

    /// Page through a table's rows with a stable OFFSET/FETCH window.
    pub async fn table_data(
        &self,
        schema: Option<&str>,
        table: &str,
        offset: u64,
        limit: usize,
    ) -> GatewayResult<ResultSet> {
        let table_ref = TableRef::new(schema, table)?;
        let sql = format!(
            "SELECT * FROM {} ORDER BY (SELECT NULL) \
             OFFSET @P1 ROWS FETCH NEXT @P2 ROWS ONLY",
            table_ref.bracketed()
        );
        let params = [
            SqlParam::Int(offset as i64),
            SqlParam::Int(limit as i64),
        ];
        self.fetch(&sql, &params).await
    }

    /// List stored procedures, without parameters or bodies.
    pub async fn list_procedures(&self) -> GatewayResult<Vec<ProcedureInfo>> {
        let set = self.fetch(queries::LIST_PROCEDURES, &[]).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                Some(ProcedureInfo {
                    schema: text(row, "ROUTINE_SCHEMA")?,
                    name: text(row, "ROUTINE_NAME")?,
                    created: text(row, "CREATED"),
                    modified: text(row, "LAST_ALTERED"),
                    parameters: Vec::new(),
                    definition: None,
                })
            })
            .collect())
    }

    /// One procedure with its parameter list and, optionally, its body.
    pub async fn procedure_info(
        &self,
        schema: Option<&str>,
        name: &str,
        include_definition: bool,
    ) -> GatewayResult<ProcedureInfo> {
        let proc_ref = TableRef::new(schema, name)?;
        let params = [
            SqlParam::Text(proc_ref.schema.clone()),
            SqlParam::Text(proc_ref.table.clone()),
        ];
        let set = self.fetch(queries::PROCEDURE_PARAMETERS, &params).await?;
        let parameters: Vec<ProcedureParameter> = set
            .rows
            .iter()
            .filter_map(|row| {
                Some(ProcedureParameter {
                    name: text(row, "PARAMETER_NAME")?,
                    data_type: text(row, "DATA_TYPE")?,
                    max_length: integer(row, "CHARACTER_MAXIMUM_LENGTH"),
                    mode: ParameterMode::parse(&text(row, "PARAMETER_MODE").unwrap_or_default()),
                    position: integer(row, "ORDINAL_POSITION").unwrap_or(0) as i32,
                })
            })
            .collect();
        // A parameterless procedure can only be confirmed through its body,
        // so the definition lookup still runs when the parameter list alone
        // cannot establish existence.
        let definition = if include_definition || parameters.is_empty() {
            self.object_definition(&proc_ref.dotted()).await?
        } else {
            None
        };
        if parameters.is_empty() && definition.is_none() {
            return Err(GatewayError::query(format!(
                "Procedure '{}' was not found",
                proc_ref.dotted()
            )));
        }
        Ok(ProcedureInfo {
            schema: proc_ref.schema,
            name: proc_ref.table,
            created: None,
            modified: None,
            parameters,
            definition: if include_definition { definition } else { None },
        })
    }

    /// List DML triggers on user tables.
    pub async fn list_triggers(&self) -> GatewayResult<Vec<TriggerInfo>> {
        let set = self.fetch(queries::LIST_TRIGGERS, &[]).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                Some(TriggerInfo {
                    name: text(row, "trigger_name")?,
                    table: text(row, "table_name").unwrap_or_default(),
                    is_disabled: flag(row, "is_disabled"),
                    is_not_for_replication: flag(row, "is_not_for_replication"),
                    definition: None,
                })
            })
            .collect())
    }

    /// One trigger with its body.
    pub async fn trigger_info(&self, name: &str) -> GatewayResult<TriggerInfo> {
        crate::sql::validator::validate_identifier(name, "trigger")?;
        let triggers = self.list_triggers().await?;
        let mut trigger = triggers
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| GatewayError::query(format!("Trigger '{name}' was not found")))?;
        let definition = self.object_definition(&trigger.name).await?;
        trigger.definition = definition;
        Ok(trigger)
    }

    /// List views, without bodies.
    pub async fn list_views(&self) -> GatewayResult<Vec<ViewInfo>> {
        let set = self.fetch(queries::LIST_VIEWS, &[]).await?;
        Ok(set
            .rows
            .iter()
            .filter_map(|row| {
                Some(ViewInfo {
                    schema: text(row, "TABLE_SCHEMA")?,
                    name: text(row, "TABLE_NAME")?,
                    definition: None,
                })
            })
            .collect())
    }

    /// One view with its body.
    pub async fn view_info(&self, schema: Option<&str>, name: &str) -> GatewayResult<ViewInfo> {
        let view_ref = TableRef::new(schema, name)?;
        let definition = self.object_definition(&view_ref.dotted()).await?;
        if definition.is_none() {
            return Err(GatewayError::query(format!(
                "View '{}' was not found",
                view_ref.dotted()
            )));
        }
        Ok(ViewInfo {
            schema: view_ref.schema,
            name: view_ref.table,
            definition,
        })
    }

    /// Database name, server version, and server clock.
    pub async fn database_info(&self) -> GatewayResult<DatabaseInfo> {
        let set = self.fetch(queries::DATABASE_INFO, &[]).await?;
        let row = set
            .rows
            .first()
            .ok_or_else(|| GatewayError::internal("database info query returned no rows"))?;
        Ok(DatabaseInfo {
            database: text(row, "database_name").unwrap_or_default(),
            version: text(row, "version").unwrap_or_default(),
            server_time: text(row, "server_time").unwrap_or_default(),
        })
    }

    async fn object_definition(&self, qualified: &str) -> GatewayResult<Option<String>> {
        let params = [SqlParam::Text(qualified.to_string())];
        let set = self.fetch(queries::OBJECT_DEFINITION, &params).await?;
        Ok(set.rows.first().and_then(|row| text(row, "definition")))
    }
}

fn text(row: &RowMap, key: &str) -> Option<String> {
    match row.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn integer(row: &RowMap, key: &str) -> Option<i64> {
    match row.get(key)? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn flag(row: &RowMap, key: &str) -> bool {
    match row.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> RowMap {
        let mut map = RowMap::new();
        for (key, value) in pairs {
            map.insert((*key).to_string(), value.clone());
        }
        map
    }

    #[test]
    fn text_extraction() {
        let r = row(&[
            ("name", json!("Orders")),
            ("missing", json!(null)),
            ("count", json!(42)),
        ]);
        assert_eq!(text(&r, "name").as_deref(), Some("Orders"));
        assert_eq!(text(&r, "missing"), None);
        assert_eq!(text(&r, "count").as_deref(), Some("42"));
        assert_eq!(text(&r, "absent"), None);
    }

    #[test]
    fn integer_extraction() {
        let r = row(&[("n", json!(7)), ("f", json!(7.0)), ("s", json!("7"))]);
        assert_eq!(integer(&r, "n"), Some(7));
        assert_eq!(integer(&r, "f"), Some(7));
        assert_eq!(integer(&r, "s"), None);
    }

    #[test]
    fn flag_extraction() {
        let r = row(&[("b", json!(true)), ("one", json!(1)), ("zero", json!(0))]);
        assert!(flag(&r, "b"));
        assert!(flag(&r, "one"));
        assert!(!flag(&r, "zero"));
        assert!(!flag(&r, "absent"));
    }

    #[test]
    fn trigger_listing_carries_both_state_flags() {
        assert!(queries::LIST_TRIGGERS.contains("t.is_disabled"));
        assert!(queries::LIST_TRIGGERS.contains("t.is_not_for_replication"));

        let r = row(&[
            ("trigger_name", json!("trg_AuditClient")),
            ("table_name", json!("Client")),
            ("is_disabled", json!(false)),
            ("is_not_for_replication", json!(1)),
        ]);
        assert!(!flag(&r, "is_disabled"));
        assert!(flag(&r, "is_not_for_replication"));
    }

    #[test]
    fn catalog_queries_are_screened_shapes() {
        // The catalog strings never interpolate caller input.
        for sql in [
            queries::LIST_TABLES,
            queries::TABLE_COLUMNS,
            queries::PRIMARY_KEY_COLUMNS,
            queries::FOREIGN_KEYS,
            queries::INDEXES,
            queries::LIST_PROCEDURES,
            queries::PROCEDURE_PARAMETERS,
            queries::OBJECT_DEFINITION,
            queries::LIST_TRIGGERS,
            queries::LIST_VIEWS,
            queries::DATABASE_INFO,
        ] {
            assert!(!sql.contains("{}"), "no format holes in: {sql}");
        }
    }
}
