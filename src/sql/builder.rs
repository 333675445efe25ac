//! Parameterized T-SQL construction.
//!
//! Builders take structured requests and emit [`BoundStatement`]s: SQL text
//! with `@P1..@Pn` placeholders plus the ordered values to bind. Identifiers
//! are validated and bracket-quoted; caller-supplied WHERE text is screened
//! and its `@name` references rewritten to placeholder positions.

use regex::Regex;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::error::{GatewayError, GatewayResult};
use crate::models::{RowMap, SqlParam};
use crate::sql::validator;

/// SQL text with its ordered parameter bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// One DDL statement in an ALTER sequence. Best-effort steps may fail
/// without aborting the remaining steps.
#[derive(Debug, Clone, PartialEq)]
pub struct DdlStep {
    pub sql: String,
    pub best_effort: bool,
}

impl DdlStep {
    fn required(sql: String) -> Self {
        Self {
            sql,
            best_effort: false,
        }
    }

    fn best_effort(sql: String) -> Self {
        Self {
            sql,
            best_effort: true,
        }
    }
}

/// A validated `[schema].[table]` reference. Schema defaults to `dbo`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, table: &str) -> GatewayResult<Self> {
        let schema = schema.filter(|s| !s.trim().is_empty()).unwrap_or("dbo");
        validator::validate_identifier(schema, "schema")?;
        validator::validate_identifier(table, "table")?;
        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// Bracket-quoted form for statement text.
    pub fn bracketed(&self) -> String {
        format!("[{}].[{}]", self.schema, self.table)
    }

    /// Dotted form for sp_rename and OBJECT_ID arguments.
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Ordered name-to-position parameter list.
///
/// Re-inserting an existing name keeps its position and replaces its value.
/// For an UPDATE this is what makes a WHERE-side parameter silently win over
/// a SET-side column of the same name; both references share one placeholder
/// and the WHERE value is the one bound.
#[derive(Debug, Default)]
struct ParamList {
    entries: Vec<(String, SqlParam)>,
}

impl ParamList {
    fn insert(&mut self, name: &str, value: SqlParam) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// 1-based placeholder for a name, e.g. `@P3`.
    fn placeholder(&self, name: &str) -> Option<String> {
        self.entries
            .iter()
            .position(|(n, _)| n == name)
            .map(|idx| format!("@P{}", idx + 1))
    }

    fn into_params(self) -> Vec<SqlParam> {
        self.entries.into_iter().map(|(_, v)| v).collect()
    }
}

static NAMED_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("valid pattern"));

/// Rewrite `@name` references in WHERE text to their placeholder positions.
fn rewrite_named_params(text: &str, params: &ParamList) -> GatewayResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in NAMED_PARAM_RE.captures_iter(text) {
        let whole = caps.get(0).ok_or_else(|| GatewayError::internal("empty match"))?;
        let name = &caps[1];
        let placeholder = params.placeholder(name).ok_or_else(|| {
            GatewayError::usage(format!(
                "WHERE clause references undeclared parameter '@{name}'"
            ))
        })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(&placeholder);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

fn params_from_map(map: &RowMap) -> Vec<(String, SqlParam)> {
    map.iter()
        .map(|(k, v)| (k.clone(), SqlParam::from_json(v)))
        .collect()
}

/// Build an INSERT statement from a column-to-value map.
///
/// With `return_identity` the batch also selects `SCOPE_IDENTITY()` as
/// `inserted_id`, so the caller runs it in fetch mode.
pub fn insert(table: &TableRef, data: &RowMap, return_identity: bool) -> GatewayResult<BoundStatement> {
    if data.is_empty() {
        return Err(GatewayError::usage(
            "Insert requires at least one column value",
        ));
    }

    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for (idx, (column, value)) in data.iter().enumerate() {
        validator::validate_identifier(column, "column")?;
        columns.push(format!("[{column}]"));
        placeholders.push(format!("@P{}", idx + 1));
        params.push(SqlParam::from_json(value));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.bracketed(),
        columns.join(", "),
        placeholders.join(", ")
    );
    if return_identity {
        sql.push_str("; SELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS inserted_id");
    }
    Ok(BoundStatement::new(sql, params))
}

/// Build an UPDATE statement.
///
/// Both the SET map and the WHERE clause are required. WHERE text is screened
/// and rewritten; see [`ParamList`] for the collision precedence.
pub fn update(
    table: &TableRef,
    data: &RowMap,
    where_clause: &str,
    where_params: &RowMap,
) -> GatewayResult<BoundStatement> {
    if data.is_empty() {
        return Err(GatewayError::usage(
            "Update requires at least one column value",
        ));
    }
    if where_clause.trim().is_empty() {
        return Err(GatewayError::usage("Update operations require a WHERE clause"));
    }
    validator::validate_where_clause(where_clause)?;

    let mut list = ParamList::default();
    for (column, value) in params_from_map(data) {
        validator::validate_identifier(&column, "column")?;
        list.insert(&column, value);
    }
    for (name, value) in params_from_map(where_params) {
        validator::validate_identifier(&name, "parameter")?;
        list.insert(&name, value);
    }

    let assignments = data
        .keys()
        .map(|column| {
            let placeholder = list
                .placeholder(column)
                .ok_or_else(|| GatewayError::internal("missing SET binding"))?;
            Ok(format!("[{column}] = {placeholder}"))
        })
        .collect::<GatewayResult<Vec<_>>>()?;

    let rewritten = rewrite_named_params(where_clause.trim(), &list)?;
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table.bracketed(),
        assignments.join(", "),
        rewritten
    );
    Ok(BoundStatement::new(sql, list.into_params()))
}

/// Build a DELETE statement.
///
/// Refuses before any validation unless the caller both supplied a WHERE
/// clause and set the confirmation flag.
pub fn delete(
    table: &TableRef,
    where_clause: &str,
    where_params: &RowMap,
    confirmed: bool,
) -> GatewayResult<BoundStatement> {
    if !confirmed {
        return Err(GatewayError::usage(
            "Delete operations require confirmation. Set 'confirm_delete' to true.",
        ));
    }
    if where_clause.trim().is_empty() {
        return Err(GatewayError::usage("Delete operations require a WHERE clause"));
    }
    validator::validate_where_clause(where_clause)?;

    let mut list = ParamList::default();
    for (name, value) in params_from_map(where_params) {
        validator::validate_identifier(&name, "parameter")?;
        list.insert(&name, value);
    }

    let rewritten = rewrite_named_params(where_clause.trim(), &list)?;
    let sql = format!("DELETE FROM {} WHERE {}", table.bracketed(), rewritten);
    Ok(BoundStatement::new(sql, list.into_params()))
}

fn default_true() -> bool {
    true
}

/// A structural table change. Dispatch is by variant, deserialized from the
/// request's `operation` tag.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum AlterTableOp {
    AddColumn {
        column: String,
        data_type: String,
        #[serde(default = "default_true")]
        nullable: bool,
        #[serde(default)]
        default: Option<String>,
    },
    DropColumn {
        column: String,
    },
    AlterColumn {
        column: String,
        #[serde(default)]
        data_type: Option<String>,
        #[serde(default)]
        nullable: Option<bool>,
        #[serde(default)]
        default: Option<String>,
    },
    AddConstraint {
        constraint: String,
        definition: String,
    },
    DropConstraint {
        constraint: String,
    },
    RenameColumn {
        column: String,
        new_name: String,
    },
    RenameTable {
        new_name: String,
    },
}

/// Screen a raw expression interpolated into DDL (defaults, constraint
/// definitions). Not parameterizable, so batch and comment tokens are out.
fn validate_ddl_expression(expr: &str, role: &str) -> GatewayResult<()> {
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::validation(format!("{role} cannot be empty"), None));
    }
    for token in [";", "--", "/*", "*/"] {
        if trimmed.contains(token) {
            return Err(GatewayError::validation(
                format!("{role} contains blocked token: {token}"),
                Some(token.to_string()),
            ));
        }
    }
    Ok(())
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

/// Emit the DDL sequence for one table change.
///
/// `current_type` is the column's declared type as introspected, required
/// only for a nullability-only `AlterColumn` (T-SQL makes the type mandatory
/// in `ALTER COLUMN`, so the current declaration is re-emitted).
pub fn alter_table(
    table: &TableRef,
    op: &AlterTableOp,
    current_type: Option<&str>,
) -> GatewayResult<Vec<DdlStep>> {
    let target = table.bracketed();
    match op {
        AlterTableOp::AddColumn {
            column,
            data_type,
            nullable,
            default,
        } => {
            validator::validate_identifier(column, "column")?;
            validator::validate_type_token(data_type)?;
            let mut sql = format!(
                "ALTER TABLE {target} ADD [{column}] {data_type} {}",
                nullability(*nullable)
            );
            if let Some(expr) = default {
                validate_ddl_expression(expr, "Default value")?;
                sql.push_str(&format!(" DEFAULT {expr}"));
            }
            Ok(vec![DdlStep::required(sql)])
        }

        AlterTableOp::DropColumn { column } => {
            validator::validate_identifier(column, "column")?;
            Ok(vec![DdlStep::required(format!(
                "ALTER TABLE {target} DROP COLUMN [{column}]"
            ))])
        }

        AlterTableOp::AlterColumn {
            column,
            data_type,
            nullable,
            default,
        } => {
            validator::validate_identifier(column, "column")?;
            if data_type.is_none() && nullable.is_none() && default.is_none() {
                return Err(GatewayError::usage(
                    "Alter column requires a new type, nullability, or default value",
                ));
            }

            let mut steps = Vec::new();
            match (data_type, nullable) {
                (Some(new_type), nullable) => {
                    validator::validate_type_token(new_type)?;
                    let suffix = nullable
                        .map(|n| format!(" {}", nullability(n)))
                        .unwrap_or_default();
                    steps.push(DdlStep::required(format!(
                        "ALTER TABLE {target} ALTER COLUMN [{column}] {new_type}{suffix}"
                    )));
                }
                (None, Some(n)) => {
                    // Nullability alone still needs the declared type restated.
                    let declared = current_type.ok_or_else(|| {
                        GatewayError::usage(format!(
                            "Cannot change nullability of '{column}': current column type unknown"
                        ))
                    })?;
                    steps.push(DdlStep::required(format!(
                        "ALTER TABLE {target} ALTER COLUMN [{column}] {declared} {}",
                        nullability(*n)
                    )));
                }
                (None, None) => {}
            }

            if let Some(expr) = default {
                validate_ddl_expression(expr, "Default value")?;
                let constraint = format!("DF_{}_{}", table.table, column);
                steps.push(DdlStep::best_effort(format!(
                    "ALTER TABLE {target} DROP CONSTRAINT IF EXISTS [{constraint}]"
                )));
                steps.push(DdlStep::required(format!(
                    "ALTER TABLE {target} ADD CONSTRAINT [{constraint}] DEFAULT ({expr}) FOR [{column}]"
                )));
            }
            Ok(steps)
        }

        AlterTableOp::AddConstraint {
            constraint,
            definition,
        } => {
            validator::validate_identifier(constraint, "constraint")?;
            validate_ddl_expression(definition, "Constraint definition")?;
            Ok(vec![DdlStep::required(format!(
                "ALTER TABLE {target} ADD CONSTRAINT [{constraint}] {definition}"
            ))])
        }

        AlterTableOp::DropConstraint { constraint } => {
            validator::validate_identifier(constraint, "constraint")?;
            Ok(vec![DdlStep::required(format!(
                "ALTER TABLE {target} DROP CONSTRAINT [{constraint}]"
            ))])
        }

        AlterTableOp::RenameColumn { column, new_name } => {
            validator::validate_identifier(column, "column")?;
            validator::validate_identifier(new_name, "column")?;
            Ok(vec![DdlStep::required(format!(
                "EXEC sp_rename '{}.{column}', '{new_name}', 'COLUMN'",
                table.dotted()
            ))])
        }

        AlterTableOp::RenameTable { new_name } => {
            validator::validate_identifier(new_name, "table")?;
            Ok(vec![DdlStep::required(format!(
                "EXEC sp_rename '{}', '{new_name}'",
                table.dotted()
            ))])
        }
    }
}

/// Build an `EXEC` batch calling a stored procedure with named parameters.
pub fn procedure_call(procedure: &TableRef, params: &RowMap) -> GatewayResult<BoundStatement> {
    let mut assignments = Vec::with_capacity(params.len());
    let mut bound = Vec::with_capacity(params.len());
    for (idx, (name, value)) in params.iter().enumerate() {
        validator::validate_identifier(name, "parameter")?;
        assignments.push(format!("@{name} = @P{}", idx + 1));
        bound.push(SqlParam::from_json(value));
    }

    let sql = if assignments.is_empty() {
        format!("EXEC {}", procedure.bracketed())
    } else {
        format!("EXEC {} {}", procedure.bracketed(), assignments.join(", "))
    };
    Ok(BoundStatement::new(sql, bound))
}

/// Build the probe issued after a procedure call to recover an output value.
pub fn output_probe(name: &str) -> GatewayResult<String> {
    validator::validate_identifier(name, "parameter")?;
    Ok(format!("SELECT @{name} AS [{name}]"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, json};

    fn row(entries: &[(&str, JsonValue)]) -> RowMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn table(name: &str) -> TableRef {
        TableRef::new(None, name).unwrap()
    }

    // TableRef

    #[test]
    fn test_table_ref_defaults_to_dbo() {
        let t = TableRef::new(None, "Client").unwrap();
        assert_eq!(t.bracketed(), "[dbo].[Client]");
        assert_eq!(t.dotted(), "dbo.Client");
    }

    #[test]
    fn test_table_ref_rejects_bad_names() {
        assert!(TableRef::new(None, "Client; DROP").is_err());
        assert!(TableRef::new(Some("bad schema"), "Client").is_err());
        assert!(TableRef::new(None, "sp_client").is_err());
    }

    // INSERT

    #[test]
    fn test_insert_basic() {
        let stmt = insert(
            &table("Client"),
            &row(&[("Name", json!("Acme")), ("Active", json!(true))]),
            false,
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [dbo].[Client] ([Name], [Active]) VALUES (@P1, @P2)"
        );
        assert_eq!(
            stmt.params,
            vec![SqlParam::Text("Acme".into()), SqlParam::Bool(true)]
        );
    }

    #[test]
    fn test_insert_with_identity() {
        let stmt = insert(&table("Client"), &row(&[("Name", json!("Acme"))]), true).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [dbo].[Client] ([Name]) VALUES (@P1); \
             SELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS inserted_id"
        );
    }

    #[test]
    fn test_insert_requires_data() {
        assert!(matches!(
            insert(&table("Client"), &RowMap::new(), false),
            Err(GatewayError::Usage { .. })
        ));
    }

    #[test]
    fn test_insert_rejects_bad_column() {
        let err = insert(
            &table("Client"),
            &row(&[("Name]; DROP TABLE x", json!("v"))]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    // UPDATE

    #[test]
    fn test_update_basic() {
        let stmt = update(
            &table("Client"),
            &row(&[("Name", json!("Acme"))]),
            "Id = @Id",
            &row(&[("Id", json!(7))]),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [dbo].[Client] SET [Name] = @P1 WHERE Id = @P2"
        );
        assert_eq!(
            stmt.params,
            vec![SqlParam::Text("Acme".into()), SqlParam::Int(7)]
        );
    }

    #[test]
    fn test_update_where_param_wins_on_collision() {
        // "Name" appears in both the SET map and the WHERE params; they share
        // @P1 and the WHERE-side value is the one bound.
        let stmt = update(
            &table("Client"),
            &row(&[("Name", json!("new")), ("City", json!("Lyon"))]),
            "Name = @Name",
            &row(&[("Name", json!("old"))]),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [dbo].[Client] SET [Name] = @P1, [City] = @P2 WHERE Name = @P1"
        );
        assert_eq!(
            stmt.params,
            vec![SqlParam::Text("old".into()), SqlParam::Text("Lyon".into())]
        );
    }

    #[test]
    fn test_update_requires_where() {
        assert!(matches!(
            update(&table("Client"), &row(&[("Name", json!("x"))]), "", &RowMap::new()),
            Err(GatewayError::Usage { .. })
        ));
    }

    #[test]
    fn test_update_rejects_tautology_where() {
        assert!(matches!(
            update(
                &table("Client"),
                &row(&[("Name", json!("x"))]),
                "Id = @Id OR 1=1",
                &row(&[("Id", json!(1))]),
            ),
            Err(GatewayError::Validation { .. })
        ));
    }

    #[test]
    fn test_update_rejects_undeclared_where_param() {
        let err = update(
            &table("Client"),
            &row(&[("Name", json!("x"))]),
            "Id = @Missing",
            &RowMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("@Missing"));
    }

    // DELETE

    #[test]
    fn test_delete_basic() {
        let stmt = delete(
            &table("Client"),
            "Id = @Id",
            &row(&[("Id", json!(3))]),
            true,
        )
        .unwrap();
        assert_eq!(stmt.sql, "DELETE FROM [dbo].[Client] WHERE Id = @P1");
        assert_eq!(stmt.params, vec![SqlParam::Int(3)]);
    }

    #[test]
    fn test_delete_requires_confirmation() {
        let err = delete(
            &table("Client"),
            "Id = @Id",
            &row(&[("Id", json!(3))]),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("confirm_delete"));
    }

    #[test]
    fn test_delete_requires_where_even_when_confirmed() {
        assert!(matches!(
            delete(&table("Client"), "  ", &RowMap::new(), true),
            Err(GatewayError::Usage { .. })
        ));
    }

    // ALTER TABLE

    #[test]
    fn test_add_column() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::AddColumn {
                column: "Notes".into(),
                data_type: "nvarchar(200)".into(),
                nullable: true,
                default: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![DdlStep::required(
                "ALTER TABLE [dbo].[Client] ADD [Notes] nvarchar(200) NULL".into()
            )]
        );
    }

    #[test]
    fn test_add_column_not_null_with_default() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::AddColumn {
                column: "Active".into(),
                data_type: "bit".into(),
                nullable: false,
                default: Some("1".into()),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Client] ADD [Active] bit NOT NULL DEFAULT 1"
        );
    }

    #[test]
    fn test_drop_column() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::DropColumn {
                column: "Notes".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Client] DROP COLUMN [Notes]"
        );
    }

    #[test]
    fn test_alter_column_type_change() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::AlterColumn {
                column: "Notes".into(),
                data_type: Some("nvarchar(500)".into()),
                nullable: Some(true),
                default: None,
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Client] ALTER COLUMN [Notes] nvarchar(500) NULL"
        );
    }

    #[test]
    fn test_alter_column_nullability_only_uses_current_type() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::AlterColumn {
                column: "Notes".into(),
                data_type: None,
                nullable: Some(false),
                default: None,
            },
            Some("nvarchar(200)"),
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Client] ALTER COLUMN [Notes] nvarchar(200) NOT NULL"
        );
    }

    #[test]
    fn test_alter_column_nullability_without_current_type_fails() {
        let err = alter_table(
            &table("Client"),
            &AlterTableOp::AlterColumn {
                column: "Notes".into(),
                data_type: None,
                nullable: Some(false),
                default: None,
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Usage { .. }));
    }

    #[test]
    fn test_alter_column_default_emits_drop_then_add() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::AlterColumn {
                column: "Status".into(),
                data_type: None,
                nullable: None,
                default: Some("'active'".into()),
            },
            None,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].best_effort);
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Client] DROP CONSTRAINT IF EXISTS [DF_Client_Status]"
        );
        assert!(!steps[1].best_effort);
        assert_eq!(
            steps[1].sql,
            "ALTER TABLE [dbo].[Client] ADD CONSTRAINT [DF_Client_Status] DEFAULT ('active') FOR [Status]"
        );
    }

    #[test]
    fn test_alter_column_requires_a_change() {
        assert!(matches!(
            alter_table(
                &table("Client"),
                &AlterTableOp::AlterColumn {
                    column: "Notes".into(),
                    data_type: None,
                    nullable: None,
                    default: None,
                },
                None,
            ),
            Err(GatewayError::Usage { .. })
        ));
    }

    #[test]
    fn test_add_and_drop_constraint() {
        let steps = alter_table(
            &table("Orders"),
            &AlterTableOp::AddConstraint {
                constraint: "FK_Orders_Client".into(),
                definition: "FOREIGN KEY (ClientId) REFERENCES [dbo].[Client] (Id)".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Orders] ADD CONSTRAINT [FK_Orders_Client] \
             FOREIGN KEY (ClientId) REFERENCES [dbo].[Client] (Id)"
        );

        let steps = alter_table(
            &table("Orders"),
            &AlterTableOp::DropConstraint {
                constraint: "FK_Orders_Client".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "ALTER TABLE [dbo].[Orders] DROP CONSTRAINT [FK_Orders_Client]"
        );
    }

    #[test]
    fn test_rename_column_and_table() {
        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::RenameColumn {
                column: "Notes".into(),
                new_name: "Remarks".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(
            steps[0].sql,
            "EXEC sp_rename 'dbo.Client.Notes', 'Remarks', 'COLUMN'"
        );

        let steps = alter_table(
            &table("Client"),
            &AlterTableOp::RenameTable {
                new_name: "Customer".into(),
            },
            None,
        )
        .unwrap();
        assert_eq!(steps[0].sql, "EXEC sp_rename 'dbo.Client', 'Customer'");
    }

    #[test]
    fn test_ddl_expression_screen() {
        let err = alter_table(
            &table("Client"),
            &AlterTableOp::AddColumn {
                column: "X".into(),
                data_type: "int".into(),
                nullable: true,
                default: Some("1; DROP TABLE Client".into()),
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Validation { .. }));
    }

    #[test]
    fn test_alter_op_deserializes_from_tag() {
        let op: AlterTableOp = serde_json::from_value(json!({
            "operation": "add_column",
            "column": "Notes",
            "data_type": "nvarchar(200)"
        }))
        .unwrap();
        match op {
            AlterTableOp::AddColumn {
                column, nullable, ..
            } => {
                assert_eq!(column, "Notes");
                assert!(nullable);
            }
            other => panic!("unexpected op: {other:?}"),
        }
    }

    // Procedures

    #[test]
    fn test_procedure_call_named_params() {
        let proc = TableRef::new(None, "GetClientOrders").unwrap();
        let stmt = procedure_call(
            &proc,
            &row(&[("ClientId", json!(7)), ("Year", json!(2024))]),
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "EXEC [dbo].[GetClientOrders] @ClientId = @P1, @Year = @P2"
        );
        assert_eq!(stmt.params, vec![SqlParam::Int(7), SqlParam::Int(2024)]);
    }

    #[test]
    fn test_procedure_call_without_params() {
        let proc = TableRef::new(None, "RefreshTotals").unwrap();
        let stmt = procedure_call(&proc, &RowMap::new()).unwrap();
        assert_eq!(stmt.sql, "EXEC [dbo].[RefreshTotals]");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_procedure_name_screen() {
        assert!(TableRef::new(None, "sp_configure").is_err());
        assert!(TableRef::new(None, "xp_cmdshell").is_err());
    }

    #[test]
    fn test_output_probe() {
        assert_eq!(
            output_probe("Total").unwrap(),
            "SELECT @Total AS [Total]"
        );
        assert!(output_probe("bad name").is_err());
    }
}
