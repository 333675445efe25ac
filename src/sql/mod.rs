//! SQL screening and statement construction.
//!
//! `validator` holds the lexical screen applied to caller-supplied text;
//! `builder` turns structured requests into parameterized T-SQL.

pub mod builder;
pub mod validator;

pub use builder::{AlterTableOp, BoundStatement, DdlStep, TableRef};
