//! SQL Server gateway library.
//!
//! Pooled TDS connections to named targets, a lexical statement screen,
//! parameterized statement building for CRUD and table DDL, stored procedure
//! execution, explicit transactions, and schema introspection. Every
//! operation returns a uniform success/error envelope.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod ops;
pub mod sql;

pub use config::Config;
pub use error::{ConnectHint, GatewayError, GatewayResult};
pub use gateway::Gateway;
