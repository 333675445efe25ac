//! Database access layer: pooling, execution, transactions, introspection,
//! and value mapping between the TDS wire types and JSON.

pub mod executor;
pub mod pool;
pub mod schema;
pub mod transactions;
pub mod types;

pub use executor::{QueryExecutor, StatementOutcome};
pub use pool::{ConnectionHandle, ConnectionPool};
pub use schema::SchemaIntrospector;
pub use transactions::{TransactionMetadata, TransactionRegistry, MAX_TRANSACTION_TIMEOUT_SECS};
