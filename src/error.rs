//! Error types for the SQL Server gateway.
//!
//! All fallible operations return [`GatewayResult`]. Connection failures carry
//! a [`ConnectHint`] category so callers can surface remediation steps without
//! parsing error text themselves.

use thiserror::Error;

/// Remediation category for a failed connection attempt, derived from the
/// driver's error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectHint {
    /// Host could not be resolved or reached.
    AddressResolution,
    /// The server rejected the supplied credentials.
    Authentication,
    /// The attempt did not complete within the connect timeout.
    Timeout,
    Unknown,
}

impl ConnectHint {
    /// Classify driver error text into a remediation category.
    ///
    /// Matching is substring-based over the lowercased text; the first
    /// category whose markers appear wins.
    pub fn classify(error_text: &str) -> Self {
        let lower = error_text.to_lowercase();

        if lower.contains("login failed")
            || lower.contains("authentication")
            || lower.contains("password")
        {
            return Self::Authentication;
        }
        if lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("deadline has elapsed")
        {
            return Self::Timeout;
        }
        if lower.contains("error locating server")
            || lower.contains("no such host")
            || lower.contains("failed to lookup")
            || lower.contains("connection refused")
            || lower.contains("host unreachable")
            || lower.contains("network unreachable")
        {
            return Self::AddressResolution;
        }
        Self::Unknown
    }

    /// Remediation steps for this category, suitable for returning to callers.
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::AddressResolution => {
                "Verify the server name: use 'host' for the default instance, 'host,port' for \
                 an explicit port, or 'host\\instance' for a named instance. Check that the \
                 server is reachable and that the SQL Server port (default 1433) is open in \
                 the firewall."
            }
            Self::Authentication => {
                "Check the username and password for this target. To use integrated \
                 authentication, leave the credentials empty. Confirm the login is enabled \
                 and mapped to the target database."
            }
            Self::Timeout => {
                "The server did not respond within the connect timeout. Check network \
                 latency and server load, or raise the connect timeout for this target."
            }
            Self::Unknown => "Check the target configuration and the server error log for details.",
        }
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection failed: {message}")]
    Connection { message: String, hint: ConnectHint },

    #[error("Statement rejected: {message}")]
    Validation {
        message: String,
        /// The denylist entry or danger pattern that triggered the rejection.
        pattern: Option<String>,
    },

    #[error("Query execution failed: {message}")]
    Query { message: String },

    #[error("Invalid request: {message}")]
    Usage { message: String },

    #[error("Unknown target: {target}")]
    TargetNotFound { target: String },

    #[error("Transaction error: {message} (transaction: {transaction_id})")]
    Transaction {
        message: String,
        transaction_id: String,
    },

    #[error("Transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a connection error, classifying the message for remediation.
    pub fn connection(message: impl Into<String>) -> Self {
        let message = message.into();
        let hint = ConnectHint::classify(&message);
        Self::Connection { message, hint }
    }

    /// Create a connection error with a pre-classified hint.
    pub fn connection_with_hint(message: impl Into<String>, hint: ConnectHint) -> Self {
        Self::Connection {
            message: message.into(),
            hint,
        }
    }

    /// Create a validation rejection naming the offending pattern.
    pub fn validation(message: impl Into<String>, pattern: Option<String>) -> Self {
        Self::Validation {
            message: message.into(),
            pattern,
        }
    }

    /// Create a query execution error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a caller usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a target-not-found error.
    pub fn target_not_found(target: impl Into<String>) -> Self {
        Self::TargetNotFound {
            target: target.into(),
        }
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>, transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Create a transaction-not-found error.
    pub fn transaction_not_found(transaction_id: impl Into<String>) -> Self {
        Self::TransactionNotFound {
            transaction_id: transaction_id.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Remediation text for this error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Connection { hint, .. } => Some(hint.remediation()),
            Self::Timeout { .. } => {
                Some("Consider raising the timeout or reducing the amount of work per statement")
            }
            _ => None,
        }
    }

    /// Error text as surfaced in the response envelope: the message, with
    /// remediation appended when available.
    pub fn envelope_message(&self) -> String {
        match self.hint() {
            Some(hint) => format!("{self}. {hint}"),
            None => self.to_string(),
        }
    }
}

/// Convert driver errors into the gateway taxonomy.
///
/// Server-reported faults become [`GatewayError::Query`]; transport-level
/// faults become [`GatewayError::Connection`] with a classified hint.
impl From<tiberius::error::Error> for GatewayError {
    fn from(err: tiberius::error::Error) -> Self {
        match &err {
            tiberius::error::Error::Io { .. } => GatewayError::connection(err.to_string()),
            tiberius::error::Error::Tls(msg) => {
                GatewayError::connection(format!("TLS error: {msg}"))
            }
            tiberius::error::Error::Routing { host, port } => GatewayError::connection_with_hint(
                format!("server redirected the session to {host}:{port}"),
                ConnectHint::AddressResolution,
            ),
            tiberius::error::Error::Server(token) => GatewayError::query(format!(
                "server error {}: {}",
                token.code(),
                token.message()
            )),
            _ => GatewayError::query(err.to_string()),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
