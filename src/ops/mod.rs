//! Operation surface.
//!
//! Every operation takes a typed input, runs against one named target, and
//! returns a [`Response`]: success flag, flattened payload on success, error
//! text on failure. Errors never escape as `Err` from a public operation;
//! connection failures carry their remediation hint in the error text.

pub mod admin;
pub mod alter;
pub mod crud;
pub mod introspect;
pub mod procedure;
pub mod query;
pub mod transaction;

use schemars::JsonSchema;
use serde::Serialize;

use crate::error::GatewayError;

/// Uniform operation envelope.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Response<T> {
    /// Whether the operation completed.
    pub success: bool,
    /// Payload fields, flattened into the envelope on success.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    /// Error description, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn fail(error: &GatewayError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.envelope_message()),
        }
    }

    pub fn from_result(result: crate::error::GatewayResult<T>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(error) => Self::fail(&error),
        }
    }
}
