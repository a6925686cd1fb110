//! Error types for payload conversion.

use thiserror::Error;

/// Result type for protocol conversions.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while converting wire payloads into typed values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The update map named a field that cannot be patched.
    #[error("unknown patch field: {name}")]
    UnknownField {
        /// The offending field name.
        name: String,
    },

    /// A field value had an unusable shape.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// The patch carried no fields at all.
    #[error("empty update payload")]
    EmptyUpdate,
}
