use thiserror::Error;

use crate::mapping::Role;

/// Errors raised while building or interpreting backend messages.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("required column role '{0}' is empty")]
    MissingRole(Role),

    #[error("column '{column}' is bound to both {first} and {second}")]
    DuplicateBinding {
        column: String,
        first: Role,
        second: Role,
    },

    #[error("column '{column}' is not offered by the uploaded log")]
    UnknownColumn { column: String },

    #[error("role '{0}' is reserved for XES logs and cannot be changed")]
    ReservedRole(Role),

    #[error("unsupported log file '{0}': expected a .csv or .xes file")]
    UnsupportedLogFile(String),

    #[error("unknown analysis variant '{0}'")]
    UnknownVariant(String),

    #[error("unknown analysis family '{0}'")]
    UnknownFamily(String),

    #[error("unknown resource metric '{0}'")]
    UnknownMetric(String),

    #[error("zeta must be greater than zero, got {0}")]
    InvalidZeta(f64),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
