//! Error taxonomy shared by every leave operation
use std::fmt;

use sled::transaction::TransactionError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaveError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad input: {0}")]
    BadInput(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("insufficient balance: requested {requested} day(s), available {available}")]
    InsufficientBalance { requested: String, available: String },
    #[error("internal error: {0}")]
    Internal(String),
}

/// The stable kind attached to every failure reported to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadInput,
    InvalidTransition,
    InsufficientBalance,
    Internal,
}

pub type LeaveResult<T> = Result<T, LeaveError>;

impl LeaveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaveError::NotFound(_) => ErrorKind::NotFound,
            LeaveError::Forbidden(_) => ErrorKind::Forbidden,
            LeaveError::BadInput(_) => ErrorKind::BadInput,
            LeaveError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            LeaveError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LeaveError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        LeaveError::NotFound(what.to_string())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        LeaveError::Forbidden(why.into())
    }

    pub fn bad_input(why: impl Into<String>) -> Self {
        LeaveError::BadInput(why.into())
    }

    pub fn invalid_transition(why: impl Into<String>) -> Self {
        LeaveError::InvalidTransition(why.into())
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::BadInput => "BAD_INPUT",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<sled::Error> for LeaveError {
    fn from(value: sled::Error) -> Self {
        LeaveError::Internal(format!("storage: {value}"))
    }
}

impl From<minicbor::decode::Error> for LeaveError {
    fn from(value: minicbor::decode::Error) -> Self {
        LeaveError::Internal(format!("decode: {value}"))
    }
}

impl<E: fmt::Display> From<minicbor::encode::Error<E>> for LeaveError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        LeaveError::Internal(format!("encode: {value}"))
    }
}

// Aborted transactions already carry a categorised error; storage failures are internal.
impl From<TransactionError<LeaveError>> for LeaveError {
    fn from(value: TransactionError<LeaveError>) -> Self {
        match value {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => err.into(),
        }
    }
}
