use std::error::Error;
use std::fmt;

pub mod prelude {
    pub use super::{err_msg, UrsaCryptoError, UrsaCryptoErrorKind, UrsaCryptoResult};
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum UrsaCryptoErrorKind {
    // Common errors
    #[error("Invalid library state")]
    InvalidState,
    #[error("Invalid structure")]
    InvalidStructure,
    #[error("Invalid parameter {0}")]
    InvalidParam(u32),
    // Protocol errors
    #[error("Proof rejected")]
    ProofRejected,
    #[error("Statement not satisfiable by held attributes")]
    StatementUnsatisfiable,
}

#[derive(Debug)]
pub struct UrsaCryptoError {
    kind: UrsaCryptoErrorKind,
    msg: String,
}

impl UrsaCryptoError {
    pub fn from_msg<D>(kind: UrsaCryptoErrorKind, msg: D) -> UrsaCryptoError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        UrsaCryptoError {
            kind,
            msg: msg.to_string(),
        }
    }

    pub fn kind(&self) -> UrsaCryptoErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for UrsaCryptoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.msg)
        }
    }
}

impl Error for UrsaCryptoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<UrsaCryptoErrorKind> for UrsaCryptoError {
    fn from(kind: UrsaCryptoErrorKind) -> UrsaCryptoError {
        UrsaCryptoError {
            kind,
            msg: String::new(),
        }
    }
}

pub fn err_msg<D>(kind: UrsaCryptoErrorKind, msg: D) -> UrsaCryptoError
where
    D: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    UrsaCryptoError::from_msg(kind, msg)
}

impl From<log::SetLoggerError> for UrsaCryptoError {
    fn from(err: log::SetLoggerError) -> UrsaCryptoError {
        err_msg(
            UrsaCryptoErrorKind::InvalidState,
            format!("Setting logger failed: {}", err),
        )
    }
}

impl From<num_bigint::ParseBigIntError> for UrsaCryptoError {
    fn from(err: num_bigint::ParseBigIntError) -> UrsaCryptoError {
        err_msg(UrsaCryptoErrorKind::InvalidStructure, err.to_string())
    }
}

impl From<serde_json::Error> for UrsaCryptoError {
    fn from(err: serde_json::Error) -> UrsaCryptoError {
        err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Serialization failed: {}", err),
        )
    }
}

pub type UrsaCryptoResult<T> = Result<T, UrsaCryptoError>;
