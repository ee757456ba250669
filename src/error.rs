use std::io;
use thiserror::Error;

use crate::options::ConfigError;

#[derive(Error, Debug)]
pub enum InPlaceError {
    #[error("invalid in-place configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("in-place session is not currently open")]
    Closed,

    /// Filesystem errors are passed through untouched.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl InPlaceError {
    /// Returns true for errors raised by using a session after commit or rollback.
    pub fn is_closed(&self) -> bool {
        matches!(self, InPlaceError::Closed)
    }

    /// The underlying filesystem error, if this is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            InPlaceError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InPlaceError> for io::Error {
    fn from(err: InPlaceError) -> io::Error {
        match err {
            InPlaceError::Io(e) => e,
            other => io::Error::other(other),
        }
    }
}

pub type Result<T, E = InPlaceError> = std::result::Result<T, E>;
