use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid signature pattern: {0}")]
    InvalidPattern(String),

    #[error("Pattern size ({pattern}) exceeds buffer size ({buffer})")]
    PatternTooLarge { pattern: usize, buffer: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid address {address:#x}: {message}")]
    InvalidAddress { address: u64, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Too many arguments: {given} given, at most {max} supported")]
    TooManyArguments { given: usize, max: usize },

    #[error("Privilege backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("{0} not initialized")]
    NotInitialized(&'static str),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub(crate) fn invalid_address(address: u64, message: impl Into<String>) -> Self {
        Error::InvalidAddress {
            address,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());

        assert!(Error::NotFound("commit_creds".to_string()).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::PatternTooLarge {
            pattern: 8,
            buffer: 4,
        };
        assert_eq!(err.to_string(), "Pattern size (8) exceeds buffer size (4)");

        let err = Error::invalid_address(0, "null function address");
        assert_eq!(err.to_string(), "Invalid address 0x0: null function address");

        let err = Error::TooManyArguments { given: 7, max: 6 };
        assert!(err.to_string().contains("7 given"));
    }
}
