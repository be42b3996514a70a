// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Hyperpolymath

use thiserror::Error;

/// Signing error types. Messages are surfaced verbatim to the user.
#[derive(Error, Debug)]
pub enum SignError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Decryption produced invalid padding; the only wrong-PIN signal.
    #[error("decryption failed: {0}")]
    CryptoError(String),

    #[error("malformed data: {0}")]
    FormatError(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("io error: {0}")]
    IoError(String),
}

/// Discriminant of a [`SignError`], for matching without the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    CryptoError,
    FormatError,
    ValidationError,
    IoError,
}

impl SignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::CryptoError(_) => ErrorKind::CryptoError,
            Self::FormatError(_) => ErrorKind::FormatError,
            Self::ValidationError(_) => ErrorKind::ValidationError,
            Self::IoError(_) => ErrorKind::IoError,
        }
    }
}

impl From<std::io::Error> for SignError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SignError {
    fn from(err: serde_json::Error) -> Self {
        Self::FormatError(err.to_string())
    }
}

pub type SignResult<T> = Result<T, SignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: SignError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: SignError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.kind(), ErrorKind::IoError);
    }

    #[test]
    fn test_message_is_verbatim() {
        let err = SignError::InvalidInput("PIN must not be empty".to_string());
        assert_eq!(err.to_string(), "invalid input: PIN must not be empty");
    }
}
