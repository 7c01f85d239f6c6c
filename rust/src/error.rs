//! Failure taxonomy for a property-file edit. Every variant aborts the run;
//! nothing is retried.

use thiserror::Error;

use crate::crypto::CodecError;

pub type EditResult<T> = Result<T, EditError>;

#[derive(Debug, Error)]
pub enum EditError {
    /// Bad entry or run configuration, reported before the file is touched.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// Missing or empty value while empty values are not allowed.
    #[error("empty values are not allowed, property {0}")]
    EmptyValue(String),
    #[error("cannot decrypt {key}: {reason}")]
    Decryption { key: String, reason: String },
    /// Date offset that is not an integer or leaves the representable range.
    #[error("invalid operand for {key}: {reason}")]
    InvalidOperand { key: String, reason: String },
    /// Encryption or decryption requested without a usable codec.
    #[error("encryption not configured: {0}")]
    Configuration(String),
    #[error("malformed property file {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("i/o failure on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl EditError {
    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        EditError::Io {
            path: path.display().to_string(),
            reason: format!("{err}"),
        }
    }

    /// Maps a codec failure for `key`; setup problems are configuration errors,
    /// everything else is a decryption failure.
    pub(crate) fn codec(key: &str, err: CodecError) -> Self {
        match err {
            CodecError::EmptyPassword
            | CodecError::NonAsciiPassword(_)
            | CodecError::UnknownAlgorithm(_)
            | CodecError::CipherSetup(_) => EditError::Configuration(format!("{key}: {err}")),
            other => EditError::Decryption {
                key: key.to_string(),
                reason: format!("{other}"),
            },
        }
    }
}
