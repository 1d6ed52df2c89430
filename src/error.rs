//! Error types for the XML analysis library.

use thiserror::Error;

/// Errors that can occur while reading, parsing or checking an XML file.
#[derive(Error, Debug)]
pub enum Error {
    /// The document is not well-formed, including syntax errors reported by
    /// the underlying reader
    #[error("Malformed XML at line {line}: {message}")]
    Malformed {
        /// Line (in original file coordinates) where the problem was detected
        line: usize,
        /// Description of the violation
        message: String,
    },

    /// Bytes could not be decoded with the given charset
    #[error("Unable to decode content as {charset}: {message}")]
    Decode {
        /// Name of the charset used for decoding
        charset: String,
        /// Description of the decoding failure
        message: String,
    },

    /// Charset label that this library cannot decode
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),

    /// A text range with start after end, or of zero width
    #[error("Invalid text range {start_line}:{start_column}-{end_line}:{end_column}")]
    InvalidRange {
        /// Start line
        start_line: usize,
        /// Start column
        start_column: usize,
        /// End line
        end_line: usize,
        /// End column
        end_column: usize,
    },

    /// The token scan and the structural tree disagree, or the parse panicked
    #[error("Internal error: {0}")]
    Internal(String),

    /// Query expression could not be compiled or evaluated
    #[error("Invalid query '{expression}': {message}")]
    Query {
        /// The offending expression
        expression: String,
        /// Description of the failure
        message: String,
    },

    /// A rule parameter is missing or malformed
    #[error("Invalid configuration for rule {rule}: {message}")]
    Configuration {
        /// Rule key
        rule: String,
        /// Description of the problem
        message: String,
    },

    /// A check failed while scanning a file
    #[error("Check {rule} failed: {message}")]
    Check {
        /// Rule key of the failing check
        rule: String,
        /// Failure description
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    /// Returns true if this error means the file content is not well-formed XML.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Malformed { .. })
    }

    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        Error::Malformed {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

/// Result type alias for XML analysis operations.
pub type Result<T> = std::result::Result<T, Error>;
