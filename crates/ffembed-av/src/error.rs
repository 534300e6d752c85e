//! Error types for ffembed-av.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur before a tool is invoked.
///
/// Failures of the capture machinery are not represented here: they make the
/// call fall back to running uncaptured. A nonzero exit code is a value, not
/// an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument cannot be passed to the tool as a C string.
    #[error("invalid argument at index {index}: {reason}")]
    InvalidArgument { index: usize, reason: String },

    /// A program name cannot be passed to the tool as a C string.
    #[error("invalid program name {name:?}: {reason}")]
    InvalidProgramName { name: String, reason: String },

    /// A log level name or number was not recognised.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            index,
            reason: reason.into(),
        }
    }

    /// Create an invalid program name error.
    pub fn invalid_program_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidProgramName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
