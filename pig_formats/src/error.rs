use thiserror::Error;

/// A read that would leave the bounds of a [`ByteCursor`](crate::ByteCursor).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("read of {requested} bytes at position {position} exceeds cursor length {length}")]
    OutOfBounds {
        position: usize,
        requested: usize,
        length: usize,
    },
}

/// Failures raised while parsing a PIG archive or decoding one of its assets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("{context} truncated: {source}")]
    Truncated {
        context: String,
        #[source]
        source: CursorError,
    },
    #[error("invalid directory: {0}")]
    InvalidDirectory(String),
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),
    #[error("no palette resource found (tried {})", .tried.join(", "))]
    PaletteUnavailable { tried: Vec<String> },
    #[error("{kind} index {index} is out of range")]
    UnknownAsset { kind: &'static str, index: usize },
}

impl FormatError {
    pub fn truncated(context: impl Into<String>, source: CursorError) -> Self {
        FormatError::Truncated {
            context: context.into(),
            source,
        }
    }
}

impl From<CursorError> for FormatError {
    fn from(source: CursorError) -> Self {
        FormatError::truncated("archive data", source)
    }
}

/// Attach a description of what was being read to a cursor failure.
pub(crate) trait TruncatedContext<T> {
    fn truncated(self, context: &str) -> Result<T, FormatError>;
}

impl<T> TruncatedContext<T> for Result<T, CursorError> {
    fn truncated(self, context: &str) -> Result<T, FormatError> {
        self.map_err(|source| FormatError::truncated(context, source))
    }
}
