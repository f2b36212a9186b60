use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The container's magic value does not match the expectation {magic}")]
    InvalidMagicValue { magic: u32 },

    #[error("The container is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    /// Represents an empty source, e.g. a zero-byte payload handed to the reader.
    #[error("Source contains no data")]
    EmptySource,

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// The embedded scene description is not valid JSON (or misses required fields).
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),
}

pub mod glb;
