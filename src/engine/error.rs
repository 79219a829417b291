use crate::calendar::ParseDateError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// A date string was not strict `YYYY-MM-DD` or not a real date.
    InvalidDate(String),
    /// Parsed dates violate an ordering rule (check-in after checkout).
    InvalidRange(&'static str),
    NotFound(String),
    LimitExceeded(&'static str),
    /// The store adapter failed; the id/key carries the adapter's message.
    Transport(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidDate(input) => write!(f, "invalid civil date: {input:?}"),
            EngineError::InvalidRange(msg) => write!(f, "invalid date range: {msg}"),
            EngineError::NotFound(key) => write!(f, "not found: {key}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Transport(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ParseDateError> for EngineError {
    fn from(e: ParseDateError) -> Self {
        EngineError::InvalidDate(e.input)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport(msg) => EngineError::Transport(msg),
            StoreError::NotFound(key) => EngineError::NotFound(key),
        }
    }
}
