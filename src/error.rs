use std::fmt;

/// Failure taxonomy for the matching pipeline.
///
/// Configuration and missing-input failures abort before any stage runs.
/// Per-unit failures (an image that fails to decode, a pair the estimator
/// cannot fit) are tolerated inside the stages and never surface here.
#[derive(Debug)]
pub enum Error {
    /// Bad or conflicting options, detected before any stage runs.
    Config(String),
    /// A required input artifact or path is absent.
    MissingInput(String),
    /// Pair selection produced nothing to verify.
    EmptySelection,
    /// An artifact exists but cannot be parsed.
    Parse(String),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit code for the binary. 0 is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Io(_) | Error::Parse(_) => 1,
            Error::Config(_) => 2,
            Error::MissingInput(_) => 3,
            Error::EmptySelection => 4,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
            Error::MissingInput(what) => write!(f, "missing input: {}", what),
            Error::EmptySelection => write!(f, "empty pair selection, nothing to match"),
            Error::Parse(msg) => write!(f, "parse error: {}", msg),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
