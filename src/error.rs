use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate registration name: {0}")]
    DuplicateName(String),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown coder family: {0}")]
    UnknownFamily(String),
    #[error("{surface}: role {role} is not supported by the engine")]
    UnsupportedRole { surface: String, role: String },
    #[error("{surface}: family extension requires capability {capability}")]
    MissingCapability { surface: String, capability: String },
    #[error("{surface} has no operation named {operation}")]
    NoSuchOperation { surface: String, operation: String },
    #[error("{operation}: argument {index} should be {expected}")]
    Argument {
        operation: String,
        index: usize,
        expected: &'static str,
    },
    #[error("{operation}: buffer holds {actual} bytes, expected {expected}")]
    BufferLength {
        operation: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("coder instance lock poisoned")]
    Poisoned,
    #[error("config error: {0}")]
    Config(String),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
