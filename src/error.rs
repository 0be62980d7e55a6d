use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Request at offset {offset} failed after {attempts} retries: {cause}")]
    RetriesExhausted {
        offset: usize,
        attempts: u32,
        cause: String,
    },

    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),
}

/// Input-integrity violations that reject a whole batch during normalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index} has field '{field}' of the wrong type: expected {expected}, got {found}")]
    WrongType {
        index: usize,
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("duplicate product id '{id}' at records {first_index} and {second_index}")]
    DuplicateId {
        id: String,
        first_index: usize,
        second_index: usize,
    },

    #[error("product '{id}' has unparsable date_created '{value}': {reason}")]
    InvalidTimestamp {
        id: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;
