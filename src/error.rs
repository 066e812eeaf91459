//! Error types for upsert-batch.

use thiserror::Error;

/// Message key reported when no table name can be resolved.
pub const MESSAGE_NO_TABLE: &str = "db_must_set_table";

/// Message key reported when there are no staged rows to insert.
pub const MESSAGE_MUST_USE_SET: &str = "db_must_use_set";

/// Message key reported when the update clause would be empty.
pub const MESSAGE_EMPTY_UPDATE: &str = "db_empty_update_clause";

/// The main error type for upsert operations.
#[derive(Debug, Error)]
pub enum UpsertError {
    /// Neither an explicit table nor a default `from` table was set.
    #[error("You must set the database table to be used with your query.")]
    NoTable,

    /// No staged rows after the optional load step.
    #[error("You must use the \"set\" method to update an entry.")]
    NoValidData,

    /// A staged row does not carry the same columns as the first row.
    #[error("Row {row} does not match the column set of the first row")]
    ColumnMismatch { row: usize },

    /// Every column was excluded and no extra update fields were given.
    #[error("The ON DUPLICATE KEY UPDATE clause would be empty")]
    EmptyUpdateClause,

    /// Invalid input value.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Failed to parse a command line assignment or column list.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpsertError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// The language key under which a user-facing message for this error
    /// is looked up.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::NoTable => MESSAGE_NO_TABLE,
            Self::NoValidData | Self::ColumnMismatch { .. } => MESSAGE_MUST_USE_SET,
            Self::EmptyUpdateClause => MESSAGE_EMPTY_UPDATE,
            Self::InvalidValue(_) | Self::Parse { .. } => "db_invalid_input",
            Self::Connection(_) => "db_unable_to_connect",
            Self::Execution(_) => "db_error_heading",
            Self::Config(_) | Self::Io(_) => "db_invalid_config",
        }
    }

    /// Render the error for display, gated on debug mode.
    ///
    /// With `debug` off only a bare failure indicator is returned.
    pub fn display(&self, debug: bool) -> String {
        if debug {
            format!("[{}] {}", self.message_key(), self)
        } else {
            "upsert failed".to_string()
        }
    }
}

impl From<sqlx::Error> for UpsertError {
    fn from(e: sqlx::Error) -> Self {
        UpsertError::Execution(e.to_string())
    }
}

/// Result type alias for upsert operations.
pub type UpsertResult<T> = Result<T, UpsertError>;
