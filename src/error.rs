//! Error types for fanout
//!
//! Only infrastructure and input problems are errors. A task whose handler
//! fails never produces an `Error`; its slot holds the failure sentinel.
//!
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for fanout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Infrastructure errors (3xx)
    SpawnFailed = 300,
    ChannelFailed = 301,
    ReapFailed = 302,
    RuntimeFailed = 303,

    // Input errors (4xx)
    MalformedInput = 400,
    TaskFileInvalid = 401,

    // Protocol errors (5xx)
    ProtocolMalformed = 500,
    SerializationFailed = 501,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            500..=599 => 50,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Infrastructure Errors
    // ─────────────────────────────────────────────────────────────

    /// A worker process could not be started
    #[error("Failed to spawn worker for task {index} ({program}): {source}")]
    SpawnFailed {
        index: usize,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pipe to or from a worker failed
    #[error("Transport channel for task {index} failed: {message}")]
    Channel { index: usize, message: String },

    /// Waiting for a worker process failed
    #[error("Failed to reap worker for task {index}: {source}")]
    ReapFailed {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    /// The async runtime could not be created
    #[error("Failed to create async runtime: {0}")]
    Runtime(String),

    // ─────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────

    /// Task list rejected before any worker was started
    #[error("Malformed task input: {0}")]
    MalformedInput(String),

    /// Task file could not be parsed
    #[error("Invalid task file {path}: {message}")]
    TaskFile { path: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Worker received a message it cannot interpret
    #[error("Malformed protocol message: {message}")]
    ProtocolMalformed { message: String },

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::SpawnFailed { .. } => ErrorCode::SpawnFailed,
            Error::Channel { .. } => ErrorCode::ChannelFailed,
            Error::ReapFailed { .. } => ErrorCode::ReapFailed,
            Error::Runtime(_) => ErrorCode::RuntimeFailed,

            Error::MalformedInput(_) => ErrorCode::MalformedInput,
            Error::TaskFile { .. } => ErrorCode::TaskFileInvalid,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,
            Error::Json(_) => ErrorCode::SerializationFailed,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Infrastructure failures abort the whole run; nothing partial is returned
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::SpawnFailed { .. }
                | Error::Channel { .. }
                | Error::ReapFailed { .. }
                | Error::Runtime(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'fanout config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'fanout config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::SpawnFailed { .. } => Some(
                "Check that 'runner.worker_program' points to an executable that hosts the tasks."
            ),
            Error::Runtime(_) | Error::Channel { .. } => Some(
                "The system may be out of processes or file descriptors. \
                 Try submitting fewer tasks at once."
            ),
            Error::TaskFile { .. } => Some(
                "Task files are JSON arrays of {\"task\": <name>, \"args\": <value>} objects."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    pub fn config_parse(message: impl Into<String>, source: Option<toml::de::Error>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source,
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn channel(index: usize, message: impl Into<String>) -> Self {
        Error::Channel {
            index,
            message: message.into(),
        }
    }

    pub fn task_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TaskFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::SpawnFailed.as_str(), "E300");
        assert_eq!(ErrorCode::MalformedInput.as_str(), "E400");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::ReapFailed.exit_code(), 30);
        assert_eq!(ErrorCode::TaskFileInvalid.exit_code(), 40);
        assert_eq!(ErrorCode::ProtocolMalformed.exit_code(), 50);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_spawn_failure_is_infrastructure() {
        let err = Error::SpawnFailed {
            index: 2,
            program: PathBuf::from("/missing/worker"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.is_infrastructure());
        assert_eq!(err.code(), ErrorCode::SpawnFailed);
        assert!(err.to_string().contains("task 2"));
        assert!(err.suggestion().unwrap().contains("worker_program"));
    }

    #[test]
    fn test_malformed_input_is_not_infrastructure() {
        let err = Error::MalformedInput("3 names but 2 argument bundles".into());
        assert!(!err.is_infrastructure());
        assert_eq!(err.exit_code(), 40);
    }

    #[test]
    fn test_format_for_terminal() {
        let formatted = Error::config_not_found("/test/fanout.toml").format_for_terminal();
        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let formatted = Error::channel(1, "broken").format_for_log();
        assert!(formatted.contains("[E301]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
