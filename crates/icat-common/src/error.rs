//! Error types for the iCAT client
//!
//! Every failure surfaced by the client is an [`Error`]: a leveled,
//! timestamped message classified by [`ErrorKind`]. Status codes returned
//! by the native catalog client are attached when available.

use chrono::{DateTime, Local};
use derive_more::Display;

/// Rendering of [`Error::time`] in the error string
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Common result type for iCAT client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Severity attached to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Level {
    #[display("Info")]
    Info,
    #[display("Warn")]
    Warn,
    #[display("Fatal")]
    Fatal,
}

/// Classification of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Connect rejected by the catalog
    #[display("authentication")]
    Auth,
    /// Transport failure on a remote call
    #[display("network")]
    Network,
    /// Named collection, data object, principal or AVU does not exist
    #[display("not found")]
    NotFound,
    /// Creating something that already exists
    #[display("duplicate")]
    Duplicate,
    /// Argument rejected before reaching the server
    #[display("invalid argument")]
    InvalidArgument,
    /// Principal returned by the server is missing from the cache
    #[display("integrity")]
    Integrity,
    /// Operation on a disconnected connection
    #[display("closed")]
    Closed,
    /// Session lease not obtained before the deadline
    #[display("timeout")]
    Timeout,
    /// Local filesystem failure
    #[display("io")]
    Io,
    /// Any other remote failure
    #[display("remote")]
    Remote,
}

/// A leveled, timestamped client error
///
/// Rendered as `<time>: <level> - <message>`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}: {level} - {message}", .time.format(TIME_FORMAT))]
pub struct Error {
    kind: ErrorKind,
    level: Level,
    message: String,
    time: DateTime<Local>,
    status: Option<i32>,
}

impl Error {
    /// Create a new error stamped with the current wall-clock time
    pub fn new(kind: ErrorKind, level: Level, message: impl Into<String>) -> Self {
        Self {
            kind,
            level,
            message: message.into(),
            time: Local::now(),
            status: None,
        }
    }

    /// Create a fatal error
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, Level::Fatal, message)
    }

    /// Create an informational error, for caller-initiated logging
    pub fn info(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, Level::Info, message)
    }

    /// Create a warning, for caller-initiated logging
    pub fn warn(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, Level::Warn, message)
    }

    /// Attach a native status code
    #[must_use]
    pub const fn with_status(mut self, status: i32) -> Self {
        self.status = Some(status);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::NotFound, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::Duplicate, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::InvalidArgument, message)
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::Integrity, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::Closed, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::fatal(ErrorKind::Io, message)
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Wall-clock time at which the error was created
    #[must_use]
    pub const fn time(&self) -> DateTime<Local> {
        self.time
    }

    /// Native status code, if the error originated in the catalog client
    #[must_use]
    pub const fn status(&self) -> Option<i32> {
        self.status
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.kind == ErrorKind::Duplicate
    }

    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.level == Level::Fatal
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
