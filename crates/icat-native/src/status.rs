//! Catalog status codes and the native error type

use icat_common::{Error, ErrorKind};

/// Result type for native calls
pub type NativeResult<T> = Result<T, NativeError>;

/// A failed native call: the catalog status code and its message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} ({})", status_name(*.status))]
pub struct NativeError {
    pub status: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The catalog answered with no rows
    #[must_use]
    pub const fn is_no_rows(&self) -> bool {
        self.status == CAT_NO_ROWS_FOUND
    }

    /// The handle named in the call is not open
    #[must_use]
    pub const fn is_bad_handle(&self) -> bool {
        self.status == BAD_INPUT_DESC_INDEX
    }

    /// Client error classification of this status
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self.status {
            CAT_NO_ROWS_FOUND | CAT_UNKNOWN_COLLECTION | CAT_UNKNOWN_FILE | CAT_INVALID_USER
            | SYS_RESC_DOES_NOT_EXIST | SYS_REPLICA_DOES_NOT_EXIST => ErrorKind::NotFound,
            CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME
            | CAT_NAME_EXISTS_AS_COLLECTION
            | CAT_NAME_EXISTS_AS_DATAOBJ
            | OVERWRITE_WITHOUT_FORCE_FLAG => ErrorKind::Duplicate,
            CAT_INVALID_AUTHENTICATION | CAT_PASSWORD_EXPIRED => ErrorKind::Auth,
            USER_SOCK_CONNECT_ERR | SYS_HEADER_READ_LEN_ERR | USER_RODS_HOST_EMPTY => {
                ErrorKind::Network
            }
            _ => ErrorKind::Remote,
        }
    }

    /// Convert into a fatal client error, prefixing `context` to the message
    #[must_use]
    pub fn into_error(self, context: &str) -> Error {
        let message = if context.is_empty() {
            self.to_string()
        } else {
            format!("{context}: {self}")
        };
        Error::fatal(self.kind(), message).with_status(self.status)
    }
}

impl NativeError {
    /// Convert a failed connect into a client error
    ///
    /// An unknown user or zone while connecting is a rejected identity, so
    /// it classifies as `Auth` rather than `NotFound`.
    #[must_use]
    pub fn into_connect_error(self, context: &str) -> Error {
        if self.status == CAT_INVALID_USER {
            let message = format!("{context}: {self}");
            Error::fatal(ErrorKind::Auth, message).with_status(self.status)
        } else {
            self.into_error(context)
        }
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        err.into_error("")
    }
}

pub const SYS_HEADER_READ_LEN_ERR: i32 = -4000;
pub const SYS_RESC_DOES_NOT_EXIST: i32 = -78_000;
pub const SYS_REPLICA_DOES_NOT_EXIST: i32 = -168_000;
pub const USER_RODS_HOST_EMPTY: i32 = -302_000;
pub const USER_SOCK_CONNECT_ERR: i32 = -305_000;
pub const OVERWRITE_WITHOUT_FORCE_FLAG: i32 = -312_000;
pub const USER_INPUT_PATH_ERR: i32 = -317_000;
pub const BAD_INPUT_DESC_INDEX: i32 = -326_000;
pub const CAT_NO_ROWS_FOUND: i32 = -808_000;
pub const CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME: i32 = -809_000;
pub const CAT_UNKNOWN_COLLECTION: i32 = -814_000;
pub const CAT_INVALID_ARGUMENT: i32 = -816_000;
pub const CAT_UNKNOWN_FILE: i32 = -817_000;
pub const CAT_COLLECTION_NOT_EMPTY: i32 = -821_000;
pub const CAT_INVALID_AUTHENTICATION: i32 = -826_000;
pub const CAT_INVALID_USER: i32 = -827_000;
pub const CAT_INSUFFICIENT_PRIVILEGE_LEVEL: i32 = -830_000;
pub const CAT_PASSWORD_EXPIRED: i32 = -840_000;
pub const CAT_NAME_EXISTS_AS_COLLECTION: i32 = -852_000;
pub const CAT_NAME_EXISTS_AS_DATAOBJ: i32 = -853_000;

/// Symbolic name of a status code
#[must_use]
pub const fn status_name(status: i32) -> &'static str {
    match status {
        0 => "SUCCESS",
        SYS_HEADER_READ_LEN_ERR => "SYS_HEADER_READ_LEN_ERR",
        SYS_RESC_DOES_NOT_EXIST => "SYS_RESC_DOES_NOT_EXIST",
        SYS_REPLICA_DOES_NOT_EXIST => "SYS_REPLICA_DOES_NOT_EXIST",
        USER_RODS_HOST_EMPTY => "USER_RODS_HOST_EMPTY",
        USER_SOCK_CONNECT_ERR => "USER_SOCK_CONNECT_ERR",
        OVERWRITE_WITHOUT_FORCE_FLAG => "OVERWRITE_WITHOUT_FORCE_FLAG",
        USER_INPUT_PATH_ERR => "USER_INPUT_PATH_ERR",
        BAD_INPUT_DESC_INDEX => "BAD_INPUT_DESC_INDEX",
        CAT_NO_ROWS_FOUND => "CAT_NO_ROWS_FOUND",
        CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME => "CATALOG_ALREADY_HAS_ITEM_BY_THAT_NAME",
        CAT_UNKNOWN_COLLECTION => "CAT_UNKNOWN_COLLECTION",
        CAT_INVALID_ARGUMENT => "CAT_INVALID_ARGUMENT",
        CAT_UNKNOWN_FILE => "CAT_UNKNOWN_FILE",
        CAT_COLLECTION_NOT_EMPTY => "CAT_COLLECTION_NOT_EMPTY",
        CAT_INVALID_AUTHENTICATION => "CAT_INVALID_AUTHENTICATION",
        CAT_INVALID_USER => "CAT_INVALID_USER",
        CAT_INSUFFICIENT_PRIVILEGE_LEVEL => "CAT_INSUFFICIENT_PRIVILEGE_LEVEL",
        CAT_PASSWORD_EXPIRED => "CAT_PASSWORD_EXPIRED",
        CAT_NAME_EXISTS_AS_COLLECTION => "CAT_NAME_EXISTS_AS_COLLECTION",
        CAT_NAME_EXISTS_AS_DATAOBJ => "CAT_NAME_EXISTS_AS_DATAOBJ",
        _ => "UNKNOWN_STATUS",
    }
}
