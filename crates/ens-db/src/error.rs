use rusqlite::ErrorCode;
use rusqlite::ffi::{SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_CONSTRAINT_UNIQUE};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Store-level failures. The `&'static str` payload names the kind of row
/// involved ("recipient", "recipient draft", ...) and is safe to show to
/// clients.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} belongs to another user")]
    NotOwner(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("invalid {0}")]
    InvalidReference(&'static str),

    #[error("database lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// True for UNIQUE and PRIMARY KEY violations.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

/// Map a unique violation onto `Conflict(what)`, pass everything else through.
pub(crate) fn conflict_on_unique(what: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| {
        if is_unique_violation(&e) {
            StoreError::Conflict(what)
        } else {
            StoreError::Sqlite(e)
        }
    }
}
