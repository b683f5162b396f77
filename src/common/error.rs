use thiserror::Error;

use crate::common::types::{PageId, TableId, TransactionId};
use crate::storage::page::PageError;

/// Errors surfaced across the engine boundary.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0} aborted to break a deadlock")]
    TransactionAborted(TransactionId),

    #[error("buffer pool full: every cached page is dirty")]
    CacheFull,

    #[error("page {0} is out of bounds")]
    InvalidPage(PageId),

    #[error("no table with id {0:x}")]
    UnknownTable(TableId),

    #[error("no table named {0}")]
    UnknownTableName(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the engine
pub type DbResult<T> = Result<T, DbError>;
