use thiserror::Error;

/// Operand-level faults raised by page operations.
#[derive(Error, Debug)]
pub enum PageError {
    #[error("no free slot on page")]
    PageFull,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("tuple not found on page")]
    TupleNotFound,

    #[error("page image is {got} bytes, expected {want}")]
    BadImage { got: usize, want: usize },
}
