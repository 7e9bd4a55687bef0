//! Errors raised while parsing protocol values.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid hex value: {0}")]
    InvalidHex(String),

    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("value does not fit in 256 bits ({0} bytes)")]
    Overflow(usize),

    #[error("empty value")]
    Empty,
}
