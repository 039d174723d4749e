use thiserror::Error;

/// Errors returned when validating [`DeriverSettings`][crate::DeriverSettings].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum KeygenError {
    #[error("invalid key length {key_len}; expected 1..={max}")]
    InvalidKeyLength { key_len: usize, max: usize },
    #[error("prefix width must be at least 1")]
    InvalidPrefixWidth,
    #[error("first byte scale {0} is outside (0, 1]")]
    InvalidScale(f64),
    #[error("iteration count must be at least 1")]
    InvalidIterations,
}
