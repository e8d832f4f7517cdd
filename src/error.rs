//! Error types for erasure coding operations

use thiserror::Error;

/// Which group of fragment buffers a count mismatch refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Data,
    Parity,
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentKind::Data => write!(f, "data"),
            FragmentKind::Parity => write!(f, "parity"),
        }
    }
}

/// Errors that can occur while setting up a session or transforming fragments
#[derive(Debug, Error)]
pub enum ErasureError {
    /// k/m out of range for GF(2^8) or for the 64-bit fragment bitmap
    #[error("Invalid configuration k={k}, m={m}: {reason}")]
    InvalidConfiguration { k: usize, m: usize, reason: String },

    /// A field arithmetic provider could not be bound
    #[error("Field arithmetic provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Scratch memory could not be reserved
    #[error("Failed to allocate {bytes} bytes of scratch memory")]
    AllocationFailure { bytes: usize },

    /// Fewer than k usable fragments remain
    #[error("Insufficient fragments: need {needed}, only {available} available")]
    InsufficientFragments { needed: usize, available: usize },

    /// The decode submatrix has no inverse
    #[error("Decode matrix is singular")]
    Singular,

    /// The generator matrix does not start with the k x k identity
    #[error("Generator matrix is not systematic at row {row}")]
    NonSystematic { row: usize },

    /// Fragment index out of range, duplicated, or not usable for the call
    #[error("Invalid fragment index {index}: {reason}")]
    InvalidIndex { index: usize, reason: &'static str },

    /// Caller passed the wrong number of fragment buffers
    #[error("Expected {expected} {kind} fragment buffers, got {actual}")]
    FragmentCountMismatch {
        kind: FragmentKind,
        expected: usize,
        actual: usize,
    },

    /// A fragment buffer is shorter than the block size
    #[error("Fragment {index} has {len} bytes, block size is {block_size}")]
    BufferTooSmall {
        index: usize,
        len: usize,
        block_size: usize,
    },

    /// Matrix or table shape does not fit the operation
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

/// Type alias for Result with ErasureError
pub type Result<T> = std::result::Result<T, ErasureError>;
