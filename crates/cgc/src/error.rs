//! Error Module - CGC Error Types
//!
//! Defines all error types used in CGC.
//!
//! The collector itself has no recoverable error states: allocation either
//! succeeds or aborts through the global allocator's OOM path, and contract
//! violations (panicking destructors) are fatal. What remains is the
//! configuration and context-management surface.

use thiserror::Error;

/// Main error type for all CGC operations
///
/// # Examples
///
/// ```rust
/// use cgc::CgcError;
///
/// fn describe(err: &CgcError) -> &'static str {
///     match err {
///         CgcError::Configuration(_) => "bad configuration",
///         CgcError::InvalidArgument(_) => "bad argument",
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum CgcError {
    /// Configuration error
    ///
    /// **When returned:** Invalid `GcConfig` detected at heap construction
    ///
    /// **Recovery strategy:** Use default configuration or fail fast
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    ///
    /// **Recovery strategy:** Fix caller to provide valid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CgcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CgcError::Configuration(_))
    }

    /// Check if this error indicates a bug in the caller
    pub fn is_bug(&self) -> bool {
        matches!(self, CgcError::InvalidArgument(_))
    }
}

/// Result type alias for CGC operations
pub type Result<T> = std::result::Result<T, CgcError>;
