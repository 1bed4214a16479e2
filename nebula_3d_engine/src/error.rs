//! Error types for the Nebula3D engine
//!
//! One crate-level error enum covers the whole taxonomy: configuration
//! failures at init, render-graph compilation errors (programming errors,
//! fatal to the caller), resource lifetime errors, and backend failures.

use std::fmt;

/// Result type for Nebula3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Nebula3D engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unsupported GPU features or missing device capabilities (fatal at init)
    Configuration(String),

    /// A resource with the same name is already registered in the render graph
    DuplicateResource(String),

    /// A pass declared usage of a resource the render graph does not know
    MissingResource(String),

    /// Conflicting simultaneous usages of the same subresource within one pass
    UsageConflict(String),

    /// Invalid resource (bad view range, mismatched description, wrong kind)
    InvalidResource(String),

    /// Out of GPU memory or descriptor heap exhaustion
    OutOfMemory,

    /// The GPU device was lost (fatal, halts rendering)
    DeviceLost(String),

    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::DuplicateResource(msg) => write!(f, "Duplicate resource: {}", msg),
            Error::MissingResource(msg) => write!(f, "Missing resource: {}", msg),
            Error::UsageConflict(msg) => write!(f, "Usage conflict: {}", msg),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ===== ERROR MACROS =====

/// Construct an error of the given variant, logging it through the engine
/// logging facade first.
///
/// # Example
///
/// ```ignore
/// return Err(engine_err!(MissingResource, "nebula3d::RenderGraph",
///     "resource '{}' was never registered", name));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($variant:ident, $source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::error::Error::$variant(message)
    }};
}

/// Log and return an error of the given variant from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($variant:ident, $source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($variant, $source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
