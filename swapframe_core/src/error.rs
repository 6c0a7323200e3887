//! Error types for swapframe
//!
//! Configuration mismatches never surface here: they are resolved by
//! fallback during negotiation. Stale swapchains are reported as
//! [`AcquireStatus`](crate::device::AcquireStatus) values, not errors.

use std::fmt;

/// Result type for swapframe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Swapframe errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, lost surface, etc.)
    BackendError(String),

    /// Out of host or device memory
    OutOfMemory,

    /// Allocation rejected for a reason other than exhaustion
    AllocationFailed(String),

    /// The logical device was lost; fatal for every object created from it
    DeviceLost,

    /// Invalid resource description or handle
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain)
    InitializationFailed(String),

    /// A wait on a fence did not complete within its timeout
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::AllocationFailed(msg) => write!(f, "Allocation failed: {}", msg),
            Error::DeviceLost => write!(f, "Device lost"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Timeout => write!(f, "Wait timed out"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
