//! Error types for the Lumen engine
//!
//! Every fallible operation in the device/swapchain/resource layer returns
//! [`Result`]. Driver codes that are part of normal control flow (an out-of-date
//! or suboptimal swapchain) are NOT errors; they are reported as
//! `SwapchainStatus` values instead.

use std::fmt;

/// Result type for Lumen engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan loader, window handles, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource or argument (texture, buffer, zero-sized swapchain, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, logical device, subsystems)
    InitializationFailed(String),

    /// No enumerated physical device satisfies the requested capabilities
    NoSuitableDevice(String),

    /// A driver call returned a code outside the expected recoverable set
    VulkanCall {
        /// Name of the failing API call (e.g. "vkQueueSubmit")
        call: String,
        /// Driver result code, formatted
        code: String,
    },

    /// Descriptor allocation failed twice in a row, even on a fresh pool
    DescriptorPoolExhausted,
}

impl Error {
    /// Build a [`Error::VulkanCall`] from a call name and any debuggable result code
    pub fn vulkan_call(call: &str, code: impl fmt::Debug) -> Self {
        Error::VulkanCall {
            call: call.to_string(),
            code: format!("{:?}", code),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::NoSuitableDevice(msg) => write!(f, "No suitable GPU: {}", msg),
            Error::VulkanCall { call, code } => write!(f, "{} failed with {}", call, code),
            Error::DescriptorPoolExhausted => {
                write!(f, "Descriptor allocation failed on a freshly created pool")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
