/// Swapchain status - outcome of an acquire or present call

/// Result of acquiring or presenting a swapchain image
///
/// `Suboptimal` and `OutOfDate` are ordinary control flow, not errors: the caller
/// recreates the swapchain and, for `OutOfDate` on acquire, drops the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    /// The image matches the surface exactly
    Optimal,
    /// The image is usable but the surface properties no longer match
    Suboptimal,
    /// The swapchain can no longer present to the surface
    OutOfDate,
}

impl SwapchainStatus {
    /// Whether the swapchain should be recreated before the next frame
    pub fn needs_recreate(self) -> bool {
        !matches!(self, SwapchainStatus::Optimal)
    }

    /// Whether an image index accompanying this status may be rendered to
    pub fn is_renderable(self) -> bool {
        !matches!(self, SwapchainStatus::OutOfDate)
    }
}

#[cfg(test)]
#[path = "swapchain_tests.rs"]
mod tests;
