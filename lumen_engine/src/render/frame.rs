/// Frame pacing - frames-in-flight bookkeeping and the resize/recreate decisions
/// shared by backends

use crate::render::swapchain::SwapchainStatus;

/// Number of frames the CPU may record ahead of the GPU
///
/// Each frame in flight owns its own fence, acquire semaphore and command buffer.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Cycles through the frame-in-flight slots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    presented: u64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of the frame being recorded, always below [`MAX_FRAMES_IN_FLIGHT`]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Total frames handed to presentation
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Move to the next slot after a present
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
        self.presented += 1;
    }
}

/// Step taken before acquiring the next image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareAction {
    /// The window has no area; drop the frame
    Skip,
    /// Rebuild the swapchain first
    Recreate,
    /// Acquire with the current swapchain
    Acquire,
}

/// Step taken once an acquire returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireAction {
    /// Record and submit into the acquired image
    Render,
    /// No image was acquired; rebuild the swapchain and drop the frame
    RecreateAndDrop,
}

/// Resize and swapchain-recreation state of a frame loop
///
/// Holds the last framebuffer size reported by the window and whether the
/// swapchain no longer matches it. Recreation is deferred while the window
/// has zero area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacer {
    framebuffer_size: (u32, u32),
    needs_recreate: bool,
}

impl FramePacer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { framebuffer_size: (width, height), needs_recreate: false }
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        self.framebuffer_size
    }

    /// A recreation is pending
    pub fn needs_recreate(&self) -> bool {
        self.needs_recreate
    }

    pub fn is_minimized(&self) -> bool {
        self.framebuffer_size.0 == 0 || self.framebuffer_size.1 == 0
    }

    /// Record a new framebuffer size; an unchanged size requests nothing
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.framebuffer_size {
            self.framebuffer_size = (width, height);
            self.needs_recreate = true;
        }
    }

    /// Ask for a recreation at the next frame boundary (e.g. vsync toggled)
    pub fn request_recreate(&mut self) {
        self.needs_recreate = true;
    }

    pub fn before_acquire(&self) -> PrepareAction {
        if self.is_minimized() {
            PrepareAction::Skip
        } else if self.needs_recreate {
            PrepareAction::Recreate
        } else {
            PrepareAction::Acquire
        }
    }

    /// `Suboptimal` still renders but schedules a recreation after present
    pub fn after_acquire(&mut self, status: SwapchainStatus) -> AcquireAction {
        match status {
            SwapchainStatus::Optimal => AcquireAction::Render,
            SwapchainStatus::Suboptimal => {
                self.needs_recreate = true;
                AcquireAction::Render
            }
            SwapchainStatus::OutOfDate => {
                self.needs_recreate = true;
                AcquireAction::RecreateAndDrop
            }
        }
    }

    /// Whether to recreate right after presenting with `status`
    pub fn after_present(&mut self, status: SwapchainStatus) -> bool {
        if status.needs_recreate() {
            self.needs_recreate = true;
        }
        self.needs_recreate
    }

    /// Size to recreate at, or `None` while the window has zero area
    pub fn recreate_target(&self) -> Option<(u32, u32)> {
        if self.is_minimized() {
            None
        } else {
            Some(self.framebuffer_size)
        }
    }

    /// The swapchain now matches the framebuffer
    pub fn recreated(&mut self) {
        self.needs_recreate = false;
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
