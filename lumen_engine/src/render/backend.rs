/// RenderBackend trait - the capability set every rendering backend provides

use crate::error::Result;

/// Frame lifecycle of a rendering backend
///
/// Construction is the backend's `init`; everything after that goes through this
/// trait. Only one backend (Vulkan) exists, so the trait stays minimal.
pub trait RenderBackend {
    /// Per-frame recording target handed out by [`begin_frame`](Self::begin_frame)
    type Frame;

    /// Start a frame
    ///
    /// Returns `Ok(None)` when the frame has to be skipped, for example because the
    /// swapchain was out of date and has just been recreated.
    fn begin_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Submit the recorded frame and present it
    fn end_frame(&mut self, frame: Self::Frame) -> Result<()>;

    /// Notify the backend that the window framebuffer changed size
    ///
    /// The swapchain is rebuilt at the next frame boundary, not immediately.
    fn resize(&mut self, width: u32, height: u32);

    /// Block until the GPU has finished all submitted work
    fn wait_idle(&self) -> Result<()>;

    /// Release every GPU object; calling it more than once does nothing
    fn shutdown(&mut self);
}
