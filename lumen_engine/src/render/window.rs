/// Window abstraction consumed by backends for surface creation

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

/// A native window a backend can present to
pub trait WindowSurface: HasDisplayHandle + HasWindowHandle {
    /// Framebuffer size in physical pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// True while the window has no drawable area (minimised)
    fn is_minimized(&self) -> bool {
        let (width, height) = self.framebuffer_size();
        width == 0 || height == 0
    }
}

impl WindowSurface for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod tests;
