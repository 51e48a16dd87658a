use super::*;
use raw_window_handle::{DisplayHandle, HandleError, WindowHandle};

/// Window stand-in with no native handles
struct FakeWindow {
    size: (u32, u32),
}

impl HasDisplayHandle for FakeWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl HasWindowHandle for FakeWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        Err(HandleError::Unavailable)
    }
}

impl WindowSurface for FakeWindow {
    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }
}

#[test]
fn test_visible_window_is_not_minimized() {
    assert!(!FakeWindow { size: (800, 600) }.is_minimized());
}

#[test]
fn test_zero_dimension_counts_as_minimized() {
    assert!(FakeWindow { size: (0, 600) }.is_minimized());
    assert!(FakeWindow { size: (800, 0) }.is_minimized());
    assert!(FakeWindow { size: (0, 0) }.is_minimized());
}
