/*!
# Lumen Engine

Backend-agnostic core of the Lumen rendering stack.

This crate holds everything the Vulkan backend builds on that does not need a GPU:
the error type, the logging facade, renderer configuration, the deferred deletion
queue, the descriptor-pool growth policy and the frame lifecycle trait.

## Architecture

- **Engine**: process-wide logging facade
- **DeletionQueue**: LIFO stack of deferred cleanup closures
- **DescriptorAllocator**: growable descriptor pool list, generic over the driver
- **RenderBackend**: begin/end frame, resize, shutdown
- **WindowSurface**: native window handles plus framebuffer size
*/

// Internal modules
mod error;
mod engine;
mod deletion_queue;
pub mod log;
pub mod render;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Logging facade
    pub use crate::engine::Engine;

    pub use crate::deletion_queue::DeletionQueue;

    // Logging sub-module (types only, macros live at the crate root)
    pub mod log {
        pub use crate::log::{format_entry, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Render sub-module with all backend-agnostic rendering types
    pub mod render {
        pub use crate::render::*;
    }
}
