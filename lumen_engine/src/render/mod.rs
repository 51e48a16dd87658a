/// Backend-agnostic rendering types

pub mod backend;
pub mod config;
pub mod descriptor_allocator;
pub mod frame;
pub mod swapchain;
pub mod window;

pub use backend::RenderBackend;
pub use config::{Config, DebugSeverity, DeviceFeatures};
pub use descriptor_allocator::{
    DescriptorAllocator, DescriptorPoolDevice, DescriptorType, PoolAllocError, PoolSizeRatio,
    MAX_SETS_PER_POOL,
};
pub use frame::{AcquireAction, FrameCounter, FramePacer, PrepareAction, MAX_FRAMES_IN_FLIGHT};
pub use swapchain::SwapchainStatus;
pub use window::WindowSurface;
