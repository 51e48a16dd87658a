/*!
# Lumen Engine - Vulkan Backend

Vulkan implementation of the Lumen device, swapchain and resource lifecycle layer.

Built on `ash` for the Vulkan bindings, `ash-window` for surface creation and
`gpu-allocator` for device memory. Validation layer support is compiled in only
with the `vulkan-validation` feature.

```no_run
use lumen_engine::lumen::render::Config;
use lumen_engine_renderer_vulkan::lumen::Context;
# fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
let mut context = Context::new(window, Config::default())?;
if let Some(frame) = context.prepare_frame()? {
    // record into frame.command_buffer
    context.submit_frame(&frame)?;
}
# Ok(())
# }
```
*/

// Vulkan implementation modules
mod vulkan_error;
mod vulkan_instance;
mod vulkan_device;
mod vulkan_swapchain;
mod vulkan_descriptor;
mod vulkan_sync;
mod vulkan_context;

#[cfg(feature = "vulkan-validation")]
mod debug;

// Main lumen namespace module
pub mod lumen {
    pub use crate::vulkan_context::{Context, FrameTarget};
    pub use crate::vulkan_descriptor::{
        descriptor_type_to_vk, DescriptorLayoutBuilder, DescriptorLayoutCache, COMPUTE_LAYOUTS,
        MESH_LAYOUTS, UNLIT_LAYOUTS,
    };
    pub use crate::vulkan_device::{
        AllocatedBuffer, AllocatedImage, Device, ImageDesc, PhysicalDeviceInfo, QueueFamilyIndices,
        DEPTH_FORMAT_CANDIDATES,
    };
    pub use crate::vulkan_instance::{Instance, Surface, VALIDATION_LAYER};
    pub use crate::vulkan_swapchain::{
        choose_extent, choose_image_count, choose_present_mode, choose_sharing_mode,
        choose_surface_format, plan_swapchain, Swapchain, SwapchainPlan, SwapchainSupportDetails,
    };
    pub use crate::vulkan_sync::{FrameCommands, FrameSync, FrameSyncObjects};

    // Validation statistics (feature-gated)
    #[cfg(feature = "vulkan-validation")]
    pub use crate::debug::{get_validation_stats, print_validation_stats_report, ValidationStats};

    // Memory locations for Device::create_buffer
    pub use gpu_allocator::MemoryLocation;
}
