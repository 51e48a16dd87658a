/// Driver result handling shared by every Vulkan module

use ash::vk;
use gpu_allocator::AllocationError;
use lumen_engine::engine_error;
use lumen_engine::lumen::Error;

/// Turn a failed `VkResult` into a logged [`Error::VulkanCall`]
///
/// ```ignore
/// let fence = vk_check!("vkCreateFence", device.create_fence(&info, None))?;
/// ```
macro_rules! vk_check {
    ($call:literal, $expr:expr) => {
        $expr.map_err(|code: ash::vk::Result| {
            lumen_engine::engine_error!("lumen::vulkan", "{} failed: {:?}", $call, code);
            $crate::vulkan_error::driver_error($call, code)
        })
    };
}

pub(crate) use vk_check;

/// Map a gpu-allocator failure to the engine error type
pub(crate) fn allocation_error(name: &str, error: AllocationError) -> Error {
    engine_error!("lumen::vulkan", "GPU allocation '{}' failed: {}", name, error);
    match error {
        AllocationError::OutOfMemory => Error::OutOfMemory,
        other => Error::BackendError(format!("allocation '{}' failed: {}", name, other)),
    }
}

/// Whether a driver code means device or host memory ran out
pub(crate) fn is_out_of_memory(code: vk::Result) -> bool {
    code == vk::Result::ERROR_OUT_OF_DEVICE_MEMORY || code == vk::Result::ERROR_OUT_OF_HOST_MEMORY
}

/// Engine error for an unexpected driver code
pub(crate) fn driver_error(call: &str, code: vk::Result) -> Error {
    if is_out_of_memory(code) {
        Error::OutOfMemory
    } else {
        Error::vulkan_call(call, code)
    }
}

#[cfg(test)]
#[path = "vulkan_error_tests.rs"]
mod tests;
