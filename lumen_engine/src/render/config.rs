/// Renderer configuration
///
/// Everything the Vulkan backend needs to know at `Context` creation time.
/// Defaults favour a development build: validation follows `debug_assertions`,
/// vsync is on, and both wireframe and anisotropic sampling are requested.

use bitflags::bitflags;

use crate::render::descriptor_allocator::{DescriptorType, PoolSizeRatio};

bitflags! {
    /// Optional device capabilities that take part in physical device selection
    ///
    /// A device that does not support every requested flag is rejected.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DeviceFeatures: u32 {
        /// Anisotropic texture filtering
        const SAMPLER_ANISOTROPY = 1 << 0;
        /// Non-solid polygon fill (wireframe rendering)
        const FILL_MODE_NON_SOLID = 1 << 1;
    }
}

impl Default for DeviceFeatures {
    fn default() -> Self {
        DeviceFeatures::SAMPLER_ANISOTROPY | DeviceFeatures::FILL_MODE_NON_SOLID
    }
}

/// Which validation-layer messages are forwarded to the engine logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugSeverity {
    ErrorsOnly,
    #[default]
    ErrorsAndWarnings,
    All,
}

/// Backend configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,

    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    /// (only honoured when the backend is built with `vulkan-validation`)
    pub enable_validation: bool,

    pub debug_severity: DebugSeverity,

    /// Force FIFO presentation
    pub vsync: bool,

    /// Capabilities a physical device must support to be selected
    pub device_features: DeviceFeatures,

    /// Extra device extensions (the swapchain extension is always requested)
    pub required_device_extensions: Vec<String>,

    /// Sets in the first descriptor pool
    pub descriptor_pool_initial_sets: u32,

    /// Descriptors per set, per type, for every descriptor pool
    pub descriptor_pool_ratios: Vec<PoolSizeRatio>,
}

impl Config {
    /// Default pool ratios: one uniform buffer, one storage buffer and
    /// two combined image samplers per set on average.
    pub fn default_pool_ratios() -> Vec<PoolSizeRatio> {
        vec![
            PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0),
            PoolSizeRatio::new(DescriptorType::StorageBuffer, 1.0),
            PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 2.0),
            PoolSizeRatio::new(DescriptorType::StorageImage, 0.5),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Lumen Editor".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::default(),
            vsync: true,
            device_features: DeviceFeatures::default(),
            required_device_extensions: Vec::new(),
            descriptor_pool_initial_sets: 1000,
            descriptor_pool_ratios: Self::default_pool_ratios(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
