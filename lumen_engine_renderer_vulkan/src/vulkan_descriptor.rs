/// Descriptor pools, set layouts and the named layout cache

use ash::vk;
use lumen_engine::lumen::render::{DescriptorPoolDevice, DescriptorType, PoolAllocError};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::engine_debug;
use rustc_hash::FxHashMap;

use crate::vulkan_device::Device;
use crate::vulkan_error::{driver_error, vk_check};

/// Vulkan descriptor type for an engine descriptor type
pub fn descriptor_type_to_vk(descriptor_type: DescriptorType) -> vk::DescriptorType {
    match descriptor_type {
        DescriptorType::Sampler => vk::DescriptorType::SAMPLER,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::StorageBufferDynamic => vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

/// Split set allocation failures into "try another pool" and fatal
pub fn classify_allocation_failure(code: vk::Result) -> PoolAllocError {
    match code {
        vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => PoolAllocError::PoolExhausted,
        other => PoolAllocError::Fatal(driver_error("vkAllocateDescriptorSets", other)),
    }
}

impl DescriptorPoolDevice for Device {
    type Pool = vk::DescriptorPool;
    type Layout = vk::DescriptorSetLayout;
    type Set = vk::DescriptorSet;

    fn create_pool(&self, max_sets: u32, sizes: &[(DescriptorType, u32)]) -> Result<vk::DescriptorPool> {
        self.ensure_alive("create_descriptor_pool")?;
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .map(|&(ty, descriptor_count)| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(ty),
                descriptor_count,
            })
            .collect();

        let info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        unsafe { vk_check!("vkCreateDescriptorPool", self.raw().create_descriptor_pool(&info, None)) }
    }

    fn reset_pool(&self, pool: vk::DescriptorPool) -> Result<()> {
        self.ensure_alive("reset_descriptor_pool")?;
        unsafe {
            vk_check!(
                "vkResetDescriptorPool",
                self.raw().reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
            )
        }
    }

    fn destroy_pool(&self, pool: vk::DescriptorPool) {
        if self.is_released() {
            return;
        }
        unsafe { self.raw().destroy_descriptor_pool(pool, None) };
    }

    fn allocate_set(
        &self,
        pool: vk::DescriptorPool,
        layout: &vk::DescriptorSetLayout,
    ) -> std::result::Result<vk::DescriptorSet, PoolAllocError> {
        self.ensure_alive("allocate_descriptor_set").map_err(PoolAllocError::Fatal)?;
        let layouts = [*layout];
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        match unsafe { self.raw().allocate_descriptor_sets(&info) } {
            Ok(sets) => sets
                .into_iter()
                .next()
                .ok_or_else(|| PoolAllocError::Fatal(Error::BackendError("driver returned no descriptor set".to_string()))),
            Err(code) => Err(classify_allocation_failure(code)),
        }
    }
}

/// Accumulates bindings for one descriptor set layout
#[derive(Default)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding of `count` descriptors visible to `stages`
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: DescriptorType,
        count: u32,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type_to_vk(descriptor_type))
                .descriptor_count(count)
                .stage_flags(stages),
        );
        self
    }

    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    /// Check binding numbers are unique and counts non-zero
    pub fn validate(&self) -> Result<()> {
        for (i, binding) in self.bindings.iter().enumerate() {
            if binding.descriptor_count == 0 {
                return Err(Error::InvalidResource(format!("binding {} has zero descriptors", binding.binding)));
            }
            if self.bindings[..i].iter().any(|b| b.binding == binding.binding) {
                return Err(Error::InvalidResource(format!("binding {} declared twice", binding.binding)));
            }
        }
        Ok(())
    }

    pub fn build(&self, device: &ash::Device) -> Result<vk::DescriptorSetLayout> {
        self.validate()?;
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);
        unsafe { vk_check!("vkCreateDescriptorSetLayout", device.create_descriptor_set_layout(&info, None)) }
    }
}

/// Pipeline kinds with built-in layouts
pub const MESH_LAYOUTS: &str = "mesh";
pub const UNLIT_LAYOUTS: &str = "unlit";
pub const COMPUTE_LAYOUTS: &str = "compute";

/// Descriptor set layouts grouped under a pipeline name
///
/// Owns every set layout it hands out; one layout may appear under several names.
#[derive(Default)]
pub struct DescriptorLayoutCache {
    owned: Vec<vk::DescriptorSetLayout>,
    by_name: FxHashMap<String, Vec<vk::DescriptorSetLayout>>,
}

impl DescriptorLayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in layouts
    ///
    /// - set "frame": camera uniforms (binding 0) and per-object storage (binding 1)
    /// - set "material": material uniforms (binding 0) and base color, normal and
    ///   metallic-roughness textures (bindings 1..=3)
    /// - set "compute": one storage image (binding 0) and one storage buffer (binding 1)
    pub fn with_defaults(device: &ash::Device) -> Result<Self> {
        let mut cache = Self::new();
        let result = cache.build_defaults(device);
        if let Err(e) = result {
            cache.destroy(device);
            return Err(e);
        }
        Ok(cache)
    }

    fn build_defaults(&mut self, device: &ash::Device) -> Result<()> {
        let graphics = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;

        let frame = self.adopt(
            DescriptorLayoutBuilder::new()
                .add_binding(0, DescriptorType::UniformBuffer, 1, graphics)
                .add_binding(1, DescriptorType::StorageBuffer, 1, vk::ShaderStageFlags::VERTEX)
                .build(device)?,
        );
        let material = self.adopt(
            DescriptorLayoutBuilder::new()
                .add_binding(0, DescriptorType::UniformBuffer, 1, vk::ShaderStageFlags::FRAGMENT)
                .add_binding(1, DescriptorType::CombinedImageSampler, 1, vk::ShaderStageFlags::FRAGMENT)
                .add_binding(2, DescriptorType::CombinedImageSampler, 1, vk::ShaderStageFlags::FRAGMENT)
                .add_binding(3, DescriptorType::CombinedImageSampler, 1, vk::ShaderStageFlags::FRAGMENT)
                .build(device)?,
        );
        let compute = self.adopt(
            DescriptorLayoutBuilder::new()
                .add_binding(0, DescriptorType::StorageImage, 1, vk::ShaderStageFlags::COMPUTE)
                .add_binding(1, DescriptorType::StorageBuffer, 1, vk::ShaderStageFlags::COMPUTE)
                .build(device)?,
        );

        self.insert(MESH_LAYOUTS, vec![frame, material]);
        self.insert(UNLIT_LAYOUTS, vec![frame]);
        self.insert(COMPUTE_LAYOUTS, vec![compute]);

        engine_debug!("lumen::vulkan", "Created {} default descriptor set layouts", self.owned.len());
        Ok(())
    }

    /// Take ownership of a layout so `destroy` releases it
    pub fn adopt(&mut self, layout: vk::DescriptorSetLayout) -> vk::DescriptorSetLayout {
        if !self.owned.contains(&layout) {
            self.owned.push(layout);
        }
        layout
    }

    /// Register `layouts` under `name`, replacing any previous entry
    pub fn insert(&mut self, name: &str, layouts: Vec<vk::DescriptorSetLayout>) {
        self.by_name.insert(name.to_string(), layouts);
    }

    pub fn get(&self, name: &str) -> Option<&[vk::DescriptorSetLayout]> {
        self.by_name.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }

    /// Destroy every owned layout exactly once
    pub fn destroy(&mut self, device: &ash::Device) {
        self.by_name.clear();
        for layout in self.owned.drain(..) {
            unsafe { device.destroy_descriptor_set_layout(layout, None) };
        }
    }
}

#[cfg(test)]
#[path = "vulkan_descriptor_tests.rs"]
mod tests;
