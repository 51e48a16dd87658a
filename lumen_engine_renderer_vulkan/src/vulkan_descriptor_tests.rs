use super::*;
use ash::vk::Handle;

fn layout(raw: u64) -> vk::DescriptorSetLayout {
    vk::DescriptorSetLayout::from_raw(raw)
}

#[test]
fn test_descriptor_type_mapping() {
    assert_eq!(descriptor_type_to_vk(DescriptorType::UniformBuffer), vk::DescriptorType::UNIFORM_BUFFER);
    assert_eq!(
        descriptor_type_to_vk(DescriptorType::CombinedImageSampler),
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
    );
    assert_eq!(descriptor_type_to_vk(DescriptorType::StorageImage), vk::DescriptorType::STORAGE_IMAGE);
}

#[test]
fn test_pool_memory_errors_allow_retry() {
    assert_eq!(classify_allocation_failure(vk::Result::ERROR_OUT_OF_POOL_MEMORY), PoolAllocError::PoolExhausted);
    assert_eq!(classify_allocation_failure(vk::Result::ERROR_FRAGMENTED_POOL), PoolAllocError::PoolExhausted);
}

#[test]
fn test_other_allocation_errors_are_fatal() {
    assert!(matches!(
        classify_allocation_failure(vk::Result::ERROR_DEVICE_LOST),
        PoolAllocError::Fatal(Error::VulkanCall { .. })
    ));
    assert_eq!(
        classify_allocation_failure(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
        PoolAllocError::Fatal(Error::OutOfMemory)
    );
}

// ============================================================================
// Layout builder
// ============================================================================

#[test]
fn test_builder_records_bindings_in_order() {
    let builder = DescriptorLayoutBuilder::new()
        .add_binding(0, DescriptorType::UniformBuffer, 1, vk::ShaderStageFlags::VERTEX)
        .add_binding(1, DescriptorType::CombinedImageSampler, 4, vk::ShaderStageFlags::FRAGMENT);

    let bindings = builder.bindings();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[1].binding, 1);
    assert_eq!(bindings[1].descriptor_count, 4);
    assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    assert!(builder.validate().is_ok());
}

#[test]
fn test_builder_rejects_duplicate_binding() {
    let builder = DescriptorLayoutBuilder::new()
        .add_binding(2, DescriptorType::UniformBuffer, 1, vk::ShaderStageFlags::VERTEX)
        .add_binding(2, DescriptorType::StorageBuffer, 1, vk::ShaderStageFlags::VERTEX);

    assert!(matches!(builder.validate(), Err(Error::InvalidResource(_))));
}

#[test]
fn test_builder_rejects_empty_binding() {
    let builder = DescriptorLayoutBuilder::new()
        .add_binding(0, DescriptorType::Sampler, 0, vk::ShaderStageFlags::FRAGMENT);

    assert!(builder.validate().is_err());
}

// ============================================================================
// Layout cache
// ============================================================================

#[test]
fn test_cache_lookup_by_name() {
    let mut cache = DescriptorLayoutCache::new();
    let frame = cache.adopt(layout(1));
    let material = cache.adopt(layout(2));
    cache.insert(MESH_LAYOUTS, vec![frame, material]);
    cache.insert(UNLIT_LAYOUTS, vec![frame]);

    assert_eq!(cache.get(MESH_LAYOUTS), Some(&[frame, material][..]));
    assert_eq!(cache.get(UNLIT_LAYOUTS), Some(&[frame][..]));
    assert_eq!(cache.get("missing"), None);

    let mut names: Vec<&str> = cache.names().collect();
    names.sort_unstable();
    assert_eq!(names, vec![MESH_LAYOUTS, UNLIT_LAYOUTS]);
}

#[test]
fn test_shared_layout_is_owned_once() {
    let mut cache = DescriptorLayoutCache::new();
    cache.adopt(layout(7));
    cache.adopt(layout(7));
    cache.adopt(layout(8));

    assert_eq!(cache.owned_count(), 2);
}
