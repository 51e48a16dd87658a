//! Unit tests for the descriptor pool allocator, driven by a mock pool device.

use super::*;
use std::cell::RefCell;
use std::collections::HashMap;

// ============================================================================
// Mock pool device
// ============================================================================

#[derive(Debug)]
struct MockPool {
    max_sets: u32,
    sizes: HashMap<DescriptorType, u32>,
    used_sets: u32,
    used: HashMap<DescriptorType, u32>,
}

/// Descriptors one set consumes
struct MockLayout(Vec<(DescriptorType, u32)>);

#[derive(Default)]
struct MockPoolDevice {
    next_id: RefCell<u32>,
    pools: RefCell<HashMap<u32, MockPool>>,
    created: RefCell<Vec<u32>>,
    resets: RefCell<u32>,
    fail_fatally: RefCell<bool>,
    failing_reset: RefCell<Option<u32>>,
}

impl MockPoolDevice {
    fn live_pools(&self) -> usize {
        self.pools.borrow().len()
    }

    fn created_sizes(&self) -> Vec<u32> {
        self.created.borrow().clone()
    }
}

impl DescriptorPoolDevice for MockPoolDevice {
    type Pool = u32;
    type Layout = MockLayout;
    type Set = (u32, u32);

    fn create_pool(&self, max_sets: u32, sizes: &[(DescriptorType, u32)]) -> Result<u32> {
        let mut next = self.next_id.borrow_mut();
        let id = *next;
        *next += 1;
        self.pools.borrow_mut().insert(id, MockPool {
            max_sets,
            sizes: sizes.iter().copied().collect(),
            used_sets: 0,
            used: HashMap::new(),
        });
        self.created.borrow_mut().push(max_sets);
        Ok(id)
    }

    fn reset_pool(&self, pool: u32) -> Result<()> {
        if *self.failing_reset.borrow() == Some(pool) {
            return Err(Error::vulkan_call("vkResetDescriptorPool", "ERROR_DEVICE_LOST"));
        }
        let mut pools = self.pools.borrow_mut();
        let pool = pools.get_mut(&pool).expect("reset of a destroyed pool");
        pool.used_sets = 0;
        pool.used.clear();
        *self.resets.borrow_mut() += 1;
        Ok(())
    }

    fn destroy_pool(&self, pool: u32) {
        assert!(self.pools.borrow_mut().remove(&pool).is_some(), "double destroy of pool {}", pool);
    }

    fn allocate_set(
        &self,
        pool: u32,
        layout: &MockLayout,
    ) -> std::result::Result<(u32, u32), PoolAllocError> {
        if *self.fail_fatally.borrow() {
            return Err(PoolAllocError::Fatal(Error::vulkan_call(
                "vkAllocateDescriptorSets",
                "ERROR_DEVICE_LOST",
            )));
        }

        let mut pools = self.pools.borrow_mut();
        let pool_state = pools.get_mut(&pool).expect("allocation from a destroyed pool");

        if pool_state.used_sets >= pool_state.max_sets {
            return Err(PoolAllocError::PoolExhausted);
        }
        for (ty, count) in &layout.0 {
            let capacity = pool_state.sizes.get(ty).copied().unwrap_or(0);
            let used = pool_state.used.get(ty).copied().unwrap_or(0);
            if used + count > capacity {
                return Err(PoolAllocError::PoolExhausted);
            }
        }

        for (ty, count) in &layout.0 {
            *pool_state.used.entry(*ty).or_insert(0) += count;
        }
        pool_state.used_sets += 1;
        Ok((pool, pool_state.used_sets))
    }
}

fn ubo_ratios() -> Vec<PoolSizeRatio> {
    vec![
        PoolSizeRatio::new(DescriptorType::UniformBuffer, 1.0),
        PoolSizeRatio::new(DescriptorType::CombinedImageSampler, 2.0),
    ]
}

fn ubo_layout() -> MockLayout {
    MockLayout(vec![(DescriptorType::UniformBuffer, 1)])
}

// ============================================================================
// Sizing helpers
// ============================================================================

#[test]
fn test_pool_sizes_scale_with_ratio() {
    let sizes = pool_sizes(10, &ubo_ratios());
    assert_eq!(sizes, vec![
        (DescriptorType::UniformBuffer, 10),
        (DescriptorType::CombinedImageSampler, 20),
    ]);
}

#[test]
fn test_pool_sizes_never_zero() {
    let sizes = pool_sizes(1, &[PoolSizeRatio::new(DescriptorType::StorageImage, 0.25)]);
    assert_eq!(sizes, vec![(DescriptorType::StorageImage, 1)]);
}

#[test]
fn test_growth_is_geometric_and_capped() {
    assert_eq!(grown_set_count(10), 15);
    assert_eq!(grown_set_count(15), 22);
    assert_eq!(grown_set_count(4000), MAX_SETS_PER_POOL);
    assert_eq!(grown_set_count(MAX_SETS_PER_POOL), MAX_SETS_PER_POOL);
}

#[test]
fn test_growth_from_tiny_pools_always_increases() {
    assert_eq!(grown_set_count(1), 2);
    assert_eq!(grown_set_count(2), 3);
    assert_eq!(grown_set_count(3), 4);

    let mut sets = 1;
    for _ in 0..40 {
        let next = grown_set_count(sets);
        assert!(next > sets || next == MAX_SETS_PER_POOL);
        sets = next;
    }
    assert_eq!(sets, MAX_SETS_PER_POOL);
}

#[test]
fn test_growth_saturates_for_huge_counts() {
    assert_eq!(grown_set_count(u32::MAX), MAX_SETS_PER_POOL);
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_one_ready_pool() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();

    allocator.init(&device, 10, &ubo_ratios()).unwrap();

    assert_eq!(allocator.ready_count(), 1);
    assert_eq!(allocator.full_count(), 0);
    assert_eq!(allocator.next_sets_per_pool(), 15);
    assert_eq!(device.created_sizes(), vec![10]);
}

#[test]
fn test_init_rejects_zero_sets() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();

    let result = allocator.init(&device, 0, &ubo_ratios());

    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert_eq!(device.live_pools(), 0);
}

#[test]
fn test_allocate_before_init_fails() {
    let device = MockPoolDevice::default();
    let mut allocator: DescriptorAllocator<u32> = DescriptorAllocator::default();

    assert!(allocator.allocate(&device, &ubo_layout()).is_err());
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn test_initial_capacity_never_triggers_growth() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 10, &ubo_ratios()).unwrap();

    // ratio 1.0 for uniform buffers: 10 sets fit in the first pool
    for _ in 0..10 {
        let (pool, _) = allocator.allocate(&device, &ubo_layout()).unwrap();
        assert_eq!(pool, 0);
    }

    assert_eq!(device.live_pools(), 1);
    assert_eq!(allocator.full_count(), 0);
}

#[test]
fn test_exhausted_pool_moves_to_full_and_retry_succeeds() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 2, &ubo_ratios()).unwrap();

    allocator.allocate(&device, &ubo_layout()).unwrap();
    allocator.allocate(&device, &ubo_layout()).unwrap();
    let (pool, _) = allocator.allocate(&device, &ubo_layout()).unwrap();

    assert_eq!(pool, 1);
    assert_eq!(allocator.full_count(), 1);
    assert_eq!(allocator.ready_count(), 1);
    assert_eq!(device.created_sizes(), vec![2, 3]);
}

#[test]
fn test_pools_grow_until_cap() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 2000, &ubo_ratios()).unwrap();

    for _ in 0..(2000 + 3000 + 1) {
        allocator.allocate(&device, &ubo_layout()).unwrap();
    }

    assert_eq!(device.created_sizes(), vec![2000, 3000, MAX_SETS_PER_POOL]);
    assert_eq!(allocator.next_sets_per_pool(), MAX_SETS_PER_POOL);
}

#[test]
fn test_second_failure_is_fatal() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 4, &ubo_ratios()).unwrap();

    // 100 uniform buffers never fit: both the first and the fresh pool fail
    let huge = MockLayout(vec![(DescriptorType::UniformBuffer, 100)]);
    let result = allocator.allocate(&device, &huge);

    assert_eq!(result, Err(Error::DescriptorPoolExhausted));
    assert_eq!(allocator.full_count(), 2);
    assert_eq!(allocator.pool_count(), device.live_pools());
}

#[test]
fn test_fatal_driver_error_propagates_and_keeps_pool() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 4, &ubo_ratios()).unwrap();
    *device.fail_fatally.borrow_mut() = true;

    let result = allocator.allocate(&device, &ubo_layout());

    assert!(matches!(result, Err(Error::VulkanCall { .. })));
    assert_eq!(allocator.ready_count(), 1);
    assert_eq!(device.live_pools(), 1);
}

// ============================================================================
// Clear / destroy
// ============================================================================

#[test]
fn test_clear_pools_resets_all_and_merges_full() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 1, &ubo_ratios()).unwrap();
    for _ in 0..4 {
        allocator.allocate(&device, &ubo_layout()).unwrap();
    }
    let live = allocator.pool_count();
    assert!(allocator.full_count() > 0);

    allocator.clear_pools(&device).unwrap();

    assert_eq!(allocator.full_count(), 0);
    assert_eq!(allocator.ready_count(), live);
    assert_eq!(*device.resets.borrow() as usize, live);
    assert_eq!(device.live_pools(), live);
}

#[test]
fn test_clear_pools_makes_capacity_reusable() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 3, &ubo_ratios()).unwrap();
    for _ in 0..3 {
        allocator.allocate(&device, &ubo_layout()).unwrap();
    }

    allocator.clear_pools(&device).unwrap();
    for _ in 0..3 {
        allocator.allocate(&device, &ubo_layout()).unwrap();
    }

    assert_eq!(device.created_sizes().len(), 1);
}

#[test]
fn test_destroy_leaves_zero_live_pools() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 2, &ubo_ratios()).unwrap();

    for round in 0..3 {
        for _ in 0..(5 + round) {
            allocator.allocate(&device, &ubo_layout()).unwrap();
        }
        if round % 2 == 0 {
            allocator.clear_pools(&device).unwrap();
        }
    }
    assert!(device.live_pools() > 1);

    allocator.destroy_pools(&device);

    assert_eq!(device.live_pools(), 0);
    assert_eq!(allocator.pool_count(), 0);
}

#[test]
fn test_failed_reset_keeps_every_pool_destroyable() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 2, &ubo_ratios()).unwrap();
    for _ in 0..12 {
        allocator.allocate(&device, &ubo_layout()).unwrap();
    }
    let tracked = allocator.pool_count();
    assert!(allocator.full_count() > 1);
    assert_eq!(tracked, device.live_pools());

    // pool 0 is the first full pool
    *device.failing_reset.borrow_mut() = Some(0);
    assert!(allocator.clear_pools(&device).is_err());
    assert_eq!(allocator.pool_count(), tracked);

    allocator.destroy_pools(&device);

    assert_eq!(allocator.pool_count(), 0);
    assert_eq!(device.live_pools(), 0);
}

#[test]
fn test_destroy_twice_is_harmless() {
    let device = MockPoolDevice::default();
    let mut allocator = DescriptorAllocator::new();
    allocator.init(&device, 2, &ubo_ratios()).unwrap();

    allocator.destroy_pools(&device);
    allocator.destroy_pools(&device);

    assert_eq!(device.live_pools(), 0);
}
