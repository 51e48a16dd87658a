//! Growable descriptor pool allocator
//!
//! Callers ask for descriptor sets and never see pool handles. Pools live in two
//! disjoint lists: `ready` (still has room) and `full` (an allocation from it failed).
//! When no ready pool exists a new one is created, each new pool holding 1.5x the
//! sets of the previous one up to [`MAX_SETS_PER_POOL`]. `clear_pools` resets every
//! pool and moves them all back to `ready` without destroying anything.
//!
//! The policy is backend-agnostic; the driver side is a [`DescriptorPoolDevice`].

use crate::error::{Error, Result};
use crate::{engine_debug, engine_error};

/// Hard cap on the number of sets a single pool is created with
pub const MAX_SETS_PER_POOL: u32 = 4092;

/// Descriptor kinds a pool reserves space for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

/// Average number of descriptors of one type per allocated set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio {
    pub descriptor_type: DescriptorType,
    pub ratio: f32,
}

impl PoolSizeRatio {
    pub fn new(descriptor_type: DescriptorType, ratio: f32) -> Self {
        Self { descriptor_type, ratio }
    }
}

/// Per-type descriptor counts for a pool holding `set_count` sets
pub fn pool_sizes(set_count: u32, ratios: &[PoolSizeRatio]) -> Vec<(DescriptorType, u32)> {
    ratios
        .iter()
        .map(|r| (r.descriptor_type, ((r.ratio * set_count as f32) as u32).max(1)))
        .collect()
}

/// Set count for the pool created after one of `current` sets
///
/// Grows by 1.5x and by at least one set, capped at [`MAX_SETS_PER_POOL`].
pub fn grown_set_count(current: u32) -> u32 {
    (current.saturating_mul(3) / 2)
        .max(current.saturating_add(1))
        .min(MAX_SETS_PER_POOL)
}

/// Outcome of a failed set allocation, as classified by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum PoolAllocError {
    /// The pool ran out of memory or is too fragmented; another pool may succeed
    PoolExhausted,
    /// Any other driver failure
    Fatal(Error),
}

/// Driver operations the allocator needs
pub trait DescriptorPoolDevice {
    type Pool: Copy;
    type Layout;
    type Set;

    fn create_pool(&self, max_sets: u32, sizes: &[(DescriptorType, u32)]) -> Result<Self::Pool>;

    /// Return every set of the pool to it
    fn reset_pool(&self, pool: Self::Pool) -> Result<()>;

    fn destroy_pool(&self, pool: Self::Pool);

    fn allocate_set(
        &self,
        pool: Self::Pool,
        layout: &Self::Layout,
    ) -> std::result::Result<Self::Set, PoolAllocError>;
}

/// Descriptor allocator over pools of type `P`
pub struct DescriptorAllocator<P> {
    ratios: Vec<PoolSizeRatio>,
    ready: Vec<P>,
    full: Vec<P>,
    sets_per_pool: u32,
}

impl<P: Copy> DescriptorAllocator<P> {
    /// An allocator with no pools; call [`init`](Self::init) before allocating
    pub fn new() -> Self {
        Self {
            ratios: Vec::new(),
            ready: Vec::new(),
            full: Vec::new(),
            sets_per_pool: 0,
        }
    }

    /// Create the first pool, sized for `initial_sets` sets
    pub fn init<D>(&mut self, device: &D, initial_sets: u32, ratios: &[PoolSizeRatio]) -> Result<()>
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        if initial_sets == 0 {
            return Err(Error::InvalidResource(
                "descriptor allocator needs at least one set per pool".to_string(),
            ));
        }

        self.ratios = ratios.to_vec();
        let pool = device.create_pool(initial_sets, &pool_sizes(initial_sets, ratios))?;
        self.sets_per_pool = grown_set_count(initial_sets);
        self.ready.push(pool);

        engine_debug!("lumen::DescriptorAllocator",
            "Initialized with {} sets, next pool holds {}", initial_sets, self.sets_per_pool);
        Ok(())
    }

    /// Allocate one set, growing the pool list when needed
    ///
    /// An exhausted pool is moved to the full list and the allocation is retried
    /// once on a freshly created pool. A second failure is fatal.
    pub fn allocate<D>(&mut self, device: &D, layout: &D::Layout) -> Result<D::Set>
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        let pool = self.get_pool(device)?;

        match device.allocate_set(pool, layout) {
            Ok(set) => {
                self.ready.push(pool);
                Ok(set)
            }
            Err(PoolAllocError::Fatal(e)) => {
                self.ready.push(pool);
                Err(e)
            }
            Err(PoolAllocError::PoolExhausted) => {
                self.full.push(pool);

                let fresh = self.create_pool(device)?;
                match device.allocate_set(fresh, layout) {
                    Ok(set) => {
                        self.ready.push(fresh);
                        Ok(set)
                    }
                    Err(PoolAllocError::Fatal(e)) => {
                        self.ready.push(fresh);
                        Err(e)
                    }
                    Err(PoolAllocError::PoolExhausted) => {
                        self.full.push(fresh);
                        engine_error!("lumen::DescriptorAllocator",
                            "Allocation failed on a fresh pool ({} pools live)", self.pool_count());
                        Err(Error::DescriptorPoolExhausted)
                    }
                }
            }
        }
    }

    /// Reset every pool and make them all available again
    ///
    /// On a reset failure every pool stays owned by the allocator, so
    /// [`destroy_pools`](Self::destroy_pools) still reaches all of them.
    pub fn clear_pools<D>(&mut self, device: &D) -> Result<()>
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        for &pool in self.ready.iter().chain(self.full.iter()) {
            device.reset_pool(pool)?;
        }
        self.ready.append(&mut self.full);
        Ok(())
    }

    /// Destroy every pool; the allocator holds no pools afterwards
    pub fn destroy_pools<D>(&mut self, device: &D)
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        for pool in self.ready.drain(..).chain(self.full.drain(..)) {
            device.destroy_pool(pool);
        }
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn full_count(&self) -> usize {
        self.full.len()
    }

    /// Live pool handles owned by the allocator
    pub fn pool_count(&self) -> usize {
        self.ready.len() + self.full.len()
    }

    /// Set count the next created pool will have
    pub fn next_sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    fn get_pool<D>(&mut self, device: &D) -> Result<P>
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        match self.ready.pop() {
            Some(pool) => Ok(pool),
            None => self.create_pool(device),
        }
    }

    fn create_pool<D>(&mut self, device: &D) -> Result<P>
    where
        D: DescriptorPoolDevice<Pool = P>,
    {
        if self.sets_per_pool == 0 {
            return Err(Error::InvalidResource(
                "descriptor allocator used before init".to_string(),
            ));
        }

        let set_count = self.sets_per_pool;
        let pool = device.create_pool(set_count, &pool_sizes(set_count, &self.ratios))?;
        self.sets_per_pool = grown_set_count(set_count);

        engine_debug!("lumen::DescriptorAllocator",
            "Created descriptor pool with {} sets ({} pools live)", set_count, self.pool_count() + 1);
        Ok(pool)
    }
}

impl<P: Copy> Default for DescriptorAllocator<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "descriptor_allocator_tests.rs"]
mod tests;
