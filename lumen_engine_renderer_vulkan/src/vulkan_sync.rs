/// Per-frame synchronization primitives and command buffers

use ash::vk;
use lumen_engine::lumen::render::MAX_FRAMES_IN_FLIGHT;
use lumen_engine::lumen::{Error, Result};

use crate::vulkan_error::vk_check;

/// Handles used by one frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSyncObjects {
    /// Signalled when the frame's GPU work completes; created signalled
    pub render_fence: vk::Fence,
    /// Signalled by acquire, waited on by submission
    pub image_available: vk::Semaphore,
}

/// Fences and acquire semaphores for every frame in flight
///
/// Render-finished semaphores belong to the swapchain images instead.
pub struct FrameSync {
    frames: Vec<FrameSyncObjects>,
}

impl FrameSync {
    /// No frames; placeholder until [`FrameSync::new`] succeeds
    pub fn empty() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn new(device: &ash::Device) -> Result<Self> {
        let mut sync = Self { frames: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT) };

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            match Self::create_frame(device) {
                Ok(frame) => sync.frames.push(frame),
                Err(e) => {
                    sync.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(sync)
    }

    fn create_frame(device: &ash::Device) -> Result<FrameSyncObjects> {
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let semaphore_info = vk::SemaphoreCreateInfo::default();

        unsafe {
            let render_fence = vk_check!("vkCreateFence", device.create_fence(&fence_info, None))?;
            let image_available = match vk_check!("vkCreateSemaphore", device.create_semaphore(&semaphore_info, None)) {
                Ok(semaphore) => semaphore,
                Err(e) => {
                    device.destroy_fence(render_fence, None);
                    return Err(e);
                }
            };

            Ok(FrameSyncObjects { render_fence, image_available })
        }
    }

    /// Block until frame slot `index` has finished its previous GPU work
    pub fn wait(&self, device: &ash::Device, index: usize) -> Result<()> {
        let frame = self.frame(index)?;
        unsafe { vk_check!("vkWaitForFences", device.wait_for_fences(&[frame.render_fence], true, u64::MAX)) }
    }

    /// Objects for frame slot `index`
    pub fn frame(&self, index: usize) -> Result<FrameSyncObjects> {
        self.frames
            .get(index)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("frame slot {} out of range", index)))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        for frame in self.frames.drain(..) {
            unsafe {
                device.destroy_semaphore(frame.image_available, None);
                device.destroy_fence(frame.render_fence, None);
            }
        }
    }
}

/// Command pool with one primary command buffer per frame in flight
pub struct FrameCommands {
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl FrameCommands {
    pub fn empty() -> Self {
        Self { pool: vk::CommandPool::null(), buffers: Vec::new() }
    }

    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        unsafe {
            let pool = vk_check!("vkCreateCommandPool", device.create_command_pool(&pool_info, None))?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);

            let buffers = match vk_check!("vkAllocateCommandBuffers", device.allocate_command_buffers(&alloc_info)) {
                Ok(buffers) => buffers,
                Err(e) => {
                    device.destroy_command_pool(pool, None);
                    return Err(e);
                }
            };

            Ok(Self { pool, buffers })
        }
    }

    pub fn buffer(&self, frame: usize) -> Result<vk::CommandBuffer> {
        self.buffers
            .get(frame)
            .copied()
            .ok_or_else(|| Error::InvalidResource(format!("no command buffer for frame slot {}", frame)))
    }

    /// Reset the frame's command buffer and start one-time recording
    pub fn begin(&self, device: &ash::Device, frame: usize) -> Result<vk::CommandBuffer> {
        let buffer = self.buffer(frame)?;
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            vk_check!(
                "vkResetCommandBuffer",
                device.reset_command_buffer(buffer, vk::CommandBufferResetFlags::empty())
            )?;
            vk_check!("vkBeginCommandBuffer", device.begin_command_buffer(buffer, &begin_info))?;
        }
        Ok(buffer)
    }

    pub fn end(&self, device: &ash::Device, frame: usize) -> Result<vk::CommandBuffer> {
        let buffer = self.buffer(frame)?;
        unsafe { vk_check!("vkEndCommandBuffer", device.end_command_buffer(buffer))? };
        Ok(buffer)
    }

    /// Free the buffers and the pool; later calls do nothing
    pub fn destroy(&mut self, device: &ash::Device) {
        if self.pool == vk::CommandPool::null() {
            return;
        }
        unsafe {
            if !self.buffers.is_empty() {
                device.free_command_buffers(self.pool, &self.buffers);
            }
            device.destroy_command_pool(self.pool, None);
        }
        self.buffers.clear();
        self.pool = vk::CommandPool::null();
    }
}
