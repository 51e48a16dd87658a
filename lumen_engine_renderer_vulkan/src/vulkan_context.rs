/// Context - composition root of the Vulkan backend
///
/// Owns the instance, surface, device, swapchain, descriptor pools, per-frame
/// synchronization and the deletion queue, and drives the frame protocol:
///
/// 1. [`Context::prepare_frame`] acquires an image and begins the frame's command buffer
/// 2. the caller records into [`FrameTarget::command_buffer`]
/// 3. [`Context::submit_frame`] submits and presents, recreating the swapchain when needed
///
/// Objects are destroyed in reverse creation order by [`Context::shutdown`], which
/// also runs on drop.

use ash::vk;
use lumen_engine::lumen::render::{
    AcquireAction, Config, DescriptorAllocator, FramePacer, PrepareAction, RenderBackend, SwapchainStatus,
    WindowSurface,
};
use lumen_engine::lumen::{DeletionQueue, Error, Result};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn};

use crate::vulkan_descriptor::DescriptorLayoutCache;
use crate::vulkan_device::Device;
use crate::vulkan_error::vk_check;
use crate::vulkan_instance::{Instance, Surface};
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{FrameCommands, FrameSync};

/// Everything the caller needs to record one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameTarget {
    /// Frame-in-flight slot
    pub frame_index: usize,
    /// Acquired swapchain image index
    pub image_index: u32,
    /// Primary command buffer, already in the recording state
    pub command_buffer: vk::CommandBuffer,
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    /// Acquire status (`Optimal` or `Suboptimal`)
    pub status: SwapchainStatus,
}

/// Vulkan rendering context
pub struct Context {
    deletion_queue: DeletionQueue,
    descriptor_allocator: DescriptorAllocator<vk::DescriptorPool>,
    layouts: DescriptorLayoutCache,
    commands: FrameCommands,
    sync: FrameSync,
    swapchain: Swapchain,
    device: Device,
    surface: Surface,
    instance: Instance,

    config: Config,
    pacer: FramePacer,
    shut_down: bool,
}

impl Context {
    /// Bring up every Vulkan object for `window`
    pub fn new<W: WindowSurface + ?Sized>(window: &W, config: Config) -> Result<Self> {
        let instance = Instance::new(window, &config)?;
        let surface = instance.create_surface(window)?;
        let device = Device::new(&instance, Some(&surface), &config)?;

        let framebuffer_size = window.framebuffer_size();
        let requested = vk::Extent2D { width: framebuffer_size.0, height: framebuffer_size.1 };
        let swapchain = Swapchain::new(&instance, &device, &surface, requested, config.vsync)?;

        let mut context = Self {
            deletion_queue: DeletionQueue::new(),
            descriptor_allocator: DescriptorAllocator::new(),
            layouts: DescriptorLayoutCache::new(),
            commands: FrameCommands::empty(),
            sync: FrameSync::empty(),
            swapchain,
            device,
            surface,
            instance,
            config,
            pacer: FramePacer::new(framebuffer_size.0, framebuffer_size.1),
            shut_down: false,
        };

        // On failure `context` drops here and shutdown releases what exists so far
        context.create_frame_resources()?;

        engine_info!("lumen::vulkan", "Context ready on '{}'", context.device.physical_info().name);
        Ok(context)
    }

    fn create_frame_resources(&mut self) -> Result<()> {
        let graphics_family = self
            .device
            .queue_families()
            .graphics
            .ok_or_else(|| Error::InitializationFailed("device has no graphics queue".to_string()))?;

        self.sync = FrameSync::new(self.device.raw())?;
        self.commands = FrameCommands::new(self.device.raw(), graphics_family)?;
        self.layouts = DescriptorLayoutCache::with_defaults(self.device.raw())?;
        self.descriptor_allocator.init(
            &self.device,
            self.config.descriptor_pool_initial_sets,
            &self.config.descriptor_pool_ratios,
        )
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.shut_down {
            return Err(Error::InvalidResource("context has been shut down".to_string()));
        }
        Ok(())
    }

    /// Acquire the next image and begin recording
    ///
    /// Returns `Ok(None)` when the frame is dropped: the swapchain was out of date
    /// (it has been recreated) or the window currently has no area. A returned
    /// target must be passed to [`submit_frame`](Self::submit_frame), since the
    /// frame's fence has been reset.
    pub fn prepare_frame(&mut self) -> Result<Option<FrameTarget>> {
        self.ensure_alive()?;

        match self.pacer.before_acquire() {
            PrepareAction::Skip => return Ok(None),
            PrepareAction::Recreate => {
                self.recreate_swapchain()?;
                if self.pacer.needs_recreate() {
                    return Ok(None);
                }
            }
            PrepareAction::Acquire => {}
        }

        let frame_index = self.swapchain.current_frame();
        let sync = self.sync.frame(frame_index)?;

        // Recording starts before the acquire resets the fence, so a failure
        // here leaves the slot's fence signalled.
        self.sync.wait(self.device.raw(), frame_index)?;
        let command_buffer = self.commands.begin(self.device.raw(), frame_index)?;

        let (image_index, status) = self
            .swapchain
            .get_next_renderable_image(sync.render_fence, sync.image_available)?;

        if self.pacer.after_acquire(status) == AcquireAction::RecreateAndDrop {
            self.recreate_swapchain()?;
            return Ok(None);
        }

        // The index was checked against the image set before the fence reset
        let (image, image_view) = match (self.swapchain.image(image_index), self.swapchain.image_view(image_index)) {
            (Some(image), Some(view)) => (image, view),
            _ => {
                engine_error!("lumen::vulkan", "Acquired image {} has no view", image_index);
                return Err(Error::InvalidResource(format!("swapchain image {} out of range", image_index)));
            }
        };

        Ok(Some(FrameTarget {
            frame_index,
            image_index,
            command_buffer,
            image,
            image_view,
            extent: self.swapchain.extent(),
            format: self.swapchain.format(),
            status,
        }))
    }

    /// End recording, submit, then present
    pub fn submit_frame(&mut self, target: &FrameTarget) -> Result<()> {
        self.ensure_alive()?;
        self.commands.end(self.device.raw(), target.frame_index)?;
        self.submit_commands(target)?;
        self.present_to_swapchain(target)?;
        Ok(())
    }

    fn render_finished(&self, image_index: u32) -> Result<vk::Semaphore> {
        self.swapchain
            .render_finished_semaphore(image_index)
            .ok_or_else(|| Error::InvalidResource(format!("no render-finished semaphore for image {}", image_index)))
    }

    /// Submit the frame's command buffer on the graphics queue
    ///
    /// Waits for image-available at color attachment output and signals the
    /// acquired image's render-finished semaphore plus the frame's fence.
    pub fn submit_commands(&self, target: &FrameTarget) -> Result<()> {
        let sync = self.sync.frame(target.frame_index)?;

        let wait_semaphores = [sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [target.command_buffer];
        let signal_semaphores = [self.render_finished(target.image_index)?];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            vk_check!(
                "vkQueueSubmit",
                self.device.raw().queue_submit(self.device.graphics_queue(), &[submit_info], sync.render_fence)
            )
        }
    }

    /// Present the frame's image; recreates the swapchain when it is stale or a resize is pending
    pub fn present_to_swapchain(&mut self, target: &FrameTarget) -> Result<SwapchainStatus> {
        let render_finished = self.render_finished(target.image_index)?;
        let status = self.swapchain.present(target.image_index, render_finished)?;

        if self.pacer.after_present(status) {
            self.recreate_swapchain()?;
        }
        Ok(status)
    }

    /// Rebuild the swapchain at the last known framebuffer size
    ///
    /// Skipped while the window has zero area; the request stays pending.
    fn recreate_swapchain(&mut self) -> Result<()> {
        self.pacer.request_recreate();
        let Some((width, height)) = self.pacer.recreate_target() else {
            return Ok(());
        };

        match self.swapchain.recreate(vk::Extent2D { width, height }, self.config.vsync) {
            Ok(()) => {
                self.pacer.recreated();
                Ok(())
            }
            Err(Error::InvalidResource(reason)) => {
                engine_debug!("lumen::vulkan", "Swapchain recreation deferred: {}", reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Record a new framebuffer size; the swapchain follows at the next frame boundary
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.pacer.framebuffer_size() {
            engine_debug!("lumen::vulkan", "Resize to {}x{}", width, height);
        }
        self.pacer.resize(width, height);
    }

    /// Switch presentation between FIFO and low-latency modes
    pub fn set_vsync(&mut self, vsync: bool) {
        if self.config.vsync != vsync {
            self.config.vsync = vsync;
            self.pacer.request_recreate();
        }
    }

    pub fn vsync(&self) -> bool {
        self.config.vsync
    }

    /// Layouts registered under `name` (`"mesh"`, `"unlit"`, `"compute"`, or custom)
    pub fn get_descriptor_set_layouts(&self, name: &str) -> Result<&[vk::DescriptorSetLayout]> {
        self.layouts
            .get(name)
            .ok_or_else(|| Error::InvalidResource(format!("no descriptor set layouts named '{}'", name)))
    }

    /// Register custom layouts; the context takes ownership of them
    pub fn register_descriptor_set_layouts(&mut self, name: &str, layouts: Vec<vk::DescriptorSetLayout>) {
        for &layout in &layouts {
            self.layouts.adopt(layout);
        }
        self.layouts.insert(name, layouts);
    }

    pub fn allocate_descriptor_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        self.ensure_alive()?;
        self.descriptor_allocator.allocate(&self.device, &layout)
    }

    /// Return every descriptor set to its pool
    ///
    /// Sets still referenced by in-flight command buffers must not be cleared;
    /// call after [`wait_idle`](Self::wait_idle) or at a frame boundary that guarantees it.
    pub fn clear_descriptor_pools(&mut self) -> Result<()> {
        self.ensure_alive()?;
        self.descriptor_allocator.clear_pools(&self.device)
    }

    pub fn descriptor_allocator(&self) -> &DescriptorAllocator<vk::DescriptorPool> {
        &self.descriptor_allocator
    }

    /// Queue of cleanup closures flushed at shutdown
    pub fn deletion_queue_mut(&mut self) -> &mut DeletionQueue {
        &mut self.deletion_queue
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.ensure_alive()?;
        self.device.wait_idle()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Destroy everything in reverse creation order; later calls do nothing
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Err(e) = self.device.wait_idle() {
            engine_warn!("lumen::vulkan", "Wait idle failed during shutdown: {}", e);
        }

        self.deletion_queue.flush();
        self.descriptor_allocator.destroy_pools(&self.device);
        self.layouts.destroy(self.device.raw());
        self.commands.destroy(self.device.raw());
        self.sync.destroy(self.device.raw());
        self.swapchain.release();
        self.device.release();
        self.surface.release();
        self.instance.release();

        engine_info!("lumen::vulkan", "Context shut down");
    }
}

impl RenderBackend for Context {
    type Frame = FrameTarget;

    fn begin_frame(&mut self) -> Result<Option<FrameTarget>> {
        self.prepare_frame()
    }

    fn end_frame(&mut self, frame: FrameTarget) -> Result<()> {
        self.submit_frame(&frame)
    }

    fn resize(&mut self, width: u32, height: u32) {
        Context::resize(self, width, height);
    }

    fn wait_idle(&self) -> Result<()> {
        Context::wait_idle(self)
    }

    fn shutdown(&mut self) {
        Context::shutdown(self);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}
