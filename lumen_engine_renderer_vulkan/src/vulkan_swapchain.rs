/// Swapchain - surface presentation, image acquisition and resize handling
///
/// The selection policies at the top of the file are pure functions over the
/// surface capabilities so they can be checked without a GPU. [`Swapchain`]
/// applies them on creation and on every recreation.

use ash::prelude::VkResult;
use ash::vk;
use lumen_engine::lumen::render::{FrameCounter, SwapchainStatus};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn};

use crate::vulkan_device::Device;
use crate::vulkan_error::{driver_error, vk_check};
use crate::vulkan_instance::{Instance, Surface};

/// Format preferred for swapchain images
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

// ============================================================================
// Selection policies
// ============================================================================

/// Prefer BGRA8 UNORM with sRGB non-linear color space, else the first offered format
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    // A single UNDEFINED entry means the surface has no preference
    if let [only] = available {
        if only.format == vk::Format::UNDEFINED {
            return Some(PREFERRED_SURFACE_FORMAT);
        }
    }

    available
        .iter()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first())
        .copied()
}

/// FIFO under vsync; otherwise MAILBOX, then IMMEDIATE, then FIFO
pub fn choose_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Surface-defined extent verbatim, or `requested` clamped into the allowed range
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: requested.width.clamp(min.width, max.width.max(min.width)),
        height: requested.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// One image more than the minimum, bounded by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Concurrent sharing between graphics and present families when they differ
pub fn choose_sharing_mode(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![graphics_family, present_family])
    }
}

/// Identity when supported, else whatever the surface currently uses
pub fn choose_pre_transform(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if capabilities.supported_transforms.contains(vk::SurfaceTransformFlagsKHR::IDENTITY) {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

/// Opaque composition when possible
pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&flag| supported.contains(flag))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Surface capabilities, formats and present modes, queried fresh for every (re)creation
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        unsafe {
            Ok(Self {
                capabilities: vk_check!(
                    "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
                    loader.get_physical_device_surface_capabilities(physical_device, surface)
                )?,
                formats: vk_check!(
                    "vkGetPhysicalDeviceSurfaceFormatsKHR",
                    loader.get_physical_device_surface_formats(physical_device, surface)
                )?,
                present_modes: vk_check!(
                    "vkGetPhysicalDeviceSurfacePresentModesKHR",
                    loader.get_physical_device_surface_present_modes(physical_device, surface)
                )?,
            })
        }
    }
}

/// Every parameter of a swapchain about to be created
#[derive(Debug, Clone)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub image_usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

/// Apply every selection policy to `support`
///
/// Fails when the surface offers no format or the resulting extent has zero area.
pub fn plan_swapchain(
    support: &SwapchainSupportDetails,
    requested: vk::Extent2D,
    vsync: bool,
    graphics_family: u32,
    present_family: u32,
) -> Result<SwapchainPlan> {
    let caps = &support.capabilities;

    let surface_format = choose_surface_format(&support.formats)
        .ok_or_else(|| Error::InvalidResource("surface offers no formats".to_string()))?;

    let extent = choose_extent(caps, requested);
    if extent.width == 0 || extent.height == 0 {
        return Err(Error::InvalidResource(format!(
            "swapchain extent {}x{} has zero area",
            extent.width, extent.height
        )));
    }

    let mut image_usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    if caps.supported_usage_flags.contains(vk::ImageUsageFlags::TRANSFER_DST) {
        image_usage |= vk::ImageUsageFlags::TRANSFER_DST;
    }

    let (sharing_mode, queue_family_indices) = choose_sharing_mode(graphics_family, present_family);

    Ok(SwapchainPlan {
        surface_format,
        present_mode: choose_present_mode(&support.present_modes, vsync),
        extent,
        image_count: choose_image_count(caps),
        image_usage,
        sharing_mode,
        queue_family_indices,
        pre_transform: choose_pre_transform(caps),
        composite_alpha: choose_composite_alpha(caps.supported_composite_alpha),
    })
}

/// Status of an acquire call; `OutOfDate` carries no usable index
pub fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<(u32, SwapchainStatus)> {
    match result {
        Ok((index, false)) => Ok((index, SwapchainStatus::Optimal)),
        Ok((index, true)) => Ok((index, SwapchainStatus::Suboptimal)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok((u32::MAX, SwapchainStatus::OutOfDate)),
        Err(code) => Err(driver_error("vkAcquireNextImageKHR", code)),
    }
}

/// Whether the frame fence may be reset after an acquire
///
/// Only a renderable status with an index inside the image set resets it. An
/// out-of-date acquire or a bad index leaves the fence signalled so the next wait
/// on that frame slot returns.
pub fn acquire_resets_fence(index: u32, status: SwapchainStatus, image_count: usize) -> Result<bool> {
    if !status.is_renderable() {
        return Ok(false);
    }
    if index as usize >= image_count {
        engine_error!("lumen::vulkan", "Acquired image {} but the swapchain has {}", index, image_count);
        return Err(Error::InvalidResource(format!(
            "acquired image {} out of range ({} images)",
            index, image_count
        )));
    }
    Ok(true)
}

/// Status of a present call
pub fn classify_present(result: VkResult<bool>) -> Result<SwapchainStatus> {
    match result {
        Ok(false) => Ok(SwapchainStatus::Optimal),
        Ok(true) => Ok(SwapchainStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SwapchainStatus::OutOfDate),
        Err(code) => Err(driver_error("vkQueuePresentKHR", code)),
    }
}

// ============================================================================
// Swapchain
// ============================================================================

/// Presentable image set for one surface
///
/// Holds clones of the device and surface function tables; the owning
/// [`Device`] and [`Surface`] must outlive it or be released after it.
pub struct Swapchain {
    device: ash::Device,
    loader: ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    physical_device: vk::PhysicalDevice,
    present_queue: vk::Queue,
    graphics_family: u32,
    present_family: u32,

    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    /// One per image: a slot's fence does not cover the present still waiting on it
    render_finished: Vec<vk::Semaphore>,
    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    vsync: bool,

    frames: FrameCounter,
    released: bool,
}

impl Swapchain {
    /// Create a swapchain for `surface` sized as close to `requested` as the surface allows
    pub fn new(
        instance: &Instance,
        device: &Device,
        surface: &Surface,
        requested: vk::Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let families = device.queue_families();
        let graphics_family = families
            .graphics
            .ok_or_else(|| Error::InitializationFailed("device has no graphics queue".to_string()))?;
        let present_family = families
            .present
            .ok_or_else(|| Error::InitializationFailed("device cannot present to the surface".to_string()))?;

        let mut swapchain = Self {
            device: device.raw().clone(),
            loader: ash::khr::swapchain::Device::new(instance.raw(), device.raw()),
            surface: surface.handle(),
            surface_loader: surface.loader().clone(),
            physical_device: device.physical_device(),
            present_queue: device.present_queue(),
            graphics_family,
            present_family,
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            render_finished: Vec::new(),
            surface_format: PREFERRED_SURFACE_FORMAT,
            present_mode: vk::PresentModeKHR::FIFO,
            extent: requested,
            vsync,
            frames: FrameCounter::new(),
            released: false,
        };

        swapchain.build(requested)?;
        Ok(swapchain)
    }

    /// Create a new handle (retiring the current one), then its images and views
    fn build(&mut self, requested: vk::Extent2D) -> Result<()> {
        let support = SwapchainSupportDetails::query(&self.surface_loader, self.physical_device, self.surface)?;
        let plan = plan_swapchain(&support, requested, self.vsync, self.graphics_family, self.present_family)?;

        let old_swapchain = self.handle;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(plan.image_usage)
            .image_sharing_mode(plan.sharing_mode)
            .queue_family_indices(&plan.queue_family_indices)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { vk_check!("vkCreateSwapchainKHR", self.loader.create_swapchain(&create_info, None))? };

        self.destroy_views();
        self.destroy_semaphores();
        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(old_swapchain, None) };
        }
        self.handle = handle;
        self.surface_format = plan.surface_format;
        self.present_mode = plan.present_mode;
        self.extent = plan.extent;

        self.images = unsafe { vk_check!("vkGetSwapchainImagesKHR", self.loader.get_swapchain_images(handle))? };

        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(plan.surface_format.format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { vk_check!("vkCreateImageView", self.device.create_image_view(&view_info, None))? };
            self.views.push(view);
        }

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        for _ in 0..self.images.len() {
            let semaphore =
                unsafe { vk_check!("vkCreateSemaphore", self.device.create_semaphore(&semaphore_info, None))? };
            self.render_finished.push(semaphore);
        }

        engine_info!("lumen::vulkan", "Swapchain {}x{}, {} images, {:?}, {:?}",
            self.extent.width, self.extent.height, self.images.len(),
            self.surface_format.format, self.present_mode);
        Ok(())
    }

    fn destroy_views(&mut self) {
        for view in self.views.drain(..) {
            unsafe { self.device.destroy_image_view(view, None) };
        }
    }

    fn destroy_semaphores(&mut self) {
        for semaphore in self.render_finished.drain(..) {
            unsafe { self.device.destroy_semaphore(semaphore, None) };
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.released {
            return Err(Error::InvalidResource("swapchain already released".to_string()));
        }
        Ok(())
    }

    /// Wait on `fence`, then acquire the next image signalling `semaphore`
    ///
    /// The fence is reset only when an image was acquired, so a dropped frame
    /// leaves it signalled for the next wait.
    pub fn get_next_renderable_image(
        &mut self,
        fence: vk::Fence,
        semaphore: vk::Semaphore,
    ) -> Result<(u32, SwapchainStatus)> {
        self.ensure_alive()?;

        unsafe {
            vk_check!("vkWaitForFences", self.device.wait_for_fences(&[fence], true, u64::MAX))?;

            let acquired = self.loader.acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null());
            let (index, status) = classify_acquire(acquired)?;

            if acquire_resets_fence(index, status, self.images.len())? {
                vk_check!("vkResetFences", self.device.reset_fences(&[fence]))?;
            } else {
                engine_debug!("lumen::vulkan", "Swapchain out of date on acquire");
            }
            Ok((index, status))
        }
    }

    /// Queue `image_index` for presentation once `wait_semaphore` is signalled
    pub fn present(&mut self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<SwapchainStatus> {
        self.ensure_alive()?;

        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(self.present_queue, &present_info) };
        self.frames.advance();
        classify_present(result)
    }

    /// Rebuild every image for a new size and vsync setting
    pub fn recreate(&mut self, requested: vk::Extent2D, vsync: bool) -> Result<()> {
        self.ensure_alive()?;
        if requested.width == 0 || requested.height == 0 {
            return Err(Error::InvalidResource(format!(
                "cannot recreate swapchain at {}x{}",
                requested.width, requested.height
            )));
        }

        unsafe { vk_check!("vkDeviceWaitIdle", self.device.device_wait_idle())? };
        self.vsync = vsync;
        self.build(requested)
    }

    /// Destroy views and the swapchain handle; later calls do nothing
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = unsafe { self.device.device_wait_idle() } {
            engine_warn!("lumen::vulkan", "Device wait idle failed during swapchain release: {:?}", e);
        }
        self.destroy_views();
        self.destroy_semaphores();
        if self.handle != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.handle, None) };
            self.handle = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn image(&self, index: u32) -> Option<vk::Image> {
        self.images.get(index as usize).copied()
    }

    pub fn image_view(&self, index: u32) -> Option<vk::ImageView> {
        self.views.get(index as usize).copied()
    }

    /// Semaphore signalled by the submission rendering image `index`, waited on by its present
    pub fn render_finished_semaphore(&self, index: u32) -> Option<vk::Semaphore> {
        self.render_finished.get(index as usize).copied()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Frame-in-flight slot for the next acquire
    pub fn current_frame(&self) -> usize {
        self.frames.current()
    }

    /// Frames handed to presentation so far
    pub fn frames_presented(&self) -> u64 {
        self.frames.presented()
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
