/// Physical device selection, logical device and GPU memory

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};
use gpu_allocator::MemoryLocation;
use lumen_engine::lumen::render::{Config, DeviceFeatures};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_debug, engine_error, engine_info, engine_warn};
use std::ffi::CString;
use std::fmt;
use std::mem::ManuallyDrop;
use std::sync::Mutex;

use crate::vulkan_error::{allocation_error, vk_check};
use crate::vulkan_instance::{Instance, Surface};

// ============================================================================
// Queue families
// ============================================================================

/// Queue family indices of one physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Pick families from `families`
    ///
    /// Present prefers the graphics family when it can present. Compute prefers a
    /// family without graphics support, then falls back to the graphics family.
    pub fn find(families: &[vk::QueueFamilyProperties], supports_present: impl Fn(u32) -> bool) -> Self {
        let indexed = || families.iter().enumerate().map(|(i, f)| (i as u32, f));

        let graphics = indexed()
            .find(|(_, f)| f.queue_count > 0 && f.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(i, _)| i);

        let present = match graphics {
            Some(g) if supports_present(g) => Some(g),
            _ => indexed()
                .filter(|(_, f)| f.queue_count > 0)
                .map(|(i, _)| i)
                .find(|&i| supports_present(i)),
        };

        let compute = indexed()
            .find(|(_, f)| {
                f.queue_count > 0
                    && f.queue_flags.contains(vk::QueueFlags::COMPUTE)
                    && !f.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            })
            .map(|(i, _)| i)
            .or_else(|| {
                graphics.filter(|&g| families[g as usize].queue_flags.contains(vk::QueueFlags::COMPUTE))
            });

        Self { graphics, present, compute }
    }

    /// Graphics exists and, when presenting to a surface, present exists
    pub fn is_complete(&self, has_surface: bool) -> bool {
        self.graphics.is_some() && (!has_surface || self.present.is_some())
    }

    /// Distinct families that need a queue, sorted
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = [self.graphics, self.present, self.compute]
            .into_iter()
            .flatten()
            .collect();
        families.sort_unstable();
        families.dedup();
        families
    }
}

// ============================================================================
// Physical device info
// ============================================================================

/// Everything queried once about an enumerated physical device
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub extensions: Vec<String>,
}

impl PhysicalDeviceInfo {
    fn query(instance: &ash::Instance, handle: vk::PhysicalDevice) -> Result<Self> {
        unsafe {
            let properties = instance.get_physical_device_properties(handle);
            let extensions = vk_check!(
                "vkEnumerateDeviceExtensionProperties",
                instance.enumerate_device_extension_properties(handle)
            )?
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

            Ok(Self {
                handle,
                name: properties
                    .device_name_as_c_str()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| "Unknown device".to_string()),
                device_type: properties.device_type,
                properties,
                features: instance.get_physical_device_features(handle),
                memory_properties: instance.get_physical_device_memory_properties(handle),
                queue_families: instance.get_physical_device_queue_family_properties(handle),
                extensions,
            })
        }
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }
}

impl fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("queue_families", &self.queue_families.len())
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

// ============================================================================
// Suitability
// ============================================================================

/// Surface formats and present modes a device offers for the target surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSupportSummary {
    pub format_count: usize,
    pub present_mode_count: usize,
}

/// Present support of every queue family, stopping at the first failed query
pub fn present_support(
    family_count: usize,
    mut query: impl FnMut(u32) -> Result<bool>,
) -> Result<Vec<bool>> {
    (0..family_count as u32).map(|family| query(family)).collect()
}

impl SurfaceSupportSummary {
    fn query(surface: &Surface, device: vk::PhysicalDevice) -> Result<Self> {
        unsafe {
            let formats = vk_check!(
                "vkGetPhysicalDeviceSurfaceFormatsKHR",
                surface.loader().get_physical_device_surface_formats(device, surface.handle())
            )?;
            let modes = vk_check!(
                "vkGetPhysicalDeviceSurfacePresentModesKHR",
                surface.loader().get_physical_device_surface_present_modes(device, surface.handle())
            )?;
            Ok(Self { format_count: formats.len(), present_mode_count: modes.len() })
        }
    }
}

/// First criterion a physical device failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsuitability {
    MissingExtension(String),
    NoGraphicsQueue,
    NoPresentQueue,
    NoSurfaceFormats,
    NoPresentModes,
    MissingFeatures(DeviceFeatures),
}

impl fmt::Display for Unsuitability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsuitability::MissingExtension(name) => write!(f, "missing extension {}", name),
            Unsuitability::NoGraphicsQueue => write!(f, "no graphics queue family"),
            Unsuitability::NoPresentQueue => write!(f, "no queue family can present to the surface"),
            Unsuitability::NoSurfaceFormats => write!(f, "no surface formats"),
            Unsuitability::NoPresentModes => write!(f, "no present modes"),
            Unsuitability::MissingFeatures(missing) => write!(f, "missing features {:?}", missing),
        }
    }
}

/// Requested features `features` does not support
pub fn missing_features(features: &vk::PhysicalDeviceFeatures, requested: DeviceFeatures) -> DeviceFeatures {
    let mut missing = DeviceFeatures::empty();
    if requested.contains(DeviceFeatures::SAMPLER_ANISOTROPY) && features.sampler_anisotropy == vk::FALSE {
        missing |= DeviceFeatures::SAMPLER_ANISOTROPY;
    }
    if requested.contains(DeviceFeatures::FILL_MODE_NON_SOLID) && features.fill_mode_non_solid == vk::FALSE {
        missing |= DeviceFeatures::FILL_MODE_NON_SOLID;
    }
    missing
}

/// Feature struct enabling exactly `requested`
pub fn enabled_features(requested: DeviceFeatures) -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(requested.contains(DeviceFeatures::SAMPLER_ANISOTROPY))
        .fill_mode_non_solid(requested.contains(DeviceFeatures::FILL_MODE_NON_SOLID))
}

/// Check a device against every selection criterion, in order
///
/// `surface` is `None` when rendering headless.
pub fn check_suitability(
    info: &PhysicalDeviceInfo,
    indices: &QueueFamilyIndices,
    surface: Option<SurfaceSupportSummary>,
    required_extensions: &[String],
    requested: DeviceFeatures,
) -> std::result::Result<(), Unsuitability> {
    if let Some(missing) = required_extensions.iter().find(|ext| !info.supports_extension(ext)) {
        return Err(Unsuitability::MissingExtension(missing.clone()));
    }
    if indices.graphics.is_none() {
        return Err(Unsuitability::NoGraphicsQueue);
    }
    if let Some(support) = surface {
        if indices.present.is_none() {
            return Err(Unsuitability::NoPresentQueue);
        }
        if support.format_count == 0 {
            return Err(Unsuitability::NoSurfaceFormats);
        }
        if support.present_mode_count == 0 {
            return Err(Unsuitability::NoPresentModes);
        }
    }
    let missing = missing_features(&info.features, requested);
    if !missing.is_empty() {
        return Err(Unsuitability::MissingFeatures(missing));
    }
    Ok(())
}

/// Extensions every device must expose: the configured ones plus the swapchain
pub fn required_extensions(config: &Config, has_surface: bool) -> Vec<String> {
    let mut extensions = Vec::new();
    if has_surface {
        extensions.push(ash::khr::swapchain::NAME.to_string_lossy().into_owned());
    }
    for ext in &config.required_device_extensions {
        if !extensions.contains(ext) {
            extensions.push(ext.clone());
        }
    }
    extensions
}

// ============================================================================
// Formats
// ============================================================================

/// First candidate whose properties for `tiling` contain `features`
pub fn pick_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = properties(format);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}

/// Depth formats tried by [`Device::find_depth_format`], most precise first
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Image aspect matching a format
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Buffer with its memory
pub struct AllocatedBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Allocation,
    pub size: vk::DeviceSize,
}

impl AllocatedBuffer {
    /// Copy `data` into a host-visible buffer at `offset`
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let size = self.size;
        let mapped = self
            .allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::InvalidResource("buffer is not host visible".to_string()))?;

        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= mapped.len())
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "write of {} bytes at {} overflows buffer of {} bytes",
                    data.len(), offset, size
                ))
            })?;

        mapped[offset..end].copy_from_slice(data);
        Ok(())
    }
}

/// Creation parameters for a 2D image
#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub name: String,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub mip_levels: u32,
}

impl ImageDesc {
    pub fn new(name: &str, extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            name: name.to_string(),
            extent,
            format,
            usage,
            mip_levels: 1,
        }
    }
}

/// Image, its default view and its memory
pub struct AllocatedImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub allocation: Allocation,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

// ============================================================================
// Device
// ============================================================================

/// Refuse `operation` once the logical device has been released
pub fn ensure_device_alive(released: bool, operation: &str) -> Result<()> {
    if released {
        engine_error!("lumen::vulkan", "{} called on a released device", operation);
        return Err(Error::InvalidResource(format!("{} on a released device", operation)));
    }
    Ok(())
}

/// Logical device, its queues and the GPU memory allocator
pub struct Device {
    device: ash::Device,
    instance: ash::Instance,
    physical_devices: Vec<PhysicalDeviceInfo>,
    selected: usize,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    compute_queue: Option<vk::Queue>,
    features: DeviceFeatures,
    /// Dropped before the logical device in `release`
    allocator: ManuallyDrop<Mutex<Allocator>>,
    released: bool,
}

impl Device {
    /// Select the first suitable physical device and create the logical device on it
    pub fn new(instance: &Instance, surface: Option<&Surface>, config: &Config) -> Result<Self> {
        let raw = instance.raw();

        let handles = unsafe { vk_check!("vkEnumeratePhysicalDevices", raw.enumerate_physical_devices())? };
        if handles.is_empty() {
            engine_error!("lumen::vulkan", "No Vulkan-capable GPU found");
            return Err(Error::NoSuitableDevice("no Vulkan physical device enumerated".to_string()));
        }

        let physical_devices = handles
            .iter()
            .map(|&handle| PhysicalDeviceInfo::query(raw, handle))
            .collect::<Result<Vec<_>>>()?;

        let required = required_extensions(config, surface.is_some());
        let mut selection = None;

        for (index, info) in physical_devices.iter().enumerate() {
            let presentable = match surface {
                Some(s) => present_support(info.queue_families.len(), |family| unsafe {
                    vk_check!(
                        "vkGetPhysicalDeviceSurfaceSupportKHR",
                        s.loader().get_physical_device_surface_support(info.handle, family, s.handle())
                    )
                })?,
                None => Vec::new(),
            };
            let indices = QueueFamilyIndices::find(&info.queue_families, |family| {
                presentable.get(family as usize).copied().unwrap_or(false)
            });
            let support = match surface {
                Some(s) => Some(SurfaceSupportSummary::query(s, info.handle)?),
                None => None,
            };

            match check_suitability(info, &indices, support, &required, config.device_features) {
                Ok(()) => {
                    selection = Some((index, indices));
                    break;
                }
                Err(reason) => {
                    engine_warn!("lumen::vulkan", "Skipping GPU '{}': {}", info.name, reason);
                }
            }
        }

        let (selected, queue_families) = selection.ok_or_else(|| {
            engine_error!("lumen::vulkan", "None of {} GPUs is suitable", physical_devices.len());
            Error::NoSuitableDevice(format!("none of {} enumerated GPUs is suitable", physical_devices.len()))
        })?;
        let info = &physical_devices[selected];
        engine_info!("lumen::vulkan", "Selected GPU '{}' ({:?})", info.name, info.device_type);

        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_names: Vec<CString> = required
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidResource(format!("Invalid extension name: {}", e)))?;
        let extension_ptrs: Vec<_> = extension_names.iter().map(|n| n.as_ptr()).collect();
        let layer_ptrs = instance.device_layers();
        let features = enabled_features(config.device_features);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&features);
        #[allow(deprecated)]
        let create_info = create_info.enabled_layer_names(&layer_ptrs);

        let device = unsafe { raw.create_device(info.handle, &create_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create logical device: {:?}", e);
            Error::InitializationFailed(format!("Failed to create device: {:?}", e))
        })?;

        // `selection` only holds devices with a graphics family
        let graphics_family = queue_families.graphics.unwrap_or_default();
        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = match queue_families.present {
            Some(family) => unsafe { device.get_device_queue(family, 0) },
            None => graphics_queue,
        };
        let compute_queue = queue_families
            .compute
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: raw.clone(),
            device: device.clone(),
            physical_device: info.handle,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                engine_error!("lumen::vulkan", "Failed to create GPU allocator: {:?}", e);
                unsafe { device.destroy_device(None) };
                return Err(Error::InitializationFailed(format!("Failed to create allocator: {:?}", e)));
            }
        };

        engine_debug!("lumen::vulkan", "Queue families: {:?}", queue_families);

        Ok(Self {
            device,
            instance: raw.clone(),
            physical_devices,
            selected,
            queue_families,
            graphics_queue,
            present_queue,
            compute_queue,
            features: config.device_features,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            released: false,
        })
    }

    /// Device-level function table
    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_devices[self.selected].handle
    }

    /// Every enumerated physical device, selected or not
    pub fn physical_devices(&self) -> &[PhysicalDeviceInfo] {
        &self.physical_devices
    }

    /// The selected physical device
    pub fn physical_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_devices[self.selected]
    }

    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.compute_queue
    }

    /// Features enabled on the logical device
    pub fn features(&self) -> DeviceFeatures {
        self.features
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub(crate) fn ensure_alive(&self, operation: &str) -> Result<()> {
        ensure_device_alive(self.released, operation)
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> Result<Allocation> {
        self.ensure_alive("allocate")?;
        let mut allocator = self
            .allocator
            .lock()
            .map_err(|_| Error::BackendError("GPU allocator lock poisoned".to_string()))?;

        allocator
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| allocation_error(name, e))
    }

    fn free(&self, allocation: Allocation) {
        if self.released {
            return;
        }
        match self.allocator.lock() {
            Ok(mut allocator) => {
                if let Err(e) = allocator.free(allocation) {
                    engine_warn!("lumen::vulkan", "Failed to free GPU allocation: {}", e);
                }
            }
            Err(_) => engine_warn!("lumen::vulkan", "GPU allocator lock poisoned, leaking allocation"),
        }
    }

    /// Create a buffer and bind freshly allocated memory to it
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<AllocatedBuffer> {
        self.ensure_alive("create_buffer")?;
        if size == 0 {
            return Err(Error::InvalidResource(format!("buffer '{}' has zero size", name)));
        }

        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = vk_check!("vkCreateBuffer", self.device.create_buffer(&info, None))?;
            let requirements = self.device.get_buffer_memory_requirements(buffer);

            let allocation = match self.allocate(name, requirements, location, true) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            if let Err(e) = vk_check!(
                "vkBindBufferMemory",
                self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            ) {
                self.free(allocation);
                self.device.destroy_buffer(buffer, None);
                return Err(e);
            }

            Ok(AllocatedBuffer { buffer, allocation, size })
        }
    }

    /// Free the buffer's memory and destroy it; does nothing after [`release`](Self::release)
    pub fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        if self.released {
            engine_warn!("lumen::vulkan", "Buffer destroyed after device release, ignoring");
            return;
        }
        self.free(buffer.allocation);
        unsafe { self.device.destroy_buffer(buffer.buffer, None) };
    }

    /// Create a device-local 2D image with a view covering every mip level
    pub fn create_image(&self, desc: &ImageDesc) -> Result<AllocatedImage> {
        self.ensure_alive("create_image")?;
        if desc.extent.width == 0 || desc.extent.height == 0 || desc.mip_levels == 0 {
            return Err(Error::InvalidResource(format!(
                "image '{}' has a zero dimension ({}x{}, {} mips)",
                desc.name, desc.extent.width, desc.extent.height, desc.mip_levels
            )));
        }

        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D { width: desc.extent.width, height: desc.extent.height, depth: 1 })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let image = vk_check!("vkCreateImage", self.device.create_image(&info, None))?;
            let requirements = self.device.get_image_memory_requirements(image);

            let allocation = match self.allocate(&desc.name, requirements, MemoryLocation::GpuOnly, false) {
                Ok(allocation) => allocation,
                Err(e) => {
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = vk_check!(
                "vkBindImageMemory",
                self.device.bind_image_memory(image, allocation.memory(), allocation.offset())
            ) {
                self.free(allocation);
                self.device.destroy_image(image, None);
                return Err(e);
            }

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(desc.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect_for_format(desc.format),
                    base_mip_level: 0,
                    level_count: desc.mip_levels,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            let view = match vk_check!("vkCreateImageView", self.device.create_image_view(&view_info, None)) {
                Ok(view) => view,
                Err(e) => {
                    self.free(allocation);
                    self.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            Ok(AllocatedImage {
                image,
                view,
                allocation,
                format: desc.format,
                extent: desc.extent,
            })
        }
    }

    pub fn destroy_image(&self, image: AllocatedImage) {
        if self.released {
            engine_warn!("lumen::vulkan", "Image destroyed after device release, ignoring");
            return;
        }
        unsafe { self.device.destroy_image_view(image.view, None) };
        self.free(image.allocation);
        unsafe { self.device.destroy_image(image.image, None) };
    }

    /// First of `candidates` supporting `features` with `tiling`
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        self.ensure_alive("find_supported_format")?;
        let physical_device = self.physical_device();
        pick_supported_format(candidates, tiling, features, |format| unsafe {
            self.instance.get_physical_device_format_properties(physical_device, format)
        })
        .ok_or_else(|| {
            engine_error!("lumen::vulkan", "No supported format among {:?} for {:?}", candidates, features);
            Error::InvalidResource(format!("no supported format among {:?}", candidates))
        })
    }

    /// Best depth attachment format the device supports
    pub fn find_depth_format(&self) -> Result<vk::Format> {
        self.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.ensure_alive("wait_idle")?;
        unsafe { vk_check!("vkDeviceWaitIdle", self.device.device_wait_idle()) }
    }

    /// Drop the allocator and destroy the logical device; later calls do nothing
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                engine_warn!("lumen::vulkan", "Device wait idle failed during release: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        engine_debug!("lumen::vulkan", "Logical device destroyed");
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "vulkan_device_tests.rs"]
mod tests;
