/// Vulkan instance, optional debug messenger and window surface

use ash::vk;
use lumen_engine::lumen::render::{Config, WindowSurface};
use lumen_engine::lumen::{Error, Result};
use lumen_engine::{engine_error, engine_info, engine_warn};
use std::ffi::{CStr, CString};

use crate::vulkan_error::vk_check;

/// Khronos validation layer name
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Whether validation can be turned on in this build for `config`
pub fn validation_requested(config: &Config) -> bool {
    cfg!(feature = "vulkan-validation") && config.enable_validation
}

/// Loaded Vulkan entry points plus the instance created from them
pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    #[cfg(feature = "vulkan-validation")]
    debug: Option<crate::debug::DebugMessenger>,
    validation: bool,
    released: bool,
}

impl Instance {
    /// Create the instance with the extensions `window` needs for presentation
    pub fn new<W: WindowSurface + ?Sized>(window: &W, config: &Config) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to load Vulkan library: {}", e);
            Error::InitializationFailed(format!("Failed to load Vulkan library: {}", e))
        })?;

        let app_name = CString::new(config.app_name.as_str()).unwrap_or_else(|_| c"Lumen".to_owned());
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Lumen")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let display_handle = window.display_handle().map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(|e| {
                engine_error!("lumen::vulkan", "Failed to get required extensions: {:?}", e);
                Error::InitializationFailed(format!("Failed to get required extensions: {:?}", e))
            })?
            .to_vec();

        let mut validation = validation_requested(config);
        if validation && !Self::layer_available(&entry, VALIDATION_LAYER) {
            engine_warn!("lumen::vulkan", "{:?} not installed, validation disabled", VALIDATION_LAYER);
            validation = false;
        }
        if config.enable_validation && !cfg!(feature = "vulkan-validation") {
            engine_warn!("lumen::vulkan", "Validation requested but the `vulkan-validation` feature is off");
        }

        let layer_names = if validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
            engine_error!("lumen::vulkan", "Failed to create Vulkan instance: {:?}", e);
            Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
        })?;

        #[cfg(feature = "vulkan-validation")]
        let debug = if validation {
            match crate::debug::DebugMessenger::new(&entry, &instance, config.debug_severity) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        engine_info!("lumen::vulkan", "Vulkan instance created (validation: {})", validation);

        Ok(Self {
            entry,
            instance,
            surface_loader,
            #[cfg(feature = "vulkan-validation")]
            debug,
            validation,
            released: false,
        })
    }

    fn layer_available(entry: &ash::Entry, layer: &CStr) -> bool {
        unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers
                    .iter()
                    .any(|props| props.layer_name_as_c_str().map(|name| name == layer).unwrap_or(false))
            })
            .unwrap_or(false)
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Whether the validation layer and messenger are active
    pub fn validation_enabled(&self) -> bool {
        self.validation
    }

    /// Layers to enable on the logical device (mirrors the instance layers)
    pub fn device_layers(&self) -> Vec<*const std::os::raw::c_char> {
        if self.validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        }
    }

    /// Create a presentation surface for `window`
    pub fn create_surface<W: WindowSurface + ?Sized>(&self, window: &W) -> Result<Surface> {
        let display_handle = window
            .display_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get display handle: {}", e)))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| Error::InitializationFailed(format!("Failed to get window handle: {}", e)))?;

        let handle = unsafe {
            vk_check!("vkCreateSurfaceKHR", ash_window::create_surface(
                &self.entry,
                &self.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ))?
        };

        Ok(Surface {
            loader: self.surface_loader.clone(),
            handle,
            released: false,
        })
    }

    /// Destroy the messenger and the instance; later calls do nothing
    ///
    /// Every device and surface created from this instance must already be released.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        #[cfg(feature = "vulkan-validation")]
        if let Some(mut debug) = self.debug.take() {
            debug.destroy();
        }

        unsafe { self.instance.destroy_instance(None) };
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.release();
    }
}

/// Window surface
pub struct Surface {
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
    released: bool,
}

impl Surface {
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "vulkan_instance_tests.rs"]
mod tests;
