// SPDX-License-Identifier: CEPL-1.0
//! Instance, surface and validation messenger.
//!
//! STRICT ORDER: the surface is created from this instance before any
//! physical device is queried, because presentation support is a property of
//! the (device, family, surface) triple. Teardown runs in reverse in `Drop`.

use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_void, CStr, CString};
use tracing::{debug, error, info, trace, warn};

use crate::config::VkConfig;
use crate::error::{VkError, VkResultExt};
use crate::selector::{discover_families, select_device, PhysicalDeviceCandidate, QueueFamilyInfo};

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    type S = vk::DebugUtilsMessageSeverityFlagsEXT;
    if severity.contains(S::ERROR) {
        error!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(S::WARNING) {
        warn!(target: "vulkan", ?types, "{msg}");
    } else if severity.contains(S::INFO) {
        debug!(target: "vulkan", ?types, "{msg}");
    } else {
        trace!(target: "vulkan", ?types, "{msg}");
    }
    vk::FALSE
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

pub struct InstanceContext {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

/// Layers from `wanted` that the loader actually offers. Missing ones are
/// reported and skipped so a machine without the SDK still starts.
fn available_layers(entry: &Entry, wanted: &[CString]) -> Result<Vec<CString>, VkError> {
    let present = unsafe { entry.enumerate_instance_layer_properties() }
        .op("enumerate_instance_layer_properties")?;
    Ok(wanted
        .iter()
        .filter(|name| {
            let found = present
                .iter()
                .any(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) } == name.as_c_str());
            if !found {
                warn!("validation layer {name:?} not available, skipping");
            }
            found
        })
        .cloned()
        .collect())
}

impl InstanceContext {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        cfg: &VkConfig,
    ) -> Result<Self, VkError> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = Entry::linked();

        let app_name = CString::new(cfg.app_name.replace('\0', "")).unwrap_or_default();
        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: app_name.as_ptr(),
            application_version: 0,
            p_engine_name: c"prism".as_ptr(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_0,
            ..Default::default()
        };

        let mut extensions = ash_window::enumerate_required_extensions(dh)
            .op("enumerate_required_extensions")?
            .to_vec();
        let layers = if cfg.validation {
            extensions.push(debug_utils::NAME.as_ptr());
            available_layers(&entry, &cfg.validation_layers)?
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<_> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            p_application_info: &app_info,
            enabled_extension_count: extensions.len() as u32,
            pp_enabled_extension_names: extensions.as_ptr(),
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            ..Default::default()
        };
        let instance =
            unsafe { entry.create_instance(&create_info, None) }.op("create_instance")?;

        let debug = if cfg.validation {
            match create_debug_messenger(&entry, &instance) {
                Ok(d) => Some(d),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        // From here on, Drop owns cleanup.
        let mut ctx = Self {
            entry,
            instance,
            debug,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
        };
        ctx.surface = unsafe { ash_window::create_surface(&ctx.entry, &ctx.instance, dh, wh, None) }
            .op("create_surface")?;

        info!(
            validation = cfg.validation,
            layers = layers.len(),
            "Vulkan instance ready"
        );
        Ok(ctx)
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn device_name(&self, device: vk::PhysicalDevice) -> String {
        let props = unsafe { self.instance.get_physical_device_properties(device) };
        unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Result<Vec<QueueFamilyInfo>, VkError> {
        let props = unsafe {
            self.instance
                .get_physical_device_queue_family_properties(device)
        };
        discover_families(&props, |index| unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, index, self.surface)
        })
    }

    /// Score every physical device against this surface and keep the best.
    pub fn pick_physical_device(&self) -> Result<PhysicalDeviceCandidate, VkError> {
        let devices = unsafe { self.instance.enumerate_physical_devices() }
            .op("enumerate_physical_devices")?;
        let candidates = devices
            .into_iter()
            .map(|d| {
                let c = PhysicalDeviceCandidate::evaluate(d, &self.queue_families(d)?);
                debug!(
                    graphics = ?c.graphics_family,
                    present = ?c.present_family,
                    "candidate {} scored {}",
                    self.device_name(d),
                    c.score()
                );
                Ok(c)
            })
            .collect::<Result<Vec<_>, VkError>>()?;
        let chosen = select_device(candidates)?;
        info!(
            "GPU: {} (score {})",
            self.device_name(chosen.device),
            chosen.score()
        );
        Ok(chosen)
    }
}

fn create_debug_messenger(entry: &Entry, instance: &Instance) -> Result<DebugMessenger, VkError> {
    let loader = debug_utils::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    let messenger = unsafe { loader.create_debug_utils_messenger(&ci, None) }
        .op("create_debug_utils_messenger")?;
    Ok(DebugMessenger { loader, messenger })
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            // Every device-level object is gone by now.
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(d) = self.debug.take() {
                d.loader.destroy_debug_utils_messenger(d.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}
