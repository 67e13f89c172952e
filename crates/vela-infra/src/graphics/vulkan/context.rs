// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Instance, physical device selection and logical device creation.

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::fmt;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use ash::vk;

use vela_core::memory::Bytes;
use vela_core::renderer::{DeviceArchitecture, DeviceInfo, QueueType, RenderError, RendererSettings};

use super::conversions::architecture_from_vendor_id;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const RAY_TRACING_EXTENSIONS: [&str; 2] = ["VK_KHR_ray_tracing_pipeline", "VK_NV_ray_tracing"];
const MESH_SHADER_EXTENSIONS: [&str; 2] = ["VK_EXT_mesh_shader", "VK_NV_mesh_shader"];

/// Queue family index used for each queue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueFamilies {
    pub graphics: u32,
    pub transfer: u32,
    pub compute: u32,
}

impl QueueFamilies {
    pub fn index(&self, queue: QueueType) -> u32 {
        match queue {
            QueueType::Graphics => self.graphics,
            QueueType::Transfer => self.transfer,
            QueueType::AsyncCompute => self.compute,
        }
    }

    /// The distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics];
        for family in [self.transfer, self.compute] {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Picks a graphics family, plus dedicated transfer and compute families when the
/// device exposes them. Returns `None` if no family supports graphics.
pub(crate) fn pick_queue_families(families: &[vk::QueueFamilyProperties]) -> Option<QueueFamilies> {
    let usable = |props: &vk::QueueFamilyProperties| props.queue_count > 0;
    let graphics = families
        .iter()
        .position(|props| usable(props) && props.queue_flags.contains(vk::QueueFlags::GRAPHICS))?
        as u32;

    let dedicated = |wanted: vk::QueueFlags, excluded: vk::QueueFlags| {
        families
            .iter()
            .position(|props| {
                usable(props)
                    && props.queue_flags.contains(wanted)
                    && !props.queue_flags.intersects(excluded)
            })
            .map(|index| index as u32)
    };

    let compute = dedicated(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS).unwrap_or(graphics);
    let transfer = dedicated(
        vk::QueueFlags::TRANSFER,
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
    )
    .unwrap_or(graphics);

    Some(QueueFamilies {
        graphics,
        transfer,
        compute,
    })
}

/// What GPU selection needs to know about one physical device.
#[derive(Debug, Clone)]
pub(crate) struct GpuCandidate {
    pub name: String,
    pub architecture: DeviceArchitecture,
    pub missing_extensions: Vec<String>,
    pub queue_families: Option<QueueFamilies>,
}

impl GpuCandidate {
    fn rejection(&self) -> Option<String> {
        if !self.missing_extensions.is_empty() {
            return Some(format!(
                "missing required extensions {}",
                self.missing_extensions.join(", ")
            ));
        }
        if self.queue_families.is_none() {
            return Some("no graphics queue family".to_string());
        }
        None
    }
}

/// Returns the index of the GPU to use.
///
/// Integrated Intel GPUs are only picked when no other device qualifies.
pub(crate) fn select_gpu(candidates: &[GpuCandidate]) -> Option<usize> {
    let mut fallback = None;
    for (index, candidate) in candidates.iter().enumerate() {
        if let Some(reason) = candidate.rejection() {
            log::info!("Rejected GPU {}: {reason}", candidate.name);
            continue;
        }
        if candidate.architecture == DeviceArchitecture::Intel {
            log::debug!("Deferring Intel GPU {} in favour of other devices", candidate.name);
            fallback.get_or_insert(index);
            continue;
        }
        return Some(index);
    }
    fallback
}

/// Builds the backend-neutral description of a physical device.
pub(crate) fn build_device_info(
    name: String,
    properties: &vk::PhysicalDeviceProperties,
    extensions: &[String],
) -> DeviceInfo {
    let architecture = architecture_from_vendor_id(properties.vendor_id);
    let has_any = |wanted: &[&str]| wanted.iter().any(|ext| extensions.iter().any(|e| e == ext));
    DeviceInfo {
        architecture,
        name,
        max_texture_size: Bytes::new(u64::from(properties.limits.max_image_dimension2_d)),
        max_color_attachments: properties.limits.max_color_attachments,
        is_uma: architecture == DeviceArchitecture::Intel
            || properties.device_type == vk::PhysicalDeviceType::INTEGRATED_GPU,
        supports_raytracing: has_any(&RAY_TRACING_EXTENSIONS),
        supports_mesh_shaders: has_any(&MESH_SHADER_EXTENSIONS),
    }
}

/// Routes validation messages to the `log` facade.
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("[{message_type:?}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("[{message_type:?}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::debug!("[{message_type:?}] {message}"),
        _ => log::trace!("[{message_type:?}] {message}"),
    }
    vk::FALSE
}

struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Holds the core Vulkan objects: loader, instance, physical and logical device, and queues.
pub(crate) struct VulkanContext {
    _entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    /// Present when debugging is enabled; used to name objects.
    pub debug_utils: Option<ash::ext::debug_utils::Device>,
    pub queue_families: QueueFamilies,
    queues: HashMap<u32, Mutex<vk::Queue>>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub info: DeviceInfo,
}

impl fmt::Debug for VulkanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanContext")
            .field("physical_device", &self.physical_device)
            .field("device", &self.device.handle())
            .field("queue_families", &self.queue_families)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Everything decided about the physical device before the logical device exists.
struct SelectedGpu {
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilies,
    info: DeviceInfo,
}

impl VulkanContext {
    /// Loads Vulkan, creates the instance and picks a GPU.
    ///
    /// ## Errors
    /// Fails if the loader or instance cannot be created, or if no GPU supports
    /// graphics and every extension in `settings.required_device_extensions`.
    /// In the latter case the error wraps [`RenderError::NoCompatibleDevice`].
    pub fn new(settings: &RendererSettings) -> Result<Self> {
        log::info!("Initializing Vulkan context...");

        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| anyhow!("Failed to load the Vulkan loader: {e}"))?;

        let instance = Self::create_instance(&entry, settings)?;
        let debug_messenger = if settings.debug.enabled {
            match Self::create_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(err) => {
                    log::warn!("Debug messenger unavailable: {err}");
                    None
                }
            }
        } else {
            None
        };

        let created = Self::select_gpu(&instance, settings).and_then(|gpu| {
            Self::create_device(&instance, &gpu, settings).map(|device| (gpu, device))
        });
        let (gpu, device) = match created {
            Ok(created) => created,
            Err(err) => {
                unsafe {
                    if let Some(debug) = &debug_messenger {
                        debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(err);
            }
        };

        let queues = gpu
            .queue_families
            .unique()
            .into_iter()
            .map(|family| (family, Mutex::new(unsafe { device.get_device_queue(family, 0) })))
            .collect();
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(gpu.physical_device) };
        let debug_utils = settings
            .debug
            .enabled
            .then(|| ash::ext::debug_utils::Device::new(&instance, &device));

        log::info!(
            "Vulkan device ready on {} ({}), queue families {:?}",
            gpu.info.name,
            gpu.info.architecture,
            gpu.queue_families
        );

        Ok(Self {
            _entry: entry,
            instance,
            debug_messenger,
            physical_device: gpu.physical_device,
            device,
            debug_utils,
            queue_families: gpu.queue_families,
            queues,
            memory_properties,
            info: gpu.info,
        })
    }

    /// The queue serving `queue`. Submissions must hold the lock.
    pub fn queue(&self, queue: QueueType) -> Option<&Mutex<vk::Queue>> {
        self.queues.get(&self.queue_families.index(queue))
    }

    fn create_instance(entry: &ash::Entry, settings: &RendererSettings) -> Result<ash::Instance> {
        let application_name = CString::new(settings.application_name.as_str())
            .unwrap_or_else(|_| CString::from(c"Vela"));
        let app_info = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .application_version(0)
            .engine_name(c"Vela")
            .engine_version(0)
            .api_version(vk::API_VERSION_1_1);

        let mut layers = Vec::new();
        if settings.debug.enable_validation_layers {
            let available = unsafe { entry.enumerate_instance_layer_properties() }?;
            let found = available
                .iter()
                .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));
            if found {
                layers.push(VALIDATION_LAYER.as_ptr());
            } else {
                log::warn!("Validation layers requested but {VALIDATION_LAYER:?} is not installed");
            }
        }

        let mut extensions = Vec::new();
        if settings.debug.enabled {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|e| anyhow!("Failed to create the Vulkan instance: {e}"))?;
        log::debug!("Vulkan instance created with {} layer(s)", layers.len());
        Ok(instance)
    }

    fn create_debug_messenger(entry: &ash::Entry, instance: &ash::Instance) -> Result<DebugMessenger> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback));
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| anyhow!("Failed to create the debug messenger: {e}"))?;
        Ok(DebugMessenger { loader, messenger })
    }

    fn select_gpu(instance: &ash::Instance, settings: &RendererSettings) -> Result<SelectedGpu> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }?;
        log::debug!("Found {} physical device(s)", physical_devices.len());

        let mut candidates = Vec::with_capacity(physical_devices.len());
        let mut described = Vec::with_capacity(physical_devices.len());
        for &physical_device in &physical_devices {
            let properties = unsafe { instance.get_physical_device_properties(physical_device) };
            let name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "<unnamed>".to_string());
            let extensions: Vec<String> =
                unsafe { instance.enumerate_device_extension_properties(physical_device) }?
                    .iter()
                    .filter_map(|ext| ext.extension_name_as_c_str().ok())
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .collect();
            let missing_extensions = settings
                .required_device_extensions
                .iter()
                .filter(|required| !extensions.contains(required))
                .cloned()
                .collect();
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

            candidates.push(GpuCandidate {
                name: name.clone(),
                architecture: architecture_from_vendor_id(properties.vendor_id),
                missing_extensions,
                queue_families: pick_queue_families(&families),
            });
            described.push((physical_device, build_device_info(name, &properties, &extensions)));
        }

        let index = select_gpu(&candidates).ok_or(RenderError::NoCompatibleDevice)?;
        let (physical_device, info) = described.swap_remove(index);
        let queue_families = candidates[index]
            .queue_families
            .ok_or(RenderError::NoCompatibleDevice)?;
        log::info!("Selected GPU {}", info.name);

        Ok(SelectedGpu {
            physical_device,
            queue_families,
            info,
        })
    }

    fn create_device(
        instance: &ash::Instance,
        gpu: &SelectedGpu,
        settings: &RendererSettings,
    ) -> Result<ash::Device> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<_> = gpu
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
            })
            .collect();

        let extension_names = settings
            .required_device_extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Invalid device extension name: {e}"))?;
        let extension_ptrs: Vec<_> = extension_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_ptrs);

        let device = unsafe { instance.create_device(gpu.physical_device, &create_info, None) }
            .map_err(|e| anyhow!("Failed to create the logical device: {e}"))?;
        log::debug!("Logical device created with {} queue(s)", queue_infos.len());
        Ok(device)
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = self.device.device_wait_idle() {
                log::warn!("Device did not go idle before teardown: {err}");
            }
            self.device.destroy_device(None);
            if let Some(debug) = self.debug_messenger.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::info!("Vulkan context destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties::default()
            .queue_flags(flags)
            .queue_count(1)
    }

    fn candidate(name: &str, architecture: DeviceArchitecture) -> GpuCandidate {
        GpuCandidate {
            name: name.to_string(),
            architecture,
            missing_extensions: Vec::new(),
            queue_families: Some(QueueFamilies {
                graphics: 0,
                transfer: 0,
                compute: 0,
            }),
        }
    }

    #[test]
    fn dedicated_families_are_preferred() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let picked = pick_queue_families(&families).unwrap();
        assert_eq!(
            picked,
            QueueFamilies {
                graphics: 0,
                transfer: 2,
                compute: 1,
            }
        );
        assert_eq!(picked.unique(), vec![0, 2, 1]);
        assert_eq!(picked.index(QueueType::AsyncCompute), 1);
    }

    #[test]
    fn single_family_serves_every_queue() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        let picked = pick_queue_families(&families).unwrap();
        assert_eq!(picked.unique(), vec![0]);
        assert_eq!(picked.index(QueueType::Transfer), 0);
    }

    #[test]
    fn compute_only_devices_have_no_families() {
        assert!(pick_queue_families(&[family(vk::QueueFlags::COMPUTE)]).is_none());
        assert!(pick_queue_families(&[]).is_none());
    }

    #[test]
    fn discrete_gpus_win_over_intel() {
        let candidates = [
            candidate("UHD 630", DeviceArchitecture::Intel),
            candidate("RTX 3070", DeviceArchitecture::Nvidia),
        ];
        assert_eq!(select_gpu(&candidates), Some(1));
    }

    #[test]
    fn intel_is_used_when_nothing_else_qualifies() {
        let mut nvidia = candidate("GTX 750", DeviceArchitecture::Nvidia);
        nvidia.missing_extensions = vec!["VK_KHR_ray_tracing_pipeline".to_string()];
        let candidates = [candidate("UHD 630", DeviceArchitecture::Intel), nvidia];
        assert_eq!(select_gpu(&candidates), Some(0));
    }

    #[test]
    fn no_qualifying_gpu_selects_nothing() {
        let mut amd = candidate("RX 580", DeviceArchitecture::Amd);
        amd.queue_families = None;
        assert_eq!(select_gpu(&[amd]), None);
        assert_eq!(select_gpu(&[]), None);
    }

    #[test]
    fn device_info_reflects_limits_and_extensions() {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.vendor_id = 0x1002;
        properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        properties.limits.max_image_dimension2_d = 16384;
        properties.limits.max_color_attachments = 8;

        let info = build_device_info(
            "RX 6800".to_string(),
            &properties,
            &["VK_KHR_ray_tracing_pipeline".to_string()],
        );
        assert_eq!(info.architecture, DeviceArchitecture::Amd);
        assert_eq!(info.max_texture_size, Bytes::new(16384));
        assert_eq!(info.max_color_attachments, 8);
        assert!(!info.is_uma);
        assert!(info.supports_raytracing);
        assert!(!info.supports_mesh_shaders);
    }

    #[test]
    fn integrated_gpus_are_uma() {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.vendor_id = 0x8086;
        let info = build_device_info("Iris".to_string(), &properties, &[]);
        assert!(info.is_uma);
        assert_eq!(info.architecture, DeviceArchitecture::Intel);
    }
}
