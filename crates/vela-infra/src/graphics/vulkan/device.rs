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


use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk;

use vela_core::math::{Extent2D, Rect2D};
use vela_core::memory::{
    AllocationInfo, Bytes, DeviceMemory, DeviceMemoryId, DeviceMemoryResource, MemoryUsage,
    ObjectKinds,
};
use vela_core::renderer::{
    Buffer, BufferCreateInfo, BufferId, CommandList, CommandListLevel, CommandListTracker,
    DescriptorPool,
    DescriptorPoolId, DescriptorResource, DescriptorSet, DescriptorSetId, DescriptorSetWrite,
    DescriptorType, DeviceInfo, Fence, FenceId, Framebuffer, FramebufferId, Image, ImageId,
    Pipeline, PipelineError, PipelineId, PipelineInterface, PipelineInterfaceId, QueueType,
    RenderDevice, RenderError, RendererSettings, Renderpass, RenderpassId,
    ResourceBindingDescription, ResourceError, Sampler, SamplerId, Semaphore, SemaphoreId,
};
use vela_core::shaderpack::{
    PipelineCreateInfo, PipelineStateFlag, PixelFormat, RenderPassCreateInfo, SamplerCreateInfo,
    StencilOpState, TextureAttachmentInfo, TextureCreateInfo,
};

use super::command::{set_render_area, VulkanCommandList};
use super::context::VulkanContext;
use super::conversions::{queue_label, IntoVk};
use super::memory::{
    check_placement, find_memory_type_for_requirements, is_host_visible, memory_type_for_usage,
};

const QUEUE_TYPES: [QueueType; 3] = [QueueType::Graphics, QueueType::Transfer, QueueType::AsyncCompute];

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn backend_error(what: &str, err: vk::Result) -> ResourceError {
    ResourceError::BackendError(format!("{what}: {err}"))
}

fn allocation_error(requested: Bytes, err: vk::Result) -> ResourceError {
    match err {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => ResourceError::OutOfDeviceMemory { requested },
        other => backend_error("vkAllocateMemory", other),
    }
}

fn render_error(what: &str, err: vk::Result) -> RenderError {
    match err {
        vk::Result::ERROR_DEVICE_LOST => RenderError::DeviceLost,
        other => RenderError::Internal(format!("{what}: {other}")),
    }
}

/// Host address of a persistently mapped heap.
#[derive(Debug)]
struct MappedPtr(*mut u8);

// SAFETY: the pointer is only dereferenced by `write_data_to_buffer`, under the
// memory registry lock, within the bounds of a live buffer.
unsafe impl Send for MappedPtr {}
unsafe impl Sync for MappedPtr {}

#[derive(Debug)]
struct MemoryEntry {
    memory: vk::DeviceMemory,
    type_index: u32,
    mapped: Option<MappedPtr>,
    coherent: bool,
}

#[derive(Debug)]
struct BufferEntry {
    buffer: vk::Buffer,
    memory: DeviceMemoryId,
    offset: Bytes,
}

#[derive(Debug)]
pub(crate) struct ImageEntry {
    image: vk::Image,
    view: vk::ImageView,
    /// Images own a dedicated allocation.
    memory: vk::DeviceMemory,
    pub(crate) aspect: vk::ImageAspectFlags,
    pub(crate) extent: Extent2D,
}

pub(crate) struct RenderpassEntry {
    pub(crate) renderpass: vk::RenderPass,
    pub(crate) clear_values: Vec<vk::ClearValue>,
}

// `vk::ClearValue` is a union and has no `Debug`.
impl fmt::Debug for RenderpassEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderpassEntry")
            .field("renderpass", &self.renderpass)
            .field("clear_values", &self.clear_values.len())
            .finish()
    }
}

#[derive(Debug)]
struct InterfaceEntry {
    layout: vk::PipelineLayout,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Render pass compatible with the interface's attachments, used to build pipelines.
    renderpass: vk::RenderPass,
}

#[derive(Debug)]
struct DescriptorSetEntry {
    set: vk::DescriptorSet,
    pool: DescriptorPoolId,
}

type CommandPoolSlot = Mutex<HashMap<QueueType, vk::CommandPool>>;

/// The internal, non-clonable state of the Vulkan device.
pub(crate) struct VulkanDeviceInternal {
    context: VulkanContext,
    frames_in_flight: u32,
    recording_threads: u32,
    /// One slot per `(frame, thread)` pair, indexed `frame * threads + thread`.
    command_pools: Vec<CommandPoolSlot>,

    memories: Mutex<HashMap<DeviceMemoryId, MemoryEntry>>,
    buffers: Mutex<HashMap<BufferId, BufferEntry>>,
    images: Mutex<HashMap<ImageId, ImageEntry>>,
    samplers: Mutex<HashMap<SamplerId, vk::Sampler>>,
    renderpasses: Mutex<HashMap<RenderpassId, RenderpassEntry>>,
    framebuffers: Mutex<HashMap<FramebufferId, vk::Framebuffer>>,
    interfaces: Mutex<HashMap<PipelineInterfaceId, InterfaceEntry>>,
    pipelines: Mutex<HashMap<PipelineId, vk::Pipeline>>,
    descriptor_pools: Mutex<HashMap<DescriptorPoolId, vk::DescriptorPool>>,
    descriptor_sets: Mutex<HashMap<DescriptorSetId, DescriptorSetEntry>>,
    fences: Mutex<HashMap<FenceId, vk::Fence>>,
    semaphores: Mutex<HashMap<SemaphoreId, vk::Semaphore>>,

    next_id: AtomicUsize,
}

impl fmt::Debug for VulkanDeviceInternal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanDeviceInternal")
            .field("context", &self.context)
            .field("frames_in_flight", &self.frames_in_flight)
            .field("recording_threads", &self.recording_threads)
            .finish_non_exhaustive()
    }
}

/// A clonable, thread-safe handle to the Vulkan render device.
///
/// Clones share the same device; command lists hold one to resolve handles
/// while recording.
#[derive(Clone, Debug)]
pub struct VulkanRenderDevice {
    internal: Arc<VulkanDeviceInternal>,
}

impl VulkanRenderDevice {
    /// Creates the instance, picks a GPU and creates the logical device and
    /// one command pool per frame, recording thread and queue.
    ///
    /// ## Errors
    /// * `RenderError::NoCompatibleDevice` if no GPU supports graphics and the
    ///   required device extensions.
    /// * `RenderError::InitializationFailed` for any other setup failure.
    pub fn new(settings: &RendererSettings) -> Result<Self, RenderError> {
        let settings = settings.clone().sanitized();
        let context = VulkanContext::new(&settings).map_err(|err| {
            err.downcast::<RenderError>()
                .unwrap_or_else(|err| RenderError::InitializationFailed(format!("{err:#}")))
        })?;

        let slots = settings.num_frames_in_flight * settings.num_recording_threads;
        let command_pools = create_command_pools(&context, slots)
            .map_err(|err| RenderError::InitializationFailed(format!("vkCreateCommandPool: {err}")))?;
        log::info!(
            "Vulkan render device created: {} frames in flight, {} recording thread(s)",
            settings.num_frames_in_flight,
            settings.num_recording_threads
        );

        Ok(Self {
            internal: Arc::new(VulkanDeviceInternal {
                context,
                frames_in_flight: settings.num_frames_in_flight,
                recording_threads: settings.num_recording_threads,
                command_pools,
                memories: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                images: Mutex::new(HashMap::new()),
                samplers: Mutex::new(HashMap::new()),
                renderpasses: Mutex::new(HashMap::new()),
                framebuffers: Mutex::new(HashMap::new()),
                interfaces: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                descriptor_pools: Mutex::new(HashMap::new()),
                descriptor_sets: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                semaphores: Mutex::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
            }),
        })
    }

    fn next_id(&self) -> usize {
        self.internal.next_id.fetch_add(1, Ordering::Relaxed)
    }

    // --- Handle resolution for command recording ---

    pub(crate) fn raw(&self) -> &ash::Device {
        &self.internal.context.device
    }

    pub(crate) fn debug_utils(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.internal.context.debug_utils.as_ref()
    }

    pub(crate) fn queue_family(&self, queue: QueueType) -> u32 {
        self.internal.context.queue_families.index(queue)
    }

    pub(crate) fn vk_buffer(&self, id: BufferId) -> Option<vk::Buffer> {
        lock(&self.internal.buffers).get(&id).map(|entry| entry.buffer)
    }

    pub(crate) fn vk_image(&self, id: ImageId) -> Option<(vk::Image, vk::ImageAspectFlags, Extent2D)> {
        lock(&self.internal.images)
            .get(&id)
            .map(|entry| (entry.image, entry.aspect, entry.extent))
    }

    pub(crate) fn vk_renderpass(&self, id: RenderpassId) -> Option<(vk::RenderPass, Vec<vk::ClearValue>)> {
        lock(&self.internal.renderpasses)
            .get(&id)
            .map(|entry| (entry.renderpass, entry.clear_values.clone()))
    }

    pub(crate) fn vk_framebuffer(&self, id: FramebufferId) -> Option<vk::Framebuffer> {
        lock(&self.internal.framebuffers).get(&id).copied()
    }

    pub(crate) fn vk_pipeline(&self, id: PipelineId) -> Option<vk::Pipeline> {
        lock(&self.internal.pipelines).get(&id).copied()
    }

    pub(crate) fn vk_pipeline_layout(&self, id: PipelineInterfaceId) -> Option<vk::PipelineLayout> {
        lock(&self.internal.interfaces).get(&id).map(|entry| entry.layout)
    }

    pub(crate) fn vk_descriptor_set(&self, id: DescriptorSetId) -> Option<vk::DescriptorSet> {
        lock(&self.internal.descriptor_sets).get(&id).map(|entry| entry.set)
    }

    fn set_object_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = self.debug_utils() else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(handle)
            .object_name(&name);
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            log::debug!("Failed to name object {name:?}: {err}");
        }
    }

    fn create_compatible_renderpass(
        &self,
        color_attachments: &[TextureAttachmentInfo],
        depth_attachment: Option<&TextureAttachmentInfo>,
    ) -> Result<vk::RenderPass, vk::Result> {
        let mut attachments: Vec<_> = color_attachments.iter().map(attachment_description).collect();
        let color_refs: Vec<_> = (0..color_attachments.len() as u32)
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .collect();
        let depth_ref = depth_attachment.map(|depth| {
            attachments.push(attachment_description(depth));
            vk::AttachmentReference {
                attachment: color_attachments.len() as u32,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            }
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }

        let attachment_stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS;
        let attachment_writes = vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        let dependencies = [
            vk::SubpassDependency::default()
                .src_subpass(vk::SUBPASS_EXTERNAL)
                .dst_subpass(0)
                .src_stage_mask(attachment_stages | vk::PipelineStageFlags::FRAGMENT_SHADER)
                .dst_stage_mask(attachment_stages)
                .src_access_mask(attachment_writes)
                .dst_access_mask(attachment_writes),
            vk::SubpassDependency::default()
                .src_subpass(0)
                .dst_subpass(vk::SUBPASS_EXTERNAL)
                .src_stage_mask(attachment_stages)
                .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::TRANSFER)
                .src_access_mask(attachment_writes)
                .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::TRANSFER_READ),
        ];

        let subpasses = [subpass];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        unsafe { self.raw().create_render_pass(&create_info, None) }
    }

    fn create_shader_modules(
        &self,
        info: &PipelineCreateInfo,
    ) -> Result<Vec<(vk::ShaderStageFlags, vk::ShaderModule)>, String> {
        let mut modules = Vec::new();
        for (stage, source) in info.shader_stages() {
            let created = if source.spirv.is_empty() {
                Err(format!("shader '{}' has no SPIR-V", source.filename))
            } else {
                let create_info = vk::ShaderModuleCreateInfo::default().code(&source.spirv);
                unsafe { self.raw().create_shader_module(&create_info, None) }
                    .map_err(|err| format!("shader '{}': {err}", source.filename))
            };
            match created {
                Ok(module) => modules.push((stage.into_vk(), module)),
                Err(details) => {
                    self.destroy_shader_modules(&modules);
                    return Err(details);
                }
            }
        }
        Ok(modules)
    }

    fn destroy_shader_modules(&self, modules: &[(vk::ShaderStageFlags, vk::ShaderModule)]) {
        for (_, module) in modules {
            unsafe { self.raw().destroy_shader_module(*module, None) };
        }
    }

    fn build_graphics_pipeline(
        &self,
        info: &PipelineCreateInfo,
        modules: &[(vk::ShaderStageFlags, vk::ShaderModule)],
        interface: &PipelineInterface,
        layout: vk::PipelineLayout,
        renderpass: vk::RenderPass,
    ) -> Result<vk::Pipeline, vk::Result> {
        let stages: Vec<_> = modules
            .iter()
            .map(|(stage, module)| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(*stage)
                    .module(*module)
                    .name(c"main")
            })
            .collect();

        let stride = info.vertex_stride();
        let vertex_bindings: Vec<_> = (stride > 0)
            .then_some(vk::VertexInputBindingDescription {
                binding: 0,
                stride,
                input_rate: vk::VertexInputRate::VERTEX,
            })
            .into_iter()
            .collect();
        let mut offset = 0;
        let vertex_attributes: Vec<_> = info
            .vertex_fields
            .iter()
            .enumerate()
            .map(|(location, field)| {
                let attribute = vk::VertexInputAttributeDescription {
                    location: location as u32,
                    binding: 0,
                    format: field.field.into_vk(),
                    offset,
                };
                offset += field.field.size_in_bytes();
                attribute
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&vertex_bindings)
            .vertex_attribute_descriptions(&vertex_attributes);

        let has_tessellation = modules
            .iter()
            .any(|(stage, _)| stage.contains(vk::ShaderStageFlags::TESSELLATION_CONTROL));
        let topology = if has_tessellation {
            vk::PrimitiveTopology::PATCH_LIST
        } else {
            info.resolved_primitive_mode().into_vk()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology);
        let tessellation = vk::PipelineTessellationStateCreateInfo::default().patch_control_points(3);
        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let cull_mode = if info.has_state(PipelineStateFlag::DisableCulling) {
            vk::CullModeFlags::NONE
        } else if info.has_state(PipelineStateFlag::InvertCulling) {
            vk::CullModeFlags::FRONT
        } else {
            vk::CullModeFlags::BACK
        };
        let depth_bias = info.resolved_depth_bias();
        let slope_bias = info.resolved_slope_scaled_depth_bias();
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0)
            .depth_bias_enable(depth_bias != 0.0 || slope_bias != 0.0)
            .depth_bias_constant_factor(depth_bias)
            .depth_bias_slope_factor(slope_bias);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .alpha_to_coverage_enable(info.has_state(PipelineStateFlag::EnableAlphaToCoverage));

        let has_depth = interface.depth_texture.is_some();
        let stencil_write_mask = if info.has_state(PipelineStateFlag::StencilWrite) {
            info.resolved_stencil_write_mask()
        } else {
            0
        };
        let stencil_face = |face: Option<StencilOpState>| {
            let state: vk::StencilOpState = (face.unwrap_or_default(), info.resolved_stencil_ref()).into_vk();
            state
                .compare_mask(info.resolved_stencil_read_mask())
                .write_mask(stencil_write_mask)
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(has_depth && !info.has_state(PipelineStateFlag::DisableDepthTest))
            .depth_write_enable(has_depth && !info.has_state(PipelineStateFlag::DisableDepthWrite))
            .depth_compare_op(info.resolved_depth_func().into_vk())
            .stencil_test_enable(info.has_state(PipelineStateFlag::EnableStencilTest))
            .front(stencil_face(info.front_face))
            .back(stencil_face(info.back_face))
            .max_depth_bounds(1.0);

        let color_write_mask = if info.has_state(PipelineStateFlag::DisableColorWrite) {
            vk::ColorComponentFlags::empty()
        } else if info.has_state(PipelineStateFlag::DisableAlphaWrite) {
            vk::ColorComponentFlags::R | vk::ColorComponentFlags::G | vk::ColorComponentFlags::B
        } else {
            vk::ColorComponentFlags::RGBA
        };
        let blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(info.has_state(PipelineStateFlag::Blending))
            .src_color_blend_factor(info.resolved_source_blend_factor().into_vk())
            .dst_color_blend_factor(info.resolved_destination_blend_factor().into_vk())
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(info.resolved_alpha_src().into_vk())
            .dst_alpha_blend_factor(info.resolved_alpha_dst().into_vk())
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(color_write_mask);
        let blend_attachments = vec![blend_attachment; interface.color_attachments.len()];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(layout)
            .render_pass(renderpass)
            .subpass(0);
        if has_tessellation {
            create_info = create_info.tessellation_state(&tessellation);
        }

        let pipelines = unsafe {
            self.raw().create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&create_info),
                None,
            )
        }
        .map_err(|(_, err)| err)?;
        pipelines.into_iter().next().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    /// Allocates one command buffer from the pool of `(thread_index, frame_index, queue)`.
    fn allocate_command_buffer(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer, RenderError> {
        let threads = self.internal.recording_threads;
        if thread_index >= threads || frame_index >= self.internal.frames_in_flight {
            return Err(RenderError::Internal(format!(
                "no command pool for thread {thread_index} of frame {frame_index}"
            )));
        }
        let slot = (frame_index * threads + thread_index) as usize;
        let pool = lock(&self.internal.command_pools[slot])
            .get(&queue)
            .copied()
            .ok_or_else(|| RenderError::Internal(format!("no {} command pool", queue_label(queue))))?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(1);
        unsafe { self.raw().allocate_command_buffers(&allocate_info) }
            .map_err(|err| render_error("vkAllocateCommandBuffers", err))?
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::Internal("no command buffer was allocated".to_string()))
    }

    fn bind_buffer(
        &self,
        info: &BufferCreateInfo,
        memory: &DeviceMemoryResource,
        allocation: &AllocationInfo,
    ) -> Result<vk::Buffer, ResourceError> {
        let (vk_memory, type_index) = lock(&self.internal.memories)
            .get(&memory.memory().id)
            .map(|entry| (entry.memory, entry.type_index))
            .ok_or(ResourceError::InvalidHandle)?;

        let create_info = vk::BufferCreateInfo::default()
            .size(info.size.count())
            .usage(info.usage.into_vk())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.raw().create_buffer(&create_info, None) }
            .map_err(|err| backend_error("vkCreateBuffer", err))?;

        let requirements = unsafe { self.raw().get_buffer_memory_requirements(buffer) };
        let bound = check_placement(&info.name, &requirements, type_index, allocation).and_then(|()| {
            unsafe { self.raw().bind_buffer_memory(buffer, vk_memory, allocation.offset.count()) }
                .map_err(|err| backend_error("vkBindBufferMemory", err))
        });

        match bound {
            Ok(()) => Ok(buffer),
            Err(err) => {
                unsafe { self.raw().destroy_buffer(buffer, None) };
                Err(err)
            }
        }
    }

    fn create_image_resources(
        &self,
        name: &str,
        format: PixelFormat,
        extent: Extent2D,
    ) -> Result<ImageEntry, ResourceError> {
        let device = self.raw();
        let vk_format: vk::Format = format.into_vk();
        let aspect: vk::ImageAspectFlags = format.into_vk();
        let usage = if format.is_depth() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
        };

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk_format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&create_info, None) }
            .map_err(|err| backend_error("vkCreateImage", err))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let properties = &self.internal.context.memory_properties;
        let type_index = find_memory_type_for_requirements(
            properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .or_else(|| {
            find_memory_type_for_requirements(
                properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::empty(),
            )
        });
        let Some(type_index) = type_index else {
            unsafe { device.destroy_image(image, None) };
            return Err(ResourceError::BackendError(format!(
                "no memory type can hold image '{name}'"
            )));
        };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);
        let memory = match unsafe { device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(err) => {
                unsafe { device.destroy_image(image, None) };
                return Err(allocation_error(Bytes::new(requirements.size), err));
            }
        };

        let view = unsafe { device.bind_image_memory(image, memory, 0) }.and_then(|()| {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(vk_format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            unsafe { device.create_image_view(&view_info, None) }
        });
        match view {
            Ok(view) => Ok(ImageEntry {
                image,
                view,
                memory,
                aspect,
                extent,
            }),
            Err(err) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                Err(backend_error("vkCreateImageView", err))
            }
        }
    }
}

fn attachment_description(attachment: &TextureAttachmentInfo) -> vk::AttachmentDescription {
    let final_layout = if attachment.pixel_format.is_depth() {
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
    } else {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    };
    let (load_op, initial_layout) = if attachment.clear {
        (vk::AttachmentLoadOp::CLEAR, vk::ImageLayout::UNDEFINED)
    } else {
        (vk::AttachmentLoadOp::LOAD, final_layout)
    };
    let has_stencil = attachment.pixel_format == PixelFormat::DepthStencil;
    vk::AttachmentDescription::default()
        .format(attachment.pixel_format.into_vk())
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(if has_stencil {
            load_op
        } else {
            vk::AttachmentLoadOp::DONT_CARE
        })
        .stencil_store_op(if has_stencil {
            vk::AttachmentStoreOp::STORE
        } else {
            vk::AttachmentStoreOp::DONT_CARE
        })
        .initial_layout(initial_layout)
        .final_layout(final_layout)
}

fn clear_value(attachment: &TextureAttachmentInfo) -> vk::ClearValue {
    if attachment.pixel_format.is_depth() {
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        }
    } else {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }
    }
}

fn create_command_pools(context: &VulkanContext, slots: u32) -> Result<Vec<CommandPoolSlot>, vk::Result> {
    let destroy = |pools: HashMap<QueueType, vk::CommandPool>| {
        for pool in pools.into_values() {
            unsafe { context.device.destroy_command_pool(pool, None) };
        }
    };

    let mut created: Vec<HashMap<QueueType, vk::CommandPool>> = Vec::with_capacity(slots as usize);
    for _ in 0..slots {
        let mut slot = HashMap::new();
        for queue in QUEUE_TYPES {
            let create_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::TRANSIENT)
                .queue_family_index(context.queue_families.index(queue));
            match unsafe { context.device.create_command_pool(&create_info, None) } {
                Ok(pool) => {
                    slot.insert(queue, pool);
                }
                Err(err) => {
                    destroy(slot);
                    created.into_iter().for_each(destroy);
                    return Err(err);
                }
            }
        }
        created.push(slot);
    }
    Ok(created.into_iter().map(Mutex::new).collect())
}

impl RenderDevice for VulkanRenderDevice {
    fn info(&self) -> &DeviceInfo {
        &self.internal.context.info
    }

    fn num_frames_in_flight(&self) -> u32 {
        self.internal.frames_in_flight
    }

    fn allocate_device_memory(
        &self,
        size: Bytes,
        usage: MemoryUsage,
        allowed_objects: ObjectKinds,
    ) -> Result<DeviceMemory, ResourceError> {
        if size.is_zero() {
            return Err(ResourceError::BackendError(
                "cannot allocate an empty heap".to_string(),
            ));
        }
        let properties = &self.internal.context.memory_properties;
        let type_index = memory_type_for_usage(properties, usage).ok_or_else(|| {
            ResourceError::BackendError(format!("no memory type suits {usage:?} heaps"))
        })?;

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(size.count())
            .memory_type_index(type_index);
        let memory = unsafe { self.raw().allocate_memory(&allocate_info, None) }
            .map_err(|err| allocation_error(size, err))?;

        let mapped = if is_host_visible(properties, type_index) {
            match unsafe {
                self.raw()
                    .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
            } {
                Ok(ptr) => Some(MappedPtr(ptr.cast())),
                Err(err) => {
                    unsafe { self.raw().free_memory(memory, None) };
                    return Err(backend_error("vkMapMemory", err));
                }
            }
        } else {
            None
        };
        let coherent = properties.memory_types[type_index as usize]
            .property_flags
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT);

        let id = DeviceMemoryId(self.next_id());
        log::debug!(
            "Allocated {size} of {usage:?} memory from type {type_index} (mapped: {})",
            mapped.is_some()
        );
        lock(&self.internal.memories).insert(
            id,
            MemoryEntry {
                memory,
                type_index,
                mapped,
                coherent,
            },
        );
        Ok(DeviceMemory {
            id,
            size,
            usage,
            allowed_objects,
        })
    }

    fn free_device_memory(&self, memory: DeviceMemory) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.memories)
            .remove(&memory.id)
            .ok_or(ResourceError::InvalidHandle)?;
        let still_bound = lock(&self.internal.buffers)
            .values()
            .filter(|buffer| buffer.memory == memory.id)
            .count();
        if still_bound > 0 {
            log::warn!("Freeing heap {:?} with {still_bound} buffer(s) still bound", memory.id);
        }
        unsafe {
            if entry.mapped.is_some() {
                self.raw().unmap_memory(entry.memory);
            }
            self.raw().free_memory(entry.memory, None);
        }
        Ok(())
    }

    fn create_renderpass(
        &self,
        info: &RenderPassCreateInfo,
        framebuffer_size: Extent2D,
    ) -> Result<Renderpass, ResourceError> {
        info.validate(self.info().max_color_attachments)?;
        info.validate_framebuffer_size(framebuffer_size)?;

        let renderpass = self
            .create_compatible_renderpass(&info.texture_outputs, info.depth_texture.as_ref())
            .map_err(|err| backend_error("vkCreateRenderPass", err))?;
        self.set_object_name(renderpass, &info.name);

        let clear_values = info
            .texture_outputs
            .iter()
            .chain(info.depth_texture.as_ref())
            .map(clear_value)
            .collect();

        let id = RenderpassId(self.next_id());
        lock(&self.internal.renderpasses).insert(
            id,
            RenderpassEntry {
                renderpass,
                clear_values,
            },
        );
        Ok(Renderpass {
            id,
            name: info.name.clone(),
            render_area: Rect2D::from_extent(framebuffer_size),
            color_attachment_count: info.texture_outputs.len() as u32,
            writes_to_backbuffer: info.writes_to_backbuffer(),
        })
    }

    fn create_framebuffer(
        &self,
        renderpass: &Renderpass,
        color_attachments: &[&Image],
        depth_attachment: Option<&Image>,
        framebuffer_size: Extent2D,
    ) -> Result<Framebuffer, ResourceError> {
        let vk_renderpass = lock(&self.internal.renderpasses)
            .get(&renderpass.id)
            .map(|entry| entry.renderpass)
            .ok_or(ResourceError::InvalidHandle)?;
        let views = {
            let images = lock(&self.internal.images);
            color_attachments
                .iter()
                .copied()
                .chain(depth_attachment)
                .map(|image| images.get(&image.id).map(|entry| entry.view))
                .collect::<Option<Vec<_>>>()
                .ok_or(ResourceError::InvalidHandle)?
        };

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(vk_renderpass)
            .attachments(&views)
            .width(framebuffer_size.width)
            .height(framebuffer_size.height)
            .layers(1);
        let framebuffer = unsafe { self.raw().create_framebuffer(&create_info, None) }
            .map_err(|err| backend_error("vkCreateFramebuffer", err))?;
        self.set_object_name(framebuffer, &renderpass.name);

        let id = FramebufferId(self.next_id());
        lock(&self.internal.framebuffers).insert(id, framebuffer);
        Ok(Framebuffer {
            id,
            extent: framebuffer_size,
            attachment_count: views.len() as u32,
        })
    }

    fn create_pipeline_interface(
        &self,
        bindings: &HashMap<String, ResourceBindingDescription>,
        color_attachments: &[TextureAttachmentInfo],
        depth_texture: Option<&TextureAttachmentInfo>,
    ) -> Result<PipelineInterface, ResourceError> {
        let interface = PipelineInterface {
            id: PipelineInterfaceId(self.next_id()),
            bindings: bindings.clone(),
            color_attachments: color_attachments.to_vec(),
            depth_texture: depth_texture.cloned(),
        };
        let device = self.raw();
        let layout_error =
            |what: &str, err: vk::Result| PipelineError::LayoutCreationFailed(format!("{what}: {err}"));

        // Sets without bindings still get an (empty) layout so indices line up.
        let mut set_layouts = Vec::new();
        for set in 0..interface.set_count() {
            let layout_bindings: Vec<_> = interface
                .bindings_in_set(set)
                .into_iter()
                .map(|(_, binding)| {
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.binding)
                        .descriptor_type(binding.descriptor_type.into_vk())
                        .descriptor_count(binding.count)
                        .stage_flags(binding.stages.into_vk())
                })
                .collect();
            let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
            match unsafe { device.create_descriptor_set_layout(&create_info, None) } {
                Ok(layout) => set_layouts.push(layout),
                Err(err) => {
                    for layout in set_layouts {
                        unsafe { device.destroy_descriptor_set_layout(layout, None) };
                    }
                    return Err(layout_error("vkCreateDescriptorSetLayout", err).into());
                }
            }
        }

        let destroy_set_layouts = |layouts: &[vk::DescriptorSetLayout]| {
            for layout in layouts {
                unsafe { device.destroy_descriptor_set_layout(*layout, None) };
            }
        };

        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = match unsafe { device.create_pipeline_layout(&layout_info, None) } {
            Ok(layout) => layout,
            Err(err) => {
                destroy_set_layouts(&set_layouts);
                return Err(layout_error("vkCreatePipelineLayout", err).into());
            }
        };

        let renderpass = match self.create_compatible_renderpass(color_attachments, depth_texture) {
            Ok(renderpass) => renderpass,
            Err(err) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                destroy_set_layouts(&set_layouts);
                return Err(layout_error("vkCreateRenderPass", err).into());
            }
        };

        lock(&self.internal.interfaces).insert(
            interface.id,
            InterfaceEntry {
                layout,
                set_layouts,
                renderpass,
            },
        );
        Ok(interface)
    }

    fn create_pipeline(
        &self,
        interface: &PipelineInterface,
        info: &PipelineCreateInfo,
    ) -> Result<Pipeline, ResourceError> {
        let (layout, renderpass) = lock(&self.internal.interfaces)
            .get(&interface.id)
            .map(|entry| (entry.layout, entry.renderpass))
            .ok_or(ResourceError::InvalidHandle)?;
        let compilation_failed = |details: String| {
            ResourceError::Pipeline(PipelineError::CompilationFailed {
                pipeline: info.name.clone(),
                details,
            })
        };

        let modules = self.create_shader_modules(info).map_err(compilation_failed)?;
        let built = self.build_graphics_pipeline(info, &modules, interface, layout, renderpass);
        self.destroy_shader_modules(&modules);
        let pipeline = built.map_err(|err| compilation_failed(format!("vkCreateGraphicsPipelines: {err}")))?;
        self.set_object_name(pipeline, &info.name);

        let id = PipelineId(self.next_id());
        lock(&self.internal.pipelines).insert(id, pipeline);
        log::debug!("Created pipeline '{}' for pass '{}'", info.name, info.pass);
        Ok(Pipeline {
            id,
            name: info.name.clone(),
            interface: interface.id,
        })
    }

    fn create_descriptor_pool(
        &self,
        capacity: &HashMap<DescriptorType, u32>,
        max_sets: u32,
    ) -> Result<DescriptorPool, ResourceError> {
        if max_sets == 0 {
            return Err(ResourceError::BackendError(
                "a descriptor pool needs room for at least one set".to_string(),
            ));
        }
        let pool_sizes: Vec<_> = capacity
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(descriptor_type, count)| vk::DescriptorPoolSize {
                ty: descriptor_type.into_vk(),
                descriptor_count: *count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe { self.raw().create_descriptor_pool(&create_info, None) }
            .map_err(|err| backend_error("vkCreateDescriptorPool", err))?;

        let id = DescriptorPoolId(self.next_id());
        lock(&self.internal.descriptor_pools).insert(id, pool);
        Ok(DescriptorPool { id, max_sets })
    }

    fn create_descriptor_sets(
        &self,
        interface: &PipelineInterface,
        pool: &DescriptorPool,
    ) -> Result<Vec<DescriptorSet>, ResourceError> {
        let set_layouts = lock(&self.internal.interfaces)
            .get(&interface.id)
            .map(|entry| entry.set_layouts.clone())
            .ok_or(ResourceError::InvalidHandle)?;
        if set_layouts.is_empty() {
            return Ok(Vec::new());
        }
        let vk_pool = lock(&self.internal.descriptor_pools)
            .get(&pool.id)
            .copied()
            .ok_or(ResourceError::InvalidHandle)?;

        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(vk_pool)
            .set_layouts(&set_layouts);
        let vk_sets = unsafe { self.raw().allocate_descriptor_sets(&allocate_info) }.map_err(|err| {
            match err {
                vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL => {
                    ResourceError::BackendError(format!(
                        "descriptor pool {:?} is exhausted: {err}",
                        pool.id
                    ))
                }
                other => backend_error("vkAllocateDescriptorSets", other),
            }
        })?;

        let mut registry = lock(&self.internal.descriptor_sets);
        Ok(vk_sets
            .into_iter()
            .enumerate()
            .map(|(set_index, set)| {
                let id = DescriptorSetId(self.next_id());
                registry.insert(id, DescriptorSetEntry { set, pool: pool.id });
                DescriptorSet {
                    id,
                    set_index: set_index as u32,
                }
            })
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorSetWrite<'_>]) -> Result<(), ResourceError> {
        enum Resolved {
            Image(vk::DescriptorImageInfo),
            Buffer(vk::DescriptorBufferInfo),
        }

        let resolved = {
            let sets = lock(&self.internal.descriptor_sets);
            let images = lock(&self.internal.images);
            let samplers = lock(&self.internal.samplers);
            let buffers = lock(&self.internal.buffers);
            writes
                .iter()
                .map(|write| {
                    let set = sets
                        .get(&write.set.id)
                        .map(|entry| entry.set)
                        .ok_or(ResourceError::InvalidHandle)?;
                    let info = match write.resource {
                        DescriptorResource::Image { image, sampler } => {
                            let image = images.get(&image.id).ok_or(ResourceError::InvalidHandle)?;
                            let sampler = samplers.get(&sampler.id).ok_or(ResourceError::InvalidHandle)?;
                            let layout = if image.aspect.contains(vk::ImageAspectFlags::DEPTH) {
                                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                            } else {
                                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                            };
                            Resolved::Image(
                                vk::DescriptorImageInfo::default()
                                    .sampler(*sampler)
                                    .image_view(image.view)
                                    .image_layout(layout),
                            )
                        }
                        DescriptorResource::UniformBuffer(buffer)
                        | DescriptorResource::StorageBuffer(buffer) => {
                            let entry = buffers.get(&buffer.id).ok_or(ResourceError::InvalidHandle)?;
                            Resolved::Buffer(
                                vk::DescriptorBufferInfo::default()
                                    .buffer(entry.buffer)
                                    .offset(0)
                                    .range(buffer.size.count()),
                            )
                        }
                    };
                    Ok((set, write.binding, write.resource.descriptor_type(), info))
                })
                .collect::<Result<Vec<_>, ResourceError>>()?
        };

        let vk_writes: Vec<_> = resolved
            .iter()
            .map(|(set, binding, descriptor_type, info)| {
                let write = vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(*binding)
                    .descriptor_type(descriptor_type.into_vk());
                match info {
                    Resolved::Image(image) => write.image_info(std::slice::from_ref(image)),
                    Resolved::Buffer(buffer) => write.buffer_info(std::slice::from_ref(buffer)),
                }
            })
            .collect();
        unsafe { self.raw().update_descriptor_sets(&vk_writes, &[]) };
        Ok(())
    }

    fn reset_descriptor_pool(&self, pool: &DescriptorPool) -> Result<(), ResourceError> {
        let vk_pool = lock(&self.internal.descriptor_pools)
            .get(&pool.id)
            .copied()
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe {
            self.raw()
                .reset_descriptor_pool(vk_pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|err| backend_error("vkResetDescriptorPool", err))?;
        lock(&self.internal.descriptor_sets).retain(|_, entry| entry.pool != pool.id);
        Ok(())
    }

    fn create_buffer(
        &self,
        info: &BufferCreateInfo,
        memory: &mut DeviceMemoryResource,
    ) -> Result<Buffer, ResourceError> {
        if !memory.memory().allowed_objects.contains(ObjectKinds::BUFFER) {
            return Err(ResourceError::BackendError(format!(
                "heap {:?} does not accept buffers",
                memory.memory().id
            )));
        }
        let allocation = memory
            .allocate(info.size)
            .ok_or(ResourceError::OutOfDeviceMemory { requested: info.size })?;

        let buffer = match self.bind_buffer(info, memory, &allocation) {
            Ok(buffer) => buffer,
            Err(err) => {
                memory.free(&allocation);
                return Err(err);
            }
        };
        self.set_object_name(buffer, &info.name);

        let id = BufferId(self.next_id());
        lock(&self.internal.buffers).insert(
            id,
            BufferEntry {
                buffer,
                memory: memory.memory().id,
                offset: allocation.offset,
            },
        );
        Ok(Buffer {
            id,
            size: info.size,
            usage: info.usage,
            allocation,
        })
    }

    fn write_data_to_buffer(
        &self,
        data: &[u8],
        offset: Bytes,
        buffer: &Buffer,
    ) -> Result<(), ResourceError> {
        let len = Bytes::new(data.len() as u64);
        match offset.checked_add(len) {
            Some(end) if end <= buffer.size => {}
            end => {
                return Err(ResourceError::OutOfBounds {
                    end: end.unwrap_or(Bytes::new(u64::MAX)),
                    size: buffer.size,
                })
            }
        }

        let (memory_id, base) = lock(&self.internal.buffers)
            .get(&buffer.id)
            .map(|entry| (entry.memory, entry.offset))
            .ok_or(ResourceError::InvalidHandle)?;
        let memories = lock(&self.internal.memories);
        let memory = memories.get(&memory_id).ok_or(ResourceError::InvalidHandle)?;
        let mapped = memory.mapped.as_ref().ok_or(ResourceError::InvalidHandle)?;

        let start = (base + offset).count() as usize;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.0.add(start), data.len());
        }
        if !memory.coherent {
            let range = vk::MappedMemoryRange::default()
                .memory(memory.memory)
                .offset(0)
                .size(vk::WHOLE_SIZE);
            unsafe { self.raw().flush_mapped_memory_ranges(std::slice::from_ref(&range)) }
                .map_err(|err| backend_error("vkFlushMappedMemoryRanges", err))?;
        }
        Ok(())
    }

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Sampler, ResourceError> {
        let filter: vk::Filter = info.filter.into_vk();
        let address_mode: vk::SamplerAddressMode = info.wrap_mode.into_vk();
        let mipmap_mode = if filter == vk::Filter::NEAREST {
            vk::SamplerMipmapMode::NEAREST
        } else {
            vk::SamplerMipmapMode::LINEAR
        };
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter)
            .min_filter(filter)
            .mipmap_mode(mipmap_mode)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .max_lod(vk::LOD_CLAMP_NONE);
        let sampler = unsafe { self.raw().create_sampler(&create_info, None) }
            .map_err(|err| backend_error("vkCreateSampler", err))?;
        self.set_object_name(sampler, &info.name);

        let id = SamplerId(self.next_id());
        lock(&self.internal.samplers).insert(id, sampler);
        Ok(Sampler {
            id,
            name: info.name.clone(),
        })
    }

    fn create_image(
        &self,
        info: &TextureCreateInfo,
        screen_size: Extent2D,
    ) -> Result<Image, ResourceError> {
        let extent = info.format.size_in_pixels(screen_size);
        if extent.is_empty() {
            return Err(ResourceError::BackendError(format!(
                "image '{}' resolves to an empty extent {}x{}",
                info.name, extent.width, extent.height
            )));
        }
        let entry = self.create_image_resources(&info.name, info.format.pixel_format, extent)?;
        self.set_object_name(entry.image, &info.name);

        let id = ImageId(self.next_id());
        lock(&self.internal.images).insert(id, entry);
        log::debug!(
            "Created image '{}' ({:?}, {}x{})",
            info.name,
            info.format.pixel_format,
            extent.width,
            extent.height
        );
        Ok(Image {
            id,
            name: info.name.clone(),
            format: info.format.pixel_format,
            extent,
        })
    }

    fn create_semaphore(&self) -> Result<Semaphore, ResourceError> {
        let semaphore = unsafe {
            self.raw()
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
        }
        .map_err(|err| backend_error("vkCreateSemaphore", err))?;
        let id = SemaphoreId(self.next_id());
        lock(&self.internal.semaphores).insert(id, semaphore);
        Ok(Semaphore { id })
    }

    fn create_fence(&self, signaled: bool) -> Result<Fence, ResourceError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            self.raw()
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
        }
        .map_err(|err| backend_error("vkCreateFence", err))?;
        let id = FenceId(self.next_id());
        lock(&self.internal.fences).insert(id, fence);
        Ok(Fence { id })
    }

    fn wait_for_fences(&self, fences: &[&Fence]) -> Result<(), RenderError> {
        if fences.is_empty() {
            return Ok(());
        }
        let handles = {
            let registry = lock(&self.internal.fences);
            fences
                .iter()
                .map(|fence| registry.get(&fence.id).copied())
                .collect::<Option<Vec<_>>>()
                .ok_or(ResourceError::InvalidHandle)?
        };
        unsafe { self.raw().wait_for_fences(&handles, true, u64::MAX) }
            .map_err(|err| render_error("vkWaitForFences", err))
    }

    fn reset_fences(&self, fences: &[&Fence]) -> Result<(), RenderError> {
        if fences.is_empty() {
            return Ok(());
        }
        let handles = {
            let registry = lock(&self.internal.fences);
            fences
                .iter()
                .map(|fence| registry.get(&fence.id).copied())
                .collect::<Option<Vec<_>>>()
                .ok_or(ResourceError::InvalidHandle)?
        };
        unsafe { self.raw().reset_fences(&handles) }.map_err(|err| render_error("vkResetFences", err))
    }

    fn destroy_renderpass(&self, renderpass: Renderpass) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.renderpasses)
            .remove(&renderpass.id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.raw().destroy_render_pass(entry.renderpass, None) };
        Ok(())
    }

    fn destroy_framebuffer(&self, framebuffer: Framebuffer) -> Result<(), ResourceError> {
        let vk_framebuffer = lock(&self.internal.framebuffers)
            .remove(&framebuffer.id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.raw().destroy_framebuffer(vk_framebuffer, None) };
        Ok(())
    }

    fn destroy_pipeline_interface(&self, interface: PipelineInterface) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.interfaces)
            .remove(&interface.id)
            .ok_or(ResourceError::InvalidHandle)?;
        destroy_interface(self.raw(), entry);
        Ok(())
    }

    fn destroy_pipeline(&self, pipeline: Pipeline) -> Result<(), ResourceError> {
        let vk_pipeline = lock(&self.internal.pipelines)
            .remove(&pipeline.id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.raw().destroy_pipeline(vk_pipeline, None) };
        Ok(())
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPool) -> Result<(), ResourceError> {
        let vk_pool = lock(&self.internal.descriptor_pools)
            .remove(&pool.id)
            .ok_or(ResourceError::InvalidHandle)?;
        lock(&self.internal.descriptor_sets).retain(|_, entry| entry.pool != pool.id);
        unsafe { self.raw().destroy_descriptor_pool(vk_pool, None) };
        Ok(())
    }

    fn destroy_buffer(
        &self,
        buffer: Buffer,
        memory: &mut DeviceMemoryResource,
    ) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.buffers)
            .remove(&buffer.id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.raw().destroy_buffer(entry.buffer, None) };
        memory.free(&buffer.allocation);
        Ok(())
    }

    fn destroy_image(&self, image: Image) -> Result<(), ResourceError> {
        let entry = lock(&self.internal.images)
            .remove(&image.id)
            .ok_or(ResourceError::InvalidHandle)?;
        destroy_image_entry(self.raw(), entry);
        Ok(())
    }

    fn destroy_sampler(&self, sampler: Sampler) -> Result<(), ResourceError> {
        let vk_sampler = lock(&self.internal.samplers)
            .remove(&sampler.id)
            .ok_or(ResourceError::InvalidHandle)?;
        unsafe { self.raw().destroy_sampler(vk_sampler, None) };
        Ok(())
    }

    fn destroy_semaphores(&self, semaphores: Vec<Semaphore>) -> Result<(), ResourceError> {
        let mut registry = lock(&self.internal.semaphores);
        for semaphore in semaphores {
            let vk_semaphore = registry.remove(&semaphore.id).ok_or(ResourceError::InvalidHandle)?;
            unsafe { self.raw().destroy_semaphore(vk_semaphore, None) };
        }
        Ok(())
    }

    fn destroy_fences(&self, fences: Vec<Fence>) -> Result<(), ResourceError> {
        let mut registry = lock(&self.internal.fences);
        for fence in fences {
            let vk_fence = registry.remove(&fence.id).ok_or(ResourceError::InvalidHandle)?;
            unsafe { self.raw().destroy_fence(vk_fence, None) };
        }
        Ok(())
    }

    fn begin_frame(&self, frame_index: u32) -> Result<(), RenderError> {
        if frame_index >= self.internal.frames_in_flight {
            return Err(RenderError::Internal(format!(
                "frame index {frame_index} is out of range for {} frames in flight",
                self.internal.frames_in_flight
            )));
        }
        let threads = self.internal.recording_threads;
        for thread in 0..threads {
            let slot = (frame_index * threads + thread) as usize;
            let pools = lock(&self.internal.command_pools[slot]);
            for pool in pools.values() {
                unsafe {
                    self.raw()
                        .reset_command_pool(*pool, vk::CommandPoolResetFlags::empty())
                }
                .map_err(|err| render_error("vkResetCommandPool", err))?;
            }
        }
        Ok(())
    }

    fn create_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        level: CommandListLevel,
    ) -> Result<Box<dyn CommandList>, RenderError> {
        let vk_level = match level {
            CommandListLevel::Primary => vk::CommandBufferLevel::PRIMARY,
            CommandListLevel::Secondary => vk::CommandBufferLevel::SECONDARY,
        };
        let command_buffer = self.allocate_command_buffer(thread_index, frame_index, queue, vk_level)?;

        let inheritance = vk::CommandBufferInheritanceInfo::default();
        let mut begin_info =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if level == CommandListLevel::Secondary {
            begin_info = begin_info.inheritance_info(&inheritance);
        }
        unsafe { self.raw().begin_command_buffer(command_buffer, &begin_info) }
            .map_err(|err| render_error("vkBeginCommandBuffer", err))?;

        Ok(Box::new(VulkanCommandList::new(
            self.clone(),
            command_buffer,
            CommandListTracker::new(level),
        )))
    }

    fn create_secondary_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        renderpass: &Renderpass,
        framebuffer: &Framebuffer,
    ) -> Result<Box<dyn CommandList>, RenderError> {
        let (vk_renderpass, _) = self
            .vk_renderpass(renderpass.id)
            .ok_or(RenderError::ResourceError(ResourceError::InvalidHandle))?;
        let vk_framebuffer = self
            .vk_framebuffer(framebuffer.id)
            .ok_or(RenderError::ResourceError(ResourceError::InvalidHandle))?;
        let command_buffer = self.allocate_command_buffer(
            thread_index,
            frame_index,
            queue,
            vk::CommandBufferLevel::SECONDARY,
        )?;

        let inheritance = vk::CommandBufferInheritanceInfo::default()
            .render_pass(vk_renderpass)
            .subpass(0)
            .framebuffer(vk_framebuffer);
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
                    | vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
            )
            .inheritance_info(&inheritance);
        unsafe { self.raw().begin_command_buffer(command_buffer, &begin_info) }
            .map_err(|err| render_error("vkBeginCommandBuffer", err))?;
        set_render_area(self.raw(), command_buffer, renderpass.render_area.into_vk());

        Ok(Box::new(VulkanCommandList::new(
            self.clone(),
            command_buffer,
            CommandListTracker::continuing_renderpass(),
        )))
    }

    fn submit_command_list(
        &self,
        list: Box<dyn CommandList>,
        queue: QueueType,
        fence_to_signal: Option<&Fence>,
        wait_semaphores: &[&Semaphore],
        signal_semaphores: &[&Semaphore],
    ) -> Result<(), RenderError> {
        let mut list = list.into_any().downcast::<VulkanCommandList>().map_err(|_| {
            RenderError::SubmissionFailed("command list was not recorded by this device".to_string())
        })?;
        if list.level() != CommandListLevel::Primary {
            return Err(RenderError::SubmissionFailed(
                "only primary command lists can be submitted".to_string(),
            ));
        }
        let command_buffer = list.finish()?;

        let fence = match fence_to_signal {
            Some(fence) => lock(&self.internal.fences)
                .get(&fence.id)
                .copied()
                .ok_or(ResourceError::InvalidHandle)?,
            None => vk::Fence::null(),
        };
        let (waits, signals) = {
            let registry = lock(&self.internal.semaphores);
            let resolve = |semaphores: &[&Semaphore]| {
                semaphores
                    .iter()
                    .map(|semaphore| registry.get(&semaphore.id).copied())
                    .collect::<Option<Vec<_>>>()
                    .ok_or(ResourceError::InvalidHandle)
            };
            (resolve(wait_semaphores)?, resolve(signal_semaphores)?)
        };
        let wait_stages = vec![vk::PipelineStageFlags::ALL_COMMANDS; waits.len()];

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&waits)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signals);

        let vk_queue = self.internal.context.queue(queue).ok_or_else(|| {
            RenderError::SubmissionFailed(format!("no {} queue", queue_label(queue)))
        })?;
        let vk_queue = lock(vk_queue);
        unsafe {
            self.raw()
                .queue_submit(*vk_queue, std::slice::from_ref(&submit_info), fence)
        }
        .map_err(|err| match err {
            vk::Result::ERROR_DEVICE_LOST => RenderError::DeviceLost,
            other => RenderError::SubmissionFailed(format!("vkQueueSubmit: {other}")),
        })
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        unsafe { self.raw().device_wait_idle() }.map_err(|err| render_error("vkDeviceWaitIdle", err))
    }
}

fn destroy_interface(device: &ash::Device, entry: InterfaceEntry) {
    unsafe {
        device.destroy_pipeline_layout(entry.layout, None);
        for layout in entry.set_layouts {
            device.destroy_descriptor_set_layout(layout, None);
        }
        device.destroy_render_pass(entry.renderpass, None);
    }
}

fn destroy_image_entry(device: &ash::Device, entry: ImageEntry) {
    unsafe {
        device.destroy_image_view(entry.view, None);
        device.destroy_image(entry.image, None);
        device.free_memory(entry.memory, None);
    }
}

impl Drop for VulkanDeviceInternal {
    fn drop(&mut self) {
        let device = &self.context.device;
        if let Err(err) = unsafe { device.device_wait_idle() } {
            log::warn!("Device did not go idle before destruction: {err}");
        }

        fn drain<K, V>(registry: &mut Mutex<HashMap<K, V>>) -> Vec<V> {
            registry
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .drain()
                .map(|(_, value)| value)
                .collect()
        }

        let framebuffers = drain(&mut self.framebuffers);
        let pipelines = drain(&mut self.pipelines);
        let interfaces = drain(&mut self.interfaces);
        let renderpasses = drain(&mut self.renderpasses);
        let descriptor_pools = drain(&mut self.descriptor_pools);
        drain(&mut self.descriptor_sets);
        let samplers = drain(&mut self.samplers);
        let images = drain(&mut self.images);
        let buffers = drain(&mut self.buffers);
        let memories = drain(&mut self.memories);
        let fences = drain(&mut self.fences);
        let semaphores = drain(&mut self.semaphores);

        let leaked = framebuffers.len()
            + pipelines.len()
            + interfaces.len()
            + renderpasses.len()
            + descriptor_pools.len()
            + samplers.len()
            + images.len()
            + buffers.len()
            + memories.len()
            + fences.len()
            + semaphores.len();
        if leaked > 0 {
            log::warn!("Destroying {leaked} Vulkan object(s) that were never released");
        }

        unsafe {
            for framebuffer in framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for pipeline in pipelines {
                device.destroy_pipeline(pipeline, None);
            }
            for entry in interfaces {
                destroy_interface(device, entry);
            }
            for entry in renderpasses {
                device.destroy_render_pass(entry.renderpass, None);
            }
            for pool in descriptor_pools {
                device.destroy_descriptor_pool(pool, None);
            }
            for sampler in samplers {
                device.destroy_sampler(sampler, None);
            }
            for entry in images {
                destroy_image_entry(device, entry);
            }
            for entry in buffers {
                device.destroy_buffer(entry.buffer, None);
            }
            for entry in memories {
                if entry.mapped.is_some() {
                    device.unmap_memory(entry.memory);
                }
                device.free_memory(entry.memory, None);
            }
            for fence in fences {
                device.destroy_fence(fence, None);
            }
            for semaphore in semaphores {
                device.destroy_semaphore(semaphore, None);
            }
            for slot in self.command_pools.drain(..) {
                for pool in slot.into_inner().unwrap_or_else(PoisonError::into_inner).into_values() {
                    device.destroy_command_pool(pool, None);
                }
            }
        }
        log::info!("Vulkan render device destroyed");
    }
}
