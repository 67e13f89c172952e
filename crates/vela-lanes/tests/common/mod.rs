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

//! A recording `RenderDevice` shared by the lane integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use vela_core::math::{Extent2D, Rect2D};
use vela_core::memory::{Bytes, DeviceMemory, DeviceMemoryId, DeviceMemoryResource, MemoryUsage, ObjectKinds};
use vela_core::renderer::*;
use vela_core::shaderpack::{
    PipelineCreateInfo, PixelFormat, RenderPassCreateInfo, SamplerCreateInfo, ShaderResource,
    ShaderSource, TextureAttachmentInfo, TextureCreateInfo, TextureDimensionType, TextureFormat,
};

#[derive(Debug, Default)]
struct MockState {
    next_id: usize,
    live: HashMap<usize, String>,
    calls: Vec<String>,
    signaled_fences: HashSet<usize>,
    pool_sets: HashMap<usize, (u32, u32)>,
}

impl MockState {
    fn create(&mut self, kind: &str) -> usize {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, kind.to_string());
        id
    }

    fn destroy(&mut self, kind: &str, id: usize) -> Result<(), ResourceError> {
        match self.live.remove(&id) {
            Some(live_kind) if live_kind == kind => Ok(()),
            _ => Err(ResourceError::InvalidHandle),
        }
    }
}

/// Records every call and tracks every object it hands out.
#[derive(Debug)]
pub struct MockRenderDevice {
    info: DeviceInfo,
    frames: u32,
    state: Mutex<MockState>,
    failing_pipelines: Mutex<HashSet<String>>,
    commands: Arc<Mutex<Vec<String>>>,
}

impl MockRenderDevice {
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "Mock GPU".to_string(),
                max_color_attachments: 8,
                max_texture_size: Bytes::new(16384),
                ..Default::default()
            },
            frames: 3,
            state: Mutex::new(MockState::default()),
            failing_pipelines: Mutex::new(HashSet::new()),
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes `create_pipeline` fail for `name`.
    pub fn fail_pipeline(&self, name: &str) {
        self.failing_pipelines.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    /// Commands recorded into every command list of this device.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn live_count(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn live_of_kind(&self, kind: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .live
            .values()
            .filter(|live| live.as_str() == kind)
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn create(&self, kind: &str, call: String) -> usize {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.create(kind)
    }

    fn destroy(&self, kind: &str, id: usize) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("destroy_{kind}:{id}"));
        state.destroy(kind, id)
    }
}

impl RenderDevice for MockRenderDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn num_frames_in_flight(&self) -> u32 {
        self.frames
    }

    fn allocate_device_memory(
        &self,
        size: Bytes,
        usage: MemoryUsage,
        allowed_objects: ObjectKinds,
    ) -> Result<DeviceMemory, ResourceError> {
        let id = self.create("memory", format!("allocate_memory:{usage:?}:{}", size.count()));
        Ok(DeviceMemory {
            id: DeviceMemoryId(id),
            size,
            usage,
            allowed_objects,
        })
    }

    fn free_device_memory(&self, memory: DeviceMemory) -> Result<(), ResourceError> {
        self.destroy("memory", memory.id.0)
    }

    fn create_renderpass(
        &self,
        info: &RenderPassCreateInfo,
        framebuffer_size: Extent2D,
    ) -> Result<Renderpass, ResourceError> {
        info.validate(self.info.max_color_attachments)?;
        info.validate_framebuffer_size(framebuffer_size)?;
        let id = self.create("renderpass", format!("create_renderpass:{}", info.name));
        Ok(Renderpass {
            id: RenderpassId(id),
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
        let names: Vec<&str> = color_attachments
            .iter()
            .chain(depth_attachment.iter())
            .map(|image| image.name.as_str())
            .collect();
        let id = self.create(
            "framebuffer",
            format!("create_framebuffer:{}:{}", renderpass.name, names.join(",")),
        );
        Ok(Framebuffer {
            id: FramebufferId(id),
            extent: framebuffer_size,
            attachment_count: names.len() as u32,
        })
    }

    fn create_pipeline_interface(
        &self,
        bindings: &HashMap<String, ResourceBindingDescription>,
        color_attachments: &[TextureAttachmentInfo],
        depth_texture: Option<&TextureAttachmentInfo>,
    ) -> Result<PipelineInterface, ResourceError> {
        let id = self.create("interface", format!("create_interface:{}", bindings.len()));
        Ok(PipelineInterface {
            id: PipelineInterfaceId(id),
            bindings: bindings.clone(),
            color_attachments: color_attachments.to_vec(),
            depth_texture: depth_texture.cloned(),
        })
    }

    fn create_pipeline(
        &self,
        interface: &PipelineInterface,
        info: &PipelineCreateInfo,
    ) -> Result<Pipeline, ResourceError> {
        if self.failing_pipelines.lock().unwrap().contains(&info.name) {
            self.record(format!("create_pipeline_failed:{}", info.name));
            return Err(PipelineError::CompilationFailed {
                pipeline: info.name.clone(),
                details: "rejected by mock".to_string(),
            }
            .into());
        }
        let id = self.create("pipeline", format!("create_pipeline:{}", info.name));
        Ok(Pipeline {
            id: PipelineId(id),
            name: info.name.clone(),
            interface: interface.id,
        })
    }

    fn create_descriptor_pool(
        &self,
        capacity: &HashMap<DescriptorType, u32>,
        max_sets: u32,
    ) -> Result<DescriptorPool, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let total: u32 = capacity.values().sum();
        state
            .calls
            .push(format!("create_descriptor_pool:{max_sets}:{total}"));
        let id = state.create("descriptor_pool");
        state.pool_sets.insert(id, (0, max_sets));
        Ok(DescriptorPool {
            id: DescriptorPoolId(id),
            max_sets,
        })
    }

    fn create_descriptor_sets(
        &self,
        interface: &PipelineInterface,
        pool: &DescriptorPool,
    ) -> Result<Vec<DescriptorSet>, ResourceError> {
        let mut state = self.state.lock().unwrap();
        let count = interface.set_count();
        let (used, max) = state
            .pool_sets
            .get(&pool.id.0)
            .copied()
            .ok_or(ResourceError::InvalidHandle)?;
        if used + count > max {
            return Err(ResourceError::BackendError("descriptor pool exhausted".to_string()));
        }
        state.pool_sets.insert(pool.id.0, (used + count, max));
        state.calls.push(format!("create_descriptor_sets:{count}"));
        Ok((0..count)
            .map(|set_index| {
                state.next_id += 1;
                DescriptorSet {
                    id: DescriptorSetId(state.next_id),
                    set_index,
                }
            })
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorSetWrite<'_>]) -> Result<(), ResourceError> {
        for write in writes {
            let target = match &write.resource {
                DescriptorResource::Image { image, sampler } => {
                    format!("{}+{}", image.name, sampler.name)
                }
                DescriptorResource::UniformBuffer(buffer)
                | DescriptorResource::StorageBuffer(buffer) => format!("buffer{}", buffer.id.0),
            };
            self.record(format!(
                "write_descriptor:set{}:binding{}:{target}",
                write.set.set_index, write.binding
            ));
        }
        Ok(())
    }

    fn reset_descriptor_pool(&self, pool: &DescriptorPool) -> Result<(), ResourceError> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .pool_sets
            .get_mut(&pool.id.0)
            .ok_or(ResourceError::InvalidHandle)?;
        entry.0 = 0;
        Ok(())
    }

    fn create_buffer(
        &self,
        info: &BufferCreateInfo,
        memory: &mut DeviceMemoryResource,
    ) -> Result<Buffer, ResourceError> {
        let allocation = memory
            .allocate(info.size)
            .ok_or(ResourceError::OutOfDeviceMemory { requested: info.size })?;
        let id = self.create("buffer", format!("create_buffer:{}", info.name));
        Ok(Buffer {
            id: BufferId(id),
            size: info.size,
            usage: info.usage,
            allocation,
        })
    }

    fn write_data_to_buffer(&self, data: &[u8], offset: Bytes, buffer: &Buffer) -> Result<(), ResourceError> {
        if !buffer.usage.is_host_visible() {
            return Err(ResourceError::InvalidHandle);
        }
        let end = offset + Bytes::new(data.len() as u64);
        if end > buffer.size {
            return Err(ResourceError::OutOfBounds {
                end,
                size: buffer.size,
            });
        }
        self.record(format!("write_buffer:{}:{}", buffer.id.0, data.len()));
        Ok(())
    }

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Sampler, ResourceError> {
        let id = self.create("sampler", format!("create_sampler:{}", info.name));
        Ok(Sampler {
            id: SamplerId(id),
            name: info.name.clone(),
        })
    }

    fn create_image(&self, info: &TextureCreateInfo, screen_size: Extent2D) -> Result<Image, ResourceError> {
        let extent = info.format.size_in_pixels(screen_size);
        if extent.is_empty() {
            return Err(ResourceError::BackendError(format!("'{}' has no pixels", info.name)));
        }
        let id = self.create("image", format!("create_image:{}", info.name));
        Ok(Image {
            id: ImageId(id),
            name: info.name.clone(),
            format: info.format.pixel_format,
            extent,
        })
    }

    fn create_semaphore(&self) -> Result<Semaphore, ResourceError> {
        let id = self.create("semaphore", "create_semaphore".to_string());
        Ok(Semaphore { id: SemaphoreId(id) })
    }

    fn create_fence(&self, signaled: bool) -> Result<Fence, ResourceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_fence:{signaled}"));
        let id = state.create("fence");
        if signaled {
            state.signaled_fences.insert(id);
        }
        Ok(Fence { id: FenceId(id) })
    }

    fn wait_for_fences(&self, fences: &[&Fence]) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap();
        for fence in fences {
            state.calls.push(format!("wait_fence:{}", fence.id.0));
            if !state.signaled_fences.contains(&fence.id.0) {
                return Err(RenderError::Internal("waited on a fence nothing signals".to_string()));
            }
        }
        Ok(())
    }

    fn reset_fences(&self, fences: &[&Fence]) -> Result<(), RenderError> {
        let mut state = self.state.lock().unwrap();
        for fence in fences {
            state.calls.push(format!("reset_fence:{}", fence.id.0));
            state.signaled_fences.remove(&fence.id.0);
        }
        Ok(())
    }

    fn destroy_renderpass(&self, renderpass: Renderpass) -> Result<(), ResourceError> {
        self.destroy("renderpass", renderpass.id.0)
    }

    fn destroy_framebuffer(&self, framebuffer: Framebuffer) -> Result<(), ResourceError> {
        self.destroy("framebuffer", framebuffer.id.0)
    }

    fn destroy_pipeline_interface(&self, interface: PipelineInterface) -> Result<(), ResourceError> {
        self.destroy("interface", interface.id.0)
    }

    fn destroy_pipeline(&self, pipeline: Pipeline) -> Result<(), ResourceError> {
        self.destroy("pipeline", pipeline.id.0)
    }

    fn destroy_descriptor_pool(&self, pool: DescriptorPool) -> Result<(), ResourceError> {
        self.state.lock().unwrap().pool_sets.remove(&pool.id.0);
        self.destroy("descriptor_pool", pool.id.0)
    }

    fn destroy_buffer(&self, buffer: Buffer, memory: &mut DeviceMemoryResource) -> Result<(), ResourceError> {
        memory.free(&buffer.allocation);
        self.destroy("buffer", buffer.id.0)
    }

    fn destroy_image(&self, image: Image) -> Result<(), ResourceError> {
        self.destroy("image", image.id.0)
    }

    fn destroy_sampler(&self, sampler: Sampler) -> Result<(), ResourceError> {
        self.destroy("sampler", sampler.id.0)
    }

    fn destroy_semaphores(&self, semaphores: Vec<Semaphore>) -> Result<(), ResourceError> {
        semaphores
            .into_iter()
            .try_for_each(|semaphore| self.destroy("semaphore", semaphore.id.0))
    }

    fn destroy_fences(&self, fences: Vec<Fence>) -> Result<(), ResourceError> {
        fences
            .into_iter()
            .try_for_each(|fence| self.destroy("fence", fence.id.0))
    }

    fn begin_frame(&self, frame_index: u32) -> Result<(), RenderError> {
        if frame_index >= self.frames {
            return Err(RenderError::Internal(format!("frame slot {frame_index} out of range")));
        }
        self.record(format!("begin_frame:{frame_index}"));
        Ok(())
    }

    fn create_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        level: CommandListLevel,
    ) -> Result<Box<dyn CommandList>, RenderError> {
        self.record(format!("create_command_list:{thread_index}:{frame_index}:{queue:?}"));
        Ok(Box::new(MockCommandList::new(level, self.commands.clone())))
    }

    fn create_secondary_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        renderpass: &Renderpass,
        _framebuffer: &Framebuffer,
    ) -> Result<Box<dyn CommandList>, RenderError> {
        self.record(format!(
            "create_secondary_command_list:{thread_index}:{frame_index}:{queue:?}:{}",
            renderpass.name
        ));
        Ok(Box::new(MockCommandList {
            tracker: CommandListTracker::continuing_renderpass(),
            log: self.commands.clone(),
        }))
    }

    fn submit_command_list(
        &self,
        list: Box<dyn CommandList>,
        queue: QueueType,
        fence_to_signal: Option<&Fence>,
        _wait_semaphores: &[&Semaphore],
        _signal_semaphores: &[&Semaphore],
    ) -> Result<(), RenderError> {
        let mut list = list
            .into_any()
            .downcast::<MockCommandList>()
            .map_err(|_| RenderError::Internal("foreign command list".to_string()))?;
        list.tracker.submit()?;

        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("submit:{queue:?}"));
        if let Some(fence) = fence_to_signal {
            state.signaled_fences.insert(fence.id.0);
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.record("wait_idle".to_string());
        Ok(())
    }
}

/// A command list that appends a line per command to a shared log.
#[derive(Debug)]
pub struct MockCommandList {
    tracker: CommandListTracker,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockCommandList {
    pub fn new(level: CommandListLevel, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            tracker: CommandListTracker::new(level),
            log,
        }
    }

    pub fn state(&self) -> CommandListState {
        self.tracker.state()
    }

    fn push(&self, command: String) {
        self.log.lock().unwrap().push(command);
    }
}

impl CommandList for MockCommandList {
    fn level(&self) -> CommandListLevel {
        self.tracker.level()
    }

    fn set_debug_name(&mut self, name: &str) -> Result<(), CommandListError> {
        self.tracker.record()?;
        self.push(format!("debug_name:{name}"));
        Ok(())
    }

    fn resource_barriers(
        &mut self,
        _stages_before: PipelineStage,
        _stages_after: PipelineStage,
        barriers: &[ResourceBarrier<'_>],
    ) -> Result<(), CommandListError> {
        self.tracker.record_outside_renderpass()?;
        self.push(format!("barriers:{}", barriers.len()));
        Ok(())
    }

    fn copy_buffer(
        &mut self,
        destination: &Buffer,
        destination_offset: Bytes,
        source: &Buffer,
        source_offset: Bytes,
        num_bytes: Bytes,
    ) -> Result<(), CommandListError> {
        self.tracker.record_outside_renderpass()?;
        check_buffer_range(destination_offset, num_bytes, destination.size)?;
        check_buffer_range(source_offset, num_bytes, source.size)?;
        self.push(format!("copy_buffer:{}", num_bytes.count()));
        Ok(())
    }

    fn upload_data_to_image(
        &mut self,
        image: &Image,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        staging_buffer: &Buffer,
        data: &[u8],
    ) -> Result<(), CommandListError> {
        self.tracker.record_outside_renderpass()?;
        check_buffer_range(Bytes::ZERO, Bytes::new(data.len() as u64), staging_buffer.size)?;
        self.push(format!(
            "upload_image:{}:{}",
            image.name,
            u64::from(width) * u64::from(height) * u64::from(bytes_per_pixel)
        ));
        Ok(())
    }

    fn execute_command_lists(&mut self, lists: Vec<Box<dyn CommandList>>) -> Result<(), CommandListError> {
        self.tracker.execute_secondaries()?;
        let count = lists.len();
        for list in lists {
            let mut list = list
                .into_any()
                .downcast::<MockCommandList>()
                .map_err(|_| CommandListError::InvalidHandle)?;
            self.tracker.execute(&mut list.tracker)?;
        }
        self.push(format!("execute:{count}"));
        Ok(())
    }

    fn begin_renderpass(
        &mut self,
        renderpass: &Renderpass,
        _framebuffer: &Framebuffer,
        contents: SubpassContents,
    ) -> Result<(), CommandListError> {
        self.tracker.begin_renderpass(contents)?;
        self.push(format!("begin_renderpass:{}", renderpass.name));
        Ok(())
    }

    fn end_renderpass(&mut self) -> Result<(), CommandListError> {
        self.tracker.end_renderpass()?;
        self.push("end_renderpass".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<(), CommandListError> {
        self.tracker.record()?;
        self.push(format!("bind_pipeline:{}", pipeline.name));
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        sets: &[&DescriptorSet],
        _interface: &PipelineInterface,
    ) -> Result<(), CommandListError> {
        self.tracker.record()?;
        self.push(format!("bind_descriptor_sets:{}", sets.len()));
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, buffers: &[&Buffer]) -> Result<(), CommandListError> {
        self.tracker.record()?;
        self.push(format!("bind_vertex_buffers:{}", buffers.len()));
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Buffer, index_type: IndexType) -> Result<(), CommandListError> {
        self.tracker.record()?;
        self.push(format!("bind_index_buffer:{index_type:?}"));
        Ok(())
    }

    fn draw_indexed_mesh(&mut self, num_indices: u32, _offset: u32, num_instances: u32) -> Result<(), CommandListError> {
        self.tracker.record_in_renderpass()?;
        self.push(format!("draw:{num_indices}x{num_instances}"));
        Ok(())
    }

    fn set_scissor_rect(&mut self, rect: Rect2D) -> Result<(), CommandListError> {
        self.tracker.record_in_renderpass()?;
        self.push(format!("scissor:{}x{}", rect.width, rect.height));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass-set builders
// ─────────────────────────────────────────────────────────────────────────────

pub fn color(name: &str) -> TextureAttachmentInfo {
    TextureAttachmentInfo {
        name: name.to_string(),
        pixel_format: PixelFormat::Rgba8,
        clear: true,
    }
}

pub fn depth(name: &str) -> TextureAttachmentInfo {
    TextureAttachmentInfo {
        name: name.to_string(),
        pixel_format: PixelFormat::Depth,
        clear: true,
    }
}

pub fn render_target(name: &str, pixel_format: PixelFormat) -> TextureCreateInfo {
    TextureCreateInfo {
        name: name.to_string(),
        format: TextureFormat {
            pixel_format,
            dimension_type: TextureDimensionType::ScreenRelative,
            width: 1.0,
            height: 1.0,
        },
    }
}

pub fn pass(name: &str, dependencies: &[&str], outputs: &[&str]) -> RenderPassCreateInfo {
    RenderPassCreateInfo {
        name: name.to_string(),
        dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        texture_outputs: outputs.iter().map(|o| color(o)).collect(),
        ..Default::default()
    }
}

pub fn shader(resources: Vec<ShaderResource>) -> Option<ShaderSource> {
    Some(ShaderSource {
        filename: "mock.spv".to_string(),
        spirv: vec![0x0723_0203],
        resources,
    })
}

pub fn sampled_texture(name: &str, set: u32, binding: u32) -> ShaderResource {
    ShaderResource {
        name: name.to_string(),
        set,
        binding,
        count: 1,
        descriptor_type: DescriptorType::CombinedImageSampler,
    }
}

pub fn uniform(name: &str, set: u32, binding: u32) -> ShaderResource {
    ShaderResource {
        name: name.to_string(),
        set,
        binding,
        count: 1,
        descriptor_type: DescriptorType::UniformBuffer,
    }
}

pub fn pipeline(name: &str, pass: &str) -> PipelineCreateInfo {
    PipelineCreateInfo {
        name: name.to_string(),
        pass: pass.to_string(),
        vertex_shader: shader(Vec::new()),
        ..Default::default()
    }
}
