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

use super::command_list::CommandList;
use crate::math::Extent2D;
use crate::memory::{Bytes, DeviceMemory, DeviceMemoryResource, MemoryUsage, ObjectKinds};
use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::shaderpack::{
    PipelineCreateInfo, RenderPassCreateInfo, SamplerCreateInfo, TextureAttachmentInfo,
    TextureCreateInfo,
};
use std::collections::HashMap;
use std::fmt::Debug;

/// The capability surface every graphics backend implements.
///
/// Every creation call takes a complete, immutable description; nothing is
/// mutated after creation. Handles are returned by value and given back to the
/// matching `destroy_*` method exactly once.
pub trait RenderDevice: Send + Sync + Debug + 'static {
    /// Static information about the selected GPU.
    fn info(&self) -> &DeviceInfo;

    /// Number of frame-in-flight slots command pools are partitioned into.
    fn num_frames_in_flight(&self) -> u32;

    /// Allocates one native heap.
    ///
    /// The backend picks the memory type that best matches `usage`, falling back to
    /// a looser match when no exact one exists.
    /// ## Arguments
    /// * `size` - Size of the heap.
    /// * `usage` - Access pattern the heap is for.
    /// * `allowed_objects` - Resource kinds that will be placed in the heap.
    /// ## Returns
    /// The heap, or `ResourceError::OutOfDeviceMemory` if the driver refuses.
    fn allocate_device_memory(
        &self,
        size: Bytes,
        usage: MemoryUsage,
        allowed_objects: ObjectKinds,
    ) -> Result<DeviceMemory, ResourceError>;

    /// Releases a heap. Every buffer placed in it must already be destroyed.
    fn free_device_memory(&self, memory: DeviceMemory) -> Result<(), ResourceError>;

    /// Creates a render pass from a fully specified description.
    /// ## Arguments
    /// * `info` - The pass description.
    /// * `framebuffer_size` - Size of the pass's render area.
    /// ## Errors
    /// * `ResourceError::InvalidPass` - A zero framebuffer size, too many color
    ///   attachments, or the backbuffer combined with other outputs.
    fn create_renderpass(
        &self,
        info: &RenderPassCreateInfo,
        framebuffer_size: Extent2D,
    ) -> Result<Renderpass, ResourceError>;

    /// Creates a framebuffer binding concrete images to a render pass's attachments.
    fn create_framebuffer(
        &self,
        renderpass: &Renderpass,
        color_attachments: &[&Image],
        depth_attachment: Option<&Image>,
        framebuffer_size: Extent2D,
    ) -> Result<Framebuffer, ResourceError>;

    /// Creates the descriptor and pipeline layout shared by pipelines with the same bindings.
    /// ## Arguments
    /// * `bindings` - Every named shader resource, already merged across stages.
    /// * `color_attachments` - Color outputs of the pass the pipeline renders in.
    /// * `depth_texture` - Depth output of that pass, if any.
    fn create_pipeline_interface(
        &self,
        bindings: &HashMap<String, ResourceBindingDescription>,
        color_attachments: &[TextureAttachmentInfo],
        depth_texture: Option<&TextureAttachmentInfo>,
    ) -> Result<PipelineInterface, ResourceError>;

    /// Compiles a graphics pipeline against `interface`.
    fn create_pipeline(
        &self,
        interface: &PipelineInterface,
        info: &PipelineCreateInfo,
    ) -> Result<Pipeline, ResourceError>;

    /// Creates a descriptor pool holding at most `max_sets` sets and, per type, the given
    /// number of descriptors.
    fn create_descriptor_pool(
        &self,
        capacity: &HashMap<DescriptorType, u32>,
        max_sets: u32,
    ) -> Result<DescriptorPool, ResourceError>;

    /// Allocates one descriptor set per set index of `interface`, in index order.
    fn create_descriptor_sets(
        &self,
        interface: &PipelineInterface,
        pool: &DescriptorPool,
    ) -> Result<Vec<DescriptorSet>, ResourceError>;

    /// Points descriptor bindings at resources.
    fn update_descriptor_sets(&self, writes: &[DescriptorSetWrite<'_>])
        -> Result<(), ResourceError>;

    /// Returns every set allocated from `pool` to it. Those sets must no longer be used.
    fn reset_descriptor_pool(&self, pool: &DescriptorPool) -> Result<(), ResourceError>;

    /// Creates a buffer and binds it to a range allocated from `memory`.
    /// ## Errors
    /// * `ResourceError::OutOfDeviceMemory` - `memory` has no free range large enough.
    fn create_buffer(
        &self,
        info: &BufferCreateInfo,
        memory: &mut DeviceMemoryResource,
    ) -> Result<Buffer, ResourceError>;

    /// Copies `data` into a host-visible buffer at `offset`.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - The write would pass the end of the buffer.
    /// * `ResourceError::InvalidHandle` - The buffer is not host-visible.
    fn write_data_to_buffer(
        &self,
        data: &[u8],
        offset: Bytes,
        buffer: &Buffer,
    ) -> Result<(), ResourceError>;

    /// Creates a sampler.
    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<Sampler, ResourceError>;

    /// Creates an image in its own dedicated memory.
    ///
    /// Screen-relative sizes are resolved against `screen_size`.
    fn create_image(
        &self,
        info: &TextureCreateInfo,
        screen_size: Extent2D,
    ) -> Result<Image, ResourceError>;

    /// Creates a semaphore.
    fn create_semaphore(&self) -> Result<Semaphore, ResourceError>;

    /// Creates `count` semaphores.
    fn create_semaphores(&self, count: u32) -> Result<Vec<Semaphore>, ResourceError> {
        (0..count).map(|_| self.create_semaphore()).collect()
    }

    /// Creates a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> Result<Fence, ResourceError>;

    /// Creates `count` fences.
    fn create_fences(&self, count: u32, signaled: bool) -> Result<Vec<Fence>, ResourceError> {
        (0..count).map(|_| self.create_fence(signaled)).collect()
    }

    /// Blocks until every fence is signaled. There is no timeout.
    fn wait_for_fences(&self, fences: &[&Fence]) -> Result<(), RenderError>;

    /// Returns fences to the unsignaled state.
    fn reset_fences(&self, fences: &[&Fence]) -> Result<(), RenderError>;

    /// Destroys a render pass.
    fn destroy_renderpass(&self, renderpass: Renderpass) -> Result<(), ResourceError>;

    /// Destroys a framebuffer.
    fn destroy_framebuffer(&self, framebuffer: Framebuffer) -> Result<(), ResourceError>;

    /// Destroys a pipeline interface and its layouts.
    fn destroy_pipeline_interface(
        &self,
        interface: PipelineInterface,
    ) -> Result<(), ResourceError>;

    /// Destroys a pipeline.
    fn destroy_pipeline(&self, pipeline: Pipeline) -> Result<(), ResourceError>;

    /// Destroys a descriptor pool and every set allocated from it.
    fn destroy_descriptor_pool(&self, pool: DescriptorPool) -> Result<(), ResourceError>;

    /// Destroys a buffer and returns its range to `memory`.
    fn destroy_buffer(
        &self,
        buffer: Buffer,
        memory: &mut DeviceMemoryResource,
    ) -> Result<(), ResourceError>;

    /// Destroys an image and frees its dedicated memory.
    fn destroy_image(&self, image: Image) -> Result<(), ResourceError>;

    /// Destroys a sampler.
    fn destroy_sampler(&self, sampler: Sampler) -> Result<(), ResourceError>;

    /// Destroys semaphores.
    fn destroy_semaphores(&self, semaphores: Vec<Semaphore>) -> Result<(), ResourceError>;

    /// Destroys fences.
    fn destroy_fences(&self, fences: Vec<Fence>) -> Result<(), ResourceError>;

    /// Starts recording frame slot `frame_index`: every command pool of that slot is
    /// reset, invalidating the lists allocated from it.
    ///
    /// The caller must have waited on the slot's previous submission.
    fn begin_frame(&self, frame_index: u32) -> Result<(), RenderError>;

    /// Allocates a command list from the pool of `(thread_index, frame_index, queue)`.
    /// ## Arguments
    /// * `thread_index` - Recording thread; each thread has its own pools.
    /// * `frame_index` - Frame-in-flight slot.
    /// * `queue` - Queue the list will be submitted to.
    /// * `level` - Primary or secondary.
    /// ## Returns
    /// A list ready to record.
    fn create_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        level: CommandListLevel,
    ) -> Result<Box<dyn CommandList>, RenderError>;

    /// Allocates a secondary list that continues `renderpass` on `framebuffer`.
    ///
    /// The list starts inside the pass with the viewport and scissor set to the
    /// pass's render area, and can only draw. It is executed from a primary list
    /// that began the same pass with [`SubpassContents::SecondaryLists`].
    fn create_secondary_command_list(
        &self,
        thread_index: u32,
        frame_index: u32,
        queue: QueueType,
        renderpass: &Renderpass,
        framebuffer: &Framebuffer,
    ) -> Result<Box<dyn CommandList>, RenderError>;

    /// Closes `list` and submits it.
    /// ## Arguments
    /// * `list` - A primary list created by this device. It is consumed.
    /// * `queue` - The queue to submit to.
    /// * `fence_to_signal` - Signaled when the GPU finishes the list.
    /// * `wait_semaphores` - Waited on before the list starts.
    /// * `signal_semaphores` - Signaled when the list finishes.
    fn submit_command_list(
        &self,
        list: Box<dyn CommandList>,
        queue: QueueType,
        fence_to_signal: Option<&Fence>,
        wait_semaphores: &[&Semaphore],
        signal_semaphores: &[&Semaphore],
    ) -> Result<(), RenderError>;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&self) -> Result<(), RenderError>;
}
