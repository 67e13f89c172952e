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


use std::any::Any;
use std::ffi::CString;

use ash::vk;

use vela_core::math::Rect2D;
use vela_core::memory::Bytes;
use vela_core::renderer::{
    check_buffer_range, BarrierResource, Buffer, CommandList, CommandListError, CommandListLevel,
    CommandListTracker, DescriptorSet, Framebuffer, Image, IndexType, Pipeline, PipelineInterface,
    PipelineStage, RenderDevice, RenderError, Renderpass, ResourceBarrier, ResourceError,
    SubpassContents,
};

use super::conversions::IntoVk;
use super::device::VulkanRenderDevice;

/// A command list recording into one `vk::CommandBuffer`.
///
/// The buffer belongs to a frame slot's command pool and becomes invalid once
/// that slot is begun again.
#[derive(Debug)]
pub struct VulkanCommandList {
    device: VulkanRenderDevice,
    buffer: vk::CommandBuffer,
    tracker: CommandListTracker,
}

impl VulkanCommandList {
    pub(crate) fn new(device: VulkanRenderDevice, buffer: vk::CommandBuffer, tracker: CommandListTracker) -> Self {
        Self {
            device,
            buffer,
            tracker,
        }
    }

    /// Closes the list and returns the command buffer to submit or execute.
    pub(crate) fn finish(&mut self) -> Result<vk::CommandBuffer, RenderError> {
        self.tracker.submit()?;
        unsafe { self.device.raw().end_command_buffer(self.buffer) }.map_err(|err| match err {
            vk::Result::ERROR_DEVICE_LOST => RenderError::DeviceLost,
            other => RenderError::Internal(format!("vkEndCommandBuffer: {other}")),
        })?;
        Ok(self.buffer)
    }

    fn raw(&self) -> &ash::Device {
        self.device.raw()
    }
}

/// Points the viewport and scissor at `area`.
pub(crate) fn set_render_area(device: &ash::Device, buffer: vk::CommandBuffer, area: vk::Rect2D) {
    let viewport = vk::Viewport {
        x: area.offset.x as f32,
        y: area.offset.y as f32,
        width: area.extent.width as f32,
        height: area.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    unsafe {
        device.cmd_set_viewport(buffer, 0, &[viewport]);
        device.cmd_set_scissor(buffer, 0, &[area]);
    }
}

/// Splits sorted set indices into ranges of consecutive values, so each range
/// can be bound with one call starting at its first index.
fn contiguous_runs(indices: &[u32]) -> Vec<std::ops::Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=indices.len() {
        let breaks = i == indices.len() || indices[i - 1].checked_add(1) != Some(indices[i]);
        if breaks {
            runs.push(start..i);
            start = i;
        }
    }
    runs
}

fn image_barrier_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: vk::REMAINING_MIP_LEVELS,
        base_array_layer: 0,
        layer_count: vk::REMAINING_ARRAY_LAYERS,
    }
}

impl CommandList for VulkanCommandList {
    fn level(&self) -> CommandListLevel {
        self.tracker.level()
    }

    fn set_debug_name(&mut self, name: &str) -> Result<(), CommandListError> {
        self.tracker.record()?;
        let Some(debug_utils) = self.device.debug_utils() else {
            return Ok(());
        };
        let Ok(name) = CString::new(name) else {
            return Ok(());
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(self.buffer)
            .object_name(&name);
        if let Err(err) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            log::debug!("Failed to name command list {name:?}: {err}");
        }
        Ok(())
    }

    fn resource_barriers(
        &mut self,
        stages_before: PipelineStage,
        stages_after: PipelineStage,
        barriers: &[ResourceBarrier<'_>],
    ) -> Result<(), CommandListError> {
        self.tracker.record_outside_renderpass()?;

        let mut buffer_barriers = Vec::new();
        let mut image_barriers = Vec::new();
        for barrier in barriers {
            let (src_family, dst_family) = if barrier.source_queue == barrier.destination_queue {
                (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED)
            } else {
                (
                    self.device.queue_family(barrier.source_queue),
                    self.device.queue_family(barrier.destination_queue),
                )
            };
            match barrier.resource {
                BarrierResource::Buffer(buffer) => {
                    let vk_buffer = self
                        .device
                        .vk_buffer(buffer.id)
                        .ok_or(CommandListError::InvalidHandle)?;
                    buffer_barriers.push(
                        vk::BufferMemoryBarrier::default()
                            .src_access_mask(barrier.access_before.into_vk())
                            .dst_access_mask(barrier.access_after.into_vk())
                            .src_queue_family_index(src_family)
                            .dst_queue_family_index(dst_family)
                            .buffer(vk_buffer)
                            .offset(0)
                            .size(vk::WHOLE_SIZE),
                    );
                }
                BarrierResource::Image(image, aspect) => {
                    let (vk_image, _, _) = self
                        .device
                        .vk_image(image.id)
                        .ok_or(CommandListError::InvalidHandle)?;
                    image_barriers.push(
                        vk::ImageMemoryBarrier::default()
                            .src_access_mask(barrier.access_before.into_vk())
                            .dst_access_mask(barrier.access_after.into_vk())
                            .old_layout(barrier.old_state.into_vk())
                            .new_layout(barrier.new_state.into_vk())
                            .src_queue_family_index(src_family)
                            .dst_queue_family_index(dst_family)
                            .image(vk_image)
                            .subresource_range(image_barrier_range(aspect.into_vk())),
                    );
                }
            }
        }

        unsafe {
            self.raw().cmd_pipeline_barrier(
                self.buffer,
                stages_before.into_vk(),
                stages_after.into_vk(),
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &image_barriers,
            );
        }
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

        let dst = self
            .device
            .vk_buffer(destination.id)
            .ok_or(CommandListError::InvalidHandle)?;
        let src = self
            .device
            .vk_buffer(source.id)
            .ok_or(CommandListError::InvalidHandle)?;
        let region = vk::BufferCopy {
            src_offset: source_offset.count(),
            dst_offset: destination_offset.count(),
            size: num_bytes.count(),
        };
        unsafe { self.raw().cmd_copy_buffer(self.buffer, src, dst, &[region]) };
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
        let region_bytes = Bytes::new(u64::from(width) * u64::from(height) * u64::from(bytes_per_pixel));
        check_buffer_range(Bytes::ZERO, Bytes::new(data.len() as u64), region_bytes)?;
        check_buffer_range(Bytes::ZERO, region_bytes, staging_buffer.size)?;

        let (vk_image, aspect, _) = self
            .device
            .vk_image(image.id)
            .ok_or(CommandListError::InvalidHandle)?;
        let staging = self
            .device
            .vk_buffer(staging_buffer.id)
            .ok_or(CommandListError::InvalidHandle)?;
        self.device
            .write_data_to_buffer(data, Bytes::ZERO, staging_buffer)
            .map_err(|err| match err {
                ResourceError::OutOfBounds { end, size } => CommandListError::OutOfBounds { end, size },
                _ => CommandListError::InvalidHandle,
            })?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });
        unsafe {
            self.raw().cmd_copy_buffer_to_image(
                self.buffer,
                staging,
                vk_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        Ok(())
    }

    fn execute_command_lists(&mut self, lists: Vec<Box<dyn CommandList>>) -> Result<(), CommandListError> {
        self.tracker.execute_secondaries()?;

        let mut buffers = Vec::with_capacity(lists.len());
        for list in lists {
            let mut list = list
                .into_any()
                .downcast::<VulkanCommandList>()
                .map_err(|_| CommandListError::InvalidHandle)?;
            self.tracker.execute(&mut list.tracker)?;
            unsafe { self.raw().end_command_buffer(list.buffer) }.map_err(|err| {
                log::error!("Failed to close secondary command list: {err}");
                CommandListError::InvalidHandle
            })?;
            buffers.push(list.buffer);
        }
        if !buffers.is_empty() {
            unsafe { self.raw().cmd_execute_commands(self.buffer, &buffers) };
        }
        Ok(())
    }

    fn begin_renderpass(
        &mut self,
        renderpass: &Renderpass,
        framebuffer: &Framebuffer,
        contents: SubpassContents,
    ) -> Result<(), CommandListError> {
        let (vk_renderpass, clear_values) = self
            .device
            .vk_renderpass(renderpass.id)
            .ok_or(CommandListError::InvalidHandle)?;
        let vk_framebuffer = self
            .device
            .vk_framebuffer(framebuffer.id)
            .ok_or(CommandListError::InvalidHandle)?;
        self.tracker.begin_renderpass(contents)?;

        let render_area: vk::Rect2D = renderpass.render_area.into_vk();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_renderpass)
            .framebuffer(vk_framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);
        unsafe {
            self.raw()
                .cmd_begin_render_pass(self.buffer, &begin_info, contents.into_vk())
        };
        // Continuing lists set their own dynamic state.
        if contents == SubpassContents::Inline {
            set_render_area(self.raw(), self.buffer, render_area);
        }
        Ok(())
    }

    fn end_renderpass(&mut self) -> Result<(), CommandListError> {
        self.tracker.end_renderpass()?;
        unsafe { self.raw().cmd_end_render_pass(self.buffer) };
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<(), CommandListError> {
        self.tracker.record()?;
        let vk_pipeline = self
            .device
            .vk_pipeline(pipeline.id)
            .ok_or(CommandListError::InvalidHandle)?;
        unsafe {
            self.raw()
                .cmd_bind_pipeline(self.buffer, vk::PipelineBindPoint::GRAPHICS, vk_pipeline)
        };
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        sets: &[&DescriptorSet],
        interface: &PipelineInterface,
    ) -> Result<(), CommandListError> {
        self.tracker.record()?;
        if sets.is_empty() {
            return Ok(());
        }
        let layout = self
            .device
            .vk_pipeline_layout(interface.id)
            .ok_or(CommandListError::InvalidHandle)?;
        let mut ordered: Vec<_> = sets.to_vec();
        ordered.sort_by_key(|set| set.set_index);
        let vk_sets = ordered
            .iter()
            .map(|set| self.device.vk_descriptor_set(set.id))
            .collect::<Option<Vec<_>>>()
            .ok_or(CommandListError::InvalidHandle)?;
        let indices: Vec<u32> = ordered.iter().map(|set| set.set_index).collect();
        for run in contiguous_runs(&indices) {
            unsafe {
                self.raw().cmd_bind_descriptor_sets(
                    self.buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    indices[run.start],
                    &vk_sets[run],
                    &[],
                );
            }
        }
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, buffers: &[&Buffer]) -> Result<(), CommandListError> {
        self.tracker.record()?;
        if buffers.is_empty() {
            return Ok(());
        }
        let vk_buffers = buffers
            .iter()
            .map(|buffer| self.device.vk_buffer(buffer.id))
            .collect::<Option<Vec<_>>>()
            .ok_or(CommandListError::InvalidHandle)?;
        let offsets = vec![0; vk_buffers.len()];
        unsafe {
            self.raw()
                .cmd_bind_vertex_buffers(self.buffer, 0, &vk_buffers, &offsets)
        };
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Buffer, index_type: IndexType) -> Result<(), CommandListError> {
        self.tracker.record()?;
        let vk_buffer = self
            .device
            .vk_buffer(buffer.id)
            .ok_or(CommandListError::InvalidHandle)?;
        unsafe {
            self.raw()
                .cmd_bind_index_buffer(self.buffer, vk_buffer, 0, index_type.into_vk())
        };
        Ok(())
    }

    fn draw_indexed_mesh(&mut self, num_indices: u32, offset: u32, num_instances: u32) -> Result<(), CommandListError> {
        self.tracker.record_in_renderpass()?;
        unsafe {
            self.raw()
                .cmd_draw_indexed(self.buffer, num_indices, num_instances, offset, 0, 0)
        };
        Ok(())
    }

    fn set_scissor_rect(&mut self, rect: Rect2D) -> Result<(), CommandListError> {
        self.tracker.record_in_renderpass()?;
        let scissor: vk::Rect2D = rect.into_vk();
        unsafe { self.raw().cmd_set_scissor(self.buffer, 0, &[scissor]) };
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
