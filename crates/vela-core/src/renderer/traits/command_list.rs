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

use crate::math::Rect2D;
use crate::memory::Bytes;
use crate::renderer::api::*;
use crate::renderer::error::CommandListError;
use std::any::Any;
use std::fmt::Debug;

/// The recording state of a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListState {
    /// Accepting commands outside a render pass.
    Recording,
    /// Accepting commands inside a render pass.
    InRenderPass,
    /// Handed to a queue or executed by another list. Terminal.
    Submitted,
}

/// The state machine every backend's command list runs through.
///
/// Lists start in [`CommandListState::Recording`] with no explicit begin call.
/// Draws need an active render pass, passes do not nest, and a list can only be
/// submitted once, outside any render pass.
///
/// Only primary lists begin render passes. A secondary list draws by continuing
/// a primary's pass: it is created already inside that pass (see
/// [`CommandListTracker::continuing_renderpass`]) and executed from a primary whose
/// pass was begun with [`SubpassContents::SecondaryLists`].
#[derive(Debug, Clone)]
pub struct CommandListTracker {
    state: CommandListState,
    level: CommandListLevel,
    contents: SubpassContents,
    continues_renderpass: bool,
}

impl CommandListTracker {
    /// A fresh tracker, ready to record.
    pub fn new(level: CommandListLevel) -> Self {
        Self {
            state: CommandListState::Recording,
            level,
            contents: SubpassContents::Inline,
            continues_renderpass: false,
        }
    }

    /// A secondary list recording inside a render pass begun by a primary list.
    pub fn continuing_renderpass() -> Self {
        Self {
            state: CommandListState::InRenderPass,
            level: CommandListLevel::Secondary,
            contents: SubpassContents::Inline,
            continues_renderpass: true,
        }
    }

    /// Current state.
    pub fn state(&self) -> CommandListState {
        self.state
    }

    /// Level the list was allocated at.
    pub fn level(&self) -> CommandListLevel {
        self.level
    }

    /// Whether this list continues a render pass it did not begin.
    pub fn continues_renderpass(&self) -> bool {
        self.continues_renderpass
    }

    /// Any command that is legal both inside and outside a render pass.
    pub fn record(&self) -> Result<(), CommandListError> {
        match (self.state, self.contents) {
            (CommandListState::Submitted, _) => Err(CommandListError::NotRecording),
            (CommandListState::InRenderPass, SubpassContents::SecondaryLists) => {
                Err(CommandListError::SubpassContentsMismatch)
            }
            _ => Ok(()),
        }
    }

    /// Commands that must run outside a render pass (copies, uploads).
    pub fn record_outside_renderpass(&self) -> Result<(), CommandListError> {
        match self.state {
            CommandListState::Recording => Ok(()),
            CommandListState::InRenderPass => Err(CommandListError::RenderPassStillActive),
            CommandListState::Submitted => Err(CommandListError::NotRecording),
        }
    }

    /// Commands that need an active render pass (draws, scissor updates).
    pub fn record_in_renderpass(&self) -> Result<(), CommandListError> {
        match self.state {
            CommandListState::InRenderPass => match self.contents {
                SubpassContents::Inline => Ok(()),
                SubpassContents::SecondaryLists => Err(CommandListError::SubpassContentsMismatch),
            },
            CommandListState::Recording => Err(CommandListError::RenderPassNotBegun),
            CommandListState::Submitted => Err(CommandListError::NotRecording),
        }
    }

    /// Enters a render pass whose commands are recorded as `contents` says.
    ///
    /// Secondary lists cannot begin passes.
    pub fn begin_renderpass(&mut self, contents: SubpassContents) -> Result<(), CommandListError> {
        if self.level != CommandListLevel::Primary {
            return Err(CommandListError::WrongLevel);
        }
        match self.state {
            CommandListState::Recording => {
                self.state = CommandListState::InRenderPass;
                self.contents = contents;
                Ok(())
            }
            CommandListState::InRenderPass => Err(CommandListError::RenderPassAlreadyActive),
            CommandListState::Submitted => Err(CommandListError::NotRecording),
        }
    }

    /// Leaves the active render pass.
    pub fn end_renderpass(&mut self) -> Result<(), CommandListError> {
        if self.continues_renderpass {
            return Err(CommandListError::WrongLevel);
        }
        match self.state {
            CommandListState::InRenderPass => {
                self.state = CommandListState::Recording;
                self.contents = SubpassContents::Inline;
                Ok(())
            }
            CommandListState::Recording => Err(CommandListError::RenderPassNotBegun),
            CommandListState::Submitted => Err(CommandListError::NotRecording),
        }
    }

    /// Executing secondary lists is only legal from a primary list that is still recording.
    pub fn execute_secondaries(&self) -> Result<(), CommandListError> {
        if self.level != CommandListLevel::Primary {
            return Err(CommandListError::WrongLevel);
        }
        match self.state {
            CommandListState::Submitted => Err(CommandListError::NotRecording),
            _ => Ok(()),
        }
    }

    /// Closes `secondary` for execution from this list.
    ///
    /// Outside a pass, only lists that do not continue a pass can run. Inside a
    /// pass begun with [`SubpassContents::SecondaryLists`], only lists continuing
    /// it can run. Inline passes execute nothing.
    pub fn execute(&self, secondary: &mut CommandListTracker) -> Result<(), CommandListError> {
        self.execute_secondaries()?;
        if secondary.level != CommandListLevel::Secondary {
            return Err(CommandListError::WrongLevel);
        }
        match (self.state, self.contents, secondary.continues_renderpass) {
            (CommandListState::Recording, _, true) => return Err(CommandListError::RenderPassNotBegun),
            (CommandListState::InRenderPass, SubpassContents::Inline, _) => {
                return Err(CommandListError::SubpassContentsMismatch)
            }
            (CommandListState::InRenderPass, _, false) => {
                return Err(CommandListError::RenderPassStillActive)
            }
            _ => {}
        }
        secondary.submit()
    }

    /// Closes the list for submission or execution.
    ///
    /// Lists continuing a render pass close from inside it; every other list
    /// must have ended its pass first.
    pub fn submit(&mut self) -> Result<(), CommandListError> {
        if self.continues_renderpass {
            self.record_in_renderpass()?;
        } else {
            self.record_outside_renderpass()?;
        }
        self.state = CommandListState::Submitted;
        Ok(())
    }
}

/// Checks that `[offset, offset + len)` lies inside a buffer of `size` bytes.
pub fn check_buffer_range(offset: Bytes, len: Bytes, size: Bytes) -> Result<(), CommandListError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        Some(end) => Err(CommandListError::OutOfBounds { end, size }),
        None => Err(CommandListError::OutOfBounds {
            end: Bytes::new(u64::MAX),
            size,
        }),
    }
}

/// A per-thread, per-frame-slot command recording object.
///
/// Returned ready to record by
/// [`RenderDevice::create_command_list`](crate::renderer::RenderDevice::create_command_list)
/// and consumed by submission. Every recording method fails with
/// [`CommandListError`] when called in a state that does not allow it.
pub trait CommandList: Send + Debug {
    /// Level the list was allocated at.
    fn level(&self) -> CommandListLevel;

    /// Labels the list for debugging tools.
    fn set_debug_name(&mut self, name: &str) -> Result<(), CommandListError>;

    /// Records a batch of whole-resource barriers.
    ///
    /// ## Arguments
    /// * `stages_before` - Stages whose work must complete before the barrier.
    /// * `stages_after` - Stages that wait for the barrier.
    /// * `barriers` - The resources being transitioned.
    fn resource_barriers(
        &mut self,
        stages_before: PipelineStage,
        stages_after: PipelineStage,
        barriers: &[ResourceBarrier<'_>],
    ) -> Result<(), CommandListError>;

    /// Copies `num_bytes` from `source` to `destination`.
    ///
    /// Both ranges are checked against their buffer's size before anything is recorded.
    fn copy_buffer(
        &mut self,
        destination: &Buffer,
        destination_offset: Bytes,
        source: &Buffer,
        source_offset: Bytes,
        num_bytes: Bytes,
    ) -> Result<(), CommandListError>;

    /// Writes `data` into `staging_buffer` and records a copy from it into `image`.
    ///
    /// ## Arguments
    /// * `image` - Destination image; must be in the `CopyDestination` state.
    /// * `width`, `height` - Region to fill, starting at the image origin.
    /// * `bytes_per_pixel` - Size of one texel in `data`.
    /// * `staging_buffer` - Host-visible buffer at least as large as `data`.
    /// * `data` - Tightly packed texel rows.
    fn upload_data_to_image(
        &mut self,
        image: &Image,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        staging_buffer: &Buffer,
        data: &[u8],
    ) -> Result<(), CommandListError>;

    /// Executes secondary lists from this primary list. The secondaries are consumed.
    ///
    /// Outside a render pass this runs lists recorded without one (copies,
    /// barriers). Inside a pass begun with [`SubpassContents::SecondaryLists`] it
    /// runs lists created to continue that pass.
    fn execute_command_lists(
        &mut self,
        lists: Vec<Box<dyn CommandList>>,
    ) -> Result<(), CommandListError>;

    /// Begins `renderpass`, drawing into `framebuffer`. Primary lists only.
    ///
    /// With [`SubpassContents::Inline`] the viewport and scissor are set to the
    /// pass's render area. With [`SubpassContents::SecondaryLists`] the only legal
    /// commands until the pass ends are executions of continuing lists.
    fn begin_renderpass(
        &mut self,
        renderpass: &Renderpass,
        framebuffer: &Framebuffer,
        contents: SubpassContents,
    ) -> Result<(), CommandListError>;

    /// Ends the active render pass.
    fn end_renderpass(&mut self) -> Result<(), CommandListError>;

    /// Binds a graphics pipeline.
    fn bind_pipeline(&mut self, pipeline: &Pipeline) -> Result<(), CommandListError>;

    /// Binds descriptor sets, in set-index order, against `interface`'s layout.
    fn bind_descriptor_sets(
        &mut self,
        sets: &[&DescriptorSet],
        interface: &PipelineInterface,
    ) -> Result<(), CommandListError>;

    /// Binds vertex buffers to consecutive bindings starting at 0.
    fn bind_vertex_buffers(&mut self, buffers: &[&Buffer]) -> Result<(), CommandListError>;

    /// Binds an index buffer.
    fn bind_index_buffer(
        &mut self,
        buffer: &Buffer,
        index_type: IndexType,
    ) -> Result<(), CommandListError>;

    /// Draws `num_indices` indices starting at `offset`, `num_instances` times.
    fn draw_indexed_mesh(
        &mut self,
        num_indices: u32,
        offset: u32,
        num_instances: u32,
    ) -> Result<(), CommandListError>;

    /// Updates the dynamic scissor rectangle.
    fn set_scissor_rect(&mut self, rect: Rect2D) -> Result<(), CommandListError>;

    /// Returns the list as `Any`, for backends to recover their concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed list into `Box<dyn Any>` for downcasting on submission.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}
