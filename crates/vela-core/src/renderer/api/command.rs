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

//! Types used while recording command lists: queues, levels, barriers.

use super::resource::{Buffer, Image};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The queue family a command list is recorded for and submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueType {
    /// Graphics and everything else.
    Graphics,
    /// Copy-only queue.
    Transfer,
    /// Compute queue running alongside graphics.
    AsyncCompute,
}

/// Whether a command list is submitted directly or executed from another list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListLevel {
    /// Submitted to a queue.
    Primary,
    /// Executed from a primary list.
    Secondary,
}

/// How the commands of a render pass are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubpassContents {
    /// Draws are recorded directly into the list that began the pass.
    #[default]
    Inline,
    /// The pass only executes secondary lists that continue it.
    SecondaryLists,
}

/// Width of the indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    Uint32,
}

/// The logical usage mode of a buffer or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Contents are undefined.
    Undefined,
    /// General-purpose state.
    Common,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDestination,
    /// Read as a uniform buffer.
    UniformBuffer,
    /// Read as a vertex buffer.
    VertexBuffer,
    /// Read as an index buffer.
    IndexBuffer,
    /// Sampled or read by shaders.
    ShaderRead,
    /// Written by shaders.
    ShaderWrite,
    /// Color attachment.
    RenderTarget,
    /// Depth attachment being written.
    DepthWrite,
    /// Depth attachment being read.
    DepthRead,
    /// Ready for presentation.
    PresentSource,
}

bitflags! {
    /// Pipeline stages a barrier waits on or blocks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        /// Start of the pipeline.
        const TOP_OF_PIPE = 1 << 0;
        /// Indirect argument reads.
        const DRAW_INDIRECT = 1 << 1;
        /// Vertex and index fetch.
        const VERTEX_INPUT = 1 << 2;
        /// Vertex shading.
        const VERTEX_SHADER = 1 << 3;
        /// Fragment shading.
        const FRAGMENT_SHADER = 1 << 4;
        /// Depth and stencil tests before shading.
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        /// Depth and stencil tests after shading.
        const LATE_FRAGMENT_TESTS = 1 << 6;
        /// Color attachment writes.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        /// Compute shading.
        const COMPUTE_SHADER = 1 << 8;
        /// Copies and clears.
        const TRANSFER = 1 << 9;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 10;
    }
}

bitflags! {
    /// Memory accesses a barrier makes available or visible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceAccess: u32 {
        /// Index buffer reads.
        const INDEX_READ = 1 << 0;
        /// Vertex buffer reads.
        const VERTEX_ATTRIBUTE_READ = 1 << 1;
        /// Uniform buffer reads.
        const UNIFORM_READ = 1 << 2;
        /// Shader reads.
        const SHADER_READ = 1 << 3;
        /// Shader writes.
        const SHADER_WRITE = 1 << 4;
        /// Color attachment reads.
        const COLOR_ATTACHMENT_READ = 1 << 5;
        /// Color attachment writes.
        const COLOR_ATTACHMENT_WRITE = 1 << 6;
        /// Depth attachment reads.
        const DEPTH_STENCIL_READ = 1 << 7;
        /// Depth attachment writes.
        const DEPTH_STENCIL_WRITE = 1 << 8;
        /// Copy reads.
        const TRANSFER_READ = 1 << 9;
        /// Copy writes.
        const TRANSFER_WRITE = 1 << 10;
        /// Host reads.
        const HOST_READ = 1 << 11;
        /// Host writes.
        const HOST_WRITE = 1 << 12;
        /// Any read.
        const MEMORY_READ = 1 << 13;
        /// Any write.
        const MEMORY_WRITE = 1 << 14;
    }
}

bitflags! {
    /// The parts of an image a barrier applies to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageAspect: u32 {
        /// Color data.
        const COLOR = 1 << 0;
        /// Depth data.
        const DEPTH = 1 << 1;
        /// Stencil data.
        const STENCIL = 1 << 2;
    }
}

/// The resource a barrier applies to. Barriers always cover the whole resource.
#[derive(Debug, Clone, Copy)]
pub enum BarrierResource<'a> {
    /// A whole buffer.
    Buffer(&'a Buffer),
    /// A whole image, restricted to the given aspects.
    Image(&'a Image, ImageAspect),
}

/// Declares that accesses before the barrier complete before accesses after it.
#[derive(Debug, Clone, Copy)]
pub struct ResourceBarrier<'a> {
    /// The resource being transitioned.
    pub resource: BarrierResource<'a>,
    /// State the resource is in before the barrier.
    pub old_state: ResourceState,
    /// State the resource is in after the barrier.
    pub new_state: ResourceState,
    /// Accesses that must complete before the barrier.
    pub access_before: ResourceAccess,
    /// Accesses that wait for the barrier.
    pub access_after: ResourceAccess,
    /// Queue that owns the resource before the barrier.
    pub source_queue: QueueType,
    /// Queue that owns the resource after the barrier.
    pub destination_queue: QueueType,
}
