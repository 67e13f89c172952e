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

//! Buffers, images and samplers.
//!
//! Handles are not `Clone`: each is created by a [`RenderDevice`] factory method and
//! handed back to the matching destroy method exactly once.
//!
//! [`RenderDevice`]: crate::renderer::RenderDevice

use crate::math::Extent2D;
use crate::memory::{AllocationInfo, Bytes};
use crate::shaderpack::PixelFormat;
use serde::{Deserialize, Serialize};

/// How a buffer will be used. Decides its native usage flags and memory placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferUsage {
    /// Bound as a uniform buffer; host-writable.
    UniformBuffer,
    /// Bound as an index buffer; filled by copies.
    IndexBuffer,
    /// Bound as a vertex buffer; filled by copies.
    VertexBuffer,
    /// Host-visible copy source.
    StagingBuffer,
}

impl BufferUsage {
    /// Returns `true` if the CPU may write the buffer directly.
    pub const fn is_host_visible(self) -> bool {
        matches!(self, BufferUsage::UniformBuffer | BufferUsage::StagingBuffer)
    }
}

/// Describes a buffer to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCreateInfo {
    /// Debug name.
    pub name: String,
    /// Size of the buffer.
    pub size: Bytes,
    /// Intended usage.
    pub usage: BufferUsage,
}

/// Identifies a buffer within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// A buffer bound to a range of a [`DeviceMemoryResource`](crate::memory::DeviceMemoryResource).
#[derive(Debug, PartialEq, Eq)]
pub struct Buffer {
    /// The backend's identifier.
    pub id: BufferId,
    /// Size requested at creation.
    pub size: Bytes,
    /// Usage given at creation.
    pub usage: BufferUsage,
    /// The range of the heap the buffer occupies.
    pub allocation: AllocationInfo,
}

/// Identifies an image within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(pub usize);

/// A 2D image, used as a render target or sampled texture.
#[derive(Debug, PartialEq, Eq)]
pub struct Image {
    /// The backend's identifier.
    pub id: ImageId,
    /// Debug name, matching the pass-set's texture name.
    pub name: String,
    /// Pixel format.
    pub format: PixelFormat,
    /// Size in pixels.
    pub extent: Extent2D,
}

/// Identifies a sampler within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerId(pub usize);

/// A texture sampler.
#[derive(Debug, PartialEq, Eq)]
pub struct Sampler {
    /// The backend's identifier.
    pub id: SamplerId,
    /// Name from the pass-set.
    pub name: String,
}
