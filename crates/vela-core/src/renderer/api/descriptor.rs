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

//! Descriptor bindings, pools, sets and writes.

use super::resource::{Buffer, Image, Sampler};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The kind of resource a descriptor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DescriptorType {
    /// A sampled image paired with its sampler.
    CombinedImageSampler,
    /// A uniform buffer.
    UniformBuffer,
    /// A storage buffer.
    StorageBuffer,
}

bitflags! {
    /// The shader stages that can see a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader.
        const VERTEX = 1 << 0;
        /// Tessellation control shader.
        const TESSELLATION_CONTROL = 1 << 1;
        /// Tessellation evaluation shader.
        const TESSELLATION_EVALUATION = 1 << 2;
        /// Geometry shader.
        const GEOMETRY = 1 << 3;
        /// Fragment shader.
        const FRAGMENT = 1 << 4;
        /// Compute shader.
        const COMPUTE = 1 << 5;
    }
}

/// Where a named shader resource lives in the pipeline layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceBindingDescription {
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// Number of array elements.
    pub count: u32,
    /// What kind of resource is bound.
    pub descriptor_type: DescriptorType,
    /// Stages that access the binding.
    pub stages: ShaderStageFlags,
}

impl ResourceBindingDescription {
    /// Returns `true` if both descriptions occupy the same slot with the same kind of resource.
    ///
    /// Stage visibility is ignored: two stages may share a binding.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        self.set == other.set
            && self.binding == other.binding
            && self.count == other.count
            && self.descriptor_type == other.descriptor_type
    }
}

/// Identifies a descriptor pool within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorPoolId(pub usize);

/// A pool descriptor sets are allocated from.
#[derive(Debug, PartialEq, Eq)]
pub struct DescriptorPool {
    /// The backend's identifier.
    pub id: DescriptorPoolId,
    /// Maximum number of sets the pool can hold.
    pub max_sets: u32,
}

/// Identifies a descriptor set within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorSetId(pub usize);

/// A set of descriptors, allocated for one set index of a pipeline interface.
#[derive(Debug, PartialEq, Eq)]
pub struct DescriptorSet {
    /// The backend's identifier.
    pub id: DescriptorSetId,
    /// The set index this set was allocated for.
    pub set_index: u32,
}

/// The resource a descriptor write points at.
#[derive(Debug, Clone, Copy)]
pub enum DescriptorResource<'a> {
    /// An image sampled through a sampler.
    Image {
        /// The image.
        image: &'a Image,
        /// The sampler.
        sampler: &'a Sampler,
    },
    /// A uniform buffer.
    UniformBuffer(&'a Buffer),
    /// A storage buffer.
    StorageBuffer(&'a Buffer),
}

impl DescriptorResource<'_> {
    /// The descriptor type a binding must have to accept this resource.
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            DescriptorResource::Image { .. } => DescriptorType::CombinedImageSampler,
            DescriptorResource::UniformBuffer(_) => DescriptorType::UniformBuffer,
            DescriptorResource::StorageBuffer(_) => DescriptorType::StorageBuffer,
        }
    }
}

/// Points one binding of a descriptor set at a resource.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorSetWrite<'a> {
    /// The set being written.
    pub set: &'a DescriptorSet,
    /// Binding index within the set.
    pub binding: u32,
    /// The resource to bind.
    pub resource: DescriptorResource<'a>,
}
