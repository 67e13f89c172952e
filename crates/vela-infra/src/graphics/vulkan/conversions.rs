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


use ash::vk;

use vela_core::math::Rect2D;
use vela_core::renderer::{
    BufferUsage, DescriptorType, DeviceArchitecture, ImageAspect, IndexType, PipelineStage,
    QueueType, ResourceAccess, ResourceState, ShaderStageFlags, SubpassContents,
};
use vela_core::shaderpack::{
    BlendFactor, CompareOp, PixelFormat, PrimitiveTopology, StencilOp, StencilOpState,
    TextureFilter, VertexField, WrapMode,
};

/// A local extension trait to convert our engine's types into Vulkan types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_vk()` syntax.
pub trait IntoVk<T> {
    /// Consumes self and converts it into a Vulkan type.
    fn into_vk(self) -> T;
}

// --- Formats ---

impl IntoVk<vk::Format> for PixelFormat {
    fn into_vk(self) -> vk::Format {
        match self {
            PixelFormat::Rgba8 => vk::Format::R8G8B8A8_UNORM,
            PixelFormat::Rgba16F => vk::Format::R16G16B16A16_SFLOAT,
            PixelFormat::Rgba32F => vk::Format::R32G32B32A32_SFLOAT,
            PixelFormat::U32 => vk::Format::R32_UINT,
            PixelFormat::Depth => vk::Format::D32_SFLOAT,
            PixelFormat::DepthStencil => vk::Format::D24_UNORM_S8_UINT,
        }
    }
}

impl IntoVk<vk::Format> for VertexField {
    fn into_vk(self) -> vk::Format {
        match self {
            VertexField::Position | VertexField::Normal | VertexField::Tangent => {
                vk::Format::R32G32B32_SFLOAT
            }
            VertexField::Color => vk::Format::R8G8B8A8_UNORM,
            VertexField::UV0 | VertexField::UV1 | VertexField::MidTexCoord => {
                vk::Format::R32G32_SFLOAT
            }
            VertexField::VirtualTextureId | VertexField::McEntityId => vk::Format::R32_UINT,
        }
    }
}

impl IntoVk<vk::ImageAspectFlags> for PixelFormat {
    fn into_vk(self) -> vk::ImageAspectFlags {
        match self {
            PixelFormat::Depth => vk::ImageAspectFlags::DEPTH,
            PixelFormat::DepthStencil => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            _ => vk::ImageAspectFlags::COLOR,
        }
    }
}

impl IntoVk<vk::ImageAspectFlags> for ImageAspect {
    fn into_vk(self) -> vk::ImageAspectFlags {
        let mut flags = vk::ImageAspectFlags::empty();
        if self.contains(ImageAspect::COLOR) {
            flags |= vk::ImageAspectFlags::COLOR;
        }
        if self.contains(ImageAspect::DEPTH) {
            flags |= vk::ImageAspectFlags::DEPTH;
        }
        if self.contains(ImageAspect::STENCIL) {
            flags |= vk::ImageAspectFlags::STENCIL;
        }
        flags
    }
}

// --- Samplers ---

impl IntoVk<vk::Filter> for TextureFilter {
    fn into_vk(self) -> vk::Filter {
        match self {
            TextureFilter::TexelAA | TextureFilter::Bilinear => vk::Filter::LINEAR,
            TextureFilter::Point => vk::Filter::NEAREST,
        }
    }
}

impl IntoVk<vk::SamplerAddressMode> for WrapMode {
    fn into_vk(self) -> vk::SamplerAddressMode {
        match self {
            WrapMode::Repeat => vk::SamplerAddressMode::REPEAT,
            WrapMode::Clamp => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }
}

// --- Descriptors ---

impl IntoVk<vk::DescriptorType> for DescriptorType {
    fn into_vk(self) -> vk::DescriptorType {
        match self {
            DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

impl IntoVk<vk::ShaderStageFlags> for ShaderStageFlags {
    fn into_vk(self) -> vk::ShaderStageFlags {
        [
            (ShaderStageFlags::VERTEX, vk::ShaderStageFlags::VERTEX),
            (
                ShaderStageFlags::TESSELLATION_CONTROL,
                vk::ShaderStageFlags::TESSELLATION_CONTROL,
            ),
            (
                ShaderStageFlags::TESSELLATION_EVALUATION,
                vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            ),
            (ShaderStageFlags::GEOMETRY, vk::ShaderStageFlags::GEOMETRY),
            (ShaderStageFlags::FRAGMENT, vk::ShaderStageFlags::FRAGMENT),
            (ShaderStageFlags::COMPUTE, vk::ShaderStageFlags::COMPUTE),
        ]
        .into_iter()
        .filter(|(ours, _)| self.contains(*ours))
        .fold(vk::ShaderStageFlags::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

// --- Synchronization ---

impl IntoVk<vk::PipelineStageFlags> for PipelineStage {
    fn into_vk(self) -> vk::PipelineStageFlags {
        [
            (PipelineStage::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
            (PipelineStage::DRAW_INDIRECT, vk::PipelineStageFlags::DRAW_INDIRECT),
            (PipelineStage::VERTEX_INPUT, vk::PipelineStageFlags::VERTEX_INPUT),
            (PipelineStage::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
            (PipelineStage::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
            (
                PipelineStage::EARLY_FRAGMENT_TESTS,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            ),
            (
                PipelineStage::LATE_FRAGMENT_TESTS,
                vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            ),
            (
                PipelineStage::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            ),
            (PipelineStage::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
            (PipelineStage::TRANSFER, vk::PipelineStageFlags::TRANSFER),
            (PipelineStage::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
        ]
        .into_iter()
        .filter(|(ours, _)| self.contains(*ours))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl IntoVk<vk::AccessFlags> for ResourceAccess {
    fn into_vk(self) -> vk::AccessFlags {
        [
            (ResourceAccess::INDEX_READ, vk::AccessFlags::INDEX_READ),
            (
                ResourceAccess::VERTEX_ATTRIBUTE_READ,
                vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
            ),
            (ResourceAccess::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
            (ResourceAccess::SHADER_READ, vk::AccessFlags::SHADER_READ),
            (ResourceAccess::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
            (
                ResourceAccess::COLOR_ATTACHMENT_READ,
                vk::AccessFlags::COLOR_ATTACHMENT_READ,
            ),
            (
                ResourceAccess::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            (
                ResourceAccess::DEPTH_STENCIL_READ,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            ),
            (
                ResourceAccess::DEPTH_STENCIL_WRITE,
                vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            (ResourceAccess::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
            (ResourceAccess::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
            (ResourceAccess::HOST_READ, vk::AccessFlags::HOST_READ),
            (ResourceAccess::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
            (ResourceAccess::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
            (ResourceAccess::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
        ]
        .into_iter()
        .filter(|(ours, _)| self.contains(*ours))
        .fold(vk::AccessFlags::empty(), |acc, (_, theirs)| acc | theirs)
    }
}

impl IntoVk<vk::ImageLayout> for ResourceState {
    fn into_vk(self) -> vk::ImageLayout {
        match self {
            ResourceState::Undefined => vk::ImageLayout::UNDEFINED,
            ResourceState::Common
            | ResourceState::UniformBuffer
            | ResourceState::VertexBuffer
            | ResourceState::IndexBuffer
            | ResourceState::ShaderWrite => vk::ImageLayout::GENERAL,
            ResourceState::CopySource => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ResourceState::CopyDestination => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ResourceState::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ResourceState::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ResourceState::DepthWrite => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ResourceState::DepthRead => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            ResourceState::PresentSource => vk::ImageLayout::PRESENT_SRC_KHR,
        }
    }
}

// --- Buffers ---

impl IntoVk<vk::BufferUsageFlags> for BufferUsage {
    fn into_vk(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::UniformBuffer => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::IndexBuffer => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::VertexBuffer => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::StagingBuffer => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }
}

impl IntoVk<vk::IndexType> for IndexType {
    fn into_vk(self) -> vk::IndexType {
        match self {
            IndexType::Uint16 => vk::IndexType::UINT16,
            IndexType::Uint32 => vk::IndexType::UINT32,
        }
    }
}

impl IntoVk<vk::SubpassContents> for SubpassContents {
    fn into_vk(self) -> vk::SubpassContents {
        match self {
            SubpassContents::Inline => vk::SubpassContents::INLINE,
            SubpassContents::SecondaryLists => vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        }
    }
}

// --- Pipeline state ---

impl IntoVk<vk::PrimitiveTopology> for PrimitiveTopology {
    fn into_vk(self) -> vk::PrimitiveTopology {
        match self {
            PrimitiveTopology::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
            PrimitiveTopology::Lines => vk::PrimitiveTopology::LINE_LIST,
        }
    }
}

impl IntoVk<vk::BlendFactor> for BlendFactor {
    fn into_vk(self) -> vk::BlendFactor {
        match self {
            BlendFactor::One => vk::BlendFactor::ONE,
            BlendFactor::Zero => vk::BlendFactor::ZERO,
            BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
            BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
            BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
            BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
            BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
            BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
            BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        }
    }
}

impl IntoVk<vk::CompareOp> for CompareOp {
    fn into_vk(self) -> vk::CompareOp {
        match self {
            CompareOp::Never => vk::CompareOp::NEVER,
            CompareOp::Less => vk::CompareOp::LESS,
            CompareOp::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
            CompareOp::Greater => vk::CompareOp::GREATER,
            CompareOp::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
            CompareOp::Equal => vk::CompareOp::EQUAL,
            CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
            CompareOp::Always => vk::CompareOp::ALWAYS,
        }
    }
}

impl IntoVk<vk::StencilOp> for StencilOp {
    fn into_vk(self) -> vk::StencilOp {
        match self {
            StencilOp::Keep => vk::StencilOp::KEEP,
            StencilOp::Zero => vk::StencilOp::ZERO,
            StencilOp::Replace => vk::StencilOp::REPLACE,
            StencilOp::Incr => vk::StencilOp::INCREMENT_AND_CLAMP,
            StencilOp::IncrWrap => vk::StencilOp::INCREMENT_AND_WRAP,
            StencilOp::Decr => vk::StencilOp::DECREMENT_AND_CLAMP,
            StencilOp::DecrWrap => vk::StencilOp::DECREMENT_AND_WRAP,
            StencilOp::Invert => vk::StencilOp::INVERT,
        }
    }
}

impl IntoVk<vk::StencilOpState> for (StencilOpState, u32) {
    /// Converts a face's stencil state, with the pipeline's reference value.
    fn into_vk(self) -> vk::StencilOpState {
        let (state, reference) = self;
        vk::StencilOpState {
            fail_op: state.fail_op.into_vk(),
            pass_op: state.pass_op.into_vk(),
            depth_fail_op: state.depth_fail_op.into_vk(),
            compare_op: state.compare_op.into_vk(),
            compare_mask: state.compare_mask,
            write_mask: state.write_mask,
            reference,
        }
    }
}

// --- Geometry ---

impl IntoVk<vk::Rect2D> for Rect2D {
    fn into_vk(self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D {
                x: self.x as i32,
                y: self.y as i32,
            },
            extent: vk::Extent2D {
                width: self.width,
                height: self.height,
            },
        }
    }
}

// --- Device identification ---

const VENDOR_AMD: u32 = 0x1002;
const VENDOR_NVIDIA: u32 = 0x10DE;
const VENDOR_INTEL: u32 = 0x8086;

/// Maps a PCI vendor id to the GPU family.
pub(crate) fn architecture_from_vendor_id(vendor_id: u32) -> DeviceArchitecture {
    match vendor_id {
        VENDOR_AMD => DeviceArchitecture::Amd,
        VENDOR_NVIDIA => DeviceArchitecture::Nvidia,
        VENDOR_INTEL => DeviceArchitecture::Intel,
        _ => DeviceArchitecture::Unknown,
    }
}

/// Short name of a queue, for logs and debug names.
pub(crate) fn queue_label(queue: QueueType) -> &'static str {
    match queue {
        QueueType::Graphics => "graphics",
        QueueType::Transfer => "transfer",
        QueueType::AsyncCompute => "compute",
    }
}
