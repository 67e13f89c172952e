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

//! Declarative descriptions of render targets, samplers, passes and materials.
//!
//! These values arrive already parsed from the asset loader and are consumed once,
//! when a pass-set is loaded, to build backend objects.

use super::pipeline::PipelineCreateInfo;
use crate::math::Extent2D;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name of the final-presentation target.
///
/// A pass that writes to it may not write to any other color target.
pub const BACKBUFFER_NAME: &str = "Backbuffer";

/// The pixel formats a pass-set can request for its render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit unsigned normalized RGBA.
    Rgba8,
    /// 16-bit float RGBA.
    Rgba16F,
    /// 32-bit float RGBA.
    Rgba32F,
    /// A single 32-bit unsigned integer channel.
    U32,
    /// 32-bit float depth.
    Depth,
    /// 24-bit depth with 8-bit stencil.
    DepthStencil,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgba16F => 8,
            PixelFormat::Rgba32F => 16,
            PixelFormat::U32 => 4,
            PixelFormat::Depth => 4,
            PixelFormat::DepthStencil => 4,
        }
    }

    /// Returns `true` for depth and depth-stencil formats.
    pub const fn is_depth(self) -> bool {
        matches!(self, PixelFormat::Depth | PixelFormat::DepthStencil)
    }
}

/// How a texture's `width` and `height` are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureDimensionType {
    /// Width and height are fractions of the render size.
    ScreenRelative,
    /// Width and height are pixel counts.
    Absolute,
}

/// Format and size of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureFormat {
    /// The pixel format.
    pub pixel_format: PixelFormat,
    /// How to interpret `width` and `height`.
    pub dimension_type: TextureDimensionType,
    /// Width, either in pixels or as a fraction of the screen width.
    pub width: f32,
    /// Height, either in pixels or as a fraction of the screen height.
    pub height: f32,
}

impl TextureFormat {
    /// Resolves the texture's size in pixels against the current render size.
    pub fn size_in_pixels(&self, screen_size: Extent2D) -> Extent2D {
        match self.dimension_type {
            TextureDimensionType::ScreenRelative => Extent2D::new(
                (self.width * screen_size.width as f32) as u32,
                (self.height * screen_size.height as f32) as u32,
            ),
            TextureDimensionType::Absolute => {
                Extent2D::new(self.width as u32, self.height as u32)
            }
        }
    }
}

/// A render target declared by a pass-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureCreateInfo {
    /// Name used by passes and materials to refer to the texture.
    pub name: String,
    /// Format and size.
    pub format: TextureFormat,
}

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    /// Anti-aliased texel filtering.
    TexelAA,
    /// Bilinear filtering.
    #[default]
    Bilinear,
    /// Nearest-neighbour filtering.
    Point,
}

/// Texture coordinate wrap mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WrapMode {
    /// Coordinates wrap around.
    #[default]
    Repeat,
    /// Coordinates clamp to the edge.
    Clamp,
}

/// A sampler declared by a pass-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerCreateInfo {
    /// Name used by materials to refer to the sampler.
    pub name: String,
    /// Filtering mode.
    #[serde(default)]
    pub filter: TextureFilter,
    /// Wrap mode.
    #[serde(default)]
    pub wrap_mode: WrapMode,
}

/// A color or depth attachment of a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureAttachmentInfo {
    /// Name of the render target.
    pub name: String,
    /// Format of the render target.
    pub pixel_format: PixelFormat,
    /// Whether the attachment is cleared when the pass begins.
    #[serde(default)]
    pub clear: bool,
}

impl TextureAttachmentInfo {
    /// Returns `true` if this attachment is the final-presentation target.
    pub fn is_backbuffer(&self) -> bool {
        self.name == BACKBUFFER_NAME
    }
}

/// A render pass declared by a pass-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPassCreateInfo {
    /// Unique name of the pass.
    pub name: String,
    /// Passes that must execute before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Textures sampled by the pass.
    #[serde(default)]
    pub texture_inputs: Vec<String>,
    /// Color targets written by the pass.
    #[serde(default)]
    pub texture_outputs: Vec<TextureAttachmentInfo>,
    /// Depth target, if any. `None` means the pass runs without depth.
    #[serde(default)]
    pub depth_texture: Option<TextureAttachmentInfo>,
    /// Buffers read by the pass.
    #[serde(default)]
    pub input_buffers: Vec<String>,
    /// Buffers written by the pass.
    #[serde(default)]
    pub output_buffers: Vec<String>,
}

impl RenderPassCreateInfo {
    /// Returns `true` if one of the color outputs is the final-presentation target.
    pub fn writes_to_backbuffer(&self) -> bool {
        self.texture_outputs.iter().any(TextureAttachmentInfo::is_backbuffer)
    }
}

/// One pass of a material: which pipeline it uses and what its bindings point at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPass {
    /// Name of this material pass.
    pub name: String,
    /// Name of the material this pass belongs to.
    pub material_name: String,
    /// Name of the pipeline used to draw this pass.
    pub pipeline: String,
    /// Maps a shader binding name to the resource (texture, sampler, buffer) bound to it.
    #[serde(default)]
    pub bindings: HashMap<String, String>,
}

/// A material declared by a pass-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialData {
    /// Name of the material.
    pub name: String,
    /// The material's passes.
    pub passes: Vec<MaterialPass>,
    /// Selects which geometry is drawn with this material.
    #[serde(default)]
    pub geometry_filter: String,
}

/// Render targets and samplers declared by a pass-set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderpackResourcesData {
    /// Render targets.
    #[serde(default)]
    pub textures: Vec<TextureCreateInfo>,
    /// Samplers.
    #[serde(default)]
    pub samplers: Vec<SamplerCreateInfo>,
}

/// Everything a pass-set declares, loaded and swapped as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderpackData {
    /// Pipelines, in declaration order.
    #[serde(default)]
    pub pipelines: Vec<PipelineCreateInfo>,
    /// Render passes, in declaration order.
    #[serde(default)]
    pub passes: Vec<RenderPassCreateInfo>,
    /// Materials.
    #[serde(default)]
    pub materials: Vec<MaterialData>,
    /// Render targets and samplers.
    #[serde(default)]
    pub resources: ShaderpackResourcesData,
}
