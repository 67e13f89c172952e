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

//! Declarative pipeline descriptions and parent inheritance.

use crate::renderer::api::{DescriptorType, ShaderStageFlags};
use serde::{Deserialize, Serialize};

/// A fixed-function toggle declared by a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStateFlag {
    /// Enable blending with the configured blend factors.
    Blending,
    /// Cull front faces instead of back faces.
    InvertCulling,
    /// Disable face culling.
    DisableCulling,
    /// Do not write depth.
    DisableDepthWrite,
    /// Do not test depth.
    DisableDepthTest,
    /// Enable the stencil test.
    EnableStencilTest,
    /// Write stencil.
    StencilWrite,
    /// Do not write color.
    DisableColorWrite,
    /// Enable alpha-to-coverage.
    EnableAlphaToCoverage,
    /// Do not write alpha.
    DisableAlphaWrite,
}

/// A vertex attribute the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexField {
    /// Object-space position.
    Position,
    /// Vertex color.
    Color,
    /// Main texture coordinates.
    UV0,
    /// Lightmap texture coordinates.
    UV1,
    /// Normal.
    Normal,
    /// Tangent.
    Tangent,
    /// Texture coordinate at the middle of the face.
    MidTexCoord,
    /// Virtual texture page id.
    VirtualTextureId,
    /// Per-entity id.
    McEntityId,
}

impl VertexField {
    /// Size of the attribute in a vertex, in bytes.
    pub const fn size_in_bytes(self) -> u32 {
        match self {
            VertexField::Position | VertexField::Normal | VertexField::Tangent => 12,
            VertexField::Color => 4,
            VertexField::UV0 | VertexField::UV1 | VertexField::MidTexCoord => 8,
            VertexField::VirtualTextureId | VertexField::McEntityId => 4,
        }
    }
}

/// A vertex attribute as named in the vertex shader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexFieldData {
    /// Semantic name in the shader.
    pub semantic_name: String,
    /// The attribute.
    pub field: VertexField,
}

/// Multisampling support of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MsaaSupport {
    /// Only multisampled.
    Msaa,
    /// Both multisampled and single-sampled.
    Both,
    /// Only single-sampled.
    #[default]
    None,
}

/// Stencil operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StencilOp {
    /// Keep the current value.
    #[default]
    Keep,
    /// Write zero.
    Zero,
    /// Write the reference value.
    Replace,
    /// Increment and clamp.
    Incr,
    /// Increment and wrap.
    IncrWrap,
    /// Decrement and clamp.
    Decr,
    /// Decrement and wrap.
    DecrWrap,
    /// Invert the bits.
    Invert,
}

/// Comparison function for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareOp {
    /// Never passes.
    Never,
    /// Passes if less.
    #[default]
    Less,
    /// Passes if less or equal.
    LessEqual,
    /// Passes if greater.
    Greater,
    /// Passes if greater or equal.
    GreaterEqual,
    /// Passes if equal.
    Equal,
    /// Passes if not equal.
    NotEqual,
    /// Always passes.
    Always,
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    /// Triangle lists.
    #[default]
    Triangles,
    /// Line lists.
    Lines,
}

/// Blend factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    /// 1.
    One,
    /// 0.
    Zero,
    /// Source color.
    SrcColor,
    /// Destination color.
    DstColor,
    /// 1 - source color.
    OneMinusSrcColor,
    /// 1 - destination color.
    OneMinusDstColor,
    /// Source alpha.
    SrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// 1 - source alpha.
    OneMinusSrcAlpha,
    /// 1 - destination alpha.
    OneMinusDstAlpha,
}

/// Which queue of draws a pipeline belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderQueue {
    /// Drawn after opaque geometry, back to front.
    Transparent,
    /// Opaque geometry.
    #[default]
    Opaque,
    /// Alpha-tested geometry.
    Cutout,
}

/// Stencil state for one face orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StencilOpState {
    /// Operation when the stencil test fails.
    pub fail_op: StencilOp,
    /// Operation when both tests pass.
    pub pass_op: StencilOp,
    /// Operation when the stencil test passes and the depth test fails.
    pub depth_fail_op: StencilOp,
    /// Comparison function.
    pub compare_op: CompareOp,
    /// Compare mask.
    pub compare_mask: u32,
    /// Write mask.
    pub write_mask: u32,
}

/// A resource a shader stage uses, as reported by SPIR-V reflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderResource {
    /// Name of the resource in the shader.
    pub name: String,
    /// Descriptor set index.
    pub set: u32,
    /// Binding index.
    pub binding: u32,
    /// Array size; 1 for non-arrays.
    pub count: u32,
    /// Kind of resource.
    pub descriptor_type: DescriptorType,
}

/// One compiled shader stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderSource {
    /// Path the shader was loaded from.
    pub filename: String,
    /// SPIR-V words.
    #[serde(default)]
    pub spirv: Vec<u32>,
    /// Resources the stage uses.
    #[serde(default)]
    pub resources: Vec<ShaderResource>,
}

/// A pipeline declared by a pass-set.
///
/// Every inheritable field is optional (or an empty list) so that a child can
/// override only what it needs; see [`merge_with_parent`](Self::merge_with_parent).
/// The accessor methods resolve unset fields to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineCreateInfo {
    /// Unique name of the pipeline.
    pub name: String,
    /// Pipeline to inherit unset fields from.
    pub parent_name: Option<String>,
    /// Render pass the pipeline draws in.
    pub pass: String,
    /// Preprocessor defines the shaders were compiled with.
    pub defines: Vec<String>,
    /// Fixed-function toggles.
    pub states: Vec<PipelineStateFlag>,
    /// Vertex attributes, in binding order.
    pub vertex_fields: Vec<VertexFieldData>,
    /// Stencil state for front faces.
    pub front_face: Option<StencilOpState>,
    /// Stencil state for back faces.
    pub back_face: Option<StencilOpState>,
    /// Pipeline to use if this one fails to build.
    pub fallback: Option<String>,
    /// Constant depth bias.
    pub depth_bias: Option<f32>,
    /// Slope-scaled depth bias.
    pub slope_scaled_depth_bias: Option<f32>,
    /// Stencil reference value.
    pub stencil_ref: Option<u32>,
    /// Stencil read mask.
    pub stencil_read_mask: Option<u32>,
    /// Stencil write mask.
    pub stencil_write_mask: Option<u32>,
    /// Multisampling support.
    pub msaa_support: Option<MsaaSupport>,
    /// Primitive assembly mode.
    pub primitive_mode: Option<PrimitiveTopology>,
    /// Color source blend factor.
    pub source_blend_factor: Option<BlendFactor>,
    /// Color destination blend factor.
    pub destination_blend_factor: Option<BlendFactor>,
    /// Alpha source blend factor.
    pub alpha_src: Option<BlendFactor>,
    /// Alpha destination blend factor.
    pub alpha_dst: Option<BlendFactor>,
    /// Depth comparison function.
    pub depth_func: Option<CompareOp>,
    /// Draw queue.
    pub render_queue: Option<RenderQueue>,
    /// Vertex stage. Required once the parent chain is merged.
    pub vertex_shader: Option<ShaderSource>,
    /// Geometry stage.
    pub geometry_shader: Option<ShaderSource>,
    /// Tessellation control stage.
    pub tessellation_control_shader: Option<ShaderSource>,
    /// Tessellation evaluation stage.
    pub tessellation_evaluation_shader: Option<ShaderSource>,
    /// Fragment stage.
    pub fragment_shader: Option<ShaderSource>,
}

fn inherit_list<T: Clone>(child: &[T], parent: &[T]) -> Vec<T> {
    if child.is_empty() {
        parent.to_vec()
    } else {
        child.to_vec()
    }
}

fn inherit<T: Clone>(child: &Option<T>, parent: &Option<T>) -> Option<T> {
    child.clone().or_else(|| parent.clone())
}

impl PipelineCreateInfo {
    /// Overlays this pipeline on `parent`: every field set here wins, every unset
    /// field is taken from the parent. Name and parent name always stay the child's.
    pub fn merge_with_parent(&self, parent: &PipelineCreateInfo) -> PipelineCreateInfo {
        PipelineCreateInfo {
            name: self.name.clone(),
            parent_name: self.parent_name.clone(),
            pass: if self.pass.is_empty() {
                parent.pass.clone()
            } else {
                self.pass.clone()
            },
            defines: inherit_list(&self.defines, &parent.defines),
            states: inherit_list(&self.states, &parent.states),
            vertex_fields: inherit_list(&self.vertex_fields, &parent.vertex_fields),
            front_face: inherit(&self.front_face, &parent.front_face),
            back_face: inherit(&self.back_face, &parent.back_face),
            fallback: inherit(&self.fallback, &parent.fallback),
            depth_bias: inherit(&self.depth_bias, &parent.depth_bias),
            slope_scaled_depth_bias: inherit(
                &self.slope_scaled_depth_bias,
                &parent.slope_scaled_depth_bias,
            ),
            stencil_ref: inherit(&self.stencil_ref, &parent.stencil_ref),
            stencil_read_mask: inherit(&self.stencil_read_mask, &parent.stencil_read_mask),
            stencil_write_mask: inherit(&self.stencil_write_mask, &parent.stencil_write_mask),
            msaa_support: inherit(&self.msaa_support, &parent.msaa_support),
            primitive_mode: inherit(&self.primitive_mode, &parent.primitive_mode),
            source_blend_factor: inherit(&self.source_blend_factor, &parent.source_blend_factor),
            destination_blend_factor: inherit(
                &self.destination_blend_factor,
                &parent.destination_blend_factor,
            ),
            alpha_src: inherit(&self.alpha_src, &parent.alpha_src),
            alpha_dst: inherit(&self.alpha_dst, &parent.alpha_dst),
            depth_func: inherit(&self.depth_func, &parent.depth_func),
            render_queue: inherit(&self.render_queue, &parent.render_queue),
            vertex_shader: inherit(&self.vertex_shader, &parent.vertex_shader),
            geometry_shader: inherit(&self.geometry_shader, &parent.geometry_shader),
            tessellation_control_shader: inherit(
                &self.tessellation_control_shader,
                &parent.tessellation_control_shader,
            ),
            tessellation_evaluation_shader: inherit(
                &self.tessellation_evaluation_shader,
                &parent.tessellation_evaluation_shader,
            ),
            fragment_shader: inherit(&self.fragment_shader, &parent.fragment_shader),
        }
    }

    /// Returns `true` if the pipeline declares `flag`.
    pub fn has_state(&self, flag: PipelineStateFlag) -> bool {
        self.states.contains(&flag)
    }

    /// Every present shader stage, paired with its stage flag, in pipeline order.
    pub fn shader_stages(&self) -> Vec<(ShaderStageFlags, &ShaderSource)> {
        [
            (ShaderStageFlags::VERTEX, &self.vertex_shader),
            (
                ShaderStageFlags::TESSELLATION_CONTROL,
                &self.tessellation_control_shader,
            ),
            (
                ShaderStageFlags::TESSELLATION_EVALUATION,
                &self.tessellation_evaluation_shader,
            ),
            (ShaderStageFlags::GEOMETRY, &self.geometry_shader),
            (ShaderStageFlags::FRAGMENT, &self.fragment_shader),
        ]
        .into_iter()
        .filter_map(|(stage, source)| source.as_ref().map(|source| (stage, source)))
        .collect()
    }

    /// Size of one vertex, summed over the declared vertex fields.
    pub fn vertex_stride(&self) -> u32 {
        self.vertex_fields
            .iter()
            .map(|field| field.field.size_in_bytes())
            .sum()
    }

    /// Constant depth bias, 0 if unset.
    pub fn resolved_depth_bias(&self) -> f32 {
        self.depth_bias.unwrap_or(0.0)
    }

    /// Slope-scaled depth bias, 0 if unset.
    pub fn resolved_slope_scaled_depth_bias(&self) -> f32 {
        self.slope_scaled_depth_bias.unwrap_or(0.0)
    }

    /// Stencil reference value, 0 if unset.
    pub fn resolved_stencil_ref(&self) -> u32 {
        self.stencil_ref.unwrap_or(0)
    }

    /// Stencil read mask, all bits if unset.
    pub fn resolved_stencil_read_mask(&self) -> u32 {
        self.stencil_read_mask.unwrap_or(0xFF)
    }

    /// Stencil write mask, all bits if unset.
    pub fn resolved_stencil_write_mask(&self) -> u32 {
        self.stencil_write_mask.unwrap_or(0xFF)
    }

    /// Primitive mode, triangles if unset.
    pub fn resolved_primitive_mode(&self) -> PrimitiveTopology {
        self.primitive_mode.unwrap_or_default()
    }

    /// Color source blend factor, `One` if unset.
    pub fn resolved_source_blend_factor(&self) -> BlendFactor {
        self.source_blend_factor.unwrap_or(BlendFactor::One)
    }

    /// Color destination blend factor, `Zero` if unset.
    pub fn resolved_destination_blend_factor(&self) -> BlendFactor {
        self.destination_blend_factor.unwrap_or(BlendFactor::Zero)
    }

    /// Alpha source blend factor, `One` if unset.
    pub fn resolved_alpha_src(&self) -> BlendFactor {
        self.alpha_src.unwrap_or(BlendFactor::One)
    }

    /// Alpha destination blend factor, `Zero` if unset.
    pub fn resolved_alpha_dst(&self) -> BlendFactor {
        self.alpha_dst.unwrap_or(BlendFactor::Zero)
    }

    /// Depth comparison, `Less` if unset.
    pub fn resolved_depth_func(&self) -> CompareOp {
        self.depth_func.unwrap_or_default()
    }

    /// Draw queue, `Opaque` if unset.
    pub fn resolved_render_queue(&self) -> RenderQueue {
        self.render_queue.unwrap_or_default()
    }

    /// Multisampling support, `None` if unset.
    pub fn resolved_msaa_support(&self) -> MsaaSupport {
        self.msaa_support.unwrap_or_default()
    }
}
