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

//! Render passes, framebuffers, pipeline interfaces and pipelines.

use super::descriptor::ResourceBindingDescription;
use crate::math::{Extent2D, Rect2D};
use crate::shaderpack::TextureAttachmentInfo;
use std::collections::HashMap;

/// Identifies a render pass within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderpassId(pub usize);

/// A render pass, created once from a complete [`RenderPassCreateInfo`].
///
/// [`RenderPassCreateInfo`]: crate::shaderpack::RenderPassCreateInfo
#[derive(Debug, PartialEq, Eq)]
pub struct Renderpass {
    /// The backend's identifier.
    pub id: RenderpassId,
    /// Name of the pass.
    pub name: String,
    /// The area the pass renders to.
    pub render_area: Rect2D,
    /// Number of color attachments.
    pub color_attachment_count: u32,
    /// Whether the pass renders to the final-presentation target.
    pub writes_to_backbuffer: bool,
}

/// Identifies a framebuffer within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub usize);

/// The concrete images a render pass draws into.
#[derive(Debug, PartialEq, Eq)]
pub struct Framebuffer {
    /// The backend's identifier.
    pub id: FramebufferId,
    /// Size shared by every attachment.
    pub extent: Extent2D,
    /// Number of attachments, depth included.
    pub attachment_count: u32,
}

/// Identifies a pipeline interface within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineInterfaceId(pub usize);

/// The resource layout and attachment formats a pipeline is built against.
#[derive(Debug, PartialEq, Eq)]
pub struct PipelineInterface {
    /// The backend's identifier.
    pub id: PipelineInterfaceId,
    /// Every named resource the pipeline's shaders use, merged across stages.
    pub bindings: HashMap<String, ResourceBindingDescription>,
    /// Color attachments of the pass the pipeline renders in.
    pub color_attachments: Vec<TextureAttachmentInfo>,
    /// Depth attachment of that pass, if any.
    pub depth_texture: Option<TextureAttachmentInfo>,
}

impl PipelineInterface {
    /// Number of descriptor set layouts, including empty ones below the highest used index.
    pub fn set_count(&self) -> u32 {
        self.bindings
            .values()
            .map(|binding| binding.set + 1)
            .max()
            .unwrap_or(0)
    }

    /// Bindings of one descriptor set, sorted by binding index.
    pub fn bindings_in_set(&self, set: u32) -> Vec<(&str, &ResourceBindingDescription)> {
        let mut bindings: Vec<_> = self
            .bindings
            .iter()
            .filter(|(_, description)| description.set == set)
            .map(|(name, description)| (name.as_str(), description))
            .collect();
        bindings.sort_by_key(|(_, description)| description.binding);
        bindings
    }
}

/// Identifies a pipeline within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub usize);

/// A compiled graphics pipeline.
#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
    /// The backend's identifier.
    pub id: PipelineId,
    /// Name from the pass-set.
    pub name: String,
    /// The interface the pipeline was built against.
    pub interface: PipelineInterfaceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::api::{DescriptorType, ShaderStageFlags};

    fn binding(set: u32, binding: u32) -> ResourceBindingDescription {
        ResourceBindingDescription {
            set,
            binding,
            count: 1,
            descriptor_type: DescriptorType::UniformBuffer,
            stages: ShaderStageFlags::VERTEX,
        }
    }

    #[test]
    fn set_count_covers_gaps() {
        let interface = PipelineInterface {
            id: PipelineInterfaceId(0),
            bindings: HashMap::from([
                ("camera".to_string(), binding(0, 0)),
                ("lights".to_string(), binding(2, 1)),
                ("shadow".to_string(), binding(2, 0)),
            ]),
            color_attachments: Vec::new(),
            depth_texture: None,
        };
        assert_eq!(interface.set_count(), 3);
        assert!(interface.bindings_in_set(1).is_empty());
        let names: Vec<_> = interface.bindings_in_set(2).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["shadow", "lights"]);
    }
}
