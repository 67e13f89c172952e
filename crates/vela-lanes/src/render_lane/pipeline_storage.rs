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

//! Builds backend pipelines from declarative descriptions and keeps them by name.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use vela_core::renderer::{
    Pipeline, PipelineError, PipelineInterface, RenderDevice, ResourceBindingDescription,
    ResourceError,
};
use vela_core::shaderpack::{PipelineCreateInfo, RenderPassCreateInfo, TextureAttachmentInfo};

/// Why a pipeline could not be created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineStorageError {
    /// The description itself is unusable.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The device failed to build the interface or the pipeline.
    #[error("device could not build pipeline '{name}': {source}")]
    Device {
        /// The pipeline being built.
        name: String,
        /// The device's error.
        #[source]
        source: ResourceError,
    },
}

/// A built pipeline, its interface, and the merged description it was built from.
#[derive(Debug)]
pub struct StoredPipeline {
    /// The compiled pipeline.
    pub pipeline: Pipeline,
    /// The layout it was compiled against.
    pub interface: PipelineInterface,
    /// The description after parent merge.
    pub description: PipelineCreateInfo,
}

#[derive(Debug, Clone)]
struct PassAttachments {
    color_attachments: Vec<TextureAttachmentInfo>,
    depth_texture: Option<TextureAttachmentInfo>,
}

/// Merges every shader stage's reflected resources into one binding table.
///
/// Stages that use the same name must agree on set, binding, count and type; their
/// stage visibility is combined.
pub fn merge_stage_bindings(
    info: &PipelineCreateInfo,
) -> Result<HashMap<String, ResourceBindingDescription>, PipelineError> {
    let mut bindings: HashMap<String, ResourceBindingDescription> = HashMap::new();

    for (stage, source) in info.shader_stages() {
        for resource in &source.resources {
            let description = ResourceBindingDescription {
                set: resource.set,
                binding: resource.binding,
                count: resource.count.max(1),
                descriptor_type: resource.descriptor_type,
                stages: stage,
            };

            match bindings.get_mut(&resource.name) {
                Some(existing) if existing.is_compatible_with(&description) => {
                    existing.stages |= stage;
                }
                Some(_) => {
                    return Err(PipelineError::IncompatibleBinding {
                        pipeline: info.name.clone(),
                        name: resource.name.clone(),
                    });
                }
                None => {
                    bindings.insert(resource.name.clone(), description);
                }
            }
        }
    }

    Ok(bindings)
}

/// Owns every pipeline of a loaded pass-set, keyed by name.
#[derive(Debug)]
pub struct PipelineStorage {
    device: Arc<dyn RenderDevice>,
    passes: HashMap<String, PassAttachments>,
    pipelines: HashMap<String, StoredPipeline>,
}

impl PipelineStorage {
    /// Creates an empty storage that builds its pipelines on `device`.
    pub fn new(device: Arc<dyn RenderDevice>) -> Self {
        Self {
            device,
            passes: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Makes a render pass available for pipelines to render in.
    pub fn register_renderpass(&mut self, info: &RenderPassCreateInfo) {
        self.passes.insert(
            info.name.clone(),
            PassAttachments {
                color_attachments: info.texture_outputs.clone(),
                depth_texture: info.depth_texture.clone(),
            },
        );
    }

    /// Builds the pipeline described by `info` and stores it under its name.
    ///
    /// A named parent must already have been created; its description is overlaid
    /// by `info`. If the device fails to compile the pipeline, the interface built
    /// for it is destroyed again. An existing pipeline with the same name is replaced.
    pub fn create_pipeline(&mut self, info: &PipelineCreateInfo) -> Result<(), PipelineStorageError> {
        let description = match &info.parent_name {
            Some(parent) => {
                let stored = self.pipelines.get(parent).ok_or_else(|| {
                    PipelineError::UnknownParent {
                        pipeline: info.name.clone(),
                        parent: parent.clone(),
                    }
                })?;
                info.merge_with_parent(&stored.description)
            }
            None => info.clone(),
        };

        if description.vertex_shader.is_none() {
            return Err(PipelineError::MissingVertexShader {
                pipeline: description.name.clone(),
            }
            .into());
        }

        let pass = self
            .passes
            .get(&description.pass)
            .ok_or_else(|| PipelineError::UnknownPass {
                pipeline: description.name.clone(),
                pass: description.pass.clone(),
            })?;

        let bindings = merge_stage_bindings(&description)?;

        let interface = self
            .device
            .create_pipeline_interface(
                &bindings,
                &pass.color_attachments,
                pass.depth_texture.as_ref(),
            )
            .map_err(|source| PipelineStorageError::Device {
                name: description.name.clone(),
                source,
            })?;

        let pipeline = match self.device.create_pipeline(&interface, &description) {
            Ok(pipeline) => pipeline,
            Err(source) => {
                if let Err(err) = self.device.destroy_pipeline_interface(interface) {
                    log::warn!(
                        "Failed to destroy the interface of pipeline '{}': {err}",
                        description.name
                    );
                }
                return Err(PipelineStorageError::Device {
                    name: description.name.clone(),
                    source,
                });
            }
        };

        log::debug!(
            "Created pipeline '{}' in pass '{}' with {} bindings",
            description.name,
            description.pass,
            interface.bindings.len()
        );

        let name = description.name.clone();
        let replaced = self.pipelines.insert(
            name,
            StoredPipeline {
                pipeline,
                interface,
                description,
            },
        );
        if let Some(old) = replaced {
            log::warn!("Pipeline '{}' was replaced", old.description.name);
            self.destroy_stored(old);
        }

        Ok(())
    }

    /// Looks up a pipeline by name.
    pub fn get_pipeline(&self, name: &str) -> Option<&StoredPipeline> {
        self.pipelines.get(name)
    }

    /// Names of every stored pipeline.
    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    /// Number of stored pipelines.
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns `true` if no pipeline is stored.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Destroys every stored pipeline and its interface.
    pub fn destroy_all(&mut self) {
        let pipelines: Vec<StoredPipeline> = self.pipelines.drain().map(|(_, p)| p).collect();
        for stored in pipelines {
            self.destroy_stored(stored);
        }
        self.passes.clear();
    }

    fn destroy_stored(&self, stored: StoredPipeline) {
        let name = stored.description.name;
        if let Err(err) = self.device.destroy_pipeline(stored.pipeline) {
            log::warn!("Failed to destroy pipeline '{name}': {err}");
        }
        if let Err(err) = self.device.destroy_pipeline_interface(stored.interface) {
            log::warn!("Failed to destroy the interface of pipeline '{name}': {err}");
        }
    }
}
