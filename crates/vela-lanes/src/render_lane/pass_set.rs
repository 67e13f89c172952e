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

//! Turns a pass-set description into GPU objects, and tears them down again.
//!
//! Loading is forgiving at pass, pipeline and material granularity: anything that
//! fails to build is logged and skipped, and the rest of the pass-set still loads.
//! Only errors that make the whole set meaningless (unorderable passes or
//! pipelines) abort the load.

use super::pass_order::{order_passes, PassOrderError};
use super::pipeline_storage::PipelineStorage;
use super::resource_storage::ResourceStorage;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use vela_core::graph::topological_sort;
use vela_core::math::Extent2D;
use vela_core::renderer::{
    CommandList, CommandListError, DescriptorPool, DescriptorResource, DescriptorSet,
    DescriptorSetWrite, DescriptorType, Framebuffer, Image, RenderDevice, Renderpass,
    ResourceError, SubpassContents,
};
use vela_core::shaderpack::{
    MaterialPass, PassValidationError, PipelineCreateInfo, RenderPassCreateInfo, ShaderpackData,
    TextureAttachmentInfo,
};

/// Errors that abort a pass-set load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The render passes cannot be ordered.
    #[error(transparent)]
    PassOrder(#[from] PassOrderError),
    /// Pipelines inherit from each other in a cycle.
    #[error("pipeline parent cycle among {0:?}")]
    PipelineCycle(Vec<String>),
}

/// A render pass that was built successfully.
#[derive(Debug)]
pub struct LoadedRenderpass {
    /// The description it was built from.
    pub info: RenderPassCreateInfo,
    /// The backend render pass.
    pub renderpass: Renderpass,
    /// The images it draws into.
    pub framebuffer: Framebuffer,
    /// Names of the pipelines that render in this pass, in creation order.
    pub pipelines: Vec<String>,
}

/// The descriptor sets of one material pass.
#[derive(Debug)]
pub struct LoadedMaterialPass {
    /// The material.
    pub material: String,
    /// The material pass.
    pub pass: String,
    /// The pipeline it draws with.
    pub pipeline: String,
    /// One set per set index of the pipeline's interface.
    pub descriptor_sets: Vec<DescriptorSet>,
}

/// Every GPU object a pass-set owns.
#[derive(Debug)]
pub struct LoadedPassSet {
    passes: Vec<LoadedRenderpass>,
    pipelines: PipelineStorage,
    resources: ResourceStorage,
    descriptor_pool: Option<DescriptorPool>,
    materials: Vec<LoadedMaterialPass>,
}

impl LoadedPassSet {
    /// Loaded render passes, in submission order.
    pub fn passes(&self) -> &[LoadedRenderpass] {
        &self.passes
    }

    /// Looks up a loaded render pass by name.
    pub fn pass(&self, name: &str) -> Option<&LoadedRenderpass> {
        self.passes.iter().find(|pass| pass.info.name == name)
    }

    /// The pass-set's pipelines.
    pub fn pipelines(&self) -> &PipelineStorage {
        &self.pipelines
    }

    /// The pass-set's render targets and samplers.
    pub fn resources(&self) -> &ResourceStorage {
        &self.resources
    }

    /// Every material pass whose descriptor sets were built.
    pub fn material_passes(&self) -> &[LoadedMaterialPass] {
        &self.materials
    }

    /// Looks up one pass of a material.
    pub fn material_pass(&self, material: &str, pass: &str) -> Option<&LoadedMaterialPass> {
        self.materials
            .iter()
            .find(|entry| entry.material == material && entry.pass == pass)
    }

    /// Records every pass in order: begin, `draw`, end.
    pub fn record_passes<F>(&self, list: &mut dyn CommandList, mut draw: F) -> Result<(), CommandListError>
    where
        F: FnMut(&LoadedRenderpass, &mut dyn CommandList) -> Result<(), CommandListError>,
    {
        for pass in &self.passes {
            list.begin_renderpass(&pass.renderpass, &pass.framebuffer, SubpassContents::Inline)?;
            draw(pass, &mut *list)?;
            list.end_renderpass()?;
        }
        Ok(())
    }

    /// Destroys every GPU object the pass-set owns.
    ///
    /// The caller must make sure the GPU no longer uses any of them.
    pub fn unload(mut self, device: &dyn RenderDevice) {
        self.materials.clear();
        if let Some(pool) = self.descriptor_pool.take() {
            if let Err(err) = device.destroy_descriptor_pool(pool) {
                log::warn!("Failed to destroy the material descriptor pool: {err}");
            }
        }

        self.pipelines.destroy_all();

        for pass in self.passes.drain(..) {
            let name = pass.info.name;
            if let Err(err) = device.destroy_framebuffer(pass.framebuffer) {
                log::warn!("Failed to destroy the framebuffer of pass '{name}': {err}");
            }
            if let Err(err) = device.destroy_renderpass(pass.renderpass) {
                log::warn!("Failed to destroy render pass '{name}': {err}");
            }
        }

        self.resources.destroy_all();
        log::info!("Pass-set unloaded");
    }
}

/// Builds [`LoadedPassSet`]s on one device.
#[derive(Debug)]
pub struct PassSetLoader {
    device: Arc<dyn RenderDevice>,
    render_size: Extent2D,
}

impl PassSetLoader {
    /// Creates a loader. Screen-relative targets are sized against `render_size`.
    pub fn new(device: Arc<dyn RenderDevice>, render_size: Extent2D) -> Self {
        Self {
            device,
            render_size,
        }
    }

    /// Builds every object `data` describes.
    ///
    /// ## Arguments
    /// * `data` - The pass-set.
    /// * `backbuffer` - The image passes writing to the backbuffer render into.
    /// ## Returns
    /// The loaded pass-set, or a [`LoadError`] if passes or pipelines cannot be ordered.
    pub fn load(&self, data: &ShaderpackData, backbuffer: &Image) -> Result<LoadedPassSet, LoadError> {
        let ordered_passes = order_passes(&data.passes)?;
        let pipeline_order = order_pipelines(&data.pipelines)?;

        let mut resources = ResourceStorage::new(self.device.clone(), self.render_size);
        resources.create_render_targets(&data.resources.textures);
        resources.create_samplers(&data.resources.samplers);

        let mut pipelines = PipelineStorage::new(self.device.clone());
        let mut passes = Vec::with_capacity(ordered_passes.len());
        for info in ordered_passes {
            match self.build_pass(info, &resources, backbuffer) {
                Ok((renderpass, framebuffer)) => {
                    pipelines.register_renderpass(info);
                    passes.push(LoadedRenderpass {
                        info: info.clone(),
                        renderpass,
                        framebuffer,
                        pipelines: Vec::new(),
                    });
                }
                Err(err) => log::error!("Skipping render pass '{}': {err}", info.name),
            }
        }

        for index in pipeline_order {
            let info = &data.pipelines[index];
            match pipelines.create_pipeline(info) {
                Ok(()) => {
                    let pass_name = pipelines
                        .get_pipeline(&info.name)
                        .map(|stored| stored.description.pass.clone())
                        .unwrap_or_default();
                    if let Some(pass) = passes.iter_mut().find(|p| p.info.name == pass_name) {
                        pass.pipelines.push(info.name.clone());
                    }
                }
                Err(err) => log::error!("Skipping pipeline '{}': {err}", info.name),
            }
        }

        let (descriptor_pool, materials) = self.build_materials(data, &pipelines, &resources);

        log::info!(
            "Loaded pass-set: {}/{} passes, {}/{} pipelines, {} material passes, {} render targets",
            passes.len(),
            data.passes.len(),
            pipelines.len(),
            data.pipelines.len(),
            materials.len(),
            resources.render_target_count()
        );

        Ok(LoadedPassSet {
            passes,
            pipelines,
            resources,
            descriptor_pool,
            materials,
        })
    }

    fn build_pass(
        &self,
        info: &RenderPassCreateInfo,
        resources: &ResourceStorage,
        backbuffer: &Image,
    ) -> Result<(Renderpass, Framebuffer), ResourceError> {
        info.validate(self.device.info().max_color_attachments)?;

        let lookup = |attachment: &TextureAttachmentInfo| -> Result<&Image, ResourceError> {
            if attachment.is_backbuffer() {
                Ok(backbuffer)
            } else {
                resources
                    .get_render_target(&attachment.name)
                    .ok_or_else(|| ResourceError::NotFound(attachment.name.clone()))
            }
        };

        let color_images = info
            .texture_outputs
            .iter()
            .map(lookup)
            .collect::<Result<Vec<_>, _>>()?;
        let depth_image = info.depth_texture.as_ref().map(lookup).transpose()?;

        let mut attachments = color_images.iter().copied().chain(depth_image);
        let framebuffer_size = match attachments.next() {
            Some(first) => {
                if let Some(mismatch) = attachments.find(|image| image.extent != first.extent) {
                    return Err(PassValidationError::MismatchedAttachmentSizes {
                        pass: info.name.clone(),
                        attachment: mismatch.name.clone(),
                    }
                    .into());
                }
                first.extent
            }
            None => self.render_size,
        };

        let renderpass = self.device.create_renderpass(info, framebuffer_size)?;
        match self.device.create_framebuffer(
            &renderpass,
            &color_images,
            depth_image,
            framebuffer_size,
        ) {
            Ok(framebuffer) => Ok((renderpass, framebuffer)),
            Err(err) => {
                if let Err(destroy_err) = self.device.destroy_renderpass(renderpass) {
                    log::warn!("Failed to destroy render pass '{}': {destroy_err}", info.name);
                }
                Err(err)
            }
        }
    }

    fn build_materials(
        &self,
        data: &ShaderpackData,
        pipelines: &PipelineStorage,
        resources: &ResourceStorage,
    ) -> (Option<DescriptorPool>, Vec<LoadedMaterialPass>) {
        let material_passes: Vec<&MaterialPass> = data
            .materials
            .iter()
            .flat_map(|material| material.passes.iter())
            .filter(|pass| {
                let known = pipelines.get_pipeline(&pass.pipeline).is_some();
                if !known {
                    log::error!(
                        "Skipping material pass '{}.{}': pipeline '{}' was not created",
                        pass.material_name,
                        pass.name,
                        pass.pipeline
                    );
                }
                known
            })
            .collect();

        let mut capacity: HashMap<DescriptorType, u32> = HashMap::new();
        let mut max_sets = 0;
        for pass in &material_passes {
            if let Some(stored) = pipelines.get_pipeline(&pass.pipeline) {
                max_sets += stored.interface.set_count();
                for binding in stored.interface.bindings.values() {
                    *capacity.entry(binding.descriptor_type).or_insert(0) += binding.count;
                }
            }
        }

        if max_sets == 0 {
            return (None, Vec::new());
        }

        let pool = match self.device.create_descriptor_pool(&capacity, max_sets) {
            Ok(pool) => pool,
            Err(err) => {
                log::error!("Could not create the material descriptor pool: {err}");
                return (None, Vec::new());
            }
        };

        let mut materials = Vec::with_capacity(material_passes.len());
        for pass in material_passes {
            let Some(stored) = pipelines.get_pipeline(&pass.pipeline) else {
                continue;
            };
            let descriptor_sets = match self.device.create_descriptor_sets(&stored.interface, &pool)
            {
                Ok(sets) => sets,
                Err(err) => {
                    log::error!(
                        "Skipping material pass '{}.{}': {err}",
                        pass.material_name,
                        pass.name
                    );
                    continue;
                }
            };

            let mut writes = Vec::new();
            for (binding_name, resource_name) in &pass.bindings {
                let Some(description) = stored.interface.bindings.get(binding_name) else {
                    log::warn!(
                        "Material pass '{}.{}' binds '{binding_name}', which pipeline '{}' does not use",
                        pass.material_name,
                        pass.name,
                        pass.pipeline
                    );
                    continue;
                };
                if description.descriptor_type != DescriptorType::CombinedImageSampler {
                    log::debug!(
                        "Binding '{binding_name}' of '{}.{}' is a buffer; it is written at draw time",
                        pass.material_name,
                        pass.name
                    );
                    continue;
                }
                let (Some(image), Some(sampler)) = (
                    resources.get_render_target(resource_name),
                    resources.default_sampler(),
                ) else {
                    log::warn!(
                        "Material pass '{}.{}' binds unknown texture '{resource_name}'",
                        pass.material_name,
                        pass.name
                    );
                    continue;
                };
                let Some(set) = descriptor_sets
                    .iter()
                    .find(|set| set.set_index == description.set)
                else {
                    continue;
                };
                writes.push(DescriptorSetWrite {
                    set,
                    binding: description.binding,
                    resource: DescriptorResource::Image { image, sampler },
                });
            }

            if let Err(err) = self.device.update_descriptor_sets(&writes) {
                log::error!(
                    "Skipping material pass '{}.{}': {err}",
                    pass.material_name,
                    pass.name
                );
                continue;
            }

            materials.push(LoadedMaterialPass {
                material: pass.material_name.clone(),
                pass: pass.name.clone(),
                pipeline: pass.pipeline.clone(),
                descriptor_sets,
            });
        }

        (Some(pool), materials)
    }
}

/// Orders pipelines so that every parent is created before its children.
fn order_pipelines(pipelines: &[PipelineCreateInfo]) -> Result<Vec<usize>, LoadError> {
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, info) in pipelines.iter().enumerate() {
        index_by_name.entry(info.name.as_str()).or_insert(index);
    }

    let edges = pipelines.iter().enumerate().filter_map(|(index, info)| {
        info.parent_name
            .as_deref()
            .and_then(|parent| index_by_name.get(parent))
            .map(|&parent_index| (parent_index, index))
    });

    topological_sort(0..pipelines.len(), edges).map_err(|cycle| {
        LoadError::PipelineCycle(
            cycle
                .unresolved
                .into_iter()
                .map(|index| pipelines[index].name.clone())
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(name: &str, parent: Option<&str>) -> PipelineCreateInfo {
        PipelineCreateInfo {
            name: name.to_string(),
            parent_name: parent.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn parents_come_before_children() {
        let pipelines = vec![
            pipeline("Glass", Some("Transparent")),
            pipeline("Transparent", Some("Base")),
            pipeline("Base", None),
        ];
        assert_eq!(order_pipelines(&pipelines).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn parent_cycles_abort() {
        let pipelines = vec![pipeline("A", Some("B")), pipeline("B", Some("A"))];
        assert_eq!(
            order_pipelines(&pipelines).unwrap_err(),
            LoadError::PipelineCycle(vec!["A".to_string(), "B".to_string()])
        );
    }
}
