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

//! Named render targets and samplers owned by a pass-set.

use std::collections::HashMap;
use std::sync::Arc;
use vela_core::math::Extent2D;
use vela_core::renderer::{Image, RenderDevice, Sampler};
use vela_core::shaderpack::{
    SamplerCreateInfo, TextureCreateInfo, TextureFilter, WrapMode, BACKBUFFER_NAME,
};

/// Name of the sampler used for image bindings that do not name one.
pub const DEFAULT_SAMPLER_NAME: &str = "DefaultPointSampler";

/// Creates, looks up and destroys the render targets and samplers of one pass-set.
#[derive(Debug)]
pub struct ResourceStorage {
    device: Arc<dyn RenderDevice>,
    render_size: Extent2D,
    render_targets: HashMap<String, Image>,
    samplers: HashMap<String, Sampler>,
}

impl ResourceStorage {
    /// Creates an empty storage. Screen-relative targets are sized against `render_size`.
    pub fn new(device: Arc<dyn RenderDevice>, render_size: Extent2D) -> Self {
        Self {
            device,
            render_size,
            render_targets: HashMap::new(),
            samplers: HashMap::new(),
        }
    }

    /// Creates every render target. Targets that fail are logged and skipped.
    ///
    /// ## Returns
    /// The number of targets created.
    pub fn create_render_targets(&mut self, textures: &[TextureCreateInfo]) -> usize {
        let mut created = 0;
        for info in textures {
            if info.name == BACKBUFFER_NAME {
                log::warn!("Render target name '{BACKBUFFER_NAME}' is reserved; skipping it");
                continue;
            }
            if self.render_targets.contains_key(&info.name) {
                log::warn!("Render target '{}' is declared twice; keeping the first", info.name);
                continue;
            }
            match self.device.create_image(info, self.render_size) {
                Ok(image) => {
                    log::debug!(
                        "Created render target '{}' ({:?}, {}x{})",
                        info.name,
                        image.format,
                        image.extent.width,
                        image.extent.height
                    );
                    self.render_targets.insert(info.name.clone(), image);
                    created += 1;
                }
                Err(err) => log::error!("Could not create render target '{}': {err}", info.name),
            }
        }
        created
    }

    /// Creates the declared samplers plus the default point sampler.
    pub fn create_samplers(&mut self, samplers: &[SamplerCreateInfo]) -> usize {
        let default = SamplerCreateInfo {
            name: DEFAULT_SAMPLER_NAME.to_string(),
            filter: TextureFilter::Point,
            wrap_mode: WrapMode::Clamp,
        };

        let mut created = 0;
        for info in samplers.iter().chain(std::iter::once(&default)) {
            if self.samplers.contains_key(&info.name) {
                continue;
            }
            match self.device.create_sampler(info) {
                Ok(sampler) => {
                    self.samplers.insert(info.name.clone(), sampler);
                    created += 1;
                }
                Err(err) => log::error!("Could not create sampler '{}': {err}", info.name),
            }
        }
        created
    }

    /// Looks up a render target.
    pub fn get_render_target(&self, name: &str) -> Option<&Image> {
        self.render_targets.get(name)
    }

    /// Looks up a sampler.
    pub fn get_sampler(&self, name: &str) -> Option<&Sampler> {
        self.samplers.get(name)
    }

    /// The sampler used for image bindings.
    pub fn default_sampler(&self) -> Option<&Sampler> {
        self.samplers.get(DEFAULT_SAMPLER_NAME)
    }

    /// Size screen-relative targets are resolved against.
    pub fn render_size(&self) -> Extent2D {
        self.render_size
    }

    /// Number of render targets.
    pub fn render_target_count(&self) -> usize {
        self.render_targets.len()
    }

    /// Destroys every render target and sampler.
    pub fn destroy_all(&mut self) {
        for (name, image) in self.render_targets.drain() {
            if let Err(err) = self.device.destroy_image(image) {
                log::warn!("Failed to destroy render target '{name}': {err}");
            }
        }
        for (name, sampler) in self.samplers.drain() {
            if let Err(err) = self.device.destroy_sampler(sampler) {
                log::warn!("Failed to destroy sampler '{name}': {err}");
            }
        }
    }
}
