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

//! Drives frames: one primary command list per frame, submitted and waited on.

use super::gpu_pools::GpuPools;
use super::pass_set::{LoadError, LoadedPassSet, PassSetLoader};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use vela_core::renderer::{
    CommandList, CommandListError, CommandListLevel, Fence, Image, QueueType, RenderDevice,
    RenderError, RendererSettings,
};
use vela_core::shaderpack::{PixelFormat, TextureCreateInfo, TextureDimensionType, TextureFormat, BACKBUFFER_NAME};

/// Errors raised while rendering a frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    /// The device failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The frame's commands were recorded out of order.
    #[error("command recording failed: {0}")]
    Recording(#[from] CommandListError),
}

/// Errors raised while swapping in a new pass-set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PassSetSwapError {
    /// The new pass-set could not be built. The previous one stays active.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The device did not go idle before the old pass-set was released.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Called with the backbuffer once a frame's work has completed.
pub type PresentHook = Box<dyn FnMut(&Image) + Send>;

/// Owns the per-frame objects and the active pass-set, and renders frames.
pub struct FrameDriver {
    device: Arc<dyn RenderDevice>,
    settings: RendererSettings,
    pools: Option<GpuPools>,
    frame_fences: Vec<Fence>,
    backbuffer: Option<Image>,
    pass_set: Option<LoadedPassSet>,
    frame_count: u64,
    present_hook: Option<PresentHook>,
}

impl fmt::Debug for FrameDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDriver")
            .field("device", &self.device)
            .field("frame_count", &self.frame_count)
            .field("frame_fences", &self.frame_fences.len())
            .field("has_pass_set", &self.pass_set.is_some())
            .finish_non_exhaustive()
    }
}

impl FrameDriver {
    /// Creates the global memory pools, one fence per frame slot and the offscreen backbuffer.
    ///
    /// ## Errors
    /// `RenderError::ResourceError` if any of them cannot be created. Objects created
    /// before the failure are released.
    pub fn new(device: Arc<dyn RenderDevice>, settings: RendererSettings) -> Result<Self, RenderError> {
        let settings = settings.sanitized();
        let pools = GpuPools::new(device.as_ref(), &settings.memory)?;

        let frame_fences = match device.create_fences(device.num_frames_in_flight(), false) {
            Ok(fences) => fences,
            Err(err) => {
                pools.destroy(device.as_ref());
                return Err(err.into());
            }
        };

        let backbuffer_info = TextureCreateInfo {
            name: BACKBUFFER_NAME.to_string(),
            format: TextureFormat {
                pixel_format: PixelFormat::Rgba8,
                dimension_type: TextureDimensionType::ScreenRelative,
                width: 1.0,
                height: 1.0,
            },
        };
        let backbuffer = match device.create_image(&backbuffer_info, settings.render_size) {
            Ok(image) => image,
            Err(err) => {
                if let Err(fence_err) = device.destroy_fences(frame_fences) {
                    log::warn!("Failed to destroy frame fences: {fence_err}");
                }
                pools.destroy(device.as_ref());
                return Err(err.into());
            }
        };

        log::info!(
            "Frame driver ready: {} frames in flight, backbuffer {}x{}",
            device.num_frames_in_flight(),
            settings.render_size.width,
            settings.render_size.height
        );

        Ok(Self {
            device,
            settings,
            pools: Some(pools),
            frame_fences,
            backbuffer: Some(backbuffer),
            pass_set: None,
            frame_count: 0,
            present_hook: None,
        })
    }

    /// Builds `data` and makes it the active pass-set.
    ///
    /// The new set is fully built before the old one is touched. On failure the
    /// previous pass-set stays active.
    pub fn load_pass_set(
        &mut self,
        data: &vela_core::shaderpack::ShaderpackData,
    ) -> Result<(), PassSetSwapError> {
        let Some(backbuffer) = self.backbuffer.as_ref() else {
            return Err(RenderError::Internal("frame driver has no backbuffer".to_string()).into());
        };
        let loader = PassSetLoader::new(self.device.clone(), self.settings.render_size);
        let loaded = loader.load(data, backbuffer)?;

        if let Some(previous) = self.pass_set.take() {
            if let Err(err) = self.device.wait_idle() {
                loaded.unload(self.device.as_ref());
                self.pass_set = Some(previous);
                return Err(err.into());
            }
            previous.unload(self.device.as_ref());
        }
        self.pass_set = Some(loaded);
        Ok(())
    }

    /// Renders one frame.
    ///
    /// `record` receives the frame's primary command list and the active pass-set.
    /// The list is then submitted to the graphics queue and waited on before the
    /// present hook runs.
    pub fn render_frame<F>(&mut self, record: F) -> Result<(), FrameError>
    where
        F: FnOnce(&mut dyn CommandList, Option<&LoadedPassSet>) -> Result<(), CommandListError>,
    {
        let slot_count = self.frame_fences.len().max(1) as u64;
        let slot = (self.frame_count % slot_count) as u32;

        self.device.begin_frame(slot)?;

        let mut list = self.device.create_command_list(
            0,
            slot,
            QueueType::Graphics,
            CommandListLevel::Primary,
        )?;
        list.set_debug_name(&format!("Frame {}", self.frame_count))?;
        record(list.as_mut(), self.pass_set.as_ref())?;

        let fence = self
            .frame_fences
            .get(slot as usize)
            .ok_or_else(|| RenderError::Internal(format!("no fence for frame slot {slot}")))?;
        self.device
            .submit_command_list(list, QueueType::Graphics, Some(fence), &[], &[])?;
        self.device.wait_for_fences(&[fence])?;
        self.device.reset_fences(&[fence])?;

        if let (Some(hook), Some(backbuffer)) = (self.present_hook.as_mut(), self.backbuffer.as_ref()) {
            hook(backbuffer);
        }

        log::trace!("Frame {} finished in slot {slot}", self.frame_count);
        self.frame_count += 1;
        Ok(())
    }

    /// Sets the callback that receives the backbuffer after each frame.
    pub fn set_present_hook(&mut self, hook: PresentHook) {
        self.present_hook = Some(hook);
    }

    /// The active pass-set.
    pub fn pass_set(&self) -> Option<&LoadedPassSet> {
        self.pass_set.as_ref()
    }

    /// The global memory pools, for creating mesh, uniform and staging buffers.
    pub fn pools_mut(&mut self) -> Option<&mut GpuPools> {
        self.pools.as_mut()
    }

    /// The device frames are rendered on.
    pub fn device(&self) -> &Arc<dyn RenderDevice> {
        &self.device
    }

    /// The offscreen image backbuffer passes render into.
    pub fn backbuffer(&self) -> Option<&Image> {
        self.backbuffer.as_ref()
    }

    /// Number of frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Waits for the device and releases everything the driver owns.
    ///
    /// Buffers created from [`pools_mut`](Self::pools_mut) must be destroyed first.
    pub fn shutdown(mut self) -> Result<(), RenderError> {
        self.device.wait_idle()?;
        self.release();
        log::info!("Frame driver shut down after {} frames", self.frame_count);
        Ok(())
    }

    fn release(&mut self) {
        let device = self.device.clone();
        if let Some(pass_set) = self.pass_set.take() {
            pass_set.unload(device.as_ref());
        }
        if let Some(backbuffer) = self.backbuffer.take() {
            if let Err(err) = device.destroy_image(backbuffer) {
                log::warn!("Failed to destroy the backbuffer: {err}");
            }
        }
        let fences = std::mem::take(&mut self.frame_fences);
        if !fences.is_empty() {
            if let Err(err) = device.destroy_fences(fences) {
                log::warn!("Failed to destroy frame fences: {err}");
            }
        }
        if let Some(pools) = self.pools.take() {
            pools.destroy(device.as_ref());
        }
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        if self.pools.is_some() {
            log::warn!("FrameDriver dropped without shutdown; releasing without waiting for the device");
            self.release();
        }
    }
}
