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

//! The renderer's global GPU memory pools.

use vela_core::memory::{
    BlockAllocationStrategy, BumpPointAllocationStrategy, DeviceMemoryResource, MemoryUsage,
    ObjectKinds,
};
use vela_core::renderer::{GpuPoolSettings, RenderDevice, ResourceError};

/// The three long-lived heaps buffers are sub-allocated from.
#[derive(Debug)]
pub struct GpuPools {
    /// Device-local vertex and index data. Block strategy: meshes come and go.
    pub mesh: DeviceMemoryResource,
    /// Host-writable uniform data. Bump strategy.
    pub uniform: DeviceMemoryResource,
    /// Host-visible upload staging. Bump strategy.
    pub staging: DeviceMemoryResource,
}

impl GpuPools {
    /// Allocates every heap.
    ///
    /// ## Errors
    /// [`ResourceError::InvalidAlignment`] before anything is allocated, or the first
    /// allocation error. Heaps allocated before it are freed again.
    pub fn new(device: &dyn RenderDevice, settings: &GpuPoolSettings) -> Result<Self, ResourceError> {
        settings.validate()?;

        let mesh = device.allocate_device_memory(
            settings.mesh_memory_size,
            MemoryUsage::DeviceOnly,
            ObjectKinds::BUFFER,
        )?;

        let uniform = match device.allocate_device_memory(
            settings.uniform_memory_size,
            MemoryUsage::LowFrequencyUpload,
            ObjectKinds::BUFFER,
        ) {
            Ok(memory) => memory,
            Err(err) => {
                release(device, mesh);
                return Err(err);
            }
        };

        let staging = match device.allocate_device_memory(
            settings.staging_memory_size,
            MemoryUsage::StagingBuffer,
            ObjectKinds::BUFFER,
        ) {
            Ok(memory) => memory,
            Err(err) => {
                release(device, uniform);
                release(device, mesh);
                return Err(err);
            }
        };

        log::info!(
            "GPU pools ready: mesh {}, uniform {}, staging {}",
            mesh.size,
            uniform.size,
            staging.size
        );

        Ok(Self {
            mesh: DeviceMemoryResource::new(
                mesh,
                Box::new(BlockAllocationStrategy::new(
                    settings.mesh_memory_size,
                    settings.mesh_alignment,
                )),
            ),
            uniform: DeviceMemoryResource::new(
                uniform,
                Box::new(BumpPointAllocationStrategy::new(
                    settings.uniform_memory_size,
                    settings.uniform_alignment,
                )),
            ),
            staging: DeviceMemoryResource::new(
                staging,
                Box::new(BumpPointAllocationStrategy::new(
                    settings.staging_memory_size,
                    settings.staging_alignment,
                )),
            ),
        })
    }

    /// Frees every heap. Buffers placed in them must already be destroyed.
    pub fn destroy(self, device: &dyn RenderDevice) {
        release(device, self.mesh.into_memory());
        release(device, self.uniform.into_memory());
        release(device, self.staging.into_memory());
    }
}

fn release(device: &dyn RenderDevice, memory: vela_core::memory::DeviceMemory) {
    let id = memory.id;
    if let Err(err) = device.free_device_memory(memory) {
        log::warn!("Failed to free device memory {id:?}: {err}");
    }
}
