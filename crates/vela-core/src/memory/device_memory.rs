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

//! Native GPU heaps and their binding to a sub-allocation strategy.

use super::allocation::{AllocationInfo, AllocationStrategy};
use super::bytes::Bytes;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The access pattern a heap is allocated for.
///
/// A backend maps each class onto the best native memory type it can find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryUsage {
    /// Device-local memory the CPU never touches.
    DeviceOnly,
    /// Device memory the CPU writes to occasionally (e.g. uniforms).
    LowFrequencyUpload,
    /// Host-visible memory used as a copy source for uploads.
    StagingBuffer,
}

bitflags! {
    /// The kinds of resources that may be placed in a heap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectKinds: u32 {
        /// Plain buffers.
        const BUFFER = 1 << 0;
        /// Sampled textures.
        const TEXTURE = 1 << 1;
        /// Color or depth render targets.
        const RENDER_TEXTURE = 1 << 2;
    }
}

/// Identifies a native heap within the device that allocated it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceMemoryId(pub usize);

/// An opaque handle to one heap allocated from the native device.
///
/// Not `Clone`: exactly one owner holds the heap until it is handed back through
/// [`RenderDevice::free_device_memory`](crate::renderer::RenderDevice::free_device_memory).
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceMemory {
    /// The backend's identifier for this heap.
    pub id: DeviceMemoryId,
    /// Size of the heap.
    pub size: Bytes,
    /// The usage class the heap was allocated for.
    pub usage: MemoryUsage,
    /// Resource kinds that may be bound into this heap.
    pub allowed_objects: ObjectKinds,
}

/// One heap plus the strategy that carves it up.
///
/// Every buffer or image created against the same resource shares the heap and
/// owns a disjoint range of it. Access must be serialized by the caller.
#[derive(Debug)]
pub struct DeviceMemoryResource {
    memory: DeviceMemory,
    strategy: Box<dyn AllocationStrategy>,
}

impl DeviceMemoryResource {
    /// Binds `memory` to `strategy`.
    ///
    /// The strategy's arena should match the heap's size; a smaller arena simply
    /// leaves the remainder unused.
    pub fn new(memory: DeviceMemory, strategy: Box<dyn AllocationStrategy>) -> Self {
        debug_assert!(
            strategy.arena_size() <= memory.size,
            "strategy arena ({}) exceeds heap size ({})",
            strategy.arena_size(),
            memory.size
        );
        Self { memory, strategy }
    }

    /// Reserves `size` bytes and stamps the range with this resource's heap.
    pub fn allocate(&mut self, size: Bytes) -> Option<AllocationInfo> {
        let mut allocation = self.strategy.allocate(size)?;
        allocation.memory = Some(self.memory.id);
        Some(allocation)
    }

    /// Returns a range previously obtained from [`allocate`](Self::allocate).
    pub fn free(&mut self, allocation: &AllocationInfo) {
        debug_assert_eq!(
            allocation.memory,
            Some(self.memory.id),
            "allocation freed into the wrong memory resource"
        );
        self.strategy.free(allocation);
    }

    /// The heap backing this resource.
    pub fn memory(&self) -> &DeviceMemory {
        &self.memory
    }

    /// The strategy carving up the heap.
    pub fn strategy(&self) -> &dyn AllocationStrategy {
        self.strategy.as_ref()
    }

    /// Consumes the resource, returning the heap so it can be freed on the device.
    pub fn into_memory(self) -> DeviceMemory {
        self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BlockAllocationStrategy, BumpPointAllocationStrategy};

    fn heap(id: usize, size: u64) -> DeviceMemory {
        DeviceMemory {
            id: DeviceMemoryId(id),
            size: Bytes::new(size),
            usage: MemoryUsage::DeviceOnly,
            allowed_objects: ObjectKinds::BUFFER,
        }
    }

    #[test]
    fn allocations_are_stamped_with_the_heap() {
        let mut resource = DeviceMemoryResource::new(
            heap(7, 1024),
            Box::new(BlockAllocationStrategy::new(Bytes::new(1024), Bytes::new(64))),
        );

        let allocation = resource.allocate(Bytes::new(100)).unwrap();
        assert_eq!(allocation.memory, Some(DeviceMemoryId(7)));
        assert_eq!(allocation.size, Bytes::new(128));
        assert_eq!(resource.strategy().allocated(), Bytes::new(128));

        resource.free(&allocation);
        assert_eq!(resource.strategy().allocated(), Bytes::ZERO);
    }

    #[test]
    fn exhaustion_is_forwarded_from_the_strategy() {
        let mut resource = DeviceMemoryResource::new(
            heap(1, 256),
            Box::new(BumpPointAllocationStrategy::new(Bytes::new(256), Bytes::new(64))),
        );
        assert!(resource.allocate(Bytes::new(200)).is_some());
        assert!(resource.allocate(Bytes::new(100)).is_none());
        assert_eq!(resource.into_memory().id, DeviceMemoryId(1));
    }

    #[test]
    fn object_kinds_combine() {
        let kinds = ObjectKinds::TEXTURE | ObjectKinds::RENDER_TEXTURE;
        assert!(kinds.contains(ObjectKinds::RENDER_TEXTURE));
        assert!(!kinds.contains(ObjectKinds::BUFFER));
    }
}
