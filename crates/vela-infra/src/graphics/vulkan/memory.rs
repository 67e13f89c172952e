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

//! Memory type selection.

use ash::vk;
use vela_core::memory::{AllocationInfo, Bytes, MemoryUsage};
use vela_core::renderer::ResourceError;

/// How a memory type's property flags are compared against the requested ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemorySearchMode {
    /// The flags must be exactly the requested ones.
    Exact,
    /// The flags must include every requested one.
    Contains,
    /// The flags must share at least one bit with the requested ones.
    Fuzzy,
}

fn memory_types(properties: &vk::PhysicalDeviceMemoryProperties) -> &[vk::MemoryType] {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    &properties.memory_types[..count]
}

/// Returns the index of the first memory type whose flags match `flags`.
pub(crate) fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    flags: vk::MemoryPropertyFlags,
    mode: MemorySearchMode,
) -> Option<u32> {
    memory_types(properties)
        .iter()
        .position(|memory_type| match mode {
            MemorySearchMode::Exact => memory_type.property_flags == flags,
            MemorySearchMode::Contains => memory_type.property_flags.contains(flags),
            MemorySearchMode::Fuzzy => memory_type.property_flags.intersects(flags),
        })
        .map(|index| index as u32)
}

/// Picks the memory type for a heap of the given usage class.
///
/// - `DeviceOnly` prefers a purely device-local type, then any device-local one.
/// - `LowFrequencyUpload` prefers device-local host-visible memory, then any host-visible type.
/// - `StagingBuffer` takes the first host-visible type.
///
/// Upload and staging heaps are always mapped, so they never land in a type
/// without `HOST_VISIBLE`.
pub(crate) fn memory_type_for_usage(
    properties: &vk::PhysicalDeviceMemoryProperties,
    usage: MemoryUsage,
) -> Option<u32> {
    use MemorySearchMode::{Contains, Exact, Fuzzy};
    let host_visible = vk::MemoryPropertyFlags::HOST_VISIBLE;
    match usage {
        MemoryUsage::DeviceOnly => {
            find_memory_type(properties, vk::MemoryPropertyFlags::DEVICE_LOCAL, Exact)
                .or_else(|| find_memory_type(properties, vk::MemoryPropertyFlags::DEVICE_LOCAL, Fuzzy))
        }
        MemoryUsage::LowFrequencyUpload => find_memory_type(
            properties,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | host_visible,
            Contains,
        )
        .or_else(|| find_memory_type(properties, host_visible, Contains)),
        MemoryUsage::StagingBuffer => find_memory_type(properties, host_visible, Contains),
    }
}

/// Picks a memory type allowed by `type_bits` (from `vkGet*MemoryRequirements`)
/// that has all of `required`.
pub(crate) fn find_memory_type_for_requirements(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_types(properties)
        .iter()
        .enumerate()
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

/// Checks that a resource with `requirements` may be bound at `allocation` inside a
/// heap of memory type `type_index`.
pub(crate) fn check_placement(
    name: &str,
    requirements: &vk::MemoryRequirements,
    type_index: u32,
    allocation: &AllocationInfo,
) -> Result<(), ResourceError> {
    let type_allowed = type_index < u32::BITS && requirements.memory_type_bits & (1 << type_index) != 0;
    if !type_allowed {
        return Err(ResourceError::BackendError(format!(
            "'{name}' cannot live in memory type {type_index} (allowed types {:#b})",
            requirements.memory_type_bits
        )));
    }
    if allocation.offset.count() % requirements.alignment.max(1) != 0 {
        return Err(ResourceError::BackendError(format!(
            "'{name}' needs {}-byte alignment but was placed at {}",
            requirements.alignment, allocation.offset
        )));
    }
    if requirements.size > allocation.size.count() {
        return Err(ResourceError::OutOfBounds {
            end: allocation.offset + Bytes::new(requirements.size),
            size: allocation.end(),
        });
    }
    Ok(())
}

/// Returns `true` if the memory type can be mapped.
pub(crate) fn is_host_visible(properties: &vk::PhysicalDeviceMemoryProperties, type_index: u32) -> bool {
    memory_types(properties)
        .get(type_index as usize)
        .is_some_and(|memory_type| {
            memory_type
                .property_flags
                .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::memory::AllocationToken;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = types.len() as u32;
        for (slot, flags) in properties.memory_types.iter_mut().zip(types) {
            *slot = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        properties
    }

    const DEVICE_LOCAL: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    const HOST_VISIBLE: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_VISIBLE;
    const HOST_COHERENT: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_COHERENT;
    const HOST_CACHED: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::HOST_CACHED;

    /// A typical discrete GPU layout.
    fn discrete() -> vk::PhysicalDeviceMemoryProperties {
        properties(&[
            HOST_VISIBLE | HOST_COHERENT,
            DEVICE_LOCAL | HOST_VISIBLE | HOST_COHERENT,
            DEVICE_LOCAL,
            HOST_VISIBLE | HOST_COHERENT | HOST_CACHED,
        ])
    }

    #[test]
    fn exact_search_requires_identical_flags() {
        let props = discrete();
        assert_eq!(find_memory_type(&props, DEVICE_LOCAL, MemorySearchMode::Exact), Some(2));
        assert_eq!(find_memory_type(&props, DEVICE_LOCAL, MemorySearchMode::Fuzzy), Some(1));
        assert_eq!(find_memory_type(&props, HOST_CACHED | DEVICE_LOCAL, MemorySearchMode::Exact), None);
        assert_eq!(find_memory_type(&props, HOST_CACHED, MemorySearchMode::Contains), Some(3));
    }

    #[test]
    fn device_only_prefers_pure_device_local() {
        assert_eq!(memory_type_for_usage(&discrete(), MemoryUsage::DeviceOnly), Some(2));

        let integrated = properties(&[HOST_VISIBLE, DEVICE_LOCAL | HOST_VISIBLE]);
        assert_eq!(memory_type_for_usage(&integrated, MemoryUsage::DeviceOnly), Some(1));
    }

    #[test]
    fn uploads_and_staging_land_in_host_visible_types() {
        let props = discrete();
        let upload = memory_type_for_usage(&props, MemoryUsage::LowFrequencyUpload).unwrap();
        let staging = memory_type_for_usage(&props, MemoryUsage::StagingBuffer).unwrap();
        assert!(is_host_visible(&props, upload));
        assert!(is_host_visible(&props, staging));
    }

    #[test]
    fn low_frequency_upload_skips_device_local_only_types() {
        let props = properties(&[
            vk::MemoryPropertyFlags::empty(),
            DEVICE_LOCAL,
            HOST_VISIBLE | HOST_COHERENT,
            DEVICE_LOCAL | HOST_VISIBLE | HOST_COHERENT,
        ]);
        assert_eq!(memory_type_for_usage(&props, MemoryUsage::LowFrequencyUpload), Some(3));
        assert_eq!(memory_type_for_usage(&props, MemoryUsage::StagingBuffer), Some(2));

        // Without a device-local host-visible type, fall back to plain host memory.
        let props = properties(&[DEVICE_LOCAL, HOST_VISIBLE | HOST_COHERENT | HOST_CACHED]);
        assert_eq!(memory_type_for_usage(&props, MemoryUsage::LowFrequencyUpload), Some(1));
        assert_eq!(memory_type_for_usage(&properties(&[DEVICE_LOCAL]), MemoryUsage::LowFrequencyUpload), None);
    }

    #[test]
    fn no_matching_type_yields_none() {
        let props = properties(&[DEVICE_LOCAL]);
        assert_eq!(memory_type_for_usage(&props, MemoryUsage::StagingBuffer), None);
        assert!(!is_host_visible(&props, 0));
        assert!(!is_host_visible(&props, 7));
    }

    fn placed(offset: u64, size: u64) -> AllocationInfo {
        AllocationInfo {
            offset: Bytes::new(offset),
            size: Bytes::new(size),
            token: AllocationToken::new(0),
            memory: None,
        }
    }

    fn requirements(size: u64, alignment: u64, memory_type_bits: u32) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size,
            alignment,
            memory_type_bits,
        }
    }

    #[test]
    fn placement_rejects_heaps_of_a_disallowed_memory_type() {
        let reqs = requirements(256, 64, 0b0101);
        assert_eq!(check_placement("mesh", &reqs, 0, &placed(0, 256)), Ok(()));
        assert_eq!(check_placement("mesh", &reqs, 2, &placed(64, 256)), Ok(()));
        assert!(matches!(
            check_placement("mesh", &reqs, 1, &placed(0, 256)),
            Err(ResourceError::BackendError(msg)) if msg.contains("memory type 1")
        ));
        assert!(check_placement("mesh", &reqs, 40, &placed(0, 256)).is_err());
    }

    #[test]
    fn placement_checks_alignment_and_size() {
        let reqs = requirements(256, 256, 0b1);
        assert!(matches!(
            check_placement("ubo", &reqs, 0, &placed(64, 256)),
            Err(ResourceError::BackendError(_))
        ));
        assert_eq!(
            check_placement("ubo", &reqs, 0, &placed(512, 128)),
            Err(ResourceError::OutOfBounds {
                end: Bytes::new(768),
                size: Bytes::new(640),
            })
        );
    }

    #[test]
    fn requirement_bits_filter_candidates() {
        let props = discrete();
        assert_eq!(find_memory_type_for_requirements(&props, 0b1111, DEVICE_LOCAL), Some(1));
        assert_eq!(find_memory_type_for_requirements(&props, 0b0100, DEVICE_LOCAL), Some(2));
        assert_eq!(find_memory_type_for_requirements(&props, 0b0001, DEVICE_LOCAL), None);
    }
}
