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

//! GPU memory accounting: byte counts, sub-allocation strategies, and the
//! binding of a native heap to a strategy.
//!
//! Strategies manage offsets only; they never touch the memory itself. A
//! [`DeviceMemoryResource`] pairs one heap with one strategy, and backends bind
//! buffers and images at the offsets it hands out.

pub mod allocation;
pub mod block;
pub mod bump;
pub mod bytes;
pub mod device_memory;

pub use self::allocation::{AllocationInfo, AllocationStrategy, AllocationToken};
pub use self::block::{BlockAllocationStrategy, BlockInfo};
pub use self::bump::BumpPointAllocationStrategy;
pub use self::bytes::{align_up, checked_align_up, is_aligned, Bytes};
pub use self::device_memory::{
    DeviceMemory, DeviceMemoryId, DeviceMemoryResource, MemoryUsage, ObjectKinds,
};
