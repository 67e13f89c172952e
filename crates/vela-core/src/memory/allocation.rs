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

//! The contract shared by every sub-allocation policy over a fixed-size arena.

use super::bytes::Bytes;
use super::device_memory::DeviceMemoryId;
use std::fmt::Debug;

/// An opaque back-reference into a strategy's bookkeeping.
///
/// Only the strategy that produced the token may interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationToken(u32);

impl AllocationToken {
    /// Creates a token from a strategy-internal index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The strategy-internal index this token refers to.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The caller-visible result of a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInfo {
    /// Start of the range, relative to the beginning of the arena.
    pub offset: Bytes,
    /// Length of the range, already rounded up to the strategy's alignment.
    pub size: Bytes,
    /// Locates the strategy's record for this range when it is freed.
    pub token: AllocationToken,
    /// The heap this range lives in. Filled in by
    /// [`DeviceMemoryResource`](super::DeviceMemoryResource).
    pub memory: Option<DeviceMemoryId>,
}

impl AllocationInfo {
    /// One past the last byte of the range.
    pub fn end(&self) -> Bytes {
        self.offset + self.size
    }
}

/// A pluggable sub-allocation policy over an arena of `arena_size` bytes.
///
/// Exhaustion is not an error: `allocate` returns `None` and the caller decides
/// whether to request a larger heap. Strategies are not internally synchronized.
pub trait AllocationStrategy: Send + Debug {
    /// Reserves `size` bytes, rounded up to [`alignment`](Self::alignment).
    ///
    /// ## Returns
    ///
    /// The reserved range, or `None` if no range of that size is available.
    fn allocate(&mut self, size: Bytes) -> Option<AllocationInfo>;

    /// Returns a range to the strategy.
    ///
    /// `allocation` must have been produced by this strategy and not freed since.
    fn free(&mut self, allocation: &AllocationInfo);

    /// Total size of the arena managed by this strategy.
    fn arena_size(&self) -> Bytes;

    /// Alignment applied to every request.
    fn alignment(&self) -> Bytes;

    /// Bytes currently handed out.
    fn allocated(&self) -> Bytes;

    /// Bytes not currently handed out.
    fn free_bytes(&self) -> Bytes {
        self.arena_size() - self.allocated()
    }
}
