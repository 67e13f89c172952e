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

//! A monotonic bump-pointer allocator for upload-once resources.

use super::allocation::{AllocationInfo, AllocationStrategy, AllocationToken};
use super::bytes::Bytes;

/// Advances a cursor through the arena and never reclaims space.
#[derive(Debug)]
pub struct BumpPointAllocationStrategy {
    arena_size: Bytes,
    alignment: Bytes,
    cursor: Bytes,
    allocation_count: u32,
}

impl BumpPointAllocationStrategy {
    /// Creates a strategy with its cursor at the start of the arena.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two.
    pub fn new(arena_size: Bytes, alignment: Bytes) -> Self {
        assert!(
            alignment.count().is_power_of_two(),
            "allocation alignment must be a power of two, got {alignment}"
        );
        Self {
            arena_size,
            alignment,
            cursor: Bytes::ZERO,
            allocation_count: 0,
        }
    }

    /// Offset the next allocation will start at.
    pub fn cursor(&self) -> Bytes {
        self.cursor
    }
}

impl AllocationStrategy for BumpPointAllocationStrategy {
    fn allocate(&mut self, size: Bytes) -> Option<AllocationInfo> {
        let size = if size.is_zero() {
            self.alignment
        } else {
            let Some(aligned) = size.checked_align_up(self.alignment) else {
                log::trace!("Bump allocation of {size} rejected: size overflows when aligned");
                return None;
            };
            aligned
        };

        let end = self.cursor.checked_add(size)?;
        if end > self.arena_size {
            log::trace!(
                "Bump allocation of {size} rejected: cursor at {} of {}",
                self.cursor,
                self.arena_size
            );
            return None;
        }

        let offset = self.cursor;
        self.cursor = end;
        let token = AllocationToken::new(self.allocation_count);
        self.allocation_count = self.allocation_count.wrapping_add(1);

        Some(AllocationInfo {
            offset,
            size,
            token,
            memory: None,
        })
    }

    fn free(&mut self, _allocation: &AllocationInfo) {}

    fn arena_size(&self) -> Bytes {
        self.arena_size
    }

    fn alignment(&self) -> Bytes {
        self.alignment
    }

    fn allocated(&self) -> Bytes {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_request_fails_once_the_cursor_would_pass_the_end() {
        let mut strategy = BumpPointAllocationStrategy::new(Bytes::new(256), Bytes::new(64));

        let first = strategy.allocate(Bytes::new(100)).unwrap();
        assert_eq!(first.offset, Bytes::ZERO);
        assert_eq!(first.size, Bytes::new(128));

        let second = strategy.allocate(Bytes::new(100)).unwrap();
        assert_eq!(second.offset, Bytes::new(128));

        assert!(strategy.allocate(Bytes::new(100)).is_none());
        assert_eq!(strategy.cursor(), Bytes::new(256));
    }

    #[test]
    fn small_request_still_fits_after_a_large_one_fails() {
        let mut strategy = BumpPointAllocationStrategy::new(Bytes::new(256), Bytes::new(64));
        strategy.allocate(Bytes::new(150)).unwrap();
        assert!(strategy.allocate(Bytes::new(100)).is_none());
        let small = strategy.allocate(Bytes::new(10)).unwrap();
        assert_eq!(small.offset, Bytes::new(192));
    }

    #[test]
    fn request_near_u64_max_is_rejected() {
        let mut strategy = BumpPointAllocationStrategy::new(Bytes::new(1024), Bytes::new(64));
        assert!(strategy.allocate(Bytes::new(u64::MAX - 10)).is_none());
        assert_eq!(strategy.cursor(), Bytes::ZERO);
        let first = strategy.allocate(Bytes::new(64)).unwrap();
        assert!(strategy.allocate(Bytes::new(u64::MAX - 63)).is_none());
        assert_eq!(strategy.cursor(), first.end());
    }

    #[test]
    fn free_does_not_reclaim() {
        let mut strategy = BumpPointAllocationStrategy::new(Bytes::new(128), Bytes::new(64));
        let first = strategy.allocate(Bytes::new(64)).unwrap();
        strategy.free(&first);
        assert_eq!(strategy.allocated(), Bytes::new(64));
        let second = strategy.allocate(Bytes::new(64)).unwrap();
        assert_eq!(second.offset, Bytes::new(64));
        assert_ne!(first.token, second.token);
        assert_eq!(strategy.free_bytes(), Bytes::ZERO);
    }
}
