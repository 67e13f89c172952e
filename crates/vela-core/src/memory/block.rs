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

//! A first-fit, coalescing free-list allocator.
//!
//! The arena is described by a doubly-linked, offset-ordered list of blocks that
//! always partitions `[0, arena_size)` exactly. Blocks live in a `Vec` and link to
//! each other by index; slots released by coalescing are recycled for later splits.

use super::allocation::{AllocationInfo, AllocationStrategy, AllocationToken};
use super::bytes::Bytes;

/// The head of the list is never removed: coalescing always keeps the earlier block.
const HEAD: u32 = 0;

#[derive(Debug, Clone)]
struct Block {
    id: u64,
    offset: Bytes,
    size: Bytes,
    free: bool,
    prev: Option<u32>,
    next: Option<u32>,
}

/// A read-only view of one block, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Monotonically increasing identifier assigned when the block was created.
    pub id: u64,
    /// Start of the block within the arena.
    pub offset: Bytes,
    /// Length of the block.
    pub size: Bytes,
    /// Whether the block is available for allocation.
    pub free: bool,
}

/// Sub-allocates an arena with a first-fit search over a coalescing block list.
#[derive(Debug)]
pub struct BlockAllocationStrategy {
    arena_size: Bytes,
    alignment: Bytes,
    allocated: Bytes,
    blocks: Vec<Block>,
    vacant: Vec<u32>,
    next_block_id: u64,
}

impl BlockAllocationStrategy {
    /// Creates a strategy with a single free block spanning the whole arena.
    ///
    /// # Panics
    ///
    /// Panics if `alignment` is not a power of two.
    pub fn new(arena_size: Bytes, alignment: Bytes) -> Self {
        assert!(
            alignment.count().is_power_of_two(),
            "allocation alignment must be a power of two, got {alignment}"
        );

        let head = Block {
            id: 0,
            offset: Bytes::ZERO,
            size: arena_size,
            free: true,
            prev: None,
            next: None,
        };

        Self {
            arena_size,
            alignment,
            allocated: Bytes::ZERO,
            blocks: vec![head],
            vacant: Vec::new(),
            next_block_id: 1,
        }
    }

    /// Iterates over the blocks in offset order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        std::iter::successors(Some(HEAD), move |&index| self.blocks[index as usize].next).map(
            move |index| {
                let block = &self.blocks[index as usize];
                BlockInfo {
                    id: block.id,
                    offset: block.offset,
                    size: block.size,
                    free: block.free,
                }
            },
        )
    }

    /// Number of blocks currently linked into the list.
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    fn insert_block(&mut self, block: Block) -> u32 {
        match self.vacant.pop() {
            Some(index) => {
                self.blocks[index as usize] = block;
                index
            }
            None => {
                self.blocks.push(block);
                (self.blocks.len() - 1) as u32
            }
        }
    }

    /// Unlinks `index` from the list and marks its slot for reuse.
    fn remove_block(&mut self, index: u32) {
        let (prev, next) = {
            let block = &self.blocks[index as usize];
            (block.prev, block.next)
        };
        if let Some(prev) = prev {
            self.blocks[prev as usize].next = next;
        }
        if let Some(next) = next {
            self.blocks[next as usize].prev = prev;
        }
        let block = &mut self.blocks[index as usize];
        block.prev = None;
        block.next = None;
        block.size = Bytes::ZERO;
        self.vacant.push(index);
    }

    fn find_first_fit(&self, size: Bytes) -> Option<u32> {
        let mut cursor = Some(HEAD);
        while let Some(index) = cursor {
            let block = &self.blocks[index as usize];
            if block.free && block.size >= size {
                return Some(index);
            }
            cursor = block.next;
        }
        None
    }
}

impl AllocationStrategy for BlockAllocationStrategy {
    fn allocate(&mut self, size: Bytes) -> Option<AllocationInfo> {
        let size = if size.is_zero() {
            self.alignment
        } else {
            let Some(aligned) = size.checked_align_up(self.alignment) else {
                log::trace!("Block allocation of {size} rejected: size overflows when aligned");
                return None;
            };
            aligned
        };

        if size > self.free_bytes() {
            log::trace!(
                "Block allocation of {size} rejected: only {} free",
                self.free_bytes()
            );
            return None;
        }

        let Some(index) = self.find_first_fit(size) else {
            log::trace!("Block allocation of {size} rejected: no free block is large enough");
            return None;
        };

        let (offset, remaining, next) = {
            let block = &self.blocks[index as usize];
            (block.offset, block.size - size, block.next)
        };

        if !remaining.is_zero() {
            let suffix = Block {
                id: self.next_block_id,
                offset: offset + size,
                size: remaining,
                free: true,
                prev: Some(index),
                next,
            };
            self.next_block_id += 1;
            let suffix_index = self.insert_block(suffix);
            if let Some(next) = next {
                self.blocks[next as usize].prev = Some(suffix_index);
            }
            self.blocks[index as usize].next = Some(suffix_index);
        }

        let block = &mut self.blocks[index as usize];
        block.size = size;
        block.free = false;
        self.allocated += size;

        log::trace!(
            "Block {} allocated: offset {offset}, size {size}",
            self.blocks[index as usize].id
        );

        Some(AllocationInfo {
            offset,
            size,
            token: AllocationToken::new(index),
            memory: None,
        })
    }

    fn free(&mut self, allocation: &AllocationInfo) {
        let mut index = allocation.token.index() as u32;
        debug_assert!(
            !self.blocks[index as usize].free,
            "double free of block allocation at offset {}",
            allocation.offset
        );

        let block = &mut self.blocks[index as usize];
        block.free = true;
        self.allocated -= block.size;
        log::trace!("Block {} freed: offset {}, size {}", block.id, block.offset, block.size);

        if let Some(prev) = self.blocks[index as usize].prev {
            if self.blocks[prev as usize].free {
                let size = self.blocks[index as usize].size;
                self.blocks[prev as usize].size += size;
                self.remove_block(index);
                index = prev;
            }
        }

        if let Some(next) = self.blocks[index as usize].next {
            if self.blocks[next as usize].free {
                let size = self.blocks[next as usize].size;
                self.blocks[index as usize].size += size;
                self.remove_block(next);
            }
        }
    }

    fn arena_size(&self) -> Bytes {
        self.arena_size
    }

    fn alignment(&self) -> Bytes {
        self.alignment
    }

    fn allocated(&self) -> Bytes {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(arena: u64, alignment: u64) -> BlockAllocationStrategy {
        BlockAllocationStrategy::new(Bytes::new(arena), Bytes::new(alignment))
    }

    /// Checks that the blocks partition the arena and that no two free blocks touch.
    fn assert_partition(strategy: &BlockAllocationStrategy) {
        let mut expected_offset = Bytes::ZERO;
        let mut used = Bytes::ZERO;
        let mut previous_free = false;
        for block in strategy.blocks() {
            assert_eq!(block.offset, expected_offset, "gap or overlap at {block:?}");
            assert!(!block.size.is_zero(), "empty block in list: {block:?}");
            assert!(
                !(previous_free && block.free),
                "adjacent free blocks were not coalesced at {block:?}"
            );
            if !block.free {
                used += block.size;
            }
            previous_free = block.free;
            expected_offset += block.size;
        }
        assert_eq!(expected_offset, strategy.arena_size());
        assert_eq!(used, strategy.allocated());
    }

    #[test]
    fn new_strategy_has_one_block_spanning_the_arena() {
        let strategy = strategy(1024, 64);
        let blocks: Vec<_> = strategy.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].offset, Bytes::ZERO);
        assert_eq!(blocks[0].size, Bytes::new(1024));
        assert!(blocks[0].free);
        assert_eq!(strategy.free_bytes(), Bytes::new(1024));
    }

    #[test]
    fn rounds_requests_and_rejects_oversized_ones() {
        let mut strategy = strategy(1024, 64);

        let first = strategy.allocate(Bytes::new(100)).unwrap();
        assert_eq!(first.offset, Bytes::ZERO);
        assert_eq!(first.size, Bytes::new(128));
        assert_eq!(first.memory, None);

        assert_eq!(strategy.free_bytes(), Bytes::new(896));
        assert!(strategy.allocate(Bytes::new(900)).is_none());

        // A failed request leaves the list untouched.
        assert_eq!(strategy.block_count(), 2);
        assert_partition(&strategy);
    }

    #[test]
    fn zero_sized_request_takes_one_alignment_unit() {
        let mut strategy = strategy(256, 64);
        let allocation = strategy.allocate(Bytes::ZERO).unwrap();
        assert_eq!(allocation.size, Bytes::new(64));
        assert_eq!(strategy.allocated(), Bytes::new(64));
    }

    #[test]
    fn request_near_u64_max_is_rejected() {
        let mut strategy = strategy(1024, 64);
        assert!(strategy.allocate(Bytes::new(u64::MAX - 10)).is_none());
        assert!(strategy.allocate(Bytes::new(u64::MAX)).is_none());
        assert_eq!(strategy.block_count(), 1);
        assert_partition(&strategy);
    }

    #[test]
    fn exact_fit_does_not_split() {
        let mut strategy = strategy(256, 64);
        let whole = strategy.allocate(Bytes::new(256)).unwrap();
        assert_eq!(strategy.block_count(), 1);
        assert!(strategy.allocate(Bytes::new(1)).is_none());
        strategy.free(&whole);
        assert_eq!(strategy.free_bytes(), Bytes::new(256));
    }

    #[test]
    fn search_is_first_fit() {
        let mut strategy = strategy(1024, 64);
        let a = strategy.allocate(Bytes::new(256)).unwrap();
        let _b = strategy.allocate(Bytes::new(64)).unwrap();
        let c = strategy.allocate(Bytes::new(128)).unwrap();
        let _d = strategy.allocate(Bytes::new(64)).unwrap();

        // Holes: [0, 256) and [320, 448); the tail [512, 1024) is also free.
        strategy.free(&a);
        strategy.free(&c);

        // Best fit would pick the 128-byte hole; first fit picks the first one.
        let e = strategy.allocate(Bytes::new(128)).unwrap();
        assert_eq!(e.offset, Bytes::ZERO);
        assert_partition(&strategy);
    }

    #[test]
    fn free_coalesces_with_both_neighbours() {
        let mut strategy = strategy(1024, 64);
        let a = strategy.allocate(Bytes::new(64)).unwrap();
        let b = strategy.allocate(Bytes::new(64)).unwrap();
        let c = strategy.allocate(Bytes::new(64)).unwrap();
        assert_eq!(strategy.block_count(), 4);

        strategy.free(&a);
        strategy.free(&c);
        // [a free][b used][c + tail free]
        assert_eq!(strategy.block_count(), 3);
        assert_partition(&strategy);

        strategy.free(&b);
        let blocks: Vec<_> = strategy.blocks().collect();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].free);
        assert_eq!(blocks[0].size, Bytes::new(1024));
        assert_eq!(strategy.allocated(), Bytes::ZERO);
    }

    #[test]
    fn released_slots_are_reused_and_ids_keep_increasing() {
        let mut strategy = strategy(1024, 64);
        let a = strategy.allocate(Bytes::new(64)).unwrap();
        let b = strategy.allocate(Bytes::new(64)).unwrap();
        strategy.free(&b);
        strategy.free(&a);

        let first_ids: Vec<u64> = strategy.blocks().map(|b| b.id).collect();
        let _c = strategy.allocate(Bytes::new(64)).unwrap();
        let ids: Vec<u64> = strategy.blocks().map(|b| b.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids[1] > *first_ids.iter().max().unwrap());
        assert!(strategy.blocks.len() <= 3);
    }

    #[test]
    fn random_sequences_keep_the_arena_partitioned() {
        let mut strategy = strategy(64 * 1024, 64);
        let mut live: Vec<AllocationInfo> = Vec::new();
        // xorshift64, fixed seed for reproducibility.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..4000 {
            let roll = next();
            if roll % 3 != 0 || live.is_empty() {
                let size = Bytes::new(next() % 2048);
                if let Some(allocation) = strategy.allocate(size) {
                    assert!(allocation.offset.is_aligned_to(strategy.alignment()));
                    assert!(allocation.end() <= strategy.arena_size());
                    for other in &live {
                        assert!(
                            allocation.end() <= other.offset || other.end() <= allocation.offset,
                            "{allocation:?} overlaps {other:?}"
                        );
                    }
                    live.push(allocation);
                }
            } else {
                let victim = (next() % live.len() as u64) as usize;
                let allocation = live.swap_remove(victim);
                strategy.free(&allocation);
            }
            assert_partition(&strategy);
        }

        for allocation in live.drain(..) {
            strategy.free(&allocation);
            assert_partition(&strategy);
        }
        assert_eq!(strategy.block_count(), 1);
        assert_eq!(strategy.free_bytes(), strategy.arena_size());
    }
}
