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

//! CPU/GPU and queue/queue synchronization primitives.

/// Identifies a fence within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceId(pub usize);

/// Signaled by the GPU when a submission completes; waited on by the CPU.
#[derive(Debug, PartialEq, Eq)]
pub struct Fence {
    /// The backend's identifier.
    pub id: FenceId,
}

/// Identifies a semaphore within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreId(pub usize);

/// Orders submissions across queues.
#[derive(Debug, PartialEq, Eq)]
pub struct Semaphore {
    /// The backend's identifier.
    pub id: SemaphoreId,
}
