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


//! Vulkan implementation of [`RenderDevice`](vela_core::renderer::RenderDevice).
//!
//! [`VulkanRenderDevice`] owns the instance, the logical device and every object
//! created through it. Objects are referenced by the ID handles of `vela-core`
//! and resolved through per-kind registries.

mod command;
mod context;
mod conversions;
mod device;
mod memory;

pub use self::command::VulkanCommandList;
pub use self::device::VulkanRenderDevice;
