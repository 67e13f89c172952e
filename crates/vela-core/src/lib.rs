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

//! # Vela Core
//!
//! Foundational crate containing the render device contracts, GPU memory
//! sub-allocation strategies, and the declarative pass-set types that the
//! rest of the renderer is built on.

#![warn(missing_docs)]

pub mod graph;
pub mod math;
pub mod memory;
pub mod renderer;
pub mod shaderpack;

pub use memory::Bytes;
pub use renderer::{RenderDevice, RendererSettings};
