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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`resource`]**: buffers, images and samplers.
//! - **[`pass`]**: render passes, framebuffers, pipeline interfaces and pipelines.
//! - **[`descriptor`]**: binding layouts, descriptor pools, sets and writes.
//! - **[`sync`]**: fences and semaphores.
//! - **[`command`]**: queues, list levels and resource barriers.
//! - **[`device_info`]**: capabilities of the selected GPU.
//! - **[`settings`]**: renderer configuration.

pub mod command;
pub mod descriptor;
pub mod device_info;
pub mod pass;
pub mod resource;
pub mod settings;
pub mod sync;

pub use self::command::*;
pub use self::descriptor::*;
pub use self::device_info::*;
pub use self::pass::*;
pub use self::resource::*;
pub use self::settings::*;
pub use self::sync::*;
