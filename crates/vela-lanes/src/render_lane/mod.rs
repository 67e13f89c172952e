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

//! Rendering lane - pass-set loading and frame submission

mod frame_driver;
mod gpu_pools;
mod pass_order;
mod pass_set;
mod pipeline_storage;
mod resource_storage;

pub use frame_driver::*;
pub use gpu_pools::*;
pub use pass_order::*;
pub use pass_set::*;
pub use pipeline_storage::*;
pub use resource_storage::*;
