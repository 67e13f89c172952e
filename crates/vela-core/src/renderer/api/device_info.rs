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

//! Capabilities reported by a render device.

use crate::memory::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// GPU vendor family, as far as it affects rendering decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceArchitecture {
    /// Unrecognized vendor.
    #[default]
    Unknown,
    /// AMD.
    Amd,
    /// NVIDIA.
    Nvidia,
    /// Intel.
    Intel,
}

impl fmt::Display for DeviceArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceArchitecture::Unknown => "Unknown",
            DeviceArchitecture::Amd => "AMD",
            DeviceArchitecture::Nvidia => "NVIDIA",
            DeviceArchitecture::Intel => "Intel",
        };
        f.write_str(name)
    }
}

/// Static information about the selected GPU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Vendor family.
    pub architecture: DeviceArchitecture,
    /// Human-readable device name.
    pub name: String,
    /// Largest supported 2D image dimension.
    pub max_texture_size: Bytes,
    /// Maximum number of color attachments per render pass.
    pub max_color_attachments: u32,
    /// Whether device and host share one memory pool.
    pub is_uma: bool,
    /// Whether hardware ray tracing is available.
    pub supports_raytracing: bool,
    /// Whether mesh shaders are available.
    pub supports_mesh_shaders: bool,
}
