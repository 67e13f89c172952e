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

//! Global settings for the renderer.

use crate::math::Extent2D;
use crate::memory::Bytes;
use crate::renderer::error::ResourceError;
use serde::{Deserialize, Serialize};

/// Debugging aids enabled on the native device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugSettings {
    /// Master switch for every debugging aid.
    pub enabled: bool,
    /// Load the native API's validation layers and route their messages to the log.
    pub enable_validation_layers: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            enable_validation_layers: cfg!(debug_assertions),
        }
    }
}

/// Sizes and alignments of the global GPU memory pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuPoolSettings {
    /// Device-local heap for vertex and index data.
    pub mesh_memory_size: Bytes,
    /// Alignment of mesh allocations.
    pub mesh_alignment: Bytes,
    /// Host-writable heap for uniform buffers.
    pub uniform_memory_size: Bytes,
    /// Alignment of uniform allocations.
    pub uniform_alignment: Bytes,
    /// Host-visible heap for upload staging.
    pub staging_memory_size: Bytes,
    /// Alignment of staging allocations.
    pub staging_alignment: Bytes,
}

impl Default for GpuPoolSettings {
    fn default() -> Self {
        Self {
            mesh_memory_size: Bytes::mib(512),
            mesh_alignment: Bytes::new(64),
            uniform_memory_size: Bytes::mib(16),
            uniform_alignment: Bytes::new(256),
            staging_memory_size: Bytes::kib(256),
            staging_alignment: Bytes::new(64),
        }
    }
}

impl GpuPoolSettings {
    /// Checks that every pool alignment is a power of two.
    pub fn validate(&self) -> Result<(), ResourceError> {
        for (pool, alignment) in [
            ("mesh", self.mesh_alignment),
            ("uniform", self.uniform_alignment),
            ("staging", self.staging_alignment),
        ] {
            if !alignment.count().is_power_of_two() {
                return Err(ResourceError::InvalidAlignment { pool, alignment });
            }
        }
        Ok(())
    }
}

/// A collection of settings read once when the renderer starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Name reported to the native API.
    pub application_name: String,
    /// Number of frames whose GPU work may be outstanding at once.
    pub num_frames_in_flight: u32,
    /// Number of threads that may record command lists.
    pub num_recording_threads: u32,
    /// Size of the offscreen backbuffer.
    pub render_size: Extent2D,
    /// Debugging aids.
    pub debug: DebugSettings,
    /// Global GPU memory pools.
    pub memory: GpuPoolSettings,
    /// Device extensions a GPU must support to be selected.
    pub required_device_extensions: Vec<String>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            application_name: "Vela".to_string(),
            num_frames_in_flight: 3,
            num_recording_threads: 1,
            render_size: Extent2D::new(1280, 720),
            debug: DebugSettings::default(),
            memory: GpuPoolSettings::default(),
            required_device_extensions: Vec::new(),
        }
    }
}

impl RendererSettings {
    /// Parses settings from JSON. Missing fields take their default values.
    ///
    /// Pool alignments that are not powers of two are rejected.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let settings: Self = serde_json::from_str(json)?;
        settings
            .memory
            .validate()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(settings.sanitized())
    }

    /// Clamps counts that must be at least one.
    pub fn sanitized(mut self) -> Self {
        self.num_frames_in_flight = self.num_frames_in_flight.max(1);
        self.num_recording_threads = self.num_recording_threads.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings =
            RendererSettings::from_json_str(r#"{ "render_size": { "width": 640, "height": 480 } }"#)
                .unwrap();
        assert_eq!(settings.render_size, Extent2D::new(640, 480));
        assert_eq!(settings.num_frames_in_flight, 3);
        assert_eq!(settings.memory.mesh_memory_size, Bytes::mib(512));
    }

    #[test]
    fn frame_count_is_clamped() {
        let settings = RendererSettings::from_json_str(
            r#"{ "num_frames_in_flight": 0, "memory": { "staging_alignment": 128 } }"#,
        )
        .unwrap();
        assert_eq!(settings.num_frames_in_flight, 1);
        assert_eq!(settings.memory.staging_alignment, Bytes::new(128));
        assert_eq!(settings.memory.staging_memory_size, Bytes::kib(256));
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        let err = RendererSettings::from_json_str(r#"{ "memory": { "mesh_alignment": 100 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("mesh"), "{err}");

        let settings = GpuPoolSettings {
            uniform_alignment: Bytes::ZERO,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(ResourceError::InvalidAlignment {
                pool: "uniform",
                alignment: Bytes::ZERO,
            })
        );
        assert_eq!(GpuPoolSettings::default().validate(), Ok(()));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RendererSettings::from_json_str("{ not json").is_err());
    }
}
