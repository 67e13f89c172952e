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

// Vela Sandbox
// Renders a handful of offscreen frames: one clear pass into the backbuffer,
// plus a vertex upload through the staging pool.

use std::sync::Arc;

use anyhow::{Context, Result};
use vela_core::memory::Bytes;
use vela_core::renderer::{BufferCreateInfo, BufferUsage, RenderDevice, RendererSettings};
use vela_core::shaderpack::{
    PixelFormat, RenderPassCreateInfo, ShaderpackData, TextureAttachmentInfo, BACKBUFFER_NAME,
};
use vela_infra::VulkanRenderDevice;
use vela_lanes::render_lane::FrameDriver;

const FRAMES_TO_RENDER: u32 = 5;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

fn load_settings() -> Result<RendererSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading renderer settings from {path}"))?;
            RendererSettings::from_json_str(&json)
                .with_context(|| format!("parsing renderer settings from {path}"))
        }
        None => Ok(RendererSettings {
            application_name: "Vela Sandbox".to_string(),
            ..Default::default()
        }),
    }
}

fn clear_pack() -> ShaderpackData {
    ShaderpackData {
        passes: vec![RenderPassCreateInfo {
            name: "Clear".to_string(),
            texture_outputs: vec![TextureAttachmentInfo {
                name: BACKBUFFER_NAME.to_string(),
                pixel_format: PixelFormat::Rgba8,
                clear: true,
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let settings = load_settings()?;
    let device = VulkanRenderDevice::new(&settings)?;
    log::info!(
        "Rendering on {} ({})",
        device.info().name,
        device.info().architecture
    );

    let device: Arc<dyn RenderDevice> = Arc::new(device);
    let mut driver = FrameDriver::new(device.clone(), settings)?;
    driver.load_pass_set(&clear_pack())?;

    let vertex_bytes: &[u8] = bytemuck::cast_slice(VERTICES);
    let size = Bytes::new(vertex_bytes.len() as u64);
    let pools = driver
        .pools_mut()
        .context("frame driver has no memory pools")?;
    let staging = device.create_buffer(
        &BufferCreateInfo {
            name: "Triangle staging".to_string(),
            size,
            usage: BufferUsage::StagingBuffer,
        },
        &mut pools.staging,
    )?;
    let vertices = device.create_buffer(
        &BufferCreateInfo {
            name: "Triangle vertices".to_string(),
            size,
            usage: BufferUsage::VertexBuffer,
        },
        &mut pools.mesh,
    )?;
    device.write_data_to_buffer(vertex_bytes, Bytes::ZERO, &staging)?;

    for frame in 0..FRAMES_TO_RENDER {
        driver.render_frame(|cmds, pass_set| {
            if frame == 0 {
                cmds.copy_buffer(&vertices, Bytes::ZERO, &staging, Bytes::ZERO, size)?;
            }
            match pass_set {
                Some(pass_set) => pass_set.record_passes(cmds, |_, _| Ok(())),
                None => Ok(()),
            }
        })?;
    }
    log::info!("Rendered {} frames", driver.frame_count());

    let pools = driver
        .pools_mut()
        .context("frame driver has no memory pools")?;
    device.destroy_buffer(vertices, &mut pools.mesh)?;
    device.destroy_buffer(staging, &mut pools.staging)?;
    driver.shutdown()?;
    Ok(())
}
