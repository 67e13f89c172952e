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


//! Smoke tests against a real Vulkan driver.
//!
//! They need a GPU (or a software ICD such as lavapipe) and are ignored by
//! default: `cargo test -p vela-infra -- --ignored`.

use vela_core::math::Extent2D;
use vela_core::memory::{
    BlockAllocationStrategy, Bytes, DeviceMemoryResource, MemoryUsage, ObjectKinds,
};
use vela_core::renderer::{
    BufferCreateInfo, BufferUsage, CommandListError, CommandListLevel, QueueType, RenderDevice,
    RendererSettings, ResourceError, SubpassContents,
};
use vela_core::shaderpack::{
    PixelFormat, RenderPassCreateInfo, TextureAttachmentInfo, TextureCreateInfo,
    TextureDimensionType, TextureFormat,
};
use vela_infra::VulkanRenderDevice;

fn device() -> VulkanRenderDevice {
    let settings = RendererSettings {
        application_name: "vela-infra tests".to_string(),
        num_frames_in_flight: 2,
        ..Default::default()
    };
    VulkanRenderDevice::new(&settings).expect("a Vulkan device is required for ignored tests")
}

fn staging_pool(device: &VulkanRenderDevice) -> DeviceMemoryResource {
    let memory = device
        .allocate_device_memory(Bytes::kib(64), MemoryUsage::StagingBuffer, ObjectKinds::BUFFER)
        .expect("staging memory");
    DeviceMemoryResource::new(memory, Box::new(BlockAllocationStrategy::new(Bytes::kib(64), Bytes::new(256))))
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_device_reports_its_gpu() {
    let device = device();
    assert!(!device.info().name.is_empty());
    assert!(device.info().max_color_attachments >= 1);
    assert_eq!(device.num_frames_in_flight(), 2);
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_staging_buffer_write_and_bounds() {
    let device = device();
    let mut pool = staging_pool(&device);
    let buffer = device
        .create_buffer(
            &BufferCreateInfo {
                name: "Staging".to_string(),
                size: Bytes::new(64),
                usage: BufferUsage::StagingBuffer,
            },
            &mut pool,
        )
        .unwrap();

    device.write_data_to_buffer(&[7; 64], Bytes::ZERO, &buffer).unwrap();
    assert!(matches!(
        device.write_data_to_buffer(&[7; 16], Bytes::new(56), &buffer),
        Err(ResourceError::OutOfBounds { .. })
    ));

    device.destroy_buffer(buffer, &mut pool).unwrap();
    assert_eq!(pool.strategy().allocated(), Bytes::ZERO);
    device.free_device_memory(pool.into_memory()).unwrap();
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_uniform_heap_is_host_writable() {
    let device = device();
    let memory = device
        .allocate_device_memory(Bytes::kib(64), MemoryUsage::LowFrequencyUpload, ObjectKinds::BUFFER)
        .unwrap();
    let mut pool = DeviceMemoryResource::new(
        memory,
        Box::new(BlockAllocationStrategy::new(Bytes::kib(64), Bytes::new(256))),
    );
    let buffer = device
        .create_buffer(
            &BufferCreateInfo {
                name: "Camera".to_string(),
                size: Bytes::new(128),
                usage: BufferUsage::UniformBuffer,
            },
            &mut pool,
        )
        .unwrap();

    device.write_data_to_buffer(&[1; 128], Bytes::ZERO, &buffer).unwrap();

    device.destroy_buffer(buffer, &mut pool).unwrap();
    device.free_device_memory(pool.into_memory()).unwrap();
}

#[test]
#[ignore = "requires a Vulkan driver"]
fn test_clear_pass_submits_and_signals_its_fence() {
    let device = device();
    let size = Extent2D::new(64, 64);
    let info = RenderPassCreateInfo {
        name: "Clear".to_string(),
        texture_outputs: vec![TextureAttachmentInfo {
            name: "Color".to_string(),
            pixel_format: PixelFormat::Rgba8,
            clear: true,
        }],
        ..Default::default()
    };
    let renderpass = device.create_renderpass(&info, size).unwrap();
    let image = device
        .create_image(
            &TextureCreateInfo {
                name: "Color".to_string(),
                format: TextureFormat {
                    pixel_format: PixelFormat::Rgba8,
                    dimension_type: TextureDimensionType::Absolute,
                    width: 64.0,
                    height: 64.0,
                },
            },
            size,
        )
        .unwrap();
    let framebuffer = device.create_framebuffer(&renderpass, &[&image], None, size).unwrap();
    let fence = device.create_fence(false).unwrap();

    device.begin_frame(0).unwrap();
    let mut list = device
        .create_command_list(0, 0, QueueType::Graphics, CommandListLevel::Primary)
        .unwrap();
    assert_eq!(list.draw_indexed_mesh(3, 0, 1), Err(CommandListError::RenderPassNotBegun));
    list.begin_renderpass(&renderpass, &framebuffer, SubpassContents::Inline)
        .unwrap();
    list.end_renderpass().unwrap();

    let secondary = device
        .create_secondary_command_list(0, 0, QueueType::Graphics, &renderpass, &framebuffer)
        .unwrap();
    list.begin_renderpass(&renderpass, &framebuffer, SubpassContents::SecondaryLists)
        .unwrap();
    list.execute_command_lists(vec![secondary]).unwrap();
    list.end_renderpass().unwrap();
    device
        .submit_command_list(list, QueueType::Graphics, Some(&fence), &[], &[])
        .unwrap();
    device.wait_for_fences(&[&fence]).unwrap();

    device.destroy_fences(vec![fence]).unwrap();
    device.destroy_framebuffer(framebuffer).unwrap();
    device.destroy_image(image).unwrap();
    device.destroy_renderpass(renderpass).unwrap();
}
