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

//! Integration tests for loading and unloading whole pass-sets.

mod common;

use common::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use vela_core::math::Extent2D;
use vela_core::renderer::{CommandListLevel, Image, RenderDevice};
use vela_core::shaderpack::{
    MaterialData, MaterialPass, PipelineCreateInfo, PixelFormat, RenderPassCreateInfo,
    ShaderpackData, ShaderpackResourcesData, TextureDimensionType, BACKBUFFER_NAME,
};
use vela_lanes::render_lane::{LoadError, PassOrderError, PassSetLoader};

const RENDER_SIZE: Extent2D = Extent2D {
    width: 640,
    height: 480,
};

fn setup() -> (Arc<MockRenderDevice>, PassSetLoader, Image) {
    let device = MockRenderDevice::shared();
    let loader = PassSetLoader::new(device.clone(), RENDER_SIZE);
    let backbuffer = device
        .create_image(&render_target(BACKBUFFER_NAME, PixelFormat::Rgba8), RENDER_SIZE)
        .unwrap();
    (device, loader, backbuffer)
}

fn targets(names: &[&str]) -> ShaderpackResourcesData {
    ShaderpackResourcesData {
        textures: names
            .iter()
            .map(|name| render_target(name, PixelFormat::Rgba8))
            .collect(),
        samplers: Vec::new(),
    }
}

fn pass_names(data: &vela_lanes::render_lane::LoadedPassSet) -> Vec<&str> {
    data.passes().iter().map(|p| p.info.name.as_str()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Pass ordering and validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_passes_are_built_in_dependency_order() {
    let (device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        passes: vec![
            pass("C", &["A", "B"], &[BACKBUFFER_NAME]),
            pass("B", &["A"], &["Lighting"]),
            pass("A", &[], &["Gbuffer"]),
        ],
        resources: targets(&["Gbuffer", "Lighting"]),
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert_eq!(pass_names(&loaded), vec!["A", "B", "C"]);
    assert_eq!(
        device.calls_starting_with("create_renderpass:"),
        vec!["create_renderpass:A", "create_renderpass:B", "create_renderpass:C"]
    );
    assert!(device
        .calls()
        .contains(&format!("create_framebuffer:C:{BACKBUFFER_NAME}")));
    assert!(loaded.pass("C").unwrap().renderpass.writes_to_backbuffer);
}

#[test]
fn test_recorded_passes_follow_load_order() {
    let (_device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        passes: vec![
            pass("Post", &["Scene"], &[BACKBUFFER_NAME]),
            pass("Scene", &[], &["SceneColor"]),
        ],
        resources: targets(&["SceneColor"]),
        ..Default::default()
    };
    let loaded = loader.load(&data, &backbuffer).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let mut list = MockCommandList::new(CommandListLevel::Primary, log.clone());
    loaded
        .record_passes(&mut list, |_, cmds| cmds.draw_indexed_mesh(3, 0, 1))
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "begin_renderpass:Scene",
            "draw:3x1",
            "end_renderpass",
            "begin_renderpass:Post",
            "draw:3x1",
            "end_renderpass",
        ]
    );
}

#[test]
fn test_backbuffer_with_other_outputs_is_skipped() {
    let (device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        passes: vec![
            pass("Bad", &[], &[BACKBUFFER_NAME, "Color"]),
            pass("Good", &[], &[BACKBUFFER_NAME]),
        ],
        resources: targets(&["Color"]),
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert_eq!(pass_names(&loaded), vec!["Good"]);
    assert_eq!(
        device.calls_starting_with("create_renderpass:"),
        vec!["create_renderpass:Good"],
        "no render pass object may exist for the rejected pass"
    );
}

#[test]
fn test_backbuffer_as_depth_is_skipped() {
    let (device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        passes: vec![RenderPassCreateInfo {
            depth_texture: Some(depth(BACKBUFFER_NAME)),
            ..pass("DepthOnly", &[], &[])
        }],
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();
    assert!(loaded.passes().is_empty());
    assert!(device.calls_starting_with("create_renderpass:").is_empty());
}

#[test]
fn test_mismatched_attachment_sizes_skip_the_pass() {
    let (device, loader, backbuffer) = setup();
    let mut half = render_target("Half", PixelFormat::Rgba8);
    half.format.width = 0.5;
    half.format.height = 0.5;
    let data = ShaderpackData {
        passes: vec![
            pass("Mixed", &[], &["Full", "Half"]),
            pass("Downsample", &[], &["Half"]),
        ],
        resources: ShaderpackResourcesData {
            textures: vec![render_target("Full", PixelFormat::Rgba8), half],
            samplers: Vec::new(),
        },
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert_eq!(pass_names(&loaded), vec!["Downsample"]);
    assert_eq!(
        loaded.pass("Downsample").unwrap().framebuffer.extent,
        Extent2D::new(320, 240)
    );
    assert_eq!(device.live_of_kind("renderpass"), 1);
}

#[test]
fn test_absolute_render_targets_ignore_the_render_size() {
    let (_device, loader, backbuffer) = setup();
    let mut shadow = render_target("ShadowMap", PixelFormat::Depth);
    shadow.format.dimension_type = TextureDimensionType::Absolute;
    shadow.format.width = 1024.0;
    shadow.format.height = 1024.0;
    let data = ShaderpackData {
        passes: vec![RenderPassCreateInfo {
            depth_texture: Some(depth("ShadowMap")),
            ..pass("Shadows", &[], &[])
        }],
        resources: ShaderpackResourcesData {
            textures: vec![shadow],
            samplers: Vec::new(),
        },
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();
    let shadows = loaded.pass("Shadows").unwrap();
    assert_eq!(shadows.framebuffer.extent, Extent2D::new(1024, 1024));
    assert_eq!(shadows.framebuffer.attachment_count, 1);
}

#[test]
fn test_pass_cycle_aborts_the_load() {
    let (device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        passes: vec![pass("A", &["B"], &["Color"]), pass("B", &["A"], &["Color"])],
        resources: targets(&["Color"]),
        ..Default::default()
    };

    let err = loader.load(&data, &backbuffer).unwrap_err();

    assert_eq!(
        err,
        LoadError::PassOrder(PassOrderError::Cycle(vec!["A".to_string(), "B".to_string()]))
    );
    assert_eq!(
        device.live_count(),
        1,
        "only the caller's backbuffer may be alive after an aborted load"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipelines
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_child_pipeline_declared_before_its_parent() {
    let (_device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        pipelines: vec![
            PipelineCreateInfo {
                name: "Child".to_string(),
                parent_name: Some("Base".to_string()),
                ..Default::default()
            },
            pipeline("Base", "Forward"),
        ],
        passes: vec![pass("Forward", &[], &[BACKBUFFER_NAME])],
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert_eq!(loaded.pipelines().len(), 2);
    assert_eq!(loaded.pass("Forward").unwrap().pipelines, vec!["Base", "Child"]);
}

#[test]
fn test_pipeline_parent_cycle_aborts_the_load() {
    let (_device, loader, backbuffer) = setup();
    let data = ShaderpackData {
        pipelines: vec![
            PipelineCreateInfo {
                parent_name: Some("B".to_string()),
                ..pipeline("A", "Forward")
            },
            PipelineCreateInfo {
                parent_name: Some("A".to_string()),
                ..pipeline("B", "Forward")
            },
        ],
        passes: vec![pass("Forward", &[], &[BACKBUFFER_NAME])],
        ..Default::default()
    };

    assert!(matches!(
        loader.load(&data, &backbuffer),
        Err(LoadError::PipelineCycle(_))
    ));
}

#[test]
fn test_failed_pipeline_does_not_block_the_rest() {
    let (device, loader, backbuffer) = setup();
    device.fail_pipeline("Broken");
    let data = ShaderpackData {
        pipelines: vec![pipeline("Broken", "Forward"), pipeline("Fine", "Forward")],
        passes: vec![pass("Forward", &[], &[BACKBUFFER_NAME])],
        ..Default::default()
    };

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert!(loaded.pipelines().get_pipeline("Broken").is_none());
    assert!(loaded.pipelines().get_pipeline("Fine").is_some());
    assert_eq!(loaded.pass("Forward").unwrap().pipelines, vec!["Fine"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Materials and teardown
// ─────────────────────────────────────────────────────────────────────────────

fn material_pack() -> ShaderpackData {
    let lit = PipelineCreateInfo {
        vertex_shader: shader(vec![uniform("camera", 0, 0)]),
        fragment_shader: shader(vec![sampled_texture("shadow_map", 1, 0)]),
        ..pipeline("Lit", "Forward")
    };
    let bindings = HashMap::from([
        ("shadow_map".to_string(), "ShadowColor".to_string()),
        ("camera".to_string(), "CameraBuffer".to_string()),
        ("unused".to_string(), "Nothing".to_string()),
    ]);
    ShaderpackData {
        pipelines: vec![lit],
        passes: vec![
            pass("Shadows", &[], &["ShadowColor"]),
            pass("Forward", &["Shadows"], &[BACKBUFFER_NAME]),
        ],
        materials: vec![MaterialData {
            name: "Stone".to_string(),
            passes: vec![MaterialPass {
                name: "main".to_string(),
                material_name: "Stone".to_string(),
                pipeline: "Lit".to_string(),
                bindings,
            }],
            geometry_filter: "geometry_type::block".to_string(),
        }],
        resources: targets(&["ShadowColor"]),
    }
}

#[test]
fn test_material_sets_point_at_render_targets() {
    let (device, loader, backbuffer) = setup();

    let loaded = loader.load(&material_pack(), &backbuffer).unwrap();

    let stone = loaded
        .material_pass("Stone", "main")
        .expect("material pass must be built");
    assert_eq!(stone.pipeline, "Lit");
    assert_eq!(
        stone
            .descriptor_sets
            .iter()
            .map(|set| set.set_index)
            .collect::<Vec<_>>(),
        vec![0, 1]
    );
    assert_eq!(device.calls_starting_with("create_descriptor_pool:"), vec!["create_descriptor_pool:2:2"]);
    assert_eq!(
        device.calls_starting_with("write_descriptor:"),
        vec!["write_descriptor:set1:binding0:ShadowColor+DefaultPointSampler"],
        "only image bindings are written at load time"
    );
}

#[test]
fn test_material_with_unknown_pipeline_is_skipped() {
    let (device, loader, backbuffer) = setup();
    let mut data = material_pack();
    data.materials[0].passes[0].pipeline = "Missing".to_string();

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert!(loaded.material_passes().is_empty());
    assert!(device.calls_starting_with("create_descriptor_pool:").is_empty());
}

#[test]
fn test_unload_releases_every_object() {
    let (device, loader, backbuffer) = setup();

    let loaded = loader.load(&material_pack(), &backbuffer).unwrap();
    assert!(device.live_count() > 1);

    loaded.unload(device.as_ref());
    assert_eq!(device.live_count(), 1, "only the caller's backbuffer remains");

    device.destroy_image(backbuffer).unwrap();
    assert_eq!(device.live_count(), 0);
}

#[test]
fn test_pack_loaded_from_json() {
    let (_device, loader, backbuffer) = setup();
    let data: ShaderpackData = serde_json::from_str(
        r#"{
            "passes": [
                { "name": "Tonemap", "dependencies": ["Scene"],
                  "texture_outputs": [{ "name": "Backbuffer", "pixel_format": "Rgba8" }] },
                { "name": "Scene",
                  "texture_outputs": [{ "name": "HdrColor", "pixel_format": "Rgba16F", "clear": true }] }
            ],
            "resources": {
                "textures": [{ "name": "HdrColor", "format": {
                    "pixel_format": "Rgba16F", "dimension_type": "ScreenRelative",
                    "width": 0.5, "height": 0.5 } }]
            }
        }"#,
    )
    .unwrap();

    let loaded = loader.load(&data, &backbuffer).unwrap();

    assert_eq!(pass_names(&loaded), vec!["Scene", "Tonemap"]);
    assert_eq!(
        loaded.resources().get_render_target("HdrColor").unwrap().extent,
        Extent2D::new(320, 240)
    );
}
