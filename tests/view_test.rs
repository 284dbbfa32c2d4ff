use std::sync::Arc;

use anima_ngin::{
    cgmath::{Deg, Matrix4, SquareMatrix, Vector3},
    config::{
        AttachmentConfig, PICK_VIEW, RenderPassConfig, RenderTargetConfig, RenderViewConfig,
        UI_VIEW, WORLD_VIEW,
    },
    context::Context,
    data_structures::{geometry::Geometry, mesh::Mesh, transform::Transform, ui_text::UiText},
    error::ViewError,
    render::{ExtendedData, RenderPacket},
    renderer::{
        FrameOutcome,
        backend::{AttachmentType, UniformValue},
        headless::HeadlessCall,
    },
    systems::geometry::generate_cube_config,
    views::{
        MatrixSource, RenderMode, RenderViewSystem, ViewDeps, ViewKind, ViewPayload,
        skybox::strip_translation,
    },
};

use crate::common::test_utils::{
    headless_context, headless_context_in, temp_asset_root, write_file, write_png,
};

mod common;

fn approx_eq(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
    let a: &[f32; 16] = a.as_ref();
    let b: &[f32; 16] = b.as_ref();
    a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-4)
}

fn ui_config(name: &str, pass: &str) -> RenderViewConfig {
    RenderViewConfig {
        name: name.to_string(),
        kind: ViewKind::Ui,
        custom_shader_name: None,
        width: 0,
        height: 0,
        view_matrix_source: MatrixSource::UiCamera,
        projection_matrix_source: MatrixSource::UiCamera,
        passes: vec![RenderPassConfig {
            name: pass.to_string(),
            target: RenderTargetConfig {
                attachments: vec![AttachmentConfig {
                    kind: AttachmentType::Colour,
                    source: Default::default(),
                    load_operation: Default::default(),
                    store_operation: Default::default(),
                    present_after: false,
                }],
            },
            ..Default::default()
        }],
    }
}

#[test]
fn builtin_views_are_created() {
    let (mut ctx, _recorder) = headless_context();
    assert_eq!(ctx.views.count(), 4);
    for name in ["skybox", WORLD_VIEW, UI_VIEW, PICK_VIEW] {
        let view = ctx.views.get(name).unwrap();
        assert_eq!(view.size(), (1280, 720));
    }
    assert_eq!(ctx.views.get(PICK_VIEW).unwrap().passes().len(), 2);
    assert_eq!(ctx.views.get(WORLD_VIEW).unwrap().kind(), ViewKind::World);
    assert!(matches!(ctx.views.get("minimap"), Err(ViewError::NotFound(name)) if name == "minimap"));
    ctx.shutdown();
}

#[test]
fn create_validates_the_config() {
    let (mut ctx, _recorder) = headless_context();
    let mut extra = RenderViewSystem::new(1).unwrap();

    let nameless = ui_config("", "Renderpass.Extra.Nameless");
    let err = extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &nameless,
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::EmptyName));

    let mut passless = ui_config("passless", "unused");
    passless.passes.clear();
    let err = extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &passless,
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::NoPasses(_)));

    let mut one_pass_pick = ui_config("pick2", "Renderpass.Extra.Pick");
    one_pass_pick.kind = ViewKind::Pick;
    let err = extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &one_pass_pick,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ViewError::PassCount {
            expected: 2,
            actual: 1,
            ..
        }
    ));

    extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &ui_config("overlay", "Renderpass.Extra.Overlay"),
        )
        .unwrap();
    let err = extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &ui_config("overlay", "Renderpass.Extra.Overlay2"),
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::Duplicate(_)));

    let err = extra
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &ui_config("hud", "Renderpass.Extra.Hud"),
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::Capacity(1)));

    extra.shutdown(&mut ctx.renderer, &mut ctx.shaders);
    ctx.shutdown();
}

#[test]
fn zero_capacity_view_system_is_rejected() {
    assert!(matches!(RenderViewSystem::new(0), Err(ViewError::Capacity(0))));
}

#[test]
fn shader_without_required_uniforms_fails_view_creation() {
    let (mut ctx, _recorder) = headless_context();
    let mut views = RenderViewSystem::new(4).unwrap();
    let mut config = ui_config("odd_world", "Renderpass.Extra.OddWorld");
    config.kind = ViewKind::World;
    // the skybox shader has no `model` uniform
    config.custom_shader_name = Some("Shader.Builtin.Skybox".to_string());

    let err = views
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &config,
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::MissingUniform { uniform, .. } if uniform == "model"));
    assert!(ctx.renderer.renderpass_id("Renderpass.Extra.OddWorld").is_none());
    assert_eq!(views.count(), 0);

    // the failed attempt left nothing behind under the same names
    config.custom_shader_name = None;
    views
        .create(
            ViewDeps {
                renderer: &mut ctx.renderer,
                shaders: &mut ctx.shaders,
                assets: &ctx.assets,
            },
            &config,
        )
        .unwrap();
    assert!(ctx.renderer.renderpass_id("Renderpass.Extra.OddWorld").is_some());
    views.shutdown(&mut ctx.renderer, &mut ctx.shaders);
    ctx.shutdown();
}

#[test]
fn destroyed_view_frees_its_passes_for_a_new_view() {
    let (mut ctx, recorder) = headless_context();
    let world_config = ctx
        .config
        .views
        .iter()
        .find(|v| v.name == WORLD_VIEW)
        .cloned()
        .unwrap();
    let pass = ctx.views.get(WORLD_VIEW).unwrap().passes()[0];
    recorder.clear_calls();

    ctx.views
        .destroy(&mut ctx.renderer, &mut ctx.shaders, WORLD_VIEW)
        .unwrap();
    assert!(ctx.renderer.renderpass(pass).is_none());
    assert!(ctx.renderer.renderpass_id("Renderpass.Builtin.World").is_none());
    assert_eq!(
        recorder.count(|c| matches!(c, HeadlessCall::RenderPassDestroy(_))),
        1
    );
    assert!(recorder.count(|c| matches!(c, HeadlessCall::RenderTargetDestroy(_))) > 0);

    for _ in 0..3 {
        ctx.views
            .create(
                ViewDeps {
                    renderer: &mut ctx.renderer,
                    shaders: &mut ctx.shaders,
                    assets: &ctx.assets,
                },
                &world_config,
            )
            .unwrap();
        assert_eq!(ctx.views.get(WORLD_VIEW).unwrap().passes(), &[pass]);
        ctx.views
            .destroy(&mut ctx.renderer, &mut ctx.shaders, WORLD_VIEW)
            .unwrap();
    }
    assert_eq!(
        recorder.count(|c| matches!(c, HeadlessCall::RenderPassCreate { .. })),
        3
    );
    assert_eq!(
        recorder.count(|c| matches!(c, HeadlessCall::RenderPassDestroy(_))),
        4
    );
    assert!(matches!(
        ctx.views.destroy(&mut ctx.renderer, &mut ctx.shaders, WORLD_VIEW),
        Err(ViewError::NotFound(_))
    ));
    ctx.shutdown();
}

#[test]
fn resize_to_the_same_size_rebuilds_nothing() {
    let (mut ctx, recorder) = headless_context();
    recorder.clear_calls();

    let projection = ctx.views.get(WORLD_VIEW).unwrap().projection_matrix();
    ctx.views.on_window_resize(&mut ctx.renderer, 1280, 720).unwrap();
    ctx.views.on_window_resize(&mut ctx.renderer, 1280, 720).unwrap();
    assert_eq!(
        recorder.count(|c| matches!(c, HeadlessCall::RenderTargetCreate { .. })),
        0
    );
    assert_eq!(ctx.views.get(WORLD_VIEW).unwrap().projection_matrix(), projection);
    ctx.shutdown();
}

#[test]
fn zero_height_resize_keeps_targets_valid() {
    let (mut ctx, recorder) = headless_context();
    recorder.clear_calls();

    ctx.views.on_window_resize(&mut ctx.renderer, 640, 0).unwrap();

    let world = ctx.views.get(WORLD_VIEW).unwrap();
    assert_eq!(world.size(), (640, 0));
    let expected = anima_ngin::cgmath::perspective(Deg(45.0), 1.0, 0.1, 1000.0);
    assert!(approx_eq(world.projection_matrix(), expected));

    let calls = recorder.calls();
    let targets: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            HeadlessCall::RenderTargetCreate { width, height, .. } => Some((*width, *height)),
            _ => None,
        })
        .collect();
    assert!(!targets.is_empty());
    assert!(targets.iter().all(|&size| size == (640, 1)));
    ctx.shutdown();
}

#[test]
fn payload_must_match_the_view_kind() {
    let (mut ctx, _recorder) = headless_context();
    let err = ctx
        .build_packet(UI_VIEW, ViewPayload::World { meshes: &[] })
        .unwrap_err();
    assert!(matches!(err, ViewError::PayloadMismatch { got: "world", .. }));
    ctx.shutdown();
}

/// Material on the built-in material shader whose diffuse map has an alpha below 255.
fn see_through_root() -> std::path::PathBuf {
    let root = temp_asset_root("transparency");
    write_png(&root, "frosted", 2, 2, [200, 200, 255, 100]);
    write_file(
        &root,
        "materials/see_through.amt",
        "name = see_through\nshader = Shader.Builtin.Material\ndiffuse_map_name = frosted\nautorelease = true\n",
    );
    root
}

#[test]
fn world_packet_puts_transparent_geometry_last_nearest_first() {
    let root = see_through_root();
    let (mut ctx, recorder) = headless_context_in(&root);

    let mut geometry = |name: &str, material: &str| -> Arc<Geometry> {
        let config = generate_cube_config(1.0, 1.0, 1.0, 1.0, 1.0, name, material);
        ctx.acquire_geometry(&config, true).unwrap()
    };
    let opaque: Vec<_> = ["box_a", "box_b", "box_c"]
        .iter()
        .map(|name| geometry(name, ""))
        .collect();
    let far = geometry("pane_far", "see_through");
    let near = geometry("pane_near", "see_through");
    assert!(far.material.as_ref().unwrap().is_transparent());

    let at = |ctx: &mut Context, z: f32| {
        ctx.transforms.insert(Transform::from_position(Vector3::new(0.0, 0.0, z)))
    };
    let meshes = vec![
        Mesh::new(0, vec![opaque[0].clone()], at(&mut ctx, -10.0)),
        Mesh::new(1, vec![far.clone()], at(&mut ctx, -5.0)),
        Mesh::new(2, vec![opaque[1].clone()], at(&mut ctx, -1.0)),
        Mesh::new(3, vec![near.clone()], at(&mut ctx, -2.0)),
        Mesh::new(4, vec![opaque[2].clone()], at(&mut ctx, -30.0)),
    ];

    let packet = ctx
        .build_packet(WORLD_VIEW, ViewPayload::World { meshes: &meshes })
        .unwrap();
    let order: Vec<&str> = packet
        .geometries
        .iter()
        .map(|g| g.geometry.name.as_str())
        .collect();
    assert_eq!(order, ["box_a", "box_b", "box_c", "pane_near", "pane_far"]);
    assert_eq!(packet.geometries[3].unique_id, 3);

    recorder.clear_calls();
    let mut frame = RenderPacket::new(0.016);
    frame.views.push(packet);
    assert_eq!(ctx.draw_frame(&frame).unwrap(), FrameOutcome::Drawn);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryDraw(_))), 5);
    ctx.destroy_packet(frame);
    ctx.shutdown();
}

#[test]
fn ui_packet_flattens_meshes_and_carries_texts() {
    let (mut ctx, _recorder) = headless_context();
    let quad = ctx.geometries.default_geometry_2d();
    let transform = ctx.transforms.insert(Transform::from_position(Vector3::new(20.0, 30.0, 0.0)));
    let meshes = vec![
        Mesh::new(0, vec![quad.clone(), quad.clone()], transform),
        Mesh::new(1, vec![quad.clone()], transform),
    ];
    let texts = vec![UiText::new(7, "score: 10", transform)];

    let packet = ctx
        .build_packet(
            UI_VIEW,
            ViewPayload::Ui {
                meshes: &meshes,
                texts: &texts,
            },
        )
        .unwrap();
    assert_eq!(packet.geometry_count(), 3);
    assert_eq!(
        packet.geometries.iter().map(|g| g.unique_id).collect::<Vec<_>>(),
        [0, 0, 1]
    );
    assert!(approx_eq(packet.view_matrix, Matrix4::identity()));
    assert!(matches!(&packet.extended_data, ExtendedData::Ui { texts } if texts.len() == 1));
    ctx.shutdown();
}

#[test]
fn pick_packet_counts_instances_from_the_highest_id() {
    let (mut ctx, _recorder) = headless_context();
    let geometry = ctx.geometries.default_geometry();
    let transform = ctx.transforms.insert(Transform::new());
    let world: Vec<Mesh> = [3, 7, 1]
        .into_iter()
        .map(|id| Mesh::new(id, vec![geometry.clone()], transform))
        .collect();
    let ui: Vec<Mesh> = [2, 9]
        .into_iter()
        .map(|id| Mesh::new(id, vec![geometry.clone()], transform))
        .collect();

    let packet = ctx
        .build_packet(
            PICK_VIEW,
            ViewPayload::Pick {
                world_meshes: &world,
                ui_meshes: &ui,
                texts: &[],
            },
        )
        .unwrap();
    let ExtendedData::Pick { counts, .. } = &packet.extended_data else {
        panic!("pick packet without pick data");
    };
    assert_eq!(counts.world_geometry_count, 3);
    assert_eq!(counts.ui_geometry_count, 2);
    assert_eq!(counts.required_instance_count, 10);
    ctx.shutdown();
}

#[test]
fn skybox_view_matrix_drops_translation() {
    let view = Matrix4::from_translation(Vector3::new(4.0, 5.0, 6.0))
        * Matrix4::from_angle_y(Deg(30.0));
    let stripped = strip_translation(view);
    assert_eq!(stripped.w.truncate(), Vector3::new(0.0, 0.0, 0.0));
    assert!(approx_eq(stripped, Matrix4::from_angle_y(Deg(30.0))));
}

#[test]
fn render_mode_reaches_the_material_shader() {
    let (mut ctx, recorder) = headless_context();
    ctx.views.set_render_mode(RenderMode::Normals);
    assert_eq!(
        ctx.views.get(WORLD_VIEW).unwrap().render_mode(),
        Some(RenderMode::Normals)
    );
    assert_eq!(ctx.views.get(UI_VIEW).unwrap().render_mode(), None);

    let packet = ctx
        .build_packet(WORLD_VIEW, ViewPayload::World { meshes: &[] })
        .unwrap();
    let mut frame = RenderPacket::new(0.016);
    frame.views.push(packet);
    recorder.clear_calls();
    ctx.draw_frame(&frame).unwrap();

    let mode = recorder.count(|c| {
        matches!(c, HeadlessCall::SetUniform { name, value: UniformValue::U32(2), .. } if name == "mode")
    });
    assert_eq!(mode, 1);
    ctx.shutdown();
}
