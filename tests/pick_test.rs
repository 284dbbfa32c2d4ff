use anima_ngin::{
    cgmath::Vector3,
    config::PICK_VIEW,
    context::Context,
    data_structures::{mesh::Mesh, transform::Transform},
    error::ViewError,
    pick::{NO_OBJECT, decode_pixel, id_to_colour, id_to_rgb, rgb_to_id},
    render::RenderPacket,
    renderer::FrameOutcome,
    systems::geometry::generate_cube_config,
    views::ViewPayload,
};

use crate::common::test_utils::headless_context;

mod common;

#[test]
fn ids_split_into_low_byte_first_channels() {
    assert_eq!(id_to_rgb(0x0012_3456), [0x56, 0x34, 0x12]);
    assert_eq!(rgb_to_id([0x56, 0x34, 0x12]), 0x0012_3456);
    assert_eq!(id_to_rgb(NO_OBJECT), [255, 255, 255]);

    let colour = id_to_colour(255);
    assert_eq!(colour, Vector3::new(1.0, 0.0, 0.0));
}

#[test]
fn white_decodes_to_nothing_and_black_to_zero() {
    assert_eq!(decode_pixel([255, 255, 255, 255]), None);
    assert_eq!(decode_pixel([0, 0, 0, 255]), Some(0));
    assert_eq!(decode_pixel([7, 1, 0, 0]), Some(263));
}

fn draw_pick(ctx: &mut Context, world: &[Mesh], ui: &[Mesh]) {
    let packet = ctx
        .build_packet(
            PICK_VIEW,
            ViewPayload::Pick {
                world_meshes: world,
                ui_meshes: ui,
                texts: &[],
            },
        )
        .unwrap();
    let mut frame = RenderPacket::new(0.016);
    frame.views.push(packet);
    assert_eq!(ctx.draw_frame(&frame).unwrap(), FrameOutcome::Drawn);
    ctx.destroy_packet(frame);
}

#[test]
fn empty_scene_hovers_nothing() {
    let (mut ctx, _recorder) = headless_context();
    draw_pick(&mut ctx, &[], &[]);
    assert_eq!(ctx.hovered_id(), None);
    ctx.shutdown();
}

#[test]
fn drawn_mesh_is_hovered_by_its_unique_id() {
    let (mut ctx, recorder) = headless_context();
    let cube = generate_cube_config(2.0, 2.0, 2.0, 1.0, 1.0, "pick_cube", "");
    let geometry = ctx.acquire_geometry(&cube, true).unwrap();
    let transform = ctx
        .transforms
        .insert(Transform::from_position(Vector3::new(0.0, 0.0, -5.0)));

    // burn a few ids so the mesh does not sit at zero
    for _ in 0..4 {
        ctx.acquire_unique_id().unwrap();
    }
    let handle = ctx.spawn_mesh(vec![geometry], transform).unwrap();
    let id = ctx.meshes.get(handle).unwrap().unique_id;
    assert_eq!(id, 4);

    ctx.on_mouse_moved(10, 10);
    let meshes = ctx.meshes.slots().to_vec();
    draw_pick(&mut ctx, &meshes, &[]);

    assert_eq!(ctx.hovered_id(), Some(id));
    assert_eq!(
        ctx.views.get(PICK_VIEW).unwrap().pick_instance_count(),
        Some(id + 1)
    );
    assert_eq!(recorder.instance_count("Shader.Builtin.WorldPick"), id + 1);
    assert_eq!(recorder.instance_count("Shader.Builtin.UIPick"), id + 1);

    assert!(ctx.despawn_mesh(handle).is_some());
    assert!(!ctx.identifiers.is_in_use(id));
    let meshes = ctx.meshes.slots().to_vec();
    draw_pick(&mut ctx, &meshes, &[]);
    assert_eq!(ctx.hovered_id(), None);
    ctx.shutdown();
}

#[test]
fn mouse_outside_the_window_is_clamped() {
    let (mut ctx, _recorder) = headless_context();
    let transform = ctx.transforms.insert(Transform::new());
    let quad = ctx.geometries.default_geometry();
    let handle = ctx.spawn_mesh(vec![quad], transform).unwrap();
    ctx.on_mouse_moved(-50, 100_000);

    let meshes = ctx.meshes.slots().to_vec();
    draw_pick(&mut ctx, &meshes, &[]);
    assert_eq!(ctx.hovered_id(), Some(ctx.meshes.get(handle).unwrap().unique_id));
    ctx.shutdown();
}

#[test]
fn recycled_ids_keep_pick_instances_bounded() {
    let (mut ctx, recorder) = headless_context();
    let quad = ctx.geometries.default_geometry();
    let transform = ctx.transforms.insert(Transform::new());
    let kept = ctx.spawn_mesh(vec![quad.clone()], transform).unwrap();

    for _ in 0..50 {
        let handle = ctx.spawn_mesh(vec![quad.clone()], transform).unwrap();
        assert_eq!(ctx.meshes.get(handle).unwrap().unique_id, 1);
        let meshes = ctx.meshes.slots().to_vec();
        draw_pick(&mut ctx, &meshes, &[]);
        assert!(ctx.despawn_mesh(handle).is_some());
    }

    assert_eq!(ctx.identifiers.live_count(), 1);
    assert_eq!(ctx.meshes.get(kept).unwrap().unique_id, 0);
    assert_eq!(ctx.views.get(PICK_VIEW).unwrap().pick_instance_count(), Some(2));
    assert_eq!(recorder.instance_count("Shader.Builtin.WorldPick"), 2);
    ctx.shutdown();
}

#[test]
fn ids_beyond_the_colour_range_cannot_be_picked() {
    let (mut ctx, _recorder) = headless_context();
    let quad = ctx.geometries.default_geometry();
    let transform = ctx.transforms.insert(Transform::new());

    for id in [NO_OBJECT, u32::MAX] {
        let world = vec![Mesh::new(id, vec![quad.clone()], transform)];
        let err = ctx
            .build_packet(
                PICK_VIEW,
                ViewPayload::Pick {
                    world_meshes: &world,
                    ui_meshes: &[],
                    texts: &[],
                },
            )
            .unwrap_err();
        assert!(matches!(err, ViewError::IdOutOfRange { id: bad, .. } if bad == id));
    }
    assert_eq!(ctx.views.get(PICK_VIEW).unwrap().pick_instance_count(), Some(0));
    ctx.shutdown();
}
