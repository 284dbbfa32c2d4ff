use anima_ngin::{
    cgmath::{Quaternion, Rad, Rotation3, Vector3},
    config::{PICK_VIEW, SKYBOX_VIEW, UI_VIEW, WORLD_VIEW},
    data_structures::{texture::TextureType, transform::Transform, ui_text::UiText},
    render::RenderPacket,
    renderer::{FrameOutcome, headless::HeadlessCall},
    systems::geometry::generate_cube_config,
    views::ViewPayload,
};

use crate::common::test_utils::{headless_context_in, temp_asset_root, write_png};

mod common;

#[test]
fn skybox_world_ui_and_pick_in_one_frame() {
    let root = temp_asset_root("scene");
    for face in ["_r", "_l", "_u", "_d", "_f", "_b"] {
        write_png(&root, &format!("daylight{face}"), 8, 8, [120, 170, 255, 255]);
    }
    let (mut ctx, recorder) = headless_context_in(&root);

    let skybox = ctx.create_skybox("daylight").unwrap();
    assert_eq!(skybox.cubemap.texture.as_ref().unwrap().kind, TextureType::Cube);

    let crate_config = generate_cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "crate", "crate_wood");
    let crate_geometry = ctx.acquire_geometry(&crate_config, true).unwrap();
    let mut placement = Transform::from_position(Vector3::new(0.0, 0.0, -6.0));
    placement.set_rotation(Quaternion::from_angle_y(Rad(0.5)));
    let crate_transform = ctx.transforms.insert(placement);
    let crate_mesh = ctx.spawn_mesh(vec![crate_geometry], crate_transform).unwrap();

    let panel_transform = ctx
        .transforms
        .insert(Transform::from_position(Vector3::new(20.0, 20.0, 0.0)));
    let quad = ctx.geometries.default_geometry_2d();
    let panel = ctx.spawn_mesh(vec![quad], panel_transform).unwrap();
    let label = UiText::new(ctx.acquire_unique_id().unwrap(), "crates: 1", panel_transform);

    assert_eq!(ctx.meshes.get(crate_mesh).unwrap().unique_id, 0);
    assert_eq!(ctx.meshes.get(panel).unwrap().unique_id, 1);
    assert_eq!(label.unique_id, 2);

    let world = vec![ctx.meshes.get(crate_mesh).unwrap().clone()];
    let ui = vec![ctx.meshes.get(panel).unwrap().clone()];
    let texts = vec![label];
    ctx.on_mouse_moved(640, 360);
    recorder.clear_calls();

    let mut frame = RenderPacket::new(0.016);
    frame
        .views
        .push(ctx.build_packet(SKYBOX_VIEW, ViewPayload::Skybox(skybox.clone())).unwrap());
    frame
        .views
        .push(ctx.build_packet(WORLD_VIEW, ViewPayload::World { meshes: &world }).unwrap());
    frame.views.push(
        ctx.build_packet(
            UI_VIEW,
            ViewPayload::Ui {
                meshes: &ui,
                texts: &texts,
            },
        )
        .unwrap(),
    );
    frame.views.push(
        ctx.build_packet(
            PICK_VIEW,
            ViewPayload::Pick {
                world_meshes: &world,
                ui_meshes: &ui,
                texts: &texts,
            },
        )
        .unwrap(),
    );
    assert_eq!(ctx.draw_frame(&frame).unwrap(), FrameOutcome::Drawn);
    ctx.destroy_packet(frame);

    // skybox, crate, panel, then crate and panel again for picking
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryDraw(_))), 5);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::RenderPassBegin { .. })), 5);
    assert_eq!(recorder.frames_ended(), 1);
    // the UI pick pass draws over the world one
    assert_eq!(ctx.hovered_id(), Some(1));

    ctx.destroy_skybox(&skybox).unwrap();
    assert!(ctx.textures.get("daylight").is_none());
    ctx.shutdown();
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::Shutdown)), 1);
}
