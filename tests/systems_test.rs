use std::path::Path;

use anima_ngin::{
    cgmath::Vector3,
    data_structures::{
        geometry::Vertices,
        texture::{TextureType, TextureUse},
    },
    error::{RegistryError, ShaderError},
    renderer::headless::HeadlessCall,
    resources::shader::ShaderConfig,
    systems::{
        geometry::{generate_cube_config, generate_plane_config},
        material::{BUILTIN_MATERIAL_SHADER, DEFAULT_MATERIAL_NAME},
        texture::{DEFAULT_DIFFUSE_TEXTURE_NAME, DEFAULT_TEXTURE_NAME},
    },
};

use crate::common::test_utils::{headless_context, headless_context_in, temp_asset_root, write_png};

mod common;

#[test]
fn default_textures_exist_and_are_not_counted() {
    let (mut ctx, recorder) = headless_context();
    let checker = ctx.textures.get(DEFAULT_TEXTURE_NAME).unwrap();
    assert_eq!((checker.width, checker.height), (256, 256));
    assert!(!checker.has_transparency());
    // top left pixel of the checkerboard is blue
    assert_eq!(recorder.pixel(checker.handle.unwrap(), 0, 0), Some([0, 0, 255, 255]));

    assert!(ctx.textures.get(DEFAULT_DIFFUSE_TEXTURE_NAME).is_some());
    assert_eq!(ctx.release_texture(DEFAULT_TEXTURE_NAME).unwrap(), 0);
    assert_eq!(ctx.textures.loaded_count(), 0);
    ctx.shutdown();
}

#[test]
fn textures_are_shared_and_unloaded_at_zero() {
    let root = temp_asset_root("textures");
    write_png(&root, "brick", 2, 2, [180, 60, 40, 255]);
    let (mut ctx, recorder) = headless_context_in(&root);
    let live_before = recorder.live_textures();

    let first = ctx.acquire_texture("brick", true).unwrap();
    let second = ctx.acquire_texture("brick", true).unwrap();
    assert_eq!(first.handle, second.handle);
    assert_eq!(ctx.textures.ref_count("brick"), Some(2));
    assert_eq!(recorder.texture_size(first.handle.unwrap()), Some((2, 2)));
    assert_eq!(recorder.live_textures(), live_before + 1);

    assert_eq!(ctx.release_texture("brick").unwrap(), 1);
    assert_eq!(ctx.release_texture("brick").unwrap(), 0);
    assert!(ctx.textures.get("brick").is_none());
    assert_eq!(recorder.live_textures(), live_before);

    assert!(matches!(
        ctx.acquire_texture("no_such_texture", true),
        Err(RegistryError::Load { .. })
    ));
    ctx.shutdown();
}

#[test]
fn cube_textures_need_six_faces_of_one_size() {
    let root = temp_asset_root("cube");
    for face in ["_r", "_l", "_u", "_d", "_f", "_b"] {
        write_png(&root, &format!("sky{face}"), 4, 4, [90, 140, 255, 255]);
        let size = if face == "_d" { 2 } else { 4 };
        write_png(&root, &format!("broken{face}"), size, size, [0, 0, 0, 255]);
    }
    let (mut ctx, _recorder) = headless_context_in(&root);

    let sky = ctx
        .textures
        .acquire_cube(&mut ctx.renderer, &ctx.assets, "sky", true)
        .unwrap();
    assert_eq!(sky.kind, TextureType::Cube);
    assert_eq!((sky.width, sky.height), (4, 4));

    let err = ctx
        .textures
        .acquire_cube(&mut ctx.renderer, &ctx.assets, "broken", true)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Load { .. }));
    assert!(ctx.textures.get("broken").is_none());
    ctx.shutdown();
}

#[test]
fn materials_hold_a_shader_instance_while_referenced() {
    let (mut ctx, recorder) = headless_context();
    let instances = recorder.instance_count(BUILTIN_MATERIAL_SHADER);

    let wood = ctx.acquire_material("crate_wood").unwrap();
    ctx.acquire_material("crate_wood").unwrap();
    assert_eq!(ctx.materials.ref_count("crate_wood"), Some(2));
    assert_eq!(wood.shininess, 16.0);
    assert_eq!(wood.diffuse_map.usage, TextureUse::Diffuse);
    assert_eq!(
        wood.diffuse_map.texture.as_ref().unwrap().name,
        DEFAULT_DIFFUSE_TEXTURE_NAME
    );
    assert_eq!(recorder.instance_count(BUILTIN_MATERIAL_SHADER), instances + 1);

    ctx.release_material("crate_wood").unwrap();
    assert_eq!(ctx.release_material("crate_wood").unwrap(), 0);
    assert!(ctx.materials.get("crate_wood").is_none());
    assert_eq!(recorder.instance_count(BUILTIN_MATERIAL_SHADER), instances);

    let default = ctx.acquire_material(DEFAULT_MATERIAL_NAME).unwrap();
    assert_eq!(default.diffuse_colour.x, 1.0);
    assert!(matches!(
        ctx.acquire_material("missing_material"),
        Err(RegistryError::Load { .. })
    ));
    ctx.shutdown();
}

#[test]
fn material_with_unknown_shader_is_rejected() {
    let root = temp_asset_root("bad_shader");
    common::test_utils::write_file(
        &root,
        "materials/ghostly.amt",
        "name = ghostly\nshader = Shader.Does.Not.Exist\n",
    );
    let (mut ctx, _recorder) = headless_context_in(&root);
    assert!(ctx.acquire_material("ghostly").is_err());
    assert!(ctx.materials.get("ghostly").is_none());
    ctx.shutdown();
}

#[test]
fn generators_produce_centered_extents() {
    let cube = generate_cube_config(2.0, 4.0, 6.0, 1.0, 1.0, "box", "crate_wood");
    assert_eq!(cube.extents.min, Vector3::new(-1.0, -2.0, -3.0));
    assert_eq!(cube.extents.max, Vector3::new(1.0, 2.0, 3.0));
    assert_eq!(cube.vertices.len(), 24);
    assert_eq!(cube.indices.len(), 36);
    assert_eq!(cube.material_name.as_deref(), Some("crate_wood"));
    let Vertices::D3(vertices) = &cube.vertices else {
        panic!("cube should be 3D");
    };
    assert!(vertices.iter().all(|v| v.tangent != [0.0; 4]));

    let plane = generate_plane_config(10.0, 4.0, 2, 2, 1.0, 1.0, "", "");
    assert_eq!(plane.name, "default");
    assert_eq!(plane.material_name.as_deref(), Some(DEFAULT_MATERIAL_NAME));
    assert_eq!(plane.vertices.len(), 16);
    assert_eq!(plane.extents.min, Vector3::new(-5.0, -2.0, 0.0));
    assert_eq!(plane.extents.max, Vector3::new(5.0, 2.0, 0.0));

    // zero dimensions fall back to one
    let degenerate = generate_cube_config(0.0, 0.0, 0.0, 0.0, 0.0, "unit", "");
    assert_eq!(degenerate.extents.max, Vector3::new(0.5, 0.5, 0.5));
}

#[test]
fn geometry_lifecycle_reaches_the_backend() {
    let (mut ctx, recorder) = headless_context();
    recorder.clear_calls();

    let config = generate_cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "crate", "crate_wood");
    let geometry = ctx.acquire_geometry(&config, true).unwrap();
    assert_eq!(geometry.material.as_ref().unwrap().name, "crate_wood");
    assert_eq!(
        recorder.count(|c| matches!(c, HeadlessCall::GeometryCreate { vertex_count: 24, index_count: 36, .. })),
        1
    );

    // a second acquire shares the upload
    ctx.acquire_geometry(&config, true).unwrap();
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryCreate { .. })), 1);

    ctx.release_geometry("crate").unwrap();
    assert_eq!(ctx.release_geometry("crate").unwrap(), 0);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryDestroy(_))), 1);
    assert!(ctx.materials.get("crate_wood").is_none());
    ctx.shutdown();
}

#[test]
fn geometry_with_missing_material_is_not_kept() {
    let (mut ctx, recorder) = headless_context();
    recorder.clear_calls();

    let config = generate_cube_config(1.0, 1.0, 1.0, 1.0, 1.0, "orphan", "no_such_material");
    assert!(ctx.acquire_geometry(&config, true).is_err());
    assert!(ctx.geometries.get("orphan").is_none());
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryCreate { .. })), 1);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::GeometryDestroy(_))), 1);
    ctx.shutdown();
}

#[test]
fn shader_system_lays_out_uniforms_by_name() {
    let (mut ctx, _recorder) = headless_context();
    let id = ctx.shaders.get_id(BUILTIN_MATERIAL_SHADER).unwrap();
    for uniform in ["projection", "view", "diffuse_colour", "diffuse_texture", "model"] {
        assert!(ctx.shaders.uniform_index(id, uniform).is_some(), "missing {uniform}");
    }
    assert_eq!(ctx.shaders.uniform_index(id, "id_colour"), None);

    let path = Path::new(common::test_utils::ASSETS)
        .join("shaders")
        .join("Shader.Builtin.UI.shadercfg");
    let config = ShaderConfig::from_toml_str(&std::fs::read_to_string(&path).unwrap(), &path).unwrap();
    let err = ctx.shaders.create(&mut ctx.renderer, &config).unwrap_err();
    assert_eq!(err, ShaderError::Duplicate("Shader.Builtin.UI".to_string()));

    let mut orphan = config.clone();
    orphan.name = "Shader.Orphan".to_string();
    orphan.renderpass = "Renderpass.Nowhere".to_string();
    let err = ctx.shaders.create(&mut ctx.renderer, &orphan).unwrap_err();
    assert!(matches!(err, ShaderError::MissingRenderPass(pass) if pass == "Renderpass.Nowhere"));
    ctx.shutdown();
}
