use std::{cell::RefCell, path::Path, rc::Rc, sync::Arc, thread, time::Duration};

use anima_ngin::{
    assets::{AssetManager, resource_type_for},
    data_structures::shader::{CullMode, ShaderScope, UniformType},
    error::{AssetError, LoaderError},
    jobs::JobSystem,
    resources::{
        LoadParams, ResourceData, ResourceType, material::MaterialConfig, shader::ShaderConfig,
    },
};

use crate::common::test_utils::{ASSETS, temp_asset_root, write_file, write_png};

mod common;

#[test]
fn material_parsing_skips_noise() {
    let source = "\
# comment
name = wall

shader = Shader.Builtin.Material
this line has no equals sign
diffuse_colour = 0.5 0.25 1.0 1.0
diffuse_map_name = wall_DIFF
sparkle = 11
autorelease = true
";
    let config = MaterialConfig::parse(source, Path::new("wall.amt")).unwrap();
    assert_eq!(config.name, "wall");
    assert_eq!(config.shader_name, "Shader.Builtin.Material");
    assert_eq!(config.diffuse_colour.y, 0.25);
    assert_eq!(config.diffuse_map_name.as_deref(), Some("wall_DIFF"));
    assert!(config.auto_release);
    assert_eq!(config.shininess, 32.0);
}

#[test]
fn material_colour_needs_four_components() {
    let source = "name = x\nshader = s\ndiffuse_colour = 1.0 1.0 1.0\n";
    let err = MaterialConfig::parse(source, Path::new("x.amt")).unwrap_err();
    assert!(matches!(err, LoaderError::Parse { .. }));

    let source = "name = x\nshader = s\nautorelease = maybe\n";
    assert!(MaterialConfig::parse(source, Path::new("x.amt")).is_err());
}

#[test]
fn material_shininess_must_be_a_real_non_negative_number() {
    for shininess in ["NaN", "inf", "-1.0"] {
        let source = format!("name = x\nshader = s\nshininess = {shininess}\n");
        let err = MaterialConfig::parse(&source, Path::new("x.amt")).unwrap_err();
        assert!(matches!(err, LoaderError::Invalid { .. }), "{shininess}: {err}");
    }

    let mut config = MaterialConfig::parse("name = x\nshader = s\n", Path::new("x.amt")).unwrap();
    config.shininess = f32::NAN;
    assert!(config.validate(Path::new("x.amt")).is_err());
    config.shininess = 0.0;
    assert!(config.validate(Path::new("x.amt")).is_ok());
}

#[test]
fn shipped_shader_configs_parse() {
    for name in [
        "Shader.Builtin.Material",
        "Shader.Builtin.UI",
        "Shader.Builtin.Skybox",
        "Shader.Builtin.WorldPick",
        "Shader.Builtin.UIPick",
    ] {
        let path = Path::new(ASSETS).join("shaders").join(format!("{name}.shadercfg"));
        let source = std::fs::read_to_string(&path).unwrap();
        let config = ShaderConfig::from_toml_str(&source, &path).unwrap();
        assert_eq!(config.name, name);
        assert!(config.uniforms.iter().any(|u| u.name == "projection"));
    }
}

#[test]
fn shader_config_fields_and_duplicates() {
    let source = r#"
name = "Shader.Test"
renderpass = "Renderpass.Test"
stages = ["vertex", "fragment"]
stagefiles = ["a.spv", "b.spv"]
cull_mode = "front_and_back"

[[uniform]]
type = "samp"
scope = 1
name = "diffuse_texture"
"#;
    let config = ShaderConfig::from_toml_str(source, Path::new("t.shadercfg")).unwrap();
    assert_eq!(config.cull_mode, CullMode::FrontAndBack);
    assert_eq!(config.uniforms[0].kind, UniformType::Sampler);
    assert_eq!(config.uniforms[0].scope, ShaderScope::Instance);

    let duplicated = format!("{source}\n[[uniform]]\ntype = \"vec4\"\nscope = 0\nname = \"diffuse_texture\"\n");
    let err = ShaderConfig::from_toml_str(&duplicated, Path::new("t.shadercfg")).unwrap_err();
    assert!(matches!(err, LoaderError::Invalid { .. }));

    let bad_scope = source.replace("scope = 1", "scope = 7");
    assert!(ShaderConfig::from_toml_str(&bad_scope, Path::new("t.shadercfg")).is_err());
}

#[test]
fn extensions_map_to_resource_types() {
    assert_eq!(resource_type_for(Path::new("a/b.shadercfg")), Some(ResourceType::Shader));
    assert_eq!(resource_type_for(Path::new("x.png")), Some(ResourceType::Image));
    assert_eq!(resource_type_for(Path::new("x.amt")), Some(ResourceType::Material));
    assert_eq!(resource_type_for(Path::new("x.txt")), Some(ResourceType::Text));
    assert_eq!(resource_type_for(Path::new("x.unknown")), None);
}

#[test]
fn manager_rejects_missing_root_and_duplicate_loaders() {
    let missing = std::env::temp_dir().join("anima-ngin-no-such-root");
    assert!(matches!(AssetManager::new(&missing), Err(AssetError::BadRoot(_))));

    let assets = AssetManager::new(ASSETS).unwrap();
    assert!(assets.asset_count() >= 5);
    let err = assets
        .register_loader(Arc::new(anima_ngin::resources::shader::ShaderLoader))
        .unwrap_err();
    assert!(matches!(err, AssetError::DuplicateLoader(ResourceType::Shader)));
}

#[test]
fn manager_loads_by_type_specific_paths() {
    let root = temp_asset_root("lookup");
    write_png(&root, "tile", 4, 2, [10, 20, 30, 128]);
    write_file(&root, "notes/readme.txt", "hello");
    let assets = AssetManager::new(&root).unwrap();

    let image = assets
        .load("tile", ResourceType::Image, LoadParams::default())
        .unwrap();
    let ResourceData::Image(data) = &image.data else {
        panic!("expected image data, got {:?}", image.data.kind());
    };
    assert_eq!((data.width, data.height, data.channel_count), (4, 2, 4));
    assert!(data.has_transparency());

    let material = assets
        .load("crate_wood", ResourceType::Material, LoadParams::default())
        .unwrap();
    assert_eq!(material.data.kind(), ResourceType::Material);

    let text = assets
        .load("notes/readme.txt", ResourceType::Text, LoadParams::default())
        .unwrap();
    assert!(matches!(&text.data, ResourceData::Text(t) if t == "hello"));

    let err = assets
        .load("missing", ResourceType::Material, LoadParams::default())
        .unwrap_err();
    assert!(matches!(err, AssetError::NotFound { .. }));
}

#[test]
fn files_added_after_the_scan_are_found() {
    let root = temp_asset_root("late");
    let assets = AssetManager::new(&root).unwrap();
    write_file(
        &root,
        "materials/late.amt",
        "name = late\nshader = Shader.Builtin.Material\n",
    );
    let resource = assets
        .load("late", ResourceType::Material, LoadParams::default())
        .unwrap();
    assert!(assets.asset_info("materials/late.amt").is_some());
    assets.unload(resource);
}

#[test]
fn async_loads_complete_through_the_job_system() {
    let assets = Arc::new(AssetManager::new(ASSETS).unwrap());
    let mut jobs = JobSystem::new(2, 8, true).unwrap();
    let loaded = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&loaded);

    assets
        .load_async(
            &mut jobs,
            "Shader.Builtin.UI",
            ResourceType::Shader,
            LoadParams::default(),
            move |result| *sink.borrow_mut() = Some(result.map(|r| r.name)),
        )
        .unwrap();

    for _ in 0..1000 {
        jobs.update();
        if loaded.borrow().is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    let name = loaded.borrow_mut().take().expect("load finished").unwrap();
    assert_eq!(name, "Shader.Builtin.UI");
}
