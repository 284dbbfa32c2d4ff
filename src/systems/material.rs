//! Material system.
//!
//! Materials are loaded from `.amt` files or built from a [`MaterialConfig`], share
//! their textures through the texture system and own one instance slot in their
//! shader. The `apply_*` functions write the uniforms of the three scopes:
//!
//! - global: `projection`, `view` and, on the material shader, `ambient_colour`,
//!   `view_position` and `mode`. Applied once per shader per frame.
//! - instance: `diffuse_colour`, the texture samplers and `shininess`
//! - local: `model`

use std::sync::{
    Arc,
    atomic::{AtomicU32, AtomicU64, Ordering},
};

use anyhow::{anyhow, bail};
use cgmath::{Matrix4, Vector3, Vector4};

use crate::{
    assets::AssetManager,
    data_structures::{
        material::{Material, NEVER_RENDERED},
        texture::{Texture, TextureMap, TextureUse},
    },
    error::{RegistryError, ShaderError},
    renderer::{Renderer, backend::UniformValue},
    resources::{
        LoadParams, ResourceData, ResourceType, material::MaterialConfig,
        registry::ReferenceRegistry,
    },
    systems::{shader::ShaderSystem, texture::TextureSystem},
    views::RenderMode,
};

pub const DEFAULT_MATERIAL_NAME: &str = "default";
pub const BUILTIN_MATERIAL_SHADER: &str = "Shader.Builtin.Material";
pub const BUILTIN_UI_SHADER: &str = "Shader.Builtin.UI";

/// Shader id of a material whose shader was not available.
pub const NO_SHADER: u32 = u32::MAX;

/// The systems a material load or release reaches into.
pub struct MaterialDeps<'a> {
    pub renderer: &'a mut Renderer,
    pub shaders: &'a mut ShaderSystem,
    pub textures: &'a TextureSystem,
    pub assets: &'a AssetManager,
}

pub struct MaterialSystem {
    max_material_count: usize,
    registry: ReferenceRegistry<Material>,
    default_material: Arc<Material>,
    next_id: AtomicU32,
}

impl MaterialSystem {
    /// Builds the default material on the built-in material shader. Without that
    /// shader the default material has no instance and every draw using it is skipped.
    pub fn new(
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        textures: &TextureSystem,
        max_material_count: usize,
    ) -> anyhow::Result<Self> {
        if max_material_count == 0 {
            bail!("material system needs room for at least one material");
        }
        let diffuse_map = TextureMap::new(TextureUse::Diffuse, Some(textures.default_texture()));
        let specular_map =
            TextureMap::new(TextureUse::Specular, Some(textures.default_specular()));
        let normal_map = TextureMap::new(TextureUse::Normal, Some(textures.default_normal()));

        let (shader_id, instance_id) = match shaders.get_id(BUILTIN_MATERIAL_SHADER) {
            Some(id) => {
                let maps = [diffuse_map.clone(), specular_map.clone(), normal_map.clone()];
                let instance = shaders.acquire_instance_resources(renderer, id, &maps)?;
                (id, Some(instance))
            }
            None => {
                log::warn!(
                    "shader '{BUILTIN_MATERIAL_SHADER}' is not loaded, the default material cannot be drawn"
                );
                (NO_SHADER, None)
            }
        };

        let default_material = Arc::new(Material {
            id: 0,
            name: DEFAULT_MATERIAL_NAME.to_string(),
            diffuse_colour: Vector4::new(1.0, 1.0, 1.0, 1.0),
            diffuse_map,
            specular_map,
            normal_map,
            shininess: 8.0,
            shader_id,
            instance_id,
            render_frame_number: AtomicU64::new(NEVER_RENDERED),
        });
        Ok(Self {
            max_material_count,
            registry: ReferenceRegistry::new(),
            default_material,
            next_id: AtomicU32::new(1),
        })
    }

    pub fn default_material(&self) -> Arc<Material> {
        Arc::clone(&self.default_material)
    }

    /// Returns the material `name`, loading `materials/<name>.amt` on first use.
    pub fn acquire(
        &self,
        deps: MaterialDeps<'_>,
        name: &str,
    ) -> Result<Arc<Material>, RegistryError> {
        if name == DEFAULT_MATERIAL_NAME {
            return Ok(self.default_material());
        }
        if self.registry.contains(name) {
            return self.registry.acquire(name, false, || {
                Err(anyhow!("material '{name}' was unloaded while being acquired"))
            });
        }
        let resource = deps
            .assets
            .load(name, ResourceType::Material, LoadParams::default())
            .map_err(|e| RegistryError::Load {
                name: name.to_string(),
                source: e.into(),
            })?;
        let config = match resource.data {
            ResourceData::Material(config) => config,
            other => {
                return Err(RegistryError::Load {
                    name: name.to_string(),
                    source: anyhow!("loaded as {:?}, expected a material", other.kind()),
                });
            }
        };
        self.acquire_from_config(deps, config)
    }

    pub fn acquire_from_config(
        &self,
        deps: MaterialDeps<'_>,
        config: MaterialConfig,
    ) -> Result<Arc<Material>, RegistryError> {
        if config.name == DEFAULT_MATERIAL_NAME {
            return Ok(self.default_material());
        }
        if !self.registry.contains(&config.name) && self.registry.len() >= self.max_material_count
        {
            return Err(RegistryError::Load {
                name: config.name.clone(),
                source: anyhow!("material system is full ({} materials)", self.max_material_count),
            });
        }
        let name = config.name.clone();
        let auto_release = config.auto_release;
        let id = &self.next_id;
        self.registry
            .acquire(&name, auto_release, move || load_material(deps, config, id))
    }

    /// Drops one reference. At zero an auto-release material gives back its
    /// textures and its shader instance.
    pub fn release(&self, deps: MaterialDeps<'_>, name: &str) -> Result<u64, RegistryError> {
        if name == DEFAULT_MATERIAL_NAME {
            return Ok(0);
        }
        let MaterialDeps {
            renderer,
            shaders,
            textures,
            ..
        } = deps;
        self.registry.release(name, |material| {
            unload_material(renderer, shaders, textures, &material);
            log::debug!("material '{name}' unloaded");
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Material>> {
        if name == DEFAULT_MATERIAL_NAME {
            return Some(self.default_material());
        }
        self.registry.get(name)
    }

    pub fn ref_count(&self, name: &str) -> Option<u64> {
        self.registry.ref_count(name)
    }

    /// Writes the per-frame uniforms of `shader_id`. Does nothing if they were
    /// already applied in `frame_number`.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_global(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        shader_id: u32,
        frame_number: u64,
        projection: Matrix4<f32>,
        view: Matrix4<f32>,
        ambient_colour: Vector4<f32>,
        view_position: Vector3<f32>,
        mode: RenderMode,
    ) -> Result<(), ShaderError> {
        let shader = shaders
            .get_by_id(shader_id)
            .ok_or(ShaderError::InvalidId(shader_id))?;
        if shader.render_frame_number == frame_number {
            return Ok(());
        }
        let has_lighting = shader.uniform("ambient_colour").is_some();
        shaders.use_by_id(renderer, shader_id)?;
        shaders.set_uniform(renderer, "projection", projection.into())?;
        shaders.set_uniform(renderer, "view", view.into())?;
        if has_lighting {
            shaders.set_uniform(renderer, "ambient_colour", ambient_colour.into())?;
            shaders.set_uniform(renderer, "view_position", view_position.into())?;
            shaders.set_uniform(renderer, "mode", UniformValue::U32(mode as u32))?;
        }
        shaders.apply_global(renderer)?;
        if let Some(shader) = shaders.get_by_id_mut(shader_id) {
            shader.render_frame_number = frame_number;
        }
        Ok(())
    }

    /// Binds the material's instance and, when `needs_update`, rewrites its uniforms.
    pub fn apply_instance(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        material: &Material,
        needs_update: bool,
    ) -> Result<(), ShaderError> {
        let instance_id = material
            .instance_id
            .ok_or_else(|| ShaderError::NotInitialized(format!("material '{}'", material.name)))?;
        shaders.use_by_id(renderer, material.shader_id)?;
        shaders.bind_instance(renderer, instance_id)?;
        if needs_update {
            let shader = shaders
                .get_by_id(material.shader_id)
                .ok_or(ShaderError::InvalidId(material.shader_id))?;
            let has_specular = shader.uniform("specular_texture").is_some();
            shaders.set_uniform(renderer, "diffuse_colour", material.diffuse_colour.into())?;
            shaders.set_uniform(
                renderer,
                "diffuse_texture",
                UniformValue::Sampler(material.diffuse_map.texture_handle()),
            )?;
            if has_specular {
                shaders.set_uniform(
                    renderer,
                    "specular_texture",
                    UniformValue::Sampler(material.specular_map.texture_handle()),
                )?;
                shaders.set_uniform(
                    renderer,
                    "normal_texture",
                    UniformValue::Sampler(material.normal_map.texture_handle()),
                )?;
                shaders.set_uniform(renderer, "shininess", material.shininess.into())?;
            }
        }
        shaders.apply_instance(renderer, needs_update)
    }

    pub fn apply_local(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        model: Matrix4<f32>,
    ) -> Result<(), ShaderError> {
        shaders.set_uniform(renderer, "model", model.into())
    }

    pub fn shutdown(&self, renderer: &mut Renderer, shaders: &mut ShaderSystem, textures: &TextureSystem) {
        for (_, material) in self.registry.drain() {
            unload_material(renderer, shaders, textures, &material);
        }
        if let Some(instance) = self.default_material.instance_id {
            if let Err(e) =
                shaders.release_instance_resources(renderer, self.default_material.shader_id, instance)
            {
                log::warn!("releasing the default material instance failed: {e}");
            }
        }
    }
}

fn load_material(
    deps: MaterialDeps<'_>,
    config: MaterialConfig,
    next_id: &AtomicU32,
) -> anyhow::Result<Material> {
    let MaterialDeps {
        renderer,
        shaders,
        textures,
        assets,
    } = deps;
    let shader_id = shaders
        .get_id(&config.shader_name)
        .ok_or_else(|| anyhow!("material '{}' uses unknown shader '{}'", config.name, config.shader_name))?;

    let mut map = |usage: TextureUse, name: &Option<String>, fallback: Arc<Texture>| -> TextureMap {
        let texture = match name {
            Some(name) => match textures.acquire(renderer, assets, name, true) {
                Ok(texture) => texture,
                Err(e) => {
                    log::warn!(
                        "material '{}': texture '{name}' unavailable ({e}), using '{}'",
                        config.name,
                        fallback.name
                    );
                    fallback
                }
            },
            None => fallback,
        };
        TextureMap::new(usage, Some(texture))
    };
    let diffuse_map = map(
        TextureUse::Diffuse,
        &config.diffuse_map_name,
        textures.default_diffuse(),
    );
    let specular_map = map(
        TextureUse::Specular,
        &config.specular_map_name,
        textures.default_specular(),
    );
    let normal_map = map(
        TextureUse::Normal,
        &config.normal_map_name,
        textures.default_normal(),
    );

    let maps = [diffuse_map.clone(), specular_map.clone(), normal_map.clone()];
    let instance_id = match shaders.acquire_instance_resources(renderer, shader_id, &maps) {
        Ok(id) => id,
        Err(e) => {
            for map in &maps {
                release_map(renderer, textures, map);
            }
            return Err(anyhow!("acquiring shader instance for '{}': {e}", config.name));
        }
    };

    log::debug!("material '{}' created on shader '{}'", config.name, config.shader_name);
    Ok(Material {
        id: next_id.fetch_add(1, Ordering::Relaxed),
        name: config.name,
        diffuse_colour: config.diffuse_colour,
        diffuse_map,
        specular_map,
        normal_map,
        shininess: config.shininess,
        shader_id,
        instance_id: Some(instance_id),
        render_frame_number: AtomicU64::new(NEVER_RENDERED),
    })
}

fn release_map(renderer: &mut Renderer, textures: &TextureSystem, map: &TextureMap) {
    if let Some(texture) = &map.texture {
        if let Err(e) = textures.release(renderer, &texture.name) {
            log::warn!("releasing texture '{}': {e}", texture.name);
        }
    }
}

fn unload_material(
    renderer: &mut Renderer,
    shaders: &mut ShaderSystem,
    textures: &TextureSystem,
    material: &Material,
) {
    for map in [&material.diffuse_map, &material.specular_map, &material.normal_map] {
        release_map(renderer, textures, map);
    }
    if let Some(instance) = material.instance_id {
        if let Err(e) = shaders.release_instance_resources(renderer, material.shader_id, instance) {
            log::warn!("releasing instance of material '{}': {e}", material.name);
        }
    }
}
