//! Shader system.
//!
//! Builds [`Shader`]s from configs, lays out their uniforms per scope and keeps
//! track of the shader in use. Uniform writes always target the current shader.
//! Writing a uniform whose scope differs from the bound scope rebinds the globals
//! or the bound instance first.

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::SystemLimits,
    data_structures::{
        shader::{
            Shader, ShaderAttribute, ShaderScope, ShaderState, ShaderUniform, UniformType,
        },
        texture::{Texture, TextureMap, TextureUse},
    },
    error::ShaderError,
    renderer::{
        Renderer,
        backend::{ShaderDesc, UniformValue},
    },
    resources::shader::{ShaderConfig, ShaderUniformConfig},
};

#[derive(Debug, Clone, Copy)]
pub struct ShaderSystemConfig {
    pub max_shader_count: usize,
    pub max_uniform_count: usize,
    pub max_global_textures: usize,
    pub max_instance_textures: usize,
}

impl From<&SystemLimits> for ShaderSystemConfig {
    fn from(limits: &SystemLimits) -> Self {
        Self {
            max_shader_count: limits.max_shader_count,
            max_uniform_count: limits.max_uniform_count,
            max_global_textures: limits.max_global_textures,
            max_instance_textures: limits.max_instance_textures,
        }
    }
}

pub struct ShaderSystem {
    config: ShaderSystemConfig,
    shaders: Vec<Option<Shader>>,
    lookup: HashMap<String, u32>,
    current_shader_id: Option<u32>,
    default_texture: Option<Arc<Texture>>,
}

impl ShaderSystem {
    pub fn new(
        config: ShaderSystemConfig,
        default_texture: Option<Arc<Texture>>,
    ) -> Result<Self, ShaderError> {
        if config.max_shader_count == 0 {
            return Err(ShaderError::Capacity(0));
        }
        if config.max_shader_count < 512 {
            log::warn!(
                "shader system configured for only {} shaders, at least 512 is recommended",
                config.max_shader_count
            );
        }
        Ok(Self {
            config,
            shaders: Vec::new(),
            lookup: HashMap::new(),
            current_shader_id: None,
            default_texture,
        })
    }

    /// Creates and initializes a shader for the render pass named in `config`.
    pub fn create(
        &mut self,
        renderer: &mut Renderer,
        config: &ShaderConfig,
    ) -> Result<u32, ShaderError> {
        if config.name.is_empty() {
            return Err(ShaderError::EmptyName);
        }
        if self.lookup.contains_key(&config.name) {
            return Err(ShaderError::Duplicate(config.name.clone()));
        }
        let pass_id = renderer
            .renderpass_id(&config.renderpass)
            .ok_or_else(|| ShaderError::MissingRenderPass(config.renderpass.clone()))?;
        let pass_handle = renderer
            .renderpass(pass_id)
            .map(|p| p.handle)
            .ok_or_else(|| ShaderError::MissingRenderPass(config.renderpass.clone()))?;
        let id = self.free_slot()?;

        let mut shader = Shader {
            id,
            name: config.name.clone(),
            cull_mode: config.cull_mode,
            stages: config.stages.clone(),
            stage_files: config.stage_files.clone(),
            use_instances: config.use_instance,
            use_locals: config.use_local,
            attributes: Vec::new(),
            attribute_stride: 0,
            uniforms: Vec::new(),
            uniform_lookup: HashMap::new(),
            global_texture_maps: Vec::new(),
            instance_texture_count: 0,
            global_ubo_size: 0,
            ubo_size: 0,
            push_constant_size: 0,
            bound_scope: ShaderScope::Global,
            bound_instance_id: None,
            render_frame_number: u64::MAX,
            state: ShaderState::NotCreated,
            handle: None,
        };

        for attribute in &config.attributes {
            let size = attribute.kind.size();
            shader.attribute_stride += size;
            shader.attributes.push(ShaderAttribute {
                name: attribute.name.clone(),
                kind: attribute.kind,
                size,
            });
        }
        for uniform in &config.uniforms {
            if uniform.kind == UniformType::Sampler {
                self.add_sampler(renderer, &mut shader, uniform)?;
            } else {
                self.add_uniform(&mut shader, uniform, uniform.kind.size(), None)?;
            }
        }

        let handle = renderer.backend_mut().shader_create(
            &ShaderDesc {
                name: &shader.name,
                cull_mode: shader.cull_mode,
                stages: &shader.stages,
                stage_files: &shader.stage_files,
                attributes: &shader.attributes,
                uniforms: &shader.uniforms,
                global_texture_count: shader.global_texture_maps.len(),
                instance_texture_count: shader.instance_texture_count,
                use_instances: shader.use_instances,
                use_locals: shader.use_locals,
            },
            pass_handle,
        )?;
        shader.handle = Some(handle);
        shader.state = ShaderState::Uninitialized;
        if let Err(e) = renderer.backend_mut().shader_initialize(handle) {
            log::error!("initializing shader '{}' failed: {e}", shader.name);
            renderer.backend_mut().shader_destroy(handle);
            return Err(e.into());
        }
        shader.state = ShaderState::Initialized;

        log::debug!(
            "created shader '{}' ({} uniforms, {} attributes)",
            shader.name,
            shader.uniforms.len(),
            shader.attributes.len()
        );
        self.lookup.insert(shader.name.clone(), id);
        let slot = id as usize;
        if slot == self.shaders.len() {
            self.shaders.push(Some(shader));
        } else {
            self.shaders[slot] = Some(shader);
        }
        Ok(id)
    }

    fn free_slot(&self) -> Result<u32, ShaderError> {
        if let Some(pos) = self.shaders.iter().position(Option::is_none) {
            return Ok(pos as u32);
        }
        if self.shaders.len() >= self.config.max_shader_count {
            return Err(ShaderError::Capacity(self.config.max_shader_count));
        }
        Ok(self.shaders.len() as u32)
    }

    fn add_sampler(
        &self,
        renderer: &mut Renderer,
        shader: &mut Shader,
        config: &ShaderUniformConfig,
    ) -> Result<(), ShaderError> {
        let location = match config.scope {
            ShaderScope::Local => return Err(ShaderError::LocalSampler(config.name.clone())),
            ShaderScope::Global => {
                if shader.global_texture_maps.len() + 1 > self.config.max_global_textures {
                    return Err(ShaderError::TooManyTextures {
                        scope: "global",
                        limit: self.config.max_global_textures,
                    });
                }
                let mut map = TextureMap::new(TextureUse::Unknown, self.default_texture.clone());
                map.handle = Some(renderer.backend_mut().texture_map_acquire_resources(&map)?);
                shader.global_texture_maps.push(map);
                shader.global_texture_maps.len() - 1
            }
            ShaderScope::Instance => {
                if shader.instance_texture_count + 1 > self.config.max_instance_textures {
                    return Err(ShaderError::TooManyTextures {
                        scope: "instance",
                        limit: self.config.max_instance_textures,
                    });
                }
                shader.instance_texture_count += 1;
                shader.instance_texture_count - 1
            }
        };
        self.add_uniform(shader, config, 0, Some(location as u16))
    }

    fn add_uniform(
        &self,
        shader: &mut Shader,
        config: &ShaderUniformConfig,
        size: u16,
        sampler_location: Option<u16>,
    ) -> Result<(), ShaderError> {
        if shader.uniform_lookup.contains_key(&config.name) {
            return Err(ShaderError::DuplicateUniform(config.name.clone()));
        }
        if shader.uniforms.len() + 1 > self.config.max_uniform_count {
            return Err(ShaderError::TooManyUniforms(self.config.max_uniform_count));
        }
        let index = shader.uniforms.len() as u16;
        let offset = match (config.scope, sampler_location) {
            (_, Some(_)) => 0,
            (ShaderScope::Global, None) => shader.global_ubo_size,
            (ShaderScope::Instance, None) => shader.ubo_size,
            // push constants are aligned to 4 bytes
            (ShaderScope::Local, None) => shader.push_constant_size.div_ceil(4) * 4,
        };
        let size = match config.scope {
            ShaderScope::Local => (size as u64).div_ceil(4) as u16 * 4,
            _ => size,
        };
        shader.uniforms.push(ShaderUniform {
            name: config.name.clone(),
            index,
            kind: config.kind,
            scope: config.scope,
            offset,
            location: sampler_location.unwrap_or(index),
            size,
        });
        shader.uniform_lookup.insert(config.name.clone(), index);
        if sampler_location.is_none() {
            match config.scope {
                ShaderScope::Global => shader.global_ubo_size += size as u64,
                ShaderScope::Instance => shader.ubo_size += size as u64,
                ShaderScope::Local => shader.push_constant_size = offset + size as u64,
            }
        }
        Ok(())
    }

    pub fn get_id(&self, name: &str) -> Option<u32> {
        self.lookup.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Shader> {
        self.get_id(name).and_then(|id| self.get_by_id(id))
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Shader> {
        self.shaders.get(id as usize).and_then(Option::as_ref)
    }

    pub fn get_by_id_mut(&mut self, id: u32) -> Option<&mut Shader> {
        self.shaders.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub fn current_shader_id(&self) -> Option<u32> {
        self.current_shader_id
    }

    pub fn use_by_name(&mut self, renderer: &mut Renderer, name: &str) -> Result<(), ShaderError> {
        let id = self
            .get_id(name)
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))?;
        self.use_by_id(renderer, id)
    }

    /// Makes `id` the current shader. Does nothing if it already is.
    pub fn use_by_id(&mut self, renderer: &mut Renderer, id: u32) -> Result<(), ShaderError> {
        if self.current_shader_id == Some(id) {
            return Ok(());
        }
        let shader = self.get_by_id_mut(id).ok_or(ShaderError::InvalidId(id))?;
        let handle = initialized_handle(shader)?;
        renderer.backend_mut().shader_use(handle)?;
        renderer.backend_mut().shader_bind_globals(handle)?;
        shader.bound_scope = ShaderScope::Global;
        self.current_shader_id = Some(id);
        Ok(())
    }

    /// Forgets the current shader so the next `use_by_id` binds again.
    pub fn reset_current(&mut self) {
        self.current_shader_id = None;
    }

    pub fn uniform_index(&self, shader_id: u32, name: &str) -> Option<u16> {
        self.get_by_id(shader_id)?.uniform_lookup.get(name).copied()
    }

    fn current_mut(&mut self) -> Result<&mut Shader, ShaderError> {
        let id = self
            .current_shader_id
            .ok_or_else(|| ShaderError::NotFound("<no shader in use>".to_string()))?;
        self.get_by_id_mut(id).ok_or(ShaderError::InvalidId(id))
    }

    pub fn set_uniform(
        &mut self,
        renderer: &mut Renderer,
        name: &str,
        value: UniformValue,
    ) -> Result<(), ShaderError> {
        let shader = self.current_mut()?;
        let index = shader
            .uniform_lookup
            .get(name)
            .copied()
            .ok_or_else(|| ShaderError::UnknownUniform {
                shader: shader.name.clone(),
                uniform: name.to_string(),
            })?;
        self.set_uniform_by_index(renderer, index, value)
    }

    pub fn set_uniform_by_index(
        &mut self,
        renderer: &mut Renderer,
        index: u16,
        value: UniformValue,
    ) -> Result<(), ShaderError> {
        let shader = self.current_mut()?;
        let handle = initialized_handle(shader)?;
        let uniform = shader
            .uniforms
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ShaderError::UnknownUniform {
                shader: shader.name.clone(),
                uniform: format!("#{index}"),
            })?;
        if (uniform.kind == UniformType::Sampler) != value.is_sampler() {
            return Err(ShaderError::TypeMismatch(uniform.name));
        }
        if shader.bound_scope != uniform.scope {
            match uniform.scope {
                ShaderScope::Global => renderer.backend_mut().shader_bind_globals(handle)?,
                ShaderScope::Instance => {
                    let instance = shader.bound_instance_id.unwrap_or(0);
                    renderer.backend_mut().shader_bind_instance(handle, instance)?
                }
                ShaderScope::Local => {}
            }
            shader.bound_scope = uniform.scope;
        }
        renderer
            .backend_mut()
            .shader_set_uniform(handle, &uniform, &value)?;
        Ok(())
    }

    pub fn set_sampler(
        &mut self,
        renderer: &mut Renderer,
        name: &str,
        texture: Option<&Texture>,
    ) -> Result<(), ShaderError> {
        let handle = texture.and_then(|t| t.handle);
        self.set_uniform(renderer, name, UniformValue::Sampler(handle))
    }

    pub fn apply_global(&mut self, renderer: &mut Renderer) -> Result<(), ShaderError> {
        let shader = self.current_mut()?;
        let handle = initialized_handle(shader)?;
        renderer.backend_mut().shader_apply_globals(handle)?;
        Ok(())
    }

    pub fn apply_instance(
        &mut self,
        renderer: &mut Renderer,
        needs_update: bool,
    ) -> Result<(), ShaderError> {
        let shader = self.current_mut()?;
        let handle = initialized_handle(shader)?;
        renderer
            .backend_mut()
            .shader_apply_instance(handle, needs_update)?;
        Ok(())
    }

    pub fn bind_instance(
        &mut self,
        renderer: &mut Renderer,
        instance_id: u32,
    ) -> Result<(), ShaderError> {
        let shader = self.current_mut()?;
        let handle = initialized_handle(shader)?;
        shader.bound_instance_id = Some(instance_id);
        renderer
            .backend_mut()
            .shader_bind_instance(handle, instance_id)?;
        shader.bound_scope = ShaderScope::Instance;
        Ok(())
    }

    pub fn acquire_instance_resources(
        &mut self,
        renderer: &mut Renderer,
        shader_id: u32,
        maps: &[TextureMap],
    ) -> Result<u32, ShaderError> {
        let shader = self
            .get_by_id(shader_id)
            .ok_or(ShaderError::InvalidId(shader_id))?;
        let handle = initialized_handle(shader)?;
        Ok(renderer
            .backend_mut()
            .shader_acquire_instance_resources(handle, maps)?)
    }

    pub fn release_instance_resources(
        &mut self,
        renderer: &mut Renderer,
        shader_id: u32,
        instance_id: u32,
    ) -> Result<(), ShaderError> {
        let shader = self
            .get_by_id(shader_id)
            .ok_or(ShaderError::InvalidId(shader_id))?;
        let handle = initialized_handle(shader)?;
        Ok(renderer
            .backend_mut()
            .shader_release_instance_resources(handle, instance_id)?)
    }

    pub fn destroy(&mut self, renderer: &mut Renderer, name: &str) -> Result<(), ShaderError> {
        let id = self
            .lookup
            .remove(name)
            .ok_or_else(|| ShaderError::NotFound(name.to_string()))?;
        if let Some(shader) = self.shaders.get_mut(id as usize).and_then(Option::take) {
            destroy_shader(renderer, shader);
        }
        if self.current_shader_id == Some(id) {
            self.current_shader_id = None;
        }
        Ok(())
    }

    pub fn shutdown(&mut self, renderer: &mut Renderer) {
        for shader in self.shaders.drain(..).flatten() {
            destroy_shader(renderer, shader);
        }
        self.lookup.clear();
        self.current_shader_id = None;
    }
}

fn initialized_handle(shader: &Shader) -> Result<crate::renderer::backend::BackendHandle, ShaderError> {
    match (shader.state, shader.handle) {
        (ShaderState::Initialized, Some(handle)) => Ok(handle),
        _ => Err(ShaderError::NotInitialized(shader.name.clone())),
    }
}

fn destroy_shader(renderer: &mut Renderer, shader: Shader) {
    for map in &shader.global_texture_maps {
        if let Some(handle) = map.handle {
            renderer.backend_mut().texture_map_release_resources(handle);
        }
    }
    if let Some(handle) = shader.handle {
        renderer.backend_mut().shader_destroy(handle);
    }
}
