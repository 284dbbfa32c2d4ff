//! Runtime shader description.
//!
//! These types are shared by the shader config loader, the shader system and the
//! backend contract. A [`Shader`] is created from a config and owns its uniform
//! and attribute layout; the compiled program lives in the backend.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{data_structures::texture::TextureMap, renderer::backend::BackendHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "f32")]
    Float32,
    #[serde(rename = "vec2")]
    Float32x2,
    #[serde(rename = "vec3")]
    Float32x3,
    #[serde(rename = "vec4")]
    Float32x4,
    #[serde(rename = "mat4")]
    Matrix4,
    #[serde(rename = "i8")]
    Int8,
    #[serde(rename = "u8")]
    UInt8,
    #[serde(rename = "i16")]
    Int16,
    #[serde(rename = "u16")]
    UInt16,
    #[serde(rename = "i32")]
    Int32,
    #[serde(rename = "u32")]
    UInt32,
}

impl AttributeType {
    pub fn size(self) -> u32 {
        match self {
            AttributeType::Float32 | AttributeType::Int32 | AttributeType::UInt32 => 4,
            AttributeType::Float32x2 => 8,
            AttributeType::Float32x3 => 12,
            AttributeType::Float32x4 => 16,
            AttributeType::Matrix4 => 64,
            AttributeType::Int8 | AttributeType::UInt8 => 1,
            AttributeType::Int16 | AttributeType::UInt16 => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UniformType {
    #[serde(rename = "f32")]
    Float32,
    #[serde(rename = "vec2")]
    Float32x2,
    #[serde(rename = "vec3")]
    Float32x3,
    #[serde(rename = "vec4")]
    Float32x4,
    #[serde(rename = "i8")]
    Int8,
    #[serde(rename = "u8")]
    UInt8,
    #[serde(rename = "i16")]
    Int16,
    #[serde(rename = "u16")]
    UInt16,
    #[serde(rename = "i32")]
    Int32,
    #[serde(rename = "u32")]
    UInt32,
    #[serde(rename = "mat4")]
    Matrix4,
    #[serde(rename = "samp", alias = "sampler")]
    Sampler,
    #[serde(rename = "custom")]
    Custom,
}

impl UniformType {
    pub fn size(self) -> u16 {
        match self {
            UniformType::Float32 | UniformType::Int32 | UniformType::UInt32 => 4,
            UniformType::Float32x2 => 8,
            UniformType::Float32x3 => 12,
            UniformType::Float32x4 => 16,
            UniformType::Int8 | UniformType::UInt8 => 1,
            UniformType::Int16 | UniformType::UInt16 => 2,
            UniformType::Matrix4 => 64,
            UniformType::Sampler | UniformType::Custom => 0,
        }
    }
}

/// How often a uniform changes: once per frame, per material instance, or per draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum ShaderScope {
    Global,
    Instance,
    Local,
}

impl TryFrom<u8> for ShaderScope {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShaderScope::Global),
            1 => Ok(ShaderScope::Instance),
            2 => Ok(ShaderScope::Local),
            other => Err(format!("invalid uniform scope {other}, expected 0, 1 or 2")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderState {
    NotCreated,
    Uninitialized,
    Initialized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderAttribute {
    pub name: String,
    pub kind: AttributeType,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderUniform {
    pub name: String,
    pub index: u16,
    pub kind: UniformType,
    pub scope: ShaderScope,
    /// Byte offset in its scope's block, or texture slot for samplers.
    pub offset: u64,
    pub location: u16,
    pub size: u16,
}

#[derive(Debug, Clone)]
pub struct Shader {
    pub id: u32,
    pub name: String,
    pub cull_mode: CullMode,
    pub stages: Vec<ShaderStage>,
    pub stage_files: Vec<String>,
    pub use_instances: bool,
    pub use_locals: bool,
    pub attributes: Vec<ShaderAttribute>,
    pub attribute_stride: u32,
    pub uniforms: Vec<ShaderUniform>,
    pub uniform_lookup: HashMap<String, u16>,
    /// Samplers at global scope, defaulted to the default texture.
    pub global_texture_maps: Vec<TextureMap>,
    pub instance_texture_count: usize,
    pub global_ubo_size: u64,
    pub ubo_size: u64,
    pub push_constant_size: u64,
    pub bound_scope: ShaderScope,
    pub bound_instance_id: Option<u32>,
    /// Frame in which the global uniforms were last applied.
    pub render_frame_number: u64,
    pub state: ShaderState,
    pub handle: Option<BackendHandle>,
}

impl Shader {
    pub fn uniform(&self, name: &str) -> Option<&ShaderUniform> {
        self.uniform_lookup
            .get(name)
            .and_then(|&i| self.uniforms.get(i as usize))
    }
}
