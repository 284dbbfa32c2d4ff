//! TOML shader configs.
//!
//! ```toml
//! version = "1.0"
//! name = "Shader.Builtin.UI"
//! renderpass = "Renderpass.Builtin.UI"
//! stages = ["vertex", "fragment"]
//! stagefiles = ["shaders/Builtin.UI.vert.spv", "shaders/Builtin.UI.frag.spv"]
//! use_instance = true
//! use_local = true
//!
//! [[attribute]]
//! type = "vec2"
//! name = "in_position"
//!
//! [[uniform]]
//! type = "mat4"
//! scope = 0
//! name = "projection"
//! ```

use std::{collections::HashSet, path::Path};

use serde::Deserialize;

use crate::{
    data_structures::shader::{AttributeType, CullMode, ShaderScope, ShaderStage, UniformType},
    error::LoaderError,
    resources::{LoadParams, Resource, ResourceData, ResourceLoader, ResourceType, read_text},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShaderAttributeConfig {
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShaderUniformConfig {
    #[serde(rename = "type")]
    pub kind: UniformType,
    pub scope: ShaderScope,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShaderConfig {
    #[serde(default)]
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub cull_mode: CullMode,
    pub renderpass: String,
    pub stages: Vec<ShaderStage>,
    #[serde(default, rename = "stagefiles")]
    pub stage_files: Vec<String>,
    #[serde(default)]
    pub use_instance: bool,
    #[serde(default)]
    pub use_local: bool,
    #[serde(default, rename = "attribute")]
    pub attributes: Vec<ShaderAttributeConfig>,
    #[serde(default, rename = "uniform")]
    pub uniforms: Vec<ShaderUniformConfig>,
}

impl ShaderConfig {
    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self, LoaderError> {
        let config: ShaderConfig = toml::from_str(source).map_err(|e| LoaderError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Attribute and uniform names must be unique within one shader.
    pub fn validate(&self, path: &Path) -> Result<(), LoaderError> {
        let mut seen = HashSet::new();
        for attribute in &self.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(LoaderError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("duplicate attribute name '{}'", attribute.name),
                });
            }
        }
        let mut seen = HashSet::new();
        for uniform in &self.uniforms {
            if !seen.insert(uniform.name.as_str()) {
                return Err(LoaderError::Invalid {
                    path: path.to_path_buf(),
                    message: format!("duplicate uniform name '{}'", uniform.name),
                });
            }
        }
        if self.stages.len() != self.stage_files.len() {
            log::warn!(
                "shader '{}' lists {} stages but {} stage files",
                self.name,
                self.stages.len(),
                self.stage_files.len()
            );
        }
        Ok(())
    }
}

pub struct ShaderLoader;

impl ResourceLoader for ShaderLoader {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Shader
    }

    fn load(&self, path: &Path, _name: &str, _params: LoadParams) -> Result<Resource, LoaderError> {
        let source = read_text(path)?;
        let config = ShaderConfig::from_toml_str(&source, path)?;
        Ok(Resource {
            name: config.name.clone(),
            full_path: path.to_path_buf(),
            data_size: source.len(),
            data: ResourceData::Shader(config),
        })
    }
}
