//! `key=value` material files (`.amt`).
//!
//! ```text
//! # a brick wall
//! name = wall
//! shader = Shader.Builtin.Material
//! diffuse_colour = 1.0 1.0 1.0 1.0
//! shininess = 32.0
//! diffuse_map_name = wall_DIFF
//! autorelease = true
//! ```

use std::path::Path;

use cgmath::Vector4;

use crate::{
    error::LoaderError,
    resources::{LoadParams, Resource, ResourceData, ResourceLoader, ResourceType, read_text},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialConfig {
    pub name: String,
    pub shader_name: String,
    pub auto_release: bool,
    pub diffuse_colour: Vector4<f32>,
    pub shininess: f32,
    pub diffuse_map_name: Option<String>,
    pub specular_map_name: Option<String>,
    pub normal_map_name: Option<String>,
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shader_name: String::new(),
            auto_release: false,
            diffuse_colour: Vector4::new(1.0, 1.0, 1.0, 1.0),
            shininess: 32.0,
            diffuse_map_name: None,
            specular_map_name: None,
            normal_map_name: None,
        }
    }
}

impl MaterialConfig {
    pub fn parse(source: &str, path: &Path) -> Result<Self, LoaderError> {
        let invalid = |message: String| LoaderError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let mut config = MaterialConfig::default();
        for (number, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("{}:{}: skipping line without '='", path.display(), number + 1);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "name" => config.name = value.to_string(),
                "shader" => config.shader_name = value.to_string(),
                "diffuse_colour" => {
                    let parts = value
                        .split_whitespace()
                        .map(|v| v.parse::<f32>())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| invalid(format!("diffuse_colour '{value}': {e}")))?;
                    let [r, g, b, a] = parts[..] else {
                        return Err(invalid(format!(
                            "diffuse_colour needs 4 values, got {}",
                            parts.len()
                        )));
                    };
                    config.diffuse_colour = Vector4::new(r, g, b, a);
                }
                "shininess" => {
                    config.shininess = value
                        .parse()
                        .map_err(|e| invalid(format!("shininess '{value}': {e}")))?;
                }
                "diffuse_map_name" => config.diffuse_map_name = Some(value.to_string()),
                "specular_map_name" => config.specular_map_name = Some(value.to_string()),
                "normal_map_name" => config.normal_map_name = Some(value.to_string()),
                "autorelease" => {
                    config.auto_release = value
                        .parse()
                        .map_err(|e| invalid(format!("autorelease '{value}': {e}")))?;
                }
                other => log::warn!(
                    "{}:{}: unknown material key '{other}', skipping",
                    path.display(),
                    number + 1
                ),
            }
        }
        config.validate(path)?;
        Ok(config)
    }

    pub fn validate(&self, path: &Path) -> Result<(), LoaderError> {
        let invalid = |message: &str| {
            Err(LoaderError::Invalid {
                path: path.to_path_buf(),
                message: message.to_string(),
            })
        };
        if self.name.is_empty() {
            return invalid("material name is required");
        }
        if self.shader_name.is_empty() {
            return invalid("shader name is required");
        }
        let c = self.diffuse_colour;
        if [c.x, c.y, c.z, c.w].iter().any(|v| !(0.0..=1.0).contains(v)) {
            return invalid("diffuse_colour values must be between 0.0 and 1.0");
        }
        if !self.shininess.is_finite() || self.shininess < 0.0 {
            return invalid("shininess must be a finite, non-negative number");
        }
        for map in [
            &self.diffuse_map_name,
            &self.specular_map_name,
            &self.normal_map_name,
        ] {
            if map.as_deref() == Some("") {
                return invalid("texture map names must not be empty");
            }
        }
        Ok(())
    }
}

pub struct MaterialLoader;

impl ResourceLoader for MaterialLoader {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Material
    }

    fn load(&self, path: &Path, _name: &str, _params: LoadParams) -> Result<Resource, LoaderError> {
        let source = read_text(path)?;
        let config = MaterialConfig::parse(&source, path)?;
        Ok(Resource {
            name: config.name.clone(),
            full_path: path.to_path_buf(),
            data_size: source.len(),
            data: ResourceData::Material(config),
        })
    }
}
