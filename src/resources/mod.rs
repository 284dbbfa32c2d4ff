//! Loading resources from files.
//!
//! Each [`ResourceType`] has one [`ResourceLoader`] registered with the
//! [`crate::assets::AssetManager`]. A loader turns a file into a [`Resource`]
//! whose [`ResourceData`] variant matches the type it was asked for.
//!
//! - `registry` holds the reference-counted registry the resource systems share
//! - `binary` reads raw bytes and text
//! - `image` decodes images to RGBA8
//! - `material` parses `key=value` material files
//! - `shader` parses TOML shader configs

use std::path::{Path, PathBuf};

use crate::error::LoaderError;

pub mod binary;
pub mod image;
pub mod material;
pub mod registry;
pub mod shader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Text,
    Binary,
    Image,
    Material,
    Shader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadParams {
    /// Flip images vertically on decode so row 0 is the bottom row.
    pub flip_y: bool,
}

#[derive(Debug, Clone)]
pub enum ResourceData {
    Text(String),
    Binary(Vec<u8>),
    Image(self::image::ImageData),
    Material(self::material::MaterialConfig),
    Shader(self::shader::ShaderConfig),
}

impl ResourceData {
    pub fn kind(&self) -> ResourceType {
        match self {
            ResourceData::Text(_) => ResourceType::Text,
            ResourceData::Binary(_) => ResourceType::Binary,
            ResourceData::Image(_) => ResourceType::Image,
            ResourceData::Material(_) => ResourceType::Material,
            ResourceData::Shader(_) => ResourceType::Shader,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub full_path: PathBuf,
    pub data_size: usize,
    pub data: ResourceData,
}

/// Turns a file into a [`Resource`].
pub trait ResourceLoader: Send + Sync {
    fn resource_type(&self) -> ResourceType;

    fn load(&self, path: &Path, name: &str, params: LoadParams) -> Result<Resource, LoaderError>;

    /// Releases whatever the loader allocated for `resource`.
    fn unload(&self, resource: Resource) {
        drop(resource);
    }
}

pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, LoaderError> {
    std::fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_text(path: &Path) -> Result<String, LoaderError> {
    std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
