use std::path::Path;

use crate::{
    error::LoaderError,
    resources::{LoadParams, Resource, ResourceData, ResourceLoader, ResourceType, read_file, read_text},
};

pub struct BinaryLoader;

impl ResourceLoader for BinaryLoader {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Binary
    }

    fn load(&self, path: &Path, name: &str, _params: LoadParams) -> Result<Resource, LoaderError> {
        let bytes = read_file(path)?;
        Ok(Resource {
            name: name.to_string(),
            full_path: path.to_path_buf(),
            data_size: bytes.len(),
            data: ResourceData::Binary(bytes),
        })
    }
}

pub struct TextLoader;

impl ResourceLoader for TextLoader {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Text
    }

    fn load(&self, path: &Path, name: &str, _params: LoadParams) -> Result<Resource, LoaderError> {
        let text = read_text(path)?;
        Ok(Resource {
            name: name.to_string(),
            full_path: path.to_path_buf(),
            data_size: text.len(),
            data: ResourceData::Text(text),
        })
    }
}
