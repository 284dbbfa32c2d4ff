use std::path::Path;

use crate::{
    data_structures::texture::pixels_have_transparency,
    error::LoaderError,
    resources::{LoadParams, Resource, ResourceData, ResourceLoader, ResourceType, read_file},
};

/// File extensions tried, in order, when looking an image up by name.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["tga", "png", "jpg", "jpeg", "bmp"];

/// Decoded image, always four channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn has_transparency(&self) -> bool {
        pixels_have_transparency(&self.pixels)
    }
}

pub fn decode(bytes: &[u8], path: &Path, flip_y: bool) -> Result<ImageData, LoaderError> {
    let format = image::ImageFormat::from_path(path).ok();
    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|source| LoaderError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = if flip_y { decoded.flipv() } else { decoded };
    let rgba = decoded.to_rgba8();
    Ok(ImageData {
        width: rgba.width(),
        height: rgba.height(),
        channel_count: 4,
        pixels: rgba.into_raw(),
    })
}

pub struct ImageLoader;

impl ResourceLoader for ImageLoader {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Image
    }

    fn load(&self, path: &Path, name: &str, params: LoadParams) -> Result<Resource, LoaderError> {
        let bytes = read_file(path)?;
        let image = decode(&bytes, path, params.flip_y)?;
        Ok(Resource {
            name: name.to_string(),
            full_path: path.to_path_buf(),
            data_size: image.pixels.len(),
            data: ResourceData::Image(image),
        })
    }
}
