//! Textures and texture maps.
//!
//! [`Texture`] is the engine-side record of an image uploaded to the backend. A
//! [`TextureMap`] pairs a texture with the sampling state a material or skybox
//! uses to read it.

use std::sync::Arc;

use bitflags::bitflags;

use crate::renderer::backend::BackendHandle;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u8 {
        /// At least one pixel has an alpha below 255.
        const HAS_TRANSPARENCY = 0x1;
        /// Can be written to after creation (render attachments, pick buffers).
        const IS_WRITEABLE = 0x2;
        /// Created around a backend-owned image instead of loaded pixels.
        const IS_WRAPPED = 0x4;
        const DEPTH = 0x8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureType {
    #[default]
    D2,
    Cube,
}

#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub kind: TextureType,
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub flags: TextureFlags,
    pub handle: Option<BackendHandle>,
}

impl Texture {
    pub fn has_transparency(&self) -> bool {
        self.flags.contains(TextureFlags::HAS_TRANSPARENCY)
    }

    pub fn is_writeable(&self) -> bool {
        self.flags.contains(TextureFlags::IS_WRITEABLE)
    }
}

/// True when any RGBA pixel is not fully opaque.
pub fn pixels_have_transparency(pixels: &[u8]) -> bool {
    pixels.chunks_exact(4).any(|p| p[3] < 255)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureUse {
    #[default]
    Unknown,
    Diffuse,
    Specular,
    Normal,
    Cubemap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureRepeat {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

#[derive(Debug, Clone, Default)]
pub struct TextureMap {
    pub texture: Option<Arc<Texture>>,
    pub usage: TextureUse,
    pub filter_minify: TextureFilter,
    pub filter_magnify: TextureFilter,
    pub repeat_u: TextureRepeat,
    pub repeat_v: TextureRepeat,
    pub repeat_w: TextureRepeat,
    /// Sampler owned by the backend once resources were acquired.
    pub handle: Option<BackendHandle>,
}

impl TextureMap {
    pub fn new(usage: TextureUse, texture: Option<Arc<Texture>>) -> Self {
        Self {
            texture,
            usage,
            ..Default::default()
        }
    }

    pub fn texture_handle(&self) -> Option<BackendHandle> {
        self.texture.as_ref().and_then(|t| t.handle)
    }
}
