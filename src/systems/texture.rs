//! Texture system.
//!
//! Textures are acquired by name and shared through a [`ReferenceRegistry`]. The
//! four default textures are built in code at start-up so the engine has
//! something to bind before any asset is loaded; they are never reference counted.

use std::sync::Arc;

use anyhow::{Context as _, anyhow, bail};

use crate::{
    assets::AssetManager,
    data_structures::texture::{Texture, TextureFlags, TextureType, pixels_have_transparency},
    error::{BackendError, RegistryError},
    renderer::{
        Renderer,
        backend::{BackendHandle, TextureDesc},
    },
    resources::{
        LoadParams, ResourceData, ResourceType, image::ImageData, registry::ReferenceRegistry,
    },
};

pub const DEFAULT_TEXTURE_NAME: &str = "default";
pub const DEFAULT_DIFFUSE_TEXTURE_NAME: &str = "default_DIFF";
pub const DEFAULT_SPECULAR_TEXTURE_NAME: &str = "default_SPEC";
pub const DEFAULT_NORMAL_TEXTURE_NAME: &str = "default_NORM";

/// Face suffixes of a cube texture, in upload order.
pub const CUBE_FACES: [&str; 6] = ["_r", "_l", "_u", "_d", "_f", "_b"];

const DEFAULT_DIMENSION: u32 = 256;
const DEFAULT_MAP_DIMENSION: u32 = 16;

pub struct TextureSystem {
    max_texture_count: usize,
    registry: ReferenceRegistry<Texture>,
    default_texture: Arc<Texture>,
    default_diffuse: Arc<Texture>,
    default_specular: Arc<Texture>,
    default_normal: Arc<Texture>,
}

impl TextureSystem {
    pub fn new(renderer: &mut Renderer, max_texture_count: usize) -> anyhow::Result<Self> {
        if max_texture_count == 0 {
            bail!("texture system needs room for at least one texture");
        }

        // blue and white checkerboard
        let mut checker = vec![255u8; (DEFAULT_DIMENSION * DEFAULT_DIMENSION * 4) as usize];
        for row in 0..DEFAULT_DIMENSION {
            for col in 0..DEFAULT_DIMENSION {
                if row % 2 == col % 2 {
                    let i = ((row * DEFAULT_DIMENSION + col) * 4) as usize;
                    checker[i] = 0;
                    checker[i + 1] = 0;
                }
            }
        }
        let default_texture = create_default(renderer, DEFAULT_TEXTURE_NAME, DEFAULT_DIMENSION, &checker)?;

        let solid = |rgba: [u8; 4]| -> Vec<u8> {
            rgba.repeat((DEFAULT_MAP_DIMENSION * DEFAULT_MAP_DIMENSION) as usize)
        };
        let default_diffuse = create_default(
            renderer,
            DEFAULT_DIFFUSE_TEXTURE_NAME,
            DEFAULT_MAP_DIMENSION,
            &solid([255, 255, 255, 255]),
        )?;
        let default_specular = create_default(
            renderer,
            DEFAULT_SPECULAR_TEXTURE_NAME,
            DEFAULT_MAP_DIMENSION,
            &solid([0, 0, 0, 255]),
        )?;
        // z-up in tangent space
        let default_normal = create_default(
            renderer,
            DEFAULT_NORMAL_TEXTURE_NAME,
            DEFAULT_MAP_DIMENSION,
            &solid([128, 128, 255, 255]),
        )?;

        log::debug!("texture system created the default textures");
        Ok(Self {
            max_texture_count,
            registry: ReferenceRegistry::new(),
            default_texture,
            default_diffuse,
            default_specular,
            default_normal,
        })
    }

    pub fn default_texture(&self) -> Arc<Texture> {
        Arc::clone(&self.default_texture)
    }

    pub fn default_diffuse(&self) -> Arc<Texture> {
        Arc::clone(&self.default_diffuse)
    }

    pub fn default_specular(&self) -> Arc<Texture> {
        Arc::clone(&self.default_specular)
    }

    pub fn default_normal(&self) -> Arc<Texture> {
        Arc::clone(&self.default_normal)
    }

    fn is_default_name(name: &str) -> bool {
        matches!(
            name,
            DEFAULT_TEXTURE_NAME
                | DEFAULT_DIFFUSE_TEXTURE_NAME
                | DEFAULT_SPECULAR_TEXTURE_NAME
                | DEFAULT_NORMAL_TEXTURE_NAME
        )
    }

    fn default_by_name(&self, name: &str) -> Option<Arc<Texture>> {
        match name {
            DEFAULT_TEXTURE_NAME => Some(self.default_texture()),
            DEFAULT_DIFFUSE_TEXTURE_NAME => Some(self.default_diffuse()),
            DEFAULT_SPECULAR_TEXTURE_NAME => Some(self.default_specular()),
            DEFAULT_NORMAL_TEXTURE_NAME => Some(self.default_normal()),
            _ => None,
        }
    }

    fn check_capacity(&self, name: &str) -> Result<(), RegistryError> {
        if !self.registry.contains(name) && self.registry.len() >= self.max_texture_count {
            return Err(RegistryError::Load {
                name: name.to_string(),
                source: anyhow!("texture system is full ({} textures)", self.max_texture_count),
            });
        }
        Ok(())
    }

    /// Returns the 2D texture `name`, loading `textures/<name>.<ext>` on first use.
    pub fn acquire(
        &self,
        renderer: &mut Renderer,
        assets: &AssetManager,
        name: &str,
        auto_release: bool,
    ) -> Result<Arc<Texture>, RegistryError> {
        if let Some(texture) = self.default_by_name(name) {
            log::warn!("acquire called for default texture '{name}', use the default getters instead");
            return Ok(texture);
        }
        self.check_capacity(name)?;
        self.registry.acquire(name, auto_release, || {
            let image = load_image(assets, name, true)?;
            let mut flags = TextureFlags::empty();
            if image.has_transparency() {
                flags |= TextureFlags::HAS_TRANSPARENCY;
            }
            let desc = TextureDesc {
                name: name.to_string(),
                kind: TextureType::D2,
                width: image.width,
                height: image.height,
                channel_count: image.channel_count,
                flags,
            };
            let handle = renderer.backend_mut().texture_create(&desc, &image.pixels)?;
            log::debug!("loaded texture '{name}' ({}x{})", image.width, image.height);
            Ok(from_desc(desc, handle))
        })
    }

    /// Returns the cube texture assembled from `<name>_r`, `_l`, `_u`, `_d`, `_f`
    /// and `_b`. All six faces must share one size.
    pub fn acquire_cube(
        &self,
        renderer: &mut Renderer,
        assets: &AssetManager,
        name: &str,
        auto_release: bool,
    ) -> Result<Arc<Texture>, RegistryError> {
        if let Some(texture) = self.default_by_name(name) {
            log::warn!("acquire_cube called for default texture '{name}'");
            return Ok(texture);
        }
        self.check_capacity(name)?;
        self.registry.acquire(name, auto_release, || {
            let mut pixels = Vec::new();
            let mut size: Option<(u32, u32, u8)> = None;
            let mut flags = TextureFlags::empty();
            for face in CUBE_FACES {
                let face_name = format!("{name}{face}");
                let image = load_image(assets, &face_name, false)?;
                match size {
                    None => size = Some((image.width, image.height, image.channel_count)),
                    Some((w, h, _)) if (w, h) != (image.width, image.height) => {
                        bail!(
                            "cube face '{face_name}' is {}x{}, expected {w}x{h}",
                            image.width,
                            image.height
                        );
                    }
                    Some(_) => {}
                }
                if image.has_transparency() {
                    flags |= TextureFlags::HAS_TRANSPARENCY;
                }
                pixels.extend_from_slice(&image.pixels);
            }
            let (width, height, channel_count) =
                size.ok_or_else(|| anyhow!("cube texture '{name}' has no faces"))?;
            let desc = TextureDesc {
                name: name.to_string(),
                kind: TextureType::Cube,
                width,
                height,
                channel_count,
                flags,
            };
            let handle = renderer.backend_mut().texture_create(&desc, &pixels)?;
            Ok(from_desc(desc, handle))
        })
    }

    /// Registers a writeable texture under `name`. Never auto-released.
    pub fn acquire_writeable(
        &self,
        renderer: &mut Renderer,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        has_transparency: bool,
    ) -> Result<Arc<Texture>, RegistryError> {
        self.check_capacity(name)?;
        self.registry.acquire(name, false, || {
            Ok(create_writeable(renderer, name, width, height, channel_count, has_transparency, false)?)
        })
    }

    /// Wraps a texture the backend already owns. With `register` it can be
    /// acquired by name afterwards; it is never auto-released.
    #[allow(clippy::too_many_arguments)]
    pub fn wrap_internal(
        &self,
        name: &str,
        width: u32,
        height: u32,
        channel_count: u8,
        has_transparency: bool,
        is_writeable: bool,
        register: bool,
        handle: BackendHandle,
    ) -> Result<Arc<Texture>, RegistryError> {
        let mut flags = TextureFlags::IS_WRAPPED;
        flags.set(TextureFlags::HAS_TRANSPARENCY, has_transparency);
        flags.set(TextureFlags::IS_WRITEABLE, is_writeable);
        let texture = Texture {
            name: name.to_string(),
            kind: TextureType::D2,
            width,
            height,
            channel_count,
            flags,
            handle: Some(handle),
        };
        if register {
            self.check_capacity(name)?;
            self.registry.insert(name, false, texture)
        } else {
            Ok(Arc::new(texture))
        }
    }

    /// Drops one reference to `name`. Default textures are ignored.
    pub fn release(&self, renderer: &mut Renderer, name: &str) -> Result<u64, RegistryError> {
        if Self::is_default_name(name) {
            return Ok(0);
        }
        self.registry.release(name, |texture| {
            destroy(renderer, &texture);
            log::debug!("texture '{name}' unloaded");
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Texture>> {
        self.default_by_name(name).or_else(|| self.registry.get(name))
    }

    pub fn ref_count(&self, name: &str) -> Option<u64> {
        self.registry.ref_count(name)
    }

    pub fn loaded_count(&self) -> usize {
        self.registry.len()
    }

    /// Resizes a writeable texture the caller owns. Wrapped textures only get
    /// their recorded size updated.
    pub fn resize(
        renderer: &mut Renderer,
        texture: &mut Texture,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        if !texture.is_writeable() {
            log::warn!("resize called on texture '{}' which is not writeable", texture.name);
            return Err(BackendError::failed("texture_resize", "texture is not writeable"));
        }
        texture.width = width;
        texture.height = height;
        if !texture.flags.contains(TextureFlags::IS_WRAPPED) {
            if let Some(handle) = texture.handle {
                renderer.backend_mut().texture_resize(handle, width, height)?;
            }
        }
        Ok(())
    }

    pub fn write_data(
        renderer: &mut Renderer,
        texture: &Texture,
        offset: u32,
        pixels: &[u8],
    ) -> Result<(), BackendError> {
        if !texture.is_writeable() {
            return Err(BackendError::failed(
                "texture_write_data",
                format!("texture '{}' is not writeable", texture.name),
            ));
        }
        let handle = texture
            .handle
            .ok_or_else(|| BackendError::failed("texture_write_data", "texture has no backend image"))?;
        renderer.backend_mut().texture_write_data(handle, offset, pixels)
    }

    pub fn shutdown(&self, renderer: &mut Renderer) {
        for (name, texture) in self.registry.drain() {
            if !texture.flags.contains(TextureFlags::IS_WRAPPED) {
                destroy(renderer, &texture);
            }
            log::trace!("texture '{name}' destroyed at shutdown");
        }
        for texture in [
            &self.default_texture,
            &self.default_diffuse,
            &self.default_specular,
            &self.default_normal,
        ] {
            destroy(renderer, texture);
        }
    }
}

/// Creates an unregistered writeable texture, as used for view-owned attachments.
pub fn create_writeable(
    renderer: &mut Renderer,
    name: &str,
    width: u32,
    height: u32,
    channel_count: u8,
    has_transparency: bool,
    depth: bool,
) -> Result<Texture, BackendError> {
    let mut flags = TextureFlags::IS_WRITEABLE;
    flags.set(TextureFlags::HAS_TRANSPARENCY, has_transparency);
    flags.set(TextureFlags::DEPTH, depth);
    let desc = TextureDesc {
        name: name.to_string(),
        kind: TextureType::D2,
        width,
        height,
        channel_count,
        flags,
    };
    let handle = renderer.backend_mut().texture_create_writeable(&desc)?;
    Ok(from_desc(desc, handle))
}

pub fn destroy(renderer: &mut Renderer, texture: &Texture) {
    if let Some(handle) = texture.handle {
        renderer.backend_mut().texture_destroy(handle);
    }
}

fn from_desc(desc: TextureDesc, handle: BackendHandle) -> Texture {
    Texture {
        name: desc.name,
        kind: desc.kind,
        width: desc.width,
        height: desc.height,
        channel_count: desc.channel_count,
        flags: desc.flags,
        handle: Some(handle),
    }
}

fn create_default(
    renderer: &mut Renderer,
    name: &str,
    dimension: u32,
    pixels: &[u8],
) -> anyhow::Result<Arc<Texture>> {
    let mut flags = TextureFlags::empty();
    flags.set(TextureFlags::HAS_TRANSPARENCY, pixels_have_transparency(pixels));
    let desc = TextureDesc {
        name: name.to_string(),
        kind: TextureType::D2,
        width: dimension,
        height: dimension,
        channel_count: 4,
        flags,
    };
    let handle = renderer
        .backend_mut()
        .texture_create(&desc, pixels)
        .with_context(|| format!("creating default texture '{name}'"))?;
    Ok(Arc::new(from_desc(desc, handle)))
}

fn load_image(assets: &AssetManager, name: &str, flip_y: bool) -> anyhow::Result<ImageData> {
    let resource = assets.load(name, ResourceType::Image, LoadParams { flip_y })?;
    match resource.data {
        ResourceData::Image(image) => Ok(image),
        other => bail!("'{name}' loaded as {:?}, expected an image", other.kind()),
    }
}
