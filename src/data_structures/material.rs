//! Materials: the per-surface shading inputs bound to a shader instance.

use std::sync::atomic::{AtomicU64, Ordering};

use cgmath::Vector4;

use crate::data_structures::texture::TextureMap;

/// Frame number marking a material as never applied.
pub const NEVER_RENDERED: u64 = u64::MAX;

#[derive(Debug)]
pub struct Material {
    pub id: u32,
    pub name: String,
    pub diffuse_colour: Vector4<f32>,
    pub diffuse_map: TextureMap,
    pub specular_map: TextureMap,
    pub normal_map: TextureMap,
    pub shininess: f32,
    pub shader_id: u32,
    /// Instance slot in the shader. `None` until instance resources were acquired.
    pub instance_id: Option<u32>,
    /// Last frame this material's instance uniforms were uploaded.
    pub render_frame_number: AtomicU64,
}

impl Material {
    /// Whether the instance uniforms still have to be written for `frame_number`.
    /// Marks the material as updated for that frame.
    pub fn needs_update(&self, frame_number: u64) -> bool {
        self.render_frame_number.swap(frame_number, Ordering::AcqRel) != frame_number
    }

    /// Surfaces with a transparent diffuse map are sorted separately by the world view.
    pub fn is_transparent(&self) -> bool {
        self.diffuse_map
            .texture
            .as_ref()
            .map(|t| t.has_transparency())
            .unwrap_or(false)
    }
}
