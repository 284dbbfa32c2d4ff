use std::sync::{Arc, atomic::AtomicU64};

use crate::data_structures::{
    geometry::Geometry, material::NEVER_RENDERED, texture::TextureMap,
};

/// A cubemap drawn behind everything else.
#[derive(Debug)]
pub struct Skybox {
    pub cubemap: TextureMap,
    pub geometry: Arc<Geometry>,
    pub instance_id: u32,
    pub render_frame_number: AtomicU64,
}

impl Skybox {
    pub fn new(cubemap: TextureMap, geometry: Arc<Geometry>, instance_id: u32) -> Self {
        Self {
            cubemap,
            geometry,
            instance_id,
            render_frame_number: AtomicU64::new(NEVER_RENDERED),
        }
    }
}
