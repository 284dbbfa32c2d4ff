//! Geometry: vertex/index data uploaded to the backend plus the bounds used for sorting.

use std::sync::Arc;

use cgmath::Vector3;

use crate::{data_structures::material::Material, renderer::backend::BackendHandle};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub texcoord: [f32; 2],
    pub colour: [f32; 4],
    pub tangent: [f32; 4],
}

impl Vertex3D {
    pub fn new(position: [f32; 3], normal: [f32; 3], texcoord: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            texcoord,
            colour: [1.0, 1.0, 1.0, 1.0],
            tangent: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Vertices {
    D3(Vec<Vertex3D>),
    D2(Vec<Vertex2D>),
}

impl Vertices {
    pub fn len(&self) -> usize {
        match self {
            Vertices::D3(v) => v.len(),
            Vertices::D2(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vertex_size(&self) -> u32 {
        match self {
            Vertices::D3(_) => std::mem::size_of::<Vertex3D>() as u32,
            Vertices::D2(_) => std::mem::size_of::<Vertex2D>() as u32,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Vertices::D3(v) => bytemuck::cast_slice(v),
            Vertices::D2(v) => bytemuck::cast_slice(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for Extents {
    fn default() -> Self {
        Self {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

/// Everything needed to create a [`Geometry`].
#[derive(Debug, Clone)]
pub struct GeometryConfig {
    pub name: String,
    pub vertices: Vertices,
    pub indices: Vec<u32>,
    pub center: Vector3<f32>,
    pub extents: Extents,
    pub material_name: Option<String>,
}

#[derive(Debug)]
pub struct Geometry {
    pub id: u32,
    pub name: String,
    pub center: Vector3<f32>,
    pub extents: Extents,
    pub material: Option<Arc<Material>>,
    pub handle: Option<BackendHandle>,
}
