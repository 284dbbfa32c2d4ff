//! Frame packets.
//!
//! Each frame the game fills a [`RenderPacket`] with one [`RenderViewPacket`] per
//! view. Packets are built fresh every frame by the view system, handed to the
//! renderer, and destroyed afterwards. They hold shared references to geometry
//! and skyboxes, never ownership of scene data.
//!
//! # Key types
//!
//! - [`GeometryRenderData`] is one draw: a model matrix, a geometry and the owner's id
//! - [`ExtendedData`] carries what only one view kind needs (skybox, UI texts, pick counts)

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

use crate::{
    data_structures::{geometry::Geometry, skybox::Skybox, ui_text::UiText},
    views::ViewId,
};

#[derive(Debug, Clone)]
pub struct GeometryRenderData {
    pub model: Matrix4<f32>,
    pub geometry: Arc<Geometry>,
    /// Unique id of the mesh the geometry belongs to.
    pub unique_id: u32,
}

/// Geometry counts the pick view derives while building its packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PickCounts {
    pub world_geometry_count: usize,
    pub ui_geometry_count: usize,
    pub text_count: usize,
    pub required_instance_count: u32,
}

#[derive(Debug, Clone, Default)]
pub enum ExtendedData {
    #[default]
    None,
    Skybox(Arc<Skybox>),
    Ui { texts: Vec<UiText> },
    Pick { counts: PickCounts, texts: Vec<UiText> },
}

#[derive(Debug, Clone)]
pub struct RenderViewPacket {
    pub view_id: ViewId,
    pub view_name: String,
    pub view_matrix: Matrix4<f32>,
    pub projection_matrix: Matrix4<f32>,
    pub view_position: Vector3<f32>,
    pub ambient_colour: Vector4<f32>,
    pub geometries: Vec<GeometryRenderData>,
    pub custom_shader_name: Option<String>,
    pub extended_data: ExtendedData,
}

impl RenderViewPacket {
    pub fn new(view_id: ViewId, view_name: impl Into<String>) -> Self {
        Self {
            view_id,
            view_name: view_name.into(),
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
            view_position: Vector3::new(0.0, 0.0, 0.0),
            ambient_colour: Vector4::new(0.0, 0.0, 0.0, 1.0),
            geometries: Vec::new(),
            custom_shader_name: None,
            extended_data: ExtendedData::None,
        }
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }
}

/// Everything drawn in one frame.
#[derive(Debug, Clone, Default)]
pub struct RenderPacket {
    pub delta_time: f64,
    pub views: Vec<RenderViewPacket>,
}

impl RenderPacket {
    pub fn new(delta_time: f64) -> Self {
        Self {
            delta_time,
            views: Vec::new(),
        }
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }
}
