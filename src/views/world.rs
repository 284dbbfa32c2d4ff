//! The world view: lit 3D geometry seen through a camera.

use cgmath::{InnerSpace, Matrix4, Rad, Vector4};

use crate::{
    camera::{CameraSystem, DEFAULT_CAMERA_NAME},
    data_structures::{mesh::Mesh, transform::Transforms},
    error::ViewError,
    render::{GeometryRenderData, RenderViewPacket},
    renderer::{RenderPassId, Renderer},
    systems::{
        material::{MaterialSystem, NO_SHADER},
        shader::ShaderSystem,
    },
    views::{
        DEFAULT_FAR_CLIP, DEFAULT_FOV_DEGREES, DEFAULT_NEAR_CLIP, RenderMode, ViewId, draw_geometry,
        perspective,
    },
};

pub(crate) const WORLD_UNIFORMS: [&str; 3] = ["projection", "view", "model"];

#[derive(Debug, Clone)]
pub(crate) struct WorldView {
    pub(crate) shader_id: u32,
    fov: Rad<f32>,
    near_clip: f32,
    far_clip: f32,
    pub(crate) projection: Matrix4<f32>,
    ambient_colour: Vector4<f32>,
    pub(crate) render_mode: RenderMode,
    camera: String,
}

impl WorldView {
    pub(crate) fn new(shader_id: u32, width: u32, height: u32) -> Self {
        let fov = Rad::from(cgmath::Deg(DEFAULT_FOV_DEGREES));
        Self {
            shader_id,
            fov,
            near_clip: DEFAULT_NEAR_CLIP,
            far_clip: DEFAULT_FAR_CLIP,
            projection: perspective(fov, width, height, DEFAULT_NEAR_CLIP, DEFAULT_FAR_CLIP),
            ambient_colour: Vector4::new(0.25, 0.25, 0.25, 1.0),
            render_mode: RenderMode::Default,
            camera: DEFAULT_CAMERA_NAME.to_string(),
        }
    }

    pub(crate) fn on_resize(&mut self, width: u32, height: u32) {
        self.projection = perspective(self.fov, width, height, self.near_clip, self.far_clip);
    }

    /// Opaque geometry first in mesh order, then transparent geometry sorted
    /// nearest first by the distance of its world-space center to the camera.
    pub(crate) fn build_packet(
        &self,
        id: ViewId,
        name: &str,
        meshes: &[Mesh],
        transforms: &Transforms,
        cameras: &CameraSystem,
    ) -> Result<RenderViewPacket, ViewError> {
        let camera = cameras
            .get(&self.camera)
            .ok_or_else(|| ViewError::MissingCamera {
                view: name.to_string(),
                camera: self.camera.clone(),
            })?;
        let camera_position = camera.position();

        let mut packet = RenderViewPacket::new(id, name);
        packet.projection_matrix = self.projection;
        packet.view_matrix = camera.view();
        packet.view_position = camera_position;
        packet.ambient_colour = self.ambient_colour;

        let mut transparent: Vec<(f32, GeometryRenderData)> = Vec::new();
        for mesh in meshes.iter().filter(|m| m.is_live()) {
            let model = transforms.world(mesh.transform);
            for geometry in &mesh.geometries {
                let data = GeometryRenderData {
                    model,
                    geometry: geometry.clone(),
                    unique_id: mesh.unique_id,
                };
                let is_transparent = geometry
                    .material
                    .as_ref()
                    .is_some_and(|m| m.is_transparent());
                if !is_transparent {
                    packet.geometries.push(data);
                    continue;
                }
                let center = (model * geometry.center.extend(1.0)).truncate();
                let distance = (center - camera_position).magnitude().abs();
                transparent.push((distance, data));
            }
        }

        // stable, so equal distances keep mesh order
        transparent.sort_by(|a, b| a.0.total_cmp(&b.0));
        packet
            .geometries
            .extend(transparent.into_iter().map(|(_, data)| data));
        Ok(packet)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn render(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        materials: &MaterialSystem,
        passes: &[RenderPassId],
        packet: &RenderViewPacket,
        frame_number: u64,
        render_target_index: u8,
    ) -> Result<(), ViewError> {
        for &pass in passes {
            renderer.renderpass_begin(pass, render_target_index)?;

            self.apply_global(renderer, shaders, materials, self.shader_id, packet, frame_number)
                .inspect_err(|e| {
                    log::error!("applying world globals failed, the frame cannot be drawn: {e}")
                })?;

            for data in &packet.geometries {
                let material = data
                    .geometry
                    .material
                    .clone()
                    .unwrap_or_else(|| materials.default_material());
                if material.shader_id == NO_SHADER {
                    log::warn!(
                        "material '{}' has no shader, skipping draw of '{}'",
                        material.name,
                        data.geometry.name
                    );
                    continue;
                }
                self.apply_global(renderer, shaders, materials, material.shader_id, packet, frame_number)?;

                let needs_update = material.needs_update(frame_number);
                if let Err(e) = materials.apply_instance(renderer, shaders, &material, needs_update) {
                    log::warn!("failed to apply material '{}', skipping draw: {e}", material.name);
                    continue;
                }
                materials.apply_local(renderer, shaders, data.model)?;
                draw_geometry(renderer, &data.geometry)?;
            }

            renderer.renderpass_end(pass)?;
        }
        Ok(())
    }

    fn apply_global(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        materials: &MaterialSystem,
        shader_id: u32,
        packet: &RenderViewPacket,
        frame_number: u64,
    ) -> Result<(), ViewError> {
        materials.apply_global(
            renderer,
            shaders,
            shader_id,
            frame_number,
            packet.projection_matrix,
            packet.view_matrix,
            packet.ambient_colour,
            packet.view_position,
            self.render_mode,
        )?;
        Ok(())
    }
}
