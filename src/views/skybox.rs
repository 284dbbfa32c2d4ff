//! The skybox view: a cubemap drawn around the camera.

use std::sync::{Arc, atomic::Ordering};

use cgmath::{Matrix4, Rad};

use crate::{
    camera::{CameraSystem, DEFAULT_CAMERA_NAME},
    data_structures::skybox::Skybox,
    error::ViewError,
    render::{ExtendedData, RenderViewPacket},
    renderer::{RenderPassId, Renderer, backend::UniformValue},
    systems::shader::ShaderSystem,
    views::{
        DEFAULT_FAR_CLIP, DEFAULT_FOV_DEGREES, DEFAULT_NEAR_CLIP, ViewId, draw_geometry,
        perspective,
    },
};

pub const BUILTIN_SKYBOX_SHADER: &str = "Shader.Builtin.Skybox";

pub(crate) const SKYBOX_UNIFORMS: [&str; 3] = ["projection", "view", "cube_texture"];

#[derive(Debug, Clone)]
pub(crate) struct SkyboxView {
    pub(crate) shader_id: u32,
    projection_location: u16,
    view_location: u16,
    cube_map_location: u16,
    fov: Rad<f32>,
    near_clip: f32,
    far_clip: f32,
    pub(crate) projection: Matrix4<f32>,
    camera: String,
}

/// The camera's view matrix without its translation, so the skybox never moves.
pub fn strip_translation(mut view: Matrix4<f32>) -> Matrix4<f32> {
    view.w.x = 0.0;
    view.w.y = 0.0;
    view.w.z = 0.0;
    view
}

impl SkyboxView {
    pub(crate) fn new(shader_id: u32, locations: [u16; 3], width: u32, height: u32) -> Self {
        let fov = Rad::from(cgmath::Deg(DEFAULT_FOV_DEGREES));
        let [projection_location, view_location, cube_map_location] = locations;
        Self {
            shader_id,
            projection_location,
            view_location,
            cube_map_location,
            fov,
            near_clip: DEFAULT_NEAR_CLIP,
            far_clip: DEFAULT_FAR_CLIP,
            projection: perspective(fov, width, height, DEFAULT_NEAR_CLIP, DEFAULT_FAR_CLIP),
            camera: DEFAULT_CAMERA_NAME.to_string(),
        }
    }

    pub(crate) fn on_resize(&mut self, width: u32, height: u32) {
        self.projection = perspective(self.fov, width, height, self.near_clip, self.far_clip);
    }

    pub(crate) fn build_packet(
        &self,
        id: ViewId,
        name: &str,
        skybox: Arc<Skybox>,
        cameras: &CameraSystem,
    ) -> Result<RenderViewPacket, ViewError> {
        let camera = cameras
            .get(&self.camera)
            .ok_or_else(|| ViewError::MissingCamera {
                view: name.to_string(),
                camera: self.camera.clone(),
            })?;
        let mut packet = RenderViewPacket::new(id, name);
        packet.projection_matrix = self.projection;
        packet.view_matrix = camera.view();
        packet.view_position = camera.position();
        packet.extended_data = ExtendedData::Skybox(skybox);
        Ok(packet)
    }

    pub(crate) fn render(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        passes: &[RenderPassId],
        packet: &RenderViewPacket,
        frame_number: u64,
        render_target_index: u8,
    ) -> Result<(), ViewError> {
        let ExtendedData::Skybox(skybox) = &packet.extended_data else {
            return Err(ViewError::PayloadMismatch {
                view: packet.view_name.clone(),
                got: "non-skybox packet",
            });
        };

        for &pass in passes {
            renderer.renderpass_begin(pass, render_target_index)?;

            shaders.use_by_id(renderer, self.shader_id)?;
            shaders.set_uniform_by_index(
                renderer,
                self.projection_location,
                packet.projection_matrix.into(),
            )?;
            shaders.set_uniform_by_index(
                renderer,
                self.view_location,
                strip_translation(packet.view_matrix).into(),
            )?;
            shaders.apply_global(renderer)?;

            shaders.bind_instance(renderer, skybox.instance_id)?;
            shaders.set_uniform_by_index(
                renderer,
                self.cube_map_location,
                UniformValue::Sampler(skybox.cubemap.texture_handle()),
            )?;
            let needs_update =
                skybox.render_frame_number.swap(frame_number, Ordering::AcqRel) != frame_number;
            shaders.apply_instance(renderer, needs_update)?;

            draw_geometry(renderer, &skybox.geometry)?;
            renderer.renderpass_end(pass)?;
        }
        Ok(())
    }
}
