//! The UI view: screen-space geometry under an orthographic projection.

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

use crate::{
    data_structures::{mesh::Mesh, transform::Transforms, ui_text::UiText},
    error::ViewError,
    render::{ExtendedData, GeometryRenderData, RenderViewPacket},
    renderer::{RenderPassId, Renderer},
    systems::{
        material::{MaterialSystem, NO_SHADER},
        shader::ShaderSystem,
    },
    views::{RenderMode, UI_FAR_CLIP, UI_NEAR_CLIP, ViewId, draw_geometry, orthographic},
};

pub(crate) const UI_UNIFORMS: [&str; 5] =
    ["projection", "view", "diffuse_colour", "diffuse_texture", "model"];

#[derive(Debug, Clone)]
pub(crate) struct UiView {
    pub(crate) shader_id: u32,
    near_clip: f32,
    far_clip: f32,
    pub(crate) projection: Matrix4<f32>,
    view: Matrix4<f32>,
}

impl UiView {
    pub(crate) fn new(shader_id: u32, width: u32, height: u32) -> Self {
        Self {
            shader_id,
            near_clip: UI_NEAR_CLIP,
            far_clip: UI_FAR_CLIP,
            projection: orthographic(width, height, UI_NEAR_CLIP, UI_FAR_CLIP),
            view: Matrix4::identity(),
        }
    }

    pub(crate) fn on_resize(&mut self, width: u32, height: u32) {
        self.projection = orthographic(width, height, self.near_clip, self.far_clip);
    }

    pub(crate) fn build_packet(
        &self,
        id: ViewId,
        name: &str,
        meshes: &[Mesh],
        texts: &[UiText],
        transforms: &Transforms,
    ) -> RenderViewPacket {
        let mut packet = RenderViewPacket::new(id, name);
        packet.projection_matrix = self.projection;
        packet.view_matrix = self.view;
        for mesh in meshes.iter().filter(|m| m.is_live()) {
            let model = transforms.world(mesh.transform);
            packet
                .geometries
                .extend(mesh.geometries.iter().map(|geometry| GeometryRenderData {
                    model,
                    geometry: geometry.clone(),
                    unique_id: mesh.unique_id,
                }));
        }
        packet.extended_data = ExtendedData::Ui {
            texts: texts.to_vec(),
        };
        packet
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
        let apply_global = |renderer: &mut Renderer, shaders: &mut ShaderSystem, shader_id: u32| {
            materials.apply_global(
                renderer,
                shaders,
                shader_id,
                frame_number,
                packet.projection_matrix,
                packet.view_matrix,
                Vector4::new(0.0, 0.0, 0.0, 0.0),
                Vector3::new(0.0, 0.0, 0.0),
                RenderMode::Default,
            )
        };

        for &pass in passes {
            renderer.renderpass_begin(pass, render_target_index)?;
            apply_global(renderer, shaders, self.shader_id).inspect_err(|e| {
                log::error!("applying UI globals failed, the frame cannot be drawn: {e}")
            })?;

            for data in &packet.geometries {
                let material = data
                    .geometry
                    .material
                    .clone()
                    .unwrap_or_else(|| materials.default_material());
                if material.shader_id == NO_SHADER {
                    log::warn!("material '{}' has no shader, skipping UI draw", material.name);
                    continue;
                }
                apply_global(renderer, shaders, material.shader_id)?;
                let needs_update = material.needs_update(frame_number);
                if let Err(e) = materials.apply_instance(renderer, shaders, &material, needs_update) {
                    log::warn!("failed to apply material '{}', skipping draw: {e}", material.name);
                    continue;
                }
                materials.apply_local(renderer, shaders, data.model)?;
                draw_geometry(renderer, &data.geometry)?;
            }

            if let ExtendedData::Ui { texts } = &packet.extended_data {
                if !texts.is_empty() {
                    log::trace!("{} UI texts carried without glyph geometry", texts.len());
                }
            }

            renderer.renderpass_end(pass)?;
        }
        Ok(())
    }
}
