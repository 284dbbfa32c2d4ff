//! The pick view: renders unique ids as colours and reads back the one under the mouse.
//!
//! Pass 0 draws world meshes with a perspective projection, pass 1 draws UI
//! meshes orthographically on top. Both passes render into colour and depth
//! textures the view owns. Mesh `unique_id`s double as shader instance ids in
//! both pick shaders, so instances are acquired up to the highest id seen.

use cgmath::{Matrix4, Rad, SquareMatrix};

use crate::{
    camera::{CameraSystem, DEFAULT_CAMERA_NAME},
    data_structures::{mesh::Mesh, texture::Texture, transform::Transforms, ui_text::UiText},
    error::ViewError,
    pick::{NO_OBJECT, decode_pixel, id_to_colour},
    render::{ExtendedData, GeometryRenderData, PickCounts, RenderViewPacket},
    renderer::{
        RenderPassId, Renderer,
        backend::{AttachmentType, BackendHandle},
    },
    systems::{
        shader::ShaderSystem,
        texture::{self as texture_system, TextureSystem},
    },
    views::{
        DEFAULT_FAR_CLIP, DEFAULT_FOV_DEGREES, DEFAULT_NEAR_CLIP, UI_FAR_CLIP, UI_NEAR_CLIP,
        ViewId, draw_geometry, orthographic, perspective,
    },
};

pub const BUILTIN_WORLD_PICK_SHADER: &str = "Shader.Builtin.WorldPick";
pub const BUILTIN_UI_PICK_SHADER: &str = "Shader.Builtin.UIPick";

/// Uniforms both pick shaders need, in the order their locations are stored.
pub(crate) const PICK_UNIFORMS: [&str; 4] = ["projection", "view", "id_colour", "model"];

#[derive(Debug, Clone)]
pub(crate) struct PickShaderInfo {
    shader_id: u32,
    projection_location: u16,
    view_location: u16,
    id_colour_location: u16,
    model_location: u16,
    near_clip: f32,
    far_clip: f32,
    /// `None` for the orthographic UI pass.
    fov: Option<Rad<f32>>,
    projection: Matrix4<f32>,
    /// Instances whose id colour was written this frame.
    updated: Vec<bool>,
}

impl PickShaderInfo {
    pub(crate) fn new(shader_id: u32, locations: [u16; 4], fov: Option<Rad<f32>>) -> Self {
        let [projection_location, view_location, id_colour_location, model_location] = locations;
        let (near_clip, far_clip) = match fov {
            Some(_) => (DEFAULT_NEAR_CLIP, DEFAULT_FAR_CLIP),
            None => (UI_NEAR_CLIP, UI_FAR_CLIP),
        };
        Self {
            shader_id,
            projection_location,
            view_location,
            id_colour_location,
            model_location,
            near_clip,
            far_clip,
            fov,
            projection: Matrix4::identity(),
            updated: Vec::new(),
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.projection = match self.fov {
            Some(fov) => perspective(fov, width, height, self.near_clip, self.far_clip),
            None => orthographic(width, height, self.near_clip, self.far_clip),
        };
    }

    fn begin(
        &self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        view: Matrix4<f32>,
    ) -> Result<(), ViewError> {
        shaders.use_by_id(renderer, self.shader_id)?;
        shaders.set_uniform_by_index(renderer, self.projection_location, self.projection.into())?;
        shaders.set_uniform_by_index(renderer, self.view_location, view.into())?;
        shaders.apply_global(renderer)?;
        Ok(())
    }

    fn draw(
        &mut self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        data: &GeometryRenderData,
    ) -> Result<(), ViewError> {
        let id = data.unique_id;
        shaders.bind_instance(renderer, id)?;
        let needs_update = self
            .updated
            .get_mut(id as usize)
            .map(|updated| !std::mem::replace(updated, true))
            .unwrap_or(true);
        if needs_update {
            shaders.set_uniform_by_index(
                renderer,
                self.id_colour_location,
                id_to_colour(id).into(),
            )?;
        }
        shaders.apply_instance(renderer, needs_update)?;
        shaders.set_uniform_by_index(renderer, self.model_location, data.model.into())?;
        draw_geometry(renderer, &data.geometry)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PickView {
    world: PickShaderInfo,
    ui: PickShaderInfo,
    /// Instances acquired on each pick shader.
    instance_count: u32,
    mouse_x: i32,
    mouse_y: i32,
    hovered_id: Option<u32>,
    colour_target: Option<Texture>,
    depth_target: Option<Texture>,
    camera: String,
    width: u32,
    height: u32,
}

impl PickView {
    pub(crate) fn new(world: PickShaderInfo, ui: PickShaderInfo, width: u32, height: u32) -> Self {
        let mut view = Self {
            world,
            ui,
            instance_count: 0,
            mouse_x: 0,
            mouse_y: 0,
            hovered_id: None,
            colour_target: None,
            depth_target: None,
            camera: DEFAULT_CAMERA_NAME.to_string(),
            width,
            height,
        };
        view.on_resize(width, height);
        view
    }

    pub(crate) fn world_fov() -> Option<Rad<f32>> {
        Some(Rad::from(cgmath::Deg(DEFAULT_FOV_DEGREES)))
    }

    pub(crate) fn on_resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.world.on_resize(width, height);
        self.ui.on_resize(width, height);
    }

    pub(crate) fn world_projection(&self) -> Matrix4<f32> {
        self.world.projection
    }

    pub(crate) fn on_mouse_moved(&mut self, x: i32, y: i32) {
        self.mouse_x = x;
        self.mouse_y = y;
    }

    pub(crate) fn hovered_id(&self) -> Option<u32> {
        self.hovered_id
    }

    pub(crate) fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Creates the colour and depth textures on first use and resizes them afterwards.
    pub(crate) fn regenerate_attachments(
        &mut self,
        renderer: &mut Renderer,
        width: u32,
        height: u32,
    ) -> Result<(), ViewError> {
        match &mut self.colour_target {
            Some(texture) => TextureSystem::resize(renderer, texture, width, height)?,
            None => {
                self.colour_target = Some(texture_system::create_writeable(
                    renderer,
                    "__pick_colour",
                    width,
                    height,
                    4,
                    false,
                    false,
                )?)
            }
        }
        match &mut self.depth_target {
            Some(texture) => TextureSystem::resize(renderer, texture, width, height)?,
            None => {
                self.depth_target = Some(texture_system::create_writeable(
                    renderer,
                    "__pick_depth",
                    width,
                    height,
                    4,
                    false,
                    true,
                )?)
            }
        }
        Ok(())
    }

    pub(crate) fn attachment(&self, kind: AttachmentType) -> Option<BackendHandle> {
        match kind {
            AttachmentType::Colour => self.colour_target.as_ref()?.handle,
            AttachmentType::Depth | AttachmentType::Stencil => self.depth_target.as_ref()?.handle,
        }
    }

    /// World geometry first, then UI geometry. The required instance count is
    /// one past the highest unique id among meshes and texts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn build_packet(
        &self,
        id: ViewId,
        name: &str,
        world_meshes: &[Mesh],
        ui_meshes: &[Mesh],
        texts: &[UiText],
        transforms: &Transforms,
        cameras: &CameraSystem,
    ) -> Result<RenderViewPacket, ViewError> {
        let camera = cameras
            .get(&self.camera)
            .ok_or_else(|| ViewError::MissingCamera {
                view: name.to_string(),
                camera: self.camera.clone(),
            })?;
        let mut packet = RenderViewPacket::new(id, name);
        packet.projection_matrix = self.world.projection;
        packet.view_matrix = camera.view();
        packet.view_position = camera.position();

        let mut counts = PickCounts::default();
        let mut highest_id: Option<u32> = None;
        let mut collect = |meshes: &[Mesh], packet: &mut RenderViewPacket| -> usize {
            let before = packet.geometries.len();
            for mesh in meshes.iter().filter(|m| m.is_live()) {
                let model = transforms.world(mesh.transform);
                for geometry in &mesh.geometries {
                    packet.geometries.push(GeometryRenderData {
                        model,
                        geometry: geometry.clone(),
                        unique_id: mesh.unique_id,
                    });
                }
                highest_id = highest_id.max(Some(mesh.unique_id));
            }
            packet.geometries.len() - before
        };
        counts.world_geometry_count = collect(world_meshes, &mut packet);
        counts.ui_geometry_count = collect(ui_meshes, &mut packet);

        counts.text_count = texts.len();
        if let Some(text_max) = texts.iter().map(|t| t.unique_id).max() {
            highest_id = highest_id.max(Some(text_max));
        }
        counts.required_instance_count = match highest_id {
            None => 0,
            Some(id) => id
                .checked_add(1)
                .filter(|_| id < NO_OBJECT)
                .ok_or_else(|| ViewError::IdOutOfRange {
                    view: name.to_string(),
                    id,
                })?,
        };

        packet.extended_data = ExtendedData::Pick {
            counts,
            texts: texts.to_vec(),
        };
        Ok(packet)
    }

    /// Acquires instances on both pick shaders until `required` exist.
    fn ensure_instances(
        &mut self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        required: u32,
    ) -> Result<(), ViewError> {
        while self.instance_count < required {
            let expected = self.instance_count;
            for info in [&self.world, &self.ui] {
                let instance = shaders.acquire_instance_resources(renderer, info.shader_id, &[])?;
                if instance != expected {
                    log::warn!("pick shader handed out instance {instance}, expected {expected}");
                }
            }
            self.instance_count += 1;
        }
        let count = self.instance_count as usize;
        self.world.updated.resize(count, false);
        self.ui.updated.resize(count, false);
        Ok(())
    }

    pub(crate) fn render(
        &mut self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        passes: &[RenderPassId],
        packet: &RenderViewPacket,
        render_target_index: u8,
    ) -> Result<(), ViewError> {
        let ExtendedData::Pick { counts, texts } = &packet.extended_data else {
            return Err(ViewError::PayloadMismatch {
                view: packet.view_name.clone(),
                got: "non-pick packet",
            });
        };
        let [world_pass, ui_pass] = passes else {
            return Err(ViewError::PassCount {
                view: packet.view_name.clone(),
                expected: 2,
                actual: passes.len(),
            });
        };

        self.ensure_instances(renderer, shaders, counts.required_instance_count)?;
        self.world.updated.fill(false);
        self.ui.updated.fill(false);

        let world_count = counts.world_geometry_count.min(packet.geometries.len());
        let (world, ui) = packet.geometries.split_at(world_count);
        let ui = &ui[..counts.ui_geometry_count.min(ui.len())];

        renderer.renderpass_begin(*world_pass, render_target_index)?;
        self.world.begin(renderer, shaders, packet.view_matrix)?;
        for data in world {
            self.world.draw(renderer, shaders, data)?;
        }
        renderer.renderpass_end(*world_pass)?;

        renderer.renderpass_begin(*ui_pass, render_target_index)?;
        self.ui.begin(renderer, shaders, Matrix4::identity())?;
        for data in ui {
            self.ui.draw(renderer, shaders, data)?;
        }
        for text in texts {
            log::trace!("pick skips text {} without glyph geometry", text.unique_id);
        }
        renderer.renderpass_end(*ui_pass)?;

        self.read_hovered(renderer)
    }

    fn read_hovered(&mut self, renderer: &mut Renderer) -> Result<(), ViewError> {
        let Some(handle) = self.colour_target.as_ref().and_then(|t| t.handle) else {
            return Ok(());
        };
        let x = self.mouse_x.clamp(0, self.width.max(1) as i32 - 1) as u32;
        let y = self.mouse_y.clamp(0, self.height.max(1) as i32 - 1) as u32;
        let rgba = renderer.backend_mut().texture_read_pixel(handle, x, y)?;
        let hovered = decode_pixel(rgba);
        if hovered != self.hovered_id {
            log::debug!("hovered object changed to {hovered:?}");
        }
        self.hovered_id = hovered;
        Ok(())
    }

    pub(crate) fn destroy(&mut self, renderer: &mut Renderer, shaders: &mut ShaderSystem) {
        for info in [&self.world, &self.ui] {
            for instance in 0..self.instance_count {
                if let Err(e) = shaders.release_instance_resources(renderer, info.shader_id, instance) {
                    log::warn!("releasing pick instance {instance} failed: {e}");
                }
            }
        }
        self.instance_count = 0;
        for texture in [self.colour_target.take(), self.depth_target.take()]
            .into_iter()
            .flatten()
        {
            texture_system::destroy(renderer, &texture);
        }
    }
}
