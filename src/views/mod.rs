//! Render views.
//!
//! A view turns scene data into a [`RenderViewPacket`] and later draws that packet
//! through its render passes. The four kinds share one registry and one set of
//! operations; kind-specific state lives in a [`ViewState`] variant and each
//! operation is a single `match` over it.
//!
//! # Per frame
//!
//! 1. the game calls [`RenderViewSystem::build_packet`] once per view with a
//!    [`ViewPayload`] of the matching shape
//! 2. the renderer calls back into [`ViewFrame`] to draw each packet
//! 3. packets are handed back through [`RenderViewSystem::on_destroy_packet`]
//!
//! # Defaults
//!
//! Perspective views use a 45 degree field of view with clip planes at 0.1 and
//! 1000. The UI is orthographic over `[0, width] x [height, 0]` with clip planes
//! at -100 and 100. A zero width or height falls back to an aspect of 1.

use std::{collections::HashMap, sync::Arc};

use cgmath::{Matrix4, Rad};
use serde::Deserialize;

use crate::{
    assets::AssetManager,
    camera::CameraSystem,
    config::RenderViewConfig,
    data_structures::{geometry::Geometry, mesh::Mesh, skybox::Skybox, transform::Transforms, ui_text::UiText},
    error::{BackendError, RendererError, ViewError},
    render::RenderViewPacket,
    renderer::{
        FrameViews, RenderPassId, Renderer,
        backend::{AttachmentSource, AttachmentType, BackendHandle},
    },
    resources::{LoadParams, ResourceData, ResourceType},
    systems::{
        material::{BUILTIN_MATERIAL_SHADER, BUILTIN_UI_SHADER, MaterialSystem},
        shader::ShaderSystem,
    },
};

pub mod pick;
pub mod skybox;
pub mod ui;
pub mod world;

use self::{
    pick::{BUILTIN_UI_PICK_SHADER, BUILTIN_WORLD_PICK_SHADER, PICK_UNIFORMS, PickShaderInfo, PickView},
    skybox::{BUILTIN_SKYBOX_SHADER, SKYBOX_UNIFORMS, SkyboxView},
    ui::{UI_UNIFORMS, UiView},
    world::{WORLD_UNIFORMS, WorldView},
};

pub(crate) const DEFAULT_FOV_DEGREES: f32 = 45.0;
pub(crate) const DEFAULT_NEAR_CLIP: f32 = 0.1;
pub(crate) const DEFAULT_FAR_CLIP: f32 = 1000.0;
pub(crate) const UI_NEAR_CLIP: f32 = -100.0;
pub(crate) const UI_FAR_CLIP: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    World,
    Ui,
    Skybox,
    Pick,
}

/// Where a view takes its view or projection matrix from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixSource {
    #[default]
    SceneCamera,
    UiCamera,
    LightCamera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u16);

/// Debug shading mode of the world view, written to the material shader's `mode` uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum RenderMode {
    #[default]
    Default = 0,
    Lighting = 1,
    Normals = 2,
}

/// Scene data for one view's packet. Each view kind accepts exactly one variant.
#[derive(Debug, Clone)]
pub enum ViewPayload<'a> {
    World {
        meshes: &'a [Mesh],
    },
    Ui {
        meshes: &'a [Mesh],
        texts: &'a [UiText],
    },
    Skybox(Arc<Skybox>),
    Pick {
        world_meshes: &'a [Mesh],
        ui_meshes: &'a [Mesh],
        texts: &'a [UiText],
    },
}

impl ViewPayload<'_> {
    fn shape(&self) -> &'static str {
        match self {
            ViewPayload::World { .. } => "world",
            ViewPayload::Ui { .. } => "ui",
            ViewPayload::Skybox(_) => "skybox",
            ViewPayload::Pick { .. } => "pick",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ViewState {
    World(WorldView),
    Ui(UiView),
    Skybox(SkyboxView),
    Pick(PickView),
}

#[derive(Debug, Clone)]
pub struct RenderView {
    id: ViewId,
    name: String,
    kind: ViewKind,
    width: u32,
    height: u32,
    custom_shader_name: Option<String>,
    view_matrix_source: MatrixSource,
    projection_matrix_source: MatrixSource,
    passes: Vec<RenderPassId>,
    state: ViewState,
}

impl RenderView {
    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn passes(&self) -> &[RenderPassId] {
        &self.passes
    }

    pub fn custom_shader_name(&self) -> Option<&str> {
        self.custom_shader_name.as_deref()
    }

    pub fn matrix_sources(&self) -> (MatrixSource, MatrixSource) {
        (self.view_matrix_source, self.projection_matrix_source)
    }

    /// The projection the next packet will carry. For pick views, the world pass projection.
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match &self.state {
            ViewState::World(w) => w.projection,
            ViewState::Ui(u) => u.projection,
            ViewState::Skybox(s) => s.projection,
            ViewState::Pick(p) => p.world_projection(),
        }
    }

    pub fn render_mode(&self) -> Option<RenderMode> {
        match &self.state {
            ViewState::World(w) => Some(w.render_mode),
            _ => None,
        }
    }

    /// Shader instances acquired by a pick view on each of its shaders.
    pub fn pick_instance_count(&self) -> Option<u32> {
        match &self.state {
            ViewState::Pick(p) => Some(p.instance_count()),
            _ => None,
        }
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        match &mut self.state {
            ViewState::World(w) => w.on_resize(width, height),
            ViewState::Ui(u) => u.on_resize(width, height),
            ViewState::Skybox(s) => s.on_resize(width, height),
            ViewState::Pick(p) => p.on_resize(width, height),
        }
    }
}

/// The systems view creation reaches into.
pub struct ViewDeps<'a> {
    pub renderer: &'a mut Renderer,
    pub shaders: &'a mut ShaderSystem,
    pub assets: &'a AssetManager,
}

pub struct RenderViewSystem {
    max_view_count: usize,
    views: Vec<Option<RenderView>>,
    lookup: HashMap<String, ViewId>,
}

impl RenderViewSystem {
    pub fn new(max_view_count: usize) -> Result<Self, ViewError> {
        if max_view_count == 0 {
            return Err(ViewError::Capacity(0));
        }
        Ok(Self {
            max_view_count,
            views: Vec::new(),
            lookup: HashMap::new(),
        })
    }

    /// Creates the view's render passes, its shaders and its render targets.
    pub fn create(
        &mut self,
        deps: ViewDeps<'_>,
        config: &RenderViewConfig,
    ) -> Result<ViewId, ViewError> {
        if config.name.is_empty() {
            return Err(ViewError::EmptyName);
        }
        if config.passes.is_empty() {
            return Err(ViewError::NoPasses(config.name.clone()));
        }
        if config.kind == ViewKind::Pick && config.passes.len() != 2 {
            return Err(ViewError::PassCount {
                view: config.name.clone(),
                expected: 2,
                actual: config.passes.len(),
            });
        }
        if self.lookup.contains_key(&config.name) {
            return Err(ViewError::Duplicate(config.name.clone()));
        }
        let slot = match self.views.iter().position(Option::is_none) {
            Some(slot) => slot,
            None if self.views.len() < self.max_view_count => {
                self.views.push(None);
                self.views.len() - 1
            }
            None => return Err(ViewError::Capacity(self.max_view_count)),
        };
        let id = ViewId(slot as u16);

        let ViewDeps {
            renderer,
            shaders,
            assets,
        } = deps;

        let mut passes = Vec::with_capacity(config.passes.len());
        for pass in &config.passes {
            match renderer.renderpass_create(pass) {
                Ok(pass_id) => passes.push(pass_id),
                Err(e) => {
                    log::error!("view '{}': creating render pass failed: {e}", config.name);
                    destroy_passes(renderer, &passes);
                    return Err(e.into());
                }
            }
        }

        let (fb_width, fb_height) = renderer.framebuffer_size();
        let width = if config.width == 0 { fb_width } else { config.width };
        let height = if config.height == 0 { fb_height } else { config.height };

        let mut shader_deps = ShaderDeps {
            renderer: &mut *renderer,
            shaders: &mut *shaders,
            assets,
            view: &config.name,
        };
        let state = match initial_state(&mut shader_deps, config, width, height) {
            Ok(state) => state,
            Err(e) => {
                log::error!("view '{}': resolving shaders failed: {e}", config.name);
                destroy_passes(renderer, &passes);
                return Err(e);
            }
        };

        self.views[slot] = Some(RenderView {
            id,
            name: config.name.clone(),
            kind: config.kind,
            width,
            height,
            custom_shader_name: config.custom_shader_name.clone(),
            view_matrix_source: config.view_matrix_source,
            projection_matrix_source: config.projection_matrix_source,
            passes,
            state,
        });
        self.lookup.insert(config.name.clone(), id);

        if let Err(e) = self.regenerate_render_targets(renderer, id) {
            log::error!("view '{}': building render targets failed: {e}", config.name);
            self.lookup.remove(&config.name);
            if let Some(mut view) = self.views[slot].take() {
                destroy_view(renderer, shaders, &mut view);
            }
            return Err(e);
        }
        log::debug!("created {:?} view '{}' ({width}x{height})", config.kind, config.name);
        Ok(id)
    }

    /// Looks a view up by name. An unknown name is a configuration error.
    pub fn get(&self, name: &str) -> Result<&RenderView, ViewError> {
        self.lookup
            .get(name)
            .and_then(|id| self.view(*id))
            .ok_or_else(|| ViewError::NotFound(name.to_string()))
    }

    pub fn get_id(&self, name: &str) -> Result<ViewId, ViewError> {
        self.get(name).map(RenderView::id)
    }

    pub fn view(&self, id: ViewId) -> Option<&RenderView> {
        self.views.get(id.0 as usize)?.as_ref()
    }

    fn view_mut(&mut self, id: ViewId) -> Result<&mut RenderView, ViewError> {
        self.views
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| ViewError::NotFound(format!("#{}", id.0)))
    }

    pub fn count(&self) -> usize {
        self.lookup.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderView> {
        self.views.iter().flatten()
    }

    /// Recomputes every view's projection and render targets for the new size.
    /// Views already at that size are left alone.
    pub fn on_window_resize(
        &mut self,
        renderer: &mut Renderer,
        width: u32,
        height: u32,
    ) -> Result<(), ViewError> {
        let ids: Vec<ViewId> = self.iter().map(RenderView::id).collect();
        for id in ids {
            let view = self.view_mut(id)?;
            if view.width == width && view.height == height {
                continue;
            }
            view.on_resize(width, height);
            for &pass in &view.passes {
                if let Some(pass) = renderer.renderpass_mut(pass) {
                    pass.render_area = [0.0, 0.0, width as f32, height as f32];
                }
            }
            self.regenerate_render_targets(renderer, id)?;
        }
        Ok(())
    }

    /// Rebuilds every render target of every pass of the view. Attachments sourced
    /// from the backend use its window and depth images, view-sourced ones the
    /// view's own textures.
    pub fn regenerate_render_targets(
        &mut self,
        renderer: &mut Renderer,
        id: ViewId,
    ) -> Result<(), ViewError> {
        let view = self.view_mut(id)?;
        let (width, height) = (view.width.max(1), view.height.max(1));
        if let ViewState::Pick(pick) = &mut view.state {
            pick.regenerate_attachments(renderer, width, height)?;
        }

        for &pass_id in &view.passes {
            let pass = renderer
                .renderpass(pass_id)
                .ok_or_else(|| RendererError::UnknownRenderPass(format!("#{}", pass_id.0)))?;
            let pass_handle = pass.handle;
            let layouts: Vec<Vec<(AttachmentType, AttachmentSource)>> = pass
                .targets
                .iter()
                .map(|t| t.attachments.iter().map(|a| (a.kind, a.source)).collect())
                .collect();

            for (index, layout) in layouts.into_iter().enumerate() {
                let old = renderer
                    .renderpass_mut(pass_id)
                    .and_then(|p| p.targets.get_mut(index))
                    .and_then(|t| t.handle.take());
                if let Some(old) = old {
                    renderer.backend_mut().render_target_destroy(old);
                }

                let mut attachments: Vec<BackendHandle> = Vec::with_capacity(layout.len());
                for (kind, source) in layout {
                    let handle = match (source, kind) {
                        (AttachmentSource::Default, AttachmentType::Colour) => {
                            renderer.backend().window_attachment(index as u8)
                        }
                        (AttachmentSource::Default, _) => {
                            renderer.backend().depth_attachment(index as u8)
                        }
                        (AttachmentSource::View, kind) => match &view.state {
                            ViewState::Pick(pick) => pick.attachment(kind),
                            _ => None,
                        },
                    };
                    let handle = handle.ok_or_else(|| {
                        BackendError::failed(
                            "render_target_create",
                            format!(
                                "view '{}' has no {kind:?} attachment for target {index}",
                                view.name
                            ),
                        )
                    })?;
                    attachments.push(handle);
                }

                let target = renderer
                    .backend_mut()
                    .render_target_create(&attachments, pass_handle, width, height)?;
                if let Some(slot) = renderer
                    .renderpass_mut(pass_id)
                    .and_then(|p| p.targets.get_mut(index))
                {
                    slot.handle = Some(target);
                    for (attachment, texture) in slot.attachments.iter_mut().zip(&attachments) {
                        attachment.texture = Some(*texture);
                    }
                }
            }
        }
        log::trace!("regenerated render targets of view '{}'", view.name);
        Ok(())
    }

    /// Builds this frame's packet for the named view.
    pub fn build_packet(
        &self,
        name: &str,
        payload: ViewPayload<'_>,
        transforms: &Transforms,
        cameras: &CameraSystem,
    ) -> Result<RenderViewPacket, ViewError> {
        let view = self.get(name)?;
        let (id, name) = (view.id, view.name.as_str());
        let mut packet = match (&view.state, payload) {
            (ViewState::World(w), ViewPayload::World { meshes }) => {
                w.build_packet(id, name, meshes, transforms, cameras)?
            }
            (ViewState::Ui(u), ViewPayload::Ui { meshes, texts }) => {
                u.build_packet(id, name, meshes, texts, transforms)
            }
            (ViewState::Skybox(s), ViewPayload::Skybox(skybox)) => {
                s.build_packet(id, name, skybox, cameras)?
            }
            (
                ViewState::Pick(p),
                ViewPayload::Pick {
                    world_meshes,
                    ui_meshes,
                    texts,
                },
            ) => p.build_packet(id, name, world_meshes, ui_meshes, texts, transforms, cameras)?,
            (_, payload) => {
                log::error!("view '{name}' cannot build a packet from a {} payload", payload.shape());
                return Err(ViewError::PayloadMismatch {
                    view: name.to_string(),
                    got: payload.shape(),
                });
            }
        };
        packet.custom_shader_name = view.custom_shader_name.clone();
        Ok(packet)
    }

    /// Consumes a packet after the renderer is done with it.
    pub fn on_destroy_packet(&self, packet: RenderViewPacket) {
        log::trace!(
            "view '{}' released a packet of {} geometries",
            packet.view_name,
            packet.geometry_count()
        );
    }

    /// Draws one packet through the view's passes.
    pub fn on_render(
        &mut self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        materials: &MaterialSystem,
        packet: &RenderViewPacket,
        frame_number: u64,
        render_target_index: u8,
    ) -> Result<(), ViewError> {
        let view = self.view_mut(packet.view_id)?;
        let passes = view.passes.clone();
        match &mut view.state {
            ViewState::World(w) => w.render(
                renderer,
                shaders,
                materials,
                &passes,
                packet,
                frame_number,
                render_target_index,
            ),
            ViewState::Ui(u) => u.render(
                renderer,
                shaders,
                materials,
                &passes,
                packet,
                frame_number,
                render_target_index,
            ),
            ViewState::Skybox(s) => {
                s.render(renderer, shaders, &passes, packet, frame_number, render_target_index)
            }
            ViewState::Pick(p) => p.render(renderer, shaders, &passes, packet, render_target_index),
        }
    }

    /// Sets the debug shading mode of every world view.
    pub fn set_render_mode(&mut self, mode: RenderMode) {
        for view in self.views.iter_mut().flatten() {
            if let ViewState::World(w) = &mut view.state {
                log::debug!("view '{}' render mode {mode:?}", view.name);
                w.render_mode = mode;
            }
        }
    }

    pub fn on_mouse_moved(&mut self, x: i32, y: i32) {
        for view in self.views.iter_mut().flatten() {
            if let ViewState::Pick(p) = &mut view.state {
                p.on_mouse_moved(x, y);
            }
        }
    }

    /// The object under the mouse as of the last rendered pick frame.
    pub fn hovered_id(&self) -> Option<u32> {
        self.iter().find_map(|view| match &view.state {
            ViewState::Pick(p) => p.hovered_id(),
            _ => None,
        })
    }

    pub fn destroy(
        &mut self,
        renderer: &mut Renderer,
        shaders: &mut ShaderSystem,
        name: &str,
    ) -> Result<(), ViewError> {
        let id = self
            .lookup
            .remove(name)
            .ok_or_else(|| ViewError::NotFound(name.to_string()))?;
        if let Some(mut view) = self.views.get_mut(id.0 as usize).and_then(Option::take) {
            destroy_view(renderer, shaders, &mut view);
        }
        Ok(())
    }

    pub fn shutdown(&mut self, renderer: &mut Renderer, shaders: &mut ShaderSystem) {
        for mut view in self.views.drain(..).flatten() {
            destroy_view(renderer, shaders, &mut view);
        }
        self.lookup.clear();
    }
}

fn destroy_view(renderer: &mut Renderer, shaders: &mut ShaderSystem, view: &mut RenderView) {
    destroy_passes(renderer, &view.passes);
    view.passes.clear();
    if let ViewState::Pick(pick) = &mut view.state {
        pick.destroy(renderer, shaders);
    }
    log::debug!("destroyed view '{}'", view.name);
}

/// Destroys the passes along with their render targets.
fn destroy_passes(renderer: &mut Renderer, passes: &[RenderPassId]) {
    for &pass in passes {
        if let Err(e) = renderer.renderpass_destroy(pass) {
            log::warn!("destroying render pass #{} failed: {e}", pass.0);
        }
    }
}

/// Resolves the view's shaders and uniform locations into its per-kind state.
fn initial_state(
    deps: &mut ShaderDeps<'_>,
    config: &RenderViewConfig,
    width: u32,
    height: u32,
) -> Result<ViewState, ViewError> {
    let state = match config.kind {
        ViewKind::World => {
            let shader = config
                .custom_shader_name
                .as_deref()
                .unwrap_or(BUILTIN_MATERIAL_SHADER);
            let (shader_id, _) = deps.load(shader, &WORLD_UNIFORMS)?;
            ViewState::World(WorldView::new(shader_id, width, height))
        }
        ViewKind::Ui => {
            let shader = config.custom_shader_name.as_deref().unwrap_or(BUILTIN_UI_SHADER);
            let (shader_id, _) = deps.load(shader, &UI_UNIFORMS)?;
            ViewState::Ui(UiView::new(shader_id, width, height))
        }
        ViewKind::Skybox => {
            let shader = config
                .custom_shader_name
                .as_deref()
                .unwrap_or(BUILTIN_SKYBOX_SHADER);
            let (shader_id, locations) = deps.load(shader, &SKYBOX_UNIFORMS)?;
            let locations = [locations[0], locations[1], locations[2]];
            ViewState::Skybox(SkyboxView::new(shader_id, locations, width, height))
        }
        ViewKind::Pick => {
            let (world_id, world_locations) = deps.load(BUILTIN_WORLD_PICK_SHADER, &PICK_UNIFORMS)?;
            let (ui_id, ui_locations) = deps.load(BUILTIN_UI_PICK_SHADER, &PICK_UNIFORMS)?;
            let world = PickShaderInfo::new(
                world_id,
                [world_locations[0], world_locations[1], world_locations[2], world_locations[3]],
                PickView::world_fov(),
            );
            let ui = PickShaderInfo::new(
                ui_id,
                [ui_locations[0], ui_locations[1], ui_locations[2], ui_locations[3]],
                None,
            );
            ViewState::Pick(PickView::new(world, ui, width, height))
        }
    };
    Ok(state)
}

/// Draws the view systems for one frame. Handed to [`Renderer::draw_frame`].
pub struct ViewFrame<'a> {
    pub views: &'a mut RenderViewSystem,
    pub shaders: &'a mut ShaderSystem,
    pub materials: &'a MaterialSystem,
}

impl FrameViews for ViewFrame<'_> {
    fn on_window_resize(
        &mut self,
        renderer: &mut Renderer,
        width: u32,
        height: u32,
    ) -> Result<(), ViewError> {
        self.views.on_window_resize(renderer, width, height)
    }

    fn on_render(
        &mut self,
        renderer: &mut Renderer,
        packet: &RenderViewPacket,
        frame_number: u64,
        render_target_index: u8,
    ) -> Result<(), ViewError> {
        self.views.on_render(
            renderer,
            self.shaders,
            self.materials,
            packet,
            frame_number,
            render_target_index,
        )
    }
}

/// Shader lookup for view creation: reuses a shader already created under the
/// name, otherwise loads its config through the asset manager.
struct ShaderDeps<'a> {
    renderer: &'a mut Renderer,
    shaders: &'a mut ShaderSystem,
    assets: &'a AssetManager,
    view: &'a str,
}

impl ShaderDeps<'_> {
    /// Returns the shader id and the location of each of `uniforms`, in order.
    fn load(&mut self, shader: &str, uniforms: &[&str]) -> Result<(u32, Vec<u16>), ViewError> {
        let shader_id = match self.shaders.get_id(shader) {
            Some(id) => id,
            None => {
                let resource = self
                    .assets
                    .load(shader, ResourceType::Shader, LoadParams::default())
                    .map_err(|e| ViewError::ShaderLoad {
                        view: self.view.to_string(),
                        shader: shader.to_string(),
                        source: e.into(),
                    })?;
                let ResourceData::Shader(config) = &resource.data else {
                    return Err(ViewError::ShaderLoad {
                        view: self.view.to_string(),
                        shader: shader.to_string(),
                        source: anyhow::anyhow!("asset is not a shader config"),
                    });
                };
                let id = self.shaders.create(self.renderer, config)?;
                self.assets.unload(resource);
                id
            }
        };
        let locations = uniforms
            .iter()
            .map(|uniform| {
                self.shaders
                    .uniform_index(shader_id, uniform)
                    .ok_or_else(|| ViewError::MissingUniform {
                        view: self.view.to_string(),
                        shader: shader.to_string(),
                        uniform: uniform.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((shader_id, locations))
    }
}

pub(crate) fn perspective(
    fov: Rad<f32>,
    width: u32,
    height: u32,
    near_clip: f32,
    far_clip: f32,
) -> Matrix4<f32> {
    let aspect = if width == 0 || height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    };
    cgmath::perspective(fov, aspect, near_clip, far_clip)
}

pub(crate) fn orthographic(width: u32, height: u32, near_clip: f32, far_clip: f32) -> Matrix4<f32> {
    cgmath::ortho(
        0.0,
        width.max(1) as f32,
        height.max(1) as f32,
        0.0,
        near_clip,
        far_clip,
    )
}

/// Issues the draw for one geometry. Geometry that never reached the backend is skipped.
pub(crate) fn draw_geometry(renderer: &mut Renderer, geometry: &Geometry) -> Result<(), ViewError> {
    match geometry.handle {
        Some(handle) => Ok(renderer.backend_mut().geometry_draw(handle)?),
        None => {
            log::warn!("geometry '{}' has no backend handle, skipping draw", geometry.name);
            Ok(())
        }
    }
}
