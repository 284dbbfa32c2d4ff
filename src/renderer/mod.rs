//! Renderer front end.
//!
//! [`Renderer`] owns the backend, the render passes and the frame counter. It does
//! not know about view kinds; [`Renderer::draw_frame`] brackets the frame and asks a
//! [`FrameViews`] implementation to render each view packet.
//!
//! Resizes are debounced: after the last resize event the renderer waits a number
//! of frames before it tells the backend and the views, so dragging a window edge
//! does not rebuild the swapchain every frame.

use std::{collections::HashMap, time::Duration};

use crate::{
    config::{RenderPassConfig, RendererConfig},
    error::{BackendError, RendererError, ViewError},
    render::{RenderPacket, RenderViewPacket},
    renderer::backend::{
        AttachmentLoadOp, AttachmentSource, AttachmentStoreOp, AttachmentType, BackendConfig,
        BackendHandle, ClearFlags, RenderPassDesc, RendererBackend,
    },
};

pub mod backend;
pub mod headless;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassId(pub u16);

#[derive(Debug, Clone)]
pub struct RenderTargetAttachment {
    pub kind: AttachmentType,
    pub source: AttachmentSource,
    pub load_operation: AttachmentLoadOp,
    pub store_operation: AttachmentStoreOp,
    pub present_after: bool,
    pub texture: Option<BackendHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    pub attachments: Vec<RenderTargetAttachment>,
    pub handle: Option<BackendHandle>,
}

#[derive(Debug, Clone)]
pub struct RenderPass {
    pub id: RenderPassId,
    pub name: String,
    /// x, y, width, height
    pub render_area: [f32; 4],
    pub clear_colour: [f32; 4],
    pub clear_flags: ClearFlags,
    pub depth: f32,
    pub stencil: u32,
    pub targets: Vec<RenderTarget>,
    pub handle: BackendHandle,
}

/// What happened to a frame handed to [`Renderer::draw_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Drawn,
    /// Nothing was submitted: a resize is settling or the swapchain is rebuilding.
    Skipped,
}

/// The per-view half of a frame, implemented by the render view system.
pub trait FrameViews {
    fn on_window_resize(
        &mut self,
        renderer: &mut Renderer,
        width: u32,
        height: u32,
    ) -> Result<(), ViewError>;

    fn on_render(
        &mut self,
        renderer: &mut Renderer,
        packet: &RenderViewPacket,
        frame_number: u64,
        render_target_index: u8,
    ) -> Result<(), ViewError>;
}

pub struct Renderer {
    backend: Box<dyn RendererBackend>,
    frame_number: u64,
    framebuffer_width: u32,
    framebuffer_height: u32,
    resizing: bool,
    frames_since_resize: u32,
    resize_debounce_frames: u32,
    resize_sleep: Duration,
    window_render_target_count: u8,
    passes: Vec<Option<RenderPass>>,
    pass_lookup: HashMap<String, RenderPassId>,
}

impl Renderer {
    pub fn new(backend: Box<dyn RendererBackend>, config: &RendererConfig) -> Self {
        Self {
            backend,
            frame_number: 0,
            framebuffer_width: 1280,
            framebuffer_height: 720,
            resizing: false,
            frames_since_resize: 0,
            resize_debounce_frames: config.resize_debounce_frames,
            resize_sleep: Duration::from_millis(config.resize_sleep_ms),
            window_render_target_count: 0,
            passes: Vec::new(),
            pass_lookup: HashMap::new(),
        }
    }

    pub fn initialize(
        &mut self,
        application_name: &str,
        width: u32,
        height: u32,
    ) -> Result<(), RendererError> {
        self.framebuffer_width = width;
        self.framebuffer_height = height;
        self.window_render_target_count = self.backend.initialize(&BackendConfig {
            application_name: application_name.to_string(),
            width,
            height,
        })?;
        log::info!(
            "renderer initialized ({width}x{height}, {} window targets)",
            self.window_render_target_count
        );
        Ok(())
    }

    pub fn shutdown(&mut self) {
        for pass in self.passes.drain(..).flatten() {
            for target in pass.targets {
                if let Some(handle) = target.handle {
                    self.backend.render_target_destroy(handle);
                }
            }
            self.backend.renderpass_destroy(pass.handle);
        }
        self.pass_lookup.clear();
        self.backend.shutdown();
    }

    pub fn backend(&self) -> &dyn RendererBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn RendererBackend {
        self.backend.as_mut()
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn framebuffer_size(&self) -> (u32, u32) {
        (self.framebuffer_width, self.framebuffer_height)
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    pub fn window_render_target_count(&self) -> u8 {
        self.window_render_target_count
    }

    pub fn renderpass_create(
        &mut self,
        config: &RenderPassConfig,
    ) -> Result<RenderPassId, RendererError> {
        if self.pass_lookup.contains_key(&config.name) {
            return Err(RendererError::DuplicateRenderPass(config.name.clone()));
        }
        let attachment_kinds: Vec<AttachmentType> =
            config.target.attachments.iter().map(|a| a.kind).collect();
        let handle = self.backend.renderpass_create(&RenderPassDesc {
            name: &config.name,
            render_area: config.render_area,
            clear_colour: config.clear_colour,
            clear_flags: config.clear_flags,
            depth: config.depth,
            stencil: config.stencil,
            attachments: &attachment_kinds,
        })?;
        let target_count = if config.render_target_count == 0 {
            1
        } else {
            config.render_target_count
        };
        let targets = (0..target_count)
            .map(|_| RenderTarget {
                attachments: config
                    .target
                    .attachments
                    .iter()
                    .map(|a| RenderTargetAttachment {
                        kind: a.kind,
                        source: a.source,
                        load_operation: a.load_operation,
                        store_operation: a.store_operation,
                        present_after: a.present_after,
                        texture: None,
                    })
                    .collect(),
                handle: None,
            })
            .collect();
        let slot = match self.passes.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                self.passes.push(None);
                self.passes.len() - 1
            }
        };
        let id = RenderPassId(slot as u16);
        self.passes[slot] = Some(RenderPass {
            id,
            name: config.name.clone(),
            render_area: config.render_area,
            clear_colour: config.clear_colour,
            clear_flags: config.clear_flags,
            depth: config.depth,
            stencil: config.stencil,
            targets,
            handle,
        });
        self.pass_lookup.insert(config.name.clone(), id);
        log::debug!("created render pass '{}'", config.name);
        Ok(id)
    }

    pub fn renderpass_id(&self, name: &str) -> Option<RenderPassId> {
        self.pass_lookup.get(name).copied()
    }

    pub fn renderpass(&self, id: RenderPassId) -> Option<&RenderPass> {
        self.passes.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn renderpass_mut(&mut self, id: RenderPassId) -> Option<&mut RenderPass> {
        self.passes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Destroys the pass and its built render targets. The name becomes free for
    /// a new pass and the slot is reused.
    pub fn renderpass_destroy(&mut self, id: RenderPassId) -> Result<(), RendererError> {
        let pass = self
            .passes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or_else(|| RendererError::UnknownRenderPass(format!("#{}", id.0)))?;
        for target in pass.targets {
            if let Some(handle) = target.handle {
                self.backend.render_target_destroy(handle);
            }
        }
        self.backend.renderpass_destroy(pass.handle);
        self.pass_lookup.remove(&pass.name);
        log::debug!("destroyed render pass '{}'", pass.name);
        Ok(())
    }

    pub fn renderpass_begin(
        &mut self,
        id: RenderPassId,
        target_index: u8,
    ) -> Result<(), RendererError> {
        let pass = self
            .passes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RendererError::UnknownRenderPass(format!("#{}", id.0)))?;
        let target = pass
            .targets
            .get(target_index as usize)
            .and_then(|t| t.handle)
            .ok_or_else(|| {
                RendererError::Backend(BackendError::failed(
                    "renderpass_begin",
                    format!("pass '{}' has no render target {target_index}", pass.name),
                ))
            })?;
        self.backend
            .renderpass_begin(pass.handle, pass.render_area, target)?;
        Ok(())
    }

    pub fn renderpass_end(&mut self, id: RenderPassId) -> Result<(), RendererError> {
        let pass = self
            .passes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RendererError::UnknownRenderPass(format!("#{}", id.0)))?;
        self.backend.renderpass_end(pass.handle)?;
        Ok(())
    }

    /// Records a window resize. It is applied once resize events have stopped for
    /// the configured number of frames.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        self.framebuffer_width = width;
        self.framebuffer_height = height;
        self.resizing = true;
        self.frames_since_resize = 0;
        log::trace!("resize to {width}x{height} pending");
    }

    /// Draws one frame: begin, one `on_render` per view packet, end.
    ///
    /// A failing begin aborts the frame without calling end. A failing end is
    /// returned to the caller, which should stop the loop.
    pub fn draw_frame(
        &mut self,
        packet: &RenderPacket,
        views: &mut dyn FrameViews,
    ) -> Result<FrameOutcome, RendererError> {
        self.frame_number += 1;

        if self.resizing {
            self.frames_since_resize += 1;
            if self.frames_since_resize < self.resize_debounce_frames {
                std::thread::sleep(self.resize_sleep);
                return Ok(FrameOutcome::Skipped);
            }
            let (width, height) = (self.framebuffer_width, self.framebuffer_height);
            self.backend.resized(width, height);
            views
                .on_window_resize(self, width, height)
                .map_err(|e| RendererError::View {
                    view: "<resize>".to_string(),
                    source: Box::new(e),
                })?;
            self.resizing = false;
            self.frames_since_resize = 0;
            log::info!("resize applied: {width}x{height}");
        }

        match self.backend.begin_frame(packet.delta_time) {
            Ok(()) => {}
            Err(BackendError::SwapchainBooting) => {
                log::info!("swapchain is booting, skipping frame {}", self.frame_number);
                return Ok(FrameOutcome::Skipped);
            }
            Err(e) => {
                log::error!("begin frame failed: {e}");
                return Err(RendererError::BeginFrame(e));
            }
        }

        let frame_number = self.frame_number;
        let target_index = self.backend.window_attachment_index();
        for view_packet in &packet.views {
            views
                .on_render(self, view_packet, frame_number, target_index)
                .map_err(|e| {
                    log::error!("view '{}' failed to render: {e}", view_packet.view_name);
                    RendererError::View {
                        view: view_packet.view_name.clone(),
                        source: Box::new(e),
                    }
                })?;
        }

        self.backend.end_frame(packet.delta_time).map_err(|e| {
            log::error!("end frame failed, the renderer cannot continue: {e}");
            RendererError::EndFrame(e)
        })?;
        Ok(FrameOutcome::Drawn)
    }
}
