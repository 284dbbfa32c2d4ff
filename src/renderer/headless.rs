//! In-memory backend without a GPU.
//!
//! [`HeadlessBackend`] implements [`RendererBackend`] by recording every call and
//! keeping texture pixels and render buffers in plain vectors. It is what the
//! engine's tests run against, and a starting point for new backends.
//!
//! Rasterization is reduced to the minimum picking needs: a render pass whose
//! clear flags include colour fills its colour attachment with the clear colour,
//! and a draw issued while the bound shader instance has an `id_colour` uniform
//! set fills the colour attachment with that colour.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    data_structures::{shader::ShaderUniform, texture::TextureMap},
    error::BackendError,
    renderer::backend::{
        BackendConfig, BackendHandle, ClearFlags, RenderBufferType, RenderPassDesc,
        RendererBackend, ShaderDesc, TextureDesc, UniformValue,
    },
};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadlessCall {
    Initialize { width: u32, height: u32 },
    Shutdown,
    Resized { width: u32, height: u32 },
    BeginFrame,
    EndFrame,
    TextureCreate { texture: BackendHandle, name: String },
    TextureCreateWriteable { texture: BackendHandle, name: String },
    TextureResize { texture: BackendHandle, width: u32, height: u32 },
    TextureWrite { texture: BackendHandle },
    TextureReadPixel { texture: BackendHandle, x: u32, y: u32 },
    TextureDestroy(BackendHandle),
    TextureMapAcquire(BackendHandle),
    TextureMapRelease(BackendHandle),
    GeometryCreate { geometry: BackendHandle, vertex_count: u32, index_count: u32 },
    GeometryDestroy(BackendHandle),
    GeometryDraw(BackendHandle),
    RenderPassCreate { pass: BackendHandle, name: String },
    RenderPassDestroy(BackendHandle),
    RenderPassBegin { pass: BackendHandle, target: BackendHandle },
    RenderPassEnd(BackendHandle),
    RenderTargetCreate { target: BackendHandle, attachments: Vec<BackendHandle>, width: u32, height: u32 },
    RenderTargetDestroy(BackendHandle),
    ShaderCreate { shader: BackendHandle, name: String },
    ShaderDestroy(BackendHandle),
    ShaderInitialize(BackendHandle),
    ShaderUse(BackendHandle),
    ShaderBindGlobals(BackendHandle),
    ShaderBindInstance { shader: BackendHandle, instance_id: u32 },
    ShaderApplyGlobals(BackendHandle),
    ShaderApplyInstance { shader: BackendHandle, needs_update: bool },
    ShaderAcquireInstance { shader: BackendHandle, instance_id: u32 },
    ShaderReleaseInstance { shader: BackendHandle, instance_id: u32 },
    SetUniform { shader: BackendHandle, name: String, value: UniformValue },
    RenderBuffer { op: &'static str, buffer: BackendHandle },
}

struct HeadlessTexture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

struct HeadlessBuffer {
    kind: RenderBufferType,
    data: Vec<u8>,
    /// Free ranges as (offset, size), sorted by offset. `None` without a free list.
    free: Option<Vec<(u64, u64)>>,
}

#[derive(Default)]
struct HeadlessShader {
    name: String,
    next_instance: u32,
    released: Vec<u32>,
    bound_instance: Option<u32>,
    /// `id_colour` per instance, as last written.
    id_colours: HashMap<u32, [u8; 4]>,
}

impl HeadlessShader {
    fn id_colour(&self) -> Option<[u8; 4]> {
        self.id_colours.get(&self.bound_instance?).copied()
    }
}

struct HeadlessPass {
    clear_colour: [f32; 4],
    clear_flags: ClearFlags,
}

#[derive(Default)]
struct HeadlessState {
    calls: Vec<HeadlessCall>,
    next_handle: u32,
    width: u32,
    height: u32,
    window_images: Vec<BackendHandle>,
    depth_images: Vec<BackendHandle>,
    image_index: u8,
    textures: HashMap<BackendHandle, HeadlessTexture>,
    buffers: HashMap<BackendHandle, HeadlessBuffer>,
    shaders: HashMap<BackendHandle, HeadlessShader>,
    passes: HashMap<BackendHandle, HeadlessPass>,
    targets: HashMap<BackendHandle, Vec<BackendHandle>>,
    geometries: HashMap<BackendHandle, u32>,
    active_target: Option<BackendHandle>,
    bound_shader: Option<BackendHandle>,
    fail_begin: Option<BackendError>,
    fail_end: Option<BackendError>,
    frames: u64,
}

impl HeadlessState {
    fn next(&mut self) -> BackendHandle {
        self.next_handle += 1;
        BackendHandle(self.next_handle)
    }

    fn record(&mut self, call: HeadlessCall) {
        self.calls.push(call);
    }

    fn texture_mut(&mut self, handle: BackendHandle) -> Result<&mut HeadlessTexture, BackendError> {
        self.textures
            .get_mut(&handle)
            .ok_or(BackendError::UnknownHandle(handle.0))
    }

    fn buffer_mut(&mut self, handle: BackendHandle) -> Result<&mut HeadlessBuffer, BackendError> {
        self.buffers
            .get_mut(&handle)
            .ok_or(BackendError::UnknownHandle(handle.0))
    }

    fn shader_mut(&mut self, handle: BackendHandle) -> Result<&mut HeadlessShader, BackendError> {
        self.shaders
            .get_mut(&handle)
            .ok_or(BackendError::UnknownHandle(handle.0))
    }

    /// First colour attachment of the active render target that holds pixels.
    fn fill_active_colour(&mut self, rgba: [u8; 4]) {
        let Some(target) = self.active_target else {
            return;
        };
        let attachments = self.targets.get(&target).cloned().unwrap_or_default();
        for attachment in attachments {
            if let Some(texture) = self.textures.get_mut(&attachment) {
                for pixel in texture.pixels.chunks_exact_mut(4) {
                    pixel.copy_from_slice(&rgba);
                }
                return;
            }
        }
    }
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Shared view of a [`HeadlessBackend`]'s state for assertions.
#[derive(Clone)]
pub struct HeadlessRecorder(Arc<Mutex<HeadlessState>>);

impl HeadlessRecorder {
    pub fn calls(&self) -> Vec<HeadlessCall> {
        self.0.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.lock().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&HeadlessCall) -> bool) -> usize {
        self.0.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn frames_ended(&self) -> u64 {
        self.0.lock().frames
    }

    /// Makes every following `begin_frame` fail with `error`, or succeed again with `None`.
    pub fn fail_begin_frame(&self, error: Option<BackendError>) {
        self.0.lock().fail_begin = error;
    }

    pub fn fail_end_frame(&self, error: Option<BackendError>) {
        self.0.lock().fail_end = error;
    }

    pub fn live_textures(&self) -> usize {
        self.0.lock().textures.len()
    }

    pub fn texture_size(&self, texture: BackendHandle) -> Option<(u32, u32)> {
        self.0
            .lock()
            .textures
            .get(&texture)
            .map(|t| (t.width, t.height))
    }

    pub fn pixel(&self, texture: BackendHandle, x: u32, y: u32) -> Option<[u8; 4]> {
        let state = self.0.lock();
        let t = state.textures.get(&texture)?;
        let i = ((y * t.width + x) * 4) as usize;
        t.pixels.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    pub fn instance_count(&self, shader_name: &str) -> u32 {
        let state = self.0.lock();
        state
            .shaders
            .values()
            .find(|s| s.name == shader_name)
            .map(|s| s.next_instance - s.released.len() as u32)
            .unwrap_or(0)
    }
}

pub struct HeadlessBackend {
    state: Arc<Mutex<HeadlessState>>,
    multithreaded: bool,
    window_image_count: u8,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HeadlessState::default())),
            multithreaded: false,
            window_image_count: 3,
        }
    }

    pub fn multithreaded(mut self, multithreaded: bool) -> Self {
        self.multithreaded = multithreaded;
        self
    }

    pub fn recorder(&self) -> HeadlessRecorder {
        HeadlessRecorder(Arc::clone(&self.state))
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBackend for HeadlessBackend {
    fn initialize(&mut self, config: &BackendConfig) -> Result<u8, BackendError> {
        let mut s = self.state.lock();
        s.width = config.width;
        s.height = config.height;
        s.record(HeadlessCall::Initialize {
            width: config.width,
            height: config.height,
        });
        for _ in 0..self.window_image_count {
            let colour = s.next();
            let depth = s.next();
            s.window_images.push(colour);
            s.depth_images.push(depth);
        }
        log::debug!(
            "headless backend '{}' up with {} window images",
            config.application_name,
            self.window_image_count
        );
        Ok(self.window_image_count)
    }

    fn shutdown(&mut self) {
        let mut s = self.state.lock();
        s.record(HeadlessCall::Shutdown);
        s.textures.clear();
        s.buffers.clear();
        s.shaders.clear();
    }

    fn resized(&mut self, width: u32, height: u32) {
        let mut s = self.state.lock();
        s.width = width;
        s.height = height;
        s.record(HeadlessCall::Resized { width, height });
    }

    fn begin_frame(&mut self, _delta_time: f64) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        if let Some(e) = s.fail_begin.clone() {
            return Err(e);
        }
        s.record(HeadlessCall::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self, _delta_time: f64) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        if let Some(e) = s.fail_end.clone() {
            return Err(e);
        }
        s.record(HeadlessCall::EndFrame);
        s.frames += 1;
        s.image_index = ((s.image_index as usize + 1) % s.window_images.len().max(1)) as u8;
        Ok(())
    }

    fn window_attachment_index(&self) -> u8 {
        self.state.lock().image_index
    }

    fn window_attachment(&self, index: u8) -> Option<BackendHandle> {
        self.state.lock().window_images.get(index as usize).copied()
    }

    fn depth_attachment(&self, index: u8) -> Option<BackendHandle> {
        self.state.lock().depth_images.get(index as usize).copied()
    }

    fn is_multithreaded(&self) -> bool {
        self.multithreaded
    }

    fn texture_create(
        &mut self,
        desc: &TextureDesc,
        pixels: &[u8],
    ) -> Result<BackendHandle, BackendError> {
        let expected = (desc.width * desc.height * desc.channel_count as u32) as usize;
        if pixels.len() < expected {
            return Err(BackendError::failed(
                "texture_create",
                format!(
                    "'{}' needs {expected} bytes, got {}",
                    desc.name,
                    pixels.len()
                ),
            ));
        }
        let mut s = self.state.lock();
        let handle = s.next();
        s.textures.insert(
            handle,
            HeadlessTexture {
                width: desc.width,
                height: desc.height,
                pixels: pixels.to_vec(),
            },
        );
        s.record(HeadlessCall::TextureCreate {
            texture: handle,
            name: desc.name.clone(),
        });
        Ok(handle)
    }

    fn texture_create_writeable(&mut self, desc: &TextureDesc) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.textures.insert(
            handle,
            HeadlessTexture {
                width: desc.width,
                height: desc.height,
                pixels: vec![0; (desc.width * desc.height * 4) as usize],
            },
        );
        s.record(HeadlessCall::TextureCreateWriteable {
            texture: handle,
            name: desc.name.clone(),
        });
        Ok(handle)
    }

    fn texture_resize(
        &mut self,
        texture: BackendHandle,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let t = s.texture_mut(texture)?;
        t.width = width;
        t.height = height;
        t.pixels = vec![0; (width * height * 4) as usize];
        s.record(HeadlessCall::TextureResize {
            texture,
            width,
            height,
        });
        Ok(())
    }

    fn texture_write_data(
        &mut self,
        texture: BackendHandle,
        offset: u32,
        pixels: &[u8],
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let t = s.texture_mut(texture)?;
        let start = offset as usize;
        let end = start + pixels.len();
        if end > t.pixels.len() {
            return Err(BackendError::failed(
                "texture_write_data",
                format!("write of {} bytes at {start} overflows", pixels.len()),
            ));
        }
        t.pixels[start..end].copy_from_slice(pixels);
        s.record(HeadlessCall::TextureWrite { texture });
        Ok(())
    }

    fn texture_read_pixel(
        &mut self,
        texture: BackendHandle,
        x: u32,
        y: u32,
    ) -> Result<[u8; 4], BackendError> {
        let mut s = self.state.lock();
        let t = s.texture_mut(texture)?;
        if x >= t.width || y >= t.height {
            return Err(BackendError::failed(
                "texture_read_pixel",
                format!("({x}, {y}) outside {}x{}", t.width, t.height),
            ));
        }
        let i = ((y * t.width + x) * 4) as usize;
        let pixel = [t.pixels[i], t.pixels[i + 1], t.pixels[i + 2], t.pixels[i + 3]];
        s.record(HeadlessCall::TextureReadPixel { texture, x, y });
        Ok(pixel)
    }

    fn texture_destroy(&mut self, texture: BackendHandle) {
        let mut s = self.state.lock();
        s.textures.remove(&texture);
        s.record(HeadlessCall::TextureDestroy(texture));
    }

    fn texture_map_acquire_resources(
        &mut self,
        _map: &TextureMap,
    ) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.record(HeadlessCall::TextureMapAcquire(handle));
        Ok(handle)
    }

    fn texture_map_release_resources(&mut self, map: BackendHandle) {
        self.state.lock().record(HeadlessCall::TextureMapRelease(map));
    }

    fn geometry_create(
        &mut self,
        vertex_size: u32,
        vertex_count: u32,
        vertices: &[u8],
        indices: &[u32],
    ) -> Result<BackendHandle, BackendError> {
        if vertices.len() != (vertex_size * vertex_count) as usize {
            return Err(BackendError::failed(
                "geometry_create",
                format!(
                    "{} vertex bytes for {vertex_count} vertices of {vertex_size} bytes",
                    vertices.len()
                ),
            ));
        }
        let mut s = self.state.lock();
        let handle = s.next();
        s.geometries.insert(handle, indices.len() as u32);
        s.record(HeadlessCall::GeometryCreate {
            geometry: handle,
            vertex_count,
            index_count: indices.len() as u32,
        });
        Ok(handle)
    }

    fn geometry_destroy(&mut self, geometry: BackendHandle) {
        let mut s = self.state.lock();
        s.geometries.remove(&geometry);
        s.record(HeadlessCall::GeometryDestroy(geometry));
    }

    fn geometry_draw(&mut self, geometry: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        if !s.geometries.contains_key(&geometry) {
            return Err(BackendError::UnknownHandle(geometry.0));
        }
        let id_colour = s
            .bound_shader
            .and_then(|shader| s.shaders.get(&shader))
            .and_then(|shader| shader.id_colour());
        if let Some(rgba) = id_colour {
            s.fill_active_colour(rgba);
        }
        s.record(HeadlessCall::GeometryDraw(geometry));
        Ok(())
    }

    fn renderpass_create(&mut self, desc: &RenderPassDesc<'_>) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.passes.insert(
            handle,
            HeadlessPass {
                clear_colour: desc.clear_colour,
                clear_flags: desc.clear_flags,
            },
        );
        s.record(HeadlessCall::RenderPassCreate {
            pass: handle,
            name: desc.name.to_string(),
        });
        Ok(handle)
    }

    fn renderpass_destroy(&mut self, pass: BackendHandle) {
        let mut s = self.state.lock();
        s.passes.remove(&pass);
        s.record(HeadlessCall::RenderPassDestroy(pass));
    }

    fn renderpass_begin(
        &mut self,
        pass: BackendHandle,
        _render_area: [f32; 4],
        target: BackendHandle,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        if !s.targets.contains_key(&target) {
            return Err(BackendError::UnknownHandle(target.0));
        }
        let (clear_colour, clear_flags) = match s.passes.get(&pass) {
            Some(p) => (p.clear_colour, p.clear_flags),
            None => return Err(BackendError::UnknownHandle(pass.0)),
        };
        s.active_target = Some(target);
        if clear_flags.contains(ClearFlags::COLOUR) {
            s.fill_active_colour(clear_colour.map(to_byte));
        }
        s.record(HeadlessCall::RenderPassBegin { pass, target });
        Ok(())
    }

    fn renderpass_end(&mut self, pass: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.active_target = None;
        s.record(HeadlessCall::RenderPassEnd(pass));
        Ok(())
    }

    fn render_target_create(
        &mut self,
        attachments: &[BackendHandle],
        _pass: BackendHandle,
        width: u32,
        height: u32,
    ) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.targets.insert(handle, attachments.to_vec());
        s.record(HeadlessCall::RenderTargetCreate {
            target: handle,
            attachments: attachments.to_vec(),
            width,
            height,
        });
        Ok(handle)
    }

    fn render_target_destroy(&mut self, target: BackendHandle) {
        let mut s = self.state.lock();
        s.targets.remove(&target);
        s.record(HeadlessCall::RenderTargetDestroy(target));
    }

    fn shader_create(
        &mut self,
        desc: &ShaderDesc<'_>,
        _pass: BackendHandle,
    ) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.shaders.insert(
            handle,
            HeadlessShader {
                name: desc.name.to_string(),
                ..Default::default()
            },
        );
        s.record(HeadlessCall::ShaderCreate {
            shader: handle,
            name: desc.name.to_string(),
        });
        Ok(handle)
    }

    fn shader_destroy(&mut self, shader: BackendHandle) {
        let mut s = self.state.lock();
        s.shaders.remove(&shader);
        s.record(HeadlessCall::ShaderDestroy(shader));
    }

    fn shader_initialize(&mut self, shader: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?;
        s.record(HeadlessCall::ShaderInitialize(shader));
        Ok(())
    }

    fn shader_use(&mut self, shader: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?.bound_instance = None;
        s.bound_shader = Some(shader);
        s.record(HeadlessCall::ShaderUse(shader));
        Ok(())
    }

    fn shader_bind_globals(&mut self, shader: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?;
        s.record(HeadlessCall::ShaderBindGlobals(shader));
        Ok(())
    }

    fn shader_bind_instance(
        &mut self,
        shader: BackendHandle,
        instance_id: u32,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let sh = s.shader_mut(shader)?;
        if instance_id >= sh.next_instance || sh.released.contains(&instance_id) {
            return Err(BackendError::failed(
                "shader_bind_instance",
                format!("instance {instance_id} of '{}' is not acquired", sh.name),
            ));
        }
        sh.bound_instance = Some(instance_id);
        s.record(HeadlessCall::ShaderBindInstance {
            shader,
            instance_id,
        });
        Ok(())
    }

    fn shader_apply_globals(&mut self, shader: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?;
        s.record(HeadlessCall::ShaderApplyGlobals(shader));
        Ok(())
    }

    fn shader_apply_instance(
        &mut self,
        shader: BackendHandle,
        needs_update: bool,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?;
        s.record(HeadlessCall::ShaderApplyInstance {
            shader,
            needs_update,
        });
        Ok(())
    }

    fn shader_acquire_instance_resources(
        &mut self,
        shader: BackendHandle,
        _maps: &[TextureMap],
    ) -> Result<u32, BackendError> {
        let mut s = self.state.lock();
        let sh = s.shader_mut(shader)?;
        let instance_id = sh.next_instance;
        sh.next_instance += 1;
        s.record(HeadlessCall::ShaderAcquireInstance {
            shader,
            instance_id,
        });
        Ok(instance_id)
    }

    fn shader_release_instance_resources(
        &mut self,
        shader: BackendHandle,
        instance_id: u32,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.shader_mut(shader)?.released.push(instance_id);
        s.record(HeadlessCall::ShaderReleaseInstance {
            shader,
            instance_id,
        });
        Ok(())
    }

    fn shader_set_uniform(
        &mut self,
        shader: BackendHandle,
        uniform: &ShaderUniform,
        value: &UniformValue,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let sh = s.shader_mut(shader)?;
        if let (true, Some(instance), UniformValue::Vec3([r, g, b])) =
            (uniform.name == "id_colour", sh.bound_instance, *value)
        {
            sh.id_colours
                .insert(instance, [to_byte(r), to_byte(g), to_byte(b), 255]);
        }
        s.record(HeadlessCall::SetUniform {
            shader,
            name: uniform.name.clone(),
            value: *value,
        });
        Ok(())
    }

    fn render_buffer_create(
        &mut self,
        kind: RenderBufferType,
        size: u64,
        use_freelist: bool,
    ) -> Result<BackendHandle, BackendError> {
        let mut s = self.state.lock();
        let handle = s.next();
        s.buffers.insert(
            handle,
            HeadlessBuffer {
                kind,
                data: vec![0; size as usize],
                free: use_freelist.then(|| vec![(0, size)]),
            },
        );
        s.record(HeadlessCall::RenderBuffer {
            op: "create",
            buffer: handle,
        });
        Ok(handle)
    }

    fn render_buffer_destroy(&mut self, buffer: BackendHandle) {
        let mut s = self.state.lock();
        s.buffers.remove(&buffer);
        s.record(HeadlessCall::RenderBuffer {
            op: "destroy",
            buffer,
        });
    }

    fn render_buffer_bind(&mut self, buffer: BackendHandle, offset: u64) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        if offset > b.data.len() as u64 {
            return Err(BackendError::failed("render_buffer_bind", "offset past end"));
        }
        s.record(HeadlessCall::RenderBuffer { op: "bind", buffer });
        Ok(())
    }

    fn render_buffer_unbind(&mut self, buffer: BackendHandle) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.buffer_mut(buffer)?;
        s.record(HeadlessCall::RenderBuffer {
            op: "unbind",
            buffer,
        });
        Ok(())
    }

    fn render_buffer_flush(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        size: u64,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        if offset + size > b.data.len() as u64 {
            return Err(BackendError::failed("render_buffer_flush", "range past end"));
        }
        s.record(HeadlessCall::RenderBuffer { op: "flush", buffer });
        Ok(())
    }

    fn render_buffer_read(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        let range = offset as usize..(offset + size) as usize;
        let data = b
            .data
            .get(range)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| BackendError::failed("render_buffer_read", "range past end"))?;
        s.record(HeadlessCall::RenderBuffer { op: "read", buffer });
        Ok(data)
    }

    fn render_buffer_resize(&mut self, buffer: BackendHandle, new_size: u64) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        let old_size = b.data.len() as u64;
        if new_size < old_size {
            return Err(BackendError::failed(
                "render_buffer_resize",
                format!("cannot shrink {:?} buffer from {old_size} to {new_size}", b.kind),
            ));
        }
        b.data.resize(new_size as usize, 0);
        if let Some(free) = b.free.as_mut() {
            free.push((old_size, new_size - old_size));
            coalesce(free);
        }
        s.record(HeadlessCall::RenderBuffer {
            op: "resize",
            buffer,
        });
        Ok(())
    }

    fn render_buffer_allocate(&mut self, buffer: BackendHandle, size: u64) -> Result<u64, BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        let Some(free) = b.free.as_mut() else {
            return Err(BackendError::failed(
                "render_buffer_allocate",
                "buffer was created without a free list",
            ));
        };
        let Some(pos) = free.iter().position(|&(_, len)| len >= size) else {
            return Err(BackendError::failed(
                "render_buffer_allocate",
                format!("no free block of {size} bytes"),
            ));
        };
        let (offset, len) = free[pos];
        if len == size {
            free.remove(pos);
        } else {
            free[pos] = (offset + size, len - size);
        }
        s.record(HeadlessCall::RenderBuffer {
            op: "allocate",
            buffer,
        });
        Ok(offset)
    }

    fn render_buffer_free(
        &mut self,
        buffer: BackendHandle,
        size: u64,
        offset: u64,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        let Some(free) = b.free.as_mut() else {
            return Err(BackendError::failed(
                "render_buffer_free",
                "buffer was created without a free list",
            ));
        };
        if free
            .iter()
            .any(|&(o, l)| offset < o + l && o < offset + size)
        {
            return Err(BackendError::failed(
                "render_buffer_free",
                format!("range {offset}+{size} is already free"),
            ));
        }
        free.push((offset, size));
        coalesce(free);
        s.record(HeadlessCall::RenderBuffer { op: "free", buffer });
        Ok(())
    }

    fn render_buffer_load_range(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let b = s.buffer_mut(buffer)?;
        let start = offset as usize;
        let Some(dest) = b.data.get_mut(start..start + data.len()) else {
            return Err(BackendError::failed("render_buffer_load_range", "range past end"));
        };
        dest.copy_from_slice(data);
        s.record(HeadlessCall::RenderBuffer { op: "load", buffer });
        Ok(())
    }

    fn render_buffer_copy_range(
        &mut self,
        source: BackendHandle,
        source_offset: u64,
        dest: BackendHandle,
        dest_offset: u64,
        size: u64,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        let bytes = s
            .buffer_mut(source)?
            .data
            .get(source_offset as usize..(source_offset + size) as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| BackendError::failed("render_buffer_copy_range", "source range past end"))?;
        let d = s.buffer_mut(dest)?;
        let Some(target) = d
            .data
            .get_mut(dest_offset as usize..(dest_offset + size) as usize)
        else {
            return Err(BackendError::failed(
                "render_buffer_copy_range",
                "destination range past end",
            ));
        };
        target.copy_from_slice(&bytes);
        s.record(HeadlessCall::RenderBuffer {
            op: "copy",
            buffer: dest,
        });
        Ok(())
    }

    fn render_buffer_draw(
        &mut self,
        buffer: BackendHandle,
        _offset: u64,
        _element_count: u32,
        bind_only: bool,
    ) -> Result<(), BackendError> {
        let mut s = self.state.lock();
        s.buffer_mut(buffer)?;
        s.record(HeadlessCall::RenderBuffer {
            op: if bind_only { "bind" } else { "draw" },
            buffer,
        });
        Ok(())
    }
}

fn coalesce(free: &mut Vec<(u64, u64)>) {
    free.sort_by_key(|&(offset, _)| offset);
    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(free.len());
    for &(offset, size) in free.iter() {
        match merged.last_mut() {
            Some((last_offset, last_size)) if *last_offset + *last_size == offset => {
                *last_size += size;
            }
            _ => merged.push((offset, size)),
        }
    }
    *free = merged;
}
