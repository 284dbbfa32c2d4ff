//! The contract every GPU backend implements.
//!
//! The engine never talks to a graphics API directly. Textures, geometry, shaders,
//! render passes, render targets and render buffers are created through
//! [`RendererBackend`] and referred to afterwards by opaque [`BackendHandle`]s.

use bitflags::bitflags;
use serde::Deserialize;

use crate::{
    data_structures::{
        shader::{ShaderAttribute, ShaderStage, ShaderUniform, CullMode},
        texture::{TextureFlags, TextureMap, TextureType},
    },
    error::BackendError,
};

/// Opaque handle to an object owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendHandle(pub u32);

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub application_name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentType {
    Colour,
    Depth,
    Stencil,
}

/// Where an attachment's texture comes from: the backend's swapchain/depth
/// images, or the view that owns the render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentSource {
    #[default]
    Default,
    View,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentLoadOp {
    #[default]
    DontCare,
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStoreOp {
    DontCare,
    #[default]
    Store,
}

bitflags! {
    /// What a render pass clears when it begins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(transparent)]
    pub struct ClearFlags: u8 {
        const COLOUR = 0x1;
        const DEPTH = 0x2;
        const STENCIL = 0x4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderBufferType {
    Vertex,
    Index,
    Uniform,
    Staging,
    Read,
    Storage,
}

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub name: String,
    pub kind: TextureType,
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub flags: TextureFlags,
}

/// Everything a backend needs to build a shader program.
#[derive(Debug, Clone, Copy)]
pub struct ShaderDesc<'a> {
    pub name: &'a str,
    pub cull_mode: CullMode,
    pub stages: &'a [ShaderStage],
    pub stage_files: &'a [String],
    pub attributes: &'a [ShaderAttribute],
    pub uniforms: &'a [ShaderUniform],
    pub global_texture_count: usize,
    pub instance_texture_count: usize,
    pub use_instances: bool,
    pub use_locals: bool,
}

/// Description of a render pass handed to the backend at creation.
#[derive(Debug, Clone)]
pub struct RenderPassDesc<'a> {
    pub name: &'a str,
    pub render_area: [f32; 4],
    pub clear_colour: [f32; 4],
    pub clear_flags: ClearFlags,
    pub depth: f32,
    pub stencil: u32,
    pub attachments: &'a [AttachmentType],
}

/// A value written into a shader uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    F32(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    I32(i32),
    U32(u32),
    Mat4([[f32; 4]; 4]),
    /// Backend texture bound to a sampler slot.
    Sampler(Option<BackendHandle>),
}

impl UniformValue {
    pub fn is_sampler(&self) -> bool {
        matches!(self, UniformValue::Sampler(_))
    }

    /// Raw bytes as they would be copied into a uniform buffer. Samplers have none.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::F32(v) => bytemuck::bytes_of(v),
            UniformValue::Vec2(v) => bytemuck::bytes_of(v),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v),
            UniformValue::I32(v) => bytemuck::bytes_of(v),
            UniformValue::U32(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v),
            UniformValue::Sampler(_) => &[],
        }
    }
}

impl From<cgmath::Matrix4<f32>> for UniformValue {
    fn from(m: cgmath::Matrix4<f32>) -> Self {
        UniformValue::Mat4(m.into())
    }
}

impl From<cgmath::Vector3<f32>> for UniformValue {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<cgmath::Vector4<f32>> for UniformValue {
    fn from(v: cgmath::Vector4<f32>) -> Self {
        UniformValue::Vec4(v.into())
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::U32(v)
    }
}

/// GPU backend used by [`crate::renderer::Renderer`].
///
/// Implementations own every native object. The engine only keeps handles and
/// calls back in with them; a handle the backend does not know is reported as
/// [`BackendError::UnknownHandle`].
pub trait RendererBackend: Send {
    /// Brings the backend up and returns the number of window render targets
    /// (usually the swapchain image count).
    fn initialize(&mut self, config: &BackendConfig) -> Result<u8, BackendError>;
    fn shutdown(&mut self);
    fn resized(&mut self, width: u32, height: u32);

    /// May fail with [`BackendError::SwapchainBooting`] while the swapchain is
    /// being recreated, in which case the frame is skipped.
    fn begin_frame(&mut self, delta_time: f64) -> Result<(), BackendError>;
    fn end_frame(&mut self, delta_time: f64) -> Result<(), BackendError>;

    fn window_attachment_index(&self) -> u8;
    fn window_attachment(&self, index: u8) -> Option<BackendHandle>;
    fn depth_attachment(&self, index: u8) -> Option<BackendHandle>;
    fn is_multithreaded(&self) -> bool;

    // textures
    fn texture_create(&mut self, desc: &TextureDesc, pixels: &[u8])
    -> Result<BackendHandle, BackendError>;
    fn texture_create_writeable(&mut self, desc: &TextureDesc) -> Result<BackendHandle, BackendError>;
    fn texture_resize(
        &mut self,
        texture: BackendHandle,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;
    fn texture_write_data(
        &mut self,
        texture: BackendHandle,
        offset: u32,
        pixels: &[u8],
    ) -> Result<(), BackendError>;
    /// RGBA of a single pixel.
    fn texture_read_pixel(
        &mut self,
        texture: BackendHandle,
        x: u32,
        y: u32,
    ) -> Result<[u8; 4], BackendError>;
    fn texture_destroy(&mut self, texture: BackendHandle);

    // texture maps (samplers)
    fn texture_map_acquire_resources(&mut self, map: &TextureMap)
    -> Result<BackendHandle, BackendError>;
    fn texture_map_release_resources(&mut self, map: BackendHandle);

    // geometry
    fn geometry_create(
        &mut self,
        vertex_size: u32,
        vertex_count: u32,
        vertices: &[u8],
        indices: &[u32],
    ) -> Result<BackendHandle, BackendError>;
    fn geometry_destroy(&mut self, geometry: BackendHandle);
    fn geometry_draw(&mut self, geometry: BackendHandle) -> Result<(), BackendError>;

    // render passes and targets
    fn renderpass_create(&mut self, desc: &RenderPassDesc<'_>) -> Result<BackendHandle, BackendError>;
    fn renderpass_destroy(&mut self, pass: BackendHandle);
    fn renderpass_begin(
        &mut self,
        pass: BackendHandle,
        render_area: [f32; 4],
        target: BackendHandle,
    ) -> Result<(), BackendError>;
    fn renderpass_end(&mut self, pass: BackendHandle) -> Result<(), BackendError>;
    fn render_target_create(
        &mut self,
        attachments: &[BackendHandle],
        pass: BackendHandle,
        width: u32,
        height: u32,
    ) -> Result<BackendHandle, BackendError>;
    fn render_target_destroy(&mut self, target: BackendHandle);

    // shaders
    fn shader_create(
        &mut self,
        desc: &ShaderDesc<'_>,
        pass: BackendHandle,
    ) -> Result<BackendHandle, BackendError>;
    fn shader_destroy(&mut self, shader: BackendHandle);
    fn shader_initialize(&mut self, shader: BackendHandle) -> Result<(), BackendError>;
    fn shader_use(&mut self, shader: BackendHandle) -> Result<(), BackendError>;
    fn shader_bind_globals(&mut self, shader: BackendHandle) -> Result<(), BackendError>;
    fn shader_bind_instance(
        &mut self,
        shader: BackendHandle,
        instance_id: u32,
    ) -> Result<(), BackendError>;
    fn shader_apply_globals(&mut self, shader: BackendHandle) -> Result<(), BackendError>;
    fn shader_apply_instance(
        &mut self,
        shader: BackendHandle,
        needs_update: bool,
    ) -> Result<(), BackendError>;
    /// Reserves per-instance uniform storage and returns the new instance id.
    fn shader_acquire_instance_resources(
        &mut self,
        shader: BackendHandle,
        maps: &[TextureMap],
    ) -> Result<u32, BackendError>;
    fn shader_release_instance_resources(
        &mut self,
        shader: BackendHandle,
        instance_id: u32,
    ) -> Result<(), BackendError>;
    fn shader_set_uniform(
        &mut self,
        shader: BackendHandle,
        uniform: &ShaderUniform,
        value: &UniformValue,
    ) -> Result<(), BackendError>;

    // render buffers
    fn render_buffer_create(
        &mut self,
        kind: RenderBufferType,
        size: u64,
        use_freelist: bool,
    ) -> Result<BackendHandle, BackendError>;
    fn render_buffer_destroy(&mut self, buffer: BackendHandle);
    fn render_buffer_bind(&mut self, buffer: BackendHandle, offset: u64) -> Result<(), BackendError>;
    fn render_buffer_unbind(&mut self, buffer: BackendHandle) -> Result<(), BackendError>;
    fn render_buffer_flush(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        size: u64,
    ) -> Result<(), BackendError>;
    fn render_buffer_read(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, BackendError>;
    fn render_buffer_resize(&mut self, buffer: BackendHandle, new_size: u64)
    -> Result<(), BackendError>;
    /// Reserves `size` bytes from the buffer's free list and returns the offset.
    fn render_buffer_allocate(&mut self, buffer: BackendHandle, size: u64)
    -> Result<u64, BackendError>;
    fn render_buffer_free(
        &mut self,
        buffer: BackendHandle,
        size: u64,
        offset: u64,
    ) -> Result<(), BackendError>;
    fn render_buffer_load_range(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;
    fn render_buffer_copy_range(
        &mut self,
        source: BackendHandle,
        source_offset: u64,
        dest: BackendHandle,
        dest_offset: u64,
        size: u64,
    ) -> Result<(), BackendError>;
    fn render_buffer_draw(
        &mut self,
        buffer: BackendHandle,
        offset: u64,
        element_count: u32,
        bind_only: bool,
    ) -> Result<(), BackendError>;
}
