//! Engine configuration.
//!
//! `EngineConfig` is read from TOML (or built with `Default`) and drives the
//! construction of every subsystem in [`crate::context::Context`]. Without a
//! `[[views]]` section the built-in skybox, world, UI and pick views are used.
//! The view section mirrors what a game would ship in its boot config:
//!
//! ```toml
//! [app]
//! name = "demo"
//! width = 1280
//! height = 720
//!
//! [[views]]
//! name = "world"
//! kind = "world"
//!
//! [[views.passes]]
//! name = "Renderpass.Builtin.World"
//! clear_flags = "DEPTH | STENCIL"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    renderer::backend::{
        AttachmentLoadOp, AttachmentSource, AttachmentStoreOp, AttachmentType, ClearFlags,
    },
    views::{MatrixSource, ViewKind},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Frames per second the loop tries to hold. Spare time is slept away.
    pub target_fps: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "anima".to_string(),
            width: 1280,
            height: 720,
            target_fps: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub root: PathBuf,
    /// Keep the asset index in sync with disk through a background watcher.
    pub watch: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            watch: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Frames to wait after the last resize event before the swapchain is rebuilt.
    pub resize_debounce_frames: u32,
    pub resize_sleep_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            resize_debounce_frames: 30,
            resize_sleep_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemLimits {
    pub max_texture_count: usize,
    pub max_material_count: usize,
    pub max_geometry_count: usize,
    pub max_shader_count: usize,
    pub max_view_count: usize,
    pub max_uniform_count: usize,
    pub max_global_textures: usize,
    pub max_instance_textures: usize,
    pub max_camera_count: usize,
}

impl Default for SystemLimits {
    fn default() -> Self {
        Self {
            max_texture_count: 65536,
            max_material_count: 4096,
            max_geometry_count: 4096,
            max_shader_count: 1024,
            max_view_count: 251,
            max_uniform_count: 128,
            max_global_textures: 31,
            max_instance_textures: 31,
            max_camera_count: 61,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub worker_count: usize,
    pub result_capacity: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            result_capacity: 512,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    #[serde(default)]
    pub source: AttachmentSource,
    #[serde(default)]
    pub load_operation: AttachmentLoadOp,
    #[serde(default)]
    pub store_operation: AttachmentStoreOp,
    #[serde(default)]
    pub present_after: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderTargetConfig {
    #[serde(default)]
    pub attachments: Vec<AttachmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderPassConfig {
    pub name: String,
    /// x, y, width, height
    pub render_area: [f32; 4],
    pub clear_colour: [f32; 4],
    pub clear_flags: ClearFlags,
    pub depth: f32,
    pub stencil: u32,
    pub target: RenderTargetConfig,
    pub render_target_count: u8,
}

impl Default for RenderPassConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            render_area: [0.0, 0.0, 1280.0, 720.0],
            clear_colour: [0.0, 0.0, 0.2, 1.0],
            clear_flags: ClearFlags::empty(),
            depth: 1.0,
            stencil: 0,
            target: RenderTargetConfig::default(),
            render_target_count: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderViewConfig {
    pub name: String,
    pub kind: ViewKind,
    #[serde(default)]
    pub custom_shader_name: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub view_matrix_source: MatrixSource,
    #[serde(default)]
    pub projection_matrix_source: MatrixSource,
    #[serde(default)]
    pub passes: Vec<RenderPassConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub app: AppConfig,
    pub assets: AssetConfig,
    pub renderer: RendererConfig,
    pub limits: SystemLimits,
    pub jobs: JobConfig,
    pub views: Vec<RenderViewConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            assets: AssetConfig::default(),
            renderer: RendererConfig::default(),
            limits: SystemLimits::default(),
            jobs: JobConfig::default(),
            views: builtin_view_configs(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading engine config {}: {e}", path.display()))?;
        Self::from_toml_str(&source)
    }
}

pub const SKYBOX_VIEW: &str = "skybox";
pub const WORLD_VIEW: &str = "world";
pub const UI_VIEW: &str = "ui";
pub const PICK_VIEW: &str = "pick";

fn attachment(kind: AttachmentType, source: AttachmentSource, load: AttachmentLoadOp) -> AttachmentConfig {
    AttachmentConfig {
        kind,
        source,
        load_operation: load,
        store_operation: AttachmentStoreOp::Store,
        present_after: false,
    }
}

fn view(name: &str, kind: ViewKind, passes: Vec<RenderPassConfig>) -> RenderViewConfig {
    RenderViewConfig {
        name: name.to_string(),
        kind,
        custom_shader_name: None,
        width: 0,
        height: 0,
        view_matrix_source: MatrixSource::SceneCamera,
        projection_matrix_source: MatrixSource::SceneCamera,
        passes,
    }
}

/// Skybox, world, UI and pick views in draw order, with the render pass names
/// the built-in shader configs expect.
pub fn builtin_view_configs() -> Vec<RenderViewConfig> {
    use AttachmentLoadOp::{DontCare, Load};
    use AttachmentSource::{Default as Backend, View};
    use AttachmentType::{Colour, Depth};

    let skybox = RenderPassConfig {
        name: "Renderpass.Builtin.Skybox".to_string(),
        clear_flags: ClearFlags::COLOUR,
        target: RenderTargetConfig {
            attachments: vec![attachment(Colour, Backend, DontCare)],
        },
        ..Default::default()
    };
    let world = RenderPassConfig {
        name: "Renderpass.Builtin.World".to_string(),
        clear_flags: ClearFlags::DEPTH | ClearFlags::STENCIL,
        target: RenderTargetConfig {
            attachments: vec![
                attachment(Colour, Backend, Load),
                attachment(Depth, Backend, DontCare),
            ],
        },
        ..Default::default()
    };
    let mut ui_colour = attachment(Colour, Backend, Load);
    ui_colour.present_after = true;
    let ui = RenderPassConfig {
        name: "Renderpass.Builtin.UI".to_string(),
        target: RenderTargetConfig {
            attachments: vec![ui_colour],
        },
        ..Default::default()
    };
    let world_pick = RenderPassConfig {
        name: "Renderpass.Builtin.WorldPick".to_string(),
        clear_colour: [1.0, 1.0, 1.0, 1.0],
        clear_flags: ClearFlags::COLOUR | ClearFlags::DEPTH,
        target: RenderTargetConfig {
            attachments: vec![attachment(Colour, View, DontCare), attachment(Depth, View, DontCare)],
        },
        ..Default::default()
    };
    let ui_pick = RenderPassConfig {
        name: "Renderpass.Builtin.UIPick".to_string(),
        target: RenderTargetConfig {
            attachments: vec![attachment(Colour, View, Load)],
        },
        ..Default::default()
    };

    vec![
        view(SKYBOX_VIEW, ViewKind::Skybox, vec![skybox]),
        view(WORLD_VIEW, ViewKind::World, vec![world]),
        view(UI_VIEW, ViewKind::Ui, vec![ui]),
        view(PICK_VIEW, ViewKind::Pick, vec![world_pick, ui_pick]),
    ]
}
