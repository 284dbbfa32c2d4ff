#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
};

use anima_ngin::{
    config::EngineConfig,
    context::Context,
    flow::{Game, LoopControl},
    render::RenderPacket,
    renderer::headless::HeadlessRecorder,
};

pub(crate) const ASSETS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets");

static TEMP_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Defaults tuned for tests: no frame pacing, a short resize debounce and two workers.
pub(crate) fn test_config(asset_root: impl Into<PathBuf>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.app.name = "anima-test".to_string();
    config.app.target_fps = 0.0;
    config.assets.root = asset_root.into();
    config.renderer.resize_debounce_frames = 2;
    config.renderer.resize_sleep_ms = 0;
    config.jobs.worker_count = 2;
    config
}

pub(crate) fn headless_context() -> (Context, HeadlessRecorder) {
    Context::headless(test_config(ASSETS)).expect("headless context")
}

pub(crate) fn headless_context_in(root: &Path) -> (Context, HeadlessRecorder) {
    Context::headless(test_config(root)).expect("headless context")
}

/// A fresh asset root under the system temp dir holding a copy of the shipped
/// shaders and materials.
pub(crate) fn temp_asset_root(test_name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "anima-ngin-{test_name}-{}-{}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&root);
    for dir in ["shaders", "materials", "textures"] {
        std::fs::create_dir_all(root.join(dir)).expect("create asset dir");
    }
    for dir in ["shaders", "materials"] {
        for entry in std::fs::read_dir(Path::new(ASSETS).join(dir)).expect("read shipped assets") {
            let entry = entry.expect("dir entry");
            std::fs::copy(entry.path(), root.join(dir).join(entry.file_name()))
                .expect("copy asset");
        }
    }
    root
}

pub(crate) fn write_png(root: &Path, name: &str, width: u32, height: u32, rgba: [u8; 4]) {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    image
        .save(root.join("textures").join(format!("{name}.png")))
        .expect("write png");
}

pub(crate) fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, contents).expect("write file");
}

pub(crate) struct State {
    frame_counter: u32,
    init_invocations: u32,
    update_invocations: u32,
    render_invocations: u32,
    resize_invocations: u32,
    pub quit_after: Option<u32>,
    pub last_size: Option<(u32, u32)>,
}

impl State {
    pub fn new() -> Self {
        Self {
            frame_counter: 0,
            init_invocations: 0,
            update_invocations: 0,
            render_invocations: 0,
            resize_invocations: 0,
            quit_after: None,
            last_size: None,
        }
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn init_invocations(&self) -> u32 {
        self.init_invocations
    }

    pub fn update_invocations(&self) -> u32 {
        self.update_invocations
    }

    pub fn render_invocations(&self) -> u32 {
        self.render_invocations
    }

    pub fn resize_invocations(&self) -> u32 {
        self.resize_invocations
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// A game that counts its hooks and renders nothing.
impl Game for State {
    fn initialize(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        self.init_invocations += 1;
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context, _delta_time: f64) -> anyhow::Result<LoopControl> {
        assert_eq!(self.init_invocations, 1);
        self.update_invocations += 1;
        self.frame_counter += 1;
        match self.quit_after {
            Some(n) if self.frame_counter >= n => Ok(LoopControl::Quit),
            _ => Ok(LoopControl::Continue),
        }
    }

    fn render(
        &mut self,
        _ctx: &mut Context,
        _packet: &mut RenderPacket,
        _delta_time: f64,
    ) -> anyhow::Result<()> {
        self.render_invocations += 1;
        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut Context, width: u32, height: u32) {
        self.resize_invocations += 1;
        self.last_size = Some((width, height));
    }
}
