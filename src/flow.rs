//! Application loop.
//!
//! A [`Game`] supplies the behaviour, an [`App`] drives it: it owns the
//! [`Context`], steps the job system, asks the game to update and to fill a
//! [`RenderPacket`], and hands that packet to the renderer.
//!
//! # Lifecycle
//!
//! 1. [`App::new`] builds the context, the stage is [`AppStage::Uninitialized`]
//! 2. [`App::initialize`] calls [`Game::initialize`] once and moves to `Running`
//! 3. each [`App::frame`] updates jobs, the game, then draws its packet
//! 4. [`App::run`] repeats frames at the configured rate until the game or a
//!    [`QuitHandle`] asks to stop, then shuts the context down
//!
//! While the window has a zero-sized client area the app is suspended: frames
//! neither update the game nor draw.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use instant::{Duration, Instant};

use crate::{
    config::EngineConfig,
    context::Context,
    render::RenderPacket,
    renderer::{FrameOutcome, backend::RendererBackend, headless::HeadlessRecorder},
};

const SUSPENDED_SLEEP: Duration = Duration::from_millis(100);

/// Measures elapsed time between `start` and the latest `update`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from zero. Restarts a running clock.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
        self.elapsed = Duration::ZERO;
    }

    /// Refreshes the elapsed time. No effect on a stopped clock.
    pub fn update(&mut self) {
        if let Some(start) = self.start_time {
            self.elapsed = start.elapsed();
        }
    }

    /// Stops the clock, keeping the last elapsed value.
    pub fn stop(&mut self) {
        self.start_time = None;
    }

    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStage {
    Uninitialized,
    Initializing,
    Running,
    ShuttingDown,
}

/// Returned by [`Game::update`] to keep the loop going or end it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopControl {
    #[default]
    Continue,
    Quit,
}

/// The hooks an application implements.
///
/// `render` only builds packets; drawing happens in the app after it returns.
pub trait Game {
    /// Called once before the first frame. Load resources and spawn meshes here.
    fn initialize(&mut self, ctx: &mut Context) -> anyhow::Result<()>;

    /// Called every running frame with the seconds since the previous one.
    fn update(&mut self, ctx: &mut Context, delta_time: f64) -> anyhow::Result<LoopControl>;

    /// Fills `packet` with one view packet per view to draw this frame.
    fn render(
        &mut self,
        ctx: &mut Context,
        packet: &mut RenderPacket,
        delta_time: f64,
    ) -> anyhow::Result<()>;

    fn on_resize(&mut self, _ctx: &mut Context, _width: u32, _height: u32) {}
}

/// Asks a running [`App`] to stop after the current frame. Cheap to clone and `Send`.
#[derive(Debug, Clone, Default)]
pub struct QuitHandle(Arc<AtomicBool>);

impl QuitHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct App<G: Game> {
    ctx: Context,
    game: G,
    stage: AppStage,
    clock: Clock,
    last_time: Duration,
    suspended: bool,
    quit: QuitHandle,
    width: u32,
    height: u32,
}

impl<G: Game> App<G> {
    pub fn new(config: EngineConfig, backend: Box<dyn RendererBackend>, game: G) -> anyhow::Result<Self> {
        let (width, height) = (config.app.width, config.app.height);
        let ctx = Context::new(config, backend)?;
        Ok(Self::with_context(ctx, game, width, height))
    }

    pub fn headless(config: EngineConfig, game: G) -> anyhow::Result<(Self, HeadlessRecorder)> {
        let (width, height) = (config.app.width, config.app.height);
        let (ctx, recorder) = Context::headless(config)?;
        Ok((Self::with_context(ctx, game, width, height), recorder))
    }

    fn with_context(ctx: Context, game: G, width: u32, height: u32) -> Self {
        Self {
            ctx,
            game,
            stage: AppStage::Uninitialized,
            clock: Clock::new(),
            last_time: Duration::ZERO,
            suspended: width == 0 || height == 0,
            quit: QuitHandle::default(),
            width,
            height,
        }
    }

    pub fn stage(&self) -> AppStage {
        self.stage
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    pub fn initialize(&mut self) -> anyhow::Result<()> {
        if self.stage != AppStage::Uninitialized {
            anyhow::bail!("app initialized twice (stage {:?})", self.stage);
        }
        self.stage = AppStage::Initializing;
        self.game.initialize(&mut self.ctx)?;
        self.clock.start();
        self.last_time = Duration::ZERO;
        self.stage = AppStage::Running;
        log::info!("'{}' running", self.ctx.config.app.name);
        Ok(())
    }

    /// Window size changes. A zero dimension suspends the app until a usable
    /// size arrives.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            if !self.suspended {
                log::info!("window minimized, suspending");
            }
            self.suspended = true;
            return;
        }
        if self.suspended {
            log::info!("window restored, resuming");
        }
        self.suspended = false;
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.ctx.on_resized(width, height);
        self.game.on_resize(&mut self.ctx, width, height);
    }

    pub fn on_mouse_moved(&mut self, x: i32, y: i32) {
        self.ctx.on_mouse_moved(x, y);
    }

    /// Runs one iteration of the loop. Suspended frames are reported as skipped.
    pub fn frame(&mut self) -> anyhow::Result<FrameOutcome> {
        if self.stage != AppStage::Running {
            anyhow::bail!("frame requested while the app is {:?}", self.stage);
        }
        self.clock.update();
        let now = self.clock.elapsed();
        let delta_time = now.saturating_sub(self.last_time).as_secs_f64();
        self.last_time = now;

        self.ctx.jobs.update();

        if self.suspended {
            return Ok(FrameOutcome::Skipped);
        }

        if self.game.update(&mut self.ctx, delta_time)? == LoopControl::Quit {
            self.quit.request();
        }

        let mut packet = RenderPacket::new(delta_time);
        self.game.render(&mut self.ctx, &mut packet, delta_time)?;
        let outcome = self.ctx.draw_frame(&packet)?;
        self.ctx.destroy_packet(packet);
        Ok(outcome)
    }

    /// Initializes if needed, then loops until quit. A failing frame stops the
    /// loop; the context is shut down either way and the error returned.
    pub fn run(mut self) -> anyhow::Result<()> {
        let _ = env_logger::try_init();

        if self.stage == AppStage::Uninitialized {
            if let Err(e) = self.initialize() {
                log::error!("initialization failed: {e:#}");
                self.shutdown();
                return Err(e);
            }
        }

        let target_fps = self.ctx.config.app.target_fps;
        let target_frame_time = (target_fps > 0.0).then(|| Duration::from_secs_f64(1.0 / target_fps));

        let mut result = Ok(());
        while !self.quit.is_requested() {
            let frame_start = Instant::now();
            if let Err(e) = self.frame() {
                log::error!("frame failed, stopping: {e:#}");
                result = Err(e);
                break;
            }
            if self.suspended {
                std::thread::sleep(SUSPENDED_SLEEP);
                continue;
            }
            if let Some(target) = target_frame_time {
                let spent = frame_start.elapsed();
                if spent < target {
                    std::thread::sleep(target - spent);
                }
            }
        }

        self.shutdown();
        result
    }

    pub fn shutdown(&mut self) {
        if self.stage == AppStage::ShuttingDown {
            return;
        }
        self.stage = AppStage::ShuttingDown;
        self.clock.stop();
        self.ctx.shutdown();
    }
}
