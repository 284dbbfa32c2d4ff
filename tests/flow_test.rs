use anima_ngin::{
    context::Context,
    flow::{App, AppStage, Game, LoopControl},
    render::RenderPacket,
    renderer::{FrameOutcome, headless::HeadlessCall},
};

use crate::common::test_utils::{ASSETS, State, test_config};

mod common;

#[test]
fn frames_need_an_initialized_app() {
    let (mut app, _recorder) = App::headless(test_config(ASSETS), State::new()).unwrap();
    assert_eq!(app.stage(), AppStage::Uninitialized);
    assert!(app.frame().is_err());

    app.initialize().unwrap();
    assert_eq!(app.stage(), AppStage::Running);
    assert!(app.initialize().is_err());
    app.shutdown();
}

#[test]
fn each_frame_updates_renders_and_draws() {
    let (mut app, recorder) = App::headless(test_config(ASSETS), State::new()).unwrap();
    app.initialize().unwrap();
    for _ in 0..3 {
        assert_eq!(app.frame().unwrap(), FrameOutcome::Drawn);
    }
    assert_eq!(app.game().init_invocations(), 1);
    assert_eq!(app.game().update_invocations(), 3);
    assert_eq!(app.game().render_invocations(), 3);
    assert_eq!(recorder.frames_ended(), 3);

    app.shutdown();
    app.shutdown();
    assert_eq!(app.stage(), AppStage::ShuttingDown);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::Shutdown)), 1);
}

#[test]
fn zero_sized_window_suspends_the_loop() {
    let (mut app, recorder) = App::headless(test_config(ASSETS), State::new()).unwrap();
    app.initialize().unwrap();

    app.on_resized(0, 600);
    assert!(app.is_suspended());
    assert_eq!(app.frame().unwrap(), FrameOutcome::Skipped);
    assert_eq!(app.game().update_invocations(), 0);
    assert_eq!(recorder.frames_ended(), 0);

    app.on_resized(800, 600);
    assert!(!app.is_suspended());
    assert_eq!(app.game().resize_invocations(), 1);
    assert_eq!(app.game().last_size, Some((800, 600)));

    // same size again changes nothing
    app.on_resized(800, 600);
    assert_eq!(app.game().resize_invocations(), 1);
    assert!(app.context().renderer.is_resizing());
    app.shutdown();
}

#[test]
fn run_stops_when_the_game_asks() {
    let mut state = State::new();
    state.quit_after = Some(3);
    let (app, recorder) = App::headless(test_config(ASSETS), state).unwrap();
    app.run().unwrap();
    assert_eq!(recorder.frames_ended(), 3);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::Shutdown)), 1);
}

#[test]
fn quit_requested_before_run_draws_nothing() {
    let (app, recorder) = App::headless(test_config(ASSETS), State::new()).unwrap();
    let quit = app.quit_handle();
    quit.request();
    app.run().unwrap();
    assert_eq!(recorder.frames_ended(), 0);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::Shutdown)), 1);
}

struct Broken {
    frames: u32,
}

impl Game for Broken {
    fn initialize(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context, _delta_time: f64) -> anyhow::Result<LoopControl> {
        self.frames += 1;
        if self.frames == 2 {
            anyhow::bail!("simulation diverged");
        }
        Ok(LoopControl::Continue)
    }

    fn render(
        &mut self,
        _ctx: &mut Context,
        _packet: &mut RenderPacket,
        _delta_time: f64,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn failing_update_ends_the_run_with_its_error() {
    let (app, recorder) = App::headless(test_config(ASSETS), Broken { frames: 0 }).unwrap();
    let err = app.run().unwrap_err();
    assert!(err.to_string().contains("simulation diverged"));
    assert_eq!(recorder.frames_ended(), 1);
    assert_eq!(recorder.count(|c| matches!(c, HeadlessCall::Shutdown)), 1);
}
