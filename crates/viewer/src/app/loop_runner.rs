use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mapview::{ConfigError, Direction, Point, Size};
use pixels::{Error as PixelsError, Pixels, SurfaceTexture};
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use super::bootstrap::{load_map_view_config, ViewerConfig};
use super::metrics::MetricsAccumulator;
use super::raster::Rasterizer;
use super::session::{ViewerCommand, ViewerSession};

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize pixel surface: {0}")]
    CreateSurface(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub(crate) fn run(config: ViewerConfig) -> ExitCode {
    match run_viewer(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

fn run_viewer(config: ViewerConfig) -> Result<(), AppError> {
    let map_view_config = load_map_view_config(config.map_view_config_path.as_deref())?;
    let mut session = ViewerSession::new(&map_view_config, Instant::now())?;

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut surface = FrameSurface::new(Arc::clone(&window)).map_err(AppError::CreateSurface)?;
    let mut rasterizer = Rasterizer::new(config.asset_root.clone());

    event_loop.set_control_flow(ControlFlow::Poll);

    let render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(render_cap);
    info!(
        asset_root = %config.asset_root.display(),
        render_fps_cap = %format_render_cap(render_cap),
        metrics_log_interval_ms = config.metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut input = InputCollector::default();
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics = MetricsAccumulator::new(config.metrics_log_interval, Instant::now());
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = surface.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "surface_resize_failed");
                        window_target.exit();
                    }
                    input.mark_cursor_dirty();
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = surface.resize(size.width, size.height) {
                        warn!(error = %error, "surface_resize_failed");
                        window_target.exit();
                    }
                    input.mark_cursor_dirty();
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input.set_cursor(Some(Point::new(position.x as i32, position.y as i32)));
                }
                WindowEvent::CursorLeft { .. } => input.set_cursor(None),
                WindowEvent::MouseWheel { delta, .. } => input.handle_mouse_wheel(delta),
                WindowEvent::KeyboardInput { event, .. } => {
                    input.handle_keyboard_input(&event);
                    if input.quit_requested {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    for command in input.take_commands() {
                        session.apply(command);
                    }
                    if let Some(shift_pressed) = input.take_shift_change() {
                        session.set_shift_pressed(shift_pressed);
                    }
                    let viewport = surface.size();
                    if let Some(cursor) = input.take_cursor_change() {
                        session.set_cursor(cursor, viewport);
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let pools = session.draw(viewport, Instant::now());
                    let draw_commands: usize = pools.in_order().iter().map(|pool| pool.len()).sum();
                    rasterizer.render(pools, surface.frame_mut(), viewport);
                    if let Err(error) = surface.present() {
                        warn!(error = %error, "surface_present_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title =
                        Some(format!("{} | {}", config.window_title, session.status_line()));
                    if next_title != last_applied_title {
                        if let Some(title) = &next_title {
                            window.set_title(title);
                        }
                        last_applied_title = next_title;
                    }

                    let rebuilds = session.view().visible_tiles_cache().rebuild_count();
                    metrics.record_frame(frame_dt, draw_commands, rebuilds);
                    if let Some(snapshot) = metrics.maybe_snapshot(now) {
                        info!(
                            fps = snapshot.fps,
                            frame_time_ms = snapshot.frame_time_ms,
                            draw_commands = snapshot.draw_commands,
                            cache_rebuilds = snapshot.cache_rebuilds,
                            "viewer_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// The window's pixel buffer; rebuilt on resize, zero sizes are ignored.
struct FrameSurface {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    size: Size,
}

impl FrameSurface {
    fn new(window: Arc<Window>) -> Result<Self, PixelsError> {
        let inner = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), inner.width, inner.height)?;
        Ok(Self {
            window,
            pixels,
            size: Size::new(inner.width as i32, inner.height as i32),
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), PixelsError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.size = Size::new(width as i32, height as i32);
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, PixelsError> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    fn size(&self) -> Size {
        self.size
    }

    fn frame_mut(&mut self) -> &mut [u8] {
        self.pixels.frame_mut()
    }

    fn present(&self) -> Result<(), PixelsError> {
        self.pixels.render()
    }
}

/// Turns window events into edge-triggered viewer commands, drained once per frame.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    held_keys: HashSet<KeyCode>,
    pending_commands: Vec<ViewerCommand>,
    shift_pressed: bool,
    shift_changed: bool,
    cursor: Option<Point>,
    cursor_changed: bool,
}

impl InputCollector {
    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if let PhysicalKey::Code(code) = key_event.physical_key {
            self.handle_key_state(code, key_event.state);
        }
    }

    fn handle_key_state(&mut self, code: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                let first_press = self.held_keys.insert(code);
                if is_shift_key(code) {
                    self.set_shift(true);
                } else if code == KeyCode::Escape {
                    self.quit_requested = true;
                } else if first_press {
                    if let Some(command) = command_for_key(code) {
                        self.pending_commands.push(command);
                    }
                }
            }
            ElementState::Released => {
                self.held_keys.remove(&code);
                if is_shift_key(code)
                    && !self.held_keys.contains(&KeyCode::ShiftLeft)
                    && !self.held_keys.contains(&KeyCode::ShiftRight)
                {
                    self.set_shift(false);
                }
            }
        }
    }

    fn set_shift(&mut self, pressed: bool) {
        if self.shift_pressed != pressed {
            self.shift_pressed = pressed;
            self.shift_changed = true;
        }
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = zoom_steps_from_scroll_delta(delta);
        for _ in 0..steps.unsigned_abs() {
            self.pending_commands.push(ViewerCommand::Zoom { zoom_in: steps > 0 });
        }
    }

    fn set_cursor(&mut self, cursor: Option<Point>) {
        if self.cursor != cursor {
            self.cursor = cursor;
            self.cursor_changed = true;
        }
    }

    /// The tile under a still cursor changes when the window does.
    fn mark_cursor_dirty(&mut self) {
        self.cursor_changed = true;
    }

    fn take_commands(&mut self) -> Vec<ViewerCommand> {
        let commands = std::mem::take(&mut self.pending_commands);
        if !commands.is_empty() {
            self.cursor_changed = true;
        }
        commands
    }

    fn take_shift_change(&mut self) -> Option<bool> {
        std::mem::take(&mut self.shift_changed).then_some(self.shift_pressed)
    }

    fn take_cursor_change(&mut self) -> Option<Option<Point>> {
        std::mem::take(&mut self.cursor_changed).then_some(self.cursor)
    }
}

fn command_for_key(code: KeyCode) -> Option<ViewerCommand> {
    let command = match code {
        KeyCode::KeyW | KeyCode::ArrowUp => ViewerCommand::Step(Direction::North),
        KeyCode::KeyS | KeyCode::ArrowDown => ViewerCommand::Step(Direction::South),
        KeyCode::KeyA | KeyCode::ArrowLeft => ViewerCommand::Step(Direction::West),
        KeyCode::KeyD | KeyCode::ArrowRight => ViewerCommand::Step(Direction::East),
        KeyCode::KeyI => ViewerCommand::Pan { dx: 0, dy: -1 },
        KeyCode::KeyK => ViewerCommand::Pan { dx: 0, dy: 1 },
        KeyCode::KeyJ => ViewerCommand::Pan { dx: -1, dy: 0 },
        KeyCode::KeyL => ViewerCommand::Pan { dx: 1, dy: 0 },
        KeyCode::PageUp => ViewerCommand::ChangeFloor { up: true },
        KeyCode::PageDown => ViewerCommand::ChangeFloor { up: false },
        KeyCode::Equal | KeyCode::NumpadAdd => ViewerCommand::Zoom { zoom_in: true },
        KeyCode::Minus | KeyCode::NumpadSubtract => ViewerCommand::Zoom { zoom_in: false },
        KeyCode::KeyF => ViewerCommand::ToggleFollow,
        KeyCode::KeyG => ViewerCommand::ToggleLights,
        KeyCode::KeyM => ViewerCommand::ToggleMultifloor,
        KeyCode::KeyN => ViewerCommand::ToggleNames,
        KeyCode::KeyH => ViewerCommand::ToggleHighlight,
        KeyCode::KeyT => ViewerCommand::ToggleAntiAliasing,
        _ => return None,
    };
    Some(command)
}

fn is_shift_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::ShiftLeft | KeyCode::ShiftRight)
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use winit::dpi::PhysicalPosition;

    use super::*;

    #[test]
    fn movement_keys_map_to_steps() {
        assert_eq!(
            command_for_key(KeyCode::KeyW),
            Some(ViewerCommand::Step(Direction::North))
        );
        assert_eq!(
            command_for_key(KeyCode::ArrowLeft),
            Some(ViewerCommand::Step(Direction::West))
        );
        assert_eq!(
            command_for_key(KeyCode::PageDown),
            Some(ViewerCommand::ChangeFloor { up: false })
        );
        assert_eq!(command_for_key(KeyCode::KeyZ), None);
    }

    #[test]
    fn held_key_does_not_repeat_commands() {
        let mut input = InputCollector::default();

        input.handle_key_state(KeyCode::KeyG, ElementState::Pressed);
        input.handle_key_state(KeyCode::KeyG, ElementState::Pressed);
        assert_eq!(input.take_commands(), vec![ViewerCommand::ToggleLights]);
        assert!(input.take_commands().is_empty());

        input.handle_key_state(KeyCode::KeyG, ElementState::Released);
        input.handle_key_state(KeyCode::KeyG, ElementState::Pressed);
        assert_eq!(input.take_commands(), vec![ViewerCommand::ToggleLights]);
    }

    #[test]
    fn shift_changes_are_reported_once() {
        let mut input = InputCollector::default();
        assert_eq!(input.take_shift_change(), None);

        input.handle_key_state(KeyCode::ShiftLeft, ElementState::Pressed);
        input.handle_key_state(KeyCode::ShiftRight, ElementState::Pressed);
        assert_eq!(input.take_shift_change(), Some(true));
        assert_eq!(input.take_shift_change(), None);

        input.handle_key_state(KeyCode::ShiftLeft, ElementState::Released);
        assert_eq!(input.take_shift_change(), None);
        input.handle_key_state(KeyCode::ShiftRight, ElementState::Released);
        assert_eq!(input.take_shift_change(), Some(false));
    }

    #[test]
    fn escape_requests_quit() {
        let mut input = InputCollector::default();
        input.handle_key_state(KeyCode::Escape, ElementState::Pressed);
        assert!(input.quit_requested);
        assert!(input.take_commands().is_empty());
    }

    #[test]
    fn wheel_zooms_one_step_per_notch() {
        let mut input = InputCollector::default();
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 2.0));
        input.handle_mouse_wheel(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -3.5)));

        assert_eq!(
            input.take_commands(),
            vec![
                ViewerCommand::Zoom { zoom_in: true },
                ViewerCommand::Zoom { zoom_in: true },
                ViewerCommand::Zoom { zoom_in: false },
            ]
        );
    }

    #[test]
    fn cursor_is_rechecked_after_the_camera_moves() {
        let mut input = InputCollector::default();
        input.set_cursor(Some(Point::new(10, 20)));
        assert_eq!(input.take_cursor_change(), Some(Some(Point::new(10, 20))));
        assert_eq!(input.take_cursor_change(), None);

        input.handle_key_state(KeyCode::KeyD, ElementState::Pressed);
        input.take_commands();
        assert_eq!(input.take_cursor_change(), Some(Some(Point::new(10, 20))));

        input.set_cursor(None);
        assert_eq!(input.take_cursor_change(), Some(None));
    }

    #[test]
    fn cap_sleep_fills_the_remaining_frame_budget() {
        assert!(target_frame_duration(normalize_render_fps_cap(Some(50))).is_some());
        let target = Some(Duration::from_millis(20));
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(15), target),
            Duration::from_millis(5)
        );
        assert_eq!(compute_cap_sleep(Duration::from_millis(25), target), Duration::ZERO);
        assert_eq!(compute_cap_sleep(Duration::from_millis(1), None), Duration::ZERO);
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(format_render_cap(None), "off");
    }
}
