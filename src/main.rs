use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalPosition;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseScrollDelta, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use opticlab::config::{DemoConfig, DemoKind};
use opticlab::controller::{FrameLoopContext, InputEvent, InputResponse, MouseButton, UiActions};
use opticlab::view::{EguiFrame, GpuContext, RenderState};
use opticlab::{logging, ui};

/// Lines to pixels for wheel events, matching a browser's deltaY.
const WHEEL_LINE_PX: f32 = 100.0;

#[derive(Parser, Debug)]
#[command(name = "opticlab", about = "Interactive optics demos")]
struct Cli {
    /// Demo to open
    #[arg(long, default_value = "mirror")]
    demo: DemoKind,

    /// TOML file replacing the demo's built-in configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use touch controls instead of pointer lock
    #[arg(long)]
    touch: bool,

    /// Directory holding `models/` and `textures/`
    #[arg(long, default_value = "assets")]
    asset_root: String,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

/// Everything that exists once the window does.
struct Running {
    window: Arc<Window>,
    gpu: GpuContext,
    renderer: RenderState,
    egui_state: egui_winit::State,
    demo: FrameLoopContext,
    actions: UiActions,
    cursor: Option<PhysicalPosition<f64>>,
    touches: HashSet<u64>,
}

impl Running {
    fn logical(&self, p: PhysicalPosition<f64>) -> (f32, f32) {
        let scale = self.window.scale_factor();
        ((p.x / scale) as f32, (p.y / scale) as f32)
    }

    /// Feed an event to the demo and carry out the pointer request it returns.
    fn dispatch(&mut self, event: InputEvent) {
        let InputResponse { request_pointer_lock, release_pointer_lock } = self.demo.handle_input(&event);
        if request_pointer_lock {
            let grabbed = self
                .window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined));
            match grabbed {
                Ok(()) => {
                    self.window.set_cursor_visible(false);
                    self.dispatch(InputEvent::PointerLockChanged { locked: true });
                }
                Err(err) => tracing::warn!("cursor grab refused: {err}"),
            }
        }
        if release_pointer_lock {
            self.release_cursor();
        }
    }

    fn release_cursor(&mut self) {
        if let Err(err) = self.window.set_cursor_grab(CursorGrabMode::None) {
            tracing::warn!("cursor release failed: {err}");
        }
        self.window.set_cursor_visible(true);
        if self.demo.input.pointer_locked {
            self.dispatch(InputEvent::PointerLockChanged { locked: false });
        }
    }

    fn on_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, .. },
                ..
            } => {
                // winit key codes print with the same names as DOM `code`
                let code = format!("{code:?}");
                self.dispatch(match state {
                    ElementState::Pressed => InputEvent::KeyDown(code),
                    ElementState::Released => InputEvent::KeyUp(code),
                });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    winit::event::MouseButton::Right => MouseButton::Right,
                    winit::event::MouseButton::Middle => MouseButton::Middle,
                    _ => MouseButton::Left,
                };
                let (x, y) = self.cursor.map(|p| self.logical(p)).unwrap_or_default();
                self.dispatch(InputEvent::MouseClick { button, is_down: *state == ElementState::Pressed, x, y });
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = self.logical(*position);
                if let (Some(last), false) = (self.cursor, self.demo.input.pointer_locked) {
                    let (lx, ly) = self.logical(last);
                    self.dispatch(InputEvent::MouseMove { dx: x - lx, dy: y - ly });
                }
                self.cursor = Some(*position);
                self.dispatch(InputEvent::PointerMoved { x, y });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_LINE_PX,
                    MouseScrollDelta::PixelDelta(p) => -(p.y as f32),
                };
                self.dispatch(InputEvent::MouseWheel { delta_y });
            }
            WindowEvent::Touch(touch) => {
                let (x, y) = self.logical(touch.location);
                match touch.phase {
                    TouchPhase::Started => {
                        self.touches.insert(touch.id);
                        let touches = self.touches.len() as u32;
                        self.dispatch(InputEvent::TouchStart { x, y, touches });
                    }
                    TouchPhase::Moved => {
                        let touches = self.touches.len() as u32;
                        self.dispatch(InputEvent::TouchMove { x, y, touches });
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        self.touches.remove(&touch.id);
                        self.dispatch(InputEvent::TouchEnd);
                    }
                }
            }
            WindowEvent::Focused(false) => {
                self.dispatch(InputEvent::FocusLost);
                if self.demo.input.pointer_locked {
                    self.release_cursor();
                }
            }
            WindowEvent::Occluded(occluded) => {
                self.dispatch(InputEvent::VisibilityChanged { visible: !occluded });
            }
            _ => {}
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.renderer.resize(&self.gpu.device, width, height);
        self.demo.resize(width, height);
    }

    fn redraw(&mut self, egui_ctx: &egui::Context, now_seconds: f64) -> opticlab::Result<()> {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let (output, actions) = ui::run(egui_ctx, raw_input, &self.demo.ui_model());
        self.actions = actions;
        self.egui_state.handle_platform_output(&self.window, output.platform_output);

        let dt = self.demo.clock.tick(now_seconds);
        let plan = self.demo.update(dt, &self.actions);
        self.demo.ui_wants_pointer = egui_ctx.wants_pointer_input();

        let primitives = egui_ctx.tessellate(output.shapes, output.pixels_per_point);
        self.renderer.draw_frame(
            &self.gpu,
            &plan,
            &self.demo.scene,
            EguiFrame {
                primitives,
                textures_delta: output.textures_delta,
                pixels_per_point: output.pixels_per_point,
            },
        )
    }
}

struct App {
    cli: Cli,
    config: Option<DemoConfig>,
    egui_ctx: egui::Context,
    running: Option<Running>,
    started: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(cli: Cli, config: DemoConfig) -> Self {
        Self {
            cli,
            config: Some(config),
            egui_ctx: egui::Context::default(),
            running: None,
            started: Instant::now(),
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop, config: DemoConfig) -> Result<Running> {
        let attributes = Window::default_attributes()
            .with_title(format!("opticlab - {}", config.title))
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(attributes).context("failed to create window")?);
        let size = window.inner_size();

        let gpu = pollster::block_on(GpuContext::new_native(window.clone(), size.width, size.height))?;
        let renderer = RenderState::new(&gpu, &config);
        let egui_state = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let mut demo = FrameLoopContext::new(config, gpu.config.width, gpu.config.height, self.cli.touch)?;
        demo.start_loading(&self.cli.asset_root);

        Ok(Running {
            window,
            gpu,
            renderer,
            egui_state,
            demo,
            actions: UiActions::default(),
            cursor: None,
            touches: HashSet::new(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        tracing::error!("{err:#}");
        self.error = Some(err);
        if let Some(running) = &mut self.running {
            running.demo.stop();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else { return };
        match self.start(event_loop, config) {
            Ok(running) => {
                running.window.request_redraw();
                self.running = Some(running);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(running) = &mut self.running else { return };

        let response = running.egui_state.on_window_event(&running.window, &event);
        running.demo.ui_wants_pointer = self.egui_ctx.wants_pointer_input();

        match event {
            WindowEvent::CloseRequested => {
                running.demo.stop();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => running.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let now = self.started.elapsed().as_secs_f64();
                if let Err(err) = running.redraw(&self.egui_ctx, now) {
                    self.fail(event_loop, err.into());
                    return;
                }
                if !running.demo.is_running() {
                    event_loop.exit();
                }
            }
            ref other if !response.consumed => running.on_window_event(other),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        let Some(running) = &mut self.running else { return };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if running.demo.input.pointer_locked {
                running.dispatch(InputEvent::MouseMove { dx: dx as f32, dy: dy as f32 });
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}

fn load_config(cli: &Cli) -> Result<DemoConfig> {
    match &cli.config {
        Some(path) => {
            let config = DemoConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
            if config.kind != cli.demo {
                tracing::info!(file = %config.kind, flag = %cli.demo, "config file selects the demo");
            }
            Ok(config)
        }
        None => Ok(DemoConfig::builtin(cli.demo)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    let config = load_config(&cli)?;
    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }
    tracing::info!(demo = %config.kind, asset_root = %cli.asset_root, touch = cli.touch, "opticlab starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(cli, config);
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
