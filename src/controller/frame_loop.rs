use std::f32::consts::PI;

use glam::{Mat4, Quat, Vec3};

use crate::config::{rgb, DemoConfig, DemoKind, LightingSettings};
use crate::controller::avatar::Avatar;
use crate::controller::input::{InputEvent, InputProcessor, InputState, MouseButton};
use crate::controller::interaction::{InputResponse, InteractionController};
use crate::controller::movement::MoveFlags;
use crate::controller::orbit::OrbitController;
use crate::error::{DemoError, Result};
use crate::model::asset::{AssetInbox, AssetRequest, LoadedAssets};
use crate::model::background::BackgroundState;
use crate::model::camera::{Camera, Orientation};
use crate::model::lens::{LensMode, LensState};
use crate::model::reflection::ReflectionSchedule;
use crate::model::scene::{LoadStatus, SceneState};
use crate::model::spectrum::{BandLight, BeamPose, SpectrumState};
use crate::model::view_preset::{CameraTransition, ViewPreset, ViewPresets};
use crate::utils::{create_cylinder_mesh, Mesh};

/// Longest step a single frame may advance the simulation.
pub const MAX_FRAME_DT: f32 = 0.1;
pub const MAX_SPOTS: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

impl CameraUniform {
    pub fn new(view_proj: Mat4, eye: Vec3) -> Self {
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            eye: eye.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotUniform {
    /// xyz position, w intensity
    pub position: [f32; 4],
    /// xyz direction, w cos of the outer cone angle
    pub direction: [f32; 4],
    /// rgb colour, w range
    pub color: [f32; 4],
    /// x cos of the inner cone angle
    pub cone: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    /// rgb ambient * intensity, w environment reflectance
    pub ambient: [f32; 4],
    /// xyz direction toward the sun
    pub sun_direction: [f32; 4],
    pub sun_color: [f32; 4],
    /// rgb fog colour, w 1 when fog is on
    pub fog_color: [f32; 4],
    /// x near, y far
    pub fog_range: [f32; 4],
    /// x spot count, y 1 when an environment image is bound
    pub counts: [u32; 4],
    pub spots: [SpotUniform; MAX_SPOTS],
}

impl LightingUniform {
    pub fn from_settings(settings: &LightingSettings, sun_position: Vec3, spots: &[BandLight]) -> Self {
        let sun_target = Vec3::from_array(settings.sun_target);
        let sun_dir = (sun_position - sun_target).try_normalize().unwrap_or(Vec3::Y);
        let ambient = Vec3::from_array(settings.ambient_color) * settings.ambient_intensity;
        let sun = Vec3::from_array(settings.sun_color) * settings.sun_intensity;
        let (fog_on, fog) = match settings.fog {
            Some([near, far]) => (1.0, [near, far, 0.0, 0.0]),
            None => (0.0, [0.0; 4]),
        };
        let [br, bg, bb] = settings.background;

        let mut uniform = Self {
            ambient: ambient.extend(settings.environment_reflectance).to_array(),
            sun_direction: sun_dir.extend(0.0).to_array(),
            sun_color: sun.extend(1.0).to_array(),
            fog_color: [br, bg, bb, fog_on],
            fog_range: fog,
            counts: [0; 4],
            spots: [SpotUniform::default(); MAX_SPOTS],
        };
        for (slot, light) in uniform.spots.iter_mut().zip(spots) {
            *slot = spot_uniform(light);
        }
        uniform.counts[0] = spots.len().min(MAX_SPOTS) as u32;
        uniform
    }
}

/// Cone of the band spot lights: pi/28 wide with a 0.2 penumbra, reaching 25 units.
fn spot_uniform(light: &BandLight) -> SpotUniform {
    let angle = PI / 28.0;
    let dir = (light.target - light.position).try_normalize().unwrap_or(Vec3::X);
    let [r, g, b] = light.color;
    SpotUniform {
        position: light.position.extend(light.intensity).to_array(),
        direction: dir.extend(angle.cos()).to_array(),
        color: [r, g, b, 25.0],
        cone: [(angle * (1.0 - 0.2)).cos(), 0.0, 0.0, 0.0],
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LensUniform {
    pub proj: [[f32; 4]; 4],
    /// x power, y opacity, z radius, w distance
    pub params: [f32; 4],
    /// x mode index
    pub mode: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BackgroundUniform {
    /// x time
    pub time: [f32; 4],
    /// xy smoothed pointer, zw visible half extent of the plane in uv
    pub mouse_extent: [f32; 4],
}

/// One render pass the renderer must run this frame, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// Hide the probe's mesh and render the scene into its cube target.
    ReflectionCapture { probe: usize },
    /// Scene into the lens texture, overlay hidden.
    LensOffscreen,
    Screen,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub passes: Vec<RenderPass>,
    pub camera: CameraUniform,
    pub lighting: LightingUniform,
    pub clear_color: [f32; 3],
    /// Per-frame geometry drawn blended after the scene.
    pub transparent: Option<Mesh>,
    pub lens: Option<LensUniform>,
    pub lens_overlay: bool,
    pub background: Option<BackgroundUniform>,
    pub sky: bool,
}

/// Values the UI reports back each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiActions {
    pub lens_mode: Option<LensMode>,
    pub preset: Option<String>,
    pub prism_angle_deg: Option<f32>,
    pub show_spectrum: Option<bool>,
    pub shadow_light: Option<[f32; 3]>,
    /// Current state of the touch movement panel, when shown.
    pub touch_panel: Option<MoveFlags>,
}

/// Read-only view of the context for building the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct UiModel {
    pub kind: DemoKind,
    pub title: String,
    pub overlay_visible: bool,
    pub status_text: String,
    pub lens_mode: Option<LensMode>,
    pub preset_names: Vec<String>,
    pub prism: Option<(f32, bool)>,
    pub shadow_light: Option<[f32; 3]>,
    pub touch_panel: bool,
}

/// Per-demo behaviour on top of the shared camera and scene.
pub enum DemoState {
    /// Orbit only; the model is the whole demo.
    Orbit,
    Ames { presets: ViewPresets, transition: Option<CameraTransition> },
    Lens(LensState),
    Walkthrough {
        controller: InteractionController,
        avatar: Avatar,
        schedule: Option<ReflectionSchedule>,
    },
    Prism(SpectrumState),
    Shadow { light: Vec3 },
    Background(BackgroundState),
}

impl DemoState {
    fn from_config(config: &DemoConfig, touch: bool) -> Self {
        if let Some(walk) = &config.walk {
            return DemoState::Walkthrough {
                controller: InteractionController::new(walk, touch),
                avatar: Avatar::new(walk),
                schedule: config.reflection.as_ref().map(|r| ReflectionSchedule::new(r.interval)),
            };
        }
        if let Some(lens) = &config.lens {
            return DemoState::Lens(LensState::new(lens.power, lens.fade_rate));
        }
        if let Some(prism) = &config.prism {
            return DemoState::Prism(SpectrumState::new(prism.clone()));
        }
        match config.kind {
            DemoKind::AmesRoom => DemoState::Ames {
                presets: ViewPresets::from_entries(&config.presets),
                transition: None,
            },
            DemoKind::Shadow => DemoState::Shadow { light: Vec3::from_array(config.lighting.sun_position) },
            DemoKind::Background => DemoState::Background(BackgroundState::new()),
            _ => DemoState::Orbit,
        }
    }
}

/// Converts host timestamps into clamped frame steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameClock {
    last: Option<f64>,
}

impl FrameClock {
    /// Seconds since the previous tick; zero on the first.
    pub fn tick(&mut self, now_seconds: f64) -> f32 {
        let dt = match self.last {
            Some(last) => (now_seconds - last) as f32,
            None => 0.0,
        };
        self.last = Some(now_seconds);
        dt.clamp(0.0, MAX_FRAME_DT)
    }
}

/// Everything one demo mutates between frames.
///
/// The host feeds it events, calls [`FrameLoopContext::update`] once per
/// frame and hands the returned [`FramePlan`] to the renderer.
pub struct FrameLoopContext {
    pub config: DemoConfig,
    pub camera: Camera,
    pub orbit: Option<OrbitController>,
    pub scene: SceneState,
    pub input: InputState,
    pub demo: DemoState,
    /// Frames rendered so far; the first update makes it 1.
    pub frame: u64,
    pub width: u32,
    pub height: u32,
    /// Set by the host when egui is using the pointer.
    pub ui_wants_pointer: bool,
    pub clock: FrameClock,
    processor: InputProcessor,
    inbox: Option<AssetInbox>,
    running: bool,
}

impl FrameLoopContext {
    pub fn new(config: DemoConfig, width: u32, height: u32, touch: bool) -> Result<Self> {
        let camera = Camera::from_settings(&config.camera, width, height);
        let demo = DemoState::from_config(&config, touch);
        let orbit = match (&demo, &config.orbit) {
            (DemoState::Walkthrough { .. } | DemoState::Background(_), _) | (_, None) => None,
            (_, Some(settings)) => Some(OrbitController::new(
                settings.clone(),
                camera.eye,
                Vec3::from_array(config.camera.target),
            )),
        };
        let scene = SceneState::new(&config);

        let mut ctx = Self {
            config,
            camera,
            orbit,
            scene,
            input: InputState::new(),
            demo,
            frame: 0,
            width: width.max(1),
            height: height.max(1),
            ui_wants_pointer: false,
            clock: FrameClock::default(),
            processor: InputProcessor::default(),
            inbox: None,
            running: true,
        };

        if let Some(name) = ctx.config.initial_preset.clone() {
            ctx.set_view(&name, false)?;
        }
        if let DemoState::Walkthrough { controller, avatar, .. } = &ctx.demo {
            ctx.camera.eye = avatar.position;
            ctx.camera.orientation = Orientation::YawPitch { yaw: controller.yaw, pitch: controller.pitch };
        }
        tracing::info!(demo = %ctx.config.kind, width, height, touch, "demo context created");
        Ok(ctx)
    }

    /// Fire off the asset load; the result is picked up by `update`.
    pub fn start_loading(&mut self, asset_root: &str) {
        if let Some(request) = AssetRequest::from_config(&self.config) {
            tracing::info!(model = ?request.model, environment = ?request.environment, "loading assets");
            self.inbox = Some(AssetInbox::spawn(request, asset_root.to_string()));
        }
    }

    /// Populate the scene from a finished load, or record the failure.
    pub fn install_assets(&mut self, result: Result<LoadedAssets>) {
        match result {
            Ok(assets) => {
                self.scene.install(assets, &self.config);
                self.scene.status = LoadStatus::Ready;
            }
            Err(err) => self.scene.fail(err.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Dispose of the demo; the host loop stops scheduling frames.
    pub fn stop(&mut self) {
        if self.running {
            tracing::info!(frames = self.frame, "demo stopped");
        }
        self.running = false;
        self.inbox = None;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.camera.set_aspect(self.width, self.height);
    }

    /// Move to a named preset, either at once or over the default transition.
    pub fn set_view(&mut self, name: &str, animate: bool) -> Result<()> {
        let DemoState::Ames { presets, transition } = &mut self.demo else {
            return Err(DemoError::UnknownPreset(name.to_string()));
        };
        let to = presets.get(name)?;
        if animate {
            let from = ViewPreset { position: self.camera.eye, target: self.camera.target() };
            *transition = Some(CameraTransition::new(from, to, CameraTransition::DEFAULT_DURATION));
        } else {
            *transition = None;
            self.camera.eye = to.position;
            self.camera.orientation = Orientation::LookAt(to.target);
            if let Some(orbit) = &mut self.orbit {
                orbit.set_view(to.position, to.target);
            }
        }
        tracing::debug!(preset = name, animate, "view preset selected");
        Ok(())
    }

    /// Feed one platform event. Returns what the host must do with the pointer.
    pub fn handle_input(&mut self, event: &InputEvent) -> InputResponse {
        let starts_on_ui = self.ui_wants_pointer
            && matches!(
                event,
                InputEvent::MouseClick { is_down: true, .. } | InputEvent::TouchStart { .. }
            );
        if starts_on_ui {
            return InputResponse::default();
        }
        self.input.process_event(event);

        let loaded = self.scene.is_loaded();
        match &mut self.demo {
            DemoState::Walkthrough { controller, .. } => {
                // the lock gesture only counts once there is something to walk in
                let is_click = matches!(event, InputEvent::MouseClick { button: MouseButton::Left, .. });
                if is_click && !loaded {
                    return InputResponse::default();
                }
                match event {
                    InputEvent::KeyDown(key) if self.processor.is_escape(key) => controller.release_lock(),
                    _ => controller.handle_event(event),
                }
            }
            DemoState::Background(bg) => {
                if let InputEvent::PointerMoved { x, y } = event {
                    bg.pointer.point_at(*x, *y, self.width as f32, self.height as f32);
                }
                InputResponse::default()
            }
            _ => InputResponse::default(),
        }
    }

    fn apply_actions(&mut self, actions: &UiActions) {
        if let Some(name) = &actions.preset {
            if let Err(err) = self.set_view(name, true) {
                tracing::warn!("{err}");
            }
        }
        match &mut self.demo {
            DemoState::Lens(lens) => {
                if let Some(mode) = actions.lens_mode {
                    lens.set_mode(mode);
                }
            }
            DemoState::Prism(spectrum) => {
                if let Some(deg) = actions.prism_angle_deg {
                    spectrum.set_angle(deg);
                }
                if let Some(show) = actions.show_spectrum {
                    spectrum.show_spectrum = show;
                }
            }
            DemoState::Shadow { light } => {
                if let Some(pos) = actions.shadow_light {
                    *light = Vec3::from_array(pos);
                }
            }
            DemoState::Walkthrough { controller, .. } => {
                if let Some(flags) = actions.touch_panel {
                    controller.set_panel(flags);
                }
            }
            _ => {}
        }
    }

    fn update_orbit(&mut self, dt: f32) {
        if let DemoState::Ames { transition: Some(t), .. } = &mut self.demo {
            let view = t.advance(dt);
            let finished = t.is_finished();
            self.camera.eye = view.position;
            self.camera.orientation = Orientation::LookAt(view.target);
            if let Some(orbit) = &mut self.orbit {
                orbit.set_view(view.position, view.target);
            }
            if finished {
                if let DemoState::Ames { transition, .. } = &mut self.demo {
                    *transition = None;
                }
            }
            // discard drags made during the move
            self.input.consume_drag();
            self.input.consume_touch();
            return;
        }

        let drag = self.input.consume_drag() + self.input.consume_touch();
        let wheel = self.input.consume_wheel();
        if let Some(orbit) = &mut self.orbit {
            orbit.rotate(drag.x, drag.y);
            if wheel != 0.0 {
                orbit.zoom(wheel);
            }
            orbit.update(&mut self.camera);
        }
    }

    /// Advance one frame by `dt` seconds and describe what to draw.
    pub fn update(&mut self, dt: f32, actions: &UiActions) -> FramePlan {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);

        if let Some(inbox) = &mut self.inbox {
            match inbox.try_take() {
                Some(result) => {
                    self.inbox = None;
                    self.install_assets(result);
                }
                None => {
                    if let LoadStatus::Loading(percent) = &mut self.scene.status {
                        *percent = inbox.progress();
                    }
                }
            }
        }

        self.apply_actions(actions);
        self.update_orbit(dt);

        let lighting = &self.config.lighting;
        let mut sun_position = Vec3::from_array(lighting.sun_position);
        let mut spots = Vec::new();
        let mut transparent = None;
        let mut lens = None;
        let mut lens_overlay = false;
        let mut background = None;
        let mut schedule = None;

        match &mut self.demo {
            DemoState::Walkthrough { controller, avatar, schedule: s } => {
                let keys = self.processor.movement_flags(&self.input);
                let intent = controller.apply_frame(dt, keys);
                avatar.step(&intent, &self.scene.collision);
                self.camera.eye = avatar.position;
                self.camera.orientation =
                    Orientation::YawPitch { yaw: controller.yaw, pitch: controller.pitch };
                schedule = *s;
            }
            DemoState::Lens(state) => {
                let alpha = state.advance();
                let settings = self.config.lens.clone().unwrap_or_default();
                lens = Some(LensUniform {
                    proj: self.camera.projection().to_cols_array_2d(),
                    params: [state.power, alpha, settings.radius, settings.distance],
                    mode: [state.mode.index(), 0, 0, 0],
                });
                lens_overlay = state.overlay_visible();
            }
            DemoState::Prism(spectrum) => {
                spots = spectrum.lights();
                transparent = Some(prism_geometry(spectrum));
            }
            DemoState::Shadow { light } => sun_position = *light,
            DemoState::Background(bg) => {
                bg.advance(dt);
                let half_h = self.camera.eye.z * (self.camera.fov_y * 0.5).tan();
                let half_w = half_h * self.camera.aspect;
                background = Some(BackgroundUniform {
                    time: [bg.time, 0.0, 0.0, 0.0],
                    mouse_extent: [
                        bg.pointer.current.x,
                        bg.pointer.current.y,
                        half_w / BACKGROUND_PLANE_SIZE,
                        half_h / BACKGROUND_PLANE_SIZE,
                    ],
                });
            }
            DemoState::Orbit | DemoState::Ames { .. } => {}
        }

        self.frame += 1;

        let mut passes = Vec::new();
        if let Some(schedule) = schedule {
            if schedule.should_capture(self.frame) {
                passes.extend((0..self.scene.probes.len()).map(|probe| RenderPass::ReflectionCapture { probe }));
            }
        }
        if lens.is_some() {
            passes.push(RenderPass::LensOffscreen);
        }
        passes.push(RenderPass::Screen);

        let mut lighting = LightingUniform::from_settings(&self.config.lighting, sun_position, &spots);
        lighting.counts[1] = self.scene.environment.is_some() as u32;

        FramePlan {
            passes,
            camera: CameraUniform::new(self.camera.view_proj(), self.camera.eye),
            lighting,
            clear_color: self.config.lighting.background,
            transparent,
            lens,
            lens_overlay,
            background,
            sky: self.config.assets.sky && self.scene.environment.is_some(),
        }
    }

    /// Status shown by the overlay, combining load state and walkthrough gesture.
    pub fn status(&self) -> LoadStatus {
        match (&self.scene.status, &self.demo) {
            (LoadStatus::Ready, DemoState::Walkthrough { controller, .. }) => controller.status(),
            (status, _) => status.clone(),
        }
    }

    pub fn ui_model(&self) -> UiModel {
        let status = self.status();
        let touch_panel = matches!(
            &self.demo,
            DemoState::Walkthrough { controller, .. } if controller.is_touch()
        ) && self.scene.is_loaded();
        UiModel {
            kind: self.config.kind,
            title: self.config.title.clone(),
            overlay_visible: status.overlay_visible(),
            status_text: status.status_text(),
            lens_mode: match &self.demo {
                DemoState::Lens(lens) => Some(lens.mode),
                _ => None,
            },
            preset_names: match &self.demo {
                DemoState::Ames { presets, .. } => presets.names().map(str::to_string).collect(),
                _ => Vec::new(),
            },
            prism: match &self.demo {
                DemoState::Prism(s) => Some((s.angle_deg, s.show_spectrum)),
                _ => None,
            },
            shadow_light: match &self.demo {
                DemoState::Shadow { light } => Some(light.to_array()),
                _ => None,
            },
            touch_panel,
        }
    }
}

/// Side of the square plane the background shader is painted on.
const BACKGROUND_PLANE_SIZE: f32 = 10.0;

const BEAM_SEGMENTS: u32 = 16;

/// Cylinder along the pose's axis, flaring to 1.4x radius at the far end.
fn beam_mesh(pose: &BeamPose, beam_length: f32, radius: f32, color: [f32; 3], alpha: f32) -> Mesh {
    let [r, g, b] = color;
    create_cylinder_mesh(radius, radius * 1.4, beam_length, BEAM_SEGMENTS, false, [r, g, b, alpha])
        .transformed(&Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, pose.length_scale, 1.0),
            pose.rotation,
            pose.center,
        ))
}

/// Prism body, the incoming white beam and, when shown, one beam per band.
fn prism_geometry(spectrum: &SpectrumState) -> Mesh {
    let settings = spectrum.settings();
    let origin = spectrum.prism_position();
    let mut mesh = Mesh::empty();

    let body = create_cylinder_mesh(0.0, 1.8, 3.2, 3, true, [0.85, 0.9, 1.0, 0.35]).transformed(
        &Mat4::from_rotation_translation(
            Quat::from_rotation_y(PI / 6.0 + spectrum.angle_deg.to_radians()),
            origin,
        ),
    );
    mesh.extend(&body);

    let incoming = BeamPose {
        center: origin + Vec3::new(-settings.beam_length * 0.5, 0.0, 0.0),
        rotation: Quat::from_rotation_z(PI / 2.0),
        length_scale: 1.0,
    };
    mesh.extend(&beam_mesh(&incoming, settings.beam_length, 0.08, rgb(0xffeecc), 0.4));
    mesh.extend(&beam_mesh(&incoming, settings.beam_length, 0.14, rgb(0xffd9b3), 0.15));

    if spectrum.show_spectrum {
        for (pose, band) in spectrum.beams().iter().zip(spectrum.bands()) {
            mesh.extend(&beam_mesh(pose, settings.beam_length, 0.05, band.color, 0.7));
            mesh.extend(&beam_mesh(pose, settings.beam_length, 0.08, band.color, 0.3));
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoKind;
    use crate::model::scene::SceneMesh;
    use crate::utils::create_plane_mesh;

    fn ctx(kind: DemoKind, touch: bool) -> FrameLoopContext {
        FrameLoopContext::new(DemoConfig::builtin(kind), 800, 600, touch).unwrap()
    }

    fn mirror_assets() -> LoadedAssets {
        LoadedAssets {
            meshes: vec![SceneMesh::new(
                "Mirror_A",
                create_plane_mesh(2.0, 2.0, [1.0; 4]).transformed(&Mat4::from_translation(Vec3::new(20.0, 7.0, 0.0))),
            )],
            environment: None,
        }
    }

    #[test]
    fn clock_clamps_long_pauses() {
        let mut clock = FrameClock::default();
        assert_eq!(clock.tick(10.0), 0.0);
        assert!((clock.tick(10.016) - 0.016).abs() < 1e-4);
        assert_eq!(clock.tick(20.0), MAX_FRAME_DT);
        assert_eq!(clock.tick(19.0), 0.0);
    }

    #[test]
    fn ames_starts_on_front_preset() {
        let c = ctx(DemoKind::AmesRoom, false);
        assert_eq!(c.camera.eye, Vec3::new(0.0, 0.0, 8.0));
        assert_eq!(c.ui_model().preset_names.len(), 4);
    }

    #[test]
    fn animated_preset_arrives_after_duration() {
        let mut c = ctx(DemoKind::AmesRoom, false);
        c.set_view("top", true).unwrap();
        for _ in 0..40 {
            c.update(0.05, &UiActions::default());
        }
        assert!((c.camera.eye - Vec3::new(0.0, 8.0, 0.0)).length() < 1e-3);
        assert!(matches!(c.demo, DemoState::Ames { transition: None, .. }));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let mut c = ctx(DemoKind::AmesRoom, false);
        assert!(c.set_view("ceiling", false).is_err());
        assert!(ctx(DemoKind::Spiral, false).set_view("front", false).is_err());
    }

    #[test]
    fn lens_always_renders_offscreen_first() {
        let mut c = ctx(DemoKind::Lens, false);
        let plan = c.update(0.016, &UiActions::default());
        assert_eq!(plan.passes, [RenderPass::LensOffscreen, RenderPass::Screen]);
        assert!(!plan.lens_overlay);

        let actions = UiActions { lens_mode: Some(LensMode::Inverted), ..UiActions::default() };
        let plan = c.update(0.016, &actions);
        assert!(plan.lens_overlay);
        assert_eq!(plan.lens.unwrap().mode[0], LensMode::Inverted.index());
    }

    #[test]
    fn mirror_captures_on_interval_frames_only() {
        let mut c = ctx(DemoKind::Mirror, false);
        c.install_assets(Ok(mirror_assets()));
        for _ in 0..30 {
            let plan = c.update(0.016, &UiActions::default());
            let captures = plan
                .passes
                .iter()
                .filter(|p| matches!(p, RenderPass::ReflectionCapture { .. }))
                .count();
            assert_eq!(captures > 0, c.frame % 10 == 0, "frame {}", c.frame);
            assert_eq!(plan.passes.last(), Some(&RenderPass::Screen));
        }
    }

    #[test]
    fn walkthrough_waits_for_lock_after_load() {
        let mut c = ctx(DemoKind::Mirror, false);
        assert_eq!(c.status(), LoadStatus::Loading(None));
        let click = InputEvent::MouseClick { button: MouseButton::Left, is_down: true, x: 1.0, y: 1.0 };
        assert!(!c.handle_input(&click).request_pointer_lock);

        c.install_assets(Ok(mirror_assets()));
        assert_eq!(c.ui_model().status_text, "Click to start!");
        assert!(c.handle_input(&click).request_pointer_lock);
        c.handle_input(&InputEvent::PointerLockChanged { locked: true });
        assert!(!c.ui_model().overlay_visible);

        c.handle_input(&InputEvent::KeyDown("KeyW".into()));
        let before = c.camera.eye;
        c.update(0.05, &UiActions::default());
        assert!(c.camera.eye.x > before.x);
        assert_eq!(c.camera.eye.y, 7.0);
    }

    #[test]
    fn failed_load_shows_error() {
        let mut c = ctx(DemoKind::Spiral, false);
        c.install_assets(Err(DemoError::AssetFetch {
            path: "models/spiral.glb".into(),
            reason: "HTTP 404".into(),
        }));
        let ui = c.ui_model();
        assert!(ui.overlay_visible);
        assert!(ui.status_text.starts_with("Error: "));
    }

    #[test]
    fn prism_lights_follow_the_toggle() {
        let mut c = ctx(DemoKind::Prism, false);
        let plan = c.update(0.016, &UiActions { prism_angle_deg: Some(30.0), ..UiActions::default() });
        assert_eq!(plan.lighting.counts[0], 7);
        assert!(plan.lighting.spots[0].position[3] > 0.0);
        let lit = plan.transparent.unwrap().indices.len();

        let plan = c.update(0.016, &UiActions { show_spectrum: Some(false), ..UiActions::default() });
        assert_eq!(plan.lighting.spots[0].position[3], 0.0);
        assert!(plan.transparent.unwrap().indices.len() < lit);
    }

    #[test]
    fn shadow_slider_moves_sun() {
        let mut c = ctx(DemoKind::Shadow, false);
        let plan = c.update(0.016, &UiActions { shadow_light: Some([0.0, 10.0, 0.0]), ..UiActions::default() });
        assert!((plan.lighting.sun_direction[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn background_tracks_pointer() {
        let mut c = ctx(DemoKind::Background, false);
        c.handle_input(&InputEvent::PointerMoved { x: 800.0, y: 0.0 });
        let mut plan = c.update(0.016, &UiActions::default());
        for _ in 0..100 {
            plan = c.update(0.016, &UiActions::default());
        }
        let bg = plan.background.unwrap();
        assert!((bg.mouse_extent[0] - 1.0).abs() < 1e-3);
        assert!((bg.mouse_extent[1] - 1.0).abs() < 1e-3);
        assert!(bg.time[0] > 1.0);
    }

    #[test]
    fn stop_ends_the_loop() {
        let mut c = ctx(DemoKind::Spiral, false);
        assert!(c.is_running());
        c.stop();
        assert!(!c.is_running());
    }

    #[test]
    fn escape_key_releases_walkthrough_lock() {
        let mut c = ctx(DemoKind::Mirror, false);
        c.handle_input(&InputEvent::PointerLockChanged { locked: true });
        assert!(!c.handle_input(&InputEvent::KeyDown("KeyQ".into())).release_pointer_lock);
        assert!(c.handle_input(&InputEvent::KeyDown("Escape".into())).release_pointer_lock);
        assert!(!c.handle_input(&InputEvent::KeyDown("Escape".into())).release_pointer_lock);
    }
}
