use glam::{Vec2, Vec3};

use crate::config::WalkSettings;
use crate::controller::input::{InputEvent, MouseButton};
use crate::controller::movement::{MoveFlags, MovementState};
use crate::model::camera::PITCH_LIMIT;
use crate::model::scene::LoadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock yet; a click will ask for one.
    AwaitingGesture,
    Locked,
    /// Lock was dropped; only a new click brings it back.
    Released,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlMode {
    PointerLock { lock: LockState },
    Touch { panel: MoveFlags, last_touch: Option<Vec2>, touched: bool },
}

/// World-space move the controller wants the avatar to make this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplacementIntent {
    pub world: Vec3,
    /// A direction flag was held.
    pub active: bool,
}

/// What the host should do with the platform pointer after an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputResponse {
    pub request_pointer_lock: bool,
    pub release_pointer_lock: bool,
}

/// First-person control for the walkthrough, pointer-lock or touch.
#[derive(Debug, Clone)]
pub struct InteractionController {
    pub mode: ControlMode,
    pub movement: MovementState,
    pub yaw: f32,
    pub pitch: f32,
    look_sensitivity: f32,
    touch_sensitivity: f32,
}

impl InteractionController {
    pub fn new(settings: &WalkSettings, touch: bool) -> Self {
        let (mode, start_yaw_deg) = if touch {
            let mode = ControlMode::Touch { panel: MoveFlags::NONE, last_touch: None, touched: false };
            (mode, settings.touch_start_yaw_deg)
        } else {
            (ControlMode::PointerLock { lock: LockState::AwaitingGesture }, settings.start_yaw_deg)
        };
        Self {
            mode,
            movement: MovementState::new(settings.speed, settings.damping),
            yaw: start_yaw_deg.to_radians(),
            pitch: 0.0,
            look_sensitivity: settings.look_sensitivity,
            touch_sensitivity: settings.touch_sensitivity,
        }
    }

    pub fn is_touch(&self) -> bool {
        matches!(self.mode, ControlMode::Touch { .. })
    }

    fn look(&mut self, dx: f32, dy: f32, sensitivity: f32) {
        self.yaw += dx * sensitivity;
        self.pitch = (self.pitch - dy * sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Drop a held pointer lock from the keyboard.
    pub fn release_lock(&mut self) -> InputResponse {
        match &mut self.mode {
            ControlMode::PointerLock { lock } if *lock == LockState::Locked => {
                *lock = LockState::Released;
                self.movement.stop();
                InputResponse { release_pointer_lock: true, ..InputResponse::default() }
            }
            _ => InputResponse::default(),
        }
    }

    pub fn handle_event(&mut self, event: &InputEvent) -> InputResponse {
        let mut response = InputResponse::default();
        let look_sensitivity = self.look_sensitivity;
        let touch_sensitivity = self.touch_sensitivity;

        match &mut self.mode {
            ControlMode::PointerLock { lock } => match event {
                InputEvent::MouseClick { button: MouseButton::Left, is_down: true, .. }
                    if *lock != LockState::Locked =>
                {
                    response.request_pointer_lock = true;
                }
                InputEvent::PointerLockChanged { locked: true } => {
                    *lock = LockState::Locked;
                    tracing::debug!("pointer locked");
                }
                InputEvent::PointerLockChanged { locked: false } if *lock == LockState::Locked => {
                    *lock = LockState::Released;
                    self.movement.stop();
                    tracing::debug!("pointer lock released");
                }
                InputEvent::MouseMove { dx, dy } if *lock == LockState::Locked => {
                    let (dx, dy) = (*dx, *dy);
                    self.look(dx, dy, look_sensitivity);
                }
                _ => {}
            },
            ControlMode::Touch { last_touch, touched, .. } => match event {
                InputEvent::TouchStart { x, y, touches } => {
                    *touched = true;
                    *last_touch = (*touches == 1).then_some(Vec2::new(*x, *y));
                }
                InputEvent::TouchMove { x, y, touches } => {
                    let p = Vec2::new(*x, *y);
                    match *last_touch {
                        Some(prev) if *touches == 1 => {
                            *last_touch = Some(p);
                            let d = p - prev;
                            self.look(d.x, d.y, touch_sensitivity);
                        }
                        _ => *last_touch = None,
                    }
                }
                InputEvent::TouchEnd => *last_touch = None,
                _ => {}
            },
        }
        response
    }

    /// Panel buttons currently held (touch variant only).
    pub fn set_panel(&mut self, flags: MoveFlags) {
        if let ControlMode::Touch { panel, touched, .. } = &mut self.mode {
            if flags.any() {
                *touched = true;
            }
            *panel = flags;
        }
    }

    /// Overlay state the controller asks for once the scene is loaded.
    pub fn status(&self) -> LoadStatus {
        match &self.mode {
            ControlMode::PointerLock { lock: LockState::Locked } => LoadStatus::Ready,
            ControlMode::PointerLock { .. } => LoadStatus::AwaitingGesture,
            ControlMode::Touch { touched: true, .. } => LoadStatus::Ready,
            ControlMode::Touch { .. } => LoadStatus::TouchHint,
        }
    }

    /// Integrate movement for `dt` seconds and map it into world space.
    ///
    /// `keys` are the keyboard flags; they only count while locked.
    pub fn apply_frame(&mut self, dt: f32, keys: MoveFlags) -> DisplacementIntent {
        let flags = match &self.mode {
            ControlMode::PointerLock { lock: LockState::Locked } => keys,
            ControlMode::PointerLock { .. } => return DisplacementIntent::default(),
            ControlMode::Touch { panel, .. } => *panel,
        };
        let local = self.movement.integrate(flags, dt);
        let forward = Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin());
        let right = Vec3::new(-self.yaw.sin(), 0.0, self.yaw.cos());
        DisplacementIntent { world: right * local.x + forward * local.y, active: flags.any() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click() -> InputEvent {
        InputEvent::MouseClick { button: MouseButton::Left, is_down: true, x: 0.0, y: 0.0 }
    }

    fn forward() -> MoveFlags {
        MoveFlags { forward: true, ..MoveFlags::NONE }
    }

    #[test]
    fn click_requests_lock_and_keys_wait_for_it() {
        let mut c = InteractionController::new(&WalkSettings::default(), false);
        assert_eq!(c.status(), LoadStatus::AwaitingGesture);
        assert!(c.handle_event(&click()).request_pointer_lock);
        assert_eq!(c.apply_frame(0.016, forward()), DisplacementIntent::default());

        c.handle_event(&InputEvent::PointerLockChanged { locked: true });
        assert_eq!(c.status(), LoadStatus::Ready);
        let intent = c.apply_frame(0.016, forward());
        // yaw 0 faces +X
        assert!(intent.world.x > 0.0 && intent.world.z.abs() < 1e-6);
    }

    #[test]
    fn release_is_terminal_until_next_click() {
        let mut c = InteractionController::new(&WalkSettings::default(), false);
        c.handle_event(&InputEvent::PointerLockChanged { locked: true });
        c.handle_event(&InputEvent::PointerLockChanged { locked: false });
        assert_eq!(c.status(), LoadStatus::AwaitingGesture);
        assert_eq!(c.apply_frame(0.016, forward()).world, Vec3::ZERO);
        c.handle_event(&InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
        assert_eq!(c.yaw, 0.0);
        assert!(c.handle_event(&click()).request_pointer_lock);
    }

    #[test]
    fn release_lock_only_acts_while_locked() {
        let mut c = InteractionController::new(&WalkSettings::default(), false);
        assert_eq!(c.release_lock(), InputResponse::default());
        c.handle_event(&InputEvent::PointerLockChanged { locked: true });
        assert!(c.release_lock().release_pointer_lock);
        assert_eq!(c.mode, ControlMode::PointerLock { lock: LockState::Released });
        assert_eq!(c.status(), LoadStatus::AwaitingGesture);

        let mut touch = InteractionController::new(&WalkSettings::default(), true);
        assert_eq!(touch.release_lock(), InputResponse::default());
    }

    #[test]
    fn touch_drag_turns_and_clamps_pitch() {
        let mut c = InteractionController::new(&WalkSettings::default(), true);
        assert_eq!(c.status(), LoadStatus::TouchHint);
        let start = c.yaw;
        c.handle_event(&InputEvent::TouchStart { x: 0.0, y: 0.0, touches: 1 });
        c.handle_event(&InputEvent::TouchMove { x: 10.0, y: -5000.0, touches: 1 });
        assert!((c.yaw - start - 0.03).abs() < 1e-6);
        assert_eq!(c.pitch, PITCH_LIMIT);
        assert_eq!(c.status(), LoadStatus::Ready);
    }

    #[test]
    fn touch_panel_moves_without_lock() {
        let mut c = InteractionController::new(&WalkSettings::default(), true);
        c.set_panel(MoveFlags { right: true, ..MoveFlags::NONE });
        let intent = c.apply_frame(0.016, MoveFlags::NONE);
        // right of -Z is +X
        assert!(intent.world.x > 0.0 && intent.world.z.abs() < 1e-6 && intent.active);
    }

    #[test]
    fn touch_variant_starts_facing_negative_z() {
        let mut c = InteractionController::new(&WalkSettings::default(), true);
        c.set_panel(forward());
        let intent = c.apply_frame(0.016, MoveFlags::NONE);
        assert!(intent.world.z < 0.0, "{}", intent.world);
        assert!(intent.world.x.abs() < 1e-6);

        let desktop = InteractionController::new(&WalkSettings::default(), false);
        assert_eq!(desktop.yaw, 0.0);
    }
}
