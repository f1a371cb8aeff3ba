use glam::Vec2;

/// Four direction flags, from keys or the touch panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveFlags {
    pub const NONE: MoveFlags = MoveFlags { forward: false, backward: false, left: false, right: false };

    pub fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }

    /// Unit direction: x lateral (right positive), y forward.
    pub fn direction(&self) -> Vec2 {
        let x = self.right as i32 - self.left as i32;
        let y = self.forward as i32 - self.backward as i32;
        Vec2::new(x as f32, y as f32).normalize_or_zero()
    }
}

/// Damped velocity in the avatar's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementState {
    /// x lateral, y forward.
    pub velocity: Vec2,
    pub acceleration: f32,
    pub damping: f32,
}

impl MovementState {
    pub fn new(acceleration: f32, damping: f32) -> Self {
        Self { velocity: Vec2::ZERO, acceleration, damping }
    }

    /// Advance by `dt` and return the local displacement for this frame.
    pub fn integrate(&mut self, flags: MoveFlags, dt: f32) -> Vec2 {
        let dt = dt.max(0.0);
        let decay = (self.damping * dt).clamp(0.0, 1.0);
        self.velocity -= self.velocity * decay;

        let dir = flags.direction();
        if flags.forward || flags.backward {
            self.velocity.y += dir.y * self.acceleration * dt;
        }
        if flags.left || flags.right {
            self.velocity.x += dir.x * self.acceleration * dt;
        }
        self.velocity * dt
    }

    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagonal_direction_is_normalised() {
        let flags = MoveFlags { forward: true, right: true, ..MoveFlags::NONE };
        assert!((flags.direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_flags_cancel() {
        let flags = MoveFlags { forward: true, backward: true, ..MoveFlags::NONE };
        assert_eq!(flags.direction(), Vec2::ZERO);
    }

    #[test]
    fn held_forward_accelerates_forward() {
        let mut m = MovementState::new(9.0, 6.0);
        let flags = MoveFlags { forward: true, ..MoveFlags::NONE };
        let d = m.integrate(flags, 1.0 / 60.0);
        assert!(d.y > 0.0 && d.x == 0.0);
    }

    #[test]
    fn huge_step_stops_instead_of_reversing() {
        let mut m = MovementState::new(9.0, 6.0);
        m.velocity = Vec2::new(-2.0, 3.0);
        m.integrate(MoveFlags::NONE, 5.0);
        assert_eq!(m.velocity, Vec2::ZERO);
    }
}
