use glam::Vec2;

/// Pointer position smoothed toward the last reported location.
///
/// Coordinates are normalised to `[0, 1]` with y pointing up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerFollower {
    pub current: Vec2,
    pub target: Vec2,
    pub rate: f32,
}

impl PointerFollower {
    pub const DEFAULT_RATE: f32 = 0.12;

    pub fn new(rate: f32) -> Self {
        Self {
            current: Vec2::splat(0.5),
            target: Vec2::splat(0.5),
            rate: rate.clamp(0.0, 1.0),
        }
    }

    /// Record a pointer position in window pixels (y down).
    pub fn point_at(&mut self, x: f32, y: f32, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.target = Vec2::new(x / width, 1.0 - y / height);
    }

    pub fn step(&mut self) -> Vec2 {
        self.current = self.current.lerp(self.target, self.rate);
        self.current
    }
}

/// Uniforms of the animated background.
#[derive(Debug, Clone, Copy)]
pub struct BackgroundState {
    pub time: f32,
    pub pointer: PointerFollower,
}

impl BackgroundState {
    pub fn new() -> Self {
        Self { time: 0.0, pointer: PointerFollower::new(PointerFollower::DEFAULT_RATE) }
    }

    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
        self.pointer.step();
    }
}

impl Default for BackgroundState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_flips_y() {
        let mut p = PointerFollower::new(1.0);
        p.point_at(200.0, 0.0, 800.0, 600.0);
        assert_eq!(p.step(), Vec2::new(0.25, 1.0));
    }

    #[test]
    fn pointer_converges_without_overshoot() {
        let mut p = PointerFollower::new(PointerFollower::DEFAULT_RATE);
        p.point_at(800.0, 600.0, 800.0, 600.0);
        let mut prev = p.current.x;
        for _ in 0..60 {
            let x = p.step().x;
            assert!(x >= prev && x <= 1.0);
            prev = x;
        }
        assert!((prev - 1.0).abs() < 1e-3);
    }

    #[test]
    fn time_accumulates() {
        let mut bg = BackgroundState::new();
        bg.advance(0.5);
        bg.advance(0.25);
        assert_eq!(bg.time, 0.75);
    }
}
