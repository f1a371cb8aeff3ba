use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::config::OrbitSettings;
use crate::model::camera::{Camera, Orientation};

const PHI_EPS: f32 = 1e-6;

/// Damped orbit around a target point.
///
/// Angles are spherical: `theta` is the azimuth from +Z toward +X and
/// `phi` the polar angle from +Y.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
    pending: Vec2,
    settings: OrbitSettings,
}

impl OrbitController {
    pub fn new(settings: OrbitSettings, eye: Vec3, target: Vec3) -> Self {
        let mut orbit = Self {
            target,
            radius: 1.0,
            theta: 0.0,
            phi: PI / 2.0,
            pending: Vec2::ZERO,
            settings,
        };
        orbit.set_view(eye, target);
        orbit
    }

    /// Jump to `eye` looking at `target`, dropping any pending rotation.
    pub fn set_view(&mut self, eye: Vec3, target: Vec3) {
        let offset = eye - target;
        self.target = target;
        self.radius = offset.length().max(PHI_EPS);
        self.theta = offset.x.atan2(offset.z);
        self.phi = (offset.y / self.radius).clamp(-1.0, 1.0).acos();
        self.pending = Vec2::ZERO;
    }

    /// Queue a pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending -= Vec2::new(dx, dy) * self.settings.rotate_speed;
    }

    /// Wheel zoom; positive `delta` moves away.
    pub fn zoom(&mut self, delta: f32) {
        self.radius = (self.radius * (delta * self.settings.zoom_speed).exp())
            .clamp(self.settings.min_distance, self.settings.max_distance);
    }

    pub fn eye(&self) -> Vec3 {
        let (sp, cp) = self.phi.sin_cos();
        let (st, ct) = self.theta.sin_cos();
        self.target + Vec3::new(sp * st, cp, sp * ct) * self.radius
    }

    /// Apply a damped share of the pending rotation and place the camera.
    pub fn update(&mut self, camera: &mut Camera) {
        let damping = self.settings.damping.clamp(0.0, 1.0);
        let step = self.pending * damping;
        self.pending -= step;
        self.theta += step.x;
        self.phi = (self.phi + step.y).clamp(PHI_EPS, PI - PHI_EPS);
        self.radius = self.radius.clamp(self.settings.min_distance, self.settings.max_distance);

        camera.eye = self.eye();
        camera.orientation = Orientation::LookAt(self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new(800, 600)
    }

    #[test]
    fn set_view_round_trips_eye() {
        let orbit = OrbitController::new(OrbitSettings::default(), Vec3::new(6.0, 4.0, 6.0), Vec3::ZERO);
        assert!((orbit.eye() - Vec3::new(6.0, 4.0, 6.0)).length() < 1e-4);
    }

    #[test]
    fn drag_settles_on_full_rotation() {
        let mut orbit = OrbitController::new(OrbitSettings::default(), Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO);
        orbit.rotate(-100.0, 0.0);
        let mut cam = camera();
        for _ in 0..600 {
            orbit.update(&mut cam);
        }
        assert!((orbit.theta - 0.5).abs() < 1e-3);
        assert!((cam.eye.length() - 8.0).abs() < 1e-3);
        assert_eq!(cam.orientation, Orientation::LookAt(Vec3::ZERO));
    }

    #[test]
    fn zoom_respects_limits() {
        let settings = OrbitSettings { min_distance: 5.0, max_distance: 15.0, ..OrbitSettings::default() };
        let mut orbit = OrbitController::new(settings, Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO);
        orbit.zoom(1e6);
        assert_eq!(orbit.radius, 15.0);
        orbit.zoom(-1e6);
        assert_eq!(orbit.radius, 5.0);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut orbit = OrbitController::new(OrbitSettings::default(), Vec3::new(0.0, 0.0, 8.0), Vec3::ZERO);
        orbit.rotate(0.0, 1e5);
        let mut cam = camera();
        for _ in 0..200 {
            orbit.update(&mut cam);
        }
        assert!(orbit.phi >= PHI_EPS && orbit.phi <= PI - PHI_EPS);
    }
}
