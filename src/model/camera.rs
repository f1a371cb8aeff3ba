use glam::{Mat4, Vec3};

use crate::config::CameraSettings;

/// Largest pitch a first-person camera may reach, just short of straight up/down.
pub const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.05;

/// How the camera is aimed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Orientation {
    /// First-person angles in radians; yaw 0 looks down +X.
    YawPitch { yaw: f32, pitch: f32 },
    /// Orbit style: always looks at a world-space point.
    LookAt(Vec3),
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub orientation: Orientation,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 5.0),
            orientation: Orientation::LookAt(Vec3::ZERO),
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: 0.1,
            z_far: 1000.0,
        }
    }

    pub fn from_settings(settings: &CameraSettings, width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::from_array(settings.position),
            orientation: Orientation::LookAt(Vec3::from_array(settings.target)),
            up: Vec3::Y,
            fov_y: settings.fov_deg.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: settings.near,
            z_far: settings.far,
        }
    }

    pub fn forward(&self) -> Vec3 {
        match self.orientation {
            Orientation::YawPitch { yaw, pitch } => {
                let cp = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
                Vec3::new(yaw.cos() * cp.cos(), cp.sin(), yaw.sin() * cp.cos()).normalize()
            }
            Orientation::LookAt(target) => (target - self.eye).try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }

    pub fn target(&self) -> Vec3 {
        match self.orientation {
            Orientation::LookAt(target) => target,
            Orientation::YawPitch { .. } => self.eye + self.forward(),
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.forward();
        // look_at degenerates when looking along the up axis
        let up = if forward.cross(self.up).length_squared() < 1e-6 {
            Vec3::NEG_Z
        } else {
            self.up
        };
        Mat4::look_at_rh(self.eye, self.eye + forward, up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_zero_looks_down_positive_x() {
        let mut cam = Camera::new(800, 600);
        cam.orientation = Orientation::YawPitch { yaw: 0.0, pitch: 0.0 };
        assert!((cam.forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn view_straight_down_is_finite() {
        let mut cam = Camera::new(800, 600);
        cam.eye = Vec3::new(0.0, 8.0, 0.0);
        cam.orientation = Orientation::LookAt(Vec3::ZERO);
        assert!(cam.view_proj().is_finite());
    }

    #[test]
    fn aspect_tolerates_zero_height() {
        let mut cam = Camera::new(800, 600);
        cam.set_aspect(640, 0);
        assert!(cam.aspect.is_finite());
    }
}
