use glam::{Mat4, Vec3};

use crate::config::ReflectionSettings;
use crate::model::scene::SceneMesh;

/// Cube faces in wgpu layer order: +X, -X, +Y, -Y, +Z, -Z.
const FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionSchedule {
    interval: u64,
}

impl ReflectionSchedule {
    pub fn new(interval: u64) -> Self {
        Self { interval: interval.max(1) }
    }

    pub fn should_capture(&self, frame: u64) -> bool {
        frame % self.interval == 0
    }
}

/// Cube capture point owned by one reflective mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionProbe {
    /// Index into the scene's mesh list.
    pub mesh_index: usize,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl ReflectionProbe {
    /// View-projection for each of the six cube faces.
    pub fn face_view_projs(&self) -> [Mat4; 6] {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, self.near, self.far);
        FACES.map(|(dir, up)| proj * Mat4::look_at_rh(self.position, self.position + dir, up))
    }
}

/// Probes for every reflective mesh present at load time.
pub fn build_probes(meshes: &[SceneMesh], settings: &ReflectionSettings) -> Vec<ReflectionProbe> {
    meshes
        .iter()
        .enumerate()
        .filter(|(_, m)| m.has_any_tag(&settings.reflective_tags))
        .map(|(mesh_index, m)| ReflectionProbe {
            mesh_index,
            position: m.bounds.center(),
            near: settings.near,
            far: settings.far,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_every_tenth_frame() {
        let schedule = ReflectionSchedule::new(10);
        let frames: Vec<u64> = (0..35).filter(|f| schedule.should_capture(*f)).collect();
        assert_eq!(frames, [0, 10, 20, 30]);
    }

    #[test]
    fn zero_interval_does_not_divide_by_zero() {
        assert!(ReflectionSchedule::new(0).should_capture(7));
    }

    #[test]
    fn face_matrices_are_finite() {
        let probe = ReflectionProbe { mesh_index: 0, position: Vec3::new(1.0, 7.0, 2.0), near: 0.1, far: 100.0 };
        assert!(probe.face_view_projs().iter().all(|m| m.is_finite()));
    }
}
