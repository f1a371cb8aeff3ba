use glam::Vec3;

use crate::config::WalkSettings;
use crate::controller::interaction::DisplacementIntent;
use crate::model::collision::{Aabb, CollisionVolumeSet};

/// The walkthrough body: a box that carries the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub position: Vec3,
    pub collider_size: Vec3,
    pub eye_height: f32,
}

impl Avatar {
    pub fn new(settings: &WalkSettings) -> Self {
        let mut position = Vec3::from_array(settings.start);
        position.y = settings.eye_height;
        Self {
            position,
            collider_size: Vec3::from_array(settings.collider_size),
            eye_height: settings.eye_height,
        }
    }

    pub fn collider_at(&self, position: Vec3) -> Aabb {
        Aabb::from_center_size(position, self.collider_size)
    }

    /// Apply one frame of displacement. Returns whether it was committed.
    ///
    /// A blocked move is dropped whole, there is no sliding along walls.
    pub fn step(&mut self, intent: &DisplacementIntent, volumes: &CollisionVolumeSet) -> bool {
        let mut committed = false;
        if intent.world != Vec3::ZERO {
            let candidate = self.position + intent.world;
            if !volumes.overlaps(&self.collider_at(candidate)) {
                self.position = candidate;
                committed = true;
            }
        }
        self.position.y = self.eye_height;
        committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avatar() -> Avatar {
        Avatar { position: Vec3::new(0.0, 7.0, 0.0), collider_size: Vec3::new(1.0, 4.5, 1.0), eye_height: 7.0 }
    }

    fn wall_at_x(x: f32) -> CollisionVolumeSet {
        CollisionVolumeSet::new(vec![Aabb::new(Vec3::new(x, 0.0, -10.0), Vec3::new(x + 1.0, 20.0, 10.0))])
    }

    #[test]
    fn free_move_commits() {
        let mut a = avatar();
        let intent = DisplacementIntent { world: Vec3::new(0.0, 0.0, 0.3), active: true };
        assert!(a.step(&intent, &wall_at_x(5.0)));
        assert_eq!(a.position, Vec3::new(0.0, 7.0, 0.3));
    }

    #[test]
    fn blocked_move_is_rejected_whole() {
        let mut a = avatar();
        a.position.x = 4.2;
        // the z part alone would be fine, but the move is not split
        let intent = DisplacementIntent { world: Vec3::new(0.5, 0.0, 0.5), active: true };
        assert!(!a.step(&intent, &wall_at_x(5.0)));
        assert_eq!(a.position, Vec3::new(4.2, 7.0, 0.0));
    }

    #[test]
    fn eye_height_is_pinned_even_without_movement() {
        let mut a = avatar();
        a.position.y = 3.0;
        a.step(&DisplacementIntent::default(), &CollisionVolumeSet::default());
        assert_eq!(a.position.y, 7.0);
    }

    #[test]
    fn start_uses_eye_height() {
        let a = Avatar::new(&WalkSettings::default());
        assert_eq!(a.position, Vec3::new(-16.0, 7.0, 0.0));
    }
}
