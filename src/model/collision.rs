use glam::Vec3;

use crate::model::scene::SceneMesh;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.abs() * 0.5;
        Self { min: center - half, max: center + half }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Touching faces count as overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

/// Boxes that block the avatar, collected from tagged scene meshes.
#[derive(Debug, Clone, Default)]
pub struct CollisionVolumeSet {
    volumes: Vec<Aabb>,
}

impl CollisionVolumeSet {
    pub fn new(volumes: Vec<Aabb>) -> Self {
        Self { volumes }
    }

    /// Keep every mesh whose lower-cased name contains one of `tags`.
    pub fn from_meshes<'a>(meshes: impl IntoIterator<Item = &'a SceneMesh>, tags: &[String]) -> Self {
        let volumes = meshes
            .into_iter()
            .filter(|m| m.has_any_tag(tags))
            .map(|m| m.bounds)
            .collect();
        Self { volumes }
    }

    pub fn overlaps(&self, probe: &Aabb) -> bool {
        self.volumes.iter().any(|v| v.intersects(probe))
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_boxes_do_not_intersect() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
    }

    #[test]
    fn new_orders_corners() {
        let a = Aabb::new(Vec3::ONE, Vec3::ZERO);
        assert_eq!(a.min, Vec3::ZERO);
        assert_eq!(a.max, Vec3::ONE);
    }

    #[test]
    fn center_size_round_trip() {
        let a = Aabb::from_center_size(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 4.5, 1.0));
        assert_eq!(a.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a.size(), Vec3::new(1.0, 4.5, 1.0));
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::new(Vec3::splat(-3.0), Vec3::splat(-1.0));
        let b = Aabb::new(Vec3::splat(1.0), Vec3::splat(3.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::splat(-3.0));
        assert_eq!(u.max, Vec3::splat(3.0));
    }
}
