use std::collections::BTreeMap;

use glam::Vec3;

use crate::config::PresetEntry;
use crate::error::{DemoError, Result};

/// Fixed camera placement reachable by name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPreset {
    pub position: Vec3,
    pub target: Vec3,
}

impl From<PresetEntry> for ViewPreset {
    fn from(e: PresetEntry) -> Self {
        Self {
            position: Vec3::from_array(e.position),
            target: Vec3::from_array(e.target),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewPresets {
    presets: BTreeMap<String, ViewPreset>,
}

impl ViewPresets {
    pub fn from_entries(entries: &BTreeMap<String, PresetEntry>) -> Self {
        Self {
            presets: entries.iter().map(|(k, v)| (k.clone(), (*v).into())).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<ViewPreset> {
        self.presets
            .get(name)
            .copied()
            .ok_or_else(|| DemoError::UnknownPreset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }
}

/// Quadratic ease-in-out on `[0, 1]`.
pub fn ease_in_out_quad(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Scripted camera move between two placements.
#[derive(Debug, Clone)]
pub struct CameraTransition {
    from: ViewPreset,
    to: ViewPreset,
    duration: f32,
    elapsed: f32,
}

impl CameraTransition {
    pub const DEFAULT_DURATION: f32 = 1.5;

    pub fn new(from: ViewPreset, to: ViewPreset, duration: f32) -> Self {
        Self { from, to, duration: duration.max(f32::EPSILON), elapsed: 0.0 }
    }

    /// Advance by `dt` seconds and return the interpolated placement.
    pub fn advance(&mut self, dt: f32) -> ViewPreset {
        self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
        let t = ease_in_out_quad(self.elapsed / self.duration);
        ViewPreset {
            position: self.from.position.lerp(self.to.position, t),
            target: self.from.target.lerp(self.to.target, t),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ames() -> ViewPresets {
        let cfg = crate::config::DemoConfig::builtin(crate::config::DemoKind::AmesRoom);
        ViewPresets::from_entries(&cfg.presets)
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert!(matches!(ames().get("isometric"), Err(DemoError::UnknownPreset(n)) if n == "isometric"));
    }

    #[test]
    fn diagonal_preset_resolves() {
        let p = ames().get("diagonal").unwrap();
        assert_eq!(p.position, Vec3::new(6.0, 4.0, 6.0));
        assert_eq!(p.target, Vec3::ZERO);
    }

    #[test]
    fn easing_hits_endpoints_and_midpoint() {
        assert_eq!(ease_in_out_quad(0.0), 0.0);
        assert_eq!(ease_in_out_quad(0.5), 0.5);
        assert_eq!(ease_in_out_quad(1.0), 1.0);
    }

    #[test]
    fn transition_lands_on_destination() {
        let presets = ames();
        let mut tr = CameraTransition::new(
            presets.get("front").unwrap(),
            presets.get("side").unwrap(),
            CameraTransition::DEFAULT_DURATION,
        );
        let mut last = tr.advance(0.0);
        for _ in 0..100 {
            last = tr.advance(1.0 / 60.0);
        }
        assert!(tr.is_finished());
        assert_eq!(last.position, Vec3::new(8.0, 0.0, 0.0));
    }
}
