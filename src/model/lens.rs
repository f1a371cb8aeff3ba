use std::fmt;
use std::str::FromStr;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{DemoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensMode {
    #[default]
    Identity,
    Convergent,
    Divergent,
    Inverted,
    Periodic,
}

impl LensMode {
    pub const ALL: [LensMode; 5] = [
        LensMode::Identity,
        LensMode::Convergent,
        LensMode::Divergent,
        LensMode::Inverted,
        LensMode::Periodic,
    ];

    /// Integer tag passed to the shader.
    pub fn index(&self) -> u32 {
        match self {
            LensMode::Identity => 0,
            LensMode::Convergent => 1,
            LensMode::Divergent => 2,
            LensMode::Inverted => 3,
            LensMode::Periodic => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LensMode::Identity => "None",
            LensMode::Convergent => "Convex",
            LensMode::Divergent => "Concave",
            LensMode::Inverted => "Invert",
            LensMode::Periodic => "Crazy",
        }
    }

    /// Opacity the overlay fades toward.
    pub fn target_opacity(&self) -> f32 {
        if *self == LensMode::Identity { 0.0 } else { 1.0 }
    }
}

impl fmt::Display for LensMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LensMode {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "identity" => Ok(LensMode::Identity),
            "convex" | "convergent" => Ok(LensMode::Convergent),
            "concave" | "divergent" => Ok(LensMode::Divergent),
            "invert" | "inverted" => Ok(LensMode::Inverted),
            "crazy" | "periodic" => Ok(LensMode::Periodic),
            _ => Err(DemoError::UnknownLensMode(s.to_string())),
        }
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mix(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a * (1.0 - t) + b * t
}

/// Offset from the lens centre after warping, before clamping.
pub fn warp(mode: LensMode, power: f32, d: Vec2) -> Vec2 {
    let r = d.length();
    let k = r * r;
    match mode {
        LensMode::Identity => d,
        LensMode::Convergent => d * (1.0 + power * k * 54.5) * (1.0 - 0.25 * k),
        LensMode::Divergent => {
            let u = d / (1.0 + power * k * 3.0);
            mix(u, -u * 0.6, smoothstep(0.18, 0.35, r))
        }
        LensMode::Inverted => mix(-d, -d * 0.7, smoothstep(0.15, 0.45, r)),
        LensMode::Periodic => d + Vec2::splat(0.1 * (10.0 * d.y).sin()),
    }
}

/// Map an overlay coordinate to the off-screen sample coordinate.
///
/// `shaders/lens.wgsl` runs the same remap; keep the two in step.
pub fn remap(mode: LensMode, power: f32, uv: Vec2) -> Vec2 {
    let center = Vec2::splat(0.5);
    let warped = warp(mode, power, uv - center);
    if mode == LensMode::Identity {
        return uv;
    }
    (center + warped).clamp(Vec2::splat(0.001), Vec2::splat(0.999))
}

/// Radial alpha mask, 1 inside and fading out at the rim.
pub fn mask(uv: Vec2) -> f32 {
    smoothstep(0.5, 0.45, (uv - Vec2::splat(0.5)).length())
}

/// Exponential per-frame approach of the overlay opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityFade {
    pub value: f32,
    pub rate: f32,
}

impl OpacityFade {
    pub fn new(rate: f32) -> Self {
        Self { value: 0.0, rate: rate.clamp(0.0, 1.0) }
    }

    pub fn step(&mut self, target: f32) -> f32 {
        self.value += (target - self.value) * self.rate;
        self.value
    }
}

/// Lens demo state carried by the frame loop.
#[derive(Debug, Clone)]
pub struct LensState {
    pub mode: LensMode,
    pub power: f32,
    pub fade: OpacityFade,
}

impl LensState {
    pub fn new(power: f32, fade_rate: f32) -> Self {
        Self { mode: LensMode::Identity, power, fade: OpacityFade::new(fade_rate) }
    }

    pub fn set_mode(&mut self, mode: LensMode) {
        self.mode = mode;
    }

    pub fn advance(&mut self) -> f32 {
        self.fade.step(self.mode.target_opacity())
    }

    /// The overlay is drawn on screen only when it could be seen.
    pub fn overlay_visible(&self) -> bool {
        self.mode != LensMode::Identity || self.fade.value > 1e-3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_parse() {
        assert_eq!("convex".parse::<LensMode>().unwrap(), LensMode::Convergent);
        assert_eq!("Crazy".parse::<LensMode>().unwrap(), LensMode::Periodic);
        assert!(matches!("fisheye".parse::<LensMode>(), Err(DemoError::UnknownLensMode(_))));
    }

    #[test]
    fn identity_keeps_coordinates() {
        for uv in [Vec2::new(0.1, 0.9), Vec2::new(0.5, 0.5), Vec2::new(0.73, 0.2)] {
            assert_eq!(remap(LensMode::Identity, 2.5, uv), uv);
        }
    }

    #[test]
    fn inverted_flips_near_centre() {
        let uv = Vec2::new(0.55, 0.5);
        let out = remap(LensMode::Inverted, 2.5, uv);
        assert!((out.x - 0.45).abs() < 1e-5);
    }

    #[test]
    fn warped_samples_stay_inside_texture() {
        for mode in LensMode::ALL {
            for i in 0..=10 {
                for j in 0..=10 {
                    let uv = Vec2::new(i as f32 / 10.0, j as f32 / 10.0);
                    let out = remap(mode, 2.5, uv);
                    assert!((0.0..=1.0).contains(&out.x) && (0.0..=1.0).contains(&out.y), "{mode:?}");
                }
            }
        }
    }

    #[test]
    fn mask_is_opaque_inside_and_clear_outside() {
        assert_eq!(mask(Vec2::splat(0.5)), 1.0);
        assert_eq!(mask(Vec2::new(1.0, 0.5)), 0.0);
    }

    #[test]
    fn fade_rises_without_overshoot() {
        let mut state = LensState::new(2.5, 0.05);
        state.set_mode(LensMode::Convergent);
        let mut prev = state.fade.value;
        for _ in 0..200 {
            let v = state.advance();
            assert!(v > prev && v <= 1.0);
            prev = v;
        }
        state.set_mode(LensMode::Identity);
        assert!(state.advance() < prev);
    }
}
