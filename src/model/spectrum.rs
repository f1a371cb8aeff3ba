use glam::{Quat, Vec3};

use crate::config::PrismSettings;

/// One coloured band leaving the prism.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralBand {
    pub color: [f32; 3],
    /// Signed spread relative to the centre band.
    pub dispersion: f32,
}

/// Spot light placement for a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Transform for the stretched beam mesh of a band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamPose {
    pub center: Vec3,
    pub rotation: Quat,
    /// Scale on the beam's long axis, `length / beam_length`.
    pub length_scale: f32,
}

#[derive(Debug, Clone)]
pub struct SpectrumState {
    settings: PrismSettings,
    bands: Vec<SpectralBand>,
    /// Prism rotation about +Y in degrees.
    pub angle_deg: f32,
    pub show_spectrum: bool,
}

impl SpectrumState {
    pub fn new(settings: PrismSettings) -> Self {
        let n = settings.colors.len() as f32;
        let bands = settings
            .colors
            .iter()
            .enumerate()
            .map(|(i, color)| SpectralBand {
                color: *color,
                dispersion: (i as f32 - n / 2.0) * settings.spread,
            })
            .collect();
        Self {
            angle_deg: settings.initial_angle_deg,
            settings,
            bands,
            show_spectrum: true,
        }
    }

    pub fn bands(&self) -> &[SpectralBand] {
        &self.bands
    }

    pub fn settings(&self) -> &PrismSettings {
        &self.settings
    }

    pub fn prism_position(&self) -> Vec3 {
        Vec3::from_array(self.settings.position)
    }

    pub fn set_angle(&mut self, deg: f32) {
        self.angle_deg = deg.clamp(-90.0, 90.0);
    }

    /// Grazing angles still spread a little.
    pub fn angle_factor(&self) -> f32 {
        self.angle_deg.to_radians().sin().abs().max(self.settings.min_angle_factor)
    }

    fn band_target(&self, band: &SpectralBand) -> Vec3 {
        let theta = self.angle_deg.to_radians();
        let factor = self.angle_factor();
        let refraction = self.settings.ior - 1.0;
        let azimuth = -theta + band.dispersion * refraction * factor * self.settings.gain;
        let d = self.settings.target_distance;
        self.prism_position()
            + Vec3::new(
                azimuth.cos() * d,
                band.dispersion * self.settings.vertical_gain * factor,
                azimuth.sin() * d,
            )
    }

    pub fn lights(&self) -> Vec<BandLight> {
        let origin = self.prism_position();
        let intensity = if self.show_spectrum {
            self.settings.base_intensity * self.angle_factor()
        } else {
            0.0
        };
        self.bands
            .iter()
            .map(|band| BandLight {
                position: origin,
                target: self.band_target(band),
                color: band.color,
                intensity,
            })
            .collect()
    }

    pub fn beams(&self) -> Vec<BeamPose> {
        let origin = self.prism_position();
        self.bands
            .iter()
            .map(|band| beam_between(origin, self.band_target(band), self.settings.beam_length))
            .collect()
    }
}

/// Place a +Y aligned beam of nominal length `beam_length` from `from` toward `to`.
pub fn beam_between(from: Vec3, to: Vec3, beam_length: f32) -> BeamPose {
    let delta = to - from;
    let len = delta.length().min(beam_length);
    let dir = delta.try_normalize().unwrap_or(Vec3::Y);
    BeamPose {
        center: from + dir * (len * 0.5),
        rotation: Quat::from_rotation_arc(Vec3::Y, dir),
        length_scale: if beam_length > 0.0 { len / beam_length } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SpectrumState {
        SpectrumState::new(PrismSettings::default())
    }

    #[test]
    fn seven_bands_symmetric_about_centre() {
        let s = state();
        assert_eq!(s.bands().len(), 7);
        assert!((s.bands()[0].dispersion + 0.42).abs() < 1e-6);
        assert!((s.bands()[6].dispersion - 0.30).abs() < 1e-6);
    }

    #[test]
    fn angle_factor_has_floor() {
        let mut s = state();
        s.set_angle(0.0);
        assert_eq!(s.angle_factor(), 0.15);
        s.set_angle(90.0);
        assert!((s.angle_factor() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hidden_spectrum_has_dark_lights() {
        let mut s = state();
        s.show_spectrum = false;
        assert!(s.lights().iter().all(|l| l.intensity == 0.0));
        s.show_spectrum = true;
        s.set_angle(30.0);
        assert!(s.lights().iter().all(|l| (l.intensity - 2.0).abs() < 1e-5));
    }

    #[test]
    fn targets_sit_at_fixed_horizontal_distance() {
        let mut s = state();
        s.set_angle(45.0);
        for light in s.lights() {
            let d = light.target - light.position;
            assert!((Vec3::new(d.x, 0.0, d.z).length() - 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn beam_is_clamped_and_aligned() {
        let pose = beam_between(Vec3::ZERO, Vec3::new(40.0, 0.0, 0.0), 16.0);
        assert_eq!(pose.length_scale, 1.0);
        assert!((pose.center - Vec3::new(8.0, 0.0, 0.0)).length() < 1e-5);
        assert!((pose.rotation * Vec3::Y - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn slider_range_is_clamped() {
        let mut s = state();
        s.set_angle(120.0);
        assert_eq!(s.angle_deg, 90.0);
    }
}
