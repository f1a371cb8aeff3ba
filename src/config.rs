use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DemoError, Result};

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert a `0xRRGGBB` sRGB colour to linear float RGB.
///
/// Colours written directly in TOML are taken as already linear.
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        srgb_to_linear(((hex >> 16) & 0xff) as f32 / 255.0),
        srgb_to_linear(((hex >> 8) & 0xff) as f32 / 255.0),
        srgb_to_linear((hex & 0xff) as f32 / 255.0),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemoKind {
    AmesRoom,
    Lens,
    Mirror,
    Prism,
    Shadow,
    Spiral,
    Background,
}

impl DemoKind {
    pub const ALL: [DemoKind; 7] = [
        DemoKind::AmesRoom,
        DemoKind::Lens,
        DemoKind::Mirror,
        DemoKind::Prism,
        DemoKind::Shadow,
        DemoKind::Spiral,
        DemoKind::Background,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoKind::AmesRoom => "ames_room",
            DemoKind::Lens => "lens",
            DemoKind::Mirror => "mirror",
            DemoKind::Prism => "prism",
            DemoKind::Shadow => "shadow",
            DemoKind::Spiral => "spiral",
            DemoKind::Background => "background",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DemoKind::AmesRoom => "Ames room",
            DemoKind::Lens => "Lenses",
            DemoKind::Mirror => "Mirror room",
            DemoKind::Prism => "Prism dispersion",
            DemoKind::Shadow => "Shadow study",
            DemoKind::Spiral => "Spiral",
            DemoKind::Background => "Background",
        }
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DemoKind {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase().replace('-', "_");
        match lower.as_str() {
            "ames" | "ames_room" => Ok(DemoKind::AmesRoom),
            "lens" | "lenses" => Ok(DemoKind::Lens),
            "mirror" | "mirrors" | "mirror_room" => Ok(DemoKind::Mirror),
            "prism" => Ok(DemoKind::Prism),
            "shadow" | "shadows" => Ok(DemoKind::Shadow),
            "spiral" => Ok(DemoKind::Spiral),
            "background" | "script" => Ok(DemoKind::Background),
            _ => Err(DemoError::UnknownDemo(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_deg: 45.0,
            near: 0.1,
            far: 100.0,
            position: [0.0, 1.5, 4.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSettings {
    pub background: [f32; 3],
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub sun_color: [f32; 3],
    pub sun_intensity: f32,
    pub sun_position: [f32; 3],
    pub sun_target: [f32; 3],
    /// Linear fog `[near, far]` in the background colour.
    pub fog: Option<[f32; 2]>,
    /// How much of the environment image tints lit surfaces.
    pub environment_reflectance: f32,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            background: rgb(0x0f1114),
            ambient_color: [1.0, 1.0, 1.0],
            ambient_intensity: 0.4,
            sun_color: [1.0, 1.0, 1.0],
            sun_intensity: 0.8,
            sun_position: [5.0, 10.0, 5.0],
            sun_target: [0.0, 0.0, 0.0],
            fog: None,
            environment_reflectance: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    pub damping: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            damping: 0.05,
            min_distance: 0.5,
            max_distance: 50.0,
            rotate_speed: 0.005,
            zoom_speed: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSettings {
    /// Acceleration applied while a direction flag is held.
    pub speed: f32,
    pub damping: f32,
    pub eye_height: f32,
    pub start: [f32; 3],
    /// Heading for the pointer-lock variant; 0 faces +X.
    pub start_yaw_deg: f32,
    /// Heading for the touch variant.
    pub touch_start_yaw_deg: f32,
    /// Full extents of the avatar box.
    pub collider_size: [f32; 3],
    /// Mesh name fragments (lower case) that block movement.
    pub collision_tags: Vec<String>,
    pub look_sensitivity: f32,
    pub touch_sensitivity: f32,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            speed: 9.0,
            damping: 6.0,
            eye_height: 7.0,
            start: [-16.0, 3.0, 0.0],
            start_yaw_deg: 0.0,
            touch_start_yaw_deg: -90.0,
            collider_size: [1.0, 4.5, 1.0],
            collision_tags: vec!["wall".to_string(), "mirror".to_string()],
            look_sensitivity: 0.002,
            touch_sensitivity: 0.003,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionSettings {
    /// Captures run on frames where `frame % interval == 0`.
    pub interval: u64,
    pub resolution: u32,
    pub reflective_tags: Vec<String>,
    pub near: f32,
    pub far: f32,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            interval: 10,
            resolution: 256,
            reflective_tags: vec!["mirror".to_string()],
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensSettings {
    pub power: f32,
    pub fade_rate: f32,
    pub radius: f32,
    pub distance: f32,
}

impl Default for LensSettings {
    fn default() -> Self {
        Self {
            power: 2.5,
            fade_rate: 0.05,
            radius: 0.6,
            distance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrismSettings {
    pub ior: f32,
    pub spread: f32,
    pub gain: f32,
    pub min_angle_factor: f32,
    pub beam_length: f32,
    pub target_distance: f32,
    pub vertical_gain: f32,
    pub base_intensity: f32,
    pub initial_angle_deg: f32,
    pub position: [f32; 3],
    pub colors: Vec<[f32; 3]>,
}

impl Default for PrismSettings {
    fn default() -> Self {
        Self {
            ior: 1.52,
            spread: 0.12,
            gain: 1.8,
            min_angle_factor: 0.15,
            beam_length: 16.0,
            target_distance: 10.0,
            vertical_gain: 4.0,
            base_intensity: 4.0,
            initial_angle_deg: 0.0,
            position: [0.0, 0.0, 0.0],
            colors: [0xff6f61, 0xffb347, 0xffeb8a, 0x88d18a, 0x6acff6, 0x5b5bff, 0xbf85ff]
                .into_iter()
                .map(rgb)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub position: [f32; 3],
    pub target: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    pub model: Option<String>,
    pub environment: Option<String>,
    /// Extra rotation about +Y applied to the model before framing.
    pub rotation_y_deg: f32,
    /// Draw the environment image as a surrounding sky.
    pub sky: bool,
}

/// How a loaded model is placed once its bounds are known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Framing {
    #[default]
    None,
    Center,
    /// Scale so the bounds diagonal equals `size`, centre, optionally rest on y = 0.
    FitDiagonal { size: f32, ground: bool },
    /// Scale so the largest extent equals `size`, then centre.
    FitMaxDim { size: f32 },
}

/// A flat coloured plane added to the scene alongside the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneProp {
    pub name: String,
    pub size: [f32; 2],
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Built-in per demo; a TOML file may replace it, and every section
/// uses `#[serde(default)]` so the file only names what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    pub kind: DemoKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub initial_preset: Option<String>,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub lighting: LightingSettings,
    #[serde(default)]
    pub assets: AssetSettings,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default)]
    pub props: Vec<PlaneProp>,
    #[serde(default)]
    pub orbit: Option<OrbitSettings>,
    #[serde(default)]
    pub walk: Option<WalkSettings>,
    #[serde(default)]
    pub reflection: Option<ReflectionSettings>,
    #[serde(default)]
    pub lens: Option<LensSettings>,
    #[serde(default)]
    pub prism: Option<PrismSettings>,
    #[serde(default)]
    pub presets: BTreeMap<String, PresetEntry>,
}

impl DemoConfig {
    fn base(kind: DemoKind) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            initial_preset: None,
            camera: CameraSettings::default(),
            lighting: LightingSettings::default(),
            assets: AssetSettings::default(),
            framing: Framing::None,
            props: Vec::new(),
            orbit: None,
            walk: None,
            reflection: None,
            lens: None,
            prism: None,
            presets: BTreeMap::new(),
        }
    }

    /// The configuration each published demo page shipped with.
    pub fn builtin(kind: DemoKind) -> Self {
        let mut cfg = Self::base(kind);
        match kind {
            DemoKind::AmesRoom => {
                cfg.camera = CameraSettings {
                    fov_deg: 60.0,
                    near: 0.1,
                    far: 1000.0,
                    position: [0.0, 0.0, 8.0],
                    target: [0.0, 0.0, 0.0],
                };
                cfg.lighting = LightingSettings {
                    background: rgb(0x252d32),
                    ambient_intensity: 0.6,
                    sun_position: [5.0, 10.0, 5.0],
                    sun_intensity: 0.8,
                    ..LightingSettings::default()
                };
                cfg.assets.model = Some("models/model.glb".to_string());
                cfg.framing = Framing::Center;
                cfg.orbit = Some(OrbitSettings {
                    min_distance: 2.0,
                    max_distance: 50.0,
                    ..OrbitSettings::default()
                });
                for (name, position) in [
                    ("front", [0.0, 0.0, 8.0]),
                    ("side", [8.0, 0.0, 0.0]),
                    ("top", [0.0, 8.0, 0.0]),
                    ("diagonal", [6.0, 4.0, 6.0]),
                ] {
                    cfg.presets.insert(
                        name.to_string(),
                        PresetEntry { position, target: [0.0, 0.0, 0.0] },
                    );
                }
                cfg.initial_preset = Some("front".to_string());
            }
            DemoKind::Lens => {
                cfg.camera.position = [0.0, 1.5, 4.0];
                cfg.lighting = LightingSettings {
                    background: rgb(0x0f1114),
                    ambient_intensity: 0.4,
                    sun_color: rgb(0xc99d6e),
                    sun_intensity: 1.4,
                    sun_position: [2.0, 5.0, 3.0],
                    ..LightingSettings::default()
                };
                cfg.assets.model = Some("models/clock.glb".to_string());
                cfg.assets.rotation_y_deg = 90.0;
                cfg.orbit = Some(OrbitSettings::default());
                cfg.lens = Some(LensSettings::default());
            }
            DemoKind::Mirror => {
                cfg.camera = CameraSettings {
                    fov_deg: 75.0,
                    near: 0.1,
                    far: 1000.0,
                    position: [-16.0, 7.0, 0.0],
                    target: [0.0, 7.0, 0.0],
                };
                cfg.lighting = LightingSettings {
                    background: rgb(0x2a2a3e),
                    ambient_intensity: 0.9,
                    sun_intensity: 1.3,
                    sun_position: [10.0, 20.0, 10.0],
                    fog: Some([35.0, 100.0]),
                    environment_reflectance: 0.25,
                    ..LightingSettings::default()
                };
                cfg.assets.model = Some("models/mirror.glb".to_string());
                cfg.assets.environment = Some("textures/studio_small_09_1k.jpg".to_string());
                cfg.walk = Some(WalkSettings::default());
                cfg.reflection = Some(ReflectionSettings::default());
            }
            DemoKind::Prism => {
                cfg.camera.position = [2.0, 1.5, 3.0];
                cfg.lighting = LightingSettings {
                    background: rgb(0xf6f1eb),
                    ambient_color: rgb(0xfff5eb),
                    ambient_intensity: 1.0,
                    sun_color: rgb(0xffeec4),
                    sun_intensity: 2.3,
                    sun_position: [-5.0, 1.0, 0.0],
                    ..LightingSettings::default()
                };
                cfg.assets.environment = Some("textures/bp2.png".to_string());
                cfg.assets.sky = true;
                cfg.props.push(PlaneProp {
                    name: "floor".to_string(),
                    size: [20.0, 20.0],
                    position: [0.0, -1.5, 0.0],
                    color: rgb(0x5a4530),
                });
                cfg.orbit = Some(OrbitSettings::default());
                cfg.prism = Some(PrismSettings::default());
            }
            DemoKind::Shadow => {
                cfg.camera.position = [0.0, 4.0, 8.0];
                cfg.lighting = LightingSettings {
                    background: rgb(0x0a0a0a),
                    ambient_color: rgb(0x1a1f2a),
                    ambient_intensity: 0.18,
                    sun_color: rgb(0xe5ecff),
                    sun_intensity: 2.7,
                    sun_position: [9.5, 2.0, 3.0],
                    ..LightingSettings::default()
                };
                cfg.assets.model = Some("models/shadow.glb".to_string());
                cfg.framing = Framing::FitDiagonal { size: 4.5, ground: true };
                cfg.props.push(PlaneProp {
                    name: "ground".to_string(),
                    size: [40.0, 40.0],
                    position: [0.0, -0.002, 0.0],
                    color: rgb(0xf0f0f0),
                });
                cfg.orbit = Some(OrbitSettings {
                    min_distance: 5.0,
                    max_distance: 15.0,
                    ..OrbitSettings::default()
                });
            }
            DemoKind::Spiral => {
                cfg.camera.position = [-1.84, 0.09, 0.03];
                cfg.lighting = LightingSettings {
                    background: rgb(0x000000),
                    ambient_intensity: 1.0,
                    sun_intensity: 0.6,
                    sun_position: [3.0, 4.0, 2.0],
                    ..LightingSettings::default()
                };
                cfg.assets.model = Some("models/spiral.glb".to_string());
                cfg.framing = Framing::FitMaxDim { size: 1.2 };
                cfg.orbit = Some(OrbitSettings::default());
            }
            DemoKind::Background => {
                cfg.camera = CameraSettings {
                    fov_deg: 50.0,
                    position: [0.0, 0.0, 5.0],
                    ..CameraSettings::default()
                };
                cfg.lighting.background = [0.0, 0.0, 0.0];
            }
        }
        cfg
    }

    pub fn from_toml_str(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DemoError::Config(e.to_string()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DemoError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_names_parse_back() {
        for kind in DemoKind::ALL {
            assert_eq!(kind.name().parse::<DemoKind>().unwrap(), kind);
        }
        assert!(matches!("kaleidoscope".parse::<DemoKind>(), Err(DemoError::UnknownDemo(_))));
    }

    #[test]
    fn builtin_configs_survive_toml() {
        for kind in DemoKind::ALL {
            let cfg = DemoConfig::builtin(kind);
            let text = cfg.to_toml_string().unwrap();
            assert_eq!(DemoConfig::from_toml_str(&text).unwrap(), cfg, "{kind}");
        }
    }

    #[test]
    fn partial_toml_uses_section_defaults() {
        let cfg = DemoConfig::from_toml_str(
            r#"
            kind = "mirror"
            [walk]
            speed = 12.0
            [reflection]
            interval = 4
            "#,
        )
        .unwrap();
        let walk = cfg.walk.unwrap();
        assert_eq!(walk.speed, 12.0);
        assert_eq!(walk.damping, WalkSettings::default().damping);
        assert_eq!(cfg.reflection.unwrap().interval, 4);
        assert!(cfg.lens.is_none());
    }

    #[test]
    fn ames_room_declares_four_presets() {
        let cfg = DemoConfig::builtin(DemoKind::AmesRoom);
        let names: Vec<_> = cfg.presets.keys().map(String::as_str).collect();
        assert_eq!(names, ["diagonal", "front", "side", "top"]);
    }

    #[test]
    fn hex_colours_split_channels() {
        assert_eq!(rgb(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(rgb(0x0000ff), [0.0, 0.0, 1.0]);
        let mid = rgb(0x808080)[0];
        assert!((mid - 0.2159).abs() < 1e-3, "{mid}");
    }
}
