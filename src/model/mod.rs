// MODEL: demo state and pure scene logic
pub mod asset;
pub mod background;
pub mod camera;
pub mod collision;
pub mod lens;
pub mod reflection;
pub mod scene;
pub mod spectrum;
pub mod view_preset;

pub use asset::{AssetInbox, AssetRequest, EnvironmentImage, LoadedAssets};
pub use background::{BackgroundState, PointerFollower};
pub use camera::{Camera, Orientation, PITCH_LIMIT};
pub use collision::{Aabb, CollisionVolumeSet};
pub use lens::{LensMode, LensState, OpacityFade};
pub use reflection::{ReflectionProbe, ReflectionSchedule};
pub use scene::{LoadStatus, SceneMesh, SceneState};
pub use spectrum::{BeamPose, SpectrumState};
pub use view_preset::{CameraTransition, ViewPreset, ViewPresets};
