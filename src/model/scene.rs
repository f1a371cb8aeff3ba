use glam::{Mat4, Vec3};

use crate::config::{DemoConfig, PlaneProp};
use crate::model::asset::{EnvironmentImage, LoadedAssets};
use crate::model::collision::{Aabb, CollisionVolumeSet};
use crate::model::reflection::{self, ReflectionProbe};
use crate::utils::{create_plane_mesh, Mesh};

/// A named mesh with baked world transform.
#[derive(Debug, Clone)]
pub struct SceneMesh {
    pub name: String,
    pub mesh: Mesh,
    pub bounds: Aabb,
    pub visible: bool,
}

impl SceneMesh {
    pub fn new(name: impl Into<String>, mesh: Mesh) -> Self {
        let bounds = mesh
            .bounds()
            .map(|(lo, hi)| Aabb::new(lo, hi))
            .unwrap_or(Aabb::new(Vec3::ZERO, Vec3::ZERO));
        Self { name: name.into(), mesh, bounds, visible: true }
    }

    pub fn from_prop(prop: &PlaneProp) -> Self {
        let [r, g, b] = prop.color;
        let mesh = create_plane_mesh(prop.size[0], prop.size[1], [r, g, b, 1.0])
            .transformed(&Mat4::from_translation(Vec3::from_array(prop.position)));
        Self::new(prop.name.clone(), mesh)
    }

    /// Case-insensitive substring match on the mesh name.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        let name = self.name.to_lowercase();
        tags.iter().any(|t| name.contains(&t.to_lowercase()))
    }

    pub fn refresh_bounds(&mut self) {
        if let Some((lo, hi)) = self.mesh.bounds() {
            self.bounds = Aabb::new(lo, hi);
        }
    }
}

/// Where the demo is in its start-up sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus {
    /// Whole percent of bytes read, once the total is known.
    Loading(Option<u8>),
    /// Walkthrough loaded, waiting for the click that grabs the pointer.
    AwaitingGesture,
    /// Walkthrough loaded on a touch device, waiting for the first touch.
    TouchHint,
    Ready,
    Failed(String),
}

impl LoadStatus {
    pub fn overlay_visible(&self) -> bool {
        !matches!(self, LoadStatus::Ready)
    }

    pub fn status_text(&self) -> String {
        match self {
            LoadStatus::Loading(None) => "Loading...".to_string(),
            LoadStatus::Loading(Some(percent)) => format!("Loading: {percent}%"),
            LoadStatus::AwaitingGesture => "Click to start!".to_string(),
            LoadStatus::TouchHint => {
                "Buttons at the bottom left move. Drag on the view to look around.".to_string()
            }
            LoadStatus::Ready => String::new(),
            LoadStatus::Failed(msg) => format!("Error: {msg}"),
        }
    }
}

/// Everything the renderer draws plus what the controllers query.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub meshes: Vec<SceneMesh>,
    pub environment: Option<EnvironmentImage>,
    pub collision: CollisionVolumeSet,
    pub probes: Vec<ReflectionProbe>,
    pub status: LoadStatus,
    /// Bumped whenever `meshes` or `environment` change.
    pub revision: u64,
}

impl SceneState {
    /// Scene with the config's props in place, waiting for assets.
    pub fn new(config: &DemoConfig) -> Self {
        let needs_assets = config.assets.model.is_some() || config.assets.environment.is_some();
        Self {
            meshes: config.props.iter().map(SceneMesh::from_prop).collect(),
            environment: None,
            collision: CollisionVolumeSet::default(),
            probes: Vec::new(),
            status: if needs_assets { LoadStatus::Loading(None) } else { LoadStatus::Ready },
            revision: 1,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !matches!(self.status, LoadStatus::Loading(_) | LoadStatus::Failed(_))
    }

    /// Add loaded assets and derive collision volumes and reflection probes.
    ///
    /// The caller decides the next status; this leaves it untouched.
    pub fn install(&mut self, assets: LoadedAssets, config: &DemoConfig) {
        self.meshes.extend(assets.meshes);
        if assets.environment.is_some() {
            self.environment = assets.environment;
        }
        if let Some(walk) = &config.walk {
            self.collision = CollisionVolumeSet::from_meshes(&self.meshes, &walk.collision_tags);
        }
        if let Some(settings) = &config.reflection {
            self.probes = reflection::build_probes(&self.meshes, settings);
        }
        self.revision += 1;
        tracing::info!(
            meshes = self.meshes.len(),
            colliders = self.collision.len(),
            probes = self.probes.len(),
            "scene populated"
        );
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("asset load failed: {message}");
        self.status = LoadStatus::Failed(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DemoKind;
    use crate::utils::create_cylinder_mesh;

    #[test]
    fn status_text_for_failure_is_prefixed() {
        let s = LoadStatus::Failed("404 models/mirror.glb".into());
        assert_eq!(s.status_text(), "Error: 404 models/mirror.glb");
        assert!(s.overlay_visible());
        assert!(!LoadStatus::Ready.overlay_visible());
    }

    #[test]
    fn loading_text_shows_percent_once_known() {
        assert_eq!(LoadStatus::Loading(None).status_text(), "Loading...");
        assert_eq!(LoadStatus::Loading(Some(42)).status_text(), "Loading: 42%");
        assert!(LoadStatus::Loading(Some(100)).overlay_visible());
    }

    #[test]
    fn props_exist_before_load() {
        let cfg = DemoConfig::builtin(DemoKind::Shadow);
        let scene = SceneState::new(&cfg);
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.status, LoadStatus::Loading(None));
    }

    #[test]
    fn install_collects_tagged_colliders_and_probes() {
        let cfg = DemoConfig::builtin(DemoKind::Mirror);
        let mut scene = SceneState::new(&cfg);
        let block = |x: f32| {
            create_cylinder_mesh(1.0, 1.0, 2.0, 4, true, [1.0; 4])
                .transformed(&Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
        };
        scene.install(
            LoadedAssets {
                meshes: vec![
                    SceneMesh::new("Wall_North", block(0.0)),
                    SceneMesh::new("Mirror.001", block(5.0)),
                    SceneMesh::new("floor", block(10.0)),
                ],
                environment: None,
            },
            &cfg,
        );
        assert_eq!(scene.collision.len(), 2);
        assert_eq!(scene.probes.len(), 1);
        assert_eq!(scene.probes[0].mesh_index, 1);
        assert!((scene.probes[0].position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn background_demo_needs_no_assets() {
        let scene = SceneState::new(&DemoConfig::builtin(DemoKind::Background));
        assert_eq!(scene.status, LoadStatus::Ready);
    }
}
