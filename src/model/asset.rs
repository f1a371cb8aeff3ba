use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::config::{DemoConfig, Framing};
use crate::error::{DemoError, Result};
use crate::model::collision::Aabb;
use crate::model::scene::SceneMesh;
use crate::utils::{Mesh, Vertex};

/// Decoded equirectangular image, RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl EnvironmentImage {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self { width: img.width(), height: img.height(), rgba: img.into_raw() })
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedAssets {
    pub meshes: Vec<SceneMesh>,
    pub environment: Option<EnvironmentImage>,
}

/// What to fetch and how to place it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRequest {
    pub model: Option<String>,
    pub environment: Option<String>,
    pub framing: Framing,
    pub rotation_y_deg: f32,
}

impl AssetRequest {
    pub fn from_config(config: &DemoConfig) -> Option<Self> {
        if config.assets.model.is_none() && config.assets.environment.is_none() {
            return None;
        }
        Some(Self {
            model: config.assets.model.clone(),
            environment: config.assets.environment.clone(),
            framing: config.framing,
            rotation_y_deg: config.assets.rotation_y_deg,
        })
    }

    /// Decode fetched bytes into scene-ready assets.
    pub fn decode(&self, model: Option<&[u8]>, environment: Option<&[u8]>) -> Result<LoadedAssets> {
        let meshes = match model {
            Some(bytes) => {
                let mut meshes = parse_glb(bytes)?;
                if self.rotation_y_deg != 0.0 {
                    let rot = Mat4::from_rotation_y(self.rotation_y_deg.to_radians());
                    apply_transform(&mut meshes, &rot);
                }
                apply_framing(&mut meshes, self.framing);
                meshes
            }
            None => Vec::new(),
        };
        let environment = environment.map(EnvironmentImage::decode).transpose()?;
        Ok(LoadedAssets { meshes, environment })
    }
}

/// Flatten a binary glTF into world-space meshes, one per primitive.
pub fn parse_glb(bytes: &[u8]) -> Result<Vec<SceneMesh>> {
    let (document, buffers, _images) = gltf::import_slice(bytes)?;
    let mut meshes = Vec::new();

    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            visit_node(&node, &buffers, &Mat4::IDENTITY, &mut meshes);
        }
    }
    tracing::debug!(count = meshes.len(), "glTF meshes extracted");
    Ok(meshes)
}

fn visit_node(
    node: &gltf::Node,
    buffers: &[gltf::buffer::Data],
    parent: &Mat4,
    out: &mut Vec<SceneMesh>,
) {
    let world = *parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let name = node
            .name()
            .or_else(|| mesh.name())
            .unwrap_or("mesh")
            .to_string();
        for primitive in mesh.primitives() {
            if let Some(m) = read_primitive(&primitive, buffers) {
                out.push(SceneMesh::new(name.clone(), m.transformed(&world)));
            }
        }
    }

    for child in node.children() {
        visit_node(&child, buffers, &world, out);
    }
}

fn read_primitive(primitive: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Option<Mesh> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        return None;
    }
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }

    let base = primitive.material().pbr_metallic_roughness().base_color_factor();
    let colors: Option<Vec<[f32; 4]>> = reader.read_colors(0).map(|c| c.into_rgba_f32().collect());
    let indices: Vec<u32> = match reader.read_indices() {
        Some(i) => i.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(n) => n.collect(),
        None => flat_normals(&positions, &indices),
    };

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, pos)| {
            let tint = colors.as_ref().and_then(|c| c.get(i)).copied().unwrap_or([1.0; 4]);
            Vertex {
                pos: *pos,
                normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                color: [base[0] * tint[0], base[1] * tint[1], base[2] * tint[2], base[3] * tint[3]],
            }
        })
        .collect();

    Some(Mesh { vertices, indices })
}

/// Area-weighted vertex normals for primitives that ship without them.
fn flat_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let (pa, pb, pc) = (
            Vec3::from_array(positions[a]),
            Vec3::from_array(positions[b]),
            Vec3::from_array(positions[c]),
        );
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter().map(|n| n.normalize_or_zero().to_array()).collect()
}

fn apply_transform(meshes: &mut [SceneMesh], m: &Mat4) {
    for mesh in meshes.iter_mut() {
        mesh.mesh.transform(m);
        mesh.refresh_bounds();
    }
}

fn union_bounds(meshes: &[SceneMesh]) -> Option<Aabb> {
    meshes.iter().map(|m| m.bounds).reduce(|a, b| a.union(&b))
}

/// Transform that places a model with the given bounds.
pub fn framing_transform(framing: Framing, bounds: Aabb) -> Mat4 {
    let center = bounds.center();
    let size = bounds.size();
    match framing {
        Framing::None => Mat4::IDENTITY,
        Framing::Center => Mat4::from_translation(-center),
        Framing::FitDiagonal { size: target, ground } => {
            let diag = size.length();
            let s = if diag > 0.0 { target / diag } else { 1.0 };
            let mut offset = -center * s;
            if ground {
                // vertical placement is left as authored
                offset.y = 0.0;
            }
            Mat4::from_translation(offset) * Mat4::from_scale(Vec3::splat(s))
        }
        Framing::FitMaxDim { size: target } => {
            let max_dim = size.max_element();
            let s = if max_dim > 0.0 { target / max_dim } else { 1.0 };
            Mat4::from_translation(-center * s) * Mat4::from_scale(Vec3::splat(s))
        }
    }
}

pub fn apply_framing(meshes: &mut [SceneMesh], framing: Framing) {
    if framing == Framing::None {
        return;
    }
    if let Some(bounds) = union_bounds(meshes) {
        let m = framing_transform(framing, bounds);
        apply_transform(meshes, &m);
    }
}

/// Join an asset path onto the configured root.
pub fn resolve(root: &str, path: &str) -> String {
    if root.is_empty() {
        return path.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Bytes read against the bytes expected, shared with the loader task.
#[derive(Debug, Clone, Default)]
pub struct LoadProgress {
    counters: Arc<ProgressCounters>,
}

#[derive(Debug, Default)]
struct ProgressCounters {
    loaded: AtomicU64,
    total: AtomicU64,
}

impl LoadProgress {
    pub fn expect(&self, bytes: u64) {
        self.counters.total.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn advance(&self, bytes: u64) {
        self.counters.loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// `None` until some total is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.counters.total.load(Ordering::Relaxed);
        if total == 0 {
            return None;
        }
        let loaded = self.counters.loaded.load(Ordering::Relaxed).min(total);
        Some((loaded * 100 / total) as u8)
    }
}

fn fetch_error(path: &str, reason: impl ToString) -> DemoError {
    DemoError::AssetFetch { path: path.to_string(), reason: reason.to_string() }
}

#[cfg(target_arch = "wasm32")]
mod platform {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::{JsCast, JsValue};
    use wasm_bindgen_futures::JsFuture;

    use super::*;

    fn js_error(url: &str) -> impl Fn(JsValue) -> DemoError + '_ {
        move |e| fetch_error(url, format!("{e:?}"))
    }

    /// Resolve the response headers; the body is read separately.
    async fn open(url: &str) -> Result<web_sys::Response> {
        let window = web_sys::window().ok_or_else(|| fetch_error(url, "no window"))?;
        let resp = JsFuture::from(window.fetch_with_str(url)).await.map_err(js_error(url))?;
        let resp: web_sys::Response = resp
            .dyn_into()
            .map_err(|_| fetch_error(url, "fetch did not return a Response"))?;
        if !resp.ok() {
            return Err(fetch_error(url, format!("HTTP {}", resp.status())));
        }
        Ok(resp)
    }

    fn content_length(resp: &web_sys::Response) -> Option<u64> {
        resp.headers().get("content-length").ok().flatten()?.parse().ok()
    }

    async fn read_body(url: &str, resp: web_sys::Response, progress: &LoadProgress) -> Result<Vec<u8>> {
        let Some(body) = resp.body() else {
            let buf = JsFuture::from(resp.array_buffer().map_err(js_error(url))?)
                .await
                .map_err(js_error(url))?;
            let bytes = js_sys::Uint8Array::new(&buf).to_vec();
            progress.advance(bytes.len() as u64);
            return Ok(bytes);
        };
        let reader: web_sys::ReadableStreamDefaultReader = body.get_reader().unchecked_into();
        let mut bytes = Vec::new();
        loop {
            let chunk = JsFuture::from(reader.read()).await.map_err(js_error(url))?;
            let done = js_sys::Reflect::get(&chunk, &JsValue::from_str("done"))
                .map_err(js_error(url))?
                .as_bool()
                .unwrap_or(true);
            if done {
                break;
            }
            let value = js_sys::Reflect::get(&chunk, &JsValue::from_str("value")).map_err(js_error(url))?;
            let part = js_sys::Uint8Array::new(&value).to_vec();
            progress.advance(part.len() as u64);
            bytes.extend_from_slice(&part);
        }
        Ok(bytes)
    }

    async fn load(request: AssetRequest, root: String, progress: LoadProgress) -> Result<LoadedAssets> {
        let model_url = request.model.as_deref().map(|p| resolve(&root, p));
        let environment_url = request.environment.as_deref().map(|p| resolve(&root, p));

        // both totals are known before either body is read
        let mut model = None;
        if let Some(url) = &model_url {
            let resp = open(url).await?;
            progress.expect(content_length(&resp).unwrap_or(0));
            model = Some(resp);
        }
        let mut environment = None;
        if let Some(url) = &environment_url {
            let resp = open(url).await?;
            progress.expect(content_length(&resp).unwrap_or(0));
            environment = Some(resp);
        }

        let model = match (model_url.as_deref(), model) {
            (Some(url), Some(resp)) => Some(read_body(url, resp, &progress).await?),
            _ => None,
        };
        let environment = match (environment_url.as_deref(), environment) {
            (Some(url), Some(resp)) => Some(read_body(url, resp, &progress).await?),
            _ => None,
        };
        request.decode(model.as_deref(), environment.as_deref())
    }

    /// Slot filled by a `spawn_local` task.
    pub struct AssetInbox {
        slot: Rc<RefCell<Option<Result<LoadedAssets>>>>,
        progress: LoadProgress,
    }

    impl AssetInbox {
        pub fn spawn(request: AssetRequest, root: String) -> Self {
            let slot = Rc::new(RefCell::new(None));
            let progress = LoadProgress::default();
            let (task_slot, task_progress) = (slot.clone(), progress.clone());
            wasm_bindgen_futures::spawn_local(async move {
                let result = load(request, root, task_progress).await;
                *task_slot.borrow_mut() = Some(result);
            });
            Self { slot, progress }
        }

        pub fn try_take(&mut self) -> Option<Result<LoadedAssets>> {
            self.slot.borrow_mut().take()
        }

        pub fn progress(&self) -> Option<u8> {
            self.progress.percent()
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod platform {
    use std::io::{ErrorKind, Read};
    use std::sync::mpsc;

    use super::*;

    const CHUNK: usize = 64 * 1024;

    fn read_bytes(path: &str, progress: &LoadProgress) -> Result<Vec<u8>> {
        let mut file = std::fs::File::open(path).map_err(|e| fetch_error(path, e))?;
        let mut bytes = Vec::new();
        let mut chunk = vec![0u8; CHUNK];
        loop {
            let n = match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(fetch_error(path, e)),
            };
            bytes.extend_from_slice(&chunk[..n]);
            progress.advance(n as u64);
        }
        Ok(bytes)
    }

    fn load(request: &AssetRequest, root: &str, progress: &LoadProgress) -> Result<LoadedAssets> {
        let model_path = request.model.as_deref().map(|p| resolve(root, p));
        let environment_path = request.environment.as_deref().map(|p| resolve(root, p));
        for path in model_path.iter().chain(environment_path.iter()) {
            // a missing file fails below with the proper error
            if let Ok(meta) = std::fs::metadata(path) {
                progress.expect(meta.len());
            }
        }

        let model = model_path.as_deref().map(|p| read_bytes(p, progress)).transpose()?;
        let environment = environment_path.as_deref().map(|p| read_bytes(p, progress)).transpose()?;
        request.decode(model.as_deref(), environment.as_deref())
    }

    /// Receiving end of a loader thread.
    pub struct AssetInbox {
        rx: mpsc::Receiver<Result<LoadedAssets>>,
        progress: LoadProgress,
    }

    impl AssetInbox {
        pub fn spawn(request: AssetRequest, root: String) -> Self {
            let (tx, rx) = mpsc::channel();
            let progress = LoadProgress::default();
            let task_progress = progress.clone();
            std::thread::spawn(move || {
                let result = load(&request, &root, &task_progress);
                // receiver gone means the demo was closed
                let _ = tx.send(result);
            });
            Self { rx, progress }
        }

        pub fn progress(&self) -> Option<u8> {
            self.progress.percent()
        }

        pub fn try_take(&mut self) -> Option<Result<LoadedAssets>> {
            match self.rx.try_recv() {
                Ok(result) => Some(result),
                Err(mpsc::TryRecvError::Empty) => None,
                Err(mpsc::TryRecvError::Disconnected) => {
                    Some(Err(DemoError::AssetFetch {
                        path: String::new(),
                        reason: "loader thread exited".to_string(),
                    }))
                }
            }
        }
    }
}

pub use platform::AssetInbox;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_framing_moves_bounds_to_origin() {
        let b = Aabb::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(4.0, 6.0, 4.0));
        let m = framing_transform(Framing::Center, b);
        assert!(m.transform_point3(b.center()).length() < 1e-6);
    }

    #[test]
    fn fit_max_dim_scales_largest_extent() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 6.0, 1.0));
        let m = framing_transform(Framing::FitMaxDim { size: 1.2 }, b);
        let lo = m.transform_point3(b.min);
        let hi = m.transform_point3(b.max);
        assert!(((hi - lo).y - 1.2).abs() < 1e-5);
        assert!(((hi + lo) * 0.5).length() < 1e-5);
    }

    #[test]
    fn fit_diagonal_keeps_vertical_offset_when_grounded() {
        let b = Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 2.0, 1.0));
        let m = framing_transform(Framing::FitDiagonal { size: 4.5, ground: true }, b);
        let lo = m.transform_point3(b.min);
        assert_eq!(lo.y, 0.0);
    }

    #[test]
    fn resolve_joins_paths() {
        assert_eq!(resolve("", "models/a.glb"), "models/a.glb");
        assert_eq!(resolve("assets/", "/models/a.glb"), "assets/models/a.glb");
    }

    #[test]
    fn garbage_model_bytes_are_a_parse_error() {
        let req = AssetRequest {
            model: Some("models/x.glb".into()),
            environment: None,
            framing: Framing::None,
            rotation_y_deg: 0.0,
        };
        assert!(matches!(req.decode(Some(b"not a model"), None), Err(DemoError::GltfParse(_))));
    }

    #[test]
    fn garbage_image_bytes_are_a_decode_error() {
        assert!(matches!(EnvironmentImage::decode(b"nope"), Err(DemoError::ImageDecode(_))));
    }

    #[test]
    fn progress_is_unknown_until_a_total_is_expected() {
        let progress = LoadProgress::default();
        assert_eq!(progress.percent(), None);
        progress.expect(400);
        progress.advance(100);
        assert_eq!(progress.percent(), Some(25));
        progress.advance(1000);
        assert_eq!(progress.percent(), Some(100));
    }

    #[test]
    fn local_read_reports_full_progress() {
        let dir = std::env::temp_dir().join(format!("opticlab-progress-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("big.glb"), vec![7u8; 200 * 1024]).unwrap();

        let req = AssetRequest {
            model: Some("big.glb".into()),
            environment: None,
            framing: Framing::None,
            rotation_y_deg: 0.0,
        };
        let mut inbox = AssetInbox::spawn(req, dir.to_string_lossy().into_owned());
        let result = loop {
            if let Some(r) = inbox.try_take() {
                break r;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        // the bytes are not a model, but every one of them was read
        assert!(matches!(result, Err(DemoError::GltfParse(_))));
        assert_eq!(inbox.progress(), Some(100));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let req = AssetRequest {
            model: Some("definitely/missing.glb".into()),
            environment: None,
            framing: Framing::None,
            rotation_y_deg: 0.0,
        };
        let mut inbox = AssetInbox::spawn(req, String::new());
        let result = loop {
            if let Some(r) = inbox.try_take() {
                break r;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(matches!(result, Err(DemoError::AssetFetch { .. })));
    }
}
