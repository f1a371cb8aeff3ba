/// Errors surfaced by the demos.
///
/// Only asset failures are expected at runtime; the rest flag a
/// programming or configuration mistake (an undeclared preset, a mode
/// name the UI should never emit) and are reported instead of ignored.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("failed to fetch {path}: {reason}")]
    AssetFetch { path: String, reason: String },
    #[error("glTF parse error: {0}")]
    GltfParse(#[from] gltf::Error),
    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("unknown view preset: {0:?}")]
    UnknownPreset(String),
    #[error("unknown demo: {0:?}")]
    UnknownDemo(String),
    #[error("unknown lens mode: {0:?}")]
    UnknownLensMode(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("GPU error: {0}")]
    Gpu(String),
}

impl From<toml::de::Error> for DemoError {
    fn from(e: toml::de::Error) -> Self {
        DemoError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;
