use crate::model::asset::EnvironmentImage;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct DepthTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl DepthTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { _texture: texture, view }
    }
}

/// Screen-sized colour target the lens overlay samples.
pub struct OffscreenTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl OffscreenTarget {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lens_offscreen"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { _texture: texture, view, width, height }
    }
}

/// Six-face colour target with its own depth buffer.
pub struct CubeTarget {
    _texture: wgpu::Texture,
    pub face_views: Vec<wgpu::TextureView>,
    pub cube_view: wgpu::TextureView,
    pub depth: DepthTarget,
}

/// Cube faces are bounded by the 2D texture limit.
fn cube_face_size(requested: u32, limits: &wgpu::Limits) -> u32 {
    requested.clamp(1, limits.max_texture_dimension_2d)
}

impl CubeTarget {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, size: u32) -> Self {
        let size = cube_face_size(size, &device.limits());
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("reflection_cube"),
            size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 6 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let face_views = (0..6)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("reflection_face"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        let cube_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("reflection_cube_view"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self { _texture: texture, face_views, cube_view, depth: DepthTarget::new(device, size, size) }
    }
}

/// Upload the environment image, or a 1x1 grey stand-in while there is none.
pub fn create_environment_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: Option<&EnvironmentImage>,
) -> wgpu::TextureView {
    let max = device.limits().max_texture_dimension_2d;
    let (width, height, rgba) = match image {
        Some(img) if img.width <= max && img.height <= max => (img.width, img.height, img.rgba.clone()),
        Some(img) => {
            let scale = max as f32 / img.width.max(img.height) as f32;
            let (w, h) = (
                ((img.width as f32 * scale) as u32).max(1),
                ((img.height as f32 * scale) as u32).max(1),
            );
            tracing::warn!(from = ?(img.width, img.height), to = ?(w, h), "environment image downscaled");
            match image::RgbaImage::from_raw(img.width, img.height, img.rgba.clone()) {
                Some(src) => {
                    let resized = image::imageops::resize(&src, w, h, image::imageops::FilterType::Triangle);
                    (w, h, resized.into_raw())
                }
                None => (1, 1, vec![128, 128, 128, 255]),
            }
        }
        None => (1, 1, vec![128, 128, 128, 255]),
    };

    let size = wgpu::Extent3d { width, height, depth_or_array_layers: 1 };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("environment"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &rgba,
        wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(4 * width), rows_per_image: Some(height) },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_fit_webgl2_limits() {
        let limits = wgpu::Limits::downlevel_webgl2_defaults();
        assert_eq!(cube_face_size(256, &limits), 256);
        assert_eq!(cube_face_size(0, &limits), 1);
        assert_eq!(cube_face_size(u32::MAX, &limits), limits.max_texture_dimension_2d);
    }
}
