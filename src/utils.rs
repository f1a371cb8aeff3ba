use std::f32::consts::TAU;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Append another mesh, rebasing its indices.
    pub fn extend(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Bake a transform into positions and normals.
    pub fn transform(&mut self, m: &Mat4) {
        let normal_matrix = m.inverse().transpose();
        for v in self.vertices.iter_mut() {
            v.pos = m.transform_point3(Vec3::from_array(v.pos)).to_array();
            v.normal = normal_matrix
                .transform_vector3(Vec3::from_array(v.normal))
                .normalize_or_zero()
                .to_array();
        }
    }

    pub fn transformed(mut self, m: &Mat4) -> Self {
        self.transform(m);
        self
    }

    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut it = self.vertices.iter().map(|v| Vec3::from_array(v.pos));
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
    }

    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        }
    }
}

/// Horizontal plane centred on the origin, facing +Y.
pub fn create_plane_mesh(width: f32, depth: f32, color: [f32; 4]) -> Mesh {
    let (hw, hd) = (width * 0.5, depth * 0.5);
    let normal = [0.0, 1.0, 0.0];
    let vertices = [[-hw, 0.0, -hd], [hw, 0.0, -hd], [hw, 0.0, hd], [-hw, 0.0, hd]]
        .into_iter()
        .map(|pos| Vertex { pos, normal, color })
        .collect();
    Mesh { vertices, indices: vec![0, 2, 1, 0, 3, 2] }
}

/// Open-ended or capped frustum of a cone along +Y, centred on the origin.
///
/// `radius_top == 0` gives a pyramid; three segments make the prism body.
pub fn create_cylinder_mesh(
    radius_top: f32,
    radius_bottom: f32,
    height: f32,
    segments: u32,
    capped: bool,
    color: [f32; 4],
) -> Mesh {
    let segments = segments.max(3);
    let half = height * 0.5;
    let slope = (radius_bottom - radius_top) / height.max(f32::EPSILON);
    let mut mesh = Mesh::empty();

    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let (s, c) = theta.sin_cos();
        let normal = Vec3::new(s, slope, c).normalize().to_array();
        mesh.vertices.push(Vertex { pos: [radius_top * s, half, radius_top * c], normal, color });
        mesh.vertices.push(Vertex { pos: [radius_bottom * s, -half, radius_bottom * c], normal, color });
    }
    for i in 0..segments {
        let a = i * 2;
        mesh.indices.extend_from_slice(&[a, a + 1, a + 2, a + 2, a + 1, a + 3]);
    }

    if capped {
        for (y, radius, normal_y) in [(half, radius_top, 1.0), (-half, radius_bottom, -1.0)] {
            if radius <= 0.0 {
                continue;
            }
            let center = mesh.vertices.len() as u32;
            let normal = [0.0, normal_y, 0.0];
            mesh.vertices.push(Vertex { pos: [0.0, y, 0.0], normal, color });
            for i in 0..=segments {
                let theta = i as f32 / segments as f32 * TAU;
                let (s, c) = theta.sin_cos();
                mesh.vertices.push(Vertex { pos: [radius * s, y, radius * c], normal, color });
            }
            for i in 0..segments {
                let (a, b) = (center + 1 + i, center + 2 + i);
                if normal_y > 0.0 {
                    mesh.indices.extend_from_slice(&[center, a, b]);
                } else {
                    mesh.indices.extend_from_slice(&[center, b, a]);
                }
            }
        }
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_bounds_match_size() {
        let plane = create_plane_mesh(20.0, 10.0, [1.0; 4]);
        let (lo, hi) = plane.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-10.0, 0.0, -5.0));
        assert_eq!(hi, Vec3::new(10.0, 0.0, 5.0));
    }

    #[test]
    fn extend_rebases_indices() {
        let mut a = create_plane_mesh(1.0, 1.0, [1.0; 4]);
        let b = create_plane_mesh(1.0, 1.0, [1.0; 4]);
        a.extend(&b);
        assert_eq!(a.vertices.len(), 8);
        assert_eq!(*a.indices.iter().max().unwrap(), 7);
    }

    #[test]
    fn cylinder_spans_its_height() {
        let cyl = create_cylinder_mesh(0.0, 1.8, 3.2, 3, true, [1.0; 4]);
        let (lo, hi) = cyl.bounds().unwrap();
        assert!((lo.y + 1.6).abs() < 1e-5);
        assert!((hi.y - 1.6).abs() < 1e-5);
        assert!(cyl.indices.iter().all(|&i| (i as usize) < cyl.vertices.len()));
    }

    #[test]
    fn translation_moves_bounds() {
        let plane = create_plane_mesh(2.0, 2.0, [1.0; 4])
            .transformed(&Mat4::from_translation(Vec3::new(0.0, -1.5, 0.0)));
        let (lo, _) = plane.bounds().unwrap();
        assert_eq!(lo.y, -1.5);
    }
}
