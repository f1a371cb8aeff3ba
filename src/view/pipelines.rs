use crate::utils::Vertex;
use crate::view::targets::DEPTH_FORMAT;

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

pub struct BindGroupLayouts {
    /// camera, lighting, environment texture + sampler
    pub frame: wgpu::BindGroupLayout,
    /// captured cube + sampler
    pub mirror: wgpu::BindGroupLayout,
    /// lens uniform, off-screen texture + sampler
    pub lens: wgpu::BindGroupLayout,
    pub background: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
            ],
        });
        let mirror = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mirror_bind_group_layout"),
            entries: &[texture_entry(0, wgpu::TextureViewDimension::Cube), sampler_entry(1)],
        });
        let lens = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lens_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                sampler_entry(2),
            ],
        });
        let background = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("background_bind_group_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        Self { frame, mirror, lens, background }
    }
}

pub struct Pipelines {
    pub opaque: wgpu::RenderPipeline,
    pub transparent: wgpu::RenderPipeline,
    pub mirror: wgpu::RenderPipeline,
    pub sky: wgpu::RenderPipeline,
    pub lens: wgpu::RenderPipeline,
    pub background: wgpu::RenderPipeline,
}

/// Depth state shared by every pipeline; all passes carry a depth attachment.
fn depth_state(write: bool, compare: wgpu::CompareFunction) -> Option<wgpu::DepthStencilState> {
    Some(wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: compare,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    })
}

struct PipelineDesc<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    fs_entry: &'a str,
    meshes: bool,
    blend: wgpu::BlendState,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
}

fn build(device: &wgpu::Device, format: wgpu::TextureFormat, desc: PipelineDesc) -> wgpu::RenderPipeline {
    let mesh_layout = [Vertex::layout()];
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: Some("vs_main"),
            buffers: if desc.meshes { &mesh_layout[..] } else { &[] },
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: Some(desc.fs_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(desc.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // glTF content is often single-sided planes
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_state(desc.depth_write, desc.depth_compare),
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

fn shader(device: &wgpu::Device, label: &str, source: &'static str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

fn layout(device: &wgpu::Device, label: &str, groups: &[&wgpu::BindGroupLayout]) -> wgpu::PipelineLayout {
    device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: groups,
        push_constant_ranges: &[],
    })
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::OVER,
};

impl Pipelines {
    /// All pipelines target `format`; off-screen and cube targets use it too.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts, format: wgpu::TextureFormat) -> Self {
        use wgpu::CompareFunction::{Always, Less, LessEqual};

        let scene_shader = shader(device, "scene_shader", include_str!("shaders/scene.wgsl"));
        let sky_shader = shader(device, "sky_shader", include_str!("shaders/sky.wgsl"));
        let lens_shader = shader(device, "lens_shader", include_str!("shaders/lens.wgsl"));
        let background_shader = shader(device, "background_shader", include_str!("shaders/background.wgsl"));

        let scene_layout = layout(device, "scene_pipeline_layout", &[&layouts.frame]);
        let mirror_layout = layout(device, "mirror_pipeline_layout", &[&layouts.frame, &layouts.mirror]);
        let lens_layout = layout(device, "lens_pipeline_layout", &[&layouts.lens]);
        let background_layout = layout(device, "background_pipeline_layout", &[&layouts.background]);

        let mesh = |label: &str, layout: &wgpu::PipelineLayout, fs_entry: &str, blend, depth_write| {
            build(device, format, PipelineDesc {
                label,
                layout,
                shader: &scene_shader,
                fs_entry,
                meshes: true,
                blend,
                depth_write,
                depth_compare: Less,
            })
        };

        Self {
            opaque: mesh("opaque_pipeline", &scene_layout, "fs_main", wgpu::BlendState::REPLACE, true),
            transparent: mesh("transparent_pipeline", &scene_layout, "fs_main", wgpu::BlendState::ALPHA_BLENDING, false),
            mirror: mesh("mirror_pipeline", &mirror_layout, "fs_mirror", wgpu::BlendState::REPLACE, true),
            sky: build(device, format, PipelineDesc {
                label: "sky_pipeline",
                layout: &scene_layout,
                shader: &sky_shader,
                fs_entry: "fs_main",
                meshes: false,
                blend: wgpu::BlendState::REPLACE,
                depth_write: false,
                depth_compare: LessEqual,
            }),
            lens: build(device, format, PipelineDesc {
                label: "lens_pipeline",
                layout: &lens_layout,
                shader: &lens_shader,
                fs_entry: "fs_main",
                meshes: false,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
                depth_compare: Always,
            }),
            background: build(device, format, PipelineDesc {
                label: "background_pipeline",
                layout: &background_layout,
                shader: &background_shader,
                fs_entry: "fs_main",
                meshes: false,
                blend: ADDITIVE,
                depth_write: false,
                depth_compare: Always,
            }),
        }
    }
}
