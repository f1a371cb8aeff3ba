use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::config::DemoConfig;
use crate::controller::frame_loop::{
    BackgroundUniform, CameraUniform, FramePlan, LensUniform, LightingUniform, RenderPass,
};
use crate::error::{DemoError, Result};
use crate::model::scene::SceneState;
use crate::utils::MeshBuffer;
use crate::view::gpu_init::GpuContext;
use crate::view::pipelines::{BindGroupLayouts, Pipelines};
use crate::view::targets::{create_environment_texture, CubeTarget, DepthTarget, OffscreenTarget};

/// Camera + lighting buffers and the group-0 bind group that exposes them.
struct FrameBindings {
    camera: wgpu::Buffer,
    lighting: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl FrameBindings {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        env_view: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> Self {
        let camera = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lighting = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<LightingUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: camera.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: lighting.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(env_view) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        });
        Self { camera, lighting, bind_group }
    }

    fn write(&self, queue: &wgpu::Queue, camera: &CameraUniform, lighting: &LightingUniform) {
        queue.write_buffer(&self.camera, 0, bytemuck::bytes_of(camera));
        queue.write_buffer(&self.lighting, 0, bytemuck::bytes_of(lighting));
    }
}

struct ProbeResources {
    target: CubeTarget,
    faces: Vec<FrameBindings>,
    cube_bind_group: wgpu::BindGroup,
}

struct LensResources {
    target: OffscreenTarget,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct BackgroundResources {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// egui output for one frame, already tessellated.
pub struct EguiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// Which meshes a scene pass draws and how.
#[derive(Clone, Copy)]
struct SceneDraw<'a> {
    frame: &'a wgpu::BindGroup,
    /// Mesh left out, the one owning the probe being captured.
    skip: Option<usize>,
    /// Draw reflective meshes with their captured cube.
    mirrors: bool,
    sky: bool,
}

fn clear_color(rgb: [f32; 3], linear: bool) -> wgpu::Color {
    // config colours are already linear; a non-sRGB surface wants them encoded
    let [r, g, b] = rgb;
    if linear {
        wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: 1.0 }
    } else {
        let enc = |c: f32| (c.max(0.0) as f64).powf(1.0 / 2.2);
        wgpu::Color { r: enc(r), g: enc(g), b: enc(b), a: 1.0 }
    }
}

/// GPU-side mirror of the scene plus every pipeline and target.
pub struct RenderState {
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    env_view: wgpu::TextureView,
    has_environment: bool,
    screen: FrameBindings,
    depth: DepthTarget,
    lens: Option<LensResources>,
    background: BackgroundResources,
    meshes: Vec<Option<MeshBuffer>>,
    probes: Vec<ProbeResources>,
    probe_of_mesh: HashMap<usize, usize>,
    reflection_resolution: u32,
    scene_revision: u64,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl RenderState {
    pub fn new(gpu: &GpuContext, config: &DemoConfig) -> Self {
        let device = gpu.device.as_ref();
        let (width, height) = (gpu.config.width, gpu.config.height);
        let layouts = BindGroupLayouts::new(device);
        let pipelines = Pipelines::new(device, &layouts, gpu.format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let env_view = create_environment_texture(device, gpu.queue.as_ref(), None);
        let screen = FrameBindings::new(device, &layouts.frame, &env_view, &sampler, "screen_frame");

        let background_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("background_uniform"),
            contents: bytemuck::bytes_of(&BackgroundUniform { time: [0.0; 4], mouse_extent: [0.5, 0.5, 0.5, 0.5] }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let background = BackgroundResources {
            bind_group: device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("background_bind_group"),
                layout: &layouts.background,
                entries: &[wgpu::BindGroupEntry { binding: 0, resource: background_buffer.as_entire_binding() }],
            }),
            buffer: background_buffer,
        };

        let mut state = Self {
            format: gpu.format,
            width,
            height,
            layouts,
            pipelines,
            sampler,
            env_view,
            has_environment: false,
            screen,
            depth: DepthTarget::new(device, width, height),
            lens: None,
            background,
            meshes: Vec::new(),
            probes: Vec::new(),
            probe_of_mesh: HashMap::new(),
            reflection_resolution: config.reflection.as_ref().map_or(256, |r| r.resolution),
            scene_revision: 0,
            egui_renderer: egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default()),
        };
        if config.lens.is_some() {
            state.lens = Some(state.create_lens(device));
        }
        state
    }

    fn create_lens(&self, device: &wgpu::Device) -> LensResources {
        let target = OffscreenTarget::new(device, self.format, self.width, self.height);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lens_uniform"),
            size: std::mem::size_of::<LensUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lens_bind_group"),
            layout: &self.layouts.lens,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&target.view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });
        LensResources { target, buffer, bind_group }
    }

    /// Recreate size-dependent targets.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.depth = DepthTarget::new(device, self.width, self.height);
        if self.lens.is_some() {
            self.lens = Some(self.create_lens(device));
        }
    }

    /// Upload meshes, environment and probes after the scene changed.
    fn sync_scene(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, scene: &SceneState) {
        if scene.revision == self.scene_revision {
            return;
        }
        self.scene_revision = scene.revision;

        self.meshes = scene
            .meshes
            .iter()
            .map(|m| (m.visible && !m.mesh.is_empty()).then(|| m.mesh.upload(device)))
            .collect();

        let has_environment = scene.environment.is_some();
        if has_environment != self.has_environment {
            self.env_view = create_environment_texture(device, queue, scene.environment.as_ref());
            self.screen = FrameBindings::new(device, &self.layouts.frame, &self.env_view, &self.sampler, "screen_frame");
            self.has_environment = has_environment;
        }

        self.probe_of_mesh.clear();
        self.probes = scene
            .probes
            .iter()
            .enumerate()
            .map(|(i, probe)| {
                self.probe_of_mesh.insert(probe.mesh_index, i);
                let target = CubeTarget::new(device, self.format, self.reflection_resolution);
                let faces = (0..6)
                    .map(|_| FrameBindings::new(device, &self.layouts.frame, &self.env_view, &self.sampler, "probe_face"))
                    .collect();
                let cube_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("mirror_bind_group"),
                    layout: &self.layouts.mirror,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(&target.cube_view) },
                        wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&self.sampler) },
                    ],
                });
                ProbeResources { target, faces, cube_bind_group }
            })
            .collect();

        tracing::debug!(meshes = self.meshes.len(), probes = self.probes.len(), "scene uploaded");
    }

    fn draw_scene(&self, rp: &mut wgpu::RenderPass<'_>, draw: SceneDraw<'_>, transparent: Option<&MeshBuffer>) {
        if draw.sky {
            rp.set_pipeline(&self.pipelines.sky);
            rp.set_bind_group(0, draw.frame, &[]);
            rp.draw(0..3, 0..1);
        }

        for (index, buffer) in self.meshes.iter().enumerate() {
            let Some(buffer) = buffer else { continue };
            if draw.skip == Some(index) {
                continue;
            }
            match self.probe_of_mesh.get(&index).filter(|_| draw.mirrors) {
                Some(&probe) => {
                    rp.set_pipeline(&self.pipelines.mirror);
                    rp.set_bind_group(1, &self.probes[probe].cube_bind_group, &[]);
                }
                None => rp.set_pipeline(&self.pipelines.opaque),
            }
            rp.set_bind_group(0, draw.frame, &[]);
            rp.set_vertex_buffer(0, buffer.vertex_buffer.slice(..));
            rp.set_index_buffer(buffer.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..buffer.index_count, 0, 0..1);
        }

        if let Some(buffer) = transparent {
            rp.set_pipeline(&self.pipelines.transparent);
            rp.set_bind_group(0, draw.frame, &[]);
            rp.set_vertex_buffer(0, buffer.vertex_buffer.slice(..));
            rp.set_index_buffer(buffer.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rp.draw_indexed(0..buffer.index_count, 0, 0..1);
        }
    }

    fn begin<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: wgpu::Color,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(clear), store: wgpu::StoreOp::Store },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(1.0), store: wgpu::StoreOp::Store }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    /// Run the passes of `plan`, then egui, and present.
    ///
    /// A lost or outdated surface is reconfigured and the frame skipped.
    pub fn draw_frame(&mut self, gpu: &GpuContext, plan: &FramePlan, scene: &SceneState, ui: EguiFrame) -> Result<()> {
        let device = gpu.device.as_ref();
        let queue = gpu.queue.as_ref();
        self.sync_scene(device, queue, scene);

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost, reconfiguring");
                gpu.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(DemoError::Gpu(format!("surface error: {e}"))),
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let clear = clear_color(plan.clear_color, self.format.is_srgb());

        self.screen.write(queue, &plan.camera, &plan.lighting);
        if let (Some(lens), Some(uniform)) = (&self.lens, &plan.lens) {
            queue.write_buffer(&lens.buffer, 0, bytemuck::bytes_of(uniform));
        }
        if let Some(bg) = &plan.background {
            queue.write_buffer(&self.background.buffer, 0, bytemuck::bytes_of(bg));
        }
        let transparent = plan.transparent.as_ref().filter(|m| !m.is_empty()).map(|m| m.upload(device));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame_encoder") });

        for pass in &plan.passes {
            match *pass {
                RenderPass::ReflectionCapture { probe } => {
                    let (Some(res), Some(info)) = (self.probes.get(probe), scene.probes.get(probe)) else {
                        continue;
                    };
                    let eye = info.position;
                    for (face, view_proj) in info.face_view_projs().into_iter().enumerate() {
                        res.faces[face].write(queue, &CameraUniform::new(view_proj, eye), &plan.lighting);
                        let mut rp = Self::begin(
                            &mut encoder,
                            "reflection_capture",
                            &res.target.face_views[face],
                            &res.target.depth.view,
                            clear,
                        );
                        let draw = SceneDraw {
                            frame: &res.faces[face].bind_group,
                            skip: Some(info.mesh_index),
                            mirrors: false,
                            sky: plan.sky,
                        };
                        self.draw_scene(&mut rp, draw, transparent.as_ref());
                    }
                }
                RenderPass::LensOffscreen => {
                    let Some(lens) = &self.lens else { continue };
                    let mut rp = Self::begin(&mut encoder, "lens_offscreen", &lens.target.view, &self.depth.view, clear);
                    let draw = SceneDraw { frame: &self.screen.bind_group, skip: None, mirrors: true, sky: plan.sky };
                    self.draw_scene(&mut rp, draw, transparent.as_ref());
                }
                RenderPass::Screen => {
                    let mut rp = Self::begin(&mut encoder, "screen", &view, &self.depth.view, clear);
                    if plan.background.is_some() {
                        rp.set_pipeline(&self.pipelines.background);
                        rp.set_bind_group(0, &self.background.bind_group, &[]);
                        rp.draw(0..3, 0..1);
                    }
                    let draw = SceneDraw { frame: &self.screen.bind_group, skip: None, mirrors: true, sky: plan.sky };
                    self.draw_scene(&mut rp, draw, transparent.as_ref());
                    if let (true, Some(lens)) = (plan.lens_overlay, &self.lens) {
                        rp.set_pipeline(&self.pipelines.lens);
                        rp.set_bind_group(0, &lens.bind_group, &[]);
                        rp.draw(0..64 * 3, 0..1);
                    }
                }
            }
        }

        // egui on top of the finished scene
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.width, self.height],
            pixels_per_point: ui.pixels_per_point,
        };
        for (id, image_delta) in &ui.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(device, queue, &mut encoder, &ui.primitives, &screen_descriptor);
        {
            let egui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer
                .render(&mut egui_pass.forget_lifetime(), &ui.primitives, &screen_descriptor);
        }
        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_surface_takes_linear_clear() {
        let c = clear_color([0.25, 0.5, 1.0], true);
        assert_eq!((c.r, c.g, c.b), (0.25, 0.5, 1.0));
        let c = clear_color([0.0, 1.0, 0.5], false);
        assert_eq!((c.r, c.g), (0.0, 1.0));
        assert!(c.b > 0.5);
    }
}
