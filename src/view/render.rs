use std::num::NonZeroU64;

use glam::{Mat4, Vec3};
use wgpu::*;

use crate::error::{Result, SandboxError};
use crate::model::camera::Camera;
use crate::model::scene::{SceneGraph, Shape};
use crate::utils::{Mesh, MeshBuffer, Vertex};
use crate::view::gpu_init::GpuContext;

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const INITIAL_DRAW_CAPACITY: usize = 64;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn from_camera(camera: &Camera) -> Self {
        Self { view_proj: camera.view_proj().to_cols_array_2d() }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    pub sun_dir: [f32; 3],
    pub sun_intensity: f32,
    pub ambient: f32,
    pub _pad1: f32,
    pub _pad2: f32,
    pub _pad3: f32,
}

impl Default for LightingUniform {
    fn default() -> Self {
        Self {
            sun_dir: Vec3::new(-0.4, -1.0, -0.3).normalize().to_array(),
            sun_intensity: 0.75,
            ambient: 0.35,
            _pad1: 0.0,
            _pad2: 0.0,
            _pad3: 0.0,
        }
    }
}

/// Per-node model matrix and color, bound at a dynamic offset.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

#[derive(Clone, Copy)]
enum MeshKind {
    Cube,
    Sphere,
    Plane,
}

struct ShapeMeshes {
    cube: MeshBuffer,
    sphere: MeshBuffer,
    plane: MeshBuffer,
}

impl ShapeMeshes {
    fn get(&self, kind: MeshKind) -> &MeshBuffer {
        match kind {
            MeshKind::Cube => &self.cube,
            MeshKind::Sphere => &self.sphere,
            MeshKind::Plane => &self.plane,
        }
    }
}

/// What the egui pass needs for one frame.
pub struct EguiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_entry(binding: u32, visibility: ShaderStages, dynamic: Option<NonZeroU64>) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: dynamic.is_some(),
            min_binding_size: dynamic,
        },
        count: None,
    }
}

fn draw_binding_size() -> NonZeroU64 {
    NonZeroU64::new(std::mem::size_of::<DrawUniform>() as u64).unwrap_or(NonZeroU64::MIN)
}

fn create_draw_buffer(
    device: &Device,
    layout: &BindGroupLayout,
    stride: u64,
    capacity: usize,
) -> (Buffer, BindGroup) {
    let buffer = device.create_buffer(&BufferDescriptor {
        label: Some("draw_buffer"),
        size: stride * capacity as u64,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("draw_bind_group"),
        layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer(BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: Some(draw_binding_size()),
            }),
        }],
    });
    (buffer, bind_group)
}

/// GPU state for drawing the scene graph plus the egui overlay.
pub struct RenderState {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub lighting: LightingUniform,
    pub egui_renderer: egui_wgpu::Renderer,

    depth_view: TextureView,
    pipeline: RenderPipeline,
    camera_buffer: Buffer,
    lighting_buffer: Buffer,
    camera_bind_group: BindGroup,

    draw_layout: BindGroupLayout,
    draw_buffer: Buffer,
    draw_bind_group: BindGroup,
    draw_stride: u64,
    draw_capacity: usize,
    draw_staging: Vec<u8>,

    meshes: ShapeMeshes,
}

impl RenderState {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device.as_ref();
        let (width, height) = (gpu.config.width, gpu.config.height);

        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("camera_buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lighting_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("lighting_buffer"),
            size: std::mem::size_of::<LightingUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("camera_bind_group_layout"),
            entries: &[
                uniform_entry(0, ShaderStages::VERTEX, None),
                uniform_entry(1, ShaderStages::FRAGMENT, None),
            ],
        });
        let camera_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
                BindGroupEntry { binding: 1, resource: lighting_buffer.as_entire_binding() },
            ],
        });

        let draw_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("draw_bind_group_layout"),
            entries: &[uniform_entry(
                0,
                ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                Some(draw_binding_size()),
            )],
        });
        let align = device.limits().min_uniform_buffer_offset_alignment.max(1) as u64;
        let draw_stride = (std::mem::size_of::<DrawUniform>() as u64).div_ceil(align) * align;
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(device, &draw_layout, draw_stride, INITIAL_DRAW_CAPACITY);

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&camera_layout, &draw_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
                    step_mode: VertexStepMode::Vertex,
                    attributes: &[
                        VertexAttribute { offset: 0, shader_location: 0, format: VertexFormat::Float32x3 },
                        VertexAttribute { offset: 12, shader_location: 1, format: VertexFormat::Float32x3 },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: gpu.format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: Some(Face::Back),
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
            multiview: None,
            cache: None,
        });

        let (_, depth_view) = create_depth_texture(device, width, height);
        let meshes = ShapeMeshes {
            cube: Mesh::unit_cube().upload(device),
            sphere: Mesh::unit_sphere(16, 24).upload(device),
            plane: Mesh::unit_plane().upload(device),
        };
        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        Self {
            format: gpu.format,
            width,
            height,
            lighting: LightingUniform::default(),
            egui_renderer,
            depth_view,
            pipeline,
            camera_buffer,
            lighting_buffer,
            camera_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_stride,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            draw_staging: Vec::new(),
            meshes,
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let (_, depth_view) = create_depth_texture(device, self.width, self.height);
        self.depth_view = depth_view;
    }

    fn ensure_draw_capacity(&mut self, device: &Device, count: usize) {
        if count <= self.draw_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        let (buffer, bind_group) = create_draw_buffer(device, &self.draw_layout, self.draw_stride, capacity);
        self.draw_buffer = buffer;
        self.draw_bind_group = bind_group;
        self.draw_capacity = capacity;
        tracing::debug!(capacity, "draw buffer grown");
    }

    /// Draws every attached shape of `scene`, then the overlay. A lost or
    /// outdated surface is reconfigured and the frame skipped.
    pub fn draw_frame(
        &mut self,
        gpu: &GpuContext,
        scene: &SceneGraph,
        camera: &Camera,
        ui: Option<EguiFrame>,
    ) -> Result<()> {
        let device = gpu.device.as_ref();
        let queue = gpu.queue.as_ref();

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                gpu.surface.configure(device, &gpu.config);
                return Ok(());
            }
            Err(SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(SandboxError::Gpu(e.to_string())),
        };

        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&CameraUniform::from_camera(camera)));
        queue.write_buffer(&self.lighting_buffer, 0, bytemuck::bytes_of(&self.lighting));

        let mut draws: Vec<(DrawUniform, MeshKind)> = Vec::new();
        scene.visit_drawables(|_, node, world| {
            let kind = match node.shape {
                Shape::Group => return,
                Shape::Box { .. } => MeshKind::Cube,
                Shape::Sphere { .. } => MeshKind::Sphere,
                Shape::Plane { .. } => MeshKind::Plane,
            };
            let model = world * Mat4::from_scale(node.shape.mesh_scale());
            draws.push((DrawUniform { model: model.to_cols_array_2d(), color: node.color }, kind));
        });

        self.ensure_draw_capacity(device, draws.len());
        let stride = self.draw_stride as usize;
        self.draw_staging.clear();
        self.draw_staging.resize(stride * draws.len(), 0);
        for (i, (draw, _)) in draws.iter().enumerate() {
            self.draw_staging[i * stride..i * stride + std::mem::size_of::<DrawUniform>()]
                .copy_from_slice(bytemuck::bytes_of(draw));
        }
        if !self.draw_staging.is_empty() {
            queue.write_buffer(&self.draw_buffer, 0, &self.draw_staging);
        }

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: Some("encoder") });

        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color { r: 0.5, g: 0.8, b: 1.0, a: 1.0 }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations { load: LoadOp::Clear(1.0), store: StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.camera_bind_group, &[]);

            for (i, (_, kind)) in draws.iter().enumerate() {
                let mesh = self.meshes.get(*kind);
                rp.set_bind_group(1, &self.draw_bind_group, &[(i * stride) as u32]);
                rp.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                rp.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        let mut command_buffers = Vec::new();
        if let Some(ui) = ui {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.width, self.height],
                pixels_per_point: ui.pixels_per_point,
            };

            for (id, image_delta) in &ui.textures_delta.set {
                self.egui_renderer.update_texture(device, queue, *id, image_delta);
            }
            command_buffers = self.egui_renderer.update_buffers(
                device,
                queue,
                &mut encoder,
                &ui.primitives,
                &screen_descriptor,
            );

            {
                let egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some("egui_render_pass"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: Operations { load: LoadOp::Load, store: StoreOp::Store },
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
        }

        command_buffers.push(encoder.finish());
        queue.submit(command_buffers);
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_shader() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
        assert_eq!(std::mem::size_of::<LightingUniform>(), 32);
        assert_eq!(std::mem::size_of::<DrawUniform>(), 80);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }
}
