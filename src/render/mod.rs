mod camera;
pub mod labels;
mod mesh;
pub mod pick;

pub use camera::{OrbitCamera, Viewport};
pub use labels::LabelOverlayProjector;
pub use pick::pick;

use crate::config::ViewerConfig;
use crate::scene::{RoomNode, SceneGraph};
use glam::{Mat4, Vec3};
use mesh::Mesh;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const AMBIENT_INTENSITY: f32 = 0.6;
const DIRECTIONAL_INTENSITY: f32 = 0.8;
const LIGHT_POSITION: Vec3 = Vec3::new(10.0, 20.0, 10.0);
/// White outline drawn over every room box.
const EDGE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.5];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("failed to open GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("window surface reports no supported formats")]
    UnsupportedSurface,
    #[error("GPU out of memory")]
    OutOfMemory,
}

/// Proof that a usable GPU exists for the window. Produced once by [`probe`].
pub struct GpuCapabilities {
    surface: wgpu::Surface<'static>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuCapabilities {
    pub fn adapter_name(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }
}

pub fn probe(window: Arc<Window>) -> Result<GpuCapabilities, RenderError> {
    pollster::block_on(probe_async(window))
}

async fn probe_async(window: Arc<Window>) -> Result<GpuCapabilities, RenderError> {
    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(window)?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
            ..Default::default()
        })
        .await
        .ok_or(RenderError::NoAdapter)?;
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("dollhouse_device"),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        )
        .await?;
    Ok(GpuCapabilities {
        surface,
        adapter,
        device,
        queue,
    })
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct RoomUniform {
    model: [[f32; 4]; 4],
    tint: [f32; 4],
    emissive: [f32; 4],
    edge: [f32; 4],
}

impl RoomUniform {
    fn new(model: Mat4, tint: [f32; 4], emissive: [f32; 3]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            tint,
            emissive: [emissive[0], emissive[1], emissive[2], 0.0],
            edge: EDGE_COLOR,
        }
    }
}

/// Uniform buffer + bind group for one drawable.
struct DrawSlot {
    buffer: wgpu::Buffer,
    bindgroup: wgpu::BindGroup,
}

impl DrawSlot {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<RoomUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bindgroup = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bindgroup }
    }
}

/// GPU side of the room volumes: one shared box and outline, one uniform slot
/// per node.
struct RoomMeshes {
    geometry: Mesh,
    edges: Mesh,
    slots: Vec<DrawSlot>,
}

impl RoomMeshes {
    fn release(&mut self) -> usize {
        let count = self.slots.len();
        for slot in self.slots.drain(..) {
            slot.buffer.destroy();
        }
        count
    }
}

struct DepthTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> DepthTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    DepthTarget { texture, view }
}

fn make_uniform_bgl(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

struct PipelineDesc<'a> {
    label: &'a str,
    fs_entry: &'a str,
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn make_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    desc: PipelineDesc<'_>,
) -> wgpu::RenderPipeline {
    let lines = desc.topology == wgpu::PrimitiveTopology::LineList;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[mesh::Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(desc.fs_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(desc.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if lines { None } else { Some(wgpu::Face::Back) },
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            // Outlines sit exactly on the faces they trace.
            depth_compare: if lines {
                wgpu::CompareFunction::LessEqual
            } else {
                wgpu::CompareFunction::Less
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Owns every GPU resource of the viewer: surface, pipelines, room slots and
/// the egui painter. Nothing here outlives [`RenderContext::release`].
pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthTarget,
    room_pipeline: wgpu::RenderPipeline,
    edge_pipeline: wgpu::RenderPipeline,
    ground_pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    room_bgl: wgpu::BindGroupLayout,
    rooms: RoomMeshes,
    ground_mesh: Mesh,
    ground_slot: DrawSlot,
    egui: egui_wgpu::Renderer,
    clear_color: wgpu::Color,
}

impl RenderContext {
    pub fn new(
        gpu: GpuCapabilities,
        size: (u32, u32),
        viewer: &ViewerConfig,
    ) -> Result<Self, RenderError> {
        let GpuCapabilities {
            surface,
            adapter,
            device,
            queue,
        } = gpu;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.0.max(1),
            height: size.1.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("room_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("room.wgsl").into()),
        });
        let globals_bgl = make_uniform_bgl(&device, "globals_bgl");
        let room_bgl = make_uniform_bgl(&device, "room_bgl");
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("room_pipeline_layout"),
            bind_group_layouts: &[&globals_bgl, &room_bgl],
            push_constant_ranges: &[],
        });
        let room_pipeline = make_pipeline(
            &device,
            &layout,
            &shader,
            format,
            PipelineDesc {
                label: "room_pipeline",
                fs_entry: "fs_main",
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: true,
            },
        );
        let edge_pipeline = make_pipeline(
            &device,
            &layout,
            &shader,
            format,
            PipelineDesc {
                label: "edge_pipeline",
                fs_entry: "fs_edge",
                topology: wgpu::PrimitiveTopology::LineList,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            },
        );
        let ground_pipeline = make_pipeline(
            &device,
            &layout,
            &shader,
            format,
            PipelineDesc {
                label: "ground_pipeline",
                fs_entry: "fs_main",
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            },
        );

        let globals_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
                light_dir: [0.0, 1.0, 0.0, DIRECTIONAL_INTENSITY],
                ambient: [AMBIENT_INTENSITY, AMBIENT_INTENSITY, AMBIENT_INTENSITY, 1.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bg"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        let depth = create_depth(&device, config.width, config.height);
        let rooms = RoomMeshes {
            geometry: Mesh::upload(&device, "room_box", &mesh::unit_box()),
            edges: Mesh::upload(&device, "room_edges", &mesh::unit_box_edges()),
            slots: Vec::new(),
        };
        let ground_mesh = Mesh::upload(&device, "ground", &mesh::unit_plane());
        let ground_slot = DrawSlot::new(&device, &room_bgl, "ground_uniform");
        let egui = egui_wgpu::Renderer::new(&device, format, None, 1, false);

        let [r, g, b, _] = viewer.background_color.to_linear_rgba(1.0);
        log::info!(
            "Render backend ready: {}x{} {:?}",
            config.width,
            config.height,
            format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth,
            room_pipeline,
            edge_pipeline,
            ground_pipeline,
            globals_buf,
            globals_bg,
            room_bgl,
            rooms,
            ground_mesh,
            ground_slot,
            egui,
            clear_color: wgpu::Color {
                r: f64::from(r),
                g: f64::from(g),
                b: f64::from(b),
                a: 1.0,
            },
        })
    }

    /// Allocates one GPU slot per room node, freeing the previous scene's.
    pub fn upload_scene(&mut self, scene: &SceneGraph) {
        let released = self.rooms.release();
        self.rooms.slots = scene
            .nodes()
            .iter()
            .map(|node| DrawSlot::new(&self.device, &self.room_bgl, node.room_id.as_str()))
            .collect();
        log::info!(
            "Uploaded {} room volumes (released {})",
            self.rooms.slots.len(),
            released
        );
    }

    /// Largest texture edge the device accepts; egui textures must fit it.
    pub fn max_texture_side(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if (width, height) == self.size() {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth.texture.destroy();
        self.depth = create_depth(&self.device, width, height);
    }

    fn upload_egui_textures(&mut self, delta: &egui::TexturesDelta) {
        for (id, image_delta) in &delta.set {
            self.egui
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
    }

    pub fn render_frame(
        &mut self,
        scene: &SceneGraph,
        camera: &OrbitCamera,
        ui: &[egui::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        pixels_per_point: f32,
    ) -> Result<(), RenderError> {
        self.write_uniforms(scene, camera);
        self.upload_egui_textures(textures_delta);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => {
                log::warn!("Skipping frame: {err}");
                return Ok(());
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });

        let screen = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point,
        };
        let ui_cmds = self
            .egui
            .update_buffers(&self.device, &self.queue, &mut encoder, ui, &screen);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.globals_bg, &[]);

            pass.set_pipeline(&self.ground_pipeline);
            pass.set_bind_group(1, &self.ground_slot.bindgroup, &[]);
            self.ground_mesh.draw(&mut pass);

            for node in back_to_front(scene, camera.eye()) {
                let Some(slot) = self.rooms.slots.get(node.handle.index()) else {
                    continue;
                };
                pass.set_bind_group(1, &slot.bindgroup, &[]);
                pass.set_pipeline(&self.room_pipeline);
                self.rooms.geometry.draw(&mut pass);
                pass.set_pipeline(&self.edge_pipeline);
                self.rooms.edges.draw(&mut pass);
            }
        }

        {
            let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ui_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui.render(&mut pass.forget_lifetime(), ui, &screen);
        }

        self.queue
            .submit(ui_cmds.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();

        for id in &textures_delta.free {
            self.egui.free_texture(id);
        }
        Ok(())
    }

    fn write_uniforms(&self, scene: &SceneGraph, camera: &OrbitCamera) {
        let light = LIGHT_POSITION.normalize();
        let globals = Globals {
            view_proj: camera.view_proj().to_cols_array_2d(),
            light_dir: [light.x, light.y, light.z, DIRECTIONAL_INTENSITY],
            ambient: [AMBIENT_INTENSITY, AMBIENT_INTENSITY, AMBIENT_INTENSITY, 1.0],
        };
        self.queue
            .write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));

        let ground = scene.ground();
        let ground_uniform = RoomUniform::new(
            ground.model_matrix(scene.center()),
            ground.color.to_linear_rgba(1.0),
            [0.0; 3],
        );
        self.queue.write_buffer(
            &self.ground_slot.buffer,
            0,
            bytemuck::bytes_of(&ground_uniform),
        );

        for node in scene.visible_nodes() {
            if let Some(slot) = self.rooms.slots.get(node.handle.index()) {
                let uniform = RoomUniform::new(node.model_matrix(), node.tint, node.emissive);
                self.queue
                    .write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&uniform));
            }
        }
    }

    /// Frees every GPU allocation. Returns how many room slots were released.
    pub fn release(mut self) -> usize {
        let rooms = self.rooms.release();
        self.rooms.geometry.destroy();
        self.rooms.edges.destroy();
        self.ground_mesh.destroy();
        self.ground_slot.buffer.destroy();
        self.globals_buf.destroy();
        self.depth.texture.destroy();
        log::info!("Released GPU resources ({rooms} room volumes)");
        rooms
    }
}

/// Visible nodes ordered far to near for alpha blending.
fn back_to_front(scene: &SceneGraph, eye: Vec3) -> Vec<&RoomNode> {
    let mut nodes: Vec<&RoomNode> = scene.visible_nodes().collect();
    nodes.sort_by(|a, b| {
        let da = a.current.translation.distance_squared(eye);
        let db = b.current.translation.distance_squared(eye);
        db.total_cmp(&da)
    });
    nodes
}
