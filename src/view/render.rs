use wgpu::*;

use crate::controller::face_frames::UvTransform;
use crate::controller::frame_loop::{CameraUniform, DrawUniform};
use crate::model::avatar::CullMode;
use crate::model::scene::LoadedAvatar;
use crate::utils::{MeshBuffer, Vertex};
use crate::view::texture::{GpuTexture, SamplerKey, Samplers};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

// Shared graphics setup used by native and web
pub struct CameraResources {
    pub camera_buffer: wgpu::Buffer,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub camera_bind_group: wgpu::BindGroup,
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn uniform_layout_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn create_camera_resources(device: &wgpu::Device) -> CameraResources {
    let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("camera_buffer"),
        size: std::mem::size_of::<CameraUniform>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[uniform_layout_entry(0, ShaderStages::VERTEX_FRAGMENT)],
    });

    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("camera_bind_group"),
        layout: &bind_group_layout,
        entries: &[wgpu::BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() }],
    });

    CameraResources { camera_buffer, bind_group_layout, camera_bind_group }
}

/// One pipeline per cull mode, opaque and alpha blended
pub struct PipelineResources {
    pub draw_layout: BindGroupLayout,
    pub texture_layout: BindGroupLayout,
    opaque: [RenderPipeline; 3],
    blended: [RenderPipeline; 3],
}

impl PipelineResources {
    pub fn get(&self, cull: CullMode, blend: bool) -> &RenderPipeline {
        let idx = match cull {
            CullMode::Back => 0,
            CullMode::Front => 1,
            CullMode::None => 2,
        };
        if blend { &self.blended[idx] } else { &self.opaque[idx] }
    }
}

pub fn create_avatar_pipelines(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    camera_layout: &wgpu::BindGroupLayout,
    depth_format: wgpu::TextureFormat,
) -> PipelineResources {
    let shader_src = include_str!("../shaders/avatar.wgsl");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("avatar_shader"),
        source: wgpu::ShaderSource::Wgsl(shader_src.into()),
    });

    let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw_bind_group_layout"),
        entries: &[uniform_layout_entry(0, ShaderStages::VERTEX_FRAGMENT)],
    });

    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("texture_bind_group_layout"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("avatar_pipeline_layout"),
        bind_group_layouts: &[camera_layout, &draw_layout, &texture_layout],
        push_constant_ranges: &[],
    });

    let build = |cull: CullMode, blend: bool| {
        let cull_mode = match cull {
            CullMode::Back => Some(Face::Back),
            CullMode::Front => Some(Face::Front),
            CullMode::None => None,
        };
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(if blend { "avatar_blended_pipeline" } else { "avatar_opaque_pipeline" }),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(if blend { BlendState::ALPHA_BLENDING } else { BlendState::REPLACE }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
            multiview: None,
            cache: None,
        })
    };

    let culls = [CullMode::Back, CullMode::Front, CullMode::None];
    PipelineResources {
        opaque: culls.map(|c| build(c, false)),
        blended: culls.map(|c| build(c, true)),
        draw_layout,
        texture_layout,
    }
}

fn texture_bind_group(
    device: &Device,
    layout: &BindGroupLayout,
    view: &TextureView,
    sampler: &Sampler,
) -> BindGroup {
    device.create_bind_group(&BindGroupDescriptor {
        label: Some("texture_bind_group"),
        layout,
        entries: &[
            BindGroupEntry { binding: 0, resource: BindingResource::TextureView(view) },
            BindGroupEntry { binding: 1, resource: BindingResource::Sampler(sampler) },
        ],
    })
}

///////////////////////////////////////////////////////////////////////////////

/// GPU side of one avatar primitive
pub struct DrawResources {
    pub mesh: MeshBuffer,
    pub uniform_buffer: Buffer,
    pub uniform_bind_group: BindGroup,
    pub texture_bind_group: BindGroup,
    pub cull: CullMode,
    pub blend: bool,
    pub unlit: bool,
    pub face: bool,
    pub base_color: [f32; 4],
}

/// Buffers, textures and bind groups of the loaded avatar
pub struct AvatarGpu {
    pub draws: Vec<DrawResources>,
    pub images: Vec<GpuTexture>,
}

impl AvatarGpu {
    pub fn upload(
        device: &Device,
        queue: &Queue,
        pipelines: &PipelineResources,
        samplers: &mut Samplers,
        fallback: &GpuTexture,
        face_texture: &GpuTexture,
        avatar: &LoadedAvatar,
    ) -> Self {
        let images: Vec<GpuTexture> = avatar
            .model
            .images
            .iter()
            .enumerate()
            .map(|(i, img)| GpuTexture::from_rgba(device, queue, img, &format!("gltf_image_{i}")))
            .collect();

        let draws = avatar
            .draws
            .iter()
            .map(|draw| {
                let prim = avatar.model.primitive(draw.item);
                let material = avatar.material(draw);
                let mesh = prim.geometry.upload(device, prim.is_skinned());

                let uniform_buffer = device.create_buffer(&BufferDescriptor {
                    label: Some("draw_uniform_buffer"),
                    size: std::mem::size_of::<DrawUniform>() as u64,
                    usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let uniform_bind_group = device.create_bind_group(&BindGroupDescriptor {
                    label: Some("draw_bind_group"),
                    layout: &pipelines.draw_layout,
                    entries: &[BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }],
                });

                let view = if draw.face {
                    &face_texture.view
                } else {
                    material
                        .base_color_image
                        .and_then(|i| images.get(i))
                        .map_or(&fallback.view, |t| &t.view)
                };
                let sampler = if draw.face {
                    samplers.face()
                } else {
                    samplers.get(device, SamplerKey::for_material(&material))
                };
                let texture_bind_group = texture_bind_group(device, &pipelines.texture_layout, view, sampler);

                DrawResources {
                    mesh,
                    uniform_buffer,
                    uniform_bind_group,
                    texture_bind_group,
                    cull: material.cull,
                    blend: material.blend,
                    unlit: material.unlit,
                    face: draw.face,
                    base_color: material.base_color,
                }
            })
            .collect();

        Self { draws, images }
    }

    /// Point every face draw at a new face texture
    pub fn rebind_face(
        &mut self,
        device: &Device,
        pipelines: &PipelineResources,
        samplers: &Samplers,
        face_texture: &GpuTexture,
    ) {
        for draw in self.draws.iter_mut().filter(|d| d.face) {
            draw.texture_bind_group =
                texture_bind_group(device, &pipelines.texture_layout, &face_texture.view, samplers.face());
        }
    }

    /// Upload the current pose: per-draw uniforms and skinned vertices
    pub fn update(&self, queue: &Queue, avatar: &LoadedAvatar, face_uv: UvTransform) {
        for (res, pose) in self.draws.iter().zip(avatar.pose()) {
            if let Some(vertices) = &pose.skinned {
                res.mesh.write_vertices(queue, vertices);
            }
            let uv = if res.face { face_uv } else { UvTransform::IDENTITY };
            let uniform = DrawUniform::new(pose.model_matrix, uv, res.base_color, res.unlit, res.blend);
            queue.write_buffer(&res.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
        }
    }
}

/// Consolidated render state to avoid parameter explosion
pub struct RenderState {
    // wgpu resources
    pub format: TextureFormat,
    pub alpha_mode: CompositeAlphaMode,
    pub width: u32,
    pub height: u32,
    pub clear_color: Color,

    pub pipelines: PipelineResources,
    pub camera: CameraResources,
    pub depth_view: TextureView,
    pub samplers: Samplers,
    /// White 1x1, bound for untextured materials
    pub white: GpuTexture,
    pub face_texture: GpuTexture,
    pub avatar: Option<AvatarGpu>,

    // UI
    pub egui_renderer: egui_wgpu::Renderer,
    pub egui_primitives: Option<Vec<egui::ClippedPrimitive>>,
    pub egui_full_output: Option<egui::FullOutput>,
    pub egui_dpr: f32,
}

impl RenderState {
    pub fn new(
        device: &Device,
        queue: &Queue,
        format: TextureFormat,
        alpha_mode: CompositeAlphaMode,
        width: u32,
        height: u32,
        clear_color: [f64; 4],
    ) -> Self {
        let camera = create_camera_resources(device);
        let pipelines = create_avatar_pipelines(device, format, &camera.bind_group_layout, DEPTH_FORMAT);
        let (_, depth_view) = create_depth_texture(device, width, height);

        Self {
            format,
            alpha_mode,
            width,
            height,
            clear_color: Color {
                r: clear_color[0],
                g: clear_color[1],
                b: clear_color[2],
                a: clear_color[3],
            },
            pipelines,
            camera,
            depth_view,
            samplers: Samplers::new(device),
            white: GpuTexture::solid(device, queue, [255; 4], "white"),
            face_texture: GpuTexture::placeholder(device, queue),
            avatar: None,
            egui_renderer: egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default()),
            egui_primitives: None,
            egui_full_output: None,
            egui_dpr: 1.0,
        }
    }

    fn surface_config(&self) -> SurfaceConfiguration {
        SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: self.format,
            width: self.width,
            height: self.height,
            present_mode: PresentMode::Fifo,
            alpha_mode: self.alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    /// Reconfigure the surface and depth buffer for a new size
    pub fn resize(&mut self, device: &Device, surface: &Surface, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        surface.configure(device, &self.surface_config());
        self.depth_view = create_depth_texture(device, width, height).1;
    }

    pub fn write_camera(&self, queue: &Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.camera.camera_buffer, 0, bytemuck::bytes_of(uniform));
    }

    pub fn upload_avatar(&mut self, device: &Device, queue: &Queue, avatar: &LoadedAvatar) {
        self.avatar = Some(AvatarGpu::upload(
            device,
            queue,
            &self.pipelines,
            &mut self.samplers,
            &self.white,
            &self.face_texture,
            avatar,
        ));
        tracing::info!("avatar uploaded to GPU");
    }

    /// Swap in a new face texture and rebind it on the avatar, if any
    pub fn set_face_texture(&mut self, device: &Device, texture: GpuTexture) {
        self.face_texture = texture;
        if let Some(avatar) = self.avatar.as_mut() {
            avatar.rebind_face(device, &self.pipelines, &self.samplers, &self.face_texture);
        }
    }

    pub fn draw_frame(&mut self, device: &Device, queue: &Queue, surface: &Surface) {
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                tracing::warn!("surface lost, reconfiguring");
                surface.configure(device, &self.surface_config());
                return;
            }
            Err(e) => {
                tracing::error!("failed to acquire frame: {e:?}");
                return;
            }
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_bind_group(0, &self.camera.camera_bind_group, &[]);

            // Opaque draws first, then blended ones over them
            if let Some(avatar) = &self.avatar {
                for blended in [false, true] {
                    for draw in avatar.draws.iter().filter(|d| d.blend == blended) {
                        if draw.mesh.index_count == 0 {
                            continue;
                        }
                        rp.set_pipeline(self.pipelines.get(draw.cull, draw.blend));
                        rp.set_bind_group(1, &draw.uniform_bind_group, &[]);
                        rp.set_bind_group(2, &draw.texture_bind_group, &[]);
                        rp.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
                        rp.set_index_buffer(draw.mesh.index_buffer.slice(..), IndexFormat::Uint32);
                        rp.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
                    }
                }
            }
        }

        if let (Some(egui_primitives), Some(egui_full_output)) =
            (self.egui_primitives.take(), self.egui_full_output.take())
        {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.width, self.height],
                pixels_per_point: self.egui_dpr,
            };

            // Upload egui textures
            for (id, image_delta) in &egui_full_output.textures_delta.set {
                self.egui_renderer.update_texture(device, queue, *id, image_delta);
            }

            self.egui_renderer
                .update_buffers(device, queue, &mut encoder, &egui_primitives, &screen_descriptor);

            {
                let egui_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some("egui_render_pass"),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                self.egui_renderer
                    .render(&mut egui_pass.forget_lifetime(), &egui_primitives, &screen_descriptor);
            }

            for id in &egui_full_output.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}
