use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::camera::{Camera, TransformsUniform};
use crate::error::RenderError;
use crate::grid::{GridLayout, GridMesh, Vertex};

pub fn check_buffer_size(bytes: u64, limit: u64) -> Result<(), RenderError> {
    if bytes > limit {
        return Err(RenderError::MeshTooLarge { bytes, limit });
    }
    Ok(())
}

/// Prefers an sRGB format; an adapter that reports no format, present mode or
/// alpha mode for the surface cannot draw to it.
pub fn surface_config(
    caps: &wgpu::SurfaceCapabilities,
    size: winit::dpi::PhysicalSize<u32>,
) -> Result<wgpu::SurfaceConfiguration, RenderError> {
    let format = caps.formats.iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or(RenderError::IncompatibleSurface)?;
    let present_mode = caps.present_modes.first().copied().ok_or(RenderError::IncompatibleSurface)?;
    let alpha_mode = caps.alpha_modes.first().copied().ok_or(RenderError::IncompatibleSurface)?;
    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width,
        height: size.height,
        present_mode,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2
    })
}

pub struct GridRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    pipeline: wgpu::RenderPipeline,
    transforms_buffer: wgpu::Buffer,
    transforms_bind_group: wgpu::BindGroup,
    grid_vertex_buffer: Option<wgpu::Buffer>,
    grid_layout: Option<GridLayout>,
    window: Arc<Window>,
}

impl GridRenderer {
    // Creating some of the wgpu types requires async code
    pub async fn new(window: Arc<Window>) -> Result<GridRenderer, RenderError> {
        // On web the canvas can briefly report a 0×0 size during initial layout.
        let initial_size = window.inner_size();
        let size = if initial_size.width == 0 || initial_size.height == 0 {
            winit::dpi::PhysicalSize::new(1, 1)
        } else {
            initial_size
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            },
        ).await?;

        let (device, queue) = adapter.request_device(
            &wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                // WebGL2 cannot satisfy the native defaults.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                label: None,
                .. Default::default()
            },
        ).await?;
        log::info!("graphics adapter: {:?}", adapter.get_info().name);

        let transforms_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Transforms Buffer"),
                contents: bytemuck::cast_slice(&[TransformsUniform {
                    projection: glam::Mat4::IDENTITY.to_cols_array_2d(),
                    view: glam::Mat4::IDENTITY.to_cols_array_2d(),
                    model: glam::Mat4::IDENTITY.to_cols_array_2d(),
                }]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let transforms_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(std::mem::size_of::<TransformsUniform>() as u64),
                    },
                    count: None,
                },
            ],
            label: Some("transforms_bind_group_layout"),
        });

        let transforms_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &transforms_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: transforms_buffer.as_entire_binding(),
                },
            ],
            label: Some("transforms_bind_group"),
        });

        let config = surface_config(&surface.get_capabilities(&adapter), size)?;
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into())
        });

        let render_pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[
                &transforms_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some("Grid Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                compilation_options: Default::default(),
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 0,
                                format: wgpu::VertexFormat::Float32x3,
                            }
                        ],
                    },
                ]
            },
            fragment: Some(wgpu::FragmentState {
                compilation_options: Default::default(),
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })]
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
                unclipped_depth: false
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false
            },
            multiview: None,
        });

        Ok(GridRenderer {
            window,
            surface,
            device,
            queue,
            config,
            size,
            pipeline,
            transforms_buffer,
            transforms_bind_group,
            grid_vertex_buffer: None,
            grid_layout: None,
        })
    }

    pub fn window(&self) -> &Arc<Window> { &self.window }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> { self.size }

    /// Uploads the mesh once; it stays on the device until the next layout replaces it.
    /// A mesh too large for the device leaves the current one in place.
    pub fn load_mesh(&mut self, mesh: &GridMesh) -> Result<(), RenderError> {
        check_buffer_size(mesh.byte_len(), self.device.limits().max_buffer_size)?;
        self.grid_vertex_buffer = Some(self.device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Grid Vertex Buffer"),
                contents: bytemuck::cast_slice(mesh.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            }
        ));
        self.grid_layout = Some(mesh.layout());
        log::debug!(
            "grid uploaded: {} columns, {} rows, {} vertices",
            mesh.layout().columns(),
            mesh.layout().rows(),
            mesh.vertices().len()
        );
        Ok(())
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // If the surface has zero size (can happen transiently on web), skip rendering this frame.
        if self.config.width == 0 || self.config.height == 0 {
            return Ok(());
        }
        let (Some(layout), Some(vertex_buffer)) = (self.grid_layout, self.grid_vertex_buffer.as_ref()) else {
            return Ok(());
        };

        let camera = Camera::for_surface(self.config.width, self.config.height, &layout);
        self.queue.write_buffer(&self.transforms_buffer, 0, bytemuck::cast_slice(&[camera.to_uniform()]));

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Grid Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_bind_group(0, &self.transforms_bind_group, &[]);
            // Only the line endpoints; the intersections after them are not drawn.
            render_pass.draw(0..layout.line_vertex_count(), 0..1);
        }

        // submit will accept anything that implements IntoIter
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}
