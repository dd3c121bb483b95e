//! GPU volume raymarcher using WGPU
//!
//! The volume is uploaded once as a read-only storage buffer of `f32`
//! samples and the colormap as a storage buffer of `vec4`. Trilinear
//! filtering happens in the shader, since `R32Float` 3D textures are not
//! filterable on every adapter.

use crate::camera::{Camera, Projection};
use crate::error::{RenderError, Result};
use crate::lighting::{LightingUniforms, RenderSettings};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use std::sync::Arc;
use volmarch_core::colormap::{Colormap, Interpolation};
use volmarch_core::params::{RenderMode, RenderParams};
use volmarch_core::volume::Volume;
use wgpu::util::DeviceExt;

/// Shader source for the volume pipeline
pub const SHADER_SOURCE: &str = include_str!("shaders/volume.wgsl");

/// Render target format; linear so bytes match the CPU renderer
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Uniform buffer data sent to the GPU
/// This struct must match the WGSL struct layout exactly
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VolumeUniforms {
    pub camera_pos: [f32; 3],
    /// 0 for perspective, 1 for orthographic
    pub projection_kind: f32,
    pub camera_right: [f32; 3],
    pub fov_tan: f32,
    pub camera_up: [f32; 3],
    pub ortho_half_height: f32,
    pub camera_forward: [f32; 3],
    /// Blend factor over the background
    pub opacity: f32,
    pub resolution: [f32; 2],
    pub step_size: f32,
    pub iso_threshold: f32,
    pub inv_model: [[f32; 4]; 4],
    pub dims: [u32; 3],
    /// 0 for MIP, 1 for iso-surface
    pub mode: u32,
    pub clim: [f32; 2],
    pub colormap_len: u32,
    pub colormap_nearest: u32,
    pub lighting: LightingUniforms,
}

impl VolumeUniforms {
    pub fn new(
        camera: &Camera,
        inv_model: Mat4,
        dims: [u32; 3],
        colormap: &Colormap,
        params: &RenderParams,
        settings: &RenderSettings,
        resolution: [f32; 2],
    ) -> Self {
        let (projection_kind, fov_tan, ortho_half_height) = match camera.projection {
            Projection::Perspective { fov } => (0.0, (fov * 0.5).tan(), 0.0),
            Projection::Orthographic { height } => (1.0, 0.0, height * 0.5),
        };
        let (low, high) = params.clim();

        Self {
            camera_pos: camera.position.to_array(),
            projection_kind,
            camera_right: camera.right().to_array(),
            fov_tan,
            camera_up: camera.actual_up().to_array(),
            ortho_half_height,
            camera_forward: camera.forward().to_array(),
            opacity: params.opacity(),
            resolution,
            step_size: settings.step_size(),
            iso_threshold: params.iso_threshold(),
            inv_model: inv_model.to_cols_array_2d(),
            dims,
            mode: match params.mode() {
                RenderMode::Mip => 0,
                RenderMode::Iso => 1,
            },
            clim: [low, high],
            colormap_len: colormap.colors.len() as u32,
            colormap_nearest: u32::from(colormap.interpolation == Interpolation::Nearest),
            lighting: LightingUniforms::new(settings, settings.lighting.local_direction(&inv_model)),
        }
    }
}

/// Volume raymarcher for a single volume and colormap
pub struct GpuRaymarcher {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    dims: [u32; 3],
    colormap: Colormap,
}

impl GpuRaymarcher {
    /// Upload `volume` and `colormap` and build the pipeline
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        volume: &Volume,
        colormap: &Colormap,
    ) -> Result<Self> {
        let bytes = (volume.len() * std::mem::size_of::<f32>()) as u64;
        let limit = u64::from(device.limits().max_storage_buffer_binding_size);
        if bytes > limit {
            return Err(RenderError::VolumeTooLarge { bytes, limit });
        }

        tracing::debug!(
            "Uploading {}x{}x{} volume ({} bytes)",
            volume.dims().x,
            volume.dims().y,
            volume.dims().z,
            bytes
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Volume Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let volume_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Volume Buffer"),
            contents: bytemuck::cast_slice(volume.data()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        // Never bind an empty storage buffer
        let mut colors: Vec<[f32; 4]> = colormap
            .colors
            .iter()
            .map(|c| c.extend(1.0).to_array())
            .collect();
        if colors.is_empty() {
            colors.push([0.0; 4]);
        }
        let colormap_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Colormap Buffer"),
            contents: bytemuck::cast_slice(&colors),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Volume Uniform Buffer"),
            contents: bytemuck::cast_slice(&[VolumeUniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1),
                storage_entry(2),
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: volume_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: colormap_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Volume Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Volume Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OUTPUT_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let dims = volume.dims();
        Ok(Self {
            device,
            queue,
            pipeline,
            uniform_buffer,
            bind_group,
            dims: [dims.x, dims.y, dims.z],
            colormap: colormap.clone(),
        })
    }

    /// Update uniforms from camera, transform and parameter state
    pub fn update_uniforms(
        &self,
        camera: &Camera,
        model: Mat4,
        params: &RenderParams,
        settings: &RenderSettings,
        resolution: [f32; 2],
    ) -> Result<()> {
        let inv_model = crate::cpu::invert_model(&model).ok_or(RenderError::SingularTransform(0))?;
        let uniforms = VolumeUniforms::new(
            camera,
            inv_model,
            self.dims,
            &self.colormap,
            params,
            settings,
            resolution,
        );
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        Ok(())
    }

    /// Render a frame to the given texture view
    pub fn render(&self, view: &wgpu::TextureView, background: Vec4) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Volume Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Volume Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(background.x),
                            g: f64::from(background.y),
                            b: f64::from(background.z),
                            a: f64::from(background.w),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Full-screen triangle
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Render to an image buffer (for headless rendering)
    pub fn render_to_image(
        &self,
        width: u32,
        height: u32,
        camera: &Camera,
        model: Mat4,
        params: &RenderParams,
        settings: &RenderSettings,
    ) -> Result<image::RgbaImage> {
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyViewport(width, height));
        }

        // Create output texture
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Output Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.update_uniforms(camera, model, params, settings, [width as f32, height as f32])?;
        self.render(&view, settings.background);

        // Create buffer to read back
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;
        let buffer_size = u64::from(padded_bytes_per_row) * u64::from(height);

        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Copy Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        // Read back
        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| RenderError::Readback(e.to_string()))?;
        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let data = buffer_slice.get_mapped_range();

        // Convert to image, handling row padding
        let mut img = image::RgbaImage::new(width, height);
        for (y, row) in data.chunks(padded_bytes_per_row as usize).take(height as usize).enumerate() {
            for (x, pixel) in row[..unpadded_bytes_per_row as usize].chunks_exact(4).enumerate() {
                img.put_pixel(
                    x as u32,
                    y as u32,
                    image::Rgba([pixel[0], pixel[1], pixel[2], pixel[3]]),
                );
            }
        }

        drop(data);
        output_buffer.unmap();

        Ok(img)
    }

    /// Dimensions of the uploaded volume
    pub fn dims(&self) -> [u32; 3] {
        self.dims
    }
}

/// Limits for a volume device: defaults with the adapter's full buffer sizes
fn volume_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
    let supported = adapter.limits();
    wgpu::Limits {
        max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
        max_buffer_size: supported.max_buffer_size,
        ..wgpu::Limits::downlevel_defaults().using_resolution(supported)
    }
}

/// Initialize WGPU for headless rendering (no window)
pub async fn init_headless() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::Adapter(e.to_string()))?;

    tracing::info!("Using GPU adapter: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Volmarch Device"),
            required_features: wgpu::Features::empty(),
            required_limits: volume_limits(&adapter),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| RenderError::Device(e.to_string()))?;

    Ok((Arc::new(device), Arc::new(queue)))
}

/// Blocking wrapper around [`init_headless`]
pub fn init_headless_blocking() -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    pollster::block_on(init_headless())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raymarch::{GRADIENT_DELTA, MAX_STEPS, REFINE_STEPS};

    #[test]
    fn uniforms_match_wgsl_size() {
        assert_eq!(std::mem::size_of::<VolumeUniforms>(), 224);
        assert_eq!(std::mem::size_of::<LightingUniforms>(), 48);
    }

    #[test]
    fn shader_shares_marcher_constants() {
        for line in [
            format!("const MAX_STEPS: u32 = {}u;", MAX_STEPS),
            format!("const REFINE_STEPS: u32 = {}u;", REFINE_STEPS),
            format!("const GRADIENT_DELTA: f32 = {:?};", GRADIENT_DELTA),
        ] {
            assert!(SHADER_SOURCE.contains(&line), "shader is missing `{}`", line);
        }
    }

    #[test]
    fn uniforms_encode_projection_and_mode() {
        let camera = Camera::default().with_projection(Projection::Orthographic { height: 4.0 });
        let colormap = Colormap::new("two", vec![glam::Vec3::ZERO, glam::Vec3::ONE]);
        let params = RenderParams::default()
            .with_mode(RenderMode::Mip)
            .with_opacity(0.3);
        let u = VolumeUniforms::new(
            &camera,
            Mat4::IDENTITY,
            [4, 4, 4],
            &colormap,
            &params,
            &RenderSettings::default(),
            [64.0, 32.0],
        );
        assert_eq!(u.projection_kind, 1.0);
        assert_eq!(u.ortho_half_height, 2.0);
        assert_eq!(u.mode, 0);
        assert_eq!(u.opacity, 0.3);
        assert_eq!(u.colormap_len, 2);
        assert_eq!(u.lighting.headlight, 1.0);
    }
}
