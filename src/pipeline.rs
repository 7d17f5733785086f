//! GPU rendering pipeline for hardware surface plots.
//!
//! iced keeps a single [`Pipeline`] per primitive type, so every plot on screen
//! shares it. Buffers, textures and bind groups are kept per plot, keyed by the
//! id the primitive carries.

use crate::gpu_types::{
    LABEL_QUAD, LABEL_QUAD_INDICES, LabelUniforms, LabelVertex, LineVertex, SceneUniforms,
    SurfaceVertex,
};
use crate::hardware::Scene;
use crate::label::LabelBitmap;

use iced::Rectangle;
use iced::wgpu;
use std::collections::HashMap;
use std::sync::Mutex;

pub const SURFACE_SHADER: &str = include_str!("shaders/surface.wgsl");

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const LABEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// A dynamically resizable GPU buffer.
pub struct DynamicBuffer {
    pub buffer: wgpu::Buffer,
    capacity: u64,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl DynamicBuffer {
    pub fn new(
        device: &wgpu::Device,
        label: &'static str,
        initial_capacity: u64,
        usage: wgpu::BufferUsages,
    ) -> Self {
        let usage = usage | wgpu::BufferUsages::COPY_DST;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: initial_capacity,
            usage,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            capacity: initial_capacity,
            usage,
            label,
        }
    }

    /// Ensure the buffer can hold at least `size` bytes, recreating if needed.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, size: u64) {
        if size > self.capacity {
            // Grow by 50% or to required size, whichever is larger
            let new_capacity = (self.capacity * 3 / 2).max(size);
            self.buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: new_capacity,
                usage: self.usage,
                mapped_at_creation: false,
            });
            self.capacity = new_capacity;
        }
    }

    /// Grow if needed, then upload `data` at offset zero.
    pub fn write(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        // write_buffer needs a 4-byte multiple
        let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        self.ensure_capacity(device, padded);
        if padded == data.len() as u64 {
            queue.write_buffer(&self.buffer, 0, data);
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded as usize, 0);
            queue.write_buffer(&self.buffer, 0, &bytes);
        }
    }
}

/// Ids of plots whose GPU resources can be dropped.
///
/// Plots are torn down outside the render loop, so they post their id here and
/// the pipeline evicts the matching entries the next time it prepares a frame.
#[derive(Debug, Default)]
pub struct ReleaseQueue {
    ids: Mutex<Vec<u64>>,
}

/// Queue shared by every plot and the pipeline.
pub static RELEASED_PLOTS: ReleaseQueue = ReleaseQueue::new();

impl ReleaseQueue {
    pub const fn new() -> Self {
        Self {
            ids: Mutex::new(Vec::new()),
        }
    }

    pub fn release(&self, id: u64) {
        if let Ok(mut ids) = self.ids.lock()
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.ids.lock().is_ok_and(|ids| ids.contains(&id))
    }

    /// Remove every released id from `plots`. Returns how many entries went.
    pub fn evict<T>(&self, plots: &mut HashMap<u64, T>) -> usize {
        let Ok(mut ids) = self.ids.lock() else {
            return 0;
        };
        ids.drain(..)
            .filter(|id| plots.remove(id).is_some())
            .count()
    }
}

struct DepthTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

struct LabelResources {
    _texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// GPU state of a single plot.
struct PlotResources {
    generation: u64,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    surface_vertices: DynamicBuffer,
    surface_indices: DynamicBuffer,
    index_count: u32,
    axes_vertices: DynamicBuffer,
    axes_vertex_count: u32,
    labels: Vec<LabelResources>,
    /// Widget bounds in physical pixels: x, y, width, height
    viewport: [f32; 4],
}

/// The GPU rendering pipeline for surface plots.
pub struct Pipeline {
    surface_pipeline: wgpu::RenderPipeline,
    axes_pipeline: wgpu::RenderPipeline,
    label_pipeline: wgpu::RenderPipeline,
    scene_layout: wgpu::BindGroupLayout,
    label_layout: wgpu::BindGroupLayout,
    label_sampler: wgpu::Sampler,
    label_quad: wgpu::Buffer,
    label_quad_indices: wgpu::Buffer,
    depth: Option<DepthTarget>,
    plots: HashMap<u64, PlotResources>,
    compile_error: Option<String>,
}

impl Pipeline {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("surface_plot_shader"),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(SURFACE_SHADER)),
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("surface_plot_scene_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let label_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("surface_plot_label_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let scene_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("surface_plot_scene_pipeline_layout"),
            bind_group_layouts: &[&scene_layout],
            push_constant_ranges: &[],
        });

        let label_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("surface_plot_label_pipeline_layout"),
            bind_group_layouts: &[&scene_layout, &label_layout],
            push_constant_ranges: &[],
        });

        let surface_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SurfaceVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x4],
        };

        let line_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4],
        };

        let label_vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LabelVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
        };

        // Blend state for transparency
        let blend_state = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let depth_tested = wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        // Labels are blended over whatever is already drawn
        let depth_ignored = wgpu::DepthStencilState {
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            ..depth_tested.clone()
        };

        let create_pipeline = |label: &'static str,
                               layout: &wgpu::PipelineLayout,
                               entry: (&'static str, &'static str),
                               buffer: wgpu::VertexBufferLayout<'_>,
                               topology: wgpu::PrimitiveTopology,
                               depth: wgpu::DepthStencilState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(entry.0),
                    buffers: &[buffer],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology,
                    ..Default::default()
                },
                depth_stencil: Some(depth),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry.1),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend_state),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
        };

        let surface_pipeline = create_pipeline(
            "surface_pipeline",
            &scene_pipeline_layout,
            ("vs_surface", "fs_surface"),
            surface_layout,
            wgpu::PrimitiveTopology::TriangleList,
            depth_tested.clone(),
        );

        let axes_pipeline = create_pipeline(
            "axes_pipeline",
            &scene_pipeline_layout,
            ("vs_line", "fs_line"),
            line_layout,
            wgpu::PrimitiveTopology::LineList,
            depth_tested,
        );

        let label_pipeline = create_pipeline(
            "label_pipeline",
            &label_pipeline_layout,
            ("vs_label", "fs_label"),
            label_vertex_layout,
            wgpu::PrimitiveTopology::TriangleList,
            depth_ignored,
        );

        let label_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("label_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let label_quad = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("label_quad"),
            size: std::mem::size_of_val(&LABEL_QUAD) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&label_quad, 0, bytemuck::cast_slice(&LABEL_QUAD));

        let label_quad_indices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("label_quad_indices"),
            size: std::mem::size_of_val(&LABEL_QUAD_INDICES) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &label_quad_indices,
            0,
            bytemuck::cast_slice(&LABEL_QUAD_INDICES),
        );

        let compile_error = pollster::block_on(device.pop_error_scope()).map(|err| err.to_string());
        if let Some(err) = &compile_error {
            tracing::error!(%err, "surface plot pipeline failed validation");
        }

        Self {
            surface_pipeline,
            axes_pipeline,
            label_pipeline,
            scene_layout,
            label_layout,
            label_sampler,
            label_quad,
            label_quad_indices,
            depth: None,
            plots: HashMap::new(),
            compile_error,
        }
    }

    /// Validation error raised while the pipelines were built, if any.
    pub fn compile_error(&self) -> Option<&str> {
        self.compile_error.as_deref()
    }

    /// Drop the GPU resources of plots that were cleaned up.
    pub fn evict_released(&mut self) {
        let evicted = RELEASED_PLOTS.evict(&mut self.plots);
        if evicted > 0 {
            tracing::debug!(evicted, live = self.plots.len(), "released plot resources");
        }
    }

    /// Keep a depth buffer matching the render target size.
    pub fn ensure_depth(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if self.depth.as_ref().is_some_and(|depth| depth.size == size) {
            return;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("surface_plot_depth"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
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
        self.depth = Some(DepthTarget { view, size });
    }

    /// Upload everything plot `id` needs for this frame. Mesh data and label
    /// textures are only re-uploaded when the scene generation changed.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: u64,
        scene: &Scene,
        uniforms: &SceneUniforms,
        label_uniforms: &[LabelUniforms],
        viewport: [f32; 4],
    ) {
        let scene_layout = &self.scene_layout;
        let plot = self
            .plots
            .entry(id)
            .or_insert_with(|| PlotResources::new(device, scene_layout));

        queue.write_buffer(&plot.scene_buffer, 0, bytemuck::bytes_of(uniforms));
        plot.viewport = viewport;

        if plot.generation != scene.generation {
            plot.surface_vertices
                .write(device, queue, bytemuck::cast_slice(&scene.mesh.vertices));
            plot.surface_indices
                .write(device, queue, bytemuck::cast_slice(&scene.mesh.indices));
            plot.index_count = scene.mesh.indices.len() as u32;

            plot.axes_vertices
                .write(device, queue, bytemuck::cast_slice(&scene.axes.vertices));
            plot.axes_vertex_count = scene.axes.vertices.len() as u32;

            plot.labels = scene
                .labels
                .iter()
                .map(|label| {
                    upload_label(
                        device,
                        queue,
                        &self.label_layout,
                        &self.label_sampler,
                        &label.bitmap,
                    )
                })
                .collect();
            plot.generation = scene.generation;
        }

        for (label, uniforms) in plot.labels.iter().zip(label_uniforms) {
            queue.write_buffer(&label.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
        }
    }

    /// Draw plot `id` into `target`: axes, then labels, then the lit surface.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        id: u64,
        clip_bounds: &Rectangle<u32>,
    ) {
        let (Some(plot), Some(depth)) = (self.plots.get(&id), &self.depth) else {
            return;
        };
        if clip_bounds.width == 0 || clip_bounds.height == 0 {
            return;
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("surface_plot_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let [x, y, width, height] = plot.viewport;
        pass.set_viewport(x, y, width.max(1.0), height.max(1.0), 0.0, 1.0);
        pass.set_scissor_rect(
            clip_bounds.x,
            clip_bounds.y,
            clip_bounds.width,
            clip_bounds.height,
        );
        pass.set_bind_group(0, &plot.scene_bind_group, &[]);

        if plot.axes_vertex_count > 0 {
            pass.set_pipeline(&self.axes_pipeline);
            pass.set_vertex_buffer(0, plot.axes_vertices.buffer.slice(..));
            pass.draw(0..plot.axes_vertex_count, 0..1);
        }

        if !plot.labels.is_empty() {
            pass.set_pipeline(&self.label_pipeline);
            pass.set_vertex_buffer(0, self.label_quad.slice(..));
            pass.set_index_buffer(self.label_quad_indices.slice(..), wgpu::IndexFormat::Uint16);
            for label in &plot.labels {
                pass.set_bind_group(1, &label.bind_group, &[]);
                pass.draw_indexed(0..LABEL_QUAD_INDICES.len() as u32, 0, 0..1);
            }
        }

        if plot.index_count > 0 {
            pass.set_pipeline(&self.surface_pipeline);
            pass.set_vertex_buffer(0, plot.surface_vertices.buffer.slice(..));
            pass.set_index_buffer(plot.surface_indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..plot.index_count, 0, 0..1);
        }
    }
}

impl PlotResources {
    fn new(device: &wgpu::Device, scene_layout: &wgpu::BindGroupLayout) -> Self {
        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("surface_plot_scene_uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("surface_plot_scene_bind_group"),
            layout: scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        Self {
            generation: 0,
            scene_buffer,
            scene_bind_group,
            surface_vertices: DynamicBuffer::new(
                device,
                "surface_vertices",
                1024 * std::mem::size_of::<SurfaceVertex>() as u64,
                wgpu::BufferUsages::VERTEX,
            ),
            surface_indices: DynamicBuffer::new(
                device,
                "surface_indices",
                6 * 1024 * std::mem::size_of::<u32>() as u64,
                wgpu::BufferUsages::INDEX,
            ),
            index_count: 0,
            axes_vertices: DynamicBuffer::new(
                device,
                "axes_vertices",
                256 * std::mem::size_of::<LineVertex>() as u64,
                wgpu::BufferUsages::VERTEX,
            ),
            axes_vertex_count: 0,
            labels: Vec::new(),
            viewport: [0.0; 4],
        }
    }
}

fn upload_label(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    bitmap: &LabelBitmap,
) -> LabelResources {
    let extent = wgpu::Extent3d {
        width: bitmap.size,
        height: bitmap.size,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("label_texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: LABEL_FORMAT,
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
        &bitmap.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * bitmap.size),
            rows_per_image: Some(bitmap.size),
        },
        extent,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("label_uniforms"),
        size: std::mem::size_of::<LabelUniforms>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("label_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });

    LabelResources {
        _texture: texture,
        uniform_buffer,
        bind_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_drops_released_entries() {
        let queue = ReleaseQueue::new();
        let mut plots: HashMap<u64, &str> = [(1, "a"), (2, "b"), (3, "c")].into();

        queue.release(2);
        queue.release(2);
        queue.release(9);
        assert!(queue.is_pending(2));

        assert_eq!(queue.evict(&mut plots), 1);
        assert_eq!(plots.len(), 2);
        assert!(!plots.contains_key(&2));
        assert!(!queue.is_pending(2));
        assert!(!queue.is_pending(9));

        // nothing left to evict
        assert_eq!(queue.evict(&mut plots), 0);
    }
}
