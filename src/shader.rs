//! Hardware backend widget: event handling and the per-frame primitive.

use crate::error::PlotError;
use crate::gpu_types::{LabelUniforms, SceneUniforms};
use crate::hardware::Scene;
use crate::interaction::DragMode;
use crate::pipeline::Pipeline;
use crate::plotter::SurfacePlot;

use glam::DVec2;
use iced::keyboard;
use iced::mouse::Cursor;
use iced::wgpu;
use iced::widget::shader::{self, Viewport};
use iced::{Event, Rectangle, mouse, window};
use std::sync::{Arc, Mutex};

/// Where the render thread reports a pipeline failure for the plot to pick up.
pub type FaultSlot = Arc<Mutex<Option<PlotError>>>;

/// Widget state kept by iced between frames.
#[derive(Debug, Default)]
pub struct SurfaceState {
    pub modifiers: keyboard::Modifiers,
    pub drag_mode: DragMode,
}

// ================================================================================
// Primitive
// ================================================================================

/// Everything the pipeline needs to draw one plot for one frame.
#[derive(Debug)]
pub struct SurfacePrimitive {
    id: u64,
    scene: Option<Arc<Scene>>,
    uniforms: SceneUniforms,
    labels: Vec<LabelUniforms>,
    fault: FaultSlot,
}

impl SurfacePrimitive {
    pub fn new(plot: &SurfacePlot, bounds: Rectangle) -> Self {
        let aspect = if bounds.height > 0.0 {
            bounds.width / bounds.height
        } else {
            1.0
        };
        let frame = plot.with_hardware(|renderer| {
            (
                renderer.scene(),
                renderer.uniforms(aspect),
                renderer.label_uniforms(aspect),
            )
        });
        let (scene, uniforms, labels) = match frame {
            Some(frame) => frame,
            None => (None, bytemuck::Zeroable::zeroed(), Vec::new()),
        };

        Self {
            id: plot.id(),
            scene,
            uniforms,
            labels,
            fault: plot.fault_slot(),
        }
    }

    fn report(&self, err: PlotError) {
        if let Ok(mut slot) = self.fault.lock()
            && slot.is_none()
        {
            tracing::error!(%err, plot = self.id, "surface pipeline fault");
            *slot = Some(err);
        }
    }
}

impl shader::Primitive for SurfacePrimitive {
    type Pipeline = Pipeline;

    fn prepare(
        &self,
        pipeline: &mut Self::Pipeline,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bounds: &Rectangle,
        viewport: &Viewport,
    ) {
        pipeline.evict_released();
        if let Some(message) = pipeline.compile_error() {
            self.report(PlotError::ShaderCompilation(message.to_string()));
            return;
        }
        let Some(scene) = &self.scene else {
            return;
        };

        let target = viewport.physical_size();
        pipeline.ensure_depth(device, target.width, target.height);

        // Viewport in physical pixels, absolute in the render target
        let scale = viewport.scale_factor() as f32;
        let region = [
            bounds.x * scale,
            bounds.y * scale,
            bounds.width * scale,
            bounds.height * scale,
        ];
        pipeline.update(
            device,
            queue,
            self.id,
            scene,
            &self.uniforms,
            &self.labels,
            region,
        );
    }

    fn render(
        &self,
        pipeline: &Self::Pipeline,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        clip_bounds: &Rectangle<u32>,
    ) {
        if self.scene.is_none() || pipeline.compile_error().is_some() {
            return;
        }
        pipeline.render(encoder, target, self.id, clip_bounds);
    }
}

impl shader::Pipeline for Pipeline {
    fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        Pipeline::new(device, queue, format)
    }
}

// ================================================================================
// shader::Program implementation (event handling + drawing)
// ================================================================================

impl<Message> shader::Program<Message> for SurfacePlot {
    type State = SurfaceState;
    type Primitive = SurfacePrimitive;

    fn update(
        &self,
        state: &mut Self::State,
        event: &Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> Option<shader::Action<Message>> {
        match event {
            Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.modifiers = *modifiers;
                None
            }

            Event::Mouse(mouse::Event::ButtonPressed(
                button @ (mouse::Button::Left | mouse::Button::Right),
            )) => {
                let position = cursor.position_in(bounds)?;
                let scale_mode = *button == mouse::Button::Right || state.modifiers.shift();
                let position = DVec2::new(position.x.into(), position.y.into());
                if !self.pointer_down(position, scale_mode) {
                    return None;
                }
                state.drag_mode = if scale_mode {
                    DragMode::Scaling
                } else {
                    DragMode::Rotating
                };
                Some(shader::Action::capture())
            }

            Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                if state.drag_mode == DragMode::Idle {
                    return None;
                }
                // Dragging continues outside the widget
                let position = cursor.position()?;
                let local = DVec2::new(
                    f64::from(position.x - bounds.x),
                    f64::from(position.y - bounds.y),
                );
                self.pointer_moved(local)
                    .then(|| shader::Action::request_redraw().and_capture())
            }

            Event::Mouse(mouse::Event::ButtonReleased(
                mouse::Button::Left | mouse::Button::Right,
            )) => {
                if state.drag_mode == DragMode::Idle {
                    return None;
                }
                state.drag_mode = DragMode::Idle;
                self.pointer_up();
                Some(shader::Action::request_redraw().and_capture())
            }

            Event::Window(window::Event::RedrawRequested(_)) => self
                .on_animation_frame()
                .then(shader::Action::request_redraw),

            _ => None,
        }
    }

    fn draw(&self, _state: &Self::State, _cursor: Cursor, bounds: Rectangle) -> Self::Primitive {
        SurfacePrimitive::new(self, bounds)
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        match state.drag_mode {
            DragMode::Rotating => mouse::Interaction::Grabbing,
            DragMode::Scaling => mouse::Interaction::ResizingVertically,
            DragMode::Idle if cursor.is_over(bounds) => mouse::Interaction::Grab,
            DragMode::Idle => mouse::Interaction::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Backend, BackendPreference, Capability};
    use crate::grid::SampleGrid;
    use crate::plotter::SurfacePlotOptions;
    use iced::{Point, Size};

    fn bounds(width: f32, height: f32) -> Rectangle {
        Rectangle::new(Point::ORIGIN, Size::new(width, height))
    }

    fn hardware_plot() -> SurfacePlot {
        let grid = SampleGrid::new(3, 3, (0..9).map(f64::from).collect()).unwrap();
        let options = SurfacePlotOptions::builder()
            .backend(BackendPreference::Hardware)
            .build();
        let capability = Capability::Capable {
            adapter: "test".to_string(),
        };
        SurfacePlot::with_capability(grid, options, capability).unwrap()
    }

    #[test]
    fn test_primitive_carries_scene() {
        let plot = hardware_plot();
        assert_eq!(plot.backend(), Some(Backend::Hardware));

        let primitive = SurfacePrimitive::new(&plot, bounds(400.0, 200.0));
        assert!(primitive.scene.is_some());
        assert_eq!(primitive.id, plot.id());
        assert!(!primitive.labels.is_empty());
    }

    #[test]
    fn test_primitive_after_clean_up_is_empty() {
        let plot = hardware_plot();
        plot.clean_up();
        let primitive = SurfacePrimitive::new(&plot, bounds(400.0, 0.0));
        assert!(primitive.scene.is_none());
        assert!(primitive.labels.is_empty());
    }

    #[test]
    fn test_report_keeps_first_fault() {
        let plot = hardware_plot();
        let primitive = SurfacePrimitive::new(&plot, bounds(10.0, 10.0));
        primitive.report(PlotError::ShaderCompilation("first".to_string()));
        primitive.report(PlotError::ShaderCompilation("second".to_string()));

        assert!(plot.on_animation_frame());
        assert_eq!(
            plot.last_error(),
            Some(PlotError::ShaderCompilation("first".to_string()))
        );
    }
}
