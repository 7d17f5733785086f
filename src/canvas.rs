//! Software backend widget: paints the painter's-algorithm draw list.

use crate::colormap::Rgb;
use crate::hover::Tooltip;
use crate::interaction::DragMode;
use crate::plotter::SurfacePlot;
use crate::software::{AXIS_LINE_COLOUR, DrawCommand, SAMPLE_DOT_COLOUR, SAMPLE_DOT_RADIUS};

use glam::DVec2;
use iced::widget::canvas::{self, Frame, Path, Stroke};
use iced::{Color, Pixels, Point, Rectangle, Renderer, Size, Theme, keyboard, mouse, window};

pub const TEXT_SIZE: f32 = 12.0;
pub const TOOLTIP_PADDING: f32 = 4.0;
/// Offset of the tooltip box from the pointer
pub const TOOLTIP_OFFSET: f32 = 12.0;

#[derive(Debug, Default)]
pub struct CanvasState {
    pub modifiers: keyboard::Modifiers,
    pub drag_mode: DragMode,
}

fn point(position: DVec2) -> Point {
    Point::new(position.x as f32, position.y as f32)
}

fn paint(frame: &mut Frame, command: &DrawCommand) {
    match command {
        DrawCommand::Background(colour) => {
            let size = frame.size();
            frame.fill_rectangle(Point::ORIGIN, size, Color::from(*colour));
        }
        DrawCommand::Polygon {
            corners,
            colour,
            filled,
            ..
        } => {
            let path = Path::new(|builder| {
                builder.move_to(point(corners[0]));
                for corner in &corners[1..] {
                    builder.line_to(point(*corner));
                }
                builder.close();
            });
            if *filled {
                let colour = Color::from(*colour);
                frame.fill(&path, colour);
                frame.stroke(&path, Stroke::default().with_color(colour).with_width(1.0));
            } else {
                frame.stroke(
                    &path,
                    Stroke::default()
                        .with_color(AXIS_LINE_COLOUR.into())
                        .with_width(1.0),
                );
            }
        }
        DrawCommand::AxisLine { from, to, .. } => {
            frame.stroke(
                &Path::line(point(*from), point(*to)),
                Stroke::default()
                    .with_color(AXIS_LINE_COLOUR.into())
                    .with_width(1.0),
            );
        }
        DrawCommand::SampleDot { centre } => {
            frame.fill(
                &Path::circle(point(*centre), SAMPLE_DOT_RADIUS),
                Color::from(SAMPLE_DOT_COLOUR),
            );
        }
        DrawCommand::Text {
            text,
            position,
            colour,
        } => {
            frame.fill_text(canvas::Text {
                content: text.clone(),
                position: point(*position),
                color: (*colour).into(),
                size: Pixels(TEXT_SIZE),
                ..canvas::Text::default()
            });
        }
    }
}

/// Box with the tooltip text next to the pointer, kept inside the widget.
fn paint_tooltip(frame: &mut Frame, tooltip: &Tooltip, colour: Rgb, background: Rgb) {
    let width = tooltip.text.chars().count() as f32 * TEXT_SIZE * 0.6 + 2.0 * TOOLTIP_PADDING;
    let height = TEXT_SIZE + 2.0 * TOOLTIP_PADDING;
    let bounds = frame.size();

    let mut origin = Point::new(
        tooltip.anchor.x as f32 + TOOLTIP_OFFSET,
        tooltip.anchor.y as f32 + TOOLTIP_OFFSET,
    );
    if origin.x + width > bounds.width {
        origin.x = (tooltip.anchor.x as f32 - TOOLTIP_OFFSET - width).max(0.0);
    }
    if origin.y + height > bounds.height {
        origin.y = (tooltip.anchor.y as f32 - TOOLTIP_OFFSET - height).max(0.0);
    }

    let rectangle = Path::rectangle(origin, Size::new(width, height));
    frame.fill(&rectangle, Color::from(background));
    frame.stroke(
        &rectangle,
        Stroke::default().with_color(colour.into()).with_width(1.0),
    );
    frame.fill_text(canvas::Text {
        content: tooltip.text.clone(),
        position: Point::new(origin.x + TOOLTIP_PADDING, origin.y + TOOLTIP_PADDING),
        color: colour.into(),
        size: Pixels(TEXT_SIZE),
        ..canvas::Text::default()
    });
}

impl<Message> canvas::Program<Message> for SurfacePlot {
    type State = CanvasState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        self.resize(bounds.width.into(), bounds.height.into());

        let mut frame = Frame::new(renderer, bounds.size());
        let (tooltip_colour, background) = {
            let options = self.options();
            (options.tooltip_colour, options.background)
        };
        self.with_software(|chart| {
            for command in chart.draw_list() {
                paint(&mut frame, command);
            }
            if let Some(tooltip) = chart.tooltip() {
                paint_tooltip(&mut frame, tooltip, tooltip_colour, background);
            }
        });

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: &iced::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> Option<canvas::Action<Message>> {
        match event {
            iced::Event::Keyboard(keyboard::Event::ModifiersChanged(modifiers)) => {
                state.modifiers = *modifiers;
                None
            }

            iced::Event::Mouse(mouse::Event::ButtonPressed(
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
                Some(canvas::Action::request_redraw().and_capture())
            }

            iced::Event::Mouse(mouse::Event::CursorMoved { .. }) => {
                let position = match state.drag_mode {
                    DragMode::Idle => cursor.position_in(bounds)?,
                    _ => {
                        let absolute = cursor.position()?;
                        Point::new(absolute.x - bounds.x, absolute.y - bounds.y)
                    }
                };
                let position = DVec2::new(position.x.into(), position.y.into());
                let changed = self.pointer_moved(position);
                match (changed, state.drag_mode) {
                    (false, _) => None,
                    (true, DragMode::Idle) => Some(canvas::Action::request_redraw()),
                    (true, _) => Some(canvas::Action::request_redraw().and_capture()),
                }
            }

            iced::Event::Mouse(mouse::Event::ButtonReleased(
                mouse::Button::Left | mouse::Button::Right,
            )) => {
                if state.drag_mode == DragMode::Idle {
                    return None;
                }
                state.drag_mode = DragMode::Idle;
                self.pointer_up();
                Some(canvas::Action::request_redraw().and_capture())
            }

            iced::Event::Mouse(mouse::Event::CursorLeft) => self
                .pointer_left()
                .then(canvas::Action::request_redraw),

            iced::Event::Window(window::Event::RedrawRequested(_)) => self
                .on_animation_frame()
                .then(canvas::Action::request_redraw),

            _ => None,
        }
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        match state.drag_mode {
            DragMode::Rotating => mouse::Interaction::Grabbing,
            DragMode::Scaling => mouse::Interaction::ResizingVertically,
            DragMode::Idle if cursor.is_over(bounds) => mouse::Interaction::Grab,
            DragMode::Idle => mouse::Interaction::default(),
        }
    }
}
