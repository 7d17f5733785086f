//! Painter's-algorithm renderer.
//!
//! Every redraw rebuilds the affine transform from the current angles and
//! scale, projects every sample, sorts quads and axis lines back to front and
//! records the result as a [`DrawCommand`] list. Painting the list onto an
//! iced canvas happens in [`crate::canvas`].

use crate::colormap::{ColorGradient, Rgb};
use crate::error::Result;
use crate::geometry::{
    Axis, AxisSegment, Quad, build_axes, build_points, build_quads, title_anchor,
};
use crate::grid::SampleGrid;
use crate::hover::{Tooltip, tooltip_at};
use crate::interaction::{
    Angles, DEFAULT_SCALE, DragDelta, DragMode, DragState, clamp_scale, drag_angles, drag_scale,
};
use crate::label::AxisTitles;
use crate::math::{AffineTransform, Point3D};

use glam::{DVec2, DVec3};

/// Height of the camera above the screen plane, on the viewer's side.
pub const CAMERA_DISTANCE: f64 = 1000.0;
pub const AXIS_LINE_COLOUR: Rgb = Rgb::new(0x88, 0x88, 0x88);
pub const SAMPLE_DOT_COLOUR: Rgb = Rgb::new(0xff, 0x22, 0x22);
pub const SAMPLE_DOT_RADIUS: f32 = 1.0;

// ================================================================================
// Settings & draw list
// ================================================================================

/// Appearance and behaviour of a software plot.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareSettings {
    pub background: Rgb,
    pub axis_text_colour: Rgb,
    pub titles: AxisTitles,
    pub fill_polygons: bool,
    pub render_points: bool,
    pub hide_flat_min_polygons: bool,
    pub global_z_scale: bool,
    /// Tooltip text per sample, row-major. `None` disables tooltips.
    pub tooltips: Option<Vec<String>>,
    /// Fixed screen position of the plot centre
    pub origin: Option<DVec2>,
    /// Shift of the default centre inside the widget
    pub offset: DVec2,
    pub start_angles: Angles,
    /// Height of the z title along the z axis
    pub z_axis_text_position: f64,
}

impl Default for SoftwareSettings {
    fn default() -> Self {
        Self {
            background: Rgb::WHITE,
            axis_text_colour: Rgb::BLACK,
            titles: AxisTitles::default(),
            fill_polygons: true,
            render_points: false,
            hide_flat_min_polygons: false,
            global_z_scale: true,
            tooltips: None,
            origin: None,
            offset: DVec2::ZERO,
            start_angles: Angles::default(),
            z_axis_text_position: 0.5,
        }
    }
}

/// One primitive of a software frame, in screen pixels relative to the widget.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Background(Rgb),
    Polygon {
        corners: [DVec2; 4],
        colour: Rgb,
        /// Filled and stroked in `colour`, or only outlined in the axis colour
        filled: bool,
        distance: f64,
    },
    AxisLine {
        axis: Axis,
        from: DVec2,
        to: DVec2,
        distance: f64,
    },
    SampleDot {
        centre: DVec2,
    },
    Text {
        text: String,
        position: DVec2,
        colour: Rgb,
    },
}

impl DrawCommand {
    /// Camera distance of a sorted item, `None` for overlays.
    pub fn distance(&self) -> Option<f64> {
        match self {
            DrawCommand::Polygon { distance, .. } | DrawCommand::AxisLine { distance, .. } => {
                Some(*distance)
            }
            _ => None,
        }
    }
}

/// Lifecycle of a software renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Waiting for the widget size
    Uninitialized,
    /// Sized and idle
    Ready,
    /// A rotate or scale drag is in progress
    Rendering(DragMode),
    Disposed,
}

enum Painted {
    Quad(Quad),
    Axis(AxisSegment),
}

impl Painted {
    fn distance(&self) -> f64 {
        match self {
            Painted::Quad(quad) => quad.distance,
            Painted::Axis(axis) => axis.distance,
        }
    }
}

/// Which axis titles are drawn: x when the x axis is nearer the viewer than
/// the y axis, y in the opposite case, z when the x axis is farther than z.
pub fn title_visibility(axes: &[AxisSegment; 3]) -> [bool; 3] {
    let [x, y, z] = axes;
    [
        x.distance < y.distance,
        x.distance > y.distance,
        x.distance > z.distance,
    ]
}

// ================================================================================
// Renderer
// ================================================================================

struct SceneData {
    grid: SampleGrid,
    points: Vec<Point3D>,
    gradient: ColorGradient,
    min_z: f64,
    commands: Vec<DrawCommand>,
    transform: AffineTransform,
}

pub struct SoftwareRenderer {
    data: Option<SceneData>,
    settings: SoftwareSettings,
    size: Option<DVec2>,
    angles: Angles,
    scale: f64,
    reference_angles: Angles,
    reference_scale: f64,
    drag: DragState,
    tooltip: Option<Tooltip>,
    redraws: u64,
}

impl std::fmt::Debug for SoftwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareRenderer")
            .field("state", &self.state())
            .field("angles", &self.angles)
            .field("scale", &self.scale)
            .field("redraws", &self.redraws)
            .finish()
    }
}

impl SoftwareRenderer {
    /// Prepare `grid` for drawing. Samples are rescaled into the unit cube
    /// when `global_z_scale` is set, and the gradient spans the prepared range.
    pub fn new(grid: &SampleGrid, stops: Vec<Rgb>, settings: SoftwareSettings) -> Result<Self> {
        let grid = if settings.global_z_scale {
            grid.normalised().0
        } else {
            grid.clone()
        };
        let (min_z, max_z) = grid.min_max();
        let gradient = ColorGradient::new(min_z, max_z, stops)?;
        let points = build_points(&grid, false);

        tracing::debug!(
            rows = grid.rows(),
            cols = grid.cols(),
            min_z,
            max_z,
            "software renderer ready"
        );

        Ok(Self {
            data: Some(SceneData {
                grid,
                points,
                gradient,
                min_z,
                commands: Vec::new(),
                transform: AffineTransform::identity(),
            }),
            angles: settings.start_angles,
            reference_angles: settings.start_angles,
            scale: DEFAULT_SCALE,
            reference_scale: DEFAULT_SCALE,
            settings,
            size: None,
            drag: DragState::default(),
            tooltip: None,
            redraws: 0,
        })
    }

    pub fn state(&self) -> RenderState {
        match &self.data {
            None => RenderState::Disposed,
            Some(_) if self.size.is_none() => RenderState::Uninitialized,
            Some(_) if !self.drag.is_dragging() => RenderState::Ready,
            Some(_) => RenderState::Rendering(self.drag.mode()),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.data.is_none()
    }

    pub fn settings(&self) -> &SoftwareSettings {
        &self.settings
    }

    pub fn angles(&self) -> Angles {
        self.angles
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn redraw_count(&self) -> u64 {
        self.redraws
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag.mode()
    }

    /// Replace the view angles and scale. Takes effect on the next redraw.
    pub fn set_view(&mut self, angles: Angles, scale: f64) {
        self.angles = angles;
        self.scale = clamp_scale(scale);
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    /// The grid as drawn, after any z rescaling.
    pub fn grid(&self) -> Option<&SampleGrid> {
        self.data.as_ref().map(|data| &data.grid)
    }

    pub fn points(&self) -> &[Point3D] {
        self.data.as_ref().map_or(&[], |data| &data.points)
    }

    /// Commands of the last redraw, empty before the first one and after disposal.
    pub fn draw_list(&self) -> &[DrawCommand] {
        self.data.as_ref().map_or(&[], |data| &data.commands)
    }

    pub fn transform(&self) -> Option<AffineTransform> {
        self.data.as_ref().map(|data| data.transform)
    }

    /// Screen position the surface is centred on.
    pub fn centre(&self) -> Option<DVec2> {
        let size = self.size?;
        Some(
            self.settings
                .origin
                .unwrap_or(size / 2.0 + self.settings.offset),
        )
    }

    pub fn camera_position(&self) -> Option<DVec3> {
        self.centre().map(|c| c.extend(CAMERA_DISTANCE))
    }

    /// Record the widget size, redrawing when it changed. Returns whether it did.
    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        let size = DVec2::new(width, height);
        if self.is_disposed() || self.size == Some(size) {
            return false;
        }
        self.size = Some(size);
        self.redraw();
        true
    }

    /// Rebuild the draw list from the current angles and scale.
    pub fn redraw(&mut self) {
        let (Some(centre), Some(camera)) = (self.centre(), self.camera_position()) else {
            return;
        };
        let Some(data) = self.data.as_mut() else {
            return;
        };
        let settings = &self.settings;

        let transform = AffineTransform::identity()
            .rotated(self.angles.x, 0.0, self.angles.z)
            .scaled(self.scale)
            .translated(centre.x, centre.y, 0.0);

        for point in &mut data.points {
            point.apply(&transform);
        }

        let hide_flat_min = settings.hide_flat_min_polygons.then_some(data.min_z);
        let quads = build_quads(
            &data.points,
            data.grid.rows(),
            data.grid.cols(),
            camera,
            hide_flat_min,
        );
        let axes = build_axes(&transform, camera);

        let mut painted: Vec<Painted> = quads
            .into_iter()
            .map(Painted::Quad)
            .chain(axes.iter().copied().map(Painted::Axis))
            .collect();
        // farthest first, nearest last
        painted.sort_by(|a, b| b.distance().total_cmp(&a.distance()));

        let mut commands = Vec::with_capacity(painted.len() + data.points.len() + 4);
        commands.push(DrawCommand::Background(settings.background));

        for item in painted {
            commands.push(match item {
                Painted::Quad(quad) => DrawCommand::Polygon {
                    corners: quad.corners.map(|c| c.truncate()),
                    colour: data.gradient.colour(quad.height),
                    filled: settings.fill_polygons,
                    distance: quad.distance,
                },
                Painted::Axis(axis) => DrawCommand::AxisLine {
                    axis: axis.axis,
                    from: axis.from.truncate(),
                    to: axis.to.truncate(),
                    distance: axis.distance,
                },
            });
        }

        if settings.render_points {
            commands.extend(data.points.iter().map(|p| DrawCommand::SampleDot {
                centre: p.screen(),
            }));
        }

        let titles = [
            (Axis::X, &settings.titles.x),
            (Axis::Y, &settings.titles.y),
            (Axis::Z, &settings.titles.z),
        ];
        for ((axis, title), visible) in titles.into_iter().zip(title_visibility(&axes)) {
            if !visible || title.is_empty() {
                continue;
            }
            let anchor = transform.transform_point(title_anchor(axis, settings.z_axis_text_position));
            commands.push(DrawCommand::Text {
                text: title.clone(),
                position: anchor.truncate(),
                colour: settings.axis_text_colour,
            });
        }

        data.commands = commands;
        data.transform = transform;
        self.redraws += 1;
    }

    /// Start a drag. Returns `false` once disposed.
    pub fn pointer_down(&mut self, position: DVec2, scale_mode: bool) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.reference_angles = self.angles;
        self.reference_scale = self.scale;
        self.drag.begin(position, scale_mode);
        self.tooltip = None;
        true
    }

    /// Rotate or scale while dragging, otherwise refresh the tooltip.
    pub fn pointer_moved(&mut self, position: DVec2) -> Option<DragDelta> {
        if self.is_disposed() {
            return None;
        }
        let Some(delta) = self.drag.update(position) else {
            self.update_tooltip(position);
            return None;
        };

        let down = self.drag.down_position();
        match self.drag.mode() {
            DragMode::Rotating => {
                self.angles = drag_angles(self.reference_angles, down, position);
            }
            DragMode::Scaling => {
                self.scale = drag_scale(self.reference_scale, down, position);
            }
            DragMode::Idle => {}
        }
        self.redraw();
        Some(delta)
    }

    pub fn pointer_up(&mut self) -> DragMode {
        self.drag.end()
    }

    pub fn pointer_left(&mut self) {
        self.tooltip = None;
    }

    /// Apply a rotation from a linked plot. Takes effect on the next redraw.
    pub fn rotate(&mut self, dx: f64, dy: f64) {
        if self.is_disposed() {
            return;
        }
        self.angles.z -= dx;
        self.angles.x -= dy;
    }

    /// Release the grid, points and draw list. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.data.take().is_some() {
            tracing::debug!(redraws = self.redraws, "software renderer disposed");
        }
        self.drag.end();
        self.tooltip = None;
    }

    fn update_tooltip(&mut self, cursor: DVec2) {
        self.tooltip = match (&self.settings.tooltips, &self.data) {
            (Some(texts), Some(data)) => tooltip_at(&data.points, cursor, texts),
            _ => None,
        };
    }
}
