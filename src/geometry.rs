//! Turns a [`SampleGrid`] into drawable geometry.
//!
//! The software path works on transformed [`Point3D`]s and produces [`Quad`]s
//! and [`AxisSegment`]s carrying their squared distance to the camera. The
//! hardware path produces an indexed [`SurfaceMesh`] in logical coordinates
//! plus the axis and gridline vertices.

use crate::colormap::ColorGradient;
use crate::gpu_types::{LineVertex, SurfaceVertex};
use crate::grid::SampleGrid;
use crate::math::{AffineTransform, Point3D, centroid, distance_sq, face_normal};

use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Half the extent of the unit cube the surface is drawn in.
pub const AXIS_EXTENT: f64 = 0.5;

// ================================================================================
// Points
// ================================================================================

/// One point per sample, row-major, at `x = -0.5 + i/(R-1)`,
/// `y = 0.5 - j/(C-1)` and `z = value(i, j)`.
///
/// With `flip_rows` the column index is mirrored, so `z = value(i, C-1-j)`.
pub fn build_points(grid: &SampleGrid, flip_rows: bool) -> Vec<Point3D> {
    let (rows, cols) = (grid.rows(), grid.cols());
    let x_step = 1.0 / (rows - 1) as f64;
    let y_step = 1.0 / (cols - 1) as f64;

    let mut points = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            let col = if flip_rows { cols - 1 - j } else { j };
            points.push(Point3D::new(
                -AXIS_EXTENT + i as f64 * x_step,
                AXIS_EXTENT - j as f64 * y_step,
                grid.value(i, col),
            ));
        }
    }
    points
}

/// Corner indices of the quad whose first corner is sample `(i, j)`:
/// `(i, j)`, `(i+1, j)`, `(i+1, j+1)`, `(i, j+1)`.
fn quad_corners(i: usize, j: usize, cols: usize) -> [usize; 4] {
    let p1 = j + i * cols;
    [p1, p1 + cols, p1 + cols + 1, p1 + 1]
}

// ================================================================================
// Software path
// ================================================================================

/// A grid cell after transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    /// Transformed corners in drawing order
    pub corners: [DVec3; 4],
    pub centroid: DVec3,
    /// Squared distance from the centroid to the camera
    pub distance: f64,
    /// Mean logical z of the corners, fed to the colour gradient
    pub height: f64,
    /// Grid position of the first corner
    pub cell: (usize, usize),
}

/// Build one quad per grid cell from already transformed points.
///
/// With `hide_flat_min`, cells whose four corners all sit at that value are
/// skipped so a flat base plane is not painted.
pub fn build_quads(
    points: &[Point3D],
    rows: usize,
    cols: usize,
    camera: DVec3,
    hide_flat_min: Option<f64>,
) -> Vec<Quad> {
    let mut quads = Vec::with_capacity((rows - 1) * (cols - 1));
    for i in 0..rows - 1 {
        for j in 0..cols - 1 {
            let corners = quad_corners(i, j, cols).map(|index| points[index]);

            if let Some(min) = hide_flat_min
                && corners.iter().all(|p| p.local.z == min)
            {
                continue;
            }

            let applied = corners.map(|p| p.applied);
            let Some(center) = centroid(&applied) else {
                continue;
            };
            quads.push(Quad {
                corners: applied,
                centroid: center,
                distance: distance_sq(center, camera),
                height: corners.iter().map(|p| p.local.z).sum::<f64>() / 4.0,
                cell: (i, j),
            });
        }
    }
    quads
}

/// The three plot axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A transformed axis line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSegment {
    pub axis: Axis,
    pub from: DVec3,
    pub to: DVec3,
    /// Squared distance from the midpoint to the camera
    pub distance: f64,
}

const AXIS_ORIGIN: DVec3 = DVec3::new(-AXIS_EXTENT, AXIS_EXTENT, 0.0);

fn axis_end(axis: Axis) -> DVec3 {
    match axis {
        Axis::X => DVec3::new(AXIS_EXTENT, AXIS_EXTENT, 0.0),
        Axis::Y => DVec3::new(-AXIS_EXTENT, -AXIS_EXTENT, 0.0),
        Axis::Z => DVec3::new(-AXIS_EXTENT, AXIS_EXTENT, 2.0 * AXIS_EXTENT),
    }
}

/// The x, y and z axes, all starting at the plot origin corner.
pub fn build_axes(transform: &AffineTransform, camera: DVec3) -> [AxisSegment; 3] {
    let from = transform.transform_point(AXIS_ORIGIN);
    [Axis::X, Axis::Y, Axis::Z].map(|axis| {
        let to = transform.transform_point(axis_end(axis));
        AxisSegment {
            axis,
            from,
            to,
            distance: distance_sq((from + to) / 2.0, camera),
        }
    })
}

/// Logical anchor of an axis title. `z_text_position` is the height of the z title.
pub fn title_anchor(axis: Axis, z_text_position: f64) -> DVec3 {
    match axis {
        Axis::X => DVec3::new(0.0, AXIS_EXTENT, 0.0),
        Axis::Y => DVec3::new(-AXIS_EXTENT, 0.0, 0.0),
        Axis::Z => DVec3::new(-AXIS_EXTENT, AXIS_EXTENT, z_text_position),
    }
}

// ================================================================================
// Hardware path
// ================================================================================

/// How triangle normals are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalMode {
    /// Normalised cross product of the two triangle edges.
    #[default]
    FaceCross,
    /// Normalised first edge, as older releases computed it. Lighting then
    /// depends on the edge direction rather than the face orientation.
    LegacyEdge,
}

/// Indexed triangle mesh with shared vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<SurfaceVertex>,
    pub indices: Vec<u32>,
    /// One normal per triangle, in index order
    pub triangle_normals: Vec<Vec3>,
}

impl SurfaceMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Build the lit surface mesh from logical points.
///
/// Every cell becomes triangles `(p1, p2, p3)` and `(p1, p3, p4)`. Vertex
/// normals are the normalised sum of the incident triangle normals.
pub fn build_mesh(
    points: &[Point3D],
    rows: usize,
    cols: usize,
    gradient: &ColorGradient,
    normal_mode: NormalMode,
) -> SurfaceMesh {
    let mut vertices: Vec<SurfaceVertex> = points
        .iter()
        .map(|p| {
            SurfaceVertex::new(
                p.local.as_vec3().to_array(),
                gradient.colour(p.local.z).to_array(),
            )
        })
        .collect();

    let quads = (rows - 1) * (cols - 1);
    let mut indices = Vec::with_capacity(quads * 6);
    let mut triangle_normals = Vec::with_capacity(quads * 2);
    let mut accumulated = vec![DVec3::ZERO; points.len()];

    for i in 0..rows - 1 {
        for j in 0..cols - 1 {
            let [p1, p2, p3, p4] = quad_corners(i, j, cols);
            for [a, b, c] in [[p1, p2, p3], [p1, p3, p4]] {
                let edge_ab = points[b].local - points[a].local;
                let edge_ac = points[c].local - points[a].local;
                let normal = match normal_mode {
                    NormalMode::FaceCross => face_normal(edge_ab, edge_ac),
                    NormalMode::LegacyEdge => edge_ab.normalize_or_zero(),
                };
                for index in [a, b, c] {
                    accumulated[index] += normal;
                }
                triangle_normals.push(normal.as_vec3());
                indices.extend([a as u32, b as u32, c as u32]);
            }
        }
    }

    for (vertex, normal) in vertices.iter_mut().zip(&accumulated) {
        vertex.normal = normal.normalize_or_zero().as_vec3().to_array();
    }

    SurfaceMesh {
        vertices,
        indices,
        triangle_normals,
    }
}

pub const MAJOR_AXIS_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const MINOR_AXIS_COLOR: [f32; 4] = [0.3, 0.3, 0.3, 1.0];

/// Line-list vertices for the major axes and the tick gridlines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxesMesh {
    pub vertices: Vec<LineVertex>,
}

/// Major axes along the front-bottom edges, plus minor gridlines every
/// `1/ticks` on the floor and back walls for each axis.
///
/// An axis with zero ticks gets no gridlines.
pub fn build_axes_mesh(x_ticks: usize, y_ticks: usize, z_ticks: usize) -> AxesMesh {
    let e = AXIS_EXTENT as f32;
    let mut vertices = Vec::new();
    let mut line = |from: [f32; 3], to: [f32; 3], color: [f32; 4]| {
        vertices.push(LineVertex::new(from, color));
        vertices.push(LineVertex::new(to, color));
    };

    line([-e, -e, 0.0], [e, -e, 0.0], MAJOR_AXIS_COLOR);
    line([e, -e, 0.0], [e, e, 0.0], MAJOR_AXIS_COLOR);
    line([-e, -e, 0.0], [-e, -e, 2.0 * e], MAJOR_AXIS_COLOR);

    for offset in tick_offsets(x_ticks) {
        let x = -e + offset;
        line([x, e, 0.0], [x, -e, 0.0], MINOR_AXIS_COLOR);
        line([x, e, 0.0], [x, e, 2.0 * e], MINOR_AXIS_COLOR);
    }
    for offset in tick_offsets(y_ticks) {
        let y = e - offset;
        line([-e, y, 0.0], [e, y, 0.0], MINOR_AXIS_COLOR);
        line([-e, y, 0.0], [-e, y, 2.0 * e], MINOR_AXIS_COLOR);
    }
    for offset in tick_offsets(z_ticks) {
        line([-e, e, offset], [-e, -e, offset], MINOR_AXIS_COLOR);
        line([-e, e, offset], [e, e, offset], MINOR_AXIS_COLOR);
    }

    AxesMesh { vertices }
}

/// Offsets `0, 1/ticks, ..., 1` along a unit axis.
pub fn tick_offsets(ticks: usize) -> impl Iterator<Item = f32> {
    let interval = if ticks == 0 { 0.0 } else { 1.0 / ticks as f32 };
    let count = if ticks == 0 { 0 } else { ticks + 1 };
    (0..count).map(move |k| k as f32 * interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(rows: usize, cols: usize) -> SampleGrid {
        SampleGrid::new(rows, cols, (0..rows * cols).map(|v| v as f64).collect()).unwrap()
    }

    #[test]
    fn test_points_span_unit_square() {
        let grid = ramp(3, 5);
        let points = build_points(&grid, false);
        assert_eq!(points.len(), 15);
        assert_eq!(points[0].local, DVec3::new(-0.5, 0.5, 0.0));
        assert_eq!(points[14].local, DVec3::new(0.5, -0.5, 14.0));
        assert_abs_diff_eq!(points[1].local.y, 0.25);
        assert_abs_diff_eq!(points[5].local.x, 0.0);
    }

    #[test]
    fn test_flip_rows_mirrors_columns() {
        let grid = ramp(2, 3);
        let points = build_points(&grid, true);
        // (0, 0) reads value(0, 2)
        assert_eq!(points[0].local.z, 2.0);
        assert_eq!(points[2].local.z, 0.0);
        assert_eq!(points[3].local.z, 5.0);
    }

    #[test]
    fn test_quad_count() {
        for (rows, cols) in [(2, 2), (5, 5), (3, 7)] {
            let points = build_points(&ramp(rows, cols), false);
            let quads = build_quads(&points, rows, cols, DVec3::ZERO, None);
            assert_eq!(quads.len(), (rows - 1) * (cols - 1));
        }
    }

    #[test]
    fn test_quad_height_is_mean_of_corners() {
        let points = build_points(&ramp(2, 2), false);
        let quads = build_quads(&points, 2, 2, DVec3::ZERO, None);
        // corners hold 0, 2, 3, 1
        assert_abs_diff_eq!(quads[0].height, 1.5);
    }

    #[test]
    fn test_hide_flat_min_skips_only_fully_flat_cells() {
        let grid = SampleGrid::new(3, 3, vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]).unwrap();
        let points = build_points(&grid, false);
        let quads = build_quads(&points, 3, 3, DVec3::ZERO, Some(0.0));
        // the two cells touching (1, 2) keep their geometry
        assert_eq!(quads.len(), 2);
        assert!(quads.iter().all(|q| q.height > 0.0));
    }

    #[test]
    fn test_axes_share_origin() {
        let axes = build_axes(&AffineTransform::identity(), DVec3::new(0.0, 0.0, 10.0));
        assert!(axes.iter().all(|a| a.from == AXIS_ORIGIN));
        assert_eq!(axes[2].to, DVec3::new(-0.5, 0.5, 1.0));
    }

    #[test]
    fn test_mesh_counts() {
        for (rows, cols) in [(2, 2), (4, 6)] {
            let grid = ramp(rows, cols);
            let points = build_points(&grid, true);
            let gradient = ColorGradient::with_default_stops(0.0, (rows * cols) as f64);
            let mesh = build_mesh(&points, rows, cols, &gradient, NormalMode::FaceCross);
            assert_eq!(mesh.vertices.len(), rows * cols);
            assert_eq!(mesh.triangle_count(), 2 * (rows - 1) * (cols - 1));
            assert_eq!(mesh.triangle_normals.len(), mesh.triangle_count());
            assert!(mesh.indices.iter().all(|&i| (i as usize) < rows * cols));
        }
    }

    #[test]
    fn test_face_normals_are_perpendicular_to_flat_surface() {
        let grid = SampleGrid::new(3, 3, vec![0.2; 9]).unwrap();
        let points = build_points(&grid, true);
        let gradient = ColorGradient::with_default_stops(0.0, 1.0);
        let mesh = build_mesh(&points, 3, 3, &gradient, NormalMode::FaceCross);
        for n in &mesh.triangle_normals {
            assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-6);
            assert_abs_diff_eq!(n.z.abs(), 1.0, epsilon = 1e-6);
        }
        for v in &mesh.vertices {
            assert_abs_diff_eq!(v.normal[2].abs(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_legacy_normals_follow_first_edge() {
        // On a flat surface the legacy normal lies in the surface plane,
        // so it has no z component at all.
        let grid = SampleGrid::new(2, 2, vec![0.0; 4]).unwrap();
        let points = build_points(&grid, false);
        let gradient = ColorGradient::with_default_stops(0.0, 1.0);
        let mesh = build_mesh(&points, 2, 2, &gradient, NormalMode::LegacyEdge);
        assert_eq!(mesh.triangle_normals[0], Vec3::X);
        let diagonal = mesh.triangle_normals[1];
        assert_abs_diff_eq!(diagonal.length(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(diagonal.z, 0.0);
    }

    #[test]
    fn test_mesh_colours_follow_gradient() {
        let grid = ramp(2, 2);
        let points = build_points(&grid, false);
        let gradient = ColorGradient::with_default_stops(0.0, 3.0);
        let mesh = build_mesh(&points, 2, 2, &gradient, NormalMode::FaceCross);
        assert_eq!(mesh.vertices[0].color, gradient.colour(0.0).to_array());
        assert_eq!(mesh.vertices[3].color, gradient.colour(3.0).to_array());
    }

    #[test]
    fn test_axes_mesh_line_counts() {
        let mesh = build_axes_mesh(4, 2, 10);
        // 3 major lines, 2 lines per tick position per axis
        let lines = 3 + 2 * (5 + 3 + 11);
        assert_eq!(mesh.vertices.len(), lines * 2);
        assert_eq!(mesh.vertices[0].color, MAJOR_AXIS_COLOR);
        assert_eq!(mesh.vertices[6].color, MINOR_AXIS_COLOR);

        let bare = build_axes_mesh(0, 0, 0);
        assert_eq!(bare.vertices.len(), 6);
    }

    #[test]
    fn test_tick_offsets_reach_far_edge() {
        let offsets: Vec<f32> = tick_offsets(4).collect();
        assert_eq!(offsets, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(tick_offsets(0).count(), 0);
    }
}
