//! CPU side of the hardware renderer.
//!
//! [`HardwareRenderer`] owns the rotation matrix and a [`Scene`] of mesh data
//! and label bitmaps. The scene is shared with the GPU primitive through an
//! `Arc`, and its generation number tells the pipeline when to re-upload.

use crate::colormap::{ColorGradient, Rgb};
use crate::error::Result;
use crate::geometry::{
    AxesMesh, NormalMode, SurfaceMesh, build_axes_mesh, build_mesh, build_points,
};
use crate::gpu_types::{LabelUniforms, SceneUniforms};
use crate::grid::SampleGrid;
use crate::interaction::{
    DragDelta, DragMode, DragState, drag_rotation, drag_zoom, initial_rotation,
};
use crate::label::{
    AxisTitles, LabelBitmap, LabelPlacement, LabelRasterizer, axis_labels,
};
use crate::ticks::{AxisTicks, index_labels, z_axis_labels};

use glam::{DVec2, Mat4, Vec3};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const FIELD_OF_VIEW_DEG: f32 = 5.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
/// Eye offset applied after the plot rotation.
pub const EYE_TRANSLATION: Vec3 = Vec3::new(0.0, -0.3, -19.0);

pub const AMBIENT_LIGHT: f32 = 0.2;
pub const DIRECTIONAL_LIGHT: f32 = 0.8;
pub const LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, 0.0, -1.0);

// Scene generations are unique across all renderers in the process.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Appearance of a hardware plot.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareSettings {
    /// Divide z by the nice maximum and label the z axis to match
    pub auto_z_scale: bool,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub z_labels: Vec<String>,
    pub titles: AxisTitles,
    pub axis_text_colour: Rgb,
    pub normal_mode: NormalMode,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            auto_z_scale: true,
            x_labels: Vec::new(),
            y_labels: Vec::new(),
            z_labels: Vec::new(),
            titles: AxisTitles::default(),
            axis_text_colour: Rgb::BLACK,
            normal_mode: NormalMode::default(),
        }
    }
}

/// A label ready to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLabel {
    pub placement: LabelPlacement,
    pub bitmap: LabelBitmap,
}

/// Everything the GPU needs that only changes on redraw.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub mesh: SurfaceMesh,
    pub axes: AxesMesh,
    pub labels: Vec<SceneLabel>,
    pub generation: u64,
}

struct PreparedData {
    grid: SampleGrid,
    gradient: ColorGradient,
    ticks: AxisTicks,
}

pub struct HardwareRenderer {
    data: Option<PreparedData>,
    scene: Option<Arc<Scene>>,
    settings: HardwareSettings,
    rasterizer: LabelRasterizer,
    rotation: Mat4,
    down_rotation: Mat4,
    drag: DragState,
    frames: u64,
}

impl std::fmt::Debug for HardwareRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareRenderer")
            .field("generation", &self.generation())
            .field("frames", &self.frames)
            .field("drag", &self.drag.mode())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl HardwareRenderer {
    pub fn new(
        grid: &SampleGrid,
        stops: Vec<Rgb>,
        settings: HardwareSettings,
        rasterizer: LabelRasterizer,
    ) -> Result<Self> {
        let (grid, nice_max) = if settings.auto_z_scale {
            grid.normalised()
        } else {
            (grid.clone(), None)
        };

        let ticks = AxisTicks {
            x: labels_or(&settings.x_labels, || index_labels(grid.rows())),
            y: labels_or(&settings.y_labels, || index_labels(grid.cols())),
            z: match nice_max {
                Some(nice_max) => z_axis_labels(nice_max),
                None => labels_or(&settings.z_labels, || z_axis_labels(1.0)),
            },
        };

        let (min_z, max_z) = grid.min_max();
        let gradient = ColorGradient::new(min_z, max_z, stops)?;

        let mut renderer = Self {
            data: Some(PreparedData {
                grid,
                gradient,
                ticks,
            }),
            scene: None,
            settings,
            rasterizer,
            rotation: initial_rotation(),
            down_rotation: initial_rotation(),
            drag: DragState::default(),
            frames: 0,
        };
        renderer.redraw();
        Ok(renderer)
    }

    pub fn is_disposed(&self) -> bool {
        self.data.is_none()
    }

    pub fn scene(&self) -> Option<Arc<Scene>> {
        self.scene.clone()
    }

    pub fn generation(&self) -> u64 {
        self.scene.as_ref().map_or(0, |scene| scene.generation)
    }

    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Mat4) {
        self.rotation = rotation;
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn drag_mode(&self) -> DragMode {
        self.drag.mode()
    }

    pub fn ticks(&self) -> Option<&AxisTicks> {
        self.data.as_ref().map(|data| &data.ticks)
    }

    /// The grid as drawn, after any z rescaling.
    pub fn grid(&self) -> Option<&SampleGrid> {
        self.data.as_ref().map(|data| &data.grid)
    }

    /// Rebuild the mesh, axes and label bitmaps.
    pub fn redraw(&mut self) {
        let Some(data) = &self.data else {
            return;
        };
        let (rows, cols) = (data.grid.rows(), data.grid.cols());
        let points = build_points(&data.grid, true);
        let mesh = build_mesh(&points, rows, cols, &data.gradient, self.settings.normal_mode);

        let ticks = &data.ticks;
        let axes = build_axes_mesh(ticks.x_ticks(), ticks.y_ticks(), ticks.z_ticks());
        let labels = axis_labels(ticks, &self.settings.titles)
            .into_iter()
            .map(|placement| {
                let bitmap = self.rasterizer.rasterize(
                    &placement.text,
                    placement.align(),
                    self.settings.axis_text_colour,
                );
                SceneLabel { placement, bitmap }
            })
            .collect();

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(
            generation,
            triangles = mesh.triangle_count(),
            "hardware scene rebuilt"
        );
        self.scene = Some(Arc::new(Scene {
            mesh,
            axes,
            labels,
            generation,
        }));
    }

    /// Model-view matrix: the plot rotation seen from the fixed eye position.
    pub fn model_view(&self) -> Mat4 {
        Mat4::from_translation(EYE_TRANSLATION) * self.rotation
    }

    pub fn projection(aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        Mat4::perspective_rh(FIELD_OF_VIEW_DEG.to_radians(), aspect, NEAR_PLANE, FAR_PLANE)
    }

    pub fn uniforms(&self, aspect: f32) -> SceneUniforms {
        let model_view = self.model_view();
        let normal_matrix = model_view.inverse().transpose();
        SceneUniforms {
            projection: Self::projection(aspect).to_cols_array_2d(),
            model_view: model_view.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            ambient: Vec3::splat(AMBIENT_LIGHT).extend(1.0).to_array(),
            directional: Vec3::splat(DIRECTIONAL_LIGHT).extend(1.0).to_array(),
            light_direction: LIGHT_DIRECTION.extend(0.0).to_array(),
        }
    }

    /// One transform per scene label, in scene order.
    pub fn label_uniforms(&self, aspect: f32) -> Vec<LabelUniforms> {
        let Some(scene) = &self.scene else {
            return Vec::new();
        };
        let view_projection = Self::projection(aspect) * self.model_view();
        scene
            .labels
            .iter()
            .map(|label| LabelUniforms {
                model_view_projection: (view_projection * label.placement.model_matrix())
                    .to_cols_array_2d(),
            })
            .collect()
    }

    pub fn pointer_down(&mut self, position: DVec2, zoom_mode: bool) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.down_rotation = self.rotation;
        self.drag.begin(position, zoom_mode);
        true
    }

    /// Rotate or zoom relative to the matrix captured at pointer-down.
    pub fn pointer_moved(&mut self, position: DVec2) -> Option<DragDelta> {
        if self.is_disposed() {
            return None;
        }
        let delta = self.drag.update(position)?;
        let total = delta.total.as_vec2();
        match self.drag.mode() {
            DragMode::Rotating => {
                self.rotation = drag_rotation(total.x, total.y) * self.down_rotation;
            }
            DragMode::Scaling => {
                self.rotation = drag_zoom(total.y) * self.down_rotation;
            }
            DragMode::Idle => {}
        }
        Some(delta)
    }

    pub fn pointer_up(&mut self) -> DragMode {
        self.drag.end()
    }

    /// Apply a rotation from a linked plot on top of the current one.
    pub fn rotate(&mut self, dx: f64, dy: f64) {
        if self.is_disposed() {
            return;
        }
        self.rotation = drag_rotation(dx as f32, dy as f32) * self.rotation;
    }

    /// Count a frame. Returns whether frames should keep coming.
    pub fn on_animation_frame(&mut self) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.frames += 1;
        true
    }

    pub fn dispose(&mut self) {
        if self.data.take().is_some() {
            tracing::debug!(frames = self.frames, "hardware renderer disposed");
        }
        self.scene = None;
        self.drag.end();
    }
}

fn labels_or(labels: &[String], default: impl FnOnce() -> Vec<String>) -> Vec<String> {
    if labels.is_empty() {
        default()
    } else {
        labels.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::default_stops;
    use approx::assert_abs_diff_eq;

    fn grid() -> SampleGrid {
        let values = (0..12).map(|k| (k as f64) * 0.35).collect();
        SampleGrid::new(3, 4, values).unwrap()
    }

    fn renderer(settings: HardwareSettings) -> HardwareRenderer {
        HardwareRenderer::new(&grid(), default_stops(), settings, LabelRasterizer::blank()).unwrap()
    }

    #[test]
    fn test_scene_counts() {
        let r = renderer(HardwareSettings::default());
        let scene = r.scene().unwrap();
        assert_eq!(scene.mesh.vertices.len(), 12);
        assert_eq!(scene.mesh.triangle_count(), 2 * 2 * 3);
        assert!(scene.generation > 0);

        let ticks = r.ticks().unwrap();
        // default index labels: rows 0..2, cols 0..3
        assert_eq!(ticks.x, vec!["0", "1", "2"]);
        assert_eq!(ticks.y, vec!["0", "1", "2", "3"]);
        assert_eq!(scene.labels.len(), 3 + 4 + 11 + 3);
    }

    #[test]
    fn test_auto_z_scale() {
        // max 3.85 snaps to 5
        let r = renderer(HardwareSettings::default());
        let ticks = r.ticks().unwrap();
        assert_eq!(ticks.z.len(), 11);
        assert_eq!(ticks.z[1], "0.5");
        assert_eq!(ticks.z[10], "5");
        let (_, max) = r.grid().unwrap().min_max();
        assert_abs_diff_eq!(max, 0.77, epsilon = 1e-12);
    }

    #[test]
    fn test_explicit_labels_without_auto_scale() {
        let r = renderer(HardwareSettings {
            auto_z_scale: false,
            x_labels: vec!["a".into(), "b".into()],
            z_labels: vec!["low".into(), "high".into()],
            ..Default::default()
        });
        let ticks = r.ticks().unwrap();
        assert_eq!(ticks.x, vec!["a", "b"]);
        assert_eq!(ticks.z, vec!["low", "high"]);
        assert_eq!(r.grid().unwrap().min_max().1, 11.0 * 0.35);
    }

    #[test]
    fn test_redraw_bumps_generation() {
        let mut r = renderer(HardwareSettings::default());
        let first = r.scene().unwrap();
        r.redraw();
        assert!(r.generation() > first.generation);
        assert_eq!(first.mesh, r.scene().unwrap().mesh);
    }

    #[test]
    fn test_initial_camera() {
        let r = renderer(HardwareSettings::default());
        assert!(r.rotation().abs_diff_eq(initial_rotation(), 1e-6));
        let uniforms = r.uniforms(2.0);
        let mv = Mat4::from_cols_array_2d(&uniforms.model_view);
        assert_abs_diff_eq!(mv.w_axis.z, -19.0);
        assert_abs_diff_eq!(mv.w_axis.y, -0.3);
        assert_eq!(uniforms.light_direction, [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(uniforms.ambient[0], AMBIENT_LIGHT);

        // the origin of the plot lands inside the view volume
        let clip = Mat4::from_cols_array_2d(&uniforms.projection) * mv * glam::Vec4::W;
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_drag_uses_total_delta_from_pointer_down() {
        let mut a = renderer(HardwareSettings::default());
        a.pointer_down(DVec2::ZERO, false);
        a.pointer_moved(DVec2::new(10.0, 4.0));
        a.pointer_moved(DVec2::new(30.0, -8.0));

        let mut b = renderer(HardwareSettings::default());
        b.pointer_down(DVec2::ZERO, false);
        b.pointer_moved(DVec2::new(30.0, -8.0));

        assert!(a.rotation().abs_diff_eq(b.rotation(), 1e-6));
        let expected = drag_rotation(30.0, -8.0) * initial_rotation();
        assert!(a.rotation().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_zoom_drag() {
        let mut r = renderer(HardwareSettings::default());
        r.pointer_down(DVec2::ZERO, true);
        let delta = r.pointer_moved(DVec2::new(0.0, -20.0)).unwrap();
        assert_eq!(delta.total, DVec2::new(0.0, -20.0));
        let expected = Mat4::from_scale(Vec3::splat(1.2)) * initial_rotation();
        assert!(r.rotation().abs_diff_eq(expected, 1e-6));
        assert_eq!(r.pointer_up(), DragMode::Scaling);
        assert!(r.pointer_moved(DVec2::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn test_linked_rotation_accumulates() {
        let mut r = renderer(HardwareSettings::default());
        r.rotate(10.0, 0.0);
        r.rotate(0.0, 10.0);
        let expected = drag_rotation(0.0, 10.0) * drag_rotation(10.0, 0.0) * initial_rotation();
        assert!(r.rotation().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn test_label_uniforms_follow_labels() {
        let r = renderer(HardwareSettings::default());
        let uniforms = r.label_uniforms(1.5);
        assert_eq!(uniforms.len(), r.scene().unwrap().labels.len());
    }

    #[test]
    fn test_degenerate_aspect() {
        let fallback = HardwareRenderer::projection(1.0);
        assert!(HardwareRenderer::projection(0.0).abs_diff_eq(fallback, 0.0));
        assert!(!HardwareRenderer::projection(f32::NAN).is_nan());
    }

    #[test]
    fn test_frame_loop_stops_after_dispose() {
        let mut r = renderer(HardwareSettings::default());
        assert!(r.on_animation_frame());
        assert!(r.on_animation_frame());
        assert_eq!(r.frame_count(), 2);

        r.dispose();
        r.dispose();
        assert!(!r.on_animation_frame());
        assert_eq!(r.frame_count(), 2);
        assert!(r.scene().is_none());
        assert!(r.label_uniforms(1.0).is_empty());
        assert!(!r.pointer_down(DVec2::ZERO, false));
        let before = r.rotation();
        r.rotate(50.0, 50.0);
        assert_eq!(r.rotation(), before);
    }
}
