//! Pointer drag tracking shared by both renderers.
//!
//! [`DragState`] only tracks where a drag started and where it was last seen.
//! Each renderer turns the reported [`DragDelta`] into its own camera update:
//! angles and a scale factor for the software path, a rotation matrix for the
//! hardware path.

use glam::{DVec2, Mat4, Vec3};

// ================================================================================
// Constants
// ================================================================================

pub const DEFAULT_X_ANGLE: f64 = 47.0;
pub const DEFAULT_Z_ANGLE: f64 = 47.0;
pub const DEFAULT_SCALE: f64 = 350.0;
pub const MIN_SCALE: f64 = 50.0;
pub const MAX_SCALE: f64 = 1100.0;
/// Pixels of vertical drag per unit of scale.
pub const SCALE_FACTOR: f64 = 1.4;

/// Degrees of hardware rotation per pixel of drag.
pub const HARDWARE_DEGREES_PER_PIXEL: f32 = 0.5;

// ================================================================================
// Drag state machine
// ================================================================================

/// What the active drag controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragMode {
    #[default]
    Idle,
    Rotating,
    Scaling,
}

/// Pointer movement reported during a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragDelta {
    /// Movement since the pointer went down
    pub total: DVec2,
    /// Movement since the previous update
    pub step: DVec2,
}

#[derive(Debug, Clone, Default)]
pub struct DragState {
    mode: DragMode,
    down: DVec2,
    last: DVec2,
}

impl DragState {
    pub fn mode(&self) -> DragMode {
        self.mode
    }

    pub fn is_dragging(&self) -> bool {
        self.mode != DragMode::Idle
    }

    pub fn down_position(&self) -> DVec2 {
        self.down
    }

    /// Start a drag. `scale_mode` is set when shift or the secondary button
    /// was held at pointer-down.
    pub fn begin(&mut self, position: DVec2, scale_mode: bool) -> DragMode {
        self.mode = if scale_mode {
            DragMode::Scaling
        } else {
            DragMode::Rotating
        };
        self.down = position;
        self.last = position;
        self.mode
    }

    /// Record a pointer move. Returns `None` when no drag is active.
    pub fn update(&mut self, position: DVec2) -> Option<DragDelta> {
        if !self.is_dragging() {
            return None;
        }
        let delta = DragDelta {
            total: position - self.down,
            step: position - self.last,
        };
        self.last = position;
        Some(delta)
    }

    pub fn end(&mut self) -> DragMode {
        std::mem::take(&mut self.mode)
    }
}

// ================================================================================
// Software camera
// ================================================================================

/// Rotation angles (degrees) of the software projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angles {
    pub x: f64,
    pub z: f64,
}

impl Default for Angles {
    fn default() -> Self {
        Self {
            x: DEFAULT_X_ANGLE,
            z: DEFAULT_Z_ANGLE,
        }
    }
}

/// Angles after dragging from `down` to `current`, starting at `reference`.
///
/// Horizontal movement drives the z angle and vertical movement the x angle.
/// The remainder keeps the sign of the sum, so angles range over (-360, 360).
pub fn drag_angles(reference: Angles, down: DVec2, current: DVec2) -> Angles {
    Angles {
        z: (reference.z + (down.x - current.x)) % 360.0,
        x: (reference.x + (down.y - current.y)) % 360.0,
    }
}

/// Scale after a vertical drag from `down` to `current`, starting at `reference`.
pub fn drag_scale(reference: f64, down: DVec2, current: DVec2) -> f64 {
    let scale = (reference / SCALE_FACTOR + (down.y - current.y)) * SCALE_FACTOR;
    clamp_scale(scale)
}

pub fn clamp_scale(scale: f64) -> f64 {
    scale.clamp(MIN_SCALE + 1.0, MAX_SCALE - 1.0)
}

// ================================================================================
// Hardware camera
// ================================================================================

/// Starting orientation of the hardware surface.
pub fn initial_rotation() -> Mat4 {
    Mat4::from_rotation_x((-70.0_f32).to_radians()) * Mat4::from_rotation_z((-42.0_f32).to_radians())
}

/// Incremental rotation for a drag of `(dx, dy)` pixels, half a degree per pixel.
pub fn drag_rotation(dx: f32, dy: f32) -> Mat4 {
    Mat4::from_rotation_y((dx * HARDWARE_DEGREES_PER_PIXEL).to_radians())
        * Mat4::from_rotation_x((dy * HARDWARE_DEGREES_PER_PIXEL).to_radians())
}

/// Uniform zoom for a shift-drag of `dy` pixels: dragging up enlarges.
pub fn drag_zoom(dy: f32) -> Mat4 {
    Mat4::from_scale(Vec3::splat(1.0 - dy / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_drag_lifecycle() {
        let mut drag = DragState::default();
        assert!(drag.update(DVec2::new(5.0, 5.0)).is_none());

        assert_eq!(drag.begin(DVec2::new(10.0, 10.0), false), DragMode::Rotating);
        let first = drag.update(DVec2::new(13.0, 8.0)).unwrap();
        assert_eq!(first.total, DVec2::new(3.0, -2.0));
        assert_eq!(first.step, DVec2::new(3.0, -2.0));

        let second = drag.update(DVec2::new(14.0, 8.0)).unwrap();
        assert_eq!(second.total, DVec2::new(4.0, -2.0));
        assert_eq!(second.step, DVec2::new(1.0, 0.0));

        assert_eq!(drag.end(), DragMode::Rotating);
        assert_eq!(drag.mode(), DragMode::Idle);
        assert_eq!(drag.begin(DVec2::ZERO, true), DragMode::Scaling);
    }

    #[test]
    fn test_drag_angles_wrap() {
        let start = Angles::default();
        let a = drag_angles(start, DVec2::new(100.0, 100.0), DVec2::new(90.0, 120.0));
        assert_eq!(a.z, 57.0);
        assert_eq!(a.x, 27.0);

        let a = drag_angles(start, DVec2::new(400.0, 0.0), DVec2::new(0.0, 0.0));
        assert_eq!(a.z, 87.0);

        let a = drag_angles(start, DVec2::ZERO, DVec2::new(500.0, 0.0));
        assert_eq!(a.z, -93.0);
    }

    #[test]
    fn test_scale_is_clamped() {
        let down = DVec2::new(0.0, 0.0);
        let mut scale = DEFAULT_SCALE;
        for _ in 0..20 {
            scale = drag_scale(scale, down, DVec2::new(0.0, 500.0));
            assert!(scale >= MIN_SCALE + 1.0);
        }
        assert_eq!(scale, MIN_SCALE + 1.0);

        for _ in 0..20 {
            scale = drag_scale(scale, down, DVec2::new(0.0, -500.0));
            assert!(scale <= MAX_SCALE - 1.0);
        }
        assert_eq!(scale, MAX_SCALE - 1.0);
    }

    #[test]
    fn test_scale_tracks_vertical_drag() {
        let scale = drag_scale(DEFAULT_SCALE, DVec2::new(0.0, 100.0), DVec2::new(0.0, 90.0));
        assert_abs_diff_eq!(scale, DEFAULT_SCALE + 14.0, epsilon = 1e-9);
    }

    #[test]
    fn test_small_rotations_nearly_compose() {
        // second delta premultiplies the first
        let split = drag_rotation(2.0, 1.0) * drag_rotation(1.0, 2.0);
        let single = drag_rotation(3.0, 3.0);
        assert!(split.abs_diff_eq(single, 1e-3));
    }

    #[test]
    fn test_large_rotations_do_not_commute() {
        // Applying (dx1, dy1) then (dx2, dy2) is not one drag of the sum.
        let a = drag_rotation(180.0, 0.0);
        let b = drag_rotation(0.0, 180.0);
        let split = b * a;
        let single = drag_rotation(180.0, 180.0);
        assert!(!split.abs_diff_eq(single, 1e-3));
        assert!(!(a * b).abs_diff_eq(b * a, 1e-3));
    }

    #[test]
    fn test_zoom_direction() {
        let up = drag_zoom(-50.0).transform_point3(Vec3::X);
        assert_abs_diff_eq!(up.x, 1.5);
        let down = drag_zoom(50.0).transform_point3(Vec3::X);
        assert_abs_diff_eq!(down.x, 0.5);
    }
}
