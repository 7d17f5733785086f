//! Points and affine transforms for the software projection path.
//!
//! Transforms are stored as column-major [`DMat4`]s. Every operation applies
//! *after* whatever the transform already does, so building
//! `identity -> rotate -> scale -> translate` rotates a point first and
//! translates it last.

use glam::{DMat4, DVec2, DVec3};

// ================================================================================
// Point3D
// ================================================================================

/// A sample position with its logical coordinates and the result of the most
/// recently applied transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3D {
    /// Un-transformed position: x, y in [-0.5, 0.5], z the (normalised) sample.
    pub local: DVec3,
    /// Position after [`Point3D::apply`], in widget pixels for x and y.
    pub applied: DVec3,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        let local = DVec3::new(x, y, z);
        Self {
            local,
            applied: local,
        }
    }

    /// Recompute the applied coordinates from the logical ones.
    pub fn apply(&mut self, transform: &AffineTransform) {
        self.applied = transform.transform_point(self.local);
    }

    /// The applied position projected onto the screen plane.
    pub fn screen(&self) -> DVec2 {
        self.applied.truncate()
    }
}

// ================================================================================
// AffineTransform
// ================================================================================

/// A composable 4x4 affine transform owned by a single plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    matrix: DMat4,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub fn identity() -> Self {
        Self {
            matrix: DMat4::IDENTITY,
        }
    }

    pub fn matrix(&self) -> DMat4 {
        self.matrix
    }

    /// Rotate by the given angles in degrees, applying z first, then y, then x.
    pub fn rotate(&mut self, x_deg: f64, y_deg: f64, z_deg: f64) {
        self.apply_in_place(rotation_matrix(x_deg, y_deg, z_deg));
    }

    pub fn scale(&mut self, factor: f64) {
        self.apply_in_place(DMat4::from_scale(DVec3::splat(factor)));
    }

    pub fn translate(&mut self, x: f64, y: f64, z: f64) {
        self.apply_in_place(DMat4::from_translation(DVec3::new(x, y, z)));
    }

    /// Compose `delta` after the current transform.
    pub fn apply_in_place(&mut self, delta: DMat4) {
        self.matrix = delta * self.matrix;
    }

    pub fn rotated(mut self, x_deg: f64, y_deg: f64, z_deg: f64) -> Self {
        self.rotate(x_deg, y_deg, z_deg);
        self
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        self.scale(factor);
        self
    }

    pub fn translated(mut self, x: f64, y: f64, z: f64) -> Self {
        self.translate(x, y, z);
        self
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.matrix.transform_point3(point)
    }
}

/// Rotation about the three axes (degrees), z applied first.
pub fn rotation_matrix(x_deg: f64, y_deg: f64, z_deg: f64) -> DMat4 {
    DMat4::from_rotation_x(x_deg.to_radians())
        * DMat4::from_rotation_y(y_deg.to_radians())
        * DMat4::from_rotation_z(z_deg.to_radians())
}

// ================================================================================
// Small vector helpers
// ================================================================================

/// Squared euclidean distance, enough for ordering by depth.
pub fn distance_sq(a: DVec3, b: DVec3) -> f64 {
    (a - b).length_squared()
}

/// Mean of a set of points; `None` for an empty slice.
pub fn centroid(points: &[DVec3]) -> Option<DVec3> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(DVec3::ZERO, |acc, p| acc + *p);
    Some(sum / points.len() as f64)
}

/// Unit normal of the plane spanned by two edges, or zero for degenerate input.
pub fn face_normal(edge_a: DVec3, edge_b: DVec3) -> DVec3 {
    edge_a.cross(edge_b).normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_operations_apply_in_call_order() {
        // rotate 90 about z, then scale 2, then translate: (1,0,0) -> (0,1,0) -> (0,2,0) -> (10,12,0)
        let t = AffineTransform::identity()
            .rotated(0.0, 0.0, 90.0)
            .scaled(2.0)
            .translated(10.0, 10.0, 0.0);
        let p = t.transform_point(DVec3::X);
        assert_abs_diff_eq!(p.x, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 12.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_applies_z_before_x() {
        // z by 90 takes X to Y, x by 90 then takes Y to Z.
        let p = rotation_matrix(90.0, 0.0, 90.0).transform_point3(DVec3::X);
        assert_abs_diff_eq!(p.z, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_point_apply_keeps_local() {
        let mut p = Point3D::new(0.5, -0.5, 1.0);
        p.apply(&AffineTransform::identity().scaled(100.0));
        assert_eq!(p.local, DVec3::new(0.5, -0.5, 1.0));
        assert_abs_diff_eq!(p.screen().x, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.screen().y, -50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_face_normal_is_unit_and_perpendicular() {
        let a = DVec3::new(2.0, 0.0, 0.5);
        let b = DVec3::new(2.0, -3.0, 1.0);
        let n = face_normal(a, b);
        assert_abs_diff_eq!(n.length(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(n.dot(a), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(n.dot(b), 0.0, epsilon = 1e-12);
        assert_eq!(face_normal(a, a * 2.0), DVec3::ZERO);
    }

    #[test]
    fn test_centroid() {
        assert!(centroid(&[]).is_none());
        let c = centroid(&[DVec3::ZERO, DVec3::new(2.0, 4.0, 6.0)]).unwrap();
        assert_eq!(c, DVec3::new(1.0, 2.0, 3.0));
    }
}
