//! Nearest-sample lookup for tooltips.

use crate::math::Point3D;

use glam::DVec2;

/// Samples further than this from the pointer never show a tooltip.
pub const TOOLTIP_THRESHOLD_PX: f64 = 32.0;

/// A tooltip bound to one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    /// Row-major sample index
    pub index: usize,
    pub text: String,
    /// Pointer position the tooltip was resolved at
    pub anchor: DVec2,
}

/// Index and distance of the projected sample closest to `cursor`.
///
/// Samples that project to a non-finite position (NaN heights) are skipped.
pub fn nearest_sample(points: &[Point3D], cursor: DVec2) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let dist = point.screen().distance_squared(cursor);
        if !dist.is_finite() {
            continue;
        }
        if best.is_none_or(|best| dist < best.1) {
            best = Some((index, dist));
        }
    }
    best.map(|(index, dist)| (index, dist.sqrt()))
}

/// The tooltip for the sample nearest `cursor`, if it is within
/// [`TOOLTIP_THRESHOLD_PX`] and has text.
pub fn tooltip_at(points: &[Point3D], cursor: DVec2, texts: &[String]) -> Option<Tooltip> {
    let (index, distance) = nearest_sample(points, cursor)?;
    if distance > TOOLTIP_THRESHOLD_PX {
        return None;
    }
    let text = texts.get(index)?;
    Some(Tooltip {
        index,
        text: text.clone(),
        anchor: cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::AffineTransform;

    fn projected() -> Vec<Point3D> {
        let transform = AffineTransform::identity().scaled(100.0).translated(200.0, 200.0, 0.0);
        [(-0.5, 0.5), (0.5, 0.5), (-0.5, -0.5), (0.5, -0.5)]
            .into_iter()
            .map(|(x, y)| {
                let mut p = Point3D::new(x, y, 0.0);
                p.apply(&transform);
                p
            })
            .collect()
    }

    fn texts() -> Vec<String> {
        ["a", "b", "c", "d"].map(String::from).to_vec()
    }

    #[test]
    fn test_exact_hit_returns_that_sample() {
        let points = projected();
        for (index, point) in points.iter().enumerate() {
            let tip = tooltip_at(&points, point.screen(), &texts()).unwrap();
            assert_eq!(tip.index, index);
            assert_eq!(tip.text, texts()[index]);
        }
    }

    #[test]
    fn test_far_pointer_hides_tooltip() {
        let points = projected();
        // (150, 250) is sample 0; 33px straight down is outside the threshold
        assert!(tooltip_at(&points, DVec2::new(150.0, 283.0), &texts()).is_none());
        assert!(tooltip_at(&points, DVec2::new(150.0, 281.0), &texts()).is_some());
    }

    #[test]
    fn test_missing_text_or_points() {
        let points = projected();
        assert!(tooltip_at(&points, points[3].screen(), &texts()[..2]).is_none());
        assert!(nearest_sample(&[], DVec2::ZERO).is_none());
    }

    #[test]
    fn test_nan_sample_never_wins() {
        let mut points = projected();
        let transform = AffineTransform::identity().scaled(100.0).translated(200.0, 200.0, 0.0);
        points[0] = Point3D::new(-0.5, 0.5, f64::NAN);
        points[0].apply(&transform);

        let far = DVec2::new(-5000.0, -5000.0);
        assert!(tooltip_at(&points, far, &texts()).is_none());

        let (index, _) = nearest_sample(&points, points[1].screen()).unwrap();
        assert_eq!(index, 1);

        let nan_only = [points[0]];
        assert!(nearest_sample(&nan_only, DVec2::ZERO).is_none());
    }
}
