// src/enclosing.rs - Minimal enclosing circle of a point set

use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use nalgebra::Point2;

const EPSILON: f64 = 1e-7;

/// Circle in continuous pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnclosingCircle {
    pub center: Point2<f64>,
    pub radius: f64,
}

impl EnclosingCircle {
    fn from_point(p: Point2<f64>) -> Self {
        Self { center: p, radius: 0.0 }
    }

    fn from_diameter(a: Point2<f64>, b: Point2<f64>) -> Self {
        let center = nalgebra::center(&a, &b);
        Self { center, radius: nalgebra::distance(&a, &center) }
    }

    /// Circle through three points; collinear triples fall back to the widest pair
    fn from_triangle(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> Self {
        let ab = b - a;
        let ac = c - a;
        let d = 2.0 * (ab.x * ac.y - ab.y * ac.x);

        if d.abs() < EPSILON {
            return [
                Self::from_diameter(a, b),
                Self::from_diameter(a, c),
                Self::from_diameter(b, c),
            ]
            .into_iter()
            .max_by(|x, y| x.radius.total_cmp(&y.radius))
            .unwrap_or_else(|| Self::from_point(a));
        }

        let ab_sq = ab.norm_squared();
        let ac_sq = ac.norm_squared();
        let ux = (ac.y * ab_sq - ab.y * ac_sq) / d;
        let uy = (ab.x * ac_sq - ac.x * ab_sq) / d;
        let center = Point2::new(a.x + ux, a.y + uy);

        Self { center, radius: nalgebra::distance(&a, &center) }
    }

    #[inline]
    fn contains(&self, p: &Point2<f64>) -> bool {
        nalgebra::distance(&self.center, p) <= self.radius + EPSILON * self.radius.max(1.0)
    }
}

/// Smallest circle containing every point. Only convex-hull vertices can lie
/// on the circle, so the incremental search runs over the hull.
pub fn minimal_enclosing_circle(points: &[Point<i32>]) -> Option<EnclosingCircle> {
    if points.is_empty() {
        return None;
    }

    let hull = convex_hull(points);
    let source = if hull.is_empty() { points } else { hull.as_slice() };
    let pts: Vec<Point2<f64>> = source
        .iter()
        .map(|p| Point2::new(p.x as f64, p.y as f64))
        .collect();

    let mut circle = EnclosingCircle::from_point(pts[0]);
    for i in 1..pts.len() {
        if circle.contains(&pts[i]) {
            continue;
        }
        circle = EnclosingCircle::from_point(pts[i]);
        for j in 0..i {
            if circle.contains(&pts[j]) {
                continue;
            }
            circle = EnclosingCircle::from_diameter(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(&pts[k]) {
                    circle = EnclosingCircle::from_triangle(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    Some(circle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_empty_set() {
        assert!(minimal_enclosing_circle(&[]).is_none());
    }

    #[test]
    fn test_single_point() {
        let circle = minimal_enclosing_circle(&[Point::new(4, 7)]).unwrap();
        assert_approx_eq!(circle.center.x, 4.0);
        assert_approx_eq!(circle.center.y, 7.0);
        assert_approx_eq!(circle.radius, 0.0);
    }

    #[test]
    fn test_square_corners() {
        let points = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(5, 5),
        ];
        let circle = minimal_enclosing_circle(&points).unwrap();
        assert_approx_eq!(circle.center.x, 5.0);
        assert_approx_eq!(circle.center.y, 5.0);
        assert_approx_eq!(circle.radius, 50f64.sqrt());
    }

    #[test]
    fn test_collinear_points() {
        let points = [Point::new(0, 0), Point::new(3, 0), Point::new(8, 0)];
        let circle = minimal_enclosing_circle(&points).unwrap();
        assert_approx_eq!(circle.center.x, 4.0);
        assert_approx_eq!(circle.radius, 4.0);
    }

    #[test]
    fn test_circle_boundary_samples() {
        let points: Vec<Point<i32>> = (0..360)
            .step_by(5)
            .map(|deg| {
                let t = (deg as f64).to_radians();
                Point::new((100.0 + 40.0 * t.cos()).round() as i32, (80.0 + 40.0 * t.sin()).round() as i32)
            })
            .collect();
        let circle = minimal_enclosing_circle(&points).unwrap();
        assert!((circle.center.x - 100.0).abs() < 1.0);
        assert!((circle.center.y - 80.0).abs() < 1.0);
        assert!((circle.radius - 40.0).abs() < 1.0);
        for p in &points {
            let d = ((p.x as f64 - circle.center.x).powi(2) + (p.y as f64 - circle.center.y).powi(2)).sqrt();
            assert!(d <= circle.radius + 1e-6);
        }
    }
}
