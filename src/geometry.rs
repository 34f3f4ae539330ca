// src/geometry.rs - Measurement regions and display-to-raster mapping

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::errors::{LeafAreaError, Result};

/// A circle estimate supplied by the caller, in display coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CirclePrior {
    pub center: (f64, f64),
    pub radius: f64,
    /// Confidence in [0, 1]; priors at or below the configured threshold are ignored
    pub confidence: f64,
}

/// A user-drawn ellipse in display coordinates. `angle` is in radians,
/// the canvas annotation convention.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EllipseAnnotation {
    pub cx: f64,
    pub cy: f64,
    pub rx: f64,
    pub ry: f64,
    pub angle: f64,
}

/// A measurement boundary in raster pixel coordinates.
/// Ellipse rotation is stored in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Region {
    Circle {
        center: (f64, f64),
        radius: f64,
    },
    Ellipse {
        center: (f64, f64),
        radius_x: f64,
        radius_y: f64,
        angle_deg: f64,
    },
}

/// Per-axis factors taking display coordinates to raster coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    pub fn identity() -> Self {
        Self { x: 1.0, y: 1.0 }
    }

    /// Compute `(raster_w / display_w, raster_h / display_h)`
    pub fn between(raster_dims: (u32, u32), display_dims: (u32, u32)) -> Result<Self> {
        let (raster_w, raster_h) = raster_dims;
        let (display_w, display_h) = display_dims;

        if raster_w == 0 || raster_h == 0 {
            return Err(LeafAreaError::InvalidInput(
                "raster is empty".to_string(),
            ));
        }
        if display_w == 0 || display_h == 0 {
            return Err(LeafAreaError::InvalidInput(format!(
                "display dimensions must be positive, got {} x {}",
                display_w, display_h
            )));
        }

        Ok(Self {
            x: raster_w as f64 / display_w as f64,
            y: raster_h as f64 / display_h as f64,
        })
    }

    pub fn inverse(&self) -> Self {
        Self { x: 1.0 / self.x, y: 1.0 / self.y }
    }

    /// Factor for a lone radius, chosen so a true circle stays a circle
    #[inline]
    pub fn radius_factor(&self) -> f64 {
        self.x.min(self.y)
    }
}

/// Map a circle prior into raster coordinates
pub fn map_circle(prior: &CirclePrior, scale: &ScaleFactors) -> Region {
    Region::Circle {
        center: (prior.center.0 * scale.x, prior.center.1 * scale.y),
        radius: prior.radius * scale.radius_factor(),
    }
}

/// Map an ellipse annotation into raster coordinates, radians to degrees
pub fn map_ellipse(annotation: &EllipseAnnotation, scale: &ScaleFactors) -> Region {
    Region::Ellipse {
        center: (annotation.cx * scale.x, annotation.cy * scale.y),
        radius_x: annotation.rx * scale.x,
        radius_y: annotation.ry * scale.y,
        angle_deg: annotation.angle.to_degrees(),
    }
}

impl Region {
    pub fn center(&self) -> (f64, f64) {
        match *self {
            Region::Circle { center, .. } | Region::Ellipse { center, .. } => center,
        }
    }

    /// (radius_x, radius_y); equal for a circle
    pub fn radii(&self) -> (f64, f64) {
        match *self {
            Region::Circle { radius, .. } => (radius, radius),
            Region::Ellipse { radius_x, radius_y, .. } => (radius_x, radius_y),
        }
    }

    pub fn angle_deg(&self) -> f64 {
        match *self {
            Region::Circle { .. } => 0.0,
            Region::Ellipse { angle_deg, .. } => angle_deg,
        }
    }

    /// Apply scale factors to an already-mapped region
    pub fn scaled(&self, scale: &ScaleFactors) -> Region {
        match *self {
            Region::Circle { center, radius } => Region::Circle {
                center: (center.0 * scale.x, center.1 * scale.y),
                radius: radius * scale.radius_factor(),
            },
            Region::Ellipse { center, radius_x, radius_y, angle_deg } => Region::Ellipse {
                center: (center.0 * scale.x, center.1 * scale.y),
                radius_x: radius_x * scale.x,
                radius_y: radius_y * scale.y,
                angle_deg,
            },
        }
    }

    /// Derive a concentric region with both radii multiplied by `ratio`
    pub fn with_radius_ratio(&self, ratio: f64) -> Region {
        match *self {
            Region::Circle { center, radius } => Region::Circle {
                center,
                radius: radius * ratio,
            },
            Region::Ellipse { center, radius_x, radius_y, angle_deg } => Region::Ellipse {
                center,
                radius_x: radius_x * ratio,
                radius_y: radius_y * ratio,
                angle_deg,
            },
        }
    }

    /// Analytic area: π·r² or π·rx·ry
    pub fn analytic_area(&self) -> f64 {
        let (rx, ry) = self.radii();
        PI * rx * ry
    }

    /// Diameter of the circle with the same area
    pub fn equivalent_diameter(&self) -> f64 {
        let (rx, ry) = self.radii();
        2.0 * (rx * ry).sqrt()
    }

    /// Reject radii that are not strictly positive and finite
    pub fn validate(&self) -> Result<()> {
        let (rx, ry) = self.radii();
        let (cx, cy) = self.center();
        if !(rx > 0.0 && ry > 0.0 && rx.is_finite() && ry.is_finite()) {
            return Err(LeafAreaError::InvalidInput(format!(
                "region radii must be positive, got ({:.2}, {:.2})",
                rx, ry
            )));
        }
        if !(cx.is_finite() && cy.is_finite() && self.angle_deg().is_finite()) {
            return Err(LeafAreaError::InvalidInput(
                "region center and angle must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Point-in-region test at pixel coordinates
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match *self {
            Region::Circle { center, radius } => {
                let dx = x - center.0;
                let dy = y - center.1;
                dx * dx + dy * dy <= radius * radius
            }
            Region::Ellipse { center, radius_x, radius_y, angle_deg } => {
                let (sin, cos) = angle_deg.to_radians().sin_cos();
                let dx = x - center.0;
                let dy = y - center.1;
                let u = dx * cos + dy * sin;
                let v = -dx * sin + dy * cos;
                (u * u) / (radius_x * radius_x) + (v * v) / (radius_y * radius_y) <= 1.0
            }
        }
    }

    /// Axis-aligned bounds (min_x, min_y, max_x, max_y) in continuous coordinates
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (cx, cy) = self.center();
        let (rx, ry) = self.radii();
        let (sin, cos) = self.angle_deg().to_radians().sin_cos();
        let half_w = ((rx * cos).powi(2) + (ry * sin).powi(2)).sqrt();
        let half_h = ((rx * sin).powi(2) + (ry * cos).powi(2)).sqrt();
        (cx - half_w, cy - half_h, cx + half_w, cy + half_h)
    }

    /// Points along the boundary, used for drawing outlines
    pub fn outline_points(&self, segments: usize) -> Vec<(f64, f64)> {
        let (cx, cy) = self.center();
        let (rx, ry) = self.radii();
        let (sin, cos) = self.angle_deg().to_radians().sin_cos();
        let segments = segments.max(8);

        (0..segments)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / segments as f64;
                let (ex, ey) = (rx * t.cos(), ry * t.sin());
                (cx + ex * cos - ey * sin, cy + ex * sin + ey * cos)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_scale_factors_between() {
        let scale = ScaleFactors::between((2000, 1000), (1000, 800)).unwrap();
        assert_approx_eq!(scale.x, 2.0);
        assert_approx_eq!(scale.y, 1.25);
        assert_approx_eq!(scale.radius_factor(), 1.25);
    }

    #[test]
    fn test_empty_raster_is_rejected() {
        assert!(matches!(
            ScaleFactors::between((0, 100), (100, 100)),
            Err(LeafAreaError::InvalidInput(_))
        ));
        assert!(ScaleFactors::between((100, 100), (100, 0)).is_err());
    }

    #[test]
    fn test_map_circle_uses_min_scale() {
        let prior = CirclePrior { center: (100.0, 50.0), radius: 40.0, confidence: 0.9 };
        let scale = ScaleFactors { x: 2.0, y: 3.0 };
        let region = map_circle(&prior, &scale);
        assert_eq!(region, Region::Circle { center: (200.0, 150.0), radius: 80.0 });
    }

    #[test]
    fn test_map_ellipse_converts_angle_to_degrees() {
        let annotation = EllipseAnnotation {
            cx: 10.0,
            cy: 20.0,
            rx: 5.0,
            ry: 4.0,
            angle: std::f64::consts::FRAC_PI_2,
        };
        let region = map_ellipse(&annotation, &ScaleFactors { x: 2.0, y: 0.5 });
        match region {
            Region::Ellipse { center, radius_x, radius_y, angle_deg } => {
                assert_approx_eq!(center.0, 20.0);
                assert_approx_eq!(center.1, 10.0);
                assert_approx_eq!(radius_x, 10.0);
                assert_approx_eq!(radius_y, 2.0);
                assert_approx_eq!(angle_deg, 90.0);
            }
            other => panic!("expected ellipse, got {:?}", other),
        }
    }

    #[test]
    fn test_scaling_round_trip_within_a_pixel() {
        let annotation = EllipseAnnotation { cx: 321.0, cy: 123.0, rx: 97.0, ry: 61.0, angle: 0.4 };
        let scale = ScaleFactors::between((3024, 4032), (375, 500)).unwrap();
        let there = map_ellipse(&annotation, &scale);
        let back = there.scaled(&scale.inverse());
        let original = map_ellipse(&annotation, &ScaleFactors::identity());

        let (bc, oc) = (back.center(), original.center());
        assert!((bc.0 - oc.0).abs() <= 1.0 && (bc.1 - oc.1).abs() <= 1.0);
        let (brx, bry) = back.radii();
        assert!((brx - 97.0).abs() <= 1.0 && (bry - 61.0).abs() <= 1.0);

        let circle = Region::Circle { center: (50.0, 60.0), radius: 25.0 };
        let uniform = ScaleFactors { x: 3.0, y: 3.0 };
        let restored = circle.scaled(&uniform).scaled(&uniform.inverse());
        assert_approx_eq!(restored.radii().0, 25.0);
    }

    #[test]
    fn test_analytic_areas() {
        let circle = Region::Circle { center: (0.0, 0.0), radius: 100.0 };
        assert_eq!(circle.analytic_area().round() as u64, 31416);

        let ellipse = Region::Ellipse { center: (0.0, 0.0), radius_x: 80.0, radius_y: 64.0, angle_deg: 0.0 };
        assert_eq!(ellipse.analytic_area().round() as u64, 16085);
    }

    #[test]
    fn test_chamber_ratio_keeps_center_and_angle() {
        let clip = Region::Ellipse { center: (200.0, 150.0), radius_x: 100.0, radius_y: 80.0, angle_deg: 30.0 };
        let chamber = clip.with_radius_ratio(20.0 / 25.0);
        assert_eq!(chamber.center(), clip.center());
        assert_approx_eq!(chamber.angle_deg(), 30.0);
        let (rx, ry) = chamber.radii();
        assert_approx_eq!(rx, 80.0);
        assert_approx_eq!(ry, 64.0);
    }

    #[test]
    fn test_validate_rejects_degenerate_radius() {
        let zero = Region::Circle { center: (1.0, 1.0), radius: 0.0 };
        assert!(zero.validate().is_err());
        let nan = Region::Ellipse { center: (1.0, 1.0), radius_x: f64::NAN, radius_y: 2.0, angle_deg: 0.0 };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_rotated_ellipse_contains() {
        let ellipse = Region::Ellipse { center: (0.0, 0.0), radius_x: 10.0, radius_y: 2.0, angle_deg: 90.0 };
        assert!(ellipse.contains(0.0, 9.5));
        assert!(!ellipse.contains(9.5, 0.0));
    }
}
