// src/calibration.rs - Pixel-to-physical conversion and report rounding

use serde::{Deserialize, Serialize};

use crate::errors::{LeafAreaError, Result};
use crate::geometry::Region;

/// Known physical diameters of the reference region (the clip) and the
/// derived region (the measurement chamber)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CalibrationContext {
    pub reference_diameter_mm: f64,
    pub target_diameter_mm: f64,
}

impl CalibrationContext {
    pub fn new(reference_diameter_mm: f64, target_diameter_mm: f64) -> Result<Self> {
        let valid = |d: f64| d.is_finite() && d > 0.0;
        if !valid(reference_diameter_mm) || !valid(target_diameter_mm) {
            return Err(LeafAreaError::InvalidInput(format!(
                "calibration diameters must be positive, got reference {} mm and target {} mm",
                reference_diameter_mm, target_diameter_mm
            )));
        }
        Ok(Self {
            reference_diameter_mm,
            target_diameter_mm,
        })
    }

    /// `target / reference`
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.target_diameter_mm / self.reference_diameter_mm
    }

    /// The chamber: same centre and angle as the reference, radii scaled by the ratio
    pub fn derive_chamber(&self, reference: &Region) -> Region {
        reference.with_radius_ratio(self.ratio())
    }

    /// Millimetres per pixel, from the reference region's measured diameter
    pub fn mm_per_pixel(&self, reference: &Region) -> f64 {
        let diameter_px = reference.equivalent_diameter();
        if diameter_px > 0.0 {
            self.reference_diameter_mm / diameter_px
        } else {
            0.0
        }
    }

    pub fn pixel_area_to_mm2(&self, pixel_area: f64, reference: &Region) -> f64 {
        let scale = self.mm_per_pixel(reference);
        pixel_area * scale * scale
    }
}

/// Whole pixels, never negative
#[inline]
pub fn round_pixels(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Two decimal places. Negative zero comes back as `0.0`.
#[inline]
pub fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}

/// `100 * leaf / region`, clamped to [0, 100]; zero for an empty region
pub fn coverage_percent(leaf_area: f64, region_area: f64) -> f64 {
    if region_area <= 0.0 || !region_area.is_finite() {
        return 0.0;
    }
    round_two_decimals((100.0 * leaf_area / region_area).clamp(0.0, 100.0))
}
