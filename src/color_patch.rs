// src/color_patch.rs - Clip detection from a user-sampled colour

use crate::color::{segment_hsv, ColorSample, HsvImage, HsvRange};
use crate::contours::{extract_regions, largest_region};
use crate::enclosing::minimal_enclosing_circle;
use crate::errors::{LeafAreaError, Result};
use crate::geometry::Region;

pub const NO_CLIP_COLOR_MESSAGE: &str = "No clip-colored regions found";

/// The clip found by colour, as the enclosing circle of its largest patch
#[derive(Debug, Clone, PartialEq)]
pub struct ClipDetection {
    pub region: Region,
    /// Band used to segment the clip
    pub color_range: HsvRange,
    /// Area of the patch the circle was fitted to
    pub patch_area: f64,
}

/// Segment by the sampled colour, keep the largest patch of at least
/// `min_area` pixels and fit its minimal enclosing circle
pub fn detect_clip_by_color(
    hsv: &HsvImage,
    sample: &ColorSample,
    min_area: f64,
) -> Result<ClipDetection> {
    let color_range = HsvRange::from_sample(sample);
    let color_mask = segment_hsv(hsv, &color_range);

    let patch = largest_region(extract_regions(&color_mask, min_area))
        .ok_or_else(|| LeafAreaError::NoRegionFound(NO_CLIP_COLOR_MESSAGE.to_string()))?;

    let circle = minimal_enclosing_circle(&patch.boundary)
        .ok_or_else(|| LeafAreaError::NoRegionFound(NO_CLIP_COLOR_MESSAGE.to_string()))?;

    log::debug!(
        "Clip colour patch: area {:.0} px, enclosing circle ({:.1}, {:.1}) r={:.1}",
        patch.area,
        circle.center.x,
        circle.center.y,
        circle.radius
    );

    Ok(ClipDetection {
        region: Region::Circle {
            center: (circle.center.x, circle.center.y),
            radius: circle.radius,
        },
        color_range,
        patch_area: patch.area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{rgb_to_hsv, to_hsv_image};
    use image::{Rgba, RgbaImage};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    const CLIP_BLUE: Rgba<u8> = Rgba([30, 60, 200, 255]);

    fn sample_for(color: Rgba<u8>) -> ColorSample {
        let [h, s, v] = rgb_to_hsv(color[0], color[1], color[2]);
        ColorSample { h, s, v, tolerance: 20 }
    }

    #[test]
    fn test_finds_largest_patch() {
        let mut raster = RgbaImage::from_pixel(300, 200, Rgba([240, 240, 240, 255]));
        draw_filled_circle_mut(&mut raster, (120, 100), 60, CLIP_BLUE);
        draw_filled_rect_mut(&mut raster, Rect::at(250, 20).of_size(20, 20), CLIP_BLUE);

        let detection = detect_clip_by_color(&to_hsv_image(&raster), &sample_for(CLIP_BLUE), 100.0).unwrap();
        let (cx, cy) = detection.region.center();
        assert!((cx - 120.0).abs() <= 1.5, "cx {}", cx);
        assert!((cy - 100.0).abs() <= 1.5, "cy {}", cy);
        assert!((detection.region.radii().0 - 60.0).abs() <= 1.5);
        assert!(detection.patch_area > 10000.0);
    }

    #[test]
    fn test_no_matching_color() {
        let raster = RgbaImage::from_pixel(100, 100, Rgba([240, 240, 240, 255]));
        let result = detect_clip_by_color(&to_hsv_image(&raster), &sample_for(CLIP_BLUE), 100.0);
        match result {
            Err(LeafAreaError::NoRegionFound(message)) => assert_eq!(message, NO_CLIP_COLOR_MESSAGE),
            other => panic!("expected NoRegionFound, got {:?}", other),
        }
    }

    #[test]
    fn test_patches_below_min_area_are_ignored() {
        let mut raster = RgbaImage::from_pixel(100, 100, Rgba([240, 240, 240, 255]));
        draw_filled_rect_mut(&mut raster, Rect::at(10, 10).of_size(5, 5), CLIP_BLUE);
        let result = detect_clip_by_color(&to_hsv_image(&raster), &sample_for(CLIP_BLUE), 100.0);
        assert!(matches!(result, Err(LeafAreaError::NoRegionFound(_))));
    }
}
