// src/render.rs - Annotated preview of a measurement

use bresenham::Bresenham;
use image::{Rgba, RgbaImage};

use crate::config::Config;
use crate::geometry::Region;
use crate::pipeline::Overlay;

const OUTLINE_SEGMENTS: usize = 360;
const LEAF_TINT_ALPHA: f32 = 0.5;

/// Copy of `raster` with leaf pixels tinted and region outlines drawn on top
pub fn render_preview(raster: &RgbaImage, overlay: &Overlay, config: &Config) -> RgbaImage {
    let mut preview = raster.clone();

    tint_mask(&mut preview, overlay, config.preview_leaf_color_rgb);
    draw_region_outline(&mut preview, &overlay.reference, config.preview_region_color_rgb);
    if let Some(chamber) = &overlay.chamber {
        draw_region_outline(&mut preview, chamber, config.preview_chamber_color_rgb);
    }

    preview
}

fn tint_mask(image: &mut RgbaImage, overlay: &Overlay, color: [u8; 3]) {
    let (width, height) = image.dimensions();
    if overlay.leaf_mask.dimensions() != (width, height) {
        return;
    }

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if overlay.leaf_mask.is_foreground(x, y) {
            for c in 0..3 {
                let blended = pixel[c] as f32 * (1.0 - LEAF_TINT_ALPHA) + color[c] as f32 * LEAF_TINT_ALPHA;
                pixel[c] = blended.round() as u8;
            }
        }
    }
}

/// Draw a closed outline by joining boundary samples with Bresenham lines
pub fn draw_region_outline(image: &mut RgbaImage, region: &Region, color: [u8; 3]) {
    let (width, height) = image.dimensions();
    let points: Vec<(isize, isize)> = region
        .outline_points(OUTLINE_SEGMENTS)
        .into_iter()
        .map(|(x, y)| (x.round() as isize, y.round() as isize))
        .collect();

    let paint = Rgba([color[0], color[1], color[2], 255]);
    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        for (x, y) in Bresenham::new(start, end) {
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                image.put_pixel(x as u32, y as u32, paint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::BinaryMask;

    #[test]
    fn test_outline_is_drawn_on_boundary() {
        let mut image = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let region = Region::Circle { center: (50.0, 50.0), radius: 30.0 };
        draw_region_outline(&mut image, &region, [0, 255, 0]);
        assert_eq!(image.get_pixel(80, 50), &Rgba([0, 255, 0, 255]));
        assert_eq!(image.get_pixel(50, 50), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_preview_tints_leaf_pixels() {
        let raster = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let overlay = Overlay {
            reference: Region::Circle { center: (20.0, 20.0), radius: 15.0 },
            chamber: None,
            leaf_mask: BinaryMask::from_fn(40, 40, |x, y| x == 20 && y == 20),
        };
        let preview = render_preview(&raster, &overlay, &Config::default());
        assert_eq!(preview.get_pixel(20, 20), &Rgba([128, 0, 128, 255]));
        assert_eq!(preview.get_pixel(21, 20), &Rgba([0, 0, 0, 255]));
        assert_eq!(preview.dimensions(), raster.dimensions());
    }

    #[test]
    fn test_outline_outside_image_is_clipped() {
        let mut image = RgbaImage::new(10, 10);
        let region = Region::Circle { center: (-50.0, -50.0), radius: 5.0 };
        draw_region_outline(&mut image, &region, [255, 0, 0]);
        assert!(image.pixels().all(|p| p[3] == 0));
    }
}
