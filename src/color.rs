// src/color.rs - HSV conversion and colour-band segmentation

use image::{Rgb, RgbImage, RgbaImage};
use imageproc::map::map_colors;
use serde::{Deserialize, Serialize};

use crate::errors::{LeafAreaError, Result};
use crate::mask::BinaryMask;

/// Upper bound of the half-degree hue domain
pub const HUE_MAX: u8 = 179;
/// Upper bound of saturation and value
pub const CHANNEL_MAX: u8 = 255;

/// An image whose three channels hold H, S and V
pub type HsvImage = RgbImage;

/// Inclusive bounds for one HSV channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelRange {
    pub min: u8,
    pub max: u8,
}

impl ChannelRange {
    #[inline]
    pub fn contains(&self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }

    /// `clamp(center ± tolerance)` with the given ceiling
    fn around(center: u8, tolerance: u8, ceiling: u8) -> Self {
        let center = center as i32;
        let tolerance = tolerance as i32;
        let ceiling = ceiling as i32;
        Self {
            min: (center - tolerance).clamp(0, ceiling) as u8,
            max: (center + tolerance).clamp(0, ceiling) as u8,
        }
    }
}

/// A band in HSV space, inclusive on both bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HsvRange {
    pub hue: ChannelRange,
    pub saturation: ChannelRange,
    pub value: ChannelRange,
}

impl Default for HsvRange {
    fn default() -> Self {
        Self::leaf_green()
    }
}

impl HsvRange {
    /// Default leaf tissue band: H 35..=90, S 40..=255, V 40..=255
    pub fn leaf_green() -> Self {
        Self {
            hue: ChannelRange { min: 35, max: 90 },
            saturation: ChannelRange { min: 40, max: CHANNEL_MAX },
            value: ChannelRange { min: 40, max: CHANNEL_MAX },
        }
    }

    /// Band centred on a sampled colour
    pub fn from_sample(sample: &ColorSample) -> Self {
        Self {
            hue: ChannelRange::around(sample.h, sample.tolerance, HUE_MAX),
            saturation: ChannelRange::around(sample.s, sample.tolerance, CHANNEL_MAX),
            value: ChannelRange::around(sample.v, sample.tolerance, CHANNEL_MAX),
        }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        self.hue.contains(hsv[0])
            && self.saturation.contains(hsv[1])
            && self.value.contains(hsv[2])
    }

    pub fn lower(&self) -> [u8; 3] {
        [self.hue.min, self.saturation.min, self.value.min]
    }

    pub fn upper(&self) -> [u8; 3] {
        [self.hue.max, self.saturation.max, self.value.max]
    }

    pub fn validate(&self) -> Result<()> {
        if self.hue.max > HUE_MAX {
            return Err(LeafAreaError::Config(format!(
                "hue upper bound {} exceeds {}",
                self.hue.max, HUE_MAX
            )));
        }
        for (name, channel) in [
            ("hue", self.hue),
            ("saturation", self.saturation),
            ("value", self.value),
        ] {
            if channel.min > channel.max {
                return Err(LeafAreaError::Config(format!(
                    "{} range is inverted: min {} > max {}",
                    name, channel.min, channel.max
                )));
            }
        }
        Ok(())
    }
}

/// A colour picked by the user, with the tolerance applied to every channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColorSample {
    pub h: u8,
    pub s: u8,
    pub v: u8,
    pub tolerance: u8,
}

impl ColorSample {
    /// Sample the HSV colour of a raster pixel
    pub fn from_pixel(raster: &RgbaImage, x: u32, y: u32, tolerance: u8) -> Result<Self> {
        let (width, height) = raster.dimensions();
        if x >= width || y >= height {
            return Err(LeafAreaError::InvalidInput(format!(
                "sample point ({}, {}) lies outside the {} x {} raster",
                x, y, width, height
            )));
        }
        let pixel = raster.get_pixel(x, y);
        let [h, s, v] = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        Ok(Self { h, s, v, tolerance })
    }
}

/// Convert an 8-bit RGB triple to HSV with hue in half degrees (0..=179)
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let mut half_hue = (hue / 2.0).round() as u16;
    if half_hue > HUE_MAX as u16 {
        half_hue = 0;
    }

    [half_hue as u8, saturation.round() as u8, max as u8]
}

/// Convert a raster to HSV; the alpha channel is dropped
pub fn to_hsv_image(raster: &RgbaImage) -> HsvImage {
    map_colors(raster, |pixel| Rgb(rgb_to_hsv(pixel[0], pixel[1], pixel[2])))
}

/// Foreground wherever every channel lies inside `range`
pub fn segment_hsv(hsv: &HsvImage, range: &HsvRange) -> BinaryMask {
    let (width, height) = hsv.dimensions();
    BinaryMask::from_fn(width, height, |x, y| range.contains(hsv.get_pixel(x, y).0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_primary_colors() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_leaf_green_band() {
        let band = HsvRange::leaf_green();
        assert!(band.contains(rgb_to_hsv(40, 140, 30)));
        assert!(!band.contains(rgb_to_hsv(0, 0, 0)));
        assert!(!band.contains(rgb_to_hsv(200, 40, 40)));
        // bounds are inclusive
        assert!(band.contains([35, 40, 40]));
        assert!(band.contains([90, 255, 255]));
        assert!(!band.contains([91, 255, 255]));
    }

    #[test]
    fn test_sampled_range_bounds() {
        let sample = ColorSample { h: 40, s: 150, v: 150, tolerance: 20 };
        let range = HsvRange::from_sample(&sample);
        assert_eq!(range.lower(), [20, 130, 130]);
        assert_eq!(range.upper(), [60, 170, 170]);
    }

    #[test]
    fn test_sampled_range_is_clamped() {
        let sample = ColorSample { h: 170, s: 10, v: 250, tolerance: 20 };
        let range = HsvRange::from_sample(&sample);
        assert_eq!(range.lower(), [150, 0, 230]);
        assert_eq!(range.upper(), [179, 30, 255]);
        assert!(range.validate().is_ok());
    }

    #[test]
    fn test_alpha_is_ignored() {
        let mut raster = RgbaImage::new(2, 1);
        raster.put_pixel(0, 0, Rgba([30, 160, 40, 0]));
        raster.put_pixel(1, 0, Rgba([30, 160, 40, 255]));
        let mask = segment_hsv(&to_hsv_image(&raster), &HsvRange::leaf_green());
        assert_eq!(mask.count_foreground(), 2);
    }

    #[test]
    fn test_black_raster_yields_empty_mask() {
        let raster = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        let mask = segment_hsv(&to_hsv_image(&raster), &HsvRange::leaf_green());
        assert!(mask.is_empty());
    }

    #[test]
    fn test_sample_from_pixel() {
        let raster = RgbaImage::from_pixel(3, 3, Rgba([0, 255, 0, 255]));
        let sample = ColorSample::from_pixel(&raster, 1, 1, 15).unwrap();
        assert_eq!((sample.h, sample.s, sample.v, sample.tolerance), (60, 255, 255, 15));
        assert!(ColorSample::from_pixel(&raster, 3, 0, 15).is_err());
    }

    #[test]
    fn test_inverted_range_fails_validation() {
        let mut range = HsvRange::leaf_green();
        range.value = ChannelRange { min: 200, max: 100 };
        assert!(range.validate().is_err());
    }
}
