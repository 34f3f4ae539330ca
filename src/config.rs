// src/config.rs - Analysis configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::CalibrationContext;
use crate::color::HsvRange;
use crate::errors::{LeafAreaError, Result};
use crate::hough::HoughParams;

/// Configuration for LeafAreaR
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub input_path: String,
    pub output_base_dir: String,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    /// Size of the canvas that region annotations were drawn on.
    /// `None` means annotations are already in raster coordinates.
    #[serde(default)]
    pub display_dimensions: Option<[u32; 2]>,

    // Noise filtering, in pixels
    #[serde(default = "default_min_leaf_area_circle")]
    pub min_leaf_area_circle: f64,

    #[serde(default = "default_min_leaf_area_ellipse")]
    pub min_leaf_area_ellipse: f64,

    #[serde(default = "default_min_clip_area")]
    pub min_clip_area: f64,

    // Circle priors at or below this confidence fall through to detection
    #[serde(default = "default_prior_confidence_threshold")]
    pub prior_confidence_threshold: f64,

    // Calibration
    #[serde(default = "default_clip_diameter_mm")]
    pub clip_diameter_mm: f64,

    #[serde(default)]
    pub chamber_diameter_mm: Option<f64>,

    // Clip colour sampling
    #[serde(default = "default_color_tolerance")]
    pub color_tolerance: u8,

    // Hough circle detection
    #[serde(default = "default_hough_median_kernel")]
    pub hough_median_kernel: u32,

    #[serde(default = "default_hough_min_distance")]
    pub hough_min_distance: f64,

    #[serde(default = "default_hough_canny_threshold")]
    pub hough_canny_threshold: f32,

    #[serde(default = "default_hough_accumulator_threshold")]
    pub hough_accumulator_threshold: u32,

    #[serde(default = "default_hough_min_radius")]
    pub hough_min_radius: u32,

    #[serde(default = "default_hough_max_radius")]
    pub hough_max_radius: u32,

    #[serde(default = "default_hough_max_circles")]
    pub hough_max_circles: usize,

    // Preview rendering
    #[serde(default)]
    pub save_previews: bool,

    #[serde(default = "default_preview_region_color_rgb")]
    pub preview_region_color_rgb: [u8; 3],

    #[serde(default = "default_preview_chamber_color_rgb")]
    pub preview_chamber_color_rgb: [u8; 3],

    #[serde(default = "default_preview_leaf_color_rgb")]
    pub preview_leaf_color_rgb: [u8; 3],

    // Leaf segmentation; kept last so it serializes as a trailing table
    #[serde(default)]
    pub leaf_hsv_range: HsvRange,
}

fn default_parallel() -> bool {
    true
}

fn default_min_leaf_area_circle() -> f64 {
    100.0
}

fn default_min_leaf_area_ellipse() -> f64 {
    50.0
}

fn default_min_clip_area() -> f64 {
    100.0
}

fn default_prior_confidence_threshold() -> f64 {
    0.5
}

fn default_clip_diameter_mm() -> f64 {
    25.0
}

fn default_color_tolerance() -> u8 {
    20
}

fn default_hough_median_kernel() -> u32 {
    5
}

fn default_hough_min_distance() -> f64 {
    100.0
}

fn default_hough_canny_threshold() -> f32 {
    60.0
}

fn default_hough_accumulator_threshold() -> u32 {
    40
}

fn default_hough_min_radius() -> u32 {
    30
}

fn default_hough_max_radius() -> u32 {
    200
}

fn default_hough_max_circles() -> usize {
    5
}

fn default_preview_region_color_rgb() -> [u8; 3] {
    [68, 255, 68] // Annotation green
}

fn default_preview_chamber_color_rgb() -> [u8; 3] {
    [255, 215, 0] // Golden yellow
}

fn default_preview_leaf_color_rgb() -> [u8; 3] {
    [255, 0, 255] // Bright pink
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: "./input".to_string(),
            output_base_dir: "./output".to_string(),
            use_parallel: default_parallel(),
            display_dimensions: None,
            min_leaf_area_circle: default_min_leaf_area_circle(),
            min_leaf_area_ellipse: default_min_leaf_area_ellipse(),
            min_clip_area: default_min_clip_area(),
            prior_confidence_threshold: default_prior_confidence_threshold(),
            clip_diameter_mm: default_clip_diameter_mm(),
            chamber_diameter_mm: None,
            color_tolerance: default_color_tolerance(),
            hough_median_kernel: default_hough_median_kernel(),
            hough_min_distance: default_hough_min_distance(),
            hough_canny_threshold: default_hough_canny_threshold(),
            hough_accumulator_threshold: default_hough_accumulator_threshold(),
            hough_min_radius: default_hough_min_radius(),
            hough_max_radius: default_hough_max_radius(),
            hough_max_circles: default_hough_max_circles(),
            save_previews: false,
            preview_region_color_rgb: default_preview_region_color_rgb(),
            preview_chamber_color_rgb: default_preview_chamber_color_rgb(),
            preview_leaf_color_rgb: default_preview_leaf_color_rgb(),
            leaf_hsv_range: HsvRange::leaf_green(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LeafAreaError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            LeafAreaError::Config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            LeafAreaError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }

    /// Validate analysis parameters
    pub fn validate(&self) -> Result<()> {
        self.leaf_hsv_range.validate()?;

        for (name, value) in [
            ("min_leaf_area_circle", self.min_leaf_area_circle),
            ("min_leaf_area_ellipse", self.min_leaf_area_ellipse),
            ("min_clip_area", self.min_clip_area),
        ] {
            if !(value >= 0.0) {
                return Err(LeafAreaError::Config(format!("{} must be >= 0", name)));
            }
        }

        if !(0.0..=1.0).contains(&self.prior_confidence_threshold) {
            return Err(LeafAreaError::Config(
                "prior_confidence_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(self.clip_diameter_mm > 0.0) {
            return Err(LeafAreaError::Config(
                "clip_diameter_mm must be > 0.0".to_string(),
            ));
        }

        if let Some(chamber) = self.chamber_diameter_mm {
            if !(chamber > 0.0) {
                return Err(LeafAreaError::Config(
                    "chamber_diameter_mm must be > 0.0".to_string(),
                ));
            }
        }

        if let Some([w, h]) = self.display_dimensions {
            if w == 0 || h == 0 {
                return Err(LeafAreaError::Config(
                    "display_dimensions must both be > 0".to_string(),
                ));
            }
        }

        if self.hough_median_kernel % 2 == 0 {
            return Err(LeafAreaError::Config(
                "hough_median_kernel must be odd".to_string(),
            ));
        }

        if self.hough_min_radius == 0 || self.hough_min_radius >= self.hough_max_radius {
            return Err(LeafAreaError::Config(
                "hough_min_radius must be > 0 and < hough_max_radius".to_string(),
            ));
        }

        if !(self.hough_canny_threshold > 0.0) || !(self.hough_min_distance > 0.0) {
            return Err(LeafAreaError::Config(
                "hough_canny_threshold and hough_min_distance must be > 0".to_string(),
            ));
        }

        if self.hough_accumulator_threshold == 0 || self.hough_max_circles == 0 {
            return Err(LeafAreaError::Config(
                "hough_accumulator_threshold and hough_max_circles must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and create the output directories
    pub fn prepare_output_dirs(&self) -> Result<()> {
        let base_dir = PathBuf::from(&self.output_base_dir);
        fs::create_dir_all(base_dir.join("reports"))?;
        if self.save_previews {
            fs::create_dir_all(base_dir.join("previews"))?;
        }
        Ok(())
    }

    /// Clip-to-chamber calibration, present when a chamber diameter is set.
    /// Non-positive diameters are an `InvalidInput` error.
    pub fn calibration(&self) -> Result<Option<CalibrationContext>> {
        self.chamber_diameter_mm
            .map(|chamber| CalibrationContext::new(self.clip_diameter_mm, chamber))
            .transpose()
    }

    pub fn hough_params(&self) -> HoughParams {
        HoughParams {
            median_kernel: self.hough_median_kernel,
            min_distance: self.hough_min_distance,
            canny_threshold: self.hough_canny_threshold,
            accumulator_threshold: self.hough_accumulator_threshold,
            min_radius: self.hough_min_radius,
            max_radius: self.hough_max_radius,
            max_circles: self.hough_max_circles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.calibration().unwrap().is_none());
        assert_eq!(config.hough_params(), HoughParams::default());
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: Config = toml::from_str(
            "input_path = \"photos\"\noutput_base_dir = \"out\"\nchamber_diameter_mm = 20.0\n",
        )
        .unwrap();
        assert_eq!(config.leaf_hsv_range, HsvRange::leaf_green());
        assert_eq!(config.min_leaf_area_ellipse, 50.0);
        let calibration = config.calibration().unwrap().unwrap();
        assert_eq!(calibration.reference_diameter_mm, 25.0);
        assert_eq!(calibration.target_diameter_mm, 20.0);
    }

    #[test]
    fn test_hsv_range_from_toml() {
        let config: Config = toml::from_str(
            r#"
            input_path = "photos"
            output_base_dir = "out"

            [leaf_hsv_range]
            hue = { min = 30, max = 85 }
            saturation = { min = 50, max = 255 }
            value = { min = 50, max = 255 }
            "#,
        )
        .unwrap();
        assert_eq!(config.leaf_hsv_range.hue.max, 85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.hough_median_kernel = 4;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chamber_diameter_mm = Some(0.0);
        assert!(config.validate().is_err());
        assert!(matches!(config.calibration(), Err(LeafAreaError::InvalidInput(_))));

        let mut config = Config::default();
        config.clip_diameter_mm = -25.0;
        config.chamber_diameter_mm = Some(20.0);
        assert!(config.calibration().is_err());

        let mut config = Config::default();
        config.leaf_hsv_range.hue.max = 200;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hough_min_radius = 300;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = std::env::temp_dir().join("leaf_area_config_roundtrip");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let mut config = Config::default();
        config.chamber_diameter_mm = Some(18.5);
        config.save_to_file(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.chamber_diameter_mm, Some(18.5));
        assert_eq!(reloaded.leaf_hsv_range, config.leaf_hsv_range);
        fs::remove_dir_all(&dir).ok();
    }
}
