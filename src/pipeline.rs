// src/pipeline.rs - Region strategy selection and leaf-area analysis entry points

use image::RgbaImage;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};

use crate::calibration::{coverage_percent, round_pixels, round_two_decimals, CalibrationContext};
use crate::color::{segment_hsv, to_hsv_image, ColorSample, HsvImage};
use crate::color_patch::detect_clip_by_color;
use crate::config::Config;
use crate::contours::{extract_regions, summarize};
use crate::errors::{LeafAreaError, Result};
use crate::geometry::{map_circle, map_ellipse, CirclePrior, EllipseAnnotation, Region, ScaleFactors};
use crate::hough::{detect_circles, DetectedCircle};
use crate::mask::{rasterize_region, BinaryMask};
use crate::render::render_preview;

pub const NO_CIRCLE_MESSAGE: &str = "No valid circle found for analysis";

/// How the measurement region should be obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegionRequest {
    /// Hough detection; when nothing is found and a sample is given, fall back to colour
    AutoDetect { fallback_sample: Option<ColorSample> },
    /// A circle estimate in display coordinates
    CirclePrior(CirclePrior),
    /// A user-drawn ellipse in display coordinates
    Ellipse(EllipseAnnotation),
    /// Find the clip by a sampled colour
    SampledColor(ColorSample),
}

/// Circle geometry as reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleInfo {
    pub center: String,
    pub radius: u64,
    pub area_pixels: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<u32>,
}

/// Ellipse geometry as reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EllipseInfo {
    pub center: String,
    pub radius_x: u64,
    pub radius_y: u64,
    pub angle_degrees: f64,
    pub area_pixels: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRangeUsed {
    pub lower_hsv: [u8; 3],
    pub upper_hsv: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipInfo {
    pub center: String,
    pub radius: u64,
    pub area_pixels: u64,
    pub color_range_used: ColorRangeUsed,
}

/// Leaf statistics inside the measured region, shared by every strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafStatistics {
    /// Analytic area of the measured region
    pub region_area_pixels: u64,
    pub num_leaf_regions: usize,
    pub total_leaf_area_pixels: u64,
    pub largest_leaf_area: u64,
    pub average_leaf_area: u64,
    pub leaf_coverage_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_area_mm2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaf_area_mm2: Option<f64>,
}

/// Geometry and statistics, one variant per strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Detection {
    CirclePrior {
        circle: CircleInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        chamber: Option<CircleInfo>,
        leaf_analysis: LeafStatistics,
    },
    HoughCircles {
        circles_found: usize,
        circle_info: Vec<CircleInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        chamber: Option<CircleInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        leaf_analysis: Option<LeafStatistics>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    ColorPatch {
        clip_detection: ClipInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        chamber: Option<CircleInfo>,
        leaf_analysis: LeafStatistics,
    },
    Ellipse {
        clip: EllipseInfo,
        #[serde(skip_serializing_if = "Option::is_none")]
        chamber: Option<EllipseInfo>,
        leaf_analysis: LeafStatistics,
    },
}

/// The record handed back to the caller. `error` is set instead of `detection`
/// when the analysis fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub image_dimensions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisReport {
    fn succeeded(dimensions: (u32, u32), detection: Detection) -> Self {
        Self {
            image_dimensions: format_dimensions(dimensions),
            detection: Some(detection),
            error: None,
        }
    }

    /// Report for a failed analysis; `NoRegionFound` keeps just its message
    pub fn from_error(dimensions: (u32, u32), error: &LeafAreaError) -> Self {
        let message = match error {
            LeafAreaError::NoRegionFound(message) => message.clone(),
            other => other.to_string(),
        };
        Self {
            image_dimensions: format_dimensions(dimensions),
            detection: None,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn leaf_statistics(&self) -> Option<&LeafStatistics> {
        match self.detection.as_ref()? {
            Detection::CirclePrior { leaf_analysis, .. }
            | Detection::ColorPatch { leaf_analysis, .. }
            | Detection::Ellipse { leaf_analysis, .. } => Some(leaf_analysis),
            Detection::HoughCircles { leaf_analysis, .. } => leaf_analysis.as_ref(),
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        match self.detection {
            Some(Detection::CirclePrior { .. }) => "circle_prior",
            Some(Detection::HoughCircles { .. }) => "hough_circles",
            Some(Detection::ColorPatch { .. }) => "color_patch",
            Some(Detection::Ellipse { .. }) => "ellipse",
            None => "none",
        }
    }
}

/// Regions and leaf pixels of a completed measurement, for preview rendering
pub struct Overlay {
    pub reference: Region,
    pub chamber: Option<Region>,
    pub leaf_mask: BinaryMask,
}

struct Outcome {
    detection: Detection,
    overlay: Option<Overlay>,
}

struct LeafMeasurement {
    statistics: LeafStatistics,
    chamber: Option<Region>,
    leaf_mask: BinaryMask,
}

fn format_dimensions((width, height): (u32, u32)) -> String {
    format!("{} x {}", width, height)
}

fn format_center(center: (f64, f64)) -> String {
    format!("({}, {})", center.0.round() as i64, center.1.round() as i64)
}

fn circle_info(region: &Region, votes: Option<u32>) -> CircleInfo {
    CircleInfo {
        center: format_center(region.center()),
        radius: round_pixels(region.radii().0),
        area_pixels: round_pixels(region.analytic_area()),
        votes,
    }
}

fn ellipse_info(region: &Region) -> EllipseInfo {
    let (radius_x, radius_y) = region.radii();
    EllipseInfo {
        center: format_center(region.center()),
        radius_x: round_pixels(radius_x),
        radius_y: round_pixels(radius_y),
        angle_degrees: round_two_decimals(region.angle_deg()),
        area_pixels: round_pixels(region.analytic_area()),
    }
}

/// Leaf pixels inside `reference` (or its chamber, when calibrated):
/// region mask AND colour mask, then region extraction with the noise filter
fn measure_leaf(
    hsv: &HsvImage,
    reference: &Region,
    min_area: f64,
    calibration: Option<&CalibrationContext>,
    config: &Config,
) -> Result<LeafMeasurement> {
    reference.validate()?;

    let chamber = calibration.map(|c| c.derive_chamber(reference));
    let measured = chamber.unwrap_or(*reference);
    let (width, height) = hsv.dimensions();

    let leaf_mask = {
        let region_mask = rasterize_region(&measured, width, height);
        let color_mask = segment_hsv(hsv, &config.leaf_hsv_range);
        color_mask.and(&region_mask)
    };

    let stats = summarize(&extract_regions(&leaf_mask, min_area));
    let region_area = measured.analytic_area();

    let (region_area_mm2, leaf_area_mm2) = match calibration {
        Some(c) => (
            Some(round_two_decimals(c.pixel_area_to_mm2(region_area, reference))),
            Some(round_two_decimals(c.pixel_area_to_mm2(stats.total_area, reference))),
        ),
        None => (None, None),
    };

    let statistics = LeafStatistics {
        region_area_pixels: round_pixels(region_area),
        num_leaf_regions: stats.count,
        total_leaf_area_pixels: round_pixels(stats.total_area),
        largest_leaf_area: round_pixels(stats.largest_area),
        average_leaf_area: round_pixels(stats.average_area),
        leaf_coverage_percent: coverage_percent(stats.total_area, region_area),
        region_area_mm2,
        leaf_area_mm2,
    };

    log::debug!(
        "Leaf measurement: {} regions, {} px total, {:.2}% coverage",
        statistics.num_leaf_regions,
        statistics.total_leaf_area_pixels,
        statistics.leaf_coverage_percent
    );

    Ok(LeafMeasurement {
        statistics,
        chamber,
        leaf_mask,
    })
}

fn circle_prior_pipeline(
    hsv: &HsvImage,
    prior: &CirclePrior,
    scale: &ScaleFactors,
    config: &Config,
) -> Result<Outcome> {
    let circle = map_circle(prior, scale);
    log::info!(
        "Using circle prior (confidence {:.2}) at {} r={:.1}",
        prior.confidence,
        format_center(circle.center()),
        circle.radii().0
    );

    let calibration = config.calibration()?;
    let measurement = measure_leaf(hsv, &circle, config.min_leaf_area_circle, calibration.as_ref(), config)?;

    Ok(Outcome {
        detection: Detection::CirclePrior {
            circle: circle_info(&circle, None),
            chamber: measurement.chamber.as_ref().map(|c| circle_info(c, None)),
            leaf_analysis: measurement.statistics,
        },
        overlay: Some(Overlay {
            reference: circle,
            chamber: measurement.chamber,
            leaf_mask: measurement.leaf_mask,
        }),
    })
}

/// The largest radius is the primary region; smaller hits tend to be clip hardware
fn primary_circle(circles: &[DetectedCircle]) -> Option<&DetectedCircle> {
    circles.iter().fold(None, |best: Option<&DetectedCircle>, c| match best {
        Some(b) if b.radius >= c.radius => Some(b),
        _ => Some(c),
    })
}

fn hough_pipeline(
    raster: &RgbaImage,
    hsv: &HsvImage,
    fallback_sample: Option<&ColorSample>,
    config: &Config,
) -> Result<Outcome> {
    let params = config.hough_params();
    let circles = detect_circles(raster, &params);
    let processed = &circles[..circles.len().min(params.max_circles)];
    log::info!(
        "Hough detection found {} circle(s), processing {}",
        circles.len(),
        processed.len()
    );

    let primary = match primary_circle(processed) {
        Some(c) => *c,
        None => {
            if let Some(sample) = fallback_sample {
                log::info!("No circles detected, falling back to clip colour detection");
                return color_patch_pipeline(hsv, sample, config);
            }
            return Ok(Outcome {
                detection: Detection::HoughCircles {
                    circles_found: 0,
                    circle_info: Vec::new(),
                    chamber: None,
                    leaf_analysis: None,
                    message: Some(NO_CIRCLE_MESSAGE.to_string()),
                },
                overlay: None,
            });
        }
    };

    let circle_infos = processed
        .iter()
        .map(|c| circle_info(&Region::Circle { center: c.center, radius: c.radius }, Some(c.votes)))
        .collect();

    let region = Region::Circle { center: primary.center, radius: primary.radius };
    let calibration = config.calibration()?;
    let measurement = measure_leaf(hsv, &region, config.min_leaf_area_circle, calibration.as_ref(), config)?;

    Ok(Outcome {
        detection: Detection::HoughCircles {
            circles_found: circles.len(),
            circle_info: circle_infos,
            chamber: measurement.chamber.as_ref().map(|c| circle_info(c, None)),
            leaf_analysis: Some(measurement.statistics),
            message: None,
        },
        overlay: Some(Overlay {
            reference: region,
            chamber: measurement.chamber,
            leaf_mask: measurement.leaf_mask,
        }),
    })
}

fn color_patch_pipeline(hsv: &HsvImage, sample: &ColorSample, config: &Config) -> Result<Outcome> {
    let clip = detect_clip_by_color(hsv, sample, config.min_clip_area)?;
    log::info!(
        "Clip found by colour at {} r={:.1}",
        format_center(clip.region.center()),
        clip.region.radii().0
    );

    let calibration = config.calibration()?;
    let measurement = measure_leaf(hsv, &clip.region, config.min_leaf_area_circle, calibration.as_ref(), config)?;

    Ok(Outcome {
        detection: Detection::ColorPatch {
            clip_detection: ClipInfo {
                center: format_center(clip.region.center()),
                radius: round_pixels(clip.region.radii().0),
                area_pixels: round_pixels(clip.region.analytic_area()),
                color_range_used: ColorRangeUsed {
                    lower_hsv: clip.color_range.lower(),
                    upper_hsv: clip.color_range.upper(),
                },
            },
            chamber: measurement.chamber.as_ref().map(|c| circle_info(c, None)),
            leaf_analysis: measurement.statistics,
        },
        overlay: Some(Overlay {
            reference: clip.region,
            chamber: measurement.chamber,
            leaf_mask: measurement.leaf_mask,
        }),
    })
}

fn ellipse_pipeline(
    hsv: &HsvImage,
    annotation: &EllipseAnnotation,
    scale: &ScaleFactors,
    config: &Config,
) -> Result<Outcome> {
    let clip = map_ellipse(annotation, scale);
    log::info!(
        "Using annotated ellipse at {} radii ({:.1}, {:.1}) angle {:.1} deg",
        format_center(clip.center()),
        clip.radii().0,
        clip.radii().1,
        clip.angle_deg()
    );

    let calibration = config.calibration()?;
    let measurement = measure_leaf(hsv, &clip, config.min_leaf_area_ellipse, calibration.as_ref(), config)?;

    Ok(Outcome {
        detection: Detection::Ellipse {
            clip: ellipse_info(&clip),
            chamber: measurement.chamber.as_ref().map(ellipse_info),
            leaf_analysis: measurement.statistics,
        },
        overlay: Some(Overlay {
            reference: clip,
            chamber: measurement.chamber,
            leaf_mask: measurement.leaf_mask,
        }),
    })
}

/// Pick the pipeline for a request and run it
fn run_request(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    request: &RegionRequest,
    config: &Config,
) -> Result<Outcome> {
    let raster_dims = raster.dimensions();
    let scale = ScaleFactors::between(raster_dims, display_dims.unwrap_or(raster_dims))?;
    let hsv = to_hsv_image(raster);

    match request {
        RegionRequest::CirclePrior(prior) if prior.confidence > config.prior_confidence_threshold => {
            circle_prior_pipeline(&hsv, prior, &scale, config)
        }
        RegionRequest::CirclePrior(prior) => {
            log::info!(
                "Circle prior confidence {:.2} is not above {:.2}, running detection",
                prior.confidence,
                config.prior_confidence_threshold
            );
            hough_pipeline(raster, &hsv, None, config)
        }
        RegionRequest::AutoDetect { fallback_sample } => {
            hough_pipeline(raster, &hsv, fallback_sample.as_ref(), config)
        }
        RegionRequest::SampledColor(sample) => color_patch_pipeline(&hsv, sample, config),
        RegionRequest::Ellipse(annotation) => ellipse_pipeline(&hsv, annotation, &scale, config),
    }
}

fn run_guarded(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    request: &RegionRequest,
    config: &Config,
) -> Result<Outcome> {
    panic::catch_unwind(AssertUnwindSafe(|| run_request(raster, display_dims, request, config)))
        .unwrap_or_else(|payload| {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(LeafAreaError::ProcessingFailure(detail))
        })
}

/// Analyze leaf area for a request. Never fails: errors are reported in
/// `AnalysisReport::error`.
pub fn analyze(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    request: &RegionRequest,
    config: &Config,
) -> AnalysisReport {
    match run_guarded(raster, display_dims, request, config) {
        Ok(outcome) => AnalysisReport::succeeded(raster.dimensions(), outcome.detection),
        Err(e) => {
            log::warn!("Analysis failed: {}", e);
            AnalysisReport::from_error(raster.dimensions(), &e)
        }
    }
}

/// Like [`analyze`], also returning an annotated copy of the raster when a
/// region was measured
pub fn analyze_with_preview(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    request: &RegionRequest,
    config: &Config,
) -> (AnalysisReport, Option<RgbaImage>) {
    match run_guarded(raster, display_dims, request, config) {
        Ok(outcome) => {
            let preview = outcome
                .overlay
                .as_ref()
                .map(|overlay| render_preview(raster, overlay, config));
            (AnalysisReport::succeeded(raster.dimensions(), outcome.detection), preview)
        }
        Err(e) => {
            log::warn!("Analysis failed: {}", e);
            (AnalysisReport::from_error(raster.dimensions(), &e), None)
        }
    }
}

/// Circle workflow: use the prior when confident, otherwise detect
pub fn detect_circles_and_leaves(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    prior: Option<CirclePrior>,
    config: &Config,
) -> AnalysisReport {
    let request = match prior {
        Some(prior) => RegionRequest::CirclePrior(prior),
        None => RegionRequest::AutoDetect { fallback_sample: None },
    };
    analyze(raster, display_dims, &request, config)
}

/// Colour workflow: locate the clip by a sampled colour
pub fn detect_clip_by_color_and_leaves(
    raster: &RgbaImage,
    sample: ColorSample,
    config: &Config,
) -> AnalysisReport {
    analyze(raster, None, &RegionRequest::SampledColor(sample), config)
}

/// Annotation workflow: measure inside a user-drawn ellipse
pub fn analyze_ellipse(
    raster: &RgbaImage,
    display_dims: Option<(u32, u32)>,
    annotation: EllipseAnnotation,
    config: &Config,
) -> AnalysisReport {
    analyze(raster, display_dims, &RegionRequest::Ellipse(annotation), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_primary_circle_is_largest() {
        let circles = [
            DetectedCircle { center: (10.0, 10.0), radius: 40.0, votes: 90 },
            DetectedCircle { center: (200.0, 10.0), radius: 75.0, votes: 60 },
            DetectedCircle { center: (400.0, 10.0), radius: 50.0, votes: 80 },
        ];
        assert_eq!(primary_circle(&circles).unwrap().radius, 75.0);
        assert!(primary_circle(&[]).is_none());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_dimensions((1000, 800)), "1000 x 800");
        assert_eq!(format_center((499.6, 400.2)), "(500, 400)");
    }

    #[test]
    fn test_failed_report_carries_message_only() {
        let report = AnalysisReport::from_error(
            (10, 20),
            &LeafAreaError::NoRegionFound("No clip-colored regions found".to_string()),
        );
        assert_eq!(report.image_dimensions, "10 x 20");
        assert!(report.detection.is_none());
        assert_eq!(report.error.as_deref(), Some("No clip-colored regions found"));
        assert_eq!(report.strategy_name(), "none");
    }

    #[test]
    fn test_degenerate_prior_is_reported_not_raised() {
        let raster = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let prior = CirclePrior { center: (25.0, 25.0), radius: 0.0, confidence: 0.9 };
        let report = detect_circles_and_leaves(&raster, None, Some(prior), &Config::default());
        assert!(!report.is_success());
        assert!(report.error.unwrap().contains("radii must be positive"));
    }

    #[test]
    fn test_empty_raster_is_invalid_input() {
        let raster = RgbaImage::new(0, 0);
        let report = analyze(&raster, None, &RegionRequest::AutoDetect { fallback_sample: None }, &Config::default());
        assert_eq!(report.image_dimensions, "0 x 0");
        assert!(report.error.unwrap().starts_with("Invalid input"));
    }
}
