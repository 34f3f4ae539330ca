// src/hough.rs - Gradient Hough circle detection for the auto-detect fallback

use image::{GrayImage, RgbaImage};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use std::f64::consts::PI;

/// Sensitivity parameters, tuned for clip-sized circles in phone photographs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughParams {
    /// Median blur aperture (odd)
    pub median_kernel: u32,
    /// Minimum distance between accepted circle centres
    pub min_distance: f64,
    /// Upper Canny threshold; the lower one is half of it
    pub canny_threshold: f32,
    /// Votes a centre needs (3x3 accumulator neighbourhood), and edge pixels a radius needs
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
    /// Number of ranked detections processed and reported in detail
    pub max_circles: usize,
}

impl Default for HoughParams {
    fn default() -> Self {
        Self {
            median_kernel: 5,
            min_distance: 100.0,
            canny_threshold: 60.0,
            accumulator_threshold: 40,
            min_radius: 30,
            max_radius: 200,
            max_circles: 5,
        }
    }
}

/// A circle found by the detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedCircle {
    pub center: (f64, f64),
    pub radius: f64,
    /// Accumulator votes around the centre; the ranking key
    pub votes: u32,
}

struct EdgePoint {
    x: f64,
    y: f64,
}

/// Smoothing applied before taking gradient directions
const GRADIENT_SIGMA: f32 = 1.5;

/// Share of the circumference that must be backed by edge pixels
const MIN_RING_COVERAGE: f64 = 0.35;

/// Centre candidates given a radius search
const MAX_EXAMINED_PEAKS: usize = 500;

/// Grayscale then median blur
pub fn preprocess(raster: &RgbaImage, median_kernel: u32) -> GrayImage {
    let gray = image::imageops::grayscale(raster);
    let radius = median_kernel / 2;
    if radius == 0 {
        gray
    } else {
        median_filter(&gray, radius, radius)
    }
}

/// Detect every circle, ranked by accumulator votes. Callers cap the list
/// at `max_circles` for processing; the full length is the number found.
pub fn detect_circles(raster: &RgbaImage, params: &HoughParams) -> Vec<DetectedCircle> {
    let (width, height) = raster.dimensions();
    if width < 3 || height < 3 || params.min_radius > params.max_radius {
        return Vec::new();
    }

    let blurred = preprocess(raster, params.median_kernel);
    let edges = canny(&blurred, params.canny_threshold / 2.0, params.canny_threshold);
    let smooth = gaussian_blur_f32(&blurred, GRADIENT_SIGMA);
    let grad_x = horizontal_sobel(&smooth);
    let grad_y = vertical_sobel(&smooth);

    let w = width as usize;
    let h = height as usize;
    let mut accumulator = vec![0u32; w * h];
    let mut edge_points = Vec::new();

    for (x, y, pixel) in edges.enumerate_pixels() {
        if pixel[0] == 0 {
            continue;
        }
        let dx = grad_x.get_pixel(x, y)[0] as f64;
        let dy = grad_y.get_pixel(x, y)[0] as f64;
        let magnitude = dx.hypot(dy);
        if magnitude == 0.0 {
            continue;
        }
        let (ux, uy) = (dx / magnitude, dy / magnitude);
        edge_points.push(EdgePoint { x: x as f64, y: y as f64 });

        // The centre lies along the gradient, on either side of the edge
        for sign in [-1.0, 1.0] {
            for r in params.min_radius..=params.max_radius {
                let cx = (x as f64 + sign * ux * r as f64).round();
                let cy = (y as f64 + sign * uy * r as f64).round();
                if cx < 0.0 || cy < 0.0 || cx >= width as f64 || cy >= height as f64 {
                    break;
                }
                accumulator[cy as usize * w + cx as usize] += 1;
            }
        }
    }

    log::debug!("Hough: {} edge pixels voted", edge_points.len());

    // Rounded votes for one centre scatter over neighbouring cells
    let smoothed = box_sum_3x3(&accumulator, w, h);
    let peaks = find_peaks(&smoothed, w, h, params.accumulator_threshold);
    let mut circles: Vec<DetectedCircle> = Vec::new();

    for &(index, votes) in peaks.iter().take(MAX_EXAMINED_PEAKS) {
        let center = refine_center(&accumulator, w, h, index);

        let too_close = circles.iter().any(|c| {
            (c.center.0 - center.0).hypot(c.center.1 - center.1) < params.min_distance
        });
        if too_close {
            continue;
        }

        if let Some(radius) = estimate_radius(center, &edge_points, params) {
            circles.push(DetectedCircle { center, radius, votes });
        }
    }

    log::debug!("Hough: {} peaks, {} circles accepted", peaks.len(), circles.len());
    circles
}

/// Sum over each interior cell's 3x3 neighbourhood; border cells stay zero
fn box_sum_3x3(accumulator: &[u32], w: usize, h: usize) -> Vec<u32> {
    let mut summed = vec![0u32; w * h];
    if w < 3 || h < 3 {
        return summed;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            summed[y * w + x] = [y - 1, y, y + 1]
                .iter()
                .map(|row| {
                    let i = row * w + x;
                    accumulator[i - 1] + accumulator[i] + accumulator[i + 1]
                })
                .sum();
        }
    }

    summed
}

/// Vote-weighted centroid of the 5x5 window around a peak
fn refine_center(accumulator: &[u32], w: usize, h: usize, index: usize) -> (f64, f64) {
    let (px, py) = (index % w, index / w);
    let (mut sum_x, mut sum_y, mut total) = (0.0, 0.0, 0.0);

    for y in py.saturating_sub(2)..=(py + 2).min(h - 1) {
        for x in px.saturating_sub(2)..=(px + 2).min(w - 1) {
            let v = accumulator[y * w + x] as f64;
            sum_x += v * x as f64;
            sum_y += v * y as f64;
            total += v;
        }
    }

    if total > 0.0 {
        (sum_x / total, sum_y / total)
    } else {
        (px as f64, py as f64)
    }
}

/// Local maxima above `threshold`, strongest first
fn find_peaks(accumulator: &[u32], w: usize, h: usize, threshold: u32) -> Vec<(usize, u32)> {
    let mut peaks = Vec::new();
    if w < 3 || h < 3 {
        return peaks;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let v = accumulator[i];
            if v > threshold
                && v > accumulator[i - 1]
                && v >= accumulator[i + 1]
                && v > accumulator[i - w]
                && v >= accumulator[i + w]
            {
                peaks.push((i, v));
            }
        }
    }

    peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    peaks
}

/// Pick the radius whose ring around `center` is best covered by edge pixels
fn estimate_radius(
    center: (f64, f64),
    edge_points: &[EdgePoint],
    params: &HoughParams,
) -> Option<f64> {
    let min_r = params.min_radius as usize;
    let max_r = params.max_radius as usize;
    let mut histogram = vec![0u32; max_r + 2];

    for p in edge_points {
        let d = (p.x - center.0).hypot(p.y - center.1).round();
        if d >= 0.0 && (d as usize) <= max_r + 1 {
            histogram[d as usize] += 1;
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for r in min_r.max(1)..=max_r {
        let support = histogram[r - 1] + histogram[r] + histogram[r + 1];
        if support < params.accumulator_threshold {
            continue;
        }
        // Fraction of the circumference covered by edge pixels
        let coverage = support as f64 / (2.0 * PI * r as f64);
        if coverage < MIN_RING_COVERAGE {
            continue;
        }
        match best {
            Some((_, best_coverage)) if coverage < best_coverage => {}
            _ => best = Some((r, coverage)),
        }
    }

    // Sub-bin radius from the edge distances inside the winning window
    best.map(|(r, _)| {
        let window = [r - 1, r, r + 1];
        let weight: u32 = window.iter().map(|&d| histogram[d]).sum();
        let weighted: f64 = window.iter().map(|&d| d as f64 * histogram[d] as f64).sum();
        weighted / weight as f64
    })
}
