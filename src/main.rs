use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use rayon::prelude::*;

use leaf_area_rust_lib::errors::LeafAreaError;
use leaf_area_rust_lib::image_io::{get_image_files_in_dir, load_image, save_image};
use leaf_area_rust_lib::output::{report_name, write_report_json, write_summary_csv, SummaryRow};
use leaf_area_rust_lib::{
    analyze, analyze_with_preview, AnalysisReport, CirclePrior, ColorSample, Config,
    EllipseAnnotation, RegionRequest,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about = "LeafAreaR - Leaf Area Measurement in Calibrated Clips")]
struct Args {
    /// Path to input photograph or directory
    #[clap(short, long)]
    input: Option<String>,

    /// Path to output directory
    #[clap(short, long)]
    output: Option<String>,

    /// Path to configuration file (defaults are used when it does not exist)
    #[clap(short, long, default_value = "config.toml")]
    config: String,

    /// Circle prior in display coordinates: X,Y,R[,CONFIDENCE]
    #[clap(long, value_parser = parse_circle, conflicts_with_all = ["ellipse", "sample_color"])]
    circle: Option<CirclePrior>,

    /// Annotated ellipse in display coordinates: CX,CY,RX,RY,ANGLE_RAD
    #[clap(long, value_parser = parse_ellipse, conflicts_with = "sample_color")]
    ellipse: Option<EllipseAnnotation>,

    /// Clip colour sample in HSV: H,S,V
    #[clap(long, value_parser = parse_hsv)]
    sample_color: Option<[u8; 3]>,

    /// Use the sample colour only when circle detection finds nothing
    #[clap(long, requires = "sample_color")]
    color_fallback: bool,

    /// Per-channel tolerance for the sample colour (overwrites config)
    #[clap(long)]
    tolerance: Option<u8>,

    /// Size of the canvas the region was drawn on: WxH (overwrites config)
    #[clap(long, value_parser = parse_dimensions)]
    display: Option<[u32; 2]>,

    /// Clip diameter in mm (overwrites config)
    #[clap(long)]
    clip_diameter: Option<f64>,

    /// Chamber diameter in mm; enables calibrated output (overwrites config)
    #[clap(long)]
    chamber_diameter: Option<f64>,

    /// Save annotated preview images
    #[clap(long)]
    previews: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn parse_numbers(value: &str, min: usize, max: usize) -> Result<Vec<f64>, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|e| format!("'{}': {}", part, e)))
        .collect::<Result<Vec<f64>, String>>()?;
    if numbers.len() < min || numbers.len() > max {
        return Err(format!("expected {} to {} comma-separated numbers", min, max));
    }
    Ok(numbers)
}

fn parse_circle(value: &str) -> Result<CirclePrior, String> {
    let n = parse_numbers(value, 3, 4)?;
    Ok(CirclePrior {
        center: (n[0], n[1]),
        radius: n[2],
        confidence: n.get(3).copied().unwrap_or(1.0),
    })
}

fn parse_ellipse(value: &str) -> Result<EllipseAnnotation, String> {
    let n = parse_numbers(value, 5, 5)?;
    Ok(EllipseAnnotation { cx: n[0], cy: n[1], rx: n[2], ry: n[3], angle: n[4] })
}

fn parse_hsv(value: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err("expected H,S,V".to_string());
    }
    let mut hsv = [0u8; 3];
    for (slot, part) in hsv.iter_mut().zip(parts) {
        *slot = part.parse().map_err(|e| format!("'{}': {}", part, e))?;
    }
    Ok(hsv)
}

fn parse_dimensions(value: &str) -> Result<[u32; 2], String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH".to_string())?;
    let w = w.trim().parse().map_err(|e| format!("width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("height: {}", e))?;
    Ok([w, h])
}

fn build_request(args: &Args, config: &Config) -> RegionRequest {
    let sample = args.sample_color.map(|[h, s, v]| ColorSample {
        h,
        s,
        v,
        tolerance: config.color_tolerance,
    });

    if let Some(prior) = args.circle {
        RegionRequest::CirclePrior(prior)
    } else if let Some(annotation) = args.ellipse {
        RegionRequest::Ellipse(annotation)
    } else if let (Some(sample), false) = (sample, args.color_fallback) {
        RegionRequest::SampledColor(sample)
    } else {
        RegionRequest::AutoDetect { fallback_sample: sample }
    }
}

/// Analyze one photograph and write its JSON report (and preview).
/// Outputs are named by the path below `input_root`.
fn process_file(
    path: &Path,
    input_root: &Path,
    request: &RegionRequest,
    config: &Config,
) -> (String, AnalysisReport) {
    let filename = report_name(input_root, path);

    let report = match load_image(path) {
        Ok(raster) => {
            let display = config.display_dimensions.map(|[w, h]| (w, h));
            if config.save_previews {
                let (report, preview) = analyze_with_preview(&raster, display, request, config);
                if let Some(preview) = preview {
                    let preview_path = PathBuf::from(&config.output_base_dir)
                        .join("previews")
                        .join(format!("{}.png", filename));
                    if let Err(e) = save_image(&preview, &preview_path) {
                        log::warn!("Could not save preview {}: {}", preview_path.display(), e);
                    }
                }
                report
            } else {
                analyze(&raster, display, request, config)
            }
        }
        Err(e) => {
            log::error!("Error loading {}: {}", path.display(), e);
            let error = LeafAreaError::InvalidInput(format!("could not decode {}: {}", path.display(), e));
            AnalysisReport::from_error((0, 0), &error)
        }
    };

    if let Err(e) = write_report_json(&report, &config.output_base_dir, &filename) {
        log::error!("Could not write report for {}: {}", filename, e);
    }

    match (&report.error, report.leaf_statistics()) {
        (Some(error), _) => log::warn!("{}: {}", filename, error),
        (None, Some(stats)) => log::info!(
            "{}: {} leaf regions, {} px, {:.2}% coverage",
            filename,
            stats.num_leaf_regions,
            stats.total_leaf_area_pixels,
            stats.leaf_coverage_percent
        ),
        (None, None) => log::info!("{}: no region measured", filename),
    }

    (filename, report)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    // Load configuration
    let mut config = if Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        log::info!("Config file {} not found, using defaults", args.config);
        Config::default()
    };

    // Override config with command-line arguments
    if let Some(input) = args.input.clone() {
        config.input_path = input;
    }
    if let Some(output) = args.output.clone() {
        config.output_base_dir = output;
    }
    if let Some(tolerance) = args.tolerance {
        config.color_tolerance = tolerance;
    }
    if let Some(display) = args.display {
        config.display_dimensions = Some(display);
    }
    if let Some(clip) = args.clip_diameter {
        config.clip_diameter_mm = clip;
    }
    if args.chamber_diameter.is_some() {
        config.chamber_diameter_mm = args.chamber_diameter;
    }
    if args.previews {
        config.save_previews = true;
    }

    config.validate()?;
    config.prepare_output_dirs()?;

    let request = build_request(&args, &config);
    log::debug!("Region request: {:?}", request);

    let start_time = Instant::now();
    let input_path = PathBuf::from(&config.input_path);

    let (files, input_root) = if input_path.is_file() {
        let root = input_path.parent().map(Path::to_path_buf).unwrap_or_default();
        (vec![input_path], root)
    } else if input_path.is_dir() {
        let files = get_image_files_in_dir(&input_path)
            .with_context(|| format!("scanning {}", input_path.display()))?;
        log::info!("Found {} photographs in {}", files.len(), input_path.display());
        (files, input_path)
    } else {
        bail!(LeafAreaError::InvalidPath(input_path));
    };

    let results: Vec<(String, AnalysisReport)> = if config.use_parallel && files.len() > 1 {
        files
            .par_iter()
            .map(|path| process_file(path, &input_root, &request, &config))
            .collect()
    } else {
        files
            .iter()
            .map(|path| process_file(path, &input_root, &request, &config))
            .collect()
    };

    let rows: Vec<SummaryRow> = results
        .iter()
        .map(|(filename, report)| SummaryRow { filename, report })
        .collect();
    let summary_path = write_summary_csv(&rows, &config.output_base_dir)
        .context("writing summary CSV")?;

    let failures = results.iter().filter(|(_, report)| !report.is_success()).count();
    log::info!(
        "Processed {} photograph(s), {} failed, summary at {} ({:.2} s)",
        results.len(),
        failures,
        summary_path.display(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
