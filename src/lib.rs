// src/lib.rs - Library interface for LeafAreaR

pub mod calibration;
pub mod color;
pub mod color_patch;
pub mod config;
pub mod contours;
pub mod enclosing;
pub mod errors;
pub mod geometry;
pub mod hough;
pub mod image_io;
pub mod mask;
pub mod output;
pub mod pipeline;
pub mod render;


// Re-export commonly used types and functions
pub use errors::{LeafAreaError, Result};
pub use config::Config;
pub use image_io::{load_image, save_image};

pub use calibration::CalibrationContext;
pub use color::{ColorSample, HsvRange};
pub use geometry::{CirclePrior, EllipseAnnotation, Region, ScaleFactors};
pub use mask::BinaryMask;

// Re-export the analysis entry points
pub use pipeline::{
    analyze,
    analyze_with_preview,
    analyze_ellipse,
    detect_circles_and_leaves,
    detect_clip_by_color_and_leaves,
    AnalysisReport,
    Detection,
    LeafStatistics,
    RegionRequest,
};
