use std::fs;
use std::path::{Component, Path, PathBuf};
use csv::Writer;

use crate::errors::Result;
use crate::pipeline::AnalysisReport;

/// One analysed photograph, for the batch summary
pub struct SummaryRow<'a> {
    pub filename: &'a str,
    pub report: &'a AnalysisReport,
}

/// Output name for a photograph: its path below `input_root` without the
/// extension, directories joined with `__`, so `a/leaf.png` becomes `a__leaf`
pub fn report_name(input_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(input_root).unwrap_or(path).with_extension("");
    let parts: Vec<&str> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        "unknown".to_string()
    } else {
        parts.join("__")
    }
}

/// Write a single report as pretty JSON to `<output_dir>/reports/<filename>.json`
pub fn write_report_json<P: AsRef<Path>>(
    report: &AnalysisReport,
    output_dir: P,
    filename: &str,
) -> Result<PathBuf> {
    let output_path = output_dir.as_ref().join("reports").join(format!("{}.json", filename));

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&output_path, serde_json::to_string_pretty(report)?)?;

    Ok(output_path)
}

fn optional_mm2(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Write `<output_dir>/summary.csv`, one row per photograph
pub fn write_summary_csv<P: AsRef<Path>>(rows: &[SummaryRow], output_dir: P) -> Result<PathBuf> {
    let output_path = output_dir.as_ref().join("summary.csv");

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = Writer::from_path(&output_path)?;

    writer.write_record([
        "Filename",
        "Image_Dimensions",
        "Strategy",
        "Region_Area_Pixels",
        "Num_Leaf_Regions",
        "Total_Leaf_Area_Pixels",
        "Largest_Leaf_Area",
        "Average_Leaf_Area",
        "Leaf_Coverage_Percent",
        "Region_Area_mm2",
        "Leaf_Area_mm2",
        "Error",
    ])?;

    for row in rows {
        let report = row.report;
        let mut record = vec![
            row.filename.to_string(),
            report.image_dimensions.clone(),
            report.strategy_name().to_string(),
        ];

        match report.leaf_statistics() {
            Some(stats) => record.extend([
                stats.region_area_pixels.to_string(),
                stats.num_leaf_regions.to_string(),
                stats.total_leaf_area_pixels.to_string(),
                stats.largest_leaf_area.to_string(),
                stats.average_leaf_area.to_string(),
                format!("{:.2}", stats.leaf_coverage_percent),
                optional_mm2(stats.region_area_mm2),
                optional_mm2(stats.leaf_area_mm2),
            ]),
            None => record.extend(std::iter::repeat(String::new()).take(8)),
        }

        record.push(report.error.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }

    writer.flush()?;

    Ok(output_path)
}
