// src/contours.rs - Connected foreground regions and their areas

use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

use crate::mask::BinaryMask;

/// An external boundary traced around one connected foreground component
#[derive(Debug, Clone)]
pub struct ExtractedRegion {
    /// Boundary pixels in tracing order
    pub boundary: Vec<Point<i32>>,
    /// Area enclosed by the boundary polygon, in pixels
    pub area: f64,
}

/// Aggregate statistics over the regions that survived the area filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionStats {
    pub count: usize,
    pub areas: Vec<f64>,
    pub total_area: f64,
    pub largest_area: f64,
    pub average_area: f64,
}

/// Polygon area of a closed boundary (shoelace formula)
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();

    twice_area.abs() as f64 / 2.0
}

/// Trace the outermost boundaries of 8-connected foreground components.
/// Components nested inside holes of another component are not reported.
pub fn external_regions(mask: &BinaryMask) -> Vec<ExtractedRegion> {
    find_contours::<i32>(mask.as_image())
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            let area = contour_area(&contour.points);
            ExtractedRegion {
                boundary: contour.points,
                area,
            }
        })
        .collect()
}

/// External regions whose area is at least `min_area`
pub fn extract_regions(mask: &BinaryMask, min_area: f64) -> Vec<ExtractedRegion> {
    let regions = external_regions(mask);
    let total = regions.len();
    let kept: Vec<ExtractedRegion> = regions
        .into_iter()
        .filter(|region| region.area >= min_area)
        .collect();

    log::debug!(
        "Region extraction: {} of {} external regions kept (min area {:.0} px)",
        kept.len(),
        total,
        min_area
    );

    kept
}

/// Count, total, largest and mean area. The mean of no regions is zero.
pub fn summarize(regions: &[ExtractedRegion]) -> RegionStats {
    let areas: Vec<f64> = regions.iter().map(|r| r.area).collect();
    let count = areas.len();
    let total_area = areas.iter().fold(0.0, |acc, area| acc + area);
    let largest_area = areas.iter().cloned().fold(0.0, f64::max);
    let average_area = if count > 0 { total_area / count as f64 } else { 0.0 };

    RegionStats {
        count,
        areas,
        total_area,
        largest_area,
        average_area,
    }
}

/// The region with the largest area, if any
pub fn largest_region(regions: Vec<ExtractedRegion>) -> Option<ExtractedRegion> {
    regions
        .into_iter()
        .max_by(|a, b| a.area.total_cmp(&b.area))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn square_mask(width: u32, height: u32, squares: &[(u32, u32, u32)]) -> BinaryMask {
        BinaryMask::from_fn(width, height, |x, y| {
            squares
                .iter()
                .any(|&(sx, sy, side)| x >= sx && x < sx + side && y >= sy && y < sy + side)
        })
    }

    #[test]
    fn test_contour_area_of_square() {
        let points = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_approx_eq!(contour_area(&points), 100.0);
        assert_approx_eq!(contour_area(&points[..2]), 0.0);
    }

    #[test]
    fn test_two_separate_squares() {
        // Boundary runs through pixel centres, so a side-n square encloses (n-1)^2
        let mask = square_mask(60, 40, &[(2, 2, 11), (30, 5, 21)]);
        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 2);

        let mut areas: Vec<f64> = regions.iter().map(|r| r.area).collect();
        areas.sort_by(|a, b| a.total_cmp(b));
        assert_approx_eq!(areas[0], 100.0);
        assert_approx_eq!(areas[1], 400.0);
    }

    #[test]
    fn test_diagonal_pixels_are_connected() {
        let mut mask = square_mask(30, 30, &[(2, 2, 6), (8, 8, 6)]);
        mask.set(20, 20, true);
        assert_eq!(external_regions(&mask).len(), 2);
    }

    #[test]
    fn test_min_area_threshold_is_inclusive() {
        let mask = square_mask(60, 40, &[(2, 2, 11), (30, 5, 21)]);
        assert_eq!(extract_regions(&mask, 100.0).len(), 2);
        assert_eq!(extract_regions(&mask, 100.5).len(), 1);
        assert_eq!(extract_regions(&mask, 401.0).len(), 0);
    }

    #[test]
    fn test_hole_contents_are_not_external() {
        // A ring with a filled island in its hole
        let mask = BinaryMask::from_fn(40, 40, |x, y| {
            let ring = (2..38).contains(&x) && (2..38).contains(&y)
                && !((6..34).contains(&x) && (6..34).contains(&y));
            let island = (15..25).contains(&x) && (15..25).contains(&y);
            ring || island
        });
        let regions = external_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_approx_eq!(regions[0].area, 35.0 * 35.0);
    }

    #[test]
    fn test_summary_of_empty_set() {
        let stats = summarize(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.total_area, 0.0);
        assert!(stats.total_area.is_sign_positive());
        assert_eq!(stats.largest_area, 0.0);
        assert_eq!(stats.average_area, 0.0);
    }

    #[test]
    fn test_summary_statistics() {
        let mask = square_mask(60, 40, &[(2, 2, 11), (30, 5, 21)]);
        let stats = summarize(&extract_regions(&mask, 0.0));
        assert_eq!(stats.count, 2);
        assert_approx_eq!(stats.total_area, 500.0);
        assert_approx_eq!(stats.largest_area, 400.0);
        assert_approx_eq!(stats.average_area, 250.0);

        let largest = largest_region(extract_regions(&mask, 0.0)).unwrap();
        assert_approx_eq!(largest.area, 400.0);
    }
}
