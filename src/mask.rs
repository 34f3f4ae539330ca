// src/mask.rs - Binary masks and region rasterization

use image::{GrayImage, Luma};

use crate::geometry::Region;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// A per-pixel foreground/background raster owned by a single analysis call.
/// The buffer is released when the mask goes out of scope.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// An all-background mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Build a mask from a per-pixel predicate
    pub fn from_fn<F>(width: u32, height: u32, mut is_foreground: F) -> Self
    where
        F: FnMut(u32, u32) -> bool,
    {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([if is_foreground(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { image }
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == FOREGROUND
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.image.put_pixel(x, y, Luma([value]));
    }

    pub fn count_foreground(&self) -> u64 {
        self.image.pixels().filter(|p| p[0] == FOREGROUND).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.image.pixels().all(|p| p[0] == BACKGROUND)
    }

    /// Logical AND of two masks of equal dimensions
    pub fn and(&self, other: &BinaryMask) -> BinaryMask {
        debug_assert_eq!(self.dimensions(), other.dimensions());
        let (width, height) = self.dimensions();
        BinaryMask::from_fn(width, height, |x, y| {
            self.is_foreground(x, y) && other.is_foreground(x, y)
        })
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// Rasterize a filled circle or rotated ellipse over a `width` x `height` image
pub fn rasterize_region(region: &Region, width: u32, height: u32) -> BinaryMask {
    let mut mask = BinaryMask::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    // Only visit the clipped bounding box
    let (min_x, min_y, max_x, max_y) = region.bounds();
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = max_x.ceil().min((width - 1) as f64);
    let y1 = max_y.ceil().min((height - 1) as f64);
    if x1 < 0.0 || y1 < 0.0 || x0 >= width || y0 >= height {
        return mask;
    }
    let (x1, y1) = (x1 as u32, y1 as u32);

    for y in y0..=y1 {
        for x in x0..=x1 {
            if region.contains(x as f64, y as f64) {
                mask.set(x, y, true);
            }
        }
    }

    mask
}
