use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use super::compress::{encode_jpeg, flatten_onto_white};
use crate::error::ExportError;

/// Page dimensions in points (1/72 in)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width_pt: 595.28,
        height_pt: 841.89,
    };
}

/// Horizontal slice of the rendered bitmap that becomes one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBand {
    /// First bitmap row of the band
    pub top: u32,
    /// Rows in the band
    pub height: u32,
    /// Height the band occupies on the page
    pub height_pt: f32,
}

/// One encoded page image and its placement size
#[derive(Debug, Clone)]
pub struct Page {
    pub jpeg: Vec<u8>,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Split a `width x height` bitmap into page bands.
///
/// The bitmap is scaled so its width fills the page, `k = width / page
/// width` pixels per point. If the scaled height fits one page there is a
/// single band; otherwise each full band is `round(page height * k)` rows
/// and the last band takes the remainder. Bands never overlap and their
/// heights sum to `height`.
pub fn plan_bands(width: u32, height: u32, page: PageSize) -> Vec<PageBand> {
    let k = f64::from(width) / f64::from(page.width_pt);
    let to_pt = |rows: u32| (f64::from(rows) / k) as f32;

    if f64::from(height) / k <= f64::from(page.height_pt) {
        return vec![PageBand {
            top: 0,
            height,
            height_pt: to_pt(height),
        }];
    }

    let capacity = ((f64::from(page.height_pt) * k).round() as u32).max(1);
    let mut bands = Vec::new();
    let mut top = 0;
    while top < height {
        let rows = capacity.min(height - top);
        bands.push(PageBand {
            top,
            height: rows,
            height_pt: to_pt(rows),
        });
        top += rows;
    }
    bands
}

/// Cut the bitmap along `bands` and encode each slice as a JPEG page
pub fn encode_pages(
    bitmap: &RgbaImage,
    bands: &[PageBand],
    page: PageSize,
    quality: u8,
) -> Result<Vec<Page>, ExportError> {
    bands
        .iter()
        .map(|band| {
            let slice = imageops::crop_imm(bitmap, 0, band.top, bitmap.width(), band.height).to_image();
            let jpeg = encode_jpeg(&flatten_onto_white(&slice), quality)?;
            Ok(Page {
                jpeg,
                pixel_width: slice.width(),
                pixel_height: slice.height(),
                width_pt: page.width_pt,
                height_pt: band.height_pt,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_short_bitmap_is_one_page() {
        let bands = plan_bands(1600, 1200, PageSize::A4);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].top, 0);
        assert_eq!(bands[0].height, 1200);
        assert!((bands[0].height_pt - 446.46).abs() < 0.1);
    }

    #[test]
    fn test_tall_bitmap_splits_into_bands() {
        // k = 1600 / 595.28, so each full page holds round(841.89 * k) = 2263 rows
        let bands = plan_bands(1600, 5657, PageSize::A4);
        let heights: Vec<u32> = bands.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![2263, 2263, 1131]);
        assert_eq!(bands[1].top, 2263);
        assert_eq!(bands[2].top, 4526);
        assert!((bands[0].height_pt - 841.89).abs() < 0.5);
    }

    #[test]
    fn test_exact_fit_and_fractional_overflow() {
        let page = PageSize {
            width_pt: 100.0,
            height_pt: 200.0,
        };
        assert_eq!(plan_bands(100, 200, page).len(), 1);

        let bands = plan_bands(100, 500, page);
        let heights: Vec<u32> = bands.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![200, 200, 100]);
    }

    #[test]
    fn test_bands_cover_bitmap_once() {
        for height in [1, 841, 842, 2000, 9999] {
            let bands = plan_bands(595, height, PageSize::A4);
            assert_eq!(bands.iter().map(|b| b.height).sum::<u32>(), height);
            for pair in bands.windows(2) {
                assert_eq!(pair[0].top + pair[0].height, pair[1].top);
            }
        }
    }

    #[test]
    fn test_encode_pages() {
        let bitmap = RgbaImage::from_pixel(100, 500, Rgba([255, 255, 255, 255]));
        let page = PageSize {
            width_pt: 100.0,
            height_pt: 200.0,
        };
        let pages = encode_pages(&bitmap, &plan_bands(100, 500, page), page, 85).unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].pixel_height, 100);
        assert!((pages[2].height_pt - 100.0).abs() < f32::EPSILON);
        assert!(pages.iter().all(|p| p.jpeg.starts_with(&[0xFF, 0xD8])));
    }
}
