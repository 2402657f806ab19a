//! Region extraction and OCR preprocessing
//!
//! Resistor markings are tiny and low-contrast; before recognition the
//! detection box is cropped with a margin, grayscaled, upscaled when small,
//! and sharpened.

use image::{GrayImage, Luma, RgbImage};

use crate::capture::frame::CapturedFrame;
use crate::vision::detector::BoundingBox;

/// Smallest region dimension the recognizer handles well; smaller crops are
/// upscaled before OCR.
const MIN_OCR_DIMENSION: u32 = 50;

/// Crop a detection box out of a frame with a pixel margin on every side,
/// clamped to the frame bounds. Returns `None` for degenerate regions.
pub fn crop_with_margin(
    frame: &CapturedFrame,
    bbox: &BoundingBox,
    margin: u32,
) -> Option<RgbImage> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.data.clone())?;

    let margin = margin as f32;
    let x1 = ((bbox.x1 - margin).max(0.0)) as u32;
    let y1 = ((bbox.y1 - margin).max(0.0)) as u32;
    let x2 = ((bbox.x2 + margin).min(frame.width as f32)) as u32;
    let y2 = ((bbox.y2 + margin).min(frame.height as f32)) as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(image::imageops::crop_imm(&img, x1, y1, x2 - x1, y2 - y1).to_image())
}

/// Grayscale, upscale and sharpen a cropped region for marking recognition.
pub fn prepare_for_ocr(region: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(region);

    let (w, h) = gray.dimensions();
    let upscaled = if w < MIN_OCR_DIMENSION || h < MIN_OCR_DIMENSION {
        let scale = (MIN_OCR_DIMENSION as f32 / w.min(h).max(1) as f32) * 2.0;
        image::imageops::resize(
            &gray,
            ((w as f32 * scale) as u32).max(1),
            ((h as f32 * scale) as u32).max(1),
            image::imageops::FilterType::CatmullRom,
        )
    } else {
        gray
    };

    sharpen(&upscaled)
}

/// 3x3 sharpening kernel, border pixels passed through unchanged.
fn sharpen(img: &GrayImage) -> GrayImage {
    const KERNEL: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];

    let (w, h) = img.dimensions();
    let mut out = img.clone();

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let mut acc = 0i32;
            for ky in 0u32..3 {
                for kx in 0u32..3 {
                    let px = img.get_pixel(x + kx - 1, y + ky - 1).0[0] as i32;
                    acc += px * KERNEL[ky as usize][kx as usize];
                }
            }
            out.put_pixel(x, y, Luma([acc.clamp(0, 255) as u8]));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, value: u8) -> CapturedFrame {
        CapturedFrame::new(vec![value; (width * height * 3) as usize], width, height)
    }

    #[test]
    fn test_crop_clamps_margin_to_frame() {
        let frame = solid_frame(100, 80, 128);
        let bbox = BoundingBox::new(0.0, 0.0, 20.0, 20.0);

        let region = crop_with_margin(&frame, &bbox, 5).unwrap();
        // Margin cannot extend past the top-left corner.
        assert_eq!(region.dimensions(), (25, 25));
    }

    #[test]
    fn test_crop_degenerate_region_is_none() {
        let frame = solid_frame(100, 80, 0);
        let bbox = BoundingBox::new(50.0, 40.0, 50.0, 40.0);

        assert!(crop_with_margin(&frame, &bbox, 0).is_none());
    }

    #[test]
    fn test_small_region_is_upscaled() {
        let region = RgbImage::from_pixel(20, 10, image::Rgb([200, 200, 200]));
        let prepared = prepare_for_ocr(&region);

        let (w, h) = prepared.dimensions();
        assert!(w >= MIN_OCR_DIMENSION && h >= MIN_OCR_DIMENSION);
    }

    #[test]
    fn test_large_region_keeps_dimensions() {
        let region = RgbImage::from_pixel(120, 60, image::Rgb([50, 50, 50]));
        let prepared = prepare_for_ocr(&region);

        assert_eq!(prepared.dimensions(), (120, 60));
    }

    #[test]
    fn test_sharpen_preserves_flat_regions() {
        // A uniform image must stay uniform under the sharpening kernel.
        let img = GrayImage::from_pixel(10, 10, Luma([100]));
        let sharpened = sharpen(&img);

        assert_eq!(sharpened.get_pixel(5, 5).0[0], 100);
    }
}
