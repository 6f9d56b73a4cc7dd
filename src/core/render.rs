use std::path::Path;

use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use crate::error::{Result, ResultExt};

/// Width of the bar between the two images
const SEPARATOR_WIDTH: u32 = 8;
const SEPARATOR_COLOR: Rgb<u8> = Rgb([230, 230, 230]);

/// Place `query` and `matched` next to each other at a common `height`
///
/// Both images keep their aspect ratio.
pub fn side_by_side(query: &DynamicImage, matched: &DynamicImage, height: u32) -> RgbImage {
    let left = scale_to_height(query, height);
    let right = scale_to_height(matched, height);

    let width = left.width() + SEPARATOR_WIDTH + right.width();
    let mut canvas = RgbImage::new(width, height);

    image::imageops::overlay(&mut canvas, &left, 0, 0);
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(left.width() as i32, 0).of_size(SEPARATOR_WIDTH, height),
        SEPARATOR_COLOR,
    );
    image::imageops::overlay(
        &mut canvas,
        &right,
        (left.width() + SEPARATOR_WIDTH) as i64,
        0,
    );
    canvas
}

/// Render the query next to its best match and write the result to `output`
pub fn save_comparison(query: &Path, matched: &Path, output: &Path, height: u32) -> Result<()> {
    let query_img = image::open(query)?;
    let matched_img = image::open(matched)?;

    side_by_side(&query_img, &matched_img, height)
        .save(output)
        .with_context(|| format!("writing comparison image {}", output.display()))?;

    log::info!("Wrote comparison image to {}", output.display());
    Ok(())
}

fn scale_to_height(img: &DynamicImage, height: u32) -> RgbImage {
    let width = ((img.width() as u64 * height as u64) / img.height().max(1) as u64).max(1) as u32;
    img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
}
