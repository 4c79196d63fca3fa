use eframe::egui::ColorImage;
use image::{DynamicImage, imageops::FilterType};

use crate::error::AppError;
use crate::tools::{ToolRunner, Tools};

/// Share of the window width the thumbnail occupies.
const WIDTH_RATIO: f32 = 0.8;

/// Asks yt-dlp for the thumbnail URL of a video.
pub async fn thumbnail_url<R: ToolRunner + ?Sized>(
    runner: &R,
    tools: &Tools,
    url: &str,
) -> Result<String, AppError> {
    let out = runner
        .output(&tools.ytdlp, &tools.thumbnail_args(url))
        .await?
        .check(&tools.ytdlp)?;
    let thumb = out.stdout.trim();
    if thumb.is_empty() {
        return Err(AppError::EmptyOutput(tools.ytdlp.clone()));
    }
    Ok(thumb.to_string())
}

/// 16:9 box scaled to the current window width.
pub fn target_size(window_width: f32) -> (u32, u32) {
    let w = (window_width * WIDTH_RATIO).max(1.0);
    let h = (w * 9.0 / 16.0).max(1.0);
    (w as u32, h as u32)
}

/// Downloads and decodes a thumbnail, resized to fit `window_width`.
/// Blocking; run it off the UI thread.
pub fn fetch_thumbnail(url: &str, window_width: f32) -> Result<ColorImage, AppError> {
    tracing::info!(url, "loading thumbnail");
    let resp = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
    let img = image::load_from_memory(&resp)?;
    Ok(to_color_image(&img, target_size(window_width)))
}

fn to_color_image(img: &DynamicImage, (w, h): (u32, u32)) -> ColorImage {
    let img = img.resize_exact(w, h, FilterType::Lanczos3).to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    // Create a ColorImage from the raw RGBA bytes without premultiplying alpha
    ColorImage::from_rgba_unmultiplied(size, img.as_raw())
}
