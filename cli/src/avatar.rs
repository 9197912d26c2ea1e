use std::path::Path;

use anyhow::{Context, Result, bail};
use image::ImageFormat;

use crate::random::random_hex;

pub const THUMBNAIL_SIZE: u32 = 125;

/// Lowercase extension for an accepted upload, or `None`.
#[must_use]
pub fn avatar_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        _ => None,
    }
}

/// Decode an uploaded picture, shrink it to fit the thumbnail box and write
/// it to `images_dir` under a random name. Returns the stored file name.
pub fn save_avatar(images_dir: &Path, filename: &str, bytes: &[u8]) -> Result<String> {
    let Some(ext) = avatar_extension(filename) else {
        bail!("File does not have an approved extension: jpg, png");
    };
    let format = if ext == "png" {
        ImageFormat::Png
    } else {
        ImageFormat::Jpeg
    };

    let img = image::load_from_memory_with_format(bytes, format)
        .context("Could not read the uploaded image")?;
    let img = if img.width() > THUMBNAIL_SIZE || img.height() > THUMBNAIL_SIZE {
        img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
    } else {
        img
    };
    let img = if format == ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };

    let name = format!("{}.{ext}", random_hex(8));
    let path = images_dir.join(&name);
    img.save_with_format(&path, format)
        .with_context(|| format!("Failed to save avatar to {}", path.display()))?;
    tracing::debug!(file = %name, "avatar saved");
    Ok(name)
}
