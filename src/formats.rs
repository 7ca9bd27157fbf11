mod epub;
mod pdf;

pub use epub::EpubHandler;
pub use pdf::PdfHandler;

use crate::config::BookFormat;
use crate::error::{AppError, Result};
use image::ImageReader;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use std::path::Path;

/// Trait for format-specific book handlers.
pub trait FormatHandler: Send + Sync {
    /// Extract the embedded cover image, in whatever encoding the file carries.
    fn extract_cover(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Get the number of pages (if the format has fixed pages).
    fn page_count(&self, path: &Path) -> Result<Option<u32>>;

    /// Extract the text of a 1-based page. `Ok(None)` if the format has no
    /// fixed pages; [`AppError::NotFound`] if the page is out of range.
    fn page_text(&self, path: &Path, page: u32) -> Result<Option<String>>;
}

/// Get the appropriate handler for a book format.
pub fn get_handler(format: BookFormat) -> Box<dyn FormatHandler> {
    match format {
        BookFormat::Epub => Box::new(EpubHandler),
        BookFormat::Pdf => Box::new(PdfHandler),
        // Kindle files are DRM-wrapped more often than not
        BookFormat::Azw => Box::new(MinimalHandler),
    }
}

/// Handler for formats we only store and serve.
struct MinimalHandler;

impl FormatHandler for MinimalHandler {
    fn extract_cover(&self, _path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn page_count(&self, _path: &Path) -> Result<Option<u32>> {
        Ok(None)
    }

    fn page_text(&self, _path: &Path, _page: u32) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Scale an image to `target_width` (keeping aspect ratio) and encode it as JPEG.
pub fn cover_thumbnail(data: &[u8], target_width: u32, quality: u8) -> Result<Vec<u8>> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;

    if img.width() == 0 || img.height() == 0 {
        return Err(AppError::InvalidFormat("Empty cover image".into()));
    }

    let width = target_width.max(1);
    let scale = width as f32 / img.width() as f32;
    let height = ((img.height() as f32 * scale) as u32).max(1);

    let resized = img
        .resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        .to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(&resized)?;

    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut data = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
            .unwrap();
        data
    }

    #[test]
    fn test_cover_thumbnail_scales_to_width() {
        let jpeg = cover_thumbnail(&png(600, 900), 300, 80).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8, 0xFF]));

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 300);
        assert_eq!(decoded.height(), 450);
    }

    #[test]
    fn test_cover_thumbnail_rejects_garbage() {
        assert!(cover_thumbnail(b"not an image", 300, 80).is_err());
    }

    #[test]
    fn test_minimal_handler() {
        let handler = get_handler(BookFormat::Azw);
        let path = Path::new("/nonexistent/book.azw");
        assert!(handler.extract_cover(path).unwrap().is_none());
        assert!(handler.page_count(path).unwrap().is_none());
        assert!(handler.page_text(path, 1).unwrap().is_none());
    }
}
