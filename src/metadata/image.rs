//! Image metadata: dimensions, decoder format, EXIF highlights and PNG
//! text chunks

use super::{ExtractError, Metadata, MetadataExtractor};
use ::image::{ImageFormat, ImageReader};
use exif::{In, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF tags surfaced in the audit, keyed as `exif.<tag>`
const EXIF_TAGS: &[(&str, Tag)] = &[
    ("exif.DateTimeOriginal", Tag::DateTimeOriginal),
    ("exif.Make", Tag::Make),
    ("exif.Model", Tag::Model),
    ("exif.GPSLatitude", Tag::GPSLatitude),
    ("exif.GPSLongitude", Tag::GPSLongitude),
];

/// Metres per inch, for PNG `pHYs` conversion
const METERS_PER_INCH: f64 = 0.0254;

/// Extracts `width`, `height`, `format`, EXIF highlights and PNG info from images
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for ImageExtractor {
    fn name(&self) -> &'static str {
        "image"
    }

    fn supports(&self, mime: &str) -> bool {
        mime.starts_with("image/")
    }

    fn extract(&self, path: &Path, mime: &str) -> Result<Metadata, ExtractError> {
        let mut metadata = Metadata::new();

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();
        let (width, height) = reader.into_dimensions()?;

        metadata.insert("width".to_string(), width.to_string());
        metadata.insert("height".to_string(), height.to_string());
        if let Some(format) = format {
            metadata.insert("format".to_string(), format_name(format));
        }

        if carries_exif(format, mime) {
            // Missing EXIF is normal; only the dimensions are required
            match read_exif(path) {
                Ok(exif) => metadata.extend(exif),
                Err(e) => tracing::trace!("No EXIF in {}: {}", path.display(), e),
            }
        }

        if format == Some(ImageFormat::Png) {
            match read_png_info(path) {
                Ok(info) => metadata.extend(info),
                Err(e) => tracing::trace!("No PNG info in {}: {}", path.display(), e),
            }
        }

        Ok(metadata)
    }
}

/// Upper-case decoder name, e.g. `PNG`, `JPEG`
fn format_name(format: ImageFormat) -> String {
    format!("{format:?}").to_uppercase()
}

fn carries_exif(format: Option<ImageFormat>, mime: &str) -> bool {
    match format {
        Some(ImageFormat::Jpeg | ImageFormat::Tiff | ImageFormat::Png | ImageFormat::WebP) => true,
        Some(_) => false,
        None => matches!(mime, "image/heic" | "image/heif"),
    }
}

fn read_exif(path: &Path) -> Result<Metadata, exif::Error> {
    let file = File::open(path)?;
    let exif = exif::Reader::new().read_from_container(&mut BufReader::new(file))?;

    Ok(EXIF_TAGS
        .iter()
        .filter_map(|(key, tag)| {
            exif.get_field(*tag, In::PRIMARY)
                .map(|field| (key.to_string(), field.display_value().with_unit(&exif).to_string()))
        })
        .collect())
}

/// `png.dpi` from `pHYs` plus one `png.<keyword>` entry per text chunk
fn read_png_info(path: &Path) -> Result<Metadata, png::DecodingError> {
    let file = File::open(path)?;
    let reader = png::Decoder::new(BufReader::new(file)).read_info()?;
    let info = reader.info();
    let mut metadata = Metadata::new();

    if let Some(dims) = info.pixel_dims {
        if matches!(dims.unit, png::Unit::Meter) {
            let dpi = |ppu: u32| (f64::from(ppu) * METERS_PER_INCH).round();
            metadata.insert("png.dpi".to_string(), format!("{}x{}", dpi(dims.xppu), dpi(dims.yppu)));
        }
    }

    for chunk in &info.uncompressed_latin1_text {
        metadata.insert(format!("png.{}", chunk.keyword), chunk.text.clone());
    }
    // Compressed chunks that fail to inflate are skipped, not fatal
    for chunk in &info.compressed_latin1_text {
        if let Ok(text) = chunk.get_text() {
            metadata.insert(format!("png.{}", chunk.keyword), text);
        }
    }
    for chunk in &info.utf8_text {
        if let Ok(text) = chunk.get_text() {
            metadata.insert(format!("png.{}", chunk.keyword), text);
        }
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_png_dimensions_and_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tiny.png");
        RgbImage::from_pixel(3, 2, Rgb([10, 20, 30])).save(&path).unwrap();

        let metadata = ImageExtractor::new().extract(&path, "image/png").unwrap();
        assert_eq!(metadata.get("width").map(String::as_str), Some("3"));
        assert_eq!(metadata.get("height").map(String::as_str), Some("2"));
        assert_eq!(metadata.get("format").map(String::as_str), Some("PNG"));
        assert!(!metadata.keys().any(|k| k.starts_with("exif.")));
        assert!(!metadata.keys().any(|k| k.starts_with("png.")));
    }

    #[test]
    fn test_png_text_chunks_and_dpi() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("annotated.png");
        let file = File::create(&path).unwrap();
        let mut encoder = png::Encoder::new(std::io::BufWriter::new(file), 2, 2);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: 2835,
            yppu: 2835,
            unit: png::Unit::Meter,
        }));
        encoder
            .add_text_chunk("Software".to_string(), "scanner 2.1".to_string())
            .unwrap();
        encoder
            .add_itxt_chunk("Title".to_string(), "Lake at dusk".to_string())
            .unwrap();
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[0u8; 12]).unwrap();
        writer.finish().unwrap();

        let metadata = ImageExtractor::new().extract(&path, "image/png").unwrap();
        assert_eq!(metadata.get("width").map(String::as_str), Some("2"));
        assert_eq!(metadata.get("png.Software").map(String::as_str), Some("scanner 2.1"));
        assert_eq!(metadata.get("png.Title").map(String::as_str), Some("Lake at dusk"));
        assert_eq!(metadata.get("png.dpi").map(String::as_str), Some("72x72"));
    }

    #[test]
    fn test_jpeg_without_exif_still_reports_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.jpg");
        RgbImage::from_pixel(8, 4, Rgb([200, 100, 50])).save(&path).unwrap();

        let metadata = ImageExtractor::new().extract(&path, "image/jpeg").unwrap();
        assert_eq!(metadata.get("format").map(String::as_str), Some("JPEG"));
        assert_eq!(metadata.get("width").map(String::as_str), Some("8"));
    }

    #[test]
    fn test_malformed_image_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.png");
        fs::write(&path, b"\x89PNG\r\n\x1a\nthis is not a real png stream").unwrap();

        assert!(ImageExtractor::new().extract(&path, "image/png").is_err());
    }

    #[test]
    fn test_supports_only_images() {
        let extractor = ImageExtractor::new();
        assert!(extractor.supports("image/webp"));
        assert!(!extractor.supports("video/mp4"));
    }
}
