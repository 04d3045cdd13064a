//! Media helpers for uploads
//!
//! Capture dates from EXIF, HEIC to JPEG conversion, MIME detection and
//! stored-file naming.

use chrono::{DateTime, NaiveDate, Utc};
use exif::{In, Tag, Value};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// JPEG quality used for converted HEIC photos
pub const HEIC_JPEG_QUALITY: u8 = 95;

/// Media processing error types
#[derive(Debug, Error)]
pub enum MediaError {
    /// Image could not be decoded
    #[error("Could not decode image: {0}")]
    Decode(String),

    /// Image could not be re-encoded
    #[error("Could not encode image: {0}")]
    Encode(String),
}

/// EXIF tags consulted for the capture date, most specific first
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Capture date of an image, read from its EXIF metadata
///
/// Returns `None` when the data has no EXIF block, none of the date tags,
/// or a date that does not parse.
pub fn extract_taken_at(data: &[u8]) -> Option<DateTime<Utc>> {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF data: {}", e);
            return None;
        }
    };

    DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        let Value::Ascii(ref values) = field.value else {
            return None;
        };
        let raw = values.first()?;
        let dt = exif::DateTime::from_ascii(raw).ok()?;

        NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
            .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())
            .map(|naive| naive.and_utc())
    })
}

/// Lowercased extension including the dot (`".jpg"`), or empty
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Whether the file name marks a HEIC/HEIF image
pub fn is_heic(filename: &str) -> bool {
    matches!(file_extension(filename).as_str(), ".heic" | ".heif")
}

/// Decode a HEIC/HEIF image and re-encode it as JPEG
#[cfg(feature = "heic")]
pub fn convert_heic_to_jpeg(data: &[u8]) -> Result<Vec<u8>, MediaError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(|e| MediaError::Decode(e.to_string()))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| MediaError::Decode(e.to_string()))?;
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| MediaError::Decode(e.to_string()))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| MediaError::Decode("no interleaved RGB plane".to_string()))?;

    // Rows may be padded; copy out tightly packed RGB
    let width = plane.width as usize;
    let height = plane.height as usize;
    let mut rgb = Vec::with_capacity(width * height * 3);
    for row in plane.data.chunks(plane.stride).take(height) {
        rgb.extend_from_slice(&row[..width * 3]);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, HEIC_JPEG_QUALITY)
        .write_image(&rgb, plane.width, plane.height, ExtendedColorType::Rgb8)
        .map_err(|e| MediaError::Encode(e.to_string()))?;

    Ok(out)
}

/// MIME type detected from the content, else `fallback`
pub fn sniff_mime(data: &[u8], fallback: &str) -> String {
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

/// MIME type implied by a file name's extension
pub fn mime_from_filename(filename: &str) -> &'static str {
    match file_extension(filename).as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".heic" => "image/heic",
        ".heif" => "image/heif",
        ".webm" => "audio/webm",
        ".mp3" => "audio/mpeg",
        ".wav" => "audio/wav",
        ".m4a" => "audio/mp4",
        ".ogg" => "audio/ogg",
        ".pdf" => "application/pdf",
        ".txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Extension for a stored audio recording
///
/// Uses the uploaded file name's extension; without one, infers it from
/// the content type (webm, mp3, wav) and defaults to `.webm`.
pub fn audio_extension(filename: Option<&str>, content_type: Option<&str>) -> String {
    if let Some(ext) = filename.map(file_extension).filter(|e| !e.is_empty()) {
        return ext;
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("webm") {
        ".webm".to_string()
    } else if content_type.contains("mp3") || content_type.contains("mpeg") {
        ".mp3".to_string()
    } else if content_type.contains("wav") {
        ".wav".to_string()
    } else {
        ".webm".to_string()
    }
}

/// Collision-free stored file name with the given extension
pub fn unique_filename(ext: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match ext.trim_start_matches('.') {
        "" => id.to_string(),
        ext => format!("{}.{}", id, ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    /// Little-endian TIFF with one IFD0 entry: DateTime = `date`
    fn tiff_with_datetime(date: &str) -> Vec<u8> {
        assert_eq!(date.len(), 19);
        let mut tiff = Vec::new();
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        // IFD0: one entry
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0132u16.to_le_bytes()); // DateTime
        tiff.extend_from_slice(&2u16.to_le_bytes()); // ASCII
        tiff.extend_from_slice(&20u32.to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes()); // value offset
        tiff.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
        tiff.extend_from_slice(date.as_bytes());
        tiff.push(0);
        tiff
    }

    #[test]
    fn test_extract_taken_at_from_exif() {
        let taken = extract_taken_at(&tiff_with_datetime("2021:07:04 12:30:45")).unwrap();
        assert_eq!(taken.year(), 2021);
        assert_eq!(taken.month(), 7);
        assert_eq!(taken.day(), 4);
        assert_eq!(taken.hour(), 12);
        assert_eq!(taken.second(), 45);
    }

    #[test]
    fn test_extract_taken_at_without_exif() {
        assert!(extract_taken_at(b"definitely not an image").is_none());
        assert!(extract_taken_at(&[]).is_none());
    }

    #[test]
    fn test_extract_taken_at_with_bad_date() {
        assert!(extract_taken_at(&tiff_with_datetime("2021:13:45 99:99:99")).is_none());
    }

    #[test]
    fn test_is_heic() {
        assert!(is_heic("IMG_0001.HEIC"));
        assert!(is_heic("photo.heif"));
        assert!(!is_heic("photo.jpg"));
        assert!(!is_heic("heic"));
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("Report.PDF"), ".pdf");
        assert_eq!(file_extension("archive.tar.gz"), ".gz");
        assert_eq!(file_extension("README"), "");
    }

    #[test]
    fn test_audio_extension_rules() {
        assert_eq!(audio_extension(Some("memo.m4a"), Some("audio/webm")), ".m4a");
        assert_eq!(audio_extension(Some("blob"), Some("audio/webm;codecs=opus")), ".webm");
        assert_eq!(audio_extension(None, Some("audio/mpeg")), ".mp3");
        assert_eq!(audio_extension(None, Some("audio/wav")), ".wav");
        assert_eq!(audio_extension(None, Some("audio/ogg")), ".webm");
        assert_eq!(audio_extension(None, None), ".webm");
    }

    #[test]
    fn test_unique_filename() {
        let a = unique_filename(".jpg");
        let b = unique_filename("jpg");
        assert!(a.ends_with(".jpg"));
        assert!(b.ends_with(".jpg"));
        assert_ne!(a, b);
        assert!(!unique_filename("").contains('.'));
    }

    #[test]
    fn test_sniff_mime() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(sniff_mime(&png, "application/octet-stream"), "image/png");
        assert_eq!(sniff_mime(b"plain words", "text/plain"), "text/plain");
    }

    #[test]
    fn test_mime_from_filename() {
        assert_eq!(mime_from_filename("a.JPG"), "image/jpeg");
        assert_eq!(mime_from_filename("r.webm"), "audio/webm");
        assert_eq!(mime_from_filename("x.unknown"), "application/octet-stream");
    }
}
