//! Payload decoding and JPEG re-encoding.

use std::io::Write;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageError, ImageFormat};

use crate::artifact::error::IngestError;

/// Extension of every stored file, leading dot included.
pub const JPEG_EXTENSION: &str = ".jpeg";

/// Stored images are always re-encoded at maximum quality.
pub const JPEG_QUALITY: u8 = 100;

/// Decode standard padded base64. Line breaks (`\r`, `\n`) are skipped so
/// MIME-wrapped payloads are accepted.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, IngestError> {
    let unwrapped: Vec<u8> = payload
        .bytes()
        .filter(|b| !matches!(b, b'\r' | b'\n'))
        .collect();
    Ok(BASE64.decode(unwrapped)?)
}

/// Decode `bytes` strictly as JPEG. Other formats are rejected even if valid.
pub fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage, IngestError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).map_err(IngestError::ImageFormat)
}

/// Encode `image` as JPEG into `writer`.
///
/// Grayscale images stay single channel; everything else is written as RGB
/// since JPEG carries no alpha.
pub fn encode_jpeg<W: Write>(image: &DynamicImage, writer: W) -> Result<(), ImageError> {
    let mut encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    match image {
        DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
        other => encoder.encode_image(&other.to_rgb8()),
    }
}
