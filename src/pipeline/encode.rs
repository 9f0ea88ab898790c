//! Image encoding: `DynamicImage` → base64 PNG string.
//!
//! The chat endpoint accepts images as base64 text embedded in the JSON
//! request body. PNG is lossless, so text crispness in page crops survives and
//! decoding the payload reproduces the exact pixels that were sent.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode an image as base64 (standard alphabet, padded) PNG.
///
/// Deterministic: the same pixels always produce the same string.
pub fn encode_image(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(b64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 17 % 256) as u8, (y * 31 % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_image(&img).expect("encode should succeed");
        assert!(!data.is_empty());
        let decoded = STANDARD.decode(&data).expect("valid base64");
        assert_eq!(&decoded[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn encoding_is_deterministic() {
        let img = gradient(32, 24);
        assert_eq!(encode_image(&img).unwrap(), encode_image(&img).unwrap());
    }

    #[test]
    fn decoding_reproduces_pixels() {
        let img = gradient(17, 9);
        let b64 = encode_image(&img).unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        let back = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).unwrap();
        assert_eq!(back.to_rgba8(), img.to_rgba8());
    }
}
