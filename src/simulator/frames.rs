use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, Rgb, RgbImage};

use crate::capture::Angle;

const SKIN: Rgb<u8> = Rgb([224, 172, 105]);

/// Renders a synthetic camera frame and returns it as base64 JPEG.
///
/// The background scrolls with `tick`; when `face` is set an oval is drawn,
/// shifted towards the side the user is asked to turn to.
pub fn synthesize_frame(
    width: u32,
    height: u32,
    tick: u64,
    angle: Angle,
    face: bool,
    quality: u8,
) -> Result<String, ImageError> {
    let w = width as f32;
    let h = height as f32;
    let center_x = match angle {
        Angle::Frontal => w * 0.5,
        Angle::Left => w * 0.35,
        Angle::Right => w * 0.65,
    };
    let center_y = h * 0.5;
    let radius_x = (w * 0.18).max(1.0);
    let radius_y = (h * 0.32).max(1.0);
    let offset = (tick % 64) as u32;

    let image = RgbImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 - center_x) / radius_x;
        let dy = (y as f32 - center_y) / radius_y;
        if face && dx * dx + dy * dy <= 1.0 {
            SKIN
        } else {
            let shade = ((x + y + offset) % 64) as u8;
            Rgb([30 + shade, 40 + shade, 60 + shade])
        }
    });

    let mut buf = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)))?;
    Ok(STANDARD.encode(buf))
}

/// Decodes a `data:` URI or bare base64 payload into raw bytes.
pub fn decode_image_payload(payload: &str) -> Option<Vec<u8>> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        Some(_) => return None,
        None => payload,
    };
    STANDARD.decode(encoded).ok().filter(|bytes| !bytes.is_empty())
}
