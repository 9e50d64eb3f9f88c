use egui::{ColorImage, TextureHandle, TextureOptions};

use crate::capture::PreviewFrame;
use crate::error::AppError;

/// Decodes a base64 JPEG frame into an egui image.
pub fn decode_color_image(frame: &PreviewFrame) -> Result<ColorImage, AppError> {
    let bytes = frame
        .decode()
        .map_err(|e| AppError::Ui(format!("frame {} is not valid base64: {}", frame.seq(), e)))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| AppError::Ui(format!("frame {} is not a valid image: {}", frame.seq(), e)))?
        .to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, image.as_raw()))
}

/// GPU texture that follows a stream of [`PreviewFrame`]s.
///
/// Frames are decoded and uploaded only when their sequence number changes.
pub struct PreviewTexture {
    name: &'static str,
    seq: Option<u64>,
    texture: Option<TextureHandle>,
    uploads: u64,
}

impl PreviewTexture {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            seq: None,
            texture: None,
            uploads: 0,
        }
    }

    pub fn update(&mut self, ctx: &egui::Context, frame: Option<&PreviewFrame>) -> Result<(), AppError> {
        let Some(frame) = frame else {
            self.seq = None;
            self.texture = None;
            return Ok(());
        };
        if self.seq == Some(frame.seq()) {
            return Ok(());
        }
        // remember the sequence even on failure, a broken frame is not retried
        self.seq = Some(frame.seq());
        let image = decode_color_image(frame)?;
        if let Some(texture) = self.texture.as_mut() {
            texture.set(image, TextureOptions::LINEAR);
        } else {
            self.texture = Some(ctx.load_texture(self.name, image, TextureOptions::LINEAR));
        }
        self.uploads += 1;
        Ok(())
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }
}
