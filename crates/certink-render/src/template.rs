//! Template image decoding and data URLs.

use base64::Engine;
use certink_core::background::TemplateInfo;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Not a base64 data URL")]
    NotDataUrl,
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Image has zero size")]
    Empty,
}

/// Split a `data:<mime>;base64,<payload>` URL into its mime type and bytes.
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>), TemplateError> {
    let rest = url.trim().strip_prefix("data:").ok_or(TemplateError::NotDataUrl)?;
    let (meta, payload) = rest.split_once(',').ok_or(TemplateError::NotDataUrl)?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or(TemplateError::NotDataUrl)?
        .to_string();
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok((mime, bytes))
}

/// Build a base64 data URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Decode an image from a data URL.
pub fn decode_image_url(url: &str) -> Result<DynamicImage, TemplateError> {
    let (_, bytes) = decode_data_url(url)?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Decode an encoded template image and describe it for the canvas.
pub fn decode_template(bytes: &[u8]) -> Result<TemplateInfo, TemplateError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(TemplateError::Empty);
    }
    Ok(TemplateInfo {
        data_url: encode_data_url(format.to_mime_type(), bytes),
        width: img.width(),
        height: img.height(),
    })
}

/// Decode a template into the form `Canvas::apply_template_result` accepts.
pub fn template_result(bytes: &[u8]) -> Result<TemplateInfo, String> {
    decode_template(bytes).map_err(|e| e.to_string())
}

/// Encode an RGBA image as PNG bytes, for building templates in code.
pub fn encode_png_image(img: &DynamicImage) -> Result<Vec<u8>, TemplateError> {
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
