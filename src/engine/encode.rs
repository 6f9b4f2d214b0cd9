//! Page image encoding: `DynamicImage` → base64 PNG inside `ImageData`.
//!
//! PNG keeps glyph edges lossless, which matters more to the vision model
//! than payload size. `detail: "high"` asks OpenAI-style models for the full
//! tile budget so small print survives.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page for a multimodal chat message.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&png);
    debug!("Encoded page image: {} PNG bytes → {} base64 chars", png.len(), b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
