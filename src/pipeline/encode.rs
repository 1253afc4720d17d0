//! Page encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Statement scans are dense tables of small digits. PNG keeps them lossless;
//! a JPEG artefact turning `8` into `6` silently corrupts a price.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised statement page for the vision request.
///
/// `detail: "high"` asks OpenAI-style backends for the full tile budget so
/// narrow table columns stay legible; other providers ignore it.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
