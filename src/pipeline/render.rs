//! Statement rasterisation: render every page of a PDF via pdfium.
//!
//! Rendering never fails the run. A statement that cannot be opened yields
//! no pages and one [`PageError::RenderFailed`] for page `0`; a single page
//! that cannot be rendered is skipped and the following pages still render.
//!
//! pdfium keeps thread-local state and is CPU-bound, so the work runs inside
//! `tokio::task::spawn_blocking`.

use crate::config::ScanConfig;
use crate::error::PageError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pages of one statement that rendered, plus the failures along the way.
#[derive(Default)]
pub struct RenderedDocument {
    /// `(page_index_0based, image)` in page order.
    pub pages: Vec<(usize, DynamicImage)>,
    pub failures: Vec<PageError>,
    /// Page count reported by the PDF (0 when it could not be opened).
    pub page_count: usize,
}

/// Rasterise all pages of a statement.
pub async fn render_document(pdf_path: &Path, config: &ScanConfig) -> RenderedDocument {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    let joined = tokio::task::spawn_blocking(move || {
        render_blocking(&path, dpi, max_pixels, password.as_deref())
    })
    .await;

    let result = joined.unwrap_or_else(|e| {
        Err(PageError::RenderFailed {
            page: 0,
            detail: format!("render task panicked: {e}"),
        })
    });

    match result {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Skipping {}: {}", pdf_path.display(), e);
            RenderedDocument {
                failures: vec![e],
                ..Default::default()
            }
        }
    }
}

/// Check that a pdfium library can be bound; used by `--check`.
pub fn check_pdfium() -> Result<(), String> {
    bind_pdfium().map(|_| ()).map_err(|e| format!("{e:?}"))
}

/// Bind pdfium from `PDFIUM_LIB_PATH`, the working directory, or the system.
fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(custom) if !custom.is_empty() => {
            let custom = PathBuf::from(custom);
            if custom.is_dir() {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&custom))?
            } else {
                Pdfium::bind_to_library(&custom)?
            }
        }
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())?,
    };
    Ok(Pdfium::new(bindings))
}

fn render_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<RenderedDocument, PageError> {
    let whole_doc = |detail: String| PageError::RenderFailed { page: 0, detail };

    let pdfium = bind_pdfium().map_err(|e| whole_doc(format!("pdfium unavailable: {e:?}")))?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.to_lowercase().contains("password") {
            if password.is_some() {
                whole_doc("wrong password".to_string())
            } else {
                whole_doc("document is encrypted; pass --password".to_string())
            }
        } else {
            whole_doc(format!("corrupt or unsupported PDF: {err_str}"))
        }
    })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    info!("{}: {} pages", pdf_path.display(), page_count);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut rendered = RenderedDocument {
        pages: Vec::with_capacity(page_count),
        failures: Vec::new(),
        page_count,
    };

    for idx in 0..page_count {
        let page = match pages.get(idx as u16) {
            Ok(page) => page,
            Err(e) => {
                warn!("{}: page {} not loaded: {:?}", pdf_path.display(), idx + 1, e);
                rendered.failures.push(PageError::RenderFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                });
                continue;
            }
        };

        match page.render_with_config(&render_config).map(|bitmap| bitmap.as_image()) {
            Ok(image) => {
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                rendered.pages.push((idx, image));
            }
            Err(e) => {
                warn!("{}: page {} not rendered: {:?}", pdf_path.display(), idx + 1, e);
                rendered.failures.push(PageError::RenderFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                });
            }
        }
    }

    Ok(rendered)
}
