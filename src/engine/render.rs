//! PDF rasterisation: render every page of an in-memory PDF via pdfium.
//!
//! pdfium keeps thread-local state and must not run on a Tokio worker
//! thread, so [`render_document`] moves the work onto `spawn_blocking`.
//! Each call binds its own `Pdfium` handle inside that blocking thread; the
//! shared library is loaded once by the OS and re-binding is cheap.
//!
//! The longest edge is capped at `max_rendered_pixels` regardless of the
//! page's physical size, which keeps memory bounded on posters and
//! engineering drawings.

use crate::error::Pdf2MdError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit libpdfium path.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to libpdfium.
///
/// Resolution order: `lib_path`, then `$PDFIUM_LIB_PATH`, then a library next
/// to the working directory, then the system search path.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, Pdf2MdError> {
    let explicit: Option<PathBuf> = lib_path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => Pdfium::bind_to_library(&path).map_err(|e| {
            Pdf2MdError::PdfiumBindingFailed(format!("{}: {}", path.display(), e))
        })?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Pdf2MdError::PdfiumBindingFailed(e.to_string()))?,
    };

    Ok(Pdfium::new(bindings))
}

/// Check that libpdfium can be loaded. Runs on the blocking pool.
pub async fn probe_pdfium(lib_path: Option<PathBuf>) -> Result<(), Pdf2MdError> {
    tokio::task::spawn_blocking(move || bind_pdfium(lib_path.as_deref()).map(|_| ()))
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("pdfium probe panicked: {}", e)))?
}

/// Rasterise every page of `document`, in page order.
pub async fn render_document(
    document: Vec<u8>,
    max_pixels: u32,
    lib_path: Option<PathBuf>,
) -> Result<Vec<DynamicImage>, Pdf2MdError> {
    tokio::task::spawn_blocking(move || {
        render_document_blocking(&document, max_pixels, lib_path.as_deref())
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_document_blocking(
    document: &[u8],
    max_pixels: u32,
    lib_path: Option<&Path>,
) -> Result<Vec<DynamicImage>, Pdf2MdError> {
    let pdfium = bind_pdfium(lib_path)?;

    let doc = pdfium
        .load_pdf_from_byte_slice(document, None)
        .map_err(|e| {
            let detail = format!("{:?}", e);
            if detail.to_lowercase().contains("password") {
                Pdf2MdError::PasswordRequired
            } else {
                Pdf2MdError::CorruptPdf { detail }
            }
        })?;

    let pages = doc.pages();
    info!("Rendering {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Pdf2MdError::Conversion {
                detail: format!("rasterisation failed for page {}: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}
