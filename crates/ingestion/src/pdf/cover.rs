//! First-page cover rendering
//!
//! Rendering needs MuPDF, which is AGPL and links native code, so it sits
//! behind the `mupdf` feature. Without it no renderer is available and PDF
//! documents are stored without a cover.

use crate::errors::IngestionError;
use crate::model::CoverImage;
use std::sync::Arc;

/// Scale applied when rendering the cover page
pub const COVER_SCALE: f32 = 2.0;

/// Renders a page of a PDF to an image
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render_first_page(&self, data: &[u8]) -> Result<CoverImage, IngestionError>;
}

/// Whether this build can render PDF covers
pub fn can_render_covers() -> bool {
    cfg!(feature = "mupdf")
}

/// The renderer compiled into this build, if any
pub fn default_renderer() -> Option<Arc<dyn PageRenderer>> {
    #[cfg(feature = "mupdf")]
    {
        Some(Arc::new(mupdf_renderer::MupdfRenderer))
    }
    #[cfg(not(feature = "mupdf"))]
    {
        None
    }
}

#[cfg(feature = "mupdf")]
mod mupdf_renderer {
    use super::{PageRenderer, COVER_SCALE};
    use crate::errors::IngestionError;
    use crate::model::CoverImage;
    use mupdf::{Colorspace, Document, ImageFormat, Matrix};

    /// Page 1 at 2x, encoded as PNG
    #[derive(Debug, Clone, Copy, Default)]
    pub struct MupdfRenderer;

    fn failed(e: impl std::fmt::Display) -> IngestionError {
        IngestionError::CoverExtractionFailed(format!("page 1 render: {}", e))
    }

    impl PageRenderer for MupdfRenderer {
        fn name(&self) -> &'static str {
            "mupdf"
        }

        fn render_first_page(&self, data: &[u8]) -> Result<CoverImage, IngestionError> {
            let document = Document::from_bytes(data, "application/pdf").map_err(failed)?;
            let page = document.load_page(0).map_err(failed)?;
            let matrix = Matrix::new_scale(COVER_SCALE, COVER_SCALE);
            let pixmap = page
                .to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)
                .map_err(failed)?;

            let mut png = Vec::new();
            pixmap.write_to(&mut png, ImageFormat::PNG).map_err(failed)?;

            Ok(CoverImage {
                data: png,
                path: "page-1".to_string(),
                media_type: Some("image/png".to_string()),
            })
        }
    }
}
