//! EPUB cover image lookup

use super::opf::{ManifestItem, OpfPackage};
use crate::errors::IngestionError;
use crate::model::CoverImage;
use std::io::{Read, Seek};
use zip::ZipArchive;

fn is_image(item: &ManifestItem) -> bool {
    item.media_type
        .as_deref()
        .map(|t| t.starts_with("image/"))
        .unwrap_or(false)
}

/// Manifest item holding the cover image, if the package declares one.
///
/// Tried in order: `<meta name="cover" content="<id>">`, an image item
/// whose id is `cover` or `cover-image`, then an item with the
/// `cover-image` property.
pub fn find_cover_item(package: &OpfPackage) -> Option<&ManifestItem> {
    let declared = package
        .metadata_element()
        .descendants()
        .into_iter()
        .filter(|el| el.local_name() == "meta")
        .find(|el| el.attr("name") == Some("cover"))
        .and_then(|el| el.attr("content"));

    if let Some(reference) = declared {
        let item = package
            .manifest_item(reference)
            .or_else(|| package.manifest.iter().find(|item| item.href == reference));
        if item.is_some() {
            return item;
        }
    }

    package
        .manifest
        .iter()
        .find(|item| {
            let id = item.id.to_ascii_lowercase();
            (id == "cover" || id == "cover-image") && is_image(item)
        })
        .or_else(|| {
            package.manifest.iter().find(|item| {
                item.properties
                    .as_deref()
                    .map(|p| p.split_whitespace().any(|prop| prop == "cover-image"))
                    .unwrap_or(false)
            })
        })
}

/// Read the cover image bytes out of the archive.
///
/// `Ok(None)` when no cover is declared. A declared cover that cannot be
/// read is an error; callers log it and carry on without a cover.
pub fn extract_cover<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    package: &OpfPackage,
) -> Result<Option<CoverImage>, IngestionError> {
    let Some(item) = find_cover_item(package) else {
        return Ok(None);
    };

    let path = package.resolve_href(&item.href);
    let mut entry = archive
        .by_name(&path)
        .map_err(|e| IngestionError::CoverExtractionFailed(format!("{}: {}", path, e)))?;

    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|e| IngestionError::CoverExtractionFailed(format!("{}: {}", path, e)))?;

    if data.is_empty() {
        return Err(IngestionError::CoverExtractionFailed(format!(
            "{}: empty image",
            path
        )));
    }

    Ok(Some(CoverImage {
        data,
        path,
        media_type: item.media_type.clone(),
    }))
}
