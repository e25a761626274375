// lopdf helper - page count and page geometry
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;

use crate::types::{Result, ScanError};

// US Letter, used when no page box is reachable
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Load a PDF document using lopdf
pub fn load_pdf(path: &Path) -> Result<Document> {
    Ok(Document::load(path)?)
}

/// Width and height in points of every page, in page order.
pub fn page_sizes(document: &Document) -> Result<Vec<(f32, f32)>> {
    document
        .get_pages()
        .values()
        .map(|page_id| page_dimensions(document, *page_id))
        .collect()
}

/// Visible page size: the CropBox, else the MediaBox, else US Letter.
/// Boxes and /Rotate are inheritable through the Parent chain; a quarter
/// turn swaps width and height, as the poppler tools do.
pub fn page_dimensions(document: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
    let page = document.get_object(page_id)?.as_dict()?;

    let size = match inherited(document, page, |d| box_size(document, d, b"CropBox"))? {
        Some(size) => size,
        None => inherited(document, page, |d| box_size(document, d, b"MediaBox"))?
            .unwrap_or(DEFAULT_PAGE_SIZE),
    };
    let rotate = inherited(document, page, |d| d.get(b"Rotate").ok().and_then(object_to_f32))?
        .unwrap_or(0.0);

    if (rotate.round() as i64).rem_euclid(180) == 90 {
        Ok((size.1, size.0))
    } else {
        Ok(size)
    }
}

/// First value `lookup` finds on the page or one of its ancestors.
fn inherited<'a, T>(
    document: &'a Document,
    page: &'a Dictionary,
    lookup: impl Fn(&'a Dictionary) -> Option<T>,
) -> Result<Option<T>> {
    let mut dict = page;

    // Parent chains are short; the cap guards against cyclic trees
    for _ in 0..32 {
        if let Some(value) = lookup(dict) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => {
                dict = document.get_object(*parent_id)?.as_dict()?;
            }
            _ => break,
        }
    }

    Ok(None)
}

fn box_size(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<(f32, f32)> {
    let array = match dict.get(key).ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_array().ok()?,
        Object::Array(arr) => arr,
        _ => return None,
    };

    if array.len() != 4 {
        return None;
    }

    let mut bounds = [0.0f32; 4];
    for (slot, obj) in bounds.iter_mut().zip(array) {
        *slot = object_to_f32(obj)?;
    }

    Some(((bounds[2] - bounds[0]).abs(), (bounds[3] - bounds[1]).abs()))
}

fn object_to_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

pub(crate) fn require_pages(path: &Path, sizes: &[(f32, f32)]) -> Result<()> {
    if sizes.is_empty() {
        return Err(ScanError::Pdf(format!("{} has no pages", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn document_with_page(page_entries: Dictionary, pages_entries: Dictionary) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };
        for (key, value) in page_entries.iter() {
            page.set(key.clone(), value.clone());
        }
        let page_id = doc.add_object(page);

        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        for (key, value) in pages_entries.iter() {
            pages.set(key.clone(), value.clone());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn rect(width: i64, height: i64) -> Object {
        vec![0.into(), 0.into(), width.into(), height.into()].into()
    }

    #[test]
    fn test_page_sizes_from_media_box() {
        let doc = document_with_page(dictionary! { "MediaBox" => rect(595, 842) }, dictionary! {});
        assert_eq!(page_sizes(&doc).unwrap(), vec![(595.0, 842.0)]);
    }

    #[test]
    fn test_page_sizes_inherited_from_parent() {
        let doc = document_with_page(dictionary! {}, dictionary! { "MediaBox" => rect(612, 1008) });
        assert_eq!(page_sizes(&doc).unwrap(), vec![(612.0, 1008.0)]);
    }

    #[test]
    fn test_crop_box_is_the_visible_page() {
        let doc = document_with_page(
            dictionary! { "MediaBox" => rect(612, 1008), "CropBox" => rect(612, 792) },
            dictionary! {},
        );
        assert_eq!(page_sizes(&doc).unwrap(), vec![(612.0, 792.0)]);

        // An inherited CropBox still beats the page's own MediaBox
        let doc = document_with_page(
            dictionary! { "MediaBox" => rect(612, 1008) },
            dictionary! { "CropBox" => rect(612, 792) },
        );
        assert_eq!(page_sizes(&doc).unwrap(), vec![(612.0, 792.0)]);
    }

    #[test]
    fn test_quarter_turn_swaps_dimensions() {
        let doc = document_with_page(
            dictionary! { "MediaBox" => rect(612, 792), "Rotate" => 90 },
            dictionary! {},
        );
        assert_eq!(page_sizes(&doc).unwrap(), vec![(792.0, 612.0)]);

        let doc = document_with_page(
            dictionary! { "MediaBox" => rect(612, 792) },
            dictionary! { "Rotate" => -180 },
        );
        assert_eq!(page_sizes(&doc).unwrap(), vec![(612.0, 792.0)]);
    }

    #[test]
    fn test_missing_boxes_default_to_letter() {
        let doc = document_with_page(dictionary! {}, dictionary! {});
        assert_eq!(page_sizes(&doc).unwrap(), vec![DEFAULT_PAGE_SIZE]);
    }
}
