use crate::error::{AppError, Result};
use crate::formats::FormatHandler;
use lopdf::{Dictionary, Document, Object, Stream};
use std::path::Path;

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];
const PNG_MAGIC: [u8; 4] = [0x89, b'P', b'N', b'G'];

/// Handler for PDF files.
pub struct PdfHandler;

impl PdfHandler {
    fn load(path: &Path) -> Result<Document> {
        Document::load(path).map_err(|e| AppError::Pdf(e.to_string()))
    }

    /// Follow a reference if needed and return the dictionary.
    fn dictionary<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
        match obj {
            Object::Reference(r) => doc.get_dictionary(*r).ok(),
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Image XObjects on the first page, in resource order.
    fn first_page_images(doc: &Document) -> Vec<&Stream> {
        let pages = doc.get_pages();
        let Some(&page_id) = pages.values().next() else {
            return Vec::new();
        };

        let xobjects = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|page| page.get(b"Resources").ok())
            .and_then(|res| Self::dictionary(doc, res))
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|xobj| Self::dictionary(doc, xobj));

        let Some(xobjects) = xobjects else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, obj)| match obj {
                Object::Reference(r) => doc.get_object(*r).ok(),
                _ => None,
            })
            .filter_map(|obj| match obj {
                Object::Stream(stream) => Some(stream),
                _ => None,
            })
            .filter(|stream| {
                matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
            })
            .collect()
    }

    /// Turn an image stream into encoded image bytes, if we can.
    fn image_bytes(stream: &Stream) -> Option<Vec<u8>> {
        // DCTDecode streams are plain JPEG files.
        if stream.content.starts_with(&JPEG_MAGIC) {
            return Some(stream.content.clone());
        }

        let data = stream.decompressed_content().ok()?;
        if data.starts_with(&JPEG_MAGIC) || data.starts_with(&PNG_MAGIC) {
            return Some(data);
        }

        // Raw 8-bit RGB samples
        let dimension = |key: &[u8]| match stream.dict.get(key) {
            Ok(Object::Integer(i)) if *i > 0 => u32::try_from(*i).ok(),
            _ => None,
        };
        let img = image::RgbImage::from_raw(dimension(b"Width")?, dimension(b"Height")?, data)?;

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .ok()?;
        Some(png)
    }
}

impl FormatHandler for PdfHandler {
    fn extract_cover(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let doc = Self::load(path)?;

        Ok(Self::first_page_images(&doc)
            .into_iter()
            .find_map(Self::image_bytes))
    }

    fn page_count(&self, path: &Path) -> Result<Option<u32>> {
        let doc = Self::load(path)?;

        Ok(Some(doc.get_pages().len() as u32))
    }

    fn page_text(&self, path: &Path, page: u32) -> Result<Option<String>> {
        let doc = Self::load(path)?;
        let pages = doc.get_pages().len() as u32;

        if page == 0 || page > pages {
            return Err(AppError::NotFound(format!(
                "Page {} (document has {} pages)",
                page, pages
            )));
        }

        let text = doc
            .extract_text(&[page])
            .map_err(|e| AppError::Pdf(e.to_string()))?;

        Ok(Some(text.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::dictionary;
    use tempfile::TempDir;

    /// Build a PDF with one text line per page.
    fn write_pdf(path: &Path, lines: &[&str]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => lines.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_page_count_and_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("two.pdf");
        write_pdf(&path, &["First page", "Second page"]);

        let handler = PdfHandler;
        assert_eq!(handler.page_count(&path).unwrap(), Some(2));

        let text = handler.page_text(&path, 2).unwrap().unwrap();
        assert!(text.contains("Second page"), "got {text:?}");
    }

    #[test]
    fn test_page_out_of_range() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("one.pdf");
        write_pdf(&path, &["Only page"]);

        let handler = PdfHandler;
        assert!(matches!(handler.page_text(&path, 0), Err(AppError::NotFound(_))));
        assert!(matches!(handler.page_text(&path, 2), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_text_only_pdf_has_no_cover() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.pdf");
        write_pdf(&path, &["No images here"]);

        assert!(PdfHandler.extract_cover(&path).unwrap().is_none());
    }

    #[test]
    fn test_invalid_pdf() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        assert!(matches!(PdfHandler.page_count(&path), Err(AppError::Pdf(_))));
    }
}
