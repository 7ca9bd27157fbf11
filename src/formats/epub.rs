//! EPUB format handler.

use crate::error::{AppError, Result};
use crate::formats::FormatHandler;
use roxmltree::Document;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Handler for EPUB files.
pub struct EpubHandler;

impl EpubHandler {
    fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        archive.by_name(name)?.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Find the OPF package path from container.xml.
    fn find_opf_path(archive: &mut ZipArchive<File>) -> Result<String> {
        let container = Self::read_entry(archive, "META-INF/container.xml")?;
        let content = String::from_utf8_lossy(&container);
        let doc = Document::parse(&content)?;

        doc.descendants()
            .find(|n| n.has_tag_name("rootfile"))
            .and_then(|n| n.attribute("full-path"))
            .map(String::from)
            .ok_or_else(|| AppError::InvalidFormat("No rootfile in container.xml".into()))
    }

    /// Locate the cover image href in an OPF package.
    ///
    /// Order: EPUB 3 `properties="cover-image"`, EPUB 2 `<meta name="cover">`,
    /// then any image item whose href mentions "cover".
    fn cover_href(opf: &str) -> Result<Option<String>> {
        let doc = Document::parse(opf)?;
        let items: Vec<_> = doc
            .descendants()
            .filter(|n| n.tag_name().name() == "item")
            .collect();

        let by_property = items.iter().find(|n| {
            n.attribute("properties")
                .is_some_and(|p| p.split_whitespace().any(|p| p == "cover-image"))
        });
        if let Some(href) = by_property.and_then(|n| n.attribute("href")) {
            return Ok(Some(href.to_string()));
        }

        let cover_id = doc
            .descendants()
            .find(|n| n.tag_name().name() == "meta" && n.attribute("name") == Some("cover"))
            .and_then(|n| n.attribute("content"));
        if let Some(cover_id) = cover_id
            && let Some(href) = items
                .iter()
                .find(|n| n.attribute("id") == Some(cover_id))
                .and_then(|n| n.attribute("href"))
        {
            return Ok(Some(href.to_string()));
        }

        Ok(items
            .iter()
            .filter_map(|n| n.attribute("href"))
            .find(|href| {
                let lower = href.to_lowercase();
                lower.contains("cover")
                    && [".jpg", ".jpeg", ".png", ".gif", ".webp"]
                        .iter()
                        .any(|ext| lower.ends_with(ext))
            })
            .map(String::from))
    }
}

impl FormatHandler for EpubHandler {
    fn extract_cover(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let mut archive = ZipArchive::new(File::open(path)?)?;

        let opf_path = Self::find_opf_path(&mut archive)?;
        let opf = Self::read_entry(&mut archive, &opf_path)?;

        let Some(href) = Self::cover_href(&String::from_utf8_lossy(&opf))? else {
            return Ok(None);
        };

        // Hrefs are relative to the OPF file's directory.
        let full = match opf_path.rsplit_once('/') {
            Some((dir, _)) => format!("{}/{}", dir, href),
            None => href.clone(),
        };
        let name = if archive.index_for_name(&full).is_some() {
            full
        } else {
            href
        };

        Ok(Some(Self::read_entry(&mut archive, &name)?))
    }

    fn page_count(&self, _path: &Path) -> Result<Option<u32>> {
        // Reflowable, no fixed pages
        Ok(None)
    }

    fn page_text(&self, _path: &Path, _page: u32) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    fn write_epub(path: &Path, opf: &str, files: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();

        zip.start_file("META-INF/container.xml", options).unwrap();
        zip.write_all(CONTAINER.as_bytes()).unwrap();
        zip.start_file("OEBPS/content.opf", options).unwrap();
        zip.write_all(opf.as_bytes()).unwrap();
        for (name, data) in files {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_cover_from_meta() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("book.epub");
        let opf = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata><meta name="cover" content="img1"/></metadata>
  <manifest><item id="img1" href="images/front.jpg" media-type="image/jpeg"/></manifest>
</package>"#;
        write_epub(&path, opf, &[("OEBPS/images/front.jpg", b"JPEGDATA")]);

        let cover = EpubHandler.extract_cover(&path).unwrap();
        assert_eq!(cover.as_deref(), Some(&b"JPEGDATA"[..]));
    }

    #[test]
    fn test_cover_from_properties() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <manifest>
    <item id="c" href="art.png" properties="cover-image" media-type="image/png"/>
  </manifest>
</package>"#;
        assert_eq!(
            EpubHandler::cover_href(opf).unwrap().as_deref(),
            Some("art.png")
        );
    }

    #[test]
    fn test_no_cover() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("plain.epub");
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <manifest><item id="t" href="text.xhtml" media-type="application/xhtml+xml"/></manifest>
</package>"#;
        write_epub(&path, opf, &[]);

        assert!(EpubHandler.extract_cover(&path).unwrap().is_none());
        assert!(EpubHandler.page_count(&path).unwrap().is_none());
    }

    #[test]
    fn test_not_a_zip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.epub");
        std::fs::write(&path, b"plain text").unwrap();

        assert!(matches!(EpubHandler.extract_cover(&path), Err(AppError::Zip(_))));
    }
}
