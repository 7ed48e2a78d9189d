//! EPUB 3 assembly.
//!
//! The book is a plain sequence of `<p>` elements split into sections of
//! [`PARAGRAPHS_PER_SECTION`] so readers never have to lay out one huge
//! XHTML file. Layout of the container:
//!
//! ```text
//! mimetype                 (first entry, stored uncompressed)
//! META-INF/container.xml
//! OEBPS/content.opf        package metadata, manifest, spine
//! OEBPS/nav.xhtml          EPUB 3 navigation document
//! OEBPS/toc.ncx            EPUB 2 table of contents for older readers
//! OEBPS/section-NNN.xhtml
//! ```

use crate::error::BookError;
use chrono::Utc;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Paragraphs per XHTML section file.
pub const PARAGRAPHS_PER_SECTION: usize = 200;

/// Package metadata written into `content.opf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpubMetadata {
    pub title: String,
    pub author: String,
    /// BCP 47 language tag of the book text (the target language).
    pub language: String,
    /// Unique identifier; the job id.
    pub identifier: String,
}

/// Build a complete EPUB file in memory.
pub fn build_epub(paragraphs: &[String], meta: &EpubMetadata) -> Result<Vec<u8>, BookError> {
    let sections: Vec<&[String]> = if paragraphs.is_empty() {
        vec![paragraphs]
    } else {
        paragraphs.chunks(PARAGRAPHS_PER_SECTION).collect()
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut add = |name: &str, body: &[u8], options: SimpleFileOptions| -> Result<(), BookError> {
        zip.start_file(name, options).map_err(zip_error)?;
        zip.write_all(body)
            .map_err(|e| BookError::Artifact(format!("writing {name}: {e}")))
    };

    add("mimetype", b"application/epub+zip", stored)?;
    add("META-INF/container.xml", CONTAINER_XML.as_bytes(), deflated)?;
    add(
        "OEBPS/content.opf",
        content_opf(meta, sections.len()).as_bytes(),
        deflated,
    )?;
    add("OEBPS/nav.xhtml", nav_xhtml(meta, sections.len()).as_bytes(), deflated)?;
    add("OEBPS/toc.ncx", toc_ncx(meta, sections.len()).as_bytes(), deflated)?;
    for (i, section) in sections.iter().enumerate() {
        add(
            &section_file(i),
            section_xhtml(meta, i, section).as_bytes(),
            deflated,
        )?;
    }

    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn zip_error(e: zip::result::ZipError) -> BookError {
    BookError::Artifact(format!("EPUB archive: {e}"))
}

fn section_file(index: usize) -> String {
    format!("OEBPS/section-{:03}.xhtml", index + 1)
}

fn section_href(index: usize) -> String {
    format!("section-{:03}.xhtml", index + 1)
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

fn content_opf(meta: &EpubMetadata, sections: usize) -> String {
    let modified = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let mut manifest = String::new();
    let mut spine = String::new();
    for i in 0..sections {
        manifest.push_str(&format!(
            "    <item id=\"s{n}\" href=\"{href}\" media-type=\"application/xhtml+xml\"/>\n",
            n = i + 1,
            href = section_href(i)
        ));
        spine.push_str(&format!("    <itemref idref=\"s{}\"/>\n", i + 1));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="book-id" xml:lang="{lang}">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">urn:job:{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <dc:language>{lang}</dc:language>
    <meta property="dcterms:modified">{modified}</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        lang = escape_xml(&meta.language),
        id = escape_xml(&meta.identifier),
        title = escape_xml(&meta.title),
        author = escape_xml(&meta.author),
    )
}

fn nav_xhtml(meta: &EpubMetadata, sections: usize) -> String {
    let items: String = (0..sections)
        .map(|i| {
            format!(
                "      <li><a href=\"{}\">Part {}</a></li>\n",
                section_href(i),
                i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="{lang}" lang="{lang}">
<head><title>{title}</title></head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{items}    </ol>
  </nav>
</body>
</html>
"#,
        lang = escape_xml(&meta.language),
        title = escape_xml(&meta.title),
    )
}

fn toc_ncx(meta: &EpubMetadata, sections: usize) -> String {
    let points: String = (0..sections)
        .map(|i| {
            format!(
                "    <navPoint id=\"p{n}\" playOrder=\"{n}\"><navLabel><text>Part {n}</text></navLabel><content src=\"{href}\"/></navPoint>\n",
                n = i + 1,
                href = section_href(i)
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:job:{id}"/></head>
  <docTitle><text>{title}</text></docTitle>
  <navMap>
{points}  </navMap>
</ncx>
"#,
        id = escape_xml(&meta.identifier),
        title = escape_xml(&meta.title),
    )
}

fn section_xhtml(meta: &EpubMetadata, index: usize, paragraphs: &[String]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("  <p>{}</p>\n", escape_xml(p)))
        .collect();
    let heading = if index == 0 {
        format!("  <h1>{}</h1>\n", escape_xml(&meta.title))
    } else {
        String::new()
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="{lang}" lang="{lang}">
<head><title>{title}</title></head>
<body>
{heading}{body}</body>
</html>
"#,
        lang = escape_xml(&meta.language),
        title = escape_xml(&meta.title),
    )
}

/// Escape text for XML element content and attribute values. Control
/// characters XML 1.0 forbids are dropped.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}
