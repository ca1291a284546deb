use std::{fs::File, io::Read, path::Path};

use quick_xml::events::Event;

use crate::{
    document::{Document, PAGE, SOURCE_PATH, TOTAL_PAGES},
    error::{Error, Result},
};

/// Supported file extensions for ingestion.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "docx"];

/// The extraction strategy selected from a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
    Docx,
}

impl FileKind {
    /// Classify a path by its (case-insensitive) extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use docsearch::extract::FileKind;
    ///
    /// assert_eq!(FileKind::from_path(Path::new("a/Report.PDF")).unwrap(), FileKind::Pdf);
    /// assert!(FileKind::from_path(Path::new("table.csv")).is_err());
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" => Ok(Self::Text),
            "docx" => Ok(Self::Docx),
            _ => Err(Error::UnsupportedFileType {
                extension: if extension.is_empty() {
                    String::new()
                } else {
                    format!(".{extension}")
                },
                file_name: file_name(path),
            }),
        }
    }
}

/// Final path component as a displayable string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Extract the text of a file as an ordered list of documents.
///
/// PDFs yield one document per page (image-only pages have empty content);
/// text and DOCX files yield a single document.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn extract_file(path: &Path) -> Result<Vec<Document>> {
    let kind = FileKind::from_path(path)?;
    let source = path.to_string_lossy().into_owned();

    let docs = match kind {
        FileKind::Pdf => extract_pdf(path)?
            .into_iter()
            .enumerate()
            .map(|(i, (text, total))| {
                Document::new(text)
                    .with_meta(SOURCE_PATH, source.clone())
                    .with_meta(PAGE, i + 1)
                    .with_meta(TOTAL_PAGES, total)
            })
            .collect(),
        FileKind::Text => {
            vec![Document::new(extract_text(path)?).with_meta(SOURCE_PATH, source)]
        }
        FileKind::Docx => {
            vec![Document::new(extract_docx(path)?).with_meta(SOURCE_PATH, source)]
        }
    };

    tracing::debug!(documents = docs.len(), ?kind, "extracted file");
    Ok(docs)
}

/// Returns `(page_text, total_pages)` for every page.
fn extract_pdf(path: &Path) -> Result<Vec<(String, usize)>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| Error::extraction(path, e.to_string()))?;

    let total = pages.len();
    let blank = pages.iter().filter(|p| p.trim().is_empty()).count();
    if blank > 0 {
        tracing::debug!(
            path = %path.display(),
            pages = total,
            blank,
            "PDF has pages without extractable text"
        );
    }

    Ok(pages
        .into_iter()
        .map(|page| (page.trim().to_string(), total))
        .collect())
}

fn extract_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| Error::extraction(path, e))?;
    String::from_utf8(bytes).map_err(|e| Error::extraction(path, e))
}

/// Extract paragraph text from `word/document.xml` inside the DOCX archive.
fn extract_docx(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::extraction(path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::extraction(path, e))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| Error::extraction(path, e))?
        .read_to_string(&mut xml)
        .map_err(|e| Error::extraction(path, e))?;

    docx_paragraphs(&xml).map_err(|e| Error::extraction(path, e))
}

/// Collect `<w:t>` runs into paragraphs separated by blank lines.
fn docx_paragraphs(xml: &str) -> std::result::Result<String, quick_xml::Error> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(ref e) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(ref e) if in_text => {
                current.push_str(&e.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}
