//! DOCX (OPC zip) package I/O
//!
//! Every entry is kept as raw bytes in archive order. Only the main document
//! part is ever parsed or replaced.

use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::DocxError;
use super::model::Document;
use super::xml;

const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

struct PackageEntry {
    name: String,
    data: Vec<u8>,
}

/// An opened `.docx` package
pub struct DocxPackage {
    entries: Vec<PackageEntry>,
    main_part: String,
}

impl DocxPackage {
    /// Read a package from memory and locate its main document part
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocxError::NotAPackage(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| DocxError::NotAPackage(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry { name, data });
        }

        let main_part = entries
            .iter()
            .find(|e| e.name == PACKAGE_RELS)
            .and_then(|e| std::str::from_utf8(&e.data).ok())
            .and_then(resolve_main_part)
            .unwrap_or_else(|| DEFAULT_MAIN_PART.to_string());

        if !entries.iter().any(|e| e.name == main_part) {
            return Err(DocxError::NotAPackage(format!(
                "main document part '{}' is missing",
                main_part
            )));
        }

        Ok(Self { entries, main_part })
    }

    /// Name of the main document part (usually `word/document.xml`)
    pub fn main_part(&self) -> &str {
        &self.main_part
    }

    /// Raw bytes of a part
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Parse the main document part
    pub fn document(&self) -> Result<Document, DocxError> {
        let data = self
            .part(&self.main_part)
            .ok_or_else(|| DocxError::MissingPart(self.main_part.clone()))?;
        let source =
            std::str::from_utf8(data).map_err(|_| DocxError::Encoding(self.main_part.clone()))?;
        Document::from_root(xml::parse(source)?)
    }

    /// Serialize `document` and store it as the main part
    pub fn set_document(&mut self, document: Document) -> Result<(), DocxError> {
        let data = xml::write_document(&document.into_root())?;
        let main_part = self.main_part.clone();
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == main_part)
            .ok_or(DocxError::MissingPart(main_part))?;
        entry.data = data;
        Ok(())
    }

    /// Write the package back out as a deflated zip, preserving entry order
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| DocxError::Write(e.to_string()))?;
            writer.write_all(&entry.data)?;
        }
        let cursor = writer
            .finish()
            .map_err(|e| DocxError::Write(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Find the `officeDocument` relationship target in `_rels/.rels`
fn resolve_main_part(rels_xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut rel_type = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        b"Target" => target = Some(String::from_utf8_lossy(&attr.value).to_string()),
                        _ => {}
                    }
                }
                if let (Some(rel_type), Some(target)) = (rel_type, target) {
                    if rel_type.ends_with(OFFICE_DOCUMENT_REL) {
                        return Some(target.trim_start_matches('/').to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    None
}
