//! Fill the SOP template and produce a downloadable `.docx`

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::docx::{DocxError, DocxPackage, FontSize};
use crate::fields::FieldSet;
use crate::substitution::substitute_document;

/// MIME type of a WordprocessingML document
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Every run in the output is forced to this size
pub const OUTPUT_FONT_POINTS: u32 = 8;

/// Errors raised while rendering the template
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to read template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template is not a valid DOCX package: {0}")]
    TemplateLoad(#[source] DocxError),

    #[error("Template document could not be parsed: {0}")]
    Document(#[source] DocxError),

    #[error("Failed to write output document: {0}")]
    Serialize(#[source] DocxError),
}

/// A finished SOP file, held in memory until downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl RenderedDocument {
    pub fn mime_type(&self) -> &'static str {
        DOCX_MIME_TYPE
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Where the template comes from
///
/// A file is re-read on every render so edits to the asset are picked up
/// without a restart.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    File(PathBuf),
    Bytes(Arc<[u8]>),
}

impl TemplateSource {
    pub fn read(&self) -> Result<Arc<[u8]>, RenderError> {
        match self {
            TemplateSource::File(path) => std::fs::read(path)
                .map(Arc::from)
                .map_err(|source| RenderError::TemplateRead {
                    path: path.clone(),
                    source,
                }),
            TemplateSource::Bytes(bytes) => Ok(Arc::clone(bytes)),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            TemplateSource::File(path) => path.display().to_string(),
            TemplateSource::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }

    /// Read and render in one step
    pub fn render(&self, fields: &FieldSet) -> Result<RenderedDocument, RenderError> {
        let bytes = self.read()?;
        render(&bytes, fields)
    }
}

/// Substitute `fields` into the template and normalise every run to 8pt
pub fn render(template: &[u8], fields: &FieldSet) -> Result<RenderedDocument, RenderError> {
    let mut package = DocxPackage::from_bytes(template).map_err(RenderError::TemplateLoad)?;
    let mut document = package.document().map_err(RenderError::Document)?;

    for (key, value) in fields.iter() {
        if value.trim().is_empty() {
            debug!("Field {} is blank; its placeholder renders empty", key);
        }
    }

    let rewritten = substitute_document(&mut document, fields);

    let size = FontSize::from_points(OUTPUT_FONT_POINTS);
    let mut runs = 0;
    for paragraph in document.paragraphs_mut() {
        for run in paragraph.runs_mut() {
            run.set_font_size(size);
            runs += 1;
        }
    }

    package
        .set_document(document)
        .map_err(RenderError::Serialize)?;
    let bytes = package.to_bytes().map_err(RenderError::Serialize)?;
    let filename = fields.output_filename();

    info!(
        "Rendered {} ({} bytes, {} paragraph(s) substituted, {} run(s) resized)",
        filename,
        bytes.len(),
        rewritten,
        runs
    );

    Ok(RenderedDocument { bytes, filename })
}
