//! DOCX template handling: zip package, XML tree and paragraph/table model

pub mod error;
pub mod model;
pub mod package;
pub mod xml;

pub use error::DocxError;
pub use model::{
    Block, Cell, Document, FontSize, Inline, InlineGroup, Paragraph, Row, Run, RunContent, Table,
};
pub use package::DocxPackage;

#[cfg(test)]
pub(crate) use package::test_support;
