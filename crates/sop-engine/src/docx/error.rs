use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocxError {
    #[error("Not a valid document package: {0}")]
    NotAPackage(String),

    #[error("Package part not found: {0}")]
    MissingPart(String),

    #[error("Malformed XML: {0}")]
    Xml(String),

    #[error("Part '{0}' is not valid UTF-8")]
    Encoding(String),

    #[error("Document has no body element")]
    MissingBody,

    #[error("Failed to write package: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
