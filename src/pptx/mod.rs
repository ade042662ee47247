//! Minimal PowerPoint (.pptx) support: write generated decks and read their
//! slide text back.

pub mod reader;
pub mod template;
pub mod writer;

use thiserror::Error;

pub use reader::{read_slides, SlideText};
pub use writer::{to_bytes, write_package};

/// MIME type of a `.pptx` package
pub const MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// File extension of generated decks
pub const EXTENSION: &str = "pptx";

#[derive(Error, Debug)]
pub enum PptxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("failed to format xml: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing package part: {0}")]
    MissingPart(String),
}
