use super::DocumentType;
use crate::error::RagError;
use docx::DocxParser;
use pdf::PdfParser;
use text::TextParser;

pub mod docx;
pub mod pdf;
pub mod text;

/// Enumeration of all supported parser types.
#[derive(Debug)]
pub enum Parser {
    Text(TextParser),
    Pdf(PdfParser),
    Docx(DocxParser),
}

impl Parser {
    /// Returns the parser for a document type.
    pub fn new(ty: DocumentType) -> Self {
        match ty {
            DocumentType::Text | DocumentType::Markdown => Self::Text(TextParser),
            DocumentType::Docx => Self::Docx(DocxParser),
            DocumentType::Pdf => Self::Pdf(PdfParser),
        }
    }

    pub fn parse(&self, input: &[u8]) -> Result<String, RagError> {
        match self {
            Self::Text(p) => p.parse(input),
            Self::Pdf(p) => p.parse(input),
            Self::Docx(p) => p.parse(input),
        }
    }
}
