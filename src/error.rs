use std::error::Error as _;
use thiserror::Error;
use tracing::error;
use validify::ValidationErrors;

#[derive(Debug, Error)]
pub enum RagErr {
    #[error("Invalid input; {0}")]
    InvalidInput(String),

    #[error("Index not built; {0}")]
    IndexNotBuilt(String),

    #[error("Does not exist; {0}")]
    DoesNotExist(String),

    #[error("Model mismatch; {0}")]
    ModelMismatch(String),

    #[error("Corrupt artifact; {0}")]
    CorruptArtifact(String),

    #[error("Unsupported file type; {0}")]
    UnsupportedFileType(String),

    #[error("Invalid file name; {0}")]
    InvalidFileName(String),

    #[error("No results; {0}")]
    NoResults(String),

    #[error("Invalid embedding model; {0}")]
    InvalidEmbeddingModel(String),

    #[error("Invalid provider; {0}")]
    InvalidProvider(String),

    #[error("Invalid embeddings; {0}")]
    InvalidEmbeddings(String),

    #[error("Completion; {0}")]
    Completion(String),

    #[error("Embedding; {0}")]
    Embedding(#[from] ragkit_embedders::error::EmbeddingError),

    #[error("Chunker; {0}")]
    Chunker(#[from] chunker::ChunkerError),

    #[error("IO; {0}")]
    IO(#[from] std::io::Error),

    #[error("FMT; {0}")]
    Fmt(#[from] std::fmt::Error),

    #[error("JSON error; {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Parse pdf; {0}")]
    ParsePdf(#[from] pdfium_render::prelude::PdfiumError),

    #[error("Docx read; {0}")]
    DocxRead(#[from] docx_rs::ReaderError),

    #[error("Validation; {0}")]
    Validation(#[from] ValidationErrors),

    #[cfg(any(feature = "openai", feature = "ollama"))]
    #[error("Http; {0}")]
    Reqwest(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
#[error("{error}")]
pub struct RagError {
    file: &'static str,
    line: u32,
    column: u32,
    pub error: RagErr,
}

impl RagError {
    pub fn new(file: &'static str, line: u32, column: u32, error: RagErr) -> RagError {
        RagError {
            file,
            line,
            column,
            error,
        }
    }

    pub fn location(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.column)
    }

    pub fn print(&self) {
        let location = self.location();

        error!("{location} | {self}");

        if self.error.source().is_some() {
            error!("Causes:");
        }

        let mut src = self.error.source();
        while let Some(source) = src {
            error!(" - {source}");
            src = source.source();
        }
    }
}

#[macro_export]
macro_rules! err {
    ($ty:ident $(, $l:literal $(,)? $($args:expr),* )?) => {
        Err($crate::error::RagError::new(
            file!(),
            line!(),
            column!(),
            $crate::error::RagErr::$ty $( (format!($l, $( $args, )*)) )?,
        ))
    };
}

#[macro_export]
macro_rules! map_err {
    ($ex:expr) => {
        $ex.map_err(|e| $crate::error::RagError::new(file!(), line!(), column!(), e.into()))?
    };
}
