use crate::{err, error::RagError, map_err};
use parser::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod parser;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    /// Plain text, decoded as UTF-8.
    Text,

    /// Markdown, kept as is.
    Markdown,

    Docx,

    Pdf,
}

impl DocumentType {
    pub fn try_from_path(path: &Path) -> Result<Self, RagError> {
        let Some(ext) = path.extension() else {
            return err!(InvalidFileName, "missing extension: {}", path.display());
        };

        let Some(ext) = ext.to_str() else {
            return err!(InvalidFileName, "extension invalid unicode: {:?}", ext);
        };

        Self::try_from(ext)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentType::Text => write!(f, "txt"),
            DocumentType::Markdown => write!(f, "md"),
            DocumentType::Docx => write!(f, "docx"),
            DocumentType::Pdf => write!(f, "pdf"),
        }
    }
}

impl TryFrom<&str> for DocumentType {
    type Error = RagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Text),
            "md" => Ok(Self::Markdown),
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            _ => err!(UnsupportedFileType, "{value}"),
        }
    }
}

/// Text extracted from a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// File name of the document, used as the chunk source.
    pub source: String,
    pub text: String,
}

impl ExtractedDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// Outcome of processing every file in a directory.
#[derive(Debug, Default)]
pub struct ProcessedDirectory {
    pub documents: Vec<ExtractedDocument>,

    /// Files that could not be processed, with the reason.
    pub failed: Vec<(PathBuf, RagError)>,
}

/// Reads files from disk and extracts their text with the appropriate [Parser].
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub async fn process(&self, path: impl AsRef<Path>) -> Result<ExtractedDocument, RagError> {
        let path = path.as_ref();
        let start = Instant::now();

        let ty = DocumentType::try_from_path(path)?;

        let Some(source) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return err!(InvalidFileName, "not a file: {}", path.display());
        };

        debug!("Reading {}", path.display());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return err!(DoesNotExist, "file {}", path.display());
            }
            Err(e) => return Err(RagError::new(file!(), line!(), column!(), e.into())),
        };

        let text = Parser::new(ty).parse(&bytes)?;

        debug!(
            "Extracted {} characters from '{source}' ({ty}), took {}ms",
            text.len(),
            Instant::now().duration_since(start).as_millis()
        );

        Ok(ExtractedDocument { source, text })
    }

    /// Process every regular, non-hidden file in `dir`, in file name order.
    /// Failures are collected rather than aborting the whole directory.
    pub async fn process_directory(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<ProcessedDirectory, RagError> {
        let dir = dir.as_ref();

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return err!(DoesNotExist, "directory {}", dir.display());
            }
            Err(e) => return Err(RagError::new(file!(), line!(), column!(), e.into())),
        };

        let mut paths = vec![];
        while let Some(entry) = map_err!(entries.next_entry().await) {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !map_err!(entry.file_type().await).is_file() {
                continue;
            }
            paths.push(entry.path());
        }
        paths.sort();

        let mut processed = ProcessedDirectory::default();

        for path in paths {
            match self.process(&path).await {
                Ok(document) => processed.documents.push(document),
                Err(e) => {
                    warn!("Skipping {}: {e}", path.display());
                    processed.failed.push((path, e));
                }
            }
        }

        info!(
            "Processed directory {}, {} succeeded, {} failed",
            dir.display(),
            processed.documents.len(),
            processed.failed.len()
        );

        Ok(processed)
    }
}
