//! Document loading
//!
//! Turns uploaded bytes into plain-text [`Document`]s. The file kind is taken
//! from the declared extension; anything outside pdf/doc/docx/txt is rejected
//! before a parser runs.
//!
//! Every file is parsed independently. [`DocumentLoader::load_all`] returns one
//! result per input, in input order, so a corrupt upload never hides the
//! documents next to it.

mod parsers;

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Supported upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Docx,
    Txt,
}

impl FileKind {
    /// Extensions accepted by the uploader, in display order.
    pub const SUPPORTED: [&'static str; 4] = ["pdf", "doc", "docx", "txt"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "doc" => Some(FileKind::Doc),
            "docx" => Some(FileKind::Docx),
            "txt" => Some(FileKind::Txt),
            _ => None,
        }
    }

    /// Detect the kind from a filename, failing with a parse error that names the file.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        Self::from_extension(ext).ok_or_else(|| {
            AppError::document_parse(
                filename,
                format!(
                    "unsupported file type '{}' (supported: {})",
                    ext,
                    Self::SUPPORTED.join(", ")
                ),
            )
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Doc => "doc",
            FileKind::Docx => "docx",
            FileKind::Txt => "txt",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw upload as handed over by a front end.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }
}

/// A parsed upload. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
    pub text: String,
}

impl Document {
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Dispatches uploads to the parser for their kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load(&self, file: UploadedFile) -> Result<Document> {
        let kind = FileKind::from_filename(&file.filename)?;
        debug!(filename = %file.filename, %kind, bytes = file.bytes.len(), "Parsing upload");

        let text = match kind {
            FileKind::Txt => parsers::parse_txt(&file.bytes),
            FileKind::Pdf => parsers::parse_pdf(&file.bytes),
            FileKind::Docx => parsers::parse_docx(&file.bytes),
            FileKind::Doc => parsers::parse_docx(&file.bytes).map_err(|e| {
                format!("legacy binary .doc files are not supported, save as .docx ({e})")
            }),
        }
        .map_err(|reason| AppError::document_parse(&file.filename, reason))?;

        if text.trim().is_empty() {
            return Err(AppError::document_parse(
                &file.filename,
                "document contains no extractable text",
            ));
        }

        info!(filename = %file.filename, %kind, chars = text.chars().count(), "Loaded document");

        Ok(Document {
            id: Uuid::new_v4(),
            filename: file.filename,
            kind,
            bytes: file.bytes,
            text,
        })
    }

    /// Load every file independently, preserving input order.
    pub fn load_all(&self, files: Vec<UploadedFile>) -> Vec<Result<Document>> {
        files
            .into_iter()
            .map(|file| {
                let result = self.load(file);
                if let Err(ref e) = result {
                    warn!(error = %e, "Skipping upload");
                }
                result
            })
            .collect()
    }
}
