//! Document text extraction and chunking.
//!
//! Turns uploaded document bytes into the ordered fragments a
//! [`SemanticIndex`](crate::index::SemanticIndex) is built from.

use std::collections::VecDeque;
use std::path::Path;

use folio_core::error::FolioError;
use tracing::debug;

/// Converts raw document bytes into plain text.
pub trait DocumentExtractor: Send + Sync {
    /// Whether this extractor handles files with the given name.
    fn supports(&self, filename: &str) -> bool;

    /// Extract the document's text.
    fn extract(&self, bytes: &[u8]) -> Result<String, FolioError>;
}

/// Extractor for UTF-8 text documents (`.txt`, `.md`, `.markdown`).
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl DocumentExtractor for PlainTextExtractor {
    fn supports(&self, filename: &str) -> bool {
        extension_of(filename)
            .map(|ext| PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, FolioError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| FolioError::Extraction(format!("document is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Err(FolioError::Extraction("No content found in document".into()));
        }
        Ok(text.replace("\r\n", "\n"))
    }
}

/// Extractor for PDF documents.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn supports(&self, filename: &str) -> bool {
        extension_of(filename).as_deref() == Some("pdf")
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, FolioError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(FolioError::Extraction("document is not a PDF".into()));
        }

        // pdf-extract panics on some malformed files instead of erroring.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| FolioError::Extraction("PDF parser failed on malformed input".into()))?
            .map_err(|e| FolioError::Extraction(format!("failed to read PDF: {}", e)))?;

        if text.trim().is_empty() {
            return Err(FolioError::Extraction("No content found in document".into()));
        }
        debug!(chars = text.len(), "PDF text extracted");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Recursive character splitter
// ---------------------------------------------------------------------------

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splits text into overlapping chunks of at most `chunk_size` characters.
///
/// The coarsest separator present in the text is tried first (paragraphs,
/// then lines, then words, then characters). Pieces that are still too long
/// are split again with the next separator. Adjacent small pieces are
/// merged back together, and consecutive chunks share up to
/// `chunk_overlap` characters of trailing context.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl TextSplitter {
    /// Create a splitter. `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Returns an empty vector for blank input.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator: &str = "";
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joined_len = |current: &VecDeque<&str>, total: usize| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };

            if joined_len(&current, total) > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);
                // Drop from the front until what remains fits as overlap.
                while total > self.chunk_overlap
                    || (joined_len(&current, total) > self.chunk_size && total > 0)
                {
                    let Some(front) = current.pop_front() else { break };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(docs: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

// ---------------------------------------------------------------------------
// DocumentProcessor
// ---------------------------------------------------------------------------

/// Pairs a set of extractors with a splitter.
pub struct DocumentProcessor {
    extractors: Vec<Box<dyn DocumentExtractor>>,
    splitter: TextSplitter,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("extractors", &self.extractors.len())
            .field("splitter", &self.splitter)
            .finish()
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(TextSplitter::default())
    }
}

impl DocumentProcessor {
    /// A processor with the plain-text and PDF extractors registered.
    pub fn new(splitter: TextSplitter) -> Self {
        Self {
            extractors: vec![Box::new(PlainTextExtractor), Box::new(PdfExtractor)],
            splitter,
        }
    }

    /// Register another extractor. Later registrations take precedence.
    pub fn with_extractor(mut self, extractor: Box<dyn DocumentExtractor>) -> Self {
        self.extractors.insert(0, extractor);
        self
    }

    /// Whether any registered extractor handles `filename`.
    pub fn supports(&self, filename: &str) -> bool {
        self.extractor_for(filename).is_some()
    }

    fn extractor_for(&self, filename: &str) -> Option<&dyn DocumentExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supports(filename))
            .map(|e| e.as_ref())
    }

    /// Extract text from `bytes` and split it into fragments.
    pub fn extract_and_chunk(&self, filename: &str, bytes: &[u8]) -> Result<Vec<String>, FolioError> {
        let extractor = self.extractor_for(filename).ok_or_else(|| {
            FolioError::Validation(format!("unsupported document type: {}", filename))
        })?;

        let text = extractor.extract(bytes)?;
        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            return Err(FolioError::EmptyInput);
        }

        debug!(filename, chunks = chunks.len(), "Document chunked");
        Ok(chunks)
    }

    /// Read a file from disk and chunk it.
    pub fn extract_file(&self, path: &Path, filename: &str) -> Result<Vec<String>, FolioError> {
        let bytes = std::fs::read(path)?;
        self.extract_and_chunk(filename, &bytes)
    }
}
