//! Folio Vector crate - embedding services, semantic index, and document chunking.
//!
//! Provides an embedding service trait with ONNX and mock implementations,
//! an immutable semantic index with similarity and diversity (MMR) search,
//! and the extraction/splitting step that turns uploads into fragments.

pub mod embedding;
pub mod extract;
pub mod index;
pub mod mmr;

pub use embedding::{
    DynEmbeddingService, EmbeddingService, MockEmbedding, OnnxEmbeddingService, SharedEmbedder,
};
pub use extract::{
    DocumentExtractor, DocumentProcessor, PdfExtractor, PlainTextExtractor, TextSplitter,
};
pub use index::{SearchHit, SearchOptions, SemanticIndex};
