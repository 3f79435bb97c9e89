//! Embedding service trait and implementations.
//!
//! - `OnnxEmbeddingService` loads a sentence-transformer ONNX model (e.g.
//!   all-MiniLM-L6-v2) via ort and tokenizes with the HuggingFace tokenizers
//!   crate. This is the production embedding backend.
//! - `MockEmbedding` produces deterministic hashed bag-of-words vectors, so
//!   texts sharing words land close together without a real model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use folio_core::error::FolioError;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

/// Service for generating text embeddings.
///
/// Implementations convert text into fixed-dimensional vectors. The
/// `model_id` identifies the vector space: two indexes can only be merged
/// when their embedders report the same id and dimensionality.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, FolioError>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the model producing the vectors.
    fn model_id(&self) -> &str;
}

/// Boxed future returned by [`DynEmbeddingService::embed_boxed`].
pub type EmbedFuture<'a> =
    Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, FolioError>> + Send + 'a>>;

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future` and is therefore not
/// object-safe. A blanket implementation is provided so that every
/// `EmbeddingService` can be stored as `Arc<dyn DynEmbeddingService>`.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text (boxed future).
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a>;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the model producing the vectors.
    fn model_id(&self) -> &str;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> EmbedFuture<'a> {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }

    fn model_id(&self) -> &str {
        EmbeddingService::model_id(self)
    }
}

/// Shared handle to an embedding backend.
pub type SharedEmbedder = Arc<dyn DynEmbeddingService>;

/// Scale a vector to unit length in place. Zero vectors are left untouched.
fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in values.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbeddingService - real ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX Runtime-backed embedding service using a sentence-transformer model.
///
/// Expects a model directory containing:
/// - `model.onnx`: the sentence-transformer ONNX export
/// - `tokenizer.json`: the HuggingFace fast-tokenizer file
///
/// Mean pooling (masked by the attention mask) is applied over token
/// embeddings, followed by L2 normalization.
pub struct OnnxEmbeddingService {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
    model_id: String,
}

// ort::Session is Send + Sync internally (uses Arc<SharedSessionInner>).
unsafe impl Send for OnnxEmbeddingService {}
unsafe impl Sync for OnnxEmbeddingService {}

impl std::fmt::Debug for OnnxEmbeddingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingService")
            .field("model_id", &self.model_id)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbeddingService {
    /// Load a sentence-transformer model from the given directory.
    ///
    /// The directory must contain `model.onnx` and `tokenizer.json`.
    pub fn from_directory(model_dir: &Path, model_id: &str) -> Result<Self, FolioError> {
        Self::from_files(
            &model_dir.join("model.onnx"),
            &model_dir.join("tokenizer.json"),
            model_id,
        )
    }

    /// Load from explicit model and tokenizer file paths.
    pub fn from_files(
        model_path: &Path,
        tokenizer_path: &Path,
        model_id: &str,
    ) -> Result<Self, FolioError> {
        if !model_path.exists() {
            return Err(FolioError::Embedding(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(FolioError::Embedding(format!(
                "Tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| FolioError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| FolioError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| FolioError::Embedding(format!("ONNX load model: {}", e)))?;

        // Sentence-transformer output is [batch, seq_len, hidden_dim].
        let dimensions = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .map(|d| if d > 0 { d as usize } else { 384 })
            .unwrap_or(384);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| FolioError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            model = %model_path.display(),
            model_id,
            dimensions,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions,
            model_id: model_id.to_string(),
        })
    }

    /// Tokenize, run inference, and mean-pool the output.
    fn embed_sync(
        session: &Mutex<Session>,
        tokenizer: &Tokenizer,
        text: &str,
    ) -> Result<Vec<f32>, FolioError> {
        if text.trim().is_empty() {
            return Err(FolioError::Embedding("Cannot embed empty text".to_string()));
        }

        let encoding = tokenizer
            .encode(text, true)
            .map_err(|e| FolioError::Embedding(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();

        let seq_len = input_ids.len();
        let shape_err = |name: &str, e: ndarray::ShapeError| {
            FolioError::Embedding(format!("{} array: {}", name, e))
        };

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| shape_err("input_ids", e))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| shape_err("attention_mask", e))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| shape_err("token_type_ids", e))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| FolioError::Embedding(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| FolioError::Embedding(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| FolioError::Embedding(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = session
            .lock()
            .map_err(|e| FolioError::Embedding(format!("Session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| FolioError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| FolioError::Embedding(format!("Extract embeddings: {}", e)))?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        let hidden_dim = match shape_dims.as_slice() {
            [.., last] if shape_dims.len() >= 2 && *last > 0 => *last as usize,
            _ => {
                return Err(FolioError::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    shape_dims
                )))
            }
        };

        let mut pooled = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;

        for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
            if mask_val > 0 {
                let offset = tok_idx * hidden_dim;
                for (dim, slot) in pooled.iter_mut().enumerate() {
                    *slot += data[offset + dim];
                }
                count += 1.0;
            }
        }

        if count > 0.0 {
            for val in &mut pooled {
                *val /= count;
            }
        }

        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FolioError> {
        // ONNX Runtime inference is CPU-bound; run on a blocking thread.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || Self::embed_sync(&session, &tokenizer, &text_owned))
            .await
            .map_err(|e| FolioError::Embedding(format!("Embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hashed bag-of-words vectors
// ---------------------------------------------------------------------------

/// Default dimensionality of [`MockEmbedding`] vectors.
pub const MOCK_DIMENSIONS: usize = 384;

/// Mock embedding service that returns deterministic unit vectors.
///
/// Each lowercase word is hashed to a bucket and a sign; the resulting
/// counts are L2-normalized. Identical inputs always produce identical
/// outputs and texts sharing vocabulary have positive cosine similarity.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    model_id: String,
    dimensions: usize,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::named("mock-hash-384")
    }

    /// A mock embedder reporting a different model id, for exercising
    /// incompatible-merge paths.
    pub fn named(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            dimensions: MOCK_DIMENSIONS,
        }
    }

    fn hash_of<T: Hash>(value: T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    fn text_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result = vec![0.0f32; self.dimensions];
        let mut words = 0usize;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let h = Self::hash_of(&word);
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            result[bucket] += sign;
            words += 1;
        }

        if words == 0 {
            // Punctuation-only input: spread a hash of the raw text instead.
            for (i, slot) in result.iter_mut().enumerate() {
                let h = Self::hash_of((text, i));
                *slot = (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32;
            }
        }

        l2_normalize(&mut result);
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FolioError> {
        if text.trim().is_empty() {
            return Err(FolioError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.text_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmr::cosine_similarity;

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        let service = MockEmbedding::new();
        let vec = service.embed("hello world").await.unwrap();
        assert_eq!(vec.len(), MOCK_DIMENSIONS);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic() {
        let service = MockEmbedding::new();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_different_inputs() {
        let service = MockEmbedding::new();
        let v1 = service.embed("text one").await.unwrap();
        let v2 = service.embed("text two").await.unwrap();
        assert_ne!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_shared_words_are_closer() {
        let service = MockEmbedding::new();
        let query = service.embed("rust ownership rules").await.unwrap();
        let related = service.embed("the ownership rules of rust").await.unwrap();
        let unrelated = service.embed("banana bread recipe").await.unwrap();
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_mock_embedding_is_case_insensitive() {
        let service = MockEmbedding::new();
        let v1 = service.embed("Hello World").await.unwrap();
        let v2 = service.embed("hello world").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_mock_embedding_empty_text() {
        let service = MockEmbedding::new();
        assert!(service.embed("").await.is_err());
        assert!(service.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_embedding_punctuation_only() {
        let service = MockEmbedding::new();
        let vec = service.embed("?!...").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_mock_embedding_unit_length() {
        let service = MockEmbedding::new();
        let vec = service.embed("test range of values").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_mock_model_ids() {
        assert_eq!(EmbeddingService::model_id(&MockEmbedding::new()), "mock-hash-384");
        assert_eq!(EmbeddingService::model_id(&MockEmbedding::named("other")), "other");
    }

    #[tokio::test]
    async fn test_dyn_dispatch() {
        let shared: SharedEmbedder = Arc::new(MockEmbedding::new());
        let vec = shared.embed_boxed("dynamic dispatch").await.unwrap();
        assert_eq!(vec.len(), shared.dimensions());
        assert_eq!(shared.model_id(), "mock-hash-384");
    }

    #[test]
    fn test_onnx_missing_model() {
        let result = OnnxEmbeddingService::from_directory(Path::new("/nonexistent"), "minilm");
        assert!(result.is_err());
    }
}
