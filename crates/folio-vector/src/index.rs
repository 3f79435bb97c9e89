//! Semantic index over embedded document fragments.
//!
//! A `SemanticIndex` is an ordered list of (fragment, vector) pairs plus the
//! embedder that produced the vectors. Search is brute-force cosine
//! similarity, optionally followed by maximal marginal relevance selection.
//! Indexes are immutable: merging builds a new index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use folio_core::error::FolioError;

use crate::embedding::SharedEmbedder;
use crate::mmr::{maximal_marginal_relevance, rank_by_similarity};

/// Extra candidates fetched beyond `k` for diversity search by default.
pub const DEFAULT_FETCH_MARGIN: usize = 2;

/// Default relevance/diversity balance for diversity search.
pub const DEFAULT_LAMBDA_MULT: f64 = 0.5;

/// Current on-disk artifact format.
const ARTIFACT_VERSION: u32 = 1;

/// A single hit returned from a semantic search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Fragment text.
    pub fragment: String,
    /// Cosine similarity to the query.
    pub score: f64,
    /// Insertion position of the fragment within the index.
    pub position: usize,
}

/// Parameters for [`SemanticIndex::search_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of fragments returned.
    pub k: usize,
    /// Candidate pool size for diversity search. Clamped to at least `k`.
    pub fetch_k: usize,
    /// Relevance weight for diversity search.
    pub lambda_mult: f64,
    /// Use maximal marginal relevance instead of plain nearest neighbours.
    pub diversity: bool,
}

impl SearchOptions {
    /// Plain k-nearest-neighbour search.
    pub fn similarity(k: usize) -> Self {
        Self {
            k,
            fetch_k: k,
            lambda_mult: 1.0,
            diversity: false,
        }
    }

    /// Diversity (MMR) search over a pool of `fetch_k` candidates.
    pub fn mmr(k: usize, fetch_k: usize) -> Self {
        Self {
            k,
            fetch_k,
            lambda_mult: DEFAULT_LAMBDA_MULT,
            diversity: true,
        }
    }

    pub fn with_lambda(mut self, lambda_mult: f64) -> Self {
        self.lambda_mult = lambda_mult.clamp(0.0, 1.0);
        self
    }
}

/// Serialized form of an index.
#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    version: u32,
    model_id: String,
    dimensions: usize,
    fragments: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

/// Searchable set of embedded document fragments.
///
/// Cloning is cheap: fragment storage is shared behind an `Arc`.
#[derive(Clone)]
pub struct SemanticIndex {
    fragments: Arc<Vec<String>>,
    vectors: Arc<Vec<Vec<f32>>>,
    dimensions: usize,
    embedder: SharedEmbedder,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("model_id", &self.embedder.model_id())
            .field("fragments", &self.fragments.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl SemanticIndex {
    /// Embed every fragment and build an index over the vectors.
    ///
    /// Whitespace-only fragments are dropped. Fails with
    /// [`FolioError::EmptyInput`] when nothing remains.
    pub async fn build(fragments: Vec<String>, embedder: SharedEmbedder) -> Result<Self, FolioError> {
        let fragments: Vec<String> = fragments
            .into_iter()
            .filter(|f| !f.trim().is_empty())
            .collect();
        if fragments.is_empty() {
            return Err(FolioError::EmptyInput);
        }

        let mut vectors = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            vectors.push(embedder.embed_boxed(fragment).await?);
        }

        let index = Self::from_parts(fragments, vectors, embedder)?;
        debug!(
            fragments = index.len(),
            model_id = index.model_id(),
            "Semantic index built"
        );
        Ok(index)
    }

    /// Assemble an index from already-computed vectors.
    pub fn from_parts(
        fragments: Vec<String>,
        vectors: Vec<Vec<f32>>,
        embedder: SharedEmbedder,
    ) -> Result<Self, FolioError> {
        if fragments.is_empty() {
            return Err(FolioError::EmptyInput);
        }
        if fragments.len() != vectors.len() {
            return Err(FolioError::Embedding(format!(
                "{} fragments but {} vectors",
                fragments.len(),
                vectors.len()
            )));
        }
        let dimensions = vectors[0].len();
        if dimensions == 0 || vectors.iter().any(|v| v.len() != dimensions) {
            return Err(FolioError::Embedding(
                "vectors must share a non-zero dimensionality".to_string(),
            ));
        }

        Ok(Self {
            fragments: Arc::new(fragments),
            vectors: Arc::new(vectors),
            dimensions,
            embedder,
        })
    }

    /// Search for up to `k` fragments relevant to `query`.
    ///
    /// With `diversity`, candidates are drawn from the top `k + 2` by
    /// similarity and chosen by maximal marginal relevance.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        diversity: bool,
    ) -> Result<Vec<SearchHit>, FolioError> {
        let options = if diversity {
            SearchOptions::mmr(k, k + DEFAULT_FETCH_MARGIN)
        } else {
            SearchOptions::similarity(k)
        };
        self.search_with(query, options).await
    }

    /// Search with explicit options.
    pub async fn search_with(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchHit>, FolioError> {
        if options.k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_boxed(query)
            .await
            .map_err(|e| FolioError::Search(format!("query embedding failed: {}", e)))?;
        if query_vec.len() != self.dimensions {
            return Err(FolioError::Search(format!(
                "query has {} dimensions, index has {}",
                query_vec.len(),
                self.dimensions
            )));
        }
        Ok(self.search_vector(&query_vec, options))
    }

    /// Search with a pre-computed query vector.
    pub fn search_vector(&self, query_vec: &[f32], options: SearchOptions) -> Vec<SearchHit> {
        let ranked = rank_by_similarity(query_vec, &self.vectors);

        let picked: Vec<(usize, f64)> = if options.diversity {
            let pool = options.fetch_k.max(options.k).min(ranked.len());
            maximal_marginal_relevance(&self.vectors, &ranked[..pool], options.k, options.lambda_mult)
        } else {
            ranked.into_iter().take(options.k).collect()
        };

        picked
            .into_iter()
            .map(|(position, score)| SearchHit {
                fragment: self.fragments[position].clone(),
                score,
                position,
            })
            .collect()
    }

    /// Combine two indexes into a new one.
    ///
    /// `self`'s fragments come first, followed by `other`'s; nothing is
    /// deduplicated. Fails with [`FolioError::IncompatibleEmbedding`] when the
    /// indexes were built by different embedders.
    pub fn merge(&self, other: &SemanticIndex) -> Result<SemanticIndex, FolioError> {
        if !self.is_compatible_with(other) {
            return Err(FolioError::IncompatibleEmbedding {
                left: format!("{}/{}", self.model_id(), self.dimensions),
                right: format!("{}/{}", other.model_id(), other.dimensions),
            });
        }

        let mut fragments = Vec::with_capacity(self.len() + other.len());
        fragments.extend(self.fragments.iter().cloned());
        fragments.extend(other.fragments.iter().cloned());

        let mut vectors = Vec::with_capacity(self.len() + other.len());
        vectors.extend(self.vectors.iter().cloned());
        vectors.extend(other.vectors.iter().cloned());

        Self::from_parts(fragments, vectors, Arc::clone(&self.embedder))
    }

    /// Whether two indexes share a vector space.
    pub fn is_compatible_with(&self, other: &SemanticIndex) -> bool {
        self.model_id() == other.model_id() && self.dimensions == other.dimensions
    }

    /// Encode the index as an opaque artifact.
    ///
    /// Vectors are stored verbatim so that a reloaded index answers every
    /// query exactly as the original did.
    pub fn serialize(&self) -> Result<Vec<u8>, FolioError> {
        let artifact = IndexArtifact {
            version: ARTIFACT_VERSION,
            model_id: self.model_id().to_string(),
            dimensions: self.dimensions,
            fragments: self.fragments.as_ref().clone(),
            vectors: self.vectors.as_ref().clone(),
        };
        Ok(serde_json::to_vec(&artifact)?)
    }

    /// Decode an artifact produced by [`SemanticIndex::serialize`].
    ///
    /// The supplied embedder must match the one the artifact was built with.
    pub fn deserialize(bytes: &[u8], embedder: SharedEmbedder) -> Result<Self, FolioError> {
        let artifact: IndexArtifact = serde_json::from_slice(bytes)?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(FolioError::Serialization(format!(
                "unsupported index artifact version {}",
                artifact.version
            )));
        }
        if artifact.model_id != embedder.model_id() {
            return Err(FolioError::IncompatibleEmbedding {
                left: artifact.model_id,
                right: embedder.model_id().to_string(),
            });
        }

        let index = Self::from_parts(artifact.fragments, artifact.vectors, embedder)?;
        if index.dimensions != artifact.dimensions {
            return Err(FolioError::Serialization(format!(
                "artifact declares {} dimensions but holds {}",
                artifact.dimensions, index.dimensions
            )));
        }
        Ok(index)
    }

    /// Fragments in insertion order.
    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embedder(&self) -> &SharedEmbedder {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}
