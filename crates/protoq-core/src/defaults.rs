//! Centralized default constants for the protoq system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates should reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// CHUNKING
// =============================================================================

/// Target chunk size in approximate tokens for narrative text splitting.
///
/// Token counts are approximated as word count × 1.3, which tracks common
/// subword tokenizers closely enough for budget purposes.
pub const CHUNK_SIZE_TOKENS: usize = 512;

/// Approximate-token budget for the sentence overlap carried into the next
/// chunk, preserving local context at chunk boundaries.
pub const CHUNK_OVERLAP_TOKENS: usize = 50;

/// Minimum trimmed length for an extracted criterion; shorter matches are
/// treated as enumeration noise and discarded.
pub const MIN_CRITERION_LEN: usize = 10;

/// Minimum line length for the line-based criteria fallback (used when a
/// criteria section contains no recognizable item markers).
pub const MIN_CRITERION_LINE_LEN: usize = 20;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (sentence-transformers).
pub const EMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// Default embedding vector dimension for all-MiniLM-L6-v2.
pub const EMBED_DIMENSION: usize = 384;

// =============================================================================
// SEARCH
// =============================================================================

/// Default maximum number of results returned by a search.
pub const RESULT_LIMIT: i64 = 10;

/// RRF ranking constant (Cormack et al. 2009). Larger K flattens the
/// contribution of rank position; 60 is the value used by the reference
/// ranking literature.
pub const RRF_K: f64 = 60.0;

/// Per-source candidate multiplier for hybrid fusion: each source is asked
/// for `multiplier × limit` candidates so fusion has enough overlap to work
/// with.
pub const FUSION_FETCH_MULTIPLIER: i64 = 3;

// =============================================================================
// CRITERIA MATCHING
// =============================================================================

/// Minimum cosine similarity for two criteria from different documents to be
/// reported as a matched pair.
pub const SIMILARITY_THRESHOLD: f32 = 0.85;
