//! Data model for protoq entities.
//!
//! Each entity is an explicit record type with named, typed fields.
//! Conversions to and from database rows happen at the storage boundary only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// =============================================================================
// VOCABULARIES
// =============================================================================

/// Structural section types recognized in protocol documents.
///
/// Closed vocabulary: upstream parsers must map anything else to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    InclusionCriteria,
    ExclusionCriteria,
    Population,
    Objectives,
    Background,
    StudyDesign,
    Treatment,
    Assessments,
    Safety,
    Efficacy,
    Statistics,
    Ethics,
    Administration,
    Appendix,
    Other,
}

impl SectionType {
    /// Stable string tag used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InclusionCriteria => "inclusion_criteria",
            Self::ExclusionCriteria => "exclusion_criteria",
            Self::Population => "population",
            Self::Objectives => "objectives",
            Self::Background => "background",
            Self::StudyDesign => "study_design",
            Self::Treatment => "treatment",
            Self::Assessments => "assessments",
            Self::Safety => "safety",
            Self::Efficacy => "efficacy",
            Self::Statistics => "statistics",
            Self::Ethics => "ethics",
            Self::Administration => "administration",
            Self::Appendix => "appendix",
            Self::Other => "other",
        }
    }

    /// Whether this section holds enumerated eligibility criteria.
    pub fn is_criteria(&self) -> bool {
        matches!(self, Self::InclusionCriteria | Self::ExclusionCriteria)
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SectionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inclusion_criteria" => Ok(Self::InclusionCriteria),
            "exclusion_criteria" => Ok(Self::ExclusionCriteria),
            "population" => Ok(Self::Population),
            "objectives" => Ok(Self::Objectives),
            "background" => Ok(Self::Background),
            "study_design" => Ok(Self::StudyDesign),
            "treatment" => Ok(Self::Treatment),
            "assessments" => Ok(Self::Assessments),
            "safety" => Ok(Self::Safety),
            "efficacy" => Ok(Self::Efficacy),
            "statistics" => Ok(Self::Statistics),
            "ethics" => Ok(Self::Ethics),
            "administration" => Ok(Self::Administration),
            "appendix" => Ok(Self::Appendix),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown section type: {s}")),
        }
    }
}

/// Kind of a retrievable chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Narrative text packed to the token budget.
    Text,
    /// One enumerated eligibility criterion.
    Criterion,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Criterion => "criterion",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "criterion" => Ok(Self::Criterion),
            _ => Err(format!("unknown chunk kind: {s}")),
        }
    }
}

/// Whether a criterion admits or excludes participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionType {
    Inclusion,
    Exclusion,
}

impl CriterionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inclusion => "inclusion",
            Self::Exclusion => "exclusion",
        }
    }
}

impl std::fmt::Display for CriterionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CriterionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inclusion" => Ok(Self::Inclusion),
            "exclusion" => Ok(Self::Exclusion),
            _ => Err(format!("unknown criterion type: {s}")),
        }
    }
}

/// Best-effort semantic category assigned to an extracted criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionCategory {
    Demographic,
    Clinical,
    Laboratory,
    PriorTreatment,
    Consent,
    Reproductive,
}

impl CriterionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demographic => "demographic",
            Self::Clinical => "clinical",
            Self::Laboratory => "laboratory",
            Self::PriorTreatment => "prior_treatment",
            Self::Consent => "consent",
            Self::Reproductive => "reproductive",
        }
    }
}

impl std::fmt::Display for CriterionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CriterionCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "demographic" => Ok(Self::Demographic),
            "clinical" => Ok(Self::Clinical),
            "laboratory" => Ok(Self::Laboratory),
            "prior_treatment" => Ok(Self::PriorTreatment),
            "consent" => Ok(Self::Consent),
            "reproductive" => Ok(Self::Reproductive),
            _ => Err(format!("unknown criterion category: {s}")),
        }
    }
}

// =============================================================================
// PARSED DOCUMENT INPUT
// =============================================================================

/// A section as produced by an upstream document parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSection {
    pub section_type: Option<SectionType>,
    pub section_number: Option<String>,
    pub title: Option<String>,
    pub level: i64,
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
    pub raw_text: String,
}

/// A parsed protocol document, ready for segmentation and ingest.
///
/// If `sections` is empty, `pages` is joined and segmented as one untyped
/// section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub filename: String,
    pub filepath: String,
    pub file_type: String,
    pub title: Option<String>,
    pub protocol_id: Option<String>,
    pub version: Option<String>,
    pub sponsor: Option<String>,
    pub indication: Option<String>,
    pub phase: Option<String>,
    pub metadata: Option<JsonValue>,
    pub sections: Vec<ParsedSection>,
    pub pages: Vec<String>,
}

impl ParsedDocument {
    /// Full document text: either the concatenated section texts or the
    /// concatenated pages.
    pub fn full_text(&self) -> String {
        if self.sections.is_empty() {
            self.pages.join("\n")
        } else {
            self.sections
                .iter()
                .map(|s| s.raw_text.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

// =============================================================================
// SEGMENTER OUTPUT
// =============================================================================

/// A chunk produced by the segmenter, not yet persisted.
///
/// `section_index` points into the input document's `sections` so storage
/// can re-link the chunk to its section row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk_text: String,
    pub chunk_kind: ChunkKind,
    pub section_index: Option<usize>,
    pub page_number: Option<i64>,
    pub criterion_type: Option<CriterionType>,
    pub criterion_number: Option<i64>,
    pub category: Option<CriterionCategory>,
}

impl ChunkRecord {
    /// A plain narrative chunk.
    pub fn text(chunk_text: String, section_index: Option<usize>) -> Self {
        Self {
            chunk_text,
            chunk_kind: ChunkKind::Text,
            section_index,
            page_number: None,
            criterion_type: None,
            criterion_number: None,
            category: None,
        }
    }
}

// =============================================================================
// STORED ENTITIES
// =============================================================================

/// An ingested protocol document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub file_hash: String,
    pub file_type: String,
    pub title: Option<String>,
    pub protocol_id: Option<String>,
    pub version: Option<String>,
    pub sponsor: Option<String>,
    pub indication: Option<String>,
    pub phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<JsonValue>,
}

/// A document plus precomputed ownership counts, as returned by listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub document: Document,
    pub chunk_count: i64,
    pub criteria_count: i64,
}

/// A structural region of a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub document_id: i64,
    pub section_type: SectionType,
    pub section_number: Option<String>,
    pub title: Option<String>,
    pub level: i64,
    pub start_page: Option<i64>,
    pub end_page: Option<i64>,
    pub raw_text: String,
}

/// A stored retrievable chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub section_id: Option<i64>,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub chunk_kind: ChunkKind,
    pub page_number: Option<i64>,
}

/// A derived, queryable eligibility criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityCriterion {
    pub id: i64,
    pub document_id: i64,
    pub criterion_type: CriterionType,
    pub criterion_number: i64,
    pub criterion_text: String,
    pub category: Option<CriterionCategory>,
    pub chunk_id: Option<i64>,
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Which retrieval path(s) a search request exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Term-based (BM25) retrieval only.
    Lexical,
    /// Embedding-similarity retrieval only.
    Semantic,
    /// Both, merged with reciprocal rank fusion.
    #[default]
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lexical" => Ok(Self::Lexical),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("unknown search mode: {s}")),
        }
    }
}

/// Which source(s) produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Lexical,
    Semantic,
    /// Present in both the lexical and the semantic candidate list.
    Hybrid,
}

impl std::fmt::Display for SearchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => f.write_str("lexical"),
            Self::Semantic => f.write_str("semantic"),
            Self::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// Optional restrictions applied to a search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Restrict to documents with these declared protocol identifiers.
    pub protocol_ids: Option<Vec<String>>,
    /// Restrict to chunks whose owning section has one of these types.
    pub section_types: Option<Vec<SectionType>>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.protocol_ids.is_none() && self.section_types.is_none()
    }
}

/// A single ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: i64,
    pub document_id: i64,
    pub protocol_id: Option<String>,
    pub chunk_text: String,
    pub section_type: Option<SectionType>,
    pub score: f64,
    pub source: SearchSource,
}

// =============================================================================
// CRITERIA COMPARISON TYPES
// =============================================================================

/// One side of a matched criteria pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedCriterion {
    pub protocol_id: String,
    pub criterion: EligibilityCriterion,
}

/// Two criteria from different documents judged semantically equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionPair {
    pub left: MatchedCriterion,
    pub right: MatchedCriterion,
    pub similarity: f32,
}

/// Result of comparing eligibility criteria across protocols.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaComparison {
    /// Protocol identifiers that were compared, in request order.
    pub protocols: Vec<String>,
    /// Criteria fetched per protocol.
    pub criteria_by_protocol: Vec<(String, Vec<EligibilityCriterion>)>,
    /// Cross-document pairs at or above the similarity threshold.
    pub similar_criteria: Vec<CriterionPair>,
    /// Per protocol: criteria that matched nothing in any other document.
    pub unique_criteria: Vec<(String, Vec<EligibilityCriterion>)>,
}

impl CriteriaComparison {
    /// Plain-text summary: pair count and unique counts per protocol.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!(
            "Found {} similar criteria across protocols.",
            self.similar_criteria.len()
        )];
        for (protocol_id, unique) in &self.unique_criteria {
            parts.push(format!(
                "{} has {} unique criteria.",
                protocol_id,
                unique.len()
            ));
        }
        parts.join(" ")
    }
}
