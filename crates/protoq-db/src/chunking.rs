//! Protocol-aware document segmentation.
//!
//! Two strategies, chosen per section:
//! - Eligibility criteria sections become one chunk per enumerated item so a
//!   search hit maps to exactly one criterion.
//! - Narrative sections are packed sentence by sentence toward a token
//!   budget, with a sentence-level overlap between consecutive chunks.
//!
//! Token counts here are estimates (whitespace words times 1.3), not real
//! tokenizer output. The budget is a packing target, not a hard cap.

use once_cell::sync::Lazy;
use regex::Regex;

use protoq_core::defaults;
use protoq_core::models::{
    ChunkKind, ChunkRecord, CriterionCategory, CriterionType, ParsedDocument, ParsedSection,
    SectionType,
};

/// Markers that open an enumerated criterion at the start of a line:
/// `1.` `1)` `(1)` `a.` `a)` `(a)` plus bullet and dash glyphs.
static CRITERION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:(\d+)[.)]\s*|\((\d+)\)\s*|([a-z])[.)]\s*|\(([a-z])\)\s*|[\u{2022}\u{2023}\u{25E6}\u{2043}\u{2219}]\s*|[-\u{2013}\u{2014}]\s*)",
    )
    .expect("criterion marker regex is valid")
});

/// Sentence boundaries: whitespace runs that follow terminal punctuation.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary regex is valid"));

/// Protocol document segmenter.
#[derive(Debug, Clone)]
pub struct ProtocolChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for ProtocolChunker {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE_TOKENS,
            chunk_overlap: defaults::CHUNK_OVERLAP_TOKENS,
        }
    }
}

impl ProtocolChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Segment a parsed document into ordered chunk records.
    ///
    /// Sections are processed in document order. A document with no detected
    /// sections falls back to segmenting the joined page text as one untyped
    /// narrative region.
    pub fn chunk_document(&self, doc: &ParsedDocument) -> Vec<ChunkRecord> {
        if doc.sections.is_empty() {
            let full_text = doc.pages.join("\n");
            return self.chunk_text(&full_text, None);
        }

        let mut chunks = Vec::new();
        for (index, section) in doc.sections.iter().enumerate() {
            chunks.extend(self.chunk_section(section, index));
        }
        chunks
    }

    fn chunk_section(&self, section: &ParsedSection, index: usize) -> Vec<ChunkRecord> {
        if section.raw_text.trim().is_empty() {
            return Vec::new();
        }

        match section.section_type {
            Some(section_type) if section_type.is_criteria() => {
                let criterion_type = if section_type == SectionType::InclusionCriteria {
                    CriterionType::Inclusion
                } else {
                    CriterionType::Exclusion
                };
                self.chunk_criteria(&section.raw_text, criterion_type, index)
            }
            _ => self.chunk_text(&section.raw_text, Some(index)),
        }
    }

    /// Extract one chunk per enumerated eligibility criterion.
    ///
    /// Each marker opens an item running to the next marker or end of text.
    /// Numeric markers keep their number, letters map a to 1, b to 2, and
    /// unnumbered bullets or dashes take their encounter position. Items of
    /// ten characters or fewer after trimming are dropped as enumeration
    /// noise.
    fn chunk_criteria(
        &self,
        text: &str,
        criterion_type: CriterionType,
        section_index: usize,
    ) -> Vec<ChunkRecord> {
        let markers: Vec<_> = CRITERION_MARKER.captures_iter(text).collect();

        if markers.is_empty() {
            return self.chunk_criteria_fallback(text, criterion_type, section_index);
        }

        let mut chunks = Vec::new();
        for (i, caps) in markers.iter().enumerate() {
            let marker = caps.get(0).expect("capture group 0 always present");
            let body_start = marker.end();
            let body_end = markers
                .get(i + 1)
                .map(|next| next.get(0).expect("capture group 0 always present").start())
                .unwrap_or(text.len());

            let criterion_text = text[body_start..body_end].trim();
            if criterion_text.chars().count() <= defaults::MIN_CRITERION_LEN {
                continue;
            }

            let criterion_number = explicit_number(caps).unwrap_or(i as i64 + 1);

            chunks.push(ChunkRecord {
                chunk_text: criterion_text.to_string(),
                chunk_kind: ChunkKind::Criterion,
                section_index: Some(section_index),
                page_number: None,
                criterion_type: Some(criterion_type),
                criterion_number: Some(criterion_number),
                category: categorize_criterion(criterion_text),
            });
        }
        chunks
    }

    /// Fallback for criteria sections with no recognizable markers: each
    /// nonblank line longer than twenty characters becomes a criterion,
    /// numbered sequentially.
    fn chunk_criteria_fallback(
        &self,
        text: &str,
        criterion_type: CriterionType,
        section_index: usize,
    ) -> Vec<ChunkRecord> {
        let mut chunks = Vec::new();
        let mut criterion_number = 0i64;

        for line in text.lines() {
            let line = line.trim();
            if line.chars().count() <= defaults::MIN_CRITERION_LINE_LEN {
                continue;
            }
            criterion_number += 1;
            chunks.push(ChunkRecord {
                chunk_text: line.to_string(),
                chunk_kind: ChunkKind::Criterion,
                section_index: Some(section_index),
                page_number: None,
                criterion_type: Some(criterion_type),
                criterion_number: Some(criterion_number),
                category: categorize_criterion(line),
            });
        }
        chunks
    }

    /// Pack sentences into chunks near the token budget, carrying a tail of
    /// sentences forward as overlap so context survives the boundary.
    fn chunk_text(&self, text: &str, section_index: Option<usize>) -> Vec<ChunkRecord> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0.0f64;

        for sentence in split_sentences(text) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }

            let sentence_tokens = estimate_tokens(sentence);

            if current_tokens + sentence_tokens > self.chunk_size as f64 && !current.is_empty() {
                chunks.push(ChunkRecord::text(current.join(" "), section_index));

                // Carry trailing sentences that fit the overlap budget.
                let mut overlap: Vec<&str> = Vec::new();
                let mut overlap_tokens = 0.0f64;
                for s in current.iter().rev() {
                    let s_tokens = estimate_tokens(s);
                    if overlap_tokens + s_tokens <= self.chunk_overlap as f64 {
                        overlap.insert(0, s);
                        overlap_tokens += s_tokens;
                    } else {
                        break;
                    }
                }
                current = overlap;
                current_tokens = overlap_tokens;
            }

            current.push(sentence);
            current_tokens += sentence_tokens;
        }

        if !current.is_empty() {
            chunks.push(ChunkRecord::text(current.join(" "), section_index));
        }
        chunks
    }
}

/// Criterion number carried by the marker itself, if any.
fn explicit_number(caps: &regex::Captures<'_>) -> Option<i64> {
    if let Some(digits) = caps.get(1).or_else(|| caps.get(2)) {
        return digits.as_str().parse().ok();
    }
    if let Some(letter) = caps.get(3).or_else(|| caps.get(4)) {
        let c = letter.as_str().chars().next()?;
        return Some((c as i64) - ('a' as i64) + 1);
    }
    None
}

/// Split at whitespace runs following terminal punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // Keep the punctuation with the preceding sentence.
        let split_at = boundary.start() + 1;
        sentences.push(&text[start..split_at]);
        start = boundary.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Whitespace word count times 1.3.
fn estimate_tokens(text: &str) -> f64 {
    text.split_whitespace().count() as f64 * 1.3
}

const DEMOGRAPHIC_TERMS: &[&str] = &[
    "age", "year", "old", "adult", "pediatric", "elderly", "male", "female", "gender", "sex",
    "pregnant", "nursing",
];
const CLINICAL_TERMS: &[&str] = &[
    "diagnosis",
    "confirmed",
    "histolog",
    "patholog",
    "disease",
    "condition",
];
const LABORATORY_TERMS: &[&str] = &[
    "lab",
    "laboratory",
    "hemoglobin",
    "creatinine",
    "bilirubin",
    "ast",
    "alt",
    "wbc",
    "platelet",
];
const PRIOR_TREATMENT_TERMS: &[&str] = &[
    "prior",
    "previous",
    "therapy",
    "treatment",
    "medication",
    "drug",
];
const CONSENT_TERMS: &[&str] = &["consent", "willing", "able to"];
const REPRODUCTIVE_TERMS: &[&str] = &["contraception", "birth control", "fertile"];

/// Assign a keyword-based category to a criterion.
///
/// Categories are tried in a fixed precedence order. Matching is
/// case-insensitive substring containment, so "stage" matches the
/// demographic term "age". The category is a browsing aid, not a clinical
/// judgment.
pub fn categorize_criterion(text: &str) -> Option<CriterionCategory> {
    let lower = text.to_lowercase();
    let contains_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if contains_any(DEMOGRAPHIC_TERMS) {
        Some(CriterionCategory::Demographic)
    } else if contains_any(CLINICAL_TERMS) {
        Some(CriterionCategory::Clinical)
    } else if contains_any(LABORATORY_TERMS) {
        Some(CriterionCategory::Laboratory)
    } else if contains_any(PRIOR_TREATMENT_TERMS) {
        Some(CriterionCategory::PriorTreatment)
    } else if contains_any(CONSENT_TERMS) {
        Some(CriterionCategory::Consent)
    } else if contains_any(REPRODUCTIVE_TERMS) {
        Some(CriterionCategory::Reproductive)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria_section(section_type: SectionType, text: &str) -> ParsedSection {
        ParsedSection {
            section_type: Some(section_type),
            raw_text: text.to_string(),
            ..Default::default()
        }
    }

    fn doc_with_sections(sections: Vec<ParsedSection>) -> ParsedDocument {
        ParsedDocument {
            filename: "proto.pdf".to_string(),
            filepath: "/data/proto.pdf".to_string(),
            file_type: "pdf".to_string(),
            sections,
            ..Default::default()
        }
    }

    #[test]
    fn test_numbered_criteria_one_chunk_each() {
        let doc = doc_with_sections(vec![criteria_section(
            SectionType::InclusionCriteria,
            "1. Age 18 years or older at screening\n2. Histologically confirmed diagnosis of NSCLC\n3. ECOG performance status of 0 or 1",
        )]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(chunk.chunk_kind, ChunkKind::Criterion);
            assert_eq!(chunk.criterion_type, Some(CriterionType::Inclusion));
        }
        assert_eq!(chunks[0].criterion_number, Some(1));
        assert_eq!(chunks[1].criterion_number, Some(2));
        assert_eq!(chunks[2].criterion_number, Some(3));
        assert_eq!(chunks[0].chunk_text, "Age 18 years or older at screening");
    }

    #[test]
    fn test_marker_variants_recognized() {
        let text = "1) Adequate hematologic function required\n(2) Adequate hepatic function required\na. Signed informed consent obtained\n(b) Willing to comply with study visits";
        let doc = doc_with_sections(vec![criteria_section(SectionType::InclusionCriteria, text)]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].criterion_number, Some(1));
        assert_eq!(chunks[1].criterion_number, Some(2));
        assert_eq!(chunks[2].criterion_number, Some(1)); // a -> 1
        assert_eq!(chunks[3].criterion_number, Some(2)); // b -> 2
    }

    #[test]
    fn test_bullet_criteria_numbered_by_position() {
        let text = "\u{2022} Pregnant or nursing women are not eligible\n\u{2022} Active infection requiring systemic therapy";
        let doc = doc_with_sections(vec![criteria_section(SectionType::ExclusionCriteria, text)]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].criterion_type, Some(CriterionType::Exclusion));
        assert_eq!(chunks[0].criterion_number, Some(1));
        assert_eq!(chunks[1].criterion_number, Some(2));
    }

    #[test]
    fn test_short_items_dropped_as_noise() {
        let text = "1. Age 18\n2. Histologically confirmed solid tumor required";
        let doc = doc_with_sections(vec![criteria_section(SectionType::InclusionCriteria, text)]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        // "Age 18" is 6 chars, below the noise threshold.
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chunk_text.starts_with("Histologically"));
    }

    #[test]
    fn test_multiline_criterion_runs_to_next_marker() {
        let text = "1. Patients must have measurable disease\nper RECIST version 1.1 criteria\n2. Life expectancy of at least 12 weeks";
        let doc = doc_with_sections(vec![criteria_section(SectionType::InclusionCriteria, text)]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].chunk_text.contains("RECIST"));
        assert!(!chunks[0].chunk_text.contains("Life expectancy"));
    }

    #[test]
    fn test_fallback_splits_long_lines() {
        let text = "Patients must be at least 18 years of age\nshort line\nSubjects must provide written informed consent";
        let doc = doc_with_sections(vec![criteria_section(SectionType::InclusionCriteria, text)]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].criterion_number, Some(1));
        assert_eq!(chunks[1].criterion_number, Some(2));
    }

    #[test]
    fn test_narrative_section_yields_text_chunks() {
        let doc = doc_with_sections(vec![ParsedSection {
            section_type: Some(SectionType::StudyDesign),
            raw_text: "This is a randomized trial. Patients receive drug A or placebo.".to_string(),
            ..Default::default()
        }]);
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_kind, ChunkKind::Text);
        assert_eq!(chunks[0].criterion_type, None);
        assert_eq!(chunks[0].section_index, Some(0));
    }

    #[test]
    fn test_narrative_packing_respects_budget_and_overlap() {
        // 40 sentences of 10 words (13 estimated tokens each) against a
        // 100-token budget forces multiple chunks.
        let sentence = "alpha beta gamma delta epsilon zeta eta theta iota kappa.";
        let text = (0..40).map(|_| sentence).collect::<Vec<_>>().join(" ");
        let chunker = ProtocolChunker::new(100, 26);
        let chunks = chunker.chunk_text(&text, Some(0));

        assert!(chunks.len() > 1);
        // Overlap budget of 26 tokens carries two 13-token sentences across
        // each boundary.
        for pair in chunks.windows(2) {
            let prev_tail: Vec<&str> = pair[0].chunk_text.split(". ").collect();
            assert!(pair[1]
                .chunk_text
                .starts_with(prev_tail[prev_tail.len().saturating_sub(2)]));
        }
    }

    #[test]
    fn test_empty_section_yields_no_chunks() {
        let doc = doc_with_sections(vec![criteria_section(SectionType::InclusionCriteria, "  \n ")]);
        assert!(ProtocolChunker::default().chunk_document(&doc).is_empty());
    }

    #[test]
    fn test_sectionless_document_falls_back_to_pages() {
        let doc = ParsedDocument {
            pages: vec![
                "The study evaluates safety.".to_string(),
                "Enrollment begins in March.".to_string(),
            ],
            ..Default::default()
        };
        let chunks = ProtocolChunker::default().chunk_document(&doc);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_kind, ChunkKind::Text);
        assert_eq!(chunks[0].section_index, None);
        assert!(chunks[0].chunk_text.contains("safety"));
        assert!(chunks[0].chunk_text.contains("Enrollment"));
    }

    #[test]
    fn test_categorize_precedence() {
        assert_eq!(
            categorize_criterion("Age 18 years or older"),
            Some(CriterionCategory::Demographic)
        );
        assert_eq!(
            categorize_criterion("Histologically confirmed diagnosis"),
            Some(CriterionCategory::Clinical)
        );
        assert_eq!(
            categorize_criterion("Hemoglobin >= 9 g/dL"),
            Some(CriterionCategory::Laboratory)
        );
        assert_eq!(
            categorize_criterion("No prior systemic chemotherapy"),
            Some(CriterionCategory::PriorTreatment)
        );
        assert_eq!(
            categorize_criterion("Signed informed consent"),
            Some(CriterionCategory::Consent)
        );
        assert_eq!(
            categorize_criterion("Adequate contraception during the study"),
            Some(CriterionCategory::Reproductive)
        );
        assert_eq!(categorize_criterion("Left-handed participants"), None);
    }

    #[test]
    fn test_categorize_substring_containment() {
        // "stage" contains "age" and lands in demographic before the
        // clinical rules are tried.
        assert_eq!(
            categorize_criterion("Stage IV disease"),
            Some(CriterionCategory::Demographic)
        );
    }

    #[test]
    fn test_sentence_split_keeps_punctuation() {
        let sentences = split_sentences("First sentence. Second one! Third?");
        assert_eq!(sentences, vec!["First sentence.", "Second one!", "Third?"]);
    }
}
