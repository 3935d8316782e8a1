//! Canonical-name consensus: per lineage, decide whether observed name
//! variation is transcription noise (correct it) or a genuine historical
//! rename (preserve it).

use ahash::AHashMap;
use serde::Serialize;

use crate::chain::Lineage;
use crate::names::similarity;

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Every real name in the lineage is the same string.
    Unanimous,
    /// Off-consensus names are close to the plurality name: noise.
    OcrVariants,
    /// At least one name is too different: an intentional rename.
    NameChange,
    /// Fewer than two real names.
    InsufficientData,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Unanimous => "unanimous",
            ReasonCode::OcrVariants => "ocr_variants",
            ReasonCode::NameChange => "name_change",
            ReasonCode::InsufficientData => "insufficient_data",
        }
    }
}

/// The decision for one lineage. Derived deterministically; exactly one
/// decision per lineage.
#[derive(Debug, Clone)]
pub struct NameDecision {
    pub chain_id: String,
    pub canonical_name: Option<String>,
    pub consensus_count: usize,
    pub should_apply: bool,
    pub reason: ReasonCode,
    pub diversity_score: f64,
}

/// Tunable floors for treating divergent names as noise. Intentionally
/// asymmetric and lossy; these are parameters, not derived constants.
#[derive(Debug, Clone)]
pub struct ConsensusThresholds {
    /// Average similarity (0-100) of off-consensus names to the candidate.
    pub min_avg_similarity: f64,
    /// Worst-case similarity of any single name to the candidate.
    pub min_similarity: f64,
}

impl Default for ConsensusThresholds {
    fn default() -> Self {
        Self { min_avg_similarity: 70.0, min_similarity: 60.0 }
    }
}

/// Decide the canonical name for one lineage.
///
/// The plurality name (most frequent exact string, case-sensitive, earliest
/// first appearance on ties) is the candidate; it is applied only when every
/// other name stays close enough to read as OCR noise.
pub fn decide(lineage: &Lineage, t: &ConsensusThresholds) -> NameDecision {
    // Sentinel-free list of real names, in lineage order.
    let names: Vec<&str> = lineage.entries.iter().filter_map(|e| e.name.as_deref()).collect();

    if names.len() < 2 {
        return NameDecision {
            chain_id: lineage.chain_id.clone(),
            canonical_name: None,
            consensus_count: 0,
            should_apply: false,
            reason: ReasonCode::InsufficientData,
            diversity_score: 0.0,
        };
    }

    let mut counts: AHashMap<&str, usize> = AHashMap::new();
    let mut first_seen: AHashMap<&str, usize> = AHashMap::new();
    for (i, name) in names.iter().enumerate() {
        *counts.entry(name).or_insert(0) += 1;
        first_seen.entry(name).or_insert(i);
    }
    let (&canonical, &consensus_count) = counts
        .iter()
        .min_by_key(|&(name, count)| (std::cmp::Reverse(*count), first_seen[*name]))
        .unwrap(); // names is non-empty

    // Distance of every off-consensus occurrence to the candidate.
    let similarities: Vec<f64> = names
        .iter()
        .filter(|&&name| name != canonical)
        .map(|name| similarity(name, canonical))
        .collect();

    if similarities.is_empty() {
        return NameDecision {
            chain_id: lineage.chain_id.clone(),
            canonical_name: Some(canonical.to_string()),
            consensus_count,
            should_apply: true,
            reason: ReasonCode::Unanimous,
            diversity_score: 100.0,
        };
    }

    let avg = similarities.iter().sum::<f64>() / similarities.len() as f64;
    let min = similarities.iter().copied().fold(f64::INFINITY, f64::min);

    let noise = avg >= t.min_avg_similarity && min >= t.min_similarity;
    NameDecision {
        chain_id: lineage.chain_id.clone(),
        canonical_name: Some(canonical.to_string()),
        consensus_count,
        should_apply: noise,
        reason: if noise { ReasonCode::OcrVariants } else { ReasonCode::NameChange },
        diversity_score: avg,
    }
}

/// Decide every lineage of a run, in lineage order.
pub fn decide_all(lineages: &[Lineage], t: &ConsensusThresholds) -> Vec<NameDecision> {
    lineages.iter().map(|lineage| decide(lineage, t)).collect()
}
