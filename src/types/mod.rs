use std::sync::Arc;

use anyhow::{bail, Result};

/// How a source-year unit relates to a target-year unit, by spatial overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    SameAs,     // Near-identical footprint
    Within,     // Source absorbed into / contained by target
    Contains,   // Source contains target
    Overlaps,   // Partial overlap (boundary change, split, merge)
    Ambiguous,  // Weak or degenerate overlap
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::SameAs => "SAME_AS",
            Relationship::Within => "WITHIN",
            Relationship::Contains => "CONTAINS",
            Relationship::Overlaps => "OVERLAPS",
            Relationship::Ambiguous => "AMBIGUOUS",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "SAME_AS" => Relationship::SameAs,
            "WITHIN" => Relationship::Within,
            "CONTAINS" => Relationship::Contains,
            "OVERLAPS" => Relationship::Overlaps,
            "AMBIGUOUS" => Relationship::Ambiguous,
            other => bail!("unknown relationship: {other:?}"),
        })
    }

    /// Ranking used by the link resolver: SAME_AS beats containment beats
    /// partial overlap; AMBIGUOUS is a last resort.
    pub fn priority(&self) -> u8 {
        match self {
            Relationship::SameAs => 3,
            Relationship::Within | Relationship::Contains => 2,
            Relationship::Overlaps => 1,
            Relationship::Ambiguous => 0,
        }
    }
}

/// Confidence bucket assigned to a resolved link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    High,
    Ambiguous,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Ambiguous => "ambiguous",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "high" => Confidence::High,
            "ambiguous" => Confidence::Ambiguous,
            other => bail!("unknown confidence: {other:?}"),
        })
    }
}

/// A resolved correspondence between one unit in the source year and one in
/// the target year. Immutable once created; many links share a year-pair.
#[derive(Debug, Clone)]
pub struct OverlapLink {
    pub year_from: u16,
    pub year_to: u16,
    pub id_from: Arc<str>,
    pub id_to: Arc<str>,
    pub name_from: Option<Arc<str>>,
    pub name_to: Option<Arc<str>>,
    pub division_from: Option<Arc<str>>,
    pub division_to: Option<Arc<str>>,
    pub province_from: Option<Arc<str>>,
    pub province_to: Option<Arc<str>>,
    pub relationship: Relationship,
    pub iou: f64,
    pub frac_from: f64,
    pub frac_to: f64,
    pub name_similarity: f64,
    pub confidence: Confidence,
}

/// A strong runner-up candidate, kept aside for manual review rather than
/// discarded or promoted.
#[derive(Debug, Clone)]
pub struct ReviewFlag {
    pub year_from: u16,
    pub year_to: u16,
    pub id_from: Arc<str>,
    pub name_from: Option<Arc<str>>,
    pub id_to: Arc<str>,
    pub name_to: Option<Arc<str>>,
    pub relationship: Relationship,
    pub iou: f64,
    pub name_similarity: f64,
}

/// A source unit that intersects nothing in the target year. Expected for
/// units that ceased to exist; recorded for auditing, never an error.
#[derive(Debug, Clone)]
pub struct UnmatchedUnit {
    pub year_from: u16,
    pub year_to: u16,
    pub id_from: Arc<str>,
    pub name_from: Option<Arc<str>>,
    pub province_from: Option<Arc<str>>,
}

/// A candidate pair abandoned because the overlap computation degenerated.
#[derive(Debug, Clone)]
pub struct SkippedPair {
    pub id_from: Arc<str>,
    pub id_to: Arc<str>,
    pub reason: &'static str,
}
