//! Overlap classification and link resolution between two year snapshots.

mod resolve;

pub use resolve::{link_year_pair, YearPairLinks};

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::OverlapMetrics;
use crate::types::Relationship;

/// Tunable thresholds for classification, confidence bucketing and review
/// flagging. These are parameters, not derived constants; the defaults
/// mirror the values used on the 1851-1921 source data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkThresholds {
    /// IoU floor for SAME_AS.
    pub iou_same: f64,
    /// Per-side coverage floor for SAME_AS.
    pub frac_same: f64,
    /// One-sided coverage floor for WITHIN/CONTAINS.
    pub frac_contain: f64,
    /// IoU floor for OVERLAPS.
    pub iou_overlap: f64,
    /// Alternative one-sided coverage floor for OVERLAPS.
    pub frac_overlap: f64,
    /// Name similarity (0-100) for high-confidence SAME_AS.
    pub name_high: f64,
    /// Name similarity floor below which a SAME_AS name mismatch no longer
    /// reads as plausible OCR noise.
    pub name_low: f64,
    /// Runner-up IoU floor for a manual-review flag.
    pub review_iou: f64,
    /// Runner-up name similarity floor for a manual-review flag.
    pub review_name: f64,
    /// Minimum shared boundary length (meters) for the adjacency graph.
    pub min_border_m: f64,
}

impl Default for LinkThresholds {
    fn default() -> Self {
        Self {
            iou_same: 0.98,
            frac_same: 0.98,
            frac_contain: 0.95,
            iou_overlap: 0.30,
            frac_overlap: 0.50,
            name_high: 80.0,
            name_low: 60.0,
            review_iou: 0.5,
            review_name: 80.0,
            min_border_m: 1.0,
        }
    }
}

impl LinkThresholds {
    /// Load thresholds from a JSON file; absent keys keep their defaults.
    pub fn from_json(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open threshold config: {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("invalid threshold config: {}", path.display()))
    }
}

/// Classify a candidate pair from its overlap metrics. Rules are evaluated
/// in precedence order; the first match wins.
pub fn classify(m: &OverlapMetrics, t: &LinkThresholds) -> Relationship {
    let min_frac = m.frac_from.min(m.frac_to);
    let max_frac = m.frac_from.max(m.frac_to);

    if m.iou >= t.iou_same && min_frac >= t.frac_same {
        Relationship::SameAs
    } else if m.frac_from >= t.frac_contain && m.frac_to < t.frac_contain {
        Relationship::Within
    } else if m.frac_to >= t.frac_contain && m.frac_from < t.frac_contain {
        Relationship::Contains
    } else if m.iou >= t.iou_overlap || max_frac >= t.frac_overlap {
        Relationship::Overlaps
    } else {
        Relationship::Ambiguous
    }
}
