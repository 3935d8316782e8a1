use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::link::YearPairLinks;
use crate::types::Relationship;

fn count_by_class(links: &[crate::types::OverlapLink]) -> Vec<(Relationship, usize)> {
    [
        Relationship::SameAs,
        Relationship::Within,
        Relationship::Contains,
        Relationship::Overlaps,
        Relationship::Ambiguous,
    ]
    .into_iter()
    .map(|rel| (rel, links.iter().filter(|l| l.relationship == rel).count()))
    .filter(|(_, n)| *n > 0)
    .collect()
}

/// Human-readable stats for one year-pair, alongside the link tables.
pub fn write_pair_summary(links: &YearPairLinks, units_from: usize, units_to: usize, path: &Path) -> Result<()> {
    let mut out = String::new();
    out.push_str(&format!("Linkage summary: {} -> {}\n", links.year_from, links.year_to));
    out.push_str(&"=".repeat(60));
    out.push('\n');
    out.push_str(&format!("Input units ({}): {units_from}\n", links.year_from));
    out.push_str(&format!("Input units ({}): {units_to}\n\n", links.year_to));
    out.push_str(&format!("High-confidence links: {}\n", links.high.len()));
    out.push_str(&format!("Ambiguous links: {}\n", links.ambiguous.len()));
    out.push_str(&format!("Review flags: {}\n", links.review.len()));
    out.push_str(&format!("Unmatched units: {}\n", links.unmatched.len()));
    out.push_str(&format!("Skipped pairs: {}\n", links.skipped.len()));

    if !links.high.is_empty() {
        out.push_str("\nHigh-confidence breakdown:\n");
        for (rel, n) in count_by_class(&links.high) {
            out.push_str(&format!("  {}: {n}\n", rel.as_str()));
        }
    }
    if !links.ambiguous.is_empty() {
        out.push_str("\nAmbiguous breakdown:\n");
        for (rel, n) in count_by_class(&links.ambiguous) {
            out.push_str(&format!("  {}: {n}\n", rel.as_str()));
        }
    }

    fs::write(path, out).with_context(|| format!("failed to write summary: {}", path.display()))
}
