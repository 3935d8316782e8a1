use anyhow::Result;
use log::{info, warn};

use crate::cli::{Cli, OcrArgs};
use crate::io::{read_links_csv, write_ocr_candidates_csv};
use crate::types::{OverlapLink, Relationship};

/// A link is an OCR-error candidate when the spatial signal says "same
/// unit" emphatically but the names disagree.
fn is_candidate(link: &OverlapLink) -> bool {
    link.relationship == Relationship::SameAs && link.iou > 0.98 && link.name_similarity < 80.0
}

pub fn run(_cli: &Cli, args: &OcrArgs) -> Result<()> {
    let years = super::parse_years(args.years.as_deref())?;

    let mut candidates: Vec<OverlapLink> = Vec::new();
    for pair in years.windows(2) {
        let file = args.links_dir.join(format!("ambiguous_{}_{}.csv", pair[0], pair[1]));
        if !file.exists() {
            warn!("no ambiguous table at {}, skipping", file.display());
            continue;
        }
        let found: Vec<OverlapLink> =
            read_links_csv(&file)?.into_iter().filter(is_candidate).collect();
        info!("{} -> {}: {} potential OCR errors", pair[0], pair[1], found.len());
        candidates.extend(found);
    }

    // Worst name agreement first, within each year-pair.
    candidates.sort_by(|a, b| {
        (a.year_from, a.name_similarity, &a.id_from)
            .partial_cmp(&(b.year_from, b.name_similarity, &b.id_from))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    write_ocr_candidates_csv(&candidates, &args.out)?;
    println!("Wrote {} OCR-error candidates to {}", candidates.len(), args.out.display());
    Ok(())
}
