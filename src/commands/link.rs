use std::fs;
use std::path::Path;

use anyhow::{ensure, Result};

use crate::cli::{Cli, LinkArgs};
use crate::io::{write_links_csv, write_pair_summary, write_review_csv, write_unmatched_csv};
use crate::link::{link_year_pair, LinkThresholds, YearPairLinks};

/// Build effective thresholds: config file first, then CLI overrides.
fn thresholds(args: &LinkArgs) -> Result<LinkThresholds> {
    let mut t = match &args.config {
        Some(path) => LinkThresholds::from_json(path)?,
        None => LinkThresholds::default(),
    };
    if let Some(v) = args.iou_same {
        t.iou_same = v;
    }
    if let Some(v) = args.frac_same {
        t.frac_same = v;
    }
    if let Some(v) = args.iou_overlap {
        t.iou_overlap = v;
    }
    if let Some(v) = args.name_sim_thresh {
        t.name_high = v;
    }
    Ok(t)
}

/// Write the four per-pair tables and the text summary into `out`.
pub(crate) fn write_pair_outputs(
    links: &YearPairLinks,
    units_from: usize,
    units_to: usize,
    out: &Path,
) -> Result<()> {
    fs::create_dir_all(out)?;
    let pair = format!("{}_{}", links.year_from, links.year_to);
    write_links_csv(&links.high, &out.join(format!("year_links_{pair}.csv")))?;
    write_links_csv(&links.ambiguous, &out.join(format!("ambiguous_{pair}.csv")))?;
    write_review_csv(&links.review, &out.join(format!("review_{pair}.csv")))?;
    write_unmatched_csv(&links.unmatched, &out.join(format!("unmatched_{pair}.csv")))?;
    write_pair_summary(links, units_from, units_to, &out.join(format!("summary_{pair}.txt")))
}

pub fn run(_cli: &Cli, args: &LinkArgs) -> Result<()> {
    ensure!(args.year_from < args.year_to, "year-from must precede year-to");

    let provinces = super::parse_provinces(args.provinces.as_deref());
    let t = thresholds(args)?;

    let from = super::load_snapshot(
        args.year_from,
        &args.from,
        args.level,
        provinces.as_ref(),
        args.source_epsg,
    )?;
    let to = super::load_snapshot(
        args.year_to,
        &args.to,
        args.level,
        provinces.as_ref(),
        args.source_epsg,
    )?;

    let links = link_year_pair(&from, &to, &t);
    write_pair_outputs(&links, from.len(), to.len(), &args.out)?;

    println!(
        "Wrote {} high-confidence and {} ambiguous links to {}",
        links.high.len(),
        links.ambiguous.len(),
        args.out.display()
    );
    Ok(())
}
