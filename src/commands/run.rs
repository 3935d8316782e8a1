use std::fs;
use std::fs::File;

use anyhow::{Context, Result};
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::chain::{build_chains, ChainOptions};
use crate::cli::{Cli, RunArgs};
use crate::consensus::{decide_all, ConsensusThresholds};
use crate::link::{link_year_pair, LinkThresholds, YearPairLinks};
use crate::snapshot::Snapshot;
use crate::types::OverlapLink;

use super::canonical::write_canonical_outputs;
use super::link::write_pair_outputs;

#[derive(Serialize)]
struct PairStats {
    year_from: u16,
    year_to: u16,
    high: usize,
    ambiguous: usize,
    review: usize,
    unmatched: usize,
    skipped: usize,
}

#[derive(Serialize)]
struct RunSummary {
    years: Vec<u16>,
    pairs: Vec<PairStats>,
    lineages: usize,
    branch_points: usize,
    canonical_applied: usize,
    canonical_preserved: usize,
}

pub fn run(_cli: &Cli, args: &RunArgs) -> Result<()> {
    let years = super::parse_years(args.years.as_deref())?;
    let provinces = super::parse_provinces(args.provinces.as_deref());
    let thresholds = match &args.config {
        Some(path) => LinkThresholds::from_json(path)?,
        None => LinkThresholds::default(),
    };

    // Load every snapshot once; each year-pair then only reads.
    let snapshots: Vec<Snapshot> = years
        .iter()
        .map(|&year| {
            let name = args.pattern.replace("{year}", &year.to_string());
            super::load_snapshot(
                year,
                &args.data_dir.join(name),
                args.level,
                provinces.as_ref(),
                args.source_epsg,
            )
        })
        .collect::<Result<_>>()?;

    // Year-pairs are independent units of work; results merge by simple
    // concatenation in year order.
    let pair_links: Vec<YearPairLinks> = snapshots
        .par_windows(2)
        .map(|pair| link_year_pair(&pair[0], &pair[1], &thresholds))
        .collect();

    fs::create_dir_all(&args.out)?;
    let mut pairs = Vec::new();
    for (window, links) in snapshots.windows(2).zip(&pair_links) {
        write_pair_outputs(links, window[0].len(), window[1].len(), &args.out)?;
        pairs.push(PairStats {
            year_from: links.year_from,
            year_to: links.year_to,
            high: links.high.len(),
            ambiguous: links.ambiguous.len(),
            review: links.review.len(),
            unmatched: links.unmatched.len(),
            skipped: links.skipped.len(),
        });
    }

    // Chains and consensus over the full link set.
    let all_links: Vec<OverlapLink> = pair_links
        .iter()
        .flat_map(|p| p.high.iter().chain(p.ambiguous.iter()).cloned())
        .collect();
    let chains = build_chains(&all_links, &ChainOptions::default());
    let decisions = decide_all(&chains.lineages, &ConsensusThresholds::default());
    write_canonical_outputs(&chains, &decisions, &args.out)?;

    let applied = decisions.iter().filter(|d| d.should_apply).count();
    let summary = RunSummary {
        years,
        pairs,
        lineages: chains.lineages.len(),
        branch_points: chains.branches.len(),
        canonical_applied: applied,
        canonical_preserved: decisions.len() - applied,
    };
    let summary_path = args.out.join("run_summary.json");
    let file = File::create(&summary_path)
        .with_context(|| format!("failed to create {}", summary_path.display()))?;
    serde_json::to_writer_pretty(file, &summary)?;

    info!("full run complete: {} lineages from {} year-pairs", summary.lineages, summary.pairs.len());
    println!(
        "Linked {} year-pairs, built {} lineages ({} canonical names applied) -> {}",
        summary.pairs.len(),
        summary.lineages,
        summary.canonical_applied,
        args.out.display()
    );
    Ok(())
}
