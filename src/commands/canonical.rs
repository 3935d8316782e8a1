use std::fs;
use std::path::Path;

use anyhow::Result;
use log::{info, warn};

use crate::chain::{build_chains, ChainOptions, ChainSet};
use crate::cli::{CanonicalArgs, Cli};
use crate::consensus::{decide_all, ConsensusThresholds, NameDecision};
use crate::io::{
    read_links_csv, write_branches_csv, write_decisions_csv, write_lineages_csv,
    write_mapping_csv,
};
use crate::types::OverlapLink;

/// Load every per-pair link table found under `links_dir` for the given
/// consecutive year-pairs. The ambiguous tables are included unless the
/// caller wants high-confidence edges only (the chain builder re-filters
/// by relationship and IoU either way). Missing files are skipped: a
/// partial run is a valid input.
pub(crate) fn load_links(links_dir: &Path, years: &[u16], high_only: bool) -> Result<Vec<OverlapLink>> {
    let mut links = Vec::new();
    for pair in years.windows(2) {
        let tag = format!("{}_{}", pair[0], pair[1]);
        let mut files = vec![links_dir.join(format!("year_links_{tag}.csv"))];
        if !high_only {
            files.push(links_dir.join(format!("ambiguous_{tag}.csv")));
        }
        for file in files {
            if !file.exists() {
                warn!("no link table at {}, skipping", file.display());
                continue;
            }
            let mut loaded = read_links_csv(&file)?;
            info!("loaded {} links from {}", loaded.len(), file.display());
            links.append(&mut loaded);
        }
    }
    Ok(links)
}

/// Write the chain and decision tables into `out`.
pub(crate) fn write_canonical_outputs(
    chains: &ChainSet,
    decisions: &[NameDecision],
    out: &Path,
) -> Result<()> {
    fs::create_dir_all(out)?;
    write_lineages_csv(&chains.lineages, &out.join("lineages.csv"))?;
    write_branches_csv(&chains.branches, &out.join("branches.csv"))?;
    write_decisions_csv(decisions, &out.join("decisions.csv"))?;
    write_mapping_csv(&chains.lineages, decisions, &out.join("canonical_mapping.csv"))
}

pub fn run(_cli: &Cli, args: &CanonicalArgs) -> Result<()> {
    let years = super::parse_years(args.years.as_deref())?;
    let links = load_links(&args.links_dir, &years, args.high_only)?;

    let chain_opts = ChainOptions {
        min_iou: args.min_iou,
        include_ambiguous_same_as: !args.high_only,
        include_containment: args.include_containment,
        ..Default::default()
    };
    let chains = build_chains(&links, &chain_opts);

    let consensus = ConsensusThresholds {
        min_avg_similarity: args.min_similarity,
        ..Default::default()
    };
    let decisions = decide_all(&chains.lineages, &consensus);

    write_canonical_outputs(&chains, &decisions, &args.out)?;

    let applied = decisions.iter().filter(|d| d.should_apply).count();
    println!(
        "{} lineages: {} canonical names applied, {} preserved as renames or insufficient",
        chains.lineages.len(),
        applied,
        decisions.len() - applied
    );
    Ok(())
}
