use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use polars::frame::DataFrame;
use polars::io::{SerReader, SerWriter};
use polars::prelude::{Column, CsvReader, CsvWriter, DataType};

use crate::chain::{BranchPoint, Lineage, START_SENTINEL};
use crate::consensus::NameDecision;
use crate::geometry::SharedBorder;
use crate::names::CrosswalkRow;
use crate::snapshot::Snapshot;
use crate::types::{Confidence, OverlapLink, Relationship, ReviewFlag, UnmatchedUnit};

/// Write a DataFrame to a CSV file.
fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("failed to write CSV to {}", path.display()))
}

/// Read a CSV file into a DataFrame.
fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("failed to read CSV from {}", path.display()))
}

fn opt_col(values: impl Iterator<Item = Option<Arc<str>>>) -> Vec<Option<String>> {
    values.map(|v| v.map(|s| s.to_string())).collect()
}

/// Link table: one row per resolved link, self-contained for downstream
/// consumers (names, divisions and provinces are repeated on the row).
pub fn write_links_csv(links: &[OverlapLink], path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), links.iter().map(|l| l.year_from as u32).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), links.iter().map(|l| l.id_from.to_string()).collect::<Vec<_>>()),
        Column::new("name_from".into(), opt_col(links.iter().map(|l| l.name_from.clone()))),
        Column::new("division_from".into(), opt_col(links.iter().map(|l| l.division_from.clone()))),
        Column::new("province_from".into(), opt_col(links.iter().map(|l| l.province_from.clone()))),
        Column::new("year_to".into(), links.iter().map(|l| l.year_to as u32).collect::<Vec<_>>()),
        Column::new("unit_id_to".into(), links.iter().map(|l| l.id_to.to_string()).collect::<Vec<_>>()),
        Column::new("name_to".into(), opt_col(links.iter().map(|l| l.name_to.clone()))),
        Column::new("division_to".into(), opt_col(links.iter().map(|l| l.division_to.clone()))),
        Column::new("province_to".into(), opt_col(links.iter().map(|l| l.province_to.clone()))),
        Column::new("relationship".into(), links.iter().map(|l| l.relationship.as_str()).collect::<Vec<_>>()),
        Column::new("iou".into(), links.iter().map(|l| l.iou).collect::<Vec<_>>()),
        Column::new("frac_from".into(), links.iter().map(|l| l.frac_from).collect::<Vec<_>>()),
        Column::new("frac_to".into(), links.iter().map(|l| l.frac_to).collect::<Vec<_>>()),
        Column::new("name_similarity".into(), links.iter().map(|l| l.name_similarity).collect::<Vec<_>>()),
        Column::new("confidence".into(), links.iter().map(|l| l.confidence.as_str()).collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}

/// Read a link table back, e.g. when building chains from a directory of
/// per-pair outputs.
pub fn read_links_csv(path: &Path) -> Result<Vec<OverlapLink>> {
    let df = read_csv(path)?;
    let height = df.height();

    let u32s = |name: &str| -> Result<Vec<Option<u32>>> {
        Ok(df.column(name)?.cast(&DataType::UInt32)?.u32()?.into_iter().collect())
    };
    let f64s = |name: &str| -> Result<Vec<Option<f64>>> {
        Ok(df.column(name)?.cast(&DataType::Float64)?.f64()?.into_iter().collect())
    };
    let strs = |name: &str| -> Result<Vec<Option<Arc<str>>>> {
        Ok(df
            .column(name)?
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(Arc::from))
            .collect())
    };

    let year_from = u32s("year_from")?;
    let year_to = u32s("year_to")?;
    let id_from = strs("unit_id_from")?;
    let id_to = strs("unit_id_to")?;
    let name_from = strs("name_from")?;
    let name_to = strs("name_to")?;
    let division_from = strs("division_from")?;
    let division_to = strs("division_to")?;
    let province_from = strs("province_from")?;
    let province_to = strs("province_to")?;
    let relationship = strs("relationship")?;
    let iou = f64s("iou")?;
    let frac_from = f64s("frac_from")?;
    let frac_to = f64s("frac_to")?;
    let name_similarity = f64s("name_similarity")?;
    let confidence = strs("confidence")?;

    let required = |value: Option<Arc<str>>, column: &str, row: usize| -> Result<Arc<str>> {
        value.with_context(|| format!("{}: null {column} at row {row}", path.display()))
    };

    let required_year = |value: Option<u32>, column: &str, row: usize| -> Result<u16> {
        let year = value.with_context(|| format!("{}: null {column} at row {row}", path.display()))?;
        u16::try_from(year).with_context(|| format!("{}: {column} out of range at row {row}", path.display()))
    };

    (0..height)
        .map(|i| {
            Ok(OverlapLink {
                year_from: required_year(year_from[i], "year_from", i)?,
                year_to: required_year(year_to[i], "year_to", i)?,
                id_from: required(id_from[i].clone(), "unit_id_from", i)?,
                id_to: required(id_to[i].clone(), "unit_id_to", i)?,
                name_from: name_from[i].clone(),
                name_to: name_to[i].clone(),
                division_from: division_from[i].clone(),
                division_to: division_to[i].clone(),
                province_from: province_from[i].clone(),
                province_to: province_to[i].clone(),
                relationship: Relationship::from_str(&required(relationship[i].clone(), "relationship", i)?)?,
                iou: iou[i].unwrap_or(0.0),
                frac_from: frac_from[i].unwrap_or(0.0),
                frac_to: frac_to[i].unwrap_or(0.0),
                name_similarity: name_similarity[i].unwrap_or(0.0),
                confidence: Confidence::from_str(&required(confidence[i].clone(), "confidence", i)?)?,
            })
        })
        .collect()
}

pub fn write_review_csv(flags: &[ReviewFlag], path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), flags.iter().map(|f| f.year_from as u32).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), flags.iter().map(|f| f.id_from.to_string()).collect::<Vec<_>>()),
        Column::new("name_from".into(), opt_col(flags.iter().map(|f| f.name_from.clone()))),
        Column::new("year_to".into(), flags.iter().map(|f| f.year_to as u32).collect::<Vec<_>>()),
        Column::new("unit_id_to".into(), flags.iter().map(|f| f.id_to.to_string()).collect::<Vec<_>>()),
        Column::new("name_to".into(), opt_col(flags.iter().map(|f| f.name_to.clone()))),
        Column::new("relationship".into(), flags.iter().map(|f| f.relationship.as_str()).collect::<Vec<_>>()),
        Column::new("iou".into(), flags.iter().map(|f| f.iou).collect::<Vec<_>>()),
        Column::new("name_similarity".into(), flags.iter().map(|f| f.name_similarity).collect::<Vec<_>>()),
        Column::new("note".into(), flags.iter().map(|_| "SECOND_CANDIDATE").collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}

pub fn write_unmatched_csv(unmatched: &[UnmatchedUnit], path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), unmatched.iter().map(|u| u.year_from as u32).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), unmatched.iter().map(|u| u.id_from.to_string()).collect::<Vec<_>>()),
        Column::new("name_from".into(), opt_col(unmatched.iter().map(|u| u.name_from.clone()))),
        Column::new("province_from".into(), opt_col(unmatched.iter().map(|u| u.province_from.clone()))),
        Column::new("year_to".into(), unmatched.iter().map(|u| u.year_to as u32).collect::<Vec<_>>()),
        Column::new("note".into(), unmatched.iter().map(|_| "NO_CANDIDATE").collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}

/// Lineage table: one row per (chain, year); missing names are written as
/// the start-of-chain sentinel.
pub fn write_lineages_csv(lineages: &[Lineage], path: &Path) -> Result<()> {
    let rows: Vec<(&Lineage, &crate::chain::LineageEntry)> =
        lineages.iter().flat_map(|l| l.entries.iter().map(move |e| (l, e))).collect();
    let mut df = DataFrame::new(vec![
        Column::new("chain_id".into(), rows.iter().map(|(l, _)| l.chain_id.clone()).collect::<Vec<_>>()),
        Column::new("year".into(), rows.iter().map(|(_, e)| e.year as u32).collect::<Vec<_>>()),
        Column::new("unit_id".into(), rows.iter().map(|(_, e)| e.id.to_string()).collect::<Vec<_>>()),
        Column::new(
            "name".into(),
            rows.iter()
                .map(|(_, e)| e.name.as_deref().unwrap_or(START_SENTINEL).to_string())
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_csv(&mut df, path)
}

pub fn write_branches_csv(branches: &[BranchPoint], path: &Path) -> Result<()> {
    let rows: Vec<(&BranchPoint, &(u16, Arc<str>))> =
        branches.iter().flat_map(|b| b.targets.iter().map(move |t| (b, t))).collect();
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), rows.iter().map(|(b, _)| b.year as u32).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), rows.iter().map(|(b, _)| b.id.to_string()).collect::<Vec<_>>()),
        Column::new("year_to".into(), rows.iter().map(|(_, t)| t.0 as u32).collect::<Vec<_>>()),
        Column::new("unit_id_to".into(), rows.iter().map(|(_, t)| t.1.to_string()).collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}

pub fn write_decisions_csv(decisions: &[NameDecision], path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new("chain_id".into(), decisions.iter().map(|d| d.chain_id.clone()).collect::<Vec<_>>()),
        Column::new(
            "canonical_name".into(),
            decisions.iter().map(|d| d.canonical_name.clone()).collect::<Vec<Option<String>>>(),
        ),
        Column::new("consensus_count".into(), decisions.iter().map(|d| d.consensus_count as u32).collect::<Vec<_>>()),
        Column::new("should_apply".into(), decisions.iter().map(|d| d.should_apply).collect::<Vec<_>>()),
        Column::new("reason_code".into(), decisions.iter().map(|d| d.reason.as_str()).collect::<Vec<_>>()),
        Column::new("diversity_score".into(), decisions.iter().map(|d| d.diversity_score).collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}

/// Per unit-year mapping of original to applied name. Years whose lineage
/// decision was negative keep their original name untouched.
pub fn write_mapping_csv(lineages: &[Lineage], decisions: &[NameDecision], path: &Path) -> Result<()> {
    let mut chain_ids = Vec::new();
    let mut years = Vec::new();
    let mut unit_ids = Vec::new();
    let mut original = Vec::new();
    let mut canonical = Vec::new();
    let mut applied = Vec::new();

    for (lineage, decision) in lineages.iter().zip(decisions) {
        for entry in &lineage.entries {
            let original_name = entry.name.as_deref().unwrap_or(START_SENTINEL);
            chain_ids.push(lineage.chain_id.clone());
            years.push(entry.year as u32);
            unit_ids.push(entry.id.to_string());
            original.push(original_name.to_string());
            canonical.push(if decision.should_apply {
                decision.canonical_name.clone().unwrap_or_else(|| original_name.to_string())
            } else {
                original_name.to_string()
            });
            applied.push(decision.should_apply);
        }
    }

    let mut df = DataFrame::new(vec![
        Column::new("chain_id".into(), chain_ids),
        Column::new("year".into(), years),
        Column::new("unit_id".into(), unit_ids),
        Column::new("original_name".into(), original),
        Column::new("canonical_name".into(), canonical),
        Column::new("should_apply".into(), applied),
    ])?;
    write_csv(&mut df, path)
}

/// Adjacency table for one year, ids resolved from shape indices.
pub fn write_borders_csv(snapshot: &Snapshot, borders: &[SharedBorder], path: &Path) -> Result<()> {
    let resolve = |idx: usize| snapshot.units[idx].id.to_string();
    // Emit each unordered pair once with the lexically smaller id first.
    let pairs: Vec<(String, String, f64)> = borders
        .iter()
        .map(|b| {
            let (a, z) = (resolve(b.a), resolve(b.b));
            if a <= z { (a, z, b.length_m) } else { (z, a, b.length_m) }
        })
        .collect();
    let mut df = DataFrame::new(vec![
        Column::new("year".into(), pairs.iter().map(|_| snapshot.year as u32).collect::<Vec<_>>()),
        Column::new("unit_id_a".into(), pairs.iter().map(|p| p.0.clone()).collect::<Vec<_>>()),
        Column::new("unit_id_b".into(), pairs.iter().map(|p| p.1.clone()).collect::<Vec<_>>()),
        Column::new(
            "shared_border_m".into(),
            pairs.iter().map(|p| (p.2 * 100.0).round() / 100.0).collect::<Vec<_>>(),
        ),
    ])?;
    write_csv(&mut df, path)
}

/// OCR-error candidates: SAME_AS links whose spatial signal is emphatic
/// but whose names disagree. The length difference hints at transcription
/// garbage on one side.
pub fn write_ocr_candidates_csv(links: &[OverlapLink], path: &Path) -> Result<()> {
    let len = |name: &Option<Arc<str>>| name.as_deref().map_or(0usize, str::len);
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), links.iter().map(|l| l.year_from as u32).collect::<Vec<_>>()),
        Column::new("year_to".into(), links.iter().map(|l| l.year_to as u32).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), links.iter().map(|l| l.id_from.to_string()).collect::<Vec<_>>()),
        Column::new("unit_id_to".into(), links.iter().map(|l| l.id_to.to_string()).collect::<Vec<_>>()),
        Column::new("name_from".into(), opt_col(links.iter().map(|l| l.name_from.clone()))),
        Column::new("name_to".into(), opt_col(links.iter().map(|l| l.name_to.clone()))),
        Column::new("iou".into(), links.iter().map(|l| l.iou).collect::<Vec<_>>()),
        Column::new("name_similarity".into(), links.iter().map(|l| l.name_similarity).collect::<Vec<_>>()),
        Column::new(
            "len_diff".into(),
            links
                .iter()
                .map(|l| len(&l.name_from).abs_diff(len(&l.name_to)) as u32)
                .collect::<Vec<_>>(),
        ),
    ])?;
    write_csv(&mut df, path)
}

pub fn write_crosswalk_csv(rows: &[CrosswalkRow], year_from: u16, year_to: u16, path: &Path) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new("year_from".into(), rows.iter().map(|_| year_from as u32).collect::<Vec<_>>()),
        Column::new("province".into(), rows.iter().map(|r| r.province.to_string()).collect::<Vec<_>>()),
        Column::new("unit_id_from".into(), rows.iter().map(|r| r.id_from.to_string()).collect::<Vec<_>>()),
        Column::new("name_from".into(), rows.iter().map(|r| r.name_from.to_string()).collect::<Vec<_>>()),
        Column::new("year_to".into(), rows.iter().map(|_| year_to as u32).collect::<Vec<_>>()),
        Column::new("unit_id_to".into(), rows.iter().map(|r| r.id_to.to_string()).collect::<Vec<_>>()),
        Column::new("name_to".into(), rows.iter().map(|r| r.name_to.to_string()).collect::<Vec<_>>()),
        Column::new("match_type".into(), rows.iter().map(|r| r.match_type.as_str()).collect::<Vec<_>>()),
        Column::new("name_distance".into(), rows.iter().map(|r| r.distance as u32).collect::<Vec<_>>()),
    ])?;
    write_csv(&mut df, path)
}
