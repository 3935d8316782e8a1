pub mod borders;
pub mod canonical;
pub mod crosswalk;
pub mod link;
pub mod ocr;
pub mod run;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::cli::Level;
use crate::snapshot::{FieldSpec, Snapshot};

/// The eight census snapshots the source data covers.
pub const CENSUS_YEARS: [u16; 8] = [1851, 1861, 1871, 1881, 1891, 1901, 1911, 1921];

/// Parse a comma-separated province list into an uppercase set.
fn parse_provinces(arg: Option<&str>) -> Option<HashSet<String>> {
    let set: HashSet<String> = arg?
        .split(',')
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

/// Parse a comma-separated year list, defaulting to the census years.
/// Years must be strictly increasing so consecutive pairs make sense.
fn parse_years(arg: Option<&str>) -> Result<Vec<u16>> {
    let years = match arg {
        None => CENSUS_YEARS.to_vec(),
        Some(raw) => raw
            .split(',')
            .map(|y| y.trim().parse::<u16>().with_context(|| format!("invalid year: {y:?}")))
            .collect::<Result<Vec<_>>>()?,
    };
    ensure!(years.len() >= 2, "need at least two years, got {}", years.len());
    ensure!(years.windows(2).all(|w| w[0] < w[1]), "years must be strictly increasing");
    Ok(years)
}

/// Load one year snapshot at the requested aggregation level.
fn load_snapshot(
    year: u16,
    path: &Path,
    level: Level,
    provinces: Option<&HashSet<String>>,
    source_epsg: Option<u32>,
) -> Result<Snapshot> {
    let snapshot =
        Snapshot::from_shapefile(year, path, &FieldSpec::for_year(year), source_epsg, provinces)?;
    Ok(match level {
        Level::Csd => snapshot,
        Level::Cd => snapshot.dissolve_to_divisions(),
    })
}
