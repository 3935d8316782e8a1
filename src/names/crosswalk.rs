//! Purely nominal crosswalk between two years, for QA and as a fallback
//! where geometry is missing: exact matches on normalized names, then
//! near matches within a small edit distance.

use std::sync::Arc;

use ahash::AHashMap;
use log::info;

use crate::snapshot::Snapshot;

use super::normalize_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    ExactNorm,
    NearNorm,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::ExactNorm => "exact_norm",
            MatchType::NearNorm => "near_norm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrosswalkRow {
    pub province: Arc<str>,
    pub id_from: Arc<str>,
    pub name_from: Arc<str>,
    pub id_to: Arc<str>,
    pub name_to: Arc<str>,
    pub match_type: MatchType,
    pub distance: usize,
}

struct NamedUnit {
    idx: usize,
    norm: String,
}

/// First normalized token, used to block the near-match search.
fn first_token(norm: &str) -> &str {
    norm.split(' ').next().unwrap_or("")
}

/// Candidate crosswalk between two years by name alone, within matching
/// provinces. Units without a name or province are skipped. Deterministic:
/// provinces and units are processed in sorted/source order.
pub fn name_crosswalk(from: &Snapshot, to: &Snapshot, max_distance: usize) -> Vec<CrosswalkRow> {
    // Units grouped by province, with normalized names.
    fn by_province(snapshot: &Snapshot) -> AHashMap<Arc<str>, Vec<NamedUnit>> {
        let mut grouped: AHashMap<Arc<str>, Vec<NamedUnit>> = AHashMap::new();
        for (idx, unit) in snapshot.units.iter().enumerate() {
            let (Some(province), Some(name)) = (&unit.province, &unit.name) else { continue };
            grouped
                .entry(province.clone())
                .or_default()
                .push(NamedUnit { idx, norm: normalize_name(name) });
        }
        grouped
    }

    let src = by_province(from);
    let dst = by_province(to);

    let mut provinces: Vec<Arc<str>> = src.keys().cloned().collect();
    provinces.sort();

    let mut rows = Vec::new();
    let (mut exact, mut near) = (0usize, 0usize);

    for province in provinces {
        let Some(dst_units) = dst.get(&province) else { continue };

        let mut exact_index: AHashMap<&str, Vec<&NamedUnit>> = AHashMap::new();
        for unit in dst_units {
            exact_index.entry(unit.norm.as_str()).or_default().push(unit);
        }

        for a in &src[&province] {
            if let Some(matches) = exact_index.get(a.norm.as_str()) {
                for b in matches {
                    rows.push(row(from, to, &province, a, b, MatchType::ExactNorm, 0));
                    exact += 1;
                }
                continue;
            }

            // Near match: same first token, smallest edit distance wins,
            // source order breaks ties.
            let token = first_token(&a.norm);
            let mut best: Option<(&NamedUnit, usize)> = None;
            for b in dst_units.iter().filter(|b| first_token(&b.norm) == token) {
                if a.norm.len().abs_diff(b.norm.len()) > max_distance {
                    continue;
                }
                let d = strsim::levenshtein(&a.norm, &b.norm);
                if d <= max_distance && best.is_none_or(|(_, bd)| d < bd) {
                    best = Some((b, d));
                }
            }
            if let Some((b, d)) = best {
                rows.push(row(from, to, &province, a, b, MatchType::NearNorm, d));
                near += 1;
            }
        }
    }

    info!(
        "name crosswalk {} -> {}: {} exact, {} near",
        from.year, to.year, exact, near
    );
    rows
}

fn row(
    from: &Snapshot,
    to: &Snapshot,
    province: &Arc<str>,
    a: &NamedUnit,
    b: &NamedUnit,
    match_type: MatchType,
    distance: usize,
) -> CrosswalkRow {
    let src = &from.units[a.idx];
    let dst = &to.units[b.idx];
    CrosswalkRow {
        province: province.clone(),
        id_from: src.id.clone(),
        name_from: src.name.clone().unwrap_or_else(|| Arc::from("")),
        id_to: dst.id.clone(),
        name_to: dst.name.clone().unwrap_or_else(|| Arc::from("")),
        match_type,
        distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::square;
    use crate::snapshot::UnitAttrs;

    fn snapshot(year: u16, units: &[(&str, &str, &str)]) -> Snapshot {
        let attrs = units
            .iter()
            .map(|(id, name, pr)| UnitAttrs {
                id: Arc::from(*id),
                name: Some(Arc::from(*name)),
                division: None,
                province: Some(Arc::from(*pr)),
            })
            .collect();
        let shapes = units.iter().enumerate().map(|(i, _)| square(i as f64 * 20.0, 0.0, 10.0)).collect();
        Snapshot::from_parts(year, attrs, shapes, Some(crate::geometry::LAMBERT_EPSG))
    }

    #[test]
    fn exact_normalized_match_crosses_spelling_conventions() {
        let from = snapshot(1851, &[("A", "St. Thomas", "ON")]);
        let to = snapshot(1861, &[("B", "Saint Thomas", "ON")]);
        let rows = name_crosswalk(&from, &to, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].match_type, MatchType::ExactNorm);
        assert_eq!(rows[0].distance, 0);
    }

    #[test]
    fn near_match_within_edit_distance() {
        let from = snapshot(1851, &[("A", "Malvern", "ON")]);
        let to = snapshot(1861, &[("B", "Malvorn", "ON")]);
        let rows = name_crosswalk(&from, &to, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].match_type, MatchType::NearNorm);
        assert_eq!(rows[0].distance, 1);
    }

    #[test]
    fn provinces_do_not_mix() {
        let from = snapshot(1851, &[("A", "Gore", "ON")]);
        let to = snapshot(1861, &[("B", "Gore", "QC")]);
        assert!(name_crosswalk(&from, &to, 2).is_empty());
    }

    #[test]
    fn distant_names_do_not_match() {
        let from = snapshot(1851, &[("A", "Berlin", "ON")]);
        let to = snapshot(1861, &[("B", "Kitchener", "ON")]);
        assert!(name_crosswalk(&from, &to, 2).is_empty());
    }
}
