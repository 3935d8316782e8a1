// End-to-end scenarios over synthetic snapshots: link resolution at scale,
// chains across all eight census years, consensus decisions, and the CSV
// round trip through the table IO.

use std::sync::Arc;

use geo::{polygon, MultiPolygon, Polygon};

use censuslink::io::{read_links_csv, write_links_csv};
use censuslink::{
    build_chains, decide_all, link_year_pair, ChainOptions, Confidence, ConsensusThresholds,
    FieldSpec, LinkThresholds, ReasonCode, Relationship, Snapshot, UnitAttrs, CENSUS_YEARS,
    LAMBERT_EPSG,
};

fn square(x0: f64, y0: f64, w: f64, h: f64) -> MultiPolygon<f64> {
    let p: Polygon<f64> = polygon![
        (x: x0, y: y0),
        (x: x0 + w, y: y0),
        (x: x0 + w, y: y0 + h),
        (x: x0, y: y0 + h),
        (x: x0, y: y0),
    ];
    MultiPolygon::new(vec![p])
}

fn unit(id: &str, name: &str) -> UnitAttrs {
    UnitAttrs {
        id: Arc::from(id),
        name: Some(Arc::from(name)),
        division: Some(Arc::from("Test Division")),
        province: Some(Arc::from("ON")),
    }
}

fn snapshot(year: u16, units: Vec<UnitAttrs>, shapes: Vec<MultiPolygon<f64>>) -> Snapshot {
    Snapshot::from_parts(year, units, shapes, Some(LAMBERT_EPSG))
}

/// Position of grid cell `k` on a 25x20 lattice, cells well separated.
fn cell(k: usize) -> (f64, f64) {
    ((k % 25) as f64 * 30.0, (k / 25) as f64 * 30.0)
}

/// Two 500-unit snapshots: 480 unchanged, 10 split in two, 10 vanished.
fn five_hundred_unit_scenario() -> (Snapshot, Snapshot) {
    let mut units_a = Vec::new();
    let mut shapes_a = Vec::new();
    let mut units_b = Vec::new();
    let mut shapes_b = Vec::new();

    // 480 geometrically unchanged units.
    for k in 0..480 {
        let (x, y) = cell(k);
        units_a.push(unit(&format!("A{k}"), &format!("Unit {k}")));
        shapes_a.push(square(x, y, 10.0, 10.0));
        units_b.push(unit(&format!("B{k}"), &format!("Unit {k}")));
        shapes_b.push(square(x, y, 10.0, 10.0));
    }

    // 10 units split into 20 halves in the target year.
    for k in 480..490 {
        let (x, y) = cell(k);
        units_a.push(unit(&format!("A{k}"), &format!("Unit {k}")));
        shapes_a.push(square(x, y, 10.0, 10.0));
        units_b.push(unit(&format!("B{k}w"), &format!("Unit {k} West")));
        shapes_b.push(square(x, y, 5.0, 10.0));
        units_b.push(unit(&format!("B{k}e"), &format!("Unit {k} East")));
        shapes_b.push(square(x + 5.0, y, 5.0, 10.0));
    }

    // 10 units with no target-year counterpart.
    for k in 490..500 {
        let (x, y) = cell(k);
        units_a.push(unit(&format!("A{k}"), &format!("Unit {k}")));
        shapes_a.push(square(x, y, 10.0, 10.0));
    }

    (snapshot(1851, units_a, shapes_a), snapshot(1861, units_b, shapes_b))
}

#[test]
fn five_hundred_unit_year_pair() {
    let (from, to) = five_hundred_unit_scenario();
    assert_eq!(from.len(), 500);
    assert_eq!(to.len(), 500);

    let links = link_year_pair(&from, &to, &LinkThresholds::default());

    let same_as = links
        .high
        .iter()
        .filter(|l| l.relationship == Relationship::SameAs)
        .count();
    let contains = links
        .high
        .iter()
        .filter(|l| l.relationship == Relationship::Contains)
        .count();

    assert_eq!(same_as, 480, "unchanged units resolve as SAME_AS");
    assert_eq!(contains, 10, "split parents resolve as CONTAINS of one half");
    assert_eq!(links.unmatched.len(), 10, "vanished units are unmatched, not errors");
    assert!(links.high.iter().all(|l| l.confidence == Confidence::High));

    // Linking the other direction: each half is WITHIN its parent.
    let backward = link_year_pair(&to, &from, &LinkThresholds::default());
    let within = backward
        .high
        .iter()
        .filter(|l| l.relationship == Relationship::Within)
        .count();
    assert_eq!(within, 20, "each split half is WITHIN the parent");
}

#[test]
fn unchanged_unit_chains_across_all_eight_years() {
    let snapshots: Vec<Snapshot> = CENSUS_YEARS
        .iter()
        .map(|&year| {
            snapshot(
                year,
                vec![unit(&format!("U{year}"), "Charlottetown")],
                vec![square(0.0, 0.0, 10.0, 10.0)],
            )
        })
        .collect();

    let t = LinkThresholds::default();
    let mut links = Vec::new();
    for pair in snapshots.windows(2) {
        let resolved = link_year_pair(&pair[0], &pair[1], &t);
        assert_eq!(resolved.high.len(), 1);
        links.extend(resolved.high);
    }

    let chains = build_chains(&links, &ChainOptions::default());
    assert_eq!(chains.lineages.len(), 1);
    assert_eq!(chains.lineages[0].entries.len(), 8);
    assert_eq!(chains.lineages[0].entries[0].year, 1851);
    assert_eq!(chains.lineages[0].entries[7].year, 1921);

    let decisions = decide_all(&chains.lineages, &ConsensusThresholds::default());
    assert_eq!(decisions.len(), 1);
    assert!(decisions[0].should_apply);
    assert_eq!(decisions[0].reason, ReasonCode::Unanimous);
    assert_eq!(decisions[0].canonical_name.as_deref(), Some("Charlottetown"));
}

#[test]
fn ocr_noise_is_corrected_but_renames_survive() {
    // Two units side by side across three years; one accumulates an OCR
    // error, the other is genuinely renamed.
    let years = [1851u16, 1861, 1871];
    let names = [
        [("Malvern", "Berlin")],
        [("Malvern", "Berlin")],
        [("Melvern", "Kitchener")],
    ];

    let snapshots: Vec<Snapshot> = years
        .iter()
        .zip(names.iter())
        .map(|(&year, row)| {
            let (noisy, renamed) = row[0];
            snapshot(
                year,
                vec![unit(&format!("N{year}"), noisy), unit(&format!("R{year}"), renamed)],
                vec![square(0.0, 0.0, 10.0, 10.0), square(50.0, 0.0, 10.0, 10.0)],
            )
        })
        .collect();

    let t = LinkThresholds::default();
    let mut links = Vec::new();
    for pair in snapshots.windows(2) {
        let resolved = link_year_pair(&pair[0], &pair[1], &t);
        links.extend(resolved.high);
        links.extend(resolved.ambiguous);
    }

    let chains = build_chains(&links, &ChainOptions::default());
    assert_eq!(chains.lineages.len(), 2);

    let decisions = decide_all(&chains.lineages, &ConsensusThresholds::default());
    let by_name = |needle: &str| {
        decisions
            .iter()
            .find(|d| d.canonical_name.as_deref() == Some(needle))
            .expect("decision present")
    };

    let noisy = by_name("Malvern");
    assert!(noisy.should_apply);
    assert_eq!(noisy.reason, ReasonCode::OcrVariants);

    let renamed = by_name("Berlin");
    assert!(!renamed.should_apply);
    assert_eq!(renamed.reason, ReasonCode::NameChange);
}

#[test]
fn link_tables_round_trip_through_csv() {
    let (from, to) = five_hundred_unit_scenario();
    let links = link_year_pair(&from, &to, &LinkThresholds::default());

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("year_links_1851_1861.csv");
    write_links_csv(&links.high, &path).expect("write");

    let restored = read_links_csv(&path).expect("read");
    assert_eq!(restored.len(), links.high.len());
    for (a, b) in links.high.iter().zip(&restored) {
        assert_eq!(a.id_from, b.id_from);
        assert_eq!(a.id_to, b.id_to);
        assert_eq!(a.relationship, b.relationship);
        assert_eq!(a.confidence, b.confidence);
        assert!((a.iou - b.iou).abs() < 1e-9);
        assert_eq!(a.name_from, b.name_from);
    }
}

#[test]
fn rerunning_the_pair_reproduces_identical_links() {
    let (from, to) = five_hundred_unit_scenario();
    let t = LinkThresholds::default();
    let first = link_year_pair(&from, &to, &t);
    let second = link_year_pair(&from, &to, &t);

    let key = |links: &[censuslink::OverlapLink]| {
        links
            .iter()
            .map(|l| (l.id_from.clone(), l.id_to.clone(), l.relationship, l.iou.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&first.high), key(&second.high));
    assert_eq!(key(&first.ambiguous), key(&second.ambiguous));
}

#[test]
fn default_field_spec_matches_source_convention() {
    let fields = FieldSpec::for_year(1851);
    assert_eq!(fields.unit_id, "TCPUID_CSD_1851");
    assert_eq!(fields.name, "NAME_CSD_1851");
    assert_eq!(fields.division, "NAME_CD_1851");
    assert_eq!(fields.province, "PR_1851");
}
