use geo::Intersects;
use log::{debug, info, warn};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::geometry::{overlap_metrics, OverlapMetrics, PairOutcome, SkipReason};
use crate::names::combined_similarity;
use crate::snapshot::Snapshot;
use crate::types::{
    Confidence, OverlapLink, Relationship, ReviewFlag, SkippedPair, UnmatchedUnit,
};

use super::{classify, LinkThresholds};

/// All outputs of resolving one year-pair: primary links bucketed by
/// confidence, strong runner-ups for manual review, unmatched source units,
/// and pairs skipped on geometric degeneracy.
#[derive(Debug, Default)]
pub struct YearPairLinks {
    pub year_from: u16,
    pub year_to: u16,
    pub high: Vec<OverlapLink>,
    pub ambiguous: Vec<OverlapLink>,
    pub review: Vec<ReviewFlag>,
    pub unmatched: Vec<UnmatchedUnit>,
    pub skipped: Vec<SkippedPair>,
}

impl YearPairLinks {
    pub fn link_count(&self) -> usize {
        self.high.len() + self.ambiguous.len()
    }
}

/// One classified candidate for a source unit.
struct Candidate {
    target: usize,
    relationship: Relationship,
    metrics: OverlapMetrics,
    name_similarity: f64,
}

/// What one source unit resolved to.
enum Resolution {
    Linked {
        link: OverlapLink,
        review: Option<ReviewFlag>,
        skipped: Vec<SkippedPair>,
    },
    Unmatched {
        record: UnmatchedUnit,
        skipped: Vec<SkippedPair>,
    },
}

/// Confidence bucketing: containment is always high confidence (restructuring
/// implies a name mismatch), partial overlap always needs review, and
/// SAME_AS depends on the name agreeing.
fn bucket(relationship: Relationship, name_similarity: f64, t: &LinkThresholds) -> Confidence {
    match relationship {
        Relationship::SameAs if name_similarity >= t.name_high => Confidence::High,
        Relationship::SameAs => Confidence::Ambiguous,
        Relationship::Within | Relationship::Contains => Confidence::High,
        Relationship::Overlaps | Relationship::Ambiguous => Confidence::Ambiguous,
    }
}

fn resolve_unit(
    i: usize,
    from: &Snapshot,
    to: &Snapshot,
    t: &LinkThresholds,
) -> Resolution {
    let source = &from.units[i];
    let shape = &from.geoms.shapes()[i];
    let mut skipped: Vec<SkippedPair> = Vec::new();
    let mut candidates: SmallVec<[Candidate; 4]> = SmallVec::new();

    for j in to.geoms.candidates(shape) {
        let target_shape = &to.geoms.shapes()[j];
        // Bbox hit is only a pre-filter; require true intersection.
        if !shape.intersects(target_shape) {
            continue;
        }

        let target = &to.units[j];
        let name_similarity = combined_similarity(
            source.name.as_deref(),
            target.name.as_deref(),
            source.division.as_deref(),
            target.division.as_deref(),
        );

        match overlap_metrics(shape, target_shape, from.areas[i], to.areas[j]) {
            PairOutcome::Computed(metrics) => {
                candidates.push(Candidate {
                    target: j,
                    relationship: classify(&metrics, t),
                    metrics,
                    name_similarity,
                });
            }
            PairOutcome::Disjoint => {} // boundary touch only; adjacency, not overlap
            PairOutcome::Skipped(SkipReason::NonFinite) => {
                debug!("{} -> {}: overlap computation degenerated, pair skipped", source.id, target.id);
                skipped.push(SkippedPair {
                    id_from: source.id.clone(),
                    id_to: target.id.clone(),
                    reason: SkipReason::NonFinite.as_str(),
                });
            }
            PairOutcome::Skipped(reason) => {
                // Degenerate input: classified AMBIGUOUS with no further
                // computation, considered only if nothing better exists.
                debug!(
                    "{} -> {}: degenerate pair ({})",
                    source.id, target.id, reason.as_str()
                );
                candidates.push(Candidate {
                    target: j,
                    relationship: Relationship::Ambiguous,
                    metrics: OverlapMetrics {
                        area_intersection: 0.0,
                        iou: 0.0,
                        frac_from: 0.0,
                        frac_to: 0.0,
                    },
                    name_similarity,
                });
            }
        }
    }

    // AMBIGUOUS candidates are only eligible when they are all there is.
    let any_classified = candidates.iter().any(|c| c.relationship != Relationship::Ambiguous);
    if any_classified {
        candidates.retain(|c| c.relationship != Relationship::Ambiguous);
    }

    if candidates.is_empty() {
        return Resolution::Unmatched {
            record: UnmatchedUnit {
                year_from: from.year,
                year_to: to.year,
                id_from: source.id.clone(),
                name_from: source.name.clone(),
                province_from: source.province.clone(),
            },
            skipped,
        };
    }

    // Fully specified order: relationship priority, then IoU, then name
    // similarity, then target id so reruns are byte-identical.
    candidates.sort_by(|a, b| {
        b.relationship
            .priority()
            .cmp(&a.relationship.priority())
            .then(b.metrics.iou.total_cmp(&a.metrics.iou))
            .then(b.name_similarity.total_cmp(&a.name_similarity))
            .then(to.units[a.target].id.cmp(&to.units[b.target].id))
    });

    let best = &candidates[0];
    let target = &to.units[best.target];
    let link = OverlapLink {
        year_from: from.year,
        year_to: to.year,
        id_from: source.id.clone(),
        id_to: target.id.clone(),
        name_from: source.name.clone(),
        name_to: target.name.clone(),
        division_from: source.division.clone(),
        division_to: target.division.clone(),
        province_from: source.province.clone(),
        province_to: target.province.clone(),
        relationship: best.relationship,
        iou: best.metrics.iou,
        frac_from: best.metrics.frac_from,
        frac_to: best.metrics.frac_to,
        name_similarity: best.name_similarity,
        confidence: bucket(best.relationship, best.name_similarity, t),
    };

    // A strong second candidate is flagged for manual review, neither
    // discarded nor promoted.
    let review = candidates.get(1).and_then(|second| {
        (second.metrics.iou > t.review_iou && second.name_similarity > t.review_name).then(|| {
            let runner = &to.units[second.target];
            ReviewFlag {
                year_from: from.year,
                year_to: to.year,
                id_from: source.id.clone(),
                name_from: source.name.clone(),
                id_to: runner.id.clone(),
                name_to: runner.name.clone(),
                relationship: second.relationship,
                iou: second.metrics.iou,
                name_similarity: second.name_similarity,
            }
        })
    });

    Resolution::Linked { link, review, skipped }
}

/// Resolve links from every unit of `from` against `to`. Candidate
/// generation per source unit is embarrassingly parallel: the target index
/// is read-only after construction and shared across workers.
pub fn link_year_pair(from: &Snapshot, to: &Snapshot, t: &LinkThresholds) -> YearPairLinks {
    info!("linking {} -> {}: {} vs {} units", from.year, to.year, from.len(), to.len());
    if !from.projected || !to.projected {
        warn!(
            "linking {} -> {} on unprojected coordinates; area and IoU values are unreliable",
            from.year, to.year
        );
    }

    let resolutions: Vec<Resolution> = (0..from.len())
        .into_par_iter()
        .map(|i| resolve_unit(i, from, to, t))
        .collect();

    let mut out = YearPairLinks {
        year_from: from.year,
        year_to: to.year,
        ..Default::default()
    };
    for resolution in resolutions {
        match resolution {
            Resolution::Linked { link, review, skipped } => {
                out.skipped.extend(skipped);
                out.review.extend(review);
                match link.confidence {
                    Confidence::High => out.high.push(link),
                    Confidence::Ambiguous => out.ambiguous.push(link),
                }
            }
            Resolution::Unmatched { record, skipped } => {
                out.skipped.extend(skipped);
                out.unmatched.push(record);
            }
        }
    }

    info!(
        "linked {} -> {}: {} high, {} ambiguous, {} review, {} unmatched, {} skipped",
        from.year,
        to.year,
        out.high.len(),
        out.ambiguous.len(),
        out.review.len(),
        out.unmatched.len(),
        out.skipped.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::square;
    use crate::snapshot::UnitAttrs;
    use std::sync::Arc;

    fn unit(id: &str, name: &str) -> UnitAttrs {
        UnitAttrs {
            id: Arc::from(id),
            name: Some(Arc::from(name)),
            division: Some(Arc::from("Division")),
            province: Some(Arc::from("ON")),
        }
    }

    fn snapshot(year: u16, units: Vec<UnitAttrs>, shapes: Vec<geo::MultiPolygon<f64>>) -> Snapshot {
        Snapshot::from_parts(year, units, shapes, Some(crate::geometry::LAMBERT_EPSG))
    }

    #[test]
    fn unchanged_unit_resolves_to_high_confidence_same_as() {
        let from = snapshot(1851, vec![unit("A", "Malvern")], vec![square(0.0, 0.0, 10.0)]);
        let to = snapshot(1861, vec![unit("B", "Malvern")], vec![square(0.0, 0.0, 10.0)]);
        let links = link_year_pair(&from, &to, &LinkThresholds::default());
        assert_eq!(links.high.len(), 1);
        assert_eq!(links.high[0].relationship, Relationship::SameAs);
        assert_eq!(links.high[0].confidence, Confidence::High);
        assert!((links.high[0].iou - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ocr_mismatch_lands_in_the_ambiguous_bucket() {
        let from = snapshot(1851, vec![unit("A", "Berlin")], vec![square(0.0, 0.0, 10.0)]);
        let to = snapshot(1861, vec![unit("B", "Kitchener")], vec![square(0.0, 0.0, 10.0)]);
        let links = link_year_pair(&from, &to, &LinkThresholds::default());
        assert!(links.high.is_empty());
        assert_eq!(links.ambiguous.len(), 1);
        assert_eq!(links.ambiguous[0].relationship, Relationship::SameAs);
    }

    #[test]
    fn split_unit_yields_within_links_from_the_parts() {
        // Two 1861 fragments carved out of one 1851 unit: each fragment is
        // WITHIN the parent linking backwards, and the parent CONTAINS its
        // best fragment linking forwards.
        let parent = snapshot(1851, vec![unit("P", "Gore")], vec![square(0.0, 0.0, 10.0)]);
        let fragments = snapshot(
            1861,
            vec![unit("H1", "Gore North"), unit("H2", "Gore South")],
            vec![square(0.0, 0.0, 5.0), square(0.0, 5.0, 5.0)],
        );

        let forward = link_year_pair(&parent, &fragments, &LinkThresholds::default());
        assert_eq!(forward.high.len(), 1);
        assert_eq!(forward.high[0].relationship, Relationship::Contains);

        let backward = link_year_pair(&fragments, &parent, &LinkThresholds::default());
        assert_eq!(backward.high.len(), 2);
        assert!(backward.high.iter().all(|l| l.relationship == Relationship::Within));
        assert!(backward.high.iter().all(|l| l.confidence == Confidence::High));
    }

    #[test]
    fn vanished_unit_is_unmatched_not_an_error() {
        let from = snapshot(1851, vec![unit("A", "Lost")], vec![square(0.0, 0.0, 10.0)]);
        let to = snapshot(1861, vec![unit("B", "Far")], vec![square(100.0, 100.0, 10.0)]);
        let links = link_year_pair(&from, &to, &LinkThresholds::default());
        assert_eq!(links.link_count(), 0);
        assert_eq!(links.unmatched.len(), 1);
        assert_eq!(&*links.unmatched[0].id_from, "A");
    }

    #[test]
    fn disjoint_pairs_never_classify_as_overlap_classes() {
        // Touching is not overlapping: no link, recorded unmatched.
        let from = snapshot(1851, vec![unit("A", "Edge")], vec![square(0.0, 0.0, 10.0)]);
        let to = snapshot(1861, vec![unit("B", "Other")], vec![square(10.0, 0.0, 10.0)]);
        let links = link_year_pair(&from, &to, &LinkThresholds::default());
        assert_eq!(links.link_count(), 0);
        assert_eq!(links.unmatched.len(), 1);
    }

    #[test]
    fn strong_runner_up_is_flagged_for_review() {
        // Target year has two near-copies of the source; the loser of the
        // tie-break must surface as a review flag.
        let from = snapshot(1851, vec![unit("A", "Twin")], vec![square(0.0, 0.0, 10.0)]);
        let to = snapshot(
            1861,
            vec![unit("B1", "Twin"), unit("B2", "Twin")],
            vec![square(0.0, 0.0, 10.0), square(0.05, 0.0, 10.0)],
        );
        let links = link_year_pair(&from, &to, &LinkThresholds::default());
        assert_eq!(links.link_count(), 1);
        assert_eq!(links.review.len(), 1);
        assert_eq!(&*links.review[0].id_to, "B2");
    }

    #[test]
    fn resolution_is_deterministic_across_reruns() {
        let from = snapshot(
            1851,
            vec![unit("A", "Twin"), unit("B", "Other")],
            vec![square(0.0, 0.0, 10.0), square(20.0, 0.0, 10.0)],
        );
        let to = snapshot(
            1861,
            vec![unit("C1", "Twin"), unit("C2", "Twin"), unit("D", "Other")],
            vec![square(0.0, 0.0, 10.0), square(0.0, 0.0, 10.0), square(20.0, 0.0, 10.0)],
        );
        let t = LinkThresholds::default();
        let first = link_year_pair(&from, &to, &t);
        let second = link_year_pair(&from, &to, &t);
        let ids = |links: &YearPairLinks| {
            links.high.iter().map(|l| (l.id_from.clone(), l.id_to.clone())).collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
        // Exact tie on geometry and name: target id breaks it.
        assert_eq!(&*first.high.iter().find(|l| &*l.id_from == "A").unwrap().id_to, "C1");
    }
}
