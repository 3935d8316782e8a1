use geo::{Area, BooleanOps, MultiPolygon};

/// Spatial overlap metrics for one candidate pair, computed from exact
/// geometric intersection in an equal-area CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapMetrics {
    pub area_intersection: f64,
    pub iou: f64,
    pub frac_from: f64,
    pub frac_to: f64,
}

/// Why a candidate pair was abandoned before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyGeometry,
    ZeroArea,
    NonFinite,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::EmptyGeometry => "empty_geometry",
            SkipReason::ZeroArea => "zero_area",
            SkipReason::NonFinite => "non_finite",
        }
    }
}

/// Outcome of the overlap computation for one pair. Degeneracy is data,
/// not an exception: callers inspect the reason instead of catching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PairOutcome {
    Computed(OverlapMetrics),
    /// Bounding boxes met but the geometries share no interior area
    /// (disjoint or touching only).
    Disjoint,
    Skipped(SkipReason),
}

/// Compute intersection area, IoU and per-side coverage fractions for a
/// candidate pair. Areas are passed in precomputed (both sides already
/// live in the equal-area CRS).
pub fn overlap_metrics(
    from: &MultiPolygon<f64>,
    to: &MultiPolygon<f64>,
    area_from: f64,
    area_to: f64,
) -> PairOutcome {
    if from.0.is_empty() || to.0.is_empty() {
        return PairOutcome::Skipped(SkipReason::EmptyGeometry);
    }
    if area_from <= 0.0 || area_to <= 0.0 {
        return PairOutcome::Skipped(SkipReason::ZeroArea);
    }

    let area_intersection = from.intersection(to).unsigned_area();
    if area_intersection == 0.0 {
        return PairOutcome::Disjoint;
    }

    let area_union = area_from + area_to - area_intersection;
    let iou = if area_union > 0.0 { area_intersection / area_union } else { 0.0 };
    let frac_from = area_intersection / area_from;
    let frac_to = area_intersection / area_to;

    if !(iou.is_finite() && frac_from.is_finite() && frac_to.is_finite()) {
        return PairOutcome::Skipped(SkipReason::NonFinite);
    }

    PairOutcome::Computed(OverlapMetrics { area_intersection, iou, frac_from, frac_to })
}
