use geo::{BooleanOps, MultiPolygon, Validation};

/// Attempt to restore validity of a polygon (self-intersections, bad ring
/// nesting) by re-noding it through a boolean union with the empty set.
/// Returns `None` when the input is empty or the repair fails; callers
/// exclude such units from the year's candidate set and log them.
pub fn repair(shape: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    if shape.0.is_empty() {
        return None;
    }
    if shape.is_valid() {
        return Some(shape.clone());
    }

    let renoded = shape.union(&MultiPolygon::new(vec![]));
    if renoded.0.is_empty() || !renoded.is_valid() {
        return None;
    }
    Some(renoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::square;
    use geo::{polygon, Area, Polygon};

    #[test]
    fn valid_shape_is_returned_as_is() {
        let a = square(0.0, 0.0, 10.0);
        assert_eq!(repair(&a), Some(a.clone()));
    }

    #[test]
    fn empty_shape_is_rejected() {
        assert_eq!(repair(&MultiPolygon::new(vec![])), None);
    }

    #[test]
    fn bowtie_is_renoded_to_a_valid_shape() {
        // Self-intersecting "bowtie" ring.
        let bowtie: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 10.0, y: 0.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        let repaired = repair(&MultiPolygon::new(vec![bowtie])).expect("repairable");
        assert!(repaired.is_valid());
        assert!(repaired.unsigned_area() > 0.0);
    }
}
