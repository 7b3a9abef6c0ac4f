//! Lane-validity masks for the final partial vector

use crate::element::Lanes;

/// Remainder-indexed lane masks for one lane count.
///
/// Row `r` has exactly `r` valid lanes in index order; row 0 marks every
/// lane valid, since a zero remainder means the last vector is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskTable {
    lanes: Lanes,
    rows: Vec<Vec<bool>>,
}

impl MaskTable {
    pub fn for_lanes(lanes: Lanes) -> Self {
        let n = lanes.count();
        let rows = (0..n)
            .map(|remainder| {
                let valid = if remainder == 0 { n } else { remainder };
                (0..n).map(|lane| lane < valid).collect()
            })
            .collect();
        Self { lanes, rows }
    }

    pub fn lanes(&self) -> Lanes {
        self.lanes
    }

    /// Validity pattern for `remainder`.
    ///
    /// Panics if `remainder >= lanes`.
    pub fn mask(&self, remainder: usize) -> &[bool] {
        assert!(
            remainder < self.lanes.count(),
            "remainder {} out of range for {} lanes",
            remainder,
            self.lanes
        );
        &self.rows[remainder]
    }

    pub fn is_valid(&self, remainder: usize, lane: usize) -> bool {
        self.mask(remainder)[lane]
    }

    /// Number of valid lanes for `remainder`
    pub fn valid_count(&self, remainder: usize) -> usize {
        self.mask(remainder).iter().filter(|&&valid| valid).count()
    }

    /// All rows in remainder order
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_rows_are_prefixes() {
        for lanes in [Lanes::Four, Lanes::Eight] {
            let table = MaskTable::for_lanes(lanes);
            for remainder in 0..lanes.count() {
                let expected = if remainder == 0 { lanes.count() } else { remainder };
                assert_eq!(table.valid_count(remainder), expected);
                let mask = table.mask(remainder);
                // valid lanes form a prefix
                assert!(mask.windows(2).all(|w| w[0] || !w[1]));
            }
        }
    }

    #[test]
    fn test_mask_eight_lanes_remainder_three() {
        let table = MaskTable::for_lanes(Lanes::Eight);
        assert_eq!(
            table.mask(3),
            &[true, true, true, false, false, false, false, false]
        );
        assert!(table.is_valid(3, 2));
        assert!(!table.is_valid(3, 3));
    }

    #[test]
    fn test_mask_zero_remainder_is_full() {
        let table = MaskTable::for_lanes(Lanes::Four);
        assert!(table.mask(0).iter().all(|&v| v));
        assert_eq!(table.rows().count(), 4);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_mask_remainder_equal_to_lanes_panics() {
        MaskTable::for_lanes(Lanes::Four).mask(4);
    }
}
