/// Rainfall bin registry for the verification engine.
///
/// Defines the ordered set of intensity categories scored for one variable.
/// This is the single source of truth for bin edges; classification,
/// aggregation and export all iterate the same `BinTable` so that rows line
/// up across periods.

use serde::Serialize;

use crate::model::{BinKind, RainfallBin, VerifyError};

// ---------------------------------------------------------------------------
// Standard bins (24-hour accumulation, mm)
// ---------------------------------------------------------------------------

/// Edges of the standard intensity categories, ascending. The first edge is
/// the trace threshold; the last bin is open-ended.
pub const STANDARD_EDGES_MM: [f64; 5] = [0.1, 5.0, 20.0, 35.0, 50.0];

/// Names of the standard categories, in table order.
pub const STANDARD_NAMES: [&str; 6] = ["total", "dry", "low", "moderate", "heavy", "extreme"];

// ---------------------------------------------------------------------------
// Bin table
// ---------------------------------------------------------------------------

/// An ordered, validated list of rainfall bins.
///
/// Invariants (checked by [`BinTable::new`]):
/// - names are unique, non-empty and free of `,`, `"` and line breaks
/// - at most one total bin
/// - every magnitude bin has `lo < hi` and `lo > 0`
/// - magnitude bins are chained: each bin's `hi` equals the next one's `lo`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinTable {
    bins: Vec<RainfallBin>,
}

impl BinTable {
    pub fn new(bins: Vec<RainfallBin>) -> Result<Self, VerifyError> {
        if bins.is_empty() {
            return Err(VerifyError::InvalidBinTable("no bins defined".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for bin in &bins {
            if bin.name.trim().is_empty() {
                return Err(VerifyError::InvalidBinTable("bin with empty name".into()));
            }
            if bin.name.contains([',', '"', '\n', '\r']) {
                return Err(VerifyError::InvalidBinTable(format!(
                    "bin name {:?} contains a comma, quote or line break",
                    bin.name
                )));
            }
            if !seen.insert(bin.name.as_str()) {
                return Err(VerifyError::InvalidBinTable(format!(
                    "duplicate bin name '{}'",
                    bin.name
                )));
            }
        }

        let totals = bins.iter().filter(|b| b.kind == BinKind::Total).count();
        if totals > 1 {
            return Err(VerifyError::InvalidBinTable(format!(
                "{} total bins defined, at most one allowed",
                totals
            )));
        }

        let magnitude: Vec<&RainfallBin> = bins
            .iter()
            .filter(|b| b.kind == BinKind::Magnitude)
            .collect();
        for bin in &magnitude {
            if !(bin.lo > 0.0 && bin.lo < bin.hi) {
                return Err(VerifyError::InvalidBinTable(format!(
                    "bin '{}' must satisfy 0 < lo < hi, got [{}, {})",
                    bin.name, bin.lo, bin.hi
                )));
            }
        }
        for pair in magnitude.windows(2) {
            if pair[0].hi != pair[1].lo {
                return Err(VerifyError::InvalidBinTable(format!(
                    "bins '{}' and '{}' are not chained: {} != {}",
                    pair[0].name, pair[1].name, pair[0].hi, pair[1].lo
                )));
            }
        }

        Ok(BinTable { bins })
    }

    /// The six categories used operationally: total, dry, low, moderate,
    /// heavy and extreme.
    pub fn standard() -> Self {
        let e = STANDARD_EDGES_MM;
        BinTable {
            bins: vec![
                RainfallBin::total(STANDARD_NAMES[0]),
                RainfallBin::magnitude(STANDARD_NAMES[1], e[0], e[1]),
                RainfallBin::magnitude(STANDARD_NAMES[2], e[1], e[2]),
                RainfallBin::magnitude(STANDARD_NAMES[3], e[2], e[3]),
                RainfallBin::magnitude(STANDARD_NAMES[4], e[3], e[4]),
                RainfallBin::magnitude(STANDARD_NAMES[5], e[4], f64::INFINITY),
            ],
        }
    }

    pub fn bins(&self) -> &[RainfallBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RainfallBin> {
        self.bins.iter()
    }

    /// Bin names in table order.
    pub fn names(&self) -> Vec<&str> {
        self.bins.iter().map(|b| b.name.as_str()).collect()
    }

    /// Looks up a bin by name. Returns `None` if not found.
    pub fn find(&self, name: &str) -> Option<&RainfallBin> {
        self.bins.iter().find(|b| b.name == name)
    }

    /// The magnitude bin containing `value`, if any. Trace and dry values
    /// below the first edge return `None`.
    pub fn bin_for(&self, value: f64) -> Option<&RainfallBin> {
        self.bins
            .iter()
            .filter(|b| b.kind == BinKind::Magnitude)
            .find(|b| b.contains(value))
    }
}

impl<'a> IntoIterator for &'a BinTable {
    type Item = &'a RainfallBin;
    type IntoIter = std::slice::Iter<'a, RainfallBin>;

    fn into_iter(self) -> Self::IntoIter {
        self.bins.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_valid() {
        let std_table = BinTable::standard();
        let rebuilt = BinTable::new(std_table.bins().to_vec());
        assert_eq!(rebuilt, Ok(std_table));
    }

    #[test]
    fn test_standard_table_names_in_order() {
        assert_eq!(BinTable::standard().names(), STANDARD_NAMES.to_vec());
    }

    #[test]
    fn test_standard_magnitude_bins_are_chained() {
        // Each bin's upper edge must be the next bin's lower edge, otherwise
        // some intensities would fall in no bin (or two).
        let table = BinTable::standard();
        let mags: Vec<_> = table
            .iter()
            .filter(|b| b.kind == BinKind::Magnitude)
            .collect();
        for pair in mags.windows(2) {
            assert_eq!(pair[0].hi, pair[1].lo, "'{}' not chained", pair[0].name);
        }
        assert!(mags.last().map(|b| b.is_open_ended()).unwrap_or(false));
    }

    #[test]
    fn test_find_returns_correct_entry() {
        let table = BinTable::standard();
        let low = table.find("low").expect("low bin should be in table");
        assert_eq!((low.lo, low.hi), (5.0, 20.0));
        assert!(table.find("drizzle").is_none());
    }

    #[test]
    fn test_bin_for_value() {
        let table = BinTable::standard();
        assert_eq!(table.bin_for(12.0).map(|b| b.name.as_str()), Some("low"));
        assert_eq!(table.bin_for(50.0).map(|b| b.name.as_str()), Some("extreme"));
        assert_eq!(table.bin_for(0.05), None);
    }

    #[test]
    fn test_gap_between_bins_is_rejected() {
        let result = BinTable::new(vec![
            RainfallBin::magnitude("a", 0.1, 5.0),
            RainfallBin::magnitude("b", 6.0, 10.0),
        ]);
        assert!(matches!(result, Err(VerifyError::InvalidBinTable(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = BinTable::new(vec![
            RainfallBin::magnitude("a", 0.1, 5.0),
            RainfallBin::magnitude("a", 5.0, 10.0),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_names_with_separators_rejected() {
        for name in ["light, showers", "say \"hi\"", "two\nlines"] {
            let result = BinTable::new(vec![RainfallBin::magnitude(name, 0.1, 5.0)]);
            assert!(matches!(result, Err(VerifyError::InvalidBinTable(_))), "{:?} accepted", name);
        }
    }

    #[test]
    fn test_two_total_bins_rejected() {
        let result = BinTable::new(vec![RainfallBin::total("t1"), RainfallBin::total("t2")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_inverted_bin_rejected() {
        let result = BinTable::new(vec![RainfallBin::magnitude("a", 5.0, 1.0)]);
        assert!(result.is_err());
        assert!(BinTable::new(Vec::new()).is_err());
    }
}
