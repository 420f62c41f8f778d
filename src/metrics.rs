//! Percentage rendering and the CRAP (Change Risk Anti-Patterns) index.

use serde::Serialize;

/// A coverage ratio carrying its own rendering conventions.
///
/// Renderers rely on two fixed behaviors: `as_float` reports 100.0 when the
/// denominator is zero (nothing executable means nothing missed), while
/// `as_string` renders the empty string in that case so reports can leave
/// the cell blank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentage {
    fraction: u64,
    total: u64,
}

impl Percentage {
    #[must_use]
    pub fn new(fraction: u64, total: u64) -> Self {
        Self { fraction, total }
    }

    #[must_use]
    pub fn fraction(&self) -> u64 {
        self.fraction
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn as_float(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.fraction as f64 / self.total as f64 * 100.0
        }
    }

    /// Fixed two-decimal rendering, e.g. `"62.50%"`; empty when the
    /// denominator is zero.
    #[must_use]
    pub fn as_string(&self) -> String {
        if self.total == 0 {
            String::new()
        } else {
            format!("{:.2}%", self.as_float())
        }
    }
}

/// Compute the CRAP index for a unit with cyclomatic complexity `ccn` and
/// line coverage `coverage` (0.0–100.0), rendered the way report consumers
/// expect it:
///
///   coverage == 0     → integer `ccn² + ccn`
///   coverage >= 95    → integer `ccn` (the formula collapses to ≈ ccn)
///   otherwise         → `ccn² × (1 − coverage)³ + ccn` with two decimals
#[must_use]
pub fn crap_index(ccn: u64, coverage: f64) -> String {
    if coverage == 0.0 {
        return (ccn * ccn + ccn).to_string();
    }
    if coverage >= 95.0 {
        return ccn.to_string();
    }
    let miss = 1.0 - coverage / 100.0;
    let value = (ccn * ccn) as f64 * miss * miss * miss + ccn as f64;
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Percentage ----------------------------------------------------------

    #[test]
    fn test_percentage_zero_denominator() {
        let p = Percentage::new(0, 0);
        assert_eq!(p.as_float(), 100.0);
        assert_eq!(p.as_string(), "");
    }

    #[test]
    fn test_percentage_half() {
        let p = Percentage::new(1, 2);
        assert_eq!(p.as_float(), 50.0);
        assert_eq!(p.as_string(), "50.00%");
    }

    #[test]
    fn test_percentage_full() {
        let p = Percentage::new(8, 8);
        assert_eq!(p.as_string(), "100.00%");
    }

    // -- crap_index ----------------------------------------------------------

    #[test]
    fn test_crap_trivial_fully_covered() {
        assert_eq!(crap_index(1, 100.0), "1");
    }

    #[test]
    fn test_crap_uncovered() {
        // ccn² × 1 + ccn
        assert_eq!(crap_index(2, 0.0), "6");
        assert_eq!(crap_index(5, 0.0), "30");
    }

    #[test]
    fn test_crap_partial() {
        // 4 × 0.5³ + 2 = 2.5
        assert_eq!(crap_index(2, 50.0), "2.50");
    }

    #[test]
    fn test_crap_high_coverage_collapses_to_ccn() {
        assert_eq!(crap_index(7, 96.0), "7");
    }
}
