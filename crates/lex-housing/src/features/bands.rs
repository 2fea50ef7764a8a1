//! Fixed-breakpoint bucketing for income and housing-age bands.

/// Right-closed bands over fixed breakpoints; the lowest edge is inclusive.
#[derive(Debug, Clone, Copy)]
pub struct BandSpec {
    edges: &'static [f64],
    labels: &'static [&'static str],
}

/// Median income (tens of thousands) into six bands.
pub const INCOME_BANDS: BandSpec = BandSpec {
    edges: &[0.0, 2.0, 3.0, 4.0, 5.0, 10.0, f64::INFINITY],
    labels: &["Very Low", "Low", "Medium", "High", "Very High", "Extreme"],
};

/// Housing median age (years) into five bands.
pub const AGE_BANDS: BandSpec = BandSpec {
    edges: &[0.0, 10.0, 20.0, 30.0, 50.0, f64::INFINITY],
    labels: &["New", "Recent", "Mature", "Old", "Very Old"],
};

impl BandSpec {
    /// Label of the band containing `value`, or `None` below the lowest
    /// edge and for NaN.
    pub fn bucket(&self, value: f64) -> Option<&'static str> {
        if value.is_nan() || value < self.edges[0] {
            return None;
        }
        self.edges
            .windows(2)
            .position(|w| value <= w[1])
            .map(|idx| self.labels[idx])
    }

    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }
}
