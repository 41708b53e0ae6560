pub struct Statistics;

impl Statistics {
    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(Self::sum(values.iter().copied()) / values.len() as f64)
    }

    pub fn sum(values: impl IntoIterator<Item = f64>) -> f64 {
        let mut sum = 0.0;
        for v in values {
            sum += v;
        }
        sum
    }

    /// `part / whole × 100`, clamped to [0, 100]. A zero whole yields 0.
    pub fn percent(part: f64, whole: f64) -> f64 {
        if !(whole > 0.0) || !part.is_finite() {
            return 0.0;
        }
        (part / whole * 100.0).clamp(0.0, 100.0)
    }

    /// Scales a total over `area_m2` to one hectare.
    pub fn per_hectare(total: f64, area_m2: f64) -> f64 {
        if !(area_m2 > 0.0) {
            return 0.0;
        }
        total / area_m2 * 10_000.0
    }
}
