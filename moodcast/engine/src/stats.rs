use ndarray::{Array2, ArrayView1, Axis};

use crate::features::Feature;

/// Column statistics over an encoded `n x 20` batch.
///
/// Every accessor returns 0.0 on an empty batch.
#[derive(Debug, Clone, Copy)]
pub struct ColumnStats<'a> {
    matrix: &'a Array2<f64>,
}

impl<'a> ColumnStats<'a> {
    /// Wraps an encoded batch.
    #[must_use]
    pub const fn new(matrix: &'a Array2<f64>) -> Self {
        Self { matrix }
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Column view for `feature`.
    #[must_use]
    pub fn column(&self, feature: Feature) -> ArrayView1<'a, f64> {
        self.matrix.column(feature.index())
    }

    /// Arithmetic mean.
    #[must_use]
    pub fn mean(&self, feature: Feature) -> f64 {
        mean(self.column(feature))
    }

    /// Population standard deviation.
    #[must_use]
    pub fn std(&self, feature: Feature) -> f64 {
        std(self.column(feature))
    }

    /// `std / mean`; `None` when the mean is not positive.
    #[must_use]
    pub fn coefficient_of_variation(&self, feature: Feature) -> Option<f64> {
        let mean = self.mean(feature);
        (mean > 0.0).then(|| self.std(feature) / mean)
    }

    /// Share of rows whose `feature` is at least `threshold`.
    #[must_use]
    pub fn share_at_least(&self, feature: Feature, threshold: f64) -> f64 {
        let column = self.column(feature);
        if column.is_empty() {
            return 0.0;
        }
        let hits = column.iter().filter(|value| **value >= threshold).count();
        #[allow(clippy::cast_precision_loss)]
        let share = hits as f64 / column.len() as f64;
        share
    }
}

/// Mean of a column; 0.0 when empty.
#[must_use]
pub fn mean(values: ArrayView1<'_, f64>) -> f64 {
    values.mean().unwrap_or(0.0)
}

/// Population standard deviation; 0.0 when empty.
#[must_use]
pub fn std(values: ArrayView1<'_, f64>) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.std(0.0)
    }
}

/// Mean of the per-column population standard deviations.
#[must_use]
pub fn mean_column_std(matrix: &Array2<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    matrix.std_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_DIM;
    use ndarray::array;

    #[test]
    fn population_statistics() {
        let mut matrix = Array2::zeros((4, FEATURE_DIM));
        for (row, value) in [0.2, 0.4, 0.6, 0.8].into_iter().enumerate() {
            matrix[[row, Feature::Tempo.index()]] = value;
        }
        let stats = ColumnStats::new(&matrix);
        assert!((stats.mean(Feature::Tempo) - 0.5).abs() < 1e-12);
        assert!((stats.std(Feature::Tempo) - 0.05_f64.sqrt()).abs() < 1e-12);
        assert!(stats.coefficient_of_variation(Feature::Energy).is_none());
        assert!((stats.share_at_least(Feature::Tempo, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_batches_are_zero() {
        let matrix = Array2::zeros((0, FEATURE_DIM));
        let stats = ColumnStats::new(&matrix);
        assert_eq!(stats.mean(Feature::Valence), 0.0);
        assert_eq!(stats.std(Feature::Valence), 0.0);
        assert_eq!(stats.share_at_least(Feature::IsWeekend, 0.5), 0.0);
        assert_eq!(mean_column_std(&matrix), 0.0);
    }

    #[test]
    fn mean_column_std_averages_columns() {
        let matrix = array![[0.0, 1.0], [1.0, 1.0]];
        assert!((mean_column_std(&matrix) - 0.25).abs() < 1e-12);
    }
}
