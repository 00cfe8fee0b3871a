use ndarray::{Array2, Axis};
use rand::{seq::SliceRandom, Rng};

/// Minibatch drawn from a training set.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Input rows.
    pub inputs: Array2<f64>,
    /// Target rows aligned with `inputs`.
    pub targets: Array2<f64>,
}

/// Cuts row indices into minibatches, reshuffling on every call.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    batch_size: usize,
    order: Vec<usize>,
}

impl BatchBuilder {
    /// Builder over `rows` examples with the given batch size (at least 1).
    #[must_use]
    pub fn new(rows: usize, batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            order: (0..rows).collect(),
        }
    }

    /// Shuffles the row order and returns the batches of one epoch.
    pub fn epoch<R: Rng + ?Sized>(
        &mut self,
        inputs: &Array2<f64>,
        targets: &Array2<f64>,
        rng: &mut R,
    ) -> Vec<Batch> {
        self.order.shuffle(rng);
        self.order
            .chunks(self.batch_size)
            .map(|rows| Batch {
                inputs: inputs.select(Axis(0), rows),
                targets: targets.select(Axis(0), rows),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn covers_every_row_once_per_epoch() {
        let inputs = Array2::from_shape_fn((5, 2), |(row, _)| row as f64);
        let targets = Array2::from_shape_fn((5, 1), |(row, _)| row as f64);
        let mut builder = BatchBuilder::new(5, 2);
        let mut rng = SmallRng::seed_from_u64(3);
        let batches = builder.epoch(&inputs, &targets, &mut rng);
        assert_eq!(batches.len(), 3);
        let mut seen: Vec<f64> = batches
            .iter()
            .flat_map(|batch| {
                assert_eq!(batch.inputs.column(0), batch.targets.column(0));
                batch.targets.column(0).to_vec()
            })
            .collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn reshuffles_between_epochs() {
        let inputs = Array2::from_shape_fn((32, 1), |(row, _)| row as f64);
        let targets = inputs.clone();
        let mut builder = BatchBuilder::new(32, 32);
        let mut rng = SmallRng::seed_from_u64(5);
        let first = builder.epoch(&inputs, &targets, &mut rng)[0].inputs.clone();
        let second = builder.epoch(&inputs, &targets, &mut rng)[0].inputs.clone();
        assert_ne!(first, second);
    }
}
