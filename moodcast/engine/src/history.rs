use serde::{Deserialize, Serialize};

/// Losses recorded at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Mean training loss over the epoch's minibatches.
    pub train_loss: f64,
    /// Validation loss after the epoch; `None` without validation data.
    pub val_loss: Option<f64>,
}

/// Per-epoch history of one training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Records in epoch order.
    pub epochs: Vec<EpochRecord>,
    /// True when early stopping ended the run before the epoch budget.
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Epoch with the lowest validation loss.
    #[must_use]
    pub fn best(&self) -> Option<&EpochRecord> {
        self.epochs
            .iter()
            .filter(|record| record.val_loss.is_some_and(f64::is_finite))
            .min_by(|a, b| a.val_loss.partial_cmp(&b.val_loss).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Last recorded epoch.
    #[must_use]
    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// Number of epochs actually run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// True before the first epoch completes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// One-line summary for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.last(), self.best()) {
            (Some(last), Some(best)) => format!(
                "epochs={} train_loss={:.5} val_loss={:.5} best_epoch={}{}",
                self.len(),
                last.train_loss,
                last.val_loss.unwrap_or(f64::NAN),
                best.epoch,
                if self.stopped_early { " (early stop)" } else { "" }
            ),
            (Some(last), None) => {
                format!("epochs={} train_loss={:.5}", self.len(), last.train_loss)
            }
            _ => "no epochs run".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, val_loss: Option<f64>) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0 / (epoch as f64 + 1.0),
            val_loss,
        }
    }

    #[test]
    fn best_picks_lowest_validation_loss() {
        let history = TrainingHistory {
            epochs: vec![
                record(0, Some(0.9)),
                record(1, Some(0.3)),
                record(2, Some(0.4)),
            ],
            stopped_early: false,
        };
        assert_eq!(history.best().unwrap().epoch, 1);
        assert_eq!(history.last().unwrap().epoch, 2);
        assert!(history.summary().contains("best_epoch=1"));
    }

    #[test]
    fn best_skips_missing_validation() {
        let history = TrainingHistory {
            epochs: vec![record(0, None)],
            stopped_early: false,
        };
        assert!(history.best().is_none());
        assert!(history.summary().starts_with("epochs=1"));
        assert_eq!(TrainingHistory::default().summary(), "no epochs run");
    }
}
