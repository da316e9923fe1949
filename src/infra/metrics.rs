// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records compatibility-training metrics to a CSV file after
// each epoch, and computes the ROC-AUC the best checkpoint is
// selected by.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: mean BCE-with-logits over training batches
//   - val_loss:   mean BCE-with-logits over validation batches
//   - val_auc:    ROC-AUC of validation logits (NaN if undefined)
//
// Example CSV output:
//   epoch,train_loss,val_loss,val_auc
//   1,0.693100,0.690400,0.541000
//   2,0.671200,0.668800,0.603000

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub train_loss: f64,
    pub val_loss:   f64,
    /// None when the validation set holds only one class
    pub val_auc:    Option<f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64, val_auc: Option<f64>) -> Self {
        Self { epoch, train_loss, val_loss, val_auc }
    }

    /// True if this epoch's AUC beats `best_auc`.
    pub fn is_improvement(&self, best_auc: f64) -> bool {
        self.val_auc.map_or(false, |auc| auc > best_auc)
    }
}

/// Appends epoch metrics to `{dir}/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,val_auc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.val_auc.unwrap_or(f64::NAN),
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch, m.train_loss, m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores share their average rank. Returns None when
/// `labels` contains only positives or only negatives.
pub fn roc_auc(scores: &[f32], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, ties averaged
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_pos += order[i..=j].iter().filter(|&&k| labels[k] == 1).count() as f64 * avg_rank;
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n))
}
