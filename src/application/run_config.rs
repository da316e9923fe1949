// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Everything a run needs besides the model hyperparameters.
// Serialisable so a run can be described in a JSON file as well
// as on the command line.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::{OutfitError, Result};
use crate::infra::checkpoint::CheckpointMode;
use crate::ml::trainer::TrainingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Train with per-epoch validation
    TrainValid,
    /// Evaluation only
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode:            RunMode,
    /// Number of worker replicas
    pub world_size:      usize,
    pub checkpoint_dir:  PathBuf,
    pub checkpoint_mode: CheckpointMode,
    pub cache_dir:       PathBuf,
    pub cache_prefix:    String,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub learning_rate:   f64,
    pub seed:            u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode:            RunMode::Test,
            world_size:      1,
            checkpoint_dir:  PathBuf::from("checkpoints"),
            checkpoint_mode: CheckpointMode::WeightsOnly,
            cache_dir:       PathBuf::from("cache"),
            cache_prefix:    "clip_embeddings_".to_string(),
            batch_size:      32,
            epochs:          10,
            learning_rate:   1e-4,
            seed:            42,
        }
    }
}

impl RunConfig {
    /// Checked before any data is read.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(OutfitError::InvalidConfig("world_size must be at least 1".into()));
        }
        if self.mode == RunMode::Test && self.world_size > 1 {
            return Err(OutfitError::UnsupportedConcurrencyMode { world_size: self.world_size });
        }
        // Training has no gradient synchronisation between replicas
        if self.mode == RunMode::TrainValid && self.world_size > 1 {
            return Err(OutfitError::InvalidConfig(format!(
                "training runs in a single process, got world_size={}",
                self.world_size
            )));
        }
        if self.batch_size == 0 {
            return Err(OutfitError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if self.cache_prefix.is_empty() {
            return Err(OutfitError::InvalidConfig("cache prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn training(&self) -> TrainingConfig {
        TrainingConfig::new()
            .with_batch_size(self.batch_size)
            .with_epochs(self.epochs)
            .with_learning_rate(self.learning_rate)
            .with_seed(self.seed)
            .with_resume(self.checkpoint_mode == CheckpointMode::Full)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_worker_test_run_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_multi_worker_test_run_is_rejected() {
        let cfg = RunConfig { world_size: 4, ..RunConfig::default() };
        assert!(matches!(
            cfg.validate(),
            Err(OutfitError::UnsupportedConcurrencyMode { world_size: 4 })
        ));
    }

    #[test]
    fn test_multi_worker_training_is_rejected() {
        let cfg = RunConfig { mode: RunMode::TrainValid, world_size: 2, ..RunConfig::default() };
        assert!(matches!(cfg.validate(), Err(OutfitError::InvalidConfig(_))));
    }

    #[test]
    fn test_full_mode_resumes_training() {
        let cfg = RunConfig {
            mode:            RunMode::TrainValid,
            checkpoint_mode: CheckpointMode::Full,
            epochs:          3,
            ..RunConfig::default()
        };
        let t = cfg.training();
        assert!(t.resume);
        assert_eq!(t.epochs, 3);
    }

    #[test]
    fn test_mode_serialises_snake_case() {
        let json = serde_json::to_string(&RunMode::TrainValid).unwrap();
        assert_eq!(json, "\"train_valid\"");
    }
}
