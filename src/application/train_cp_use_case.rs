// ============================================================
// Layer 2 — TrainCpUseCase
// ============================================================
// Orchestrates compatibility training in order:
//
//   Step 1: Validate the run              (Layer 2)
//   Step 2: Load the embedding cache      (Layer 6 - infra)
//   Step 3: Resolve labelled outfits      (Layer 4 - data)
//   Step 4: Seeded train/validation split (Layer 4 - data)
//   Step 5: Build datasets                (Layer 4 - data)
//   Step 6: Save model config             (Layer 6 - infra)
//   Step 7: Run training loop             (Layer 5 - ml)

use std::{fs, path::PathBuf};
use anyhow::{anyhow, Context, Result};
use burn::tensor::backend::AutodiffBackend;

use crate::application::run_config::{RunConfig, RunMode};
use crate::data::{
    dataset::{CompatibilityDataset, CompatibilityRecord, CompatibilitySample},
    padding::SequencePadder,
    splitter::split_train_val,
};
use crate::domain::traits::EmbeddingLookup;
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointMode},
    embedding_cache::EmbeddingCache,
    metrics::MetricsLogger,
};
use crate::ml::config::OutfitConfig;
use crate::ml::trainer::{train_compatibility, TrainingSummary};

const TRAIN_FRACTION: f64 = 0.8;

pub struct TrainCpUseCase {
    config:       RunConfig,
    samples:      PathBuf,
    /// Optional OutfitConfig JSON; defaults are derived from the cache width
    model_config: Option<PathBuf>,
}

impl TrainCpUseCase {
    pub fn new(config: RunConfig, samples: impl Into<PathBuf>, model_config: Option<PathBuf>) -> Self {
        Self { config, samples: samples.into(), model_config }
    }

    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainingSummary> {
        let cfg = &self.config;
        if cfg.mode != RunMode::TrainValid {
            return Err(anyhow!("train-cp needs mode train_valid"));
        }
        cfg.validate()?;

        // ── Step 2: cache ─────────────────────────────────────────────────────
        let cache = EmbeddingCache::load(&cfg.cache_dir, &cfg.cache_prefix)
            .with_context(|| format!("Cannot load embedding cache from '{}'", cfg.cache_dir.display()))?;

        // ── Step 3: labelled outfits ──────────────────────────────────────────
        let json = fs::read_to_string(&self.samples)
            .with_context(|| format!("Cannot read samples from '{}'", self.samples.display()))?;
        let records: Vec<CompatibilityRecord> = serde_json::from_str(&json)?;
        let samples = records
            .iter()
            .map(|r| r.resolve(&cache))
            .collect::<crate::error::Result<Vec<CompatibilitySample>>>()?;
        tracing::info!("Resolved {} labelled outfits", samples.len());

        // ── Step 4 + 5: split and datasets ────────────────────────────────────
        let ckpt      = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let model_cfg = self.model_config(&ckpt, cache.dim())?;
        model_cfg.validate()?;

        let (train, valid) = split_train_val(samples, TRAIN_FRACTION, cfg.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), valid.len());

        let padder = SequencePadder::from_config(&model_cfg);
        let train  = CompatibilityDataset::new(train, &padder, model_cfg.d_embed)?;
        let valid  = CompatibilityDataset::new(valid, &padder, model_cfg.d_embed)?;

        // ── Step 6 + 7 ────────────────────────────────────────────────────────
        ckpt.save_config(&model_cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        Ok(train_compatibility::<B>(&model_cfg, &cfg.training(), train, valid, &ckpt, &metrics, device)?)
    }

    /// Explicit file first, then the config saved by a previous run
    /// when resuming, then defaults for the cache width.
    fn model_config(&self, ckpt: &CheckpointManager, d_embed: usize) -> Result<OutfitConfig> {
        if let Some(path) = &self.model_config {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
            return Ok(serde_json::from_str(&json)?);
        }
        if self.config.checkpoint_mode == CheckpointMode::Full && ckpt.has_config() {
            return Ok(ckpt.load_config()?);
        }
        Ok(OutfitConfig::new(d_embed, d_embed))
    }
}
