// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the outfit model using Burn's CompactRecorder.
//
// Two restore paths, picked by CheckpointMode:
//   WeightsOnly — model parameters only (evaluation, retrieval)
//   Full        — model + optimizer state + epoch counter (resume)
//
// File layout:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     optim_epoch_1.mpk.gz   ← Adam moments after epoch 1
//     ...
//     best_auc.mpk.gz        ← weights-only, best validation AUC
//     best_auc.json          ← epoch and AUC of those weights
//     latest_epoch.json      ← number of the latest full checkpoint
//     outfit_config.json     ← model hyperparameters
//
// The config is stored separately because the model must be
// rebuilt with the same architecture before a record can be
// loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    module::Module,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::error::{OutfitError, Result};
use crate::ml::config::OutfitConfig;
use crate::ml::model::OutfitModel;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const CONFIG_FILE:       &str = "outfit_config.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointMode {
    /// Model parameters only
    WeightsOnly,
    /// Model, optimizer and epoch counter
    Full,
}

/// Selection score stored next to a weights-only checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestScore {
    pub epoch: usize,
    pub auc:   f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save model parameters under `{dir}/{name}`.
    pub fn save_weights<B: Backend>(&self, model: &OutfitModel<B>, name: &str) -> Result<()> {
        let path = self.dir.join(name);
        record::<B, _>(model.clone().into_record(), &path)?;
        tracing::debug!("Saved weights '{}'", path.display());
        Ok(())
    }

    /// Load parameters saved by `save_weights` or `save_state` into `model`.
    pub fn load_weights<B: Backend>(
        &self,
        model:  OutfitModel<B>,
        name:   &str,
        device: &B::Device,
    ) -> Result<OutfitModel<B>> {
        let path = self.dir.join(name);
        tracing::info!("Loading weights from '{}'", path.display());
        let record = load::<B, _>(&path, device)?;
        Ok(model.load_record(record))
    }

    /// Save weights under `name` together with the score that selected them.
    pub fn save_best<B: Backend>(&self, model: &OutfitModel<B>, name: &str, score: BestScore) -> Result<()> {
        self.save_weights(model, name)?;
        fs::write(self.dir.join(score_name(name)), serde_json::to_string(&score)?)?;
        Ok(())
    }

    /// The score recorded by `save_best`, or None if nothing was saved under `name`.
    pub fn best_score(&self, name: &str) -> Result<Option<BestScore>> {
        let path = self.dir.join(score_name(name));
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(&path)?)?))
    }

    /// Full checkpoint: model, optimizer and the epoch pointer.
    pub fn save_state<B, O>(&self, model: &OutfitModel<B>, optim: &O, epoch: usize) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<OutfitModel<B>, B>,
    {
        record::<B, _>(model.clone().into_record(), &self.dir.join(model_name(epoch)))?;
        record::<B, _>(optim.to_record(), &self.dir.join(optim_name(epoch)))?;

        // Written last so it never points at a half-written epoch
        fs::write(self.dir.join(LATEST_EPOCH_FILE), serde_json::to_string(&epoch)?)?;
        tracing::debug!("Saved full checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Restore the latest full checkpoint. Returns the epoch it was saved at.
    pub fn resume<B, O>(
        &self,
        model:  OutfitModel<B>,
        optim:  O,
        device: &B::Device,
    ) -> Result<(OutfitModel<B>, O, usize)>
    where
        B: AutodiffBackend,
        O: Optimizer<OutfitModel<B>, B>,
    {
        let epoch = self.latest_epoch()?.ok_or_else(|| OutfitError::Checkpoint {
            path:    self.dir.join(LATEST_EPOCH_FILE),
            message: "no full checkpoint to resume from".into(),
        })?;
        tracing::info!("Resuming from epoch {}", epoch);

        let model = model.load_record(load::<B, _>(&self.dir.join(model_name(epoch)), device)?);
        let optim = optim.load_record(load::<B, _>(&self.dir.join(optim_name(epoch)), device)?);
        Ok((model, optim, epoch))
    }

    /// Restore weights for evaluation. `WeightsOnly` reads `name`,
    /// `Full` reads the model half of the latest full checkpoint.
    pub fn restore_weights<B: Backend>(
        &self,
        model:  OutfitModel<B>,
        mode:   CheckpointMode,
        name:   &str,
        device: &B::Device,
    ) -> Result<OutfitModel<B>> {
        match mode {
            CheckpointMode::WeightsOnly => self.load_weights(model, name, device),
            CheckpointMode::Full => {
                let epoch = self.latest_epoch()?.ok_or_else(|| OutfitError::Checkpoint {
                    path:    self.dir.join(LATEST_EPOCH_FILE),
                    message: "no full checkpoint saved yet".into(),
                })?;
                self.load_weights(model, &model_name(epoch), device)
            }
        }
    }

    pub fn save_config(&self, cfg: &OutfitConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<OutfitConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).map_err(|err| OutfitError::Checkpoint {
            path:    path.clone(),
            message: err.to_string(),
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn has_config(&self) -> bool {
        self.dir.join(CONFIG_FILE).exists()
    }

    /// The latest full-checkpoint epoch, or None if training never saved one.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        let path = self.dir.join(LATEST_EPOCH_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str::<usize>(&s)?))
    }
}

fn model_name(epoch: usize) -> String {
    format!("model_epoch_{epoch}")
}

fn optim_name(epoch: usize) -> String {
    format!("optim_epoch_{epoch}")
}

fn score_name(name: &str) -> String {
    format!("{name}.json")
}

fn record<B: Backend, R: burn::record::Record<B>>(item: R, path: &Path) -> Result<()> {
    Recorder::<B>::record(&CompactRecorder::new(), item, path.to_path_buf())
        .map_err(|err| OutfitError::Checkpoint {
            path:    path.to_path_buf(),
            message: format!("{err:?}"),
        })
}

fn load<B: Backend, R: burn::record::Record<B>>(path: &Path, device: &B::Device) -> Result<R> {
    Recorder::<B>::load(&CompactRecorder::new(), path.to_path_buf(), device)
        .map_err(|err| OutfitError::Checkpoint {
            path:    path.to_path_buf(),
            message: format!("{err:?}"),
        })
}
