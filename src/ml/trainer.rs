// ============================================================
// Layer 5 — Compatibility Training Loop
// ============================================================
// Train + validation loop for the CP head using Burn's
// DataLoader and Adam, in a single process.
//
//   - Training runs on an AutodiffBackend B
//   - model.valid() returns the model on B::InnerBackend, where
//     dropout is a no-op, and validation batches live there too
//   - Loss is binary cross-entropy on raw logits
//   - Validation reports mean loss and ROC-AUC of the logits
//
// Every epoch writes a full checkpoint (model + Adam state) so a
// run can resume, and the best-AUC weights are kept separately
// for evaluation.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::{
    batcher::OutfitBatcher,
    dataset::CompatibilityDataset,
    padding::SequencePadder,
};
use crate::error::OutfitError;
use crate::infra::checkpoint::{BestScore, CheckpointManager};
use crate::infra::metrics::{roc_auc, EpochMetrics, MetricsLogger};
use crate::ml::config::OutfitConfig;
use crate::ml::model::{tensor_to_vec, OutfitModel};

pub const BEST_WEIGHTS: &str = "best_auc";

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 32)]
    pub batch_size:    usize,
    #[config(default = 10)]
    pub epochs:        usize,
    #[config(default = 1e-4)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed:          u64,
    /// Continue from the latest full checkpoint if there is one
    #[config(default = false)]
    pub resume:        bool,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_auc:   Option<f64>,
    pub last:       Option<EpochMetrics>,
}

pub fn train_compatibility<B: AutodiffBackend>(
    model_cfg:   &OutfitConfig,
    cfg:         &TrainingConfig,
    train:       CompatibilityDataset,
    valid:       CompatibilityDataset,
    checkpoints: &CheckpointManager,
    metrics:     &MetricsLogger,
    device:      &B::Device,
) -> crate::error::Result<TrainingSummary> {
    if cfg.batch_size == 0 {
        return Err(OutfitError::InvalidConfig("batch_size must be at least 1".into()));
    }

    // ── Build model + Adam ────────────────────────────────────────────────────
    let mut model: OutfitModel<B> = model_cfg.init(device)?;
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init::<B, OutfitModel<B>>();

    let mut start_epoch = 1;
    let mut best: Option<BestScore> = None;
    if cfg.resume && checkpoints.latest_epoch()?.is_some() {
        let (m, o, epoch) = checkpoints.resume(model, optim, device)?;
        model       = m;
        optim       = o;
        start_epoch = epoch + 1;
        // The first resumed epoch has to beat the pre-resume best
        best        = checkpoints.best_score(BEST_WEIGHTS)?;
    }
    tracing::info!(
        "Training CP head: {} train / {} valid outfits, epochs {}..={}",
        train.sample_count(), valid.sample_count(), start_epoch, cfg.epochs
    );

    // ── Data loaders ──────────────────────────────────────────────────────────
    // Padded slots are masked out of attention, so the pad value
    // captured here never influences the loss.
    let padder    = SequencePadder::from_config(model_cfg);
    let pad_value = model.pad_embedding_values()?;

    let train_loader = DataLoaderBuilder::new(OutfitBatcher::<B>::new(device.clone(), padder, pad_value.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train);
    let valid_loader = DataLoaderBuilder::new(OutfitBatcher::<B::InnerBackend>::new(device.clone(), padder, pad_value))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(valid);

    let bce       = BinaryCrossEntropyLossConfig::new().with_logits(true).init::<B>(device);
    let bce_valid = BinaryCrossEntropyLossConfig::new().with_logits(true).init::<B::InnerBackend>(device);

    let mut summary = TrainingSummary {
        epochs_run: 0,
        best_epoch: best.map(|b| b.epoch),
        best_auc:   best.map(|b| b.auc),
        last:       None,
    };
    let mut best_auc = best.map_or(f64::NEG_INFINITY, |b| b.auc);

    for epoch in start_epoch..=cfg.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let logits = model.cp_forward(&batch.outfits)?;
            let loss   = bce.forward(logits, batch.labels);

            train_loss_sum += loss.clone().into_scalar().elem::<f64>();
            train_batches  += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }
        let train_loss = mean(train_loss_sum, train_batches);

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_loss_sum = 0.0f64;
        let mut val_batches  = 0usize;
        let mut scores: Vec<f32> = Vec::new();
        let mut labels: Vec<u8>  = Vec::new();

        for batch in valid_loader.iter() {
            let logits = model_valid.cp_forward(&batch.outfits)?;
            val_loss_sum += bce_valid
                .forward(logits.clone(), batch.labels.clone())
                .into_scalar()
                .elem::<f64>();
            val_batches += 1;

            scores.extend(tensor_to_vec(logits)?);
            let batch_labels = batch
                .labels
                .into_data()
                .convert::<i64>()
                .to_vec::<i64>()
                .map_err(|err| OutfitError::MalformedInput(format!("tensor readback: {err:?}")))?;
            labels.extend(batch_labels.into_iter().map(|l| u8::from(l == 1)));
        }

        let m = EpochMetrics::new(epoch, train_loss, mean(val_loss_sum, val_batches), roc_auc(&scores, &labels));
        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_auc={}",
            epoch, cfg.epochs, m.train_loss, m.val_loss,
            m.val_auc.map_or_else(|| "n/a".to_string(), |a| format!("{a:.4}")),
        );
        metrics.log(&m)?;

        checkpoints.save_state(&model, &optim, epoch)?;
        if let Some(auc) = m.val_auc.filter(|_| m.is_improvement(best_auc)) {
            best_auc = auc;
            checkpoints.save_best(&model, BEST_WEIGHTS, BestScore { epoch, auc })?;
            summary.best_epoch = Some(epoch);
            summary.best_auc   = m.val_auc;
            tracing::info!("New best val_auc at epoch {}", epoch);
        }

        summary.epochs_run += 1;
        summary.last = Some(m);
    }

    tracing::info!("Training complete");
    Ok(summary)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { f64::NAN }
}
