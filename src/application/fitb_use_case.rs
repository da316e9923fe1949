// ============================================================
// Layer 2 — FitbUseCase
// ============================================================
// Fill-in-the-blank evaluation end to end:
//
//   Step 1: Validate the run           (single worker only)
//   Step 2: Load the embedding cache   (background thread)
//   Step 3: Rebuild the model and load weights-only checkpoint
//   Step 4: Resolve questions against the cache
//   Step 5: Rank candidates and report accuracy

use std::{fs, path::PathBuf, thread};
use anyhow::{anyhow, Context, Result};
use burn::prelude::*;

use crate::application::run_config::{RunConfig, RunMode};
use crate::data::dataset::{FitbQuestion, FitbSample};
use crate::data::padding::SequencePadder;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::embedding_cache::EmbeddingCache;
use crate::ml::config::OutfitConfig;
use crate::ml::dispatcher::TaskDispatcher;
use crate::ml::evaluator::{evaluate_fill_in_the_blank, FillInTheBlankEvaluator};
use crate::ml::item_encoder::PrecomputedOnly;
use crate::ml::model::OutfitModel;

pub struct FitbUseCase {
    config:    RunConfig,
    questions: PathBuf,
    weights:   String,
}

impl FitbUseCase {
    pub fn new(config: RunConfig, questions: impl Into<PathBuf>, weights: impl Into<String>) -> Self {
        Self { config, questions: questions.into(), weights: weights.into() }
    }

    pub fn execute<B: Backend>(&self, device: &B::Device) -> Result<FillInTheBlankEvaluator> {
        let cfg = &self.config;
        if cfg.mode != RunMode::Test {
            return Err(anyhow!("fill-in-the-blank is an evaluation run, set mode to test"));
        }
        cfg.validate()?;

        // ── Steps 2 + 3: cache and checkpoint load concurrently ───────────────
        let (cache, (model_cfg, model)) = thread::scope(|s| {
            let cache = s.spawn(|| EmbeddingCache::load(&cfg.cache_dir, &cfg.cache_prefix));
            let model = self.load_model::<B>(device);
            let cache = cache
                .join()
                .map_err(|_| anyhow!("embedding cache loader panicked"))?
                .with_context(|| format!("Cannot load embedding cache from '{}'", cfg.cache_dir.display()))?;
            Ok::<_, anyhow::Error>((cache, model?))
        })?;

        // ── Step 4: resolve questions ─────────────────────────────────────────
        let json = fs::read_to_string(&self.questions)
            .with_context(|| format!("Cannot read questions from '{}'", self.questions.display()))?;
        let questions: Vec<FitbQuestion> = serde_json::from_str(&json)?;
        let samples = questions
            .iter()
            .map(|q| q.resolve(&cache))
            .collect::<crate::error::Result<Vec<FitbSample>>>()?;
        tracing::info!("Resolved {} fill-in-the-blank questions", samples.len());

        // ── Step 5: evaluate ──────────────────────────────────────────────────
        // Questions arrive as cached embeddings; no item encoder is loaded.
        let item_encoder = PrecomputedOnly::new(model.d_embed());
        let padder       = SequencePadder::from_config(&model_cfg);
        let dispatcher   = TaskDispatcher::new(&model, &item_encoder, padder)?;

        Ok(evaluate_fill_in_the_blank(&dispatcher, &samples, cfg.batch_size, device)?)
    }

    /// The saved config is returned too: it carries the padding rules.
    fn load_model<B: Backend>(&self, device: &B::Device) -> Result<(OutfitConfig, OutfitModel<B>)> {
        let ckpt      = CheckpointManager::new(&self.config.checkpoint_dir)?;
        let model_cfg = ckpt
            .load_config()
            .context("Cannot rebuild the model. Have you run 'train-cp' first?")?;
        let model = model_cfg.init::<B>(device)?;
        let model = ckpt.restore_weights(model, self.config.checkpoint_mode, &self.weights, device)?;
        Ok((model_cfg, model))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::OutfitBatch;
    use crate::data::padding::PaddingPolicy;
    use crate::error::OutfitError;
    use crate::infra::embedding_cache::{write_shard, EmbeddingShard};
    use crate::ml::config::OutfitTransformerConfig;
    use crate::ml::model::tensor_to_vec;
    use burn::backend::NdArray;

    const TOP:   [f32; 4] = [0.1, 0.2, 0.3, 0.4];
    const SKIRT: [f32; 4] = [0.4, 0.3, 0.2, 0.1];
    const TEXT:  [f32; 2] = [0.0, 1.0];

    fn small_config() -> OutfitConfig {
        OutfitConfig::new(4, 4).with_transformer(
            OutfitTransformerConfig::new().with_n_heads(2).with_n_layers(1).with_d_ffn(8),
        )
    }

    /// Save `model_cfg` with fresh weights and return the CIR prediction
    /// for the [top, skirt] outfit.
    fn save_model(root: &std::path::Path, model_cfg: &OutfitConfig) -> Vec<f32> {
        let device = Default::default();
        let model  = model_cfg.init::<NdArray>(&device).unwrap();
        let ckpt   = CheckpointManager::new(root.join("ckpt")).unwrap();
        ckpt.save_config(model_cfg).unwrap();
        ckpt.save_weights(&model, "best_auc").unwrap();

        let pad   = model.pad_embedding_values().unwrap();
        let batch = OutfitBatch::<NdArray>::from_embeddings(
            &[vec![TOP.to_vec(), SKIRT.to_vec()]],
            &SequencePadder::from_config(model_cfg),
            &pad,
            &device,
        )
        .unwrap();
        let text = Tensor::<NdArray, 2>::from_data(TensorData::new(TEXT.to_vec(), [1, 2]), &device);
        tensor_to_vec(model.cir_forward(&batch, text).unwrap()).unwrap()
    }

    fn write_questions(root: &std::path::Path, questions: &[FitbQuestion]) -> PathBuf {
        let path = root.join("fitb.json");
        fs::write(&path, serde_json::to_string(questions).unwrap()).unwrap();
        path
    }

    fn question(outfit: &[&str], candidates: &[&str], answer_index: usize) -> FitbQuestion {
        FitbQuestion {
            outfit_ids:            outfit.iter().map(|s| s.to_string()).collect(),
            target_text_embedding: TEXT.to_vec(),
            candidate_ids:         candidates.iter().map(|s| s.to_string()).collect(),
            answer_index,
        }
    }

    fn run_config(root: &std::path::Path, batch_size: usize) -> RunConfig {
        RunConfig {
            checkpoint_dir: root.join("ckpt"),
            cache_dir:      root.join("cache"),
            cache_prefix:   "emb_".into(),
            batch_size,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_accuracy_counts_nearest_candidate_answers() {
        let root      = tempfile::tempdir().unwrap();
        let predicted = save_model(root.path(), &small_config());
        let far: Vec<f32> = predicted.iter().map(|v| v + 10.0).collect();

        let shard = EmbeddingShard {
            ids:        vec!["top".into(), "skirt".into(), "match".into(), "far".into()],
            embeddings: vec![TOP.to_vec(), SKIRT.to_vec(), predicted, far],
        };
        write_shard(&root.path().join("cache"), "emb_", 0, &shard).unwrap();

        // "match" is always nearest; two of the three questions expect it
        let questions = write_questions(root.path(), &[
            question(&["top", "skirt"], &["match", "far"], 0),
            question(&["top", "skirt"], &["far", "match"], 0),
            question(&["top", "skirt"], &["far", "match"], 1),
        ]);

        for batch_size in [1, 3] {
            let eval = FitbUseCase::new(run_config(root.path(), batch_size), &questions, "best_auc")
                .execute::<NdArray>(&Default::default())
                .unwrap();
            assert_eq!(eval.total, 3);
            assert_eq!(eval.correct, 2);
        }
    }

    #[test]
    fn test_saved_padding_rules_apply_to_questions() {
        let root      = tempfile::tempdir().unwrap();
        let model_cfg = small_config()
            .with_max_length(2)
            .with_padding(PaddingPolicy::Fixed)
            .with_truncation(false);
        save_model(root.path(), &model_cfg);

        let shard = EmbeddingShard {
            ids:        vec!["top".into(), "skirt".into(), "shoe".into(), "bag".into()],
            embeddings: vec![TOP.to_vec(), SKIRT.to_vec(), vec![0.0; 4], vec![1.0; 4]],
        };
        write_shard(&root.path().join("cache"), "emb_", 0, &shard).unwrap();
        let questions = write_questions(root.path(), &[question(&["top", "skirt", "shoe"], &["bag"], 0)]);

        let err = FitbUseCase::new(run_config(root.path(), 1), &questions, "best_auc")
            .execute::<NdArray>(&Default::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OutfitError>(),
            Some(OutfitError::InvalidPaddingConfig { length: 3, max_length: 2, .. })
        ));
    }

    #[test]
    fn test_multi_worker_evaluation_is_rejected() {
        let cfg = RunConfig { world_size: 8, ..RunConfig::default() };
        let err = FitbUseCase::new(cfg, "unused.json", "best_auc")
            .execute::<NdArray>(&Default::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OutfitError>(),
            Some(OutfitError::UnsupportedConcurrencyMode { world_size: 8 })
        ));
    }
}
