// ============================================================
// Layer 5 — Fill-in-the-Blank Evaluator
// ============================================================
// Fill-in-the-blank is CIR restricted to a handful of options:
// the model predicts the missing item's embedding, and the
// answer is the candidate whose cached embedding is closest to
// it in L2 distance (argmin over candidates).
//
//   predicted:  [B, D]
//   candidates: [B, C, D]
//   dists:      [B, C]  = Σ_d (candidates − predicted)²
//   answer:     [B]     = argmin_c dists
//
// Squared distance has the same argmin as distance, so no sqrt.

use burn::prelude::*;

use crate::data::batcher::OutfitBatch;
use crate::data::dataset::FitbSample;
use crate::error::{OutfitError, Result};
use crate::ml::dispatcher::{CirInput, OutfitTask, TaskDispatcher};
use crate::ml::item_encoder::ItemEncoder;

/// Index of the nearest candidate for every row.
pub fn rank_candidates<B: Backend>(predicted: Tensor<B, 2>, candidates: Tensor<B, 3>) -> Result<Vec<usize>> {
    let [batch_size, d] = predicted.dims();
    let [cand_batch, n_candidates, cand_d] = candidates.dims();
    if cand_batch != batch_size || cand_d != d {
        return Err(OutfitError::shape(
            "candidate embeddings",
            format!("[{batch_size}, C, {d}]"),
            format!("{:?}", candidates.dims()),
        ));
    }
    if n_candidates == 0 {
        return Err(OutfitError::MalformedInput("fill-in-the-blank needs at least one candidate".into()));
    }

    let dists = (candidates - predicted.unsqueeze_dim::<3>(1))
        .powf_scalar(2.0)
        .sum_dim(2)
        .reshape([batch_size, n_candidates]);
    let best = dists
        .argmin(1)
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|err| OutfitError::MalformedInput(format!("tensor readback: {err:?}")))?;

    Ok(best.into_iter().map(|i| i as usize).collect())
}

/// One batch of resolved fill-in-the-blank questions, on device.
pub struct FitbBatch<B: Backend> {
    pub input:      CirInput<B>,
    /// [B, C, D]
    pub candidates: Tensor<B, 3>,
    pub answers:    Vec<usize>,
}

impl<B: Backend> FitbBatch<B> {
    pub fn from_samples<E: ItemEncoder<B>>(
        samples:    &[FitbSample],
        dispatcher: &TaskDispatcher<'_, B, E>,
        device:     &B::Device,
    ) -> Result<Self> {
        let model     = dispatcher.model();
        let pad_value = model.pad_embedding_values()?;
        let d_half    = model.d_embed() / 2;
        let d_catalog = model.d_catalog();

        let n_candidates = samples.first().map(|s| s.candidates.len()).unwrap_or(0);
        for sample in samples {
            if sample.candidates.len() != n_candidates {
                return Err(OutfitError::shape("candidate count", n_candidates, sample.candidates.len()));
            }
            if sample.text_embedding.len() != d_half {
                return Err(OutfitError::shape("target text embedding", d_half, sample.text_embedding.len()));
            }
            if let Some(row) = sample.candidates.iter().find(|row| row.len() != d_catalog) {
                return Err(OutfitError::shape("candidate embedding width", d_catalog, row.len()));
            }
        }

        let outfits: Vec<Vec<Vec<f32>>> = samples.iter().map(|s| s.outfit.clone()).collect();
        let outfits = OutfitBatch::from_embeddings(&outfits, dispatcher.padder(), &pad_value, device)?;

        let batch_size = samples.len();
        let text: Vec<f32> = samples.iter().flat_map(|s| s.text_embedding.iter().copied()).collect();
        let text_embedding = Tensor::<B, 2>::from_data(TensorData::new(text, [batch_size, d_half]), device);

        let flat: Vec<f32> = samples
            .iter()
            .flat_map(|s| s.candidates.iter().flatten().copied())
            .collect();
        let candidates = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, n_candidates, d_catalog]),
            device,
        );

        Ok(Self {
            input: CirInput { outfits, text_embedding },
            candidates,
            answers: samples.iter().map(|s| s.answer_index).collect(),
        })
    }
}

/// Running accuracy over fill-in-the-blank batches.
#[derive(Debug, Clone, Default)]
pub struct FillInTheBlankEvaluator {
    pub total:   usize,
    pub correct: usize,
}

impl FillInTheBlankEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predict, rank and score one batch; returns the batch's correct count.
    pub fn update<B: Backend, E: ItemEncoder<B>>(
        &mut self,
        dispatcher: &TaskDispatcher<'_, B, E>,
        batch:      FitbBatch<B>,
    ) -> Result<usize> {
        let predicted = dispatcher
            .dispatch(OutfitTask::FillInTheBlank(batch.input))?
            .into_tensor();
        let picked  = rank_candidates(predicted, batch.candidates)?;
        let correct = picked.iter().zip(&batch.answers).filter(|(p, a)| p == a).count();
        self.total   += picked.len();
        self.correct += correct;
        Ok(correct)
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.correct as f64 / self.total as f64 }
    }
}

/// Evaluate every sample in chunks of `batch_size`.
pub fn evaluate_fill_in_the_blank<B: Backend, E: ItemEncoder<B>>(
    dispatcher: &TaskDispatcher<'_, B, E>,
    samples:    &[FitbSample],
    batch_size: usize,
    device:     &B::Device,
) -> Result<FillInTheBlankEvaluator> {
    let mut evaluator = FillInTheBlankEvaluator::new();
    for chunk in samples.chunks(batch_size.max(1)) {
        let batch = FitbBatch::from_samples(chunk, dispatcher, device)?;
        evaluator.update(dispatcher, batch)?;
    }
    tracing::info!(
        "Accuracy/test = {:.4} ({}/{})",
        evaluator.accuracy(), evaluator.correct, evaluator.total
    );
    Ok(evaluator)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::padding::{PaddingPolicy, SequencePadder};
    use crate::ml::config::{OutfitConfig, OutfitTransformerConfig};
    use crate::ml::item_encoder::PrecomputedOnly;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_rank_picks_nearest_candidate() {
        let device = Default::default();
        let predicted = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 1.0, -1.0, 0.0], [2, 2]),
            &device,
        );
        let candidates = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(
                vec![
                    5.0f32, 5.0, 0.9, 1.1, -3.0, 0.0, // row 0 → candidate 1
                    -1.1, 0.1, 0.0, 0.0, 4.0, 4.0,    // row 1 → candidate 0
                ],
                [2, 3, 2],
            ),
            &device,
        );
        assert_eq!(rank_candidates(predicted, candidates).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_rank_rejects_width_mismatch() {
        let device = Default::default();
        let predicted  = Tensor::<TestBackend, 2>::zeros([1, 2], &device);
        let candidates = Tensor::<TestBackend, 3>::zeros([1, 4, 3], &device);
        assert!(matches!(
            rank_candidates(predicted, candidates),
            Err(OutfitError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_evaluator_counts_every_question() {
        let device = Default::default();
        let model = OutfitConfig::new(4, 4)
            .with_transformer(OutfitTransformerConfig::new().with_n_heads(1).with_n_layers(1).with_d_ffn(8))
            .init::<TestBackend>(&device)
            .unwrap();
        let encoder = PrecomputedOnly::new(4);
        let dispatcher = TaskDispatcher::new(
            &model,
            &encoder,
            SequencePadder::new(16, PaddingPolicy::Longest, true),
        )
        .unwrap();

        let sample = |n_items: usize| FitbSample {
            outfit:         vec![vec![0.1, 0.2, 0.3, 0.4]; n_items],
            text_embedding: vec![0.0, 0.5],
            // A single candidate is always the nearest one
            candidates:     vec![vec![1.0, 0.0, 0.0, 0.0]],
            answer_index:   0,
        };
        let samples = vec![sample(1), sample(3), sample(2)];

        let eval = evaluate_fill_in_the_blank(&dispatcher, &samples, 2, &device).unwrap();
        assert_eq!(eval.total, 3);
        assert_eq!(eval.correct, 3);
        assert!((eval.accuracy() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ragged_candidate_sets_are_rejected() {
        let device = Default::default();
        let model = OutfitConfig::new(4, 4)
            .with_transformer(OutfitTransformerConfig::new().with_n_heads(1).with_n_layers(1).with_d_ffn(8))
            .init::<TestBackend>(&device)
            .unwrap();
        let encoder = PrecomputedOnly::new(4);
        let dispatcher = TaskDispatcher::new(
            &model,
            &encoder,
            SequencePadder::new(16, PaddingPolicy::Longest, true),
        )
        .unwrap();
        let a = FitbSample {
            outfit:         vec![vec![0.0; 4]],
            text_embedding: vec![0.0; 2],
            candidates:     vec![vec![0.0; 4]; 2],
            answer_index:   0,
        };
        let mut b = a.clone();
        b.candidates.push(vec![0.0; 4]);
        assert!(matches!(
            FitbBatch::from_samples(&[a, b], &dispatcher, &device),
            Err(OutfitError::ShapeMismatch { what: "candidate count", .. })
        ));
    }
}
