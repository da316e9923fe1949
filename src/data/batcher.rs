// ============================================================
// Layer 4 — Outfit Batcher
// ============================================================
// Turns variable-length outfits of precomputed item embeddings
// into the [B, L, D] embedding tensor + [B, L] padding mask the
// model consumes.
//
// How batching works here:
//   1. SequencePadder picks L and pads each outfit with the
//      model's learned pad embedding
//   2. Rows are flattened into one Vec<f32> and reshaped:
//      [o1_i1_d1, ..., o1_iL_dD, o2_i1_d1, ..., oB_iL_dD] → [B, L, D]
//   3. The mask is flattened the same way → [B, L]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::CompatibilitySample;
use crate::data::padding::SequencePadder;
use crate::error::{OutfitError, Result};

// ─── OutfitBatch ──────────────────────────────────────────────────────────────
/// Padded item embeddings and their padding mask.
#[derive(Debug, Clone)]
pub struct OutfitBatch<B: Backend> {
    /// [batch_size, seq_len, d_embed]
    pub embeddings: Tensor<B, 3>,

    /// [batch_size, seq_len] — true = padding, false = real item
    pub mask: Tensor<B, 2, Bool>,
}

impl<B: Backend> OutfitBatch<B> {
    pub fn new(embeddings: Tensor<B, 3>, mask: Tensor<B, 2, Bool>) -> Result<Self> {
        let [batch_size, seq_len, _] = embeddings.dims();
        if mask.dims() != [batch_size, seq_len] {
            return Err(OutfitError::shape(
                "padding mask",
                format!("{:?}", [batch_size, seq_len]),
                format!("{:?}", mask.dims()),
            ));
        }
        Ok(Self { embeddings, mask })
    }

    /// Pad precomputed outfits and upload them to `device`.
    ///
    /// Every item row must have the width of `pad_value`.
    pub fn from_embeddings(
        outfits:   &[Vec<Vec<f32>>],
        padder:    &SequencePadder,
        pad_value: &[f32],
        device:    &B::Device,
    ) -> Result<Self> {
        let d_embed = pad_value.len();
        for outfit in outfits {
            if let Some(row) = outfit.iter().find(|row| row.len() != d_embed) {
                return Err(OutfitError::shape("item embedding width", d_embed, row.len()));
            }
        }

        let padded = padder.pad(outfits, &pad_value.to_vec())?;
        let batch_size = padded.batch_size();
        let seq_len    = padded.target_length;

        let flat: Vec<f32> = padded
            .sequences
            .iter()
            .flat_map(|outfit| outfit.iter().flatten().copied())
            .collect();

        let embeddings = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, seq_len, d_embed]),
            device,
        );
        let mask = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(padded.flat_mask(), [batch_size, seq_len]),
            device,
        );
        Ok(Self { embeddings, mask })
    }

    pub fn batch_size(&self) -> usize {
        self.embeddings.dims()[0]
    }

    pub fn seq_len(&self) -> usize {
        self.embeddings.dims()[1]
    }

    pub fn d_embed(&self) -> usize {
        self.embeddings.dims()[2]
    }
}

// ─── CompatibilityBatch ───────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CompatibilityBatch<B: Backend> {
    pub outfits: OutfitBatch<B>,

    /// [batch_size, 1] — 1 = compatible outfit, 0 = incompatible
    pub labels: Tensor<B, 2, Int>,
}

// ─── OutfitBatcher ────────────────────────────────────────────────────────────
/// Holds the target device, the padder and the pad embedding
/// captured from the model when the batcher was built.
#[derive(Clone, Debug)]
pub struct OutfitBatcher<B: Backend> {
    pub device:    B::Device,
    pub padder:    SequencePadder,
    pub pad_value: Vec<f32>,
}

impl<B: Backend> OutfitBatcher<B> {
    pub fn new(device: B::Device, padder: SequencePadder, pad_value: Vec<f32>) -> Self {
        Self { device, padder, pad_value }
    }

    pub fn try_batch(&self, items: Vec<CompatibilitySample>) -> Result<CompatibilityBatch<B>> {
        let labels: Vec<i64> = items.iter().map(|s| i64::from(s.label)).collect();
        let outfits: Vec<Vec<Vec<f32>>> = items.into_iter().map(|s| s.embeddings).collect();

        let outfits = OutfitBatch::from_embeddings(&outfits, &self.padder, &self.pad_value, &self.device)?;
        let labels  = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels.clone(), [labels.len(), 1]),
            &self.device,
        );
        Ok(CompatibilityBatch { outfits, labels })
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// Burn's Batcher is infallible. CompatibilityDataset checks every
// outfit against the same padder and embedding width when it is
// built, so try_batch cannot fail for samples coming from it.
impl<B: Backend> Batcher<CompatibilitySample, CompatibilityBatch<B>> for OutfitBatcher<B> {
    fn batch(&self, items: Vec<CompatibilitySample>) -> CompatibilityBatch<B> {
        match self.try_batch(items) {
            Ok(batch) => batch,
            Err(err)  => panic!("compatibility batch rejected after dataset validation: {err}"),
        }
    }
}
