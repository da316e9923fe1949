// ============================================================
// Layer 4 — Sequence Padder / Mask Builder
// ============================================================
// Outfits have different numbers of items, but a batch tensor
// needs one sequence length. The padder picks that length,
// truncates long outfits, right-pads short ones with a fill
// value and records which slots are padding.
//
// One padder serves every element kind (raw images, texts,
// precomputed embedding rows). Only the fill value differs:
//   images     → blank image of the encoder's input size
//   texts      → empty string
//   embeddings → the model's learned pad embedding
//
// Mask convention: true = padding (excluded from attention),
// false = real item. This is the convention burn's key padding
// mask uses as well, so rows go to the model unchanged.
//
// Truncation keeps the leading items and drops the trailing
// ones. It never errors; the only failure is an over-length
// outfit when truncation is disabled.

use serde::{Deserialize, Serialize};

use crate::error::{OutfitError, Result};
use crate::ml::config::OutfitConfig;

/// How the batch sequence length is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Always pad (or truncate) to max_length
    Fixed,
    /// Pad to the longest outfit in the batch
    Longest,
}

/// Output of [`SequencePadder::pad`]: every row has exactly
/// `target_length` elements and a mask row of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedSequences<T> {
    pub sequences:     Vec<Vec<T>>,
    pub mask:          Vec<Vec<bool>>,
    pub target_length: usize,
}

impl<T> PaddedSequences<T> {
    pub fn batch_size(&self) -> usize {
        self.sequences.len()
    }

    /// Row-major flattening of the mask, ready for a [B, L] bool tensor.
    pub fn flat_mask(&self) -> Vec<bool> {
        self.mask.iter().flatten().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePadder {
    pub max_length: usize,
    pub policy:     PaddingPolicy,
    pub truncation: bool,
}

impl SequencePadder {
    pub fn new(max_length: usize, policy: PaddingPolicy, truncation: bool) -> Self {
        Self { max_length, policy, truncation }
    }

    pub fn from_config(cfg: &OutfitConfig) -> Self {
        Self::new(cfg.max_length, cfg.padding, cfg.truncation)
    }

    /// Reject any sequence that would overflow max_length without truncation.
    ///
    /// Datasets call this up front so that batching later cannot fail.
    pub fn check_lengths(&self, lengths: impl IntoIterator<Item = usize>) -> Result<()> {
        if self.truncation {
            return Ok(());
        }
        for (index, length) in lengths.into_iter().enumerate() {
            if length > self.max_length {
                return Err(OutfitError::InvalidPaddingConfig {
                    index,
                    length,
                    max_length: self.max_length,
                });
            }
        }
        Ok(())
    }

    /// Sequence length every row of this batch is padded to.
    pub fn target_length(&self, lengths: &[usize]) -> Result<usize> {
        self.check_lengths(lengths.iter().copied())?;
        let target = match self.policy {
            PaddingPolicy::Fixed   => self.max_length,
            PaddingPolicy::Longest => {
                let longest = lengths.iter().copied().max().unwrap_or(0);
                longest.min(self.max_length)
            }
        };
        Ok(target)
    }

    /// `min(length, target)` falses followed by trues up to `target`.
    pub fn mask_row(length: usize, target: usize) -> Vec<bool> {
        let real = length.min(target);
        let mut row = vec![false; real];
        row.resize(target, true);
        row
    }

    /// Truncate and right-pad every sequence with `fill`.
    pub fn pad<T: Clone>(&self, sequences: &[Vec<T>], fill: &T) -> Result<PaddedSequences<T>> {
        let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
        let target_length = self.target_length(&lengths)?;

        let mut padded = Vec::with_capacity(sequences.len());
        let mut mask   = Vec::with_capacity(sequences.len());
        for seq in sequences {
            let real = seq.len().min(target_length);
            let mut row: Vec<T> = seq[..real].to_vec();
            row.resize(target_length, fill.clone());
            padded.push(row);
            mask.push(Self::mask_row(seq.len(), target_length));
        }

        Ok(PaddedSequences { sequences: padded, mask, target_length })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_real_then_padding() {
        // k = 3 real items, max_length = 5 → [F, F, F, T, T]
        let padder = SequencePadder::new(5, PaddingPolicy::Fixed, true);
        let out = padder.pad(&[vec![1, 2, 3]], &0).unwrap();
        assert_eq!(out.mask[0], vec![false, false, false, true, true]);
        assert_eq!(out.sequences[0], vec![1, 2, 3, 0, 0]);
        assert_eq!(out.target_length, 5);
    }

    #[test]
    fn test_truncation_keeps_leading_items() {
        let padder = SequencePadder::new(3, PaddingPolicy::Fixed, true);
        let out = padder.pad(&[vec!["a", "b", "c", "d", "e"]], &"").unwrap();
        assert_eq!(out.sequences[0], vec!["a", "b", "c"]);
        assert_eq!(out.mask[0], vec![false; 3]);
    }

    #[test]
    fn test_longest_pads_to_batch_maximum() {
        let padder = SequencePadder::new(8, PaddingPolicy::Longest, true);
        let out = padder.pad(&[vec![1.0], vec![1.0, 2.0, 3.0]], &-1.0).unwrap();
        assert_eq!(out.target_length, 3);
        assert_eq!(out.sequences[0], vec![1.0, -1.0, -1.0]);
        assert_eq!(out.mask[0], vec![false, true, true]);
        assert_eq!(out.mask[1], vec![false, false, false]);
    }

    #[test]
    fn test_longest_is_capped_by_truncation() {
        let padder = SequencePadder::new(2, PaddingPolicy::Longest, true);
        let out = padder.pad(&[vec![1, 2, 3, 4], vec![9]], &0).unwrap();
        assert_eq!(out.target_length, 2);
        assert_eq!(out.sequences, vec![vec![1, 2], vec![9, 0]]);
    }

    #[test]
    fn test_fixed_without_truncation_rejects_long_outfit() {
        let padder = SequencePadder::new(2, PaddingPolicy::Fixed, false);
        let err = padder.pad(&[vec![1], vec![1, 2, 3]], &0).unwrap_err();
        match err {
            OutfitError::InvalidPaddingConfig { index, length, max_length } => {
                assert_eq!((index, length, max_length), (1, 3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fixed_without_truncation_accepts_fitting_outfits() {
        let padder = SequencePadder::new(4, PaddingPolicy::Fixed, false);
        let out = padder.pad(&[vec![1, 2, 3, 4]], &0).unwrap();
        assert_eq!(out.target_length, 4);
        assert_eq!(out.flat_mask(), vec![false; 4]);
    }

    #[test]
    fn test_empty_outfit_is_all_padding() {
        let padder = SequencePadder::new(3, PaddingPolicy::Fixed, true);
        let out = padder.pad(&[Vec::<u8>::new()], &7).unwrap();
        assert_eq!(out.sequences[0], vec![7, 7, 7]);
        assert_eq!(out.mask[0], vec![true; 3]);
    }
}
