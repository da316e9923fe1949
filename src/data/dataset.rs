// ============================================================
// Layer 4 — Datasets
// ============================================================
// On-disk records name items by catalog id. Resolving them
// against the embedding cache gives samples of precomputed
// item embeddings:
//
//   CompatibilityRecord → CompatibilitySample  (CP training)
//   FitbQuestion        → FitbSample           (FITB evaluation)
//
// CompatibilityDataset checks every sample against the padder
// and embedding width when it is built, so the batcher never
// sees an outfit it cannot pad.
//
// Reference: Burn Book §4 (Dataset)

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::padding::SequencePadder;
use crate::domain::traits::EmbeddingLookup;
use crate::error::{OutfitError, Result};

// ─── Compatibility ────────────────────────────────────────────────────────────

/// Outfit as catalog ids plus a compatibility label, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityRecord {
    pub item_ids: Vec<String>,
    pub label:    u8,
}

/// One outfit of precomputed item embeddings with its label (1 = compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilitySample {
    pub embeddings: Vec<Vec<f32>>,
    pub label:      u8,
}

impl CompatibilitySample {
    pub fn new(embeddings: Vec<Vec<f32>>, label: u8) -> Self {
        Self { embeddings, label }
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

impl CompatibilityRecord {
    pub fn resolve(&self, catalog: &impl EmbeddingLookup) -> Result<CompatibilitySample> {
        let embeddings = catalog
            .resolve_all(&self.item_ids)
            .map_err(|id| OutfitError::MalformedInput(format!("item '{id}' is not in the catalog")))?;
        Ok(CompatibilitySample::new(embeddings, self.label))
    }
}

pub struct CompatibilityDataset {
    samples: Vec<CompatibilitySample>,
}

impl CompatibilityDataset {
    /// Build a dataset whose samples are all batchable with `padder`
    /// at embedding width `d_embed`.
    pub fn new(samples: Vec<CompatibilitySample>, padder: &SequencePadder, d_embed: usize) -> Result<Self> {
        padder.check_lengths(samples.iter().map(CompatibilitySample::len))?;
        for sample in &samples {
            if let Some(row) = sample.embeddings.iter().find(|row| row.len() != d_embed) {
                return Err(OutfitError::shape("item embedding width", d_embed, row.len()));
            }
            if sample.label > 1 {
                return Err(OutfitError::MalformedInput(format!(
                    "compatibility label must be 0 or 1, got {}",
                    sample.label
                )));
            }
        }
        Ok(Self { samples })
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }
}

impl Dataset<CompatibilitySample> for CompatibilityDataset {
    fn get(&self, index: usize) -> Option<CompatibilitySample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Fill in the blank ────────────────────────────────────────────────────────

/// A fill-in-the-blank question as stored on disk: the partial outfit,
/// the description embedding of the blank (D/2), the candidate ids and
/// the index of the right answer among them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitbQuestion {
    pub outfit_ids:            Vec<String>,
    pub target_text_embedding: Vec<f32>,
    pub candidate_ids:         Vec<String>,
    pub answer_index:          usize,
}

/// A question with every id replaced by its cached embedding.
#[derive(Debug, Clone)]
pub struct FitbSample {
    pub outfit:         Vec<Vec<f32>>,
    pub text_embedding: Vec<f32>,
    pub candidates:     Vec<Vec<f32>>,
    pub answer_index:   usize,
}

impl FitbQuestion {
    pub fn resolve(&self, catalog: &impl EmbeddingLookup) -> Result<FitbSample> {
        let missing = |id: String| OutfitError::MalformedInput(format!("item '{id}' is not in the catalog"));
        if self.answer_index >= self.candidate_ids.len() {
            return Err(OutfitError::MalformedInput(format!(
                "answer_index {} out of range for {} candidates",
                self.answer_index,
                self.candidate_ids.len()
            )));
        }
        Ok(FitbSample {
            outfit:         catalog.resolve_all(&self.outfit_ids).map_err(missing)?,
            text_embedding: self.target_text_embedding.clone(),
            candidates:     catalog.resolve_all(&self.candidate_ids).map_err(missing)?,
            answer_index:   self.answer_index,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::padding::PaddingPolicy;
    use std::collections::HashMap;

    fn catalog() -> HashMap<String, Vec<f32>> {
        let mut c = HashMap::new();
        c.insert("shirt".to_string(), vec![1.0, 0.0]);
        c.insert("pants".to_string(), vec![0.0, 1.0]);
        c
    }

    #[test]
    fn test_dataset_rejects_over_length_outfits() {
        let padder = SequencePadder::new(1, PaddingPolicy::Fixed, false);
        let samples = vec![CompatibilitySample::new(vec![vec![0.0; 2]; 2], 1)];
        let err = CompatibilityDataset::new(samples, &padder, 2).err().unwrap();
        assert!(matches!(err, OutfitError::InvalidPaddingConfig { .. }));
    }

    #[test]
    fn test_dataset_rejects_wrong_width() {
        let padder = SequencePadder::new(4, PaddingPolicy::Longest, true);
        let samples = vec![CompatibilitySample::new(vec![vec![0.0; 3]], 0)];
        let err = CompatibilityDataset::new(samples, &padder, 2).err().unwrap();
        assert!(matches!(err, OutfitError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_record_resolves_against_catalog() {
        let record = CompatibilityRecord {
            item_ids: vec!["shirt".into(), "pants".into()],
            label:    1,
        };
        let sample = record.resolve(&catalog()).unwrap();
        assert_eq!(sample.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(sample.label, 1);
    }

    #[test]
    fn test_fitb_answer_index_must_be_in_range() {
        let q = FitbQuestion {
            outfit_ids:            vec!["shirt".into()],
            target_text_embedding: vec![0.0],
            candidate_ids:         vec!["pants".into()],
            answer_index:          1,
        };
        assert!(matches!(q.resolve(&catalog()), Err(OutfitError::MalformedInput(_))));
    }
}
