// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between cached item embeddings and model-ready
// tensor batches:
//
//   shard files / catalog
//       │
//       ▼
//   CompatibilityRecord / FitbQuestion → resolved against the catalog
//       │
//       ▼
//   CompatibilityDataset  → implements Burn's Dataset trait
//       │
//       ▼
//   SequencePadder        → picks L, pads, builds the padding mask
//       │
//       ▼
//   OutfitBatcher         → stacks samples into [B, L, D] + [B, L]
//       │
//       ▼
//   DataLoader            → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Variable-length padding and mask construction
pub mod padding;

/// Dataset types for compatibility and fill-in-the-blank
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;
