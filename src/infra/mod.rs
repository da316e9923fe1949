// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem:
//
//   checkpoint.rs      — Model weights, optimizer state and config
//                        via Burn's CompactRecorder and JSON.
//
//   embedding_cache.rs — Per-rank item embedding shards: writing
//                        them, merging them into one catalog and
//                        nearest-neighbour lookup over it.
//
//   metrics.rs         — Epoch metrics CSV and ROC-AUC.
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Sharded embedding cache
pub mod embedding_cache;

/// Training metrics CSV logger
pub mod metrics;
