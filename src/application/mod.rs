// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal per
// command: merging the embedding cache, evaluating
// fill-in-the-blank, or training the compatibility head.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination and run validation
//
// Reference: Clean Architecture pattern

/// Run-level configuration and its validation
pub mod run_config;

/// Merge per-rank embedding shards
pub mod merge_cache_use_case;

/// Fill-in-the-blank evaluation workflow
pub mod fitb_use_case;

/// Compatibility training workflow
pub mod train_cp_use_case;
