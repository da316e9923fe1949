// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model code lives here:
//
//   config.rs       — Model and transformer hyperparameters
//
//   encoder.rs      — The shared outfit encoder
//                     • Pooling vector prepended at position 0
//                     • Multi-head self-attention with padding mask
//                     • Feed-forward networks (ReLU or GELU)
//                     • Pre- or post-norm residual blocks
//
//   model.rs        — OutfitModel: encoder + CP head + CIR head
//
//   item_encoder.rs — ItemEncoder trait and the in-crate
//                     image/text projection backbone
//
//   dispatcher.rs   — Routes a task to its forward path
//
//   evaluator.rs    — Fill-in-the-blank ranking and accuracy
//
//   trainer.rs      — CP training loop with checkpointing
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

pub mod config;

/// Transformer encoder over outfits
pub mod encoder;

pub mod model;

/// Item encoders that produce the per-item embeddings
pub mod item_encoder;

/// Task routing
pub mod dispatcher;

/// Fill-in-the-blank evaluation
pub mod evaluator;

/// Compatibility training loop with validation and checkpointing
pub mod trainer;
