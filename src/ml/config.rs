// ============================================================
// Layer 5 — Model Configuration
// ============================================================
// Hyperparameters for the outfit model. Both structs use Burn's
// Config derive, so they serialise to JSON for the checkpoint
// directory and get `with_*` builders for every defaulted field.
//
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::padding::PaddingPolicy;
use crate::error::OutfitError;

/// Feed-forward activation inside each encoder block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Gelu,
}

/// Self-attention stack over [pooling position + outfit items].
#[derive(Config, Debug)]
pub struct OutfitTransformerConfig {
    #[config(default = 8)]
    pub n_heads:    usize,
    #[config(default = 6)]
    pub n_layers:   usize,
    #[config(default = 2048)]
    pub d_ffn:      usize,
    #[config(default = 0.1)]
    pub dropout:    f64,
    /// LayerNorm before attention/FFN (pre-norm) instead of after
    #[config(default = true)]
    pub norm_first: bool,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    /// Tensors are [batch, seq, dim]. Sequence-major layout is not supported.
    #[config(default = true)]
    pub batch_first: bool,
}

#[derive(Config, Debug)]
pub struct OutfitConfig {
    /// Item embedding width D produced by the item encoder
    pub d_embed:   usize,
    /// Width of the catalog embedding space the CIR head projects into.
    /// 0 means "same as d_embed".
    pub d_catalog: usize,
    #[config(default = 16)]
    pub max_length: usize,
    #[config(default = "PaddingPolicy::Longest")]
    pub padding:    PaddingPolicy,
    #[config(default = true)]
    pub truncation: bool,
    #[config(default = "OutfitTransformerConfig::new()")]
    pub transformer: OutfitTransformerConfig,
}

impl OutfitConfig {
    /// Width of the learned target-image placeholder and of the
    /// caller-supplied target text embedding (D/2 each).
    pub fn d_half(&self) -> usize {
        self.d_embed / 2
    }

    /// CIR output width with the 0 default resolved.
    pub fn catalog_width(&self) -> usize {
        if self.d_catalog == 0 { self.d_embed } else { self.d_catalog }
    }

    /// Check every constraint the model relies on before building it.
    pub fn validate(&self) -> crate::error::Result<()> {
        let t = &self.transformer;
        if self.d_embed == 0 || self.d_embed % 2 != 0 {
            return Err(OutfitError::InvalidConfig(format!(
                "d_embed must be a positive even number, got {}",
                self.d_embed
            )));
        }
        if t.n_heads == 0 || self.d_embed % t.n_heads != 0 {
            return Err(OutfitError::InvalidConfig(format!(
                "d_embed={} is not divisible by n_heads={}",
                self.d_embed, t.n_heads
            )));
        }
        if t.n_layers == 0 {
            return Err(OutfitError::InvalidConfig("n_layers must be at least 1".into()));
        }
        if self.max_length == 0 {
            return Err(OutfitError::InvalidConfig("max_length must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&t.dropout) {
            return Err(OutfitError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                t.dropout
            )));
        }
        if !t.batch_first {
            return Err(OutfitError::InvalidConfig(
                "batch_first=false is not supported; inputs are [batch, seq, dim]".into(),
            ));
        }
        Ok(())
    }
}
