// ============================================================
// Layer 5 — Outfit Model (Burn)
// ============================================================
// The multi-task model: one shared OutfitEncoder and two heads.
//
//   CP  (compatibility prediction)
//       pooling vector = learned outfit_token            [D]
//       head           = dropout → Linear(D, 1)          raw logit
//
//   CIR (complementary item retrieval)
//       pooling vector = [learned image placeholder (D/2),
//                         caller text embedding     (D/2)]
//       head           = Linear(D, d_catalog, no bias)
//
// The learned vectors are parameters of this module. They are
// only changed by optimiser steps; forward passes borrow &self.
//
// Reference: Burn Book §3 (Building Blocks)

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::Distribution,
};

use crate::data::batcher::OutfitBatch;
use crate::error::{OutfitError, Result};
use crate::ml::config::OutfitConfig;
use crate::ml::encoder::OutfitEncoder;

const PLACEHOLDER_INIT_STD: f64 = 0.02;

impl OutfitConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<OutfitModel<B>> {
        self.validate()?;
        let t = &self.transformer;

        let encoder = t.init(self.d_embed, device);
        let learned = |d: usize| {
            Param::from_tensor(Tensor::<B, 1>::random(
                [d],
                Distribution::Normal(0.0, PLACEHOLDER_INIT_STD),
                device,
            ))
        };
        let outfit_token                  = learned(self.d_embed);
        let target_item_image_placeholder = learned(self.d_half());
        let pad_embedding                 = learned(self.d_embed);

        let cp_dropout = DropoutConfig::new(t.dropout).init();
        let cp_head    = LinearConfig::new(self.d_embed, 1).init(device);
        let d_catalog  = self.catalog_width();
        let cir_head   = LinearConfig::new(self.d_embed, d_catalog)
            .with_bias(false)
            .init(device);

        tracing::debug!(
            "Outfit model: d_embed={}, d_catalog={}, {} layers x {} heads",
            self.d_embed, d_catalog, t.n_layers, t.n_heads
        );

        Ok(OutfitModel {
            encoder,
            outfit_token,
            target_item_image_placeholder,
            pad_embedding,
            cp_dropout,
            cp_head,
            cir_head,
            d_embed:    self.d_embed,
            d_catalog,
            max_length: self.max_length,
        })
    }
}

#[derive(Module, Debug)]
pub struct OutfitModel<B: Backend> {
    encoder:                       OutfitEncoder<B>,
    outfit_token:                  Param<Tensor<B, 1>>,
    target_item_image_placeholder: Param<Tensor<B, 1>>,
    pad_embedding:                 Param<Tensor<B, 1>>,
    cp_dropout:                    Dropout,
    cp_head:                       Linear<B>,
    cir_head:                      Linear<B>,
    d_embed:                       usize,
    d_catalog:                     usize,
    max_length:                    usize,
}

impl<B: Backend> OutfitModel<B> {
    pub fn d_embed(&self) -> usize { self.d_embed }

    pub fn d_catalog(&self) -> usize { self.d_catalog }

    pub fn max_length(&self) -> usize { self.max_length }

    pub fn encoder(&self) -> &OutfitEncoder<B> { &self.encoder }

    /// The learned CP pooling token [D].
    pub fn outfit_token(&self) -> Tensor<B, 1> {
        self.outfit_token.val()
    }

    /// The learned image half of the CIR target placeholder [D/2].
    pub fn target_item_image_placeholder(&self) -> Tensor<B, 1> {
        self.target_item_image_placeholder.val()
    }

    /// The learned fill value for padded embedding slots, as host values.
    pub fn pad_embedding_values(&self) -> Result<Vec<f32>> {
        tensor_to_vec(self.pad_embedding.val())
    }

    /// Compatibility logits [B, 1]. No sigmoid is applied.
    pub fn cp_forward(&self, batch: &OutfitBatch<B>) -> Result<Tensor<B, 2>> {
        self.check_batch(batch)?;
        let batch_size = batch.batch_size();

        let pooling = self
            .outfit_token
            .val()
            .unsqueeze::<2>()
            .expand([batch_size, self.d_embed]);
        let state = self
            .encoder
            .forward(pooling, batch.embeddings.clone(), batch.mask.clone())?;

        Ok(self.cp_head.forward(self.cp_dropout.forward(state)))
    }

    /// Predicted target-item embeddings [B, d_catalog].
    ///
    /// `text_embedding` is the description of the missing item, [B, D/2].
    pub fn cir_forward(&self, batch: &OutfitBatch<B>, text_embedding: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        self.check_batch(batch)?;
        let batch_size = batch.batch_size();
        let d_half     = self.d_embed / 2;
        if text_embedding.dims() != [batch_size, d_half] {
            return Err(OutfitError::shape(
                "target text embedding",
                format!("{:?}", [batch_size, d_half]),
                format!("{:?}", text_embedding.dims()),
            ));
        }

        let image_half = self
            .target_item_image_placeholder
            .val()
            .unsqueeze::<2>()
            .expand([batch_size, d_half]);
        let placeholder = Tensor::cat(vec![image_half, text_embedding], 1);
        let state = self
            .encoder
            .forward(placeholder, batch.embeddings.clone(), batch.mask.clone())?;

        Ok(self.cir_head.forward(state))
    }

    fn check_batch(&self, batch: &OutfitBatch<B>) -> Result<()> {
        if batch.d_embed() != self.d_embed {
            return Err(OutfitError::shape("item embedding width", self.d_embed, batch.d_embed()));
        }
        if batch.seq_len() > self.max_length {
            return Err(OutfitError::shape(
                "outfit length",
                format!("<= {}", self.max_length),
                batch.seq_len(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| OutfitError::MalformedInput(format!("tensor readback: {err:?}")))
}
