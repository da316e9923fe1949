// ============================================================
// Layer 5 — Outfit Encoder (Burn)
// ============================================================
// A stack of self-attention blocks over
//
//   [pooling vector, item_1, item_2, ..., item_L]
//
// where the pooling vector is the outfit token (CP) or the
// per-example target placeholder (CIR). The pooling slot is
// never masked; padded item slots are excluded from attention
// through burn's key padding mask. The state at position 0 is
// the fixed-size summary of the whole outfit.
//
// No positional embedding: an outfit is
// a set, so the encoder only sees which slots are real.
//
// Reference: Vaswani et al. (2017) Attention Is All You Need
//            Xiong et al. (2020) On Layer Normalization in the Transformer

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Gelu,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        Relu,
    },
    prelude::*,
};

use crate::error::{OutfitError, Result};
use crate::ml::config::{Activation, OutfitTransformerConfig};

impl OutfitTransformerConfig {
    pub fn init<B: Backend>(&self, d_model: usize, device: &B::Device) -> OutfitEncoder<B> {
        let layers = (0..self.n_layers)
            .map(|_| self.build_encoder_block(d_model, device))
            .collect();
        OutfitEncoder { layers, d_model }
    }

    fn build_encoder_block<B: Backend>(&self, d_model: usize, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(d_model, self.n_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(d_model, self.d_ffn).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ffn, d_model).init(device);
        let norm1   = LayerNormConfig::new(d_model).init(device);
        let norm2   = LayerNormConfig::new(d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        let activation = match self.activation {
            Activation::Relu => FeedForwardActivation::Relu(Relu::new()),
            Activation::Gelu => FeedForwardActivation::Gelu(Gelu::new()),
        };
        EncoderBlock {
            self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout, activation,
            norm_first: self.norm_first,
        }
    }
}

#[derive(Module, Clone, Debug)]
pub enum FeedForwardActivation {
    Relu(Relu),
    Gelu(Gelu),
}

impl FeedForwardActivation {
    fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            FeedForwardActivation::Relu(relu) => relu.forward(x),
            FeedForwardActivation::Gelu(gelu) => gelu.forward(x),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
    pub activation:  FeedForwardActivation,
    pub norm_first:  bool,
}

impl<B: Backend> EncoderBlock<B> {
    /// x: [batch, seq, d_model], mask_pad: [batch, seq] (true = padding)
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        if self.norm_first {
            let h = self.norm1.forward(x.clone());
            let x = x + self.dropout.forward(self.attend(h, mask_pad));
            let h = self.norm2.forward(x.clone());
            x + self.dropout.forward(self.feed_forward(h))
        } else {
            let x = self.norm1.forward(x.clone() + self.dropout.forward(self.attend(x, mask_pad)));
            self.norm2.forward(x.clone() + self.dropout.forward(self.feed_forward(x)))
        }
    }

    fn attend(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input = MhaInput::self_attn(x).mask_pad(mask_pad);
        self.self_attn.forward(input).context
    }

    fn feed_forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = self.activation.forward(self.ffn_linear1.forward(x));
        self.ffn_linear2.forward(self.dropout.forward(h))
    }
}

#[derive(Module, Debug)]
pub struct OutfitEncoder<B: Backend> {
    pub layers:  Vec<EncoderBlock<B>>,
    pub d_model: usize,
}

impl<B: Backend> OutfitEncoder<B> {
    /// Put the pooling vector in front of the item sequence and a `false`
    /// in front of the mask.
    ///
    /// pooling: [B, D], items: [B, L, D], mask: [B, L]
    /// → ([B, 1+L, D], [B, 1+L])
    pub fn prepend_pooling(
        &self,
        pooling: Tensor<B, 2>,
        items:   Tensor<B, 3>,
        mask:    Tensor<B, 2, Bool>,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 2, Bool>)> {
        let [batch_size, seq_len, d_model] = items.dims();
        if d_model != self.d_model {
            return Err(OutfitError::shape("item embedding width", self.d_model, d_model));
        }
        if mask.dims() != [batch_size, seq_len] {
            return Err(OutfitError::shape(
                "padding mask",
                format!("{:?}", [batch_size, seq_len]),
                format!("{:?}", mask.dims()),
            ));
        }
        if pooling.dims() != [batch_size, d_model] {
            return Err(OutfitError::shape(
                "pooling vector",
                format!("{:?}", [batch_size, d_model]),
                format!("{:?}", pooling.dims()),
            ));
        }

        let device  = items.device();
        let pooling = pooling.unsqueeze_dim::<3>(1);
        let prefix  = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(vec![false; batch_size], [batch_size, 1]),
            &device,
        );
        if seq_len == 0 {
            return Ok((pooling, prefix));
        }
        let x    = Tensor::cat(vec![pooling, items], 1);
        let mask = Tensor::cat(vec![prefix, mask], 1);
        Ok((x, mask))
    }

    /// Run the stack and return the transformed pooling-position state [B, D].
    pub fn forward(
        &self,
        pooling: Tensor<B, 2>,
        items:   Tensor<B, 3>,
        mask:    Tensor<B, 2, Bool>,
    ) -> Result<Tensor<B, 2>> {
        let (mut x, mask) = self.prepend_pooling(pooling, items, mask)?;
        for layer in &self.layers {
            x = layer.forward(x, mask.clone());
        }
        let [batch_size, _, d_model] = x.dims();
        Ok(x.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model]))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn encoder(norm_first: bool, activation: Activation) -> OutfitEncoder<TestBackend> {
        OutfitTransformerConfig::new()
            .with_n_heads(2)
            .with_n_layers(2)
            .with_d_ffn(16)
            .with_norm_first(norm_first)
            .with_activation(activation)
            .init(8, &Default::default())
    }

    fn mask(rows: &[&[bool]]) -> Tensor<TestBackend, 2, Bool> {
        let cols = rows[0].len();
        let flat: Vec<bool> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_data(TensorData::new(flat, [rows.len(), cols]), &Default::default())
    }

    #[test]
    fn test_prepend_adds_exactly_one_position() {
        let enc    = encoder(true, Activation::Relu);
        let device = Default::default();
        let items  = Tensor::<TestBackend, 3>::random([3, 4, 8], Distribution::Default, &device);
        let pool   = Tensor::<TestBackend, 2>::zeros([3, 8], &device);
        let m      = mask(&[&[false; 4], &[false, false, true, true], &[false, true, true, true]]);

        let (x, m) = enc.prepend_pooling(pool, items, m).unwrap();
        assert_eq!(x.dims(), [3, 5, 8]);
        assert_eq!(m.dims(), [3, 5]);

        // The pooling slot is never masked
        let m: Vec<bool> = m.into_data().to_vec::<bool>().unwrap();
        assert_eq!(&m[0..5],   &[false, false, false, false, false]);
        assert_eq!(&m[5..10],  &[false, false, false, true, true]);
        assert_eq!(&m[10..15], &[false, false, true, true, true]);
    }

    #[test]
    fn test_padded_content_does_not_change_pooled_state() {
        let device = Default::default();
        for (norm_first, activation) in [(true, Activation::Relu), (false, Activation::Gelu)] {
            let enc  = encoder(norm_first, activation);
            let pool = Tensor::<TestBackend, 2>::random([1, 8], Distribution::Default, &device);
            let real = Tensor::<TestBackend, 3>::random([1, 2, 8], Distribution::Default, &device);
            let pad_a = Tensor::<TestBackend, 3>::zeros([1, 3, 8], &device);
            let pad_b = Tensor::<TestBackend, 3>::random([1, 3, 8], Distribution::Uniform(-5.0, 5.0), &device);
            let m = || mask(&[&[false, false, true, true, true]]);

            let a = enc
                .forward(pool.clone(), Tensor::cat(vec![real.clone(), pad_a], 1), m())
                .unwrap();
            let b = enc
                .forward(pool.clone(), Tensor::cat(vec![real.clone(), pad_b], 1), m())
                .unwrap();

            let a: Vec<f32> = a.into_data().to_vec::<f32>().unwrap();
            let b: Vec<f32> = b.into_data().to_vec::<f32>().unwrap();
            for (x, y) in a.iter().zip(&b) {
                assert!((x - y).abs() < 1e-5, "pooled state moved: {x} vs {y}");
            }
        }
    }

    #[test]
    fn test_rejects_wrong_embedding_width() {
        let enc    = encoder(true, Activation::Relu);
        let device = Default::default();
        let items  = Tensor::<TestBackend, 3>::zeros([1, 2, 6], &device);
        let pool   = Tensor::<TestBackend, 2>::zeros([1, 6], &device);
        let err = enc.forward(pool, items, mask(&[&[false, false]])).unwrap_err();
        assert!(matches!(err, OutfitError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejects_mask_of_wrong_length() {
        let enc    = encoder(true, Activation::Relu);
        let device = Default::default();
        let items  = Tensor::<TestBackend, 3>::zeros([1, 3, 8], &device);
        let pool   = Tensor::<TestBackend, 2>::zeros([1, 8], &device);
        let err = enc.forward(pool, items, mask(&[&[false, false]])).unwrap_err();
        assert!(matches!(err, OutfitError::ShapeMismatch { what: "padding mask", .. }));
    }
}
