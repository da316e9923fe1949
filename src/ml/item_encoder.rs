// ============================================================
// Layer 5 — Item Encoder
// ============================================================
// Maps each garment's raw modality inputs to one embedding of
// width D. The outfit model only sees the ItemEncoder trait;
// any backbone (CLIP, a text transformer, ...) can sit behind it.
//
// ProjectionItemEncoder is the in-crate backbone:
//   image half (D/2) = Linear(flattened RGB in [0, 1])
//   text half  (D/2) = Linear(hashed character-trigram counts)
// It is meant to be trained once and then frozen, like any
// backbone whose outputs are cached.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};

use crate::domain::item::ItemImage;
use crate::error::OutfitError;

// ─── ItemEncoder ──────────────────────────────────────────────────────────────
/// `encode(images, texts) → [B, L, D]` over a rectangular batch of items.
pub trait ItemEncoder<B: Backend> {
    /// Output width D
    fn d_embed(&self) -> usize;

    /// (width, height) every input image must have
    fn image_size(&self) -> (usize, usize);

    /// images and texts are [B][L]; both must have the same, rectangular shape.
    fn encode(&self, images: &[Vec<ItemImage>], texts: &[Vec<String>]) -> crate::error::Result<Tensor<B, 3>>;

    /// Fill value for padded image slots.
    fn image_placeholder(&self) -> ItemImage {
        let (width, height) = self.image_size();
        ItemImage::blank(width, height)
    }

    /// Fill value for padded text slots.
    fn text_placeholder(&self) -> String {
        String::new()
    }
}

// ─── PrecomputedOnly ──────────────────────────────────────────────────────────
/// Stand-in encoder for dispatchers that only ever see cached
/// embeddings. Holds no weights; `encode` always fails.
#[derive(Debug, Clone, Copy)]
pub struct PrecomputedOnly {
    d_embed: usize,
}

impl PrecomputedOnly {
    pub fn new(d_embed: usize) -> Self {
        Self { d_embed }
    }
}

impl<B: Backend> ItemEncoder<B> for PrecomputedOnly {
    fn d_embed(&self) -> usize {
        self.d_embed
    }

    fn image_size(&self) -> (usize, usize) {
        (0, 0)
    }

    fn encode(&self, _images: &[Vec<ItemImage>], _texts: &[Vec<String>]) -> crate::error::Result<Tensor<B, 3>> {
        Err(OutfitError::MalformedInput(
            "no item encoder loaded, items must carry precomputed embeddings".into(),
        ))
    }
}

// ─── ProjectionItemEncoder ────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct ProjectionItemEncoderConfig {
    pub d_embed: usize,
    #[config(default = 16)]
    pub image_width:  usize,
    #[config(default = 16)]
    pub image_height: usize,
    /// Number of hash buckets for text trigrams
    #[config(default = 1024)]
    pub text_buckets: usize,
}

impl ProjectionItemEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::error::Result<ProjectionItemEncoder<B>> {
        if self.d_embed == 0 || self.d_embed % 2 != 0 {
            return Err(OutfitError::InvalidConfig(format!(
                "item encoder d_embed must be a positive even number, got {}",
                self.d_embed
            )));
        }
        if self.image_width == 0 || self.image_height == 0 || self.text_buckets == 0 {
            return Err(OutfitError::InvalidConfig(
                "item encoder image size and text buckets must be positive".into(),
            ));
        }
        let pixels = self.image_width * self.image_height * 3;
        Ok(ProjectionItemEncoder {
            image_proj:   LinearConfig::new(pixels, self.d_embed / 2).init(device),
            text_proj:    LinearConfig::new(self.text_buckets, self.d_embed / 2).init(device),
            d_embed:      self.d_embed,
            image_width:  self.image_width,
            image_height: self.image_height,
            text_buckets: self.text_buckets,
        })
    }
}

#[derive(Module, Debug)]
pub struct ProjectionItemEncoder<B: Backend> {
    image_proj:   Linear<B>,
    text_proj:    Linear<B>,
    d_embed:      usize,
    image_width:  usize,
    image_height: usize,
    text_buckets: usize,
}

impl<B: Backend> ProjectionItemEncoder<B> {
    fn check_shapes(&self, images: &[Vec<ItemImage>], texts: &[Vec<String>]) -> crate::error::Result<(usize, usize)> {
        if images.len() != texts.len() {
            return Err(OutfitError::MalformedInput(format!(
                "{} image rows but {} text rows",
                images.len(),
                texts.len()
            )));
        }
        let batch_size = images.len();
        let seq_len    = images.first().map(Vec::len).unwrap_or(0);
        if batch_size == 0 || seq_len == 0 {
            return Err(OutfitError::MalformedInput("empty item batch".into()));
        }
        for (row, (imgs, txts)) in images.iter().zip(texts).enumerate() {
            if imgs.len() != seq_len || txts.len() != seq_len {
                return Err(OutfitError::MalformedInput(format!(
                    "row {row} has {} images and {} texts, expected {seq_len} of each",
                    imgs.len(),
                    txts.len()
                )));
            }
            for img in imgs {
                if img.size() != self.image_size() || !img.is_well_formed() {
                    return Err(OutfitError::MalformedInput(format!(
                        "row {row}: image {}x{} with {} bytes, expected {}x{} RGB",
                        img.width,
                        img.height,
                        img.pixels.len(),
                        self.image_width,
                        self.image_height
                    )));
                }
            }
        }
        Ok((batch_size, seq_len))
    }

    /// Normalised trigram counts of `text` over `text_buckets` buckets.
    fn text_features(&self, text: &str) -> Vec<f32> {
        let mut features = vec![0.0f32; self.text_buckets];
        if text.trim().is_empty() {
            return features;
        }
        let chars: Vec<char> = format!("  {} ", text.trim().to_lowercase()).chars().collect();
        let mut count = 0usize;
        for window in chars.windows(3) {
            features[fnv1a(window) % self.text_buckets] += 1.0;
            count += 1;
        }
        let scale = 1.0 / count.max(1) as f32;
        features.iter_mut().for_each(|f| *f *= scale);
        features
    }
}

/// FNV-1a over the UTF-8 bytes of a char window; stable across runs.
fn fnv1a(window: &[char]) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    let mut buf = [0u8; 4];
    for c in window {
        for byte in c.encode_utf8(&mut buf).bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }
    hash as usize
}

impl<B: Backend> ItemEncoder<B> for ProjectionItemEncoder<B> {
    fn d_embed(&self) -> usize {
        self.d_embed
    }

    fn image_size(&self) -> (usize, usize) {
        (self.image_width, self.image_height)
    }

    fn encode(&self, images: &[Vec<ItemImage>], texts: &[Vec<String>]) -> crate::error::Result<Tensor<B, 3>> {
        let (batch_size, seq_len) = self.check_shapes(images, texts)?;
        let n_items = batch_size * seq_len;
        let pixels  = self.image_width * self.image_height * 3;
        let device  = self.image_proj.weight.val().device();

        let pixel_flat: Vec<f32> = images
            .iter()
            .flatten()
            .flat_map(|img| img.pixels.iter().map(|&p| f32::from(p) / 255.0))
            .collect();
        let text_flat: Vec<f32> = texts
            .iter()
            .flatten()
            .flat_map(|t| self.text_features(t))
            .collect();

        let pixel_tensor = Tensor::<B, 2>::from_data(TensorData::new(pixel_flat, [n_items, pixels]), &device);
        let text_tensor  = Tensor::<B, 2>::from_data(
            TensorData::new(text_flat, [n_items, self.text_buckets]),
            &device,
        );

        let image_half = self.image_proj.forward(pixel_tensor);
        let text_half  = self.text_proj.forward(text_tensor);
        Ok(Tensor::cat(vec![image_half, text_half], 1).reshape([batch_size, seq_len, self.d_embed]))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn encoder() -> ProjectionItemEncoder<TestBackend> {
        ProjectionItemEncoderConfig::new(8)
            .with_image_width(2)
            .with_image_height(2)
            .with_text_buckets(32)
            .init(&Default::default())
            .unwrap()
    }

    #[test]
    fn test_encode_shape() {
        let enc  = encoder();
        let img  = ItemImage::blank(2, 2);
        let out  = enc
            .encode(
                &[vec![img.clone(), img.clone()], vec![img.clone(), img]],
                &[vec!["shirt".into(), "jeans".into()], vec!["boots".into(), String::new()]],
            )
            .unwrap();
        assert_eq!(out.dims(), [2, 2, 8]);
    }

    #[test]
    fn test_rejects_ragged_batch() {
        let enc = encoder();
        let img = ItemImage::blank(2, 2);
        let err = enc
            .encode(
                &[vec![img.clone(), img.clone()], vec![img]],
                &[vec!["a".into(), "b".into()], vec!["c".into()]],
            )
            .unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_rejects_wrong_image_size() {
        let enc = encoder();
        let err = enc
            .encode(&[vec![ItemImage::blank(3, 2)]], &[vec!["coat".into()]])
            .unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_rejects_mismatched_modalities() {
        let enc = encoder();
        let err = enc.encode(&[vec![ItemImage::blank(2, 2)]], &[]).unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_precomputed_only_refuses_raw_items() {
        let enc = PrecomputedOnly::new(8);
        assert_eq!(ItemEncoder::<TestBackend>::d_embed(&enc), 8);
        let err = ItemEncoder::<TestBackend>::encode(&enc, &[vec![ItemImage::blank(2, 2)]], &[vec!["hat".into()]])
            .unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_text_features_are_normalised() {
        let enc = encoder();
        let f   = enc.text_features("Denim Jacket");
        let sum: f32 = f.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        // Case and surrounding whitespace do not matter
        assert_eq!(f, enc.text_features("  denim jacket "));
        assert!(enc.text_features("").iter().all(|&x| x == 0.0));
    }
}
