// ============================================================
// Layer 3 — Fashion Item and Outfit Domain Types
// ============================================================
// A FashionItem is one garment. It carries its raw modality
// inputs (an RGB image and a category/description text) and,
// once the item encoder has been run over the catalog, an
// optional precomputed embedding of width D.
//
// An Outfit is an ordered list of items. The model itself does
// not care about order (there is no positional embedding), but
// the order is kept so truncation always drops the same items.
//
// Reference: Rust Book §5 (Structs)

use serde::{Deserialize, Serialize};

/// A raw RGB image, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemImage {
    pub width:  usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl ItemImage {
    /// An all-black image, used as the image placeholder when padding
    /// raw-modality outfits.
    pub fn blank(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0; width * height * 3] }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// True when the pixel buffer length agrees with width × height × 3.
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == self.width * self.height * 3
    }
}

/// One garment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FashionItem {
    /// Catalog identifier, the key of the embedding cache
    pub id: String,

    /// Category or short description fed to the text side of the encoder
    pub category: String,

    #[serde(default)]
    pub image: Option<ItemImage>,

    /// Precomputed item embedding (width D), if the catalog was cached
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl FashionItem {
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id:        id.into(),
            category:  category.into(),
            image:     None,
            embedding: None,
        }
    }

    pub fn with_image(mut self, image: ItemImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The text the item encoder sees for this item.
    pub fn text(&self) -> &str {
        &self.category
    }
}

/// An ordered collection of items forming one styling combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outfit {
    pub items: Vec<FashionItem>,
}

impl Outfit {
    pub fn new(items: Vec<FashionItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Precomputed embeddings of every item, or `None` if any item
    /// has not been cached yet.
    pub fn embeddings(&self) -> Option<Vec<Vec<f32>>> {
        self.items.iter().map(|item| item.embedding.clone()).collect()
    }
}
