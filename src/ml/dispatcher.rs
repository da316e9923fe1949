// ============================================================
// Layer 5 — Task Dispatcher
// ============================================================
// Routes one task to exactly one forward path:
//
//   CompatibilityPrediction     → model.cp_forward
//   ComplementaryItemRetrieval  → model.cir_forward
//   FillInTheBlank              → model.cir_forward (same head)
//   PrecomputeEmbedding         → item encoder, one item per row
//
// OutfitTask is a closed enum and `dispatch` matches it
// exhaustively, so a task kind without a handler is a build
// error. Only string tags coming from outside the crate can be
// unknown; those fail with UnsupportedTask before anything runs.
//
// Every path borrows the model immutably.

use burn::prelude::*;

use crate::data::batcher::OutfitBatch;
use crate::data::padding::SequencePadder;
use crate::domain::item::{FashionItem, ItemImage, Outfit};
use crate::domain::task::TaskKind;
use crate::error::{OutfitError, Result};
use crate::ml::item_encoder::ItemEncoder;
use crate::ml::model::OutfitModel;

// ─── Task arguments ───────────────────────────────────────────────────────────

/// CP input: an already-embedded batch, or outfits of items. Items use
/// their cached embeddings when every item in the batch has one and
/// are run through the item encoder otherwise.
#[derive(Debug, Clone)]
pub enum CpInput<B: Backend> {
    Embedded(OutfitBatch<B>),
    Raw(Vec<Outfit>),
}

/// CIR / fill-in-the-blank input.
#[derive(Debug, Clone)]
pub struct CirInput<B: Backend> {
    pub outfits: OutfitBatch<B>,
    /// Description embedding of the missing item, [B, D/2]
    pub text_embedding: Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct PrecomputeInput {
    pub items: Vec<FashionItem>,
}

#[derive(Debug, Clone)]
pub enum OutfitTask<B: Backend> {
    CompatibilityPrediction(CpInput<B>),
    ComplementaryItemRetrieval(CirInput<B>),
    FillInTheBlank(CirInput<B>),
    PrecomputeEmbedding(PrecomputeInput),
}

impl<B: Backend> OutfitTask<B> {
    pub fn kind(&self) -> TaskKind {
        match self {
            OutfitTask::CompatibilityPrediction(_)    => TaskKind::CompatibilityPrediction,
            OutfitTask::ComplementaryItemRetrieval(_) => TaskKind::ComplementaryItemRetrieval,
            OutfitTask::FillInTheBlank(_)             => TaskKind::FillInTheBlank,
            OutfitTask::PrecomputeEmbedding(_)        => TaskKind::PrecomputeEmbedding,
        }
    }
}

/// Argument shapes, for callers that only know the task by its tag.
/// CIR and fill-in-the-blank share one shape.
#[derive(Debug, Clone)]
pub enum TaskPayload<B: Backend> {
    Compatibility(CpInput<B>),
    Retrieval(CirInput<B>),
    Precompute(PrecomputeInput),
}

impl<B: Backend> OutfitTask<B> {
    /// Resolve an external tag and pair it with its arguments.
    pub fn from_tag(tag: &str, payload: TaskPayload<B>) -> Result<Self> {
        let kind: TaskKind = tag.parse()?;
        let task = match (kind, payload) {
            (TaskKind::CompatibilityPrediction, TaskPayload::Compatibility(input)) => {
                OutfitTask::CompatibilityPrediction(input)
            }
            (TaskKind::ComplementaryItemRetrieval, TaskPayload::Retrieval(input)) => {
                OutfitTask::ComplementaryItemRetrieval(input)
            }
            (TaskKind::FillInTheBlank, TaskPayload::Retrieval(input)) => OutfitTask::FillInTheBlank(input),
            (TaskKind::PrecomputeEmbedding, TaskPayload::Precompute(input)) => {
                OutfitTask::PrecomputeEmbedding(input)
            }
            (kind, _) => {
                return Err(OutfitError::MalformedInput(format!(
                    "arguments do not match task '{kind}'"
                )))
            }
        };
        Ok(task)
    }
}

// ─── Task outputs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum TaskOutput<B: Backend> {
    /// [B, 1] raw logits
    CompatibilityScores(Tensor<B, 2>),
    /// [B, d_catalog] predicted target embeddings
    TargetEmbeddings(Tensor<B, 2>),
    /// [B, D] one embedding per item
    ItemEmbeddings(Tensor<B, 2>),
}

impl<B: Backend> TaskOutput<B> {
    pub fn into_tensor(self) -> Tensor<B, 2> {
        match self {
            TaskOutput::CompatibilityScores(t)
            | TaskOutput::TargetEmbeddings(t)
            | TaskOutput::ItemEmbeddings(t) => t,
        }
    }
}

// ─── TaskDispatcher ───────────────────────────────────────────────────────────

pub struct TaskDispatcher<'a, B: Backend, E: ItemEncoder<B>> {
    model:        &'a OutfitModel<B>,
    item_encoder: &'a E,
    padder:       SequencePadder,
}

impl<'a, B: Backend, E: ItemEncoder<B>> TaskDispatcher<'a, B, E> {
    pub fn new(model: &'a OutfitModel<B>, item_encoder: &'a E, padder: SequencePadder) -> Result<Self> {
        if item_encoder.d_embed() != model.d_embed() {
            return Err(OutfitError::shape(
                "item encoder output width",
                model.d_embed(),
                item_encoder.d_embed(),
            ));
        }
        Ok(Self { model, item_encoder, padder })
    }

    pub fn model(&self) -> &OutfitModel<B> { self.model }

    pub fn padder(&self) -> &SequencePadder { &self.padder }

    pub fn dispatch(&self, task: OutfitTask<B>) -> Result<TaskOutput<B>> {
        tracing::debug!("Dispatching task '{}'", task.kind());
        match task {
            OutfitTask::CompatibilityPrediction(input) => {
                let batch = match input {
                    CpInput::Embedded(batch) => batch,
                    CpInput::Raw(outfits)    => self.embed_outfits(&outfits)?,
                };
                self.model.cp_forward(&batch).map(TaskOutput::CompatibilityScores)
            }
            OutfitTask::ComplementaryItemRetrieval(input) | OutfitTask::FillInTheBlank(input) => self
                .model
                .cir_forward(&input.outfits, input.text_embedding)
                .map(TaskOutput::TargetEmbeddings),
            OutfitTask::PrecomputeEmbedding(input) => {
                self.precompute_embeddings(&input.items).map(TaskOutput::ItemEmbeddings)
            }
        }
    }

    /// Tag-addressed entry point; unknown tags fail before any work is done.
    pub fn dispatch_tag(&self, tag: &str, payload: TaskPayload<B>) -> Result<TaskOutput<B>> {
        self.dispatch(OutfitTask::from_tag(tag, payload)?)
    }

    /// Encode each item as its own length-1 sequence → [B, D].
    /// No items gives a [0, D] tensor.
    pub fn precompute_embeddings(&self, items: &[FashionItem]) -> Result<Tensor<B, 2>> {
        if items.is_empty() {
            let device = self.model.outfit_token().device();
            return Ok(Tensor::from_data(
                TensorData::new(Vec::<f32>::new(), [0, self.model.d_embed()]),
                &device,
            ));
        }
        let images = items
            .iter()
            .map(|item| item_image(item).map(|img| vec![img]))
            .collect::<Result<Vec<_>>>()?;
        let texts: Vec<Vec<String>> = items.iter().map(|item| vec![item.text().to_string()]).collect();

        let embeddings = self.item_encoder.encode(&images, &texts)?;
        let [batch_size, _, d_embed] = embeddings.dims();
        Ok(embeddings.reshape([batch_size, d_embed]))
    }

    /// Cached item embeddings padded with the learned pad embedding
    /// when every item has one, otherwise `encode_outfits`.
    pub fn embed_outfits(&self, outfits: &[Outfit]) -> Result<OutfitBatch<B>> {
        let cached: Option<Vec<Vec<Vec<f32>>>> = outfits.iter().map(Outfit::embeddings).collect();
        match cached {
            Some(embeddings) => {
                let pad_value = self.model.pad_embedding_values()?;
                let device    = self.model.outfit_token().device();
                OutfitBatch::from_embeddings(&embeddings, &self.padder, &pad_value, &device)
            }
            None => self.encode_outfits(outfits),
        }
    }

    /// Pad raw outfits with placeholder image/text, encode them, and
    /// attach the padding mask.
    pub fn encode_outfits(&self, outfits: &[Outfit]) -> Result<OutfitBatch<B>> {
        let images = outfits
            .iter()
            .map(|outfit| outfit.items.iter().map(item_image).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        let texts: Vec<Vec<String>> = outfits
            .iter()
            .map(|outfit| outfit.items.iter().map(|item| item.text().to_string()).collect())
            .collect();

        let images = self.padder.pad(&images, &self.item_encoder.image_placeholder())?;
        let texts  = self.padder.pad(&texts, &self.item_encoder.text_placeholder())?;

        let embeddings = self.item_encoder.encode(&images.sequences, &texts.sequences)?;
        let device = embeddings.device();
        let mask = Tensor::<B, 2, Bool>::from_data(
            TensorData::new(images.flat_mask(), [images.batch_size(), images.target_length]),
            &device,
        );
        OutfitBatch::new(embeddings, mask)
    }
}

fn item_image(item: &FashionItem) -> Result<ItemImage> {
    item.image
        .clone()
        .ok_or_else(|| OutfitError::MalformedInput(format!("item '{}' has no image", item.id)))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::padding::PaddingPolicy;
    use crate::ml::config::{OutfitConfig, OutfitTransformerConfig};
    use crate::ml::item_encoder::{PrecomputedOnly, ProjectionItemEncoder, ProjectionItemEncoderConfig};
    use crate::ml::model::tensor_to_vec;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn setup() -> (OutfitModel<TestBackend>, ProjectionItemEncoder<TestBackend>) {
        let device = Default::default();
        let model = OutfitConfig::new(8, 8)
            .with_max_length(4)
            .with_transformer(
                OutfitTransformerConfig::new().with_n_heads(2).with_n_layers(1).with_d_ffn(16),
            )
            .init(&device)
            .unwrap();
        let encoder = ProjectionItemEncoderConfig::new(8)
            .with_image_width(2)
            .with_image_height(2)
            .with_text_buckets(16)
            .init(&device)
            .unwrap();
        (model, encoder)
    }

    fn garment(id: &str, category: &str, shade: u8) -> FashionItem {
        let mut image = ItemImage::blank(2, 2);
        image.pixels.iter_mut().for_each(|p| *p = shade);
        FashionItem::new(id, category).with_image(image)
    }

    fn padder() -> SequencePadder {
        SequencePadder::new(4, PaddingPolicy::Longest, true)
    }

    #[test]
    fn test_precompute_is_one_row_per_item_and_repeatable() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let items = vec![garment("1", "shirt", 10), garment("2", "pants", 200), garment("3", "shoes", 90)];

        let run = || {
            dispatcher
                .dispatch(OutfitTask::PrecomputeEmbedding(PrecomputeInput { items: items.clone() }))
                .unwrap()
                .into_tensor()
        };
        let first = run();
        assert_eq!(first.dims(), [3, 8]);
        // Bit-identical on a second run
        assert_eq!(tensor_to_vec(first).unwrap(), tensor_to_vec(run()).unwrap());
    }

    #[test]
    fn test_raw_cp_pads_with_placeholders() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let outfits = vec![
            Outfit::new(vec![garment("1", "shirt", 10), garment("2", "pants", 20)]),
            Outfit::new(vec![garment("3", "dress", 30)]),
        ];

        let batch = dispatcher.encode_outfits(&outfits).unwrap();
        assert_eq!(batch.embeddings.dims(), [2, 2, 8]);
        let mask: Vec<bool> = batch.mask.into_data().to_vec::<bool>().unwrap();
        assert_eq!(mask, vec![false, false, false, true]);

        let out = dispatcher
            .dispatch(OutfitTask::CompatibilityPrediction(CpInput::Raw(outfits)))
            .unwrap();
        assert!(matches!(&out, TaskOutput::CompatibilityScores(t) if t.dims() == [2, 1]));
    }

    #[test]
    fn test_cached_item_embeddings_skip_the_encoder() {
        let (model, _) = setup();
        let encoder    = PrecomputedOnly::new(8);
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let shirt = FashionItem::new("1", "shirt").with_embedding(vec![0.3; 8]);
        let pants = FashionItem::new("2", "pants").with_embedding(vec![-0.2; 8]);
        let outfits = vec![Outfit::new(vec![shirt.clone(), pants.clone()]), Outfit::new(vec![shirt])];

        let pad      = model.pad_embedding_values().unwrap();
        let expected = OutfitBatch::from_embeddings(
            &[vec![vec![0.3; 8], vec![-0.2; 8]], vec![vec![0.3; 8]]],
            &padder(),
            &pad,
            &Default::default(),
        )
        .unwrap();
        let expected = tensor_to_vec(model.cp_forward(&expected).unwrap()).unwrap();

        let out = dispatcher
            .dispatch(OutfitTask::CompatibilityPrediction(CpInput::Raw(outfits)))
            .unwrap();
        assert_eq!(tensor_to_vec(out.into_tensor()).unwrap(), expected);
    }

    #[test]
    fn test_partially_cached_outfits_fall_back_to_the_encoder() {
        let (model, _) = setup();
        let encoder    = PrecomputedOnly::new(8);
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let cached   = FashionItem::new("1", "shirt").with_embedding(vec![0.3; 8]);
        let uncached = garment("2", "pants", 40);
        let err = dispatcher
            .embed_outfits(&[Outfit::new(vec![cached, uncached])])
            .unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_precompute_of_no_items_is_empty() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        assert_eq!(dispatcher.precompute_embeddings(&[]).unwrap().dims(), [0, 8]);
    }

    #[test]
    fn test_fitb_uses_the_cir_head() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let device = Default::default();
        let outfits = dispatcher
            .encode_outfits(&[Outfit::new(vec![garment("1", "shirt", 10), garment("2", "pants", 20)])])
            .unwrap();
        let input = CirInput {
            outfits,
            text_embedding: Tensor::<TestBackend, 2>::zeros([1, 4], &device),
        };

        let cir  = dispatcher.dispatch(OutfitTask::ComplementaryItemRetrieval(input.clone())).unwrap();
        let fitb = dispatcher.dispatch(OutfitTask::FillInTheBlank(input)).unwrap();
        assert_eq!(
            tensor_to_vec(cir.into_tensor()).unwrap(),
            tensor_to_vec(fitb.into_tensor()).unwrap()
        );
    }

    #[test]
    fn test_unknown_tag_fails_and_leaves_parameters_alone() {
        let (model, encoder) = setup();
        let before = tensor_to_vec(model.outfit_token()).unwrap();
        let placeholder_before = tensor_to_vec(model.target_item_image_placeholder()).unwrap();

        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let payload = TaskPayload::Precompute(PrecomputeInput { items: vec![garment("1", "shirt", 1)] });
        let err = dispatcher.dispatch_tag("outfit_generation", payload).unwrap_err();
        assert!(matches!(err, OutfitError::UnsupportedTask { .. }));

        assert_eq!(tensor_to_vec(model.outfit_token()).unwrap(), before);
        assert_eq!(
            tensor_to_vec(model.target_item_image_placeholder()).unwrap(),
            placeholder_before
        );
    }

    #[test]
    fn test_tag_with_wrong_arguments_is_rejected() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let payload = TaskPayload::Precompute(PrecomputeInput { items: vec![garment("1", "shirt", 1)] });
        let err = dispatcher.dispatch_tag("cp", payload).unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_item_without_image_is_rejected() {
        let (model, encoder) = setup();
        let dispatcher = TaskDispatcher::new(&model, &encoder, padder()).unwrap();
        let err = dispatcher
            .precompute_embeddings(&[FashionItem::new("9", "scarf")])
            .unwrap_err();
        assert!(matches!(err, OutfitError::MalformedInput(_)));
    }

    #[test]
    fn test_encoder_width_must_match_model() {
        let (model, _) = setup();
        let wide = ProjectionItemEncoderConfig::new(10)
            .with_image_width(2)
            .with_image_height(2)
            .init::<TestBackend>(&Default::default())
            .unwrap();
        assert!(matches!(
            TaskDispatcher::new(&model, &wide, padder()),
            Err(OutfitError::ShapeMismatch { .. })
        ));
    }
}
