// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `merge-cache`, `fitb` and `train-cp`
// and all their configurable flags. Every command converts its
// arguments into a RunConfig, which is validated before any
// file is read.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;
use clap::{Args, Subcommand};

use outfit_x::application::run_config::{RunConfig, RunMode};
use outfit_x::infra::checkpoint::CheckpointMode;
use outfit_x::ml::trainer::BEST_WEIGHTS;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge per-rank embedding shards and report the catalog
    MergeCache(MergeCacheArgs),

    /// Evaluate fill-in-the-blank accuracy from a checkpoint
    Fitb(FitbArgs),

    /// Train the compatibility head on labelled outfits
    TrainCp(TrainCpArgs),
}

/// Flags shared by every command
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Directory holding `{prefix}{rank}.json` shards
    #[arg(long, default_value = "cache")]
    pub cache_dir: PathBuf,

    /// Shard file name prefix
    #[arg(long, default_value = "clip_embeddings_")]
    pub prefix: String,

    /// Number of worker replicas. Evaluation requires 1
    #[arg(long, default_value_t = 1)]
    pub world_size: usize,
}

#[derive(Args, Debug)]
pub struct MergeCacheArgs {
    #[command(flatten)]
    pub cache: CacheArgs,
}

#[derive(Args, Debug)]
pub struct FitbArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Directory where train-cp saved its checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// JSON file with fill-in-the-blank questions
    #[arg(long)]
    pub questions: PathBuf,

    /// Weights-only checkpoint name to evaluate
    #[arg(long, default_value = BEST_WEIGHTS)]
    pub weights: String,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
}

#[derive(Args, Debug)]
pub struct TrainCpArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// JSON file with labelled outfits (item ids + label)
    #[arg(long)]
    pub samples: PathBuf,

    /// Directory to save checkpoints and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Optional model hyperparameters as OutfitConfig JSON
    #[arg(long)]
    pub model_config: Option<PathBuf>,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Seed for the train/validation split and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Continue from the latest full checkpoint
    #[arg(long)]
    pub resume: bool,
}

fn base(cache: CacheArgs) -> RunConfig {
    RunConfig {
        world_size:   cache.world_size,
        cache_dir:    cache.cache_dir,
        cache_prefix: cache.prefix,
        ..RunConfig::default()
    }
}

impl From<MergeCacheArgs> for RunConfig {
    fn from(a: MergeCacheArgs) -> Self {
        base(a.cache)
    }
}

impl From<&FitbArgs> for RunConfig {
    fn from(a: &FitbArgs) -> Self {
        RunConfig {
            mode:            RunMode::Test,
            checkpoint_dir:  a.checkpoint_dir.clone(),
            checkpoint_mode: CheckpointMode::WeightsOnly,
            batch_size:      a.batch_size,
            ..base(a.cache.clone())
        }
    }
}

impl From<&TrainCpArgs> for RunConfig {
    fn from(a: &TrainCpArgs) -> Self {
        RunConfig {
            mode:            RunMode::TrainValid,
            checkpoint_dir:  a.checkpoint_dir.clone(),
            checkpoint_mode: if a.resume { CheckpointMode::Full } else { CheckpointMode::WeightsOnly },
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            learning_rate:   a.lr,
            seed:            a.seed,
            ..base(a.cache.clone())
        }
    }
}
