// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and hands off to the
// application layer. Three commands are supported:
//   1. `merge-cache` — merge embedding shards and report
//   2. `fitb`        — fill-in-the-blank accuracy of a checkpoint
//   3. `train-cp`    — train the compatibility head
//
// The CLI runs on the WGPU backend; training wraps it in Autodiff.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, FitbArgs, MergeCacheArgs, TrainCpArgs};

use outfit_x::application::{
    fitb_use_case::FitbUseCase,
    merge_cache_use_case::MergeCacheUseCase,
    train_cp_use_case::TrainCpUseCase,
};

type InferBackend = burn::backend::Wgpu;
type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

#[derive(Parser, Debug)]
#[command(
    name = "outfit-x",
    version,
    about = "Outfit compatibility, complementary item retrieval and fill-in-the-blank evaluation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::MergeCache(args) => run_merge_cache(args),
            Commands::Fitb(args)       => run_fitb(args),
            Commands::TrainCp(args)    => run_train_cp(args),
        }
    }
}

fn run_merge_cache(args: MergeCacheArgs) -> Result<()> {
    let report = MergeCacheUseCase::new(args.into()).execute()?;
    println!(
        "Merged {} embeddings ({} unique ids, dim {})",
        report.rows, report.unique, report.dim
    );
    Ok(())
}

fn run_fitb(args: FitbArgs) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let eval = FitbUseCase::new((&args).into(), args.questions, args.weights)
        .execute::<InferBackend>(&device)?;
    println!("Accuracy/test: {:.4} ({}/{})", eval.accuracy(), eval.correct, eval.total);
    Ok(())
}

fn run_train_cp(args: TrainCpArgs) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let summary = TrainCpUseCase::new((&args).into(), args.samples, args.model_config)
        .execute::<TrainBackend>(&device)?;
    match (summary.best_epoch, summary.best_auc) {
        (Some(epoch), Some(auc)) => println!("Training complete. Best val_auc {auc:.4} at epoch {epoch}."),
        _ => println!("Training complete. {} epochs run.", summary.epochs_run),
    }
    Ok(())
}
