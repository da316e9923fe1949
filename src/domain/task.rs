// ============================================================
// Layer 3 — Task Kinds
// ============================================================
// The four things the outfit model can be asked to do.
//
// Callers outside the crate (config files, CLI flags, data
// pipelines) name tasks with string tags. Parsing a tag is the
// only place a task can be "unknown": once a TaskKind exists,
// every kind has a forward path, and the dispatcher's match
// over OutfitTask is exhaustive, so a new kind without a
// handler does not build.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::OutfitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Score a whole outfit
    CompatibilityPrediction,
    /// Predict the embedding of a missing item from context + description
    ComplementaryItemRetrieval,
    /// CIR evaluated by ranking a small candidate set
    FillInTheBlank,
    /// Run the item encoder once per item for the embedding cache
    PrecomputeEmbedding,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::CompatibilityPrediction,
        TaskKind::ComplementaryItemRetrieval,
        TaskKind::FillInTheBlank,
        TaskKind::PrecomputeEmbedding,
    ];

    /// Short external tag.
    pub fn tag(self) -> &'static str {
        match self {
            TaskKind::CompatibilityPrediction    => "cp",
            TaskKind::ComplementaryItemRetrieval => "cir",
            TaskKind::FillInTheBlank             => "fitb",
            TaskKind::PrecomputeEmbedding        => "precompute",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TaskKind {
    type Err = OutfitError;

    /// Accepts the short tag or the snake_case long name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cp" | "compatibility_prediction"       => Ok(TaskKind::CompatibilityPrediction),
            "cir" | "complementary_item_retrieval"  => Ok(TaskKind::ComplementaryItemRetrieval),
            "fitb" | "fill_in_the_blank"            => Ok(TaskKind::FillInTheBlank),
            "precompute" | "precompute_embedding"   => Ok(TaskKind::PrecomputeEmbedding),
            _ => Err(OutfitError::unsupported_task(s)),
        }
    }
}
