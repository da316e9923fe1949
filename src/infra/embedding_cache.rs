// ============================================================
// Layer 6 — Embedding Cache
// ============================================================
// Precomputed item embeddings on disk, one JSON shard per
// worker rank:
//
//   cache/
//     clip_embeddings_0.json   ← { "ids": [..], "embeddings": [[..], ..] }
//     clip_embeddings_1.json
//     ...
//
// Loading lists the directory, keeps `{prefix}*.json`, sorts the
// names and concatenates shards in that order. A later shard
// overrides an earlier one for lookup when an id repeats.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::item::FashionItem;
use crate::domain::traits::EmbeddingLookup;
use crate::error::{OutfitError, Result};
use crate::ml::dispatcher::{OutfitTask, PrecomputeInput, TaskDispatcher};
use crate::ml::item_encoder::ItemEncoder;
use crate::ml::model::tensor_to_vec;

/// One worker's slice of the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingShard {
    pub ids:        Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
}

impl EmbeddingShard {
    /// Row width, or None for an empty shard.
    fn check(&self) -> Result<Option<usize>> {
        if self.ids.len() != self.embeddings.len() {
            return Err(OutfitError::shape("shard rows", self.ids.len(), self.embeddings.len()));
        }
        let dim = self.embeddings.first().map(Vec::len);
        if let Some(d) = dim {
            if let Some(row) = self.embeddings.iter().find(|row| row.len() != d) {
                return Err(OutfitError::shape("shard embedding width", d, row.len()));
            }
        }
        Ok(dim)
    }
}

pub fn shard_path(dir: &Path, prefix: &str, rank: usize) -> PathBuf {
    dir.join(format!("{prefix}{rank}.json"))
}

pub fn write_shard(dir: &Path, prefix: &str, rank: usize, shard: &EmbeddingShard) -> Result<PathBuf> {
    shard.check()?;
    fs::create_dir_all(dir)?;
    let path = shard_path(dir, prefix, rank);
    fs::write(&path, serde_json::to_string(shard)?)?;
    tracing::info!("Wrote {} embeddings to '{}'", shard.ids.len(), path.display());
    Ok(path)
}

/// The merged catalog: ids and rows in shard order, plus an id index.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    ids:        Vec<String>,
    embeddings: Vec<Vec<f32>>,
    index:      HashMap<String, usize>,
    dim:        usize,
}

impl EmbeddingCache {
    pub fn load(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let missing = || OutfitError::MissingEmbeddingCache {
            dir:    dir.to_path_buf(),
            prefix: prefix.to_string(),
        };

        let entries = fs::read_dir(dir).map_err(|_| missing())?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with(prefix) && n.ends_with(".json"));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(missing());
        }
        paths.sort();

        let mut shards = Vec::with_capacity(paths.len());
        for path in &paths {
            tracing::debug!("Reading shard '{}'", path.display());
            shards.push(serde_json::from_str::<EmbeddingShard>(&fs::read_to_string(path)?)?);
        }
        let cache = Self::from_shards(shards)?;
        tracing::info!(
            "Loaded {} embeddings (dim {}) from {} shards in '{}'",
            cache.len(), cache.dim, paths.len(), dir.display()
        );
        Ok(cache)
    }

    /// Concatenate shards in the given order.
    pub fn from_shards(shards: Vec<EmbeddingShard>) -> Result<Self> {
        let mut dim: Option<usize> = None;
        let mut ids        = Vec::new();
        let mut embeddings = Vec::new();

        for shard in shards {
            if let Some(d) = shard.check()? {
                match dim {
                    Some(expected) if expected != d => {
                        return Err(OutfitError::shape("shard embedding width", expected, d));
                    }
                    _ => dim = Some(d),
                }
            }
            ids.extend(shard.ids);
            embeddings.extend(shard.embeddings);
        }

        let index = ids.iter().enumerate().map(|(row, id)| (id.clone(), row)).collect();
        Ok(Self { ids, embeddings, index, dim: dim.unwrap_or(0) })
    }

    /// Number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn unique_len(&self) -> usize {
        self.index.len()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Brute-force L2 top-k, ascending distance. Ties keep catalog order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if query.len() != self.dim {
            return Err(OutfitError::shape("query embedding width", self.dim, query.len()));
        }
        let mut scored: Vec<(usize, f32)> = self
            .index
            .values()
            .map(|&row| {
                let d2: f32 = self.embeddings[row]
                    .iter()
                    .zip(query)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (row, d2.sqrt())
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(row, d)| (self.ids[row].clone(), d)).collect())
    }
}

impl EmbeddingLookup for EmbeddingCache {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embedding(&self, id: &str) -> Option<&[f32]> {
        self.index.get(id).map(|&row| self.embeddings[row].as_slice())
    }
}

/// Embed `items` in batches of `batch_size` and write them as shard `rank`.
pub fn precompute_shard<B: Backend, E: ItemEncoder<B>>(
    dispatcher: &TaskDispatcher<'_, B, E>,
    items:      &[FashionItem],
    batch_size: usize,
    dir:        &Path,
    prefix:     &str,
    rank:       usize,
) -> Result<PathBuf> {
    let mut shard = EmbeddingShard::default();
    for chunk in items.chunks(batch_size.max(1)) {
        let output = dispatcher.dispatch(OutfitTask::PrecomputeEmbedding(PrecomputeInput {
            items: chunk.to_vec(),
        }))?;
        let tensor = output.into_tensor();
        let [_, d_embed] = tensor.dims();
        let flat = tensor_to_vec(tensor)?;
        shard.ids.extend(chunk.iter().map(|item| item.id.clone()));
        shard.embeddings.extend(flat.chunks(d_embed.max(1)).map(<[f32]>::to_vec));
    }
    write_shard(dir, prefix, rank, &shard)
}
