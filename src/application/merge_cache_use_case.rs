// ============================================================
// Layer 2 — MergeCacheUseCase
// ============================================================
// Loads every shard written by the precompute workers and
// reports the merged catalog.

use anyhow::{Context, Result};

use crate::application::run_config::RunConfig;
use crate::domain::traits::EmbeddingLookup;
use crate::infra::embedding_cache::EmbeddingCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReport {
    pub rows:   usize,
    pub unique: usize,
    pub dim:    usize,
}

pub struct MergeCacheUseCase {
    config: RunConfig,
}

impl MergeCacheUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<CacheReport> {
        let cfg = &self.config;
        cfg.validate()?;

        let cache = EmbeddingCache::load(&cfg.cache_dir, &cfg.cache_prefix)
            .with_context(|| format!("Cannot merge embedding cache in '{}'", cfg.cache_dir.display()))?;

        let report = CacheReport { rows: cache.len(), unique: cache.unique_len(), dim: cache.dim() };
        if report.rows != report.unique {
            tracing::warn!("{} duplicate ids across shards, later shards win", report.rows - report.unique);
        }
        Ok(report)
    }
}
