// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The data pipeline and the evaluators only need to look item
// embeddings up by id. They program against EmbeddingLookup so
// the merged on-disk cache and a plain in-memory map used in
// tests are interchangeable.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::collections::HashMap;

// ─── EmbeddingLookup ──────────────────────────────────────────────────────────
/// Anything that maps catalog item ids to embeddings of one fixed width.
///
/// Implementations:
///   - EmbeddingCache → merged shard files
///   - HashMap<String, Vec<f32>> → ad-hoc catalogs
pub trait EmbeddingLookup {
    /// Width of every embedding returned by this lookup
    fn dim(&self) -> usize;

    /// The embedding for `id`, if the catalog knows it
    fn embedding(&self, id: &str) -> Option<&[f32]>;

    /// Resolve a list of ids; the first unknown id is returned as the error.
    fn resolve_all(&self, ids: &[String]) -> Result<Vec<Vec<f32>>, String> {
        ids.iter()
            .map(|id| {
                self.embedding(id)
                    .map(<[f32]>::to_vec)
                    .ok_or_else(|| id.clone())
            })
            .collect()
    }
}

impl EmbeddingLookup for HashMap<String, Vec<f32>> {
    fn dim(&self) -> usize {
        self.values().next().map(Vec::len).unwrap_or(0)
    }

    fn embedding(&self, id: &str) -> Option<&[f32]> {
        self.get(id).map(Vec::as_slice)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_all_reports_first_missing_id() {
        let mut catalog = HashMap::new();
        catalog.insert("a".to_string(), vec![1.0, 2.0]);
        catalog.insert("b".to_string(), vec![3.0, 4.0]);

        let ids = vec!["a".to_string(), "zz".to_string(), "b".to_string()];
        assert_eq!(catalog.resolve_all(&ids).unwrap_err(), "zz");

        let ids = vec!["b".to_string(), "a".to_string()];
        assert_eq!(
            catalog.resolve_all(&ids).unwrap(),
            vec![vec![3.0, 4.0], vec![1.0, 2.0]]
        );
        assert_eq!(catalog.dim(), 2);
    }
}
