//! Shared collection aliases and numeric helpers.

pub use rustc_hash::{FxHashMap, FxHashSet};

// ═══════════════════════════════════════════════════════════════════════════════
// IndexMap - insertion ordered, FxHasher
// ═══════════════════════════════════════════════════════════════════════════════

pub type IndexMap<K, V> =
    indexmap::IndexMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;

/// Create an empty IndexMap
#[inline]
pub fn index_map_new<K, V>() -> IndexMap<K, V>
where
    K: core::hash::Hash + Eq,
{
    indexmap::IndexMap::with_hasher(Default::default())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Math functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Truncation with identical results on every target
pub mod math {
    #[inline]
    pub fn trunc(x: f64) -> f64 {
        libm::trunc(x)
    }
}
