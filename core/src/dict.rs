//! Dictionary data model and the cached dictionary store.
//!
//! A compiled dictionary is a flat JSON document mapping source terms to
//! replacement metadata. Dictionaries are loaded lazily by name and held in a
//! bounded LRU cache; eviction only ever affects future loads, never match
//! results that were already computed.

use std::{
    collections::BTreeMap,
    fs,
    num::NonZeroUsize,
    path::PathBuf,
    sync::Arc,
};

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Separates a variant key (`術語#qualifier`) from its base term.
///
/// The qualifier documents why the variant exists; matching always runs
/// against the base term with the variant entry's own strategy and context.
pub const VARIANT_SEPARATOR: char = '#';

/// Default capacity of the dictionary cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

static BUILTIN_CORE: &str = include_str!("../data/core.json");

/// Which scan algorithm looks for a term's occurrences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Exact,
    WordBoundary,
    ContextSensitive,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::WordBoundary => "word-boundary",
            MatchKind::ContextSensitive => "context-sensitive",
        }
    }
}

/// Inclusion/exclusion patterns gating a lexical match.
///
/// Patterns are literal substrings tested against fixed-size windows around a
/// candidate span. An empty list means "no constraint" for that category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRule {
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub exclude: Vec<String>,
}

impl ContextRule {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty() && self.exclude.is_empty()
    }

    /// Whether the rule constrains what must precede or follow the match.
    pub fn has_positional(&self) -> bool {
        !self.before.is_empty() || !self.after.is_empty()
    }
}

/// One dictionary entry for one source term variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictLookupEntry {
    pub replacement: String,
    pub confidence: f64,
    pub category: String,
    pub reason: String,
    pub match_strategy: MatchKind,
    pub context: Option<ContextRule>,
    pub autofix_safe: bool,
}

impl Default for DictLookupEntry {
    fn default() -> Self {
        Self {
            replacement: String::new(),
            confidence: 1.0,
            category: String::new(),
            reason: String::new(),
            match_strategy: MatchKind::Exact,
            context: None,
            autofix_safe: false,
        }
    }
}

/// An immutable compiled dictionary.
///
/// `lookup` is a `BTreeMap` so iteration order is deterministic; together
/// with a stable candidate sort this keeps equal-key tie-breaks identical
/// run to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompiledDict {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub lookup: BTreeMap<String, DictLookupEntry>,
}

/// Strips a variant qualifier, returning the surface term that is matched
/// against the text.
pub fn surface_term(key: &str) -> &str {
    key.split_once(VARIANT_SEPARATOR).map_or(key, |(base, _)| base)
}

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("dictionary `{0}` not found")]
    NotFound(String),

    #[error("failed to read dictionary `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dictionary `{name}`: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Loads dictionaries by name and caches them behind a bounded LRU.
///
/// Lookups hit the cache first, then `<dir>/<name>.json` when a directory is
/// configured, then the embedded `core` dictionary.
pub struct DictionaryStore {
    dir: Option<PathBuf>,
    cache: LruCache<String, Arc<CompiledDict>>,
}

impl DictionaryStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self::with_capacity(dir, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(dir: Option<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("nonzero cache capacity");
        Self {
            dir,
            cache: LruCache::new(capacity),
        }
    }

    /// Loads a dictionary, reusing the cached copy when present.
    pub fn load(&mut self, name: &str) -> Result<Arc<CompiledDict>, DictError> {
        if let Some(dict) = self.cache.get(name) {
            return Ok(Arc::clone(dict));
        }
        let dict = Arc::new(self.read_dict(name)?);
        self.cache.put(name.to_string(), Arc::clone(&dict));
        Ok(dict)
    }

    fn read_dict(&self, name: &str) -> Result<CompiledDict, DictError> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{name}.json"));
            if path.exists() {
                let text = fs::read_to_string(&path).map_err(|source| DictError::Io {
                    name: name.to_string(),
                    source,
                })?;
                return serde_json::from_str(&text).map_err(|source| DictError::Parse {
                    name: name.to_string(),
                    source,
                });
            }
        }
        if name == "core" {
            return serde_json::from_str(BUILTIN_CORE).map_err(|source| DictError::Parse {
                name: name.to_string(),
                source,
            });
        }
        Err(DictError::NotFound(name.to_string()))
    }

    /// Names of dictionaries reachable from this store, embedded one included.
    pub fn available(&self) -> Vec<String> {
        let mut names = vec!["core".to_string()];
        if let Some(dir) = &self.dir {
            if let Ok(entries) = fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.extension().and_then(|e| e.to_str()) == Some("json") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            names.push(stem.to_string());
                        }
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(replacement: &str) -> DictLookupEntry {
        DictLookupEntry {
            replacement: replacement.to_string(),
            ..DictLookupEntry::default()
        }
    }

    #[test]
    fn surface_term_strips_qualifier() {
        assert_eq!(surface_term("質量#物理"), "質量");
        assert_eq!(surface_term("質量"), "質量");
    }

    #[test]
    fn builtin_core_dictionary_parses() {
        let mut store = DictionaryStore::new(None);
        let dict = store.load("core").unwrap();
        assert_eq!(dict.name, "core");
        assert!(dict.lookup.contains_key("軟件"));
        assert!(dict.lookup["軟件"].autofix_safe);
    }

    #[test]
    fn load_reuses_cached_dictionary() {
        let mut store = DictionaryStore::new(None);
        let first = store.load("core").unwrap();
        let second = store.load("core").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cached_count(), 1);
    }

    #[test]
    fn unknown_dictionary_is_not_found() {
        let mut store = DictionaryStore::new(None);
        assert!(matches!(
            store.load("no-such-dict"),
            Err(DictError::NotFound(_))
        ));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let dir = std::env::temp_dir().join("tsg-dict-evict-test");
        fs::create_dir_all(&dir).unwrap();
        for name in ["a", "b", "c"] {
            let dict = CompiledDict {
                name: name.to_string(),
                version: "1".to_string(),
                lookup: BTreeMap::from([(name.to_string(), entry("x"))]),
            };
            fs::write(
                dir.join(format!("{name}.json")),
                serde_json::to_string(&dict).unwrap(),
            )
            .unwrap();
        }

        let mut store = DictionaryStore::with_capacity(Some(dir.clone()), 2);
        store.load("a").unwrap();
        store.load("b").unwrap();
        store.load("c").unwrap();
        assert_eq!(store.cached_count(), 2);
        // `a` was evicted but stays loadable from disk.
        assert!(store.load("a").is_ok());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn entry_defaults_follow_serde() {
        let json = r#"{ "replacement": "軟體" }"#;
        let entry: DictLookupEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.match_strategy, MatchKind::Exact);
        assert!((entry.confidence - 1.0).abs() < f64::EPSILON);
        assert!(!entry.autofix_safe);
    }
}
