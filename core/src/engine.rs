//! Dictionary match engine.
//!
//! Collects raw candidates from every loaded dictionary, then resolves
//! overlapping and nested spans into the authoritative, non-overlapping,
//! position-ordered match set. The resolution policy is the heart of the
//! tool: span length (in chars) beats confidence beats earlier position.

use std::{collections::HashSet, sync::Arc};

use aho_corasick::AhoCorasickBuilder;

use crate::dict::{surface_term, CompiledDict, MatchKind};
use crate::matching::find_candidates;

/// A resolved dictionary match.
#[derive(Debug, Clone)]
pub struct TermMatch {
    pub term: String,
    pub replacement: String,
    /// Byte offsets into the scanned text, half-open, on char boundaries.
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub strategy: MatchKind,
    /// `<dictionary>-<strategy>` identifier, e.g. `core-exact`.
    pub rule: String,
    pub autofix_safe: bool,
}

impl TermMatch {
    /// Identity matches exist only to occupy their span so that shorter,
    /// incorrect entries nested inside cannot fire. The rule layer filters
    /// them out of user-facing output.
    pub fn is_identity(&self) -> bool {
        self.term == self.replacement
    }

    fn char_len(&self) -> usize {
        self.term.chars().count()
    }
}

/// Runs every loaded dictionary over a text and resolves overlaps.
pub struct MatchEngine {
    dicts: Vec<Arc<CompiledDict>>,
}

impl MatchEngine {
    pub fn new(dicts: Vec<Arc<CompiledDict>>) -> Self {
        Self { dicts }
    }

    pub fn is_empty(&self) -> bool {
        self.dicts.is_empty()
    }

    /// Produces the final, non-overlapping, position-ordered match set.
    pub fn find_matches(&self, text: &str) -> Vec<TermMatch> {
        let mut pool = self.collect_candidates(text);

        // Longer spans first, then higher confidence, then earlier position.
        // The sort is stable, so equal keys keep dictionary load order.
        pool.sort_by(|a, b| {
            b.char_len()
                .cmp(&a.char_len())
                .then_with(|| b.confidence.total_cmp(&a.confidence))
                .then_with(|| a.start.cmp(&b.start))
        });

        // Greedy interval selection over a per-byte occupancy bitmap: the
        // best-ranked candidate at any contested position wins outright.
        let mut occupied = vec![false; text.len()];
        let mut accepted = Vec::new();
        for candidate in pool {
            if occupied[candidate.start..candidate.end].iter().any(|&o| o) {
                continue;
            }
            for slot in &mut occupied[candidate.start..candidate.end] {
                *slot = true;
            }
            accepted.push(candidate);
        }

        accepted.sort_by_key(|m| m.start);
        accepted
    }

    fn collect_candidates(&self, text: &str) -> Vec<TermMatch> {
        let mut pool = Vec::new();
        for dict in &self.dicts {
            if dict.lookup.is_empty() {
                continue;
            }

            // One automaton pass decides which surface terms occur at all;
            // the per-term strategies then run only for those. The accepted
            // set is identical with or without this prescan. Variant keys
            // share a surface term, so presence is tracked per term string.
            let mut terms: Vec<&str> = dict.lookup.keys().map(|key| surface_term(key)).collect();
            terms.sort_unstable();
            terms.dedup();
            let automaton = AhoCorasickBuilder::new().build(&terms);
            let mut present: HashSet<&str> = HashSet::new();
            for hit in automaton.find_overlapping_iter(text) {
                present.insert(terms[hit.pattern()]);
            }

            for (key, entry) in &dict.lookup {
                let term = surface_term(key);
                if !present.contains(term) {
                    continue;
                }
                for candidate in
                    find_candidates(text, term, entry.match_strategy, entry.context.as_ref())
                {
                    pool.push(TermMatch {
                        term: candidate.term,
                        replacement: entry.replacement.clone(),
                        start: candidate.start,
                        end: candidate.end,
                        confidence: entry.confidence * candidate.confidence,
                        strategy: candidate.strategy,
                        rule: format!("{}-{}", dict.name, candidate.strategy.as_str()),
                        autofix_safe: entry.autofix_safe,
                    });
                }
            }
        }
        pool
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dict::{ContextRule, DictLookupEntry};

    fn dict(name: &str, entries: &[(&str, &str, f64)]) -> Arc<CompiledDict> {
        let lookup = entries
            .iter()
            .map(|(term, replacement, confidence)| {
                (
                    term.to_string(),
                    DictLookupEntry {
                        replacement: replacement.to_string(),
                        confidence: *confidence,
                        ..DictLookupEntry::default()
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        Arc::new(CompiledDict {
            name: name.to_string(),
            version: "1".to_string(),
            lookup,
        })
    }

    fn terms(matches: &[TermMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.term.as_str()).collect()
    }

    #[test]
    fn longest_match_wins_triple_overlap() {
        let engine = MatchEngine::new(vec![dict(
            "overlap",
            &[
                ("電", "電", 0.5),
                ("電腦", "電腦", 0.8),
                ("個人電腦", "個人電腦", 1.0),
            ],
        )]);
        let matches = engine.find_matches("這是一台個人電腦");
        assert_eq!(terms(&matches), vec!["個人電腦"]);
    }

    #[test]
    fn longer_term_beats_partial_overlap() {
        let engine = MatchEngine::new(vec![dict(
            "partial",
            &[("ABC", "ABC_TW", 0.9), ("BCDE", "BCDE_TW", 0.9)],
        )]);
        let matches = engine.find_matches("ABCDE");
        assert_eq!(terms(&matches), vec!["BCDE"]);
    }

    #[test]
    fn shorter_term_still_matches_standalone() {
        let engine = MatchEngine::new(vec![dict("d", &[("算法", "演算法", 0.8)])]);
        let matches = engine.find_matches("這個算法很複雜");
        assert_eq!(terms(&matches), vec!["算法"]);
    }

    #[test]
    fn identity_entry_blocks_nested_term() {
        let engine = MatchEngine::new(vec![dict(
            "d",
            &[("算法", "演算法", 0.8), ("演算法", "演算法", 1.0)],
        )]);
        let matches = engine.find_matches("我們正在研究新的演算法設計");
        assert_eq!(terms(&matches), vec!["演算法"]);
        assert!(matches[0].is_identity());
    }

    #[test]
    fn adjacent_matches_both_survive() {
        let engine = MatchEngine::new(vec![dict(
            "d",
            &[("算法", "演算法", 0.8), ("設計", "設計規劃", 0.8)],
        )]);
        let matches = engine.find_matches("算法設計");
        assert_eq!(terms(&matches), vec!["算法", "設計"]);
        assert!(matches[0].end <= matches[1].start);
    }

    #[test]
    fn equal_span_resolved_by_confidence() {
        // Same span, two variant entries with different confidence: the
        // higher-confidence replacement wins.
        let mut lookup = BTreeMap::new();
        lookup.insert(
            "對象".to_string(),
            DictLookupEntry {
                replacement: "物件".to_string(),
                confidence: 0.6,
                ..DictLookupEntry::default()
            },
        );
        lookup.insert(
            "對象#高".to_string(),
            DictLookupEntry {
                replacement: "物件實體".to_string(),
                confidence: 0.9,
                ..DictLookupEntry::default()
            },
        );
        let engine = MatchEngine::new(vec![Arc::new(CompiledDict {
            name: "d".to_string(),
            version: "1".to_string(),
            lookup,
        })]);
        let matches = engine.find_matches("建立對象");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].replacement, "物件實體");
    }

    #[test]
    fn equal_everything_keeps_load_order() {
        let first = dict("first", &[("接口", "介面", 0.9)]);
        let second = dict("second", &[("接口", "界面", 0.9)]);
        let engine = MatchEngine::new(vec![first, second]);
        let matches = engine.find_matches("這個接口很穩定");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rule, "first-exact");
    }

    #[test]
    fn no_two_accepted_matches_share_any_offset() {
        let engine = MatchEngine::new(vec![dict(
            "d",
            &[
                ("軟件", "軟體", 1.0),
                ("軟件開發", "軟體開發", 0.9),
                ("開發", "開發", 0.8),
                ("發網", "發網", 0.7),
                ("網絡", "網路", 1.0),
            ],
        )]);
        let matches = engine.find_matches("軟件開發網絡軟件開發");
        for (i, a) in matches.iter().enumerate() {
            for b in &matches[i + 1..] {
                assert!(a.end <= b.start || b.end <= a.start, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn variant_entries_add_parallel_candidates() {
        let mut lookup = BTreeMap::new();
        lookup.insert(
            "質量".to_string(),
            DictLookupEntry {
                replacement: "品質".to_string(),
                confidence: 0.8,
                match_strategy: MatchKind::ContextSensitive,
                context: Some(ContextRule {
                    before: vec!["產品".into()],
                    ..ContextRule::default()
                }),
                ..DictLookupEntry::default()
            },
        );
        lookup.insert(
            "質量#物理".to_string(),
            DictLookupEntry {
                replacement: "質量".to_string(),
                confidence: 1.0,
                match_strategy: MatchKind::ContextSensitive,
                context: Some(ContextRule {
                    before: vec!["物理".into()],
                    ..ContextRule::default()
                }),
                ..DictLookupEntry::default()
            },
        );
        let engine = MatchEngine::new(vec![Arc::new(CompiledDict {
            name: "d".to_string(),
            version: "1".to_string(),
            lookup,
        })]);

        let product = engine.find_matches("產品質量提升");
        assert_eq!(product.len(), 1);
        assert_eq!(product[0].replacement, "品質");

        let physics = engine.find_matches("物理質量守恆");
        assert_eq!(physics.len(), 1);
        assert!(physics[0].is_identity());
    }

    #[test]
    fn empty_text_matches_nothing() {
        let engine = MatchEngine::new(vec![dict("d", &[("軟件", "軟體", 1.0)])]);
        assert!(engine.find_matches("").is_empty());
    }
}
