//! Term scanning strategies.
//!
//! Each strategy takes a text, one term and an optional context rule and
//! returns every candidate span where the term occurs under that strategy's
//! policy. Candidates are raw: overlap between different terms is resolved
//! later by the engine, never here.

use crate::dict::{ContextRule, MatchKind};

/// Confidence contributed by an exact scan.
pub const EXACT_CONFIDENCE: f64 = 1.0;
/// Confidence contributed by a word-boundary scan.
pub const WORD_BOUNDARY_CONFIDENCE: f64 = 0.9;
/// Confidence contributed by a context-sensitive scan.
pub const CONTEXT_CONFIDENCE: f64 = 0.8;

/// Context window, in chars, for exact and word-boundary scans.
const NARROW_WINDOW: usize = 20;
/// Context window, in chars, for context-sensitive scans.
const WIDE_WINDOW: usize = 50;

/// A raw candidate span before overlap resolution.
///
/// `start`/`end` are byte offsets into the scanned text, always on char
/// boundaries; the span length used for ranking is measured in chars.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub term: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f64,
    pub strategy: MatchKind,
}

/// Scans `text` for `term` under the given strategy.
pub fn find_candidates(
    text: &str,
    term: &str,
    kind: MatchKind,
    context: Option<&ContextRule>,
) -> Vec<MatchCandidate> {
    if term.is_empty() {
        return Vec::new();
    }
    match kind {
        MatchKind::Exact => scan(
            text,
            term,
            context,
            NARROW_WINDOW,
            EXACT_CONFIDENCE,
            MatchKind::Exact,
            false,
        ),
        MatchKind::WordBoundary => scan(
            text,
            term,
            context,
            NARROW_WINDOW,
            WORD_BOUNDARY_CONFIDENCE,
            MatchKind::WordBoundary,
            true,
        ),
        MatchKind::ContextSensitive => {
            let positional = context.map_or(false, ContextRule::has_positional);
            if positional {
                scan(
                    text,
                    term,
                    context,
                    WIDE_WINDOW,
                    CONTEXT_CONFIDENCE,
                    MatchKind::ContextSensitive,
                    false,
                )
            } else {
                // No before/after patterns configured: behave exactly like a
                // word-boundary scan, confidence included.
                scan(
                    text,
                    term,
                    context,
                    NARROW_WINDOW,
                    WORD_BOUNDARY_CONFIDENCE,
                    MatchKind::WordBoundary,
                    true,
                )
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn scan(
    text: &str,
    term: &str,
    context: Option<&ContextRule>,
    window: usize,
    confidence: f64,
    strategy: MatchKind,
    require_boundary: bool,
) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();
    let mut from = 0;
    while let Some(found) = text[from..].find(term) {
        let start = from + found;
        let end = start + term.len();
        if (!require_boundary || at_cjk_boundary(text, start, end))
            && context_allows(text, start, end, term, context, window)
        {
            candidates.push(MatchCandidate {
                term: term.to_string(),
                start,
                end,
                confidence,
                strategy,
            });
        }
        // Advance one char past the match start so adjacent occurrences of
        // the same term are still found.
        from = start
            + text[start..]
                .chars()
                .next()
                .map_or(1, |ch| ch.len_utf8());
    }
    candidates
}

/// CJK Unified Ideographs block.
fn is_cjk(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

/// A span sits on a word boundary when the chars immediately around it are
/// not themselves CJK ideographs, i.e. the term is not a strict substring of
/// a longer CJK run.
fn at_cjk_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start].chars().next_back().map_or(true, |ch| !is_cjk(ch));
    let after_ok = text[end..].chars().next().map_or(true, |ch| !is_cjk(ch));
    before_ok && after_ok
}

/// Shared context validation.
///
/// Rejects the span when any exclude pattern occurs in the surrounding
/// window, or when a non-empty before/after pattern set has no hit in its
/// window. Absent categories impose no constraint.
fn context_allows(
    text: &str,
    start: usize,
    end: usize,
    term: &str,
    context: Option<&ContextRule>,
    window: usize,
) -> bool {
    let Some(rule) = context else {
        return true;
    };
    if rule.is_empty() {
        return true;
    }

    let before_text = window_before(text, start, window);
    let after_text = window_after(text, end, window);

    if !rule.exclude.is_empty() {
        let surrounding = format!("{before_text}{term}{after_text}");
        if rule.exclude.iter().any(|p| surrounding.contains(p.as_str())) {
            return false;
        }
    }
    if !rule.before.is_empty() && !rule.before.iter().any(|p| before_text.contains(p.as_str())) {
        return false;
    }
    if !rule.after.is_empty() && !rule.after.iter().any(|p| after_text.contains(p.as_str())) {
        return false;
    }
    true
}

/// Up to `window` chars immediately preceding `start`.
fn window_before(text: &str, start: usize, window: usize) -> &str {
    let head = &text[..start];
    let cut = head
        .char_indices()
        .rev()
        .nth(window.saturating_sub(1))
        .map_or(0, |(idx, _)| idx);
    &head[cut..]
}

/// Up to `window` chars immediately following `end`.
fn window_after(text: &str, end: usize, window: usize) -> &str {
    let tail = &text[end..];
    match tail.char_indices().nth(window) {
        Some((idx, _)) => &tail[..idx],
        None => tail,
    }
}
