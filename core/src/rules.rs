//! Linting rules built on top of the match engine.
//!
//! Two rules exist: simplified-character detection (character-level diff
//! against the converted text) and mainland-term detection (dictionary
//! matching over a converted copy, reported against original coordinates).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::convert::Converter;
use crate::dict::MatchKind;
use crate::engine::{MatchEngine, TermMatch};
use crate::position::PositionMapper;

pub const SIMPLIFIED_CHARS: &str = "simplified-chars";
pub const MAINLAND_TERMS: &str = "mainland-terms";
pub const FILE_READ_ERROR: &str = "file-read-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(name)
    }
}

/// A user-facing finding. Line and column are 1-based; columns count chars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub severity: Severity,
    pub rule: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub fixable: bool,
}

/// 1-based line/column of a byte offset, scanning from the start of text.
pub(crate) fn offset_to_location(text: &str, byte_offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut last_newline = 0;
    for (idx, ch) in text.char_indices() {
        if idx >= byte_offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            last_newline = idx + 1;
        }
    }
    let column = text[last_newline..byte_offset].chars().count() + 1;
    (line, column)
}

/// Flags every character the converter would change.
pub struct SimplifiedCharsRule {
    converter: Arc<dyn Converter>,
}

impl SimplifiedCharsRule {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self { converter }
    }

    pub fn check(&self, text: &str, severity: Severity) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (line_index, line) in text.split('\n').enumerate() {
            let converted = self.converter.convert(line);
            if line == converted {
                continue;
            }
            // Conversion is one character to one character in this domain,
            // so a positional zip pinpoints each offending char.
            for (char_index, (original, replacement)) in
                line.chars().zip(converted.chars()).enumerate()
            {
                if original != replacement {
                    issues.push(Issue {
                        line: line_index + 1,
                        column: char_index + 1,
                        message: format!("簡體字 '{original}' 建議使用繁體字 '{replacement}'"),
                        severity,
                        rule: SIMPLIFIED_CHARS.to_string(),
                        suggestions: vec![replacement.to_string()],
                        fixable: true,
                    });
                }
            }
        }
        issues
    }

    pub fn fix(&self, text: &str) -> String {
        self.converter.convert(text)
    }
}

/// Flags dictionary terms, reporting against original coordinates.
///
/// Input is normalized through the converter before lookup because the
/// dictionaries are keyed in traditional or mixed script.
pub struct MainlandTermsRule {
    converter: Arc<dyn Converter>,
}

impl MainlandTermsRule {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self { converter }
    }

    pub fn check(&self, text: &str, engine: &MatchEngine) -> Vec<Issue> {
        if engine.is_empty() {
            return Vec::new();
        }
        let converted = self.converter.convert(text);
        let mapper = PositionMapper::new(text, &converted);

        let mut issues = Vec::new();
        for m in engine.find_matches(&converted) {
            if m.is_identity() {
                continue;
            }
            let (line, column) = offset_to_location(&converted, m.start);
            let position = mapper.map_to_original(line, column);
            let severity = if m.autofix_safe {
                Severity::Warning
            } else {
                Severity::Info
            };
            let message = if m.strategy == MatchKind::ContextSensitive {
                format!(
                    "疑似大陸用語 '{}'，請確認語境後改用 '{}'",
                    m.term, m.replacement
                )
            } else {
                format!("大陸用語 '{}' 建議使用臺灣用語 '{}'", m.term, m.replacement)
            };
            issues.push(Issue {
                line: position.line,
                column: position.column,
                message,
                severity,
                rule: MAINLAND_TERMS.to_string(),
                suggestions: vec![m.replacement.clone()],
                fixable: m.autofix_safe,
            });
        }
        issues
    }

    /// Applies autofix-safe replacements, last match first so earlier spans
    /// stay valid while later ones are spliced.
    pub fn fix(&self, text: &str, engine: &MatchEngine) -> String {
        if engine.is_empty() {
            return text.to_string();
        }
        let converted = self.converter.convert(text);
        let mut matches: Vec<TermMatch> = engine
            .find_matches(&converted)
            .into_iter()
            .filter(|m| m.autofix_safe && !m.is_identity())
            .collect();
        matches.sort_by(|a, b| b.start.cmp(&a.start));

        // Byte offsets of each char, with a trailing sentinel, for both the
        // converted text (where the matches live) and the original (where
        // the splices happen). Conversion is 1:1 per char, so char indices
        // transfer directly between the two.
        let converted_bytes: Vec<usize> = char_offsets(&converted);
        let original_bytes: Vec<usize> = char_offsets(text);
        if converted_bytes.len() != original_bytes.len() {
            // Length-changing converter: offsets no longer transfer.
            log::warn!("converter changed text length; skipping term fixes");
            return text.to_string();
        }

        let mut fixed = text.to_string();
        for m in matches {
            let Ok(start_char) = converted_bytes.binary_search(&m.start) else {
                continue;
            };
            let Ok(end_char) = converted_bytes.binary_search(&m.end) else {
                continue;
            };
            fixed.replace_range(original_bytes[start_char]..original_bytes[end_char], &m.replacement);
        }
        fixed
    }
}

fn char_offsets(text: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    offsets.push(text.len());
    offsets
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::convert::TableConverter;
    use crate::dict::{CompiledDict, DictLookupEntry};

    fn converter() -> Arc<dyn Converter> {
        Arc::new(TableConverter::builtin())
    }

    fn engine(entries: &[(&str, &str, f64, bool)]) -> MatchEngine {
        let lookup = entries
            .iter()
            .map(|(term, replacement, confidence, safe)| {
                (
                    term.to_string(),
                    DictLookupEntry {
                        replacement: replacement.to_string(),
                        confidence: *confidence,
                        autofix_safe: *safe,
                        ..DictLookupEntry::default()
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        MatchEngine::new(vec![Arc::new(CompiledDict {
            name: "test".to_string(),
            version: "1".to_string(),
            lookup,
        })])
    }

    #[test]
    fn simplified_rule_flags_each_differing_char() {
        let rule = SimplifiedCharsRule::new(converter());
        let issues = rule.check("这是简体字", Severity::Error);
        let columns: Vec<usize> = issues.iter().map(|i| i.column).collect();
        assert_eq!(columns, vec![1, 3, 4]);
        assert!(issues.iter().all(|i| i.fixable));
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn simplified_rule_reports_line_numbers() {
        let rule = SimplifiedCharsRule::new(converter());
        let issues = rule.check("繁體沒問題\n这一行有简体", Severity::Error);
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|i| i.line == 2));
    }

    #[test]
    fn simplified_fix_converts_whole_text() {
        let rule = SimplifiedCharsRule::new(converter());
        assert_eq!(rule.fix("这是简体字"), "這是簡體字");
    }

    #[test]
    fn mainland_rule_reports_term_with_suggestion() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("軟件", "軟體", 1.0, true)]);
        let issues = rule.check("這個軟件不錯", &engine);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].suggestions, vec!["軟體".to_string()]);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].fixable);
        assert_eq!((issues[0].line, issues[0].column), (1, 3));
    }

    #[test]
    fn unsafe_match_downgrades_to_info() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("用戶", "使用者", 0.75, false)]);
        let issues = rule.check("用戶中心", &engine);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Info);
        assert!(!issues[0].fixable);
    }

    #[test]
    fn identity_match_is_suppressed_in_check_and_fix() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("容器", "容器", 0.8, true)]);
        let text = "容器技術";
        assert!(rule.check(text, &engine).is_empty());
        assert_eq!(rule.fix(text, &engine), text);
    }

    #[test]
    fn fix_applies_only_autofix_safe_matches() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("軟件", "軟體", 1.0, true), ("用戶", "使用者", 0.75, false)]);
        assert_eq!(rule.fix("軟件給用戶", &engine), "軟體給用戶");
    }

    #[test]
    fn fix_handles_multiple_matches_without_offset_drift() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("軟件", "軟體", 1.0, true), ("網絡", "網路", 1.0, true)]);
        assert_eq!(rule.fix("軟件和網絡和軟件", &engine), "軟體和網路和軟體");
    }

    #[test]
    fn findings_point_at_original_simplified_text() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("軟件", "軟體", 1.0, true)]);
        // Simplified input: matching runs on the converted copy, the issue
        // must still point at the simplified original.
        let issues = rule.check("第一行\n这个软件好", &engine);
        assert_eq!(issues.len(), 1);
        assert_eq!((issues[0].line, issues[0].column), (2, 3));
    }

    #[test]
    fn fix_rewrites_matches_found_through_conversion() {
        let rule = MainlandTermsRule::new(converter());
        let engine = engine(&[("軟件", "軟體", 1.0, true)]);
        // 软件 converts to 軟件, matches, and the splice lands on the
        // original's span.
        assert_eq!(rule.fix("这个软件好", &engine), "这个軟體好");
    }
}
