//! Taiwan Script Guard core engine.
//! Scans documents for Simplified-Chinese characters and Mainland-Chinese
//! terminology and reports or rewrites them to Taiwan-standard Traditional
//! Chinese. Matching is lexical: dictionary terms are located by pluggable
//! scan strategies, overlapping candidates are resolved by span length,
//! confidence and position, and context windows suppress false positives.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use serde::Serialize;

pub mod convert;
pub mod dict;
pub mod engine;
pub mod matching;
pub mod position;
pub mod rules;
pub mod scope;

pub use convert::{Converter, TableConverter};
pub use dict::{
    CompiledDict, ContextRule, DictError, DictLookupEntry, DictionaryStore, MatchKind,
};
pub use engine::{MatchEngine, TermMatch};
pub use position::{PositionMapper, TextPosition};
pub use rules::{
    Issue, MainlandTermsRule, Severity, SimplifiedCharsRule, FILE_READ_ERROR, MAINLAND_TERMS,
    SIMPLIFIED_CHARS,
};
pub use scope::{
    default_blocks, parse_ignore_file, ConfigBlock, ConfigFile, RuleLevel, ScopeMatcher,
};

/// Findings for one file.
#[derive(Debug, Clone, Serialize)]
pub struct LintReport {
    pub path: PathBuf,
    pub issues: Vec<Issue>,
}

/// The linter facade: compiled configuration plus the dictionary cache,
/// reused across files.
///
/// Files are processed sequentially; the dictionary cache is the only state
/// shared between them, and eviction never disturbs findings that were
/// already produced.
pub struct Linter {
    scope: ScopeMatcher,
    store: DictionaryStore,
    simplified: SimplifiedCharsRule,
    mainland: MainlandTermsRule,
}

impl Linter {
    pub fn new(
        blocks: Vec<ConfigBlock>,
        converter: Arc<dyn Converter>,
        dict_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            scope: ScopeMatcher::new(blocks),
            store: DictionaryStore::new(dict_dir),
            simplified: SimplifiedCharsRule::new(Arc::clone(&converter)),
            mainland: MainlandTermsRule::new(converter),
        }
    }

    /// Default configuration, embedded conversion table, embedded core
    /// dictionary.
    pub fn with_defaults() -> Self {
        Self::new(default_blocks(), Arc::new(TableConverter::builtin()), None)
    }

    pub fn set_ignore_patterns(&mut self, patterns: Vec<String>) {
        self.scope.set_ignore_patterns(patterns);
    }

    pub fn scope(&self) -> &ScopeMatcher {
        &self.scope
    }

    /// Lints a text with every configured rule, no path filtering.
    pub fn lint_text(&mut self, text: &str) -> Vec<Issue> {
        let rules = self.scope.merged_rules();
        let dicts = self.scope.merged_dictionaries();
        self.run_rules(text, &rules, &dicts)
    }

    /// Lints a text as if it lived at `path`, honoring scope resolution.
    pub fn lint_path_text(&mut self, path: &str, text: &str) -> Vec<Issue> {
        if self.scope.is_ignored(path) {
            return Vec::new();
        }
        let rules = self.scope.rules_for(path);
        let dicts = self.scope.dictionaries_for(path);
        self.run_rules(text, &rules, &dicts)
    }

    /// Applies every enabled rule's safe fixes and returns the new text.
    pub fn fix_text(&mut self, text: &str) -> String {
        let rules = self.scope.merged_rules();
        let dicts = self.scope.merged_dictionaries();
        self.apply_fixes(text, &rules, &dicts)
    }

    pub fn fix_path_text(&mut self, path: &str, text: &str) -> String {
        if self.scope.is_ignored(path) {
            return text.to_string();
        }
        let rules = self.scope.rules_for(path);
        let dicts = self.scope.dictionaries_for(path);
        self.apply_fixes(text, &rules, &dicts)
    }

    /// Lints a batch of files. A file that cannot be read yields a single
    /// synthetic finding instead of aborting the batch.
    pub fn lint_files(&mut self, paths: &[PathBuf]) -> Vec<LintReport> {
        paths
            .iter()
            .map(|path| {
                let key = path_key(path);
                self.lint_file_as(path, &key)
            })
            .collect()
    }

    /// Lints one file, reading from `path` and resolving scope with `key`
    /// (usually the path relative to the configuration root).
    pub fn lint_file_as(&mut self, path: &Path, key: &str) -> LintReport {
        if self.scope.is_ignored(key) {
            return LintReport {
                path: path.to_path_buf(),
                issues: Vec::new(),
            };
        }
        let issues = match fs::read_to_string(path) {
            Ok(text) => self.lint_path_text(key, &text),
            Err(err) => vec![read_error_issue(&err)],
        };
        LintReport {
            path: path.to_path_buf(),
            issues,
        }
    }

    /// Fixes one file in place. The whole fixed text is computed before a
    /// single byte is written; returns whether the file changed.
    pub fn fix_file(&mut self, path: &Path) -> anyhow::Result<bool> {
        let key = path_key(path);
        self.fix_file_as(path, &key)
    }

    /// In-place fix with an explicit scope key.
    pub fn fix_file_as(&mut self, path: &Path, key: &str) -> anyhow::Result<bool> {
        if self.scope.is_ignored(key) {
            return Ok(false);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let fixed = self.fix_path_text(key, &text);
        if fixed == text {
            return Ok(false);
        }
        fs::write(path, &fixed).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }

    fn run_rules(
        &mut self,
        text: &str,
        rules: &BTreeMap<String, RuleLevel>,
        dict_names: &[String],
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        if let Some(severity) = rules.get(SIMPLIFIED_CHARS).and_then(|l| l.severity()) {
            issues.extend(self.simplified.check(text, severity));
        }
        if rules
            .get(MAINLAND_TERMS)
            .map_or(false, |l| l.severity().is_some())
        {
            let engine = self.engine_for(dict_names);
            issues.extend(self.mainland.check(text, &engine));
        }
        issues.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));
        issues
    }

    fn apply_fixes(
        &mut self,
        text: &str,
        rules: &BTreeMap<String, RuleLevel>,
        dict_names: &[String],
    ) -> String {
        let mut fixed = text.to_string();
        // Character conversion runs first: the term dictionaries are keyed
        // in traditional script.
        if rules
            .get(SIMPLIFIED_CHARS)
            .map_or(false, |l| l.severity().is_some())
        {
            fixed = self.simplified.fix(&fixed);
        }
        if rules
            .get(MAINLAND_TERMS)
            .map_or(false, |l| l.severity().is_some())
        {
            let engine = self.engine_for(dict_names);
            fixed = self.mainland.fix(&fixed, &engine);
        }
        fixed
    }

    fn engine_for(&mut self, names: &[String]) -> MatchEngine {
        let mut dicts = Vec::new();
        for name in names {
            match self.store.load(name) {
                Ok(dict) => dicts.push(dict),
                // One broken dictionary must not abort the lint.
                Err(err) => log::warn!("skipping dictionary: {err}"),
            }
        }
        MatchEngine::new(dicts)
    }
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn read_error_issue(err: &std::io::Error) -> Issue {
    Issue {
        line: 1,
        column: 1,
        message: format!("無法讀取檔案: {err}"),
        severity: Severity::Error,
        rule: FILE_READ_ERROR.to_string(),
        suggestions: Vec::new(),
        fixable: false,
    }
}
