//! Per-file configuration scope resolution.
//!
//! A configuration is an ordered list of blocks. For a candidate file the
//! system-level ignore patterns are checked first and cannot be overridden,
//! then the ignore file's patterns, then each block in order. Applicable
//! blocks' rule maps merge left to right with later blocks winning; their
//! dictionary lists concatenate and deduplicate.

use std::collections::BTreeMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::rules::Severity;

/// Paths that are never linted, regardless of configuration.
const SYSTEM_IGNORES: &[&str] = &[
    // Version control.
    "**/.git/**",
    "**/.svn/**",
    "**/.hg/**",
    // Third-party code and build output.
    "**/node_modules/**",
    "**/vendor/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/out/**",
    // Ignore files themselves.
    "**/.*ignore",
    // Environment and secrets.
    "**/.env",
    "**/.env.*",
    "**/.envrc",
    // Editor and OS noise.
    "**/.vscode/**",
    "**/.idea/**",
    "**/.DS_Store",
    "**/Thumbs.db",
    // Logs and scratch files.
    "**/*.log",
    "**/*.tmp",
    "**/logs/**",
];

static SYSTEM_IGNORE_SET: Lazy<GlobSet> = Lazy::new(|| {
    let mut builder = GlobSetBuilder::new();
    for pattern in SYSTEM_IGNORES {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().expect("system ignore globs are static")
});

/// Per-rule setting: a severity, or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    Error,
    Warning,
    Info,
    Off,
}

impl RuleLevel {
    pub fn severity(self) -> Option<Severity> {
        match self {
            RuleLevel::Error => Some(Severity::Error),
            RuleLevel::Warning => Some(Severity::Warning),
            RuleLevel::Info => Some(Severity::Info),
            RuleLevel::Off => None,
        }
    }
}

/// One configuration block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBlock {
    pub files: Vec<String>,
    pub ignores: Vec<String>,
    pub rules: BTreeMap<String, RuleLevel>,
    pub domains: Vec<String>,
    pub dictionaries: Vec<String>,
}

impl ConfigBlock {
    /// A block carrying only `ignores` excludes its patterns globally.
    fn is_global_ignore(&self) -> bool {
        !self.ignores.is_empty() && self.files.is_empty() && self.rules.is_empty()
    }

    fn applies_to(&self, path: &str) -> bool {
        if self.is_global_ignore() {
            return false;
        }
        if !self.files.is_empty() && !matches_any(path, &self.files) {
            return false;
        }
        !matches_any(path, &self.ignores)
    }
}

/// A config document is either a single block or an ordered list of blocks.
/// Normalized to a list at the boundary; nothing downstream sees the split.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConfigFile {
    Single(ConfigBlock),
    Many(Vec<ConfigBlock>),
}

impl ConfigFile {
    pub fn into_blocks(self) -> Vec<ConfigBlock> {
        match self {
            ConfigFile::Single(block) => vec![block],
            ConfigFile::Many(blocks) => blocks,
        }
    }
}

/// The default configuration when no config file exists.
pub fn default_blocks() -> Vec<ConfigBlock> {
    vec![ConfigBlock {
        files: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
        dictionaries: vec!["core".to_string()],
        rules: BTreeMap::from([
            (crate::rules::SIMPLIFIED_CHARS.to_string(), RuleLevel::Error),
            (crate::rules::MAINLAND_TERMS.to_string(), RuleLevel::Warning),
        ]),
        ..ConfigBlock::default()
    }]
}

/// Resolves which rules and dictionaries apply to a given file path.
pub struct ScopeMatcher {
    blocks: Vec<ConfigBlock>,
    ignore_file_patterns: Vec<String>,
}

impl ScopeMatcher {
    pub fn new(blocks: Vec<ConfigBlock>) -> Self {
        Self {
            blocks,
            ignore_file_patterns: Vec::new(),
        }
    }

    /// Installs patterns loaded from the ignore file.
    pub fn set_ignore_patterns(&mut self, patterns: Vec<String>) {
        self.ignore_file_patterns = patterns;
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        if SYSTEM_IGNORE_SET.is_match(Path::new(path)) {
            return true;
        }
        if matches_any(path, &self.ignore_file_patterns) {
            return true;
        }
        for block in &self.blocks {
            if block.is_global_ignore() && matches_any(path, &block.ignores) {
                return true;
            }
        }
        for block in &self.blocks {
            if block.is_global_ignore() {
                continue;
            }
            if !block.files.is_empty() && !matches_any(path, &block.files) {
                continue;
            }
            if matches_any(path, &block.ignores) {
                return true;
            }
        }
        false
    }

    /// Merged rule map for a file; later blocks override earlier ones.
    pub fn rules_for(&self, path: &str) -> BTreeMap<String, RuleLevel> {
        let mut merged = BTreeMap::new();
        if self.is_ignored(path) {
            return merged;
        }
        for block in &self.blocks {
            if block.applies_to(path) {
                for (name, level) in &block.rules {
                    merged.insert(name.clone(), *level);
                }
            }
        }
        merged
    }

    /// Dictionaries to load for a file.
    ///
    /// Domain lists always pull in `core`; explicit dictionary lists are
    /// taken as-is; with neither configured the core dictionary applies.
    pub fn dictionaries_for(&self, path: &str) -> Vec<String> {
        if self.is_ignored(path) {
            return Vec::new();
        }
        let mut domains = Vec::new();
        let mut dictionaries = Vec::new();
        for block in &self.blocks {
            if block.applies_to(path) {
                domains.extend(block.domains.iter().cloned());
                dictionaries.extend(block.dictionaries.iter().cloned());
            }
        }

        let mut names = Vec::new();
        if !domains.is_empty() {
            names.push("core".to_string());
            names.extend(domains);
        }
        names.extend(dictionaries);
        if names.is_empty() {
            names.push("core".to_string());
        }
        dedup_preserving_order(names)
    }

    /// Every rule mentioned by any block, merged without file filtering.
    /// Serves the plain-text entry points that have no path to match.
    pub fn merged_rules(&self) -> BTreeMap<String, RuleLevel> {
        let mut merged = BTreeMap::new();
        for block in &self.blocks {
            if block.is_global_ignore() {
                continue;
            }
            for (name, level) in &block.rules {
                merged.insert(name.clone(), *level);
            }
        }
        if merged.is_empty() {
            for block in default_blocks() {
                merged.extend(block.rules);
            }
        }
        merged
    }

    /// Every dictionary mentioned by any block, for the plain-text entry
    /// points.
    pub fn merged_dictionaries(&self) -> Vec<String> {
        let mut domains = Vec::new();
        let mut dictionaries = Vec::new();
        for block in &self.blocks {
            if block.is_global_ignore() {
                continue;
            }
            domains.extend(block.domains.iter().cloned());
            dictionaries.extend(block.dictionaries.iter().cloned());
        }
        let mut names = Vec::new();
        if !domains.is_empty() {
            names.push("core".to_string());
            names.extend(domains);
        }
        names.extend(dictionaries);
        if names.is_empty() {
            names.push("core".to_string());
        }
        dedup_preserving_order(names)
    }
}

/// Parses ignore-file content: one glob per line, `#` comments, blank lines
/// skipped, `dir/` becomes `dir/**`, bare names match at any depth.
pub fn parse_ignore_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line.ends_with('/') {
                format!("{line}**")
            } else if !line.contains('/') && !line.contains('*') {
                format!("**/{line}")
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Matches a path against a pattern set with `!negation` support: at least
/// one positive pattern must match, and no negated pattern may.
fn matches_any(path: &str, patterns: &[String]) -> bool {
    let matched = patterns
        .iter()
        .filter(|p| !p.starts_with('!'))
        .any(|p| match_glob(path, p));
    if !matched {
        return false;
    }
    !patterns
        .iter()
        .filter_map(|p| p.strip_prefix('!'))
        .any(|p| match_glob(path, p))
}

fn match_glob(path: &str, pattern: &str) -> bool {
    let Ok(glob) = Glob::new(pattern) else {
        log::warn!("invalid glob pattern `{pattern}` ignored");
        return false;
    };
    let matcher = glob.compile_matcher();
    if matcher.is_match(Path::new(path)) {
        return true;
    }
    // Patterns without a separator also match against the basename, so
    // `*.md` applies at any depth.
    if !pattern.contains('/') {
        if let Some(name) = Path::new(path).file_name() {
            return matcher.is_match(Path::new(name));
        }
    }
    false
}

fn dedup_preserving_order(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
