//! Character conversion between Simplified and Traditional Chinese.
//!
//! The engine never hard-codes a conversion library; it works against the
//! [`Converter`] capability so tests can inject deterministic stubs. The
//! production implementation is [`TableConverter`], a per-character table
//! lookup. Tables in scope are strictly one-to-one per character, which is
//! what keeps [`crate::position::PositionMapper`] line/column-accurate.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Simplified-to-Traditional conversion capability.
///
/// Implementations must be deterministic and, for the tables used by this
/// crate, map each character to exactly one character.
pub trait Converter: Send + Sync {
    fn convert(&self, text: &str) -> String;
}

/// Table-driven converter. Characters without a table entry pass through.
pub struct TableConverter {
    table: HashMap<char, char>,
}

static BUILTIN_TABLE: Lazy<HashMap<char, char>> = Lazy::new(|| {
    parse_table(include_str!("../data/s2t.tsv"))
});

fn parse_table(source: &str) -> HashMap<char, char> {
    let mut table = HashMap::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(from), Some(to)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Some(f), Some(t)) = (from.chars().next(), to.chars().next()) {
            table.insert(f, t);
        }
    }
    table
}

impl TableConverter {
    pub fn new(pairs: impl IntoIterator<Item = (char, char)>) -> Self {
        Self {
            table: pairs.into_iter().collect(),
        }
    }

    /// Converter backed by the embedded simplified-to-traditional table.
    pub fn builtin() -> Self {
        Self {
            table: BUILTIN_TABLE.clone(),
        }
    }
}

impl Converter for TableConverter {
    fn convert(&self, text: &str) -> String {
        text.chars()
            .map(|ch| self.table.get(&ch).copied().unwrap_or(ch))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_converts_common_simplified_chars() {
        let converter = TableConverter::builtin();
        assert_eq!(converter.convert("这是简体字"), "這是簡體字");
        assert_eq!(converter.convert("软件开发"), "軟件開發");
    }

    #[test]
    fn traditional_text_passes_through() {
        let converter = TableConverter::builtin();
        assert_eq!(converter.convert("這是繁體中文。"), "這是繁體中文。");
    }

    #[test]
    fn ascii_and_unmapped_chars_are_untouched() {
        let converter = TableConverter::new([('云', '雲')]);
        assert_eq!(converter.convert("cloud 云 123"), "cloud 雲 123");
    }

    #[test]
    fn conversion_is_one_to_one_per_char() {
        let converter = TableConverter::builtin();
        let input = "网络连接失败";
        assert_eq!(
            input.chars().count(),
            converter.convert(input).chars().count()
        );
    }
}
