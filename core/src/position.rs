//! Position mapping between an original text and its converted form.
//!
//! The mainland-term rule matches against a character-converted copy of the
//! input, but findings must point at the original. The mapper records a
//! char-level correspondence, built line by line up to the shorter of each
//! line pair, and answers lookups by nearest recorded offset. That is an
//! approximation when a conversion changes text length; the tables in scope
//! are one-to-one per character, where it is exact.

/// 1-based line/column plus a char offset into the owning text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    original: TextPosition,
    converted: TextPosition,
}

pub struct PositionMapper {
    mappings: Vec<Mapping>,
    original: String,
    converted: String,
}

impl PositionMapper {
    pub fn new(original: &str, converted: &str) -> Self {
        let mut mappings = Vec::new();
        let original_lines: Vec<&str> = original.split('\n').collect();
        let converted_lines: Vec<&str> = converted.split('\n').collect();

        let mut original_offset = 0;
        let mut converted_offset = 0;
        for line_index in 0..original_lines.len().max(converted_lines.len()) {
            let original_line = original_lines.get(line_index).copied().unwrap_or("");
            let converted_line = converted_lines.get(line_index).copied().unwrap_or("");
            let original_len = original_line.chars().count();
            let converted_len = converted_line.chars().count();

            for char_index in 0..original_len.min(converted_len) {
                mappings.push(Mapping {
                    original: TextPosition {
                        line: line_index + 1,
                        column: char_index + 1,
                        offset: original_offset + char_index,
                    },
                    converted: TextPosition {
                        line: line_index + 1,
                        column: char_index + 1,
                        offset: converted_offset + char_index,
                    },
                });
            }

            // +1 for the newline each split consumed.
            original_offset += original_len + 1;
            converted_offset += converted_len + 1;
        }

        Self {
            mappings,
            original: original.to_string(),
            converted: converted.to_string(),
        }
    }

    /// Maps a 1-based line/column in the converted text back to the original.
    pub fn map_to_original(&self, line: usize, column: usize) -> TextPosition {
        let target = offset_of(&self.converted, line, column);
        self.nearest(target, |m| m.converted.offset, |m| m.original)
            .unwrap_or(TextPosition {
                line,
                column,
                offset: target,
            })
    }

    /// Maps a 1-based line/column in the original text to the converted copy.
    pub fn map_to_converted(&self, line: usize, column: usize) -> TextPosition {
        let target = offset_of(&self.original, line, column);
        self.nearest(target, |m| m.original.offset, |m| m.converted)
            .unwrap_or(TextPosition {
                line,
                column,
                offset: target,
            })
    }

    fn nearest(
        &self,
        target: usize,
        key: impl Fn(&Mapping) -> usize,
        value: impl Fn(&Mapping) -> TextPosition,
    ) -> Option<TextPosition> {
        self.mappings
            .iter()
            .min_by_key(|m| key(m).abs_diff(target))
            .map(value)
    }
}

/// Char offset of a 1-based line/column, clamped to the line's length.
fn offset_of(text: &str, line: usize, column: usize) -> usize {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut offset = 0;
    for prior in lines.iter().take(line.saturating_sub(1)) {
        offset += prior.chars().count() + 1;
    }
    let line_len = lines
        .get(line.saturating_sub(1))
        .map_or(0, |l| l.chars().count());
    offset + (column.saturating_sub(1)).min(line_len)
}
