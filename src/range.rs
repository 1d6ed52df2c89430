//! Text ranges and offset-to-position mapping.
//!
//! - [`TextRange`] - A (start line, start column, end line, end column) span
//! - [`RangeKind`] - The sub-part of a node a range describes
//! - [`NodeRanges`] - The fixed set of ranges recorded for one node
//! - [`Locator`] - Converts byte offsets into line/column positions

use crate::error::{Error, Result};
use std::cell::Cell;
use std::fmt;

/// A span of text in the original file.
///
/// Lines are 1-based, columns are 0-based and count characters. The end
/// position is exclusive. A range is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextRange {
    /// Line of the first character
    pub start_line: usize,
    /// Column of the first character
    pub start_column: usize,
    /// Line of the end position
    pub end_line: usize,
    /// Column just past the last character
    pub end_column: usize,
}

impl TextRange {
    /// Creates a range, rejecting reversed and zero-width spans.
    pub fn new(
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Result<Self> {
        if start_line == 0
            || end_line == 0
            || (start_line, start_column) >= (end_line, end_column)
        {
            return Err(Error::InvalidRange {
                start_line,
                start_column,
                end_line,
                end_column,
            });
        }
        Ok(Self {
            start_line,
            start_column,
            end_line,
            end_column,
        })
    }

    /// Creates a range between two positions.
    pub fn between(start: Position, end: Position) -> Result<Self> {
        Self::new(start.line, start.column, end.line, end.column)
    }

    /// Start position of the range.
    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_column)
    }

    /// End position of the range.
    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_column)
    }

    /// Returns a range spanning from the start of `self` to the end of `other`.
    pub fn to(&self, other: &TextRange) -> Result<Self> {
        Self::between(self.start(), other.end())
    }

    /// Returns true if `other` lies entirely inside this range.
    pub fn contains(&self, other: &TextRange) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// A single line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line
    pub line: usize,
    /// 0-based character column
    pub column: usize,
}

impl Position {
    /// Creates a new position.
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// The sub-part of a node or attribute described by a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RangeKind {
    /// The full span of the construct
    Node,
    /// The opening tag or opening delimiter
    Start,
    /// The closing tag or closing delimiter
    End,
    /// The bare tag or attribute name
    Name,
    /// An attribute value, including its quotes
    Value,
}

/// The ranges recorded for one node or attribute.
///
/// Populated once while binding positions and never changed afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeRanges {
    pub(crate) node: Option<TextRange>,
    pub(crate) start: Option<TextRange>,
    pub(crate) end: Option<TextRange>,
    pub(crate) name: Option<TextRange>,
    pub(crate) value: Option<TextRange>,
}

impl NodeRanges {
    /// Returns the range of the given kind, if recorded.
    pub fn get(&self, kind: RangeKind) -> Option<TextRange> {
        match kind {
            RangeKind::Node => self.node,
            RangeKind::Start => self.start,
            RangeKind::End => self.end,
            RangeKind::Name => self.name,
            RangeKind::Value => self.value,
        }
    }

    pub(crate) fn slot(&mut self, kind: RangeKind) -> &mut Option<TextRange> {
        match kind {
            RangeKind::Node => &mut self.node,
            RangeKind::Start => &mut self.start,
            RangeKind::End => &mut self.end,
            RangeKind::Name => &mut self.name,
            RangeKind::Value => &mut self.value,
        }
    }
}

/// Maps byte offsets of a text buffer to line/column positions.
///
/// Lookups are cheapest when offsets are requested in increasing order,
/// which is how the position binder walks a document.
#[derive(Debug)]
pub struct Locator<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
    last: Cell<(usize, usize, usize)>,
}

impl<'a> Locator<'a> {
    /// Builds the line table for `text`. `\n`, `\r\n` and `\r` all end a line.
    pub fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => line_starts.push(i + 1),
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        i += 1;
                    }
                    line_starts.push(i + 1);
                }
                _ => {}
            }
            i += 1;
        }
        Self {
            text,
            line_starts,
            last: Cell::new((0, 1, 0)),
        }
    }

    /// Number of lines in the text.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Returns the 1-based line and 0-based character column of `offset`.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let line = line_index + 1;
        let (last_offset, last_line, last_column) = self.last.get();
        let column = if last_line == line && last_offset <= offset {
            last_column + self.count_chars(last_offset, offset)
        } else {
            self.count_chars(self.line_starts[line_index], offset)
        };
        self.last.set((offset, line, column));
        Position::new(line, column)
    }

    fn count_chars(&self, from: usize, to: usize) -> usize {
        self.text
            .get(from..to)
            .map(|s| s.chars().count())
            .unwrap_or(to - from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_reversed_ranges() {
        assert!(TextRange::new(1, 0, 1, 0).is_err());
        assert!(TextRange::new(2, 0, 1, 5).is_err());
        assert!(TextRange::new(0, 0, 1, 5).is_err());
        assert!(TextRange::new(1, 4, 2, 0).is_ok());
    }

    #[test]
    fn test_range_join_and_contains() {
        let a = TextRange::new(1, 0, 1, 5).unwrap();
        let b = TextRange::new(3, 2, 3, 8).unwrap();
        let joined = a.to(&b).unwrap();
        assert_eq!(joined, TextRange::new(1, 0, 3, 8).unwrap());
        assert!(joined.contains(&a));
        assert!(joined.contains(&b));
        assert!(!a.contains(&joined));
        assert_eq!(joined.to_string(), "1:0-3:8");
    }

    #[test]
    fn test_locator_line_terminators() {
        let text = "ab\ncd\r\nef\rgh";
        let locator = Locator::new(text);
        assert_eq!(locator.line_count(), 4);
        assert_eq!(locator.position(0), Position::new(1, 0));
        assert_eq!(locator.position(3), Position::new(2, 0));
        assert_eq!(locator.position(4), Position::new(2, 1));
        assert_eq!(locator.position(7), Position::new(3, 0));
        assert_eq!(locator.position(10), Position::new(4, 0));
        assert_eq!(locator.position(12), Position::new(4, 2));
    }

    #[test]
    fn test_locator_counts_characters_not_bytes() {
        let text = "<a é='ü'/>";
        let locator = Locator::new(text);
        // 'é' is two bytes in UTF-8
        let offset = text.find('=').unwrap();
        assert_eq!(locator.position(offset), Position::new(1, 4));
        // Backwards lookup after a forward one still works
        assert_eq!(locator.position(1), Position::new(1, 1));
    }
}
