// SPDX-License-Identifier: LGPL-2.1-or-later
// See Notices.txt for copyright information

//! source spans and line/column lookup

use once_cell::unsync::OnceCell;
use std::fmt;
use unicode_width::UnicodeWidthChar;

/// a byte range into a source file
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Span {
    /// start byte index, inclusive
    pub start: usize,
    /// end byte index, exclusive
    pub end: usize,
}

impl Span {
    /// create a new `Span`
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "span start must not come after end");
        Self { start, end }
    }
    /// the smallest span covering both `self` and `other`
    pub fn union(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
    /// `true` if this is the default zero span
    pub fn is_empty(self) -> bool {
        self.start == 0 && self.end == 0
    }
}

/// a 1-based line/column pair
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct LineCol {
    /// 1-based line number
    pub line: u32,
    /// 1-based column number, counted in display width
    pub column: u32,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// a source file with lazily-built line lookup
#[derive(Debug)]
pub struct SourceText<'a> {
    /// the name of the source file
    pub file_name: &'a str,
    /// the full source text
    pub text: &'a str,
    line_start_byte_indexes: OnceCell<Vec<usize>>,
}

impl<'a> SourceText<'a> {
    /// create a new `SourceText`
    pub fn new(file_name: &'a str, text: &'a str) -> Self {
        Self {
            file_name,
            text,
            line_start_byte_indexes: OnceCell::new(),
        }
    }
    /// byte indexes of line starts; always starts with 0
    pub fn line_start_byte_indexes(&self) -> &[usize] {
        self.line_start_byte_indexes.get_or_init(|| {
            let mut line_start_byte_indexes = vec![0];
            for (index, byte) in self.text.bytes().enumerate() {
                if byte == b'\n' {
                    // "\r\n" needs no special case, line start is still right after '\n'
                    line_start_byte_indexes.push(index + 1);
                }
            }
            line_start_byte_indexes
        })
    }
    /// 0-based index of the line containing `byte_index`
    pub fn line_index_of_containing_line(&self, byte_index: usize) -> usize {
        let line_start_byte_indexes = self.line_start_byte_indexes();
        match line_start_byte_indexes.binary_search(&byte_index) {
            Ok(index) => index,
            Err(index) => index - 1,
        }
    }
    /// the 1-based line/column of `byte_index`, with tabs rounded up to a
    /// multiple of the tab width and columns counted in display width
    pub fn line_col(&self, byte_index: usize) -> LineCol {
        const TAB_WIDTH: u32 = 4;
        let line_index = self.line_index_of_containing_line(byte_index);
        let line_start_index = self.line_start_byte_indexes()[line_index];
        let column = 1 + self.text[line_start_index..byte_index]
            .chars()
            .fold(0, |col, ch| {
                // col is zero-based
                if ch == '\t' {
                    (col + TAB_WIDTH) / TAB_WIDTH * TAB_WIDTH
                } else {
                    col + ch.width().unwrap_or(0) as u32
                }
            });
        LineCol {
            line: line_index as u32 + 1,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let source = SourceText::new("test.sl", "fn main() {\n\tlet x = 1;\n}\n");
        assert_eq!(source.line_col(0), LineCol { line: 1, column: 1 });
        assert_eq!(source.line_col(3), LineCol { line: 1, column: 4 });
        // byte 12 is the tab, byte 13 is 'l' -- tab advances to column 5
        assert_eq!(source.line_col(13), LineCol { line: 2, column: 5 });
        assert_eq!(source.line_col(24), LineCol { line: 3, column: 1 });
    }

    #[test]
    fn test_span_union() {
        let a = Span::new(4, 8);
        let b = Span::new(6, 20);
        assert_eq!(a.union(b), Span::new(4, 20));
    }
}
