//! Field tokenization and typed field emission.
//!
//! A line is split into fields in one of two modes: classic CSV with
//! RFC-4180-style `""` escapes, or ASCII 28 delimited (newer filing
//! versions). CSV unescaping happens in place on the line buffer: the
//! escaped form is always longer than the decoded form, so decoded bytes
//! are compacted leftward and never overrun the original text. Each field
//! carries the comma and quote counts observed before unescaping, which is
//! all the emitter needs to decide whether re-escaping is required.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use crate::writer::{WriterContext, CSV_EXTENSION};

/// The ASCII 28 "file separator" delimiter.
pub const ASCII28: u8 = 28;

/// Per-field counts of raw commas and quotes, taken before unescaping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub num_commas: usize,
    pub num_quotes: usize,
}

/// A borrowed view of one field. Valid only as long as the parser that
/// produced it is not advanced; the borrow on the parser enforces this.
#[derive(Debug)]
pub struct CsvField<'l> {
    pub chars: &'l [u8],
    pub info: FieldInfo,
}

impl<'l> CsvField<'l> {
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The field as text. Decoded lines are UTF-8 and delimiters are
    /// ASCII, so this is lossless in practice.
    pub fn as_str(&self) -> Cow<'l, str> {
        String::from_utf8_lossy(self.chars)
    }

    /// Drop leading and trailing spaces and tabs from the view.
    pub fn strip_whitespace(&mut self) {
        while let Some((&b, rest)) = self.chars.split_first() {
            if b == b' ' || b == b'\t' {
                self.chars = rest;
            } else {
                break;
            }
        }
        while let Some((&b, rest)) = self.chars.split_last() {
            if b == b' ' || b == b'\t' {
                self.chars = rest;
            } else {
                break;
            }
        }
    }
}

/// Splits one line into successive fields.
pub struct CsvLineParser<'l> {
    line: &'l mut Vec<u8>,
    pub position: usize,
    pub num_fields_read: usize,
    start: usize,
    end: usize,
    info: FieldInfo,
}

impl<'l> CsvLineParser<'l> {
    pub fn new(line: &'l mut Vec<u8>) -> Self {
        Self {
            line,
            position: 0,
            num_fields_read: 0,
            start: 0,
            end: 0,
            info: FieldInfo::default(),
        }
    }

    fn byte_at(&self, i: usize) -> u8 {
        self.line.get(i).copied().unwrap_or(0)
    }

    /// Whether the cursor sits at the line terminator.
    pub fn is_done(&self) -> bool {
        let c = self.byte_at(self.position);
        c == 0 || c == b'\n'
    }

    fn process_field_char(&mut self, c: u8) {
        if c == b'"' {
            self.info.num_quotes += 1;
        } else if c == b',' {
            self.info.num_commas += 1;
        }
    }

    /// If the field both begins and ends with a quote, keep only the
    /// interior.
    fn strip_quotes(&mut self) {
        if self.end - self.start > 1
            && self.byte_at(self.start) == b'"'
            && self.byte_at(self.end - 1) == b'"'
        {
            self.start += 1;
            self.end -= 1;
            self.info.num_quotes -= 2;
        }
    }

    /// ASCII 28 mode: the field is the raw slice up to the next delimiter,
    /// newline or end of line. Quotes are data, not structure.
    fn read_ascii28_field(&mut self) {
        self.start = self.position;
        loop {
            let c = self.byte_at(self.position);
            if c == 0 || c == ASCII28 || c == b'\n' {
                break;
            }
            self.process_field_char(c);
            self.position += 1;
        }
        self.end = self.position;
        self.strip_quotes();
    }

    /// CSV mode: a leading quote opens an escaped field whose `""` pairs
    /// decode to single quotes, compacting the line in place.
    fn read_csv_subfield(&mut self) {
        let escaped = self.byte_at(self.position) == b'"';
        let mut offset = 0usize;
        if escaped {
            self.position += 1;
        }
        self.start = self.position;
        loop {
            if offset != 0 && self.position < self.line.len() {
                self.line[self.position - offset] = self.line[self.position];
            }

            let c = self.byte_at(self.position);
            let is_eof = c == 0;
            let is_eol = !escaped && (c == b',' || c == b'\n');
            if is_eof || is_eol {
                self.end = self.position - offset;
                return;
            }
            self.process_field_char(c);
            if escaped && c == b'"' {
                if self.byte_at(self.position + 1) != b'"' {
                    // Closing quote; exclude it from the value
                    self.end = self.position - offset;
                    self.position += 1;
                    self.info.num_quotes -= 1;
                    return;
                }
                // Escaped quote pair decodes to one quote
                self.position += 1;
                offset += 1;
            }
            self.position += 1;
        }
    }

    fn read_csv_field(&mut self) {
        self.read_csv_subfield();
        self.strip_quotes();
    }

    /// Produce the next field in the given delimiter mode, then step over
    /// one delimiter unless the cursor reached the line terminator.
    pub fn next_field(&mut self, use_ascii28: bool) -> CsvField<'_> {
        self.info = FieldInfo::default();
        if use_ascii28 {
            self.read_ascii28_field();
        } else {
            self.read_csv_field();
        }
        self.num_fields_read += 1;
        if !self.is_done() {
            self.position += 1;
        }
        CsvField {
            chars: &self.line[self.start..self.end],
            info: self.info,
        }
    }
}

/// Count commas and quotes in a value the way the tokenizer would have.
/// Used for fields that never went through the tokenizer (legacy header
/// keys and values).
pub fn count_field_info(chars: &[u8]) -> FieldInfo {
    let mut info = FieldInfo::default();
    for &c in chars {
        if c == b'"' {
            info.num_quotes += 1;
        } else if c == b',' {
            info.num_commas += 1;
        }
    }
    info
}

pub fn write_delimiter(ctx: &mut WriterContext, filename: &str) -> Result<()> {
    ctx.write_char(filename, CSV_EXTENSION, ',')
}

pub fn write_newline(ctx: &mut WriterContext, filename: &str) -> Result<()> {
    ctx.write_char(filename, CSV_EXTENSION, '\n')
}

/// Write a string field, CSV-escaping when the counts demand it.
pub fn write_field(
    ctx: &mut WriterContext,
    filename: &str,
    chars: &[u8],
    info: &FieldInfo,
) -> Result<()> {
    let has_quotes = info.num_quotes > 0;
    let escaped = info.num_commas > 0 || has_quotes;
    if escaped {
        ctx.write_char(filename, CSV_EXTENSION, '"')?;
    }
    if !has_quotes {
        ctx.write_bytes(filename, CSV_EXTENSION, chars)?;
    } else {
        for &c in chars {
            ctx.write_bytes(filename, CSV_EXTENSION, &[c])?;
            if c == b'"' {
                ctx.write_bytes(filename, CSV_EXTENSION, &[c])?;
            }
        }
    }
    if escaped {
        ctx.write_char(filename, CSV_EXTENSION, '"')?;
    }
    Ok(())
}

/// Write a date field, reformatting YYYYMMDD as YYYY-MM-DD.
/// Returns Ok(false) when the value was not 8 characters and was written
/// verbatim instead.
pub fn write_field_date(
    ctx: &mut WriterContext,
    filename: &str,
    chars: &[u8],
    info: &FieldInfo,
) -> Result<bool> {
    if chars.is_empty() {
        return Ok(true);
    }
    if chars.len() != 8 {
        write_field(ctx, filename, chars, info)?;
        return Ok(false);
    }
    ctx.write_bytes(filename, CSV_EXTENSION, &chars[0..4])?;
    ctx.write_char(filename, CSV_EXTENSION, '-')?;
    ctx.write_bytes(filename, CSV_EXTENSION, &chars[4..6])?;
    ctx.write_char(filename, CSV_EXTENSION, '-')?;
    ctx.write_bytes(filename, CSV_EXTENSION, &chars[6..8])?;
    Ok(true)
}

// The leading portion strtod would consume
static LEADING_DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("leading decimal regex")
});

/// Write a decimal field in canonical two-decimal form.
/// Returns Ok(false) when no leading decimal could be parsed and the value
/// was written verbatim instead.
pub fn write_field_float(
    ctx: &mut WriterContext,
    filename: &str,
    chars: &[u8],
    info: &FieldInfo,
) -> Result<bool> {
    if chars.is_empty() {
        return Ok(true);
    }
    let text = String::from_utf8_lossy(chars);
    let parsed = LEADING_DECIMAL
        .find(&text)
        .and_then(|m| m.as_str().trim_start().parse::<f64>().ok());
    match parsed {
        Some(value) => {
            ctx.write_double(filename, value)?;
            Ok(true)
        }
        None => {
            write_field(ctx, filename, chars, info)?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_yields_one_empty_field() {
        let mut line = Vec::new();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"");
        assert_eq!(field.info, FieldInfo::default());
        assert_eq!(parser.position, 0);
        assert_eq!(parser.num_fields_read, 1);
    }

    #[test]
    fn csv_basic() {
        let mut line = b"abc".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"abc");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(field.info.num_commas, 0);
        assert_eq!(parser.position, 3);
        assert_eq!(parser.num_fields_read, 1);
    }

    #[test]
    fn csv_quoted() {
        let mut line = b"\"abc\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"abc");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(parser.position, 5);
    }

    #[test]
    fn csv_escaped_quotes_and_commas() {
        let mut line = b"\"a\"\",a\"\"b,\"\"c,\"\"\"\"\",\"\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        parser.position = 3;
        let field = parser.next_field(false);
        assert_eq!(field.chars, b",a\"b,\"c,\"\"");
        assert_eq!(field.info.num_quotes, 4);
        assert_eq!(field.info.num_commas, 3);
        assert_eq!(parser.position, 20);
        assert_eq!(parser.num_fields_read, 1);
    }

    #[test]
    fn csv_empty_quoted_field() {
        let mut line = b"\"\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(parser.position, 2);
    }

    #[test]
    fn csv_empty_field_between_delimiters() {
        let mut line = b",,".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"");
        assert_eq!(parser.position, 1);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"");
        assert_eq!(parser.position, 2);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"");
        assert_eq!(parser.num_fields_read, 3);
        assert!(parser.is_done());
    }

    #[test]
    fn csv_doubly_quoted() {
        let mut line = b"\"\"\"FEC\"\"\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"FEC");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(parser.position, 9);
    }

    #[test]
    fn csv_stops_at_newline() {
        let mut line = b"a,b,c\nd,e,f\n".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        assert_eq!(parser.next_field(false).chars, b"a");
        assert_eq!(parser.next_field(false).chars, b"b");
        let field = parser.next_field(false);
        assert_eq!(field.chars, b"c");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(parser.position, 5);
        assert_eq!(parser.num_fields_read, 3);
        assert!(parser.is_done());
    }

    #[test]
    fn ascii28_basic() {
        let mut line = b"abc".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"abc");
        assert_eq!(parser.position, 3);
    }

    #[test]
    fn ascii28_quoted_keeps_interior() {
        let mut line = b"\"abc\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"abc");
        assert_eq!(field.info.num_quotes, 0);
        assert_eq!(parser.position, 5);
    }

    #[test]
    fn ascii28_stray_quote_at_start() {
        let mut line = b"\"abc".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"\"abc");
        assert_eq!(field.info.num_quotes, 1);
        assert_eq!(parser.position, 4);
    }

    #[test]
    fn ascii28_stray_quote_in_middle() {
        let mut line = b"ab\"c".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"ab\"c");
        assert_eq!(field.info.num_quotes, 1);
        assert_eq!(parser.position, 4);
    }

    #[test]
    fn ascii28_stray_quote_at_end() {
        let mut line = b"abc\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"abc\"");
        assert_eq!(field.info.num_quotes, 1);
        assert_eq!(parser.position, 4);
    }

    #[test]
    fn ascii28_delimiter_terminates_field() {
        let mut line = b"\"ab\x1Cc\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"\"ab");
        assert_eq!(field.info.num_quotes, 1);
        assert_eq!(parser.position, 4);
    }

    #[test]
    fn ascii28_lone_quote() {
        let mut line = b"\"".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let field = parser.next_field(true);
        assert_eq!(field.chars, b"\"");
        assert_eq!(field.info.num_quotes, 1);
    }

    #[test]
    fn strip_whitespace_narrows_view() {
        let mut line = b"   abc    ".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let mut field = parser.next_field(true);
        assert_eq!(field.chars.len(), 10);
        field.strip_whitespace();
        assert_eq!(field.chars, b"abc");
        assert_eq!(parser.position, 10);
    }

    #[test]
    fn strip_whitespace_all_blank() {
        let mut line = b"  \t ".to_vec();
        let mut parser = CsvLineParser::new(&mut line);
        let mut field = parser.next_field(true);
        field.strip_whitespace();
        assert_eq!(field.chars, b"");
    }

    #[test]
    fn fields_concatenate_to_line() {
        let contents = b"first,second,\"a,b\",last".to_vec();
        let mut line = contents.clone();
        let mut parser = CsvLineParser::new(&mut line);
        let mut values: Vec<Vec<u8>> = Vec::new();
        loop {
            let field = parser.next_field(false);
            values.push(field.chars.to_vec());
            if parser.is_done() {
                break;
            }
        }
        assert_eq!(
            values,
            vec![
                b"first".to_vec(),
                b"second".to_vec(),
                b"a,b".to_vec(),
                b"last".to_vec()
            ]
        );
    }

    #[test]
    fn count_field_info_matches_tokenizer_counts() {
        let info = count_field_info(b"a\"b,c,\"");
        assert_eq!(info.num_quotes, 2);
        assert_eq!(info.num_commas, 2);
    }
}
