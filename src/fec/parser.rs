//! The main parsing logic: a single left-to-right scan of the filing.
//!
//! The first line decides the header style (legacy `/*` blocks with
//! `key = value` pairs, or an inline `HDR` row) and supplies the filing
//! version. Every later line is a data row: its first field names the
//! form, the form's schema types the remaining fields, and the row lands
//! in that form's own CSV output. F99 narrative blocks span extra input
//! lines, so row processing can report that it already fetched the line
//! the main loop would have read next.

use anyhow::Result;
use std::io::Read;
use std::mem;

use crate::buffer::LineBuffer;
use crate::csv_helper::{
    count_field_info, write_delimiter, write_field, write_field_date, write_field_float,
    write_newline, CsvLineParser,
};
use crate::encoding::decode_line;
use crate::errors::FecError;
use crate::mappings::{lookup_schema, FormSchema};
use crate::writer::{WriterContext, CSV_EXTENSION};

use super::context::FecContext;

/// Output name for the filing header rows.
const HEADER: &str = "header";

/// How a data row left the line stream.
enum LineOutcome {
    /// The row consumed only its own line.
    Done,
    /// An F99 continuation fetched a line that turned out to be the next
    /// record; the main loop must not read another one.
    NextLineFetched,
}

/// Pull the next raw line and decode it into `ctx.line`, recording the
/// delimiter mode. Returns false at end of input.
fn grab_line<R: Read>(ctx: &mut FecContext, reader: &mut LineBuffer<R>) -> bool {
    if reader.read_line(&mut ctx.raw_line) == 0 {
        return false;
    }
    let info = decode_line(&ctx.raw_line, &mut ctx.line);
    ctx.use_ascii28 = info.ascii28;
    true
}

/// Forms that may carry a free-text narrative tail.
fn form_has_text_field(form: &str) -> bool {
    let bytes = form.as_bytes();
    bytes.len() >= 3 && bytes[..3].eq_ignore_ascii_case(b"F99")
}

fn trim_bytes(mut bytes: &[u8]) -> &[u8] {
    while let Some((&b, rest)) = bytes.split_first() {
        if b.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let Some((&b, rest)) = bytes.split_last() {
        if b.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

/// Primary entry point: parse one filing from `reader` into `writer`.
///
/// Reads the header line, dispatches on its style, then processes data
/// rows until end of input. Fails if the input is empty, an output stream
/// cannot be opened, or a schema carries an unknown type code; everything
/// else is a per-row warning.
pub fn parse_fec<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
) -> Result<()> {
    if !grab_line(ctx, reader) {
        return Err(FecError::EmptyInput.into());
    }
    parse_header(ctx, reader, writer)?;

    let mut line_fetched = false;
    loop {
        if !line_fetched && !grab_line(ctx, reader) {
            break;
        }
        line_fetched = matches!(
            parse_data_line(ctx, reader, writer, None)?,
            LineOutcome::NextLineFetched
        );
    }
    Ok(())
}

/// Dispatch on the header style of the already-fetched first line.
fn parse_header<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
) -> Result<()> {
    if ctx.line.starts_with(b"/*") {
        parse_legacy_header(ctx, reader, writer)
    } else {
        parse_inline_header(ctx, reader, writer)
    }
}

/// Parse a multiline `/* ... */`-style header of `key = value` pairs.
///
/// Keys stream straight into the `header` output as the first row; values
/// are assembled into a second row through the writer's divert buffer so
/// both rows come out escaped the same way. A `schedule_counts` line
/// switches later keys into the `SCHEDULE_COUNTS_` namespace. The
/// `fec_ver_#` key supplies the filing version.
fn parse_legacy_header<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
) -> Result<()> {
    let mut schedule_counts = false;
    let mut first = true;
    let mut values_row: Vec<u8> = Vec::new();

    if ctx.include_filing_id {
        writer.write_string(HEADER, CSV_EXTENSION, "filing_id")?;
        values_row.extend_from_slice(ctx.fec_id.as_bytes());
        first = false;
    }

    loop {
        if !grab_line(ctx, reader) {
            break;
        }
        if ctx.line.starts_with(b"/*") {
            break;
        }

        // Keys are matched and emitted lowercase; values keep their case
        let mut lowered = ctx.line.clone();
        lowered.make_ascii_lowercase();
        if lowered.starts_with(b"schedule_counts") {
            schedule_counts = true;
            continue;
        }
        let Some(eq) = lowered.iter().position(|&b| b == b'=') else {
            continue;
        };
        let key = trim_bytes(&lowered[..eq]);
        let value = trim_bytes(&ctx.line[eq + 1..]);
        if key.is_empty() {
            continue;
        }

        if key == b"fec_ver_#" {
            ctx.version = Some(String::from_utf8_lossy(value).into_owned());
        }

        if !first {
            write_delimiter(writer, HEADER)?;
            values_row.push(b',');
        }
        first = false;

        let key_column: Vec<u8> = if schedule_counts {
            let mut prefixed = b"SCHEDULE_COUNTS_".to_vec();
            prefixed.extend_from_slice(key);
            prefixed
        } else {
            key.to_vec()
        };
        write_field(writer, HEADER, &key_column, &count_field_info(&key_column))?;

        writer.start_local_buffer_mode();
        write_field(writer, HEADER, value, &count_field_info(value))?;
        let escaped = writer.finish_local_buffer_mode();
        values_row.extend_from_slice(&escaped);
    }

    if first {
        // Nothing recognizable in the header block
        return Ok(());
    }

    write_newline(writer, HEADER)?;
    writer.end_line("")?;
    writer.write_bytes(HEADER, CSV_EXTENSION, &values_row)?;
    write_newline(writer, HEADER)?;
    writer.end_line("")?;
    Ok(())
}

/// Parse a one-line `HDR` header: capture the version from field 2 (or 3,
/// when field 2 is the literal `FEC`), then emit the whole line as a
/// normal row against the HDR schema under the `header` output.
fn parse_inline_header<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
) -> Result<()> {
    let use28 = ctx.use_ascii28;

    // Read the version out of a scratch copy so the real line reaches the
    // row emitter untouched by in-place unescaping
    let mut scratch = ctx.line.clone();
    {
        let mut parser = CsvLineParser::new(&mut scratch);
        let _ = parser.next_field(use28);
        let second = {
            let mut field = parser.next_field(use28);
            field.strip_whitespace();
            field.as_str().into_owned()
        };
        if second.eq_ignore_ascii_case("FEC") {
            let third = {
                let mut field = parser.next_field(use28);
                field.strip_whitespace();
                field.as_str().into_owned()
            };
            if !third.is_empty() {
                ctx.version = Some(third);
            }
        } else if !second.is_empty() {
            ctx.version = Some(second);
        }
    }

    if !ctx.silent {
        if let Some(version) = &ctx.version {
            eprintln!("Detected version: {version}");
        }
    }

    parse_data_line(ctx, reader, writer, Some(HEADER)).map(|_| ())
}

/// Fetch the schema for the current version and form, reusing the cached
/// slot when the form repeats.
fn cached_schema(ctx: &mut FecContext, form: &str) -> Option<FormSchema> {
    if ctx.form_type.as_deref() == Some(form) {
        if let Some(schema) = &ctx.schema {
            return Some(schema.clone());
        }
    }
    let version = ctx.version.as_deref().unwrap_or("");
    let schema = lookup_schema(version, form)?;
    ctx.form_type = Some(form.to_string());
    ctx.schema = Some(schema.clone());
    Some(schema)
}

/// Process one data row from `ctx.line`.
fn parse_data_line<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
    filename_override: Option<&str>,
) -> Result<LineOutcome> {
    let use28 = ctx.use_ascii28;
    let mut line = mem::take(&mut ctx.line);
    let mut parser = CsvLineParser::new(&mut line);

    let form = {
        let mut field = parser.next_field(use28);
        field.strip_whitespace();
        field.as_str().into_owned()
    };

    // A line without at least two fields is not fully specified
    if form.is_empty() || parser.is_done() {
        drop(parser);
        ctx.line = line;
        return Ok(LineOutcome::Done);
    }

    let Some(schema) = cached_schema(ctx, &form) else {
        if ctx.warn && !ctx.silent {
            let version = ctx.version.as_deref().unwrap_or("");
            eprintln!("(Warn) Version {version} with form type {form} not found");
        }
        drop(parser);
        ctx.line = line;
        return Ok(LineOutcome::Done);
    };

    let filename = filename_override.unwrap_or(form.as_str());

    // A freshly opened output gets the schema's header row first
    if writer.ensure_stream(filename, CSV_EXTENSION)? {
        if ctx.include_filing_id {
            writer.write_string(filename, CSV_EXTENSION, "filing_id")?;
            write_delimiter(writer, filename)?;
        }
        writer.write_string(filename, CSV_EXTENSION, schema.header_string)?;
        write_newline(writer, filename)?;
        writer.end_line(&schema.field_types)?;
    }

    if ctx.include_filing_id {
        writer.write_string(filename, CSV_EXTENSION, &ctx.fec_id)?;
        write_delimiter(writer, filename)?;
    }
    write_field(writer, filename, form.as_bytes(), &count_field_info(form.as_bytes()))?;

    let mut extra_fields = false;
    while !parser.is_done() {
        let index = parser.num_fields_read;
        let field = parser.next_field(use28);
        write_delimiter(writer, filename)?;
        if index < schema.num_fields {
            match schema.field_types.as_bytes()[index] {
                b's' => write_field(writer, filename, field.chars, &field.info)?,
                b'd' => {
                    let ok = write_field_date(writer, filename, field.chars, &field.info)?;
                    if !ok && ctx.warn && !ctx.silent {
                        eprintln!("(Warn) Date field for form {form} has unexpected length");
                    }
                }
                b'f' => {
                    let ok = write_field_float(writer, filename, field.chars, &field.info)?;
                    if !ok && ctx.warn && !ctx.silent {
                        eprintln!("(Warn) Decimal field for form {form} failed to parse");
                    }
                }
                other => return Err(FecError::UnknownTypeCode(other as char).into()),
            }
        } else {
            if !extra_fields {
                extra_fields = true;
                if ctx.warn && !ctx.silent {
                    eprintln!("(Warn) Unexpected number of fields for form {form}");
                }
            }
            write_field(writer, filename, field.chars, &field.info)?;
        }
    }

    let fields_read = parser.num_fields_read;
    drop(parser);

    if fields_read != schema.num_fields && form_has_text_field(&form) {
        // The structured part fell short: the rest of the row is a
        // multiline narrative
        let outcome = parse_f99_text(ctx, reader, writer, filename)?;
        write_newline(writer, filename)?;
        writer.end_line(&schema.field_types)?;
        // ctx.line holds whatever the continuation fetched last
        return Ok(outcome);
    }

    write_newline(writer, filename)?;
    writer.end_line(&schema.field_types)?;
    ctx.line = line;
    Ok(LineOutcome::Done)
}

/// Consume an F99 free-text block and append it as one escaped field.
///
/// Lines before `[BEGIN TEXT]` may be blank or other bracketed markers;
/// anything else means there is no narrative and the fetched line is the
/// next record. Everything between the markers is captured verbatim,
/// newlines included, with quotes doubled.
fn parse_f99_text<R: Read>(
    ctx: &mut FecContext,
    reader: &mut LineBuffer<R>,
    writer: &mut WriterContext,
    filename: &str,
) -> Result<LineOutcome> {
    loop {
        if !grab_line(ctx, reader) {
            return Ok(LineOutcome::Done);
        }
        let text = String::from_utf8_lossy(&ctx.line);
        if ctx.f99_text_start.is_match(&text) {
            break;
        }
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('[') {
            continue;
        }
        return Ok(LineOutcome::NextLineFetched);
    }

    write_delimiter(writer, filename)?;
    writer.write_char(filename, CSV_EXTENSION, '"')?;
    loop {
        if !grab_line(ctx, reader) {
            break;
        }
        let text = String::from_utf8_lossy(&ctx.line);
        if ctx.f99_text_end.is_match(&text) {
            break;
        }
        if ctx.line.contains(&b'"') {
            for &c in ctx.line.iter() {
                writer.write_bytes(filename, CSV_EXTENSION, &[c])?;
                if c == b'"' {
                    writer.write_bytes(filename, CSV_EXTENSION, &[c])?;
                }
            }
        } else {
            writer.write_bytes(filename, CSV_EXTENSION, &ctx.line)?;
        }
    }
    writer.write_char(filename, CSV_EXTENSION, '"')?;
    Ok(LineOutcome::Done)
}
