//! Line decoding, replicating Hoehrmann's UTF-8 state machine.
//!
//! Every line handed to the parser must be valid UTF-8. Filings are almost
//! always ASCII, occasionally UTF-8, and occasionally ISO-8859-1; the only
//! way to tell the latter two apart is to run the bytes through a UTF-8
//! validator. A single scan also records whether the line contains the
//! ASCII 28 "file separator" delimiter, which decides the tokenizer mode.

/// The Hoehrmann state machine's "ACCEPT" and "REJECT" states.
const UTF8_ACCEPT: u32 = 0;
const UTF8_REJECT: u32 = 1;

// UTF-8 decoder table
// Copyright (c) 2008-2009 Bjoern Hoehrmann <bjoern@hoehrmann.de>
// See http://bjoern.hoehrmann.de/utf-8/decoder/dfa/ for details.
#[rustfmt::skip]
static UTF8D: [u8; 400] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 00..1f
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 20..3f
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 40..5f
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // 60..7f
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, // 80..9f
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, // a0..bf
    8, 8, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, // c0..df
    0xa, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x3, 0x4, 0x3, 0x3,                 // e0..ef
    0xb, 0x6, 0x6, 0x6, 0x5, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8, 0x8,                 // f0..ff
    0x0, 0x1, 0x2, 0x3, 0x5, 0x8, 0x7, 0x1, 0x1, 0x1, 0x4, 0x6, 0x1, 0x1, 0x1, 0x1,                 // s0..s0
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 0, 1, 0, 1, 1, 1, 1, 1, 1, // s1..s2
    1, 2, 1, 1, 1, 1, 1, 2, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, // s3..s4
    1, 2, 1, 1, 1, 1, 1, 1, 1, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 3, 1, 3, 1, 1, 1, 1, 1, 1, // s5..s6
    1, 3, 1, 1, 1, 1, 1, 3, 1, 3, 1, 1, 1, 1, 1, 1, 1, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // s7..s8
];

/// Per-line flags collected during the decode scan.
#[derive(Debug)]
pub struct LineInfo {
    /// Whether the line contains the ASCII 28 character (file separator).
    pub ascii28: bool,
    /// Whether the line is strictly ASCII (all bytes < 128).
    pub ascii_only: bool,
    /// Whether the line is valid UTF-8 in its original form.
    pub valid_utf8: bool,
    /// Byte count up to (excluding) any null terminator.
    pub length: usize,
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            ascii28: false,
            ascii_only: true,
            valid_utf8: true,
            length: 0,
        }
    }
}

/// Scan a raw line once, applying the UTF-8 DFA and noting ASCII 28.
/// The scan stops at the first null byte, if any.
pub fn collect_line_info(data: &[u8]) -> LineInfo {
    let mut info = LineInfo::default();
    let mut state: u32 = UTF8_ACCEPT;

    for &byte in data {
        if byte == 0 {
            break;
        }
        info.length += 1;
        if byte == 28 {
            info.ascii28 = true;
        }
        if byte > 127 {
            info.ascii_only = false;
        }
        let t = UTF8D[byte as usize] as u32;
        state = UTF8D[(256 + state * 16 + t) as usize] as u32;
        if state == UTF8_REJECT {
            info.valid_utf8 = false;
        }
    }

    // A multi-byte sequence truncated at the end of the line is invalid too
    if state != UTF8_ACCEPT {
        info.valid_utf8 = false;
    }

    info
}

/// Transliterate ISO-8859-1 bytes to UTF-8. Each byte >= 0x80 becomes the
/// two-byte sequence `0xC2 + (b > 0xBF)`, `(b & 0x3F) + 0x80`.
fn iso_8859_1_to_utf8(data: &[u8], out: &mut Vec<u8>) {
    out.reserve(data.len() * 2);
    for &b in data {
        if b < 128 {
            out.push(b);
        } else {
            out.push(0xC2 + (b > 0xBF) as u8);
            out.push((b & 0x3F) + 0x80);
        }
    }
}

/// Decode a raw line into `out`, which ends up well-formed UTF-8.
///
/// Valid UTF-8 input (ASCII included) is copied verbatim; anything the DFA
/// rejects is re-interpreted as ISO-8859-1 and transliterated. The returned
/// [`LineInfo`] carries the ASCII 28 flag the tokenizer mode depends on.
pub fn decode_line(data: &[u8], out: &mut Vec<u8>) -> LineInfo {
    let info = collect_line_info(data);
    let scanned = &data[..info.length];

    out.clear();
    if info.valid_utf8 {
        out.extend_from_slice(scanned);
    } else {
        iso_8859_1_to_utf8(scanned, out);
    }
    info
}

#[cfg(test)]
mod encoding_test;
