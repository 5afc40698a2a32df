//! Defines the `FecContext` struct holding per-filing parse state.

use regex::Regex;

use crate::mappings::FormSchema;

/// The primary context for managing FEC parsing state.
///
/// One context serves exactly one filing; nothing is shared between
/// filings, so independent filings can be parsed on independent threads.
pub struct FecContext {
    pub f99_text_start: Regex, // Regex for detecting F99 text start
    pub f99_text_end: Regex,   // Regex for detecting F99 text end
    pub version: Option<String>, // Parsed version (if any)
    pub use_ascii28: bool,     // Whether the current line uses ASCII28 delimiters
    pub silent: bool,          // Suppress output messages
    pub warn: bool,            // Show warning messages
    pub include_filing_id: bool, // Include filing ID in CSV output
    pub fec_id: String,        // Filing ID or file name

    // Single-slot schema cache; filings cluster many consecutive rows
    // under one form, so one slot is enough.
    pub form_type: Option<String>,
    pub schema: Option<FormSchema>,

    // Line buffers reused across rows
    pub(crate) raw_line: Vec<u8>,
    pub(crate) line: Vec<u8>,
}

impl FecContext {
    /// Create a new FecContext with the given configuration.
    pub fn new(fec_id: String, include_filing_id: bool, silent: bool, warn: bool) -> Self {
        Self {
            f99_text_start: Regex::new(r"(?i)^\s*\[BEGIN\s?TEXT\]\s*$")
                .expect("Failed to compile F99 start regex"),
            f99_text_end: Regex::new(r"(?i)^\s*\[END\s?TEXT\]\s*$")
                .expect("Failed to compile F99 end regex"),
            version: None,
            use_ascii28: false,
            silent,
            warn,
            include_filing_id,
            fec_id,
            form_type: None,
            schema: None,
            raw_line: Vec::new(),
            line: Vec::new(),
        }
    }
}
