//! Custom error types for fec2csv, implemented using `thiserror`.

use std::io;
use thiserror::Error;

/// A general error type for the FEC parser.
///
/// Only unrecoverable conditions surface here; per-row problems (unknown
/// form, malformed date, unparsable amount, over-long row) are reported as
/// warnings and parsing continues.
#[derive(Debug, Error)]
pub enum FecError {
    /// The input ended before a header line could be read.
    #[error("No data to parse")]
    EmptyInput,

    /// A schema carried a type code other than 's', 'd' or 'f'. This is a
    /// programming error in the mappings tables, not a property of the
    /// filing, so parsing aborts.
    #[error("Unknown field type code '{0}'")]
    UnknownTypeCode(char),

    /// For I/O errors (e.g., an output file that cannot be opened).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
