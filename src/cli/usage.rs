//! Handles usage/help printing for fec2csv.

/// Print usage information and exit the program with a status code of 1.
pub fn print_usage_and_exit() -> ! {
    eprintln!(
        r#"Usage:
  fec2csv [FLAGS] <FILING_ID_OR_FILE>

Flags:
  -f, --include-filing-id  Include a filing_id column in the output CSV
  -s, --silent             Suppress output messages
  -w, --warn               Show per-row warning messages
  -o, --output-directory   Directory for output files (default: 'output')
      --buffer-size        Buffer size in bytes for input and output (default: 4096)
      --disable-stdin      Disable piped STDIN usage
      --usage              Show usage information

Examples:
  fec2csv 13360.fec
  fec2csv --include-filing-id 13360.fec
  cat 13360.fec | fec2csv --warn
"#
    );
    std::process::exit(1);
}
