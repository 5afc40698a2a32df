//! Argument parsing logic for fec2csv.
//!
//! Uses `clap` to parse command-line arguments and return a `CliConfig`.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

/// A struct representing parsed command-line arguments.
#[derive(Debug, PartialEq, Eq)]
pub struct CliConfig {
    pub fec_id: String,           // Filing ID or file path
    pub include_filing_id: bool,  // Whether to include a filing_id column
    pub silent: bool,             // Suppress output messages
    pub warn: bool,               // Show warning messages
    pub use_stdin: bool,          // Whether to read from STDIN
    pub show_usage: bool,         // Whether to show usage/help
    pub output_directory: String, // Directory for output files
    pub buffer_size: usize,       // Buffer size for line reading and output
}

/// The clap command definition, shared with the CLI tests.
pub fn command() -> Command {
    Command::new("fec2csv")
        .version("0.1.0")
        .about("Convert an FEC electronic filing into per-form CSV files")
        .arg(
            Arg::new("filing-id-or-file")
                .help("Filing ID or file path")
                .required(false)
                .index(1),
        )
        .arg(
            Arg::new("include-filing-id")
                .long("include-filing-id")
                .short('f')
                .help("Include a filing_id column in the output CSV")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .long("silent")
                .short('s')
                .help("Suppress output messages")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("warn")
                .long("warn")
                .short('w')
                .help("Show per-row warning messages")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("disable-stdin")
                .long("disable-stdin")
                .help("Force reading from a file even if STDIN is piped")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("usage")
                .long("usage")
                .help("Show usage information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output-directory")
                .long("output-directory")
                .short('o')
                .help("Specify the directory for output files (default: 'output')")
                .default_value("output"),
        )
        .arg(
            Arg::new("buffer-size")
                .long("buffer-size")
                .help("Buffer size in bytes for line reading and output (default: 4096)")
                .value_parser(clap::value_parser!(usize))
                .default_value("4096"),
        )
}

/// Build a `CliConfig` from parsed matches. `stdin_piped` is passed in so
/// tests can exercise both cases without a terminal.
pub fn config_from_matches(matches: &ArgMatches, stdin_piped: bool) -> CliConfig {
    let fec_id = matches
        .get_one::<String>("filing-id-or-file")
        .cloned()
        .unwrap_or_default();

    let disable_stdin = matches.get_flag("disable-stdin");
    let use_stdin = stdin_piped && !disable_stdin && fec_id.is_empty();

    CliConfig {
        fec_id: if use_stdin && fec_id.is_empty() {
            "STDIN_DATA".to_string()
        } else {
            fec_id
        },
        include_filing_id: matches.get_flag("include-filing-id"),
        silent: matches.get_flag("silent"),
        warn: matches.get_flag("warn"),
        use_stdin,
        show_usage: matches.get_flag("usage"),
        output_directory: matches
            .get_one::<String>("output-directory")
            .cloned()
            .unwrap_or_else(|| "output".to_string()),
        buffer_size: matches.get_one::<usize>("buffer-size").copied().unwrap_or(4096),
    }
}

/// Parse command-line arguments and return a `CliConfig`.
pub fn parse_args() -> Result<CliConfig> {
    let matches = command().try_get_matches()?;
    let stdin_piped = !atty::is(atty::Stream::Stdin);
    Ok(config_from_matches(&matches, stdin_piped))
}
