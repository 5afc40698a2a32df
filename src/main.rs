//! Main entry point for fec2csv.
//!
//! This file:
//! - Parses command-line arguments.
//! - Initializes the FecContext and WriterContext.
//! - Decides whether to read from a file or STDIN.
//! - Runs the FEC parser over the input data.

use anyhow::Result;
use std::fs::File;
use std::io::{self, Read};

use fec2csv::buffer::LineBuffer;
use fec2csv::cli::args::parse_args;
use fec2csv::cli::usage::print_usage_and_exit;
use fec2csv::fec::context::FecContext;
use fec2csv::fec::parser::parse_fec;
use fec2csv::writer::WriterContext;

fn main() -> Result<()> {
    let cli_config = match parse_args() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error parsing arguments: {e}");
            print_usage_and_exit();
        }
    };

    if cli_config.show_usage || (cli_config.fec_id.is_empty() && !cli_config.use_stdin) {
        print_usage_and_exit();
    }

    let mut ctx = FecContext::new(
        cli_config.fec_id.clone(),
        cli_config.include_filing_id,
        cli_config.silent,
        cli_config.warn,
    );

    let mut writer_ctx = WriterContext::new(
        cli_config.output_directory.clone(),
        cli_config.fec_id.clone(),
        true,
        cli_config.buffer_size,
        None,
        None,
    );

    let source: Box<dyn Read> = if cli_config.use_stdin {
        if !cli_config.silent {
            eprintln!("Reading from STDIN for: {}", cli_config.fec_id);
        }
        Box::new(io::stdin())
    } else {
        if !cli_config.silent {
            eprintln!("Opening file: {}", cli_config.fec_id);
        }
        Box::new(File::open(&cli_config.fec_id)?)
    };
    let mut reader = LineBuffer::new(cli_config.buffer_size, source);

    parse_fec(&mut ctx, &mut reader, &mut writer_ctx)?;

    writer_ctx.flush_all()?;

    if !cli_config.silent {
        println!("Done; parsing successful for: {}", cli_config.fec_id);
    }

    Ok(())
}
