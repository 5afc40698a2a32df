//! The library root for fec2csv.
//!
//! This module re-exports key components, allowing them to be accessed from `main.rs`.

pub mod buffer; // Line re-segmentation over a byte source
pub mod cli; // Command-line interface logic
pub mod csv_helper; // Field tokenization and typed emission
pub mod encoding; // Encoding-related utilities
pub mod errors; // Custom error types
pub mod fec; // FEC parsing logic
pub mod mappings; // Form schema lookup tables
pub mod writer; // Buffered fan-out output
