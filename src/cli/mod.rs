//! CLI module for fec2csv.
//!
//! This module contains submodules for argument parsing and usage/help printing.

pub mod args; // Argument parsing logic
pub mod usage; // Usage/help printing logic
