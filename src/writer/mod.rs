//! Buffered fan-out writer keyed by output name.
//!
//! Every form code gets its own output stream (a file under
//! `<output_dir>/<filing_id>/`, a custom write callback, or both) fronted
//! by a fixed-capacity byte buffer. Rows for different forms interleave in
//! source order, so a one-entry most-recently-used shortcut covers the
//! common run of consecutive rows hitting the same stream. A divert mode
//! redirects writes into an in-memory buffer, which the legacy header
//! parser uses to assemble a values row while the keys row streams out.

use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};

/// The extension every form output is written under.
pub const CSV_EXTENSION: &str = ".csv";

/// Receives each flushed chunk as `(filename, extension, bytes)`.
pub type CustomWriteFn = dyn Fn(&str, &str, &[u8]) -> Result<()> + Send + Sync;

/// Receives each completed row as `(filename, line, type_codes)`.
pub type CustomLineFn = dyn Fn(&str, &str, &str) -> Result<()> + Send + Sync;

struct FileEntry {
    buffer: Vec<u8>,
    file: Option<File>,
}

fn normalize_filename(filename: &str) -> String {
    filename.replace(['/', '\\'], "-")
}

fn flush_entry(
    custom_write_fn: &Option<Box<CustomWriteFn>>,
    key: &(String, String),
    entry: &mut FileEntry,
) -> Result<()> {
    if entry.buffer.is_empty() {
        return Ok(());
    }
    if let Some(write_fn) = custom_write_fn {
        write_fn(&key.0, &key.1, &entry.buffer)?;
    }
    if let Some(file) = entry.file.as_mut() {
        file.write_all(&entry.buffer)
            .map_err(|e| anyhow!("Failed to write to {}{}: {}", key.0, key.1, e))?;
    }
    entry.buffer.clear();
    Ok(())
}

/// The fan-out writer.
pub struct WriterContext {
    output_directory: String,
    filing_id: String,
    write_to_disk: bool,
    buffer_size: usize,

    open_files: HashMap<(String, String), FileEntry>,
    last_key: Option<(String, String)>,

    local: bool,
    local_buffer: Vec<u8>,

    custom_write_fn: Option<Box<CustomWriteFn>>,
    custom_line_fn: Option<Box<CustomLineFn>>,
    custom_line_buffer: Vec<u8>,
}

impl WriterContext {
    /// - `output_directory`: where `<filing_id>/<form>.csv` files land
    /// - `filing_id`: subdirectory name (also the filing-id column value)
    /// - `write_to_disk`: disable to drive only the callbacks
    /// - `buffer_size`: per-stream buffer capacity in bytes
    pub fn new(
        output_directory: String,
        filing_id: String,
        write_to_disk: bool,
        buffer_size: usize,
        custom_write_fn: Option<Box<CustomWriteFn>>,
        custom_line_fn: Option<Box<CustomLineFn>>,
    ) -> Self {
        Self {
            output_directory,
            filing_id,
            write_to_disk,
            buffer_size: buffer_size.max(1),
            open_files: HashMap::new(),
            last_key: None,
            local: false,
            local_buffer: Vec::new(),
            custom_write_fn,
            custom_line_fn,
            custom_line_buffer: Vec::new(),
        }
    }

    /// Look up or create the stream for `filename` + `extension`. Returns
    /// true when the stream was freshly opened, so the caller knows to
    /// write the header row first.
    pub fn ensure_stream(&mut self, filename: &str, extension: &str) -> Result<bool> {
        if let Some(key) = &self.last_key {
            if key.0 == filename && key.1 == extension {
                return Ok(false);
            }
        }

        let key = (filename.to_string(), extension.to_string());
        if self.open_files.contains_key(&key) {
            self.last_key = Some(key);
            return Ok(false);
        }

        let file = if self.write_to_disk {
            let dir_path = Path::new(&self.output_directory).join(&self.filing_id);
            std::fs::create_dir_all(&dir_path)?;
            let fullpath = dir_path.join(format!("{}{}", normalize_filename(filename), extension));
            Some(
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&fullpath)
                    .map_err(|e| anyhow!("Failed to open {}: {}", fullpath.display(), e))?,
            )
        } else {
            None
        };

        self.open_files.insert(
            key.clone(),
            FileEntry {
                buffer: Vec::with_capacity(self.buffer_size),
                file,
            },
        );
        self.last_key = Some(key);
        Ok(true)
    }

    /// Write raw bytes through the stream's buffer, flushing whenever the
    /// buffer fills.
    pub fn write_bytes(&mut self, filename: &str, extension: &str, data: &[u8]) -> Result<()> {
        if self.local {
            self.local_buffer.extend_from_slice(data);
            return Ok(());
        }

        self.ensure_stream(filename, extension)?;
        let key = (filename.to_string(), extension.to_string());
        let mut remaining = data;
        loop {
            let entry = self
                .open_files
                .get_mut(&key)
                .ok_or_else(|| anyhow!("File entry not found in open_files"))?;
            let space = self.buffer_size - entry.buffer.len();
            if remaining.len() <= space {
                entry.buffer.extend_from_slice(remaining);
                if entry.buffer.len() >= self.buffer_size {
                    flush_entry(&self.custom_write_fn, &key, entry)?;
                }
                break;
            }
            let (head, tail) = remaining.split_at(space);
            entry.buffer.extend_from_slice(head);
            flush_entry(&self.custom_write_fn, &key, entry)?;
            remaining = tail;
        }

        if self.custom_line_fn.is_some() {
            self.custom_line_buffer.extend_from_slice(data);
        }
        Ok(())
    }

    pub fn write_string(&mut self, filename: &str, extension: &str, s: &str) -> Result<()> {
        self.write_bytes(filename, extension, s.as_bytes())
    }

    pub fn write_char(&mut self, filename: &str, extension: &str, c: char) -> Result<()> {
        let mut buf = [0; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.write_bytes(filename, extension, encoded.as_bytes())
    }

    /// Fixed-point, two decimal places.
    pub fn write_double(&mut self, filename: &str, value: f64) -> Result<()> {
        let mut s = String::new();
        write!(&mut s, "{:.2}", value)?;
        self.write_string(filename, CSV_EXTENSION, &s)
    }

    /// Hand the just-completed row to the line callback, if any. `types`
    /// is the schema's type-code string for the row, empty when unknown.
    pub fn end_line(&mut self, types: &str) -> Result<()> {
        if let Some(line_fn) = &self.custom_line_fn {
            let filename = self
                .last_key
                .as_ref()
                .map(|(f, _)| f.as_str())
                .unwrap_or("");
            let line = String::from_utf8_lossy(&self.custom_line_buffer);
            line_fn(filename, &line, types)?;
        }
        self.custom_line_buffer.clear();
        Ok(())
    }

    /// Divert subsequent writes into an in-memory buffer.
    pub fn start_local_buffer_mode(&mut self) {
        self.local = true;
        self.local_buffer.clear();
    }

    /// Stop diverting and return what was collected.
    pub fn finish_local_buffer_mode(&mut self) -> Vec<u8> {
        self.local = false;
        std::mem::take(&mut self.local_buffer)
    }

    /// Flush every stream's buffer and sync file handles.
    pub fn flush_all(&mut self) -> Result<()> {
        let Self {
            open_files,
            custom_write_fn,
            ..
        } = self;
        for (key, entry) in open_files.iter_mut() {
            flush_entry(custom_write_fn, key, entry)?;
            if let Some(file) = entry.file.as_mut() {
                file.flush()
                    .map_err(|e| anyhow!("Failed to flush {}{}: {}", key.0, key.1, e))?;
            }
        }
        Ok(())
    }
}

impl Drop for WriterContext {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all() {
            eprintln!("Error flushing output buffers: {e}");
        }
    }
}
