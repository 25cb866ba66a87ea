//! Delimited output file writing.
//!
//! One file per job run, `;`-delimited, header row first. Quoting is
//! minimal: only fields containing the delimiter, a quote, or a line break
//! are wrapped, with embedded quotes doubled.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Field delimiter for export files.
pub const DELIMITER: char = ';';

/// Buffered writer producing one delimited record per line.
pub struct DelimitedWriter {
    out: BufWriter<File>,
}

impl DelimitedWriter {
    /// Create (or truncate) the output file.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Write one record.
    pub fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) -> io::Result<()> {
        let mut line = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                line.push(DELIMITER);
            }
            push_field(&mut line, field.as_ref());
        }
        line.push('\n');
        self.out.write_all(line.as_bytes())
    }

    /// Flush buffered output to disk.
    pub fn finish(mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn push_field(line: &mut String, field: &str) {
    let needs_quoting = field.contains([DELIMITER, '"', '\n', '\r']);
    if needs_quoting {
        line.push('"');
        for c in field.chars() {
            if c == '"' {
                line.push('"');
            }
            line.push(c);
        }
        line.push('"');
    } else {
        line.push_str(field);
    }
}
