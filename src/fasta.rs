//! Writing database rows as FASTA and recovering database ids from FASTA labels.
//!
//! Records are written with the database identifier as the label and the sequence on a single line.
//! De novo chimera detection needs abundances, which are written as a usearch-style `;size=N;` annotation.

use std::io::{self, Write};

//-----------------------------------------------------------------------------

/// Writes a FASTA record `>id` followed by the sequence.
pub fn write_record<W: Write>(output: &mut W, id: usize, sequence: &[u8]) -> io::Result<()> {
    writeln!(output, ">{}", id)?;
    output.write_all(sequence)?;
    output.write_all(b"\n")
}

/// Writes a FASTA record `>id;size=N;` followed by the sequence.
pub fn write_sized_record<W: Write>(output: &mut W, id: usize, size: usize, sequence: &[u8]) -> io::Result<()> {
    writeln!(output, ">{};size={};", id, size)?;
    output.write_all(sequence)?;
    output.write_all(b"\n")
}

/// Returns the database id from a label written by [`write_record`] or [`write_sized_record`].
///
/// Any `;key=value;` annotations after the id are ignored.
/// Tools may also append a description after whitespace, which is ignored as well.
pub fn parse_label(label: &str) -> Result<usize, String> {
    let label = label.strip_prefix('>').unwrap_or(label);
    let end = label.find(|c: char| c == ';' || c.is_whitespace()).unwrap_or(label.len());
    let id = &label[..end];
    id.parse::<usize>().map_err(|_| format!("Label {} does not start with a record id", label))
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
