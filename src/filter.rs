//! The filtering stages.
//!
//! Each stage follows the same pattern:
//!
//! 1. Write the relevant database rows as FASTA files in the workspace.
//! 2. Run an external tool on the FASTA files.
//! 3. Parse the output of the tool and update the status of the reported rows.
//!
//! The steps are public so that they can also be run separately.
//! If a stage has nothing to compare, the tool is not run and no results are imported.
//!
//! * [`controls`]: Sequences from negative controls and exact matches to them.
//! * [`host`]: Sequences aligning to the host genome.
//! * [`chimeras`]: Chimeric cluster centroids.

use crate::{Error, Result};

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub mod chimeras;
pub mod controls;
pub mod host;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Summary of a stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Number of records written as queries for the tool.
    pub written: usize,
    /// Number of distinct records reported by the tool, whether or not they were flagged.
    pub hits: usize,
    /// Number of records whose status was changed.
    pub flagged: usize,
}

impl Display for StageReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} records compared, {} reported, {} flagged", self.written, self.hits, self.flagged)
    }
}

//-----------------------------------------------------------------------------

// Creates a buffered FASTA file.
pub(crate) fn create_fasta(filename: &Path) -> Result<BufWriter<File>> {
    let file = File::create(filename).map_err(|x| Error::io(filename, x))?;
    Ok(BufWriter::new(file))
}

// Flushes the FASTA file and reports errors with the file name.
pub(crate) fn finish_fasta(mut writer: BufWriter<File>, filename: &Path) -> Result<()> {
    writer.flush().map_err(|x| Error::io(filename, x))
}

//-----------------------------------------------------------------------------
