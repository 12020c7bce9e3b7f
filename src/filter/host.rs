//! Flagging sequences that align to the host genome.
//!
//! The unfiltered sequences are aligned to a bowtie2 index of the host genome.
//! Every sequence with an alignment is flagged as a host sequence.

use super::{create_fasta, finish_fasta, StageReport};

use crate::db::{Event, FilterCode, PipelineDb};
use crate::{fasta, formats, tools, utils};
use crate::{Error, Result, Workspace};

use std::env;
use std::path::PathBuf;

//-----------------------------------------------------------------------------

/// Name of the script in the metadata log.
pub const SCRIPT: &str = "filter_host";

/// Default workspace directory.
pub const DEFAULT_WORKSPACE: &str = "host";

/// Unfiltered sequences.
pub const INPUT_FILE: &str = "merged.fasta";

/// Alignments in the SAM format.
pub const OUTPUT_FILE: &str = "output.sam";

/// Environment variable for the directory of bundled reference indexes.
pub const RESOURCES_VAR: &str = "SEQFILTER_RESOURCES";

/// Name of the default reference index in the resource directory.
pub const DEFAULT_REFERENCE: &str = "zebrafish";

/// Parameters for host filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct HostParams {
    /// Prefix of the bowtie2 index for the host genome.
    pub reference: Option<PathBuf>,
    /// Directory for intermediate files.
    pub workspace: PathBuf,
    /// The bowtie2 binary.
    pub bowtie2: PathBuf,
    /// Number of alignment threads.
    pub threads: usize,
}

impl HostParams {
    /// Returns the default reference index in the resource directory, if the directory has been set.
    pub fn default_reference() -> Option<PathBuf> {
        let dir = env::var_os(RESOURCES_VAR)?;
        Some(PathBuf::from(dir).join(DEFAULT_REFERENCE))
    }
}

impl Default for HostParams {
    fn default() -> Self {
        HostParams {
            reference: Self::default_reference(),
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            bowtie2: PathBuf::from(tools::BOWTIE2),
            threads: tools::default_threads(),
        }
    }
}

fn missing_reference() -> Error {
    Error::Config(format!("The host reference was not specified and {} is not set", RESOURCES_VAR))
}

//-----------------------------------------------------------------------------

/// Writes the unfiltered sequences into the workspace.
///
/// Returns the number of sequences.
pub fn write_sequences(db: &PipelineDb, workspace: &Workspace) -> Result<usize> {
    let input_file = workspace.path(INPUT_FILE);
    let mut output = create_fasta(&input_file)?;
    let mut count = 0;
    db.for_each_merged(Some(FilterCode::Unfiltered), |record| {
        fasta::write_record(&mut output, record.id, record.sequence.as_bytes())
            .map_err(|x| Error::io(&input_file, x))?;
        count += 1;
        Ok(())
    })?;
    finish_fasta(output, &input_file)?;
    log::info!("Wrote {} unfiltered sequences", count);
    Ok(count)
}

/// Runs bowtie2 with the file written by [`write_sequences`].
///
/// The command line is logged in the metadata table before running the tool.
pub fn run_bowtie(db: &PipelineDb, params: &HostParams, workspace: &Workspace) -> Result<()> {
    let reference = params.reference.as_ref().ok_or_else(missing_reference)?;
    let command = tools::bowtie2(
        &params.bowtie2,
        reference,
        &workspace.path(INPUT_FILE),
        &workspace.path(OUTPUT_FILE),
        params.threads,
    );
    log::info!("{}", command);
    db.record_metadata(Event::Exec, &command.to_string())?;
    command.run()
}

/// Flags the sequences with an alignment to the host genome.
///
/// Returns the number of aligned sequences and the number of flagged sequences.
pub fn import_results(db: &mut PipelineDb, workspace: &Workspace) -> Result<(usize, usize)> {
    let output_file = workspace.path(OUTPUT_FILE);
    let reader = utils::open_file(&output_file)?;
    let mapped = formats::read_sam_mapped(reader, &output_file.display().to_string())?;
    let flagged = db.flag_merged(&mapped, FilterCode::Host)?;
    log::info!("Flagged {} host sequences", flagged);
    Ok((mapped.len(), flagged))
}

/// Runs all steps of host filtering.
///
/// # Errors
///
/// Returns an error if the reference is not specified.
/// Passes through any errors from the database, the workspace, and bowtie2.
pub fn run(db: &mut PipelineDb, params: &HostParams) -> Result<StageReport> {
    if params.reference.is_none() {
        return Err(missing_reference());
    }
    let workspace = Workspace::init(&params.workspace)?;

    let mut report = StageReport::default();
    report.written = write_sequences(db, &workspace)?;
    if report.written == 0 {
        log::warn!("No unfiltered sequences to align");
        return Ok(report);
    }

    run_bowtie(db, params, &workspace)?;
    let (hits, flagged) = import_results(db, &workspace)?;
    report.hits = hits;
    report.flagged = flagged;
    Ok(report)
}

//-----------------------------------------------------------------------------
