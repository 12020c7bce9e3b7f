//! Flagging sequences from negative controls and sequences that match them exactly.
//!
//! All sequences from the control samples are flagged as contaminants.
//! The remaining unfiltered sequences are then compared against the control sequences with `usearch -search_exact`.
//! Every sequence with an exact match is flagged as a contaminant as well.

use super::{create_fasta, finish_fasta, StageReport};

use crate::db::{Event, FilterCode, PipelineDb};
use crate::{fasta, formats, tools, utils};
use crate::{Error, Result, Workspace};

use std::collections::HashSet;
use std::path::PathBuf;

//-----------------------------------------------------------------------------

/// Name of the script in the metadata log.
pub const SCRIPT: &str = "filter_controls";

/// Default workspace directory.
pub const DEFAULT_WORKSPACE: &str = "contaminate";

/// Sequences from the control samples.
pub const CONTROLS_FILE: &str = "controls.fasta";

/// Unfiltered sequences from the other samples.
pub const SEQUENCES_FILE: &str = "sequences.fasta";

/// Exact matches in the UC format.
pub const OUTPUT_FILE: &str = "results.uc";

/// Parameters for control filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlParams {
    /// File listing the names of the negative control samples.
    pub controls: PathBuf,
    /// Directory for intermediate files.
    pub workspace: PathBuf,
    /// The usearch binary.
    pub usearch: PathBuf,
    /// Number of threads for usearch; the tool decides if not given.
    pub threads: Option<usize>,
}

impl Default for ControlParams {
    fn default() -> Self {
        ControlParams {
            controls: PathBuf::new(),
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            usearch: PathBuf::from(tools::USEARCH),
            threads: None,
        }
    }
}

//-----------------------------------------------------------------------------

/// Returns the sample ids for the given sample names.
///
/// Names without a sample are skipped with a warning.
pub fn map_sample_ids(db: &PipelineDb, names: &[String]) -> Result<Vec<usize>> {
    let mut result = Vec::new();
    for name in names {
        match db.sample_id(name)? {
            Some(id) => result.push(id),
            None => log::warn!("Control sample {} is not in the database", name),
        }
    }
    Ok(result)
}

/// Flags all sequences from the control samples as contaminants.
///
/// Returns the number of flagged sequences.
pub fn flag_controls(db: &mut PipelineDb, sample_ids: &[usize]) -> Result<usize> {
    let flagged = db.flag_samples(sample_ids, FilterCode::Contaminant)?;
    log::info!("Flagged {} sequences from {} control samples", flagged, sample_ids.len());
    Ok(flagged)
}

/// Writes the control sequences and the unfiltered sequences from other samples into the workspace.
///
/// Control sequences are written regardless of their status, as they have already been flagged.
/// Returns the number of control sequences and the number of other sequences.
pub fn write_sequences(db: &PipelineDb, sample_ids: &[usize], workspace: &Workspace) -> Result<(usize, usize)> {
    let controls: HashSet<usize> = sample_ids.iter().copied().collect();
    let controls_file = workspace.path(CONTROLS_FILE);
    let sequences_file = workspace.path(SEQUENCES_FILE);
    let mut controls_out = create_fasta(&controls_file)?;
    let mut sequences_out = create_fasta(&sequences_file)?;

    let mut control_count = 0;
    let mut sequence_count = 0;
    db.for_each_merged(None, |record| {
        if controls.contains(&record.sample_id) {
            fasta::write_record(&mut controls_out, record.id, record.sequence.as_bytes())
                .map_err(|x| Error::io(&controls_file, x))?;
            control_count += 1;
        } else if record.filtered == FilterCode::Unfiltered {
            fasta::write_record(&mut sequences_out, record.id, record.sequence.as_bytes())
                .map_err(|x| Error::io(&sequences_file, x))?;
            sequence_count += 1;
        }
        Ok(())
    })?;
    finish_fasta(controls_out, &controls_file)?;
    finish_fasta(sequences_out, &sequences_file)?;

    log::info!("Wrote {} control sequences and {} other sequences", control_count, sequence_count);
    Ok((control_count, sequence_count))
}

/// Runs `usearch -search_exact` with the files written by [`write_sequences`].
///
/// The command line is logged in the metadata table before running the tool.
pub fn run_comparison(db: &PipelineDb, params: &ControlParams, workspace: &Workspace) -> Result<()> {
    let command = tools::usearch_search_exact(
        &params.usearch,
        &workspace.path(SEQUENCES_FILE),
        &workspace.path(CONTROLS_FILE),
        &workspace.path(OUTPUT_FILE),
        params.threads,
    );
    log::info!("{}", command);
    db.record_metadata(Event::Exec, &command.to_string())?;
    command.run()
}

/// Flags the sequences with an exact match to a control sequence.
///
/// Returns the number of matching sequences and the number of flagged sequences.
pub fn import_results(db: &mut PipelineDb, workspace: &Workspace) -> Result<(usize, usize)> {
    let output_file = workspace.path(OUTPUT_FILE);
    let reader = utils::open_file(&output_file)?;
    let hits = formats::read_uc_hits(reader, &output_file.display().to_string())?;
    let flagged = db.flag_merged(&hits, FilterCode::Contaminant)?;
    log::info!("Flagged {} sequences matching the controls", flagged);
    Ok((hits.len(), flagged))
}

/// Runs all steps of control filtering.
///
/// # Errors
///
/// Returns an error if the control list is not specified or cannot be read.
/// Passes through any errors from the database, the workspace, and usearch.
pub fn run(db: &mut PipelineDb, params: &ControlParams) -> Result<StageReport> {
    if params.controls.as_os_str().is_empty() {
        return Err(Error::Config(String::from("The list of control samples was not specified")));
    }
    let workspace = Workspace::init(&params.workspace)?;
    let names = utils::read_name_list(&params.controls)?;
    let sample_ids = map_sample_ids(db, &names)?;

    let mut report = StageReport::default();
    report.flagged += flag_controls(db, &sample_ids)?;
    let (controls, sequences) = write_sequences(db, &sample_ids, &workspace)?;
    report.written = sequences;
    if controls == 0 || sequences == 0 {
        log::warn!("Nothing to compare: {} control sequences, {} other sequences", controls, sequences);
        return Ok(report);
    }

    run_comparison(db, params, &workspace)?;
    let (hits, flagged) = import_results(db, &workspace)?;
    report.hits = hits;
    report.flagged += flagged;
    log::info!("Compared {} sequences against {} control sequences: {} matches", sequences, controls, hits);
    Ok(report)
}

//-----------------------------------------------------------------------------
