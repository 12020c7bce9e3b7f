//! Flagging chimeric cluster centroids.
//!
//! Unfiltered centroids are written with their cluster sizes in decreasing order by size, as de novo detection expects.
//! `usearch -uchime_denovo` classifies each centroid, and the classifications are stored in table `chimeras`.
//! Centroids classified as chimeric are flagged in table `clusters`.

use super::{create_fasta, finish_fasta, StageReport};

use crate::db::{Event, FilterCode, PipelineDb};
use crate::formats::Verdict;
use crate::{fasta, formats, tools, utils};
use crate::{Error, Result, Workspace};

use std::path::PathBuf;

//-----------------------------------------------------------------------------

/// Name of the script in the metadata log.
pub const SCRIPT: &str = "filter_chimeras";

/// Default workspace directory.
pub const DEFAULT_WORKSPACE: &str = "chimeras";

/// Abundance-annotated centroids.
pub const INPUT_FILE: &str = "clusters.fasta";

/// Classifications in the UCHIME format.
pub const OUTPUT_FILE: &str = "results.uchime";

/// Parameters for chimera filtering.
#[derive(Clone, Debug, PartialEq)]
pub struct ChimeraParams {
    /// Directory for intermediate files.
    pub workspace: PathBuf,
    /// The usearch binary.
    pub usearch: PathBuf,
    /// Minimum abundance ratio between a parent and a chimera; usearch decides if not given.
    pub abskew: Option<f64>,
    /// Replace an existing `chimeras` table.
    pub force: bool,
}

impl Default for ChimeraParams {
    fn default() -> Self {
        ChimeraParams {
            workspace: PathBuf::from(DEFAULT_WORKSPACE),
            usearch: PathBuf::from(tools::USEARCH),
            abskew: None,
            force: false,
        }
    }
}

//-----------------------------------------------------------------------------

/// Writes the unfiltered centroids into the workspace.
///
/// Returns the number of centroids.
pub fn write_centroids(db: &PipelineDb, workspace: &Workspace) -> Result<usize> {
    let input_file = workspace.path(INPUT_FILE);
    let mut output = create_fasta(&input_file)?;
    let mut count = 0;
    db.for_each_cluster(FilterCode::Unfiltered, |record| {
        fasta::write_sized_record(&mut output, record.id, record.size, record.sequence.as_bytes())
            .map_err(|x| Error::io(&input_file, x))?;
        count += 1;
        Ok(())
    })?;
    finish_fasta(output, &input_file)?;
    log::info!("Wrote {} cluster centroids", count);
    Ok(count)
}

/// Runs `usearch -uchime_denovo` with the file written by [`write_centroids`].
///
/// The command line is logged in the metadata table before running the tool.
pub fn run_uchime(db: &PipelineDb, params: &ChimeraParams, workspace: &Workspace) -> Result<()> {
    let command = tools::usearch_uchime_denovo(
        &params.usearch,
        &workspace.path(INPUT_FILE),
        &workspace.path(OUTPUT_FILE),
        params.abskew,
    );
    log::info!("{}", command);
    db.record_metadata(Event::Exec, &command.to_string())?;
    command.run()
}

/// Stores the classifications and flags the chimeric centroids.
///
/// Returns the number of classified centroids and the number of flagged centroids.
pub fn import_results(db: &mut PipelineDb, workspace: &Workspace) -> Result<(usize, usize)> {
    let output_file = workspace.path(OUTPUT_FILE);
    let reader = utils::open_file(&output_file)?;
    let records = formats::read_uchime(reader, &output_file.display().to_string())?;

    let classified: Vec<(usize, Verdict)> = records.iter().map(|record| (record.id, record.verdict)).collect();
    let inserted = db.insert_chimeras(&classified)?;
    log::info!("Stored {} chimera classifications", inserted);
    let mut ids: Vec<usize> = classified.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut chimeric: Vec<usize> = records.iter()
        .filter(|record| record.verdict == Verdict::Chimeric)
        .map(|record| record.id)
        .collect();
    chimeric.sort_unstable();
    chimeric.dedup();
    let flagged = db.flag_clusters(&chimeric, FilterCode::Chimera)?;
    log::info!("Flagged {} chimeric centroids", flagged);
    Ok((ids.len(), flagged))
}

/// Runs all steps of chimera filtering.
///
/// # Errors
///
/// Returns an error if table `chimeras` already exists and `force` is not set.
/// With `force`, the centroids flagged by the replaced classifications are classified again.
/// Passes through any errors from the database, the workspace, and usearch.
pub fn run(db: &mut PipelineDb, params: &ChimeraParams) -> Result<StageReport> {
    db.init_chimeras_table(params.force)?;
    let workspace = Workspace::init(&params.workspace)?;

    let mut report = StageReport::default();
    report.written = write_centroids(db, &workspace)?;
    if report.written == 0 {
        log::warn!("No unfiltered cluster centroids to classify");
        return Ok(report);
    }

    run_uchime(db, params, &workspace)?;
    let (hits, flagged) = import_results(db, &workspace)?;
    report.hits = hits;
    report.flagged = flagged;
    Ok(report)
}

//-----------------------------------------------------------------------------
