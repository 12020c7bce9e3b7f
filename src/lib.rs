//! # seqfilter: filtering stages for an SQLite-based amplicon pipeline.
//!
//! The pipeline stores merged reads and cluster centroids in a SQLite database.
//! Each stage removes some records from further analysis by setting their `filtered` column to a stage-specific [`FilterCode`].
//! The stages only prepare inputs and interpret outputs; the comparisons themselves are done by external tools.
//!
//! ### Stages
//!
//! * [`filter::controls`]: Sequences from negative control samples, and sequences that match them exactly (`usearch -search_exact`).
//! * [`filter::host`]: Sequences that align to the host genome (`bowtie2`).
//! * [`filter::chimeras`]: Chimeric cluster centroids (`usearch -uchime_denovo`).
//!
//! Every stage writes the relevant rows as FASTA files into a [`Workspace`], runs the tool, parses the output with the parsers in [`formats`], and updates the database.
//! The events of each stage (start, bulk queries, external commands, end) are logged in table `metadata`.
//!
//! ### Database
//!
//! See [`PipelineDb`] for the database interface and the expected tables.
//! Tables `samples`, `merged`, and `clusters` are populated by the upstream stages of the pipeline.

pub mod db;
pub mod error;
pub mod fasta;
pub mod filter;
pub mod formats;
pub mod tools;
pub mod utils;
pub mod workspace;

pub use db::{FilterCode, PipelineDb};
pub use error::{Error, Result};
pub use filter::StageReport;
pub use workspace::Workspace;
