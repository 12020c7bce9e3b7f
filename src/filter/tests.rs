// The stages are tested against fake tools: shell scripts that write canned output
// to the file given after an output option and log their arguments.

use super::*;

use super::chimeras::ChimeraParams;
use super::controls::ControlParams;
use super::host::HostParams;

use crate::db::{Event, FilterCode, PipelineDb, Table};
use crate::formats::Verdict;
use crate::utils;

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

//-----------------------------------------------------------------------------

fn create_database(dir: &TempDir, script: &str) -> PipelineDb {
    let db_file = dir.path().join("pipeline.db");
    let result = PipelineDb::create(&db_file);
    assert!(result.is_ok(), "Failed to create database: {}", result.unwrap_err());
    let database = PipelineDb::open(&db_file, script);
    assert!(database.is_ok(), "Failed to open database: {}", database.unwrap_err());
    database.unwrap()
}

// Writes an executable script that copies `output` to the path following `option`.
// The arguments are written to `<name>.args` in the same directory.
#[cfg(unix)]
fn fake_tool(dir: &TempDir, name: &str, option: &str, output: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let filename = dir.path().join(name);
    let args_file = dir.path().join(format!("{}.args", name));
    let script = format!(
        "#!/bin/sh\necho \"$@\" > '{}'\nout=''\nwhile [ $# -gt 0 ]; do\n  if [ \"$1\" = '{}' ]; then out=\"$2\"; fi\n  shift\ndone\ncat > \"$out\" <<'CANNED_OUTPUT'\n{}CANNED_OUTPUT\n",
        args_file.display(), option, output
    );
    fs::write(&filename, script).unwrap();
    fs::set_permissions(&filename, fs::Permissions::from_mode(0o755)).unwrap();
    filename
}

fn tool_args(dir: &TempDir, name: &str) -> String {
    let args = fs::read_to_string(dir.path().join(format!("{}.args", name)));
    assert!(args.is_ok(), "Tool {} was not run", name);
    args.unwrap()
}

fn read_workspace_file(params_workspace: &Path, filename: &str) -> String {
    let path = params_workspace.join(filename);
    let content = fs::read_to_string(&path);
    assert!(content.is_ok(), "Failed to read {}", path.display());
    content.unwrap()
}

fn merged_with_status(database: &PipelineDb, code: FilterCode) -> Vec<usize> {
    let mut result = Vec::new();
    database.for_each_merged(Some(code), |record| {
        result.push(record.id);
        Ok(())
    }).unwrap();
    result
}

fn exec_events(database: &PipelineDb) -> Vec<String> {
    database.metadata().unwrap().into_iter()
        .filter(|(event, _)| event == Event::Exec.as_str())
        .map(|(_, message)| message)
        .collect()
}

//-----------------------------------------------------------------------------

#[test]
fn report_display() {
    let report = StageReport { written: 10, hits: 3, flagged: 2 };
    assert_eq!(report.to_string(), "10 records compared, 3 reported, 2 flagged");
}

//-----------------------------------------------------------------------------

// Samples S1 and S2 with two sequences each, controls NC1 and NC2 with one sequence each,
// and a sequence in S1 that has already been flagged as a host sequence.
fn control_database(dir: &TempDir) -> PipelineDb {
    let mut database = create_database(dir, controls::SCRIPT);
    let s1 = database.insert_sample("S1").unwrap();
    let s2 = database.insert_sample("S2").unwrap();
    let nc1 = database.insert_sample("NC1").unwrap();
    let nc2 = database.insert_sample("NC2").unwrap();
    database.insert_merged(s1, "ACGTACGTAA").unwrap();
    database.insert_merged(s1, "GGGGCCCCTT").unwrap();
    database.insert_merged(s2, "TTTTAAAACC").unwrap();
    database.insert_merged(s2, "CACACACAGG").unwrap();
    database.insert_merged(nc1, "GGGGCCCCTT").unwrap();
    database.insert_merged(nc2, "TTTTAAAACC").unwrap();
    let host = database.insert_merged(s1, "ATATATATAT").unwrap();
    database.flag_merged(&[host], FilterCode::Host).unwrap();
    database
}

#[test]
fn control_params() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = control_database(&dir);
    let params = ControlParams::default();
    let result = controls::run(&mut database, &params);
    assert!(matches!(result, Err(Error::Config(_))), "Ran without a control list");
}

#[test]
fn control_sample_ids() {
    let dir = tempfile::tempdir().unwrap();
    let database = control_database(&dir);
    let names = utils::read_name_list(utils::get_test_data("controls.txt")).unwrap();
    let ids = controls::map_sample_ids(&database, &names).unwrap();
    assert_eq!(ids, vec![3, 4], "Wrong control sample ids");
}

#[cfg(unix)]
#[test]
fn control_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = control_database(&dir);
    let uc = "N\t*\t10\t*\t*\t*\t*\t*\t1\t*\nH\t0\t10\t100.0\t+\t0\t0\t10M\t2\t5\nH\t1\t10\t100.0\t+\t0\t0\t10M\t3\t6\nN\t*\t10\t*\t*\t*\t*\t*\t4\t*\n";
    let params = ControlParams {
        controls: utils::get_test_data("controls.txt"),
        workspace: dir.path().join("contaminate"),
        usearch: fake_tool(&dir, "usearch", "-uc", uc),
        threads: Some(2),
    };

    let report = controls::run(&mut database, &params);
    assert!(report.is_ok(), "Control filtering failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap(), StageReport { written: 4, hits: 2, flagged: 4 });

    // Control sequences are written whatever their status; other sequences only if unfiltered.
    assert_eq!(read_workspace_file(&params.workspace, controls::CONTROLS_FILE), ">5\nGGGGCCCCTT\n>6\nTTTTAAAACC\n");
    assert_eq!(
        read_workspace_file(&params.workspace, controls::SEQUENCES_FILE),
        ">1\nACGTACGTAA\n>2\nGGGGCCCCTT\n>3\nTTTTAAAACC\n>4\nCACACACAGG\n"
    );

    assert_eq!(merged_with_status(&database, FilterCode::Contaminant), vec![2, 3, 5, 6]);
    assert_eq!(merged_with_status(&database, FilterCode::Unfiltered), vec![1, 4]);
    assert_eq!(merged_with_status(&database, FilterCode::Host), vec![7], "A host sequence was reflagged");

    let args = tool_args(&dir, "usearch");
    assert!(args.starts_with("-search_exact "), "Wrong usearch arguments: {}", args);
    assert!(args.contains(" -strand plus "), "Wrong usearch arguments: {}", args);
    assert!(args.trim_end().ends_with("-threads 2"), "Wrong usearch arguments: {}", args);
    let execs = exec_events(&database);
    assert_eq!(execs.len(), 1);
    assert!(execs[0].contains("-search_exact"), "Wrong exec event: {}", execs[0]);
}

#[test]
fn no_control_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = control_database(&dir);
    let list = dir.path().join("controls.txt");
    fs::write(&list, "missing\n").unwrap();
    let params = ControlParams {
        controls: list,
        workspace: dir.path().join("contaminate"),
        usearch: dir.path().join("no-such-usearch"),
        threads: None,
    };

    // The tool does not exist, so the stage must not try to run it.
    let report = controls::run(&mut database, &params);
    assert!(report.is_ok(), "Control filtering failed: {}", report.unwrap_err());
    // Without control samples, NC1 and NC2 are ordinary samples.
    assert_eq!(report.unwrap(), StageReport { written: 6, hits: 0, flagged: 0 });
    assert!(read_workspace_file(&params.workspace, controls::CONTROLS_FILE).is_empty());
    assert!(exec_events(&database).is_empty());
}

//-----------------------------------------------------------------------------

// Four unfiltered sequences and one contaminant.
fn host_database(dir: &TempDir) -> PipelineDb {
    let mut database = create_database(dir, host::SCRIPT);
    let sample = database.insert_sample("S1").unwrap();
    for sequence in ["ACGTACGT", "GGGGCCCC", "TTTTAAAA", "CACACACA", "GTGTGTGT"] {
        database.insert_merged(sample, sequence).unwrap();
    }
    database.flag_merged(&[5], FilterCode::Contaminant).unwrap();
    database
}

#[test]
fn host_params() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = host_database(&dir);
    let params = HostParams {
        reference: None,
        workspace: dir.path().join("host"),
        bowtie2: PathBuf::from("bowtie2"),
        threads: 1,
    };
    let result = host::run(&mut database, &params);
    assert!(matches!(result, Err(Error::Config(_))), "Ran without a reference");
    assert!(HostParams::default().threads >= 1);
}

#[cfg(unix)]
#[test]
fn host_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = host_database(&dir);
    let sam = "2\t0\tchr1\t100\t42\t8M\t*\t0\t0\tGGGGCCCC\tIIIIIIII\n3\t4\t*\t0\t0\t*\t*\t0\t0\tTTTTAAAA\tIIIIIIII\n4\t16\tchr9\t5\t1\t8M\t*\t0\t0\tTGTGTGTG\tIIIIIIII\n";
    let params = HostParams {
        reference: Some(dir.path().join("zebrafish")),
        workspace: dir.path().join("host"),
        bowtie2: fake_tool(&dir, "bowtie2", "-S", sam),
        threads: 3,
    };

    let report = host::run(&mut database, &params);
    assert!(report.is_ok(), "Host filtering failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap(), StageReport { written: 4, hits: 2, flagged: 2 });

    assert_eq!(
        read_workspace_file(&params.workspace, host::INPUT_FILE),
        ">1\nACGTACGT\n>2\nGGGGCCCC\n>3\nTTTTAAAA\n>4\nCACACACA\n"
    );
    assert_eq!(merged_with_status(&database, FilterCode::Host), vec![2, 4]);
    assert_eq!(merged_with_status(&database, FilterCode::Unfiltered), vec![1, 3]);
    assert_eq!(merged_with_status(&database, FilterCode::Contaminant), vec![5]);

    let args = tool_args(&dir, "bowtie2");
    assert!(args.starts_with("-p 3 --no-unal -f --no-hd -S "), "Wrong bowtie2 arguments: {}", args);
    assert!(args.contains("zebrafish -U "), "Wrong bowtie2 arguments: {}", args);
}

#[cfg(unix)]
#[test]
fn host_tool_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = host_database(&dir);
    let params = HostParams {
        reference: Some(dir.path().join("zebrafish")),
        workspace: dir.path().join("host"),
        bowtie2: PathBuf::from("false"),
        threads: 1,
    };

    let result = host::run(&mut database, &params);
    assert!(matches!(result, Err(Error::ToolFailed { .. })), "The failure was not reported");

    // The command was logged before running it, and nothing was flagged.
    assert_eq!(exec_events(&database).len(), 1);
    assert_eq!(merged_with_status(&database, FilterCode::Unfiltered), vec![1, 2, 3, 4]);
}

//-----------------------------------------------------------------------------

// Three unfiltered clusters and one chimera flagged earlier.
fn chimera_database(dir: &TempDir) -> PipelineDb {
    let mut database = create_database(dir, chimeras::SCRIPT);
    database.insert_cluster("ACGTACGT", 120).unwrap();
    database.insert_cluster("GGGGCCCC", 80).unwrap();
    database.insert_cluster("TTTTAAAA", 9).unwrap();
    database.insert_cluster("CACACACA", 300).unwrap();
    database.flag_clusters(&[4], FilterCode::Chimera).unwrap();
    database
}

#[cfg(unix)]
#[test]
fn chimera_filtering() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = chimera_database(&dir);
    let uchime = fs::read_to_string(utils::get_test_data("results.uchime")).unwrap();
    let params = ChimeraParams {
        workspace: dir.path().join("chimeras"),
        usearch: fake_tool(&dir, "usearch", "-uchimeout", &uchime),
        abskew: Some(2.0),
        force: false,
    };

    let report = chimeras::run(&mut database, &params);
    assert!(report.is_ok(), "Chimera filtering failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap(), StageReport { written: 3, hits: 3, flagged: 1 });

    assert_eq!(
        read_workspace_file(&params.workspace, chimeras::INPUT_FILE),
        ">1;size=120;\nACGTACGT\n>2;size=80;\nGGGGCCCC\n>3;size=9;\nTTTTAAAA\n"
    );
    assert_eq!(database.chimeras().unwrap(), vec![
        (1, Verdict::NotChimeric),
        (2, Verdict::Borderline),
        (3, Verdict::Chimeric),
    ]);
    assert_eq!(
        database.filter_counts(Table::Clusters).unwrap(),
        vec![(FilterCode::Unfiltered, 2), (FilterCode::Chimera, 2)]
    );

    let args = tool_args(&dir, "usearch");
    assert!(args.starts_with("-uchime_denovo "), "Wrong usearch arguments: {}", args);
    assert!(args.trim_end().ends_with("-abskew 2"), "Wrong usearch arguments: {}", args);

    // The classifications are only replaced with force.
    let result = chimeras::run(&mut database, &params);
    assert!(matches!(result, Err(Error::Schema(_))), "Replaced the classifications without force");
    let params = ChimeraParams { force: true, ..params };
    let report = chimeras::run(&mut database, &params);
    assert!(report.is_ok(), "Chimera filtering with force failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap().written, 3, "Chimeric centroids were not classified again");
}

#[cfg(unix)]
#[test]
fn chimera_reclassification() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = chimera_database(&dir);
    let uchime = fs::read_to_string(utils::get_test_data("results.uchime")).unwrap();
    let params = ChimeraParams {
        workspace: dir.path().join("chimeras"),
        usearch: fake_tool(&dir, "usearch", "-uchimeout", &uchime),
        abskew: None,
        force: false,
    };
    let report = chimeras::run(&mut database, &params);
    assert!(report.is_ok(), "Chimera filtering failed: {}", report.unwrap_err());

    // Centroid 3 is no longer chimeric; centroid 4 was flagged before the first run.
    let uchime = "0.0000\t1;size=120;\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\tN\n\
        0.0000\t2;size=80;\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\tN\n\
        0.0100\t3;size=9;\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\t*\tN\n";
    let params = ChimeraParams {
        usearch: fake_tool(&dir, "usearch-rerun", "-uchimeout", uchime),
        force: true,
        ..params
    };
    let report = chimeras::run(&mut database, &params);
    assert!(report.is_ok(), "Chimera filtering with force failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap(), StageReport { written: 3, hits: 3, flagged: 0 });

    assert_eq!(database.chimeras().unwrap(), vec![
        (1, Verdict::NotChimeric),
        (2, Verdict::NotChimeric),
        (3, Verdict::NotChimeric),
    ]);
    assert_eq!(
        database.filter_counts(Table::Clusters).unwrap(),
        vec![(FilterCode::Unfiltered, 3), (FilterCode::Chimera, 1)]
    );
}

#[test]
fn no_centroids() {
    let dir = tempfile::tempdir().unwrap();
    let mut database = create_database(&dir, chimeras::SCRIPT);
    let params = ChimeraParams {
        workspace: dir.path().join("chimeras"),
        usearch: dir.path().join("no-such-usearch"),
        ..ChimeraParams::default()
    };
    let report = chimeras::run(&mut database, &params);
    assert!(report.is_ok(), "Chimera filtering failed: {}", report.unwrap_err());
    assert_eq!(report.unwrap(), StageReport::default());
    assert!(database.table_exists("chimeras").unwrap());
}

//-----------------------------------------------------------------------------
