use super::*;

use crate::utils;

//-----------------------------------------------------------------------------

fn open_test_file(filename: &'static str) -> Box<dyn BufRead> {
    let reader = utils::open_file(utils::get_test_data(filename));
    assert!(reader.is_ok(), "Failed to open test file {}: {}", filename, reader.err().unwrap());
    reader.unwrap()
}

//-----------------------------------------------------------------------------

#[test]
fn uc_record_types() {
    let hit = UcRecord::parse("H\t2\t12\t100.0\t+\t0\t0\t12M\t3\t1").unwrap();
    assert!(hit.is_hit());
    assert_eq!(hit.cluster, Some(2));
    assert_eq!(hit.identity, Some(100.0));
    assert_eq!(hit.strand, Some('+'));

    let no_hit = UcRecord::parse("N\t*\t12\t*\t*\t*\t*\t*\t4\t*").unwrap();
    assert_eq!(no_hit.record_type, UcType::NoHit);
    assert!(!no_hit.is_hit());
    assert_eq!(no_hit.cluster, None);
    assert_eq!(no_hit.identity, None);
    assert_eq!(no_hit.strand, None);
    assert_eq!(no_hit.target, None);

    let centroid = UcRecord::parse("S\t0\t250\t*\t*\t*\t*\t*\t8\t*").unwrap();
    assert_eq!(centroid.record_type, UcType::Centroid);
}

#[test]
fn invalid_uc_lines() {
    assert!(UcRecord::parse("H\t0\t12\t100.0\t+").is_err(), "Accepted a truncated line");
    assert!(UcRecord::parse("X\t0\t12\t100.0\t+\t0\t0\t12M\t3\t1").is_err(), "Accepted an unknown record type");
    assert!(UcRecord::parse("H\tzero\t12\t100.0\t+\t0\t0\t12M\t3\t1").is_err(), "Accepted an invalid cluster number");
}

#[test]
fn uc_hits_from_file() {
    let hits = read_uc_hits(open_test_file("results.uc"), "results.uc");
    assert!(hits.is_ok(), "Failed to read UC hits: {}", hits.unwrap_err());
    assert_eq!(hits.unwrap(), vec![3, 5], "Wrong hits; expected each query once");
}

#[test]
fn uc_error_location() {
    let input = "H\t0\t12\t100.0\t+\t0\t0\t12M\t3\t1\n\nH\t0\t12\t100.0\t+\t0\t0\t12M\tread_7\t1\n";
    let result = read_uc_hits(input.as_bytes(), "bad.uc");
    match result {
        Err(Error::Parse { file, line, .. }) => {
            assert_eq!(file, "bad.uc");
            assert_eq!(line, 3, "Wrong line number for the invalid label");
        },
        other => panic!("Expected a parse error, got {:?}", other),
    }
}

//-----------------------------------------------------------------------------

#[test]
fn sam_flags() {
    let unmapped = SamRecord::parse("4\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII").unwrap();
    assert!(!unmapped.is_mapped());
    assert_eq!(unmapped.reference, None);

    let forward = SamRecord::parse("3\t0\tchr1\t100\t42\t4M\t*\t0\t0\tACGT\tIIII\tAS:i:0").unwrap();
    assert!(forward.is_mapped());
    assert!(!forward.is_reverse());
    assert_eq!(forward.reference.as_deref(), Some("chr1"));
}

#[test]
fn sam_mapped_from_file() {
    let mapped = read_sam_mapped(open_test_file("output.sam"), "output.sam");
    assert!(mapped.is_ok(), "Failed to read SAM records: {}", mapped.unwrap_err());
    assert_eq!(mapped.unwrap(), vec![3, 6], "Wrong mapped reads");
}

#[test]
fn sam_header_lines() {
    let input = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n9\t0\tchr1\t1\t30\t4M\t*\t0\t0\tACGT\tIIII\n";
    let mapped = read_sam_mapped(input.as_bytes(), "with-header.sam").unwrap();
    assert_eq!(mapped, vec![9]);
}

#[test]
fn truncated_sam_line() {
    let input = "9\t0\tchr1\t1\t30\n";
    let result = read_sam_mapped(input.as_bytes(), "short.sam");
    assert!(matches!(result, Err(Error::Parse { line: 1, .. })), "Accepted a truncated SAM line");
}

//-----------------------------------------------------------------------------

#[test]
fn verdicts() {
    for verdict in [Verdict::Chimeric, Verdict::NotChimeric, Verdict::Borderline] {
        let parsed: Verdict = verdict.as_str().parse().unwrap();
        assert_eq!(parsed, verdict);
        assert_eq!(verdict.to_string(), verdict.as_str());
    }
    assert!("y".parse::<Verdict>().is_err());
}

#[test]
fn uchime_from_file() {
    let records = read_uchime(open_test_file("results.uchime"), "results.uchime");
    assert!(records.is_ok(), "Failed to read UCHIME records: {}", records.unwrap_err());
    let records = records.unwrap();
    let summary: Vec<(usize, Verdict)> = records.iter().map(|r| (r.id, r.verdict)).collect();
    assert_eq!(summary, vec![
        (1, Verdict::NotChimeric),
        (3, Verdict::Chimeric),
        (2, Verdict::Borderline),
    ]);
    assert!((records[1].score - 2.1034).abs() < 1e-9, "Wrong score for the chimera");
}

#[test]
fn invalid_uchime_lines() {
    assert!(UchimeRecord::parse("0.5\t1;size=3;").is_err(), "Accepted a line without a verdict");
    assert!(UchimeRecord::parse("high\t1;size=3;\tY").is_err(), "Accepted an invalid score");
    assert!(UchimeRecord::parse("0.5\t1;size=3;\tmaybe").is_err(), "Accepted an invalid verdict");
    assert!(UchimeRecord::parse("0.5\tcentroid\tY").is_err(), "Accepted a label without an id");
}

//-----------------------------------------------------------------------------
