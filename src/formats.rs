//! Parsers for the tabular output of the external tools.
//!
//! ### UC (reading)
//!
//! The usearch cluster format is a tab-separated format with 10 fields per line.
//! See [the usearch manual](https://drive5.com/usearch/manual/opt_uc.html) for details.
//! The first field is the record type, the ninth field is the query label, and the tenth field is the target label.
//! Exact search reports a hit as an `H` record and a query without hits as an `N` record.
//!
//! * [`UcRecord`]: A single parsed line.
//! * [`read_uc_hits`]: Database ids of all queries with a hit.
//!
//! ### SAM (reading)
//!
//! Only the mandatory fields QNAME and FLAG are interpreted.
//! See [the SAM specification](https://samtools.github.io/hts-specs/SAMv1.pdf) for details.
//!
//! * [`SamRecord`]: The interpreted fields of a single alignment line.
//! * [`read_sam_mapped`]: Database ids of all reads with a mapped alignment.
//!
//! ### UCHIME (reading)
//!
//! The `-uchimeout` format of de novo chimera detection is tab-separated.
//! The first field is the score, the second field is the query label, and the last field is the verdict.
//! The number of fields in between depends on the usearch version, so they are not interpreted.
//!
//! * [`UchimeRecord`]: A single parsed line.
//! * [`read_uchime`]: All records in a file.
//!
//! In all formats, query labels are expected to be written by [`crate::fasta`].

use crate::fasta;
use crate::{Error, Result};

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::BufRead;
use std::str::FromStr;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

// Reads the non-empty lines from the reader and passes them to the closure with 1-based line numbers.
fn for_each_line<R, F>(reader: R, source: &str, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<()>,
{
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|x| Error::io(source, x))?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        f(index + 1, line)?;
    }
    Ok(())
}

//-----------------------------------------------------------------------------

/// Record types in the UC format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UcType {
    /// A hit (`H`).
    Hit,
    /// A query without hits (`N`).
    NoHit,
    /// A cluster centroid (`S`).
    Centroid,
    /// A cluster summary (`C`).
    Cluster,
}

impl FromStr for UcType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "H" => Ok(UcType::Hit),
            "N" => Ok(UcType::NoHit),
            "S" => Ok(UcType::Centroid),
            "C" => Ok(UcType::Cluster),
            _ => Err(format!("Invalid UC record type: {}", s)),
        }
    }
}

/// A line in the UC format.
///
/// # Examples
///
/// ```
/// use seqfilter::formats::{UcRecord, UcType};
///
/// let line = "H\t0\t253\t100.0\t+\t0\t0\t253M\t17\t4";
/// let record = UcRecord::parse(line).unwrap();
/// assert_eq!(record.record_type, UcType::Hit);
/// assert_eq!(record.query, "17");
/// assert_eq!(record.target.as_deref(), Some("4"));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct UcRecord {
    /// Record type.
    pub record_type: UcType,
    /// Cluster number, if reported.
    pub cluster: Option<usize>,
    /// Identity with the target as a percentage, if reported.
    pub identity: Option<f64>,
    /// Strand of the hit, if reported.
    pub strand: Option<char>,
    /// Query label.
    pub query: String,
    /// Target label, if reported.
    pub target: Option<String>,
}

impl UcRecord {
    /// Number of fields in a UC line.
    pub const FIELDS: usize = 10;

    // Fields that do not apply to the record type are written as `*`.
    fn optional(field: &str) -> Option<&str> {
        if field == "*" { None } else { Some(field) }
    }

    /// Parses a UC line without the trailing newline.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < Self::FIELDS {
            return Err(format!("Expected {} fields, found {}", Self::FIELDS, fields.len()));
        }
        let record_type: UcType = fields[0].parse()?;
        let cluster = match Self::optional(fields[1]) {
            Some(value) => Some(value.parse::<usize>().map_err(|x| {
                format!("Invalid cluster number {}: {}", value, x)
            })?),
            None => None,
        };
        let identity = match Self::optional(fields[3]) {
            Some(value) => Some(value.parse::<f64>().map_err(|x| {
                format!("Invalid identity {}: {}", value, x)
            })?),
            None => None,
        };
        let strand = Self::optional(fields[4]).and_then(|s| s.chars().next());
        let query = fields[8].to_string();
        let target = Self::optional(fields[9]).map(String::from);

        Ok(UcRecord { record_type, cluster, identity, strand, query, target })
    }

    /// Returns `true` if the record reports a hit.
    pub fn is_hit(&self) -> bool {
        self.record_type == UcType::Hit
    }
}

/// Returns the distinct database ids of the queries with a hit, in increasing order.
///
/// `source` is the name of the input, used in error messages.
pub fn read_uc_hits<R: BufRead>(reader: R, source: &str) -> Result<Vec<usize>> {
    let mut result = BTreeSet::new();
    for_each_line(reader, source, |line_num, line| {
        let record = UcRecord::parse(line).map_err(|x| Error::parse(source, line_num, x))?;
        if record.is_hit() {
            let id = fasta::parse_label(&record.query).map_err(|x| Error::parse(source, line_num, x))?;
            result.insert(id);
        }
        Ok(())
    })?;
    Ok(result.into_iter().collect())
}

//-----------------------------------------------------------------------------

/// The interpreted fields of a SAM alignment line.
///
/// # Examples
///
/// ```
/// use seqfilter::formats::SamRecord;
///
/// let line = "5\t16\tchr3\t1204\t42\t8M\t*\t0\t0\tACGTACGT\tIIIIIIII";
/// let record = SamRecord::parse(line).unwrap();
/// assert_eq!(record.name, "5");
/// assert!(record.is_mapped());
/// assert!(record.is_reverse());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamRecord {
    /// Query name.
    pub name: String,
    /// Bitwise flags.
    pub flag: u16,
    /// Reference sequence name, if mapped.
    pub reference: Option<String>,
}

impl SamRecord {
    /// Number of mandatory fields in a SAM line.
    pub const FIELDS: usize = 11;

    /// Flag: the segment is unmapped.
    pub const FLAG_UNMAPPED: u16 = 0x4;

    /// Flag: the sequence is reverse complemented.
    pub const FLAG_REVERSE: u16 = 0x10;

    /// Returns `true` if the line is a SAM header line.
    pub fn is_header_line(line: &str) -> bool {
        line.starts_with('@')
    }

    /// Parses a SAM alignment line without the trailing newline.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.splitn(Self::FIELDS + 1, '\t').collect();
        if fields.len() < Self::FIELDS {
            return Err(format!("Expected at least {} fields, found {}", Self::FIELDS, fields.len()));
        }
        let name = fields[0].to_string();
        let flag = fields[1].parse::<u16>().map_err(|x| {
            format!("Invalid flag {}: {}", fields[1], x)
        })?;
        let reference = if fields[2] == "*" { None } else { Some(fields[2].to_string()) };
        Ok(SamRecord { name, flag, reference })
    }

    /// Returns `true` if the segment is mapped.
    pub fn is_mapped(&self) -> bool {
        self.flag & Self::FLAG_UNMAPPED == 0
    }

    /// Returns `true` if the segment is aligned in reverse orientation.
    pub fn is_reverse(&self) -> bool {
        self.flag & Self::FLAG_REVERSE != 0
    }
}

/// Returns the distinct database ids of the reads with a mapped alignment, in increasing order.
///
/// Header lines and unmapped records are skipped.
/// `source` is the name of the input, used in error messages.
pub fn read_sam_mapped<R: BufRead>(reader: R, source: &str) -> Result<Vec<usize>> {
    let mut result = BTreeSet::new();
    for_each_line(reader, source, |line_num, line| {
        if SamRecord::is_header_line(line) {
            return Ok(());
        }
        let record = SamRecord::parse(line).map_err(|x| Error::parse(source, line_num, x))?;
        if record.is_mapped() {
            let id = fasta::parse_label(&record.name).map_err(|x| Error::parse(source, line_num, x))?;
            result.insert(id);
        }
        Ok(())
    })?;
    Ok(result.into_iter().collect())
}

//-----------------------------------------------------------------------------

/// Chimera classification reported by usearch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    /// The sequence is chimeric (`Y`).
    Chimeric,
    /// The sequence is not chimeric (`N`).
    NotChimeric,
    /// Borderline case (`?`).
    Borderline,
}

impl Verdict {
    /// Returns the single-character code used by usearch and stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Chimeric => "Y",
            Verdict::NotChimeric => "N",
            Verdict::Borderline => "?",
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Y" => Ok(Verdict::Chimeric),
            "N" => Ok(Verdict::NotChimeric),
            "?" => Ok(Verdict::Borderline),
            _ => Err(format!("Invalid chimera verdict: {}", s)),
        }
    }
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line in the UCHIME tabular format.
#[derive(Clone, Debug, PartialEq)]
pub struct UchimeRecord {
    /// Database id of the query.
    pub id: usize,
    /// Chimera score.
    pub score: f64,
    /// Classification.
    pub verdict: Verdict,
}

impl UchimeRecord {
    /// Parses a UCHIME line without the trailing newline.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return Err(format!("Expected at least 3 fields, found {}", fields.len()));
        }
        let score = fields[0].parse::<f64>().map_err(|x| {
            format!("Invalid score {}: {}", fields[0], x)
        })?;
        let id = fasta::parse_label(fields[1])?;
        let verdict: Verdict = fields[fields.len() - 1].trim().parse()?;
        Ok(UchimeRecord { id, score, verdict })
    }
}

/// Returns all records in the UCHIME file in the original order.
///
/// `source` is the name of the input, used in error messages.
pub fn read_uchime<R: BufRead>(reader: R, source: &str) -> Result<Vec<UchimeRecord>> {
    let mut result = Vec::new();
    for_each_line(reader, source, |line_num, line| {
        let record = UchimeRecord::parse(line).map_err(|x| Error::parse(source, line_num, x))?;
        result.push(record);
        Ok(())
    })?;
    Ok(result)
}

//-----------------------------------------------------------------------------
