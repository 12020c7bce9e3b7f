//! The pipeline database: sequence records, cluster records, and the metadata log.
//!
//! Each stage of the pipeline marks the records it removes by setting the `filtered` column.
//! See [`FilterCode`] for the values used by the stages in this crate.

use crate::formats::Verdict;
use crate::{utils, Error, Result};

use std::fmt::Display;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension};


//-----------------------------------------------------------------------------

/// Value of the `filtered` column in tables `merged` and `clusters`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterCode {
    /// The record is still in the pipeline.
    Unfiltered,
    /// The sequence aligns to the host genome.
    Host,
    /// The cluster centroid is chimeric.
    Chimera,
    /// The sequence is from a negative control or matches one exactly.
    Contaminant,
    /// A value set by some other stage.
    Other(i64),
}

impl FilterCode {
    /// Returns the value stored in the database.
    pub fn code(&self) -> i64 {
        match self {
            FilterCode::Unfiltered => 0,
            FilterCode::Host => 2,
            FilterCode::Chimera => 4,
            FilterCode::Contaminant => 8,
            FilterCode::Other(code) => *code,
        }
    }

    /// Returns the code corresponding to the stored value.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => FilterCode::Unfiltered,
            2 => FilterCode::Host,
            4 => FilterCode::Chimera,
            8 => FilterCode::Contaminant,
            _ => FilterCode::Other(code),
        }
    }
}

impl Display for FilterCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterCode::Unfiltered => write!(f, "unfiltered (0)"),
            FilterCode::Host => write!(f, "host (2)"),
            FilterCode::Chimera => write!(f, "chimera (4)"),
            FilterCode::Contaminant => write!(f, "contaminant (8)"),
            FilterCode::Other(code) => write!(f, "other ({})", code),
        }
    }
}

/// Tables with a `filtered` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Table {
    /// Merged sequences.
    Merged,
    /// Cluster centroids.
    Clusters,
}

impl Table {
    /// Returns the name of the table.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Merged => "merged",
            Table::Clusters => "clusters",
        }
    }
}

/// Events recorded in the `metadata` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The stage started; the message contains the arguments.
    Start,
    /// A bulk query; the message contains the SQL.
    Query,
    /// An external command; the message contains the command line.
    Exec,
    /// The stage finished.
    End,
}

impl Event {
    /// Returns the name stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Query => "query",
            Event::Exec => "exec",
            Event::End => "end",
        }
    }
}

/// A row in table `merged`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedRecord {
    pub id: usize,
    pub sample_id: usize,
    pub sequence: String,
    pub filtered: FilterCode,
}

/// A row in table `clusters`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterRecord {
    pub id: usize,
    pub size: usize,
    pub sequence: String,
}

//-----------------------------------------------------------------------------

/// A read-write connection to a pipeline database.
///
/// Tables `samples`, `merged`, and `clusters` are populated by the upstream stages of the pipeline.
/// Every connection belongs to a script, and the events of the script are logged in table `metadata`.
/// Statements outside the bulk updates are committed immediately.
///
/// # Examples
///
/// ```
/// use seqfilter::{FilterCode, PipelineDb};
/// use seqfilter::db::Table;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("pipeline.db");
/// PipelineDb::create(&db_file).unwrap();
///
/// let mut db = PipelineDb::open(&db_file, "example").unwrap();
/// let sample = db.insert_sample("S1").unwrap();
/// let first = db.insert_merged(sample, "ACGTACGT").unwrap();
/// db.insert_merged(sample, "GGGGCCCC").unwrap();
/// assert_eq!(db.flag_merged(&[first], FilterCode::Host).unwrap(), 1);
///
/// let counts = db.filter_counts(Table::Merged).unwrap();
/// assert_eq!(counts, vec![(FilterCode::Unfiltered, 1), (FilterCode::Host, 1)]);
/// ```
#[derive(Debug)]
pub struct PipelineDb {
    connection: Connection,
    script: String,
}

/// Creating and opening the database.
impl PipelineDb {
    /// Tables that must exist before any stage can run.
    pub const REQUIRED_TABLES: [&'static str; 4] = ["samples", "merged", "clusters", "metadata"];

    /// Creates a new database with empty tables.
    ///
    /// Returns an error if the file already exists.
    /// Passes through any database errors.
    pub fn create<P: AsRef<Path>>(filename: P) -> Result<()> {
        let filename = filename.as_ref();
        if utils::file_exists(filename) {
            return Err(Error::Config(format!("Database {} already exists", filename.display())));
        }
        log::info!("Creating database {}", filename.display());

        let connection = Connection::open(filename)?;
        connection.execute_batch(
            "CREATE TABLE samples (
                sample_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            ) STRICT;
            CREATE TABLE merged (
                merged_id INTEGER PRIMARY KEY,
                sample_id INTEGER NOT NULL REFERENCES samples,
                defline TEXT,
                sequence TEXT NOT NULL,
                filtered INTEGER NOT NULL DEFAULT 0
            ) STRICT;
            CREATE TABLE clusters (
                cluster_id INTEGER PRIMARY KEY,
                sequence TEXT NOT NULL,
                size INTEGER NOT NULL,
                filtered INTEGER NOT NULL DEFAULT 0
            ) STRICT;
            CREATE TABLE metadata (
                meta_id INTEGER PRIMARY KEY,
                time TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                script TEXT NOT NULL,
                event TEXT NOT NULL,
                message TEXT NOT NULL
            ) STRICT;"
        )?;
        Ok(())
    }

    /// Opens a connection to an existing database for the given script.
    ///
    /// Returns an error if the file does not exist or a required table is missing.
    /// Passes through any database errors.
    pub fn open<P: AsRef<Path>>(filename: P, script: &str) -> Result<Self> {
        let filename = filename.as_ref();
        if !utils::file_exists(filename) {
            return Err(Error::Config(format!("Database {} does not exist", filename.display())));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(filename, flags)?;
        let database = PipelineDb { connection, script: script.to_string() };
        for table in Self::REQUIRED_TABLES {
            if !database.table_exists(table)? {
                return Err(Error::Schema(format!(
                    "Database {} does not contain table {}", filename.display(), table
                )));
            }
        }
        Ok(database)
    }

    /// Returns the filename of the database, if there is one.
    pub fn filename(&self) -> Option<&str> {
        self.connection.path()
    }

    /// Returns the size of the database file in a human-readable format.
    pub fn file_size(&self) -> Option<String> {
        let filename = self.filename()?;
        utils::file_size(filename)
    }

    /// Returns the name of the script events are logged for.
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Returns `true` if the table exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<String> = self.connection.query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            (table,),
            |row| row.get(0)
        ).optional()?;
        Ok(found.is_some())
    }

    /// Appends an event to the metadata log.
    pub fn record_metadata(&self, event: Event, message: &str) -> Result<()> {
        log::debug!("{} {}: {}", self.script, event.as_str(), message);
        self.connection.execute(
            "INSERT INTO metadata(script, event, message) VALUES (?1, ?2, ?3)",
            (&self.script, event.as_str(), message),
        )?;
        Ok(())
    }

    /// Returns the logged events for the script as `(event, message)` pairs in insertion order.
    pub fn metadata(&self) -> Result<Vec<(String, String)>> {
        let mut statement = self.connection.prepare(
            "SELECT event, message FROM metadata WHERE script = ?1 ORDER BY meta_id"
        )?;
        let rows = statement.query_map((&self.script,), |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------

/// Samples and sequence records.
impl PipelineDb {
    const SELECT_MERGED: &'static str = "SELECT merged_id, sample_id, sequence, filtered FROM merged ORDER BY merged_id";

    const SELECT_MERGED_WITH_STATUS: &'static str =
        "SELECT merged_id, sample_id, sequence, filtered FROM merged WHERE filtered = ?1 ORDER BY merged_id";

    const SELECT_CLUSTERS_WITH_STATUS: &'static str =
        "SELECT cluster_id, size, sequence FROM clusters WHERE filtered = ?1 ORDER BY size DESC, cluster_id";

    /// Inserts a sample and returns its id.
    pub fn insert_sample(&self, name: &str) -> Result<usize> {
        self.connection.execute("INSERT INTO samples(name) VALUES (?1)", (name,))?;
        Ok(self.connection.last_insert_rowid() as usize)
    }

    /// Inserts an unfiltered sequence record and returns its id.
    pub fn insert_merged(&self, sample_id: usize, sequence: &str) -> Result<usize> {
        self.connection.execute(
            "INSERT INTO merged(sample_id, sequence) VALUES (?1, ?2)",
            (sample_id, sequence),
        )?;
        Ok(self.connection.last_insert_rowid() as usize)
    }

    /// Inserts an unfiltered cluster record and returns its id.
    pub fn insert_cluster(&self, sequence: &str, size: usize) -> Result<usize> {
        self.connection.execute(
            "INSERT INTO clusters(sequence, size) VALUES (?1, ?2)",
            (sequence, size),
        )?;
        Ok(self.connection.last_insert_rowid() as usize)
    }

    /// Returns the id of the sample with the given name, or [`None`] if there is no such sample.
    pub fn sample_id(&self, name: &str) -> Result<Option<usize>> {
        let id = self.connection.query_row(
            "SELECT sample_id FROM samples WHERE name = ?1",
            (name,),
            |row| row.get(0)
        ).optional()?;
        Ok(id)
    }

    /// Sets the status of all sequence records in the given samples.
    ///
    /// Returns the number of updated records.
    pub fn flag_samples(&mut self, sample_ids: &[usize], code: FilterCode) -> Result<usize> {
        let mut updated = 0;
        let transaction = self.connection.transaction()?;
        {
            let mut update = transaction.prepare(
                "UPDATE merged SET filtered = ?1 WHERE sample_id = ?2"
            )?;
            for sample_id in sample_ids {
                updated += update.execute((code.code(), sample_id))?;
            }
        }
        transaction.commit()?;
        Ok(updated)
    }

    /// Calls the closure for each sequence record in increasing order by id.
    ///
    /// If `status` is given, only the records with that status are included.
    /// The query is logged in the metadata table.
    pub fn for_each_merged<F>(&self, status: Option<FilterCode>, mut f: F) -> Result<()>
    where
        F: FnMut(MergedRecord) -> Result<()>,
    {
        let sql = if status.is_some() { Self::SELECT_MERGED_WITH_STATUS } else { Self::SELECT_MERGED };
        self.record_metadata(Event::Query, sql)?;
        let mut statement = self.connection.prepare(sql)?;
        let mut rows = match status {
            Some(code) => statement.query((code.code(),))?,
            None => statement.query(())?,
        };
        while let Some(row) = rows.next()? {
            let record = MergedRecord {
                id: row.get(0)?,
                sample_id: row.get(1)?,
                sequence: row.get(2)?,
                filtered: FilterCode::from_code(row.get(3)?),
            };
            f(record)?;
        }
        Ok(())
    }

    /// Calls the closure for each cluster record with the given status, in decreasing order by size.
    ///
    /// Ties are broken by id.
    /// The query is logged in the metadata table.
    pub fn for_each_cluster<F>(&self, status: FilterCode, mut f: F) -> Result<()>
    where
        F: FnMut(ClusterRecord) -> Result<()>,
    {
        self.record_metadata(Event::Query, Self::SELECT_CLUSTERS_WITH_STATUS)?;
        let mut statement = self.connection.prepare(Self::SELECT_CLUSTERS_WITH_STATUS)?;
        let mut rows = statement.query((status.code(),))?;
        while let Some(row) = rows.next()? {
            let record = ClusterRecord {
                id: row.get(0)?,
                size: row.get(1)?,
                sequence: row.get(2)?,
            };
            f(record)?;
        }
        Ok(())
    }

    // Sets the status of each listed row in a single transaction.
    fn flag_rows(&mut self, table: Table, ids: &[usize], code: FilterCode) -> Result<usize> {
        let key = match table {
            Table::Merged => "merged_id",
            Table::Clusters => "cluster_id",
        };
        let mut updated = 0;
        let transaction = self.connection.transaction()?;
        {
            let mut update = transaction.prepare(
                &format!("UPDATE {} SET filtered = ?1 WHERE {} = ?2", table.name(), key)
            )?;
            for id in ids {
                updated += update.execute((code.code(), id))?;
            }
        }
        transaction.commit()?;
        Ok(updated)
    }

    /// Sets the status of the listed sequence records.
    ///
    /// Returns the number of updated records.
    /// Ids without a record are ignored.
    pub fn flag_merged(&mut self, ids: &[usize], code: FilterCode) -> Result<usize> {
        self.flag_rows(Table::Merged, ids, code)
    }

    /// Sets the status of the listed cluster records.
    ///
    /// Returns the number of updated records.
    /// Ids without a record are ignored.
    pub fn flag_clusters(&mut self, ids: &[usize], code: FilterCode) -> Result<usize> {
        self.flag_rows(Table::Clusters, ids, code)
    }

    /// Returns the number of records with each status in the table, in increasing order by status.
    pub fn filter_counts(&self, table: Table) -> Result<Vec<(FilterCode, usize)>> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT filtered, COUNT(*) FROM {} GROUP BY filtered ORDER BY filtered",
            table.name()
        ))?;
        let rows = statement.query_map((), |row| {
            let code: i64 = row.get(0)?;
            let count: usize = row.get(1)?;
            Ok((FilterCode::from_code(code), count))
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------

/// Chimera classifications.
impl PipelineDb {
    /// Creates table `chimeras`.
    ///
    /// If the table already exists, it is replaced when `force` is set.
    /// Otherwise returns an error.
    /// When the table is replaced, centroids it classified as chimeric are reset to unfiltered,
    /// unless another stage has changed their status since.
    pub fn init_chimeras_table(&mut self, force: bool) -> Result<()> {
        if self.table_exists("chimeras")? {
            if !force {
                return Err(Error::Schema(String::from(
                    "Table chimeras already exists; use --force to replace it"
                )));
            }
            log::warn!("Replacing table chimeras");
            let transaction = self.connection.transaction()?;
            let reset = transaction.execute(
                "UPDATE clusters SET filtered = ?1
                WHERE filtered = ?2 AND cluster_id IN (SELECT cluster_id FROM chimeras WHERE chimeric = ?3)",
                (FilterCode::Unfiltered.code(), FilterCode::Chimera.code(), Verdict::Chimeric.as_str()),
            )?;
            transaction.execute("DROP TABLE chimeras", ())?;
            transaction.commit()?;
            log::info!("Reset {} previously chimeric centroids", reset);
        }
        self.connection.execute(
            "CREATE TABLE chimeras (
                chimera_id INTEGER PRIMARY KEY,
                cluster_id INTEGER NOT NULL REFERENCES clusters,
                chimeric TEXT NOT NULL
            ) STRICT",
            (),
        )?;
        Ok(())
    }

    /// Inserts the classification of each cluster centroid in a single transaction.
    ///
    /// Returns the number of inserted rows.
    pub fn insert_chimeras(&mut self, records: &[(usize, Verdict)]) -> Result<usize> {
        let mut inserted = 0;
        let transaction = self.connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO chimeras(cluster_id, chimeric) VALUES (?1, ?2)"
            )?;
            for (cluster_id, verdict) in records {
                inserted += insert.execute((cluster_id, verdict.as_str()))?;
            }
        }
        transaction.commit()?;
        Ok(inserted)
    }

    /// Returns the stored classifications in increasing order by cluster id.
    pub fn chimeras(&self) -> Result<Vec<(usize, Verdict)>> {
        let mut statement = self.connection.prepare(
            "SELECT cluster_id, chimeric FROM chimeras ORDER BY cluster_id"
        )?;
        let mut rows = statement.query(())?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let cluster_id: usize = row.get(0)?;
            let chimeric: String = row.get(1)?;
            let verdict = chimeric.parse::<Verdict>().map_err(Error::Schema)?;
            result.push((cluster_id, verdict));
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------
