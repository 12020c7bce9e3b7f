use std::path::PathBuf;
use std::{env, process};

use seqfilter::db::Table;
use seqfilter::PipelineDb;

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    // Parse arguments.
    let config = Config::new();

    let database = PipelineDb::open(&config.db_file, "filter_stats").map_err(|x| x.to_string())?;
    let size = database.file_size().unwrap_or(String::from("unknown"));
    println!("Database {} ({})", config.db_file.display(), size);
    for table in [Table::Merged, Table::Clusters] {
        let counts = database.filter_counts(table).map_err(|x| x.to_string())?;
        let total: usize = counts.iter().map(|(_, count)| count).sum();
        println!("Table {}: {} records", table.name(), total);
        for (code, count) in counts {
            println!("  {}\t{}", code, count);
        }
    }

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: PathBuf,
}

impl Config {
    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] pipeline.db", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let db_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        Config { db_file }
    }
}

//-----------------------------------------------------------------------------
