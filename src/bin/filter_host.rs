use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use seqfilter::db::Event;
use seqfilter::filter::host::{self, HostParams};
use seqfilter::PipelineDb;

use env_logger::Env;
use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();

    // Run the stage.
    let mut database = PipelineDb::open(&config.db_file, host::SCRIPT).map_err(|x| x.to_string())?;
    database.record_metadata(Event::Start, &config.args).map_err(|x| x.to_string())?;
    let report = host::run(&mut database, &config.params).map_err(|x| x.to_string())?;
    database.record_metadata(Event::End, "").map_err(|x| x.to_string())?;
    log::info!("Host filtering: {}", report);

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    log::info!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: PathBuf,
    pub args: String,
    pub params: HostParams,
}

impl Config {
    pub fn new() -> Config {
        let mut params = HostParams::default();

        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] pipeline.db", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        let reference_desc = format!(
            "bowtie2 index of the host genome (default: ${}/{})", host::RESOURCES_VAR, host::DEFAULT_REFERENCE
        );
        opts.optopt("r", "reference", &reference_desc, "PREFIX");
        let workspace_desc = format!("working directory (default: {})", host::DEFAULT_WORKSPACE);
        opts.optopt("w", "workspace", &workspace_desc, "DIR");
        opts.optopt("", "bowtie2", "bowtie2 binary (default: bowtie2)", "FILE");
        let threads_desc = format!("number of alignment threads (default: {})", params.threads);
        opts.optopt("t", "threads", &threads_desc, "INT");
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
        if let Some(s) = matches.opt_str("r") {
            params.reference = Some(PathBuf::from(s));
        }
        if params.reference.is_none() {
            eprintln!("The host reference is required when {} is not set", host::RESOURCES_VAR);
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        }
        if let Some(s) = matches.opt_str("w") {
            params.workspace = PathBuf::from(s);
        }
        if let Some(s) = matches.opt_str("bowtie2") {
            params.bowtie2 = PathBuf::from(s);
        }
        if let Some(s) = matches.opt_str("t") {
            match s.parse::<usize>() {
                Ok(threads) if threads > 0 => params.threads = threads,
                _ => {
                    eprintln!("Invalid number of threads: {}", s);
                    eprint!("{}", opts.usage(&header));
                    process::exit(1);
                }
            }
        }

        let db_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        Config {
            db_file,
            args: args[1..].join(" "),
            params,
        }
    }
}

//-----------------------------------------------------------------------------
