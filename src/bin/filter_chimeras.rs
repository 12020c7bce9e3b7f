use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use seqfilter::db::Event;
use seqfilter::filter::chimeras::{self, ChimeraParams};
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
    let mut database = PipelineDb::open(&config.db_file, chimeras::SCRIPT).map_err(|x| x.to_string())?;
    database.record_metadata(Event::Start, &config.args).map_err(|x| x.to_string())?;
    let report = chimeras::run(&mut database, &config.params).map_err(|x| x.to_string())?;
    database.record_metadata(Event::End, "").map_err(|x| x.to_string())?;
    log::info!("Chimera filtering: {}", report);

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    log::info!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: PathBuf,
    pub args: String,
    pub params: ChimeraParams,
}

impl Config {
    pub fn new() -> Config {
        let mut params = ChimeraParams::default();

        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] pipeline.db", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        let workspace_desc = format!("working directory (default: {})", chimeras::DEFAULT_WORKSPACE);
        opts.optopt("w", "workspace", &workspace_desc, "DIR");
        opts.optopt("", "usearch", "usearch binary (default: usearch)", "FILE");
        opts.optopt("", "abskew", "minimum abundance skew between a parent and a chimera", "FLOAT");
        opts.optflag("", "force", "replace existing chimera classifications");
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
        if let Some(s) = matches.opt_str("w") {
            params.workspace = PathBuf::from(s);
        }
        if let Some(s) = matches.opt_str("usearch") {
            params.usearch = PathBuf::from(s);
        }
        if let Some(s) = matches.opt_str("abskew") {
            match s.parse::<f64>() {
                Ok(abskew) if abskew > 0.0 => params.abskew = Some(abskew),
                _ => {
                    eprintln!("Invalid abundance skew: {}", s);
                    eprint!("{}", opts.usage(&header));
                    process::exit(1);
                }
            }
        }
        params.force = matches.opt_present("force");

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
