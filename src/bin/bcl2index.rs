//! bcl2index counts the barcodes of a sequencing run straight from the base
//! calls, without demultiplexing, so that sample sheets can be checked before
//! the run is converted.

use std::{
    env,
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process,
};

use clap::{value_t, App, Arg, ArgGroup, ArgMatches};
use env_logger::Env;
use log::{error, info, warn};
use rayon::ThreadPoolBuilder;

use common::config::PipelineConfig;
use common::error::{Error, Result};
use common::mask::{mask_from_run_info, DEFAULT_MASK};
use common::platform::Sequencer;
use common::report::{ReportFormat, RunReport, DEFAULT_THRESHOLD};
use common::run::count_run;
use common::run_info_parser::parse_run_info;

const SEQUENCERS: [(&str, Sequencer, &str); 5] = [
    ("miniseq", Sequencer::MiniSeq, "This is a MiniSeq flowcell"),
    ("nextseq", Sequencer::NextSeq, "This is a NextSeq 500 flowcell"),
    ("hiseq", Sequencer::HiSeq, "This is a HiSeq 2500 flowcell"),
    ("hiseq4k", Sequencer::HiSeq4000, "This is a HiSeq 4000 flowcell"),
    ("novaseq", Sequencer::NovaSeq, "This is a NovaSeq flowcell"),
];

fn app() -> App<'static, 'static> {
    let mut app = App::new("bcl2index").version(clap::crate_version!());
    for &(flag, _, help) in SEQUENCERS.iter() {
        app = app.arg(Arg::with_name(flag).long(flag).help(help));
    }

    app.group(
        ArgGroup::with_name("sequencer")
            .args(&SEQUENCERS.iter().map(|(flag, _, _)| *flag).collect::<Vec<_>>())
            .required(true),
    )
    .arg(
        Arg::with_name("base")
            .long("base")
            .help("The base directory of the flowcell [default: current directory]")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("mask")
            .long("mask")
            .help("The bases mask to use for the flowcell [default: from RunInfo.xml, else y36,i8,i8,y36]")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("threshold")
            .long("threshold")
            .help("Don't report barcodes seen fewer times than this [default: 1000000]")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("format")
            .long("format")
            .help("report format")
            .possible_values(&["json", "tsv"])
            .default_value("json")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("output")
            .long("output")
            .help("write the report here instead of stdout")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("isready")
            .long("isready")
            .help("Only check if the files are ready to be processed"),
    )
    .arg(
        Arg::with_name("threads")
            .long("threads")
            .help("number of threads used to assemble the report")
            .default_value("4")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("chunk-size")
            .long("chunk-size")
            .help("clusters per chunk passed between pipeline stages")
            .default_value("40000")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("queue-depth")
            .long("queue-depth")
            .help("chunks buffered between two pipeline stages")
            .default_value("100")
            .takes_value(true),
    )
}

/// Mask from RunInfo.xml if there is one, else the default
fn default_mask(base_dir: &Path) -> String {
    let run_info_path = base_dir.join("RunInfo.xml");
    if run_info_path.exists() {
        match parse_run_info(&run_info_path) {
            Ok(run_info) => {
                let mask = mask_from_run_info(&run_info);
                info!("using mask {} from {}", mask, run_info_path.display());
                return mask;
            }
            Err(e) => warn!("{}; using mask {}", e, DEFAULT_MASK),
        }
    }
    DEFAULT_MASK.to_string()
}

/// Returns the exit code
fn run(matches: &ArgMatches) -> Result<i32> {
    let sequencer = SEQUENCERS
        .iter()
        .find(|(flag, _, _)| matches.is_present(flag))
        .map(|&(_, sequencer, _)| sequencer)
        .ok_or_else(|| Error::InvalidParameter {
            parameter: "sequencer".to_string(),
            reason: "one sequencer flag is required".to_string(),
        })?;

    let base_dir = match matches.value_of("base") {
        Some(base) => PathBuf::from(base),
        None => env::current_dir()?,
    };
    let mask = match matches.value_of("mask") {
        Some(mask) => mask.to_string(),
        None => default_mask(&base_dir),
    };

    let threshold = if matches.is_present("threshold") {
        value_t!(matches, "threshold", u64).unwrap_or_else(|e| e.exit())
    } else {
        DEFAULT_THRESHOLD
    };
    let threads = value_t!(matches, "threads", usize).unwrap_or_else(|e| e.exit());
    let chunk_size = value_t!(matches, "chunk-size", usize).unwrap_or_else(|e| e.exit());
    let queue_depth = value_t!(matches, "queue-depth", usize).unwrap_or_else(|e| e.exit());
    let format: ReportFormat = matches.value_of("format").unwrap_or("json").parse()?;

    let config = PipelineConfig::default()
        .with_chunk_size(chunk_size)
        .with_queue_depth(queue_depth);
    config.validate()?;

    let finder = sequencer.finder(&base_dir, &mask);
    if !finder.is_ready()? {
        println!("Not yet ready to process!");
        return Ok(1);
    }
    if matches.is_present("isready") {
        println!("Ready to process");
        return Ok(0);
    }

    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| Error::InvalidParameter {
            parameter: "threads".to_string(),
            reason: e.to_string(),
        })?;

    info!("{} run in {} with mask {}", finder.name(), base_dir.display(), mask);
    let lanes = finder.lane_files()?;
    let mut report = RunReport::new(finder.name(), &base_dir, &mask, count_run(&lanes, &config)?);
    report.apply_threshold(threshold);

    match matches.value_of("output") {
        Some(output) => {
            let output = PathBuf::from(output);
            info!("writing to {}", output.display());
            let f = File::create(&output).map_err(|source| Error::Open {
                path: output.clone(),
                source,
            })?;
            let mut wtr = BufWriter::new(f);
            report.write(format, &mut wtr)?;
            wtr.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut wtr = stdout.lock();
            report.write(format, &mut wtr)?;
            wtr.flush()?;
        }
    }

    Ok(0)
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = app().get_matches();
    match run(&matches) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
