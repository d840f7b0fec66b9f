use anyhow::{bail, Result};
use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use phish_scorer::config::resolve_data_path;
use phish_scorer::normalization::Dictionary;
use phish_scorer::trainer::{self, dictionary, CorpusFormat};
use phish_scorer::Config;
use std::path::{Path, PathBuf};
use std::process;

const DEFAULT_DATASET: &str = "data/Nazario.csv";

#[tokio::main]
async fn main() {
    let matches = Command::new("phish-trainer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build the linguistic statistics table from a labeled email corpus")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Labeled dataset (.csv or .json/.jsonl); defaults to data/Nazario.csv")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Where to write the statistics table")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (built-in defaults when omitted)"),
        )
        .arg(
            Arg::new("no-dictionary")
                .long("no-dictionary")
                .help("Keep tokens that are not in the reference dictionary")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&matches).await {
        eprintln!("❌ Error: {e:#}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = Config::load_or_default(matches.get_one::<String>("config").map(Path::new))?;
    let dataset = dataset_path(matches.get_one::<String>("file"))?;
    let output = match matches.get_one::<String>("output") {
        Some(path) => PathBuf::from(path),
        None => resolve_data_path(&config.paths.stats_file),
    };

    let dictionary = if matches.get_flag("no-dictionary") {
        log::info!("Dictionary filtering disabled");
        Dictionary::empty()
    } else {
        dictionary::ensure_dictionary(
            &resolve_data_path(&config.paths.dictionary_file),
            &config.paths.dictionary_url,
        )
        .await
    };

    let format = CorpusFormat::from_path(&dataset);
    let (report, summary) = trainer::train(&dataset, format, &config.tables, dictionary)?;
    report.save(&output)?;
    log::info!("Statistics written to {}", output.display());

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn dataset_path(file: Option<&String>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(PathBuf::from(file));
    }
    let default = resolve_data_path(DEFAULT_DATASET);
    if !default.exists() {
        bail!("No dataset found at {DEFAULT_DATASET}; pass one with --file");
    }
    Ok(default)
}
