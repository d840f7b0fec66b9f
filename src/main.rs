use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::LevelFilter;
use phish_scorer::config::resolve_data_path;
use phish_scorer::features::LinguisticTrigger;
use phish_scorer::{
    AnalysisResult, AnalysisService, Config, FilterEngine, LinguisticReport, MessageSource,
    UploadCache,
};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let matches = Command::new("phish-scorer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Score an email for phishing risk from header authenticity, domain reputation and trained word statistics")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (built-in defaults when omitted)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .value_name("FILE")
                .help("Linguistic statistics file produced by phish-trainer")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("analyze")
                .short('a')
                .long("analyze")
                .value_name("FILE")
                .help("Analyze a raw email file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("NAME")
                .help("Analyze a fixture from the test email directory")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("list-test-emails")
                .long("list-test-emails")
                .help("List the available test email fixtures")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Skip all DNS and DNS-over-HTTPS lookups")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the full analysis result as JSON")
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
    if let Some(path) = matches.get_one::<String>("generate-config") {
        Config::write_default(Path::new(path))?;
        println!("Default configuration written to: {path}");
        println!("Please edit the configuration file to suit your needs.");
        return Ok(());
    }

    let mut config = Config::load_or_default(matches.get_one::<String>("config").map(Path::new))?;
    if matches.get_flag("offline") {
        config.network.enabled = false;
    }

    let test_emails_dir = resolve_data_path(&config.paths.test_emails_dir);
    if matches.get_flag("list-test-emails") {
        let names = phish_scorer::service::list_test_emails(&test_emails_dir);
        if names.is_empty() {
            println!("📭 No test emails in {}", test_emails_dir.display());
        }
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let source = if let Some(file) = matches.get_one::<String>("analyze") {
        let path = Path::new(file);
        let bytes = std::fs::read(path)
            .with_context(|| format!("Error reading email file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        MessageSource::Upload { file_name, bytes }
    } else if let Some(name) = matches.get_one::<String>("test-email") {
        MessageSource::from_reference(name)
    } else {
        bail!("Nothing to do: pass --analyze FILE, --test-email NAME or --list-test-emails");
    };

    let stats_path = match matches.get_one::<String>("stats") {
        Some(path) => Path::new(path).to_path_buf(),
        None => resolve_data_path(&config.paths.stats_file),
    };
    let report = Arc::new(LinguisticReport::load_or_empty(&stats_path));

    let cache = UploadCache::new();
    if config.cache.clear_interval_seconds > 0 {
        cache.spawn_eviction(Duration::from_secs(config.cache.clear_interval_seconds));
    }

    let engine = FilterEngine::new(&config, report)?;
    let service = AnalysisService::new(engine, cache, test_emails_dir);
    let result = service.analyze(source).await?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

fn print_report(result: &AnalysisResult) {
    let factors = &result.risk_factors;
    println!("🧪 Analysis of {}", result.file_name);
    println!();
    println!("📧 Email Details:");
    for (name, value) in &result.headers {
        if !value.is_empty() {
            println!("   {name}: {value}");
        }
    }
    println!();
    println!("🎯 Scam probability: {:.1}%", result.scam_probability);
    println!("   Technical: {:5.1}", result.tech_score);
    println!("   Body:      {:5.1}", result.body_score);
    println!("   Subject:   {:5.1}", result.subject_score);
    println!();
    println!("🔍 Technical signals:");
    println!(
        "   SPF: {:?}  DKIM: {:?}  DMARC: {:?}",
        factors.spf_status, factors.dkim_status, factors.dmarc_status
    );
    if !factors.domain.is_empty() {
        println!("   Domain: {} ({})", factors.domain, factors.domain_trust);
        println!("   MX records: {}", if factors.has_mx_records { "yes" } else { "no" });
        println!("   Blacklist: {}", factors.blacklist_status);
    }
    if factors.from_return_path_mismatch {
        println!("   ⚠️  From / Return-Path domain mismatch");
    }
    if factors.reply_to_mismatch {
        println!("   ⚠️  Reply-To points to a different domain");
    }
    if factors.is_disposable {
        println!("   ⚠️  Disposable sender domain");
    }
    if !factors.suspicious_keywords.is_empty() {
        println!("   Subject keywords: {}", factors.suspicious_keywords.join(", "));
    }

    print_triggers("📝 Body triggers:", &result.body_triggers);
    print_triggers("📝 Subject triggers:", &result.subject_triggers);
}

fn print_triggers(title: &str, triggers: &[LinguisticTrigger]) {
    if triggers.is_empty() {
        return;
    }
    println!();
    println!("{title}");
    for trigger in triggers {
        println!("   • {}: {}", trigger.text, trigger.explanation);
    }
}
