use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use phish_detector::batch::{self, RawEmail, Schema};
use phish_detector::{Analysis, Config, FeatureExtractor, Label, PhishingDetector};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;

const SAMPLE_EMAIL: &str = "
        URGENT: Your PayPal account has been SUSPENDED!!!
        Dear Customer, we detected unusual activity.
        Click here to verify: http://bit.ly/paypal-verify
        If not verified within 24 hours, your account will be closed.
        ";

const SEPARATOR: &str = "════════════════════════════════════════════════════════════";

fn main() {
    let matches = Command::new("phish-detector")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Classifies email text as phishing or legitimate")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("phish-detector.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write a default configuration file and exit")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .value_name("FILE")
                .help("Analyze one email (use - for stdin)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("sample")
                .long("sample")
                .help("Analyze the built-in sample phishing email")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("features")
                .long("features")
                .value_name("FILE")
                .help("Print the feature vector of one email (use - for stdin)")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("batch")
                .long("batch")
                .value_name("DIR")
                .help("Extract features from every file in DIR, one email per file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Feature CSV written by --batch")
                .default_value("email_features.csv"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print analysis results as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
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

    if let Err(e) = run(&matches) {
        eprintln!("❌ {e:#}");
        process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    if let Some(path) = matches.get_one::<String>("generate-config") {
        let yaml = Config::default().to_yaml()?;
        fs::write(path, yaml).with_context(|| format!("Failed to write {path}"))?;
        println!("✅ Default configuration written to {path}");
        return Ok(());
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("phish-detector.yaml");
    let config = Config::load(config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    if let Some(source) = matches.get_one::<String>("features") {
        let text = read_email(source)?;
        let vector = FeatureExtractor::new().extract(&text);
        println!("{}", batch::interchange_header(Schema::Inference));
        println!(
            "{}",
            vector
                .values()
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
        return Ok(());
    }

    if let Some(dir) = matches.get_one::<String>("batch") {
        let output = matches
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("email_features.csv");
        return run_batch(Path::new(dir), Path::new(output), &config);
    }

    let text = if matches.get_flag("sample") {
        SAMPLE_EMAIL.to_string()
    } else if let Some(source) = matches.get_one::<String>("analyze") {
        read_email(source)?
    } else {
        anyhow::bail!("Nothing to do: use --analyze, --sample, --features or --batch");
    };

    let detector = PhishingDetector::from_config(&config).with_context(|| {
        format!(
            "No usable model at {}; export a trained model there first",
            config.model_path
        )
    })?;
    let analysis = detector.analyze(&text);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn read_email(source: &str) -> Result<String> {
    let bytes = if source == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read email from stdin")?;
        buf
    } else {
        fs::read(source).with_context(|| format!("Failed to read email file {source}"))?
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_analysis(analysis: &Analysis) {
    let vector = &analysis.vector;
    let verdict = &analysis.verdict;

    println!("🔍 Features extracted:");
    if vector.is_zero() {
        println!("   No suspicious features detected");
    } else {
        for (name, value) in vector.active().take(5) {
            println!("   {name}: {value}");
        }
    }

    println!();
    println!("{SEPARATOR}");
    match verdict.label {
        Label::Phishing => {
            println!("🚨 PHISHING DETECTED!");
            println!("   Confidence: {:.1}%", verdict.confidence);
            println!("   Risk Level: {}", verdict.risk_tier);
        }
        Label::Legitimate => {
            println!("✅ EMAIL APPEARS LEGITIMATE");
            println!("   Confidence: {:.1}%", verdict.confidence);
            if verdict.false_alarm_override {
                println!("   (Low confidence phishing - likely false alarm)");
            }
        }
    }

    if !verdict.top_indicators.is_empty() {
        println!();
        println!("Top indicators:");
        for indicator in &verdict.top_indicators {
            println!(
                "   • {}: {:.1}% weight",
                indicator.feature, indicator.importance_percent
            );
        }
    }
    println!("{SEPARATOR}");
}

fn run_batch(dir: &Path, output: &Path, config: &Config) -> Result<()> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let emails: Vec<RawEmail> = paths
        .iter()
        .map(|path| match fs::read(path) {
            Ok(bytes) => RawEmail::Bytes(bytes),
            Err(e) => RawEmail::Unreadable(format!("{}: {e}", path.display())),
        })
        .collect();

    let report = batch::extract_batch(&emails, &config.batch)?;

    let mut file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    batch::write_interchange(&mut file, &report.rows, Schema::Inference)?;

    println!("📊 Batch conversion complete");
    println!("{SEPARATOR}");
    println!("  Processed: {} emails", report.processed());
    println!("  Errors: {}", report.failures.len());
    println!("  Lossy decodes: {}", report.lossy_decodes);
    println!("  Saved to: {}", output.display());
    println!();
    println!("  Emails with each red flag:");
    for (name, pct) in report.hit_percentages() {
        let hits = report.feature_hits[name.index()];
        println!("    {name}: {hits} emails ({pct:.1}%)");
    }
    Ok(())
}
