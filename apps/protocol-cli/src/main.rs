//! Protocol analysis CLI
//!
//! Runs one engine operation over a protocol file (or stdin) and prints a
//! JSON report on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use protocol_engine::{EngineConfig, ProtocolEngine, ValidationContext};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "protocol-cli")]
#[command(version, about = "Deterministic analysis of clinical-trial protocol text")]
struct Args {
    /// JSON engine configuration (phrase tables, thresholds)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the compliance rules and print the issues found
    Scan {
        /// Protocol text file; stdin when omitted or "-"
        input: Option<PathBuf>,
    },
    /// Parse the schedule of assessments
    Timeline {
        input: Option<PathBuf>,
    },
    /// Extract visit names, assessments, thresholds and triggers
    Entities {
        input: Option<PathBuf>,

        /// Reconcile visit names against the parsed timeline
        #[arg(long)]
        with_timeline: bool,
    },
    /// Check a suggested rewrite against its original text
    Validate {
        /// File holding the original text
        #[arg(long)]
        original: PathBuf,

        /// File holding the suggested rewrite
        #[arg(long)]
        suggested: PathBuf,

        /// Confidence reported by the suggestion's producer
        #[arg(long)]
        confidence: Option<f64>,

        /// Override the configured confidence floor
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Rule the suggestion answers
        #[arg(long)]
        rule_id: Option<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Scan { .. } => "scan",
            Command::Timeline { .. } => "timeline",
            Command::Entities { .. } => "entities",
            Command::Validate { .. } => "validate",
        }
    }
}

/// Envelope around every operation's output
#[derive(Debug, Serialize)]
struct Report<T: Serialize> {
    operation: &'static str,
    engine_version: &'static str,
    generated_at: String,
    result: T,
}

impl<T: Serialize> Report<T> {
    fn new(operation: &'static str, result: T) -> Self {
        Self {
            operation,
            engine_version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            result,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the report; all logging goes to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = load_engine(args.config.as_deref())?;
    tracing::info!(operation = args.command.name(), "running protocol analysis");

    let output = run(&engine, args.command)?;
    println!("{}", output);
    Ok(())
}

fn load_engine(config: Option<&Path>) -> Result<ProtocolEngine> {
    match config {
        Some(path) => {
            let config = EngineConfig::from_path(path)?;
            Ok(ProtocolEngine::from_config(&config)?)
        }
        None => Ok(ProtocolEngine::new()),
    }
}

fn run(engine: &ProtocolEngine, command: Command) -> Result<String> {
    let operation = command.name();
    let json = match command {
        Command::Scan { input } => {
            let text = read_input(input.as_deref())?;
            render(operation, engine.scan_bytes(&text))?
        }
        Command::Timeline { input } => {
            let text = read_input(input.as_deref())?;
            render(operation, engine.parse_timeline_bytes(&text))?
        }
        Command::Entities { input, with_timeline } => {
            let text = read_input(input.as_deref())?;
            let timeline = with_timeline
                .then(|| engine.parse_timeline_bytes(&text))
                .flatten();
            render(operation, engine.extract_entities_bytes(&text, timeline.as_ref()))?
        }
        Command::Validate {
            original,
            suggested,
            confidence,
            min_confidence,
            rule_id,
        } => {
            let original = read_input(Some(&original))?;
            let suggested = read_input(Some(&suggested))?;
            let context = ValidationContext {
                confidence,
                min_confidence,
                rule_id,
            };
            render(operation, engine.validate_bytes(&original, &suggested, &context))?
        }
    };
    Ok(json)
}

fn render<T: Serialize>(operation: &'static str, result: T) -> Result<String> {
    serde_json::to_string_pretty(&Report::new(operation, result)).context("failed to serialize report")
}

/// Raw bytes of a file, or of stdin for `None` / "-"; decoding is the engine's job
fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("protocol-cli-{}-{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_flags() {
        let args = Args::try_parse_from([
            "protocol-cli",
            "validate",
            "--original",
            "a.txt",
            "--suggested",
            "b.txt",
            "--confidence",
            "0.8",
            "--config",
            "engine.json",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("engine.json")));
        match args.command {
            Command::Validate {
                confidence,
                min_confidence,
                ..
            } => {
                assert_eq!(confidence, Some(0.8));
                assert_eq!(min_confidence, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_scan_report_envelope() {
        let input = temp_file("scan.txt", "Subjects will be enrolled");
        let engine = ProtocolEngine::new();
        let json = run(&engine, Command::Scan { input: Some(input.clone()) }).unwrap();
        std::fs::remove_file(&input).unwrap();

        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["operation"], "scan");
        assert_eq!(report["result"][0]["rule_id"], "TRM-001");
        let generated_at = report["generated_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(generated_at).is_ok());
    }

    #[test]
    fn test_timeline_without_schedule_is_null() {
        let input = temp_file("timeline.txt", "No schedule is described in this section.");
        let engine = ProtocolEngine::new();
        let json = run(&engine, Command::Timeline { input: Some(input.clone()) }).unwrap();
        std::fs::remove_file(&input).unwrap();

        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(report["result"].is_null());
    }

    #[test]
    fn test_validate_rejects_changed_dose() {
        let original = temp_file("original.txt", "Dose is 200mg BID");
        let suggested = temp_file("suggested.txt", "Dose is 400mg BID");
        let engine = ProtocolEngine::new();
        let json = run(
            &engine,
            Command::Validate {
                original: original.clone(),
                suggested: suggested.clone(),
                confidence: None,
                min_confidence: None,
                rule_id: None,
            },
        )
        .unwrap();
        std::fs::remove_file(&original).unwrap();
        std::fs::remove_file(&suggested).unwrap();

        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["result"]["accepted"], false);
        assert_eq!(report["result"]["severity_of_violation"], "reject");
    }

    #[test]
    fn test_missing_input_file_is_an_error() {
        let engine = ProtocolEngine::new();
        let missing = PathBuf::from("/nonexistent/protocol.txt");
        let err = run(&engine, Command::Scan { input: Some(missing) }).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
