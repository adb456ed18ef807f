use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use sweep_runner::{BatchError, BatchOptions, BatchSummary, RunnerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sweep",
    version = "0.3.0",
    about = "Runs a range of evolutionary-computation jobs from a batch file"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run rows start..=end and write one audit row per job.
    Run {
        #[arg(long)]
        batchfile: PathBuf,
        #[arg(long)]
        resultfile: PathBuf,
        #[arg(long)]
        start: u64,
        #[arg(long)]
        end: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Validate rows start..=end and their templates without running them.
    Check {
        #[arg(long)]
        batchfile: PathBuf,
        #[arg(long)]
        start: u64,
        #[arg(long)]
        end: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    tracing::debug!(command = ?cli.command, "parsed arguments");
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            let batch_err = err.downcast_ref::<BatchError>();
            let exit_code = batch_err.map_or(1, BatchError::exit_code);
            if json_mode {
                let code = batch_err.map_or("command_failed", BatchError::code);
                emit_json(&json_error(code, err.to_string(), error_details(batch_err)));
            } else {
                eprintln!("error: {:#}", err);
            }
            std::process::exit(exit_code);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            batchfile,
            resultfile,
            start,
            end,
            config,
            json,
        } => {
            let runner_config = load_config(config.as_deref())?;
            let options = BatchOptions {
                batchfile,
                resultfile,
                start,
                end,
            };
            let summary = sweep_runner::run_batch(&options, &runner_config)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "resultfile": options.resultfile.display().to_string(),
                    "summary": summary_to_json(&summary)?
                })));
            }
            print_summary(&summary);
            println!("resultfile: {}", options.resultfile.display());
        }
        Commands::Check {
            batchfile,
            start,
            end,
            config,
            json,
        } => {
            let runner_config = load_config(config.as_deref())?;
            let summary = sweep_runner::check_batch(&batchfile, start, end, &runner_config)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "check",
                    "summary": summary_to_json(&summary)?
                })));
            }
            print_summary(&summary);
            println!("ok: {} rows valid", summary.jobs);
        }
    }
    Ok(None)
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => Ok(RunnerConfig::load(path)?),
        None => Ok(RunnerConfig::default()),
    }
}

fn print_summary(summary: &BatchSummary) {
    println!("rows: {}..={}", summary.start, summary.end);
    println!("jobs: {}", summary.jobs);
    println!(
        "variants: crossover={} mutation={} defaults={}",
        summary.crossover, summary.mutation, summary.defaults
    );
}

fn summary_to_json(summary: &BatchSummary) -> Result<Value> {
    Ok(serde_json::to_value(summary)?)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn error_details(err: Option<&BatchError>) -> Value {
    match err {
        Some(BatchError::Validation(v)) => json!({
            "exit_code": 4,
            "row": v.row,
            "field": v.field,
            "value": v.value
        }),
        Some(other) => json!({ "exit_code": other.exit_code() }),
        None => json!({}),
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Check { json, .. } => *json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn run_parses_required_options() {
        let cli = Cli::try_parse_from([
            "sweep",
            "run",
            "--batchfile",
            "batch.csv",
            "--resultfile",
            "out.csv",
            "--start",
            "3",
            "--end",
            "9",
        ])
        .expect("parse");
        match cli.command {
            Commands::Run {
                batchfile,
                start,
                end,
                config,
                json,
                ..
            } => {
                assert_eq!(batchfile, PathBuf::from("batch.csv"));
                assert_eq!((start, end), (3, 9));
                assert!(config.is_none());
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn missing_option_is_a_usage_error() {
        let err = Cli::try_parse_from([
            "sweep",
            "run",
            "--batchfile",
            "batch.csv",
            "--start",
            "1",
            "--end",
            "2",
        ])
        .expect_err("missing resultfile");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn repeated_option_is_a_usage_error() {
        let err = Cli::try_parse_from([
            "sweep",
            "check",
            "--batchfile",
            "batch.csv",
            "--start",
            "1",
            "--start",
            "2",
            "--end",
            "2",
        ])
        .expect_err("duplicate start");
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn negative_start_is_rejected_by_the_parser() {
        assert!(Cli::try_parse_from([
            "sweep",
            "check",
            "--batchfile",
            "b.csv",
            "--start",
            "-1",
            "--end",
            "2",
        ])
        .is_err());
    }

    #[test]
    fn json_errors_carry_the_error_class() {
        let err = BatchError::Configuration("start row 5 is after end row 2".to_string());
        let payload = json_error(err.code(), err.to_string(), error_details(Some(&err)));
        assert_eq!(payload["ok"], json!(false));
        assert_eq!(payload["error"]["code"], json!("configuration_error"));
        assert_eq!(payload["error"]["details"]["exit_code"], json!(2));
    }
}
