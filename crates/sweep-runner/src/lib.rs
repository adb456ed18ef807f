pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fields;
pub mod params;
pub mod reader;
pub mod schema;
pub mod verify;
pub mod writer;

#[cfg(test)]
mod testutil;

pub use config::RunnerConfig;
pub use driver::{check_range, BatchSummary, DriverState, JobDriver, JobRange, JobSettings};
pub use engine::{Engine, FinalState, Individual, KozaFitness, ProcessEngine};
pub use error::{BatchError, EngineError, InputError, OutputError, Result, ValidationError, Violation};
pub use extract::{select_best, summarize, Fitness, FitnessSummary};
pub use fields::AlgorithmVariant;
pub use params::{EngineConfiguration, ParamDirTemplates, TemplateSource};
pub use reader::{BatchSpecReader, JobRecord};
pub use schema::{ParameterSet, QuietLevel, Validator};
pub use verify::{algorithm_from_operator, audit_record, AuditRecord};
pub use writer::{ResultWriter, RowSink};

use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batchfile: PathBuf,
    pub resultfile: PathBuf,
    pub start: u64,
    pub end: u64,
}

pub fn run_batch(options: &BatchOptions, config: &RunnerConfig) -> Result<BatchSummary> {
    let range = JobRange::new(options.start, options.end)?;
    let mut engine = config.process_engine()?;
    let templates = config.templates();
    let reader = BatchSpecReader::open(&options.batchfile)?;
    let writer = ResultWriter::create(&options.resultfile)?;
    info!(
        batchfile = %options.batchfile.display(),
        resultfile = %options.resultfile.display(),
        start = range.start(),
        end = range.end(),
        "starting batch"
    );
    let settings = JobSettings {
        validator: config.validator(),
        quiet: config.quiet(),
    };
    let mut driver = JobDriver::new(reader, writer, &mut engine, &templates, settings);
    driver.run(range)
}

pub fn check_batch(
    batchfile: &std::path::Path,
    start: u64,
    end: u64,
    config: &RunnerConfig,
) -> Result<BatchSummary> {
    let range = JobRange::new(start, end)?;
    let mut reader = BatchSpecReader::open(batchfile)?;
    check_range(&mut reader, &config.templates(), &config.validator(), range)
}
