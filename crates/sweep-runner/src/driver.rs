use crate::engine::Engine;
use crate::error::{BatchError, InputError, Result};
use crate::extract;
use crate::fields::AlgorithmVariant;
use crate::params::TemplateSource;
use crate::reader::{BatchSpecReader, JobRecord};
use crate::schema::{QuietLevel, Validator};
use crate::verify;
use crate::writer::{ResultWriter, RowSink};
use serde::Serialize;
use std::io::BufRead;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRange {
    start: u64,
    end: u64,
}

impl JobRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start < 1 {
            return Err(BatchError::Configuration(format!(
                "start row must be at least 1 (got {})",
                start
            )));
        }
        if start > end {
            return Err(BatchError::Configuration(format!(
                "start row {} is after end row {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn jobs(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Initializing,
    Processing(u64),
    Done,
}

#[derive(Debug, Clone, Default)]
pub struct JobSettings {
    pub validator: Validator,
    pub quiet: QuietLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub start: u64,
    pub end: u64,
    pub jobs: u64,
    pub crossover: u64,
    pub mutation: u64,
    pub defaults: u64,
}

impl BatchSummary {
    fn new(range: JobRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            ..Self::default()
        }
    }

    fn count(&mut self, variant: AlgorithmVariant) {
        self.jobs += 1;
        match variant {
            AlgorithmVariant::Crossover => self.crossover += 1,
            AlgorithmVariant::Mutation => self.mutation += 1,
            AlgorithmVariant::Defaults => self.defaults += 1,
        }
    }
}

pub struct JobDriver<'a, R, W: RowSink> {
    reader: BatchSpecReader<R>,
    writer: ResultWriter<W>,
    engine: &'a mut dyn Engine,
    templates: &'a dyn TemplateSource,
    settings: JobSettings,
    state: DriverState,
}

impl<'a, R: BufRead, W: RowSink> JobDriver<'a, R, W> {
    pub fn new(
        reader: BatchSpecReader<R>,
        writer: ResultWriter<W>,
        engine: &'a mut dyn Engine,
        templates: &'a dyn TemplateSource,
        settings: JobSettings,
    ) -> Self {
        Self {
            reader,
            writer,
            engine,
            templates,
            settings,
            state: DriverState::Initializing,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn run(&mut self, range: JobRange) -> Result<BatchSummary> {
        if self.state != DriverState::Initializing {
            return Err(BatchError::Configuration(
                "a driver processes a single range".to_string(),
            ));
        }
        self.writer.write_header(self.reader.header())?;
        self.reader.skip_rows(range.start - 1)?;

        let mut summary = BatchSummary::new(range);
        for current in range.start..=range.end {
            self.state = DriverState::Processing(current);
            let record = self
                .reader
                .next_record()?
                .ok_or(InputError::PrematureEndOfInput {
                    row: current,
                    end: range.end,
                })?;
            if record.id() != current as i64 {
                debug!(row = current, id = record.id(), "job id differs from row number");
            }
            let variant = self.run_job(&record)?;
            summary.count(variant);
            info!(row = current, id = record.id(), variant = %variant, "job complete");
        }
        self.state = DriverState::Done;
        info!(
            start = range.start,
            end = range.end,
            jobs = summary.jobs,
            "batch complete"
        );
        Ok(summary)
    }

    fn run_job(&mut self, record: &JobRecord) -> Result<AlgorithmVariant> {
        let params = self.settings.validator.validate(record)?;
        let mut config = self.templates.load(params.problem())?;
        params.apply_to(&mut config, &self.settings.quiet);
        debug!(row = record.row(), entries = config.len(), "configuration merged");

        let state = self.engine.run(&mut config)?;
        let audit = verify::audit_record(&*self.engine, &config, record, params.variant())?;
        let fitness = extract::summarize(&state)?;
        self.writer.write_row(&audit, record, &fitness)?;
        Ok(params.variant())
    }

    pub fn into_writer(self) -> ResultWriter<W> {
        self.writer
    }
}

pub fn check_range<R: BufRead>(
    reader: &mut BatchSpecReader<R>,
    templates: &dyn TemplateSource,
    validator: &Validator,
    range: JobRange,
) -> Result<BatchSummary> {
    reader.skip_rows(range.start - 1)?;
    let mut summary = BatchSummary::new(range);
    for current in range.start..=range.end {
        let record = reader
            .next_record()?
            .ok_or(InputError::PrematureEndOfInput {
                row: current,
                end: range.end,
            })?;
        let params = validator.validate(&record)?;
        templates.load(params.problem())?;
        summary.count(params.variant());
    }
    info!(jobs = summary.jobs, "batch checked");
    Ok(summary)
}
