use crate::fields::AlgorithmVariant;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl BatchError {
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::Configuration(_) => "configuration_error",
            BatchError::Input(_) => "input_error",
            BatchError::Validation(_) => "validation_error",
            BatchError::Engine(_) => "engine_error",
            BatchError::Output(_) => "output_error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            BatchError::Configuration(_) => 2,
            BatchError::Input(_) => 3,
            BatchError::Validation(_) => 4,
            BatchError::Engine(_) => 5,
            BatchError::Output(_) => 6,
        }
    }
}

/// Rows are counted from 1, excluding the header.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot open batch file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error reading batch file after row {row}: {source}")]
    Read {
        row: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed row {row}: {reason}")]
    MalformedRow { row: u64, reason: String },
    #[error("batch header has no '{label}' column")]
    MissingColumn { label: String },
    #[error("unable to locate start row: asked to skip {requested} rows but input ends after {available}")]
    InputExhausted { requested: u64, available: u64 },
    #[error("reached end of input at row {row} without processing to end row {end}")]
    PrematureEndOfInput { row: u64, end: u64 },
}

#[derive(Debug, Error)]
#[error("row {row}: invalid value '{value}' for '{field}': {violation}")]
pub struct ValidationError {
    pub row: u64,
    pub field: String,
    pub value: String,
    pub violation: Violation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("unrecognised algorithm type (expected C, M or D)")]
    UnknownAlgorithm,
    #[error("problem must be a plain name")]
    BadProblem,
    #[error("not a valid {expected}")]
    Unparseable { expected: &'static str },
    #[error("outside domain {domain}")]
    OutOfDomain { domain: String },
    #[error("required by the {variant} variant")]
    Missing { variant: AlgorithmVariant },
    #[error("not used by the {variant} variant; expected NaN")]
    NotApplicable { variant: AlgorithmVariant },
    #[error("expected genetic operator {expected}")]
    WrongOperator { expected: &'static str },
    #[error("{0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot load base configuration for problem '{problem}': {reason}")]
    Template { problem: String, reason: String },
    #[error("cannot prepare engine work directory {}: {source}", .path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot launch engine `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("engine run failed: {0}")]
    RunFailed(String),
    #[error("malformed engine result: {0}")]
    MalformedResult(String),
    #[error("engine returned an empty population")]
    EmptyPopulation,
    #[error("engine reported no value for '{key}'")]
    MissingReadback { key: String },
    #[error("invalid algorithm type read back: {operator}")]
    UnrecognizedOperator { operator: String },
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot open result file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("result header must be written before rows")]
    MissingHeader,
    #[error("error writing result: {0}")]
    Write(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_and_nonzero() {
        let errors = [
            BatchError::Configuration("x".to_string()),
            BatchError::Input(InputError::PrematureEndOfInput { row: 3, end: 5 }),
            BatchError::Validation(ValidationError {
                row: 1,
                field: "generations".to_string(),
                value: "0".to_string(),
                violation: Violation::OutOfDomain {
                    domain: "integer >= 1".to_string(),
                },
            }),
            BatchError::Engine(EngineError::EmptyPopulation),
            BatchError::Output(OutputError::MissingHeader),
        ];
        let mut codes: Vec<i32> = errors.iter().map(BatchError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn validation_message_names_field_and_value() {
        let err = ValidationError {
            row: 7,
            field: "gp.koza.ns.root".to_string(),
            value: "1.4".to_string(),
            violation: Violation::OutOfDomain {
                domain: "[0, 1]".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("row 7"), "{}", msg);
        assert!(msg.contains("gp.koza.ns.root"), "{}", msg);
        assert!(msg.contains("1.4"), "{}", msg);
    }
}
