use crate::error::EngineError;
use crate::extract::Fitness;
use crate::params::EngineConfiguration;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct KozaFitness {
    #[serde(rename = "raw_fitness")]
    pub raw: f32,
    #[serde(rename = "adjusted_fitness")]
    pub adjusted: f32,
    pub hits: u32,
}

impl Fitness for KozaFitness {
    fn better_than(&self, other: &Self) -> bool {
        self.adjusted > other.adjusted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Individual<F = KozaFitness> {
    pub fitness: F,
}

#[derive(Debug, Clone, Default)]
pub struct FinalState {
    pub population: Vec<Individual>,
}

pub trait Engine {
    /// Runs one configuration to completion. Implementations record the
    /// configuration they actually applied back into `config`.
    fn run(&mut self, config: &mut EngineConfiguration) -> Result<FinalState, EngineError>;

    fn readback(&self, config: &EngineConfiguration, key: &str) -> Option<String> {
        config.get(key).map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct EngineResult {
    #[serde(default)]
    parameters: BTreeMap<String, Value>,
    population: Vec<KozaFitness>,
}

/// Runs the engine as a child process, one work directory per job.
///
/// Command tokens may contain `{params}`, `{result}` and `{job}`, replaced
/// with the parameter file, the expected result file and the job directory.
/// The first two are also exported as `SWEEP_PARAMS` and `SWEEP_RESULT`.
/// When the result file is absent, the last non-empty stdout line is used
/// if it parses as JSON.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: Vec<String>,
    work_dir: PathBuf,
    keep_work_dirs: bool,
    session: String,
    runs: u64,
}

impl ProcessEngine {
    pub fn new(command: Vec<String>, work_dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        if command.first().map_or(true, |c| c.trim().is_empty()) {
            return Err(EngineError::RunFailed("engine command is empty".to_string()));
        }
        Ok(Self {
            command,
            work_dir: work_dir.into(),
            keep_work_dirs: false,
            session: format!(
                "run_{}_{}",
                Utc::now().format("%Y%m%d_%H%M%S"),
                std::process::id()
            ),
            runs: 0,
        })
    }

    pub fn keep_work_dirs(mut self, keep: bool) -> Self {
        self.keep_work_dirs = keep;
        self
    }

    fn next_job_dir(&mut self) -> Result<PathBuf, EngineError> {
        self.runs += 1;
        let dir = self
            .work_dir
            .join(format!("{}_{}", self.session, self.runs));
        fs::create_dir_all(&dir).map_err(|source| EngineError::WorkDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    fn resolve_command(&self, params: &Path, result: &Path, job_dir: &Path) -> Vec<String> {
        self.command
            .iter()
            .map(|part| {
                part.replace("{params}", &params.to_string_lossy())
                    .replace("{result}", &result.to_string_lossy())
                    .replace("{job}", &job_dir.to_string_lossy())
            })
            .collect()
    }
}

impl Engine for ProcessEngine {
    fn run(&mut self, config: &mut EngineConfiguration) -> Result<FinalState, EngineError> {
        let job_dir = self.next_job_dir()?;
        let params_path = job_dir.join("job.params");
        let result_path = job_dir.join("result.json");
        write_file(&params_path, config.render().as_bytes())?;

        let argv = self.resolve_command(&params_path, &result_path, &job_dir);
        debug!(command = ?argv, dir = %job_dir.display(), "launching engine");
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        cmd.current_dir(&job_dir);
        cmd.env("SWEEP_PARAMS", &params_path);
        cmd.env("SWEEP_RESULT", &result_path);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        let output = cmd.output().map_err(|source| EngineError::Launch {
            command: argv.join(" "),
            source,
        })?;
        if !output.status.success() {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(EngineError::RunFailed(format!(
                "`{}` exited with status {}",
                argv.join(" "),
                status
            )));
        }

        let bytes = match fs::read(&result_path) {
            Ok(bytes) => bytes,
            Err(_) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                stdout
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .map(|l| l.trim().as_bytes().to_vec())
                    .ok_or_else(|| {
                        EngineError::RunFailed(format!(
                            "engine exited without writing {}",
                            result_path.display()
                        ))
                    })?
            }
        };
        let result: EngineResult = serde_json::from_slice(&bytes)
            .map_err(|e| EngineError::MalformedResult(e.to_string()))?;

        for (key, value) in result.parameters {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(EngineError::MalformedResult(format!(
                        "parameter '{}' has non-scalar value {}",
                        key, other
                    )))
                }
            };
            config.set(key, text);
        }

        if !self.keep_work_dirs {
            let _ = fs::remove_dir_all(&job_dir);
        }

        Ok(FinalState {
            population: result
                .population
                .into_iter()
                .map(|fitness| Individual { fitness })
                .collect(),
        })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    let io_err = |source| EngineError::WorkDir {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(path).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}
