use crate::engine::ProcessEngine;
use crate::error::{BatchError, Result};
use crate::params::ParamDirTemplates;
use crate::schema::{QuietLevel, Validator, DEFAULT_TOLERANCE};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub engine: EngineSection,
    pub templates: TemplateSection,
    pub validation: ValidationSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub command: Vec<String>,
    pub work_dir: PathBuf,
    pub keep_work_dirs: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            work_dir: PathBuf::from(".sweep").join("jobs"),
            keep_work_dirs: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSection {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("ParameterFiles"),
            prefix: "problem_".to_string(),
            extension: "params".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    pub probability_tolerance: f64,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            probability_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub verbosity_key: String,
    pub quiet_level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        let quiet = QuietLevel::default();
        Self {
            verbosity_key: quiet.key,
            quiet_level: quiet.level,
        }
    }
}

impl RunnerConfig {
    /// Reads a config file. Relative paths in it are taken from the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BatchError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&raw)
            .map_err(|e| BatchError::Configuration(format!("{}: {}", path.display(), e)))?;
        let base = path.parent().unwrap_or(Path::new("."));
        config.engine.work_dir = resolve(base, &config.engine.work_dir);
        config.templates.dir = resolve(base, &config.templates.dir);
        Ok(config)
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
        let tolerance = config.validation.probability_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!(
                "validation.probability_tolerance must be a non-negative number (got {})",
                tolerance
            ));
        }
        Ok(config)
    }

    pub fn templates(&self) -> ParamDirTemplates {
        ParamDirTemplates {
            dir: self.templates.dir.clone(),
            prefix: self.templates.prefix.clone(),
            extension: self.templates.extension.clone(),
        }
    }

    pub fn process_engine(&self) -> Result<ProcessEngine> {
        if self.engine.command.is_empty() {
            return Err(BatchError::Configuration(
                "engine.command is required to run jobs".to_string(),
            ));
        }
        let engine = ProcessEngine::new(self.engine.command.clone(), &self.engine.work_dir)
            .map_err(|e| BatchError::Configuration(e.to_string()))?;
        Ok(engine.keep_work_dirs(self.engine.keep_work_dirs))
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.validation.probability_tolerance)
    }

    pub fn quiet(&self) -> QuietLevel {
        QuietLevel {
            key: self.logging.verbosity_key.clone(),
            level: self.logging.quiet_level.clone(),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
