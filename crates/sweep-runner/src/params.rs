//! Engine parameter store and per-problem base templates.
//!
//! Parameter files use the engine's `key = value` format. A `parent.N`
//! entry pulls in another file, resolved relative to the including one;
//! the including file wins over its parents and `parent.0` wins over
//! `parent.1`.

use crate::error::EngineError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_INCLUDE_DEPTH: usize = 16;
const PARENT_PREFIX: &str = "parent.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfiguration {
    entries: BTreeMap<String, String>,
}

impl EngineConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extend(&mut self, other: EngineConfiguration) {
        self.entries.extend(other.entries);
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| format!("line {}: expected 'key = value'", idx + 1))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("line {}: empty parameter name", idx + 1));
            }
            entries.insert(key.to_string(), value.trim().to_string());
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        load_with_depth(path, 0)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EngineConfiguration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn load_with_depth(path: &Path, depth: usize) -> Result<EngineConfiguration, String> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(format!(
            "parent includes nested deeper than {} at {}",
            MAX_INCLUDE_DEPTH,
            path.display()
        ));
    }
    let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let own = EngineConfiguration::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))?;

    let mut parents: Vec<(u32, PathBuf)> = Vec::new();
    for (key, value) in own.iter() {
        if let Some(index) = key.strip_prefix(PARENT_PREFIX) {
            let index = index.parse::<u32>().map_err(|_| {
                format!("{}: invalid include key '{}'", path.display(), key)
            })?;
            let base = path.parent().unwrap_or(Path::new("."));
            parents.push((index, base.join(value)));
        }
    }
    parents.sort_by(|a, b| b.0.cmp(&a.0));

    let mut merged = EngineConfiguration::new();
    for (_, parent) in &parents {
        merged.extend(load_with_depth(parent, depth + 1)?);
    }
    merged.extend(EngineConfiguration {
        entries: own
            .entries
            .into_iter()
            .filter(|(k, _)| !k.starts_with(PARENT_PREFIX))
            .collect(),
    });
    Ok(merged)
}

pub trait TemplateSource {
    fn load(&self, problem: &str) -> Result<EngineConfiguration, EngineError>;
}

impl<F> TemplateSource for F
where
    F: Fn(&str) -> Result<EngineConfiguration, EngineError>,
{
    fn load(&self, problem: &str) -> Result<EngineConfiguration, EngineError> {
        self(problem)
    }
}

#[derive(Debug, Clone)]
pub struct ParamDirTemplates {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
}

impl ParamDirTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "problem_".to_string(),
            extension: "params".to_string(),
        }
    }

    pub fn path_for(&self, problem: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", self.prefix, problem, self.extension))
    }
}

impl TemplateSource for ParamDirTemplates {
    fn load(&self, problem: &str) -> Result<EngineConfiguration, EngineError> {
        let path = self.path_for(problem);
        EngineConfiguration::load(&path).map_err(|reason| EngineError::Template {
            problem: problem.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::temp_dir;

    #[test]
    fn parse_skips_comments_and_trims() {
        let cfg = EngineConfiguration::parse(
            "# koza defaults\n\npop.subpop.0.size = 1024\n  generations=51  \n",
        )
        .expect("parse");
        assert_eq!(cfg.get("pop.subpop.0.size"), Some("1024"));
        assert_eq!(cfg.get("generations"), Some("51"));
        assert_eq!(cfg.len(), 2);
    }

    #[test]
    fn parse_rejects_lines_without_assignment() {
        let err = EngineConfiguration::parse("generations 51\n").expect_err("bad line");
        assert!(err.contains("line 1"), "{}", err);
    }

    #[test]
    fn render_parses_back_to_the_same_store() {
        let cfg: EngineConfiguration = [("seed.0", "4"), ("generations", "10")]
            .into_iter()
            .collect();
        assert_eq!(EngineConfiguration::parse(&cfg.render()).expect("parse"), cfg);
    }

    #[test]
    fn parents_are_overridden_by_child_and_lower_index_wins() {
        let root = temp_dir("params_parent");
        fs::write(root.join("base.params"), "generations = 51\nverbosity = 0\nbreed = a\n")
            .expect("write base");
        fs::create_dir_all(root.join("koza")).expect("koza dir");
        fs::write(root.join("koza").join("koza.params"), "breed = b\nelite = 1\n")
            .expect("write koza");
        fs::write(
            root.join("problem_1.params"),
            "parent.0 = koza/koza.params\nparent.1 = base.params\ngenerations = 10\n",
        )
        .expect("write problem");

        let cfg = ParamDirTemplates::new(&root).load("1").expect("load");
        assert_eq!(cfg.get("generations"), Some("10"));
        assert_eq!(cfg.get("breed"), Some("b"));
        assert_eq!(cfg.get("elite"), Some("1"));
        assert_eq!(cfg.get("verbosity"), Some("0"));
        assert!(!cfg.contains_key("parent.0"));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn self_including_file_is_rejected() {
        let root = temp_dir("params_cycle");
        fs::write(root.join("problem_9.params"), "parent.0 = problem_9.params\n").expect("write");
        match ParamDirTemplates::new(&root).load("9") {
            Err(EngineError::Template { problem, reason }) => {
                assert_eq!(problem, "9");
                assert!(reason.contains("nested"), "{}", reason);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn missing_template_is_an_engine_error() {
        let root = temp_dir("params_missing");
        assert!(matches!(
            ParamDirTemplates::new(&root).load("404"),
            Err(EngineError::Template { .. })
        ));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn closures_are_template_sources() {
        let source = |problem: &str| -> Result<EngineConfiguration, EngineError> {
            Ok([("problem", problem)].into_iter().collect())
        };
        let cfg = source.load("5").expect("load");
        assert_eq!(cfg.get("problem"), Some("5"));
    }
}
