use crate::error::InputError;
use crate::fields::{self, AUDIT_COLUMNS};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct JobRecord {
    row: u64,
    id: i64,
    labels: Arc<[String]>,
    values: Vec<String>,
}

impl JobRecord {
    fn new(row: u64, labels: Arc<[String]>, values: Vec<String>) -> Result<Self, InputError> {
        let raw_id = labels
            .iter()
            .position(|l| l == fields::ID)
            .and_then(|i| values.get(i))
            .ok_or_else(|| InputError::MalformedRow {
                row,
                reason: format!("no {} value", fields::ID),
            })?;
        let id = raw_id
            .trim()
            .parse::<i64>()
            .map_err(|_| InputError::MalformedRow {
                row,
                reason: format!("{} '{}' is not an integer", fields::ID, raw_id),
            })?;
        Ok(Self {
            row,
            id,
            labels,
            values,
        })
    }

    pub fn from_pairs<K, V>(row: u64, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, InputError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let (labels, values): (Vec<String>, Vec<String>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).unzip();
        Self::new(row, labels.into(), values)
    }

    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn algorithm(&self) -> &str {
        self.get(fields::ALGORITHM).unwrap_or_default()
    }

    pub fn problem(&self) -> &str {
        self.get(fields::PROBLEM).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

/// Lazy, non-restartable sequence of [`JobRecord`]s over comma-separated
/// input. Quoted fields may contain commas, doubled quotes and newlines.
/// Blank lines between rows are ignored.
pub struct BatchSpecReader<R> {
    source: R,
    raw_header: Vec<String>,
    labels: Arc<[String]>,
    rows_read: u64,
}

impl BatchSpecReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).map_err(|source| InputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> BatchSpecReader<R> {
    pub fn new(source: R) -> Result<Self, InputError> {
        let mut reader = Self {
            source,
            raw_header: Vec::new(),
            labels: Arc::from(Vec::new()),
            rows_read: 0,
        };
        let raw_header = reader
            .read_fields()?
            .ok_or_else(|| InputError::MalformedRow {
                row: 0,
                reason: "missing header row".to_string(),
            })?;
        let labels: Vec<String> = raw_header
            .iter()
            .map(|cell| fields::header_label(cell).to_string())
            .collect();

        let mut seen = BTreeSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(InputError::MalformedRow {
                    row: 0,
                    reason: format!("duplicate header label '{}'", label),
                });
            }
        }
        if let Some(missing) = AUDIT_COLUMNS.iter().find(|l| !seen.contains(**l)) {
            return Err(InputError::MissingColumn {
                label: missing.to_string(),
            });
        }

        reader.raw_header = raw_header;
        reader.labels = labels.into();
        Ok(reader)
    }

    /// Header cells exactly as read, for echoing to the output.
    pub fn header(&self) -> &[String] {
        &self.raw_header
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn skip_rows(&mut self, n: u64) -> Result<(), InputError> {
        for skipped in 0..n {
            if self.read_fields()?.is_none() {
                return Err(InputError::InputExhausted {
                    requested: n,
                    available: skipped,
                });
            }
            self.rows_read += 1;
        }
        Ok(())
    }

    pub fn next_record(&mut self) -> Result<Option<JobRecord>, InputError> {
        let Some(values) = self.read_fields()? else {
            return Ok(None);
        };
        self.rows_read += 1;
        let row = self.rows_read;
        if values.len() != self.labels.len() {
            return Err(InputError::MalformedRow {
                row,
                reason: format!(
                    "expected {} fields, found {}",
                    self.labels.len(),
                    values.len()
                ),
            });
        }
        JobRecord::new(row, self.labels.clone(), values).map(Some)
    }

    fn read_fields(&mut self) -> Result<Option<Vec<String>>, InputError> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .source
                .read_line(&mut line)
                .map_err(|source| InputError::Read {
                    row: self.rows_read,
                    source,
                })?;
            if n == 0 {
                if in_quotes {
                    return Err(InputError::MalformedRow {
                        row: self.rows_read + 1,
                        reason: "unterminated quoted field".to_string(),
                    });
                }
                return Ok(None);
            }
            let content = line.strip_suffix('\n').unwrap_or(&line);
            let content = content.strip_suffix('\r').unwrap_or(content);
            if !in_quotes && fields.is_empty() && field.is_empty() && content.trim().is_empty() {
                continue;
            }

            let mut chars = content.chars().peekable();
            while let Some(c) = chars.next() {
                if in_quotes {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            field.push('"');
                        } else {
                            in_quotes = false;
                        }
                    } else {
                        field.push(c);
                    }
                } else {
                    match c {
                        '"' => in_quotes = true,
                        ',' => fields.push(std::mem::take(&mut field)),
                        _ => field.push(c),
                    }
                }
            }
            if in_quotes {
                field.push('\n');
                continue;
            }
            fields.push(field);
            return Ok(Some(fields));
        }
    }
}

impl<R: BufRead> Iterator for BatchSpecReader<R> {
    type Item = Result<JobRecord, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
