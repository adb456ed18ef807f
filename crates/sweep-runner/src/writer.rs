use crate::error::OutputError;
use crate::extract::FitnessSummary;
use crate::fields::{self, AUDIT_COLUMNS, RESULT_LABELS};
use crate::reader::JobRecord;
use crate::verify::AuditRecord;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Destination for result rows. `sync` runs after every row, so a row is on
/// stable storage before the next job starts.
pub trait RowSink: Write {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl RowSink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl RowSink for Vec<u8> {}

pub struct ResultWriter<W: RowSink> {
    sink: W,
    header: Option<Vec<String>>,
    rows: u64,
}

impl ResultWriter<File> {
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let file = File::create(path).map_err(|source| OutputError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<W: RowSink> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            header: None,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn write_header(&mut self, input_header: &[String]) -> Result<(), OutputError> {
        let cells = input_header
            .iter()
            .map(String::as_str)
            .chain(RESULT_LABELS.iter().copied());
        self.emit(cells)?;
        self.header = Some(input_header.to_vec());
        Ok(())
    }

    pub fn write_row(
        &mut self,
        audit: &AuditRecord,
        job: &JobRecord,
        fitness: &FitnessSummary,
    ) -> Result<(), OutputError> {
        let header = self.header.as_ref().ok_or(OutputError::MissingHeader)?;
        let mut cells: Vec<String> = header
            .iter()
            .map(|cell| {
                let label = fields::header_label(cell);
                let value = if AUDIT_COLUMNS.contains(&label) {
                    audit.get(label)
                } else {
                    job.get(label)
                };
                value.unwrap_or_default().to_string()
            })
            .collect();
        cells.extend(fitness.fields());
        self.emit(cells.iter().map(String::as_str))?;
        self.rows += 1;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn emit<'a>(&mut self, cells: impl Iterator<Item = &'a str>) -> Result<(), OutputError> {
        let mut line = String::new();
        for (idx, cell) in cells.enumerate() {
            if idx > 0 {
                line.push(',');
            }
            push_field(&mut line, cell);
        }
        line.push('\n');
        self.sink.write_all(line.as_bytes())?;
        self.sink.flush()?;
        self.sink.sync()?;
        Ok(())
    }
}

fn push_field(line: &mut String, cell: &str) {
    if cell.contains([',', '"', '\n', '\r']) {
        line.push('"');
        line.push_str(&cell.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, FinalState};
    use crate::error::EngineError;
    use crate::fields::{self, AlgorithmVariant};
    use crate::params::EngineConfiguration;
    use crate::testutil::{crossover_values, record, row_line, temp_dir};
    use std::fs;
    use crate::verify::audit_record;

    struct Stored;

    impl Engine for Stored {
        fn run(&mut self, _: &mut EngineConfiguration) -> Result<FinalState, EngineError> {
            Ok(FinalState::default())
        }
    }

    fn summary() -> FitnessSummary {
        FitnessSummary {
            raw_fitness: 1.5,
            adjusted_fitness: 0.9,
            hits: 3,
        }
    }

    fn header() -> Vec<String> {
        AUDIT_COLUMNS.iter().map(|l| l.to_string()).collect()
    }

    fn text(writer: ResultWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner()).expect("utf8")
    }

    #[test]
    fn header_appends_fitness_labels() {
        let mut writer = ResultWriter::new(Vec::new());
        writer.write_header(&header()).expect("header");
        let out = text(writer);
        assert!(out.starts_with("ID,Algorithm,Problem,seed.0,"), "{}", out);
        assert!(out.ends_with(",Raw Fitness,Adjusted Fitness,Hits\n"), "{}", out);
    }

    #[test]
    fn row_before_header_is_rejected() {
        let values = crossover_values(1);
        let cfg: EngineConfiguration = AUDIT_COLUMNS.iter().copied().zip(values.clone()).collect();
        let job = record(values);
        let audit = audit_record(&Stored, &cfg, &job, AlgorithmVariant::Crossover).expect("audit");
        let mut writer = ResultWriter::new(Vec::new());
        assert!(matches!(
            writer.write_row(&audit, &job, &summary()),
            Err(OutputError::MissingHeader)
        ));
    }

    #[test]
    fn row_carries_audit_values_then_fitness() {
        let values = crossover_values(4);
        let cfg: EngineConfiguration = AUDIT_COLUMNS.iter().copied().zip(values.clone()).collect();
        let job = record(values.clone());
        let audit = audit_record(&Stored, &cfg, &job, AlgorithmVariant::Crossover).expect("audit");

        let mut writer = ResultWriter::new(Vec::new());
        writer.write_header(&header()).expect("header");
        writer.write_row(&audit, &job, &summary()).expect("row");
        assert_eq!(writer.rows_written(), 1);
        let out = text(writer);
        let row = out.lines().nth(1).expect("data row");
        assert_eq!(row, format!("{},1.5,0.9,3", row_line(&values)));
    }

    #[test]
    fn unknown_columns_echo_input_and_are_quoted() {
        let values = crossover_values(2);
        let cfg: EngineConfiguration = AUDIT_COLUMNS.iter().copied().zip(values.clone()).collect();
        let mut pairs: Vec<(String, String)> = AUDIT_COLUMNS
            .iter()
            .map(|l| l.to_string())
            .zip(values)
            .collect();
        pairs.push(("Note".to_string(), "pilot, \"rerun\"".to_string()));
        let job = JobRecord::from_pairs(1, pairs).expect("record");
        let audit = audit_record(&Stored, &cfg, &job, AlgorithmVariant::Crossover).expect("audit");

        let mut input_header = header();
        input_header.push("Note".to_string());
        let mut writer = ResultWriter::new(Vec::new());
        writer.write_header(&input_header).expect("header");
        writer.write_row(&audit, &job, &summary()).expect("row");
        let out = text(writer);
        let row = out.lines().nth(1).expect("data row");
        assert!(
            row.ends_with(&format!(
                "{},\"pilot, \"\"rerun\"\"\",1.5,0.9,3",
                fields::CROSSOVER_OPERATOR
            )),
            "{}",
            row
        );
    }

    #[test]
    fn file_rows_are_on_disk_before_the_writer_is_dropped() {
        let root = temp_dir("writer_sync");
        let path = root.join("out.csv");
        let values = crossover_values(6);
        let cfg: EngineConfiguration = AUDIT_COLUMNS.iter().copied().zip(values.clone()).collect();
        let job = record(values.clone());
        let audit = audit_record(&Stored, &cfg, &job, AlgorithmVariant::Crossover).expect("audit");

        let mut writer = ResultWriter::create(&path).expect("create");
        writer.write_header(&header()).expect("header");
        writer.write_row(&audit, &job, &summary()).expect("row");
        let on_disk = fs::read_to_string(&path).expect("read back");
        assert_eq!(on_disk.lines().count(), 2);
        assert_eq!(
            on_disk.lines().nth(1),
            Some(format!("{},1.5,0.9,3", row_line(&values)).as_str())
        );
        drop(writer);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn header_is_echoed_verbatim_and_rows_follow_trimmed_labels() {
        let values = crossover_values(3);
        let cfg: EngineConfiguration = AUDIT_COLUMNS.iter().copied().zip(values.clone()).collect();
        let job = record(values.clone());
        let audit = audit_record(&Stored, &cfg, &job, AlgorithmVariant::Crossover).expect("audit");

        let spaced: Vec<String> = AUDIT_COLUMNS.iter().map(|l| format!(" {}", l)).collect();
        let mut writer = ResultWriter::new(Vec::new());
        writer.write_header(&spaced).expect("header");
        writer.write_row(&audit, &job, &summary()).expect("row");
        let out = text(writer);
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some(format!("{},Raw Fitness,Adjusted Fitness,Hits", spaced.join(",")).as_str())
        );
        assert_eq!(lines.next(), Some(format!("{},1.5,0.9,3", row_line(&values)).as_str()));
    }
}
