use crate::fields::{self, AUDIT_COLUMNS, NOT_APPLICABLE};
use crate::reader::JobRecord;
use std::path::PathBuf;

const NAN: &str = NOT_APPLICABLE;

fn values(cells: [&str; 20]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

pub(crate) fn crossover_values(id: i64) -> Vec<String> {
    let id = id.to_string();
    values([
        id.as_str(),
        "C",
        "1",
        "4242",
        "0.5",
        "6",
        "2",
        "0.1",
        "0.4",
        "17",
        NAN,
        "500",
        "0.9",
        "7",
        NAN,
        NAN,
        "50",
        "0.5",
        "0.1",
        fields::CROSSOVER_OPERATOR,
    ])
}

pub(crate) fn mutation_values(id: i64) -> Vec<String> {
    let id = id.to_string();
    values([
        id.as_str(),
        "M",
        "2",
        "99",
        "0.5",
        "6",
        "2",
        "0.1",
        "0.4",
        NAN,
        "17",
        "500",
        "0.9",
        "7",
        "4",
        "4",
        "50",
        "0.5",
        "0.1",
        fields::MUTATION_OPERATOR,
    ])
}

pub(crate) fn defaults_values(id: i64) -> Vec<String> {
    let id = id.to_string();
    let mut cells = [NAN; 20];
    cells[0] = id.as_str();
    cells[1] = "D";
    cells[2] = "3";
    cells[3] = "7";
    values(cells)
}

pub(crate) fn with(mut values: Vec<String>, label: &str, value: &str) -> Vec<String> {
    let idx = AUDIT_COLUMNS
        .iter()
        .position(|l| *l == label)
        .expect("known label");
    values[idx] = value.to_string();
    values
}

pub(crate) fn record(values: Vec<String>) -> JobRecord {
    JobRecord::from_pairs(1, AUDIT_COLUMNS.iter().copied().zip(values)).expect("record")
}

pub(crate) fn row_line(values: &[String]) -> String {
    values.join(",")
}

pub(crate) fn batch_text(rows: &[Vec<String>]) -> String {
    let mut text = AUDIT_COLUMNS.join(",");
    text.push('\n');
    for row in rows {
        text.push_str(&row_line(row));
        text.push('\n');
    }
    text
}

pub(crate) fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sweep_{}_test_{}_{}",
        tag,
        std::process::id(),
        chrono::Utc::now().timestamp_micros()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}
