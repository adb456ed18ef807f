//! Audit rows come from engine readback, never from the validated input.
//! Fields that do not apply to the variant implied by the read-back
//! operator are masked to the marker even when the engine reports a value.

use crate::engine::Engine;
use crate::error::EngineError;
use crate::fields::{self, AlgorithmVariant, AUDIT_COLUMNS, NOT_APPLICABLE};
use crate::params::EngineConfiguration;
use crate::reader::JobRecord;
use crate::schema;
use std::collections::BTreeMap;
use tracing::debug;

pub fn algorithm_from_operator(operator: &str) -> Result<AlgorithmVariant, EngineError> {
    AlgorithmVariant::from_operator(operator).ok_or_else(|| EngineError::UnrecognizedOperator {
        operator: operator.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    values: BTreeMap<&'static str, String>,
}

impl AuditRecord {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.values.get(label).map(String::as_str)
    }

    pub fn algorithm(&self) -> Option<AlgorithmVariant> {
        self.get(fields::ALGORITHM).and_then(AlgorithmVariant::from_code)
    }

    pub fn to_row(&self) -> Vec<&str> {
        AUDIT_COLUMNS
            .iter()
            .map(|l| self.get(l).unwrap_or(NOT_APPLICABLE))
            .collect()
    }

    fn blank(record: &JobRecord, variant: AlgorithmVariant) -> Self {
        let mut values: BTreeMap<&'static str, String> = AUDIT_COLUMNS
            .iter()
            .map(|l| (*l, NOT_APPLICABLE.to_string()))
            .collect();
        values.insert(fields::ID, record.id().to_string());
        values.insert(fields::ALGORITHM, variant.code().to_string());
        values.insert(fields::PROBLEM, record.problem().trim().to_string());
        Self { values }
    }
}

pub fn audit_record(
    engine: &dyn Engine,
    config: &EngineConfiguration,
    record: &JobRecord,
    requested: AlgorithmVariant,
) -> Result<AuditRecord, EngineError> {
    let read = |key: &str| {
        engine
            .readback(config, key)
            .ok_or_else(|| EngineError::MissingReadback {
                key: key.to_string(),
            })
    };

    if requested == AlgorithmVariant::Defaults {
        let mut audit = AuditRecord::blank(record, requested);
        audit.values.insert(fields::SEED, read(fields::SEED)?);
        return Ok(audit);
    }

    let operator = read(fields::OPERATOR)?;
    let detected = algorithm_from_operator(&operator)?;
    if detected != requested {
        debug!(
            row = record.row(),
            requested = %requested,
            detected = %detected,
            "engine applied a different operator than requested"
        );
    }

    let mut audit = AuditRecord::blank(record, detected);
    audit.values.insert(fields::SEED, read(fields::SEED)?);
    for rule in &schema::SCHEMA {
        if rule.label == fields::OPERATOR {
            continue;
        }
        if rule.applies(detected) {
            audit.values.insert(rule.label, read(rule.label)?);
        }
    }
    audit.values.insert(fields::OPERATOR, operator);
    Ok(audit)
}
