use crate::error::{ValidationError, Violation};
use crate::fields::{self, is_not_applicable, AlgorithmVariant};
use crate::params::EngineConfiguration;
use crate::reader::JobRecord;
use std::collections::BTreeMap;

use crate::fields::AlgorithmVariant::{Crossover, Mutation};

pub const DEFAULT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Probability,
    Integer { min: i64 },
    Operator,
}

impl Domain {
    fn describe(&self) -> String {
        match self {
            Domain::Probability => "[0, 1]".to_string(),
            Domain::Integer { min } => format!("integer >= {}", min),
            Domain::Operator => "operator name".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub label: &'static str,
    pub domain: Domain,
    pub applies_to: &'static [AlgorithmVariant],
}

impl FieldRule {
    pub fn applies(&self, variant: AlgorithmVariant) -> bool {
        self.applies_to.contains(&variant)
    }
}

const TREE: &[AlgorithmVariant] = &[Crossover, Mutation];
const CROSSOVER_ONLY: &[AlgorithmVariant] = &[Crossover];
const MUTATION_ONLY: &[AlgorithmVariant] = &[Mutation];

const fn rule(
    label: &'static str,
    domain: Domain,
    applies_to: &'static [AlgorithmVariant],
) -> FieldRule {
    FieldRule {
        label,
        domain,
        applies_to,
    }
}

const DEPTH: Domain = Domain::Integer { min: 1 };

pub const SCHEMA: [FieldRule; 16] = [
    rule(fields::HALF_GROW_PROB, Domain::Probability, TREE),
    rule(fields::HALF_MAX_DEPTH, DEPTH, TREE),
    rule(fields::HALF_MIN_DEPTH, DEPTH, TREE),
    rule(fields::ROOT_PROB, Domain::Probability, TREE),
    rule(fields::TERMINAL_PROB, Domain::Probability, TREE),
    rule(fields::NONTERMINAL_PROB, Domain::Probability, TREE),
    rule(fields::POP_SIZE, Domain::Integer { min: 1 }, TREE),
    rule(fields::OP_PROB, Domain::Probability, TREE),
    rule(fields::REPRO_PROB, Domain::Probability, TREE),
    rule(fields::TOURNAMENT_SIZE, Domain::Integer { min: 1 }, TREE),
    rule(fields::GENERATIONS, Domain::Integer { min: 1 }, TREE),
    rule(fields::XOVER_MAX_DEPTH, DEPTH, CROSSOVER_ONLY),
    rule(fields::MUTATE_MAX_DEPTH, DEPTH, MUTATION_ONLY),
    rule(fields::GROW_MIN_DEPTH, DEPTH, MUTATION_ONLY),
    rule(fields::GROW_MAX_DEPTH, DEPTH, MUTATION_ONLY),
    rule(fields::OPERATOR, Domain::Operator, TREE),
];

pub fn rule_for(label: &str) -> Option<&'static FieldRule> {
    SCHEMA.iter().find(|r| r.label == label)
}

#[derive(Debug, Clone, Copy)]
enum Invariant {
    AtMost {
        field: &'static str,
        bound: &'static str,
    },
    SumAtMostOne {
        field: &'static str,
        terms: &'static [&'static str],
    },
    SumToOne {
        field: &'static str,
        terms: &'static [&'static str],
    },
    Equal {
        field: &'static str,
        other: &'static str,
    },
}

impl Invariant {
    fn field(&self) -> &'static str {
        match *self {
            Invariant::AtMost { field, .. }
            | Invariant::SumAtMostOne { field, .. }
            | Invariant::SumToOne { field, .. }
            | Invariant::Equal { field, .. } => field,
        }
    }
}

// Each invariant runs right after its `field` passes its domain check; the
// other terms sit earlier in SCHEMA.
const INVARIANTS: [(Invariant, &[AlgorithmVariant]); 5] = [
    (
        Invariant::AtMost {
            field: fields::HALF_MIN_DEPTH,
            bound: fields::HALF_MAX_DEPTH,
        },
        TREE,
    ),
    (
        Invariant::SumAtMostOne {
            field: fields::TERMINAL_PROB,
            terms: &[fields::TERMINAL_PROB, fields::ROOT_PROB],
        },
        TREE,
    ),
    (
        Invariant::SumToOne {
            field: fields::NONTERMINAL_PROB,
            terms: &[
                fields::NONTERMINAL_PROB,
                fields::TERMINAL_PROB,
                fields::ROOT_PROB,
            ],
        },
        TREE,
    ),
    (
        Invariant::SumToOne {
            field: fields::REPRO_PROB,
            terms: &[fields::REPRO_PROB, fields::OP_PROB],
        },
        TREE,
    ),
    // Mutation only grows subtrees to one fixed depth.
    (
        Invariant::Equal {
            field: fields::GROW_MAX_DEPTH,
            other: fields::GROW_MIN_DEPTH,
        },
        MUTATION_ONLY,
    ),
];

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Probability(f64),
    Integer(i64),
    Operator(String),
}

impl ParamValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Probability(p) => Some(*p),
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Operator(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParam {
    pub text: String,
    pub value: ParamValue,
}

#[derive(Debug, Clone)]
pub struct ParameterSet {
    variant: AlgorithmVariant,
    problem: String,
    seed: String,
    values: BTreeMap<&'static str, ResolvedParam>,
}

impl ParameterSet {
    pub fn variant(&self) -> AlgorithmVariant {
        self.variant
    }

    pub fn problem(&self) -> &str {
        &self.problem
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn get(&self, label: &str) -> Option<&ResolvedParam> {
        self.values.get(label)
    }

    pub fn probability(&self, label: &str) -> Option<f64> {
        match self.get(label)?.value {
            ParamValue::Probability(p) => Some(p),
            _ => None,
        }
    }

    pub fn integer(&self, label: &str) -> Option<i64> {
        match self.get(label)?.value {
            ParamValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<&str> {
        match &self.get(fields::OPERATOR)?.value {
            ParamValue::Operator(name) => Some(name),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ResolvedParam)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn apply_to(&self, config: &mut EngineConfiguration, quiet: &QuietLevel) {
        config.set(quiet.key.as_str(), quiet.level.as_str());
        config.set(fields::SEED, self.seed.as_str());
        for (label, param) in &self.values {
            config.set(*label, param.text.as_str());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuietLevel {
    pub key: String,
    pub level: String,
}

impl Default for QuietLevel {
    fn default() -> Self {
        Self {
            key: "verbosity".to_string(),
            level: "2000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Validator {
    tolerance: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl Validator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn validate(&self, record: &JobRecord) -> Result<ParameterSet, ValidationError> {
        let fail = |field: &str, value: &str, violation: Violation| ValidationError {
            row: record.row(),
            field: field.to_string(),
            value: value.to_string(),
            violation,
        };

        let algorithm = record.algorithm();
        let variant = AlgorithmVariant::from_code(algorithm)
            .ok_or_else(|| fail(fields::ALGORITHM, algorithm, Violation::UnknownAlgorithm))?;

        let problem = record.problem().trim();
        if !is_plain_name(problem) {
            return Err(fail(fields::PROBLEM, problem, Violation::BadProblem));
        }

        let seed = record.get(fields::SEED).unwrap_or_default().trim();
        if seed.is_empty() || is_not_applicable(seed) {
            return Err(fail(fields::SEED, seed, Violation::Missing { variant }));
        }

        let mut values = BTreeMap::new();
        for rule in &SCHEMA {
            let raw = record.get(rule.label).unwrap_or_default();
            let text = raw.trim();
            if !rule.applies(variant) {
                if !is_not_applicable(text) {
                    return Err(fail(rule.label, raw, Violation::NotApplicable { variant }));
                }
                continue;
            }
            if is_not_applicable(text) {
                return Err(fail(rule.label, raw, Violation::Missing { variant }));
            }
            let value = check_domain(rule.domain, variant, text)
                .map_err(|violation| fail(rule.label, raw, violation))?;
            values.insert(
                rule.label,
                ResolvedParam {
                    text: text.to_string(),
                    value,
                },
            );

            for (invariant, applies_to) in &INVARIANTS {
                if invariant.field() == rule.label && applies_to.contains(&variant) {
                    self.check_invariant(*invariant, &values)
                        .map_err(|reason| fail(rule.label, raw, Violation::Constraint(reason)))?;
                }
            }
        }

        Ok(ParameterSet {
            variant,
            problem: problem.to_string(),
            seed: seed.to_string(),
            values,
        })
    }

    fn check_invariant(
        &self,
        invariant: Invariant,
        values: &BTreeMap<&'static str, ResolvedParam>,
    ) -> Result<(), String> {
        let num = |label: &str| values.get(label).and_then(|p| p.value.as_f64()).unwrap_or(0.0);
        let sum = |terms: &[&str]| terms.iter().map(|t| num(*t)).sum::<f64>();
        match invariant {
            Invariant::AtMost { field, bound } => {
                if num(field) > num(bound) {
                    return Err(format!("must not exceed {}", bound));
                }
            }
            Invariant::SumAtMostOne { terms, .. } => {
                let total = sum(terms);
                if total > 1.0 + self.tolerance {
                    return Err(format!("{} sum to {}, above 1", terms.join(" + "), total));
                }
            }
            Invariant::SumToOne { terms, .. } => {
                let total = sum(terms);
                if (total - 1.0).abs() > self.tolerance {
                    return Err(format!("{} sum to {}, not 1", terms.join(" + "), total));
                }
            }
            Invariant::Equal { field, other } => {
                if num(field) != num(other) {
                    return Err(format!("must equal {}", other));
                }
            }
        }
        Ok(())
    }
}

fn check_domain(
    domain: Domain,
    variant: AlgorithmVariant,
    text: &str,
) -> Result<ParamValue, Violation> {
    match domain {
        Domain::Probability => {
            let p = text.parse::<f64>().map_err(|_| Violation::Unparseable {
                expected: "probability",
            })?;
            if !(0.0..=1.0).contains(&p) {
                return Err(Violation::OutOfDomain {
                    domain: domain.describe(),
                });
            }
            Ok(ParamValue::Probability(p))
        }
        Domain::Integer { min } => {
            let i = text.parse::<i64>().map_err(|_| Violation::Unparseable {
                expected: "integer",
            })?;
            if i < min {
                return Err(Violation::OutOfDomain {
                    domain: domain.describe(),
                });
            }
            Ok(ParamValue::Integer(i))
        }
        Domain::Operator => match variant.operator_name() {
            Some(expected) if text == expected => Ok(ParamValue::Operator(text.to_string())),
            Some(expected) => Err(Violation::WrongOperator { expected }),
            None => Err(Violation::NotApplicable { variant }),
        },
    }
}

fn is_plain_name(problem: &str) -> bool {
    !problem.is_empty()
        && problem != "."
        && problem != ".."
        && !problem.contains(['/', '\\'])
        && !problem.contains("..")
}
