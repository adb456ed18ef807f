use serde::Serialize;
use std::fmt;

pub const NOT_APPLICABLE: &str = "NaN";

pub const ID: &str = "ID";
pub const ALGORITHM: &str = "Algorithm";
pub const PROBLEM: &str = "Problem";
pub const SEED: &str = "seed.0";
pub const HALF_GROW_PROB: &str = "gp.koza.half.growp";
pub const HALF_MAX_DEPTH: &str = "gp.koza.half.max-depth";
pub const HALF_MIN_DEPTH: &str = "gp.koza.half.min-depth";
pub const ROOT_PROB: &str = "gp.koza.ns.root";
pub const TERMINAL_PROB: &str = "gp.koza.ns.terminals";
pub const XOVER_MAX_DEPTH: &str = "gp.koza.xover.maxdepth";
pub const MUTATE_MAX_DEPTH: &str = "gp.koza.mutate.maxdepth";
pub const POP_SIZE: &str = "pop.subpop.0.size";
pub const OP_PROB: &str = "pop.subpop.0.species.pipe.source.0.prob";
pub const TOURNAMENT_SIZE: &str = "select.tournament.size";
pub const GROW_MIN_DEPTH: &str = "gp.koza.grow.min-depth";
pub const GROW_MAX_DEPTH: &str = "gp.koza.grow.max-depth";
pub const GENERATIONS: &str = "generations";
pub const NONTERMINAL_PROB: &str = "gp.koza.ns.nonterminals";
pub const REPRO_PROB: &str = "pop.subpop.0.species.pipe.source.1.prob";
pub const OPERATOR: &str = "pop.subpop.0.species.pipe.source.0";

pub const CROSSOVER_OPERATOR: &str = "ec.gp.koza.CrossoverPipeline";
pub const MUTATION_OPERATOR: &str = "ec.gp.koza.MutationPipeline";

pub const RESULT_LABELS: [&str; 3] = ["Raw Fitness", "Adjusted Fitness", "Hits"];

pub const AUDIT_COLUMNS: [&str; 20] = [
    ID,
    ALGORITHM,
    PROBLEM,
    SEED,
    HALF_GROW_PROB,
    HALF_MAX_DEPTH,
    HALF_MIN_DEPTH,
    ROOT_PROB,
    TERMINAL_PROB,
    XOVER_MAX_DEPTH,
    MUTATE_MAX_DEPTH,
    POP_SIZE,
    OP_PROB,
    TOURNAMENT_SIZE,
    GROW_MIN_DEPTH,
    GROW_MAX_DEPTH,
    GENERATIONS,
    NONTERMINAL_PROB,
    REPRO_PROB,
    OPERATOR,
];

/// Lookup key for a raw header cell: surrounding spaces and a leading byte
/// order mark are not part of the label.
pub fn header_label(cell: &str) -> &str {
    cell.trim_start_matches('\u{feff}').trim()
}

pub fn is_not_applicable(value: &str) -> bool {
    value.trim() == NOT_APPLICABLE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmVariant {
    Crossover,
    Mutation,
    Defaults,
}

impl AlgorithmVariant {
    pub const ALL: [AlgorithmVariant; 3] = [
        AlgorithmVariant::Crossover,
        AlgorithmVariant::Mutation,
        AlgorithmVariant::Defaults,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "C" => Some(AlgorithmVariant::Crossover),
            "M" => Some(AlgorithmVariant::Mutation),
            "D" => Some(AlgorithmVariant::Defaults),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            AlgorithmVariant::Crossover => "C",
            AlgorithmVariant::Mutation => "M",
            AlgorithmVariant::Defaults => "D",
        }
    }

    pub fn operator_name(self) -> Option<&'static str> {
        match self {
            AlgorithmVariant::Crossover => Some(CROSSOVER_OPERATOR),
            AlgorithmVariant::Mutation => Some(MUTATION_OPERATOR),
            AlgorithmVariant::Defaults => None,
        }
    }

    pub fn from_operator(operator: &str) -> Option<Self> {
        match operator.trim() {
            CROSSOVER_OPERATOR => Some(AlgorithmVariant::Crossover),
            MUTATION_OPERATOR => Some(AlgorithmVariant::Mutation),
            NOT_APPLICABLE => Some(AlgorithmVariant::Defaults),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmVariant::Crossover => "crossover",
            AlgorithmVariant::Mutation => "mutation",
            AlgorithmVariant::Defaults => "defaults",
        }
    }
}

impl fmt::Display for AlgorithmVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
