use crate::engine::{FinalState, Individual, KozaFitness};
use crate::error::EngineError;
use serde::Serialize;

pub trait Fitness {
    fn better_than(&self, other: &Self) -> bool;
}

/// Index of the best individual: a single left-to-right scan against a
/// running best, replacing it only on a strictly better fitness, so the
/// first of equally good individuals wins.
pub fn select_best<F: Fitness>(population: &[Individual<F>]) -> Option<usize> {
    let mut best = 0;
    for (idx, individual) in population.iter().enumerate().skip(1) {
        if individual.fitness.better_than(&population[best].fitness) {
            best = idx;
        }
    }
    (!population.is_empty()).then_some(best)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FitnessSummary {
    pub raw_fitness: f32,
    pub adjusted_fitness: f32,
    pub hits: u32,
}

impl FitnessSummary {
    pub fn fields(&self) -> [String; 3] {
        [
            self.raw_fitness.to_string(),
            self.adjusted_fitness.to_string(),
            self.hits.to_string(),
        ]
    }
}

impl From<KozaFitness> for FitnessSummary {
    fn from(f: KozaFitness) -> Self {
        Self {
            raw_fitness: f.raw,
            adjusted_fitness: f.adjusted,
            hits: f.hits,
        }
    }
}

pub fn summarize(state: &FinalState) -> Result<FitnessSummary, EngineError> {
    let best = select_best(&state.population).ok_or(EngineError::EmptyPopulation)?;
    Ok(state.population[best].fitness.into())
}
