//! Fitness scoring.

use crate::error::FitnessError;
use crate::simulation::SimulationResult;

/// `completion² / operations`.
///
/// Squaring rewards distance covered over speed alone; dividing by ticks
/// penalizes slow paths to the same completion.
///
/// # Errors
///
/// [`FitnessError::Degenerate`] if no tick elapsed.
pub fn score(result: &SimulationResult) -> Result<f64, FitnessError> {
    fitness(result.completion, result.operations)
}

/// [`score`] on raw values.
///
/// # Errors
///
/// [`FitnessError::Degenerate`] if `operations` is 0.
pub fn fitness(completion: f64, operations: u64) -> Result<f64, FitnessError> {
    if operations == 0 {
        return Err(FitnessError::Degenerate { completion });
    }
    Ok(completion * completion / operations as f64)
}
