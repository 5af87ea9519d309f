//! Population management: evaluate, select, reproduce, mutate.
//!
//! Selection is a pluggable [`SelectionPolicy`]. Any policy must be
//! deterministic for a given ranking and must never report more survivors than
//! it was given, so the population never grows from one generation to the next.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::Result;
use crate::fitness;
use crate::genome::{Genome, MatchingGene, NeatConfig};
use crate::innovation::Sequences;
use crate::simulation::{Simulation, SimulationConfig};
use crate::track::Track;

/// Something that turns a genome into a fitness value.
pub trait FitnessEvaluator {
    /// Score `genome`; higher is better.
    ///
    /// # Errors
    ///
    /// Whatever prevented scoring; the generation is aborted.
    fn evaluate(&self, genome: &Genome) -> Result<f64>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&Genome) -> Result<f64>,
{
    fn evaluate(&self, genome: &Genome) -> Result<f64> {
        self(genome)
    }
}

/// Scores a controller genome by driving it around a track.
#[derive(Debug, Clone)]
pub struct CarControlEvaluator {
    track: Arc<Track>,
    config: SimulationConfig,
}

impl CarControlEvaluator {
    /// Create an evaluator for `track`.
    #[must_use]
    pub fn new(track: Arc<Track>, config: SimulationConfig) -> Self {
        Self { track, config }
    }
}

impl FitnessEvaluator for CarControlEvaluator {
    fn evaluate(&self, genome: &Genome) -> Result<f64> {
        let result = Simulation::new(Arc::clone(&self.track), self.config.clone()).run(genome)?;
        let fitness = fitness::score(&result)?;
        info!(
            completion = result.completion,
            ticks = result.operations,
            termination = ?result.termination,
            fitness,
            "evaluated controller"
        );
        Ok(fitness)
    }
}

/// A genome with its fitness.
#[derive(Debug, Clone)]
pub struct Scored {
    /// The genome.
    pub genome: Genome,
    /// Its fitness.
    pub fitness: f64,
}

/// Decides how many of the best-ranked genomes survive.
pub trait SelectionPolicy {
    /// Number of survivors from `ranked` (best first). At most `ranked.len()`.
    fn survivors(&self, ranked: &[Scored]) -> usize;
}

/// Keep the top `ceil((1 - harshness) * n)`, at least one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncationSelection {
    /// Fraction eliminated each generation, in [0, 1].
    pub harshness: f64,
}

impl SelectionPolicy for TruncationSelection {
    fn survivors(&self, ranked: &[Scored]) -> usize {
        let n = ranked.len();
        if n == 0 {
            return 0;
        }
        let keep = ((1.0 - self.harshness.clamp(0.0, 1.0)) * n as f64).ceil() as usize;
        keep.clamp(1, n)
    }
}

/// A population of genomes sharing one set of sequences.
#[derive(Debug)]
pub struct Population {
    members: Vec<Genome>,
    sequences: Arc<Sequences>,
    config: NeatConfig,
    rng: ChaCha8Rng,
    generation: u64,
}

impl Population {
    /// Wrap existing genomes. Each adopts `config` for its mutation rates.
    #[must_use]
    pub fn new(mut members: Vec<Genome>, sequences: Arc<Sequences>, config: NeatConfig, seed: u64) -> Self {
        for genome in &mut members {
            genome.config = config.clone();
        }
        Self {
            members,
            sequences,
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            generation: 0,
        }
    }

    /// `size` fully connected genomes sharing lineage numbers but not weights.
    #[must_use]
    pub fn initial(size: usize, config: NeatConfig, sequences: Arc<Sequences>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let template = Genome::fully_connected(config.clone(), &sequences, &mut rng);
        let members = (0..size)
            .map(|_| {
                let mut genome = template.clone();
                genome.randomize_weights(&mut rng);
                genome
            })
            .collect();

        Self {
            members,
            sequences,
            config,
            rng,
            generation: 0,
        }
    }

    /// Current members.
    #[must_use]
    pub fn members(&self) -> &[Genome] {
        &self.members
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Generations completed.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Score every member and sort best first. Ties keep member order.
    ///
    /// # Errors
    ///
    /// The first evaluation failure.
    pub fn rank<E: FitnessEvaluator + ?Sized>(&self, evaluator: &E) -> Result<Vec<Scored>> {
        let mut ranked = self
            .members
            .iter()
            .map(|genome| {
                let fitness = evaluator.evaluate(genome)?;
                Ok(Scored {
                    genome: genome.clone(),
                    fitness,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        Ok(ranked)
    }

    /// Run one generation and return its champion, or `None` if empty.
    ///
    /// Survivors carry over unchanged; the remaining slots are filled by
    /// crossover of random survivor pairs, each child mutated once.
    ///
    /// # Errors
    ///
    /// The first evaluation failure; the population is left unchanged.
    pub fn step<E, S>(&mut self, evaluator: &E, policy: &S) -> Result<Option<Scored>>
    where
        E: FitnessEvaluator + ?Sized,
        S: SelectionPolicy + ?Sized,
    {
        let ranked = self.rank(evaluator)?;
        let Some(champion) = ranked.first().cloned() else {
            return Ok(None);
        };

        let size = ranked.len();
        let keep = policy.survivors(&ranked).clamp(1, size);
        let survivors = &ranked[..keep];

        let mut next: Vec<Genome> = survivors.iter().map(|s| s.genome.clone()).collect();
        while next.len() < size {
            let a = &survivors[self.rng.random_range(0..keep)];
            let b = &survivors[self.rng.random_range(0..keep)];
            let matching = MatchingGene::from_policy(self.config.crossover, a.fitness, b.fitness);
            let mut child = a.genome.crossover(&b.genome, matching, &mut self.rng);
            child.mutate(&mut self.rng, &self.sequences);
            next.push(child);
        }

        self.members = next;
        self.generation += 1;
        info!(
            generation = self.generation,
            best = champion.fitness,
            survivors = keep,
            size,
            "generation complete"
        );
        Ok(Some(champion))
    }

    /// Evolve until a champion reaches `target_fitness` or `max_generations`
    /// generations have run. Returns the best genome seen.
    ///
    /// # Errors
    ///
    /// The first evaluation failure.
    pub fn run<E, S>(
        &mut self,
        evaluator: &E,
        policy: &S,
        target_fitness: f64,
        max_generations: u64,
    ) -> Result<Option<Scored>>
    where
        E: FitnessEvaluator + ?Sized,
        S: SelectionPolicy + ?Sized,
    {
        let mut best: Option<Scored> = None;

        for _ in 0..max_generations {
            let Some(champion) = self.step(evaluator, policy)? else {
                break;
            };
            if best.as_ref().map_or(true, |b| champion.fitness > b.fitness) {
                debug!(fitness = champion.fitness, "new champion");
                best = Some(champion);
            }
            if best.as_ref().is_some_and(|b| b.fitness >= target_fitness) {
                info!(generation = self.generation, "target fitness reached");
                break;
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::error::FitnessError;

    /// Rewards structure, so the ranking is a pure function of the genome.
    fn by_size(genome: &Genome) -> Result<f64> {
        Ok(genome.num_enabled_connections() as f64 + genome.hidden_ids.len() as f64)
    }

    fn scored(fitness: f64) -> Scored {
        Scored {
            genome: Genome::empty(NeatConfig::default()),
            fitness,
        }
    }

    fn population(size: usize, seed: u64) -> Population {
        Population::initial(size, NeatConfig::minimal(3, 2), Arc::new(Sequences::new()), seed)
    }

    #[test]
    fn test_truncation_selection() {
        let ranked: Vec<Scored> = (0..10).map(|i| scored(f64::from(i))).collect();

        assert_eq!(TruncationSelection { harshness: 0.5 }.survivors(&ranked), 5);
        assert_eq!(TruncationSelection { harshness: 0.75 }.survivors(&ranked), 3);
        assert_eq!(TruncationSelection { harshness: 1.0 }.survivors(&ranked), 1);
        assert_eq!(TruncationSelection { harshness: 0.0 }.survivors(&ranked), 10);
        assert_eq!(TruncationSelection { harshness: 0.5 }.survivors(&[]), 0);
    }

    #[test]
    fn test_initial_population_shares_lineages() {
        let pop = population(4, 7);
        assert_eq!(pop.len(), 4);
        let first: Vec<u64> = pop.members()[0].lineages().collect();
        for genome in pop.members() {
            assert_eq!(genome.lineages().collect::<Vec<_>>(), first);
        }
        assert_ne!(
            pop.members()[0].connections[&0].weight,
            pop.members()[1].connections[&0].weight
        );
    }

    #[test]
    fn test_rank_is_descending_and_stable() {
        let pop = population(3, 1);
        let ranked = pop.rank(&|_: &Genome| -> Result<f64> { Ok(1.0) }).unwrap();
        for (scored, member) in ranked.iter().zip(pop.members()) {
            assert_eq!(scored.genome.connections, member.connections);
        }
    }

    #[test]
    fn test_step_keeps_size() {
        let mut pop = population(10, 3);
        let policy = TruncationSelection { harshness: 0.6 };
        for _ in 0..5 {
            pop.step(&by_size, &policy).unwrap();
            assert_eq!(pop.len(), 10);
        }
        assert_eq!(pop.generation(), 5);
        assert!(pop.members().iter().all(|g| !g.has_cycle()));
    }

    #[test]
    fn test_same_seed_same_population() {
        let policy = TruncationSelection { harshness: 0.5 };
        let mut a = population(8, 11);
        let mut b = population(8, 11);
        for _ in 0..3 {
            a.step(&by_size, &policy).unwrap();
            b.step(&by_size, &policy).unwrap();
        }
        for (x, y) in a.members().iter().zip(b.members()) {
            assert_eq!(x.connections, y.connections);
        }
    }

    #[test]
    fn test_run_stops_at_target() {
        let mut pop = population(6, 5);
        let policy = TruncationSelection { harshness: 0.5 };
        let best = pop.run(&by_size, &policy, 0.0, 50).unwrap().unwrap();
        assert_eq!(pop.generation(), 1);
        assert!(best.fitness >= 6.0);
    }

    #[test]
    fn test_evaluation_error_leaves_population() {
        let mut pop = population(4, 2);
        let before: Vec<_> = pop.members().iter().map(|g| g.connections.clone()).collect();
        let failing =
            |_: &Genome| -> Result<f64> { Err(Error::from(FitnessError::Degenerate { completion: 0.0 })) };

        assert!(pop.step(&failing, &TruncationSelection { harshness: 0.5 }).is_err());
        let after: Vec<_> = pop.members().iter().map(|g| g.connections.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(pop.generation(), 0);
    }

    #[test]
    fn test_empty_population() {
        let mut pop = Population::new(Vec::new(), Arc::new(Sequences::new()), NeatConfig::default(), 0);
        assert!(pop.is_empty());
        let policy = TruncationSelection { harshness: 0.5 };
        assert!(pop.step(&by_size, &policy).unwrap().is_none());
    }
}
