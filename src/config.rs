//! Run configuration loaded from TOML.
//!
//! Every section defaults independently, so a file only needs the keys it
//! changes:
//!
//! ```toml
//! [evolution]
//! population_size = 50
//! harshness = 0.6
//!
//! [simulation]
//! max_ticks = 5000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::genome::NeatConfig;
use crate::simulation::SimulationConfig;

/// Population-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Genomes per generation when starting from scratch.
    pub population_size: usize,
    /// Fraction of each generation eliminated, in [0, 1).
    pub harshness: f64,
    /// Stop once a champion reaches this fitness.
    pub target_fitness: f64,
    /// Upper bound on generations.
    pub max_generations: u64,
    /// Seed for selection, crossover and mutation.
    pub seed: u64,
    /// Track file, if not given on the command line.
    pub map: Option<PathBuf>,
    /// Directory of saved genomes to start from.
    pub population_dir: Option<PathBuf>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            harshness: 0.5,
            target_fitness: 0.004,
            max_generations: 100,
            seed: 42,
            map: None,
            population_dir: None,
        }
    }
}

/// Everything a run needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Genome shape and mutation rates.
    pub neat: NeatConfig,
    /// Car simulation timing and start pose.
    pub simulation: SimulationConfig,
    /// Population settings.
    pub evolution: EvolutionConfig,
}

impl DriveConfig {
    /// Read and validate a TOML file.
    ///
    /// # Errors
    ///
    /// I/O, parse, or validation failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot drive a run.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let neat = &self.neat;
        for (key, value) in [
            ("neat.add_connection_prob", neat.add_connection_prob),
            ("neat.add_node_prob", neat.add_node_prob),
            ("neat.weight_mutation_prob", neat.weight_mutation_prob),
            ("neat.weight_replace_prob", neat.weight_replace_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{key} must be in [0, 1], got {value}")));
            }
        }
        if !(neat.weight_range.is_finite() && neat.weight_range > 0.0) {
            return Err(invalid(format!("neat.weight_range must be positive, got {}", neat.weight_range)));
        }
        if neat.weight_mutation_power < 0.0 {
            return Err(invalid("neat.weight_mutation_power must not be negative"));
        }

        let sim = &self.simulation;
        if !(sim.objective_distance.is_finite() && sim.objective_distance > 0.0) {
            return Err(invalid("simulation.objective_distance must be positive"));
        }
        if !(sim.sensor_scale.is_finite() && sim.sensor_scale > 0.0) {
            return Err(invalid("simulation.sensor_scale must be positive"));
        }

        let evo = &self.evolution;
        if !(0.0..1.0).contains(&evo.harshness) {
            return Err(invalid(format!("evolution.harshness must be in [0, 1), got {}", evo.harshness)));
        }
        if evo.population_size == 0 {
            return Err(invalid("evolution.population_size must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_defaults() {
        let config: DriveConfig = toml::from_str("").unwrap();
        assert_eq!(config, DriveConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.neat.num_inputs, 8);
        assert_eq!(config.neat.num_outputs, 5);
        assert_eq!(config.simulation.tick_interval_ms, 10);
    }

    #[test]
    fn test_partial_sections_override() {
        let config: DriveConfig = toml::from_str(
            r#"
            [evolution]
            population_size = 12
            harshness = 0.75
            map = "tracks/oval.txt"

            [neat]
            crossover = "fitness_weighted"
            "#,
        )
        .unwrap();

        assert_eq!(config.evolution.population_size, 12);
        assert_eq!(config.evolution.harshness, 0.75);
        assert_eq!(config.evolution.map, Some(PathBuf::from("tracks/oval.txt")));
        assert_eq!(config.evolution.seed, EvolutionConfig::default().seed);
        assert_eq!(config.neat.crossover, crate::genome::CrossoverPolicy::FitnessWeighted);
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DriveConfig::default();
        config.evolution.harshness = 1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DriveConfig::default();
        config.neat.add_node_prob = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(m)) if m.contains("add_node_prob")));

        let mut config = DriveConfig::default();
        config.evolution.population_size = 0;
        assert!(config.validate().is_err());

        let mut config = DriveConfig::default();
        config.simulation.objective_distance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = std::env::temp_dir().join(format!("neat-drive-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.toml");
        assert!(matches!(DriveConfig::load(&missing), Err(ConfigError::Io { path, .. }) if path == missing));

        let broken = dir.join("broken.toml");
        std::fs::write(&broken, "[evolution\nharshness = ").unwrap();
        assert!(matches!(DriveConfig::load(&broken), Err(ConfigError::Parse { .. })));

        let good = dir.join("good.toml");
        std::fs::write(&good, "[evolution]\nseed = 9\n").unwrap();
        assert_eq!(DriveConfig::load(&good).unwrap().evolution.seed, 9);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
