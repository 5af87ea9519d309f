use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neat_drive::{
    codec, fitness, CarControlEvaluator, DriveConfig, Population, Sequences, Simulation,
    TruncationSelection,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evolve controllers on a track and save the champion.
    Evolve {
        /// TOML run configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of saved genomes to start from.
        #[arg(short, long)]
        population: Option<PathBuf>,

        /// Track file.
        #[arg(short, long)]
        map: Option<PathBuf>,

        /// Where to write the champion.
        #[arg(short, long, default_value = "champion.txt")]
        out: PathBuf,
    },

    /// Drive one saved controller and report its fitness.
    Simulate {
        /// Track file.
        #[arg(short, long)]
        map: PathBuf,

        /// Genome file.
        #[arg(short, long)]
        genome: PathBuf,

        /// TOML run configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Decode a genome file and print it back.
    Check {
        /// Genome file.
        #[arg(short, long)]
        genome: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "neat_drive=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Args::parse().command {
        Command::Evolve {
            config,
            population,
            map,
            out,
        } => evolve(config, population, map, out),
        Command::Simulate {
            map,
            genome,
            config,
        } => simulate(map, genome, config),
        Command::Check { genome } => check(genome),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<DriveConfig> {
    match path {
        Some(path) => DriveConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(DriveConfig::default()),
    }
}

fn evolve(
    config: Option<PathBuf>,
    population_dir: Option<PathBuf>,
    map: Option<PathBuf>,
    out: PathBuf,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let evo = &config.evolution;

    let Some(map) = map.or_else(|| evo.map.clone()) else {
        bail!("no track given: pass --map or set evolution.map");
    };
    let track = Arc::new(
        codec::read_track(&map).with_context(|| format!("reading track {}", map.display()))?,
    );
    if track.is_empty() {
        warn!(path = %map.display(), "track has no boundaries; nothing can crash");
    }

    let sequences = Arc::new(Sequences::new());
    let mut population = match population_dir.or_else(|| evo.population_dir.clone()) {
        Some(dir) => {
            let loaded = codec::load_population_dir(&dir, &sequences)
                .with_context(|| format!("loading population from {}", dir.display()))?;
            if loaded.genomes.is_empty() {
                bail!("no readable genomes in {}", dir.display());
            }
            info!(
                loaded = loaded.genomes.len(),
                skipped = loaded.skipped.len(),
                "loaded population"
            );
            Population::new(
                loaded.genomes,
                Arc::clone(&sequences),
                config.neat.clone(),
                evo.seed,
            )
        }
        None => Population::initial(
            evo.population_size,
            config.neat.clone(),
            Arc::clone(&sequences),
            evo.seed,
        ),
    };

    let evaluator = CarControlEvaluator::new(track, config.simulation.clone());
    let policy = TruncationSelection {
        harshness: evo.harshness,
    };
    let Some(champion) = population
        .run(&evaluator, &policy, evo.target_fitness, evo.max_generations)
        .context("evolving population")?
    else {
        bail!("population produced no champion");
    };

    codec::write_genome(&out, &champion.genome)
        .with_context(|| format!("writing champion to {}", out.display()))?;
    println!(
        "champion fitness {:.6} after {} generations, saved to {}",
        champion.fitness,
        population.generation(),
        out.display()
    );
    Ok(())
}

fn simulate(map: PathBuf, genome: PathBuf, config: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let track =
        codec::read_track(&map).with_context(|| format!("reading track {}", map.display()))?;
    let genome = codec::read_genome(&genome, &Sequences::new())
        .with_context(|| format!("reading genome {}", genome.display()))?;

    let result = Simulation::new(Arc::new(track), config.simulation)
        .run(&genome)
        .context("running simulation")?;
    let score = fitness::score(&result).context("scoring run")?;

    println!(
        "{:?} after {} ticks, completion {:.3}, fitness {:.6}",
        result.termination, result.operations, result.completion, score
    );
    Ok(())
}

fn check(path: PathBuf) -> anyhow::Result<()> {
    let genome = codec::read_genome(&path, &Sequences::new())
        .with_context(|| format!("reading genome {}", path.display()))?;
    print!("{}", codec::encode_genome(&genome));
    Ok(())
}
