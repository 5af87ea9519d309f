//! # NEAT Drive
//!
//! `NeuroEvolution` of Augmenting Topologies for car controllers. Genomes grow
//! structure through add-connection and add-node mutations, recombine by
//! lineage-aligned crossover, and are scored by driving a simulated car with
//! eight ray sensors around a track of boundary segments.
//!
//! ## Features
//!
//! - **Lineage Alignment**: Node ids and connection lineage numbers come from a
//!   shared [`Sequences`] allocator, so equal lineage numbers in two genomes
//!   denote the same historical change and crossover is a linear merge
//! - **Arena-Graph Model**: `SlotMap` storage for nodes, lineage-ordered
//!   `BTreeMap` for connections
//! - **Threaded Simulation**: clock, controller and render tasks share one car
//!   through per-field atomics, with cooperative pause, resume and stop
//! - **Text Persistence**: line-oriented genome and track formats
//!
//! ## Quick Start
//!
//! ```rust
//! use neat_drive::{FeedForward, Genome, NeatConfig, Sequences};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let seq = Sequences::new();
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//!
//! // 8 sensor inputs, 5 control outputs, every input wired to every output
//! let mut genome = Genome::fully_connected(NeatConfig::default(), &seq, &mut rng);
//! let first = genome.lineages().next().unwrap();
//! genome.add_node(first, &seq).unwrap();
//!
//! let mut net = FeedForward::new(&genome);
//! let controls = net.compute(&[0.5; 8]);
//! assert_eq!(controls.len(), 5);
//! ```
//!
//! ## Driving a Controller
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neat_drive::{codec, fitness, Sequences, Simulation, SimulationConfig};
//!
//! let seq = Sequences::new();
//! let track = Arc::new(codec::read_track("tracks/oval.txt")?);
//! let genome = codec::read_genome("population/best.txt", &seq)?;
//!
//! let result = Simulation::new(track, SimulationConfig::default()).run(&genome)?;
//! println!("fitness {}", fitness::score(&result)?);
//! # Ok::<(), neat_drive::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ### Crossover by Lineage
//!
//! Both parents' connections are walked in ascending lineage order. Matching
//! genes are picked per [`CrossoverPolicy`]; disjoint and excess genes are
//! inherited from whichever parent has them. Merging two acyclic genomes can
//! close a cycle, in which case the newest closing genes are disabled.
//!
//! ### Forward Pass
//!
//! [`FeedForward`] pushes values from the inputs. A node settles at the mean of
//! its `weight * value + bias` contributions once it has heard from every
//! enabled incoming connection, then pushes downstream in turn.

pub mod car;
pub mod codec;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fitness;
pub mod gene;
pub mod genome;
pub mod geometry;
pub mod innovation;
pub mod population;
pub mod sensor;
pub mod simulation;
pub mod topology;
pub mod track;

// Re-exports for convenience
pub use car::{Car, CarView, Controls};
pub use config::{DriveConfig, EvolutionConfig};
pub use error::{
    ConfigError, DecodeError, Error, FitnessError, Result, SimulationError, StructuralError,
};
pub use evaluator::{EvaluatorError, FeedForward};
pub use gene::{ConnectionGene, ConnectionSpec, NodeGene, NodeId, NodeKind, NodeRef};
pub use genome::{CrossoverPolicy, Genome, MatchingGene, NeatConfig};
pub use geometry::{OrientedRect, Point, Segment};
pub use innovation::Sequences;
pub use population::{
    CarControlEvaluator, FitnessEvaluator, Population, Scored, SelectionPolicy,
    TruncationSelection,
};
pub use simulation::{
    PauseGate, RenderHook, Simulation, SimulationConfig, SimulationHandle, SimulationResult,
    Termination,
};
pub use topology::GraphTopology;
pub use track::Track;
