//! Error types for neat-drive.
//!
//! Genome and operator errors are raised synchronously at the call site.
//! Simulation task errors are collected when the tasks are joined and surfaced
//! to the caller once every task has exited.

use std::path::PathBuf;

use thiserror::Error;

use crate::gene::NodeRef;

/// A structural operator was invoked with something the genome does not own,
/// or with an edge that would break the genome's invariants.
///
/// The genome is left unmodified whenever one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    /// An endpoint of a requested connection is not in this genome.
    #[error("node {0} is not in the genome")]
    UnknownNode(NodeRef),

    /// The connection to split is not registered in this genome.
    #[error("connection {0} is not in the genome")]
    UnknownConnection(u64),

    /// The connection to split has already been disabled.
    #[error("connection {0} is disabled")]
    ConnectionDisabled(u64),

    /// Inputs take no incoming edges and outputs emit no outgoing edges.
    #[error("cannot connect {from} -> {to}: edge direction violates node kinds")]
    InvalidDirection {
        /// Source endpoint.
        from: NodeRef,
        /// Target endpoint.
        to: NodeRef,
    },

    /// The edge would close a cycle among enabled connections.
    #[error("connecting {from} -> {to} would create a cycle")]
    WouldCreateCycle {
        /// Source endpoint.
        from: NodeRef,
        /// Target endpoint.
        to: NodeRef,
    },
}

/// A persisted line failed to parse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The text ended before all three node header lines were read.
    #[error("missing node header line {0}")]
    MissingHeader(usize),

    /// A node identifier was not a kind tag followed by a hex id.
    #[error("line {line}: malformed node identifier '{text}'")]
    MalformedNode {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// A node appeared in the header line of another kind.
    #[error("line {line}: node '{text}' does not belong in this header")]
    MisplacedNode {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// A connection line did not match `lineage:\tsrc->weight+bias->dst`.
    #[error("line {line}: malformed connection entry '{text}'")]
    MalformedConnection {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// A connection ran into an input or out of an output.
    #[error("line {line}: edge '{text}' runs into an input or out of an output")]
    MisdirectedEdge {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },

    /// A track line did not match `(x1, y1)->(x2, y2)`.
    #[error("line {line}: malformed track edge '{text}'")]
    MalformedEdge {
        /// 1-based line number.
        line: usize,
        /// Offending text.
        text: String,
    },
}

/// Failures of a simulation run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The controller genome does not have 8 inputs and 5 outputs.
    #[error("controller needs {expected_inputs} inputs and {expected_outputs} outputs, genome has {inputs} and {outputs}")]
    InvalidController {
        /// Input nodes present.
        inputs: usize,
        /// Output nodes present.
        outputs: usize,
        /// Required input count.
        expected_inputs: usize,
        /// Required output count.
        expected_outputs: usize,
    },

    /// The controller genome has a cycle among its enabled connections.
    #[error("controller genome is cyclic")]
    CyclicController,

    /// A task panicked; the payload message is kept when it was a string.
    #[error("{task} task panicked: {message}")]
    TaskPanicked {
        /// Which task failed.
        task: &'static str,
        /// Panic payload.
        message: String,
    },

    /// A blocking wait was interrupted by a stop request.
    ///
    /// Tasks treat this as a clean exit; it only escapes if a caller waits on
    /// a [`PauseGate`](crate::simulation::PauseGate) directly.
    #[error("wait interrupted by stop request")]
    Interrupted,
}

/// Failures of fitness scoring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitnessError {
    /// The run ended without a single tick; fitness would divide by zero.
    #[error("degenerate fitness: run completed {completion} with zero ticks")]
    Degenerate {
        /// Completion reported by the run.
        completion: f64,
    },
}

/// Failures loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File system errors.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parse errors.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// Values that parse but make no sense.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Umbrella error for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Structural operator failure.
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Persisted data failure.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Simulation failure.
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// Scoring failure.
    #[error(transparent)]
    Fitness(#[from] FitnessError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// File system errors.
    #[error("file system error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the path it concerns.
    #[must_use]
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for neat-drive operations.
pub type Result<T> = std::result::Result<T, Error>;
