//! Gene types for NEAT genomes.
//!
//! This module defines the fundamental building blocks of NEAT networks:
//! - [`NodeGene`]: Represents neurons in the network
//! - [`ConnectionGene`]: Represents weighted connections between nodes
//!
//! Genes inside a genome refer to their endpoints through [`NodeId`] arena keys.
//! Genes travelling between genomes (crossover, decoding) use [`ConnectionSpec`],
//! which names endpoints by [`NodeRef`] so the receiving genome can resolve them
//! against its own canonical nodes.

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Arena key of a node within one genome.
    ///
    /// Keys are local to the genome that issued them; use [`NodeRef`] to talk
    /// about "the same node" across genomes.
    pub struct NodeId;
}

/// The role of a node in the network. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    /// Receives an external value; never has incoming edges.
    Input,
    /// Produces a control value; never has outgoing edges.
    Output,
    /// Internal node created by splitting a connection.
    Hidden,
}

impl NodeKind {
    /// Single-letter tag used in the text format.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Input => 'I',
            Self::Output => 'O',
            Self::Hidden => 'H',
        }
    }

    /// Inverse of [`tag`](Self::tag).
    #[must_use]
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'I' => Some(Self::Input),
            'O' => Some(Self::Output),
            'H' => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// Genome-independent identity of a node: its kind plus its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    /// Node role.
    pub kind: NodeKind,
    /// Node id drawn from the shared node sequence.
    pub id: u64,
}

impl NodeRef {
    /// Create a reference.
    #[must_use]
    pub const fn new(kind: NodeKind, id: u64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:x}", self.kind.tag(), self.id)
    }
}

/// A node gene representing a neuron in the network.
///
/// Adjacency is stored as lineage numbers, which index the owning genome's
/// connection map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGene {
    /// Id from the shared node sequence; unique per kind within a genome.
    pub id: u64,
    /// Role of this node.
    pub kind: NodeKind,
    /// Lineage numbers of connections ending here.
    pub incoming: Vec<u64>,
    /// Lineage numbers of connections starting here.
    pub outgoing: Vec<u64>,
}

impl NodeGene {
    /// Create a node with no edges.
    #[must_use]
    pub fn new(kind: NodeKind, id: u64) -> Self {
        Self {
            id,
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Create a new input node.
    #[must_use]
    pub fn input(id: u64) -> Self {
        Self::new(NodeKind::Input, id)
    }

    /// Create a new output node.
    #[must_use]
    pub fn output(id: u64) -> Self {
        Self::new(NodeKind::Output, id)
    }

    /// Create a new hidden node.
    #[must_use]
    pub fn hidden(id: u64) -> Self {
        Self::new(NodeKind::Hidden, id)
    }

    /// Identity of this node outside its genome.
    #[must_use]
    pub const fn node_ref(&self) -> NodeRef {
        NodeRef::new(self.kind, self.id)
    }
}

/// A connection gene representing a weighted link between two nodes.
///
/// Disabled connections are never deleted: they keep their lineage number so
/// crossover can still align them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Lineage number from the shared sequence, assigned once.
    pub lineage: u64,
    /// The connection weight.
    pub weight: f64,
    /// Added to `weight * value` when the signal is transmitted.
    pub bias: f64,
    /// The source node of this connection.
    pub source: NodeId,
    /// The target node of this connection.
    pub target: NodeId,
    /// Whether this connection transmits.
    pub enabled: bool,
}

impl ConnectionGene {
    /// Signal delivered to the target for a source value.
    #[inline]
    #[must_use]
    pub fn transmit(&self, value: f64) -> f64 {
        self.weight.mul_add(value, self.bias)
    }
}

/// A connection gene detached from any genome's arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    /// Lineage number.
    pub lineage: u64,
    /// The connection weight.
    pub weight: f64,
    /// The connection bias.
    pub bias: f64,
    /// Source endpoint.
    pub source: NodeRef,
    /// Target endpoint.
    pub target: NodeRef,
    /// Whether this connection transmits.
    pub enabled: bool,
}

impl ConnectionSpec {
    /// Create an enabled connection spec.
    #[must_use]
    pub fn new(lineage: u64, source: NodeRef, target: NodeRef, weight: f64, bias: f64) -> Self {
        Self {
            lineage,
            weight,
            bias,
            source,
            target,
            enabled: true,
        }
    }

    /// Mark the spec disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
