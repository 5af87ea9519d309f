//! Feed-forward evaluator for NEAT genomes.
//!
//! [`FeedForward`] compiles a genome into dense arrays and runs one
//! non-recurrent pass per call. Propagation is push-based: writing an input
//! sends `weight * value + bias` along every enabled outgoing edge into the
//! target's pending buffer, and a node settles once it has heard from all of its
//! enabled incoming edges. Its value is the mean of those contributions.

use std::collections::VecDeque;

use thiserror::Error;

use crate::genome::Genome;
use crate::topology::GraphTopology;

/// Error type for evaluator construction failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    /// The genome contains cycles in its enabled connections.
    ///
    /// Use [`Genome::break_cycles`] or [`Genome::has_cycle`] before compiling.
    #[error("genome contains cycles; feedforward evaluation requires an acyclic graph")]
    CyclicGenome,
}

/// A compiled, evaluation-ready representation of a genome.
///
/// Edges are stored in forward CSR format in lineage order, so summation order
/// is fixed and repeated calls with the same inputs give bit-identical outputs.
#[derive(Debug, Clone)]
pub struct FeedForward {
    /// Last settled value per node. Persists across calls.
    values: Vec<f64>,
    /// Sum of contributions received this call.
    pending_sum: Vec<f64>,
    /// Number of contributions received this call.
    pending_count: Vec<usize>,
    /// Enabled in-degree per node.
    required: Vec<usize>,
    /// CSR offsets into the edge arrays (len = num_nodes + 1).
    edge_offsets: Vec<usize>,
    /// Target node per edge.
    edge_targets: Vec<usize>,
    /// Weight per edge.
    edge_weights: Vec<f64>,
    /// Bias per edge.
    edge_biases: Vec<f64>,
    /// Input nodes in declared order.
    input_indices: Vec<usize>,
    /// Output nodes in declared order.
    output_indices: Vec<usize>,
    /// Non-input nodes with no enabled incoming edges.
    sources: Vec<usize>,
    /// Propagation worklist, kept to avoid reallocating per call.
    queue: VecDeque<usize>,
}

impl FeedForward {
    /// Compile a genome into an evaluator.
    ///
    /// Nodes on a cycle never collect all their inputs, so they simply keep
    /// their previous value; use [`try_new`](Self::try_new) to reject such
    /// genomes instead.
    #[must_use]
    pub fn new(genome: &Genome) -> Self {
        let topo = GraphTopology::from_genome(genome);
        let node_count = topo.node_count();

        let mut edge_offsets = Vec::with_capacity(node_count + 1);
        let mut edge_targets = Vec::with_capacity(topo.edge_count());
        let mut edge_weights = Vec::with_capacity(topo.edge_count());
        let mut edge_biases = Vec::with_capacity(topo.edge_count());

        edge_offsets.push(0);
        for idx in 0..node_count {
            for (target, lineage) in topo.outgoing(idx) {
                let Some(conn) = genome.connections.get(&lineage) else {
                    continue;
                };
                edge_targets.push(target);
                edge_weights.push(conn.weight);
                edge_biases.push(conn.bias);
            }
            edge_offsets.push(edge_targets.len());
        }

        let required: Vec<usize> = (0..node_count).map(|idx| topo.in_degree(idx)).collect();
        let dense = |ids: &[crate::gene::NodeId]| -> Vec<usize> {
            ids.iter().filter_map(|&id| topo.node_index(id)).collect()
        };
        let input_indices = dense(&genome.input_ids);
        let output_indices = dense(&genome.output_ids);

        let sources = (0..node_count)
            .filter(|&idx| required[idx] == 0 && !input_indices.contains(&idx))
            .filter(|&idx| edge_offsets[idx + 1] > edge_offsets[idx])
            .collect();

        Self {
            values: vec![0.0; node_count],
            pending_sum: vec![0.0; node_count],
            pending_count: vec![0; node_count],
            required,
            edge_offsets,
            edge_targets,
            edge_weights,
            edge_biases,
            input_indices,
            output_indices,
            sources,
            queue: VecDeque::with_capacity(node_count),
        }
    }

    /// Compile a genome, rejecting cyclic ones.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError::CyclicGenome`] if the enabled connections
    /// contain a cycle.
    pub fn try_new(genome: &Genome) -> Result<Self, EvaluatorError> {
        if genome.has_cycle() {
            return Err(EvaluatorError::CyclicGenome);
        }
        Ok(Self::new(genome))
    }

    /// Run one forward pass, writing the output values into `outputs`.
    ///
    /// Extra inputs are ignored and missing ones read as 0. Only the first
    /// `outputs.len()` outputs are written.
    pub fn compute_into(&mut self, inputs: &[f64], outputs: &mut [f64]) {
        self.pending_sum.fill(0.0);
        self.pending_count.fill(0);
        self.queue.clear();

        for (slot, &idx) in self.input_indices.iter().enumerate() {
            self.values[idx] = inputs.get(slot).copied().unwrap_or(0.0);
            self.queue.push_back(idx);
        }
        // Orphaned hidden nodes still feed their last value downstream.
        self.queue.extend(self.sources.iter().copied());

        while let Some(node) = self.queue.pop_front() {
            let value = self.values[node];
            for edge in self.edge_offsets[node]..self.edge_offsets[node + 1] {
                let target = self.edge_targets[edge];
                self.pending_sum[target] += self.edge_weights[edge].mul_add(value, self.edge_biases[edge]);
                self.pending_count[target] += 1;

                if self.pending_count[target] == self.required[target] {
                    self.values[target] = self.pending_sum[target] / self.required[target] as f64;
                    self.queue.push_back(target);
                }
            }
        }

        for (out, &idx) in outputs.iter_mut().zip(&self.output_indices) {
            *out = self.values[idx];
        }
    }

    /// Run one forward pass and return the output values in declared order.
    pub fn compute(&mut self, inputs: &[f64]) -> Vec<f64> {
        let mut outputs = vec![0.0; self.output_indices.len()];
        self.compute_into(inputs, &mut outputs);
        outputs
    }

    /// Get the number of inputs.
    #[inline]
    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.input_indices.len()
    }

    /// Get the number of outputs.
    #[inline]
    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.output_indices.len()
    }
}
