//! Graph topology analysis using CSR format.
//!
//! This module provides graph algorithms over a genome's enabled connections in
//! Compressed Sparse Row (CSR) format. CSR avoids per-call `Vec<Vec<usize>>`
//! allocations in the evolutionary loop, where every structural mutation and
//! every crossover asks for a cycle check.
//!
//! ## Determinism
//!
//! Nodes are ordered by identity and edges by lineage number, so two genomes
//! with the same genes produce the same topology regardless of the order in
//! which their arenas were filled.

use std::collections::VecDeque;

use crate::gene::{NodeId, NodeRef};
use crate::genome::Genome;

/// CSR-format snapshot of a genome's enabled connections.
///
/// Supports forward traversal (evaluation, reachability) and enabled in-degree
/// lookups.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    /// Number of nodes in the graph.
    node_count: usize,
    /// Maps NodeId to dense index (0..node_count), sorted by NodeId.
    node_to_idx: Vec<(NodeId, usize)>,
    /// CSR offsets for forward edges. Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// `fwd_targets[fwd_offsets[i]..fwd_offsets[i+1]]` are successors of node i.
    fwd_targets: Vec<usize>,
    /// Lineage numbers parallel to `fwd_targets`.
    fwd_lineages: Vec<u64>,
    /// Cumulative enabled in-degrees. Length = node_count + 1.
    rev_offsets: Vec<usize>,
}

impl GraphTopology {
    /// Build topology from a genome's enabled connections.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let mut node_entries: Vec<(NodeId, NodeRef)> = genome
            .nodes
            .iter()
            .map(|(id, node)| (id, node.node_ref()))
            .collect();
        node_entries.sort_by_key(|(_, node)| *node);

        let node_count = node_entries.len();

        // Sorted vec + binary search instead of a HashMap.
        let mut node_to_idx: Vec<(NodeId, usize)> = node_entries
            .iter()
            .enumerate()
            .map(|(i, &(id, _))| (id, i))
            .collect();
        node_to_idx.sort_by_key(|(id, _)| *id);

        // BTreeMap iteration is already in lineage order.
        let edges: Vec<(u64, usize, usize)> = genome
            .connections
            .values()
            .filter(|c| c.enabled)
            .filter_map(|c| {
                let from = lookup_idx(&node_to_idx, c.source)?;
                let to = lookup_idx(&node_to_idx, c.target)?;
                Some((c.lineage, from, to))
            })
            .collect();

        let fwd_offsets = offsets(node_count, edges.iter().map(|&(_, from, _)| from));
        let mut fwd_targets = vec![0usize; edges.len()];
        let mut fwd_lineages = vec![0u64; edges.len()];
        let mut fwd_write_pos = fwd_offsets[..node_count].to_vec();
        for &(lineage, from, to) in &edges {
            let pos = fwd_write_pos[from];
            fwd_targets[pos] = to;
            fwd_lineages[pos] = lineage;
            fwd_write_pos[from] += 1;
        }

        let rev_offsets = offsets(node_count, edges.iter().map(|&(_, _, to)| to));

        Self {
            node_count,
            node_to_idx,
            fwd_offsets,
            fwd_targets,
            fwd_lineages,
            rev_offsets,
        }
    }

    /// Get the dense index for a NodeId.
    #[inline]
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        lookup_idx(&self.node_to_idx, id)
    }

    /// Number of nodes in the topology.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of enabled edges.
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.fwd_targets.len()
    }

    /// Iterate over successors of a node (forward edges).
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Outgoing edges of a node as `(target index, lineage)`, in lineage order.
    #[inline]
    pub fn outgoing(&self, idx: usize) -> impl Iterator<Item = (usize, u64)> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end]
            .iter()
            .copied()
            .zip(self.fwd_lineages[start..end].iter().copied())
    }

    /// Number of enabled edges ending at a node.
    #[inline]
    #[must_use]
    pub fn in_degree(&self, idx: usize) -> usize {
        self.rev_offsets[idx + 1] - self.rev_offsets[idx]
    }

    /// Check if adding edge from `from_id` to `to_id` would create a cycle.
    ///
    /// BFS forward from `to_id`; reaching `from_id` means a path
    /// `to -> ... -> from` already exists.
    #[must_use]
    pub fn would_create_cycle(&self, from_id: NodeId, to_id: NodeId) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.node_index(from_id), self.node_index(to_id))
        else {
            return false;
        };

        if from_idx == to_idx {
            return true;
        }

        let mut visited = vec![false; self.node_count];
        let mut queue = VecDeque::new();
        queue.push_back(to_idx);
        visited[to_idx] = true;

        while let Some(current) = queue.pop_front() {
            for succ in self.successors(current) {
                if succ == from_idx {
                    return true;
                }
                if !visited[succ] {
                    visited[succ] = true;
                    queue.push_back(succ);
                }
            }
        }

        false
    }

    /// Detect if the graph contains any cycle using Kahn's algorithm.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_none()
    }

    /// Find a back edge (cycle-closing edge) using iterative DFS.
    ///
    /// Returns the lineage of the newest back edge found, so the oldest
    /// structure survives.
    #[must_use]
    pub fn find_back_edge(&self) -> Option<u64> {
        // DFS coloring: 0=white, 1=gray (in path), 2=black (done)
        let mut color = vec![0u8; self.node_count];
        let mut newest: Option<u64> = None;

        // Stack: (node_idx, edge_iter_offset, is_entering)
        let mut stack: Vec<(usize, usize, bool)> = Vec::with_capacity(self.node_count);

        for start in 0..self.node_count {
            if color[start] != 0 {
                continue;
            }

            stack.push((start, 0, true));

            while let Some((node, edge_offset, is_entering)) = stack.pop() {
                if is_entering {
                    color[node] = 1;
                }

                let start_pos = self.fwd_offsets[node];
                let num_edges = self.fwd_offsets[node + 1] - start_pos;

                let mut found_unvisited = false;
                for offset in edge_offset..num_edges {
                    let actual_idx = start_pos + offset;
                    let neighbor = self.fwd_targets[actual_idx];

                    if color[neighbor] == 1 {
                        let lineage = self.fwd_lineages[actual_idx];
                        newest = Some(newest.map_or(lineage, |n| n.max(lineage)));
                    } else if color[neighbor] == 0 {
                        stack.push((node, offset + 1, false));
                        stack.push((neighbor, 0, true));
                        found_unvisited = true;
                        break;
                    }
                }

                if !found_unvisited {
                    color[node] = 2;
                }
            }
        }

        newest
    }

    /// Node indices in topological order, or None if the graph has cycles.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = (0..self.node_count).map(|i| self.in_degree(i)).collect();

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.node_count);
        while let Some(u) = queue.pop_front() {
            order.push(u);
            for v in self.successors(u) {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        (order.len() == self.node_count).then_some(order)
    }
}

/// Prefix sums of per-node edge counts. Length = node_count + 1.
fn offsets(node_count: usize, endpoints: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut counts = vec![0usize; node_count];
    for idx in endpoints {
        counts[idx] += 1;
    }

    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut total = 0;
    offsets.push(total);
    for count in counts {
        total += count;
        offsets.push(total);
    }
    offsets
}

/// Binary search for NodeId in sorted vec.
fn lookup_idx(sorted: &[(NodeId, usize)], id: NodeId) -> Option<usize> {
    sorted
        .binary_search_by_key(&id, |(k, _)| *k)
        .ok()
        .map(|pos| sorted[pos].1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{ConnectionSpec, NodeKind};
    use crate::genome::NeatConfig;
    use crate::innovation::Sequences;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_topology_basic() {
        let seq = Sequences::new();
        let genome = Genome::fully_connected(NeatConfig::minimal(2, 1), &seq, &mut test_rng());

        let topo = GraphTopology::from_genome(&genome);

        // 2 inputs + 1 output = 3 nodes
        assert_eq!(topo.node_count(), 3);
        assert_eq!(topo.edge_count(), 2);
        assert!(!topo.has_cycle());
    }

    #[test]
    fn test_disabled_edges_are_ignored() {
        let seq = Sequences::new();
        let mut genome = Genome::fully_connected(NeatConfig::minimal(2, 1), &seq, &mut test_rng());
        genome.connections.get_mut(&0).unwrap().enabled = false;

        let topo = GraphTopology::from_genome(&genome);
        assert_eq!(topo.edge_count(), 1);
        let out = topo.node_index(genome.output_ids[0]).unwrap();
        assert_eq!(topo.in_degree(out), 1);
    }

    #[test]
    fn test_would_create_cycle() {
        let seq = Sequences::new();
        let genome = Genome::fully_connected(NeatConfig::minimal(2, 1), &seq, &mut test_rng());

        let topo = GraphTopology::from_genome(&genome);

        let input_id = genome.input_ids[0];
        let output_id = genome.output_ids[0];

        assert!(topo.would_create_cycle(output_id, input_id));
        assert!(!topo.would_create_cycle(input_id, output_id));
        assert!(topo.would_create_cycle(input_id, input_id));
    }

    #[test]
    fn test_topological_order() {
        let seq = Sequences::new();
        let genome = Genome::fully_connected(NeatConfig::minimal(2, 1), &seq, &mut test_rng());

        let topo = GraphTopology::from_genome(&genome);
        let order = topo.topological_order().expect("Should have topo order");

        assert_eq!(order.len(), 3);
        let out = topo.node_index(genome.output_ids[0]).unwrap();
        assert_eq!(order.last(), Some(&out));
    }

    #[test]
    fn test_find_back_edge_picks_newest() {
        let h = |id| NodeRef::new(NodeKind::Hidden, id);
        let mut genome = Genome::empty(NeatConfig::default());
        genome.put_connection(ConnectionSpec::new(4, h(1), h(2), 1.0, 0.0));
        genome.put_connection(ConnectionSpec::new(9, h(2), h(1), 1.0, 0.0));

        let topo = GraphTopology::from_genome(&genome);
        assert!(topo.has_cycle());
        assert_eq!(topo.find_back_edge(), Some(9));
    }
}
