//! NEAT genome implementation with arena-allocated graph topology.
//!
//! The [`Genome`] keeps nodes in a SlotMap arena and connections in a map keyed
//! by lineage number, so iteration is always in ascending lineage order.
//! Every connection endpoint is a key into the genome's own arena: genes coming
//! from elsewhere are resolved through [`Genome::put_connection`], which inserts
//! a missing endpoint or reuses the canonical node already present.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::debug;

use crate::error::StructuralError;
use crate::gene::{ConnectionGene, ConnectionSpec, NodeGene, NodeId, NodeKind, NodeRef};
use crate::innovation::Sequences;
use crate::topology::GraphTopology;

/// How a matching gene is chosen during crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverPolicy {
    /// Fair coin flip between the two parents.
    #[default]
    Uniform,
    /// Pick each parent with probability proportional to its fitness.
    FitnessWeighted,
}

/// Configuration for genome creation and mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeatConfig {
    /// Number of input nodes.
    pub num_inputs: usize,
    /// Number of output nodes.
    pub num_outputs: usize,
    /// Probability of adding a new connection during mutation.
    pub add_connection_prob: f64,
    /// Probability of adding a new node during mutation.
    pub add_node_prob: f64,
    /// Probability of mutating a connection's weight and bias.
    pub weight_mutation_prob: f64,
    /// Maximum perturbation applied to a weight or bias.
    pub weight_mutation_power: f64,
    /// Probability of completely replacing a weight instead of perturbing it.
    pub weight_replace_prob: f64,
    /// Range for initial and replaced weights: [-weight_range, weight_range].
    pub weight_range: f64,
    /// Matching-gene policy for crossover.
    pub crossover: CrossoverPolicy,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            num_inputs: 8,
            num_outputs: 5,
            add_connection_prob: 0.3,
            add_node_prob: 0.05,
            weight_mutation_prob: 0.8,
            weight_mutation_power: 0.5,
            weight_replace_prob: 0.1,
            weight_range: 1.0,
            crossover: CrossoverPolicy::Uniform,
        }
    }
}

impl NeatConfig {
    /// Create a config with the given input/output counts and default rates.
    #[must_use]
    pub fn minimal(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            ..Default::default()
        }
    }
}

/// Which gene wins when both parents carry the same lineage number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchingGene {
    /// Fair coin flip.
    Uniform,
    /// Receiver's gene wins with probability `own / (own + other)`.
    Weighted {
        /// Receiver's fitness.
        own: f64,
        /// Other parent's fitness.
        other: f64,
    },
}

impl MatchingGene {
    /// Build from a configured policy and the parents' fitness values.
    #[must_use]
    pub fn from_policy(policy: CrossoverPolicy, own: f64, other: f64) -> Self {
        match policy {
            CrossoverPolicy::Uniform => Self::Uniform,
            CrossoverPolicy::FitnessWeighted => Self::Weighted { own, other },
        }
    }

    fn take_own<R: Rng>(self, rng: &mut R) -> bool {
        match self {
            Self::Uniform => rng.random::<bool>(),
            Self::Weighted { own, other } => {
                let own = if own.is_finite() { own.max(0.0) } else { 0.0 };
                let other = if other.is_finite() { other.max(0.0) } else { 0.0 };
                let total = own + other;
                if total > 0.0 {
                    rng.random_bool(own / total)
                } else {
                    rng.random::<bool>()
                }
            }
        }
    }
}

/// A NEAT genome representing a neural network topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genome {
    /// Arena storage for nodes.
    pub nodes: SlotMap<NodeId, NodeGene>,
    /// Connections keyed by lineage number.
    pub connections: BTreeMap<u64, ConnectionGene>,
    /// Input nodes in declared order.
    pub input_ids: Vec<NodeId>,
    /// Output nodes in declared order.
    pub output_ids: Vec<NodeId>,
    /// Hidden nodes keyed by node id.
    pub hidden_ids: BTreeMap<u64, NodeId>,
    /// Configuration used for this genome.
    #[serde(default)]
    pub config: NeatConfig,
}

impl Genome {
    /// Create a genome with no nodes.
    #[must_use]
    pub fn empty(config: NeatConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            connections: BTreeMap::new(),
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            hidden_ids: BTreeMap::new(),
            config,
        }
    }

    /// Create a genome with only input and output nodes, ids drawn from `seq`.
    #[must_use]
    pub fn minimal(config: NeatConfig, seq: &Sequences) -> Self {
        let (num_inputs, num_outputs) = (config.num_inputs, config.num_outputs);
        let mut genome = Self::empty(config);

        for _ in 0..num_inputs {
            genome.put_node(NodeRef::new(NodeKind::Input, seq.next_node_id()));
        }
        for _ in 0..num_outputs {
            genome.put_node(NodeRef::new(NodeKind::Output, seq.next_node_id()));
        }

        genome
    }

    /// Unconnected skeleton with `inputs` inputs and `outputs` outputs.
    #[must_use]
    pub fn with_io(seq: &Sequences, inputs: usize, outputs: usize) -> Self {
        Self::minimal(NeatConfig::minimal(inputs, outputs), seq)
    }

    /// Create a genome with every input connected to every output.
    #[must_use]
    pub fn fully_connected<R: Rng>(config: NeatConfig, seq: &Sequences, rng: &mut R) -> Self {
        let mut genome = Self::minimal(config, seq);
        let range = genome.config.weight_range;

        let pairs: Vec<(NodeRef, NodeRef)> = genome
            .input_ids
            .iter()
            .flat_map(|&i| genome.output_ids.iter().map(move |&o| (i, o)))
            .map(|(i, o)| (genome.nodes[i].node_ref(), genome.nodes[o].node_ref()))
            .collect();

        for (from, to) in pairs {
            let spec = ConnectionSpec::new(
                seq.next_lineage(),
                from,
                to,
                random_in(rng, range),
                random_in(rng, range),
            );
            genome.put_connection(spec);
        }

        genome
    }

    /// Look up the canonical arena key for a node identity.
    #[must_use]
    pub fn find_node(&self, node: NodeRef) -> Option<NodeId> {
        match node.kind {
            NodeKind::Input => self.find_in(&self.input_ids, node.id),
            NodeKind::Output => self.find_in(&self.output_ids, node.id),
            NodeKind::Hidden => self.hidden_ids.get(&node.id).copied(),
        }
    }

    fn find_in(&self, ids: &[NodeId], id: u64) -> Option<NodeId> {
        ids.iter().copied().find(|&key| self.nodes[key].id == id)
    }

    /// Identity of an arena node.
    #[must_use]
    pub fn node_ref(&self, id: NodeId) -> Option<NodeRef> {
        self.nodes.get(id).map(NodeGene::node_ref)
    }

    /// Insert a node if no node of that kind and id exists.
    ///
    /// Returns `true` if the node was inserted. This is not the add-node
    /// mutation; see [`add_node`](Self::add_node).
    pub fn put_node(&mut self, node: NodeRef) -> bool {
        self.resolve(node).1
    }

    /// Canonical key for `node`, inserting it first if absent.
    fn resolve(&mut self, node: NodeRef) -> (NodeId, bool) {
        if let Some(existing) = self.find_node(node) {
            return (existing, false);
        }

        let key = self.nodes.insert(NodeGene::new(node.kind, node.id));
        match node.kind {
            NodeKind::Input => self.input_ids.push(key),
            NodeKind::Output => self.output_ids.push(key),
            NodeKind::Hidden => {
                self.hidden_ids.insert(node.id, key);
            }
        }
        (key, true)
    }

    /// Insert a connection, binding its endpoints to this genome's canonical nodes.
    ///
    /// Missing endpoints are inserted. The lineage is registered in both
    /// endpoints' adjacency lists exactly once. An existing gene with the same
    /// lineage number is replaced. This is not the add-connection mutation;
    /// see [`add_connection`](Self::add_connection).
    pub fn put_connection(&mut self, spec: ConnectionSpec) {
        let (source, _) = self.resolve(spec.source);
        let (target, _) = self.resolve(spec.target);

        if let Some(old) = self.connections.get(&spec.lineage) {
            if old.source != source || old.target != target {
                let (old_source, old_target) = (old.source, old.target);
                self.unregister(spec.lineage, old_source, old_target);
            }
        }

        let lineage = spec.lineage;
        self.connections.insert(
            lineage,
            ConnectionGene {
                lineage,
                weight: spec.weight,
                bias: spec.bias,
                source,
                target,
                enabled: spec.enabled,
            },
        );

        let outgoing = &mut self.nodes[source].outgoing;
        if !outgoing.contains(&lineage) {
            outgoing.push(lineage);
        }
        let incoming = &mut self.nodes[target].incoming;
        if !incoming.contains(&lineage) {
            incoming.push(lineage);
        }
    }

    fn unregister(&mut self, lineage: u64, source: NodeId, target: NodeId) {
        if let Some(node) = self.nodes.get_mut(source) {
            node.outgoing.retain(|&l| l != lineage);
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.incoming.retain(|&l| l != lineage);
        }
    }

    /// Detached copy of a gene, endpoints named by identity.
    #[must_use]
    pub fn connection_spec(&self, gene: &ConnectionGene) -> ConnectionSpec {
        ConnectionSpec {
            lineage: gene.lineage,
            weight: gene.weight,
            bias: gene.bias,
            source: self.nodes[gene.source].node_ref(),
            target: self.nodes[gene.target].node_ref(),
            enabled: gene.enabled,
        }
    }

    /// Add-connection mutation: connect two existing nodes with a new lineage.
    ///
    /// Returns the allocated lineage number. Nothing is modified and no
    /// lineage is consumed when an error is returned.
    ///
    /// # Errors
    ///
    /// - [`StructuralError::UnknownNode`] if either endpoint is not in the genome
    /// - [`StructuralError::InvalidDirection`] for edges into inputs, out of
    ///   outputs, or self-loops
    /// - [`StructuralError::WouldCreateCycle`] if the edge closes a cycle
    pub fn add_connection(
        &mut self,
        from: NodeRef,
        to: NodeRef,
        weight: f64,
        bias: f64,
        seq: &Sequences,
    ) -> Result<u64, StructuralError> {
        let source = self
            .find_node(from)
            .ok_or(StructuralError::UnknownNode(from))?;
        let target = self.find_node(to).ok_or(StructuralError::UnknownNode(to))?;

        if from.kind == NodeKind::Output || to.kind == NodeKind::Input || source == target {
            return Err(StructuralError::InvalidDirection { from, to });
        }
        if GraphTopology::from_genome(self).would_create_cycle(source, target) {
            return Err(StructuralError::WouldCreateCycle { from, to });
        }

        let lineage = seq.next_lineage();
        self.put_connection(ConnectionSpec::new(lineage, from, to, weight, bias));
        debug!(lineage, %from, %to, weight, bias, "added connection");
        Ok(lineage)
    }

    /// Add-node mutation: split an enabled connection with a new hidden node.
    ///
    /// The original connection is disabled but kept. `source -> new` copies its
    /// weight and bias; `new -> target` has weight 1 and bias 0, so the split
    /// path computes exactly what the original edge did.
    ///
    /// # Errors
    ///
    /// - [`StructuralError::UnknownConnection`] if `lineage` is not in the genome
    /// - [`StructuralError::ConnectionDisabled`] if it is already disabled
    pub fn add_node(&mut self, lineage: u64, seq: &Sequences) -> Result<NodeId, StructuralError> {
        let original = self
            .connections
            .get(&lineage)
            .ok_or(StructuralError::UnknownConnection(lineage))?;
        if !original.enabled {
            return Err(StructuralError::ConnectionDisabled(lineage));
        }
        let original = self.connection_spec(original);

        if let Some(conn) = self.connections.get_mut(&lineage) {
            conn.enabled = false;
        }

        let hidden = NodeRef::new(NodeKind::Hidden, seq.next_node_id());
        let (hidden_key, _) = self.resolve(hidden);

        let first = seq.next_lineage();
        let second = seq.next_lineage();
        self.put_connection(ConnectionSpec::new(
            first,
            original.source,
            hidden,
            original.weight,
            original.bias,
        ));
        self.put_connection(ConnectionSpec::new(second, hidden, original.target, 1.0, 0.0));

        debug!(lineage, %hidden, first, second, "split connection");
        Ok(hidden_key)
    }

    /// Whether an edge from `source` to `target` exists, enabled or not.
    #[must_use]
    pub fn contains_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.nodes.get(source).is_some_and(|node| {
            node.outgoing
                .iter()
                .any(|l| self.connections.get(l).is_some_and(|c| c.target == target))
        })
    }

    /// Get the number of enabled connections.
    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.values().filter(|c| c.enabled).count()
    }

    /// Lineage numbers in ascending order.
    pub fn lineages(&self) -> impl Iterator<Item = u64> + '_ {
        self.connections.keys().copied()
    }

    /// Largest node id and lineage number present, for [`Sequences::observe`].
    #[must_use]
    pub fn max_ids(&self) -> (Option<u64>, Option<u64>) {
        let node = self.nodes.values().map(|n| n.id).max();
        let lineage = self.connections.keys().next_back().copied();
        (node, lineage)
    }

    /// Crossover with a fair coin for matching genes.
    #[must_use]
    pub fn reproduce_with<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        self.crossover(other, MatchingGene::Uniform, rng)
    }

    /// Lineage-aligned crossover.
    ///
    /// Both parents' genes are walked in ascending lineage order. Matching
    /// genes are chosen per `matching`; disjoint and excess genes are always
    /// inherited from whichever parent has them. The child's node set falls out
    /// of [`put_connection`](Self::put_connection); inputs and outputs are
    /// seeded first so declared order survives even for unconnected nodes.
    #[must_use]
    pub fn crossover<R: Rng>(&self, other: &Self, matching: MatchingGene, rng: &mut R) -> Self {
        let mut child = Self::empty(self.config.clone());

        for parent in [self, other] {
            for &id in parent.input_ids.iter().chain(&parent.output_ids) {
                child.put_node(parent.nodes[id].node_ref());
            }
        }

        let own: Vec<&ConnectionGene> = self.connections.values().collect();
        let theirs: Vec<&ConnectionGene> = other.connections.values().collect();
        let (mut i, mut j) = (0, 0);

        while i < own.len() && j < theirs.len() {
            let spec = match own[i].lineage.cmp(&theirs[j].lineage) {
                Ordering::Equal => {
                    let spec = if matching.take_own(rng) {
                        self.connection_spec(own[i])
                    } else {
                        other.connection_spec(theirs[j])
                    };
                    i += 1;
                    j += 1;
                    spec
                }
                Ordering::Less => {
                    i += 1;
                    self.connection_spec(own[i - 1])
                }
                Ordering::Greater => {
                    j += 1;
                    other.connection_spec(theirs[j - 1])
                }
            };
            child.put_connection(spec);
        }

        for gene in &own[i..] {
            child.put_connection(self.connection_spec(gene));
        }
        for gene in &theirs[j..] {
            child.put_connection(other.connection_spec(gene));
        }

        let disabled = child.break_cycles();
        if disabled > 0 {
            debug!(disabled, "disabled cycle-closing genes after crossover");
        }
        child
    }

    /// Whether enabled connections contain a cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        GraphTopology::from_genome(self).has_cycle()
    }

    /// Disable back edges until the enabled graph is acyclic.
    ///
    /// Genes from independently mutated parents can close a loop once merged.
    /// The newest back edge is disabled each round; it stays in the genome.
    /// Returns the number of connections disabled.
    pub fn break_cycles(&mut self) -> usize {
        let mut disabled = 0;
        while let Some(lineage) = GraphTopology::from_genome(self).find_back_edge() {
            match self.connections.get_mut(&lineage) {
                Some(conn) => {
                    conn.enabled = false;
                    disabled += 1;
                }
                None => break,
            }
        }
        disabled
    }

    /// Perturb or replace weights and biases.
    pub fn mutate_weights<R: Rng>(&mut self, rng: &mut R) {
        let range = self.config.weight_range;
        let power = self.config.weight_mutation_power;
        // Unbounded drift ends in Inf/NaN after enough generations.
        let limit = range * 10.0;

        for conn in self.connections.values_mut() {
            if !rng.random_bool(self.config.weight_mutation_prob) {
                continue;
            }
            if rng.random_bool(self.config.weight_replace_prob) {
                conn.weight = random_in(rng, range);
                conn.bias = random_in(rng, range);
            } else {
                conn.weight += random_in(rng, power);
                conn.bias += random_in(rng, power);
            }
            conn.weight = conn.weight.clamp(-limit, limit);
            conn.bias = conn.bias.clamp(-limit, limit);
        }
    }

    /// Draw fresh weights and biases for every connection, keeping structure.
    pub fn randomize_weights<R: Rng>(&mut self, rng: &mut R) {
        let range = self.config.weight_range;
        for conn in self.connections.values_mut() {
            conn.weight = random_in(rng, range);
            conn.bias = random_in(rng, range);
        }
    }

    /// Try to add a random new connection. Returns its lineage if one was added.
    pub fn mutate_add_connection<R: Rng>(&mut self, rng: &mut R, seq: &Sequences) -> Option<u64> {
        let sources: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind != NodeKind::Output)
            .map(|(id, _)| id)
            .collect();
        let targets: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind != NodeKind::Input)
            .map(|(id, _)| id)
            .collect();

        if sources.is_empty() || targets.is_empty() {
            return None;
        }

        // Try a few times to find a valid connection
        for _ in 0..10 {
            let source = sources[rng.random_range(0..sources.len())];
            let target = targets[rng.random_range(0..targets.len())];
            if source == target || self.contains_edge(source, target) {
                continue;
            }

            let from = self.nodes[source].node_ref();
            let to = self.nodes[target].node_ref();
            let range = self.config.weight_range;
            let (weight, bias) = (random_in(rng, range), random_in(rng, range));
            if let Ok(lineage) = self.add_connection(from, to, weight, bias, seq) {
                return Some(lineage);
            }
        }
        None
    }

    /// Try to split a random enabled connection. Returns the new node if one was added.
    pub fn mutate_add_node<R: Rng>(&mut self, rng: &mut R, seq: &Sequences) -> Option<NodeId> {
        let enabled: Vec<u64> = self
            .connections
            .values()
            .filter(|c| c.enabled)
            .map(|c| c.lineage)
            .collect();

        if enabled.is_empty() {
            return None;
        }

        let lineage = enabled[rng.random_range(0..enabled.len())];
        self.add_node(lineage, seq).ok()
    }

    /// Apply weight and structural mutations with the configured probabilities.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R, seq: &Sequences) {
        self.mutate_weights(rng);
        if rng.random_bool(self.config.add_connection_prob) {
            self.mutate_add_connection(rng, seq);
        }
        if rng.random_bool(self.config.add_node_prob) {
            self.mutate_add_node(rng, seq);
        }
    }
}

/// Uniform sample from `[-range, range]`.
fn random_in<R: Rng>(rng: &mut R, range: f64) -> f64 {
    rng.random::<f64>().mul_add(2.0 * range, -range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn input(id: u64) -> NodeRef {
        NodeRef::new(NodeKind::Input, id)
    }

    fn output(id: u64) -> NodeRef {
        NodeRef::new(NodeKind::Output, id)
    }

    fn hidden(id: u64) -> NodeRef {
        NodeRef::new(NodeKind::Hidden, id)
    }

    #[test]
    fn test_minimal_genome() {
        let seq = Sequences::new();
        let genome = Genome::minimal(NeatConfig::minimal(3, 2), &seq);

        assert_eq!(genome.input_ids.len(), 3);
        assert_eq!(genome.output_ids.len(), 2);
        assert!(genome.hidden_ids.is_empty());
        assert!(genome.connections.is_empty());
        assert_eq!(seq.peek_node_id(), 5);
    }

    #[test]
    fn test_fully_connected_genome() {
        let seq = Sequences::new();
        let genome = Genome::fully_connected(NeatConfig::minimal(2, 2), &seq, &mut test_rng());

        // 2 inputs * 2 outputs = 4 connections
        assert_eq!(genome.connections.len(), 4);
        assert_eq!(genome.lineages().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_put_node_is_idempotent() {
        let mut genome = Genome::empty(NeatConfig::default());
        assert!(genome.put_node(input(0)));
        assert!(!genome.put_node(input(0)));
        // Same id, different kind is a different node
        assert!(genome.put_node(hidden(0)));
        assert_eq!(genome.nodes.len(), 2);
    }

    #[test]
    fn test_put_connection_binds_canonical_nodes() {
        let mut genome = Genome::empty(NeatConfig::default());
        genome.put_node(input(1));
        let canonical = genome.find_node(input(1)).unwrap();

        genome.put_connection(ConnectionSpec::new(9, input(1), output(2), 0.5, 0.0));
        genome.put_connection(ConnectionSpec::new(9, input(1), output(2), 0.5, 0.0));

        let conn = &genome.connections[&9];
        assert_eq!(conn.source, canonical);
        assert_eq!(genome.nodes.len(), 2);
        assert_eq!(genome.nodes[canonical].outgoing, vec![9]);
        assert_eq!(genome.nodes[conn.target].incoming, vec![9]);
    }

    #[test]
    fn test_add_connection() {
        let seq = Sequences::new();
        let mut genome = Genome::minimal(NeatConfig::minimal(2, 1), &seq);
        let from = genome.nodes[genome.input_ids[0]].node_ref();
        let to = genome.nodes[genome.output_ids[0]].node_ref();

        let lineage = genome.add_connection(from, to, 0.3, 0.1, &seq).unwrap();
        assert_eq!(lineage, 0);
        assert_eq!(genome.connections.len(), 1);
        assert!(genome.connections[&lineage].enabled);
    }

    #[test]
    fn test_add_connection_unknown_node_leaves_genome_unmodified() {
        let seq = Sequences::new();
        let mut genome = Genome::minimal(NeatConfig::minimal(2, 1), &seq);
        let before = genome.nodes.len();

        let err = genome
            .add_connection(input(0), hidden(99), 1.0, 0.0, &seq)
            .unwrap_err();
        assert_eq!(err, StructuralError::UnknownNode(hidden(99)));
        assert_eq!(genome.nodes.len(), before);
        assert!(genome.connections.is_empty());
        assert_eq!(seq.peek_lineage(), 0, "no lineage consumed on failure");
    }

    #[test]
    fn test_add_connection_rejects_wrong_direction_and_cycles() {
        let seq = Sequences::new();
        let mut genome = Genome::fully_connected(NeatConfig::minimal(1, 1), &seq, &mut test_rng());
        let (i, o) = (input(0), output(1));

        assert!(matches!(
            genome.add_connection(o, i, 1.0, 0.0, &seq),
            Err(StructuralError::InvalidDirection { .. })
        ));

        let late = genome.add_node(0, &seq).unwrap();
        let late = genome.nodes[late].node_ref();
        // Splitting i -> late gives i -> early -> late -> o
        let early = genome.add_node(1, &seq).unwrap();
        let early = genome.nodes[early].node_ref();
        assert!(matches!(
            genome.add_connection(late, early, 1.0, 0.0, &seq),
            Err(StructuralError::WouldCreateCycle { .. })
        ));
        assert!(genome.add_connection(early, o, 1.0, 0.0, &seq).is_ok());
        assert!(!genome.has_cycle());
    }

    #[test]
    fn test_add_node() {
        let seq = Sequences::new();
        let mut genome = Genome::fully_connected(NeatConfig::minimal(2, 1), &seq, &mut test_rng());
        let initial_nodes = genome.nodes.len();
        let initial_conns = genome.connections.len();
        let original = genome.connections[&0].clone();

        let new_node = genome.add_node(0, &seq).unwrap();

        assert_eq!(genome.nodes.len(), initial_nodes + 1);
        assert_eq!(genome.connections.len(), initial_conns + 2);
        assert_eq!(genome.num_enabled_connections(), initial_conns + 1);
        assert!(!genome.connections[&0].enabled, "original kept but disabled");
        assert_eq!(genome.nodes[new_node].kind, NodeKind::Hidden);

        let first = &genome.connections[&2];
        assert_eq!(first.source, original.source);
        assert_eq!(first.target, new_node);
        assert_eq!(first.weight, original.weight);
        assert_eq!(first.bias, original.bias);

        let second = &genome.connections[&3];
        assert_eq!(second.source, new_node);
        assert_eq!(second.target, original.target);
        assert_eq!(second.weight, 1.0);
        assert_eq!(second.bias, 0.0);
    }

    #[test]
    fn test_add_node_errors() {
        let seq = Sequences::new();
        let mut genome = Genome::fully_connected(NeatConfig::minimal(1, 1), &seq, &mut test_rng());

        assert_eq!(
            genome.add_node(42, &seq).unwrap_err(),
            StructuralError::UnknownConnection(42)
        );
        genome.add_node(0, &seq).unwrap();
        let nodes = genome.nodes.len();
        assert_eq!(
            genome.add_node(0, &seq).unwrap_err(),
            StructuralError::ConnectionDisabled(0)
        );
        assert_eq!(genome.nodes.len(), nodes);
    }

    #[test]
    fn test_mutation() {
        let config = NeatConfig {
            add_connection_prob: 1.0,
            add_node_prob: 1.0,
            weight_mutation_prob: 1.0,
            ..NeatConfig::minimal(2, 1)
        };
        let seq = Sequences::new();
        let mut rng = test_rng();
        let mut genome = Genome::fully_connected(config, &seq, &mut rng);

        let initial_conns = genome.connections.len();
        genome.mutate(&mut rng, &seq);

        assert!(genome.connections.len() > initial_conns);
        assert!(!genome.has_cycle());
    }

    #[test]
    fn test_crossover() {
        let seq = Sequences::new();
        let mut rng = test_rng();
        let config = NeatConfig::minimal(2, 1);

        let parent1 = Genome::fully_connected(config, &seq, &mut rng);
        let mut parent2 = parent1.clone();
        let mut parent1 = parent1;

        parent1.add_node(0, &seq).unwrap();
        parent2.add_node(1, &seq).unwrap();

        let child = parent1.reproduce_with(&parent2, &mut rng);

        assert_eq!(child.input_ids.len(), 2);
        assert_eq!(child.output_ids.len(), 1);
        // 2 shared + 2 from each split
        assert_eq!(child.connections.len(), 6);
        assert_eq!(child.hidden_ids.len(), 2);
    }

    #[test]
    fn test_crossover_weighted_prefers_fitter_parent() {
        let seq = Sequences::new();
        let mut rng = test_rng();
        let a = Genome::fully_connected(NeatConfig::minimal(2, 2), &seq, &mut rng);
        let mut b = a.clone();
        for conn in b.connections.values_mut() {
            conn.weight = 100.0;
        }

        let child = a.crossover(&b, MatchingGene::Weighted { own: 1.0, other: 0.0 }, &mut rng);
        for (lineage, conn) in &child.connections {
            assert_eq!(conn.weight, a.connections[lineage].weight);
        }
    }

    #[test]
    fn test_crossover_breaks_merged_cycles() {
        let mut a = Genome::empty(NeatConfig::minimal(1, 1));
        a.put_connection(ConnectionSpec::new(0, input(0), hidden(2), 1.0, 0.0));
        a.put_connection(ConnectionSpec::new(1, hidden(2), hidden(3), 1.0, 0.0));
        a.put_connection(ConnectionSpec::new(2, hidden(3), output(1), 1.0, 0.0));
        let mut b = a.clone();
        b.put_connection(ConnectionSpec::new(3, hidden(3), hidden(2), 1.0, 0.0));
        b.connections.get_mut(&1).unwrap().enabled = false;

        let child = a.crossover(&b, MatchingGene::Weighted { own: 1.0, other: 0.0 }, &mut test_rng());
        assert!(!child.has_cycle());
        assert!(!child.connections[&3].enabled);
        assert_eq!(child.connections.len(), 4);
    }
}
