//! Latency alignment for summing nodes.
//!
//! When parallel paths with different latencies meet at a summing node, the
//! faster paths have to be delayed so that every input arrives sample-aligned.
//! The alignment is computed as a [`LatencyPlan`]: a pure description of which
//! edges get wrapped in a [`LatencyNode`] and by how much. The plan is built
//! from the graph as it stands and applied once during
//! [`NodeGraph::prepare()`](super::NodeGraph::prepare).
//!
//! A summing node's own latency is the maximum of its inputs, and wrapping an
//! input only raises it to that maximum, so substitutions never change the
//! latency any other node observes. One plan over the original graph
//! therefore aligns nested summing nodes too.

use super::node::{Input, Node, NodeId};
use super::processing::NodeGraph;
use crate::nodes::LatencyNode;

/// One edge to be replaced by a latency-compensating wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Substitution {
    /// The node whose input is wrapped.
    pub target: NodeId,
    /// Position of the edge in the target's input list.
    pub input_index: usize,
    /// The edge as it is before substitution.
    pub input: Input,
    /// Samples of delay the wrapper adds.
    pub delay_samples: usize,
}

impl Substitution {
    /// Builds the wrapper node for this substitution.
    ///
    /// The wrapper inherits the original edge's ownership: it owns the input
    /// if the target did, and only references it otherwise.
    pub(crate) fn wrapper(&self) -> Box<dyn Node> {
        Box::new(LatencyNode::new(self.input, self.delay_samples))
    }
}

/// The set of latency substitutions a graph needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LatencyPlan {
    substitutions: Vec<Substitution>,
}

impl LatencyPlan {
    /// Computes the substitutions needed to align every latency-aligning node.
    ///
    /// For each such node, `max_latency` is the largest latency among its
    /// inputs; every input with strictly less latency is wrapped with a delay
    /// of `max_latency - latency`.
    pub fn for_graph(graph: &NodeGraph) -> Self {
        let mut memo = graph.property_memo();
        let mut substitutions = Vec::new();

        for (target, node) in graph.live_nodes() {
            if !node.aligns_input_latency() {
                continue;
            }

            let latencies: Vec<usize> = node
                .inputs()
                .iter()
                .map(|input| {
                    graph
                        .compute_properties(input.node.0 as usize, &mut memo)
                        .latency_samples
                })
                .collect();
            let max_latency = latencies.iter().copied().max().unwrap_or(0);

            for (input_index, (input, &latency)) in
                node.inputs().iter().zip(&latencies).enumerate()
            {
                if latency < max_latency {
                    substitutions.push(Substitution {
                        target,
                        input_index,
                        input: *input,
                        delay_samples: max_latency - latency,
                    });
                }
            }
        }

        Self { substitutions }
    }

    /// Returns the planned substitutions, grouped by target in ID order.
    pub fn substitutions(&self) -> &[Substitution] {
        &self.substitutions
    }

    /// Returns the number of wrappers the plan inserts.
    pub fn len(&self) -> usize {
        self.substitutions.len()
    }

    /// Returns true if the graph is already aligned.
    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Returns the total delay, in samples, the plan inserts across all wrappers.
    pub fn total_delay(&self) -> usize {
        self.substitutions.iter().map(|s| s.delay_samples).sum()
    }
}
