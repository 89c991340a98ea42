//! Node arena, preparation, and block scheduling.
//!
//! [`NodeGraph`] owns every node of a playback session. It is built on a
//! non-real-time thread (add/remove), prepared once (latency alignment,
//! topological sort, buffer allocation), then moved to the audio thread where
//! [`process_block()`](NodeGraph::process_block) runs each node exactly once
//! per block in dependency order.

use core::ops::Range;

use super::buffer::{AudioBlock, MidiBuffer, NodeBuffers};
use super::latency::LatencyPlan;
use super::node::{
    Input, Node, NodeId, NodeOutput, NodeProperties, Optimisations, PlaybackInfo, ProcessContext,
};

/// Errors that can occur while building or preparing a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    NodeNotFound(NodeId),
    /// An owning edge targets a node that already has an owner.
    AlreadyOwned {
        /// The node that was to be owned.
        node: NodeId,
        /// Its current owner.
        owner: NodeId,
    },
    /// A node lists the same input as owned more than once.
    DuplicateOwnedInput(NodeId),
    /// The node cannot be removed while another node still references it.
    StillReferenced {
        /// The node that was to be removed.
        node: NodeId,
        /// A node holding an edge to it.
        by: NodeId,
    },
    /// The graph shape is frozen once prepared.
    AlreadyPrepared,
    /// The graph must be prepared before processing.
    NotPrepared,
    /// The graph contains a cycle.
    CycleDetected,
    /// The graph has no nodes.
    EmptyGraph,
    /// Block size must be at least one sample.
    InvalidBlockSize(usize),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} not found"),
            Self::AlreadyOwned { node, owner } => {
                write!(f, "node {node} is already owned by {owner}")
            }
            Self::DuplicateOwnedInput(id) => write!(f, "node {id} is listed as owned twice"),
            Self::StillReferenced { node, by } => {
                write!(f, "node {node} is still referenced by {by}")
            }
            Self::AlreadyPrepared => write!(f, "graph is already prepared"),
            Self::NotPrepared => write!(f, "graph has not been prepared"),
            Self::CycleDetected => write!(f, "graph contains a cycle"),
            Self::EmptyGraph => write!(f, "graph has no nodes"),
            Self::InvalidBlockSize(n) => write!(f, "invalid block size {n}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// A node plus its arena bookkeeping.
struct NodeSlot {
    node: Box<dyn Node>,
    /// The node holding the owning edge to this one. `None` for roots, which
    /// the graph itself owns.
    owner: Option<NodeId>,
}

/// Arena of processing nodes and the scheduler that renders them.
///
/// # Usage
///
/// 1. Create a graph with [`new()`](Self::new)
/// 2. Add leaves first, then the nodes that consume them, with
///    [`add()`](Self::add). Inputs must already exist, so the graph is
///    acyclic by construction.
/// 3. Prepare once with [`prepare()`](Self::prepare). This inserts latency
///    compensation and allocates every buffer.
/// 4. Call [`process_block()`](Self::process_block) per block and read
///    results with [`output()`](Self::output).
pub struct NodeGraph {
    nodes: Vec<Option<NodeSlot>>,
    outputs: Vec<NodeBuffers>,
    /// For each slot, the slot whose audio block holds its audio output.
    audio_source: Vec<usize>,
    optimisations: Vec<Optimisations>,
    processed: Vec<bool>,
    order: Vec<usize>,
    info: Option<PlaybackInfo>,
    position: i64,
    current_range: Range<i64>,
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            outputs: Vec::new(),
            audio_source: Vec::new(),
            optimisations: Vec::new(),
            processed: Vec::new(),
            order: Vec::new(),
            info: None,
            position: 0,
            current_range: 0..0,
        }
    }

    // --- Building ---

    /// Adds a node and takes ownership of its owned inputs.
    ///
    /// Returns an error if an input doesn't exist, an owned input already has
    /// an owner or is listed twice, or the graph has been prepared.
    pub fn add<N: Node + 'static>(&mut self, node: N) -> Result<NodeId, GraphError> {
        self.add_boxed(Box::new(node))
    }

    /// Boxed variant of [`add()`](Self::add).
    pub fn add_boxed(&mut self, node: Box<dyn Node>) -> Result<NodeId, GraphError> {
        if self.info.is_some() {
            return Err(GraphError::AlreadyPrepared);
        }

        let inputs = node.inputs();
        for (i, input) in inputs.iter().enumerate() {
            let slot = self.slot(input.node)?;
            if input.is_owned() {
                if let Some(owner) = slot.owner {
                    return Err(GraphError::AlreadyOwned {
                        node: input.node,
                        owner,
                    });
                }
                if inputs[..i].iter().any(|prev| prev.is_owned() && prev.node == input.node) {
                    return Err(GraphError::DuplicateOwnedInput(input.node));
                }
            }
        }

        let id = self.insert_node(node, None);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "graph_add: {} node {id}",
            self.nodes[id.0 as usize].as_ref().map_or("?", |s| s.node.name())
        );
        Ok(id)
    }

    /// Removes a root node together with every node it owns, recursively.
    ///
    /// Fails if the node is owned by another node, or if a node outside the
    /// removed subtree still references part of it.
    pub fn remove(&mut self, id: NodeId) -> Result<(), GraphError> {
        if self.info.is_some() {
            return Err(GraphError::AlreadyPrepared);
        }
        if let Some(owner) = self.slot(id)?.owner {
            return Err(GraphError::StillReferenced { node: id, by: owner });
        }

        let subtree = self.owned_subtree(id);
        for (idx, slot) in self.nodes.iter().enumerate() {
            let Some(slot) = slot else { continue };
            if subtree.contains(&idx) {
                continue;
            }
            if let Some(input) = slot
                .node
                .inputs()
                .iter()
                .find(|input| subtree.contains(&(input.node.0 as usize)))
            {
                return Err(GraphError::StillReferenced {
                    node: input.node,
                    by: NodeId(idx as u32),
                });
            }
        }

        for idx in subtree {
            self.nodes[idx] = None;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_remove: node {id}");
        Ok(())
    }

    // --- Introspection ---

    /// Returns the number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if the node exists.
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    /// Returns the node holding the owning edge to `id`, or `None` for roots.
    pub fn owner(&self, id: NodeId) -> Result<Option<NodeId>, GraphError> {
        Ok(self.slot(id)?.owner)
    }

    /// Returns the nodes no other node owns, in ID order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.live()
            .filter(|(_, slot)| slot.owner.is_none())
            .map(|(idx, _)| NodeId(idx as u32))
            .collect()
    }

    /// Returns the node's static name.
    pub fn node_name(&self, id: NodeId) -> Result<&'static str, GraphError> {
        Ok(self.slot(id)?.node.name())
    }

    /// Returns the node's direct input edges.
    pub fn inputs(&self, id: NodeId) -> Result<&[Input], GraphError> {
        Ok(self.slot(id)?.node.inputs())
    }

    /// Returns the IDs of the node's direct inputs, in order.
    pub fn direct_inputs(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.inputs(id)?.iter().map(|input| input.node).collect())
    }

    /// Computes the node's properties from its current subgraph.
    ///
    /// Nothing is cached between calls.
    pub fn properties(&self, id: NodeId) -> Result<NodeProperties, GraphError> {
        self.slot(id)?;
        let mut memo = self.property_memo();
        Ok(self.compute_properties(id.0 as usize, &mut memo))
    }

    /// Returns the latency substitutions [`prepare()`](Self::prepare) would make.
    pub fn latency_plan(&self) -> LatencyPlan {
        LatencyPlan::for_graph(self)
    }

    /// Returns true once [`prepare()`](Self::prepare) has succeeded.
    pub fn is_prepared(&self) -> bool {
        self.info.is_some()
    }

    /// Returns the playback info the graph was prepared with.
    pub fn playback_info(&self) -> Option<PlaybackInfo> {
        self.info
    }

    /// Returns the node IDs in the order they are processed.
    ///
    /// Empty until the graph is prepared.
    pub fn processing_order(&self) -> Vec<NodeId> {
        self.order.iter().map(|&idx| NodeId(idx as u32)).collect()
    }

    /// Returns the timeline position of the next block.
    pub fn position(&self) -> i64 {
        self.position
    }

    // --- Preparation ---

    /// Prepares the graph for playback.
    ///
    /// Inserts latency compensation in front of every summing input that is
    /// faster than its siblings, sorts the graph topologically, and prepares
    /// and allocates buffers for each node, inputs first. After this call the
    /// graph shape is frozen.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] if the graph is empty, already prepared, or the
    /// block size is zero.
    pub fn prepare(&mut self, info: PlaybackInfo) -> Result<(), GraphError> {
        if self.info.is_some() {
            return Err(GraphError::AlreadyPrepared);
        }
        if info.block_size == 0 {
            return Err(GraphError::InvalidBlockSize(info.block_size));
        }
        if self.node_count() == 0 {
            return Err(GraphError::EmptyGraph);
        }

        let plan = LatencyPlan::for_graph(self);
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_latency: {} compensation nodes", plan.len());
        self.apply_latency_plan(&plan);

        let order = self.kahn_sort()?;
        #[cfg(feature = "tracing")]
        tracing::debug!("graph_sort: {} nodes in topo order", order.len());

        let n = self.nodes.len();
        let mut memo = self.property_memo();
        self.outputs = (0..n).map(|_| NodeBuffers::default()).collect();
        self.audio_source = (0..n).collect();
        self.optimisations = vec![Optimisations::default(); n];
        self.processed = vec![false; n];
        let mut midi_capacity = vec![0; n];

        for &idx in &order {
            let props = self.compute_properties(idx, &mut memo);
            let Some(slot) = self.nodes[idx].as_mut() else {
                continue;
            };
            let input_capacity: Vec<usize> = slot
                .node
                .inputs()
                .iter()
                .map(|input| midi_capacity[input.node.0 as usize])
                .collect();
            let capacity = slot.node.midi_capacity(&input_capacity);
            midi_capacity[idx] = capacity;
            slot.node.prepare(&info, &props);

            let opts = slot.node.optimisations();
            self.optimisations[idx] = opts;
            if opts.allocate_audio_buffer {
                self.outputs[idx] =
                    NodeBuffers::new(props.num_channels, info.block_size, capacity);
            } else {
                self.outputs[idx] = NodeBuffers {
                    audio: AudioBlock::default(),
                    midi: MidiBuffer::with_capacity(capacity),
                };
                if let Some(first) = slot.node.inputs().first() {
                    self.audio_source[idx] = self.audio_source[first.node.0 as usize];
                }
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "  prepare: {} node[{idx}] channels={} latency={} midi={capacity}",
                slot.node.name(),
                props.num_channels,
                props.latency_samples
            );
        }

        self.order = order;
        self.info = Some(info);
        self.position = 0;
        Ok(())
    }

    /// Applies a latency plan computed from this graph.
    fn apply_latency_plan(&mut self, plan: &LatencyPlan) {
        for sub in plan.substitutions() {
            let target_idx = sub.target.0 as usize;
            let current = self.nodes[target_idx]
                .as_ref()
                .and_then(|slot| slot.node.inputs().get(sub.input_index).copied());
            debug_assert_eq!(current, Some(sub.input), "latency plan is stale");
            if current != Some(sub.input) {
                continue;
            }

            let wrapper = self.insert_node(sub.wrapper(), Some(sub.target));
            if sub.input.is_owned()
                && let Some(inner) = self.nodes[sub.input.node.0 as usize].as_mut()
            {
                inner.owner = Some(wrapper);
            }
            if let Some(target) = self.nodes[target_idx].as_mut() {
                target.node.inputs_mut()[sub.input_index] = Input::owned(wrapper);
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                "  latency_wrap: {} on input {} of {} ({} samples)",
                wrapper,
                sub.input.node,
                sub.target,
                sub.delay_samples
            );
        }
    }

    // --- Scheduling ---

    /// Starts a new block: resets readiness and calls `prefetch_block` on
    /// every node. Returns the block's timeline range.
    ///
    /// On an unprepared graph this is a no-op returning an empty range.
    pub fn begin_block(&mut self) -> Range<i64> {
        let block_size = self.info.map_or(0, |info| info.block_size);
        let range = self.position..self.position + block_size as i64;
        self.position = range.end;
        self.current_range = range.clone();
        self.processed.fill(false);

        for &idx in &self.order {
            if let Some(slot) = self.nodes[idx].as_mut() {
                slot.node.prefetch_block(range.clone());
            }
        }
        range
    }

    /// Returns true if every direct input of the node has been processed
    /// in the current block.
    pub fn is_ready(&self, id: NodeId) -> bool {
        self.is_ready_index(id.0 as usize)
    }

    /// Returns true if the node has produced its output for the current block.
    pub fn has_processed(&self, id: NodeId) -> bool {
        self.processed.get(id.0 as usize).copied().unwrap_or(false)
    }

    /// Processes one node if it is ready and hasn't run yet this block.
    ///
    /// Returns whether the node was processed.
    pub fn process_node(&mut self, id: NodeId) -> bool {
        let idx = id.0 as usize;
        if self.info.is_none() || self.has_processed(id) || !self.is_ready_index(idx) {
            return false;
        }
        self.process_index(idx);
        true
    }

    /// Renders one block: begins it, then polls nodes in dependency order and
    /// processes each one as soon as it is ready.
    ///
    /// **RT-safety**: no allocations or locks beyond what individual nodes do.
    pub fn process_block(&mut self) -> Range<i64> {
        let range = self.begin_block();
        let total = self.order.len();
        let mut done = 0;

        while done < total {
            let before = done;
            for k in 0..total {
                let idx = self.order[k];
                if !self.processed[idx] && self.is_ready_index(idx) {
                    self.process_index(idx);
                    done += 1;
                }
            }
            // Topological order makes one pass enough; no progress means a broken graph.
            debug_assert!(done > before, "no node became ready");
            if done == before {
                break;
            }
        }
        range
    }

    /// Returns a node's output for the most recent block.
    ///
    /// Nodes that alias their input return the input's audio.
    pub fn output(&self, id: NodeId) -> Option<NodeOutput<'_>> {
        let idx = id.0 as usize;
        if self.info.is_none() || !self.contains(id) {
            return None;
        }
        Some(NodeOutput {
            audio: &self.outputs[self.audio_source[idx]].audio,
            midi: &self.outputs[idx].midi,
        })
    }

    fn is_ready_index(&self, idx: usize) -> bool {
        let processed = &self.processed;
        self.nodes
            .get(idx)
            .and_then(Option::as_ref)
            .is_some_and(|slot| {
                slot.node
                    .is_ready(&|id: NodeId| processed.get(id.0 as usize).copied().unwrap_or(false))
            })
    }

    fn process_index(&mut self, idx: usize) {
        let Some(slot) = self.nodes[idx].as_mut() else {
            return;
        };

        // Moving the buffers out lets the node read every other output while
        // writing its own. No allocation: only the Vec headers move.
        let mut own = core::mem::take(&mut self.outputs[idx]);
        if self.optimisations[idx].clear_buffers {
            own.audio.clear();
            own.midi.clear();
        }

        {
            let mut ctx = ProcessContext {
                audio: &mut own.audio,
                midi: &mut own.midi,
                reference_range: self.current_range.clone(),
                outputs: &self.outputs,
                audio_source: &self.audio_source,
            };
            slot.node.process(&mut ctx);
        }

        self.outputs[idx] = own;
        self.processed[idx] = true;
    }

    // --- Internal helpers ---

    pub(crate) fn insert_node(&mut self, node: Box<dyn Node>, owner: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for input in node.inputs() {
            if input.is_owned()
                && let Some(Some(inner)) = self.nodes.get_mut(input.node.0 as usize)
            {
                inner.owner = Some(id);
            }
        }
        self.nodes.push(Some(NodeSlot { node, owner }));
        id
    }

    fn slot(&self, id: NodeId) -> Result<&NodeSlot, GraphError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|n| n.as_ref())
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn live(&self) -> impl Iterator<Item = (usize, &NodeSlot)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|s| (idx, s)))
    }

    /// Live nodes paired with their raw node reference, for the latency pass.
    pub(crate) fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &dyn Node)> {
        self.live()
            .map(|(idx, slot)| (NodeId(idx as u32), slot.node.as_ref()))
    }

    /// Returns `id` plus every node reachable from it through owning edges.
    fn owned_subtree(&self, id: NodeId) -> Vec<usize> {
        let mut subtree = Vec::new();
        let mut stack = vec![id.0 as usize];
        while let Some(idx) = stack.pop() {
            if subtree.contains(&idx) {
                continue;
            }
            subtree.push(idx);
            if let Some(Some(slot)) = self.nodes.get(idx) {
                stack.extend(
                    slot.node
                        .inputs()
                        .iter()
                        .filter(|input| input.is_owned())
                        .map(|input| input.node.0 as usize),
                );
            }
        }
        subtree
    }

    /// A fresh memo table for [`compute_properties()`](Self::compute_properties).
    pub(crate) fn property_memo(&self) -> Vec<Option<NodeProperties>> {
        vec![None; self.nodes.len()]
    }

    pub(crate) fn compute_properties(
        &self,
        idx: usize,
        memo: &mut [Option<NodeProperties>],
    ) -> NodeProperties {
        if let Some(props) = memo[idx] {
            return props;
        }
        let Some(slot) = self.nodes[idx].as_ref() else {
            return NodeProperties::default();
        };
        let input_props: Vec<NodeProperties> = slot
            .node
            .inputs()
            .iter()
            .map(|input| self.compute_properties(input.node.0 as usize, memo))
            .collect();
        let props = slot.node.properties(&input_props);
        memo[idx] = Some(props);
        props
    }

    /// Performs Kahn's algorithm over the input edges.
    ///
    /// Returns slot indices with every node after all of its inputs.
    fn kahn_sort(&self) -> Result<Vec<usize>, GraphError> {
        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut active_count = 0usize;

        for (idx, slot) in self.live() {
            active_count += 1;
            for input in slot.node.inputs() {
                in_degree[idx] += 1;
                consumers[input.node.0 as usize].push(idx);
            }
        }

        if active_count == 0 {
            return Err(GraphError::EmptyGraph);
        }

        // Lowest index first keeps the order deterministic.
        let mut queue: Vec<usize> = (0..n)
            .rev()
            .filter(|&i| self.nodes[i].is_some() && in_degree[i] == 0)
            .collect();
        let mut sorted = Vec::with_capacity(active_count);

        while let Some(idx) = queue.pop() {
            sorted.push(idx);
            for &consumer in &consumers[idx] {
                in_degree[consumer] -= 1;
                if in_degree[consumer] == 0 {
                    queue.push(consumer);
                }
            }
        }

        if sorted.len() != active_count {
            return Err(GraphError::CycleDetected);
        }
        Ok(sorted)
    }
}
