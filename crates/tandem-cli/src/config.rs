//! Render descriptions.
//!
//! A render description is a TOML file listing graph nodes in dependency
//! order, plus the node whose output is written to disk:
//!
//! ```toml
//! sample_rate = 48000
//! block_size = 256
//! duration = 2.0
//! output = "mix"
//!
//! [[nodes]]
//! id = "dry"
//! type = "sine"
//! frequency = 220.0
//!
//! [[nodes]]
//! id = "wet"
//! type = "latency"
//! input = "dry"
//! samples = 480
//!
//! [[nodes]]
//! id = "mix"
//! type = "sum"
//! inputs = ["dry", "wet"]
//! ```
//!
//! A node referenced by exactly one other node is owned by it; a node
//! referenced more than once is shared.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tandem_graph::bridge::{self, BridgeReceiver};
use tandem_graph::{
    BufferNode, GraphError, Input, LatencyNode, LiveMidiEvent, LiveMidiOutputNode, MidiMessage,
    MidiSequenceNode, NodeGraph, NodeId, SharedLevelMeterNode, SineNode, SinkHandle, SinkRegistry,
    SummingNode,
};
use thiserror::Error;

use crate::wav;

/// Most undelivered events the live MIDI bridge holds between dispatches.
const MIDI_BRIDGE_CAPACITY: usize = 4096;

/// Errors in a render description.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the description
    #[error("failed to read '{path}': {source}")]
    Read {
        /// Path of the description.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The description is not valid TOML for this format
    #[error("failed to parse render description: {0}")]
    Parse(#[from] toml::de::Error),

    /// Two nodes share an id
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A node refers to one that is not defined before it
    #[error("node '{node}' refers to unknown input '{input}' (inputs must be listed first)")]
    UnknownInput {
        /// The referring node.
        node: String,
        /// The missing input.
        input: String,
    },

    /// The output is not one of the nodes
    #[error("output node '{0}' is not defined")]
    UnknownOutput(String),

    /// A setting is out of range
    #[error("invalid setting: {0}")]
    Invalid(String),

    /// Failed to load audio for a `wav` node
    #[error("failed to load '{path}': {source}")]
    Wav {
        /// The audio file.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: hound::Error,
    },

    /// The graph rejected the description
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

impl ConfigError {
    /// Create an invalid-setting error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// A parsed render description.
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Samples per processing block.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Length of the render in seconds.
    #[serde(default = "default_duration")]
    pub duration: f32,
    /// Id of the node written to the output file.
    pub output: String,
    /// Nodes in dependency order.
    pub nodes: Vec<NodeConfig>,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    512
}

fn default_duration() -> f32 {
    1.0
}

/// One node of a render description.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Unique name other nodes refer to.
    pub id: String,
    /// What the node does.
    #[serde(flatten)]
    pub kind: NodeKind,
}

/// Node types available in render descriptions.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Sine test tone.
    Sine {
        /// Frequency in Hz.
        frequency: f32,
        /// Linear gain.
        #[serde(default = "default_gain")]
        gain: f32,
        /// Output channels.
        #[serde(default = "default_channels")]
        channels: usize,
    },
    /// Audio file played from the start of the timeline.
    Wav {
        /// File path, relative to the description.
        path: PathBuf,
    },
    /// Fixed list of MIDI notes.
    Notes {
        /// The notes.
        notes: Vec<NoteConfig>,
    },
    /// Delays its input.
    Latency {
        /// Input node id.
        input: String,
        /// Delay in samples.
        samples: usize,
    },
    /// Mixes its inputs, compensating for latency differences.
    Sum {
        /// Input node ids.
        inputs: Vec<String>,
    },
    /// Passes its input through and meters it.
    Meter {
        /// Input node id.
        input: String,
        /// Meter name; meters with the same name are shared. Defaults to the node id.
        #[serde(default)]
        sink: Option<String>,
    },
    /// Passes its input through and reports its MIDI.
    MidiOut {
        /// Input node id.
        input: String,
    },
}

fn default_gain() -> f32 {
    0.5
}

fn default_channels() -> usize {
    2
}

/// A note in a `notes` node.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NoteConfig {
    /// Start, in samples.
    pub at: i64,
    /// Length, in samples.
    pub length: i64,
    /// MIDI note number.
    pub note: u8,
    /// Note-on velocity.
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// MIDI channel (0-15).
    #[serde(default)]
    pub channel: u8,
}

fn default_velocity() -> u8 {
    100
}

impl NodeKind {
    /// Ids of the nodes this one reads from.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Self::Sine { .. } | Self::Wav { .. } | Self::Notes { .. } => Vec::new(),
            Self::Latency { input, .. } | Self::Meter { input, .. } | Self::MidiOut { input } => {
                vec![input.as_str()]
            }
            Self::Sum { inputs } => inputs.iter().map(String::as_str).collect(),
        }
    }
}

/// A graph built from a description, ready to prepare.
pub struct BuiltGraph {
    /// The graph.
    pub graph: NodeGraph,
    /// The node written to disk.
    pub output: NodeId,
    /// One handle per distinct meter name.
    pub meters: BTreeMap<String, SinkHandle<String>>,
    /// Receives MIDI from `midi_out` nodes, if there are any.
    pub midi: Option<BridgeReceiver<LiveMidiEvent>>,
}

impl RenderConfig {
    /// Reads and validates a description.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates a description.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks settings, ids and references.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("sample_rate must be positive"));
        }
        if self.block_size == 0 {
            return Err(ConfigError::invalid("block_size must be positive"));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ConfigError::invalid(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration
            )));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            for input in node.kind.inputs() {
                if !seen.contains(input) {
                    return Err(ConfigError::UnknownInput {
                        node: node.id.clone(),
                        input: input.to_string(),
                    });
                }
            }
            match &node.kind {
                NodeKind::Sum { inputs } if inputs.is_empty() => {
                    return Err(ConfigError::invalid(format!(
                        "sum node '{}' has no inputs",
                        node.id
                    )));
                }
                NodeKind::Sine { channels, .. } if *channels == 0 => {
                    return Err(ConfigError::invalid(format!(
                        "sine node '{}' needs at least one channel",
                        node.id
                    )));
                }
                _ => {}
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ConfigError::DuplicateId(node.id.clone()));
            }
        }

        if !seen.contains(self.output.as_str()) {
            return Err(ConfigError::UnknownOutput(self.output.clone()));
        }
        Ok(())
    }

    /// Total frames to render.
    pub fn total_frames(&self) -> usize {
        (f64::from(self.duration) * f64::from(self.sample_rate)).round() as usize
    }

    /// Builds the graph. `base_dir` resolves relative `wav` paths; meters are
    /// acquired from `meters`.
    pub fn build(
        &self,
        base_dir: &Path,
        meters: &SinkRegistry<String>,
    ) -> Result<BuiltGraph, ConfigError> {
        let mut references: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            for input in node.kind.inputs() {
                *references.entry(input).or_default() += 1;
            }
        }

        let mut ids: HashMap<&str, NodeId> = HashMap::new();
        let mut handles = BTreeMap::new();
        let mut midi_bridge = None;
        let mut graph = NodeGraph::new();

        for node in &self.nodes {
            let input = |name: &str| -> Result<Input, ConfigError> {
                let id = ids.get(name).copied().ok_or_else(|| ConfigError::UnknownInput {
                    node: node.id.clone(),
                    input: name.to_string(),
                })?;
                Ok(if references.get(name).copied().unwrap_or(0) > 1 {
                    Input::shared(id)
                } else {
                    Input::owned(id)
                })
            };

            let id = match &node.kind {
                NodeKind::Sine {
                    frequency,
                    gain,
                    channels,
                } => graph.add(SineNode::new(*frequency, *gain, *channels))?,
                NodeKind::Wav { path } => {
                    let path = base_dir.join(path);
                    let (channels, rate) =
                        wav::read_channels(&path).map_err(|source| ConfigError::Wav {
                            path: path.clone(),
                            source,
                        })?;
                    if rate != self.sample_rate {
                        tracing::warn!(
                            path = %path.display(),
                            file_rate = rate,
                            render_rate = self.sample_rate,
                            "sample rate mismatch, playing without resampling"
                        );
                    }
                    graph.add(BufferNode::new(channels))?
                }
                NodeKind::Notes { notes } => {
                    let mut events = Vec::with_capacity(notes.len() * 2);
                    for n in notes {
                        events.push((n.at, MidiMessage::note_on(n.channel, n.note, n.velocity)));
                        events.push((n.at + n.length.max(1), MidiMessage::note_off(n.channel, n.note)));
                    }
                    graph.add(MidiSequenceNode::new(events))?
                }
                NodeKind::Latency { input: src, samples } => {
                    graph.add(LatencyNode::new(input(src)?, *samples))?
                }
                NodeKind::Sum { inputs } => {
                    let inputs = inputs
                        .iter()
                        .map(|name| input(name))
                        .collect::<Result<Vec<_>, _>>()?;
                    graph.add(SummingNode::new(inputs))?
                }
                NodeKind::Meter { input: src, sink } => {
                    let key = sink.clone().unwrap_or_else(|| node.id.clone());
                    let handle = meters.acquire(key.clone());
                    handles.entry(key).or_insert_with(|| handle.clone());
                    graph.add(SharedLevelMeterNode::new(input(src)?, handle))?
                }
                NodeKind::MidiOut { input: src } => {
                    let (sender, _) = midi_bridge
                        .get_or_insert_with(|| bridge::channel(MIDI_BRIDGE_CAPACITY));
                    graph.add(LiveMidiOutputNode::new(input(src)?, sender.clone()))?
                }
            };
            tracing::debug!(node = %node.id, %id, "added node");
            ids.insert(node.id.as_str(), id);
        }

        let output = ids
            .get(self.output.as_str())
            .copied()
            .ok_or_else(|| ConfigError::UnknownOutput(self.output.clone()))?;

        Ok(BuiltGraph {
            graph,
            output,
            meters: handles,
            midi: midi_bridge.map(|(_, receiver)| receiver),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
        sample_rate = 1000
        block_size = 16
        duration = 0.5
        output = "mix"

        [[nodes]]
        id = "a"
        type = "sine"
        frequency = 10

        [[nodes]]
        id = "late"
        type = "latency"
        input = "a"
        samples = 8

        [[nodes]]
        id = "mix"
        type = "sum"
        inputs = ["a", "late"]
    "#;

    #[test]
    fn test_parse_defaults() {
        let config = RenderConfig::from_toml(BASIC).unwrap();
        assert_eq!(config.sample_rate, 1000);
        assert_eq!(config.total_frames(), 500);
        assert!(matches!(
            config.nodes[0].kind,
            NodeKind::Sine { gain, channels: 2, .. } if (gain - 0.5).abs() < f32::EPSILON
        ));
    }

    #[test]
    fn test_input_must_be_listed_first() {
        let text = r#"
            output = "m"
            [[nodes]]
            id = "m"
            type = "meter"
            input = "s"
            [[nodes]]
            id = "s"
            type = "sine"
            frequency = 1.0
        "#;
        let err = RenderConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownInput { ref input, .. } if input == "s"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let text = r#"
            output = "s"
            [[nodes]]
            id = "s"
            type = "sine"
            frequency = 1.0
            [[nodes]]
            id = "s"
            type = "sine"
            frequency = 2.0
        "#;
        assert!(matches!(
            RenderConfig::from_toml(text),
            Err(ConfigError::DuplicateId(id)) if id == "s"
        ));
    }

    #[test]
    fn test_unknown_output_rejected() {
        let text = r#"
            output = "nope"
            [[nodes]]
            id = "s"
            type = "sine"
            frequency = 1.0
        "#;
        assert!(matches!(
            RenderConfig::from_toml(text),
            Err(ConfigError::UnknownOutput(_))
        ));
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let text = BASIC.replace("block_size = 16", "block_size = 0");
        assert!(matches!(
            RenderConfig::from_toml(&text),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_type_is_parse_error() {
        let text = r#"
            output = "s"
            [[nodes]]
            id = "s"
            type = "granular"
        "#;
        assert!(matches!(
            RenderConfig::from_toml(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_multiply_referenced_input_is_shared() {
        let config = RenderConfig::from_toml(BASIC).unwrap();
        let built = config.build(Path::new("."), &SinkRegistry::new()).unwrap();
        let graph = &built.graph;
        // "a" feeds both the latency node and the sum, so nobody owns it.
        let a = graph.roots().into_iter().find(|&id| graph.node_name(id).ok() == Some("sine"));
        assert!(a.is_some());
        let mix_inputs = graph.inputs(built.output).unwrap();
        assert!(!mix_inputs[0].is_owned());
        assert!(mix_inputs[1].is_owned());
    }

    #[test]
    fn test_meters_with_same_sink_share() {
        let text = r#"
            output = "m2"
            [[nodes]]
            id = "s"
            type = "sine"
            frequency = 1.0
            [[nodes]]
            id = "m1"
            type = "meter"
            input = "s"
            sink = "bus"
            [[nodes]]
            id = "m2"
            type = "meter"
            input = "m1"
            sink = "bus"
        "#;
        let registry = SinkRegistry::new();
        let built = RenderConfig::from_toml(text)
            .unwrap()
            .build(Path::new("."), &registry)
            .unwrap();
        assert_eq!(built.meters.len(), 1);
        // Two nodes plus the report handle.
        assert_eq!(registry.holders(&"bus".to_string()), 3);
    }
}
