use std::collections::HashSet;

use crate::foundation::core::{Canvas, Quality};
use crate::foundation::error::{TesseraError, TesseraResult};

/// Strategy used to walk the compiled graph.
///
/// Selected once, at executor construction; never re-dispatched mid-run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModelKind {
    /// Decompose work by execution group, tile by tile, with a buffer cache
    /// shared across groups.
    #[default]
    Tiled,
    /// Walk every operation over the whole frame with a shared active-buffer
    /// set.
    FullFrame,
}

/// Blend applied when mixing two inputs.
///
/// All modes operate directly on premultiplied RGBA8 channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Source-over: `b` composited on top of `a`.
    #[default]
    Over,
    /// Saturating channelwise sum.
    Add,
    /// Channelwise product.
    Multiply,
    /// Inverted channelwise product of inverses.
    Screen,
}

/// Color-management view settings carried on the execution context.
///
/// Opaque to the engine core; operations that color-manage may consult them.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorViewSettings {
    /// View transform name.
    pub view_transform: String,
    /// Artistic look name.
    pub look: String,
    /// Exposure offset in stops.
    pub exposure: f32,
    /// Display gamma correction.
    pub gamma: f32,
}

impl Default for ColorViewSettings {
    fn default() -> Self {
        Self {
            view_transform: "standard".to_owned(),
            look: "none".to_owned(),
            exposure: 0.0,
            gamma: 1.0,
        }
    }
}

/// Color-management display settings carried on the execution context.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorDisplaySettings {
    /// Target display device name.
    pub display_device: String,
}

impl Default for ColorDisplaySettings {
    fn default() -> Self {
        Self {
            display_device: "sRGB".to_owned(),
        }
    }
}

/// A single node in a [`GraphDescription`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    /// Unique node identifier, referenced by other nodes' inputs.
    pub id: String,
    /// Node kind and parameters.
    #[serde(flatten)]
    pub kind: NodeKindDef,
}

/// Node kinds understood by the graph builder.
///
/// Inputs reference other nodes by id. Colors are straight (non-premultiplied)
/// RGBA8; operations premultiply when they establish their derived state.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKindDef {
    /// Fill with a constant color.
    ColorFill {
        /// Straight RGBA8 fill color.
        color: [u8; 4],
    },
    /// Vertical gradient between two colors.
    Gradient {
        /// Straight RGBA8 color of the bottom row.
        bottom: [u8; 4],
        /// Straight RGBA8 color of the top row.
        top: [u8; 4],
    },
    /// Invert the input's color channels within its alpha.
    Invert {
        /// Upstream node id.
        input: String,
    },
    /// Scale the input's opacity.
    Opacity {
        /// Upstream node id.
        input: String,
        /// Opacity factor in `[0, 1]`.
        factor: f64,
    },
    /// Mix two inputs under a blend mode.
    Mix {
        /// First upstream node id (the base).
        a: String,
        /// Second upstream node id (blended on top).
        b: String,
        /// Mix factor in `[0, 1]`: 0 keeps `a`, 1 is the full blend.
        factor: f64,
        /// Blend mode applied before mixing.
        #[serde(default)]
        blend: BlendMode,
    },
    /// Final output sink.
    Output {
        /// Upstream node id whose pixels become the frame.
        input: String,
    },
}

impl NodeKindDef {
    /// Ids of the nodes feeding this one, in input-socket order.
    pub fn input_ids(&self) -> Vec<&str> {
        match self {
            Self::ColorFill { .. } | Self::Gradient { .. } => Vec::new(),
            Self::Invert { input } | Self::Opacity { input, .. } | Self::Output { input } => {
                vec![input.as_str()]
            }
            Self::Mix { a, b, .. } => vec![a.as_str(), b.as_str()],
        }
    }

    fn mix_factor(&self) -> Option<f64> {
        match self {
            Self::Opacity { factor, .. } | Self::Mix { factor, .. } => Some(*factor),
            _ => None,
        }
    }
}

/// Input description of a compositing graph to execute.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GraphDescription {
    /// Output canvas extents.
    pub canvas: Canvas,
    /// Execution strategy selector.
    #[serde(default)]
    pub execution_model: ExecutionModelKind,
    /// Quality used for final-render passes.
    #[serde(default)]
    pub render_quality: Quality,
    /// Quality used for interactive edit passes.
    #[serde(default)]
    pub edit_quality: Quality,
    /// Whether the graph opts in to accelerated compute devices.
    #[serde(default)]
    pub use_accelerated: bool,
    /// Graph nodes. Order carries no meaning; connectivity does.
    pub nodes: Vec<NodeDef>,
}

impl GraphDescription {
    /// Validate local well-formedness.
    ///
    /// Checks canvas extents, id uniqueness, reference resolution, factor
    /// ranges, and that at least one output node exists. Acyclicity is
    /// checked by the graph builder's topological walk, not here.
    pub fn validate(&self) -> TesseraResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(TesseraError::validation("canvas extents must be non-zero"));
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if node.id.is_empty() {
                return Err(TesseraError::validation("node id must be non-empty"));
            }
            if !ids.insert(node.id.as_str()) {
                return Err(TesseraError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut has_output = false;
        for node in &self.nodes {
            for input in node.kind.input_ids() {
                if !ids.contains(input) {
                    return Err(TesseraError::validation(format!(
                        "node '{}' references unknown input '{input}'",
                        node.id
                    )));
                }
            }
            if let Some(factor) = node.kind.mix_factor()
                && !(0.0..=1.0).contains(&factor)
            {
                return Err(TesseraError::validation(format!(
                    "node '{}' factor must be within [0, 1]",
                    node.id
                )));
            }
            if matches!(node.kind, NodeKindDef::Output { .. }) {
                has_output = true;
            }
        }

        if !has_output {
            return Err(TesseraError::validation(
                "graph must contain at least one output node",
            ));
        }
        Ok(())
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
