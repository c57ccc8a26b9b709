//! Visualization adapter
//!
//! Converts a built [`Graph`] plus node positions into drawable traces:
//! one batched edge line-set, one node trace per [`NodeKind`], and one
//! legend-only placeholder per kind so the legend is complete even when a
//! kind has no nodes.
//!
//! Graph inclusion (the [`GraphFilters`] used at build time) and visual
//! de-emphasis ([`VisualStyle`]) are separate knobs. A renderer may dim a
//! level that is still materialized.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::TAU;
use thiserror::Error;

use crate::graph::{Graph, GraphFilters, NodeKind};

/// Errors produced while building a render payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VizError {
    #[error("No layout position for node {0}")]
    MissingPosition(String),

    #[error("Layout position for node {0} is not finite")]
    NonFinitePosition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node positions keyed by the node id's string form
pub type Layout = HashMap<String, Position>;

/// A layout algorithm assigning a position to every node of a graph
pub trait LayoutEngine {
    fn layout(&self, graph: &Graph) -> Layout;
}

/// Deterministic concentric layout: one ring per node kind, targets
/// innermost, nodes spread evenly around their ring in graph order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularLayout {
    /// Radius of the outermost ring
    pub radius: f64,
}

impl Default for CircularLayout {
    fn default() -> Self {
        Self { radius: 1.0 }
    }
}

impl LayoutEngine for CircularLayout {
    fn layout(&self, graph: &Graph) -> Layout {
        let mut layout = Layout::with_capacity(graph.nodes.len());
        let rings = NodeKind::ALL.len() as f64;
        for (ring, kind) in NodeKind::ALL.iter().enumerate() {
            let members: Vec<_> = graph.nodes_of_kind(*kind).collect();
            let r = self.radius * (ring as f64 + 1.0) / rings;
            let count = members.len().max(1) as f64;
            for (i, node) in members.iter().enumerate() {
                let angle = TAU * i as f64 / count;
                layout.insert(node.id.to_string(), Position::new(r * angle.cos(), r * angle.sin()));
            }
        }
        layout
    }
}

/// Purely visual de-emphasis of the intermediate levels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualStyle {
    pub dim_capabilities: bool,
    pub dim_requirements: bool,
    /// Opacity applied to dimmed kinds
    pub dimmed_opacity: f64,
}

impl Default for VisualStyle {
    fn default() -> Self {
        Self {
            dim_capabilities: false,
            dim_requirements: false,
            dimmed_opacity: 0.3,
        }
    }
}

impl VisualStyle {
    /// Style that dims whichever levels the build filters collapsed
    pub fn for_filters(filters: GraphFilters) -> Self {
        Self {
            dim_capabilities: filters.hide_capabilities,
            dim_requirements: filters.hide_requirements,
            ..Self::default()
        }
    }

    pub fn opacity(&self, kind: NodeKind) -> f64 {
        let dimmed = match kind {
            NodeKind::Capability => self.dim_capabilities,
            NodeKind::Requirement => self.dim_requirements,
            NodeKind::Target | NodeKind::ProximateTarget => false,
        };
        if dimmed {
            self.dimmed_opacity
        } else {
            1.0
        }
    }
}

/// Marker symbol and size per kind
fn marker(kind: NodeKind) -> (&'static str, f64) {
    match kind {
        NodeKind::Target => ("diamond", 22.0),
        NodeKind::Capability => ("square", 16.0),
        NodeKind::Requirement => ("triangle-up", 13.0),
        NodeKind::ProximateTarget => ("circle", 11.0),
    }
}

const EDGE_COLOR: &str = "#888888";
const LEGEND_COLOR: &str = "#444444";

/// All edges as one line-set; `None` separates segments
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeTrace {
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub color: String,
    pub width: f64,
}

impl EdgeTrace {
    pub fn segment_count(&self) -> usize {
        self.x.iter().filter(|v| v.is_none()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTrace {
    pub kind: NodeKind,
    pub name: String,
    pub ids: Vec<String>,
    pub labels: Vec<String>,
    pub hover: Vec<String>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub colors: Vec<String>,
    pub symbol: String,
    pub size: f64,
    pub opacity: f64,
    /// Legend entries come from [`LegendTrace`]
    pub show_legend: bool,
}

/// Legend-only placeholder with no points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendTrace {
    pub kind: NodeKind,
    pub name: String,
    pub color: String,
    pub symbol: String,
    pub size: f64,
    pub opacity: f64,
    pub show_legend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub edges: EdgeTrace,
    pub nodes: Vec<NodeTrace>,
    pub legend: Vec<LegendTrace>,
}

impl Payload {
    pub fn node_trace(&self, kind: NodeKind) -> Option<&NodeTrace> {
        self.nodes.iter().find(|t| t.kind == kind)
    }
}

fn position_of(layout: &Layout, id: &str) -> Result<Position, VizError> {
    let pos = layout
        .get(id)
        .copied()
        .ok_or_else(|| VizError::MissingPosition(id.to_string()))?;
    if !pos.x.is_finite() || !pos.y.is_finite() {
        return Err(VizError::NonFinitePosition(id.to_string()));
    }
    Ok(pos)
}

/// Builds the drawable payload for `graph` positioned by `layout`
pub fn render_payload(graph: &Graph, layout: &Layout, style: &VisualStyle) -> Result<Payload, VizError> {
    let mut edges = EdgeTrace {
        color: EDGE_COLOR.to_string(),
        width: 1.0,
        ..EdgeTrace::default()
    };
    for edge in &graph.edges {
        let from = position_of(layout, &edge.source.to_string())?;
        let to = position_of(layout, &edge.target.to_string())?;
        edges.x.extend([Some(from.x), Some(to.x), None]);
        edges.y.extend([Some(from.y), Some(to.y), None]);
    }

    let mut nodes = Vec::with_capacity(NodeKind::ALL.len());
    let mut legend = Vec::with_capacity(NodeKind::ALL.len());
    for kind in NodeKind::ALL {
        let (symbol, size) = marker(kind);
        let opacity = style.opacity(kind);

        let mut trace = NodeTrace {
            kind,
            name: kind.label().to_string(),
            ids: Vec::new(),
            labels: Vec::new(),
            hover: Vec::new(),
            x: Vec::new(),
            y: Vec::new(),
            colors: Vec::new(),
            symbol: symbol.to_string(),
            size,
            opacity,
            show_legend: false,
        };
        for node in graph.nodes_of_kind(kind) {
            let id = node.id.to_string();
            let pos = position_of(layout, &id)?;
            trace.hover.push(if node.shared {
                format!("{} ({}, shared)", node.label, kind.label())
            } else {
                format!("{} ({})", node.label, kind.label())
            });
            trace.ids.push(id);
            trace.labels.push(node.label.clone());
            trace.x.push(pos.x);
            trace.y.push(pos.y);
            trace.colors.push(node.group_color.clone());
        }
        nodes.push(trace);

        legend.push(LegendTrace {
            kind,
            name: kind.label().to_string(),
            color: LEGEND_COLOR.to_string(),
            symbol: symbol.to_string(),
            size,
            opacity,
            show_legend: true,
        });
    }

    log::debug!(
        "rendered payload: {} edge segments, {} node traces",
        edges.segment_count(),
        nodes.len()
    );
    Ok(Payload { edges, nodes, legend })
}
