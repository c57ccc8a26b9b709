//! Graph construction
//!
//! Turns a [`HierarchyStore`] snapshot into a typed node/edge graph. The
//! build is pure: the same snapshot and filters always give the same nodes,
//! edges and colors.
//!
//! Node identity is structural. Targets are keyed by name, capabilities by
//! (target, capability), requirements by (target, capability, requirement)
//! and proximate targets by name alone, so a proximate target referenced
//! from several subtrees is a single node with several inbound edges.

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::models::HierarchyStore;
use crate::shared::{detect_shared_entities, SharedIndex};

/// Colors cycled by target ordinal
pub const DEFAULT_PALETTE: [&str; 10] = [
    "#1F77B4", "#FF7F0E", "#2CA02C", "#D62728", "#9467BD", "#8C564B", "#E377C2", "#17BECF",
    "#BCBD22", "#AEC7E8",
];

/// Neutral color for proximate targets shared by several targets
pub const DEFAULT_SHARED_COLOR: &str = "#9E9E9E";

/// Kind of a node in the built graph, in legend order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Target,
    Capability,
    Requirement,
    ProximateTarget,
}

impl NodeKind {
    pub const ALL: [NodeKind; 4] = [
        NodeKind::Target,
        NodeKind::Capability,
        NodeKind::Requirement,
        NodeKind::ProximateTarget,
    ];

    /// Legend label
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Target => "Ultimate Target",
            NodeKind::Capability => "Critical Capability",
            NodeKind::Requirement => "Critical Requirement",
            NodeKind::ProximateTarget => "Proximate Target",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Composite node key.
///
/// The `Display` form (`ut:…`, `cap:…/…`, `req:…/…/…`, `pt:…`) is the one
/// string encoding used wherever a node id leaves the graph (layouts,
/// payloads, JSON).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Target(String),
    Capability(String, String),
    Requirement(String, String, String),
    ProximateTarget(String),
}

impl NodeId {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Target(_) => NodeKind::Target,
            NodeId::Capability(..) => NodeKind::Capability,
            NodeId::Requirement(..) => NodeKind::Requirement,
            NodeId::ProximateTarget(_) => NodeKind::ProximateTarget,
        }
    }

    /// Display name of the node itself (last path component)
    pub fn name(&self) -> &str {
        match self {
            NodeId::Target(name)
            | NodeId::Capability(_, name)
            | NodeId::Requirement(_, _, name)
            | NodeId::ProximateTarget(name) => name,
        }
    }
}

/// Escapes `\` and `/` so path components never run into the separator
fn escape_component(name: &str) -> Cow<'_, str> {
    if name.contains(['/', '\\']) {
        Cow::Owned(name.replace('\\', "\\\\").replace('/', "\\/"))
    } else {
        Cow::Borrowed(name)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Target(ut) => write!(f, "ut:{}", ut),
            NodeId::Capability(ut, cap) => {
                write!(f, "cap:{}/{}", escape_component(ut), escape_component(cap))
            }
            NodeId::Requirement(ut, cap, req) => write!(
                f,
                "req:{}/{}/{}",
                escape_component(ut),
                escape_component(cap),
                escape_component(req)
            ),
            NodeId::ProximateTarget(pt) => write!(f, "pt:{}", pt),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Level-collapsing filters.
///
/// A hidden level is not materialized; its children attach to the nearest
/// level above it that is still shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GraphFilters {
    pub hide_requirements: bool,
    pub hide_capabilities: bool,
}

impl GraphFilters {
    pub fn new(hide_requirements: bool, hide_capabilities: bool) -> Self {
        Self {
            hide_requirements,
            hide_capabilities,
        }
    }

    pub fn shows(&self, kind: NodeKind) -> bool {
        match kind {
            NodeKind::Capability => !self.hide_capabilities,
            NodeKind::Requirement => !self.hide_requirements,
            NodeKind::Target | NodeKind::ProximateTarget => true,
        }
    }
}

/// Structural ancestors of a node, ending at its direct parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AncestorPath<'a> {
    /// Parent is the target (capability nodes)
    Target(&'a str),
    /// Parent is the capability (requirement nodes)
    Capability(&'a str, &'a str),
    /// Parent is the requirement (proximate target nodes)
    Requirement(&'a str, &'a str, &'a str),
}

/// A node that can act as a parent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Target(String),
    Capability(String, String),
    Requirement(String, String, String),
}

impl From<ParentRef> for NodeId {
    fn from(parent: ParentRef) -> Self {
        match parent {
            ParentRef::Target(ut) => NodeId::Target(ut),
            ParentRef::Capability(ut, cap) => NodeId::Capability(ut, cap),
            ParentRef::Requirement(ut, cap, req) => NodeId::Requirement(ut, cap, req),
        }
    }
}

/// Finds the closest ancestor that is materialized under `filters`.
///
/// Only hidden levels are skipped. Targets are never hidden, so there is
/// always an answer.
pub fn nearest_visible_ancestor(path: AncestorPath<'_>, filters: GraphFilters) -> ParentRef {
    match path {
        AncestorPath::Requirement(ut, cap, req) if !filters.hide_requirements => {
            ParentRef::Requirement(ut.to_string(), cap.to_string(), req.to_string())
        }
        AncestorPath::Requirement(ut, cap, _) | AncestorPath::Capability(ut, cap)
            if !filters.hide_capabilities =>
        {
            ParentRef::Capability(ut.to_string(), cap.to_string())
        }
        AncestorPath::Requirement(ut, ..) | AncestorPath::Capability(ut, _) | AncestorPath::Target(ut) => {
            ParentRef::Target(ut.to_string())
        }
    }
}

/// Group colors for targets plus the shared-entity override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<String>,
    shared: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            shared: DEFAULT_SHARED_COLOR.to_string(),
        }
    }
}

impl Palette {
    /// Builds a palette; an empty color list falls back to the default colors
    pub fn new(colors: Vec<String>, shared: String) -> Self {
        let colors = if colors.is_empty() {
            Palette::default().colors
        } else {
            colors
        };
        Self { colors, shared }
    }

    /// Color for the target at `ordinal`, cycling through the palette
    pub fn color_for(&self, ordinal: usize) -> &str {
        &self.colors[ordinal % self.colors.len()]
    }

    pub fn shared(&self) -> &str {
        &self.shared
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    pub group_color: String,
    /// Proximate target referenced by two or more targets
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Edges pointing at `id`
    pub fn inbound(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.target == id).collect()
    }

    /// Edges leaving `id`
    pub fn outbound(&self, id: &NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|e| &e.source == id).collect()
    }
}

/// Accumulates nodes and edges, merging repeated keys
struct GraphBuilder<'a> {
    palette: &'a Palette,
    shared: &'a SharedIndex,
    filters: GraphFilters,
    graph: Graph,
    seen_nodes: HashSet<NodeId>,
    seen_edges: HashSet<Edge>,
}

impl<'a> GraphBuilder<'a> {
    fn new(palette: &'a Palette, shared: &'a SharedIndex, filters: GraphFilters) -> Self {
        Self {
            palette,
            shared,
            filters,
            graph: Graph::default(),
            seen_nodes: HashSet::new(),
            seen_edges: HashSet::new(),
        }
    }

    fn add_node(&mut self, id: NodeId, group_color: &str, shared: bool) {
        if !self.seen_nodes.insert(id.clone()) {
            return;
        }
        self.graph.nodes.push(Node {
            label: id.name().to_string(),
            kind: id.kind(),
            id,
            group_color: group_color.to_string(),
            shared,
        });
    }

    fn link(&mut self, path: AncestorPath<'_>, child: &NodeId) {
        let edge = Edge {
            source: nearest_visible_ancestor(path, self.filters).into(),
            target: child.clone(),
        };
        if self.seen_edges.insert(edge.clone()) {
            self.graph.edges.push(edge);
        }
    }

    fn add_store(&mut self, store: &HierarchyStore) {
        let palette = self.palette;
        let shared_index = self.shared;

        // A repeated target name keeps the color of its first entry
        let mut target_colors: HashMap<&str, &str> = HashMap::new();
        for (ordinal, ut) in store.targets.iter().enumerate() {
            target_colors
                .entry(ut.name.as_str())
                .or_insert_with(|| palette.color_for(ordinal));
        }

        for ut in &store.targets {
            let color = target_colors[ut.name.as_str()];
            self.add_node(NodeId::Target(ut.name.clone()), color, false);

            for cap in &ut.capabilities {
                if self.filters.shows(NodeKind::Capability) {
                    let id = NodeId::Capability(ut.name.clone(), cap.name.clone());
                    self.add_node(id.clone(), color, false);
                    self.link(AncestorPath::Target(&ut.name), &id);
                }

                for req in &cap.requirements {
                    if self.filters.shows(NodeKind::Requirement) {
                        let id = NodeId::Requirement(ut.name.clone(), cap.name.clone(), req.name.clone());
                        self.add_node(id.clone(), color, false);
                        self.link(AncestorPath::Capability(&ut.name, &cap.name), &id);
                    }

                    for pt in &req.proximate_targets {
                        let shared = shared_index.is_shared(pt);
                        let pt_color = if shared { palette.shared() } else { color };
                        let id = NodeId::ProximateTarget(pt.clone());
                        self.add_node(id.clone(), pt_color, shared);
                        self.link(AncestorPath::Requirement(&ut.name, &cap.name, &req.name), &id);
                    }
                }
            }
        }
    }
}

/// Builds the graph for `store` with the default palette
pub fn build_graph(store: &HierarchyStore, filters: GraphFilters) -> Graph {
    build_graph_with_palette(store, filters, &Palette::default())
}

/// Builds the graph for `store`, coloring targets from `palette`
pub fn build_graph_with_palette(store: &HierarchyStore, filters: GraphFilters, palette: &Palette) -> Graph {
    let shared = detect_shared_entities(store);
    let mut builder = GraphBuilder::new(palette, &shared, filters);
    builder.add_store(store);

    let graph = builder.graph;
    log::debug!(
        "built graph: {} nodes, {} edges, {} shared proximate targets (hide_requirements={}, hide_capabilities={})",
        graph.nodes.len(),
        graph.edges.len(),
        shared.shared_names().len(),
        filters.hide_requirements,
        filters.hide_capabilities,
    );
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ut(name: &str) -> NodeId {
        NodeId::Target(name.into())
    }

    fn cap(ut: &str, cap: &str) -> NodeId {
        NodeId::Capability(ut.into(), cap.into())
    }

    fn req(ut: &str, cap: &str, req: &str) -> NodeId {
        NodeId::Requirement(ut.into(), cap.into(), req.into())
    }

    fn pt(name: &str) -> NodeId {
        NodeId::ProximateTarget(name.into())
    }

    #[test]
    fn test_nearest_visible_ancestor_all_shown() {
        let filters = GraphFilters::default();
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Requirement("A", "C", "R"), filters),
            ParentRef::Requirement("A".into(), "C".into(), "R".into())
        );
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Capability("A", "C"), filters),
            ParentRef::Capability("A".into(), "C".into())
        );
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Target("A"), filters),
            ParentRef::Target("A".into())
        );
    }

    #[test]
    fn test_nearest_visible_ancestor_hide_requirements() {
        let filters = GraphFilters::new(true, false);
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Requirement("A", "C", "R"), filters),
            ParentRef::Capability("A".into(), "C".into())
        );
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Capability("A", "C"), filters),
            ParentRef::Capability("A".into(), "C".into())
        );
    }

    #[test]
    fn test_nearest_visible_ancestor_hide_capabilities() {
        let filters = GraphFilters::new(false, true);
        // Requirement level is shown, so it must not be skipped
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Requirement("A", "C", "R"), filters),
            ParentRef::Requirement("A".into(), "C".into(), "R".into())
        );
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Capability("A", "C"), filters),
            ParentRef::Target("A".into())
        );
    }

    #[test]
    fn test_nearest_visible_ancestor_hide_both() {
        let filters = GraphFilters::new(true, true);
        assert_eq!(
            nearest_visible_ancestor(AncestorPath::Requirement("A", "C", "R"), filters),
            ParentRef::Target("A".into())
        );
    }

    #[test]
    fn test_node_id_encoding() {
        assert_eq!(ut("Group X").to_string(), "ut:Group X");
        assert_eq!(cap("Group X", "Logistics").to_string(), "cap:Group X/Logistics");
        assert_eq!(
            req("Group X", "Logistics", "Fuel Supply").to_string(),
            "req:Group X/Logistics/Fuel Supply"
        );
        assert_eq!(pt("Port Authority").to_string(), "pt:Port Authority");
        assert_eq!(req("A", "B", "C").name(), "C");
        assert_eq!(
            serde_json::to_string(&pt("Port Authority")).unwrap(),
            "\"pt:Port Authority\""
        );
    }

    #[test]
    fn test_node_id_escapes_separator() {
        assert_eq!(cap("A", "//").to_string(), "cap:A/\\/\\/");
        assert_ne!(cap("A", "//").to_string(), cap("A/", "/").to_string());
        assert_ne!(
            req("A", "B/C", "D").to_string(),
            req("A/B", "C", "D").to_string()
        );
        assert_ne!(cap("A\\", "/").to_string(), cap("A", "\\/").to_string());
    }

    #[test]
    fn test_palette_cycles() {
        let palette = Palette::new(vec!["#111111".into(), "#222222".into()], "#999999".into());
        assert_eq!(palette.color_for(0), "#111111");
        assert_eq!(palette.color_for(1), "#222222");
        assert_eq!(palette.color_for(2), "#111111");
        assert_eq!(palette.shared(), "#999999");
    }

    #[test]
    fn test_empty_palette_falls_back() {
        let palette = Palette::new(Vec::new(), DEFAULT_SHARED_COLOR.into());
        assert_eq!(palette.colors().len(), DEFAULT_PALETTE.len());
    }

    #[test]
    fn test_empty_store_gives_empty_graph() {
        let graph = build_graph(&HierarchyStore::new(), GraphFilters::default());
        assert!(graph.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_full_chain() {
        let mut store = HierarchyStore::new();
        store.add_ultimate_target("Group X").unwrap();
        store.add_capability("Group X", "Logistics").unwrap();
        store.add_requirement("Group X", "Logistics", "Fuel Supply").unwrap();
        store
            .add_proximate_target_reference("Group X", "Logistics", "Fuel Supply", "Depot")
            .unwrap();

        let graph = build_graph(&store, GraphFilters::default());
        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);

        let depot = graph.node(&pt("Depot")).unwrap();
        assert_eq!(depot.group_color, DEFAULT_PALETTE[0]);
        assert!(!depot.shared);
        assert_eq!(
            graph.inbound(&pt("Depot"))[0].source,
            req("Group X", "Logistics", "Fuel Supply")
        );
        assert_eq!(graph.outbound(&ut("Group X")).len(), 1);
    }

    #[test]
    fn test_repeated_reference_under_collapsed_level_gives_one_edge() {
        let mut store = HierarchyStore::new();
        store.add_ultimate_target("Group X").unwrap();
        store.add_capability("Group X", "Logistics").unwrap();
        for r in ["Fuel Supply", "Spare Parts"] {
            store.add_requirement("Group X", "Logistics", r).unwrap();
            store
                .add_proximate_target_reference("Group X", "Logistics", r, "Depot")
                .unwrap();
        }

        let shown = build_graph(&store, GraphFilters::default());
        assert_eq!(shown.inbound(&pt("Depot")).len(), 2);

        let collapsed = build_graph(&store, GraphFilters::new(true, false));
        let inbound = collapsed.inbound(&pt("Depot"));
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].source, cap("Group X", "Logistics"));
    }

    #[test]
    fn test_intermediate_nodes_take_target_color() {
        let mut store = HierarchyStore::new();
        store.add_ultimate_target("A").unwrap();
        store.add_ultimate_target("B").unwrap();
        store.add_capability("B", "Finance").unwrap();
        store.add_requirement("B", "Finance", "Banks").unwrap();

        let graph = build_graph(&store, GraphFilters::default());
        assert_eq!(graph.node(&ut("B")).unwrap().group_color, DEFAULT_PALETTE[1]);
        assert_eq!(graph.node(&cap("B", "Finance")).unwrap().group_color, DEFAULT_PALETTE[1]);
        assert_eq!(
            graph.node(&req("B", "Finance", "Banks")).unwrap().group_color,
            DEFAULT_PALETTE[1]
        );
    }

    #[test]
    fn test_custom_palette() {
        let mut store = HierarchyStore::new();
        store.add_ultimate_target("A").unwrap();
        let palette = Palette::new(vec!["#000001".into()], "#FFFFFF".into());
        let graph = build_graph_with_palette(&store, GraphFilters::default(), &palette);
        assert_eq!(graph.nodes[0].group_color, "#000001");
    }

    #[test]
    fn test_filters_shows() {
        let filters = GraphFilters::new(true, false);
        assert!(filters.shows(NodeKind::Target));
        assert!(filters.shows(NodeKind::Capability));
        assert!(!filters.shows(NodeKind::Requirement));
        assert!(filters.shows(NodeKind::ProximateTarget));
    }

    #[test]
    fn test_repeated_target_name_keeps_first_color() {
        let yaml = "targets:\n  - name: group x\n  - name: Group X\n    capabilities:\n      - name: Logistics\n        requirements:\n          - name: Fuel Supply\n            proximate_targets: [Tanker Fleet]\n";
        let mut store: HierarchyStore = serde_yaml::from_str(yaml).unwrap();
        store.normalize_names();
        assert_eq!(store.targets.len(), 2);

        let graph = build_graph(&store, GraphFilters::default());
        assert_eq!(graph.nodes_of_kind(NodeKind::Target).count(), 1);
        for id in [
            ut("Group X"),
            cap("Group X", "Logistics"),
            req("Group X", "Logistics", "Fuel Supply"),
            pt("Tanker Fleet"),
        ] {
            assert_eq!(graph.node(&id).unwrap().group_color, DEFAULT_PALETTE[0], "{}", id);
        }
    }
}
