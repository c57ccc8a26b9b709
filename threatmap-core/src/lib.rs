pub mod config;
pub mod export;
pub mod graph;
pub mod models;
pub mod names;
pub mod shared;
pub mod storage;
pub mod viz;

// Re-export commonly used types
pub use config::{determine_workspace_path, get_config_path, Config, WorkspaceEntry};
pub use graph::{
    build_graph, build_graph_with_palette, nearest_visible_ancestor, AncestorPath, Edge, Graph,
    GraphFilters, Node, NodeId, NodeKind, Palette, ParentRef, DEFAULT_PALETTE, DEFAULT_SHARED_COLOR,
};
pub use models::{
    Capability, CriticalRequirement, HierarchyError, HierarchyStats, HierarchyStore, Level,
    ReferencePath, UltimateTarget,
};
pub use names::normalize_name;
pub use shared::{detect_shared_entities, SharedIndex};
pub use storage::{Storage, StorageError};
pub use viz::{
    render_payload, CircularLayout, EdgeTrace, Layout, LayoutEngine, LegendTrace, NodeTrace,
    Payload, Position, VisualStyle, VizError,
};
