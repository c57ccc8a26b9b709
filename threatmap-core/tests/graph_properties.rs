use std::collections::{BTreeSet, HashSet};

use threatmap_core::{
    build_graph, detect_shared_entities, render_payload, CircularLayout, Graph, GraphFilters,
    HierarchyStore, LayoutEngine, NodeId, NodeKind, VisualStyle, DEFAULT_PALETTE,
    DEFAULT_SHARED_COLOR,
};

const ALL_FILTERS: [GraphFilters; 4] = [
    GraphFilters {
        hide_requirements: false,
        hide_capabilities: false,
    },
    GraphFilters {
        hide_requirements: true,
        hide_capabilities: false,
    },
    GraphFilters {
        hide_requirements: false,
        hide_capabilities: true,
    },
    GraphFilters {
        hide_requirements: true,
        hide_capabilities: true,
    },
];

fn add_chain(store: &mut HierarchyStore, ut: &str, cap: &str, req: &str, pt: &str) {
    if store.get_target(ut).is_none() {
        store.add_ultimate_target(ut).unwrap();
    }
    if store.get_capability(ut, cap).is_none() {
        store.add_capability(ut, cap).unwrap();
    }
    if store.get_requirement(ut, cap, req).is_none() {
        store.add_requirement(ut, cap, req).unwrap();
    }
    store.add_proximate_target_reference(ut, cap, req, pt).unwrap();
}

/// Group X and Group Y both depend on the Port Authority
fn harbour_scenario() -> HierarchyStore {
    let mut store = HierarchyStore::new();
    add_chain(&mut store, "Group X", "Logistics", "Fuel Supply", "Port Authority");
    add_chain(&mut store, "Group Y", "Recruiting", "Safehouses", "Port Authority");
    store
}

/// A larger hierarchy with repeated names in different scopes
fn mixed_scenario() -> HierarchyStore {
    let mut store = HierarchyStore::new();
    add_chain(&mut store, "Group X", "Logistics", "Fuel Supply", "Port Authority");
    add_chain(&mut store, "Group X", "Logistics", "Fuel Supply", "Tanker Fleet");
    add_chain(&mut store, "Group X", "Finance", "Money Transfer", "Port Authority");
    add_chain(&mut store, "Group X", "Finance", "Money Transfer", "Exchange House");
    add_chain(&mut store, "Group Y", "Logistics", "Fuel Supply", "Tanker Fleet");
    add_chain(&mut store, "Group Y", "Recruiting", "Safehouses", "Local Landlords");
    add_chain(&mut store, "Group Z", "Propaganda", "Broadcast", "Radio Mast");
    store.add_ultimate_target("Group W").unwrap();
    store
}

fn edge_set(graph: &Graph) -> HashSet<(String, String)> {
    graph
        .edges
        .iter()
        .map(|e| (e.source.to_string(), e.target.to_string()))
        .collect()
}

fn node_set(graph: &Graph) -> HashSet<(String, String)> {
    graph
        .nodes
        .iter()
        .map(|n| (n.id.to_string(), n.group_color.clone()))
        .collect()
}

#[test]
fn test_rebuild_is_idempotent() {
    let store = mixed_scenario();
    for filters in ALL_FILTERS {
        let first = build_graph(&store, filters);
        let second = build_graph(&store, filters);
        assert_eq!(first, second);
        assert_eq!(node_set(&first), node_set(&second));
        assert_eq!(edge_set(&first), edge_set(&second));
    }
}

#[test]
fn test_sharing_symmetric_in_build_order() {
    let forward = harbour_scenario();
    let mut reverse = HierarchyStore::new();
    add_chain(&mut reverse, "Group Y", "Recruiting", "Safehouses", "Port Authority");
    add_chain(&mut reverse, "Group X", "Logistics", "Fuel Supply", "Port Authority");

    let expected: BTreeSet<String> = ["Group X", "Group Y"].iter().map(|s| s.to_string()).collect();
    for store in [&forward, &reverse] {
        let index = detect_shared_entities(store);
        assert_eq!(index.owners("Port Authority"), Some(&expected));

        let graph = build_graph(store, GraphFilters::default());
        let pa = graph.node(&NodeId::ProximateTarget("Port Authority".into())).unwrap();
        assert_eq!(pa.group_color, DEFAULT_SHARED_COLOR);
        assert!(pa.shared);
    }
}

#[test]
fn test_unshared_proximate_targets_inherit_target_color() {
    let store = mixed_scenario();
    let index = detect_shared_entities(&store);
    let graph = build_graph(&store, GraphFilters::default());

    for node in graph.nodes_of_kind(NodeKind::ProximateTarget) {
        let owners = index.owners(node.id.name()).unwrap();
        if owners.len() == 1 {
            let owner = owners.iter().next().unwrap();
            let target = graph.node(&NodeId::Target(owner.clone())).unwrap();
            assert_eq!(node.group_color, target.group_color, "{}", node.label);
        } else {
            assert_eq!(node.group_color, DEFAULT_SHARED_COLOR, "{}", node.label);
        }
    }
}

#[test]
fn test_same_target_twice_keeps_target_color() {
    // Port Authority appears under two capabilities of Group X only
    let mut store = HierarchyStore::new();
    add_chain(&mut store, "Group X", "Logistics", "Fuel Supply", "Port Authority");
    add_chain(&mut store, "Group X", "Finance", "Money Transfer", "Port Authority");
    let graph = build_graph(&store, GraphFilters::default());

    let pa = graph.node(&NodeId::ProximateTarget("Port Authority".into())).unwrap();
    assert_eq!(pa.group_color, DEFAULT_PALETTE[0]);
    assert!(!pa.shared);
}

#[test]
fn test_hidden_capabilities_reparent_requirements_to_target() {
    let store = mixed_scenario();
    let graph = build_graph(&store, GraphFilters::new(false, true));

    assert_eq!(graph.nodes_of_kind(NodeKind::Capability).count(), 0);
    for node in graph.nodes_of_kind(NodeKind::Requirement) {
        let inbound = graph.inbound(&node.id);
        assert_eq!(inbound.len(), 1, "{}", node.id);
        let NodeId::Requirement(ut, _, _) = &node.id else {
            panic!("not a requirement: {}", node.id);
        };
        assert_eq!(inbound[0].source, NodeId::Target(ut.clone()));
    }
}

#[test]
fn test_every_intermediate_node_has_one_parent() {
    let store = mixed_scenario();
    for filters in ALL_FILTERS {
        let graph = build_graph(&store, filters);
        for node in &graph.nodes {
            let inbound = graph.inbound(&node.id).len();
            match node.kind {
                NodeKind::Target => assert_eq!(inbound, 0),
                NodeKind::Capability | NodeKind::Requirement => assert_eq!(inbound, 1),
                NodeKind::ProximateTarget => assert!(inbound >= 1),
            }
        }
    }
}

#[test]
fn test_proximate_target_count_invariant_under_filters() {
    let store = mixed_scenario();
    let counts: Vec<usize> = ALL_FILTERS
        .iter()
        .map(|f| build_graph(&store, *f).nodes_of_kind(NodeKind::ProximateTarget).count())
        .collect();
    assert_eq!(counts, vec![5; 4]);
}

#[test]
fn test_harbour_scenario() {
    let store = harbour_scenario();
    let graph = build_graph(&store, GraphFilters::default());

    let pts: Vec<_> = graph.nodes_of_kind(NodeKind::ProximateTarget).collect();
    assert_eq!(pts.len(), 1);
    assert_eq!(pts[0].label, "Port Authority");
    assert_eq!(pts[0].group_color, DEFAULT_SHARED_COLOR);

    let x = graph.node(&NodeId::Target("Group X".into())).unwrap();
    let y = graph.node(&NodeId::Target("Group Y".into())).unwrap();
    assert_eq!(x.group_color, DEFAULT_PALETTE[0]);
    assert_eq!(y.group_color, DEFAULT_PALETTE[1]);

    let collapsed = build_graph(&store, GraphFilters::new(true, false));
    let sources: HashSet<NodeId> = collapsed
        .inbound(&NodeId::ProximateTarget("Port Authority".into()))
        .into_iter()
        .map(|e| e.source.clone())
        .collect();
    let expected: HashSet<NodeId> = [
        NodeId::Capability("Group X".into(), "Logistics".into()),
        NodeId::Capability("Group Y".into(), "Recruiting".into()),
    ]
    .into_iter()
    .collect();
    assert_eq!(sources, expected);
}

#[test]
fn test_single_target_without_capabilities() {
    let mut store = HierarchyStore::new();
    store.add_ultimate_target("Lone Actor").unwrap();

    for filters in ALL_FILTERS {
        let graph = build_graph(&store, filters);
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, NodeId::Target("Lone Actor".into()));
        assert!(graph.edges.is_empty());
    }
}

#[test]
fn test_palette_cycles_past_its_length() {
    let mut store = HierarchyStore::new();
    for i in 0..=DEFAULT_PALETTE.len() {
        store.add_ultimate_target(&format!("Actor {}", i)).unwrap();
    }
    let graph = build_graph(&store, GraphFilters::default());
    let last = graph.node(&NodeId::Target(format!("Actor {}", DEFAULT_PALETTE.len()))).unwrap();
    assert_eq!(last.group_color, DEFAULT_PALETTE[0]);
}

#[test]
fn test_deleting_requirement_keeps_shared_node() {
    let mut store = harbour_scenario();
    store.delete_requirement("Group X", "Logistics", "Fuel Supply").unwrap();
    let graph = build_graph(&store, GraphFilters::default());

    let pa = graph.node(&NodeId::ProximateTarget("Port Authority".into())).unwrap();
    assert!(!pa.shared);
    assert_eq!(pa.group_color, DEFAULT_PALETTE[1]);
    assert_eq!(graph.inbound(&pa.id).len(), 1);
}

#[test]
fn test_render_full_pipeline() {
    let store = mixed_scenario();
    for filters in ALL_FILTERS {
        let graph = build_graph(&store, filters);
        let layout = CircularLayout::default().layout(&graph);
        let payload = render_payload(&graph, &layout, &VisualStyle::for_filters(filters)).unwrap();

        assert_eq!(payload.nodes.len(), 4);
        assert_eq!(payload.legend.len(), 4);
        assert_eq!(payload.edges.segment_count(), graph.edges.len());
        let drawn: usize = payload.nodes.iter().map(|t| t.ids.len()).sum();
        assert_eq!(drawn, graph.nodes.len());
    }
}
