use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::graph::Graph;
use crate::models::HierarchyStore;
use crate::shared::SharedIndex;
use crate::viz::Payload;

/// Serializes a built graph as pretty JSON
pub fn graph_to_json(graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Serializes a render payload as pretty JSON
pub fn payload_to_json(payload: &Payload) -> Result<String> {
    Ok(serde_json::to_string_pretty(payload)?)
}

/// Export a built graph to a JSON file
pub fn export_graph_json(graph: &Graph, output_path: &Path) -> Result<()> {
    fs::write(output_path, graph_to_json(graph)?)
        .with_context(|| format!("Failed to write {:?}", output_path))?;
    log::info!(
        "exported graph ({} nodes, {} edges) to {}",
        graph.nodes.len(),
        graph.edges.len(),
        output_path.display()
    );
    Ok(())
}

/// Export a render payload to a JSON file
pub fn export_payload_json(payload: &Payload, output_path: &Path) -> Result<()> {
    fs::write(output_path, payload_to_json(payload)?)
        .with_context(|| format!("Failed to write {:?}", output_path))?;
    log::info!("exported render payload to {}", output_path.display());
    Ok(())
}

/// Indented text outline of the hierarchy, flagging shared proximate targets
/// with the other targets that reference them
pub fn render_outline(store: &HierarchyStore, shared: &SharedIndex) -> String {
    let mut out = String::new();
    if !store.name.is_empty() {
        let _ = writeln!(out, "# {}", store.name);
    }

    for ut in &store.targets {
        let _ = writeln!(out, "{}", ut.name);
        if !ut.objective.is_empty() {
            let _ = writeln!(out, "  objective: {}", ut.objective);
        }
        for cap in &ut.capabilities {
            let _ = writeln!(out, "  {}", cap.name);
            for req in &cap.requirements {
                let _ = writeln!(out, "    {}", req.name);
                for pt in &req.proximate_targets {
                    if shared.is_shared(pt) {
                        let others: Vec<&str> = shared
                            .owners(pt)
                            .into_iter()
                            .flatten()
                            .filter(|owner| **owner != ut.name)
                            .map(String::as_str)
                            .collect();
                        let _ = writeln!(out, "      {} [shared with {}]", pt, others.join(", "));
                    } else {
                        let _ = writeln!(out, "      {}", pt);
                    }
                }
            }
        }
    }
    out
}
