mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use threatmap_core::{
    build_graph_with_palette, detect_shared_entities, determine_workspace_path, export,
    get_config_path, render_payload, CircularLayout, Config, Graph, GraphFilters, LayoutEngine,
    NodeKind, Storage, VisualStyle,
};

use crate::cli::{
    CapabilityCommand, Cli, Command, FilterArgs, GraphFormat, ProximateTargetCommand,
    RequirementCommand, TargetCommand, WorkspaceCommand,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = get_config_path()?;
    let config = Config::load(&config_path)?;

    let open_storage = || -> Result<Storage> {
        let path = determine_workspace_path(&config, cli.file.as_deref(), cli.workspace.as_deref())?;
        log::debug!("using workspace {:?}", path);
        Ok(Storage::new(path))
    };

    match &cli.command {
        Command::Target(cmd) => handle_target_command(cmd, &open_storage()?)?,
        Command::Capability(cmd) => handle_capability_command(cmd, &open_storage()?)?,
        Command::Requirement(cmd) => handle_requirement_command(cmd, &open_storage()?)?,
        Command::Pt(cmd) => handle_pt_command(cmd, &open_storage()?)?,
        Command::Show => show_outline(&open_storage()?)?,
        Command::Shared => show_shared(&open_storage()?)?,
        Command::Stats => show_stats(&open_storage()?)?,
        Command::Graph {
            filters,
            format,
            output,
        } => handle_graph_command(&open_storage()?, &config, *filters, *format, output.as_deref())?,
        Command::Render {
            filters,
            dim_capabilities,
            dim_requirements,
            radius,
            output,
        } => {
            let filters = to_filters(*filters);
            let base = VisualStyle::for_filters(filters);
            let style = VisualStyle {
                dim_capabilities: base.dim_capabilities || *dim_capabilities,
                dim_requirements: base.dim_requirements || *dim_requirements,
                ..base
            };
            handle_render_command(&open_storage()?, &config, filters, style, *radius, output.as_deref())?
        }
        // Registry commands don't touch a workspace file
        Command::Workspace(cmd) => handle_workspace_command(cmd, config.clone(), &config_path, &cli)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn to_filters(args: FilterArgs) -> GraphFilters {
    GraphFilters::new(args.hide_requirements, args.hide_capabilities)
}

/// Asks for confirmation unless `skip` is set
fn confirm(prompt: &str, skip: bool) -> Result<bool> {
    if skip {
        return Ok(true);
    }
    let confirmed = inquire::Confirm::new(prompt).with_default(false).prompt()?;
    if !confirmed {
        println!("{}", "Deletion cancelled.".yellow());
    }
    Ok(confirmed)
}

fn handle_target_command(cmd: &TargetCommand, storage: &Storage) -> Result<()> {
    match cmd {
        TargetCommand::Add { name, objective } => {
            let (_, added) = storage.update_atomically(|store| {
                let added = store.add_ultimate_target(name)?;
                if let Some(objective) = objective {
                    store.set_objective(&added, objective)?;
                }
                Ok(added)
            })?;
            println!("{} {}", "Ultimate target added:".green(), added);
        }
        TargetCommand::Rename { name, new_name } => {
            let (_, renamed) =
                storage.update_atomically(|store| Ok(store.rename_ultimate_target(name, new_name)?))?;
            println!("{} {} -> {}", "Renamed:".green(), name, renamed);
        }
        TargetCommand::Delete { name, yes } => {
            let store = storage.load()?;
            let target = store
                .get_target(name)
                .with_context(|| format!("Ultimate target not found: {}", name))?;
            println!("{}", "Ultimate target to delete:".yellow());
            println!("  Name: {}", target.name);
            println!("  Capabilities: {}", target.capabilities.len());

            if confirm("Delete this ultimate target and everything below it?", *yes)? {
                storage.update_atomically(|store| Ok(store.delete_ultimate_target(name)?))?;
                println!("{}", "Ultimate target deleted.".green());
            }
        }
        TargetCommand::Objective { name, objective } => {
            storage.update_atomically(|store| Ok(store.set_objective(name, objective)?))?;
            println!("{}", "Objective updated.".green());
        }
        TargetCommand::List => {
            let store = storage.load()?;
            if store.targets.is_empty() {
                println!("{}", "No ultimate targets found.".yellow());
                return Ok(());
            }
            println!("{:<4} | {:<30} | {:<5} | {}", "#", "Name", "Caps", "Objective");
            println!("{}", "-".repeat(80));
            for (ordinal, target) in store.targets.iter().enumerate() {
                println!(
                    "{:<4} | {:<30} | {:<5} | {}",
                    ordinal,
                    target.name.bold(),
                    target.capabilities.len(),
                    target.objective
                );
            }
        }
    }
    Ok(())
}

fn handle_capability_command(cmd: &CapabilityCommand, storage: &Storage) -> Result<()> {
    match cmd {
        CapabilityCommand::Add { target, name } => {
            let (_, added) = storage.update_atomically(|store| Ok(store.add_capability(target, name)?))?;
            println!("{} {}", "Capability added:".green(), added);
        }
        CapabilityCommand::Rename {
            target,
            name,
            new_name,
        } => {
            let (_, renamed) = storage
                .update_atomically(|store| Ok(store.rename_capability(target, name, new_name)?))?;
            println!("{} {} -> {}", "Renamed:".green(), name, renamed);
        }
        CapabilityCommand::Delete { target, name, yes } => {
            let store = storage.load()?;
            let capability = store
                .get_capability(target, name)
                .with_context(|| format!("Capability not found: {} / {}", target, name))?;
            println!("{}", "Capability to delete:".yellow());
            println!("  Name: {}", capability.name);
            println!("  Requirements: {}", capability.requirements.len());

            if confirm("Delete this capability and its requirements?", *yes)? {
                storage.update_atomically(|store| Ok(store.delete_capability(target, name)?))?;
                println!("{}", "Capability deleted.".green());
            }
        }
    }
    Ok(())
}

fn handle_requirement_command(cmd: &RequirementCommand, storage: &Storage) -> Result<()> {
    match cmd {
        RequirementCommand::Add {
            target,
            capability,
            name,
        } => {
            let (_, added) = storage
                .update_atomically(|store| Ok(store.add_requirement(target, capability, name)?))?;
            println!("{} {}", "Requirement added:".green(), added);
        }
        RequirementCommand::Rename {
            target,
            capability,
            name,
            new_name,
        } => {
            let (_, renamed) = storage.update_atomically(|store| {
                Ok(store.rename_requirement(target, capability, name, new_name)?)
            })?;
            println!("{} {} -> {}", "Renamed:".green(), name, renamed);
        }
        RequirementCommand::Delete {
            target,
            capability,
            name,
            yes,
        } => {
            let store = storage.load()?;
            let requirement = store.get_requirement(target, capability, name).with_context(|| {
                format!("Requirement not found: {} / {} / {}", target, capability, name)
            })?;
            println!("{}", "Requirement to delete:".yellow());
            println!("  Name: {}", requirement.name);
            println!(
                "  Proximate target references: {}",
                requirement.proximate_targets.join(", ")
            );

            if confirm("Delete this requirement?", *yes)? {
                storage.update_atomically(|store| {
                    Ok(store.delete_requirement(target, capability, name)?)
                })?;
                println!("{}", "Requirement deleted.".green());
            }
        }
    }
    Ok(())
}

fn handle_pt_command(cmd: &ProximateTargetCommand, storage: &Storage) -> Result<()> {
    match cmd {
        ProximateTargetCommand::Add {
            target,
            capability,
            requirement,
            name,
        } => {
            let (store, added) = storage.update_atomically(|store| {
                Ok(store.add_proximate_target_reference(target, capability, requirement, name)?)
            })?;
            println!("{} {}", "Proximate target referenced:".green(), added);

            let shared = detect_shared_entities(&store);
            if shared.is_shared(&added) {
                let owners: Vec<&str> = shared
                    .owners(&added)
                    .into_iter()
                    .flatten()
                    .map(String::as_str)
                    .collect();
                println!(
                    "{} {} is shared by {}",
                    "Note:".cyan(),
                    added,
                    owners.join(", ")
                );
            }
        }
        ProximateTargetCommand::Remove {
            target,
            capability,
            requirement,
            name,
        } => {
            storage.update_atomically(|store| {
                Ok(store.remove_proximate_target_reference(target, capability, requirement, name)?)
            })?;
            println!("{}", "Reference removed.".green());
        }
        ProximateTargetCommand::Rename { name, new_name } => {
            let (_, touched) =
                storage.update_atomically(|store| Ok(store.rename_proximate_target(name, new_name)?))?;
            println!(
                "{} {} -> {} ({} requirement(s) updated)",
                "Renamed:".green(),
                name,
                threatmap_core::normalize_name(new_name),
                touched
            );
        }
        ProximateTargetCommand::Refs { name } => {
            let store = storage.load()?;
            let refs = store.references_to(name);
            if refs.is_empty() {
                println!("{}", "No references found.".yellow());
                return Ok(());
            }
            for path in refs {
                println!("{}", path);
            }
        }
    }
    Ok(())
}

fn show_outline(storage: &Storage) -> Result<()> {
    let store = storage.load()?;
    if store.targets.is_empty() {
        println!("{}", "Workspace is empty.".yellow());
        return Ok(());
    }
    let shared = detect_shared_entities(&store);
    print!("{}", export::render_outline(&store, &shared));
    Ok(())
}

fn show_shared(storage: &Storage) -> Result<()> {
    let store = storage.load()?;
    let index = detect_shared_entities(&store);
    let names = index.shared_names();
    if names.is_empty() {
        println!("{}", "No shared proximate targets.".yellow());
        return Ok(());
    }

    println!("{:<30} | {}", "Proximate Target", "Ultimate Targets");
    println!("{}", "-".repeat(80));
    for name in names {
        let owners: Vec<&str> = index
            .owners(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        println!("{:<30} | {}", name.bold(), owners.join(", "));
    }
    Ok(())
}

fn show_stats(storage: &Storage) -> Result<()> {
    let store = storage.load()?;
    let stats = store.stats();
    println!("Ultimate targets:       {}", stats.targets);
    println!("Critical capabilities:  {}", stats.capabilities);
    println!("Critical requirements:  {}", stats.requirements);
    println!("Proximate targets:      {}", stats.proximate_targets);
    println!("  references:           {}", stats.references);
    println!("  shared:               {}", stats.shared_proximate_targets);
    Ok(())
}

fn graph_text(graph: &Graph) -> String {
    let mut out = String::new();
    for kind in NodeKind::ALL {
        let nodes: Vec<_> = graph.nodes_of_kind(kind).collect();
        if nodes.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} ({})", kind.label(), nodes.len());
        for node in nodes {
            let marker = if node.shared { " [shared]" } else { "" };
            let _ = writeln!(out, "  {} {}{}", node.group_color, node.id, marker);
        }
    }
    if !graph.edges.is_empty() {
        let _ = writeln!(out, "Edges ({})", graph.edges.len());
        for edge in &graph.edges {
            let _ = writeln!(out, "  {} -> {}", edge.source, edge.target);
        }
    }
    out
}

fn write_or_print(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Written to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn handle_graph_command(
    storage: &Storage,
    config: &Config,
    filters: FilterArgs,
    format: GraphFormat,
    output: Option<&Path>,
) -> Result<()> {
    let store = storage.load()?;
    let graph = build_graph_with_palette(&store, to_filters(filters), &config.palette());

    match (format, output) {
        (GraphFormat::Json, Some(path)) => {
            export::export_graph_json(&graph, path)?;
            println!("Exported graph to {}", path.display());
        }
        (GraphFormat::Json, None) => println!("{}", export::graph_to_json(&graph)?),
        (GraphFormat::Text, Some(path)) => write_or_print(&graph_text(&graph), Some(path))?,
        (GraphFormat::Text, None) => {
            if graph.is_empty() {
                println!("{}", "Graph is empty.".yellow());
            } else {
                write_or_print(graph_text(&graph).trim_end(), None)?;
            }
        }
    }
    Ok(())
}

fn handle_render_command(
    storage: &Storage,
    config: &Config,
    filters: GraphFilters,
    style: VisualStyle,
    radius: f64,
    output: Option<&Path>,
) -> Result<()> {
    let store = storage.load()?;
    let graph = build_graph_with_palette(&store, filters, &config.palette());
    let layout = CircularLayout { radius }.layout(&graph);
    let payload = render_payload(&graph, &layout, &style)?;

    match output {
        Some(path) => {
            export::export_payload_json(&payload, path)?;
            println!("Exported render payload to {}", path.display());
        }
        None => println!("{}", export::payload_to_json(&payload)?),
    }
    Ok(())
}

fn handle_workspace_command(
    cmd: &WorkspaceCommand,
    mut config: Config,
    config_path: &Path,
    cli: &Cli,
) -> Result<()> {
    match cmd {
        WorkspaceCommand::Register {
            name,
            path,
            description,
            default,
        } => {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()?.join(path)
            };
            config.register_workspace(
                name.clone(),
                absolute.to_string_lossy().into_owned(),
                description.clone(),
            );
            if *default {
                config.set_default_workspace(name)?;
            }
            config.save(config_path)?;
            println!("{} {} -> {}", "Workspace registered:".green(), name, absolute.display());
        }
        WorkspaceCommand::List => {
            if config.workspaces.is_empty() {
                println!("{}", "No workspaces registered.".yellow());
                return Ok(());
            }
            for (name, entry) in &config.workspaces {
                let marker = if config.default_workspace.as_deref() == Some(name.as_str()) {
                    " (default)".green().to_string()
                } else {
                    String::new()
                };
                println!("{}{}", name.bold(), marker);
                println!("  path: {}", entry.path);
                if !entry.description.is_empty() {
                    println!("  {}", entry.description);
                }
            }
        }
        WorkspaceCommand::Default { name } => {
            config.set_default_workspace(name)?;
            config.save(config_path)?;
            println!("{} {}", "Default workspace:".green(), name);
        }
        WorkspaceCommand::Path => {
            let path: PathBuf =
                determine_workspace_path(&config, cli.file.as_deref(), cli.workspace.as_deref())?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
