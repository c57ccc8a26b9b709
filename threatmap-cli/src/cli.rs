use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Threat decomposition: ultimate targets, critical capabilities, critical requirements and proximate targets")]
pub struct Cli {
    /// Path to the workspace file (overrides --workspace)
    #[clap(long, global = true)]
    pub file: Option<PathBuf>,

    /// Workspace name to use from the config registry
    #[clap(long, short = 'w', global = true)]
    pub workspace: Option<String>,

    /// Enable debug logging (otherwise controlled by RUST_LOG)
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage ultimate targets
    #[clap(subcommand)]
    Target(TargetCommand),

    /// Manage critical capabilities
    #[clap(subcommand)]
    Capability(CapabilityCommand),

    /// Manage critical requirements
    #[clap(subcommand)]
    Requirement(RequirementCommand),

    /// Manage proximate target references
    #[clap(subcommand)]
    Pt(ProximateTargetCommand),

    /// Print the hierarchy as an outline
    Show,

    /// List proximate targets shared by more than one ultimate target
    Shared,

    /// Print summary counts
    Stats,

    /// Build the node/edge graph
    Graph {
        #[clap(flatten)]
        filters: FilterArgs,

        /// Output format
        #[clap(long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,

        /// Write to a file instead of stdout
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Lay out the graph and produce the drawable trace payload as JSON
    Render {
        #[clap(flatten)]
        filters: FilterArgs,

        /// Dim capability nodes without removing them
        #[clap(long)]
        dim_capabilities: bool,

        /// Dim requirement nodes without removing them
        #[clap(long)]
        dim_requirements: bool,

        /// Outer radius of the circular layout
        #[clap(long, default_value_t = 1.0)]
        radius: f64,

        /// Write to a file instead of stdout
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Manage registered workspaces
    #[clap(subcommand)]
    Workspace(WorkspaceCommand),
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct FilterArgs {
    /// Collapse the requirement level
    #[clap(long)]
    pub hide_requirements: bool,

    /// Collapse the capability level
    #[clap(long)]
    pub hide_capabilities: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum TargetCommand {
    /// Add an ultimate target
    Add {
        name: String,

        /// Actor objective
        #[clap(long)]
        objective: Option<String>,
    },

    /// Rename an ultimate target
    Rename { name: String, new_name: String },

    /// Delete an ultimate target and everything below it
    Delete {
        name: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Set the actor objective
    Objective { name: String, objective: String },

    /// List ultimate targets
    List,
}

#[derive(Subcommand, Debug)]
pub enum CapabilityCommand {
    /// Add a capability to an ultimate target
    Add { target: String, name: String },

    /// Rename a capability
    Rename {
        target: String,
        name: String,
        new_name: String,
    },

    /// Delete a capability and its requirements
    Delete {
        target: String,
        name: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RequirementCommand {
    /// Add a requirement to a capability
    Add {
        target: String,
        capability: String,
        name: String,
    },

    /// Rename a requirement
    Rename {
        target: String,
        capability: String,
        name: String,
        new_name: String,
    },

    /// Delete a requirement and its proximate target references
    Delete {
        target: String,
        capability: String,
        name: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProximateTargetCommand {
    /// Reference a proximate target from a requirement
    Add {
        target: String,
        capability: String,
        requirement: String,
        name: String,
    },

    /// Remove a proximate target reference from a requirement
    Remove {
        target: String,
        capability: String,
        requirement: String,
        name: String,
    },

    /// Rename a proximate target everywhere it is referenced
    Rename { name: String, new_name: String },

    /// Show every requirement referencing a proximate target
    Refs { name: String },
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    /// Register a workspace file under a name
    Register {
        /// Name of the workspace
        #[clap(long)]
        name: String,

        /// Path to the workspace file
        #[clap(long)]
        path: PathBuf,

        /// Description of the workspace
        #[clap(long, default_value = "")]
        description: String,

        /// Set this workspace as the default
        #[clap(long)]
        default: bool,
    },

    /// List registered workspaces
    List,

    /// Set the default workspace
    Default { name: String },

    /// Print the path of the workspace file in use
    Path,
}
