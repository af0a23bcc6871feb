//! Object Explorer CLI - Browse a database server's object tree
//!
//! Usage:
//!   object-explorer expand [connection] [path] [--refresh] [--filter <text>]
//!   object-explorer tree [connection] [--depth <n>]
//!   object-explorer find [connection] --kind <kind> [--schema] [--name] [--database] [--parent]
//!
//! Connections are named in the config file; without one, the
//! EXPLORER_DB_* environment variables are used.
//!
//! Examples:
//!   object-explorer expand production Databases/sales/Tables
//!   object-explorer tree dev --depth 3
//!   object-explorer find production --kind table --database sales --schema dbo --name orders

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use object_explorer::backend::{FindNodesRequest, TemplatePathGenerator};
use object_explorer::config::{ConnectionParams, Settings};
use object_explorer::session::{ExpandResponse, NodeInfo, SessionRegistry};
use object_explorer::tree::path;
use object_explorer::worker::{default_strategies, WorkerClient, WorkerConnector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "object-explorer")]
#[command(about = "Object Explorer - Browse a database server's object tree")]
#[command(version)]
struct Cli {
    /// Config file (defaults to explorer.toml or the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the children of a node
    Expand {
        /// Named connection from the config file
        connection: Option<String>,

        /// Node path relative to the server, e.g. Databases/sales/Tables
        #[arg(default_value = "")]
        path: String,

        /// Repopulate instead of reusing cached children
        #[arg(short, long)]
        refresh: bool,

        /// Only list children whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Print the tree down to a depth
    Tree {
        /// Named connection from the config file
        connection: Option<String>,

        /// Levels below the server to expand
        #[arg(short, long, default_value_t = 2)]
        depth: usize,
    },

    /// Find objects by kind and name
    Find {
        /// Named connection from the config file
        connection: Option<String>,

        /// Object kind (server, database, table, view, function, column)
        #[arg(short, long)]
        kind: String,

        #[arg(long)]
        schema: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        database: Option<String>,

        /// Containing object names, outermost first
        #[arg(long = "parent")]
        parents: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable listing
    Text,
    /// One JSON document
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let connection = match &cli.command {
        Commands::Expand { connection, .. }
        | Commands::Tree { connection, .. }
        | Commands::Find { connection, .. } => connection.as_deref(),
    };
    let params = match resolve_connection(&settings, connection) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Connection error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = match open_registry(&settings).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Worker error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let created = match registry.create_session(params).await {
        Ok(created) => created,
        Err(e) => {
            eprintln!("Failed to open session: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let session_id = created.session_id.clone();
    let root_path = created.root_node.node_path.clone();

    let code = match cli.command {
        Commands::Expand {
            path: relative,
            refresh,
            filter,
            ..
        } => {
            cmd_expand(
                &registry,
                &session_id,
                &root_path,
                &relative,
                refresh,
                filter.as_deref(),
                cli.output,
            )
            .await
        }
        Commands::Tree { depth, .. } => {
            cmd_tree(&registry, &session_id, created.root_node, depth, cli.output).await
        }
        Commands::Find {
            kind,
            schema,
            name,
            database,
            parents,
            ..
        } => {
            let request = FindNodesRequest {
                session_id: session_id.clone(),
                kind,
                schema,
                name,
                database,
                parent_names: parents,
            };
            cmd_find(&registry, &request, cli.output).await
        }
    };

    registry.shutdown().await;
    code
}

fn resolve_connection(settings: &Settings, name: Option<&str>) -> Result<ConnectionParams, String> {
    match name {
        Some(name) => settings
            .get_connection(name)
            .and_then(|conn| conn.to_params())
            .map_err(|e| e.to_string()),
        None => ConnectionParams::from_env().map_err(|e| e.to_string()),
    }
}

async fn open_registry(settings: &Settings) -> Result<SessionRegistry<WorkerConnector>, String> {
    let client = WorkerClient::spawn_with_settings(settings)
        .await
        .map_err(|e| e.to_string())?;

    Ok(SessionRegistry::builder(WorkerConnector::new(Arc::new(client)))
        .strategies(default_strategies())
        .candidates(TemplatePathGenerator::from_settings(&settings.find))
        .settings(&settings.explorer)
        .build())
}

/// Expand each ancestor on the way down, then the target itself.
async fn cmd_expand(
    registry: &SessionRegistry<WorkerConnector>,
    session_id: &str,
    root_path: &str,
    relative: &str,
    refresh: bool,
    filter: Option<&str>,
    output: OutputFormat,
) -> ExitCode {
    let mut current = root_path.to_string();
    for segment in relative.split(path::PATH_SEPARATOR).filter(|s| !s.is_empty()) {
        let response = registry.expand(session_id, &current, false).await;
        if !response.nodes.iter().any(|n| n.node_path == path::join(&current, segment)) {
            eprintln!("Not found: {}", path::join(&current, segment));
            return ExitCode::FAILURE;
        }
        current = path::join(&current, segment);
    }

    let response = registry
        .expand_with_filter(session_id, &current, refresh, filter)
        .await;

    match output {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Text => print_response(&response),
    }

    if response.error_message.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn cmd_tree(
    registry: &SessionRegistry<WorkerConnector>,
    session_id: &str,
    root: NodeInfo,
    depth: usize,
    output: OutputFormat,
) -> ExitCode {
    let mut lines = Vec::new();
    let mut visited = Vec::new();
    let mut stack = vec![(root, 0usize)];

    while let Some((node, level)) = stack.pop() {
        lines.push(format!("{}{}", "  ".repeat(level), node.label));
        if let Some(error) = &node.error_message {
            lines.push(format!("{}! {}", "  ".repeat(level + 1), error));
        }
        if node.is_leaf || level >= depth {
            visited.push(node);
            continue;
        }

        let response = registry.expand(session_id, &node.node_path, false).await;
        if let Some(error) = &response.error_message {
            lines.push(format!("{}! {}", "  ".repeat(level + 1), error));
        }
        for child in response.nodes.into_iter().rev() {
            stack.push((child, level + 1));
        }
        visited.push(node);
    }

    match output {
        OutputFormat::Json => print_json(&visited),
        OutputFormat::Text => {
            for line in lines {
                println!("{}", line);
            }
        }
    }
    ExitCode::SUCCESS
}

async fn cmd_find(
    registry: &SessionRegistry<WorkerConnector>,
    request: &FindNodesRequest,
    output: OutputFormat,
) -> ExitCode {
    let nodes = registry.find_nodes(request).await;

    match output {
        OutputFormat::Json => print_json(&nodes),
        OutputFormat::Text => {
            if nodes.is_empty() {
                println!("No matches.");
            }
            for node in &nodes {
                println!("{}  ({})", node.node_path, node.node_type);
            }
        }
    }
    ExitCode::SUCCESS
}

fn print_response(response: &ExpandResponse) {
    println!("{}", response.node_path);
    for node in &response.nodes {
        let marker = if node.is_leaf { " " } else { "+" };
        println!("  {} {}  [{}]", marker, node.label, node.node_type);
    }
    if response.nodes.is_empty() {
        println!("  (no children)");
    }
    if let Some(error) = &response.error_message {
        eprintln!("Error: {}", error);
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}
