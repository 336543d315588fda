//! gametree CLI - inspect and edit game tree documents
//!
//! Documents are the nested JSON form of a tree (`id`, `data`, `parentId`,
//! `children`). Each edit command applies one transaction and writes the
//! resulting document.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use gametree::{AppendOptions, Direction, MergeOnKeys, NodeData, NodeId, Tree, TreeOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gametree")]
#[command(about = "Inspect and edit persistent game tree documents")]
#[command(version)]
struct Cli {
    /// Output format (json or text)
    #[arg(short, long, default_value = "json", global = true)]
    format: OutputFormat,

    /// Write edited documents here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Merge appended nodes into siblings with the same first value of KEY
    #[arg(long = "merge-on", value_name = "KEY", global = true)]
    merge_on: Vec<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Show size, height and fingerprints
    Info {
        /// Tree document
        file: PathBuf,
    },

    /// List the main line from the root
    Mainline {
        /// Tree document
        file: PathBuf,
    },

    /// List all nodes in pre-order
    Nodes {
        /// Tree document
        file: PathBuf,
    },

    /// Append a child node
    Append {
        /// Tree document
        file: PathBuf,
        /// Parent node id
        #[arg(short, long)]
        parent: String,
        /// Explicit id for the new node
        #[arg(long)]
        id: Option<String>,
        /// Property as KEY=VALUE, repeatable
        #[arg(long = "prop", value_name = "KEY=VALUE")]
        props: Vec<String>,
        /// Never merge into an existing sibling
        #[arg(long)]
        no_merge: bool,
    },

    /// Remove a node and its subtree
    Remove {
        /// Tree document
        file: PathBuf,
        /// Node id
        id: String,
    },

    /// Move a node among its siblings
    Shift {
        /// Tree document
        file: PathBuf,
        /// Node id
        id: String,
        /// left, right or main
        direction: String,
    },

    /// Make a node the new root
    Reroot {
        /// Tree document
        file: PathBuf,
        /// Node id
        id: String,
    },

    /// Replace a property's values; no values removes it
    Set {
        /// Tree document
        file: PathBuf,
        /// Node id
        id: String,
        /// Property name
        key: String,
        /// New values
        values: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Info { file } => {
            let tree = load(file, &cli)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "root": tree.root_id().to_string(),
                    "nodes": tree.len(),
                    "height": tree.get_height(),
                    "mainline": tree.list_main_nodes().count(),
                    "structure_hash": tree.get_structure_hash().to_hex(),
                    "hash": tree.get_hash().to_hex()
                }),
            );
        }

        Commands::Mainline { file } => {
            let tree = load(file, &cli)?;
            let items: Vec<_> = tree
                .list_main_nodes()
                .map(|node| {
                    serde_json::json!({
                        "id": node.id.to_string(),
                        "data": node.data,
                        "variations": node.children.len()
                    })
                })
                .collect();
            output(
                &cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "nodes": items
                }),
            );
        }

        Commands::Nodes { file } => {
            let tree = load(file, &cli)?;
            let items: Vec<_> = tree
                .list_nodes()
                .map(|node| {
                    serde_json::json!({
                        "id": node.id.to_string(),
                        "parent": node.parent_id.as_ref().map(|p| p.to_string()),
                        "level": tree.get_level(&node.id),
                        "main": tree.on_main_line(&node.id)
                    })
                })
                .collect();
            output(
                &cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "nodes": items
                }),
            );
        }

        Commands::Append {
            file,
            parent,
            id,
            props,
            no_merge,
        } => {
            let tree = load(file, &cli)?;
            let parent = NodeId::from(parent);
            let data = parse_props(props)?;
            let options = AppendOptions {
                disable_merging: *no_merge,
            };

            let mut appended = None;
            let next = tree.mutate(|draft| {
                appended = match id {
                    Some(id) => draft
                        .append_node_with_id(&parent, id.as_str(), data, options)
                        .then(|| draft.resolve(&NodeId::from(id))),
                    None => draft.append_node(&parent, data, options),
                };
                Ok(())
            })?;

            let appended = appended.ok_or_else(|| anyhow!("Cannot append under {}", parent))?;
            save(&cli, &next, serde_json::json!({ "status": "ok", "id": appended.to_string() }))?;
        }

        Commands::Remove { file, id } => {
            let tree = load(file, &cli)?;
            let id = NodeId::from(id);
            let mut removed = false;
            let next = tree.mutate(|draft| {
                removed = draft.remove_node(&id)?;
                Ok(())
            })?;

            if !removed {
                bail!("Node not found: {}", id);
            }
            save(&cli, &next, serde_json::json!({ "status": "ok", "id": id.to_string() }))?;
        }

        Commands::Shift {
            file,
            id,
            direction,
        } => {
            let tree = load(file, &cli)?;
            let id = NodeId::from(id);
            let direction: Direction = direction.parse()?;
            let mut position = None;
            let next = tree.mutate(|draft| {
                position = draft.shift_node(&id, direction);
                Ok(())
            })?;

            let position = position.ok_or_else(|| anyhow!("Cannot shift node {}", id))?;
            save(
                &cli,
                &next,
                serde_json::json!({ "status": "ok", "id": id.to_string(), "position": position }),
            )?;
        }

        Commands::Reroot { file, id } => {
            let tree = load(file, &cli)?;
            let id = NodeId::from(id);
            let mut done = false;
            let next = tree.mutate(|draft| {
                done = draft.make_root(&id);
                Ok(())
            })?;

            if !done {
                bail!("Node not found: {}", id);
            }
            save(&cli, &next, serde_json::json!({ "status": "ok", "root": id.to_string() }))?;
        }

        Commands::Set {
            file,
            id,
            key,
            values,
        } => {
            let tree = load(file, &cli)?;
            let id = NodeId::from(id);
            let mut done = false;
            let next = tree.mutate(|draft| {
                done = draft.update_property(&id, key.as_str(), values.iter().cloned());
                Ok(())
            })?;

            if !done {
                bail!("Node not found: {}", id);
            }
            save(&cli, &next, serde_json::json!({ "status": "ok", "id": id.to_string() }))?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("GAMETREE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path, cli: &Cli) -> anyhow::Result<Tree> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut options = TreeOptions::new();
    if !cli.merge_on.is_empty() {
        options = options.merger(MergeOnKeys::new(cli.merge_on.iter().cloned()));
    }

    Tree::from_json(&json, options).with_context(|| format!("Invalid tree document {}", path.display()))
}

/// Write the document to `--output` and report, or print the document
fn save(cli: &Cli, tree: &Tree, status: serde_json::Value) -> anyhow::Result<()> {
    let document = match cli.format {
        OutputFormat::Json => tree.to_json()?,
        OutputFormat::Text => tree.to_json_pretty()?,
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output(&cli.format, &status);
        }
        None => println!("{}", document),
    }

    Ok(())
}

fn parse_props(props: &[String]) -> anyhow::Result<NodeData> {
    let mut data = NodeData::new();
    for prop in props {
        let (key, value) = prop
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid property {:?}, expected KEY=VALUE", prop))?;
        let values: &mut Vec<String> = data.entry(key.to_string()).or_default();
        values.push(value.to_string());
    }
    Ok(data)
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", value);
        }
        OutputFormat::Text => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
    }
}
