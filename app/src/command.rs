//! Subcommand implementations. Output goes to stdout, diagnostics to the log.

use std::fs;
use std::path::Path;

use anyhow::Context as _;
use log::{debug, info};
use plugflow::{Graph, GraphDescription, NodeRegistry};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::demo;

/// Load a description and rebuild its graph with the configured engine.
/// Files ending in `.bin` use the binary form, anything else JSON.
pub fn load_graph(path: &Path, config: &AppConfig) -> anyhow::Result<Graph> {
    let description = if path.extension().is_some_and(|ext| ext == "bin") {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        GraphDescription::from_bytes(&bytes)?
    } else {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        GraphDescription::from_json(&json)?
    };

    let graph = Graph::from_description_with_config(
        &description,
        &NodeRegistry::with_default_nodes(),
        config.engine.clone(),
    )
    .with_context(|| format!("Failed to load {}", path.display()))?;
    debug!("Loaded {} top-level nodes from {}", description.nodes.len(), path.display());
    Ok(graph)
}

pub fn eval(path: &Path, plug: &str, overrides: &[String], config: &AppConfig) -> anyhow::Result<()> {
    let graph = load_graph(path, config)?;
    let plug = graph.find(plug)?;
    let context = config.context(overrides)?;
    let value = graph.get(plug, &context)?;
    let hash = graph.get_hash(plug, &context)?;
    println!("{}", value);
    println!("{}", hash);
    Ok(())
}

pub fn hash(path: &Path, plug: &str, overrides: &[String], config: &AppConfig) -> anyhow::Result<()> {
    let graph = load_graph(path, config)?;
    let plug = graph.find(plug)?;
    let context = config.context(overrides)?;
    println!("{}", graph.get_hash(plug, &context)?);
    Ok(())
}

pub fn dirty(path: &Path, plug: &str, config: &AppConfig) -> anyhow::Result<()> {
    let mut graph = load_graph(path, config)?;
    let plug = graph.find(plug)?;

    println!("affects:");
    for output in graph.affects(plug) {
        println!("  {}", graph.full_name(output));
    }
    println!("dirties:");
    for dirtied in graph.propagate_dirtiness(plug) {
        println!("  {}", graph.full_name(dirtied));
    }
    Ok(())
}

pub fn tree(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let graph = load_graph(path, config)?;
    let mut lines = Vec::new();
    describe_tree(&graph, graph.root(), 0, &mut lines)?;
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn describe_tree(graph: &Graph, id: Uuid, depth: usize, lines: &mut Vec<String>) -> anyhow::Result<()> {
    for &child in graph.children(id) {
        let indent = "  ".repeat(depth);
        if graph.is_plug(child) {
            let data = graph.plug(child)?;
            let mut line = format!(
                "{}{} [{} {}]",
                indent,
                graph.name(child),
                data.direction(),
                data.value_type()
            );
            if let Some(source) = data.input() {
                line.push_str(&format!(" <- {}", graph.full_name(source)));
            } else if graph.children(child).is_empty() && data.direction() == plugflow::Direction::In {
                line.push_str(&format!(" = {}", graph.stored_value(child)?));
            }
            if data.flags().dynamic {
                line.push_str(" (dynamic)");
            }
            lines.push(line);
        } else {
            let type_name = graph
                .component(child)
                .and_then(|c| c.type_name())
                .unwrap_or_default();
            lines.push(format!("{}{} ({})", indent, graph.name(child), type_name));
        }
        describe_tree(graph, child, depth + 1, lines)?;
    }
    Ok(())
}

pub fn demo(out: Option<&Path>, iterations: i64) -> anyhow::Result<()> {
    let json = demo::increment_loop(iterations)?.to_json()?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Demo description written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

pub fn show_config(config: &AppConfig, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no configuration directory available"),
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
