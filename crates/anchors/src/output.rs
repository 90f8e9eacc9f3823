//! Output formatting for anchor listings

use anchors_core::{
    Anchor, AnchorNode, Behavior, DocumentView, EpicCompletion, LinkPosition, LinkTarget,
    TagCompletion, TagRegistry,
};
use eyre::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::PathFormat;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}

/// `3 Anchors` or `3 Anchors, 2 Hidden`
pub fn file_stats(visible: usize, hidden: usize) -> String {
    let mut stats = format!("{} Anchors", visible);
    if hidden > 0 {
        stats.push_str(&format!(", {} Hidden", hidden));
    }
    stats
}

fn paint_tag(anchor: &Anchor) -> String {
    match anchor.behavior {
        Behavior::Marker => anchor.tag.yellow().bold().to_string(),
        Behavior::Region => anchor.tag.cyan().bold().to_string(),
        Behavior::Link => anchor.tag.blue().bold().to_string(),
    }
}

fn render_tree(output: &mut String, nodes: &[AnchorNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        let mut line = format!("{}{} {}", indent, paint_tag(&node.anchor), node.label);
        if let Some(epic) = &node.anchor.attributes.epic {
            line.push_str(&format!(
                " {}",
                format!("(epic {} #{})", epic, node.anchor.attributes.seq).dimmed()
            ));
        }
        if let Some(target) = LinkTarget::from_anchor(&node.anchor) {
            line.push_str(&format!(" {} {}", "->".dimmed(), describe_link(&target)));
        }
        output.push_str(&line);
        output.push('\n');
        render_tree(output, &node.children, depth + 1);
    }
}

fn describe_link(target: &LinkTarget) -> String {
    let path = target.path.display().to_string();
    match &target.position {
        None => path,
        Some(LinkPosition::Line(line)) => format!("{} line {}", path, line),
        Some(LinkPosition::Anchor(id)) => format!("{} anchor {}", path, id),
    }
}

/// Render the anchors of one document
pub fn render_document(
    document: &Path,
    nodes: &[AnchorNode],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(nodes),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&format!("{}\n", document.display().to_string().bold()));
            if nodes.is_empty() {
                output.push_str(&format!("  {}\n", "No anchors found".dimmed()));
            }
            render_tree(&mut output, nodes, 1);
            Ok(output)
        }
    }
}

/// Render the workspace listing
pub fn render_workspace(
    views: &[DocumentView],
    root: &Path,
    path_format: PathFormat,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(views),
        OutputFormat::Text => {
            let mut output = String::new();
            if views.is_empty() {
                output.push_str(&format!("{}\n", "No workspace anchors found".dimmed()));
            }
            for view in views {
                let title = path_format.display(&view.document, root);
                if path_format == PathFormat::Hidden {
                    output.push_str(&format!("{}\n", title.bold()));
                } else {
                    output.push_str(&format!(
                        "{} {}\n",
                        title.bold(),
                        format!("({})", file_stats(view.visible, view.hidden)).dimmed()
                    ));
                }
                render_tree(&mut output, &view.anchors, 1);
            }
            Ok(output)
        }
    }
}

#[derive(Serialize)]
struct EpicEntry<'a> {
    epic: &'a str,
    anchors: &'a [&'a Anchor],
}

/// Render epics in name order, each ordered by `seq`
pub fn render_epics(
    epics: &BTreeMap<String, Vec<&Anchor>>,
    root: &Path,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = epics
                .iter()
                .map(|(epic, anchors)| EpicEntry {
                    epic,
                    anchors: anchors.as_slice(),
                })
                .collect();
            to_json(&entries)
        }
        OutputFormat::Text => {
            let mut output = String::new();
            if epics.is_empty() {
                output.push_str(&format!("{}\n", "No epics found".dimmed()));
            }
            for (epic, anchors) in epics {
                output.push_str(&format!("{} {}\n", "Epic".bold(), epic.magenta().bold()));
                for anchor in anchors {
                    let location = format!(
                        "{}:{}",
                        PathFormat::Full.display(&anchor.document, root),
                        anchor.line
                    );
                    output.push_str(&format!(
                        "  {} {} {} {}\n",
                        format!("{:>3}.", anchor.attributes.seq).dimmed(),
                        paint_tag(anchor),
                        anchor.text,
                        location.dimmed()
                    ));
                }
            }
            Ok(output)
        }
    }
}

/// Render the effective tag registry
pub fn render_tags(registry: &TagRegistry, end_tag: &str, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let tags: Vec<_> = registry.iter().collect();
            to_json(&tags)
        }
        OutputFormat::Text => {
            let mut output = String::new();
            for tag in registry.iter() {
                let name = if tag.is_region() {
                    format!("{} / {}{}", tag.name, end_tag, tag.name)
                } else {
                    tag.name.clone()
                };
                output.push_str(&format!(
                    "{:<24} {:<8} {}\n",
                    name.bold(),
                    tag.behavior.as_str(),
                    tag.scope.as_str().dimmed()
                ));
            }
            Ok(output)
        }
    }
}

/// Render the attribute text that continues each epic
pub fn render_epic_completions(items: &[EpicCompletion], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(items),
        OutputFormat::Text => Ok(items.iter().map(|item| format!("{}\n", item)).collect()),
    }
}

/// Render insertable tag snippets
pub fn render_tag_completions(items: &[TagCompletion], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(items),
        OutputFormat::Text => Ok(items
            .iter()
            .map(|item| format!("{:<24} {:?}\n", item.label, item.insert))
            .collect()),
    }
}

#[derive(Serialize)]
struct Fold {
    start_line: usize,
    end_line: usize,
}

/// Render the foldable line spans of closed regions
pub fn render_folds(ranges: &[(usize, usize)], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let folds: Vec<_> = ranges
                .iter()
                .map(|&(start_line, end_line)| Fold {
                    start_line,
                    end_line,
                })
                .collect();
            to_json(&folds)
        }
        OutputFormat::Text => Ok(ranges
            .iter()
            .map(|(start, end)| format!("{}-{}\n", start, end))
            .collect()),
    }
}

/// Render a single anchor found by id
pub fn render_found(anchor: &Anchor, root: &Path, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(anchor),
        OutputFormat::Text => Ok(format!(
            "{}:{} {} {}\n",
            PathFormat::Full.display(&anchor.document, root),
            anchor.line,
            paint_tag(anchor),
            anchor.text
        )),
    }
}
