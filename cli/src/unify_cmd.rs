//! `ccview unify`

use std::path::PathBuf;

use anyhow::Result;
use ccview_core::capability::{AgentCapability, CapabilityUnifier, McpCapability};
use ccview_core::filter::{self, FilterCriteria, SortDirection, SortField, SortSpec};
use ccview_core::{
    CapabilityKind, CapabilityStatus, ConfigScope, EngineConfig, SourceClassifier,
    UnifiedCapability,
};
use clap::Parser;
use serde::Serialize;

use crate::output::{Printer, Tone, print_json};
use crate::{parse_enum, read_json};

#[derive(Debug, Parser)]
pub struct UnifyArgs {
    /// JSON array of MCP server records.
    #[arg(long = "mcp")]
    pub mcp: Option<PathBuf>,

    /// JSON array of agent records.
    #[arg(long = "agents")]
    pub agents: Option<PathBuf>,

    /// Only this kind: mcp or agent.
    #[arg(long = "kind", value_parser = parse_enum::<CapabilityKind>)]
    pub kind: Option<CapabilityKind>,

    /// Only this precedence level: user, project or local.
    #[arg(long = "source", value_parser = parse_enum::<ConfigScope>)]
    pub source: Option<ConfigScope>,

    /// Only this status: active, inactive or error.
    #[arg(long = "status", value_parser = parse_enum::<CapabilityStatus>)]
    pub status: Option<CapabilityStatus>,

    /// Case-insensitive search over names, descriptions and payloads.
    #[arg(long = "query", short = 'q')]
    pub query: Option<String>,

    /// Sort field: name, kind, status or source.
    #[arg(long = "sort", value_parser = parse_enum::<SortField>)]
    pub sort: Option<SortField>,

    /// Sort descending.
    #[arg(long = "desc")]
    pub desc: bool,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

impl UnifyArgs {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            kind: self.kind,
            source: self.source,
            status: self.status,
            search_query: self.query.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnifyReport {
    capabilities: Vec<UnifiedCapability>,
    shown: usize,
    total_count: usize,
    mcp_count: usize,
    agent_count: usize,
}

pub fn run(args: &UnifyArgs, config: &EngineConfig) -> Result<()> {
    let mcp: Vec<McpCapability> = match &args.mcp {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let agents: Vec<AgentCapability> = match &args.agents {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let unifier = CapabilityUnifier::new(SourceClassifier::new(config.markers.clone()));
    let unified = unifier.unify(mcp, agents);

    let mut shown = filter::filter(&unified.capabilities, &args.criteria());
    // `--desc` alone sorts by name; unify already returns name order
    if args.sort.is_some() || args.desc {
        let direction = if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let field = args.sort.unwrap_or(SortField::Name);
        shown = filter::sort(&shown, SortSpec::new(field, direction));
    }

    if args.json {
        return print_json(&UnifyReport {
            shown: shown.len(),
            capabilities: shown,
            total_count: unified.total_count,
            mcp_count: unified.mcp_count,
            agent_count: unified.agent_count,
        });
    }

    let printer = Printer::stdout();
    for capability in &shown {
        printer.line(&row(&printer, capability))?;
    }
    printer.line(&format!(
        "{} shown of {} ({} mcp, {} agent)",
        shown.len(),
        unified.total_count,
        unified.mcp_count,
        unified.agent_count
    ))
}

fn row(printer: &Printer, capability: &UnifiedCapability) -> String {
    let scope_tone = match capability.source {
        ConfigScope::User => Tone::Blue,
        ConfigScope::Project => Tone::Green,
        ConfigScope::Local => Tone::Yellow,
    };
    let status_tone = match capability.status {
        CapabilityStatus::Active => Tone::Plain,
        CapabilityStatus::Inactive | CapabilityStatus::Error => Tone::Dim,
    };
    // pad before painting; escape codes would count toward the width
    let name = format!("{:<24}", capability.name);
    let scope = format!("{:<8}", capability.source.as_str());
    format!(
        "{:<6} {} {} {:<9} {}",
        capability.kind.as_str(),
        printer.paint(&name, status_tone),
        printer.paint(&scope, scope_tone),
        capability.status.as_str(),
        capability.source_path,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strip_ansi(text: &str) -> String {
        let mut plain = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                plain.push(c);
            }
        }
        plain
    }

    fn capability(name: &str, path: &str) -> UnifiedCapability {
        let record: McpCapability = serde_json::from_value(serde_json::json!({
            "name": name,
            "status": "inactive",
            "sourcePath": path,
            "server": {"type": "stdio", "command": "npx", "config": {}}
        }))
        .unwrap();
        CapabilityUnifier::default().to_unified(record.into())
    }

    #[test]
    fn coloured_rows_keep_columns_aligned() {
        let printer = Printer::with_color(true);
        let short = row(&printer, &capability("gh", "/home/u/.claude.json"));
        let long = row(&printer, &capability("filesystem-server", "./.mcp.json"));

        assert!(short.contains('\u{1b}'));
        let short = strip_ansi(&short);
        let long = strip_ansi(&long);
        assert_eq!(short.find("inactive"), long.find("inactive"));
        assert_eq!(short.find("/home"), long.find("./.mcp"));
        let plain = row(&Printer::with_color(false), &capability("gh", "/home/u/.claude.json"));
        assert_eq!(short, plain);
    }
}
