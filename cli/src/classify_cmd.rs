//! `ccview classify`

use std::path::Path;

use anyhow::Result;
use ccview_core::{CapabilityKind, EngineConfig, SourceClassifier};
use clap::Parser;
use serde::Serialize;

use crate::output::{Printer, Tone, print_json};
use crate::parse_enum;

#[derive(Debug, Parser)]
pub struct ClassifyArgs {
    /// Paths as they appear in capability records.
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Which registry marker to classify against: mcp or agent.
    #[arg(long = "kind", default_value = "mcp", value_parser = parse_enum::<CapabilityKind>)]
    pub kind: CapabilityKind,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Classification<'a> {
    path: &'a str,
    scope: ccview_core::ConfigScope,
    invalidates: ccview_core::CacheDomains,
    tracked: bool,
}

pub fn run(args: &ClassifyArgs, config: &EngineConfig) -> Result<()> {
    let classifier = SourceClassifier::new(config.markers.clone());
    let results: Vec<Classification<'_>> = args
        .paths
        .iter()
        .map(|path| Classification {
            path,
            scope: classifier.classify(path, args.kind),
            invalidates: classifier.domains_for(path),
            tracked: classifier.is_config_file(Path::new(path)),
        })
        .collect();

    if args.json {
        return print_json(&results);
    }

    let printer = Printer::stdout();
    for result in &results {
        let domains = match (result.invalidates.user, result.invalidates.project) {
            (true, true) => "user+project",
            (true, false) => "user",
            (false, true) => "project",
            (false, false) => "none",
        };
        let tracked = if result.tracked { "" } else { " (not watched)" };
        printer.line(&format!(
            "{}\t{}\tinvalidates {}{}",
            result.path,
            printer.paint(result.scope.as_str(), Tone::Green),
            domains,
            printer.paint(tracked, Tone::Dim),
        ))?;
    }
    Ok(())
}
