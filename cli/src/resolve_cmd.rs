//! `ccview resolve`

use std::path::PathBuf;

use anyhow::Result;
use ccview_core::EngineConfig;
use ccview_core::inheritance::{ConfigEntry, InheritanceResolver};
use clap::Parser;

use crate::output::{Printer, Tone, print_json};
use crate::read_json;

#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// JSON array of config entries with their sources and priorities.
    pub entries: PathBuf,

    /// Output as JSON.
    #[arg(long = "json", short = 'j')]
    pub json: bool,
}

pub fn run(args: &ResolveArgs, config: &EngineConfig) -> Result<()> {
    let entries: Vec<ConfigEntry> = read_json(&args.entries)?;
    let resolver = InheritanceResolver::from_config(&config.cache);
    let resolved = resolver.resolve(&entries);

    if args.json {
        return print_json(resolved.chain());
    }

    let printer = Printer::stdout();
    for entry in &resolved.entries {
        let (marker, tone) = if entry.inherited {
            ("*", Tone::Green)
        } else {
            ("-", Tone::Dim)
        };
        printer.line(&format!(
            "{} {} = {}  [{} p{} {}]",
            printer.paint(marker, tone),
            entry.key,
            printer.paint(&entry.value.to_string(), tone),
            entry.source.kind,
            entry.source.priority,
            entry.source.path,
        ))?;
    }
    let overridden = resolved.entries.iter().filter(|e| e.overridden).count();
    printer.line(&format!(
        "{} keys resolved, {} entries overridden",
        resolved.resolved.len(),
        overridden
    ))
}
