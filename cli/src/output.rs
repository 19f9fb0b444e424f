use std::io::{self, Write};

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Highlight colours used for diff categories and precedence levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tone {
    Blue,
    Green,
    Yellow,
    Dim,
    Plain,
}

/// Writes to stdout, colouring only when the terminal supports it.
pub(crate) struct Printer {
    color: bool,
}

impl Printer {
    pub(crate) fn stdout() -> Self {
        Self::with_color(supports_color::on(supports_color::Stream::Stdout).is_some())
    }

    pub(crate) fn with_color(color: bool) -> Self {
        Self { color }
    }

    pub(crate) fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.color {
            return text.to_string();
        }
        match tone {
            Tone::Blue => text.blue().to_string(),
            Tone::Green => text.green().to_string(),
            Tone::Yellow => text.yellow().to_string(),
            Tone::Dim => text.dimmed().to_string(),
            Tone::Plain => text.to_string(),
        }
    }

    pub(crate) fn line(&self, text: &str) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{text}")?;
        Ok(())
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
