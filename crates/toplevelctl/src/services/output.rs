//! Snapshot emission to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use toplevelctl_core::snapshot::{self, Format};
use toplevelctl_core::{Config, WindowStore};
use tracing::trace;

/// Writes snapshots and decides when a drain warrants one.
pub struct Output<W: Write> {
    format: Format,
    /// Order windows by id. Toggled at runtime by the `q` command.
    pub sorted: bool,
    emit_unchanged: bool,
    writer: W,
}

impl<W: Write> Output<W> {
    pub fn new(config: &Config, writer: W) -> Self {
        Self {
            format: Format::from_flags(config.json, config.compact),
            sorted: config.sort,
            emit_unchanged: config.emit_unchanged,
            writer,
        }
    }

    /// Render and write one snapshot, flushing immediately.
    pub fn emit<H>(&mut self, store: &WindowStore<H>) -> Result<()> {
        let rendered = snapshot::render(store, self.format, self.sorted)?;
        self.writer
            .write_all(rendered.as_bytes())
            .context("Failed to write snapshot")?;
        self.writer.flush().context("Failed to flush snapshot")?;
        Ok(())
    }

    /// Emit after a compositor drain, unless nothing changed and unchanged
    /// re-emission is disabled.
    pub fn after_drain<H>(&mut self, store: &WindowStore<H>, changed: bool) -> Result<()> {
        if changed || self.emit_unchanged {
            self.emit(store)
        } else {
            trace!("Drain changed nothing, skipping snapshot");
            Ok(())
        }
    }

    pub fn toggle_sort(&mut self) {
        self.sorted = !self.sorted;
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.writer
    }
}
