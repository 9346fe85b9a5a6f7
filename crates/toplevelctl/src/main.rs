//! toplevelctl - list and control wlroots toplevel windows.

mod cli;
mod services;

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use toplevelctl_core::{Config, Request, logging};
use tracing::{debug, info, warn};

use cli::Cli;
use services::compositor::{CompositorPeer, Performed, WaylandPeer};
use services::control::{self, ControlSocket};
use services::multiplexer::Multiplexer;
use services::output::Output;
use services::signal::Shutdown;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    let path = control::socket_path(&config);

    if let Some(message) = &cli.send {
        let request =
            Request::parse(message).with_context(|| format!("Invalid command {:?}", message))?;
        control::send_message(&path, &request.to_string())
            .with_context(|| format!("Failed to send command to {}", path.display()))?;
        info!("Sent '{}'", request);
        return Ok(());
    }

    let mut peer = WaylandPeer::connect(cli.output)?;
    for (action, id) in cli.actions() {
        if peer.perform(action, id) == Performed::UnknownWindow {
            warn!("No window with id {}", id);
        }
    }

    let mut output = Output::new(&config, io::stdout().lock());
    if !cli.monitor {
        peer.prepare_wait()?;
        output.emit(peer.windows())?;
        return Ok(());
    }
    output.emit(peer.windows())?;

    let shutdown = Shutdown::new().context("Failed to create shutdown pipe")?;
    shutdown
        .install()
        .context("Failed to install signal handlers")?;
    let control = ControlSocket::bind(&path)
        .with_context(|| format!("Failed to bind control socket at {}", path.display()))?;
    info!("Listening for commands on {}", control.path().display());
    debug!("Config: {:?}", config);

    Multiplexer::new(peer, control, &config, output).run(&shutdown)
}
