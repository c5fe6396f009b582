//! Vista CLI - Command line interface for Vista views.
//!
//! Renders a template, or one of its blocks, with data from a JSON or YAML
//! file and writes the result to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod run;

use cli::{Args, Command};

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args)?;

    debug!("Vista CLI starting with command: {:?}", args.command);

    let view = run::build_view(&args)?;

    let output = match &args.command {
        Command::Render(render_args) => {
            run::render(&view, &render_args.template, render_args.data.as_deref())?
        }
        Command::Block(block_args) => run::render_block(
            &view,
            &block_args.template,
            &block_args.block,
            block_args.data.as_deref(),
        )?,
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .context("Failed to write output")?;

    Ok(())
}

/// Initialize tracing subscriber.
fn init_tracing(args: &Args) -> Result<()> {
    let (log_level, crate_level) = if args.verbose {
        (Level::DEBUG, "debug")
    } else {
        (Level::WARN, "info")
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive(format!("vista_view={crate_level}").parse()?)
        .add_directive(format!("vista_cli={crate_level}").parse()?);

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
