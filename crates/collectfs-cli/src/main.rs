//! collectfs - mount a directory so that no file is ever lost to a clobber.
//!
//! Files about to be deleted, renamed over, linked over or truncated on open
//! are first moved into a trash tree mirroring their original location.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use collectfs_fuse::{CollectFs, MOUNT_OPTIONS_HELP, MountFlags, mount};
use collectfs_telemetry::setup_logging;

mod cli;
mod logging;
mod startup;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), format!("collectfs: {e:#}").red());
            ExitCode::FAILURE
        },
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.help_fuse {
        println!("{}", "collectfs FUSE options".bold().cyan());
        print!("{MOUNT_OPTIONS_HELP}");
        return Ok(());
    }

    startup::refuse_superuser()?;
    let startup = startup::validate(cli)?;
    let flags = MountFlags::parse(&cli.options);

    if !cli.foreground {
        nix::unistd::daemon(false, false).context("failed to detach from the terminal")?;
    }

    // Logging threads must be started after the fork.
    let log_config = logging::log_config(cli, &startup);
    let _log_guard = match setup_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };

    let startup::Startup {
        config,
        mount_point,
        ..
    } = startup;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        root = %config.root().display(),
        trash = config.trash_name(),
        open_truncate = config.collect_open_truncate(),
        "collectfs starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let fs = CollectFs::new(Arc::new(config));
    let result = runtime.block_on(mount(fs, &mount_point, &flags));

    match &result {
        Ok(()) => tracing::info!("collectfs exiting"),
        Err(e) => tracing::error!(error = %e, "collectfs exiting"),
    }
    Ok(result?)
}
