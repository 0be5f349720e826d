//! depsync CLI
//!
//! Loads the manifest tree, resolves it against the registry and brings the
//! managed regions of generated build files up to date.

mod cli;
mod error;
mod logging;
mod output;

use clap::Parser;
use colored::Colorize;
use depsync_core::{Config, EXIT_FAILURE, Engine};
use depsync_fs::CancelToken;
use tracing::warn;

use cli::Cli;
use error::Result;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {} [{}]", "error".red().bold(), e, e.class());
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let mut config = Config::load(&cli.root)?;
    if let Some(registry) = &cli.registry {
        config.registry.path = std::env::current_dir()?.join(registry);
    }

    let cancel = CancelToken::new();
    let engine = Engine::new(&cli.root, config).with_cancel_token(cancel.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, finishing the current file and stopping");
                cancel.cancel();
            }
        });
        engine.run(cli.mode()).await
    })?;

    if cli.json {
        println!("{}", report.to_json().map_err(depsync_core::Error::from)?);
    } else {
        print!("{}", output::render(&report, cli.detail()));
    }
    Ok(report.exit_code())
}
