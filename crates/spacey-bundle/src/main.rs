// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! sbundle - bundle local and remote TypeScript/JavaScript modules
//!
//! This is the main entry point for the sbundle binary.

use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let ctx = match commands::CommandContext::new(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr; stdout may carry the bundle
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_filter(ctx.config.log_directive())))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let result = match &cli.command {
        Some(Commands::Fetch(args)) => commands::fetch::run(args, &ctx, &cli).await,
        Some(Commands::Cache(args)) => commands::cache::run(args, &ctx, &cli).await,
        None => match cli.bundle.entry.as_deref() {
            Some(entry) => commands::bundle::run(entry, &cli.bundle, &ctx, &cli).await,
            None => {
                let _ = Cli::command().print_help();
                return ExitCode::from(2);
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
