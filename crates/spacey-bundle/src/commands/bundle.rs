// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bundle command implementation.

use anyhow::Context;
use owo_colors::OwoColorize;
use spacey_bundle::Bundler;
use tokio::io::AsyncWriteExt;

use crate::cli::{BundleArgs, Cli};
use crate::commands::CommandContext;

pub async fn run(
    entry: &str,
    args: &BundleArgs,
    ctx: &CommandContext,
    cli: &Cli,
) -> anyhow::Result<()> {
    let root = std::env::current_dir().context("cannot determine the working directory")?;

    let bundler = Bundler::new(&ctx.config, root)?.with_header(!args.no_header);
    let bundle = bundler.bundle(entry).await?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, bundle.code.as_bytes())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} ({} modules)",
                    "Bundled".green().bold(),
                    path.display(),
                    bundle.modules.len()
                );
            }
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(bundle.code.as_bytes()).await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
