// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Fetch command implementation.

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use spacey_bundle::{classify, BundleError, SpecifierKind};

use crate::cli::{Cli, FetchArgs};
use crate::commands::CommandContext;

pub async fn run(args: &FetchArgs, ctx: &CommandContext, cli: &Cli) -> anyhow::Result<()> {
    let fetcher = ctx.fetcher()?;

    for url in &args.urls {
        if classify(url) != SpecifierKind::Url {
            return Err(BundleError::invalid_specifier(".", url.as_str()).into());
        }
    }

    let progress = if cli.quiet || args.urls.len() < 2 {
        None
    } else {
        let pb = ProgressBar::new(args.urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    let results: Vec<(&String, spacey_bundle::Result<String>)> = stream::iter(&args.urls)
        .map(|url| {
            let fetcher = fetcher.clone();
            let progress = progress.clone();
            async move {
                let result = fetcher.fetch(url).await;
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                (url, result)
            }
        })
        .buffer_unordered(ctx.config.concurrency)
        .collect()
        .await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let mut failed = 0usize;
    for (url, result) in results {
        match result {
            Ok(served) if !cli.quiet => {
                if served == *url {
                    println!("{} {}", "fetched".green(), url);
                } else {
                    println!("{} {} {} {}", "fetched".green(), url, "->".dimmed(), served);
                }
            }
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", "failed".red(), url, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, args.urls.len());
    }

    Ok(())
}
