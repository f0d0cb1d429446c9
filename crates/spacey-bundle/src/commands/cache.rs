// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Cache command implementation.

use owo_colors::OwoColorize;
use spacey_bundle::CacheEntry;

use crate::cli::{CacheAction, CacheArgs, Cli};
use crate::commands::CommandContext;

pub async fn run(args: &CacheArgs, ctx: &CommandContext, cli: &Cli) -> anyhow::Result<()> {
    match &args.action {
        CacheAction::Clean => {
            ctx.cache.clear().await?;
            println!("{}", "Cache cleared".green());
        }
        CacheAction::List => {
            let entries = ctx.cache.entries()?;
            for entry in &entries {
                match entry {
                    CacheEntry::Content { url, mime_type, size, .. } => {
                        let mime_type = mime_type.as_deref().unwrap_or("-");
                        println!("{} {} ({})", url.cyan(), mime_type.dimmed(), format_bytes(*size));
                    }
                    CacheEntry::Redirect { url, target } => {
                        println!("{} {} {}", url.cyan(), "->".dimmed(), target);
                    }
                }
            }
            if !cli.quiet {
                println!(
                    "{} entries, {}",
                    entries.len(),
                    format_bytes(ctx.cache.size()?)
                );
            }
        }
        CacheAction::Path => {
            println!("{}", ctx.cache.cache_dir().display());
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
