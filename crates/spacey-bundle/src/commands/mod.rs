// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Command implementations for sbundle.

pub mod bundle;
pub mod cache;
pub mod fetch;

use spacey_bundle::{Config, Fetcher, RemoteCache};

use crate::cli::Cli;

/// Common context for command execution.
pub struct CommandContext {
    pub config: Config,
    pub cache: RemoteCache,
}

impl CommandContext {
    /// Create a new command context.
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Config::load()?;

        // Override config with CLI options
        if let Some(ref cache_dir) = cli.cache_dir {
            config.cache = Some(cache_dir.clone());
        }
        if let Some(concurrency) = cli.concurrency {
            config.concurrency = concurrency.max(1);
        }
        if cli.bundle.no_fetch {
            config.fetch = false;
        }

        let cache = RemoteCache::new(config.cache_dir());

        Ok(Self { config, cache })
    }

    /// Create a fetcher writing into the context's cache.
    pub fn fetcher(&self) -> anyhow::Result<Fetcher> {
        Ok(Fetcher::new(self.cache.clone(), &self.config)?)
    }
}
