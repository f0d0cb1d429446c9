// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Configuration management for sbundle.
//!
//! Values are merged from `~/.sbundlerc`, a project `.sbundlerc` and
//! `SBUNDLE_*` environment variables, later sources winning. Both files use
//! `key=value` lines; `#` and `;` start comments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{BundleError, Result};

/// Name of the per-user and per-project config file.
pub const CONFIG_FILE_NAME: &str = ".sbundlerc";

/// Prefix of environment variables read into the config.
pub const ENV_PREFIX: &str = "SBUNDLE_";

/// Configuration for sbundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote module cache root
    pub cache: Option<PathBuf>,

    /// Fetch uncached remote modules during resolution
    pub fetch: bool,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Connect timeout in seconds
    pub connect_timeout: u64,

    /// Number of concurrent remote fetches
    pub concurrency: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Maximum redirect hops followed for one URL
    pub max_redirects: usize,

    /// Default log level when neither `-v`/`-q` nor `RUST_LOG` is given
    pub loglevel: String,

    /// Unrecognised keys, kept for `get`
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: None,
            fetch: true,
            timeout: 60,
            connect_timeout: 30,
            concurrency: num_cpus::get() * 2,
            user_agent: format!("sbundle/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 20,
            loglevel: "warn".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(user_config_path) = user_config_path() {
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config = PathBuf::from(CONFIG_FILE_NAME);
        if project_config.exists() {
            config.merge_from_file(&project_config)?;
        }

        config.merge_from_vars(std::env::vars());

        Ok(config)
    }

    /// Merge configuration from a file.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.merge_from_str(&content)
            .map_err(|e| BundleError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Merge `key=value` lines.
    pub fn merge_from_str(&mut self, content: &str) -> std::result::Result<(), String> {
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(format!("line {}: expected key=value", lineno + 1));
            };
            self.set(key.trim(), value.trim());
        }

        Ok(())
    }

    /// Merge `SBUNDLE_*` variables, e.g. `SBUNDLE_MAX_REDIRECTS=5`.
    pub fn merge_from_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value);
            }
        }
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "cache" => self.cache = Some(PathBuf::from(value)),
            "fetch" => self.fetch = parse_bool(value),
            "no-fetch" => self.fetch = !parse_bool(value),
            "timeout" => {
                if let Ok(n) = value.parse() {
                    self.timeout = n;
                }
            }
            "connect-timeout" => {
                if let Ok(n) = value.parse() {
                    self.connect_timeout = n;
                }
            }
            "concurrency" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.concurrency = n.max(1);
                }
            }
            "user-agent" => self.user_agent = value.to_string(),
            "max-redirects" => {
                if let Ok(n) = value.parse() {
                    self.max_redirects = n;
                }
            }
            "loglevel" => self.loglevel = value.to_string(),
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
    }

    /// Get a configuration value.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "cache" => Some(self.cache_dir().display().to_string()),
            "fetch" => Some(self.fetch.to_string()),
            "timeout" => Some(self.timeout.to_string()),
            "connect-timeout" => Some(self.connect_timeout.to_string()),
            "concurrency" => Some(self.concurrency.to_string()),
            "user-agent" => Some(self.user_agent.clone()),
            "max-redirects" => Some(self.max_redirects.to_string()),
            "loglevel" => Some(self.loglevel.clone()),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// `loglevel` as a tracing filter directive.
    ///
    /// npm-style names map onto the nearest tracing level; anything else is
    /// passed through as a directive.
    pub fn log_directive(&self) -> &str {
        match self.loglevel.as_str() {
            "silent" => "off",
            "http" | "notice" => "info",
            "verbose" => "debug",
            "silly" => "trace",
            other => other,
        }
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.clone().unwrap_or_else(default_cache_dir)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Get the user config path.
fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Get the default cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spacey-bundle")
}
