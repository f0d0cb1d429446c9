// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Remote module downloads.

use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

use crate::cache::RemoteCache;
use crate::config::Config;
use crate::error::{BundleError, Result};

/// Content types accepted as module source. Matched as prefixes, so
/// `text/javascript; charset=utf-8` passes.
pub const ACCEPTABLE_MIME_TYPES: &[&str] = &[
    "text/plain",
    "application/javascript",
    "text/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "text/ecmascript",
    "application/typescript",
    "text/typescript",
    "application/x-typescript",
    "text/jsx",
    "text/tsx",
];

/// Check a Content-Type header value against [`ACCEPTABLE_MIME_TYPES`].
pub fn is_acceptable_content_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    ACCEPTABLE_MIME_TYPES
        .iter()
        .any(|mime| content_type.starts_with(mime))
}

/// Downloads remote modules into a [`RemoteCache`].
///
/// The transport never follows redirects itself: every hop is persisted as
/// its own redirect record so later resolutions can collapse the chain
/// without the network.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    cache: RemoteCache,
    max_redirects: usize,
}

impl Fetcher {
    /// Create a fetcher writing into `cache`.
    pub fn new(cache: RemoteCache, config: &Config) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(Duration::from_secs(config.timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            cache,
            max_redirects: config.max_redirects,
        })
    }

    /// The cache this fetcher writes into.
    pub fn cache(&self) -> &RemoteCache {
        &self.cache
    }

    /// Fetch `url` and every hop of its redirect chain into the cache.
    ///
    /// Returns the URL that finally served content. Re-fetching overwrites
    /// whatever was cached before.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut current = url.to_string();

        for _ in 0..=self.max_redirects {
            info!("download {}", current);

            let response = self.client.get(&current).send().await?;
            let status = response.status();

            if status.is_success() {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                if !is_acceptable_content_type(&content_type) {
                    return Err(BundleError::UnacceptableContentType {
                        url: current,
                        content_type,
                    });
                }

                let body = response.bytes().await?;
                self.cache
                    .store_content(&current, &body, &content_type)
                    .await?;
                return Ok(current);
            }

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| BundleError::RedirectWithoutLocation {
                        url: current.clone(),
                        status: status.as_u16(),
                    })?;

                let target = Url::parse(&current)?.join(location)?.to_string();
                debug!("{} redirects to {}", current, target);

                self.cache.store_redirect(&current, &target).await?;
                current = target;
                continue;
            }

            return Err(BundleError::FetchFailed {
                url: current,
                status: status.as_u16(),
            });
        }

        Err(BundleError::TooManyRedirects {
            url: url.to_string(),
            limit: self.max_redirects,
        })
    }
}
