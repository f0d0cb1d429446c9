// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Remote fetching, redirect collapsing and cache persistence against a
//! local HTTP fixture.

mod common;

use common::{FixtureServer, Route};
use spacey_bundle::{
    BundleError, CacheEntry, CacheLookup, Config, Fetcher, ModuleIdentityResolver, RemoteCache,
};
use tempfile::tempdir;

fn fetching_resolver(cache: &RemoteCache) -> ModuleIdentityResolver {
    let config = Config::default();
    let fetcher = Fetcher::new(cache.clone(), &config).unwrap();
    ModuleIdentityResolver::new(cache.clone(), Some(fetcher), config.max_redirects)
}

#[tokio::test]
async fn test_redirect_chain_collapses_to_final_url() {
    let server = FixtureServer::start(vec![
        ("/a.ts", Route::redirect(302, "/b.ts")),
        ("/b.ts", Route::redirect(301, "c.ts")),
        ("/c.ts", Route::script("application/typescript", "export const c = 1;")),
    ])
    .await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let id = fetching_resolver(&cache)
        .resolve(".", &server.url("/a.ts"))
        .await
        .unwrap();

    assert_eq!(id.as_str(), server.url("/c.ts"));
    assert_eq!(server.hits("/a.ts"), 1);
    assert_eq!(server.hits("/b.ts"), 1);
    assert_eq!(server.hits("/c.ts"), 1);

    let entries = cache.entries().unwrap();
    let redirects = entries
        .iter()
        .filter(|e| matches!(e, CacheEntry::Redirect { .. }))
        .count();
    assert_eq!(redirects, 2);
    assert_eq!(entries.len(), 3);

    // Resolving again needs no network at all
    let offline = ModuleIdentityResolver::new(cache.clone(), None, 20);
    let again = offline.resolve(".", &server.url("/a.ts")).await.unwrap();
    assert_eq!(again, id);
    assert_eq!(server.hits("/a.ts"), 1);
}

#[tokio::test]
async fn test_cached_body_and_mime_type() {
    let server = FixtureServer::start(vec![(
        "/mod.js",
        Route::script("text/javascript; charset=utf-8", "export default 42;"),
    )])
    .await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let url = server.url("/mod.js");
    let id = fetching_resolver(&cache).resolve(".", &url).await.unwrap();

    let body = cache.read_module(&id).await.unwrap();
    assert_eq!(body, b"export default 42;");
    match cache.lookup(&url).await.unwrap() {
        CacheLookup::Content { mime_type, .. } => {
            assert_eq!(mime_type.as_deref(), Some("text/javascript; charset=utf-8"));
        }
        other => panic!("unexpected lookup: {other:?}"),
    }
}

#[tokio::test]
async fn test_unacceptable_content_type_is_fatal() {
    let server = FixtureServer::start(vec![(
        "/page.ts",
        Route::script("text/html", "<html></html>"),
    )])
    .await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let err = fetching_resolver(&cache)
        .resolve(".", &server.url("/page.ts"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BundleError::UnacceptableContentType { ref content_type, .. } if content_type == "text/html"
    ));
    assert!(cache.entries().unwrap().is_empty());
}

#[tokio::test]
async fn test_redirect_without_location_is_fatal() {
    let server = FixtureServer::start(vec![("/moved.ts", Route::status(302))]).await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let err = fetching_resolver(&cache)
        .resolve(".", &server.url("/moved.ts"))
        .await
        .unwrap_err();

    assert!(matches!(err, BundleError::RedirectWithoutLocation { status: 302, .. }));
}

#[tokio::test]
async fn test_error_status_is_fatal() {
    let server = FixtureServer::start(vec![]).await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let err = fetching_resolver(&cache)
        .resolve(".", &server.url("/missing.ts"))
        .await
        .unwrap_err();

    assert!(matches!(err, BundleError::FetchFailed { status: 404, .. }));
}

#[tokio::test]
async fn test_refetch_replaces_stale_body_with_redirect() {
    let server = FixtureServer::start(vec![
        ("/latest.ts", Route::redirect(302, "/v2.ts")),
        ("/v2.ts", Route::script("application/typescript", "export const v = 2;")),
    ])
    .await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());
    let latest = server.url("/latest.ts");

    cache
        .store_content(&latest, b"export const v = 1;", "application/typescript")
        .await
        .unwrap();

    let fetcher = Fetcher::new(cache.clone(), &Config::default()).unwrap();
    let served = fetcher.fetch(&latest).await.unwrap();
    assert_eq!(served, server.url("/v2.ts"));

    assert!(matches!(
        cache.lookup(&latest).await.unwrap(),
        CacheLookup::Redirect { ref target } if *target == server.url("/v2.ts")
    ));
    assert!(!cache.cache_path(&latest).unwrap().exists());
}

#[tokio::test]
async fn test_redirect_loop_hits_limit() {
    let server = FixtureServer::start(vec![
        ("/ping.ts", Route::redirect(302, "/pong.ts")),
        ("/pong.ts", Route::redirect(302, "/ping.ts")),
    ])
    .await;
    let dir = tempdir().unwrap();
    let cache = RemoteCache::new(dir.path());

    let config = Config {
        max_redirects: 3,
        ..Config::default()
    };
    let fetcher = Fetcher::new(cache.clone(), &config).unwrap();

    let err = fetcher.fetch(&server.url("/ping.ts")).await.unwrap_err();
    assert!(matches!(err, BundleError::TooManyRedirects { limit: 3, .. }));
}
