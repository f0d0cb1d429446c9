// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Content-addressed on-disk cache for remote modules.
//!
//! Layout, per URL:
//!
//! ```text
//! <root>/<scheme>/<host>[_<port>]/<sha256(path + query)>            module body
//! <root>/<scheme>/<host>[_<port>]/<sha256(path + query)>.meta.json  sidecar
//! ```
//!
//! The sidecar holds either `mimeType` (body present) or `redirectTo`
//! (no body). Entries never expire; a re-fetch overwrites them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

use crate::error::{BundleError, Result};
use crate::module_id::ModuleId;

/// Suffix appended to a body path to get its sidecar path.
pub const META_SUFFIX: &str = ".meta.json";

/// Sidecar metadata stored next to each cached URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// The URL this entry belongs to
    pub url: String,
    /// Path and query of the URL (the hashed part)
    pub original_path: String,
    /// Content-Type of the cached body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Absolute redirect target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

/// What the cache knows about one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Body is cached
    Content {
        path: PathBuf,
        mime_type: Option<String>,
    },
    /// URL redirects elsewhere; no body
    Redirect { target: String },
    /// Nothing cached
    Missing,
}

/// One persisted cache artifact, as listed by [`RemoteCache::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    /// Cached module body
    Content {
        url: String,
        mime_type: Option<String>,
        path: PathBuf,
        size: u64,
    },
    /// Cached redirect record
    Redirect { url: String, target: String },
}

impl CacheEntry {
    /// The URL this entry belongs to.
    pub fn url(&self) -> &str {
        match self {
            CacheEntry::Content { url, .. } | CacheEntry::Redirect { url, .. } => url,
        }
    }
}

/// Remote module cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    cache_dir: PathBuf,
}

impl RemoteCache {
    /// Create a cache handle. Directories are created on first write.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Get the cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cached body for `url`.
    pub fn cache_path(&self, url: &str) -> Result<PathBuf> {
        let (path, _) = cache_location(&self.cache_dir, url)?;
        Ok(path)
    }

    /// Path of the sidecar metadata for `url`.
    pub fn meta_path(&self, url: &str) -> Result<PathBuf> {
        let path = self.cache_path(url)?;
        Ok(meta_path_for(&path))
    }

    /// Look up a URL without touching the network.
    pub async fn lookup(&self, url: &str) -> Result<CacheLookup> {
        let path = self.cache_path(url)?;
        let meta = self.read_metadata(url).await?;

        let has_body = match fs::metadata(&path).await {
            Ok(m) => m.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if has_body {
            debug!("cache hit for {}", url);
            return Ok(CacheLookup::Content {
                path,
                mime_type: meta.and_then(|m| m.mime_type),
            });
        }

        match meta.and_then(|m| m.redirect_to) {
            Some(target) => Ok(CacheLookup::Redirect { target }),
            None => Ok(CacheLookup::Missing),
        }
    }

    /// Read the sidecar for a URL, if present.
    pub async fn read_metadata(&self, url: &str) -> Result<Option<CacheMetadata>> {
        let meta_path = self.meta_path(url)?;
        match fs::read_to_string(&meta_path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the cached body of a remote module.
    pub async fn read_module(&self, id: &ModuleId) -> Result<Vec<u8>> {
        match self.lookup(id.as_str()).await? {
            CacheLookup::Content { path, .. } => Ok(fs::read(&path).await?),
            CacheLookup::Redirect { .. } | CacheLookup::Missing => Err(BundleError::CacheMiss {
                url: id.to_string(),
            }),
        }
    }

    /// Store a module body and its mime type, replacing any earlier entry.
    pub async fn store_content(&self, url: &str, body: &[u8], mime_type: &str) -> Result<PathBuf> {
        let (path, original_path) = cache_location(&self.cache_dir, url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        write_atomic(&path, body).await?;
        let meta = CacheMetadata {
            url: url.to_string(),
            original_path,
            mime_type: Some(mime_type.to_string()),
            redirect_to: None,
        };
        write_atomic(&meta_path_for(&path), &serde_json::to_vec(&meta)?).await?;

        debug!("cached {} at {}", url, path.display());
        Ok(path)
    }

    /// Store a redirect record, dropping any body cached for the URL.
    pub async fn store_redirect(&self, url: &str, target: &str) -> Result<()> {
        let (path, original_path) = cache_location(&self.cache_dir, url)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        match fs::remove_file(&path).await {
            Ok(()) => debug!("dropped stale body for {}", url),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let meta = CacheMetadata {
            url: url.to_string(),
            original_path,
            mime_type: None,
            redirect_to: Some(target.to_string()),
        };
        write_atomic(&meta_path_for(&path), &serde_json::to_vec(&meta)?).await?;

        debug!("cached redirect {} -> {}", url, target);
        Ok(())
    }

    /// List every cached URL, sorted by URL.
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        if !self.cache_dir.exists() {
            return Ok(entries);
        }

        for entry in walkdir::WalkDir::new(&self.cache_dir) {
            let entry = entry.map_err(|e| BundleError::Io(e.into()))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !entry.file_type().is_file() || !name.ends_with(META_SUFFIX) {
                continue;
            }

            let meta: CacheMetadata = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            let body = path.with_file_name(&name[..name.len() - META_SUFFIX.len()]);

            match meta.redirect_to {
                Some(target) => entries.push(CacheEntry::Redirect {
                    url: meta.url,
                    target,
                }),
                None => {
                    let size = std::fs::metadata(&body).map(|m| m.len()).unwrap_or(0);
                    entries.push(CacheEntry::Content {
                        url: meta.url,
                        mime_type: meta.mime_type,
                        path: body,
                        size,
                    });
                }
            }
        }

        entries.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(entries)
    }

    /// Get cache size in bytes.
    pub fn size(&self) -> Result<u64> {
        let mut total = 0u64;

        if !self.cache_dir.exists() {
            return Ok(total);
        }

        for entry in walkdir::WalkDir::new(&self.cache_dir) {
            let entry = entry.map_err(|e| BundleError::Io(e.into()))?;
            if entry.file_type().is_file() {
                if let Ok(meta) = entry.metadata() {
                    total += meta.len();
                }
            }
        }

        Ok(total)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) -> Result<()> {
        info!("Clearing cache at {}", self.cache_dir.display());

        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir).await?;
        }

        Ok(())
    }
}

/// Body path and hashed path+query for `url` under `root`.
fn cache_location(root: &Path, url: &str) -> Result<(PathBuf, String)> {
    let parsed = Url::parse(url)?;
    let scheme = match parsed.scheme() {
        "http" => "http",
        "https" => "https",
        _ => return Err(BundleError::invalid_specifier(ModuleId::ROOT, url)),
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| BundleError::invalid_specifier(ModuleId::ROOT, url))?;
    let host_dir = match parsed.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host.to_string(),
    };

    let mut original_path = parsed.path().to_string();
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        original_path.push('?');
        original_path.push_str(query);
    }
    let digest = hex::encode(Sha256::digest(original_path.as_bytes()));

    Ok((root.join(scheme).join(host_dir).join(digest), original_path))
}

fn meta_path_for(body: &Path) -> PathBuf {
    let mut name = body.as_os_str().to_os_string();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Write through a temporary sibling so readers never see a torn file.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp-{}", std::process::id()));
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_path_layout() {
        let cache = RemoteCache::new("/cache");
        let path = cache
            .cache_path("https://deno.land/sub/dir/script.ts?query=1")
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/cache/https/deno.land")
                .join("118a6a93e2c6de545787b444e91ef3906f20688e4b47a55cb28f14a05e51dcab")
        );

        let meta = cache
            .meta_path("https://deno.land/sub/dir/script.ts?query=1")
            .unwrap();
        assert!(meta.to_string_lossy().ends_with("dcab.meta.json"));
    }

    #[test]
    fn test_cache_path_distinguishes_port_and_scheme() {
        let cache = RemoteCache::new("/cache");
        let a = cache.cache_path("http://localhost:8080/mod.ts").unwrap();
        let b = cache.cache_path("http://localhost/mod.ts").unwrap();
        let c = cache.cache_path("https://localhost/mod.ts").unwrap();
        assert!(a.starts_with("/cache/http/localhost_8080"));
        assert!(b.starts_with("/cache/http/localhost"));
        assert_ne!(b, c);
    }

    #[test]
    fn test_cache_path_rejects_other_schemes() {
        let cache = RemoteCache::new("/cache");
        assert!(matches!(
            cache.cache_path("file:///etc/passwd"),
            Err(BundleError::InvalidSpecifier { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_and_lookup_content() {
        let dir = tempdir().unwrap();
        let cache = RemoteCache::new(dir.path());
        let url = "https://example.com/mod.ts";

        assert_eq!(cache.lookup(url).await.unwrap(), CacheLookup::Missing);

        let path = cache
            .store_content(url, b"export const x = 1;", "application/typescript")
            .await
            .unwrap();

        match cache.lookup(url).await.unwrap() {
            CacheLookup::Content { path: p, mime_type } => {
                assert_eq!(p, path);
                assert_eq!(mime_type.as_deref(), Some("application/typescript"));
            }
            other => panic!("unexpected lookup: {other:?}"),
        }

        let body = cache.read_module(&ModuleId::new(url)).await.unwrap();
        assert_eq!(body, b"export const x = 1;");
    }

    #[tokio::test]
    async fn test_lookup_reads_sidecar_asynchronously() {
        let dir = tempdir().unwrap();
        let cache = RemoteCache::new(dir.path());
        let url = "https://example.com/moved.ts";

        cache
            .store_redirect(url, "https://example.com/v1/moved.ts")
            .await
            .unwrap();
        let lookups = futures::future::join_all((0..4).map(|_| cache.lookup(url))).await;
        for lookup in lookups {
            assert!(matches!(lookup.unwrap(), CacheLookup::Redirect { .. }));
        }

        tokio::fs::write(cache.meta_path(url).unwrap(), b"{not json")
            .await
            .unwrap();
        assert!(matches!(cache.lookup(url).await, Err(BundleError::Json(_))));
    }

    #[tokio::test]
    async fn test_redirect_overwrites_content() {
        let dir = tempdir().unwrap();
        let cache = RemoteCache::new(dir.path());
        let url = "https://example.com/latest/mod.ts";

        cache
            .store_content(url, b"old", "text/javascript")
            .await
            .unwrap();
        cache
            .store_redirect(url, "https://example.com/v2/mod.ts")
            .await
            .unwrap();

        assert_eq!(
            cache.lookup(url).await.unwrap(),
            CacheLookup::Redirect {
                target: "https://example.com/v2/mod.ts".to_string()
            }
        );
        assert!(!cache.cache_path(url).unwrap().exists());
    }

    #[tokio::test]
    async fn test_sidecar_format() {
        let dir = tempdir().unwrap();
        let cache = RemoteCache::new(dir.path());
        let url = "https://example.com/a.ts?v=1";

        cache
            .store_redirect(url, "https://example.com/b.ts")
            .await
            .unwrap();

        let raw = std::fs::read_to_string(cache.meta_path(url).unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["redirectTo"], "https://example.com/b.ts");
        assert_eq!(json["originalPath"], "/a.ts?v=1");
        assert!(json.get("mimeType").is_none());
    }

    #[tokio::test]
    async fn test_entries_and_clear() {
        let dir = tempdir().unwrap();
        let cache = RemoteCache::new(dir.path().join("cache"));

        cache
            .store_redirect("https://a.example/x.ts", "https://b.example/x.ts")
            .await
            .unwrap();
        cache
            .store_content("https://b.example/x.ts", b"1234", "text/plain")
            .await
            .unwrap();

        let entries = cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(&entries[0], CacheEntry::Redirect { url, .. } if url == "https://a.example/x.ts"));
        assert!(matches!(&entries[1], CacheEntry::Content { size: 4, .. }));
        assert!(cache.size().unwrap() >= 4);

        cache.clear().await.unwrap();
        assert!(cache.entries().unwrap().is_empty());
    }
}
