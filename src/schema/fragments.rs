//! Schema fragment sources and the fragment cache
//!
//! A fragment is one `.cue` file of the schema package, addressed by
//! `(version, name)`. Sources fetch fragment text; [`FragmentCache`]
//! memoizes it for the life of the process.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Fragments shared by every layer
pub const COMMON_FRAGMENTS: [&str; 3] = ["base", "metadata", "mapping"];

/// Fragments bundled into the binary
static BUNDLED: &[(&str, &str)] = &[
    ("base", include_str!("../../schemas/base.cue")),
    ("metadata", include_str!("../../schemas/metadata.cue")),
    ("mapping", include_str!("../../schemas/mapping.cue")),
    ("layer-1", include_str!("../../schemas/layer-1.cue")),
    ("layer-2", include_str!("../../schemas/layer-2.cue")),
    ("layer-3", include_str!("../../schemas/layer-3.cue")),
    ("layer-4", include_str!("../../schemas/layer-4.cue")),
];

/// Where fragment text comes from
pub trait FragmentSource: Send + Sync {
    /// Fetch the text of fragment `name` for schema `version`.
    ///
    /// Fails with `Fetch` when the source is unreachable or has no such
    /// fragment, and with `Read` when the payload cannot be read.
    fn fetch(&self, version: &str, name: &str) -> Result<String>;

    /// Human-readable location of a fragment, for reports and logs
    fn location(&self, version: &str, name: &str) -> String;
}

// =============================================================================
// Remote
// =============================================================================

/// Fetches `{base_url}/{version}/schemas/{name}.cue` over HTTP
pub struct RemoteSource {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
}

impl RemoteSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            max_retries,
        })
    }

    pub fn url(&self, version: &str, name: &str) -> String {
        format!(
            "{}/{}/schemas/{}.cue",
            self.base_url.trim_end_matches('/'),
            version,
            name
        )
    }

    /// One request. The flag tells whether a retry could help.
    fn fetch_once(&self, url: &str) -> std::result::Result<String, (Error, bool)> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| (Error::Fetch(format!("{}: {}", url, e)), true))?;

        let status = response.status();
        if !status.is_success() {
            return Err((
                Error::Fetch(format!("{} returned status {}", url, status)),
                status.is_server_error(),
            ));
        }

        response
            .text()
            .map_err(|e| (Error::Read(format!("{}: {}", url, e)), false))
    }
}

impl FragmentSource for RemoteSource {
    fn fetch(&self, version: &str, name: &str) -> Result<String> {
        let url = self.url(version, name);
        let mut attempt = 0;
        loop {
            match self.fetch_once(&url) {
                Ok(text) => return Ok(text),
                Err((e, true)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(url = %url, attempt, error = %e, "Fragment fetch failed, retrying");
                    std::thread::sleep(Duration::from_millis(200 << attempt));
                }
                Err((e, _)) => return Err(e),
            }
        }
    }

    fn location(&self, version: &str, name: &str) -> String {
        self.url(version, name)
    }
}

// =============================================================================
// Embedded and directory
// =============================================================================

/// Fragments compiled into the binary. The same text is served for every
/// version.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedSource;

impl EmbeddedSource {
    pub fn get(name: &str) -> Option<&'static str> {
        BUNDLED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| *text)
    }
}

impl FragmentSource for EmbeddedSource {
    fn fetch(&self, _version: &str, name: &str) -> Result<String> {
        Self::get(name)
            .map(str::to_string)
            .ok_or_else(|| Error::Fetch(format!("no bundled fragment {:?}", name)))
    }

    fn location(&self, _version: &str, name: &str) -> String {
        format!("embedded:schemas/{}.cue", name)
    }
}

/// Reads `<root>/<version>/<name>.cue`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, version: &str, name: &str) -> PathBuf {
        self.root.join(version).join(format!("{}.cue", name))
    }
}

impl FragmentSource for DirectorySource {
    fn fetch(&self, version: &str, name: &str) -> Result<String> {
        let path = self.path(version, name);
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Fetch(format!("{} not found", path.display())),
            _ => Error::Read(format!("{}: {}", path.display(), e)),
        })
    }

    fn location(&self, version: &str, name: &str) -> String {
        self.path(version, name).display().to_string()
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Process-wide memo of fragment text keyed by `(version, name)`.
///
/// Entries never expire; fragments are immutable per version.
pub struct FragmentCache {
    source: Arc<dyn FragmentSource>,
    entries: RwLock<HashMap<(String, String), Arc<str>>>,
}

impl FragmentCache {
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self {
            source,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn FragmentSource> {
        &self.source
    }

    /// Fragment text, fetched from the source on first use
    pub fn get(&self, version: &str, name: &str) -> Result<Arc<str>> {
        let key = (version.to_string(), name.to_string());
        // Poisoning is ignored: entries are inserted whole.
        if let Some(text) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            tracing::debug!(version, fragment = name, "Fragment cache hit");
            return Ok(text.clone());
        }

        tracing::debug!(version, fragment = name, "Fragment cache miss, fetching");
        let text: Arc<str> = self.source.fetch(version, name)?.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.entry(key).or_insert(text).clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl FragmentSource for CountingSource {
        fn fetch(&self, version: &str, name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "missing" {
                return Err(Error::Fetch("not found".into()));
            }
            Ok(format!("// {} {}", version, name))
        }

        fn location(&self, _version: &str, name: &str) -> String {
            name.to_string()
        }
    }

    #[test]
    fn test_cache_fetches_once_per_key() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = FragmentCache::new(source.clone());

        assert_eq!(&*cache.get("v1", "base").unwrap(), "// v1 base");
        assert_eq!(&*cache.get("v1", "base").unwrap(), "// v1 base");
        assert_eq!(&*cache.get("v2", "base").unwrap(), "// v2 base");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let cache = FragmentCache::new(source.clone());
        assert!(matches!(cache.get("v1", "missing"), Err(Error::Fetch(_))));
        assert!(cache.get("v1", "missing").is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_embedded_fragments() {
        for name in COMMON_FRAGMENTS {
            assert!(EmbeddedSource.fetch("main", name).is_ok(), "{}", name);
        }
        for n in 1..=4 {
            let text = EmbeddedSource.fetch("v0.1.0", &format!("layer-{}", n)).unwrap();
            assert!(text.contains("package schemas"));
        }
        assert!(matches!(
            EmbeddedSource.fetch("main", "layer-9"),
            Err(Error::Fetch(_))
        ));
    }

    #[test]
    fn test_directory_source() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("v1")).unwrap();
        std::fs::write(dir.path().join("v1/base.cue"), "package schemas").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.fetch("v1", "base").unwrap(), "package schemas");
        assert!(matches!(source.fetch("v2", "base"), Err(Error::Fetch(_))));
    }

    #[test]
    fn test_remote_url() {
        let source = RemoteSource::new(
            "https://raw.githubusercontent.com/ossf/gemara/",
            Duration::from_secs(1),
            0,
        )
        .unwrap();
        assert_eq!(
            source.url("v0.7.0", "layer-2"),
            "https://raw.githubusercontent.com/ossf/gemara/v0.7.0/schemas/layer-2.cue"
        );
    }
}
