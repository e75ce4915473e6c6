//! Provider registry mapping aliases to [`ImageProvider`] factories.
//!
//! The [`ProviderRegistry`] is an explicit value built at startup and shared
//! by `Arc` with the resolver. Registration is an upsert: registering an alias
//! that already exists replaces its descriptor, which lets callers override a
//! built-in source without restarting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::provider::{ImageProvider, ProviderContext};

/// Builds a fresh provider instance from the shared context.
pub type ProviderFactory = Arc<dyn Fn(&ProviderContext) -> Box<dyn ImageProvider> + Send + Sync>;

/// One registry entry.
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub alias: String,
    pub description: String,
    pub factory: ProviderFactory,
}

impl ProviderDescriptor {
    /// Construct a provider instance through this descriptor's factory.
    pub fn build(&self, ctx: &ProviderContext) -> Box<dyn ImageProvider> {
        (self.factory)(ctx)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("alias", &self.alias)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Alias → descriptor table.
///
/// # Examples
///
/// ```rust,ignore
/// use pixluna::source::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_builtin();
/// assert!(registry.resolve("lolicon").is_some());
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    entries: RwLock<HashMap<String, ProviderDescriptor>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in source.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        super::providers::register_builtin(&registry);
        registry
    }

    /// Register `factory` under each of `aliases`.
    ///
    /// Aliases are trimmed; empty ones are skipped. An existing alias is
    /// overwritten (last write wins).
    pub fn register<F>(&self, aliases: &[&str], description: &str, factory: F)
    where
        F: Fn(&ProviderContext) -> Box<dyn ImageProvider> + Send + Sync + 'static,
    {
        let factory: ProviderFactory = Arc::new(factory);
        let mut entries = self.entries.write();
        for alias in aliases.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
            let replaced = entries
                .insert(
                    alias.to_string(),
                    ProviderDescriptor {
                        alias: alias.to_string(),
                        description: description.to_string(),
                        factory: Arc::clone(&factory),
                    },
                )
                .is_some();
            debug!(alias, replaced, "Registered image source");
        }
    }

    /// Look up the descriptor registered under `alias`.
    pub fn resolve(&self, alias: &str) -> Option<ProviderDescriptor> {
        self.entries.read().get(alias.trim()).cloned()
    }

    /// All registered aliases, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.entries.read().keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// `(alias, description)` pairs, sorted by alias.
    pub fn describe(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .entries
            .read()
            .values()
            .map(|d| (d.alias.clone(), d.description.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("aliases", &self.list())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::HttpClient;
    use crate::source::provider::{AcquisitionRequest, ProviderMeta};
    use async_trait::async_trait;
    use pixluna_common::{Error, GeneralImageData, ImageMetadata, ImageUrls, Result};

    /// A minimal stub provider used for testing.
    pub(crate) struct StubProvider {
        pub name: &'static str,
        pub url: String,
        pub fail: bool,
    }

    #[async_trait]
    impl ImageProvider for StubProvider {
        fn meta(&self) -> ProviderMeta {
            ProviderMeta {
                name: self.name,
                referer: None,
            }
        }

        fn configure(&mut self, _config: Arc<Config>) {}

        async fn fetch_metadata(&self, _request: &AcquisitionRequest) -> Result<ImageMetadata> {
            if self.fail {
                return Err(Error::upstream(format!("{} has nothing", self.name)));
            }
            Ok(ImageMetadata {
                url: self.url.clone(),
                urls: ImageUrls {
                    original: self.url.clone(),
                    regular: None,
                },
                raw: GeneralImageData {
                    id: self.name.to_string(),
                    title: self.name.to_string(),
                    extension: "png".into(),
                    ..Default::default()
                },
            })
        }
    }

    pub(crate) fn stub_factory(
        name: &'static str,
    ) -> impl Fn(&ProviderContext) -> Box<dyn ImageProvider> + Send + Sync + 'static {
        move |_ctx: &ProviderContext| -> Box<dyn ImageProvider> {
            Box::new(StubProvider {
                name,
                url: String::new(),
                fail: false,
            })
        }
    }

    pub(crate) fn test_context() -> ProviderContext {
        ProviderContext::new(
            Arc::new(Config::default()),
            HttpClient::new(None).unwrap(),
        )
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
        assert!(registry.resolve("lolicon").is_none());
    }

    #[test]
    fn test_register_multiple_aliases() {
        let registry = ProviderRegistry::new();
        registry.register(&["pixiv", " pdiscovery "], "Pixiv discovery", stub_factory("pixiv"));

        assert_eq!(registry.list(), vec!["pdiscovery", "pixiv"]);
        let desc = registry.resolve("pdiscovery").unwrap();
        assert_eq!(desc.description, "Pixiv discovery");
    }

    #[test]
    fn test_empty_alias_is_skipped() {
        let registry = ProviderRegistry::new();
        registry.register(&["", "  ", "ok"], "stub", stub_factory("ok"));
        assert_eq!(registry.list(), vec!["ok"]);
    }

    #[test]
    fn test_last_write_wins() {
        let registry = ProviderRegistry::new();
        registry.register(&["src"], "first", stub_factory("first"));
        registry.register(&["src"], "second", stub_factory("second"));

        assert_eq!(registry.len(), 1);
        let desc = registry.resolve("src").unwrap();
        assert_eq!(desc.description, "second");
        assert_eq!(desc.build(&test_context()).meta().name, "second");
    }

    #[test]
    fn test_builtin_sources() {
        let registry = ProviderRegistry::with_builtin();
        let aliases = registry.list();
        for alias in [
            "lolicon", "lolisuki", "danbooru", "safebooru", "gelbooru", "e621", "konachan", "yande",
            "lolibooru", "pdiscovery", "pfollowing",
        ] {
            assert!(aliases.contains(&alias.to_string()), "missing {alias}");
        }
        assert_eq!(registry.describe().len(), aliases.len());
    }
}
