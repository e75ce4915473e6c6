//! Turns an explicit alias, or the configured default list, into a ready
//! provider instance.

use std::sync::Arc;

use pixluna_common::{Error, Result};
use rand::seq::SliceRandom;
use tracing::debug;

use super::provider::{ImageProvider, ProviderContext};
use super::registry::ProviderRegistry;

/// Resolves aliases against a shared [`ProviderRegistry`].
///
/// Every call builds a fresh instance and configures it with the current
/// [`Config`](crate::config::Config), so instances never leak state across
/// jobs.
#[derive(Debug, Clone)]
pub struct ProviderResolver {
    registry: Arc<ProviderRegistry>,
    ctx: ProviderContext,
}

impl ProviderResolver {
    pub fn new(registry: Arc<ProviderRegistry>, ctx: ProviderContext) -> Self {
        Self { registry, ctx }
    }

    /// Resolve `alias` or fail with [`Error::ProviderNotFound`].
    pub fn resolve_explicit(&self, alias: &str) -> Result<Box<dyn ImageProvider>> {
        let descriptor = self
            .registry
            .resolve(alias)
            .ok_or_else(|| Error::provider_not_found(alias.trim()))?;

        let mut provider = descriptor.build(&self.ctx);
        provider.configure(Arc::clone(&self.ctx.config));
        debug!(alias = %descriptor.alias, "Resolved image source");
        Ok(provider)
    }

    /// Pick one of the configured default aliases uniformly at random and
    /// resolve it. Each call draws again.
    pub fn resolve_default(&self) -> Result<Box<dyn ImageProvider>> {
        let alias = self
            .ctx
            .config
            .default_source_provider
            .choose(&mut rand::thread_rng())
            .ok_or(Error::NoProviderConfigured)?;
        self.resolve_explicit(alias)
    }

    /// Explicit alias when given and non-blank, otherwise the default list.
    pub fn resolve(&self, alias: Option<&str>) -> Result<Box<dyn ImageProvider>> {
        match alias.map(str::trim).filter(|a| !a.is_empty()) {
            Some(alias) => self.resolve_explicit(alias),
            None => self.resolve_default(),
        }
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::HttpClient;
    use crate::source::registry::tests::stub_factory;
    use assert_matches::assert_matches;
    use pixluna_common::ErrorKind;

    fn resolver_with(defaults: &[&str]) -> ProviderResolver {
        let registry = ProviderRegistry::new();
        registry.register(&["alpha"], "Alpha", stub_factory("alpha"));
        registry.register(&["beta"], "Beta", stub_factory("beta"));
        registry.register(&["gamma"], "Gamma", stub_factory("gamma"));

        let config = Config {
            default_source_provider: defaults.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        };
        ProviderResolver::new(
            Arc::new(registry),
            ProviderContext::new(Arc::new(config), HttpClient::new(None).unwrap()),
        )
    }

    #[test]
    fn test_explicit_alias_resolves() {
        let resolver = resolver_with(&[]);
        let provider = resolver.resolve_explicit("beta").unwrap();
        assert_eq!(provider.meta().name, "beta");
    }

    #[test]
    fn test_unknown_alias_is_not_found() {
        let resolver = resolver_with(&["alpha"]);
        let err = resolver.resolve_explicit("nope").err().unwrap();
        assert_matches!(err, Error::ProviderNotFound(ref a) if a == "nope");
    }

    #[test]
    fn test_empty_default_list_is_not_configured() {
        let resolver = resolver_with(&[]);
        let err = resolver.resolve_default().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoProviderConfigured);

        let err = resolver.resolve(None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoProviderConfigured);
    }

    #[test]
    fn test_unregistered_default_is_not_found() {
        let resolver = resolver_with(&["missing"]);
        let err = resolver.resolve_default().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ProviderNotFound);
    }

    #[test]
    fn test_default_picks_stay_inside_the_list() {
        let resolver = resolver_with(&["alpha", "gamma"]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let name = resolver.resolve_default().unwrap().meta().name;
            assert!(name == "alpha" || name == "gamma", "picked {name}");
            seen.insert(name);
        }
        // 200 fair draws over two aliases hit both
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_blank_explicit_alias_falls_back_to_default() {
        let resolver = resolver_with(&["gamma"]);
        let provider = resolver.resolve(Some("  ")).unwrap();
        assert_eq!(provider.meta().name, "gamma");
    }
}
