//! Concrete [`ImageProvider`](super::ImageProvider) implementations.

pub mod danbooru;
pub mod e621;
pub mod gelbooru;
pub mod lolicon;
pub mod moebooru;
pub mod pixiv;
pub mod safebooru;

pub use danbooru::DanbooruProvider;
pub use e621::E621Provider;
pub use gelbooru::GelbooruProvider;
pub use lolicon::LoliconProvider;
pub use moebooru::{MoebooruProvider, MoebooruSite, KONACHAN, LOLIBOORU, YANDE};
pub use pixiv::{PixivByIdProvider, PixivDiscoveryProvider, PixivFollowingProvider};
pub use safebooru::SafebooruProvider;

use super::registry::ProviderRegistry;

/// Register every built-in source under its alias.
pub fn register_builtin(registry: &ProviderRegistry) {
    registry.register(&["lolicon"], "Random Pixiv works via the Lolicon API", |ctx| {
        Box::new(LoliconProvider::lolicon(ctx))
    });
    registry.register(&["lolisuki"], "Random Pixiv works via the Lolisuki API", |ctx| {
        Box::new(LoliconProvider::lolisuki(ctx))
    });
    registry.register(&["danbooru"], "Random posts from Danbooru", |ctx| {
        Box::new(DanbooruProvider::new(ctx))
    });
    registry.register(&["safebooru"], "Random posts from Safebooru", |ctx| {
        Box::new(SafebooruProvider::new(ctx))
    });
    registry.register(&["gelbooru"], "Random posts from Gelbooru", |ctx| {
        Box::new(GelbooruProvider::new(ctx))
    });
    registry.register(&["e621"], "Random posts from e621", |ctx| {
        Box::new(E621Provider::new(ctx))
    });
    registry.register(&["konachan"], "Random posts from Konachan", |ctx| {
        Box::new(MoebooruProvider::new(KONACHAN, ctx))
    });
    registry.register(&["yande"], "Random posts from yande.re", |ctx| {
        Box::new(MoebooruProvider::new(YANDE, ctx))
    });
    registry.register(&["lolibooru"], "Random posts from Lolibooru", |ctx| {
        Box::new(MoebooruProvider::new(LOLIBOORU, ctx))
    });
    registry.register(
        &["pdiscovery"],
        "Pixiv discovery feed, filtered by tag",
        |ctx| Box::new(PixivDiscoveryProvider::new(ctx)),
    );
    registry.register(
        &["pfollowing"],
        "Works by artists the Pixiv account follows",
        |ctx| Box::new(PixivFollowingProvider::new(ctx)),
    );
}
