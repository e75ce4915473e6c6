use pixluna_common::FlipMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Jobs allowed in flight at once, 1 to 10.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Allow adult content at all.
    #[serde(default)]
    pub is_r18: bool,

    /// Probability in [0, 1] that a job asks for adult content when allowed.
    #[serde(default = "default_r18_probability")]
    pub r18_probability: f64,

    #[serde(default)]
    pub exclude_ai: bool,

    /// Aliases picked from at random when no explicit source is requested.
    #[serde(default = "default_source_providers")]
    pub default_source_provider: Vec<String>,

    /// Reverse-proxy host substituted for `i.pximg.net` in Pixiv image URLs.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Emit debug-level logs for pixluna when RUST_LOG is unset.
    #[serde(default)]
    pub debug_log: bool,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub image_processing: ImageProcessingConfig,

    #[serde(default)]
    pub pixiv: PixivConfig,

    #[serde(default)]
    pub danbooru: LoginKeyConfig,

    #[serde(default)]
    pub e621: LoginKeyConfig,

    #[serde(default)]
    pub gelbooru: GelbooruConfig,

    #[serde(default)]
    pub konachan: PasswordConfig,

    #[serde(default)]
    pub yande: PasswordConfig,

    #[serde(default)]
    pub lolibooru: PasswordConfig,
}

fn default_max_concurrency() -> usize {
    1
}

fn default_r18_probability() -> f64 {
    0.1
}

fn default_source_providers() -> Vec<String> {
    vec!["lolicon".to_string()]
}

fn default_base_url() -> String {
    "i.pixiv.re".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            is_r18: false,
            r18_probability: default_r18_probability(),
            exclude_ai: false,
            default_source_provider: default_source_providers(),
            base_url: default_base_url(),
            debug_log: false,
            proxy: ProxyConfig::default(),
            image_processing: ImageProcessingConfig::default(),
            pixiv: PixivConfig::default(),
            danbooru: LoginKeyConfig::default(),
            e621: LoginKeyConfig::default(),
            gelbooru: GelbooruConfig::default(),
            konachan: PasswordConfig::default(),
            yande: PasswordConfig::default(),
            lolibooru: PasswordConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_proxy_host")]
    pub host: String,
}

fn default_proxy_host() -> String {
    "http://127.0.0.1:7890".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_proxy_host(),
        }
    }
}

/// Stages of the transform pipeline, read-only for the duration of a batch.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageProcessingConfig {
    #[serde(default)]
    pub flip_mode: FlipMode,

    /// Perturb one random pixel to defeat exact-hash deduplication.
    #[serde(default)]
    pub confusion: bool,

    #[serde(default)]
    pub compress: bool,

    /// Deflate effort, 0 (fastest) to 9 (smallest).
    #[serde(default = "default_compression_level")]
    pub compression_level: u8,
}

fn default_compression_level() -> u8 {
    6
}

impl Default for ImageProcessingConfig {
    fn default() -> Self {
        Self {
            flip_mode: FlipMode::None,
            confusion: false,
            compress: false,
            compression_level: default_compression_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PixivConfig {
    /// PHPSESSID cookie; required for fetch-by-id and the following feed.
    #[serde(default)]
    pub php_sessid: String,

    /// Numeric id of the account whose followed artists `pfollowing` samples.
    #[serde(default)]
    pub user_id: String,
}

/// Sources authenticated by login name plus API key (Danbooru, e621).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginKeyConfig {
    #[serde(default)]
    pub key_pairs: Vec<LoginKeyPair>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginKeyPair {
    pub login: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GelbooruConfig {
    #[serde(default)]
    pub key_pairs: Vec<GelbooruKeyPair>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GelbooruKeyPair {
    pub api_key: String,
}

/// Moebooru sites log in with a salted SHA-1 of the account password.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PasswordConfig {
    #[serde(default)]
    pub key_pairs: Vec<PasswordKeyPair>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasswordKeyPair {
    pub login: String,
    pub password: String,
}
