//! Shared HTTP client used by every content source and by the image
//! downloader.
//!
//! Features:
//! - Desktop browser User-Agent on every request.
//! - Optional proxy taken from [`ProxyConfig`](crate::config::ProxyConfig).
//! - Automatic retry on HTTP 429 with `Retry-After` header support (max 3 retries).
//! - 30-second request timeout.

use std::time::Duration;

use bytes::Bytes;
use pixluna_common::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// Cheaply cloneable handle around a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build a client, routing all traffic through `proxy` when given.
    pub fn new(proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT);

        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::invalid_config(format!("invalid proxy {proxy}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(Error::transport)?;
        Ok(Self { client })
    }

    /// Build a client from the proxy section of the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let proxy = config
            .proxy
            .enabled
            .then_some(config.proxy.host.as_str());
        Self::new(proxy)
    }

    /// Send a request built by `make`, retrying on 429.
    ///
    /// The builder closure is invoked once per attempt because a
    /// `RequestBuilder` cannot be reused after sending.
    async fn send<F>(&self, url: &str, make: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut retries = 0u32;
        loop {
            let resp = make(&self.client)
                .send()
                .await
                .map_err(|e| Error::transport(format!("request to {url} failed: {e}")))?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    url = %url,
                    retry = retries,
                    wait_secs = wait,
                    "Source returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return resp
                .error_for_status()
                .map_err(|e| Error::transport(format!("{url} returned error: {e}")));
        }
    }

    /// GET `url` with query parameters and extra headers, decoding a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&'static str, String)],
    ) -> Result<T> {
        let headers = header_map(headers)?;
        debug!(url = %url, "GET json");

        self.send(url, |client| {
            client.get(url).query(query).headers(headers.clone())
        })
        .await?
        .json::<T>()
        .await
        .map_err(|e| Error::upstream(format!("failed to parse response from {url}: {e}")))
    }

    /// POST a JSON body to `url`, decoding a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        debug!(url = %url, "POST json");

        self.send(url, |client| client.post(url).json(body))
            .await?
            .json::<T>()
            .await
            .map_err(|e| Error::upstream(format!("failed to parse response from {url}: {e}")))
    }

    /// Download raw bytes, sending `referer` when the source requires one.
    pub async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Bytes> {
        debug!(url = %url, referer = ?referer, "Downloading image");

        self.send(url, |client| {
            let req = client.get(url);
            match referer {
                Some(referer) => req.header(REFERER, referer),
                None => req,
            }
        })
        .await?
        .bytes()
        .await
        .map_err(|e| Error::transport(format!("failed to read bytes from {url}: {e}")))
    }
}

fn header_map(headers: &[(&'static str, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_config(format!("invalid value for header {name}: {e}")))?;
        map.insert(HeaderName::from_static(*name), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_rejects_malformed_proxy() {
        let err = HttpClient::new(Some("not a url")).unwrap_err();
        assert_eq!(err.kind(), pixluna_common::ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_builds_header_map() {
        let map = header_map(&[("referer", "https://www.pixiv.net/".into())]).unwrap();
        assert_eq!(map.get("referer").unwrap(), "https://www.pixiv.net/");
    }

    #[tokio::test]
    async fn test_get_bytes_sends_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(header("referer", "https://www.pixiv.net/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG".to_vec()))
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let bytes = client
            .get_bytes(
                &format!("{}/img.png", server.uri()),
                Some("https://www.pixiv.net/"),
            )
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_http_error_maps_to_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let err = client
            .get_bytes(&format!("{}/missing.png", server.uri()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), pixluna_common::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_retries_after_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = HttpClient::new(None).unwrap();
        let value: serde_json::Value = client
            .get_json(&format!("{}/busy", server.uri()), &[], &[])
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }
}
